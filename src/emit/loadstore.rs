//! Source loading and destination storing: the two pipelines every
//! instruction handler funnels its operands through.
use super::Emitter;
use crate::error::Result;
use crate::ir::{Destination, Source, Swizzle, WriteMask};
use crate::spirv::module::SpvId;
use crate::spirv::write;
use spirv_headers::Op;

pub const GLSL_FABS: u32 = 4;
pub const GLSL_FCLAMP: u32 = 43;

fn swizzle_index(s: Swizzle) -> u32 {
    match s {
        Swizzle::X => 0,
        Swizzle::Y => 1,
        Swizzle::Z => 2,
        Swizzle::W => 3,
        Swizzle::Zero => 4,
        Swizzle::One => 5,
    }
}

impl<'a> Emitter<'a> {
    /// Loads a source operand as a `float4` (or `int4`/`uint4` when
    /// `scalar_ty` says so), applying swizzle, abs and negate. Modifiers
    /// without a static lowering (`invert`/`bias`/`x2`/`sign`/`divComp`)
    /// are diagnosed and otherwise ignored.
    pub fn load_source(&mut self, src: &Source, scalar_ty: SpvId) -> Result<SpvId> {
        let reg = self.register_or_error(src.register_type, src.register_num)?.clone();
        let mut value = write::put_load(&mut self.module, reg.type_id, reg.id);

        if reg.type_id != scalar_ty {
            let vector_ty = write::put_vector_type(&mut self.module, scalar_ty, 4);
            value = write::put_bitcast(&mut self.module, vector_ty, value);
        }

        let identity = matches!(
            src.swizzle,
            [Swizzle::X, Swizzle::Y, Swizzle::Z, Swizzle::W]
        );
        if !identity {
            let zero_one = self.zero_one_vector(scalar_ty);
            let vector_ty = write::put_vector_type(&mut self.module, scalar_ty, 4);
            // zero_one_vector is laid out [0.0, 0.0, 1.0, 1.0]; as the
            // second VectorShuffle operand its lanes are addressed at
            // offset 4, so Zero picks lane 4 and One picks lane 6.
            let components: Vec<u32> = src
                .swizzle
                .iter()
                .map(|s| match s {
                    Swizzle::Zero => 4,
                    Swizzle::One => 6,
                    other => swizzle_index(*other),
                })
                .collect();
            value = write::put_vector_shuffle(&mut self.module, vector_ty, value, zero_one, &components);
        }

        if src.abs {
            let vector_ty = write::put_vector_type(&mut self.module, scalar_ty, 4);
            value = write::put_glsl_op(&mut self.module, vector_ty, GLSL_FABS, &[value]);
        }

        if src.negate.iter().any(|n| *n) {
            let vector_ty = write::put_vector_type(&mut self.module, scalar_ty, 4);
            let negate_op = if scalar_ty == self.int_ty {
                Op::SNegate
            } else {
                Op::FNegate
            };
            let negated = write::put_alu(&mut self.module, negate_op, vector_ty, &[value]);
            let components: Vec<u32> = src
                .negate
                .iter()
                .enumerate()
                .map(|(i, n)| if *n { 4 + i as u32 } else { i as u32 })
                .collect();
            value = write::put_vector_shuffle(&mut self.module, vector_ty, value, negated, &components);
        }

        if src.invert {
            log::warn!("emit: unhandled source invert modifier");
        }
        if src.bias {
            log::warn!("emit: unhandled source bias modifier");
        }
        if src.x2 {
            log::warn!("emit: unhandled source x2 modifier");
        }
        if src.sign {
            log::warn!("emit: unhandled source sign modifier");
        }
        if src.div_comp {
            log::warn!("emit: unhandled source divComp modifier");
        }
        if src.clamp {
            log::warn!("emit: unhandled source clamp modifier");
        }

        Ok(value)
    }

    /// Stores `value` (already of the register's type) into `dst`,
    /// applying clamp and write-mask/component-forcing.
    pub fn store_destination(&mut self, dst: &Destination, mut value: SpvId, scalar_ty: SpvId) -> Result<()> {
        let vector_ty = write::put_vector_type(&mut self.module, scalar_ty, 4);

        if dst.clamp {
            let zero = write::put_constant(&mut self.module, scalar_ty, 0);
            let one = write::put_constant(&mut self.module, scalar_ty, 0x3F80_0000);
            value = write::put_glsl_op(&mut self.module, vector_ty, GLSL_FCLAMP, &[value, zero, one]);
        }

        let reg_id = match dst.register_type {
            crate::ir::RegisterType::Temp => self.find_or_create_temp(dst.register_num),
            other => self.register_or_error(other, dst.register_num)?.id,
        };

        if dst.component.iter().any(|c| *c == WriteMask::NoWrite) {
            let orig = write::put_load(&mut self.module, vector_ty, reg_id);
            let components: Vec<u32> = dst
                .component
                .iter()
                .enumerate()
                .map(|(i, c)| if *c == WriteMask::NoWrite { i as u32 } else { 4 + i as u32 })
                .collect();
            value = write::put_vector_shuffle(&mut self.module, vector_ty, orig, value, &components);
        }

        if dst.component.iter().any(|c| matches!(c, WriteMask::Zero | WriteMask::One)) {
            let zero_one = self.zero_one_vector(scalar_ty);
            let components: Vec<u32> = dst
                .component
                .iter()
                .enumerate()
                .map(|(i, c)| match c {
                    WriteMask::Zero => 4,
                    WriteMask::One => 6,
                    _ => i as u32,
                })
                .collect();
            value = write::put_vector_shuffle(&mut self.module, vector_ty, value, zero_one, &components);
        }

        write::put_store(&mut self.module, reg_id, value);
        Ok(())
    }
}
