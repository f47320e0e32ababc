//! Texture sampling and buffer/structured loads: `SAMPLE*`, `LOAD`,
//! `SRV_STRUCT_LOAD`.
//!
//! The base resource and sampler ids for every `SAMPLE*` instruction live
//! in the instruction's control word (`id` in bits 0-7, sampler in bits
//! 8-11), not in a source operand. When the "indexed args" control bit is
//! set, two extra source operands are appended to the normal list (see
//! `decode::resolve_source_count`); each references a `DCL_LITERAL` or
//! const-int register and contributes a compile-time OFFSET added onto
//! those base ids, selected by the source's first swizzle component.
use super::{coordinate_vector_size, Emitter};
use crate::error::{Error, Result};
use crate::ir::{Instruction, Opcode, RegisterType, Source, Swizzle};
use crate::spirv::module::SpvId;
use crate::spirv::write;

/// Resolves the compile-time offset an indexed resource/sampler source
/// contributes: `Zero`/`One` fast-path to 0/1 without touching a
/// register, anything else is looked up in the literal register it
/// references and selected via that swizzle lane.
fn resolve_offset(emitter: &Emitter, src: &Source) -> Result<u32> {
    match src.swizzle[0] {
        Swizzle::Zero => Ok(0),
        Swizzle::One => Ok(1),
        lane => {
            let index = match lane {
                Swizzle::X => 0,
                Swizzle::Y => 1,
                Swizzle::Z => 2,
                Swizzle::W => 3,
                _ => unreachable!("Zero/One handled above"),
            };
            if !matches!(src.register_type, RegisterType::Literal | RegisterType::ConstInt) {
                return Err(Error::MalformedStream("indexed resource/sampler source is not a literal register"));
            }
            let reg = emitter
                .find_register(src.register_type, src.register_num)
                .ok_or(Error::MalformedStream("indexed resource/sampler references undeclared register"))?;
            let values = reg
                .literal_values
                .ok_or(Error::MalformedStream("indexed resource/sampler source is not a literal register"))?;
            Ok(values[index])
        }
    }
}

/// Resolves the sampler variable bound to `il_id`, creating and caching a
/// fresh `s#` sampler declaration the first time it's referenced. AMDIL
/// only ever indexes samplers `0..16` so a flat cache array suffices.
fn resolve_sampler(emitter: &mut Emitter, il_id: u32) -> Result<SpvId> {
    let slot = il_id as usize;
    if slot >= emitter.sampler_cache.len() {
        return Err(Error::UnsupportedResource("sampler index out of range"));
    }
    if let Some(id) = emitter.sampler_cache[slot] {
        return Ok(id);
    }
    let sampler_ty = match emitter.sampler_ty {
        Some(ty) => ty,
        None => {
            let ty = write::put_sampler_type(&mut emitter.module);
            emitter.sampler_ty = Some(ty);
            ty
        }
    };
    let pointer_ty = write::put_pointer_type(&mut emitter.module, spirv_headers::StorageClass::UniformConstant, sampler_ty);
    let var_id = write::put_variable(&mut emitter.module, pointer_ty, spirv_headers::StorageClass::UniformConstant);
    let descriptor_set = emitter.kernel.shader_type as u32;
    write::put_decoration(&mut emitter.module, var_id, spirv_headers::Decoration::DescriptorSet, &[descriptor_set]);
    write::put_decoration(&mut emitter.module, var_id, spirv_headers::Decoration::Binding, &[il_id]);
    emitter.sampler_cache[slot] = Some(var_id);
    Ok(var_id)
}

/// Number of plain (non-indexed) source operands this sample opcode
/// carries before any indexed resource/sampler offsets are appended.
fn base_src_count(opcode: Opcode) -> usize {
    use Opcode::*;
    match opcode {
        Sample => 1,
        SampleB | SampleC | SampleL | SampleCLz => 2,
        SampleCB | SampleG | SampleCL => 3,
        SampleCG => 4,
        _ => unreachable!("not a sample opcode"),
    }
}

/// Loads `src` as a `float4` and narrows it to the first `size` lanes,
/// matching `getCoordinateVectorSize`'s mask (X / XY / XYZ / XYZW).
fn load_coordinate(emitter: &mut Emitter, src: &Source, size: u32) -> Result<SpvId> {
    let float_ty = emitter.float_ty;
    let vec4 = emitter.load_source(src, float_ty)?;
    if size == 4 {
        return Ok(vec4);
    }
    if size == 1 {
        return Ok(write::put_composite_extract(&mut emitter.module, float_ty, vec4, &[0]));
    }
    let vector_ty = write::put_vector_type(&mut emitter.module, float_ty, size);
    let components: Vec<u32> = (0..size).collect();
    Ok(write::put_vector_shuffle(&mut emitter.module, vector_ty, vec4, vec4, &components))
}

fn load_scalar_lane(emitter: &mut Emitter, src: &Source) -> Result<SpvId> {
    let float_ty = emitter.float_ty;
    let vec4 = emitter.load_source(src, float_ty)?;
    Ok(write::put_composite_extract(&mut emitter.module, float_ty, vec4, &[0]))
}

/// `SAMPLE dst, coord[, dref][, bias|lod|dx,dy][, resource_off, sampler_off]`
/// and its bias/lod/grad/compare variants.
pub fn emit_sample(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let base_resource_id = (instr.control & 0xFF) as u32;
    let base_sampler_id = ((instr.control >> 8) & 0xF) as u32;
    let base_count = base_src_count(instr.opcode);
    let indexed = instr.srcs.len() > base_count;

    let mut resource_id = base_resource_id;
    let mut sampler_id = base_sampler_id;
    if indexed {
        let resource_off_src = &instr.srcs[instr.srcs.len() - 2];
        let sampler_off_src = &instr.srcs[instr.srcs.len() - 1];
        resource_id += resolve_offset(emitter, resource_off_src)?;
        sampler_id += resolve_offset(emitter, sampler_off_src)?;
    }

    let resource = match emitter.find_resource(resource_id) {
        Some(r) => r.clone(),
        None => {
            let pix_tex_type = instr.resource_format.unwrap_or(0);
            emitter.emit_placeholder_resource(resource_id, pix_tex_type)?
        }
    };
    let image_type = resource.image_type;
    let image_var = resource.var_id;

    let float_ty = emitter.float_ty;
    let float4_ty = emitter.float4_ty;
    let destination = instr
        .dsts
        .first()
        .ok_or(Error::MalformedStream("SAMPLE missing destination"))?
        .clone();

    let sampler_var = resolve_sampler(emitter, sampler_id)?;
    let sampler_ty = emitter.sampler_ty.expect("sampler declared by resolve_sampler");
    let sampler = write::put_load(&mut emitter.module, sampler_ty, sampler_var);
    let image = write::put_load(&mut emitter.module, image_type, image_var);
    let sampled_image_ty = write::put_sampled_image_type(&mut emitter.module, image_type);
    let sampled_image = write::put_sampled_image(&mut emitter.module, sampled_image_ty, image, sampler);

    let coord_size = coordinate_vector_size(resource.pix_tex_type)?;
    let coordinate = load_coordinate(emitter, &instr.srcs[0], coord_size)?;

    let explicit = matches!(instr.opcode, Opcode::SampleL | Opcode::SampleCL | Opcode::SampleCLz);
    let dref = matches!(
        instr.opcode,
        Opcode::SampleC | Opcode::SampleCB | Opcode::SampleCG | Opcode::SampleCL | Opcode::SampleCLz
    );

    let dref_id = if dref {
        Some(load_scalar_lane(emitter, &instr.srcs[1])?)
    } else {
        None
    };

    let (mask, words) = match instr.opcode {
        Opcode::SampleB => {
            let lane = load_scalar_lane(emitter, &instr.srcs[1])?;
            (write::image_operands::BIAS, vec![lane])
        }
        Opcode::SampleCB => {
            let lane = load_scalar_lane(emitter, &instr.srcs[2])?;
            (write::image_operands::BIAS, vec![lane])
        }
        Opcode::SampleL => {
            let lane = load_scalar_lane(emitter, &instr.srcs[1])?;
            (write::image_operands::LOD, vec![lane])
        }
        Opcode::SampleCL => {
            let lane = load_scalar_lane(emitter, &instr.srcs[2])?;
            (write::image_operands::LOD, vec![lane])
        }
        Opcode::SampleCLz => {
            let zero = write::put_constant(&mut emitter.module, float_ty, 0);
            (write::image_operands::LOD, vec![zero])
        }
        Opcode::SampleG => {
            let dx = load_scalar_lane(emitter, &instr.srcs[1])?;
            let dy = load_scalar_lane(emitter, &instr.srcs[2])?;
            (write::image_operands::GRAD, vec![dx, dy])
        }
        Opcode::SampleCG => {
            let dx = load_scalar_lane(emitter, &instr.srcs[2])?;
            let dy = load_scalar_lane(emitter, &instr.srcs[3])?;
            (write::image_operands::GRAD, vec![dx, dy])
        }
        _ => (write::image_operands::NONE, Vec::new()),
    };

    let sample = write::put_image_sample(
        &mut emitter.module,
        explicit,
        dref,
        float4_ty,
        sampled_image,
        coordinate,
        dref_id,
        mask,
        &words,
    );

    emitter.store_destination(&destination, sample, float_ty)
}

/// `LOAD dst, coord, resource` — a texel fetch with integer coordinates
/// and no filtering.
pub fn emit_load(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let resource_id = (instr.control & 0xFF) as u32;
    let resource = emitter
        .find_resource(resource_id)
        .ok_or(Error::MalformedStream("LOAD references undeclared resource"))?
        .clone();

    let int_ty = emitter.int_ty;
    let float_ty = emitter.float_ty;
    let float4_ty = emitter.float4_ty;
    let destination = instr
        .dsts
        .first()
        .ok_or(Error::MalformedStream("LOAD missing destination"))?
        .clone();
    let coord_src = instr
        .srcs
        .first()
        .ok_or(Error::MalformedStream("LOAD missing coordinate source"))?
        .clone();

    let image = write::put_load(&mut emitter.module, resource.image_type, resource.var_id);
    let coord_vec = emitter.load_source(&coord_src, int_ty)?;
    let address = write::put_composite_extract(&mut emitter.module, int_ty, coord_vec, &[0]);
    let texel = write::put_image_fetch(&mut emitter.module, float4_ty, image, address);

    emitter.store_destination(&destination, texel, float_ty)
}

/// `SRV_STRUCT_LOAD dst, index_and_offset, resource` — byte-addressed
/// structured buffer load: `address = (index * stride + offset) / 4`,
/// fetched as a raw int4 and reinterpreted as float4 the way the
/// reference compiler treats structured buffer contents. The indexed
/// resource control bit, if set, is decoded but unsupported here, same
/// as in the reference compiler.
pub fn emit_structured_srv_load(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let resource_id = (instr.control & 0xFF) as u32;
    let indexed_resource_id = (instr.control >> 12) & 1 != 0;
    if indexed_resource_id {
        log::warn!("emit: unhandled indexed resource ID on SRV_STRUCT_LOAD");
    }

    let resource = emitter
        .find_resource(resource_id)
        .ok_or(Error::MalformedStream("SRV_STRUCT_LOAD references undeclared resource"))?
        .clone();
    let stride = resource
        .stride
        .ok_or(Error::MalformedStream("SRV_STRUCT_LOAD resource missing stride"))?;

    let int_ty = emitter.int_ty;
    let float_ty = emitter.float_ty;
    let float4_ty = emitter.float4_ty;
    let destination = instr
        .dsts
        .first()
        .ok_or(Error::MalformedStream("SRV_STRUCT_LOAD missing destination"))?
        .clone();
    let addr_src = instr
        .srcs
        .first()
        .ok_or(Error::MalformedStream("SRV_STRUCT_LOAD missing address source"))?
        .clone();

    let addr_vec = emitter.load_source(&addr_src, int_ty)?;
    let index = write::put_composite_extract(&mut emitter.module, int_ty, addr_vec, &[0]);
    let offset = write::put_composite_extract(&mut emitter.module, int_ty, addr_vec, &[1]);
    let stride_const = write::put_constant(&mut emitter.module, int_ty, stride);
    let divisor = write::put_constant(&mut emitter.module, int_ty, 4);
    let scaled = write::put_alu(&mut emitter.module, spirv_headers::Op::IMul, int_ty, &[index, stride_const]);
    let byte_offset = write::put_alu(&mut emitter.module, spirv_headers::Op::IAdd, int_ty, &[scaled, offset]);
    let word_offset = write::put_alu(&mut emitter.module, spirv_headers::Op::SDiv, int_ty, &[byte_offset, divisor]);

    let image = write::put_load(&mut emitter.module, resource.image_type, resource.var_id);
    let int4_ty = emitter.int4_ty;
    let fetched = write::put_image_fetch(&mut emitter.module, int4_ty, image, word_offset);
    let reinterpreted = write::put_bitcast(&mut emitter.module, float4_ty, fetched);

    emitter.store_destination(&destination, reinterpreted, float_ty)
}
