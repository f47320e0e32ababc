//! IL -> SPIR-V emitter: the per-opcode lowering and the compile-time
//! bookkeeping (registers, resources, samplers, control-flow stack) it
//! needs.
mod arith;
mod control_flow;
mod loadstore;
mod registers;
mod resources;
mod sample;

use crate::error::{Error, Result};
use crate::ir::*;
use crate::mapping::DescriptorSetMapping;
use crate::spirv::module::{Module, SpvId};
use crate::spirv::write;
use control_flow::ControlFlowFrame;
use registers::Register;
use resources::Resource;
use spirv_headers::{Dim, ExecutionMode, ExecutionModel, StorageClass};

pub(crate) struct Emitter<'a> {
    pub module: Module,
    pub kernel: &'a Kernel,
    #[allow(dead_code)]
    pub mapping: &'a DescriptorSetMapping,
    pub entry_point_id: SpvId,

    pub int_ty: SpvId,
    pub int4_ty: SpvId,
    pub uint_ty: SpvId,
    pub float_ty: SpvId,
    pub float4_ty: SpvId,
    pub bool_ty: SpvId,
    pub bool4_ty: SpvId,
    pub sampler_ty: Option<SpvId>,

    pub regs: Vec<Register>,
    pub resources: Vec<Resource>,
    pub sampler_cache: [Option<SpvId>; 16],
    pub control_flow: Vec<ControlFlowFrame>,
    pub in_function: bool,
}

impl<'a> Emitter<'a> {
    fn new(kernel: &'a Kernel, mapping: &'a DescriptorSetMapping) -> Self {
        let mut module = Module::new();
        let int_ty = write::put_int_type(&mut module, true);
        let uint_ty = write::put_int_type(&mut module, false);
        let float_ty = write::put_float_type(&mut module);
        let bool_ty = write::put_bool_type(&mut module);
        let int4_ty = write::put_vector_type(&mut module, int_ty, 4);
        let float4_ty = write::put_vector_type(&mut module, float_ty, 4);
        let bool4_ty = write::put_vector_type(&mut module, bool_ty, 4);
        let entry_point_id = module.alloc_id();

        Emitter {
            module,
            kernel,
            mapping,
            entry_point_id,
            int_ty,
            int4_ty,
            uint_ty,
            float_ty,
            float4_ty,
            bool_ty,
            bool4_ty,
            sampler_ty: None,
            regs: Vec::new(),
            resources: Vec::new(),
            sampler_cache: [None; 16],
            control_flow: Vec::new(),
            in_function: true,
        }
    }

    /// Opens `main`: `OpTypeVoid`, `OpTypeFunction %void ()`, the
    /// `OpFunction` using the id already reserved for the entry point, and
    /// an opening `OpLabel`. Must run before any instruction is lowered.
    fn emit_func(&mut self) {
        let void_ty = write::put_void_type(&mut self.module);
        let func_ty = write::put_function_type(&mut self.module, void_ty, &[]);
        write::put_function(&mut self.module, void_ty, self.entry_point_id, func_ty);
        write::put_label(&mut self.module);
    }

    fn execution_model(&self) -> ExecutionModel {
        match self.kernel.shader_type {
            ShaderType::Vertex => ExecutionModel::Vertex,
            ShaderType::Pixel => ExecutionModel::Fragment,
            ShaderType::Geometry => ExecutionModel::Geometry,
            ShaderType::Compute => ExecutionModel::GLCompute,
            ShaderType::Hull => ExecutionModel::TessellationControl,
            ShaderType::Domain => ExecutionModel::TessellationEvaluation,
        }
    }

    fn emit_entry_point(&mut self) {
        let mut interfaces: Vec<SpvId> = self.regs.iter().map(|r| r.id).collect();
        interfaces.extend(self.resources.iter().map(|r| r.var_id));
        interfaces.extend(self.sampler_cache.iter().filter_map(|s| *s));

        let execution = self.execution_model();
        write::put_entry_point(&mut self.module, self.entry_point_id, execution, "main", &interfaces);
        write::put_name(&mut self.module, self.entry_point_id, "main");

        if self.kernel.shader_type == ShaderType::Pixel {
            write::put_exec_mode(&mut self.module, self.entry_point_id, ExecutionMode::OriginUpperLeft);
        }
    }

    fn emit_global_flags(&mut self, instr: &Instruction) {
        let control = instr.control as u32;
        let refactoring_allowed = control & 1 != 0;
        let force_early_depth_stencil = (control >> 1) & 1 != 0;
        let enable_raw_structured_buffers = (control >> 2) & 1 != 0;
        let enable_double_precision_float_ops = (control >> 3) & 1 != 0;
        if !refactoring_allowed {
            log::warn!("emit: unhandled !refactoringAllowed flag");
        }
        if force_early_depth_stencil {
            log::warn!("emit: unhandled forceEarlyDepthStencil flag");
        }
        if enable_raw_structured_buffers {
            log::warn!("emit: unhandled enableRawStructuredBuffers flag");
        }
        if enable_double_precision_float_ops {
            log::warn!("emit: unhandled enableDoublePrecisionFloatOps flag");
        }
    }

    fn emit_literal(&mut self, instr: &Instruction) -> Result<()> {
        let src = instr
            .srcs
            .first()
            .ok_or(Error::MalformedStream("DCL_LITERAL missing source"))?;
        let values: Vec<u32> = instr.extras.iter().take(4).copied().collect();
        let (var_id, ty) = self.declare_vector_variable(4, self.float_ty, StorageClass::Private);

        let consts: Vec<SpvId> = values
            .iter()
            .map(|v| write::put_constant(&mut self.module, self.float_ty, *v))
            .collect();
        let composite = write::put_constant_composite(&mut self.module, ty, &consts);
        write::put_store(&mut self.module, var_id, composite);

        let mut literal_values = [0u32; 4];
        for (i, v) in values.iter().enumerate() {
            literal_values[i] = *v;
        }

        self.regs.push(Register {
            id: var_id,
            type_id: ty,
            il_type: src.register_type,
            il_num: src.register_num,
            literal_values: Some(literal_values),
        });
        Ok(())
    }

    fn emit_output(&mut self, instr: &Instruction) -> Result<()> {
        let import_usage = instr.control & 0x1F;
        let dst = instr
            .dsts
            .first()
            .ok_or(Error::MalformedStream("DCL_OUTPUT missing destination"))?;

        let (out_id, ty) = self.declare_vector_variable(4, self.float_ty, StorageClass::Output);
        match import_usage {
            0 => write::builtin_decoration(&mut self.module, out_id, spirv_headers::BuiltIn::Position),
            1 => {
                let loc = dst.register_num;
                write::put_decoration(&mut self.module, out_id, spirv_headers::Decoration::Location, &[loc]);
            }
            other => log::warn!("emit: unhandled output import usage {}", other),
        }

        self.regs.push(Register {
            id: out_id,
            type_id: ty,
            il_type: dst.register_type,
            il_num: dst.register_num,
            literal_values: None,
        });
        Ok(())
    }

    fn emit_input(&mut self, instr: &Instruction) -> Result<()> {
        let import_usage = instr.control & 0x1F;
        let interp_mode = (instr.control >> 5) & 0x7;
        let dst = instr
            .dsts
            .first()
            .ok_or(Error::MalformedStream("DCL_INPUT missing destination"))?;

        let (in_id, in_ty) = match import_usage {
            1 => {
                let loc = dst.register_num;
                let (id, ty) = self.declare_vector_variable(4, self.float_ty, StorageClass::Input);
                write::put_decoration(&mut self.module, id, spirv_headers::Decoration::Location, &[loc]);
                (id, ty)
            }
            2 | 3 => {
                let pointer_ty = write::put_pointer_type(&mut self.module, StorageClass::Input, self.int_ty);
                let id = write::put_variable(&mut self.module, pointer_ty, StorageClass::Input);
                let builtin = if import_usage == 2 {
                    spirv_headers::BuiltIn::VertexIndex
                } else {
                    spirv_headers::BuiltIn::InstanceIndex
                };
                write::builtin_decoration(&mut self.module, id, builtin);
                (id, self.int_ty)
            }
            other => {
                log::warn!("emit: unhandled input import usage {}", other);
                self.declare_vector_variable(4, self.float_ty, StorageClass::Input)
            }
        };

        match interp_mode {
            1 => write::put_decoration(&mut self.module, in_id, spirv_headers::Decoration::Flat, &[]),
            2 | 5 => write::put_decoration(&mut self.module, in_id, spirv_headers::Decoration::Centroid, &[]),
            _ => {}
        }
        if matches!(interp_mode, 3 | 5 | 6) {
            write::put_decoration(&mut self.module, in_id, spirv_headers::Decoration::NoPerspective, &[]);
        }
        if matches!(interp_mode, 4 | 6) {
            write::enable_capability(&mut self.module, spirv_headers::Capability::SampleRateShading);
            write::put_decoration(&mut self.module, in_id, spirv_headers::Decoration::Sample, &[]);
        }

        self.regs.push(Register {
            id: in_id,
            type_id: in_ty,
            il_type: dst.register_type,
            il_num: dst.register_num,
            literal_values: None,
        });
        Ok(())
    }

    fn emit_instr(&mut self, instr: &Instruction) -> Result<()> {
        use Opcode::*;
        match instr.opcode {
            Abs | Add | Mul | Mad | Min | Max | Div | Frc | Mov | Dp2 | Dp3 | Dp4 | Acos
            | Asin | Atan | ExpVec | LogVec | RsqVec | SqrtVec | SinVec | CosVec
            | RoundNegInf | RoundPlusInf | RoundNear | RoundZero | Ftoi | Itof => {
                arith::emit_float_arith(self, instr)
            }
            Eq | Ge | Lt | Ne => arith::emit_float_comparison(self, instr),
            INot | IOr | IAdd | And | UBitExtract => arith::emit_integer_op(self, instr),
            IEq | IGe | ILt => arith::emit_integer_comparison(self, instr),
            CmovLogical => arith::emit_cmov_logical(self, instr),
            IfLogicalZ | IfLogicalNz => control_flow::emit_if(self, instr),
            Else => control_flow::emit_else(self),
            EndIf => control_flow::emit_end_if(self),
            While => control_flow::emit_while(self),
            EndLoop => control_flow::emit_end_loop(self),
            Break | BreakLogicalZ | BreakLogicalNz => control_flow::emit_break(self, instr),
            Continue => control_flow::emit_continue(self),
            RetDyn => {
                write::put_return(&mut self.module);
                Ok(())
            }
            End | EndMain => {
                if self.in_function {
                    write::put_function_end(&mut self.module);
                    self.in_function = false;
                }
                Ok(())
            }
            DclLiteral => self.emit_literal(instr),
            DclOutput => self.emit_output(instr),
            DclInput => self.emit_input(instr),
            DclResource => resources::emit_resource(self, instr),
            DclStructSrv => resources::emit_structured_srv(self, instr),
            Load => sample::emit_load(self, instr),
            SrvStructLoad => sample::emit_structured_srv_load(self, instr),
            Sample | SampleB | SampleL | SampleG | SampleC | SampleCB | SampleCG | SampleCL
            | SampleCLz => sample::emit_sample(self, instr),
            DclGlobalFlags => {
                self.emit_global_flags(instr);
                Ok(())
            }
            Unknown(raw) => {
                log::warn!("emit: unhandled instruction 0x{:x}", raw);
                Ok(())
            }
            other => {
                log::warn!("emit: unhandled instruction {:?}", other);
                Ok(())
            }
        }
    }

    fn finish(mut self) -> Result<Vec<u32>> {
        if !self.control_flow.is_empty() {
            return Err(Error::UnbalancedControlFlow(
                "control flow stack non-empty at end of kernel",
            ));
        }
        self.emit_entry_point();
        Ok(self.module.finish())
    }
}

/// Compiles a decoded kernel into a SPIR-V module. Entry point used by
/// [`crate::compile`] once the bytes have been decoded.
pub(crate) fn compile_kernel(kernel: &Kernel, mapping: &DescriptorSetMapping) -> Result<Vec<u32>> {
    let mut emitter = Emitter::new(kernel, mapping);
    emitter.emit_func();
    for instr in &kernel.instrs {
        if let Err(err) = emitter.emit_instr(instr) {
            match err {
                // Frame-stack mismatches leave the module in a state no
                // later instruction can recover from.
                Error::UnbalancedControlFlow(_) => return Err(err),
                other => log::error!("emit: skipping instruction {:?}: {}", instr.opcode, other),
            }
        }
    }
    emitter.finish()
}

// Re-exported for the sibling emit submodules, which need access to image
// dimension decoding shared between DCL_RESOURCE and SAMPLE handling.
pub(crate) fn coordinate_vector_size(usage: u32) -> Result<u32> {
    match usage {
        0 | 5 => Ok(1),             // 1D, Buffer
        1 | 3 | 2 => Ok(2),         // 1DArray, 2DMSAA, 2D
        4 | 6 | 7 | 8 | 9 => Ok(3), // 2DArray, 2DArrayMSAA, Cubemap, CubemapArray, 3D
        _ => Err(Error::UnsupportedResource("unknown PixTexUsage type")),
    }
}

pub(crate) fn image_dim(usage: u32) -> Result<(Dim, bool, bool)> {
    match usage {
        0 => Ok((Dim::Dim1D, false, false)),
        1 => Ok((Dim::Dim1D, true, false)),
        2 => Ok((Dim::Dim2D, false, false)),
        3 => Ok((Dim::Dim2D, false, true)),
        4 => Ok((Dim::Dim2D, true, false)),
        7 => Ok((Dim::Dim2D, true, true)),
        8 => Ok((Dim::DimCube, false, false)),
        9 => Ok((Dim::DimCube, true, false)),
        6 => Ok((Dim::Dim3D, false, false)),
        5 => Ok((Dim::DimBuffer, false, false)),
        _ => Err(Error::UnsupportedResource("unknown PixTexUsage type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Destination, Source};

    fn bare(opcode: Opcode, dsts: Vec<Destination>, srcs: Vec<Source>, extras: Vec<u32>) -> Instruction {
        Instruction {
            opcode,
            control: 0,
            primary_modifier: None,
            secondary_modifier: None,
            resource_format: None,
            address_offset: None,
            dsts,
            srcs,
            extras,
        }
    }

    fn kernel(instrs: Vec<Instruction>) -> Kernel {
        Kernel {
            client_type: 0,
            major_version: 2,
            minor_version: 0,
            shader_type: ShaderType::Vertex,
            multipass: false,
            realtime: false,
            instrs,
        }
    }

    #[test]
    fn minimal_vertex_shader_produces_well_formed_header() {
        let k = kernel(vec![
            bare(Opcode::DclOutput, vec![Destination::identity(RegisterType::Output, 0)], vec![], vec![]),
            bare(Opcode::DclInput, vec![{
                let mut d = Destination::identity(RegisterType::Input, 0);
                d.register_num = 0;
                d
            }], vec![], vec![]),
            bare(
                Opcode::Mov,
                vec![Destination::identity(RegisterType::Output, 0)],
                vec![Source::identity(RegisterType::Input, 0)],
                vec![],
            ),
            bare(Opcode::EndMain, vec![], vec![], vec![]),
        ]);
        let mapping = DescriptorSetMapping::empty();
        let words = compile_kernel(&k, &mapping).expect("compiles");
        assert_eq!(words[0], 0x07230203);
        assert!(words.len() > 5);
    }

    #[test]
    fn clamp_destination_emits_fclamp_ext_inst() {
        let mut dst = Destination::identity(RegisterType::Output, 0);
        dst.clamp = true;
        let k = kernel(vec![
            bare(Opcode::DclOutput, vec![Destination::identity(RegisterType::Output, 0)], vec![], vec![]),
            bare(Opcode::DclInput, vec![Destination::identity(RegisterType::Input, 0)], vec![], vec![]),
            bare(Opcode::Mov, vec![dst], vec![Source::identity(RegisterType::Input, 0)], vec![]),
            bare(Opcode::EndMain, vec![], vec![], vec![]),
        ]);
        let mapping = DescriptorSetMapping::empty();
        let words = compile_kernel(&k, &mapping).expect("compiles");
        assert!(words.iter().any(|&w| w == loadstore::GLSL_FCLAMP));
    }

    #[test]
    fn if_else_endif_leaves_control_flow_stack_balanced() {
        let k = kernel(vec![
            bare(
                Opcode::DclLiteral,
                vec![],
                vec![Source::identity(RegisterType::Literal, 0)],
                vec![0, 0, 0, 0],
            ),
            bare(Opcode::IfLogicalZ, vec![], vec![Source::identity(RegisterType::Literal, 0)], vec![]),
            bare(Opcode::Else, vec![], vec![], vec![]),
            bare(Opcode::EndIf, vec![], vec![], vec![]),
            bare(Opcode::EndMain, vec![], vec![], vec![]),
        ]);
        let mapping = DescriptorSetMapping::empty();
        assert!(compile_kernel(&k, &mapping).is_ok());
    }

    #[test]
    fn while_break_leaves_control_flow_stack_balanced() {
        let k = kernel(vec![
            bare(Opcode::While, vec![], vec![], vec![]),
            bare(Opcode::Break, vec![], vec![], vec![]),
            bare(Opcode::EndLoop, vec![], vec![], vec![]),
            bare(Opcode::EndMain, vec![], vec![], vec![]),
        ]);
        let mapping = DescriptorSetMapping::empty();
        assert!(compile_kernel(&k, &mapping).is_ok());
    }

    #[test]
    fn unbalanced_control_flow_is_fatal() {
        let k = kernel(vec![
            bare(Opcode::Else, vec![], vec![], vec![]),
            bare(Opcode::EndMain, vec![], vec![], vec![]),
        ]);
        let mapping = DescriptorSetMapping::empty();
        assert!(matches!(compile_kernel(&k, &mapping), Err(Error::UnbalancedControlFlow(_))));
    }

    #[test]
    fn dp4_of_two_inputs_compiles_to_broadcast_dot() {
        let k = kernel(vec![
            bare(Opcode::DclInput, vec![Destination::identity(RegisterType::Input, 0)], vec![], vec![]),
            bare(Opcode::DclInput, vec![{
                let mut d = Destination::identity(RegisterType::Input, 1);
                d.register_num = 1;
                d
            }], vec![], vec![]),
            bare(Opcode::DclOutput, vec![Destination::identity(RegisterType::Output, 0)], vec![], vec![]),
            bare(
                Opcode::Dp4,
                vec![Destination::identity(RegisterType::Output, 0)],
                vec![Source::identity(RegisterType::Input, 0), Source::identity(RegisterType::Input, 1)],
                vec![],
            ),
            bare(Opcode::EndMain, vec![], vec![], vec![]),
        ]);
        let mapping = DescriptorSetMapping::empty();
        assert!(compile_kernel(&k, &mapping).is_ok());
    }

    #[test]
    fn missing_register_is_an_emit_error_not_a_fatal_abort() {
        // references an undeclared output; skipped per the emit-error policy
        // rather than aborting the whole kernel.
        let k = kernel(vec![
            bare(
                Opcode::Mov,
                vec![Destination::identity(RegisterType::Output, 0)],
                vec![Source::identity(RegisterType::Input, 0)],
                vec![],
            ),
            bare(Opcode::EndMain, vec![], vec![], vec![]),
        ]);
        let mapping = DescriptorSetMapping::empty();
        assert!(compile_kernel(&k, &mapping).is_ok());
    }

    #[test]
    fn sample_resolves_indexed_resource_offset_against_literal_register() {
        // resource 0 declared with a float4 2D format; the sample's trailing
        // indexed sources add +1 (resource) and +0 (sampler) on top of the
        // control word's base ids 0/0, landing on resource id 1, which does
        // not exist, so a placeholder resource is synthesized instead of
        // failing outright.
        let mut resource_control = [0u16; 1];
        resource_control[0] = 2 << 8; // pixTexType = 2 (2D), id = 0
        let float_fmt = (1u32 << 20) | (1u32 << 23) | (1u32 << 26) | (1u32 << 29);

        let mut resource_instr = bare(Opcode::DclResource, vec![], vec![], vec![float_fmt]);
        resource_instr.control = resource_control[0];

        let mut sample_instr = bare(
            Opcode::Sample,
            vec![Destination::identity(RegisterType::Output, 0)],
            vec![
                Source::identity(RegisterType::Input, 0),
                {
                    let mut s = Source::identity(RegisterType::Literal, 0);
                    s.swizzle[0] = crate::ir::Swizzle::One;
                    s
                },
                {
                    let mut s = Source::identity(RegisterType::Literal, 0);
                    s.swizzle[0] = crate::ir::Swizzle::Zero;
                    s
                },
            ],
            vec![],
        );
        sample_instr.resource_format = Some(2);

        let k = kernel(vec![
            bare(Opcode::DclInput, vec![Destination::identity(RegisterType::Input, 0)], vec![], vec![]),
            bare(Opcode::DclOutput, vec![Destination::identity(RegisterType::Output, 0)], vec![], vec![]),
            resource_instr,
            sample_instr,
            bare(Opcode::EndMain, vec![], vec![], vec![]),
        ]);
        let mapping = DescriptorSetMapping::empty();
        assert!(compile_kernel(&k, &mapping).is_ok());
    }
}
