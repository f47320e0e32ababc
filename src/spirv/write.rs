//! Thin per-opcode SPIR-V instruction writers built on top of [`Module`].
//!
//! Each function appends one instruction and, where the instruction
//! produces a result, returns its id. These do no interning themselves
//! (beyond what [`Module::intern_type`]/[`Module::intern_constant`]
//! already provide) — callers in `emit` are responsible for not emitting
//! redundant `CODE`-section instructions.
use super::module::{Module, Section, SpvId};
use spirv_headers::{
    BuiltIn, Capability, Decoration, Dim, ExecutionMode, ExecutionModel, ImageFormat, Op,
    SelectionControl, StorageClass,
};

pub fn put_name(module: &mut Module, target: SpvId, name: &str) {
    let word_count = 2 + (name.len() / 4 + 1) as u16;
    let buf = module.section(Section::Names);
    buf.push_instr(Op::Name, word_count);
    buf.push(target);
    buf.push_str(name);
}

pub fn put_entry_point(
    module: &mut Module,
    id: SpvId,
    execution: ExecutionModel,
    name: &str,
    interfaces: &[SpvId],
) {
    let word_count = 3 + (name.len() / 4 + 1) as u16 + interfaces.len() as u16;
    let buf = module.section(Section::EntryPoints);
    buf.push_instr(Op::EntryPoint, word_count);
    buf.push(execution as u32);
    buf.push(id);
    buf.push_str(name);
    for i in interfaces {
        buf.push(*i);
    }
}

pub fn put_exec_mode(module: &mut Module, entry_point: SpvId, mode: ExecutionMode) {
    let buf = module.section(Section::ExecModes);
    buf.push_instr(Op::ExecutionMode, 3);
    buf.push(entry_point);
    buf.push(mode as u32);
}

pub fn put_decoration(module: &mut Module, target: SpvId, deco: Decoration, extra: &[u32]) {
    let word_count = (3 + extra.len()) as u16;
    let buf = module.section(Section::Decorations);
    buf.push_instr(Op::Decorate, word_count);
    buf.push(target);
    buf.push(deco as u32);
    for e in extra {
        buf.push(*e);
    }
}

pub fn put_int_type(module: &mut Module, signed: bool) -> SpvId {
    module.intern_type(Op::TypeInt, &[32, signed as u32])
}

pub fn put_float_type(module: &mut Module) -> SpvId {
    module.intern_type(Op::TypeFloat, &[32])
}

pub fn put_bool_type(module: &mut Module) -> SpvId {
    module.intern_type(Op::TypeBool, &[])
}

pub fn put_vector_type(module: &mut Module, component_type: SpvId, count: u32) -> SpvId {
    module.intern_type(Op::TypeVector, &[component_type, count])
}

pub fn put_pointer_type(module: &mut Module, storage_class: StorageClass, pointee: SpvId) -> SpvId {
    module.intern_type(Op::TypePointer, &[storage_class as u32, pointee])
}

pub fn put_sampler_type(module: &mut Module) -> SpvId {
    module.intern_type(Op::TypeSampler, &[])
}

pub fn put_sampled_image_type(module: &mut Module, image_type: SpvId) -> SpvId {
    module.intern_type(Op::TypeSampledImage, &[image_type])
}

#[allow(clippy::too_many_arguments)]
pub fn put_image_type(
    module: &mut Module,
    sampled_type: SpvId,
    dim: Dim,
    depth: u32,
    arrayed: bool,
    multisampled: bool,
    sampled: u32,
    format: ImageFormat,
) -> SpvId {
    module.intern_type(
        Op::TypeImage,
        &[
            sampled_type,
            dim as u32,
            depth,
            arrayed as u32,
            multisampled as u32,
            sampled,
            format as u32,
        ],
    )
}

pub fn put_function_type(module: &mut Module, return_type: SpvId, params: &[SpvId]) -> SpvId {
    let mut args = vec![return_type];
    args.extend_from_slice(params);
    module.intern_type(Op::TypeFunction, &args)
}

pub fn put_void_type(module: &mut Module) -> SpvId {
    module.intern_type(Op::TypeVoid, &[])
}

pub fn put_constant(module: &mut Module, result_type: SpvId, value: u32) -> SpvId {
    module.intern_constant(Op::Constant, result_type, &[value])
}

pub fn put_constant_composite(module: &mut Module, result_type: SpvId, parts: &[SpvId]) -> SpvId {
    module.intern_constant(Op::ConstantComposite, result_type, parts)
}

pub fn put_function(module: &mut Module, return_type: SpvId, id: SpvId, func_type: SpvId) {
    let buf = module.section(Section::Code);
    buf.push_instr(Op::Function, 5);
    buf.push(return_type);
    buf.push(id);
    buf.push(0); // FunctionControlMask: None
    buf.push(func_type);
}

pub fn put_function_end(module: &mut Module) {
    let buf = module.section(Section::Code);
    buf.push_instr(Op::FunctionEnd, 1);
}

pub fn put_variable(module: &mut Module, pointer_type: SpvId, storage_class: StorageClass) -> SpvId {
    let id = module.alloc_id();
    let buf = module.section(Section::Variables);
    buf.push_instr(Op::Variable, 4);
    buf.push(pointer_type);
    buf.push(id);
    buf.push(storage_class as u32);
    id
}

pub fn put_load(module: &mut Module, result_type: SpvId, pointer: SpvId) -> SpvId {
    let id = module.alloc_id();
    let buf = module.section(Section::Code);
    buf.push_instr(Op::Load, 4);
    buf.push(result_type);
    buf.push(id);
    buf.push(pointer);
    id
}

pub fn put_store(module: &mut Module, pointer: SpvId, object: SpvId) {
    let buf = module.section(Section::Code);
    buf.push_instr(Op::Store, 3);
    buf.push(pointer);
    buf.push(object);
}

pub fn put_access_chain(module: &mut Module, result_type: SpvId, base: SpvId, indices: &[SpvId]) -> SpvId {
    let id = module.alloc_id();
    let word_count = (4 + indices.len()) as u16;
    let buf = module.section(Section::Code);
    buf.push_instr(Op::AccessChain, word_count);
    buf.push(result_type);
    buf.push(id);
    buf.push(base);
    for i in indices {
        buf.push(*i);
    }
    id
}

pub fn put_vector_shuffle(
    module: &mut Module,
    result_type: SpvId,
    vec1: SpvId,
    vec2: SpvId,
    components: &[u32],
) -> SpvId {
    let id = module.alloc_id();
    let word_count = (5 + components.len()) as u16;
    let buf = module.section(Section::Code);
    buf.push_instr(Op::VectorShuffle, word_count);
    buf.push(result_type);
    buf.push(id);
    buf.push(vec1);
    buf.push(vec2);
    for c in components {
        buf.push(*c);
    }
    id
}

pub fn put_composite_construct(module: &mut Module, result_type: SpvId, parts: &[SpvId]) -> SpvId {
    let id = module.alloc_id();
    let word_count = (3 + parts.len()) as u16;
    let buf = module.section(Section::Code);
    buf.push_instr(Op::CompositeConstruct, word_count);
    buf.push(result_type);
    buf.push(id);
    for p in parts {
        buf.push(*p);
    }
    id
}

pub fn put_composite_extract(module: &mut Module, result_type: SpvId, composite: SpvId, indices: &[u32]) -> SpvId {
    let id = module.alloc_id();
    let word_count = (4 + indices.len()) as u16;
    let buf = module.section(Section::Code);
    buf.push_instr(Op::CompositeExtract, word_count);
    buf.push(result_type);
    buf.push(id);
    buf.push(composite);
    for i in indices {
        buf.push(*i);
    }
    id
}

/// Generic 2-operand-or-fewer unary/binary ALU op (`OpFAdd`, `OpIAdd`,
/// `OpBitwiseAnd`, ...).
pub fn put_alu(module: &mut Module, op: Op, result_type: SpvId, operands: &[SpvId]) -> SpvId {
    let id = module.alloc_id();
    let word_count = (3 + operands.len()) as u16;
    let buf = module.section(Section::Code);
    buf.push_instr(op, word_count);
    buf.push(result_type);
    buf.push(id);
    for o in operands {
        buf.push(*o);
    }
    id
}

pub fn put_bitcast(module: &mut Module, result_type: SpvId, operand: SpvId) -> SpvId {
    put_alu(module, Op::Bitcast, result_type, &[operand])
}

pub fn put_select(module: &mut Module, result_type: SpvId, condition: SpvId, a: SpvId, b: SpvId) -> SpvId {
    put_alu(module, Op::Select, result_type, &[condition, a, b])
}

pub fn put_glsl_op(module: &mut Module, result_type: SpvId, instr: u32, operands: &[SpvId]) -> SpvId {
    let id = module.alloc_id();
    let word_count = (5 + operands.len()) as u16;
    let glsl_ext_id = module.glsl_ext_id;
    let buf = module.section(Section::Code);
    buf.push_instr(Op::ExtInst, word_count);
    buf.push(result_type);
    buf.push(id);
    buf.push(glsl_ext_id);
    buf.push(instr);
    for o in operands {
        buf.push(*o);
    }
    id
}

pub fn put_sampled_image(module: &mut Module, result_type: SpvId, image: SpvId, sampler: SpvId) -> SpvId {
    put_alu(module, Op::SampledImage, result_type, &[image, sampler])
}

/// Image operand mask bits used by the sampling helpers below. Matches the
/// SPIR-V `ImageOperands` bit layout.
pub mod image_operands {
    pub const NONE: u32 = 0x0;
    pub const BIAS: u32 = 0x1;
    pub const LOD: u32 = 0x2;
    pub const GRAD: u32 = 0x4;
    pub const CONST_OFFSET: u32 = 0x10;
}

#[allow(clippy::too_many_arguments)]
pub fn put_image_sample(
    module: &mut Module,
    explicit: bool,
    dref: bool,
    result_type: SpvId,
    sampled_image: SpvId,
    coordinate: SpvId,
    dref_id: Option<SpvId>,
    operands_mask: u32,
    operand_words: &[SpvId],
) -> SpvId {
    let op = match (explicit, dref) {
        (false, false) => Op::ImageSampleImplicitLod,
        (true, false) => Op::ImageSampleExplicitLod,
        (false, true) => Op::ImageSampleDrefImplicitLod,
        (true, true) => Op::ImageSampleDrefExplicitLod,
    };
    let id = module.alloc_id();
    let mut word_count = 5;
    if dref_id.is_some() {
        word_count += 1;
    }
    if operands_mask != image_operands::NONE {
        word_count += 1 + operand_words.len();
    }
    let buf = module.section(Section::Code);
    buf.push_instr(op, word_count as u16);
    buf.push(result_type);
    buf.push(id);
    buf.push(sampled_image);
    buf.push(coordinate);
    if let Some(d) = dref_id {
        buf.push(d);
    }
    if operands_mask != image_operands::NONE {
        buf.push(operands_mask);
        for w in operand_words {
            buf.push(*w);
        }
    }
    id
}

pub fn put_image_fetch(module: &mut Module, result_type: SpvId, image: SpvId, coordinate: SpvId) -> SpvId {
    put_alu(module, Op::ImageFetch, result_type, &[image, coordinate])
}

pub fn put_label(module: &mut Module) -> SpvId {
    let id = module.alloc_id();
    let buf = module.section(Section::Code);
    buf.push_instr(Op::Label, 2);
    buf.push(id);
    id
}

pub fn put_branch(module: &mut Module, target: SpvId) {
    let buf = module.section(Section::Code);
    buf.push_instr(Op::Branch, 2);
    buf.push(target);
}

pub fn put_branch_conditional(module: &mut Module, condition: SpvId, true_label: SpvId, false_label: SpvId) {
    let buf = module.section(Section::Code);
    buf.push_instr(Op::BranchConditional, 4);
    buf.push(condition);
    buf.push(true_label);
    buf.push(false_label);
}

pub fn put_selection_merge(module: &mut Module, merge_label: SpvId) {
    let buf = module.section(Section::Code);
    buf.push_instr(Op::SelectionMerge, 3);
    buf.push(merge_label);
    buf.push(SelectionControl::empty().bits());
}

pub fn put_loop_merge(module: &mut Module, merge_label: SpvId, continue_label: SpvId) {
    let buf = module.section(Section::Code);
    buf.push_instr(Op::LoopMerge, 4);
    buf.push(merge_label);
    buf.push(continue_label);
    buf.push(0); // LoopControlMask: None
}

pub fn put_return(module: &mut Module) {
    let buf = module.section(Section::Code);
    buf.push_instr(Op::Return, 1);
}

pub fn builtin_decoration(module: &mut Module, target: SpvId, builtin: BuiltIn) {
    put_decoration(module, target, Decoration::BuiltIn, &[builtin as u32]);
}

pub fn enable_capability(module: &mut Module, cap: Capability) {
    module.put_capability(cap);
}
