//! Human-readable AMDIL listing. A pure read-only traversal of a decoded
//! [`Kernel`]: one line per instruction, operands rendered in the
//! idiomatic AMDIL source syntax (register prefix + number, swizzle
//! suffix, sign/abs decoration, write mask, `_sat` clamp suffix).
use crate::error::Result;
use crate::ir::{Destination, Instruction, Kernel, Opcode, RegisterType, Source, Swizzle, WriteMask};
use std::io::{self, Write};

fn opcode_name(opcode: Opcode) -> String {
    use Opcode::*;
    match opcode {
        Abs => "abs".into(),
        Acos => "acos".into(),
        Add => "add".into(),
        Asin => "asin".into(),
        Atan => "atan".into(),
        Break => "break".into(),
        Continue => "continue".into(),
        Div => "div".into(),
        Dp2 => "dp2".into(),
        Dp3 => "dp3".into(),
        Dp4 => "dp4".into(),
        Dsx => "dsx".into(),
        Dsy => "dsy".into(),
        Else => "else".into(),
        End => "end".into(),
        EndIf => "endif".into(),
        EndLoop => "endloop".into(),
        Switch => "switch".into(),
        Case => "case".into(),
        Default => "default".into(),
        EndSwitch => "endswitch".into(),
        EndMain => "endmain".into(),
        Frc => "frc".into(),
        Mad => "mad".into(),
        Max => "max".into(),
        Min => "min".into(),
        Mov => "mov".into(),
        Mul => "mul".into(),
        BreakLogicalZ => "break_logicalz".into(),
        BreakLogicalNz => "break_logicalnz".into(),
        IfLogicalZ => "if_logicalz".into(),
        IfLogicalNz => "if_logicalnz".into(),
        While => "whileloop".into(),
        RetDyn => "ret_dyn".into(),
        DclConstBuffer => "dcl_const_buffer".into(),
        DclIndexedTempArray => "dcl_indexed_temp_array".into(),
        DclLiteral => "dcl_literal".into(),
        DclOutput => "dcl_output".into(),
        DclInput => "dcl_input".into(),
        DclResource => "dcl_resource".into(),
        DiscardLogicalNz => "discard_logicalnz".into(),
        Load => "load".into(),
        ResInfo => "resinfo".into(),
        Sample => "sample".into(),
        SampleB => "sample_b".into(),
        SampleG => "sample_g".into(),
        SampleL => "sample_l".into(),
        SampleC => "sample_c".into(),
        SampleCB => "sample_c_b".into(),
        SampleCG => "sample_c_g".into(),
        SampleCL => "sample_c_l".into(),
        SampleCLz => "sample_c_lz".into(),
        Fetch4 => "fetch4".into(),
        Fetch4C => "fetch4_c".into(),
        Fetch4Po => "fetch4_po".into(),
        Fetch4PoC => "fetch4_po_c".into(),
        INot => "inot".into(),
        IOr => "ior".into(),
        IAdd => "iadd".into(),
        IMad => "imad".into(),
        IMul => "imul".into(),
        IEq => "ieq".into(),
        IGe => "ige".into(),
        ILt => "ilt".into(),
        INegate => "inegate".into(),
        INe => "ine".into(),
        IShl => "ishl".into(),
        UShr => "ushr".into(),
        UDiv => "udiv".into(),
        UMod => "umod".into(),
        ULt => "ult".into(),
        UGe => "uge".into(),
        Ftoi => "ftoi".into(),
        Ftou => "ftou".into(),
        Itof => "itof".into(),
        Utof => "utof".into(),
        And => "and".into(),
        CmovLogical => "cmov_logical".into(),
        Eq => "eq".into(),
        ExpVec => "exp_vec".into(),
        Ge => "ge".into(),
        LogVec => "log_vec".into(),
        Lt => "lt".into(),
        Ne => "ne".into(),
        RoundNear => "round_near".into(),
        RoundNegInf => "round_neg_inf".into(),
        RoundPlusInf => "round_plus_inf".into(),
        RoundZero => "round_zero".into(),
        RsqVec => "rsq_vec".into(),
        SinVec => "sin_vec".into(),
        CosVec => "cos_vec".into(),
        SqrtVec => "sqrt_vec".into(),
        DclNumThreadPerGroup => "dcl_num_thread_per_group".into(),
        Fence => "fence".into(),
        LdsLoadVec => "lds_load_vec".into(),
        LdsStoreVec => "lds_store_vec".into(),
        DclUav => "dcl_uav".into(),
        DclStructUav => "dcl_struct_uav".into(),
        DclRawUav => "dcl_raw_uav".into(),
        UavStructLoad => "uav_struct_load".into(),
        UavRawLoad => "uav_raw_load".into(),
        UavLoad => "uav_load".into(),
        UavStore => "uav_store".into(),
        UavStructStore => "uav_struct_store".into(),
        UavRawStore => "uav_raw_store".into(),
        UavAdd => "uav_add".into(),
        UavReadAdd => "uav_read_add".into(),
        DclStructSrv => "dcl_struct_srv".into(),
        DclRawSrv => "dcl_raw_srv".into(),
        SrvStructLoad => "srv_struct_load".into(),
        SrvRawLoad => "srv_raw_load".into(),
        DclStructLds => "dcl_struct_lds".into(),
        UBitExtract => "ubit_extract".into(),
        UBitInsert => "ubit_insert".into(),
        DclGlobalFlags => "dcl_global_flags".into(),
        DclTypedUav => "dcl_typed_uav".into(),
        Unknown(raw) => format!("unknown_0x{:x}", raw),
    }
}

fn register_prefix(ty: RegisterType) -> &'static str {
    match ty {
        RegisterType::Temp => "r",
        RegisterType::Output => "o",
        RegisterType::Input => "v",
        RegisterType::Literal => "l",
        RegisterType::ConstInt => "i",
        RegisterType::ConstBool => "b",
        RegisterType::ConstFloat => "c",
    }
}

fn swizzle_char(s: Swizzle) -> char {
    match s {
        Swizzle::X => 'x',
        Swizzle::Y => 'y',
        Swizzle::Z => 'z',
        Swizzle::W => 'w',
        Swizzle::Zero => '0',
        Swizzle::One => '1',
    }
}

fn write_mask_char(component: usize, m: WriteMask) -> char {
    match m {
        WriteMask::Write => [b'x', b'y', b'z', b'w'][component] as char,
        WriteMask::NoWrite => '_',
        WriteMask::Zero => '0',
        WriteMask::One => '1',
    }
}

fn render_source(src: &Source) -> String {
    let mut body = format!("{}{}", register_prefix(src.register_type), src.register_num);
    let identity = matches!(src.swizzle, [Swizzle::X, Swizzle::Y, Swizzle::Z, Swizzle::W]);
    if !identity {
        body.push('.');
        for s in src.swizzle {
            body.push(swizzle_char(s));
        }
    }
    if src.negate.iter().any(|n| *n) {
        if src.negate == [true; 4] {
            body = format!("-{}", body);
        } else {
            let signs: String = src.negate.iter().map(|n| if *n { '-' } else { '+' }).collect();
            body = format!("{}({})", body, signs);
        }
    }
    if src.abs {
        body = format!("|{}|", body);
    }
    if let Some(rel) = &src.relative_src {
        body = format!("{}[{}]", body, render_source(rel));
    }
    body
}

fn render_destination(dst: &Destination) -> String {
    let mut body = format!("{}{}", register_prefix(dst.register_type), dst.register_num);
    if dst.component.iter().any(|c| *c != WriteMask::Write) {
        body.push('.');
        for (i, c) in dst.component.iter().enumerate() {
            body.push(write_mask_char(i, *c));
        }
    }
    if dst.clamp {
        body = format!("{}_sat", body);
    }
    body
}

fn render_instruction(instr: &Instruction) -> String {
    let mut parts: Vec<String> = instr.dsts.iter().map(render_destination).collect();
    parts.extend(instr.srcs.iter().map(render_source));

    let mut line = opcode_name(instr.opcode);
    if !parts.is_empty() {
        line.push(' ');
        line.push_str(&parts.join(", "));
    }
    if !instr.extras.is_empty() {
        let extras: Vec<String> = instr.extras.iter().map(|e| format!("0x{:x}", e)).collect();
        line.push_str(&format!(" ; extras: {}", extras.join(", ")));
    }
    line
}

/// Writes one line per instruction in `kernel` to `sink`.
pub fn disassemble(kernel: &Kernel, sink: &mut dyn Write) -> Result<()> {
    writeln!(sink, "; shader_type {:?}", kernel.shader_type).map_err(io_err)?;
    for instr in &kernel.instrs {
        writeln!(sink, "{}", render_instruction(instr)).map_err(io_err)?;
    }
    Ok(())
}

fn io_err(_: io::Error) -> crate::error::Error {
    crate::error::Error::MalformedStream("failed writing disassembly to sink")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Destination, RegisterType, Source};

    #[test]
    fn renders_mov_with_swizzle_and_clamp() {
        let mut dst = Destination::identity(RegisterType::Temp, 0);
        dst.clamp = true;
        let mut src = Source::identity(RegisterType::Temp, 1);
        src.swizzle = [Swizzle::X, Swizzle::X, Swizzle::X, Swizzle::X];
        let instr = Instruction {
            opcode: Opcode::Mov,
            control: 0,
            primary_modifier: None,
            secondary_modifier: None,
            resource_format: None,
            address_offset: None,
            dsts: vec![dst],
            srcs: vec![src],
            extras: Vec::new(),
        };
        assert_eq!(render_instruction(&instr), "mov r0_sat, r1.xxxx");
    }

    #[test]
    fn renders_negated_abs_source() {
        let mut src = Source::identity(RegisterType::Temp, 2);
        src.negate = [true; 4];
        src.abs = true;
        let instr = Instruction {
            opcode: Opcode::Abs,
            control: 0,
            primary_modifier: None,
            secondary_modifier: None,
            resource_format: None,
            address_offset: None,
            dsts: vec![Destination::identity(RegisterType::Temp, 0)],
            srcs: vec![src],
            extras: Vec::new(),
        };
        assert_eq!(render_instruction(&instr), "abs r0, |-r2|");
    }
}
