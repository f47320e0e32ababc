//! AMDIL token stream decoder.
//!
//! Turns a little-endian `u32` token stream into a [`Kernel`]. Unknown
//! opcodes and unhandled addressing modes are logged and skipped rather
//! than treated as fatal: the goal is to decode as much of the stream as
//! possible, matching the AMDIL reference decoder's behavior.
use crate::error::{Error, Result};
use crate::ir::*;
use Opcode::*;

fn get_bits(word: u32, lo: u32, hi: u32) -> u32 {
    let width = hi - lo + 1;
    let mask = if width >= 32 { u32::MAX } else { (1u32 << width) - 1 };
    (word >> lo) & mask
}

fn get_bit(word: u32, bit: u32) -> bool {
    get_bits(word, bit, bit) != 0
}

fn register_type(raw: u32) -> RegisterType {
    match raw {
        0 => RegisterType::Temp,
        1 => RegisterType::Output,
        2 => RegisterType::Input,
        3 => RegisterType::Literal,
        4 => RegisterType::ConstInt,
        5 => RegisterType::ConstBool,
        _ => RegisterType::ConstFloat,
    }
}

fn write_mask(raw: u32) -> WriteMask {
    match raw {
        0 => WriteMask::Write,
        1 => WriteMask::NoWrite,
        2 => WriteMask::Zero,
        _ => WriteMask::One,
    }
}

fn swizzle(raw: u32) -> Swizzle {
    match raw {
        0 => Swizzle::X,
        1 => Swizzle::Y,
        2 => Swizzle::Z,
        3 => Swizzle::W,
        4 => Swizzle::Zero,
        _ => Swizzle::One,
    }
}

fn shift_scale(raw: u32) -> ShiftScale {
    match raw {
        0 => ShiftScale::None,
        1 => ShiftScale::X2,
        2 => ShiftScale::X4,
        3 => ShiftScale::X8,
        4 => ShiftScale::D2,
        5 => ShiftScale::D4,
        6 => ShiftScale::D8,
        _ => ShiftScale::None,
    }
}

const OPCODE_NAMES: &[Opcode] = &[
    Abs, Acos, Add, Asin, Atan, Break, Continue, Div, Dp2, Dp3, Dp4, Dsx, Dsy, Else, End,
    EndIf, EndLoop, Switch, Case, Default, EndSwitch, EndMain, Frc, Mad, Max, Min, Mov, Mul,
    BreakLogicalZ, BreakLogicalNz, IfLogicalZ, IfLogicalNz, While, RetDyn, DclConstBuffer,
    DclIndexedTempArray, DclLiteral, DclOutput, DclInput, DclResource, DiscardLogicalNz,
    Load, ResInfo, Sample, SampleB, SampleG, SampleL, SampleC, SampleCB, SampleCG, SampleCL,
    SampleCLz, Fetch4, Fetch4C, Fetch4Po, Fetch4PoC, INot, IOr, IAdd, IMad, IMul, IEq, IGe,
    ILt, INegate, INe, IShl, UShr, UDiv, UMod, ULt, UGe, Ftoi, Ftou, Itof, Utof, And,
    CmovLogical, Eq, ExpVec, Ge, LogVec, Lt, Ne, RoundNear, RoundNegInf, RoundPlusInf,
    RoundZero, RsqVec, SinVec, CosVec, SqrtVec, DclNumThreadPerGroup, Fence, LdsLoadVec,
    LdsStoreVec, DclUav, DclStructUav, DclRawUav, UavStructLoad, UavRawLoad, UavLoad,
    UavStore, UavStructStore, UavRawStore, UavAdd, UavReadAdd, DclStructSrv, DclRawSrv,
    SrvStructLoad, SrvRawLoad, DclStructLds, UBitExtract, UBitInsert, DclGlobalFlags,
    DclTypedUav,
];

fn opcode_from_raw(raw: u16) -> Opcode {
    match OPCODE_NAMES.get(raw as usize) {
        Some(op) => *op,
        None => Opcode::Unknown(raw),
    }
}

/// Inverse of [`opcode_from_raw`]: the raw opcode index a non-`Unknown`
/// variant decodes from. Used by tests to build token streams; nothing in
/// the decoder itself needs to re-encode an opcode.
#[cfg(test)]
fn raw_from_opcode(opcode: Opcode) -> u16 {
    OPCODE_NAMES
        .iter()
        .position(|&o| o == opcode)
        .expect("opcode has a raw encoding") as u16
}

fn is_uav_or_srv_operation(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::SrvRawLoad
            | Opcode::SrvStructLoad
            | Opcode::UavRawLoad
            | Opcode::UavLoad
            | Opcode::UavStore
            | Opcode::UavRawStore
    )
}

fn resolve_source_count(opcode: Opcode, control: u16, primary_modifier_present: bool) -> usize {
    let info = opcode.info();
    let indexed_args = get_bit(control as u32, 12);
    let is_uav_op = is_uav_or_srv_operation(opcode);
    if info.has_indexed_resource_sampler && indexed_args && !is_uav_op {
        info.src_count as usize + 2
    } else if is_uav_op && indexed_args {
        info.src_count as usize + 1
    } else if opcode == Opcode::DclConstBuffer && !primary_modifier_present {
        info.src_count as usize + 1
    } else {
        info.src_count as usize
    }
}

fn resolve_extra_count(opcode: Opcode, control: u16, primary_modifier: Option<u32>) -> usize {
    let info = opcode.info();
    let primary_modifier_present = get_bit(control as u32, 15);
    if opcode == Opcode::DclConstBuffer && primary_modifier_present {
        info.extra_count as usize + primary_modifier.unwrap_or(0) as usize
    } else if opcode == Opcode::DclNumThreadPerGroup {
        info.extra_count as usize + get_bits(control as u32, 0, 13) as usize
    } else {
        info.extra_count as usize
    }
}

fn decode_destination(tokens: &[u32]) -> Result<(Destination, usize)> {
    let mut idx = 0;
    let word = *tokens
        .get(idx)
        .ok_or(Error::MalformedStream("destination truncated"))?;
    idx += 1;

    let register_num = get_bits(word, 0, 15);
    let reg_type = register_type(get_bits(word, 16, 21));
    let modifier_present = get_bit(word, 22);
    let relative_address = get_bits(word, 23, 24);
    let dimension = get_bit(word, 25);
    let has_immediate = get_bit(word, 26);
    let extended = get_bit(word, 31);

    let mut dst = Destination::identity(reg_type, register_num);

    if modifier_present {
        let w = *tokens
            .get(idx)
            .ok_or(Error::MalformedStream("destination modifier truncated"))?;
        idx += 1;
        dst.component = [
            write_mask(get_bits(w, 0, 1)),
            write_mask(get_bits(w, 2, 3)),
            write_mask(get_bits(w, 4, 5)),
            write_mask(get_bits(w, 6, 7)),
        ];
        dst.clamp = get_bit(w, 8);
        dst.shift_scale = shift_scale(get_bits(w, 9, 12));
    }

    if has_immediate {
        let imm = *tokens
            .get(idx)
            .ok_or(Error::MalformedStream("destination immediate truncated"))?;
        idx += 1;
        dst.immediate = Some(imm);
    }

    if relative_address != 0 {
        log::warn!("decode: unhandled destination addressing mode {}", relative_address);
    }
    if dimension {
        log::warn!("decode: unhandled destination dimension bit");
    }
    if extended {
        log::warn!("decode: unhandled extended destination register addressing");
    }

    Ok((dst, idx))
}

fn decode_source(tokens: &[u32]) -> Result<(Source, usize)> {
    let mut idx = 0;
    let word = *tokens
        .get(idx)
        .ok_or(Error::MalformedStream("source truncated"))?;
    idx += 1;

    let register_num = get_bits(word, 0, 15);
    let reg_type = register_type(get_bits(word, 16, 21));
    let modifier_present = get_bit(word, 22);
    let relative_address = get_bits(word, 23, 24);
    let dimension = get_bit(word, 25);
    let has_immediate = get_bit(word, 26);
    let extended = get_bit(word, 31);

    let mut src = Source::identity(reg_type, register_num);

    if modifier_present {
        let w = *tokens
            .get(idx)
            .ok_or(Error::MalformedStream("source modifier truncated"))?;
        idx += 1;
        src.swizzle = [
            swizzle(get_bits(w, 0, 2)),
            swizzle(get_bits(w, 4, 6)),
            swizzle(get_bits(w, 8, 10)),
            swizzle(get_bits(w, 12, 14)),
        ];
        src.negate = [
            get_bit(w, 3),
            get_bit(w, 7),
            get_bit(w, 11),
            get_bit(w, 15),
        ];
        src.invert = get_bit(w, 16);
        src.bias = get_bit(w, 17);
        src.x2 = get_bit(w, 18);
        src.sign = get_bit(w, 19);
        src.abs = get_bit(w, 20);
        src.div_comp = get_bits(w, 21, 23) != 0;
        src.clamp = get_bit(w, 24);
    }

    match relative_address {
        0 => {}
        1 => log::warn!("decode: unhandled relative addressing"),
        2 => {
            if !dimension {
                let (rel, consumed) = decode_source(&tokens[idx..])?;
                idx += consumed;
                src.relative_src = Some(Box::new(rel));
            }
        }
        _ => return Err(Error::MalformedStream("invalid addressing mode")),
    }

    if has_immediate {
        let imm = *tokens
            .get(idx)
            .ok_or(Error::MalformedStream("source immediate truncated"))?;
        idx += 1;
        src.immediate = Some(imm);
    }

    if dimension {
        log::warn!("decode: unhandled source dimension bit");
    }
    if extended {
        log::warn!("decode: unhandled extended source register addressing");
    }

    Ok((src, idx))
}

fn decode_instruction(tokens: &[u32]) -> Result<(Instruction, usize)> {
    let mut idx = 0;
    let word = *tokens
        .get(idx)
        .ok_or(Error::MalformedStream("instruction truncated"))?;
    idx += 1;

    let opcode = opcode_from_raw(get_bits(word, 0, 15) as u16);
    let control = get_bits(word, 16, 31) as u16;

    if let Opcode::Unknown(raw) = opcode {
        log::warn!("decode: unrecognized opcode 0x{:x}", raw);
        return Ok((
            Instruction {
                opcode,
                control,
                primary_modifier: None,
                secondary_modifier: None,
                resource_format: None,
                address_offset: None,
                dsts: Vec::new(),
                srcs: Vec::new(),
                extras: Vec::new(),
            },
            idx,
        ));
    }

    let info = opcode.info();

    let mut primary_modifier = None;
    if opcode != Opcode::DclResource && get_bit(control as u32, 15) {
        primary_modifier = Some(
            *tokens
                .get(idx)
                .ok_or(Error::MalformedStream("primary modifier truncated"))?,
        );
        idx += 1;
    }

    let mut secondary_modifier = None;
    if get_bit(control as u32, 14) {
        secondary_modifier = Some(
            *tokens
                .get(idx)
                .ok_or(Error::MalformedStream("secondary modifier truncated"))?,
        );
        idx += 1;
    }

    let mut resource_format = None;
    let mut address_offset = None;
    if info.has_indexed_resource_sampler {
        if get_bit(control as u32, 12) {
            resource_format = Some(
                *tokens
                    .get(idx)
                    .ok_or(Error::MalformedStream("resource format truncated"))?,
            );
            idx += 1;
        }
        if get_bit(control as u32, 13) {
            address_offset = Some(
                *tokens
                    .get(idx)
                    .ok_or(Error::MalformedStream("address offset truncated"))?,
            );
            idx += 1;
        }
    }

    let mut dsts = Vec::with_capacity(info.dst_count as usize);
    for _ in 0..info.dst_count {
        let (dst, consumed) = decode_destination(&tokens[idx..])?;
        idx += consumed;
        dsts.push(dst);
    }

    let src_count = resolve_source_count(opcode, control, primary_modifier.is_some());
    let mut srcs = Vec::with_capacity(src_count);
    for _ in 0..src_count {
        let (src, consumed) = decode_source(&tokens[idx..])?;
        idx += consumed;
        srcs.push(src);
    }

    let extra_count = resolve_extra_count(opcode, control, primary_modifier);
    let extras = tokens
        .get(idx..idx + extra_count)
        .ok_or(Error::MalformedStream("extras truncated"))?
        .to_vec();
    idx += extra_count;

    Ok((
        Instruction {
            opcode,
            control,
            primary_modifier,
            secondary_modifier,
            resource_format,
            address_offset,
            dsts,
            srcs,
            extras,
        },
        idx,
    ))
}

fn shader_type(raw: u32) -> Result<ShaderType> {
    Ok(match raw {
        0 => ShaderType::Vertex,
        1 => ShaderType::Pixel,
        2 => ShaderType::Geometry,
        3 => ShaderType::Compute,
        4 => ShaderType::Hull,
        5 => ShaderType::Domain,
        _ => return Err(Error::MalformedStream("unknown shader type")),
    })
}

/// Decodes a little-endian token stream (as produced by reading a byte
/// slice 4 bytes at a time) into a [`Kernel`].
pub fn decode(tokens: &[u32]) -> Result<Kernel> {
    if tokens.len() < 2 {
        return Err(Error::MalformedStream("stream shorter than header"));
    }

    let client_type = get_bits(tokens[0], 0, 7) as u8;
    let minor_version = get_bits(tokens[1], 0, 7) as u16;
    let major_version = get_bits(tokens[1], 8, 15) as u16;
    let shader_type = shader_type(get_bits(tokens[1], 16, 23))?;
    let multipass = get_bit(tokens[1], 24);
    let realtime = get_bit(tokens[1], 25);

    let mut idx = 2;
    let mut instrs = Vec::new();
    while idx < tokens.len() {
        let (instr, consumed) = decode_instruction(&tokens[idx..])?;
        if consumed == 0 {
            return Err(Error::MalformedStream("instruction consumed zero words"));
        }
        idx += consumed;
        instrs.push(instr);
    }

    Ok(Kernel {
        client_type,
        major_version,
        minor_version,
        shader_type,
        multipass,
        realtime,
        instrs,
    })
}

/// Reinterprets a little-endian byte slice as 32-bit tokens and decodes it.
pub fn decode_bytes(bytes: &[u8]) -> Result<Kernel> {
    if bytes.len() % 4 != 0 {
        return Err(Error::MalformedStream("byte length not a multiple of 4"));
    }
    let tokens: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    decode(&tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(shader_type: u32) -> Vec<u32> {
        vec![0, (1 << 8) | (shader_type << 16)]
    }

    #[test]
    fn decodes_empty_vertex_kernel() {
        let tokens = header(0);
        let kernel = decode(&tokens).unwrap();
        assert_eq!(kernel.shader_type, ShaderType::Vertex);
        assert_eq!(kernel.major_version, 1);
        assert!(kernel.instrs.is_empty());
    }

    #[test]
    fn decodes_mov_instruction_with_bare_operands() {
        let mut tokens = header(1);
        // MOV r0, r1 -- no modifiers present on either operand.
        tokens.push(raw_from_opcode(Opcode::Mov) as u32);
        tokens.push(0); // dst: r0, temp
        tokens.push((1 << 16) | 1); // src: r1, temp
        let kernel = decode(&tokens).unwrap();
        assert_eq!(kernel.instrs.len(), 1);
        let instr = &kernel.instrs[0];
        assert_eq!(instr.opcode, Opcode::Mov);
        assert_eq!(instr.dsts.len(), 1);
        assert_eq!(instr.srcs.len(), 1);
        assert_eq!(instr.srcs[0].register_num, 1);
    }

    #[test]
    fn decodes_indexed_sample_with_two_extra_sources() {
        let mut tokens = header(1);
        let control: u32 = 1 << 12;
        tokens.push((raw_from_opcode(Opcode::Sample) as u32) | (control << 16));
        tokens.push(0); // dst
        tokens.push(0); // coordinate src
        tokens.push(0); // resource index src
        tokens.push(0); // sampler index src
        let kernel = decode(&tokens).unwrap();
        assert_eq!(kernel.instrs[0].srcs.len(), 3);
    }

    #[test]
    fn unknown_opcode_is_skipped_without_aborting_stream() {
        let mut tokens = header(1);
        tokens.push(0xFFFF);
        tokens.push(raw_from_opcode(Opcode::Mov) as u32);
        tokens.push(0);
        tokens.push(1 << 16);
        let kernel = decode(&tokens).unwrap();
        assert_eq!(kernel.instrs.len(), 2);
        assert!(matches!(kernel.instrs[0].opcode, Opcode::Unknown(0xFFFF)));
        assert_eq!(kernel.instrs[1].opcode, Opcode::Mov);
    }
}
