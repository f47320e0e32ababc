//! Arithmetic, comparison and bitwise opcode lowering. Each handler loads
//! its sources through [`Emitter::load_source`], performs the per-opcode
//! operation on `float4`/`int4` values, and stores through
//! [`Emitter::store_destination`].
use super::Emitter;
use crate::error::{Error, Result};
use crate::ir::{Instruction, Opcode};
use crate::spirv::module::SpvId;
use crate::spirv::write;
use spirv_headers::Op;

const GLSL_ROUND_EVEN: u32 = 2;
const GLSL_TRUNC: u32 = 3;
const GLSL_FLOOR: u32 = 8;
const GLSL_CEIL: u32 = 9;
const GLSL_FRACT: u32 = 10;
const GLSL_SIN: u32 = 13;
const GLSL_COS: u32 = 14;
const GLSL_ASIN: u32 = 16;
const GLSL_ACOS: u32 = 17;
const GLSL_ATAN: u32 = 18;
const GLSL_EXP: u32 = 27;
const GLSL_LOG: u32 = 28;
const GLSL_SQRT: u32 = 31;
const GLSL_INVERSE_SQRT: u32 = 32;
const GLSL_NMIN: u32 = 79;
const GLSL_NMAX: u32 = 80;

fn dst(instr: &Instruction) -> Result<&crate::ir::Destination> {
    instr.dsts.first().ok_or(Error::MalformedStream("instruction missing destination"))
}

fn src(instr: &Instruction, i: usize) -> Result<&crate::ir::Source> {
    instr.srcs.get(i).ok_or(Error::MalformedStream("instruction missing source"))
}

/// Broadcasts a scalar (lane 0 of `value`) to all four lanes.
fn broadcast(emitter: &mut Emitter, value: SpvId, vector_ty: SpvId) -> SpvId {
    write::put_composite_construct(&mut emitter.module, vector_ty, &[value, value, value, value])
}

/// `ABS`, `ADD`, `MUL`, `MAD`, `MIN`, `MAX`, `DIV`, `FRC`, `MOV`, `DPn`,
/// trig/transcendental unary ops, rounding modes, and the float<->int bit
/// reinterpretation pair `FTOI`/`ITOF`.
pub fn emit_float_arith(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let float4_ty = emitter.float4_ty;
    let float_ty = emitter.float_ty;
    let destination = dst(instr)?.clone();

    let result = match instr.opcode {
        Opcode::Mov => {
            let s0 = src(instr, 0)?.clone();
            emitter.load_source(&s0, float_ty)?
        }
        Opcode::Abs => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, super::loadstore::GLSL_FABS, &[v])
        }
        Opcode::Add => {
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let a = emitter.load_source(&s0, float_ty)?;
            let b = emitter.load_source(&s1, float_ty)?;
            write::put_alu(&mut emitter.module, Op::FAdd, float4_ty, &[a, b])
        }
        Opcode::Mul => {
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let a = emitter.load_source(&s0, float_ty)?;
            let b = emitter.load_source(&s1, float_ty)?;
            write::put_alu(&mut emitter.module, Op::FMul, float4_ty, &[a, b])
        }
        Opcode::Div => {
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let a = emitter.load_source(&s0, float_ty)?;
            let b = emitter.load_source(&s1, float_ty)?;
            write::put_alu(&mut emitter.module, Op::FDiv, float4_ty, &[a, b])
        }
        Opcode::Mad => {
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let s2 = src(instr, 2)?.clone();
            let a = emitter.load_source(&s0, float_ty)?;
            let b = emitter.load_source(&s1, float_ty)?;
            let c = emitter.load_source(&s2, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, 50, &[a, b, c])
        }
        Opcode::Min => {
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let a = emitter.load_source(&s0, float_ty)?;
            let b = emitter.load_source(&s1, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_NMIN, &[a, b])
        }
        Opcode::Max => {
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let a = emitter.load_source(&s0, float_ty)?;
            let b = emitter.load_source(&s1, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_NMAX, &[a, b])
        }
        Opcode::Frc => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_FRACT, &[v])
        }
        Opcode::RoundNegInf => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_FLOOR, &[v])
        }
        Opcode::RoundPlusInf => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_CEIL, &[v])
        }
        Opcode::RoundNear => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_ROUND_EVEN, &[v])
        }
        Opcode::RoundZero => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_TRUNC, &[v])
        }
        Opcode::ExpVec => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_EXP, &[v])
        }
        Opcode::LogVec => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_LOG, &[v])
        }
        Opcode::RsqVec => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_INVERSE_SQRT, &[v])
        }
        Opcode::SqrtVec => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_SQRT, &[v])
        }
        Opcode::SinVec => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_SIN, &[v])
        }
        Opcode::CosVec => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            write::put_glsl_op(&mut emitter.module, float4_ty, GLSL_COS, &[v])
        }
        Opcode::Dp2 | Opcode::Dp3 | Opcode::Dp4 => {
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let a = emitter.load_source(&s0, float_ty)?;
            let b = emitter.load_source(&s1, float_ty)?;
            let n = match instr.opcode {
                Opcode::Dp2 => 2,
                Opcode::Dp3 => 3,
                _ => 4,
            };
            let vn = write::put_vector_type(&mut emitter.module, float_ty, n);
            let components: Vec<u32> = (0..n).collect();
            let ta = write::put_vector_shuffle(&mut emitter.module, vn, a, a, &components);
            let tb = write::put_vector_shuffle(&mut emitter.module, vn, b, b, &components);
            let scalar = write::put_alu(&mut emitter.module, Op::Dot, float_ty, &[ta, tb]);
            broadcast(emitter, scalar, float4_ty)
        }
        Opcode::Acos | Opcode::Asin | Opcode::Atan => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            let lane = write::put_composite_extract(&mut emitter.module, float_ty, v, &[3]);
            let glsl_op = match instr.opcode {
                Opcode::Acos => GLSL_ACOS,
                Opcode::Asin => GLSL_ASIN,
                _ => GLSL_ATAN,
            };
            let scalar = write::put_glsl_op(&mut emitter.module, float_ty, glsl_op, &[lane]);
            broadcast(emitter, scalar, float4_ty)
        }
        Opcode::Ftoi => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, float_ty)?;
            let int4_ty = emitter.int4_ty;
            write::put_alu(&mut emitter.module, Op::ConvertFToS, int4_ty, &[v])
        }
        Opcode::Itof => {
            let int_ty = emitter.int_ty;
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, int_ty)?;
            write::put_alu(&mut emitter.module, Op::ConvertSToF, float4_ty, &[v])
        }
        other => {
            log::warn!("emit: unhandled float-arith opcode {:?}", other);
            let s0 = src(instr, 0)?.clone();
            emitter.load_source(&s0, float_ty)?
        }
    };

    let store_ty = if instr.opcode == Opcode::Ftoi { emitter.int_ty } else { float_ty };
    emitter.store_destination(&destination, result, store_ty)
}

/// `ALL_ONES`/`ZERO` float4 constants used by comparisons to produce the
/// AMDIL boolean-as-bitmask convention: each lane is `0xFFFFFFFF` if the
/// condition holds there, `0x00000000` otherwise.
fn bool_mask_constants(emitter: &mut Emitter) -> (SpvId, SpvId) {
    let float_ty = emitter.float_ty;
    let float4_ty = emitter.float4_ty;
    let all_ones_scalar = write::put_constant(&mut emitter.module, float_ty, 0xFFFF_FFFF);
    let zero_scalar = write::put_constant(&mut emitter.module, float_ty, 0);
    let all_ones = write::put_constant_composite(&mut emitter.module, float4_ty, &[all_ones_scalar; 4]);
    let zero = write::put_constant_composite(&mut emitter.module, float4_ty, &[zero_scalar; 4]);
    (all_ones, zero)
}

/// `EQ`, `NE`, `GE`, `LT`: ordered float comparison selecting between an
/// all-ones and all-zero mask.
pub fn emit_float_comparison(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let float_ty = emitter.float_ty;
    let bool4_ty = emitter.bool4_ty;
    let float4_ty = emitter.float4_ty;
    let destination = dst(instr)?.clone();
    let s0 = src(instr, 0)?.clone();
    let s1 = src(instr, 1)?.clone();
    let a = emitter.load_source(&s0, float_ty)?;
    let b = emitter.load_source(&s1, float_ty)?;

    let op = match instr.opcode {
        Opcode::Eq => Op::FOrdEqual,
        Opcode::Ne => Op::FOrdNotEqual,
        Opcode::Ge => Op::FOrdGreaterThanEqual,
        Opcode::Lt => Op::FOrdLessThan,
        _ => unreachable!("dispatched only for float comparisons"),
    };
    let cond = write::put_alu(&mut emitter.module, op, bool4_ty, &[a, b]);
    let (all_ones, zero) = bool_mask_constants(emitter);
    let result = write::put_select(&mut emitter.module, float4_ty, cond, all_ones, zero);
    emitter.store_destination(&destination, result, float_ty)
}

/// `I_EQ`, `I_GE`, `I_LT`: signed integer comparison, same mask convention.
pub fn emit_integer_comparison(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let int_ty = emitter.int_ty;
    let bool4_ty = emitter.bool4_ty;
    let float4_ty = emitter.float4_ty;
    let destination = dst(instr)?.clone();
    let s0 = src(instr, 0)?.clone();
    let s1 = src(instr, 1)?.clone();
    let a = emitter.load_source(&s0, int_ty)?;
    let b = emitter.load_source(&s1, int_ty)?;

    let op = match instr.opcode {
        Opcode::IEq => Op::IEqual,
        Opcode::IGe => Op::SGreaterThanEqual,
        Opcode::ILt => Op::SLessThan,
        _ => unreachable!("dispatched only for integer comparisons"),
    };
    let cond = write::put_alu(&mut emitter.module, op, bool4_ty, &[a, b]);
    let (all_ones, zero) = bool_mask_constants(emitter);
    let result = write::put_select(&mut emitter.module, float4_ty, cond, all_ones, zero);
    emitter.store_destination(&destination, result, int_ty)
}

/// `I_NOT`, `I_OR`, `I_ADD`, `AND`, `U_BIT_EXTRACT`: bitwise/integer ops
/// that operate directly on the bit pattern (no float reinterpretation).
pub fn emit_integer_op(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let int_ty = emitter.int_ty;
    let int4_ty = emitter.int4_ty;
    let destination = dst(instr)?.clone();

    let result = match instr.opcode {
        Opcode::INot => {
            let s0 = src(instr, 0)?.clone();
            let v = emitter.load_source(&s0, int_ty)?;
            write::put_alu(&mut emitter.module, Op::Not, int4_ty, &[v])
        }
        Opcode::IOr => {
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let a = emitter.load_source(&s0, int_ty)?;
            let b = emitter.load_source(&s1, int_ty)?;
            write::put_alu(&mut emitter.module, Op::BitwiseOr, int4_ty, &[a, b])
        }
        Opcode::IAdd => {
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let a = emitter.load_source(&s0, int_ty)?;
            let b = emitter.load_source(&s1, int_ty)?;
            write::put_alu(&mut emitter.module, Op::IAdd, int4_ty, &[a, b])
        }
        Opcode::And => {
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let a = emitter.load_source(&s0, int_ty)?;
            let b = emitter.load_source(&s1, int_ty)?;
            write::put_alu(&mut emitter.module, Op::BitwiseAnd, int4_ty, &[a, b])
        }
        Opcode::UBitExtract => {
            let uint_ty = emitter.uint_ty;
            let s0 = src(instr, 0)?.clone();
            let s1 = src(instr, 1)?.clone();
            let s2 = src(instr, 2)?.clone();
            let width = emitter.load_source(&s0, uint_ty)?;
            let offset = emitter.load_source(&s1, uint_ty)?;
            let base = emitter.load_source(&s2, uint_ty)?;
            let uint4_ty = write::put_vector_type(&mut emitter.module, uint_ty, 4);
            write::put_alu(&mut emitter.module, Op::BitFieldUExtract, uint4_ty, &[base, offset, width])
        }
        other => {
            log::warn!("emit: unhandled integer opcode {:?}", other);
            let s0 = src(instr, 0)?.clone();
            emitter.load_source(&s0, int_ty)?
        }
    };

    emitter.store_destination(&destination, result, int_ty)
}

/// `CMOV_LOGICAL dst, cond, a, b`: per-lane select keyed on whether `cond`'s
/// bit pattern is non-zero.
pub fn emit_cmov_logical(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let int_ty = emitter.int_ty;
    let float_ty = emitter.float_ty;
    let bool4_ty = emitter.bool4_ty;
    let float4_ty = emitter.float4_ty;
    let destination = dst(instr)?.clone();

    let c0 = src(instr, 0)?.clone();
    let c1 = src(instr, 1)?.clone();
    let c2 = src(instr, 2)?.clone();
    let cond_bits = emitter.load_source(&c0, int_ty)?;
    let a = emitter.load_source(&c1, float_ty)?;
    let b = emitter.load_source(&c2, float_ty)?;

    let zero = write::put_constant(&mut emitter.module, int_ty, 0);
    let int4_ty = emitter.int4_ty;
    let zero4 = write::put_constant_composite(&mut emitter.module, int4_ty, &[zero; 4]);
    let cond = write::put_alu(&mut emitter.module, Op::INotEqual, bool4_ty, &[cond_bits, zero4]);
    let result = write::put_select(&mut emitter.module, float4_ty, cond, a, b);
    emitter.store_destination(&destination, result, float_ty)
}
