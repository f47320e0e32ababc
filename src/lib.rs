//! AMDIL to SPIR-V shader cross-compiler.
//!
//! [`compile`] turns a decoded AMDIL token stream into a SPIR-V module;
//! [`disassemble`] renders the same stream as human-readable assembly.
mod decode;
mod disasm;
mod emit;
mod error;
mod ir;
mod mapping;
mod spirv;

use std::io::Write;

pub use error::{Error, Result};
pub use ir::{Kernel, Opcode, ShaderType};
pub use mapping::{DescriptorSetMapping, DescriptorSlot, SlotObjectType};

/// Compiles an AMDIL blob (little-endian 32-bit tokens) into a SPIR-V
/// word sequence, binding resources and samplers per `mapping`.
pub fn compile(mapping: DescriptorSetMapping, code: &[u8]) -> Result<Vec<u32>> {
    let kernel = decode::decode_bytes(code)?;
    emit::compile_kernel(&kernel, &mapping)
}

/// Decodes an AMDIL blob and writes a human-readable listing to `sink`.
pub fn disassemble(code: &[u8], sink: &mut dyn Write) -> Result<()> {
    let kernel = decode::decode_bytes(code)?;
    disasm::disassemble(&kernel, sink)
}
