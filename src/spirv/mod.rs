//! SPIR-V module construction: section buffers, id allocation, type and
//! constant interning ([`module`]), and the instruction writers built on
//! top of them ([`write`]).
pub mod module;
pub mod write;

pub use module::{Module, SpvId};
