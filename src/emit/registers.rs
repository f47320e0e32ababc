//! Register table: `(il_type, il_num) -> spv variable` bookkeeping, plus
//! autovivification of undeclared temporaries.
use super::Emitter;
use crate::error::{Error, Result};
use crate::ir::RegisterType;
use crate::spirv::module::SpvId;
use crate::spirv::write;
use spirv_headers::StorageClass;

#[derive(Debug, Clone)]
pub struct Register {
    pub id: SpvId,
    pub type_id: SpvId,
    pub il_type: RegisterType,
    pub il_num: u32,
    /// Recorded for `DCL_LITERAL` registers so indexed resource/sampler
    /// sources can be statically resolved against a constant register.
    pub literal_values: Option<[u32; 4]>,
}

impl<'a> Emitter<'a> {
    pub fn find_register(&self, il_type: RegisterType, il_num: u32) -> Option<&Register> {
        self.regs
            .iter()
            .find(|r| r.il_type == il_type && r.il_num == il_num)
    }

    /// Declares a 4-component variable of `component_type` in the given
    /// storage class and returns `(variable_id, vector_type_id)`.
    pub fn declare_vector_variable(
        &mut self,
        count: u32,
        component_type: SpvId,
        storage_class: StorageClass,
    ) -> (SpvId, SpvId) {
        let vector_ty = write::put_vector_type(&mut self.module, component_type, count);
        let pointer_ty = write::put_pointer_type(&mut self.module, storage_class, vector_ty);
        let id = write::put_variable(&mut self.module, pointer_ty, storage_class);
        (id, vector_ty)
    }

    /// Materializes a `float4` vector whose first `one_count` trailing
    /// lanes are `1.0` and the rest `0.0` — used to build the zero/one
    /// source of destination component forcing.
    pub fn zero_one_vector(&mut self, component_type: SpvId) -> SpvId {
        let zero = write::put_constant(&mut self.module, component_type, 0);
        let one = write::put_constant(&mut self.module, component_type, 0x3F80_0000);
        let ty = write::put_vector_type(&mut self.module, component_type, 4);
        write::put_constant_composite(&mut self.module, ty, &[zero, zero, one, one])
    }

    /// Finds the register for a temp, autocreating a `float4` Private
    /// variable if this is the first time it's written.
    pub fn find_or_create_temp(&mut self, il_num: u32) -> SpvId {
        if let Some(reg) = self.find_register(RegisterType::Temp, il_num) {
            return reg.id;
        }
        let float_ty = self.float_ty;
        let (id, ty) = self.declare_vector_variable(4, float_ty, StorageClass::Private);
        self.regs.push(Register {
            id,
            type_id: ty,
            il_type: RegisterType::Temp,
            il_num,
            literal_values: None,
        });
        id
    }

    pub fn register_or_error(&self, il_type: RegisterType, il_num: u32) -> Result<&Register> {
        self.find_register(il_type, il_num)
            .ok_or(Error::MalformedStream("reference to undeclared register"))
    }
}
