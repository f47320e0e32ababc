//! The descriptor-set mapping supplied by the driver. The emitter only
//! reads the stage tag to pick the SPIR-V execution model and descriptor
//! set index; the recursive slot structure is accepted but the emitter
//! resolves resource bindings directly from the AMDIL resource id (see
//! `emit::resources`), matching the convention documented in the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotObjectType {
    Unused,
    ShaderResource,
    ShaderUav,
    ShaderSampler,
    NextDescriptorSet,
}

#[derive(Debug, Clone)]
pub struct DescriptorSlot {
    pub object_type: SlotObjectType,
    pub next_level: Option<Box<DescriptorSetMapping>>,
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorSetMapping {
    pub slots: Vec<DescriptorSlot>,
}

impl DescriptorSetMapping {
    pub fn empty() -> Self {
        DescriptorSetMapping { slots: Vec::new() }
    }
}
