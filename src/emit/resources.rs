//! `DCL_RESOURCE` / `DCL_STRUCT_SRV`: shader resource view declarations.
use super::{image_dim, Emitter};
use crate::error::{Error, Result};
use crate::ir::Instruction;
use crate::spirv::module::SpvId;
use crate::spirv::write;
use spirv_headers::{Decoration, ImageFormat, StorageClass};

#[derive(Debug, Clone)]
pub struct Resource {
    pub il_id: u32,
    pub var_id: SpvId,
    pub image_type: SpvId,
    /// The `pixTexType` nibble, needed to size the coordinate vector a
    /// `SAMPLE`/`LOAD` against this resource has to load.
    pub pix_tex_type: u32,
    /// Element stride in bytes, for `DCL_STRUCT_SRV` resources addressed by
    /// byte offset rather than texel coordinate.
    pub stride: Option<u32>,
}

impl<'a> Emitter<'a> {
    pub fn find_resource(&self, il_id: u32) -> Option<&Resource> {
        self.resources.iter().find(|r| r.il_id == il_id)
    }

    /// Synthesizes a resource declaration on the fly for an indexed
    /// `SAMPLE`/`LOAD` whose adjusted id wasn't seen in a `DCL_RESOURCE`.
    /// Decorated with only `DescriptorSet`, matching the reference
    /// compiler, which has no binding slot to hand out for it.
    pub fn emit_placeholder_resource(&mut self, il_id: u32, pix_tex_type: u32) -> Result<Resource> {
        let (dim, arrayed, multisampled) = image_dim(pix_tex_type)?;
        let image_ty = write::put_image_type(
            &mut self.module,
            self.float_ty,
            dim,
            0,
            arrayed,
            multisampled,
            1,
            ImageFormat::Unknown,
        );
        let pointer_ty = write::put_pointer_type(&mut self.module, StorageClass::UniformConstant, image_ty);
        let var_id = write::put_variable(&mut self.module, pointer_ty, StorageClass::UniformConstant);

        write::enable_capability(&mut self.module, spirv_headers::Capability::SampledBuffer);
        let descriptor_set = self.kernel.shader_type as u32;
        write::put_decoration(&mut self.module, var_id, Decoration::DescriptorSet, &[descriptor_set]);

        let resource = Resource {
            il_id,
            var_id,
            image_type: image_ty,
            pix_tex_type,
            stride: None,
        };
        self.resources.push(resource.clone());
        Ok(resource)
    }
}

/// Picks a component format the same way the reference compiler's
/// `getSpvImageFormat` does: scans the 4-element per-component format
/// spec left to right and returns the format keyed by the position of the
/// first component that differs from its predecessor, defaulting to the
/// 4-channel format when all four agree.
fn pick_format(components: [u32; 4], formats: [ImageFormat; 4]) -> ImageFormat {
    for i in 1..4 {
        if components[i] != components[i - 1] {
            return formats[i - 1];
        }
    }
    formats[3]
}

fn resolve_format(element_format: u32, components: [u32; 4]) -> ImageFormat {
    use ImageFormat::*;
    match element_format {
        0 => Unknown,
        1 => pick_format(components, [R32f, Rg32f, Unknown, Rgba32f]),
        2 => pick_format(components, [R8Snorm, Rg8Snorm, Unknown, Rgba8Snorm]),
        3 => pick_format(components, [R8, Rg8, Unknown, Rgba8]),
        4 => pick_format(components, [R32ui, Rg32ui, Unknown, Rgba32ui]),
        5 => pick_format(components, [R32i, Rg32i, Unknown, Rgba32i]),
        other => {
            log::warn!("emit: unsupported resource element format {}", other);
            Unknown
        }
    }
}

/// `DCL_RESOURCE`: `id` in control bits 0-7, `pixTexType` in bits 8-11. The
/// single extra word packs the per-component element format as four
/// 3-bit fields (x, y, z, w from low to high).
pub fn emit_resource(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let extra = *instr
        .extras
        .first()
        .ok_or(Error::MalformedStream("DCL_RESOURCE missing extra word"))?;
    let il_id = (instr.control & 0xFF) as u32;
    let pix_tex_type = ((instr.control >> 8) & 0xF) as u32;
    let (dim, arrayed, multisampled) = image_dim(pix_tex_type)?;

    let components = [
        (extra >> 20) & 0x7,
        (extra >> 23) & 0x7,
        (extra >> 26) & 0x7,
        (extra >> 29) & 0x7,
    ];
    let format = resolve_format(components[0], components);

    let image_ty = write::put_image_type(&mut emitter.module, emitter.float_ty, dim, 0, arrayed, multisampled, 1, format);
    let pointer_ty = write::put_pointer_type(&mut emitter.module, StorageClass::UniformConstant, image_ty);
    let var_id = write::put_variable(&mut emitter.module, pointer_ty, StorageClass::UniformConstant);

    write::enable_capability(&mut emitter.module, spirv_headers::Capability::SampledBuffer);
    let descriptor_set = emitter.kernel.shader_type as u32;
    write::put_decoration(&mut emitter.module, var_id, Decoration::DescriptorSet, &[descriptor_set]);
    write::put_decoration(&mut emitter.module, var_id, Decoration::Binding, &[il_id]);

    emitter.resources.push(Resource {
        il_id,
        var_id,
        image_type: image_ty,
        pix_tex_type,
        stride: None,
    });
    Ok(())
}

/// `DCL_STRUCT_SRV`: `id` in control bits 0-13; the single extra word is
/// the element stride in bytes.
pub fn emit_structured_srv(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let stride = *instr
        .extras
        .first()
        .ok_or(Error::MalformedStream("DCL_STRUCT_SRV missing stride word"))?;
    let il_id = (instr.control & 0x3FFF) as u32;

    let int_ty = emitter.int_ty;
    let image_ty = write::put_image_type(
        &mut emitter.module,
        int_ty,
        spirv_headers::Dim::DimBuffer,
        0,
        false,
        false,
        1,
        ImageFormat::R32i,
    );
    let pointer_ty = write::put_pointer_type(&mut emitter.module, StorageClass::UniformConstant, image_ty);
    let var_id = write::put_variable(&mut emitter.module, pointer_ty, StorageClass::UniformConstant);

    write::enable_capability(&mut emitter.module, spirv_headers::Capability::SampledBuffer);
    let descriptor_set = emitter.kernel.shader_type as u32;
    write::put_decoration(&mut emitter.module, var_id, Decoration::DescriptorSet, &[descriptor_set]);
    write::put_decoration(&mut emitter.module, var_id, Decoration::Binding, &[il_id]);

    emitter.resources.push(Resource {
        il_id,
        var_id,
        image_type: image_ty,
        pix_tex_type: 5, // PIXTEX_BUFFER
        stride: Some(stride),
    });
    Ok(())
}
