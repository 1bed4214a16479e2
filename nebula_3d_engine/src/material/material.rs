/// Material - ref-counted surface description
///
/// Built from a loader-produced `MaterialDescription`. Texture and sampler
/// heap slots are baked into the per-material constants at creation so
/// shaders resolve every texture read through bindless indices. The blend
/// policy is deterministic: an opacity texture alone selects alpha testing;
/// blending is selected only when the imported blend state asks for it.
/// Both are encoded in the technique descriptor at creation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use glam::Vec4;

use crate::ecs::phase;
use crate::resources::PixelBuffer;
use crate::rhi::{BlendMode, INVALID_SLOT};
use crate::shader_buffers::PerMaterialCB;
use super::flags::{MaterialFlags, PsoFlags};
use super::technique::{CompileFlags, TechniqueDescriptor, TechniquePhase};

/// A texture reference with its scalar fallback factor and the channels the
/// shader should read from it
#[derive(Clone, Default)]
pub struct TextureAndConstant {
    pub texture: Option<Arc<PixelBuffer>>,
    pub factor: f32,
    pub channels: Vec<u8>,
}

/// Material payload produced by external asset loaders
#[derive(Clone)]
pub struct MaterialDescription {
    pub name: String,
    pub diffuse_color: Vec4,
    pub emissive_color: Vec4,
    pub alpha_cutoff: f32,
    pub blend_state: BlendMode,
    pub base_color: TextureAndConstant,
    pub metallic: TextureAndConstant,
    pub roughness: TextureAndConstant,
    pub emissive: TextureAndConstant,
    pub opacity: TextureAndConstant,
    pub ao: TextureAndConstant,
    pub height_map: TextureAndConstant,
    pub normal: TextureAndConstant,
}

impl Default for MaterialDescription {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            diffuse_color: Vec4::ONE,
            emissive_color: Vec4::ZERO,
            alpha_cutoff: 0.5,
            blend_state: BlendMode::Opaque,
            base_color: TextureAndConstant::default(),
            metallic: TextureAndConstant { factor: 1.0, ..Default::default() },
            roughness: TextureAndConstant { factor: 1.0, ..Default::default() },
            emissive: TextureAndConstant::default(),
            opacity: TextureAndConstant::default(),
            ao: TextureAndConstant::default(),
            height_map: TextureAndConstant::default(),
            normal: TextureAndConstant::default(),
        }
    }
}

pub struct Material {
    name: String,
    flags: MaterialFlags,
    pso_flags: PsoFlags,
    blend_state: BlendMode,
    technique: TechniqueDescriptor,
    material_cb: PerMaterialCB,
    /// Slot in the per-material-data pool, assigned by the material manager
    material_slot: AtomicU32,
    /// Content identity for deduplication (name excluded)
    content_hash: u64,
    // Textures kept alive for the material's lifetime
    base_color_texture: Option<Arc<PixelBuffer>>,
    normal_texture: Option<Arc<PixelBuffer>>,
    ao_texture: Option<Arc<PixelBuffer>>,
    height_texture: Option<Arc<PixelBuffer>>,
    metallic_texture: Option<Arc<PixelBuffer>>,
    roughness_texture: Option<Arc<PixelBuffer>>,
    emissive_texture: Option<Arc<PixelBuffer>>,
    opacity_texture: Option<Arc<PixelBuffer>>,
}

impl Material {
    /// Derive flags, technique and constants from a loader description
    pub fn from_description(desc: &MaterialDescription) -> Arc<Material> {
        let mut flags = MaterialFlags::empty();
        let mut pso_flags = PsoFlags::empty();

        if desc.base_color.texture.is_some() {
            flags |= MaterialFlags::BASE_COLOR_TEXTURE | MaterialFlags::TEXTURED;
        }
        if desc.metallic.texture.is_some() || desc.roughness.texture.is_some() {
            flags |= MaterialFlags::PBR | MaterialFlags::PBR_MAPS | MaterialFlags::TEXTURED;
        }
        if desc.emissive.texture.is_some() {
            flags |= MaterialFlags::EMISSIVE_TEXTURE | MaterialFlags::TEXTURED;
        }
        if desc.normal.texture.is_some() {
            flags |= MaterialFlags::NORMAL_MAP | MaterialFlags::TEXTURED;
        }
        if desc.ao.texture.is_some() {
            flags |= MaterialFlags::AO_TEXTURE | MaterialFlags::TEXTURED;
        }
        if desc.height_map.texture.is_some() {
            flags |= MaterialFlags::HEIGHT_MAP | MaterialFlags::PARALLAX
                | MaterialFlags::TEXTURED;
        }
        if desc.opacity.texture.is_some() {
            flags |= MaterialFlags::OPACITY_TEXTURE | MaterialFlags::TEXTURED;
            // An opacity texture alone means alpha testing, not blending
            pso_flags |= PsoFlags::ALPHA_TEST;
        }
        if desc.blend_state != BlendMode::Opaque {
            pso_flags |= PsoFlags::BLEND;
        }

        let technique = derive_technique(pso_flags);
        let material_cb = build_material_cb(desc, flags);
        let content_hash = content_hash(&material_cb, flags, pso_flags);

        Arc::new(Material {
            name: desc.name.clone(),
            flags,
            pso_flags,
            blend_state: desc.blend_state,
            technique,
            material_cb,
            material_slot: AtomicU32::new(u32::MAX),
            content_hash,
            base_color_texture: desc.base_color.texture.clone(),
            normal_texture: desc.normal.texture.clone(),
            ao_texture: desc.ao.texture.clone(),
            height_texture: desc.height_map.texture.clone(),
            metallic_texture: desc.metallic.texture.clone(),
            roughness_texture: desc.roughness.texture.clone(),
            emissive_texture: desc.emissive.texture.clone(),
            opacity_texture: desc.opacity.texture.clone(),
        })
    }

    /// The engine's fallback material (opaque, untextured)
    pub fn default_material() -> Arc<Material> {
        Self::from_description(&MaterialDescription::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn material_flags(&self) -> MaterialFlags {
        self.flags
    }

    pub fn pso_flags(&self) -> PsoFlags {
        self.pso_flags
    }

    pub fn blend_state(&self) -> BlendMode {
        self.blend_state
    }

    pub fn is_blended(&self) -> bool {
        self.pso_flags.contains(PsoFlags::BLEND)
    }

    pub fn technique(&self) -> &TechniqueDescriptor {
        &self.technique
    }

    pub fn material_cb(&self) -> PerMaterialCB {
        self.material_cb
    }

    /// Per-material-data pool slot (`u32::MAX` until the material manager
    /// assigns one)
    pub fn material_slot(&self) -> u32 {
        self.material_slot.load(Ordering::Acquire)
    }

    pub(crate) fn set_material_slot(&self, slot: u32) {
        self.material_slot.store(slot, Ordering::Release);
    }

    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    pub fn base_color_texture(&self) -> Option<&Arc<PixelBuffer>> {
        self.base_color_texture.as_ref()
    }

    pub fn normal_texture(&self) -> Option<&Arc<PixelBuffer>> {
        self.normal_texture.as_ref()
    }

    /// Every texture the material keeps alive (residency queries)
    pub fn textures(&self) -> impl Iterator<Item = &Arc<PixelBuffer>> {
        [
            &self.base_color_texture,
            &self.normal_texture,
            &self.ao_texture,
            &self.height_texture,
            &self.metallic_texture,
            &self.roughness_texture,
            &self.emissive_texture,
            &self.opacity_texture,
        ]
        .into_iter()
        .filter_map(|t| t.as_ref())
    }
}

/// Opaque materials draw in depth, G-buffer, shadow and forward phases;
/// blended materials only in the forward phase (consumed there by the PPLL
/// fill pass).
fn derive_technique(pso_flags: PsoFlags) -> TechniqueDescriptor {
    let compile_flags = CompileFlags::from_pso_flags(pso_flags);
    let phases = if pso_flags.contains(PsoFlags::BLEND) {
        vec![TechniquePhase {
            phase: phase::FORWARD_PASS,
            compile_flags,
        }]
    } else {
        vec![
            TechniquePhase { phase: phase::Z_PREPASS, compile_flags },
            TechniquePhase { phase: phase::GBUFFER_PASS, compile_flags },
            TechniquePhase { phase: phase::SHADOW_MAPS_PASS, compile_flags },
            TechniquePhase { phase: phase::FORWARD_PASS, compile_flags },
        ]
    };
    TechniqueDescriptor::new(phases)
}

fn slot_of(texture: &Option<Arc<PixelBuffer>>) -> (u32, u32) {
    match texture {
        Some(t) => (t.srv_slot(), t.sampler_slot()),
        None => (INVALID_SLOT, INVALID_SLOT),
    }
}

fn channel_of(tc: &TextureAndConstant) -> u32 {
    u32::from(tc.channels.first().copied().unwrap_or(0))
}

fn build_material_cb(desc: &MaterialDescription, flags: MaterialFlags) -> PerMaterialCB {
    let mut cb = PerMaterialCB::default();
    cb.base_color_factor = desc.diffuse_color.to_array();
    cb.emissive_factor = desc.emissive_color.to_array();
    cb.metallic_factor = desc.metallic.factor;
    cb.roughness_factor = desc.roughness.factor;
    cb.alpha_cutoff = desc.alpha_cutoff;
    cb.height_map_scale = desc.height_map.factor;
    cb.material_flags = flags.bits();

    (cb.base_color_texture_index, cb.base_color_sampler_index) = slot_of(&desc.base_color.texture);
    (cb.normal_texture_index, cb.normal_sampler_index) = slot_of(&desc.normal.texture);
    (cb.ao_texture_index, cb.ao_sampler_index) = slot_of(&desc.ao.texture);
    (cb.height_texture_index, cb.height_sampler_index) = slot_of(&desc.height_map.texture);
    (cb.metallic_texture_index, cb.metallic_sampler_index) = slot_of(&desc.metallic.texture);
    (cb.roughness_texture_index, cb.roughness_sampler_index) = slot_of(&desc.roughness.texture);
    (cb.emissive_texture_index, cb.emissive_sampler_index) = slot_of(&desc.emissive.texture);
    (cb.opacity_texture_index, cb.opacity_sampler_index) = slot_of(&desc.opacity.texture);

    cb.channel_swizzles = channel_of(&desc.metallic)
        | channel_of(&desc.roughness) << 8
        | channel_of(&desc.ao) << 16
        | channel_of(&desc.opacity) << 24;
    cb
}

fn content_hash(cb: &PerMaterialCB, flags: MaterialFlags, pso_flags: PsoFlags) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = rustc_hash::FxHasher::default();
    bytemuck::bytes_of(cb).hash(&mut hasher);
    flags.bits().hash(&mut hasher);
    pso_flags.bits().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
