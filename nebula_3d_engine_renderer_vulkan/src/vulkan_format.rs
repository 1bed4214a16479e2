//! Enum lowering: engine RHI value types -> Vulkan

use ash::vk;

use nebula_3d_engine::rhi::{
    AddressMode, BarrierAccess, BarrierLayout, BarrierSync, BlendMode, BorderPreset, CompareOp,
    CullMode, Filter, Format, IndexType, LoadOp, MipFilter, PrimitiveTopology, ReductionMode,
    StoreOp,
};

pub fn format(value: Format) -> vk::Format {
    match value {
        Format::UNKNOWN => vk::Format::UNDEFINED,
        Format::R8_UNORM => vk::Format::R8_UNORM,
        Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8_UNORM_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        Format::R10G10B10A2_UNORM => vk::Format::A2B10G10R10_UNORM_PACK32,
        Format::R11G11B10_FLOAT => vk::Format::B10G11R11_UFLOAT_PACK32,
        Format::R16_FLOAT => vk::Format::R16_SFLOAT,
        Format::R16G16_FLOAT => vk::Format::R16G16_SFLOAT,
        Format::R16G16B16A16_FLOAT => vk::Format::R16G16B16A16_SFLOAT,
        Format::R32_FLOAT => vk::Format::R32_SFLOAT,
        Format::R32_UINT => vk::Format::R32_UINT,
        Format::R32G32B32A32_FLOAT => vk::Format::R32G32B32A32_SFLOAT,
        Format::D32_FLOAT => vk::Format::D32_SFLOAT,
        Format::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
    }
}

pub fn topology(value: PrimitiveTopology) -> vk::PrimitiveTopology {
    match value {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub fn load_op(value: LoadOp) -> vk::AttachmentLoadOp {
    match value {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub fn store_op(value: StoreOp) -> vk::AttachmentStoreOp {
    match value {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub fn index_type(value: IndexType) -> vk::IndexType {
    match value {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

pub fn filter(value: Filter) -> vk::Filter {
    match value {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn mip_filter(value: MipFilter) -> vk::SamplerMipmapMode {
    match value {
        MipFilter::Nearest => vk::SamplerMipmapMode::NEAREST,
        MipFilter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn address_mode(value: AddressMode) -> vk::SamplerAddressMode {
    match value {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub fn border_color(value: BorderPreset) -> vk::BorderColor {
    match value {
        BorderPreset::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        BorderPreset::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        BorderPreset::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

pub fn compare_op(value: CompareOp) -> vk::CompareOp {
    match value {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn reduction_mode(value: ReductionMode) -> vk::SamplerReductionMode {
    match value {
        ReductionMode::WeightedAverage => vk::SamplerReductionMode::WEIGHTED_AVERAGE,
        ReductionMode::Min => vk::SamplerReductionMode::MIN,
        ReductionMode::Max => vk::SamplerReductionMode::MAX,
    }
}

pub fn cull_mode(value: CullMode) -> vk::CullModeFlags {
    match value {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

/// Color blend attachment state for one of the engine's blend modes
pub fn blend_attachment(value: BlendMode) -> vk::PipelineColorBlendAttachmentState {
    let mut state = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA);
    match value {
        BlendMode::Opaque => {}
        BlendMode::AlphaBlend => {
            state = state
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .alpha_blend_op(vk::BlendOp::ADD);
        }
        BlendMode::Additive => {
            state = state
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::ONE)
                .dst_color_blend_factor(vk::BlendFactor::ONE)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE)
                .alpha_blend_op(vk::BlendOp::ADD);
        }
    }
    state
}

pub fn sync_flags(value: BarrierSync) -> vk::PipelineStageFlags2 {
    if value == BarrierSync::NONE {
        return vk::PipelineStageFlags2::NONE;
    }
    let mut out = vk::PipelineStageFlags2::NONE;
    if value.contains(BarrierSync::ALL) {
        out |= vk::PipelineStageFlags2::ALL_COMMANDS;
    }
    if value.contains(BarrierSync::DRAW) {
        out |= vk::PipelineStageFlags2::ALL_GRAPHICS;
    }
    if value.contains(BarrierSync::INDEX_INPUT) {
        out |= vk::PipelineStageFlags2::INDEX_INPUT;
    }
    if value.contains(BarrierSync::VERTEX_SHADING) {
        out |= vk::PipelineStageFlags2::VERTEX_SHADER;
    }
    if value.contains(BarrierSync::PIXEL_SHADING) {
        out |= vk::PipelineStageFlags2::FRAGMENT_SHADER;
    }
    if value.contains(BarrierSync::NON_PIXEL_SHADING) {
        out |= vk::PipelineStageFlags2::VERTEX_SHADER
            | vk::PipelineStageFlags2::COMPUTE_SHADER
            | vk::PipelineStageFlags2::TASK_SHADER_EXT
            | vk::PipelineStageFlags2::MESH_SHADER_EXT;
    }
    if value.contains(BarrierSync::ALL_SHADING) {
        out |= vk::PipelineStageFlags2::VERTEX_SHADER
            | vk::PipelineStageFlags2::FRAGMENT_SHADER
            | vk::PipelineStageFlags2::COMPUTE_SHADER
            | vk::PipelineStageFlags2::TASK_SHADER_EXT
            | vk::PipelineStageFlags2::MESH_SHADER_EXT;
    }
    if value.contains(BarrierSync::DEPTH_STENCIL) {
        out |= vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS;
    }
    if value.contains(BarrierSync::RENDER_TARGET) {
        out |= vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT;
    }
    if value.contains(BarrierSync::COMPUTE_SHADING) {
        out |= vk::PipelineStageFlags2::COMPUTE_SHADER;
    }
    if value.contains(BarrierSync::COPY) {
        out |= vk::PipelineStageFlags2::COPY;
    }
    if value.contains(BarrierSync::EXECUTE_INDIRECT) {
        out |= vk::PipelineStageFlags2::DRAW_INDIRECT;
    }
    out
}

pub fn access_flags(value: BarrierAccess) -> vk::AccessFlags2 {
    if value == BarrierAccess::NO_ACCESS {
        return vk::AccessFlags2::NONE;
    }
    let mut out = vk::AccessFlags2::NONE;
    if value.contains(BarrierAccess::VERTEX_BUFFER) {
        out |= vk::AccessFlags2::VERTEX_ATTRIBUTE_READ;
    }
    if value.contains(BarrierAccess::CONSTANT_BUFFER) {
        out |= vk::AccessFlags2::UNIFORM_READ;
    }
    if value.contains(BarrierAccess::INDEX_BUFFER) {
        out |= vk::AccessFlags2::INDEX_READ;
    }
    if value.contains(BarrierAccess::RENDER_TARGET) {
        out |= vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE;
    }
    if value.contains(BarrierAccess::UNORDERED_ACCESS) {
        out |= vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE;
    }
    if value.contains(BarrierAccess::DEPTH_STENCIL_WRITE) {
        out |= vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE
            | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if value.contains(BarrierAccess::DEPTH_STENCIL_READ) {
        out |= vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if value.contains(BarrierAccess::SHADER_RESOURCE) {
        out |= vk::AccessFlags2::SHADER_SAMPLED_READ | vk::AccessFlags2::SHADER_STORAGE_READ;
    }
    if value.contains(BarrierAccess::INDIRECT_ARGUMENT) {
        out |= vk::AccessFlags2::INDIRECT_COMMAND_READ;
    }
    if value.contains(BarrierAccess::COPY_DEST) {
        out |= vk::AccessFlags2::TRANSFER_WRITE;
    }
    if value.contains(BarrierAccess::COPY_SOURCE) {
        out |= vk::AccessFlags2::TRANSFER_READ;
    }
    out
}

pub fn image_layout(value: BarrierLayout, is_depth: bool) -> vk::ImageLayout {
    match value {
        BarrierLayout::Undefined => vk::ImageLayout::UNDEFINED,
        BarrierLayout::Common => vk::ImageLayout::GENERAL,
        BarrierLayout::ShaderResource => {
            if is_depth {
                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
            } else {
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
            }
        }
        BarrierLayout::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        BarrierLayout::DepthStencilWrite => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        BarrierLayout::DepthStencilRead => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        BarrierLayout::UnorderedAccess => vk::ImageLayout::GENERAL,
        BarrierLayout::CopySource => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        BarrierLayout::CopyDest => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    }
}
