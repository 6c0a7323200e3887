/// Conversions between swapframe device types and Vulkan
///
/// Flag types share Vulkan's bit values and convert with a raw bit copy.
/// Enum conversions from Vulkan return `None` for values swapframe does not model.

use ash::vk;
use swapframe_core::swapframe::device::{
    ColorSpace, CommandBufferLevel, CommandPoolFlags, CompositeAlpha, Extent2D, FixedRateCompression,
    Format, ImageAspect, ImageCompression, ImageCompressionProperties, ImageCreateFlags, ImageTiling,
    ImageType, ImageUsage, ImageViewType, MemoryLocation, PipelineStage, PresentMode, SampleCount,
    SurfaceCapabilities, SurfaceFormat, SurfaceTransform,
};
use swapframe_core::swapframe::Error;

// ===== FORMATS =====

pub fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::Undefined => vk::Format::UNDEFINED,
        Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        Format::A2B10G10R10_UNORM => vk::Format::A2B10G10R10_UNORM_PACK32,
        Format::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        Format::D16_UNORM => vk::Format::D16_UNORM,
        Format::D32_FLOAT => vk::Format::D32_SFLOAT,
        Format::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        Format::D32_FLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

pub fn format_from_vk(format: vk::Format) -> Option<Format> {
    let converted = match format {
        vk::Format::UNDEFINED => Format::Undefined,
        vk::Format::R8G8B8A8_UNORM => Format::R8G8B8A8_UNORM,
        vk::Format::R8G8B8A8_SRGB => Format::R8G8B8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM => Format::B8G8R8A8_UNORM,
        vk::Format::B8G8R8A8_SRGB => Format::B8G8R8A8_SRGB,
        vk::Format::A2B10G10R10_UNORM_PACK32 => Format::A2B10G10R10_UNORM,
        vk::Format::R16G16B16A16_SFLOAT => Format::R16G16B16A16_SFLOAT,
        vk::Format::D16_UNORM => Format::D16_UNORM,
        vk::Format::D32_SFLOAT => Format::D32_FLOAT,
        vk::Format::D24_UNORM_S8_UINT => Format::D24_UNORM_S8_UINT,
        vk::Format::D32_SFLOAT_S8_UINT => Format::D32_FLOAT_S8_UINT,
        _ => return None,
    };
    Some(converted)
}

pub fn color_space_to_vk(color_space: ColorSpace) -> vk::ColorSpaceKHR {
    match color_space {
        ColorSpace::SrgbNonLinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::ExtendedSrgbLinear => vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        ColorSpace::Hdr10St2084 => vk::ColorSpaceKHR::HDR10_ST2084_EXT,
    }
}

pub fn color_space_from_vk(color_space: vk::ColorSpaceKHR) -> Option<ColorSpace> {
    match color_space {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => Some(ColorSpace::SrgbNonLinear),
        vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT => Some(ColorSpace::ExtendedSrgbLinear),
        vk::ColorSpaceKHR::HDR10_ST2084_EXT => Some(ColorSpace::Hdr10St2084),
        _ => None,
    }
}

/// Drops surface formats swapframe cannot name
pub fn surface_format_from_vk(format: vk::SurfaceFormatKHR) -> Option<SurfaceFormat> {
    Some(SurfaceFormat::new(format_from_vk(format.format)?, color_space_from_vk(format.color_space)?))
}

// ===== PRESENTATION =====

pub fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

pub fn present_mode_from_vk(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

pub fn extent_to_vk(extent: Extent2D) -> vk::Extent2D {
    vk::Extent2D { width: extent.width, height: extent.height }
}

pub fn extent_from_vk(extent: vk::Extent2D) -> Extent2D {
    Extent2D::new(extent.width, extent.height)
}

pub fn surface_capabilities_from_vk(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCapabilities {
    SurfaceCapabilities {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent: extent_from_vk(caps.current_extent),
        min_image_extent: extent_from_vk(caps.min_image_extent),
        max_image_extent: extent_from_vk(caps.max_image_extent),
        max_image_array_layers: caps.max_image_array_layers,
        supported_transforms: SurfaceTransform::from_bits_truncate(caps.supported_transforms.as_raw()),
        current_transform: SurfaceTransform::from_bits_truncate(caps.current_transform.as_raw()),
        supported_composite_alpha: CompositeAlpha::from_bits_truncate(caps.supported_composite_alpha.as_raw()),
        supported_usage: ImageUsage::from_bits_truncate(caps.supported_usage_flags.as_raw()),
    }
}

// ===== FLAGS =====

pub fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    vk::ImageUsageFlags::from_raw(usage.bits())
}

pub fn image_create_flags_to_vk(flags: ImageCreateFlags) -> vk::ImageCreateFlags {
    vk::ImageCreateFlags::from_raw(flags.bits())
}

pub fn image_aspect_to_vk(aspect: ImageAspect) -> vk::ImageAspectFlags {
    vk::ImageAspectFlags::from_raw(aspect.bits())
}

pub fn surface_transform_to_vk(transform: SurfaceTransform) -> vk::SurfaceTransformFlagsKHR {
    vk::SurfaceTransformFlagsKHR::from_raw(transform.bits())
}

pub fn composite_alpha_to_vk(alpha: CompositeAlpha) -> vk::CompositeAlphaFlagsKHR {
    vk::CompositeAlphaFlagsKHR::from_raw(alpha.bits())
}

pub fn command_pool_flags_to_vk(flags: CommandPoolFlags) -> vk::CommandPoolCreateFlags {
    vk::CommandPoolCreateFlags::from_raw(flags.bits())
}

// ===== COMPRESSION =====

pub fn compression_to_vk(compression: ImageCompression) -> vk::ImageCompressionFlagsEXT {
    match compression {
        ImageCompression::Default => vk::ImageCompressionFlagsEXT::DEFAULT,
        ImageCompression::FixedRateDefault => vk::ImageCompressionFlagsEXT::FIXED_RATE_DEFAULT,
        ImageCompression::FixedRateExplicit => vk::ImageCompressionFlagsEXT::FIXED_RATE_EXPLICIT,
        ImageCompression::Disabled => vk::ImageCompressionFlagsEXT::DISABLED,
    }
}

pub fn compression_from_vk(flags: vk::ImageCompressionFlagsEXT) -> ImageCompression {
    if flags.contains(vk::ImageCompressionFlagsEXT::DISABLED) {
        ImageCompression::Disabled
    } else if flags.contains(vk::ImageCompressionFlagsEXT::FIXED_RATE_EXPLICIT) {
        ImageCompression::FixedRateExplicit
    } else if flags.contains(vk::ImageCompressionFlagsEXT::FIXED_RATE_DEFAULT) {
        ImageCompression::FixedRateDefault
    } else {
        ImageCompression::Default
    }
}

pub fn fixed_rate_to_vk(rate: FixedRateCompression) -> vk::ImageCompressionFixedRateFlagsEXT {
    vk::ImageCompressionFixedRateFlagsEXT::from_raw(rate.bits())
}

pub fn compression_properties_from_vk(props: &vk::ImageCompressionPropertiesEXT<'_>) -> ImageCompressionProperties {
    ImageCompressionProperties {
        compression: compression_from_vk(props.image_compression_flags),
        fixed_rate: FixedRateCompression::from_bits_truncate(props.image_compression_fixed_rate_flags.as_raw()),
    }
}

// ===== IMAGES =====

pub fn image_type_to_vk(image_type: ImageType) -> vk::ImageType {
    match image_type {
        ImageType::Tex1D => vk::ImageType::TYPE_1D,
        ImageType::Tex2D => vk::ImageType::TYPE_2D,
        ImageType::Tex3D => vk::ImageType::TYPE_3D,
    }
}

pub fn image_view_type_to_vk(view_type: ImageViewType) -> vk::ImageViewType {
    match view_type {
        ImageViewType::Tex1D => vk::ImageViewType::TYPE_1D,
        ImageViewType::Tex2D => vk::ImageViewType::TYPE_2D,
        ImageViewType::Tex3D => vk::ImageViewType::TYPE_3D,
        ImageViewType::Cube => vk::ImageViewType::CUBE,
        ImageViewType::Tex1DArray => vk::ImageViewType::TYPE_1D_ARRAY,
        ImageViewType::Tex2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
        ImageViewType::CubeArray => vk::ImageViewType::CUBE_ARRAY,
    }
}

pub fn sample_count_to_vk(samples: SampleCount) -> vk::SampleCountFlags {
    match samples {
        SampleCount::S1 => vk::SampleCountFlags::TYPE_1,
        SampleCount::S2 => vk::SampleCountFlags::TYPE_2,
        SampleCount::S4 => vk::SampleCountFlags::TYPE_4,
        SampleCount::S8 => vk::SampleCountFlags::TYPE_8,
        SampleCount::S16 => vk::SampleCountFlags::TYPE_16,
    }
}

pub fn image_tiling_to_vk(tiling: ImageTiling) -> vk::ImageTiling {
    match tiling {
        ImageTiling::Optimal => vk::ImageTiling::OPTIMAL,
        ImageTiling::Linear => vk::ImageTiling::LINEAR,
    }
}

pub fn memory_location_to_gpu_allocator(location: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match location {
        MemoryLocation::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryLocation::GpuToCpu => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

// ===== COMMANDS =====

pub fn command_buffer_level_to_vk(level: CommandBufferLevel) -> vk::CommandBufferLevel {
    match level {
        CommandBufferLevel::Primary => vk::CommandBufferLevel::PRIMARY,
        CommandBufferLevel::Secondary => vk::CommandBufferLevel::SECONDARY,
    }
}

pub fn pipeline_stage_to_vk(stage: PipelineStage) -> vk::PipelineStageFlags {
    match stage {
        PipelineStage::TopOfPipe => vk::PipelineStageFlags::TOP_OF_PIPE,
        PipelineStage::ColorAttachmentOutput => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        PipelineStage::Transfer => vk::PipelineStageFlags::TRANSFER,
        PipelineStage::AllCommands => vk::PipelineStageFlags::ALL_COMMANDS,
    }
}

// ===== ERRORS =====

/// Map a failed `vk::Result` to a swapframe error
///
/// Device loss, memory exhaustion and timeouts keep their own variants so
/// callers can react to them; everything else becomes a backend error.
pub fn vk_result_to_error(result: vk::Result, context: &str) -> Error {
    match result {
        vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => Error::OutOfMemory,
        vk::Result::TIMEOUT => Error::Timeout,
        other => Error::BackendError(format!("{}: {:?}", context, other)),
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
