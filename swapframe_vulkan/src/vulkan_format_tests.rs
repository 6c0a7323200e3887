//! Unit tests for Vulkan conversions
//!
//! Pure functions, no GPU required.

use super::*;

// ============================================================================
// FORMAT CONVERSION TESTS
// ============================================================================

#[test]
fn test_color_formats_to_vk() {
    assert_eq!(format_to_vk(Format::R8G8B8A8_SRGB), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(format_to_vk(Format::B8G8R8A8_UNORM), vk::Format::B8G8R8A8_UNORM);
    assert_eq!(format_to_vk(Format::A2B10G10R10_UNORM), vk::Format::A2B10G10R10_UNORM_PACK32);
    assert_eq!(format_to_vk(Format::R16G16B16A16_SFLOAT), vk::Format::R16G16B16A16_SFLOAT);
}

#[test]
fn test_depth_formats_to_vk() {
    assert_eq!(format_to_vk(Format::D16_UNORM), vk::Format::D16_UNORM);
    assert_eq!(format_to_vk(Format::D32_FLOAT), vk::Format::D32_SFLOAT);
    assert_eq!(format_to_vk(Format::D24_UNORM_S8_UINT), vk::Format::D24_UNORM_S8_UINT);
    assert_eq!(format_to_vk(Format::D32_FLOAT_S8_UINT), vk::Format::D32_SFLOAT_S8_UINT);
}

#[test]
fn test_every_format_converts_back() {
    let formats = [
        Format::Undefined,
        Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8_SRGB,
        Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8_SRGB,
        Format::A2B10G10R10_UNORM,
        Format::R16G16B16A16_SFLOAT,
        Format::D16_UNORM,
        Format::D32_FLOAT,
        Format::D24_UNORM_S8_UINT,
        Format::D32_FLOAT_S8_UINT,
    ];
    for format in formats {
        assert_eq!(format_from_vk(format_to_vk(format)), Some(format));
    }
}

#[test]
fn test_unknown_vk_format_is_none() {
    assert_eq!(format_from_vk(vk::Format::BC7_SRGB_BLOCK), None);
}

#[test]
fn test_surface_format_with_unknown_color_space_is_dropped() {
    let known = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    let unknown = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
    };
    assert_eq!(
        surface_format_from_vk(known),
        Some(SurfaceFormat::new(Format::B8G8R8A8_SRGB, ColorSpace::SrgbNonLinear))
    );
    assert_eq!(surface_format_from_vk(unknown), None);
}

// ============================================================================
// PRESENTATION TESTS
// ============================================================================

#[test]
fn test_present_modes() {
    for mode in [PresentMode::Immediate, PresentMode::Mailbox, PresentMode::Fifo, PresentMode::FifoRelaxed] {
        assert_eq!(present_mode_from_vk(present_mode_to_vk(mode)), Some(mode));
    }
    assert_eq!(present_mode_to_vk(PresentMode::Fifo), vk::PresentModeKHR::FIFO);
    assert_eq!(present_mode_from_vk(vk::PresentModeKHR::SHARED_DEMAND_REFRESH), None);
}

#[test]
fn test_surface_capabilities_keep_undefined_extent() {
    let caps = vk::SurfaceCapabilitiesKHR {
        min_image_count: 2,
        max_image_count: 0,
        current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
        max_image_array_layers: 1,
        supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY | vk::SurfaceTransformFlagsKHR::ROTATE_90,
        current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
        supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE | vk::CompositeAlphaFlagsKHR::INHERIT,
        supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE,
    };
    let converted = surface_capabilities_from_vk(&caps);
    assert!(converted.current_extent.is_undefined());
    assert_eq!(converted.max_image_count, 0);
    assert_eq!(converted.supported_transforms, SurfaceTransform::IDENTITY | SurfaceTransform::ROTATE_90);
    assert_eq!(converted.supported_composite_alpha, CompositeAlpha::OPAQUE | CompositeAlpha::INHERIT);
    assert_eq!(converted.supported_usage, ImageUsage::COLOR_ATTACHMENT | ImageUsage::STORAGE);
}

// ============================================================================
// FLAG TESTS
// ============================================================================

#[test]
fn test_flag_bits_match_vulkan() {
    assert_eq!(image_usage_to_vk(ImageUsage::all()), {
        vk::ImageUsageFlags::TRANSFER_SRC
            | vk::ImageUsageFlags::TRANSFER_DST
            | vk::ImageUsageFlags::SAMPLED
            | vk::ImageUsageFlags::STORAGE
            | vk::ImageUsageFlags::COLOR_ATTACHMENT
            | vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
            | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
            | vk::ImageUsageFlags::INPUT_ATTACHMENT
    });
    assert_eq!(
        image_create_flags_to_vk(ImageCreateFlags::CUBE_COMPATIBLE),
        vk::ImageCreateFlags::CUBE_COMPATIBLE
    );
    assert_eq!(
        image_aspect_to_vk(ImageAspect::DEPTH | ImageAspect::STENCIL),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
    assert_eq!(surface_transform_to_vk(SurfaceTransform::INHERIT), vk::SurfaceTransformFlagsKHR::INHERIT);
    assert_eq!(
        composite_alpha_to_vk(CompositeAlpha::PRE_MULTIPLIED),
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
    );
    assert_eq!(
        command_pool_flags_to_vk(CommandPoolFlags::RESET_COMMAND_BUFFER),
        vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
    );
    assert_eq!(command_pool_flags_to_vk(CommandPoolFlags::TRANSIENT), vk::CommandPoolCreateFlags::TRANSIENT);
}

#[test]
fn test_fixed_rate_bits_match_vulkan() {
    assert_eq!(fixed_rate_to_vk(FixedRateCompression::BPC_1), vk::ImageCompressionFixedRateFlagsEXT::TYPE_1BPC);
    assert_eq!(fixed_rate_to_vk(FixedRateCompression::BPC_2), vk::ImageCompressionFixedRateFlagsEXT::TYPE_2BPC);
    assert_eq!(fixed_rate_to_vk(FixedRateCompression::BPC_24), vk::ImageCompressionFixedRateFlagsEXT::TYPE_24BPC);
    assert_eq!(fixed_rate_to_vk(FixedRateCompression::NONE), vk::ImageCompressionFixedRateFlagsEXT::NONE);
}

#[test]
fn test_compression_flags() {
    for compression in [
        ImageCompression::Default,
        ImageCompression::FixedRateDefault,
        ImageCompression::FixedRateExplicit,
        ImageCompression::Disabled,
    ] {
        assert_eq!(compression_from_vk(compression_to_vk(compression)), compression);
    }
}

#[test]
fn test_compression_properties_from_vk() {
    let props = vk::ImageCompressionPropertiesEXT::default()
        .image_compression_flags(vk::ImageCompressionFlagsEXT::FIXED_RATE_EXPLICIT)
        .image_compression_fixed_rate_flags(vk::ImageCompressionFixedRateFlagsEXT::TYPE_4BPC);
    assert_eq!(
        compression_properties_from_vk(&props),
        ImageCompressionProperties {
            compression: ImageCompression::FixedRateExplicit,
            fixed_rate: FixedRateCompression::BPC_4,
        }
    );
}

// ============================================================================
// IMAGE AND COMMAND TESTS
// ============================================================================

#[test]
fn test_image_enums() {
    assert_eq!(image_type_to_vk(ImageType::Tex3D), vk::ImageType::TYPE_3D);
    assert_eq!(image_view_type_to_vk(ImageViewType::CubeArray), vk::ImageViewType::CUBE_ARRAY);
    assert_eq!(sample_count_to_vk(SampleCount::S8), vk::SampleCountFlags::TYPE_8);
    assert_eq!(image_tiling_to_vk(ImageTiling::Linear), vk::ImageTiling::LINEAR);
    assert_eq!(
        memory_location_to_gpu_allocator(MemoryLocation::CpuToGpu),
        gpu_allocator::MemoryLocation::CpuToGpu
    );
}

#[test]
fn test_command_enums() {
    assert_eq!(command_buffer_level_to_vk(CommandBufferLevel::Secondary), vk::CommandBufferLevel::SECONDARY);
    assert_eq!(
        pipeline_stage_to_vk(PipelineStage::ColorAttachmentOutput),
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
    );
}

// ============================================================================
// ERROR MAPPING TESTS
// ============================================================================

#[test]
fn test_vk_result_to_error() {
    assert_eq!(vk_result_to_error(vk::Result::ERROR_DEVICE_LOST, "submit"), Error::DeviceLost);
    assert_eq!(vk_result_to_error(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, "alloc"), Error::OutOfMemory);
    assert_eq!(vk_result_to_error(vk::Result::ERROR_OUT_OF_HOST_MEMORY, "alloc"), Error::OutOfMemory);
    assert_eq!(vk_result_to_error(vk::Result::TIMEOUT, "wait"), Error::Timeout);
    assert_eq!(
        vk_result_to_error(vk::Result::ERROR_INITIALIZATION_FAILED, "vkCreateFence"),
        Error::BackendError("vkCreateFence: ERROR_INITIALIZATION_FAILED".to_string())
    );
}
