//! Swapchain property negotiation
//!
//! Each `choose_*` function intersects one requested property with what the
//! surface reports and returns the applied value. A request that cannot be
//! honored falls back deterministically and logs a warning; only an empty
//! supported set is an error, signaled by `None`.

use crate::device::{
    CompositeAlpha, Extent2D, FixedRateCompression, ImageCompression, ImageCompressionProperties,
    ImageUsage, PresentMode, SurfaceCapabilities, SurfaceFormat, SurfaceFormatCompression,
    SurfaceTransform,
};
use crate::sf_warn;

const SOURCE: &str = "swapframe::Swapchain";

/// Fallback order for composite alpha
const COMPOSITE_ALPHA_ORDER: [CompositeAlpha; 4] = [
    CompositeAlpha::OPAQUE,
    CompositeAlpha::PRE_MULTIPLIED,
    CompositeAlpha::POST_MULTIPLIED,
    CompositeAlpha::INHERIT,
];

/// Fallback order for image usage when no requested flag survives
const IMAGE_USAGE_ORDER: [ImageUsage; 4] = [
    ImageUsage::COLOR_ATTACHMENT,
    ImageUsage::STORAGE,
    ImageUsage::SAMPLED,
    ImageUsage::TRANSFER_DST,
];

pub fn choose_extent(requested: Extent2D, capabilities: &SurfaceCapabilities) -> Extent2D {
    let current = capabilities.current_extent;
    if !current.is_undefined() && requested.is_zero_area() {
        // 0x0 is the "use current" request, not a mismatch
        if requested != Extent2D::default() {
            sf_warn!(
                SOURCE,
                "Requested extent {}x{} is empty, using current {}x{}",
                requested.width,
                requested.height,
                current.width,
                current.height
            );
        }
        return current;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    let extent = Extent2D::new(
        requested.width.clamp(min.width, max.width.max(min.width)),
        requested.height.clamp(min.height, max.height.max(min.height)),
    );
    if extent != requested {
        sf_warn!(
            SOURCE,
            "Requested extent {}x{} clamped to {}x{}",
            requested.width,
            requested.height,
            extent.width,
            extent.height
        );
    }
    extent
}

pub fn choose_image_count(requested: u32, capabilities: &SurfaceCapabilities) -> u32 {
    let max = if capabilities.max_image_count == 0 { u32::MAX } else { capabilities.max_image_count };
    let count = requested.clamp(capabilities.min_image_count, max.max(capabilities.min_image_count));
    if count != requested {
        sf_warn!(SOURCE, "Requested image count {} clamped to {}", requested, count);
    }
    count
}

pub fn choose_array_layers(requested: u32, capabilities: &SurfaceCapabilities) -> u32 {
    let layers = requested.clamp(1, capabilities.max_image_array_layers.max(1));
    if layers != requested {
        sf_warn!(SOURCE, "Requested {} array layers clamped to {}", requested, layers);
    }
    layers
}

/// Exact request first, then the priority list, then the first supported format
pub fn choose_surface_format(
    requested: Option<SurfaceFormat>,
    available: &[SurfaceFormat],
    priority: &[SurfaceFormat],
) -> Option<SurfaceFormat> {
    if let Some(requested) = requested {
        if available.contains(&requested) {
            return Some(requested);
        }
        sf_warn!(SOURCE, "Surface format {:?} not supported", requested);
    }
    if let Some(found) = priority.iter().find(|format| available.contains(format)) {
        return Some(*found);
    }
    let fallback = available.first().copied();
    if let Some(format) = fallback {
        sf_warn!(SOURCE, "No preferred surface format supported, falling back to {:?}", format);
    }
    fallback
}

/// Request first, then the priority list, then FIFO
pub fn choose_present_mode(requested: PresentMode, available: &[PresentMode], priority: &[PresentMode]) -> PresentMode {
    if available.contains(&requested) {
        return requested;
    }
    let chosen = priority
        .iter()
        .copied()
        .find(|mode| available.contains(mode))
        .unwrap_or(PresentMode::Fifo);
    sf_warn!(SOURCE, "Present mode {:?} not supported, using {:?}", requested, chosen);
    chosen
}

pub fn choose_transform(requested: SurfaceTransform, capabilities: &SurfaceCapabilities) -> SurfaceTransform {
    if capabilities.supported_transforms.contains(requested) {
        return requested;
    }
    sf_warn!(
        SOURCE,
        "Transform {:?} not supported, using current {:?}",
        requested,
        capabilities.current_transform
    );
    capabilities.current_transform
}

pub fn choose_composite_alpha(requested: CompositeAlpha, supported: CompositeAlpha) -> Option<CompositeAlpha> {
    if supported.contains(requested) {
        return Some(requested);
    }
    let chosen = COMPOSITE_ALPHA_ORDER.iter().copied().find(|alpha| supported.contains(*alpha));
    if let Some(alpha) = chosen {
        sf_warn!(SOURCE, "Composite alpha {:?} not supported, using {:?}", requested, alpha);
    }
    chosen
}

/// Keep the supported requested flags; storage also needs format support
pub fn choose_image_usage(requested: ImageUsage, supported: ImageUsage, storage_supported: bool) -> Option<ImageUsage> {
    let usable = |flag: ImageUsage| supported.contains(flag) && (flag != ImageUsage::STORAGE || storage_supported);

    let mut validated = ImageUsage::empty();
    for flag in requested.iter() {
        if usable(flag) {
            validated |= flag;
        } else {
            sf_warn!(SOURCE, "Image usage {:?} not supported, dropping it", flag);
        }
    }
    if !validated.is_empty() {
        return Some(validated);
    }

    let fallback = IMAGE_USAGE_ORDER.iter().copied().find(|flag| usable(*flag));
    if let Some(flag) = fallback {
        sf_warn!(SOURCE, "No requested image usage supported, falling back to {:?}", flag);
    }
    fallback
}

/// Compression to request for `format`
///
/// Without compression control every request becomes the driver default.
/// Explicit fixed-rate requests take the lowest requested rate the format
/// supports, or fall back to the default when none match.
pub fn choose_compression(
    requested: ImageCompression,
    fixed_rate: FixedRateCompression,
    device_supports_control: bool,
    format: SurfaceFormat,
    supported: &[SurfaceFormatCompression],
) -> ImageCompressionProperties {
    let default = ImageCompressionProperties::default();
    if requested == ImageCompression::Default {
        return default;
    }
    if !device_supports_control {
        sf_warn!(SOURCE, "Compression control unavailable, ignoring {:?} request", requested);
        return default;
    }

    let format_rates = supported
        .iter()
        .find(|entry| entry.surface_format == format)
        .map(|entry| entry.properties.fixed_rate)
        .unwrap_or(FixedRateCompression::NONE);

    match requested {
        ImageCompression::Default => default,
        ImageCompression::Disabled => ImageCompressionProperties {
            compression: ImageCompression::Disabled,
            fixed_rate: FixedRateCompression::NONE,
        },
        ImageCompression::FixedRateDefault => {
            if format_rates.is_empty() {
                sf_warn!(SOURCE, "{:?} has no fixed-rate compression, using default", format.format);
                return default;
            }
            ImageCompressionProperties {
                compression: ImageCompression::FixedRateDefault,
                fixed_rate: FixedRateCompression::NONE,
            }
        }
        ImageCompression::FixedRateExplicit => {
            let candidates = fixed_rate & format_rates;
            if candidates.is_empty() {
                sf_warn!(
                    SOURCE,
                    "Fixed-rate {:?} not supported for {:?}, using default",
                    fixed_rate,
                    format.format
                );
                return default;
            }
            ImageCompressionProperties {
                compression: ImageCompression::FixedRateExplicit,
                fixed_rate: candidates.lowest(),
            }
        }
    }
}

#[cfg(test)]
#[path = "negotiation_tests.rs"]
mod tests;
