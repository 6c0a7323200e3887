//! Configuration structs
//!
//! Plain values with `Default` impls; nothing is loaded from disk.

use crate::device::{
    ColorSpace, CompositeAlpha, Extent2D, FixedRateCompression, Format, ImageCompression,
    ImageUsage, PresentMode, SurfaceFormat, SurfaceTransform,
};
use crate::frame::WaitPolicy;
use crate::resource::CommandPoolResetMode;

// ===== DEVICE =====

/// Which validation messages the backend forwards to the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Backend device creation options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Enable validation layers (only honored with the `vulkan-validation` feature)
    pub enable_validation: bool,
    pub debug_severity: DebugSeverity,
    pub app_name: String,
    /// (major, minor, patch)
    pub app_version: (u32, u32, u32),
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            app_name: "swapframe application".to_string(),
            app_version: (0, 1, 0),
        }
    }
}

// ===== SWAPCHAIN =====

/// Requested swapchain properties
///
/// Every field is a request. Negotiation keeps it when the surface supports it
/// and falls back otherwise; the applied values are read back from the
/// [`Swapchain`](crate::presentation::Swapchain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainDesc {
    /// 0x0 means "use the surface's current extent"
    pub extent: Extent2D,
    pub image_count: u32,
    /// Exact format to look for before consulting the priority list
    pub surface_format: Option<SurfaceFormat>,
    pub surface_format_priority: Vec<SurfaceFormat>,
    pub present_mode: PresentMode,
    pub present_mode_priority: Vec<PresentMode>,
    pub array_layers: u32,
    pub image_usage: ImageUsage,
    pub transform: SurfaceTransform,
    pub composite_alpha: CompositeAlpha,
    pub compression: ImageCompression,
    pub fixed_rate: FixedRateCompression,
}

impl SwapchainDesc {
    pub fn default_surface_format_priority() -> Vec<SurfaceFormat> {
        vec![
            SurfaceFormat::new(Format::R8G8B8A8_SRGB, ColorSpace::SrgbNonLinear),
            SurfaceFormat::new(Format::B8G8R8A8_SRGB, ColorSpace::SrgbNonLinear),
        ]
    }

    pub fn default_present_mode_priority() -> Vec<PresentMode> {
        vec![PresentMode::Fifo, PresentMode::Mailbox]
    }

    pub fn with_extent(mut self, extent: Extent2D) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_image_count(mut self, image_count: u32) -> Self {
        self.image_count = image_count;
        self
    }

    pub fn with_present_mode(mut self, present_mode: PresentMode) -> Self {
        self.present_mode = present_mode;
        self
    }

    pub fn with_present_mode_priority(mut self, priority: Vec<PresentMode>) -> Self {
        self.present_mode_priority = priority;
        self
    }

    pub fn with_surface_format_priority(mut self, priority: Vec<SurfaceFormat>) -> Self {
        self.surface_format_priority = priority;
        self
    }

    pub fn with_image_usage(mut self, usage: ImageUsage) -> Self {
        self.image_usage = usage;
        self
    }

    pub fn with_transform(mut self, transform: SurfaceTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_compression(mut self, compression: ImageCompression, fixed_rate: FixedRateCompression) -> Self {
        self.compression = compression;
        self.fixed_rate = fixed_rate;
        self
    }
}

impl Default for SwapchainDesc {
    fn default() -> Self {
        Self {
            extent: Extent2D::default(),
            image_count: 3,
            surface_format: None,
            surface_format_priority: Self::default_surface_format_priority(),
            present_mode: PresentMode::Fifo,
            present_mode_priority: Self::default_present_mode_priority(),
            array_layers: 1,
            image_usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_SRC,
            transform: SurfaceTransform::IDENTITY,
            composite_alpha: CompositeAlpha::OPAQUE,
            compression: ImageCompression::Default,
            fixed_rate: FixedRateCompression::NONE,
        }
    }
}

// ===== FRAMES =====

/// Frame ring options for [`RenderContext`](crate::frame::RenderContext)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Recording threads; one command pool per thread per frame slot
    pub thread_count: usize,
    /// `None` follows the swapchain image count
    pub frames_in_flight: Option<usize>,
    pub reset_mode: CommandPoolResetMode,
    pub wait_policy: WaitPolicy,
    /// Acquire timeout in nanoseconds
    pub acquire_timeout: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            thread_count: 1,
            frames_in_flight: None,
            reset_mode: CommandPoolResetMode::ResetPool,
            wait_policy: WaitPolicy::Fence,
            acquire_timeout: u64::MAX,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
