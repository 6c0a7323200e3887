/// Backend-agnostic device types: formats, extents, flags, and descriptors
///
/// Flag types carry the Vulkan bit values so backends can convert with a raw
/// bit copy.

use crate::device::handle::{
    CommandBufferHandle, ImageHandle, SemaphoreHandle, SurfaceHandle, SwapchainHandle,
};

// ===== FORMATS =====

/// Image and surface formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    Undefined,
    // Color formats
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    A2B10G10R10_UNORM,
    R16G16B16A16_SFLOAT,
    // Depth / stencil formats
    D16_UNORM,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
    D32_FLOAT_S8_UINT,
}

impl Format {
    /// True for every format with a depth component
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Format::D16_UNORM | Format::D32_FLOAT | Format::D24_UNORM_S8_UINT | Format::D32_FLOAT_S8_UINT
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, Format::D24_UNORM_S8_UINT | Format::D32_FLOAT_S8_UINT)
    }

    pub fn is_srgb(self) -> bool {
        matches!(self, Format::R8G8B8A8_SRGB | Format::B8G8R8A8_SRGB)
    }
}

/// Surface color space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonLinear,
    ExtendedSrgbLinear,
    Hdr10St2084,
}

/// A (format, color space) pair reported by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: Format,
    pub color_space: ColorSpace,
}

impl SurfaceFormat {
    pub const fn new(format: Format, color_space: ColorSpace) -> Self {
        Self { format, color_space }
    }
}

/// Presentation modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    /// Always supported
    Fifo,
    FifoRelaxed,
}

// ===== EXTENTS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    /// Value reported by surfaces whose size is decided by the swapchain
    pub const UNDEFINED: Extent2D = Extent2D { width: u32::MAX, height: u32::MAX };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_zero_area(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn is_undefined(self) -> bool {
        self.width == u32::MAX
    }

    /// Width and height exchanged (90/270 degree rotations)
    pub fn swapped(self) -> Self {
        Self { width: self.height, height: self.width }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3D {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }

    /// Number of levels in a full mip chain for this extent
    pub fn max_mip_levels(self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth).max(1);
        32 - largest.leading_zeros()
    }
}

impl From<Extent2D> for Extent3D {
    fn from(extent: Extent2D) -> Self {
        Self { width: extent.width, height: extent.height, depth: 1 }
    }
}

// ===== IMAGE ENUMS =====

/// Multisample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleCount {
    /// 1 sample (no multisampling)
    S1,
    S2,
    S4,
    S8,
    S16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTiling {
    Optimal,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Tex1D,
    Tex2D,
    Tex3D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageViewType {
    Tex1D,
    Tex2D,
    Tex3D,
    Cube,
    Tex1DArray,
    Tex2DArray,
    CubeArray,
}

/// Memory placement for image allocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    GpuOnly,
    CpuToGpu,
    GpuToCpu,
}

/// Explicit compression request for an image or swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageCompression {
    /// Driver default, no explicit request
    #[default]
    Default,
    /// Fixed-rate compression at a driver-chosen rate
    FixedRateDefault,
    /// Fixed-rate compression at a rate chosen from [`FixedRateCompression`]
    FixedRateExplicit,
    /// Compression disabled
    Disabled,
}

// ===== FLAGS =====

bitflags::bitflags! {
    /// Image usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 0x0000_0001;
        const TRANSFER_DST = 0x0000_0002;
        const SAMPLED = 0x0000_0004;
        const STORAGE = 0x0000_0008;
        const COLOR_ATTACHMENT = 0x0000_0010;
        const DEPTH_STENCIL_ATTACHMENT = 0x0000_0020;
        const TRANSIENT_ATTACHMENT = 0x0000_0040;
        const INPUT_ATTACHMENT = 0x0000_0080;
    }
}

bitflags::bitflags! {
    /// Image creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageCreateFlags: u32 {
        const MUTABLE_FORMAT = 0x0000_0008;
        const CUBE_COMPATIBLE = 0x0000_0010;
        const ARRAY_2D_COMPATIBLE = 0x0000_0020;
    }
}

bitflags::bitflags! {
    /// Image aspects addressed by a view or subresource
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        const COLOR = 0x0000_0001;
        const DEPTH = 0x0000_0002;
        const STENCIL = 0x0000_0004;
    }
}

bitflags::bitflags! {
    /// Surface pre-transform flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SurfaceTransform: u32 {
        const IDENTITY = 0x0000_0001;
        const ROTATE_90 = 0x0000_0002;
        const ROTATE_180 = 0x0000_0004;
        const ROTATE_270 = 0x0000_0008;
        const HORIZONTAL_MIRROR = 0x0000_0010;
        const HORIZONTAL_MIRROR_ROTATE_90 = 0x0000_0020;
        const HORIZONTAL_MIRROR_ROTATE_180 = 0x0000_0040;
        const HORIZONTAL_MIRROR_ROTATE_270 = 0x0000_0080;
        const INHERIT = 0x0000_0100;
    }
}

impl SurfaceTransform {
    /// True when the transform swaps the surface's width and height
    pub fn swaps_dimensions(self) -> bool {
        self.intersects(
            SurfaceTransform::ROTATE_90
                | SurfaceTransform::ROTATE_270
                | SurfaceTransform::HORIZONTAL_MIRROR_ROTATE_90
                | SurfaceTransform::HORIZONTAL_MIRROR_ROTATE_270,
        )
    }
}

bitflags::bitflags! {
    /// Composite alpha modes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompositeAlpha: u32 {
        const OPAQUE = 0x0000_0001;
        const PRE_MULTIPLIED = 0x0000_0002;
        const POST_MULTIPLIED = 0x0000_0004;
        const INHERIT = 0x0000_0008;
    }
}

bitflags::bitflags! {
    /// Fixed-rate compression levels, in bits per component
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FixedRateCompression: u32 {
        const BPC_1 = 1 << 0;
        const BPC_2 = 1 << 1;
        const BPC_3 = 1 << 2;
        const BPC_4 = 1 << 3;
        const BPC_5 = 1 << 4;
        const BPC_6 = 1 << 5;
        const BPC_7 = 1 << 6;
        const BPC_8 = 1 << 7;
        const BPC_9 = 1 << 8;
        const BPC_10 = 1 << 9;
        const BPC_11 = 1 << 10;
        const BPC_12 = 1 << 11;
        const BPC_13 = 1 << 12;
        const BPC_14 = 1 << 13;
        const BPC_15 = 1 << 14;
        const BPC_16 = 1 << 15;
        const BPC_17 = 1 << 16;
        const BPC_18 = 1 << 17;
        const BPC_19 = 1 << 18;
        const BPC_20 = 1 << 19;
        const BPC_21 = 1 << 20;
        const BPC_22 = 1 << 21;
        const BPC_23 = 1 << 22;
        const BPC_24 = 1 << 23;
    }
}

impl FixedRateCompression {
    /// No fixed-rate level
    pub const NONE: FixedRateCompression = FixedRateCompression::empty();

    /// The lowest set level, i.e. the strongest compression
    pub fn lowest(self) -> FixedRateCompression {
        FixedRateCompression::from_bits_truncate(self.bits() & self.bits().wrapping_neg())
    }
}

bitflags::bitflags! {
    /// Native command pool creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandPoolFlags: u32 {
        const TRANSIENT = 0x0000_0001;
        const RESET_COMMAND_BUFFER = 0x0000_0002;
    }
}

// ===== QUEUES AND COMMANDS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Graphics,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

/// Pipeline stage a semaphore wait blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    TopOfPipe,
    ColorAttachmentOutput,
    Transfer,
    AllCommands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreWait {
    pub semaphore: SemaphoreHandle,
    pub stage: PipelineStage,
}

/// One batch for [`GraphicsDevice::submit`](crate::device::GraphicsDevice::submit)
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitDesc<'a> {
    pub command_buffers: &'a [CommandBufferHandle],
    pub wait_semaphores: &'a [SemaphoreWait],
    pub signal_semaphores: &'a [SemaphoreHandle],
}

/// Outcome of acquire and present when the call itself succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquireStatus {
    Success,
    /// Still usable, but no longer matches the surface exactly
    Suboptimal,
    /// Unusable; the swapchain must be recreated
    OutOfDate,
}

impl AcquireStatus {
    /// True when the caller should recreate the swapchain
    pub fn is_stale(self) -> bool {
        !matches!(self, AcquireStatus::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Meaningless when `status` is `OutOfDate`
    pub image_index: u32,
    pub status: AcquireStatus,
}

// ===== SURFACE QUERIES =====

/// Surface capabilities reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper bound
    pub max_image_count: u32,
    /// [`Extent2D::UNDEFINED`] when the swapchain decides the size
    pub current_extent: Extent2D,
    pub min_image_extent: Extent2D,
    pub max_image_extent: Extent2D,
    pub max_image_array_layers: u32,
    pub supported_transforms: SurfaceTransform,
    pub current_transform: SurfaceTransform,
    pub supported_composite_alpha: CompositeAlpha,
    pub supported_usage: ImageUsage,
}

/// Compression properties of an image or of a surface format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageCompressionProperties {
    pub compression: ImageCompression,
    pub fixed_rate: FixedRateCompression,
}

impl Default for FixedRateCompression {
    fn default() -> Self {
        FixedRateCompression::NONE
    }
}

/// A surface format together with the fixed-rate levels it supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormatCompression {
    pub surface_format: SurfaceFormat,
    pub properties: ImageCompressionProperties,
}

// ===== CREATE DESCRIPTORS =====

/// Fully negotiated parameters handed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainCreateDesc {
    pub surface: SurfaceHandle,
    pub min_image_count: u32,
    pub surface_format: SurfaceFormat,
    pub extent: Extent2D,
    pub array_layers: u32,
    pub usage: ImageUsage,
    pub transform: SurfaceTransform,
    pub composite_alpha: CompositeAlpha,
    pub present_mode: PresentMode,
    pub compression: ImageCompressionProperties,
    /// Swapchain being retired, or NULL
    pub old_swapchain: SwapchainHandle,
}

/// Extension structures chained onto an image description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageExtension {
    Compression(ImageCompressionProperties),
}

/// Image creation description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDesc {
    pub name: String,
    pub image_type: ImageType,
    pub format: Format,
    pub extent: Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: SampleCount,
    pub tiling: ImageTiling,
    pub usage: ImageUsage,
    pub flags: ImageCreateFlags,
    pub memory_location: MemoryLocation,
    pub extensions: Vec<ImageExtension>,
}

/// Range of mips and layers addressed by a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    pub aspect: ImageAspect,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageViewDesc {
    pub image: ImageHandle,
    pub view_type: ImageViewType,
    pub format: Format,
    pub range: SubresourceRange,
}
