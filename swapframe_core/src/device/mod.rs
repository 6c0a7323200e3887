//! The device seam
//!
//! [`GraphicsDevice`] is everything the lifecycle core needs from a GPU
//! backend. The core holds it as `Arc<dyn GraphicsDevice>` and never owns the
//! device itself.

pub mod handle;
pub mod types;

#[cfg(test)]
pub mod mock_device;

pub use handle::*;
pub use types::*;

use crate::error::Result;

/// Backend device interface
///
/// Destruction methods never fail; backends log failures.
pub trait GraphicsDevice: Send + Sync {
    // ===== QUEUES =====

    fn queue_family_index(&self, kind: QueueKind) -> u32;

    /// Submit one batch, optionally signaling `fence` on completion
    fn submit(&self, kind: QueueKind, submit: &SubmitDesc<'_>, fence: FenceHandle) -> Result<()>;

    /// Block until every queue is idle
    fn wait_idle(&self) -> Result<()>;

    // ===== SURFACE QUERIES =====

    fn surface_capabilities(&self, surface: SurfaceHandle) -> Result<SurfaceCapabilities>;

    fn surface_formats(&self, surface: SurfaceHandle) -> Result<Vec<SurfaceFormat>>;

    fn surface_present_modes(&self, surface: SurfaceHandle) -> Result<Vec<PresentMode>>;

    /// True when `format` can back a storage image with optimal tiling
    fn format_supports_storage(&self, format: Format) -> bool;

    /// True when explicit image compression control is enabled on the device
    fn supports_compression_control(&self) -> bool;

    /// Per-format compression support of a surface (empty without compression control)
    fn surface_format_compression(&self, surface: SurfaceHandle) -> Result<Vec<SurfaceFormatCompression>>;

    // ===== SWAPCHAIN =====

    fn create_swapchain(&self, desc: &SwapchainCreateDesc) -> Result<SwapchainHandle>;

    /// Presentation images, owned by the swapchain
    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>>;

    /// Acquire the next image; `fence` may be NULL
    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        timeout: u64,
        semaphore: SemaphoreHandle,
        fence: FenceHandle,
    ) -> Result<AcquiredImage>;

    fn queue_present(
        &self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphores: &[SemaphoreHandle],
    ) -> Result<AcquireStatus>;

    fn destroy_swapchain(&self, swapchain: SwapchainHandle);

    // ===== IMAGES =====

    /// Create an image and bind freshly allocated memory to it
    fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle>;

    /// Memory footprint required by `image`
    fn image_memory_size(&self, image: ImageHandle) -> u64;

    /// Compression the driver actually applied to `image`
    fn image_compression(&self, image: ImageHandle) -> ImageCompressionProperties;

    /// Destroy the image and free its memory
    fn destroy_image(&self, image: ImageHandle);

    fn create_image_view(&self, desc: &ImageViewDesc) -> Result<ImageViewHandle>;

    fn destroy_image_view(&self, view: ImageViewHandle);

    // ===== COMMAND POOLS =====

    fn create_command_pool(&self, queue_family_index: u32, flags: CommandPoolFlags) -> Result<CommandPoolHandle>;

    /// Reset every buffer allocated from `pool` in one call
    fn reset_command_pool(&self, pool: CommandPoolHandle) -> Result<()>;

    /// Destroy the pool and every buffer allocated from it
    fn destroy_command_pool(&self, pool: CommandPoolHandle);

    fn allocate_command_buffers(
        &self,
        pool: CommandPoolHandle,
        level: CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<CommandBufferHandle>>;

    fn free_command_buffers(&self, pool: CommandPoolHandle, buffers: &[CommandBufferHandle]);

    fn reset_command_buffer(&self, buffer: CommandBufferHandle) -> Result<()>;

    fn begin_command_buffer(
        &self,
        buffer: CommandBufferHandle,
        level: CommandBufferLevel,
        one_time_submit: bool,
    ) -> Result<()>;

    fn end_command_buffer(&self, buffer: CommandBufferHandle) -> Result<()>;

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle>;

    /// Wait until every fence is signaled; `Error::Timeout` past `timeout` ns
    fn wait_for_fences(&self, fences: &[FenceHandle], timeout: u64) -> Result<()>;

    fn reset_fences(&self, fences: &[FenceHandle]) -> Result<()>;

    fn fence_status(&self, fence: FenceHandle) -> Result<bool>;

    fn destroy_fence(&self, fence: FenceHandle);

    fn create_semaphore(&self) -> Result<SemaphoreHandle>;

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);
}
