/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Every call is appended to a journal so tests can assert on ordering.
/// Live objects are tracked by raw handle; destroying an unknown or already
/// destroyed handle panics. Submitted work completes instantly unless
/// `auto_signal_fences` is turned off, in which case fences stay unsignaled
/// until a test signals them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::device::*;
use crate::error::{Error, Result};

/// One journaled device call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Submit { fence: FenceHandle, command_buffers: Vec<CommandBufferHandle> },
    WaitIdle,
    CreateSwapchain(SwapchainCreateDesc),
    DestroySwapchain(SwapchainHandle),
    AcquireNextImage(SwapchainHandle),
    Present { swapchain: SwapchainHandle, image_index: u32 },
    CreateImage(ImageHandle),
    DestroyImage(ImageHandle),
    CreateImageView(ImageViewHandle),
    DestroyImageView(ImageViewHandle),
    CreateCommandPool { pool: CommandPoolHandle, flags: CommandPoolFlags },
    ResetCommandPool(CommandPoolHandle),
    DestroyCommandPool(CommandPoolHandle),
    AllocateCommandBuffers { pool: CommandPoolHandle, level: CommandBufferLevel, count: u32 },
    FreeCommandBuffers { pool: CommandPoolHandle, buffers: Vec<CommandBufferHandle> },
    ResetCommandBuffer(CommandBufferHandle),
    BeginCommandBuffer(CommandBufferHandle),
    EndCommandBuffer(CommandBufferHandle),
    CreateFence(FenceHandle),
    WaitForFences(Vec<FenceHandle>),
    ResetFences(Vec<FenceHandle>),
    DestroyFence(FenceHandle),
    CreateSemaphore(SemaphoreHandle),
    DestroySemaphore(SemaphoreHandle),
}

#[derive(Debug)]
pub struct MockSwapchain {
    pub desc: SwapchainCreateDesc,
    pub images: Vec<ImageHandle>,
    pub next_image: u32,
}

/// Mutable mock state, exposed so tests can configure and inspect it
#[derive(Debug)]
pub struct MockState {
    pub capabilities: SurfaceCapabilities,
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
    pub storage_formats: Vec<Format>,
    pub compression_control: bool,
    pub format_compression: Vec<SurfaceFormatCompression>,
    pub calls: Vec<DeviceCall>,
    pub live: FxHashSet<u64>,
    pub signaled_fences: FxHashSet<u64>,
    pub auto_signal_fences: bool,
    pub acquire_results: VecDeque<AcquireStatus>,
    pub present_results: VecDeque<AcquireStatus>,
    /// Surface extent applied by the next acquire, as if the window resized mid-acquire
    pub resize_on_acquire: Option<Extent2D>,
    pub swapchains: FxHashMap<u64, MockSwapchain>,
    pub images: FxHashMap<u64, ImageDesc>,
    pub fail_next_allocation: Option<Error>,
    pub device_lost: bool,
}

pub struct MockDevice {
    state: Mutex<MockState>,
    next_handle: AtomicU64,
}

impl MockDevice {
    /// 800x600 window surface, 2..=8 images, FIFO + MAILBOX, BGRA/RGBA sRGB
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                capabilities: Self::default_capabilities(),
                formats: vec![
                    SurfaceFormat::new(Format::B8G8R8A8_SRGB, ColorSpace::SrgbNonLinear),
                    SurfaceFormat::new(Format::B8G8R8A8_UNORM, ColorSpace::SrgbNonLinear),
                ],
                present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
                storage_formats: vec![Format::R8G8B8A8_UNORM, Format::B8G8R8A8_UNORM],
                compression_control: false,
                format_compression: Vec::new(),
                calls: Vec::new(),
                live: FxHashSet::default(),
                signaled_fences: FxHashSet::default(),
                auto_signal_fences: true,
                acquire_results: VecDeque::new(),
                present_results: VecDeque::new(),
                resize_on_acquire: None,
                swapchains: FxHashMap::default(),
                images: FxHashMap::default(),
                fail_next_allocation: None,
                device_lost: false,
            }),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn default_capabilities() -> SurfaceCapabilities {
        SurfaceCapabilities {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: Extent2D::new(800, 600),
            min_image_extent: Extent2D::new(1, 1),
            max_image_extent: Extent2D::new(4096, 4096),
            max_image_array_layers: 1,
            supported_transforms: SurfaceTransform::IDENTITY
                | SurfaceTransform::ROTATE_90
                | SurfaceTransform::ROTATE_270,
            current_transform: SurfaceTransform::IDENTITY,
            supported_composite_alpha: CompositeAlpha::OPAQUE,
            supported_usage: ImageUsage::COLOR_ATTACHMENT
                | ImageUsage::TRANSFER_SRC
                | ImageUsage::TRANSFER_DST
                | ImageUsage::STORAGE,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    pub fn is_live(&self, raw: u64) -> bool {
        self.state().live.contains(&raw)
    }

    pub fn signal_fence(&self, fence: FenceHandle) {
        self.state().signaled_fences.insert(fence.as_raw());
    }

    /// Count journaled calls matching `predicate`
    pub fn count_calls(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    fn next_raw(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn create_live(&self, state: &mut MockState) -> u64 {
        let raw = self.next_raw();
        state.live.insert(raw);
        raw
    }

    fn destroy_live(state: &mut MockState, raw: u64, what: &str) {
        assert!(state.live.remove(&raw), "{} {:#x} destroyed twice or never created", what, raw);
    }

    fn check_allocation(state: &mut MockState) -> Result<()> {
        if state.device_lost {
            return Err(Error::DeviceLost);
        }
        match state.fail_next_allocation.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl GraphicsDevice for MockDevice {
    fn queue_family_index(&self, kind: QueueKind) -> u32 {
        match kind {
            QueueKind::Graphics => 0,
            QueueKind::Present => 0,
        }
    }

    fn submit(&self, _kind: QueueKind, submit: &SubmitDesc<'_>, fence: FenceHandle) -> Result<()> {
        let mut state = self.state();
        if state.device_lost {
            return Err(Error::DeviceLost);
        }
        state.calls.push(DeviceCall::Submit {
            fence,
            command_buffers: submit.command_buffers.to_vec(),
        });
        if !fence.is_null() && state.auto_signal_fences {
            state.signaled_fences.insert(fence.as_raw());
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = self.state();
        if state.device_lost {
            return Err(Error::DeviceLost);
        }
        state.calls.push(DeviceCall::WaitIdle);
        // Everything submitted has completed
        let live: Vec<u64> = state.live.iter().copied().collect();
        state.signaled_fences.extend(live);
        Ok(())
    }

    fn surface_capabilities(&self, _surface: SurfaceHandle) -> Result<SurfaceCapabilities> {
        Ok(self.state().capabilities)
    }

    fn surface_formats(&self, _surface: SurfaceHandle) -> Result<Vec<SurfaceFormat>> {
        Ok(self.state().formats.clone())
    }

    fn surface_present_modes(&self, _surface: SurfaceHandle) -> Result<Vec<PresentMode>> {
        Ok(self.state().present_modes.clone())
    }

    fn format_supports_storage(&self, format: Format) -> bool {
        self.state().storage_formats.contains(&format)
    }

    fn supports_compression_control(&self) -> bool {
        self.state().compression_control
    }

    fn surface_format_compression(&self, _surface: SurfaceHandle) -> Result<Vec<SurfaceFormatCompression>> {
        let state = self.state();
        if !state.compression_control {
            return Ok(Vec::new());
        }
        Ok(state.format_compression.clone())
    }

    fn create_swapchain(&self, desc: &SwapchainCreateDesc) -> Result<SwapchainHandle> {
        let mut state = self.state();
        Self::check_allocation(&mut state)?;
        let raw = self.create_live(&mut state);
        let images = (0..desc.min_image_count)
            .map(|_| ImageHandle::from_raw(self.next_raw()))
            .collect();
        state.swapchains.insert(raw, MockSwapchain { desc: *desc, images, next_image: 0 });
        state.calls.push(DeviceCall::CreateSwapchain(*desc));
        Ok(SwapchainHandle::from_raw(raw))
    }

    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>> {
        self.state()
            .swapchains
            .get(&swapchain.as_raw())
            .map(|sc| sc.images.clone())
            .ok_or_else(|| Error::InvalidResource(format!("unknown swapchain {:?}", swapchain)))
    }

    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        _timeout: u64,
        _semaphore: SemaphoreHandle,
        _fence: FenceHandle,
    ) -> Result<AcquiredImage> {
        let mut state = self.state();
        if state.device_lost {
            return Err(Error::DeviceLost);
        }
        state.calls.push(DeviceCall::AcquireNextImage(swapchain));
        let status = state.acquire_results.pop_front().unwrap_or(AcquireStatus::Success);
        if let Some(extent) = state.resize_on_acquire.take() {
            state.capabilities.current_extent = extent;
        }
        let sc = state
            .swapchains
            .get_mut(&swapchain.as_raw())
            .ok_or_else(|| Error::InvalidResource(format!("unknown swapchain {:?}", swapchain)))?;
        if status == AcquireStatus::OutOfDate {
            return Ok(AcquiredImage { image_index: u32::MAX, status });
        }
        let image_index = sc.next_image;
        sc.next_image = (sc.next_image + 1) % sc.images.len() as u32;
        Ok(AcquiredImage { image_index, status })
    }

    fn queue_present(
        &self,
        swapchain: SwapchainHandle,
        image_index: u32,
        _wait_semaphores: &[SemaphoreHandle],
    ) -> Result<AcquireStatus> {
        let mut state = self.state();
        if state.device_lost {
            return Err(Error::DeviceLost);
        }
        state.calls.push(DeviceCall::Present { swapchain, image_index });
        Ok(state.present_results.pop_front().unwrap_or(AcquireStatus::Success))
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        let mut state = self.state();
        Self::destroy_live(&mut state, swapchain.as_raw(), "swapchain");
        state.swapchains.remove(&swapchain.as_raw());
        state.calls.push(DeviceCall::DestroySwapchain(swapchain));
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle> {
        let mut state = self.state();
        Self::check_allocation(&mut state)?;
        let raw = self.create_live(&mut state);
        state.images.insert(raw, desc.clone());
        state.calls.push(DeviceCall::CreateImage(ImageHandle::from_raw(raw)));
        Ok(ImageHandle::from_raw(raw))
    }

    fn image_memory_size(&self, image: ImageHandle) -> u64 {
        let state = self.state();
        match state.images.get(&image.as_raw()) {
            Some(desc) => {
                let texel_bytes = match desc.format {
                    Format::R16G16B16A16_SFLOAT | Format::D32_FLOAT_S8_UINT => 8,
                    Format::D16_UNORM => 2,
                    Format::Undefined => 0,
                    _ => 4,
                };
                desc.extent.width as u64
                    * desc.extent.height as u64
                    * desc.extent.depth as u64
                    * desc.array_layers as u64
                    * texel_bytes
            }
            None => 0,
        }
    }

    fn image_compression(&self, image: ImageHandle) -> ImageCompressionProperties {
        let state = self.state();
        if let Some(desc) = state.images.get(&image.as_raw()) {
            return desc
                .extensions
                .iter()
                .map(|ext| match ext {
                    ImageExtension::Compression(props) => *props,
                })
                .next()
                .unwrap_or_default();
        }
        state
            .swapchains
            .values()
            .find(|sc| sc.images.contains(&image))
            .map(|sc| sc.desc.compression)
            .unwrap_or_default()
    }

    fn destroy_image(&self, image: ImageHandle) {
        let mut state = self.state();
        Self::destroy_live(&mut state, image.as_raw(), "image");
        state.images.remove(&image.as_raw());
        state.calls.push(DeviceCall::DestroyImage(image));
    }

    fn create_image_view(&self, _desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let mut state = self.state();
        Self::check_allocation(&mut state)?;
        let view = ImageViewHandle::from_raw(self.create_live(&mut state));
        state.calls.push(DeviceCall::CreateImageView(view));
        Ok(view)
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        let mut state = self.state();
        Self::destroy_live(&mut state, view.as_raw(), "image view");
        state.calls.push(DeviceCall::DestroyImageView(view));
    }

    fn create_command_pool(&self, _queue_family_index: u32, flags: CommandPoolFlags) -> Result<CommandPoolHandle> {
        let mut state = self.state();
        Self::check_allocation(&mut state)?;
        let pool = CommandPoolHandle::from_raw(self.create_live(&mut state));
        state.calls.push(DeviceCall::CreateCommandPool { pool, flags });
        Ok(pool)
    }

    fn reset_command_pool(&self, pool: CommandPoolHandle) -> Result<()> {
        let mut state = self.state();
        if state.device_lost {
            return Err(Error::DeviceLost);
        }
        state.calls.push(DeviceCall::ResetCommandPool(pool));
        Ok(())
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        let mut state = self.state();
        Self::destroy_live(&mut state, pool.as_raw(), "command pool");
        state.calls.push(DeviceCall::DestroyCommandPool(pool));
    }

    fn allocate_command_buffers(
        &self,
        pool: CommandPoolHandle,
        level: CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<CommandBufferHandle>> {
        let mut state = self.state();
        Self::check_allocation(&mut state)?;
        state.calls.push(DeviceCall::AllocateCommandBuffers { pool, level, count });
        Ok((0..count).map(|_| CommandBufferHandle::from_raw(self.next_raw())).collect())
    }

    fn free_command_buffers(&self, pool: CommandPoolHandle, buffers: &[CommandBufferHandle]) {
        self.state().calls.push(DeviceCall::FreeCommandBuffers { pool, buffers: buffers.to_vec() });
    }

    fn reset_command_buffer(&self, buffer: CommandBufferHandle) -> Result<()> {
        let mut state = self.state();
        if state.device_lost {
            return Err(Error::DeviceLost);
        }
        state.calls.push(DeviceCall::ResetCommandBuffer(buffer));
        Ok(())
    }

    fn begin_command_buffer(
        &self,
        buffer: CommandBufferHandle,
        _level: CommandBufferLevel,
        _one_time_submit: bool,
    ) -> Result<()> {
        self.state().calls.push(DeviceCall::BeginCommandBuffer(buffer));
        Ok(())
    }

    fn end_command_buffer(&self, buffer: CommandBufferHandle) -> Result<()> {
        self.state().calls.push(DeviceCall::EndCommandBuffer(buffer));
        Ok(())
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let mut state = self.state();
        let raw = self.create_live(&mut state);
        if signaled {
            state.signaled_fences.insert(raw);
        }
        state.calls.push(DeviceCall::CreateFence(FenceHandle::from_raw(raw)));
        Ok(FenceHandle::from_raw(raw))
    }

    fn wait_for_fences(&self, fences: &[FenceHandle], _timeout: u64) -> Result<()> {
        let mut state = self.state();
        if state.device_lost {
            return Err(Error::DeviceLost);
        }
        state.calls.push(DeviceCall::WaitForFences(fences.to_vec()));
        if fences.iter().all(|f| state.signaled_fences.contains(&f.as_raw())) {
            Ok(())
        } else {
            Err(Error::Timeout)
        }
    }

    fn reset_fences(&self, fences: &[FenceHandle]) -> Result<()> {
        let mut state = self.state();
        for fence in fences {
            state.signaled_fences.remove(&fence.as_raw());
        }
        state.calls.push(DeviceCall::ResetFences(fences.to_vec()));
        Ok(())
    }

    fn fence_status(&self, fence: FenceHandle) -> Result<bool> {
        Ok(self.state().signaled_fences.contains(&fence.as_raw()))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        let mut state = self.state();
        Self::destroy_live(&mut state, fence.as_raw(), "fence");
        state.signaled_fences.remove(&fence.as_raw());
        state.calls.push(DeviceCall::DestroyFence(fence));
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let mut state = self.state();
        let semaphore = SemaphoreHandle::from_raw(self.create_live(&mut state));
        state.calls.push(DeviceCall::CreateSemaphore(semaphore));
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        let mut state = self.state();
        Self::destroy_live(&mut state, semaphore.as_raw(), "semaphore");
        state.calls.push(DeviceCall::DestroySemaphore(semaphore));
    }
}

#[cfg(test)]
#[path = "mock_device_tests.rs"]
mod tests;
