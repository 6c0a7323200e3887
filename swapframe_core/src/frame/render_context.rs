//! Render context: the per-frame loop around a swapchain
//!
//! ```text
//! begin_frame -> request_command_buffer / record -> submit -> end_frame
//! ```
//!
//! `begin_frame` waits for the next frame slot with the active [`WaitPolicy`],
//! recycles its command pools and acquires a swapchain image. `end_frame`
//! presents it and advances the ring. Stale swapchains reported by acquire or
//! present are recreated here, never inside [`Swapchain`].

use std::sync::Arc;

use crate::config::{FrameConfig, SwapchainDesc};
use crate::device::{
    AcquireStatus, AcquiredImage, CommandBufferLevel, Extent2D, Format, GraphicsDevice, ImageHandle,
    ImageUsage, ImageViewType, PipelineStage, QueueKind, SemaphoreWait, SubmitDesc, SurfaceHandle,
    SurfaceTransform,
};
use crate::error::{Error, Result};
use crate::frame::frame_slot::{FrameSlot, FrameState, WaitPolicy};
use crate::presentation::{Swapchain, SwapchainUpdate};
use crate::resource::{CommandBuffer, CommandBufferState, CommandPool, Image, ImageView};
use crate::{sf_debug, sf_error, sf_info, sf_warn};

const SOURCE: &str = "swapframe::RenderContext";

// ===== SWAPCHAIN TARGET =====

/// A swapchain image wrapped with a color view covering it
pub struct SwapchainTarget {
    view: Option<ImageView>,
    image: Image,
}

impl SwapchainTarget {
    fn new(device: &Arc<dyn GraphicsDevice>, swapchain: &Swapchain, handle: ImageHandle) -> Result<Self> {
        let mut image = Image::from_presentation(
            Arc::clone(device),
            handle,
            swapchain.extent(),
            swapchain.format(),
            swapchain.usage(),
        );
        let view = ImageView::new(&mut image, ImageViewType::Tex2D)?;
        Ok(Self { view: Some(view), image })
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn view(&self) -> Option<&ImageView> {
        self.view.as_ref()
    }
}

impl Drop for SwapchainTarget {
    fn drop(&mut self) {
        if let Some(view) = self.view.take() {
            view.destroy(&mut self.image);
        }
    }
}

// ===== FRAME INFO =====

/// Result of [`RenderContext::begin_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_index: usize,
    /// `None` when no image could be acquired this frame
    pub image_index: Option<u32>,
    pub status: AcquireStatus,
}

impl FrameInfo {
    pub fn is_renderable(&self) -> bool {
        self.image_index.is_some()
    }
}

// ===== RENDER CONTEXT =====

pub struct RenderContext {
    device: Arc<dyn GraphicsDevice>,
    surface: SurfaceHandle,
    // Targets drop before the swapchain that owns their images
    targets: Vec<SwapchainTarget>,
    swapchain: Swapchain,
    frames: Vec<FrameSlot>,
    config: FrameConfig,
    wait_policy: WaitPolicy,
    active_frame: usize,
    acquired_image: Option<u32>,
    frame_active: bool,
    surface_extent: Extent2D,
    pre_transform: SurfaceTransform,
}

impl RenderContext {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        surface: SurfaceHandle,
        desc: &SwapchainDesc,
        config: FrameConfig,
    ) -> Result<Self> {
        if config.frames_in_flight == Some(0) {
            return Err(Error::InitializationFailed("frames_in_flight must be at least 1".to_string()));
        }

        let swapchain = Swapchain::new(Arc::clone(&device), surface, desc)?;
        let targets = Self::build_targets(&device, &swapchain)?;
        let frame_count = config.frames_in_flight.unwrap_or(swapchain.image_count() as usize);

        let queue_family_index = device.queue_family_index(QueueKind::Graphics);
        let frames = (0..frame_count)
            .map(|index| {
                FrameSlot::new(
                    Arc::clone(&device),
                    index,
                    queue_family_index,
                    config.thread_count,
                    config.reset_mode,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        sf_info!(
            SOURCE,
            "Render context ready: {} frame slot(s), {} thread(s), {:?} pools, {:?} wait",
            frames.len(),
            config.thread_count.max(1),
            config.reset_mode,
            config.wait_policy
        );

        Ok(Self {
            surface_extent: swapchain.extent(),
            pre_transform: swapchain.transform(),
            wait_policy: config.wait_policy,
            device,
            surface,
            targets,
            swapchain,
            frames,
            config,
            active_frame: 0,
            acquired_image: None,
            frame_active: false,
        })
    }

    fn build_targets(device: &Arc<dyn GraphicsDevice>, swapchain: &Swapchain) -> Result<Vec<SwapchainTarget>> {
        swapchain
            .images()
            .iter()
            .map(|&handle| SwapchainTarget::new(device, swapchain, handle))
            .collect()
    }

    // ===== WAIT POLICY =====

    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait_policy
    }

    /// Takes effect from the next `begin_frame`
    pub fn set_wait_policy(&mut self, policy: WaitPolicy) {
        if policy != self.wait_policy {
            sf_debug!(SOURCE, "Wait policy {:?} -> {:?}", self.wait_policy, policy);
        }
        self.wait_policy = policy;
    }

    // ===== FRAME LOOP =====

    /// Wait for the next slot, recycle its pools and acquire an image
    ///
    /// The surface is checked for a new extent first, since some platforms
    /// never report a resized swapchain as stale. A stale acquire triggers one surface check and, if the swapchain was
    /// recreated, one more acquire. When no image is available the returned
    /// frame is not renderable and no frame is active.
    pub fn begin_frame(&mut self) -> Result<FrameInfo> {
        assert!(
            !self.frame_active,
            "begin_frame called while frame {} is still active",
            self.active_frame
        );
        self.handle_surface_changes(false)?;
        let slot = self.active_frame;
        self.wait_slot(slot)?;

        let mut acquired = self.acquire(slot)?;
        if acquired.status.is_stale() {
            let out_of_date = acquired.status == AcquireStatus::OutOfDate;
            if self.handle_surface_changes(out_of_date)? {
                // A suboptimal acquire still signals the old semaphore
                self.frames[slot].renew_image_acquired(!out_of_date)?;
                acquired = self.acquire(slot)?;
            }
        }

        if acquired.status == AcquireStatus::OutOfDate {
            sf_warn!(SOURCE, "Swapchain out of date, skipping frame {}", slot);
            return Ok(FrameInfo { frame_index: slot, image_index: None, status: acquired.status });
        }

        self.frames[slot].begin_recording();
        self.acquired_image = Some(acquired.image_index);
        self.frame_active = true;
        Ok(FrameInfo {
            frame_index: slot,
            image_index: Some(acquired.image_index),
            status: acquired.status,
        })
    }

    fn wait_slot(&mut self, slot: usize) -> Result<()> {
        let policy = self.wait_policy;
        let frame = &mut self.frames[slot];
        frame.wait(policy)?;
        frame.reset_pools()
    }

    fn acquire(&self, slot: usize) -> Result<AcquiredImage> {
        self.swapchain.acquire_next_image(
            self.config.acquire_timeout,
            self.frames[slot].image_acquired().handle(),
            None,
        )
    }

    /// Command buffer from the active slot's pool for `thread_index`
    pub fn request_command_buffer(&mut self, thread_index: usize, level: CommandBufferLevel) -> Result<CommandBuffer> {
        assert!(self.frame_active, "request_command_buffer called outside an active frame");
        self.frames[self.active_frame].request_command_buffer(thread_index, level)
    }

    /// The active slot's pools, one per thread, for parallel recording
    pub fn command_pools_mut(&mut self) -> &mut [CommandPool] {
        self.frames[self.active_frame].pools_mut()
    }

    /// Submit recorded buffers for the active frame
    ///
    /// Waits on the image acquire at color output, signals the slot's
    /// render-finished semaphore and fence.
    pub fn submit(&mut self, command_buffers: &[&CommandBuffer]) -> Result<()> {
        assert!(self.frame_active, "submit called outside an active frame");
        if let Some(buffer) = command_buffers
            .iter()
            .find(|buffer| buffer.state() != CommandBufferState::Executable)
        {
            return Err(Error::InvalidResource(format!(
                "{:?} is {:?}, not executable",
                buffer.handle(),
                buffer.state()
            )));
        }

        let slot = &mut self.frames[self.active_frame];
        if slot.state() != FrameState::Recording {
            return Err(Error::InvalidResource(format!("frame {} already submitted", slot.index())));
        }

        let handles: Vec<_> = command_buffers.iter().map(|buffer| buffer.handle()).collect();
        let waits = [SemaphoreWait {
            semaphore: slot.image_acquired().handle(),
            stage: PipelineStage::ColorAttachmentOutput,
        }];
        let signals = [slot.render_finished().handle()];

        slot.fence().reset()?;
        self.device
            .submit(
                QueueKind::Graphics,
                &SubmitDesc {
                    command_buffers: &handles,
                    wait_semaphores: &waits,
                    signal_semaphores: &signals,
                },
                slot.fence().handle(),
            )
            .map_err(|e| {
                sf_error!(SOURCE, "Submit for frame {} failed: {}", slot.index(), e);
                e
            })?;
        slot.mark_submitted();
        Ok(())
    }

    /// Present the acquired image and advance to the next slot
    pub fn end_frame(&mut self) -> Result<AcquireStatus> {
        assert!(self.frame_active, "end_frame called without begin_frame");
        let slot = self.active_frame;
        if self.frames[slot].state() != FrameState::Submitted {
            return Err(Error::InvalidResource(format!("frame {} ended without a submit", slot)));
        }
        let image_index = self
            .acquired_image
            .take()
            .ok_or_else(|| Error::InvalidResource("no acquired image to present".to_string()))?;

        self.frame_active = false;
        self.active_frame = (slot + 1) % self.frames.len();

        let render_finished = self.frames[slot].render_finished().handle();
        let status = self.swapchain.present(image_index, &[render_finished])?;
        if status.is_stale() {
            self.handle_surface_changes(false)?;
        }
        Ok(status)
    }

    // ===== SWAPCHAIN UPDATES =====

    /// Recreate the swapchain if the surface extent changed, or always with `force`
    ///
    /// Returns whether a new swapchain was created. Surfaces without a usable
    /// extent (undefined or minimized) are left alone.
    pub fn handle_surface_changes(&mut self, force: bool) -> Result<bool> {
        let capabilities = self.device.surface_capabilities(self.surface)?;
        let current = capabilities.current_extent;
        if current.is_undefined() || current.is_zero_area() {
            return Ok(false);
        }
        if current == self.surface_extent && !force {
            return Ok(false);
        }

        sf_debug!(
            SOURCE,
            "Surface {}x{} -> {}x{}, recreating swapchain",
            self.surface_extent.width,
            self.surface_extent.height,
            current.width,
            current.height
        );
        let transform = self.pre_transform;
        self.update_swapchain_extent_and_transform(current, transform)?;
        self.surface_extent = current;
        Ok(true)
    }

    /// Recreate the swapchain with `update` applied on top of the current properties
    ///
    /// Waits for the device to go idle, rebuilds the image targets and grows
    /// the frame ring when it follows the image count.
    pub fn update_swapchain(&mut self, update: &SwapchainUpdate) -> Result<()> {
        assert!(!self.frame_active, "swapchain updated during an active frame");
        self.device.wait_idle()?;

        let next = self.swapchain.recreate(update)?;
        self.targets.clear();
        self.swapchain = next;
        self.targets = Self::build_targets(&self.device, &self.swapchain)?;
        self.grow_frames()?;

        sf_info!(
            SOURCE,
            "Swapchain recreated: {}x{}, {} image(s)",
            self.swapchain.extent().width,
            self.swapchain.extent().height,
            self.swapchain.image_count()
        );
        Ok(())
    }

    pub fn update_swapchain_extent(&mut self, extent: Extent2D) -> Result<()> {
        self.update_swapchain(&SwapchainUpdate { extent: Some(extent), ..Default::default() })
    }

    pub fn update_swapchain_image_count(&mut self, image_count: u32) -> Result<()> {
        self.update_swapchain(&SwapchainUpdate { image_count: Some(image_count), ..Default::default() })
    }

    pub fn update_swapchain_image_usage(&mut self, image_usage: ImageUsage) -> Result<()> {
        self.update_swapchain(&SwapchainUpdate { image_usage: Some(image_usage), ..Default::default() })
    }

    /// `extent` is in surface space; rotated transforms swap it for the swapchain
    pub fn update_swapchain_extent_and_transform(&mut self, extent: Extent2D, transform: SurfaceTransform) -> Result<()> {
        let extent = if transform.swaps_dimensions() { extent.swapped() } else { extent };
        self.update_swapchain(&SwapchainUpdate {
            extent: Some(extent),
            transform: Some(transform),
            ..Default::default()
        })?;
        self.pre_transform = transform;
        Ok(())
    }

    fn grow_frames(&mut self) -> Result<()> {
        if self.config.frames_in_flight.is_some() {
            return Ok(());
        }
        let wanted = self.swapchain.image_count() as usize;
        let queue_family_index = self.device.queue_family_index(QueueKind::Graphics);
        while self.frames.len() < wanted {
            let index = self.frames.len();
            self.frames.push(FrameSlot::new(
                Arc::clone(&self.device),
                index,
                queue_family_index,
                self.config.thread_count,
                self.config.reset_mode,
            )?);
            sf_debug!(SOURCE, "Added frame slot {}", index);
        }
        Ok(())
    }

    // ===== GETTERS =====

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn surface(&self) -> SurfaceHandle {
        self.surface
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn swapchain_targets(&self) -> &[SwapchainTarget] {
        &self.targets
    }

    pub fn format(&self) -> Format {
        self.swapchain.format()
    }

    pub fn surface_extent(&self) -> Extent2D {
        self.surface_extent
    }

    pub fn pre_transform(&self) -> SurfaceTransform {
        self.pre_transform
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<&FrameSlot> {
        self.frames.get(index)
    }

    pub fn active_frame_index(&self) -> usize {
        self.active_frame
    }

    pub fn acquired_image_index(&self) -> Option<u32> {
        self.acquired_image
    }

    pub fn is_frame_active(&self) -> bool {
        self.frame_active
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            sf_error!(SOURCE, "wait_idle on teardown failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "render_context_tests.rs"]
mod tests;
