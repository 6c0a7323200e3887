//! Swapchain: negotiated presentation images
//!
//! A swapchain is created from a [`SwapchainDesc`] or recreated from a
//! predecessor with a [`SwapchainUpdate`]. Recreation is additive: every
//! property the update leaves as `None` is requested again with the
//! predecessor's negotiated value. The predecessor's native swapchain is
//! retired into the new one and destroyed on the new swapchain's first
//! present.
//!
//! The swapchain never recreates itself. Acquire and present report
//! staleness through [`AcquireStatus`] and the caller decides what to do.

use std::sync::Arc;

use crate::config::SwapchainDesc;
use crate::device::{
    AcquireStatus, AcquiredImage, CompositeAlpha, DeviceResource, Extent2D, FenceHandle,
    FixedRateCompression, Format, GraphicsDevice, ImageCompression, ImageCompressionProperties,
    ImageHandle, ImageUsage, PresentMode, SemaphoreHandle, SurfaceFormat, SurfaceFormatCompression,
    SurfaceHandle, SwapchainCreateDesc, SwapchainHandle, SurfaceTransform,
};
use crate::error::{Error, Result};
use crate::presentation::negotiation::{
    choose_array_layers, choose_composite_alpha, choose_compression, choose_extent,
    choose_image_count, choose_image_usage, choose_present_mode, choose_surface_format,
    choose_transform,
};
use crate::{sf_debug, sf_error, sf_info, sf_warn};

const SOURCE: &str = "swapframe::Swapchain";

/// Properties applied to a swapchain after negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainProperties {
    pub extent: Extent2D,
    pub image_count: u32,
    pub surface_format: SurfaceFormat,
    pub array_layers: u32,
    pub image_usage: ImageUsage,
    pub pre_transform: SurfaceTransform,
    pub composite_alpha: CompositeAlpha,
    pub present_mode: PresentMode,
    /// Compression passed to the driver
    pub compression: ImageCompressionProperties,
}

/// Properties to change when recreating; `None` keeps the predecessor's value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapchainUpdate {
    pub extent: Option<Extent2D>,
    pub image_count: Option<u32>,
    pub image_usage: Option<ImageUsage>,
    pub transform: Option<SurfaceTransform>,
    pub present_mode: Option<PresentMode>,
    pub compression: Option<(ImageCompression, FixedRateCompression)>,
}

pub struct Swapchain {
    device: Arc<dyn GraphicsDevice>,
    surface: SurfaceHandle,
    resource: DeviceResource<SwapchainHandle>,
    /// Retired swapchains, oldest first, kept alive until the first present
    predecessors: Vec<DeviceResource<SwapchainHandle>>,
    images: Vec<ImageHandle>,
    properties: SwapchainProperties,
    present_mode_priority: Vec<PresentMode>,
    surface_format_priority: Vec<SurfaceFormat>,
}

impl Swapchain {
    /// Negotiate and create a swapchain for `surface`
    pub fn new(device: Arc<dyn GraphicsDevice>, surface: SurfaceHandle, desc: &SwapchainDesc) -> Result<Self> {
        Self::create(device, surface, desc, None)
    }

    /// Recreate from `self`, changing only what `update` names
    ///
    /// On success `self` is left retired: its native swapchain now belongs to
    /// the returned swapchain, and every further call on `self` fails. Any
    /// swapchains `self` was still holding move along with it.
    ///
    /// On failure `self` keeps its handle and remains valid to destroy. The
    /// device may already have retired it, so later acquires on it can report
    /// `OutOfDate`.
    pub fn recreate(&mut self, update: &SwapchainUpdate) -> Result<Swapchain> {
        if self.is_retired() {
            return Err(Error::InvalidResource("cannot recreate a retired swapchain".to_string()));
        }
        let previous = self.properties;
        let (compression, fixed_rate) = update
            .compression
            .unwrap_or((previous.compression.compression, previous.compression.fixed_rate));
        let desc = SwapchainDesc {
            extent: update.extent.unwrap_or(previous.extent),
            image_count: update.image_count.unwrap_or(previous.image_count),
            surface_format: Some(previous.surface_format),
            surface_format_priority: self.surface_format_priority.clone(),
            present_mode: update.present_mode.unwrap_or(previous.present_mode),
            present_mode_priority: self.present_mode_priority.clone(),
            array_layers: previous.array_layers,
            image_usage: update.image_usage.unwrap_or(previous.image_usage),
            transform: update.transform.unwrap_or(previous.pre_transform),
            composite_alpha: previous.composite_alpha,
            compression,
            fixed_rate,
        };

        let old = self.resource.handle();
        let mut next = Self::create(Arc::clone(&self.device), self.surface, &desc, Some(old))?;
        next.predecessors = std::mem::take(&mut self.predecessors);
        next.predecessors.push(self.resource.take());
        self.images.clear();
        sf_debug!(SOURCE, "Retired {:?} in favor of {:?}", old, next.handle());
        Ok(next)
    }

    pub fn recreate_with_extent(&mut self, extent: Extent2D) -> Result<Swapchain> {
        self.recreate(&SwapchainUpdate { extent: Some(extent), ..Default::default() })
    }

    pub fn recreate_with_image_count(&mut self, image_count: u32) -> Result<Swapchain> {
        self.recreate(&SwapchainUpdate { image_count: Some(image_count), ..Default::default() })
    }

    pub fn recreate_with_image_usage(&mut self, image_usage: ImageUsage) -> Result<Swapchain> {
        self.recreate(&SwapchainUpdate { image_usage: Some(image_usage), ..Default::default() })
    }

    pub fn recreate_with_extent_and_transform(
        &mut self,
        extent: Extent2D,
        transform: SurfaceTransform,
    ) -> Result<Swapchain> {
        self.recreate(&SwapchainUpdate {
            extent: Some(extent),
            transform: Some(transform),
            ..Default::default()
        })
    }

    pub fn recreate_with_compression(
        &mut self,
        compression: ImageCompression,
        fixed_rate: FixedRateCompression,
    ) -> Result<Swapchain> {
        self.recreate(&SwapchainUpdate {
            compression: Some((compression, fixed_rate)),
            ..Default::default()
        })
    }

    fn create(
        device: Arc<dyn GraphicsDevice>,
        surface: SurfaceHandle,
        desc: &SwapchainDesc,
        old_swapchain: Option<SwapchainHandle>,
    ) -> Result<Self> {
        let properties = Self::negotiate(device.as_ref(), surface, desc)?;

        let create_desc = SwapchainCreateDesc {
            surface,
            min_image_count: properties.image_count,
            surface_format: properties.surface_format,
            extent: properties.extent,
            array_layers: properties.array_layers,
            usage: properties.image_usage,
            transform: properties.pre_transform,
            composite_alpha: properties.composite_alpha,
            present_mode: properties.present_mode,
            compression: properties.compression,
            old_swapchain: old_swapchain.unwrap_or(SwapchainHandle::NULL),
        };
        let handle = device.create_swapchain(&create_desc).map_err(|e| {
            sf_error!(SOURCE, "Failed to create swapchain: {}", e);
            e
        })?;
        let resource = DeviceResource::new(Arc::clone(&device), handle);
        let images = device.swapchain_images(handle)?;

        sf_info!(
            SOURCE,
            "Created {:?}: {}x{} {:?} {:?}, {} images, {:?}",
            handle,
            properties.extent.width,
            properties.extent.height,
            properties.surface_format.format,
            properties.surface_format.color_space,
            images.len(),
            properties.present_mode
        );

        Ok(Self {
            device,
            surface,
            resource,
            predecessors: Vec::new(),
            images,
            properties,
            present_mode_priority: desc.present_mode_priority.clone(),
            surface_format_priority: desc.surface_format_priority.clone(),
        })
    }

    fn negotiate(device: &dyn GraphicsDevice, surface: SurfaceHandle, desc: &SwapchainDesc) -> Result<SwapchainProperties> {
        let capabilities = device.surface_capabilities(surface)?;
        let formats = device.surface_formats(surface)?;
        let present_modes = device.surface_present_modes(surface)?;

        let surface_format = choose_surface_format(desc.surface_format, &formats, &desc.surface_format_priority)
            .ok_or_else(|| {
                sf_error!(SOURCE, "Surface {:?} reports no formats", surface);
                Error::InitializationFailed("surface reports no formats".to_string())
            })?;
        let present_mode = choose_present_mode(desc.present_mode, &present_modes, &desc.present_mode_priority);
        let extent = choose_extent(desc.extent, &capabilities);
        let image_count = choose_image_count(desc.image_count, &capabilities);
        let array_layers = choose_array_layers(desc.array_layers, &capabilities);
        let image_usage = choose_image_usage(
            desc.image_usage,
            capabilities.supported_usage,
            device.format_supports_storage(surface_format.format),
        )
        .ok_or_else(|| {
            sf_error!(SOURCE, "Surface {:?} supports none of the fallback image usages", surface);
            Error::InitializationFailed("no supported swapchain image usage".to_string())
        })?;
        let pre_transform = choose_transform(desc.transform, &capabilities);
        let composite_alpha = choose_composite_alpha(desc.composite_alpha, capabilities.supported_composite_alpha)
            .ok_or_else(|| {
                sf_error!(SOURCE, "Surface {:?} supports no composite alpha mode", surface);
                Error::InitializationFailed("no supported composite alpha mode".to_string())
            })?;

        let device_supports_control = device.supports_compression_control();
        let format_compression = if device_supports_control && desc.compression != ImageCompression::Default {
            device.surface_format_compression(surface)?
        } else {
            Vec::new()
        };
        let compression = choose_compression(
            desc.compression,
            desc.fixed_rate,
            device_supports_control,
            surface_format,
            &format_compression,
        );

        Ok(SwapchainProperties {
            extent,
            image_count,
            surface_format,
            array_layers,
            image_usage,
            pre_transform,
            composite_alpha,
            present_mode,
            compression,
        })
    }

    /// Every surface format with the compression it supports
    ///
    /// Empty when the device has no compression control.
    pub fn query_supported_fixed_rate_compression(
        device: &dyn GraphicsDevice,
        surface: SurfaceHandle,
    ) -> Result<Vec<SurfaceFormatCompression>> {
        if !device.supports_compression_control() {
            sf_warn!(SOURCE, "Compression control unavailable, no fixed-rate formats to report");
            return Ok(Vec::new());
        }
        device.surface_format_compression(surface)
    }

    // ===== FRAME OPERATIONS =====

    /// Acquire the next presentable image
    ///
    /// `Suboptimal` and `OutOfDate` are returned as statuses, never as errors.
    pub fn acquire_next_image(
        &self,
        timeout: u64,
        semaphore: SemaphoreHandle,
        fence: Option<FenceHandle>,
    ) -> Result<AcquiredImage> {
        self.check_live()?;
        let acquired = self.device.acquire_next_image(
            self.resource.handle(),
            timeout,
            semaphore,
            fence.unwrap_or(FenceHandle::NULL),
        )?;
        if acquired.status.is_stale() {
            sf_debug!(SOURCE, "Acquire on {:?} reported {:?}", self.resource.handle(), acquired.status);
        }
        Ok(acquired)
    }

    /// Present `image_index` once `wait_semaphores` signal
    ///
    /// The first present that reaches the device releases the retired
    /// predecessor.
    pub fn present(&mut self, image_index: u32, wait_semaphores: &[SemaphoreHandle]) -> Result<AcquireStatus> {
        self.check_live()?;
        let status = self
            .device
            .queue_present(self.resource.handle(), image_index, wait_semaphores)?;
        self.release_predecessor();
        Ok(status)
    }

    /// Destroy every retired predecessor now
    pub fn release_predecessor(&mut self) {
        for retired in self.predecessors.drain(..) {
            sf_debug!(SOURCE, "Destroying retired {:?}", retired.handle());
            drop(retired);
        }
    }

    fn check_live(&self) -> Result<()> {
        if self.is_retired() {
            return Err(Error::InvalidResource("swapchain has been retired".to_string()));
        }
        Ok(())
    }

    // ===== GETTERS =====

    pub fn handle(&self) -> SwapchainHandle {
        self.resource.handle()
    }

    pub fn surface(&self) -> SurfaceHandle {
        self.surface
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn is_retired(&self) -> bool {
        self.resource.is_null()
    }

    pub fn has_predecessor(&self) -> bool {
        !self.predecessors.is_empty()
    }

    pub fn properties(&self) -> &SwapchainProperties {
        &self.properties
    }

    pub fn extent(&self) -> Extent2D {
        self.properties.extent
    }

    pub fn format(&self) -> Format {
        self.properties.surface_format.format
    }

    pub fn surface_format(&self) -> SurfaceFormat {
        self.properties.surface_format
    }

    /// Images actually created, which may exceed the negotiated minimum
    pub fn images(&self) -> &[ImageHandle] {
        &self.images
    }

    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn array_layers(&self) -> u32 {
        self.properties.array_layers
    }

    pub fn usage(&self) -> ImageUsage {
        self.properties.image_usage
    }

    pub fn transform(&self) -> SurfaceTransform {
        self.properties.pre_transform
    }

    pub fn composite_alpha(&self) -> CompositeAlpha {
        self.properties.composite_alpha
    }

    pub fn present_mode(&self) -> PresentMode {
        self.properties.present_mode
    }

    /// Compression requested from the driver after negotiation
    pub fn requested_compression(&self) -> ImageCompressionProperties {
        self.properties.compression
    }

    /// Compression the driver applied to the presentation images
    pub fn applied_compression(&self) -> ImageCompressionProperties {
        self.images
            .first()
            .map(|image| self.device.image_compression(*image))
            .unwrap_or_default()
    }

    pub fn present_mode_priority(&self) -> &[PresentMode] {
        &self.present_mode_priority
    }

    pub fn surface_format_priority(&self) -> &[SurfaceFormat] {
        &self.surface_format_priority
    }
}

impl std::fmt::Debug for Swapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("handle", &self.resource.handle())
            .field("surface", &self.surface)
            .field("properties", &self.properties)
            .field("images", &self.images.len())
            .field(
                "predecessors",
                &self.predecessors.iter().map(|p| p.handle()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
