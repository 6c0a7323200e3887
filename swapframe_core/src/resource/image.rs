//! Image resource and its builder
//!
//! An [`Image`] either owns a device allocation (built through
//! [`ImageBuilder`]) or wraps a presentation image owned by a swapchain.
//! Either way it records the set of [`ImageView`](super::ImageView)s created
//! from it; destroying an image while that set is non-empty panics.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::device::{
    DeviceResource, Extent2D, Extent3D, Format, GraphicsDevice, ImageAspect,
    ImageCompression, ImageCompressionProperties, ImageCreateFlags, ImageDesc, ImageExtension,
    ImageHandle, ImageTiling, ImageType, ImageUsage, ImageViewHandle, MemoryLocation,
    FixedRateCompression, SampleCount, SubresourceRange,
};
use crate::error::{Error, Result};
use crate::{sf_debug, sf_error};

const SOURCE: &str = "swapframe::Image";

// ===== BUILDER =====

/// Builder for device-owned images
///
/// Defaults: 2D, one mip, one layer, `R8G8B8A8_UNORM`, one sample, optimal
/// tiling, GPU-only memory, no usage.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    desc: ImageDesc,
}

impl ImageBuilder {
    pub fn new(extent: Extent3D) -> Self {
        Self {
            desc: ImageDesc {
                name: String::new(),
                image_type: ImageType::Tex2D,
                format: Format::R8G8B8A8_UNORM,
                extent,
                mip_levels: 1,
                array_layers: 1,
                samples: SampleCount::S1,
                tiling: ImageTiling::Optimal,
                usage: ImageUsage::empty(),
                flags: ImageCreateFlags::empty(),
                memory_location: MemoryLocation::GpuOnly,
                extensions: Vec::new(),
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.desc.name = name.into();
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.desc.format = format;
        self
    }

    pub fn with_usage(mut self, usage: ImageUsage) -> Self {
        self.desc.usage = usage;
        self
    }

    pub fn with_flags(mut self, flags: ImageCreateFlags) -> Self {
        self.desc.flags = flags;
        self
    }

    pub fn with_image_type(mut self, image_type: ImageType) -> Self {
        self.desc.image_type = image_type;
        self
    }

    pub fn with_array_layers(mut self, array_layers: u32) -> Self {
        self.desc.array_layers = array_layers;
        self
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.desc.mip_levels = mip_levels;
        self
    }

    pub fn with_sample_count(mut self, samples: SampleCount) -> Self {
        self.desc.samples = samples;
        self
    }

    pub fn with_tiling(mut self, tiling: ImageTiling) -> Self {
        self.desc.tiling = tiling;
        self
    }

    pub fn with_memory_location(mut self, location: MemoryLocation) -> Self {
        self.desc.memory_location = location;
        self
    }

    /// Chain an extension structure onto the create info
    pub fn with_extension(mut self, extension: ImageExtension) -> Self {
        self.desc.extensions.push(extension);
        self
    }

    /// Shorthand for chaining an explicit compression request
    pub fn with_compression(self, compression: ImageCompression, fixed_rate: FixedRateCompression) -> Self {
        self.with_extension(ImageExtension::Compression(ImageCompressionProperties {
            compression,
            fixed_rate,
        }))
    }

    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    fn validate(&self) -> Result<()> {
        let desc = &self.desc;
        let extent = desc.extent;
        if extent.width == 0 || extent.height == 0 || extent.depth == 0 {
            return Err(Error::AllocationFailed(format!(
                "image '{}' has zero extent {}x{}x{}",
                desc.name, extent.width, extent.height, extent.depth
            )));
        }
        if desc.mip_levels == 0 || desc.array_layers == 0 {
            return Err(Error::AllocationFailed(format!(
                "image '{}' needs at least one mip level and one layer",
                desc.name
            )));
        }
        if desc.mip_levels > extent.max_mip_levels() {
            return Err(Error::AllocationFailed(format!(
                "image '{}' requests {} mip levels, extent allows {}",
                desc.name,
                desc.mip_levels,
                extent.max_mip_levels()
            )));
        }
        if desc.image_type != ImageType::Tex3D && extent.depth != 1 {
            return Err(Error::AllocationFailed(format!(
                "image '{}' has depth {} but is not 3D",
                desc.name, extent.depth
            )));
        }
        if desc.format == Format::Undefined {
            return Err(Error::AllocationFailed(format!("image '{}' has undefined format", desc.name)));
        }
        Ok(())
    }

    /// Allocate memory and create the image
    pub fn build(self, device: &Arc<dyn GraphicsDevice>) -> Result<Image> {
        self.validate()?;
        let handle = device.create_image(&self.desc).map_err(|e| {
            sf_error!(SOURCE, "Failed to create image '{}': {}", self.desc.name, e);
            e
        })?;
        sf_debug!(
            SOURCE,
            "Created image '{}' {:?} {}x{}x{} ({} mips, {} layers)",
            self.desc.name,
            self.desc.format,
            self.desc.extent.width,
            self.desc.extent.height,
            self.desc.extent.depth,
            self.desc.mip_levels,
            self.desc.array_layers
        );
        let desc = self.desc;
        Ok(Image {
            device: Arc::clone(device),
            resource: Some(DeviceResource::new(Arc::clone(device), handle)),
            handle,
            image_type: desc.image_type,
            extent: desc.extent,
            format: desc.format,
            sample_count: desc.samples,
            usage: desc.usage,
            tiling: desc.tiling,
            flags: desc.flags,
            mip_levels: desc.mip_levels,
            array_layers: desc.array_layers,
            views: FxHashSet::default(),
        })
    }
}

// ===== IMAGE =====

pub struct Image {
    device: Arc<dyn GraphicsDevice>,
    /// `None` for presentation images
    resource: Option<DeviceResource<ImageHandle>>,
    handle: ImageHandle,
    image_type: ImageType,
    extent: Extent3D,
    format: Format,
    sample_count: SampleCount,
    usage: ImageUsage,
    tiling: ImageTiling,
    flags: ImageCreateFlags,
    mip_levels: u32,
    array_layers: u32,
    views: FxHashSet<ImageViewHandle>,
}

impl Image {
    /// Wrap a presentation image; dropping the wrapper never destroys it
    pub fn from_presentation(
        device: Arc<dyn GraphicsDevice>,
        handle: ImageHandle,
        extent: Extent2D,
        format: Format,
        usage: ImageUsage,
    ) -> Self {
        Self {
            device,
            resource: None,
            handle,
            image_type: ImageType::Tex2D,
            extent: extent.into(),
            format,
            sample_count: SampleCount::S1,
            usage,
            tiling: ImageTiling::Optimal,
            flags: ImageCreateFlags::empty(),
            mip_levels: 1,
            array_layers: 1,
            views: FxHashSet::default(),
        }
    }

    pub fn handle(&self) -> ImageHandle {
        self.handle
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    pub fn extent(&self) -> Extent3D {
        self.extent
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn sample_count(&self) -> SampleCount {
        self.sample_count
    }

    pub fn usage(&self) -> ImageUsage {
        self.usage
    }

    pub fn tiling(&self) -> ImageTiling {
        self.tiling
    }

    pub fn flags(&self) -> ImageCreateFlags {
        self.flags
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_levels
    }

    pub fn array_layer_count(&self) -> u32 {
        self.array_layers
    }

    /// True when dropping this image releases device memory
    pub fn is_owned(&self) -> bool {
        self.resource.is_some()
    }

    /// The whole image, with the aspect implied by its format
    pub fn subresource(&self) -> SubresourceRange {
        SubresourceRange {
            aspect: aspect_for_format(self.format),
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.array_layers,
        }
    }

    /// Views currently created from this image
    pub fn views(&self) -> &FxHashSet<ImageViewHandle> {
        &self.views
    }

    /// Memory footprint reported by the device
    pub fn image_required_size(&self) -> u64 {
        self.device.image_memory_size(self.handle)
    }

    /// Compression the driver applied, which may differ from the request
    pub fn applied_compression(&self) -> ImageCompressionProperties {
        self.device.image_compression(self.handle)
    }

    pub(crate) fn register_view(&mut self, view: ImageViewHandle) {
        self.views.insert(view);
    }

    pub(crate) fn unregister_view(&mut self, view: ImageViewHandle) -> bool {
        self.views.remove(&view)
    }

    /// Destroy the image now; panics if views are still alive
    pub fn destroy(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("handle", &self.handle)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("owned", &self.is_owned())
            .field("views", &self.views.len())
            .finish()
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        // Already unwinding: a second panic would abort and hide the first
        if std::thread::panicking() {
            return;
        }
        assert!(
            self.views.is_empty(),
            "Image {:?} destroyed while {} view(s) still reference it",
            self.handle,
            self.views.len()
        );
        if let Some(resource) = self.resource.take() {
            drop(resource);
            sf_debug!(SOURCE, "Destroyed image {:?}", self.handle);
        }
    }
}

/// Depth formats address the depth aspect, everything else color
pub fn aspect_for_format(format: Format) -> ImageAspect {
    if format.is_depth() {
        ImageAspect::DEPTH
    } else {
        ImageAspect::COLOR
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
