/// Image views and their registration with the parent image
///
/// A view registers its handle in the parent's view set on creation and must
/// be torn down with [`ImageView::destroy`] against the same image. Dropping a
/// view without `destroy` releases the native view but leaves the parent's set
/// untouched, so the parent's own destruction will flag it.

use crate::device::{DeviceResource, Format, ImageHandle, ImageViewDesc, ImageViewHandle, ImageViewType, SubresourceRange};
use crate::error::Result;
use crate::resource::image::{aspect_for_format, Image};
use crate::{sf_error, sf_trace};

const SOURCE: &str = "swapframe::ImageView";

pub struct ImageView {
    resource: DeviceResource<ImageViewHandle>,
    image: ImageHandle,
    view_type: ImageViewType,
    format: Format,
    range: SubresourceRange,
}

impl ImageView {
    /// View of every mip and layer, in the image's own format
    pub fn new(image: &mut Image, view_type: ImageViewType) -> Result<Self> {
        Self::with_subresource(image, view_type, Format::Undefined, 0, 0, 0, 0)
    }

    /// View of a subresource range
    ///
    /// `Format::Undefined` inherits the image format; a mip or layer count of
    /// zero covers every level or layer from the base onwards.
    pub fn with_subresource(
        image: &mut Image,
        view_type: ImageViewType,
        format: Format,
        base_mip_level: u32,
        base_array_layer: u32,
        mip_levels: u32,
        array_layers: u32,
    ) -> Result<Self> {
        let format = if format == Format::Undefined { image.format() } else { format };
        let level_count = if mip_levels == 0 {
            image.mip_level_count().saturating_sub(base_mip_level)
        } else {
            mip_levels
        };
        let layer_count = if array_layers == 0 {
            image.array_layer_count().saturating_sub(base_array_layer)
        } else {
            array_layers
        };
        let range = SubresourceRange {
            aspect: aspect_for_format(format),
            base_mip_level,
            level_count,
            base_array_layer,
            layer_count,
        };

        let device = image.device().clone();
        let handle = device
            .create_image_view(&ImageViewDesc { image: image.handle(), view_type, format, range })
            .map_err(|e| {
                sf_error!(SOURCE, "Failed to create view of {:?}: {}", image.handle(), e);
                e
            })?;
        image.register_view(handle);
        sf_trace!(SOURCE, "Registered view {:?} on {:?}", handle, image.handle());

        Ok(Self {
            resource: DeviceResource::new(device, handle),
            image: image.handle(),
            view_type,
            format,
            range,
        })
    }

    pub fn handle(&self) -> ImageViewHandle {
        self.resource.handle()
    }

    /// Handle of the image this view was created from
    pub fn image(&self) -> ImageHandle {
        self.image
    }

    pub fn view_type(&self) -> ImageViewType {
        self.view_type
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn subresource_range(&self) -> SubresourceRange {
        self.range
    }

    /// Deregister from `image` and destroy the native view
    ///
    /// Panics if `image` is not the image this view was created from.
    pub fn destroy(self, image: &mut Image) {
        assert_eq!(
            image.handle(),
            self.image,
            "ImageView {:?} destroyed against the wrong image",
            self.handle()
        );
        image.unregister_view(self.handle());
        sf_trace!(SOURCE, "Unregistered view {:?} from {:?}", self.handle(), self.image);
    }
}

impl std::fmt::Debug for ImageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageView")
            .field("handle", &self.handle())
            .field("image", &self.image)
            .field("format", &self.format)
            .finish()
    }
}
