//! Opaque native handles and the move-only owning wrapper
//!
//! Handles are plain `u64` values with 0 reserved for null, so the core never
//! depends on a backend's handle types. [`DeviceResource`] pairs a handle with
//! the device that created it and destroys it exactly once.

use std::fmt;
use std::sync::Arc;

use crate::device::GraphicsDevice;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(u64);

        impl $name {
            pub const NULL: Self = Self(0);

            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn as_raw(self) -> u64 {
                self.0
            }

            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }
    };
}

define_handle!(
    /// Native image
    ImageHandle
);
define_handle!(
    /// Native image view
    ImageViewHandle
);
define_handle!(
    /// Native command pool
    CommandPoolHandle
);
define_handle!(
    /// Native command buffer (owned by its pool, never destroyed alone)
    CommandBufferHandle
);
define_handle!(FenceHandle);
define_handle!(SemaphoreHandle);
define_handle!(SwapchainHandle);
define_handle!(
    /// Presentation surface, owned by whoever created it from a window
    SurfaceHandle
);

// ===== OWNED DEVICE OBJECTS =====

/// A native handle type that a [`GraphicsDevice`] knows how to destroy
pub trait DeviceObject: Copy + Eq + fmt::Debug {
    fn null() -> Self;

    fn destroy(self, device: &dyn GraphicsDevice);

    fn is_null(self) -> bool {
        self == Self::null()
    }
}

impl DeviceObject for ImageHandle {
    fn null() -> Self {
        ImageHandle::NULL
    }
    fn destroy(self, device: &dyn GraphicsDevice) {
        device.destroy_image(self);
    }
}

impl DeviceObject for ImageViewHandle {
    fn null() -> Self {
        ImageViewHandle::NULL
    }
    fn destroy(self, device: &dyn GraphicsDevice) {
        device.destroy_image_view(self);
    }
}

impl DeviceObject for CommandPoolHandle {
    fn null() -> Self {
        CommandPoolHandle::NULL
    }
    fn destroy(self, device: &dyn GraphicsDevice) {
        device.destroy_command_pool(self);
    }
}

impl DeviceObject for FenceHandle {
    fn null() -> Self {
        FenceHandle::NULL
    }
    fn destroy(self, device: &dyn GraphicsDevice) {
        device.destroy_fence(self);
    }
}

impl DeviceObject for SemaphoreHandle {
    fn null() -> Self {
        SemaphoreHandle::NULL
    }
    fn destroy(self, device: &dyn GraphicsDevice) {
        device.destroy_semaphore(self);
    }
}

impl DeviceObject for SwapchainHandle {
    fn null() -> Self {
        SwapchainHandle::NULL
    }
    fn destroy(self, device: &dyn GraphicsDevice) {
        device.destroy_swapchain(self);
    }
}

/// Owning wrapper around a native handle
///
/// Not `Clone`: ownership moves with the value, and [`take`](Self::take) moves
/// it out of a place that cannot be moved from (a field behind `&mut`). The
/// handle is destroyed exactly once, when the last owner drops. A wrapper whose
/// handle is null drops without touching the device.
pub struct DeviceResource<H: DeviceObject> {
    device: Arc<dyn GraphicsDevice>,
    handle: H,
}

impl<H: DeviceObject> DeviceResource<H> {
    pub fn new(device: Arc<dyn GraphicsDevice>, handle: H) -> Self {
        Self { device, handle }
    }

    /// An inert wrapper that owns nothing
    pub fn null(device: Arc<dyn GraphicsDevice>) -> Self {
        Self { device, handle: H::null() }
    }

    pub fn handle(&self) -> H {
        self.handle
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }

    /// Move ownership into a new wrapper, leaving `self` null
    pub fn take(&mut self) -> Self {
        let handle = std::mem::replace(&mut self.handle, H::null());
        Self { device: Arc::clone(&self.device), handle }
    }

    /// Give up ownership without destroying the handle
    pub fn release(mut self) -> H {
        std::mem::replace(&mut self.handle, H::null())
    }
}

impl<H: DeviceObject> fmt::Debug for DeviceResource<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceResource").field("handle", &self.handle).finish()
    }
}

impl<H: DeviceObject> Drop for DeviceResource<H> {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            let handle = std::mem::replace(&mut self.handle, H::null());
            handle.destroy(self.device.as_ref());
        }
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
