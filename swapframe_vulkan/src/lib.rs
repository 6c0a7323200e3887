/*!
# swapframe_vulkan

Vulkan backend for swapframe, built on ash and gpu-allocator.

[`VulkanDevice`] implements the core's `GraphicsDevice` trait: swapchains,
images and their memory, command pools, fences and semaphores. Validation
layer support is compiled in with the `vulkan-validation` feature and routes
every validation message to the swapframe logger.

```ignore
use std::sync::Arc;
use swapframe_core::swapframe::{DeviceConfig, FrameConfig, SwapchainDesc};
use swapframe_core::swapframe::frame::RenderContext;
use swapframe_vulkan::swapframe::VulkanDevice;

let device = Arc::new(VulkanDevice::new(&window, &DeviceConfig::default())?);
let surface = device.create_surface(&window)?;
let desc = SwapchainDesc::default().with_extent(VulkanDevice::window_extent(&window));
let mut context = RenderContext::new(device.clone(), surface, &desc, FrameConfig::default())?;
```
*/

mod vulkan_debug;
mod vulkan_device;
mod vulkan_format;

pub use vulkan_debug::{print_validation_stats_report, reset_validation_stats, validation_stats, ValidationStats};
pub use vulkan_device::VulkanDevice;

/// Namespace mirroring `swapframe_core::swapframe`
pub mod swapframe {
    pub use crate::vulkan_debug::{
        print_validation_stats_report, reset_validation_stats, validation_stats, ValidationStats,
    };
    pub use crate::vulkan_device::VulkanDevice;
}
