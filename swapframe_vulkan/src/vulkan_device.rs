//! VulkanDevice: ash implementation of [`GraphicsDevice`]
//!
//! Core handles carry the raw Vulkan handle values, so conversions in both
//! directions are a `from_raw`/`as_raw` pair. Image memory comes from
//! gpu-allocator and is tracked per image until the image is destroyed.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::{FxHashMap, FxHashSet};
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};
use swapframe_core::swapframe::device::{
    AcquireStatus, AcquiredImage, CommandBufferHandle, CommandBufferLevel, CommandPoolFlags,
    CommandPoolHandle, Extent2D, FenceHandle, Format, GraphicsDevice, ImageCompression,
    ImageCompressionProperties, ImageDesc, ImageExtension, ImageHandle, ImageTiling, ImageViewDesc,
    ImageViewHandle, PresentMode, QueueKind, SemaphoreHandle, SubmitDesc, SurfaceCapabilities,
    SurfaceFormat, SurfaceFormatCompression, SurfaceHandle, SwapchainCreateDesc, SwapchainHandle,
};
use swapframe_core::swapframe::{DeviceConfig, Error, Result};
use swapframe_core::{sf_debug, sf_error, sf_info, sf_warn};
use winit::window::Window;

use crate::vulkan_format::*;

const SOURCE: &str = "swapframe::vulkan";

/// Log a failed Vulkan call and convert it
fn vk_fail(result: vk::Result, context: &str) -> Error {
    sf_error!(SOURCE, "{} failed: {:?}", context, result);
    vk_result_to_error(result, context)
}

fn init_fail(context: &str, detail: impl std::fmt::Debug) -> Error {
    sf_error!(SOURCE, "{}: {:?}", context, detail);
    Error::InitializationFailed(format!("{}: {:?}", context, detail))
}

fn init_error(message: &str) -> Error {
    sf_error!(SOURCE, "{}", message);
    Error::InitializationFailed(message.to_string())
}

fn has_extension(available: &[vk::ExtensionProperties], name: &CStr) -> bool {
    available
        .iter()
        .any(|props| props.extension_name_as_c_str().is_ok_and(|ext| ext == name))
}

/// Vulkan device
///
/// Owns the instance, the logical device, the queues and the memory
/// allocator. Surfaces created through [`VulkanDevice::create_surface`] are
/// destroyed with the device if the caller does not destroy them first.
pub struct VulkanDevice {
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,

    graphics_queue: vk::Queue,
    graphics_queue_family: u32,
    present_queue: vk::Queue,
    present_queue_family: u32,
    /// Serializes every queue access (submit, present, wait idle)
    queue_lock: Mutex<()>,

    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    surface_capabilities2_loader: Option<ash::khr::get_surface_capabilities2::Instance>,
    /// Present only when compression control is enabled on the device
    compression_loader: Option<ash::ext::image_compression_control::Device>,

    /// Dropped before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,
    image_allocations: Mutex<FxHashMap<u64, Allocation>>,
    surfaces: Mutex<FxHashSet<u64>>,

    debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanDevice {
    /// Create a device able to present to `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &DeviceConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_fail("Failed to load Vulkan library", e))?;

            let app_name = CString::new(config.app_name.clone())
                .map_err(|e| init_fail("Invalid application name", e))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"swapframe")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window
                .display_handle()
                .map_err(|e| init_fail("Failed to get display handle", e))?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_fail("Failed to get required extensions", e))?
                .to_vec();

            let available_instance_extensions = entry
                .enumerate_instance_extension_properties(None)
                .map_err(|e| init_fail("Failed to enumerate instance extensions", e))?;
            let surface_capabilities2 =
                has_extension(&available_instance_extensions, ash::khr::get_surface_capabilities2::NAME);
            if surface_capabilities2 {
                extension_names.push(ash::khr::get_surface_capabilities2::NAME.as_ptr());
            }

            let enable_validation = cfg!(feature = "vulkan-validation") && config.enable_validation;
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if enable_validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_fail("Failed to create instance", e))?;

            #[cfg(feature = "vulkan-validation")]
            let (debug_utils_loader, debug_messenger) = if enable_validation {
                Self::create_debug_messenger(&entry, &instance, config)?
            } else {
                (None, None)
            };
            #[cfg(not(feature = "vulkan-validation"))]
            let (debug_utils_loader, debug_messenger) = (None, None);

            // Temporary surface for queue family selection
            let window_handle = window
                .window_handle()
                .map_err(|e| init_fail("Failed to get window handle", e))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_fail("Failed to create surface", e))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let physical_device = instance
                .enumerate_physical_devices()
                .map_err(|e| init_fail("Failed to enumerate physical devices", e))?
                .into_iter()
                .next()
                .ok_or_else(|| init_error("No Vulkan-capable GPU found"))?;

            let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
            let graphics_family_index = queue_families
                .iter()
                .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|i| i as u32)
                .ok_or_else(|| init_error("No graphics queue family found"))?;
            let present_family_index = (0..queue_families.len() as u32)
                .find(|&i| {
                    surface_loader
                        .get_physical_device_surface_support(physical_device, i, surface)
                        .unwrap_or(false)
                })
                .ok_or_else(|| init_error("No present queue family found"))?;

            surface_loader.destroy_surface(surface, None);

            // Compression control needs both device extensions, both features and
            // per-format surface queries
            let available_device_extensions = instance
                .enumerate_device_extension_properties(physical_device)
                .map_err(|e| init_fail("Failed to enumerate device extensions", e))?;
            let compression_extensions = has_extension(
                &available_device_extensions,
                ash::ext::image_compression_control::NAME,
            ) && has_extension(
                &available_device_extensions,
                ash::ext::image_compression_control_swapchain::NAME,
            );
            let compression_control = compression_extensions
                && surface_capabilities2
                && Self::compression_features_supported(&instance, physical_device);

            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_family_index)
                .queue_priorities(&queue_priorities)];
            if present_family_index != graphics_family_index {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(present_family_index)
                        .queue_priorities(&queue_priorities),
                );
            }

            let mut device_extension_names = vec![ash::khr::swapchain::NAME.as_ptr()];
            if compression_control {
                device_extension_names.push(ash::ext::image_compression_control::NAME.as_ptr());
                device_extension_names.push(ash::ext::image_compression_control_swapchain::NAME.as_ptr());
            }

            let mut compression_features =
                vk::PhysicalDeviceImageCompressionControlFeaturesEXT::default().image_compression_control(true);
            let mut swapchain_compression_features =
                vk::PhysicalDeviceImageCompressionControlSwapchainFeaturesEXT::default()
                    .image_compression_control_swapchain(true);
            let mut device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names);
            if compression_control {
                device_create_info = device_create_info
                    .push_next(&mut compression_features)
                    .push_next(&mut swapchain_compression_features);
            }

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_fail("Failed to create logical device", e))?;

            let graphics_queue = device.get_device_queue(graphics_family_index, 0);
            let present_queue = device.get_device_queue(present_family_index, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_fail("Failed to create GPU allocator", e))?;

            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);
            let surface_capabilities2_loader = surface_capabilities2
                .then(|| ash::khr::get_surface_capabilities2::Instance::new(&entry, &instance));
            let compression_loader =
                compression_control.then(|| ash::ext::image_compression_control::Device::new(&instance, &device));

            let device_name = instance
                .get_physical_device_properties(physical_device)
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());
            sf_info!(
                SOURCE,
                "Vulkan device ready: {} (graphics family {}, present family {}, compression control {})",
                device_name,
                graphics_family_index,
                present_family_index,
                compression_control
            );

            Ok(Self {
                entry,
                instance,
                physical_device,
                device,
                graphics_queue,
                graphics_queue_family: graphics_family_index,
                present_queue,
                present_queue_family: present_family_index,
                queue_lock: Mutex::new(()),
                surface_loader,
                swapchain_loader,
                surface_capabilities2_loader,
                compression_loader,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                image_allocations: Mutex::new(FxHashMap::default()),
                surfaces: Mutex::new(FxHashSet::default()),
                debug_utils_loader,
                debug_messenger,
            })
        }
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &DeviceConfig,
    ) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
        crate::vulkan_debug::reset_validation_stats();

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::vulkan_debug::severity_flags(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::vulkan_debug::vulkan_debug_callback));

        let messenger = debug_utils
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| init_fail("Failed to create debug messenger", e))?;
        Ok((Some(debug_utils), Some(messenger)))
    }

    unsafe fn compression_features_supported(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
        let mut control = vk::PhysicalDeviceImageCompressionControlFeaturesEXT::default();
        let mut swapchain_control = vk::PhysicalDeviceImageCompressionControlSwapchainFeaturesEXT::default();
        let mut features = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut control)
            .push_next(&mut swapchain_control);
        instance.get_physical_device_features2(physical_device, &mut features);
        control.image_compression_control == vk::TRUE
            && swapchain_control.image_compression_control_swapchain == vk::TRUE
    }

    // ===== SURFACES =====

    /// Create a presentation surface for `window`
    pub fn create_surface<W: HasDisplayHandle + HasWindowHandle>(&self, window: &W) -> Result<SurfaceHandle> {
        let display_handle = window
            .display_handle()
            .map_err(|e| Error::BackendError(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| Error::BackendError(format!("Failed to get window handle: {}", e)))?;
        let surface = unsafe {
            ash_window::create_surface(
                &self.entry,
                &self.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| vk_fail(e, "vkCreateSurfaceKHR"))?;

        let supported = unsafe {
            self.surface_loader.get_physical_device_surface_support(
                self.physical_device,
                self.present_queue_family,
                surface,
            )
        }
        .unwrap_or(false);
        if !supported {
            unsafe { self.surface_loader.destroy_surface(surface, None) };
            return Err(Error::InitializationFailed(
                "present queue family cannot present to this surface".to_string(),
            ));
        }

        if let Ok(mut surfaces) = self.surfaces.lock() {
            surfaces.insert(surface.as_raw());
        }
        sf_debug!(SOURCE, "Created surface {:?}", surface);
        Ok(SurfaceHandle::from_raw(surface.as_raw()))
    }

    /// Destroy a surface; every swapchain on it must be gone
    pub fn destroy_surface(&self, surface: SurfaceHandle) {
        let known = self
            .surfaces
            .lock()
            .map(|mut surfaces| surfaces.remove(&surface.as_raw()))
            .unwrap_or(false);
        if !known {
            sf_warn!(SOURCE, "destroy_surface on unknown {:?}", surface);
            return;
        }
        unsafe {
            self.surface_loader
                .destroy_surface(vk::SurfaceKHR::from_raw(surface.as_raw()), None)
        };
    }

    /// Window size in physical pixels, the extent to request for its surface
    pub fn window_extent(window: &Window) -> Extent2D {
        let size = window.inner_size();
        Extent2D::new(size.width, size.height)
    }

    // ===== ACCESSORS =====

    pub fn physical_device_name(&self) -> String {
        unsafe { self.instance.get_physical_device_properties(self.physical_device) }
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn validation_enabled(&self) -> bool {
        self.debug_messenger.is_some()
    }

    fn queue(&self, kind: QueueKind) -> vk::Queue {
        match kind {
            QueueKind::Graphics => self.graphics_queue,
            QueueKind::Present => self.present_queue,
        }
    }

    fn queue_guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.queue_lock
            .lock()
            .map_err(|_| Error::BackendError("queue lock poisoned".to_string()))
    }

    fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))
    }

    fn query_image_compression(&self, image: vk::Image) -> ImageCompressionProperties {
        let Some(loader) = &self.compression_loader else {
            return ImageCompressionProperties::default();
        };
        let mut props = vk::ImageCompressionPropertiesEXT::default();
        {
            let subresource = vk::ImageSubresource2KHR::default().image_subresource(vk::ImageSubresource {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                array_layer: 0,
            });
            let mut layout = vk::SubresourceLayout2KHR::default().push_next(&mut props);
            unsafe { loader.get_image_subresource_layout2(image, &subresource, &mut layout) };
        }
        compression_properties_from_vk(&props)
    }
}

impl GraphicsDevice for VulkanDevice {
    // ===== QUEUES =====

    fn queue_family_index(&self, kind: QueueKind) -> u32 {
        match kind {
            QueueKind::Graphics => self.graphics_queue_family,
            QueueKind::Present => self.present_queue_family,
        }
    }

    fn submit(&self, kind: QueueKind, submit: &SubmitDesc<'_>, fence: FenceHandle) -> Result<()> {
        let command_buffers: Vec<vk::CommandBuffer> = submit
            .command_buffers
            .iter()
            .map(|buffer| vk::CommandBuffer::from_raw(buffer.as_raw()))
            .collect();
        let wait_semaphores: Vec<vk::Semaphore> = submit
            .wait_semaphores
            .iter()
            .map(|wait| vk::Semaphore::from_raw(wait.semaphore.as_raw()))
            .collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = submit
            .wait_semaphores
            .iter()
            .map(|wait| pipeline_stage_to_vk(wait.stage))
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = submit
            .signal_semaphores
            .iter()
            .map(|semaphore| vk::Semaphore::from_raw(semaphore.as_raw()))
            .collect();

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let _guard = self.queue_guard()?;
        unsafe {
            self.device
                .queue_submit(self.queue(kind), &[submit_info], vk::Fence::from_raw(fence.as_raw()))
        }
        .map_err(|e| vk_fail(e, "vkQueueSubmit"))
    }

    fn wait_idle(&self) -> Result<()> {
        let _guard = self.queue_guard()?;
        unsafe { self.device.device_wait_idle() }.map_err(|e| vk_fail(e, "vkDeviceWaitIdle"))
    }

    // ===== SURFACE QUERIES =====

    fn surface_capabilities(&self, surface: SurfaceHandle) -> Result<SurfaceCapabilities> {
        let caps = unsafe {
            self.surface_loader.get_physical_device_surface_capabilities(
                self.physical_device,
                vk::SurfaceKHR::from_raw(surface.as_raw()),
            )
        }
        .map_err(|e| vk_fail(e, "vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;
        Ok(surface_capabilities_from_vk(&caps))
    }

    fn surface_formats(&self, surface: SurfaceHandle) -> Result<Vec<SurfaceFormat>> {
        let formats = unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(self.physical_device, vk::SurfaceKHR::from_raw(surface.as_raw()))
        }
        .map_err(|e| vk_fail(e, "vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
        Ok(formats.into_iter().filter_map(surface_format_from_vk).collect())
    }

    fn surface_present_modes(&self, surface: SurfaceHandle) -> Result<Vec<PresentMode>> {
        let modes = unsafe {
            self.surface_loader.get_physical_device_surface_present_modes(
                self.physical_device,
                vk::SurfaceKHR::from_raw(surface.as_raw()),
            )
        }
        .map_err(|e| vk_fail(e, "vkGetPhysicalDeviceSurfacePresentModesKHR"))?;
        Ok(modes.into_iter().filter_map(present_mode_from_vk).collect())
    }

    fn format_supports_storage(&self, format: Format) -> bool {
        let props = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format_to_vk(format))
        };
        props.optimal_tiling_features.contains(vk::FormatFeatureFlags::STORAGE_IMAGE)
    }

    fn supports_compression_control(&self) -> bool {
        self.compression_loader.is_some()
    }

    fn surface_format_compression(&self, surface: SurfaceHandle) -> Result<Vec<SurfaceFormatCompression>> {
        let (Some(loader), true) = (&self.surface_capabilities2_loader, self.compression_loader.is_some()) else {
            return Ok(Vec::new());
        };
        let surface_info =
            vk::PhysicalDeviceSurfaceInfo2KHR::default().surface(vk::SurfaceKHR::from_raw(surface.as_raw()));

        let count = unsafe { loader.get_physical_device_surface_formats2_len(self.physical_device, &surface_info) }
            .map_err(|e| vk_fail(e, "vkGetPhysicalDeviceSurfaceFormats2KHR"))?;
        let mut compression = vec![vk::ImageCompressionPropertiesEXT::default(); count];
        let surface_formats: Vec<vk::SurfaceFormatKHR> = {
            let mut formats: Vec<vk::SurfaceFormat2KHR<'_>> = compression
                .iter_mut()
                .map(|props| vk::SurfaceFormat2KHR::default().push_next(props))
                .collect();
            unsafe { loader.get_physical_device_surface_formats2(self.physical_device, &surface_info, &mut formats) }
                .map_err(|e| vk_fail(e, "vkGetPhysicalDeviceSurfaceFormats2KHR"))?;
            formats.iter().map(|format| format.surface_format).collect()
        };

        Ok(surface_formats
            .into_iter()
            .zip(compression.iter())
            .filter_map(|(format, props)| {
                Some(SurfaceFormatCompression {
                    surface_format: surface_format_from_vk(format)?,
                    properties: compression_properties_from_vk(props),
                })
            })
            .collect())
    }

    // ===== SWAPCHAIN =====

    fn create_swapchain(&self, desc: &SwapchainCreateDesc) -> Result<SwapchainHandle> {
        let queue_family_indices = [self.graphics_queue_family, self.present_queue_family];
        let mut fixed_rate_flags = [fixed_rate_to_vk(desc.compression.fixed_rate)];
        let mut compression_control =
            vk::ImageCompressionControlEXT::default().flags(compression_to_vk(desc.compression.compression));
        if desc.compression.compression == ImageCompression::FixedRateExplicit {
            compression_control = compression_control.fixed_rate_flags(&mut fixed_rate_flags);
        }

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(vk::SurfaceKHR::from_raw(desc.surface.as_raw()))
            .min_image_count(desc.min_image_count)
            .image_format(format_to_vk(desc.surface_format.format))
            .image_color_space(color_space_to_vk(desc.surface_format.color_space))
            .image_extent(extent_to_vk(desc.extent))
            .image_array_layers(desc.array_layers)
            .image_usage(image_usage_to_vk(desc.usage))
            .pre_transform(surface_transform_to_vk(desc.transform))
            .composite_alpha(composite_alpha_to_vk(desc.composite_alpha))
            .present_mode(present_mode_to_vk(desc.present_mode))
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::from_raw(desc.old_swapchain.as_raw()));
        create_info = if self.graphics_queue_family != self.present_queue_family {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };
        if desc.compression.compression != ImageCompression::Default && self.compression_loader.is_some() {
            create_info = create_info.push_next(&mut compression_control);
        }

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| vk_fail(e, "vkCreateSwapchainKHR"))?;
        Ok(SwapchainHandle::from_raw(swapchain.as_raw()))
    }

    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>> {
        let images = unsafe {
            self.swapchain_loader
                .get_swapchain_images(vk::SwapchainKHR::from_raw(swapchain.as_raw()))
        }
        .map_err(|e| vk_fail(e, "vkGetSwapchainImagesKHR"))?;
        Ok(images.into_iter().map(|image| ImageHandle::from_raw(image.as_raw())).collect())
    }

    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        timeout: u64,
        semaphore: SemaphoreHandle,
        fence: FenceHandle,
    ) -> Result<AcquiredImage> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                vk::SwapchainKHR::from_raw(swapchain.as_raw()),
                timeout,
                vk::Semaphore::from_raw(semaphore.as_raw()),
                vk::Fence::from_raw(fence.as_raw()),
            )
        };
        match result {
            Ok((image_index, false)) => Ok(AcquiredImage { image_index, status: AcquireStatus::Success }),
            Ok((image_index, true)) => Ok(AcquiredImage { image_index, status: AcquireStatus::Suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquiredImage {
                image_index: u32::MAX,
                status: AcquireStatus::OutOfDate,
            }),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Err(Error::Timeout),
            Err(e) => Err(vk_fail(e, "vkAcquireNextImageKHR")),
        }
    }

    fn queue_present(
        &self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphores: &[SemaphoreHandle],
    ) -> Result<AcquireStatus> {
        let swapchains = [vk::SwapchainKHR::from_raw(swapchain.as_raw())];
        let image_indices = [image_index];
        let waits: Vec<vk::Semaphore> = wait_semaphores
            .iter()
            .map(|semaphore| vk::Semaphore::from_raw(semaphore.as_raw()))
            .collect();
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&waits)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let _guard = self.queue_guard()?;
        match unsafe { self.swapchain_loader.queue_present(self.present_queue, &present_info) } {
            Ok(false) => Ok(AcquireStatus::Success),
            Ok(true) => Ok(AcquireStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireStatus::OutOfDate),
            Err(e) => Err(vk_fail(e, "vkQueuePresentKHR")),
        }
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        unsafe {
            self.swapchain_loader
                .destroy_swapchain(vk::SwapchainKHR::from_raw(swapchain.as_raw()), None)
        };
    }

    // ===== IMAGES =====

    fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle> {
        let compression = desc.extensions.iter().find_map(|extension| match extension {
            ImageExtension::Compression(props) => Some(*props),
        });
        let mut fixed_rate_flags = [compression
            .map(|props| fixed_rate_to_vk(props.fixed_rate))
            .unwrap_or(vk::ImageCompressionFixedRateFlagsEXT::NONE)];
        let mut compression_control = vk::ImageCompressionControlEXT::default().flags(
            compression
                .map(|props| compression_to_vk(props.compression))
                .unwrap_or(vk::ImageCompressionFlagsEXT::DEFAULT),
        );
        if compression.map(|props| props.compression) == Some(ImageCompression::FixedRateExplicit) {
            compression_control = compression_control.fixed_rate_flags(&mut fixed_rate_flags);
        }

        let mut create_info = vk::ImageCreateInfo::default()
            .flags(image_create_flags_to_vk(desc.flags))
            .image_type(image_type_to_vk(desc.image_type))
            .format(format_to_vk(desc.format))
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: desc.extent.depth,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .samples(sample_count_to_vk(desc.samples))
            .tiling(image_tiling_to_vk(desc.tiling))
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        if compression.is_some() {
            if self.compression_loader.is_some() {
                create_info = create_info.push_next(&mut compression_control);
            } else {
                sf_warn!(SOURCE, "Compression control unavailable, creating '{}' with driver default", desc.name);
            }
        }

        let image = unsafe { self.device.create_image(&create_info, None) }
            .map_err(|e| vk_fail(e, "vkCreateImage"))?;
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let allocation = self.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: if desc.name.is_empty() { "swapframe image" } else { desc.name.as_str() },
                    requirements,
                    location: memory_location_to_gpu_allocator(desc.memory_location),
                    linear: desc.tiling == ImageTiling::Linear,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|e| match e {
                    gpu_allocator::AllocationError::OutOfMemory => Error::OutOfMemory,
                    other => Error::AllocationFailed(format!("{}", other)),
                })
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                sf_error!(SOURCE, "Failed to allocate memory for image '{}': {}", desc.name, e);
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_image_memory(image, allocation.memory(), allocation.offset()) } {
            if let Ok(mut allocator) = self.allocator() {
                allocator.free(allocation).ok();
            }
            unsafe { self.device.destroy_image(image, None) };
            return Err(vk_fail(e, "vkBindImageMemory"));
        }

        if let Ok(mut allocations) = self.image_allocations.lock() {
            allocations.insert(image.as_raw(), allocation);
        }
        Ok(ImageHandle::from_raw(image.as_raw()))
    }

    fn image_memory_size(&self, image: ImageHandle) -> u64 {
        let tracked = self
            .image_allocations
            .lock()
            .ok()
            .and_then(|allocations| allocations.get(&image.as_raw()).map(|allocation| allocation.size()));
        tracked.unwrap_or_else(|| unsafe {
            self.device
                .get_image_memory_requirements(vk::Image::from_raw(image.as_raw()))
                .size
        })
    }

    fn image_compression(&self, image: ImageHandle) -> ImageCompressionProperties {
        self.query_image_compression(vk::Image::from_raw(image.as_raw()))
    }

    fn destroy_image(&self, image: ImageHandle) {
        let allocation = self
            .image_allocations
            .lock()
            .ok()
            .and_then(|mut allocations| allocations.remove(&image.as_raw()));
        unsafe { self.device.destroy_image(vk::Image::from_raw(image.as_raw()), None) };
        if let Some(allocation) = allocation {
            match self.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        sf_error!(SOURCE, "Failed to free memory of {:?}: {}", image, e);
                    }
                }
                Err(e) => sf_error!(SOURCE, "Leaking memory of {:?}: {}", image, e),
            }
        }
    }

    fn create_image_view(&self, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(vk::Image::from_raw(desc.image.as_raw()))
            .view_type(image_view_type_to_vk(desc.view_type))
            .format(format_to_vk(desc.format))
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: image_aspect_to_vk(desc.range.aspect),
                base_mip_level: desc.range.base_mip_level,
                level_count: desc.range.level_count,
                base_array_layer: desc.range.base_array_layer,
                layer_count: desc.range.layer_count,
            });
        let view = unsafe { self.device.create_image_view(&create_info, None) }
            .map_err(|e| vk_fail(e, "vkCreateImageView"))?;
        Ok(ImageViewHandle::from_raw(view.as_raw()))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        unsafe {
            self.device
                .destroy_image_view(vk::ImageView::from_raw(view.as_raw()), None)
        };
    }

    // ===== COMMAND POOLS =====

    fn create_command_pool(&self, queue_family_index: u32, flags: CommandPoolFlags) -> Result<CommandPoolHandle> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(command_pool_flags_to_vk(flags));
        let pool = unsafe { self.device.create_command_pool(&create_info, None) }
            .map_err(|e| vk_fail(e, "vkCreateCommandPool"))?;
        Ok(CommandPoolHandle::from_raw(pool.as_raw()))
    }

    fn reset_command_pool(&self, pool: CommandPoolHandle) -> Result<()> {
        unsafe {
            self.device.reset_command_pool(
                vk::CommandPool::from_raw(pool.as_raw()),
                vk::CommandPoolResetFlags::empty(),
            )
        }
        .map_err(|e| vk_fail(e, "vkResetCommandPool"))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        unsafe {
            self.device
                .destroy_command_pool(vk::CommandPool::from_raw(pool.as_raw()), None)
        };
    }

    fn allocate_command_buffers(
        &self,
        pool: CommandPoolHandle,
        level: CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<CommandBufferHandle>> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(vk::CommandPool::from_raw(pool.as_raw()))
            .level(command_buffer_level_to_vk(level))
            .command_buffer_count(count);
        let buffers = unsafe { self.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| vk_fail(e, "vkAllocateCommandBuffers"))?;
        Ok(buffers
            .into_iter()
            .map(|buffer| CommandBufferHandle::from_raw(buffer.as_raw()))
            .collect())
    }

    fn free_command_buffers(&self, pool: CommandPoolHandle, buffers: &[CommandBufferHandle]) {
        let buffers: Vec<vk::CommandBuffer> = buffers
            .iter()
            .map(|buffer| vk::CommandBuffer::from_raw(buffer.as_raw()))
            .collect();
        unsafe {
            self.device
                .free_command_buffers(vk::CommandPool::from_raw(pool.as_raw()), &buffers)
        };
    }

    fn reset_command_buffer(&self, buffer: CommandBufferHandle) -> Result<()> {
        unsafe {
            self.device.reset_command_buffer(
                vk::CommandBuffer::from_raw(buffer.as_raw()),
                vk::CommandBufferResetFlags::empty(),
            )
        }
        .map_err(|e| vk_fail(e, "vkResetCommandBuffer"))
    }

    fn begin_command_buffer(
        &self,
        buffer: CommandBufferHandle,
        level: CommandBufferLevel,
        one_time_submit: bool,
    ) -> Result<()> {
        let inheritance = vk::CommandBufferInheritanceInfo::default();
        let mut begin_info = vk::CommandBufferBeginInfo::default();
        if one_time_submit {
            begin_info = begin_info.flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        }
        if level == CommandBufferLevel::Secondary {
            begin_info = begin_info.inheritance_info(&inheritance);
        }
        unsafe {
            self.device
                .begin_command_buffer(vk::CommandBuffer::from_raw(buffer.as_raw()), &begin_info)
        }
        .map_err(|e| vk_fail(e, "vkBeginCommandBuffer"))
    }

    fn end_command_buffer(&self, buffer: CommandBufferHandle) -> Result<()> {
        unsafe { self.device.end_command_buffer(vk::CommandBuffer::from_raw(buffer.as_raw())) }
            .map_err(|e| vk_fail(e, "vkEndCommandBuffer"))
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { self.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None) }
            .map_err(|e| vk_fail(e, "vkCreateFence"))?;
        Ok(FenceHandle::from_raw(fence.as_raw()))
    }

    fn wait_for_fences(&self, fences: &[FenceHandle], timeout: u64) -> Result<()> {
        let fences: Vec<vk::Fence> = fences.iter().map(|fence| vk::Fence::from_raw(fence.as_raw())).collect();
        match unsafe { self.device.wait_for_fences(&fences, true, timeout) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(Error::Timeout),
            Err(e) => Err(vk_fail(e, "vkWaitForFences")),
        }
    }

    fn reset_fences(&self, fences: &[FenceHandle]) -> Result<()> {
        let fences: Vec<vk::Fence> = fences.iter().map(|fence| vk::Fence::from_raw(fence.as_raw())).collect();
        unsafe { self.device.reset_fences(&fences) }.map_err(|e| vk_fail(e, "vkResetFences"))
    }

    fn fence_status(&self, fence: FenceHandle) -> Result<bool> {
        unsafe { self.device.get_fence_status(vk::Fence::from_raw(fence.as_raw())) }
            .map_err(|e| vk_fail(e, "vkGetFenceStatus"))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        unsafe { self.device.destroy_fence(vk::Fence::from_raw(fence.as_raw()), None) };
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| vk_fail(e, "vkCreateSemaphore"))?;
        Ok(SemaphoreHandle::from_raw(semaphore.as_raw()))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        unsafe {
            self.device
                .destroy_semaphore(vk::Semaphore::from_raw(semaphore.as_raw()), None)
        };
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Images whose owners never destroyed them
            if let (Ok(allocations), Ok(allocator)) = (self.image_allocations.get_mut(), self.allocator.get_mut()) {
                if !allocations.is_empty() {
                    sf_warn!(SOURCE, "{} image(s) still alive at device teardown", allocations.len());
                }
                for (raw, allocation) in allocations.drain() {
                    self.device.destroy_image(vk::Image::from_raw(raw), None);
                    allocator.free(allocation).ok();
                }
            }

            // 2. Allocator frees its memory blocks while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            // 3. Surfaces
            if let Ok(surfaces) = self.surfaces.get_mut() {
                for raw in surfaces.drain() {
                    self.surface_loader.destroy_surface(vk::SurfaceKHR::from_raw(raw), None);
                }
            }

            // 4. Debug messenger before device and instance
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        sf_debug!(SOURCE, "Vulkan device destroyed");
    }
}
