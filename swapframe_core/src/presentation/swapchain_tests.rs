use super::*;
use crate::device::mock_device::{DeviceCall, MockDevice};
use crate::device::ColorSpace;

// ============================================================================
// Helpers
// ============================================================================

const SURFACE: SurfaceHandle = SurfaceHandle::from_raw(0x5f);

fn mock_device() -> (Arc<MockDevice>, Arc<dyn GraphicsDevice>) {
    let mock = Arc::new(MockDevice::new());
    let device: Arc<dyn GraphicsDevice> = mock.clone();
    (mock, device)
}

fn create_swapchain(device: &Arc<dyn GraphicsDevice>) -> Swapchain {
    Swapchain::new(Arc::clone(device), SURFACE, &SwapchainDesc::default()).unwrap()
}

fn enable_compression(mock: &MockDevice, rates: FixedRateCompression) {
    let mut state = mock.state();
    state.compression_control = true;
    state.format_compression = vec![SurfaceFormatCompression {
        surface_format: SurfaceFormat::new(Format::B8G8R8A8_SRGB, ColorSpace::SrgbNonLinear),
        properties: ImageCompressionProperties {
            compression: ImageCompression::FixedRateExplicit,
            fixed_rate: rates,
        },
    }];
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn test_default_negotiation() {
    let (_mock, device) = mock_device();
    let swapchain = create_swapchain(&device);

    assert_eq!(swapchain.extent(), Extent2D::new(800, 600));
    assert_eq!(swapchain.format(), Format::B8G8R8A8_SRGB);
    assert_eq!(swapchain.present_mode(), PresentMode::Fifo);
    assert_eq!(swapchain.image_count(), 3);
    assert_eq!(swapchain.images().len(), 3);
    assert_eq!(swapchain.usage(), ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_SRC);
    assert_eq!(swapchain.transform(), SurfaceTransform::IDENTITY);
    assert_eq!(swapchain.composite_alpha(), CompositeAlpha::OPAQUE);
    assert_eq!(swapchain.requested_compression(), ImageCompressionProperties::default());
    assert_eq!(swapchain.surface(), SURFACE);
    assert!(!swapchain.has_predecessor());
}

#[test]
fn test_priority_lists_are_kept() {
    let (_mock, device) = mock_device();
    let desc = SwapchainDesc::default().with_present_mode_priority(vec![PresentMode::Mailbox]);
    let swapchain = Swapchain::new(device, SURFACE, &desc).unwrap();
    assert_eq!(swapchain.present_mode_priority(), &[PresentMode::Mailbox]);
    assert_eq!(swapchain.surface_format_priority().len(), 2);
}

#[test]
fn test_creation_fails_without_formats() {
    let (mock, device) = mock_device();
    mock.state().formats.clear();
    let result = Swapchain::new(device, SURFACE, &SwapchainDesc::default());
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
fn test_creation_propagates_device_lost() {
    let (mock, device) = mock_device();
    mock.state().device_lost = true;
    let result = Swapchain::new(device, SURFACE, &SwapchainDesc::default());
    assert!(matches!(result, Err(Error::DeviceLost)));
}

#[test]
fn test_compression_ignored_without_control() {
    let (_mock, device) = mock_device();
    let desc = SwapchainDesc::default()
        .with_compression(ImageCompression::FixedRateExplicit, FixedRateCompression::BPC_2);
    let swapchain = Swapchain::new(device, SURFACE, &desc).unwrap();
    assert_eq!(swapchain.requested_compression().compression, ImageCompression::Default);
    assert_eq!(swapchain.applied_compression().compression, ImageCompression::Default);
}

#[test]
fn test_compression_applied_with_control() {
    let (mock, device) = mock_device();
    enable_compression(&mock, FixedRateCompression::BPC_2 | FixedRateCompression::BPC_4);
    let desc = SwapchainDesc::default()
        .with_compression(ImageCompression::FixedRateExplicit, FixedRateCompression::BPC_4);
    let swapchain = Swapchain::new(device, SURFACE, &desc).unwrap();
    assert_eq!(swapchain.applied_compression().fixed_rate, FixedRateCompression::BPC_4);
}

#[test]
fn test_query_supported_fixed_rate_compression() {
    let (mock, device) = mock_device();
    assert!(Swapchain::query_supported_fixed_rate_compression(device.as_ref(), SURFACE)
        .unwrap()
        .is_empty());
    enable_compression(&mock, FixedRateCompression::BPC_2);
    let supported = Swapchain::query_supported_fixed_rate_compression(device.as_ref(), SURFACE).unwrap();
    assert_eq!(supported.len(), 1);
    assert_eq!(supported[0].properties.fixed_rate, FixedRateCompression::BPC_2);
}

// ============================================================================
// Additive recreation
// ============================================================================

#[test]
fn test_recreate_extent_keeps_other_properties() {
    let (_mock, device) = mock_device();
    let mut old = create_swapchain(&device);
    let before = *old.properties();

    let new = old.recreate_with_extent(Extent2D::new(1024, 768)).unwrap();
    let after = *new.properties();
    assert_eq!(after.extent, Extent2D::new(1024, 768));
    assert_eq!(SwapchainProperties { extent: before.extent, ..after }, before);
}

#[test]
fn test_recreate_image_count_keeps_other_properties() {
    let (_mock, device) = mock_device();
    let mut old = create_swapchain(&device);
    let before = *old.properties();

    let new = old.recreate_with_image_count(2).unwrap();
    assert_eq!(new.image_count(), 2);
    assert_eq!(SwapchainProperties { image_count: before.image_count, ..*new.properties() }, before);
}

#[test]
fn test_recreate_usage_keeps_other_properties() {
    let (_mock, device) = mock_device();
    let mut old = create_swapchain(&device);
    let before = *old.properties();

    let new = old
        .recreate_with_image_usage(ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST)
        .unwrap();
    assert_eq!(new.usage(), ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST);
    assert_eq!(SwapchainProperties { image_usage: before.image_usage, ..*new.properties() }, before);
}

#[test]
fn test_recreate_compression_keeps_other_properties() {
    let (mock, device) = mock_device();
    enable_compression(&mock, FixedRateCompression::BPC_2);
    let mut old = create_swapchain(&device);
    let before = *old.properties();

    let new = old
        .recreate_with_compression(ImageCompression::FixedRateExplicit, FixedRateCompression::BPC_2)
        .unwrap();
    assert_eq!(new.requested_compression().fixed_rate, FixedRateCompression::BPC_2);
    assert_eq!(SwapchainProperties { compression: before.compression, ..*new.properties() }, before);
}

#[test]
fn test_recreate_with_empty_update_is_identical() {
    let (_mock, device) = mock_device();
    let mut old = create_swapchain(&device);
    let before = *old.properties();
    let new = old.recreate(&SwapchainUpdate::default()).unwrap();
    assert_eq!(*new.properties(), before);
}

#[test]
fn test_recreate_extent_and_transform() {
    let (_mock, device) = mock_device();
    let mut old = create_swapchain(&device);
    let new = old
        .recreate_with_extent_and_transform(Extent2D::new(600, 800), SurfaceTransform::ROTATE_90)
        .unwrap();
    assert_eq!(new.extent(), Extent2D::new(600, 800));
    assert_eq!(new.transform(), SurfaceTransform::ROTATE_90);
}

#[test]
fn test_recreate_passes_old_handle_and_retires_predecessor() {
    let (mock, device) = mock_device();
    let mut old = create_swapchain(&device);
    let old_handle = old.handle();

    let mut new = old.recreate_with_extent(Extent2D::new(640, 480)).unwrap();
    assert!(old.is_retired());
    assert!(old.images().is_empty());
    assert!(new.has_predecessor());
    assert_eq!(
        mock.count_calls(|c| matches!(c, DeviceCall::CreateSwapchain(desc) if desc.old_swapchain == old_handle)),
        1
    );

    // The retired object no longer owns anything
    drop(old);
    assert!(mock.is_live(old_handle.as_raw()));

    // Predecessor survives acquire, dies at first present
    let acquired = new.acquire_next_image(u64::MAX, SemaphoreHandle::NULL, None).unwrap();
    assert!(mock.is_live(old_handle.as_raw()));
    new.present(acquired.image_index, &[]).unwrap();
    assert!(!mock.is_live(old_handle.as_raw()));
    assert!(!new.has_predecessor());
}

#[test]
fn test_chained_recreate_carries_every_predecessor() {
    let (mock, device) = mock_device();
    let mut first = create_swapchain(&device);
    let first_handle = first.handle();

    let mut second = first.recreate_with_extent(Extent2D::new(640, 480)).unwrap();
    let second_handle = second.handle();
    let mut third = second.recreate_with_extent(Extent2D::new(320, 240)).unwrap();
    assert!(!second.has_predecessor());
    assert!(third.has_predecessor());

    // Dropping the intermediate value destroys nothing
    drop(second);
    drop(first);
    assert!(mock.is_live(first_handle.as_raw()));
    assert!(mock.is_live(second_handle.as_raw()));

    let acquired = third.acquire_next_image(u64::MAX, SemaphoreHandle::NULL, None).unwrap();
    third.present(acquired.image_index, &[]).unwrap();
    assert!(!mock.is_live(first_handle.as_raw()));
    assert!(!mock.is_live(second_handle.as_raw()));
    assert!(!third.has_predecessor());
}

#[test]
fn test_retired_swapchain_rejects_calls() {
    let (_mock, device) = mock_device();
    let mut old = create_swapchain(&device);
    let _new = old.recreate(&SwapchainUpdate::default()).unwrap();
    assert!(old.acquire_next_image(0, SemaphoreHandle::NULL, None).is_err());
    assert!(old.present(0, &[]).is_err());
    assert!(matches!(old.recreate(&SwapchainUpdate::default()), Err(Error::InvalidResource(_))));
}

#[test]
fn test_failed_recreate_keeps_predecessor_handle() {
    let (mock, device) = mock_device();
    let mut old = create_swapchain(&device);
    mock.state().fail_next_allocation = Some(Error::OutOfMemory);
    assert!(matches!(old.recreate_with_image_count(2), Err(Error::OutOfMemory)));
    assert!(!old.is_retired());
    assert!(!old.images().is_empty());
    assert!(old.acquire_next_image(u64::MAX, SemaphoreHandle::NULL, None).is_ok());

    let handle = old.handle();
    drop(old);
    assert!(!mock.is_live(handle.as_raw()));
}

// ============================================================================
// Acquire / present statuses
// ============================================================================

#[test]
fn test_stale_statuses_are_data() {
    let (mock, device) = mock_device();
    let mut swapchain = create_swapchain(&device);
    mock.state().acquire_results.extend([AcquireStatus::Suboptimal, AcquireStatus::OutOfDate]);
    mock.state().present_results.push_back(AcquireStatus::OutOfDate);

    let first = swapchain.acquire_next_image(u64::MAX, SemaphoreHandle::NULL, None).unwrap();
    assert_eq!(first.status, AcquireStatus::Suboptimal);
    let second = swapchain.acquire_next_image(u64::MAX, SemaphoreHandle::NULL, None).unwrap();
    assert_eq!(second.status, AcquireStatus::OutOfDate);
    assert_eq!(swapchain.present(first.image_index, &[]).unwrap(), AcquireStatus::OutOfDate);

    // No self-recreation happened
    assert_eq!(mock.count_calls(|c| matches!(c, DeviceCall::CreateSwapchain(_))), 1);
}

#[test]
fn test_drop_destroys_swapchain() {
    let (mock, device) = mock_device();
    let swapchain = create_swapchain(&device);
    let handle = swapchain.handle();
    drop(swapchain);
    assert!(!mock.is_live(handle.as_raw()));
}
