/// Owned fences and semaphores

use std::sync::Arc;

use crate::device::{DeviceResource, FenceHandle, GraphicsDevice, SemaphoreHandle};
use crate::error::Result;

/// GPU-to-CPU completion signal
#[derive(Debug)]
pub struct Fence {
    resource: DeviceResource<FenceHandle>,
}

impl Fence {
    pub fn new(device: Arc<dyn GraphicsDevice>, signaled: bool) -> Result<Self> {
        let handle = device.create_fence(signaled)?;
        Ok(Self { resource: DeviceResource::new(device, handle) })
    }

    pub fn handle(&self) -> FenceHandle {
        self.resource.handle()
    }

    /// Block until signaled or `timeout` nanoseconds pass
    pub fn wait(&self, timeout: u64) -> Result<()> {
        self.resource.device().wait_for_fences(&[self.handle()], timeout)
    }

    pub fn reset(&self) -> Result<()> {
        self.resource.device().reset_fences(&[self.handle()])
    }

    pub fn is_signaled(&self) -> Result<bool> {
        self.resource.device().fence_status(self.handle())
    }
}

/// GPU-to-GPU ordering signal
#[derive(Debug)]
pub struct Semaphore {
    resource: DeviceResource<SemaphoreHandle>,
}

impl Semaphore {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Result<Self> {
        let handle = device.create_semaphore()?;
        Ok(Self { resource: DeviceResource::new(device, handle) })
    }

    pub fn handle(&self) -> SemaphoreHandle {
        self.resource.handle()
    }
}
