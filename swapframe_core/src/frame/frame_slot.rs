/// Frame slot: one entry of the frames-in-flight ring
///
/// Owns one command pool per recording thread plus the slot's sync set.
/// State machine: `Idle -> Recording -> Submitted -> (wait) -> Idle`.

use std::sync::Arc;

use crate::device::{CommandBufferLevel, GraphicsDevice};
use crate::error::{Error, Result};
use crate::resource::{CommandBuffer, CommandPool, CommandPoolResetMode, Fence, Semaphore};
use crate::sf_trace;

const SOURCE: &str = "swapframe::FrameSlot";

/// How the CPU waits before reusing a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitPolicy {
    /// Wait on the slot's own fence; other slots keep running
    Fence,
    /// Wait for the whole device to go idle
    DeviceIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    Idle,
    Recording,
    Submitted,
}

pub struct FrameSlot {
    device: Arc<dyn GraphicsDevice>,
    index: usize,
    pools: Vec<CommandPool>,
    fence: Fence,
    image_acquired: Semaphore,
    /// Replaced acquire semaphores that may still be signaled; freed on the next wait
    retired_acquired: Vec<Semaphore>,
    render_finished: Semaphore,
    state: FrameState,
}

impl FrameSlot {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        index: usize,
        queue_family_index: u32,
        thread_count: usize,
        reset_mode: CommandPoolResetMode,
    ) -> Result<Self> {
        let pools = (0..thread_count.max(1))
            .map(|thread| {
                CommandPool::new(Arc::clone(&device), queue_family_index, Some(index), thread, reset_mode)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            fence: Fence::new(Arc::clone(&device), true)?,
            image_acquired: Semaphore::new(Arc::clone(&device))?,
            retired_acquired: Vec::new(),
            render_finished: Semaphore::new(Arc::clone(&device))?,
            device,
            index,
            pools,
            state: FrameState::Idle,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    pub fn image_acquired(&self) -> &Semaphore {
        &self.image_acquired
    }

    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    pub fn thread_count(&self) -> usize {
        self.pools.len()
    }

    pub fn pools(&self) -> &[CommandPool] {
        &self.pools
    }

    /// One pool per thread, for handing out to scoped workers
    pub fn pools_mut(&mut self) -> &mut [CommandPool] {
        &mut self.pools
    }

    /// Block until the GPU is done with this slot, then mark it Idle
    pub fn wait(&mut self, policy: WaitPolicy) -> Result<()> {
        match policy {
            WaitPolicy::Fence => self.fence.wait(u64::MAX)?,
            WaitPolicy::DeviceIdle => self.device.wait_idle()?,
        }
        sf_trace!(SOURCE, "Slot {} idle after {:?} wait", self.index, policy);
        self.retired_acquired.clear();
        self.state = FrameState::Idle;
        Ok(())
    }

    /// Recycle every pool; the slot must have been waited on
    pub fn reset_pools(&mut self) -> Result<()> {
        assert_eq!(
            self.state,
            FrameState::Idle,
            "frame slot {} reset while its work may still be in flight",
            self.index
        );
        for pool in &mut self.pools {
            pool.reset_pool()?;
        }
        Ok(())
    }

    /// Swap in a fresh acquire semaphore after an abandoned acquire
    ///
    /// With `signal_pending` the old semaphore had an image acquired against
    /// it, so it is parked until the slot is next waited on instead of being
    /// destroyed.
    pub(crate) fn renew_image_acquired(&mut self, signal_pending: bool) -> Result<()> {
        let fresh = Semaphore::new(Arc::clone(&self.device))?;
        let old = std::mem::replace(&mut self.image_acquired, fresh);
        if signal_pending {
            sf_trace!(SOURCE, "Slot {} parks {:?} until its next wait", self.index, old.handle());
            self.retired_acquired.push(old);
        }
        Ok(())
    }

    /// Acquire semaphores waiting for the slot's next wait before being destroyed
    pub fn retired_semaphore_count(&self) -> usize {
        self.retired_acquired.len()
    }

    pub(crate) fn begin_recording(&mut self) {
        self.state = FrameState::Recording;
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.state = FrameState::Submitted;
    }

    pub fn request_command_buffer(&mut self, thread_index: usize, level: CommandBufferLevel) -> Result<CommandBuffer> {
        if self.state != FrameState::Recording {
            return Err(Error::InvalidResource(format!(
                "frame slot {} is {:?}, not recording",
                self.index, self.state
            )));
        }
        let pool = self.pools.get_mut(thread_index).ok_or_else(|| {
            Error::InvalidResource(format!("no command pool for thread {}", thread_index))
        })?;
        pool.request_command_buffer(level)
    }
}

impl std::fmt::Debug for FrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlot")
            .field("index", &self.index)
            .field("state", &self.state)
            .field("pools", &self.pools.len())
            .finish()
    }
}
