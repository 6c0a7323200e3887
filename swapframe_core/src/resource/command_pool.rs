//! Per-thread, per-frame command pool
//!
//! Buffers are kept in two ordered lists (primary, secondary), each with an
//! active count. Buffers past the active count are free for reuse, so a pool
//! only ever allocates once per high-water mark:
//!
//! ```text
//! request -> reuse buffers[active] if active < len, else allocate + push
//! reset   -> active = 0 (ResetPool / ResetIndividually)
//!         -> free everything (AlwaysAllocate)
//! ```

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::device::{
    CommandBufferHandle, CommandBufferLevel, CommandPoolFlags, CommandPoolHandle, DeviceResource,
    GraphicsDevice,
};
use crate::error::{Error, Result};
use crate::resource::command_buffer::CommandBuffer;
use crate::{sf_debug, sf_error, sf_trace};

const SOURCE: &str = "swapframe::CommandPool";

/// How a pool recycles its buffers between frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandPoolResetMode {
    /// One native pool reset per cycle
    ResetPool,
    /// Reset each buffer that was used this cycle
    ResetIndividually,
    /// Never reuse: free everything and allocate fresh buffers each cycle
    AlwaysAllocate,
}

impl CommandPoolResetMode {
    fn pool_flags(self) -> CommandPoolFlags {
        match self {
            CommandPoolResetMode::ResetIndividually => CommandPoolFlags::RESET_COMMAND_BUFFER,
            CommandPoolResetMode::ResetPool | CommandPoolResetMode::AlwaysAllocate => {
                CommandPoolFlags::TRANSIENT
            }
        }
    }
}

#[derive(Debug, Default)]
struct BufferList {
    buffers: Vec<CommandBufferHandle>,
    active: usize,
}

/// Command pool bound to one recording thread and, optionally, one frame slot
///
/// `Send` but not `Sync`: a pool can be handed to a worker thread, never shared.
pub struct CommandPool {
    resource: DeviceResource<CommandPoolHandle>,
    queue_family_index: u32,
    frame_slot: Option<usize>,
    thread_index: usize,
    reset_mode: CommandPoolResetMode,
    primary: BufferList,
    secondary: BufferList,
    _not_sync: PhantomData<Cell<()>>,
}

impl CommandPool {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        queue_family_index: u32,
        frame_slot: Option<usize>,
        thread_index: usize,
        reset_mode: CommandPoolResetMode,
    ) -> Result<Self> {
        let handle = device
            .create_command_pool(queue_family_index, reset_mode.pool_flags())
            .map_err(|e| {
                sf_error!(SOURCE, "Failed to create command pool for thread {}: {}", thread_index, e);
                e
            })?;
        sf_debug!(
            SOURCE,
            "Created {:?} (family {}, slot {:?}, thread {}, {:?})",
            handle,
            queue_family_index,
            frame_slot,
            thread_index,
            reset_mode
        );
        Ok(Self {
            resource: DeviceResource::new(device, handle),
            queue_family_index,
            frame_slot,
            thread_index,
            reset_mode,
            primary: BufferList::default(),
            secondary: BufferList::default(),
            _not_sync: PhantomData,
        })
    }

    pub fn handle(&self) -> CommandPoolHandle {
        self.resource.handle()
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn frame_slot(&self) -> Option<usize> {
        self.frame_slot
    }

    pub fn thread_index(&self) -> usize {
        self.thread_index
    }

    pub fn reset_mode(&self) -> CommandPoolResetMode {
        self.reset_mode
    }

    /// Primary buffers allocated so far
    pub fn primary_count(&self) -> usize {
        self.primary.buffers.len()
    }

    pub fn secondary_count(&self) -> usize {
        self.secondary.buffers.len()
    }

    /// Primary buffers handed out since the last reset
    pub fn active_primary_count(&self) -> usize {
        self.primary.active
    }

    pub fn active_secondary_count(&self) -> usize {
        self.secondary.active
    }

    /// Hand out a buffer ready for recording, reusing a free one when possible
    pub fn request_command_buffer(&mut self, level: CommandBufferLevel) -> Result<CommandBuffer> {
        let pool = self.resource.handle();
        let device = Arc::clone(self.resource.device());
        let list = match level {
            CommandBufferLevel::Primary => &mut self.primary,
            CommandBufferLevel::Secondary => &mut self.secondary,
        };

        let handle = if list.active < list.buffers.len() {
            let handle = list.buffers[list.active];
            sf_trace!(SOURCE, "Reusing {:?} buffer {:?} from {:?}", level, handle, pool);
            handle
        } else {
            let handle = device
                .allocate_command_buffers(pool, level, 1)?
                .into_iter()
                .next()
                .ok_or_else(|| Error::BackendError(format!("{:?} returned no command buffer", pool)))?;
            sf_trace!(SOURCE, "Allocated {:?} buffer {:?} from {:?}", level, handle, pool);
            list.buffers.push(handle);
            handle
        };
        list.active += 1;

        Ok(CommandBuffer::new(device, handle, level))
    }

    /// Recycle every buffer handed out since the last reset
    ///
    /// The caller must know the GPU has finished with them.
    pub fn reset_pool(&mut self) -> Result<()> {
        let device = Arc::clone(self.resource.device());
        let pool = self.resource.handle();
        match self.reset_mode {
            CommandPoolResetMode::ResetPool => {
                device.reset_command_pool(pool)?;
            }
            CommandPoolResetMode::ResetIndividually => {
                for list in [&self.primary, &self.secondary] {
                    for handle in &list.buffers[..list.active] {
                        device.reset_command_buffer(*handle)?;
                    }
                }
            }
            CommandPoolResetMode::AlwaysAllocate => {
                let stale: Vec<CommandBufferHandle> = self
                    .primary
                    .buffers
                    .drain(..)
                    .chain(self.secondary.buffers.drain(..))
                    .collect();
                if !stale.is_empty() {
                    device.free_command_buffers(pool, &stale);
                }
            }
        }
        self.primary.active = 0;
        self.secondary.active = 0;
        sf_trace!(SOURCE, "Reset {:?} ({:?})", pool, self.reset_mode);
        Ok(())
    }
}

impl std::fmt::Debug for CommandPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPool")
            .field("handle", &self.handle())
            .field("thread_index", &self.thread_index)
            .field("frame_slot", &self.frame_slot)
            .field("reset_mode", &self.reset_mode)
            .field("primary", &(self.primary.active, self.primary.buffers.len()))
            .field("secondary", &(self.secondary.active, self.secondary.buffers.len()))
            .finish()
    }
}

#[cfg(test)]
#[path = "command_pool_tests.rs"]
mod tests;
