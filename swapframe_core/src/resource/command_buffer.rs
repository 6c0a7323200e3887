/// Command buffer handed out by a [`CommandPool`](super::CommandPool)
///
/// The pool owns the native buffer; this value only tracks recording state.

use std::sync::Arc;

use crate::device::{CommandBufferHandle, CommandBufferLevel, GraphicsDevice};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    Initial,
    Recording,
    Executable,
}

pub struct CommandBuffer {
    device: Arc<dyn GraphicsDevice>,
    handle: CommandBufferHandle,
    level: CommandBufferLevel,
    state: CommandBufferState,
}

impl CommandBuffer {
    pub(crate) fn new(device: Arc<dyn GraphicsDevice>, handle: CommandBufferHandle, level: CommandBufferLevel) -> Self {
        Self { device, handle, level, state: CommandBufferState::Initial }
    }

    pub fn handle(&self) -> CommandBufferHandle {
        self.handle
    }

    pub fn level(&self) -> CommandBufferLevel {
        self.level
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    /// Start recording for a single submission
    pub fn begin(&mut self) -> Result<()> {
        if self.state == CommandBufferState::Recording {
            return Err(Error::InvalidResource(format!("{:?} is already recording", self.handle)));
        }
        self.device.begin_command_buffer(self.handle, self.level, true)?;
        self.state = CommandBufferState::Recording;
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        if self.state != CommandBufferState::Recording {
            return Err(Error::InvalidResource(format!("{:?} is not recording", self.handle)));
        }
        self.device.end_command_buffer(self.handle)?;
        self.state = CommandBufferState::Executable;
        Ok(())
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("handle", &self.handle)
            .field("level", &self.level)
            .field("state", &self.state)
            .finish()
    }
}
