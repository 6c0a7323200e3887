//! Frames in flight: slots, wait policies and the render loop

pub mod frame_slot;
pub mod render_context;

pub use frame_slot::{FrameSlot, FrameState, WaitPolicy};
pub use render_context::{FrameInfo, RenderContext, SwapchainTarget};
