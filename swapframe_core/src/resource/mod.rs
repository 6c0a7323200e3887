//! Device-owned resources: images, views, command pools, sync objects

pub mod command_buffer;
pub mod command_pool;
pub mod image;
pub mod image_view;
pub mod sync;

pub use command_buffer::{CommandBuffer, CommandBufferState};
pub use command_pool::{CommandPool, CommandPoolResetMode};
pub use image::{Image, ImageBuilder};
pub use image_view::ImageView;
pub use sync::{Fence, Semaphore};
