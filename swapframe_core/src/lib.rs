/*!
# swapframe

Per-frame GPU resource lifecycle for swapchain-based rendering.

The crate is backend-agnostic: every native call goes through the
[`GraphicsDevice`](device::GraphicsDevice) trait, and backends such as
`swapframe_vulkan` implement it.

## Architecture

- **DeviceResource**: move-only owner of one native handle
- **Image / ImageView**: images that track the views created from them
- **CommandPool**: per-thread, per-frame command buffer recycling
- **Swapchain**: negotiated presentation images with additive recreation
- **RenderContext**: frames-in-flight ring with fence or device-idle waits
*/

// Internal modules
mod error;
pub mod log;
pub mod config;
pub mod device;
pub mod resource;
pub mod presentation;
pub mod frame;

// Main swapframe namespace module
pub mod swapframe {
    pub use crate::error::{Error, Result};

    pub use crate::config::{DebugSeverity, DeviceConfig, FrameConfig, SwapchainDesc};

    // Logging types only; the sf_* macros live at the crate root
    pub mod log {
        pub use crate::log::{reset_logger, set_logger, DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    pub mod device {
        pub use crate::device::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod presentation {
        pub use crate::presentation::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }
}
