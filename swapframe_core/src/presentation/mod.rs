//! Presentation: swapchain negotiation and lifecycle

pub mod negotiation;
pub mod swapchain;

pub use swapchain::{Swapchain, SwapchainProperties, SwapchainUpdate};
