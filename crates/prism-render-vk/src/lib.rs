// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device selection, swapchain lifecycle and double-buffered
//! frame submission.
//!
//! The policy modules (`selector`, `surface`, `container`, `manager`,
//! `frame`) only talk to the driver through [`Gpu`]; [`AshGpu`] is the ash
//! implementation used at runtime.

use anyhow::{Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

use prism_render::{RefreshSignal, RenderSize, Renderer};

pub mod backend;
pub mod config;
pub mod container;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod instance;
pub mod manager;
pub mod release;
pub mod selector;
pub mod shader;
pub mod surface;

#[cfg(test)]
pub(crate) mod mock;

pub use backend::AshGpu;
pub use config::VkConfig;
pub use container::{SwapchainContainer, SwapchainParams};
pub use error::VkError;
pub use frame::{FrameSynchronizer, SlotState, FRAMES_IN_FLIGHT};
pub use gpu::Gpu;
pub use manager::SwapchainManager;

pub type VkRenderer = FrameSynchronizer<AshGpu>;

impl Renderer for VkRenderer {
    type Config = VkConfig;

    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: VkConfig,
    ) -> Result<Self> {
        let gpu = AshGpu::new(window, display, &cfg).context("initializing Vulkan")?;
        let params = gpu.swapchain_params();
        let frames = FrameSynchronizer::new(gpu, params, size, cfg.timeout_ns())
            .context("creating frame resources")?;
        info!(
            "Vulkan renderer ready on {} ({} frames in flight)",
            frames.gpu().device_name(),
            FRAMES_IN_FLIGHT
        );
        Ok(frames)
    }

    fn resize(&mut self, size: RenderSize) {
        FrameSynchronizer::resize(self, size);
    }

    fn render_frame(&mut self) -> Result<()> {
        FrameSynchronizer::render_frame(self).context("render_frame")
    }

    fn refresh(&self) {
        FrameSynchronizer::refresh(self);
    }

    fn refresh_signal(&self) -> RefreshSignal {
        FrameSynchronizer::refresh_signal(self)
    }

    fn close(&mut self) {
        FrameSynchronizer::close(self);
    }
}
