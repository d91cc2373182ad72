// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use portable_atomic::{AtomicBool, Ordering};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The "swapchain is stale" flag shared between the render thread and
/// whoever notices the surface changed (resize callbacks, other threads).
///
/// Setting it is fire-and-forget. The render loop consumes it with
/// [`RefreshSignal::take`], which clears it in the same atomic step so a
/// request is never lost or acted on twice.
#[derive(Clone, Debug, Default)]
pub struct RefreshSignal(Arc<AtomicBool>);

impl RefreshSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub trait Renderer {
    type Config;

    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: Self::Config,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Record the new drawable size. Never rebuilds anything on the spot;
    /// the next [`Renderer::render_frame`] picks it up.
    fn resize(&mut self, size: RenderSize);

    fn render_frame(&mut self) -> Result<()>;

    /// Ask for the swapchain to be rebuilt at the top of the next frame.
    fn refresh(&self);

    /// Handle that can request a refresh from any thread.
    fn refresh_signal(&self) -> RefreshSignal;

    /// Wait for the GPU and release everything. Safe to call more than once.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_the_request() {
        let signal = RefreshSignal::new();
        assert!(!signal.take());
        signal.request();
        signal.request();
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn clones_share_state_across_threads() {
        let signal = RefreshSignal::new();
        let remote = signal.clone();
        std::thread::spawn(move || remote.request()).join().unwrap();
        assert!(signal.is_requested());
        assert!(signal.take());
    }

    #[test]
    fn zero_sized_drawables_are_empty() {
        assert!(RenderSize { width: 0, height: 600 }.is_empty());
        assert!(!RenderSize { width: 800, height: 600 }.is_empty());
    }
}
