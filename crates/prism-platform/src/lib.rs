// SPDX-License-Identifier: CEPL-1.0
pub use winit;

use prism_render::RenderSize;
use tracing::debug;
use winit::window::Window;

pub fn drawable_size(window: &Window) -> RenderSize {
    let size = window.inner_size();
    RenderSize {
        width: size.width,
        height: size.height,
    }
}

/// Whether the window currently has anything to present to. Rendering pauses
/// while the drawable is 0x0 or the window is fully occluded.
#[derive(Clone, Copy, Debug)]
pub struct Visibility {
    size: RenderSize,
    occluded: bool,
}

impl Visibility {
    pub fn new(size: RenderSize) -> Self {
        Self {
            size,
            occluded: false,
        }
    }

    pub fn size(&self) -> RenderSize {
        self.size
    }

    pub fn is_paused(&self) -> bool {
        self.occluded || self.size.is_empty()
    }

    /// Returns true when the paused state flipped.
    pub fn resized(&mut self, size: RenderSize) -> bool {
        let was = self.is_paused();
        self.size = size;
        self.log_change(was)
    }

    pub fn set_occluded(&mut self, occluded: bool) -> bool {
        let was = self.is_paused();
        self.occluded = occluded;
        self.log_change(was)
    }

    fn log_change(&self, was: bool) -> bool {
        let now = self.is_paused();
        if was != now {
            debug!(
                "{}x{} occluded={} -> paused={now}",
                self.size.width, self.size.height, self.occluded
            );
        }
        was != now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(width: u32, height: u32) -> RenderSize {
        RenderSize { width, height }
    }

    #[test]
    fn minimizing_pauses_and_restoring_resumes() {
        let mut v = Visibility::new(size(800, 600));
        assert!(!v.is_paused());
        assert!(v.resized(size(0, 0)));
        assert!(v.is_paused());
        assert!(!v.resized(size(0, 600)));
        assert!(v.resized(size(1024, 768)));
        assert!(!v.is_paused());
        assert_eq!(v.size(), size(1024, 768));
    }

    #[test]
    fn occlusion_pauses_independently_of_size() {
        let mut v = Visibility::new(size(800, 600));
        assert!(v.set_occluded(true));
        assert!(!v.resized(size(640, 480)));
        assert!(v.is_paused());
        assert!(v.set_occluded(false));
        assert!(!v.is_paused());
    }
}
