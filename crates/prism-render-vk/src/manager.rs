// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use prism_render::RenderSize;
use tracing::debug;

use crate::container::{SwapchainContainer, SwapchainParams};
use crate::error::VkError;
use crate::gpu::Gpu;

/// Owns at most one [`SwapchainContainer`] and replaces it on demand.
#[derive(Debug, Default)]
pub struct SwapchainManager {
    current: Option<SwapchainContainer>,
    generation: u64,
}

impl SwapchainManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear down the current container, then build and install a new one.
    ///
    /// The caller must have waited for the device to go idle. On failure the
    /// manager is left empty and the error is returned.
    pub fn refresh<G: Gpu + ?Sized>(
        &mut self,
        gpu: &G,
        params: &SwapchainParams,
        drawable: RenderSize,
    ) -> Result<(), VkError> {
        self.close(gpu);
        let container = SwapchainContainer::build(gpu, params, drawable)?;
        self.generation += 1;
        debug!(
            generation = self.generation,
            "installed swapchain {}x{}",
            container.extent().width,
            container.extent().height
        );
        self.current = Some(container);
        Ok(())
    }

    pub fn current(&self) -> Result<&SwapchainContainer, VkError> {
        self.current.as_ref().ok_or(VkError::NotInitialized)
    }

    pub fn current_swapchain(&self) -> Result<vk::SwapchainKHR, VkError> {
        self.current().map(SwapchainContainer::swapchain)
    }

    pub fn current_command_buffers(&self) -> Result<&[vk::CommandBuffer], VkError> {
        self.current().map(SwapchainContainer::command_buffers)
    }

    /// Number of containers installed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_initialized(&self) -> bool {
        self.current.is_some()
    }

    pub fn close<G: Gpu + ?Sized>(&mut self, gpu: &G) {
        if let Some(old) = self.current.take() {
            old.close(gpu);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{params, MockGpu};

    const SIZE: RenderSize = RenderSize {
        width: 800,
        height: 600,
    };

    #[test]
    fn queries_fail_before_the_first_refresh() {
        let mgr = SwapchainManager::new();
        assert!(matches!(mgr.current_swapchain(), Err(VkError::NotInitialized)));
        assert!(matches!(
            mgr.current_command_buffers(),
            Err(VkError::NotInitialized)
        ));
    }

    #[test]
    fn refresh_installs_a_container() {
        let gpu = MockGpu::default();
        let mut mgr = SwapchainManager::new();
        mgr.refresh(&gpu, &params(), SIZE).unwrap();
        assert_eq!(mgr.generation(), 1);
        assert_eq!(mgr.current_command_buffers().unwrap().len(), 3);
        assert!(mgr.current_swapchain().is_ok());
    }

    #[test]
    fn old_container_is_gone_before_the_new_one_exists() {
        let gpu = MockGpu::default();
        let mut mgr = SwapchainManager::new();
        for _ in 0..4 {
            mgr.refresh(&gpu, &params(), SIZE).unwrap();
        }
        assert_eq!(gpu.created("swapchain"), 4);
        assert_eq!(gpu.max_live_swapchains(), 1);
        assert_eq!(gpu.live("swapchain"), 1);
        assert_eq!(gpu.live("image view"), 3);
    }

    #[test]
    fn failed_refresh_leaves_the_manager_empty() {
        let gpu = MockGpu::default();
        let mut mgr = SwapchainManager::new();
        mgr.refresh(&gpu, &params(), SIZE).unwrap();
        gpu.fail_create("pipeline", 1);
        assert!(mgr.refresh(&gpu, &params(), SIZE).is_err());
        assert!(!mgr.is_initialized());
        assert!(matches!(mgr.current_swapchain(), Err(VkError::NotInitialized)));
        assert_eq!(gpu.live_total(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let gpu = MockGpu::default();
        let mut mgr = SwapchainManager::new();
        mgr.refresh(&gpu, &params(), SIZE).unwrap();
        mgr.close(&gpu);
        let released = gpu.released_kinds().len();
        mgr.close(&gpu);
        assert_eq!(gpu.released_kinds().len(), released);
        assert_eq!(gpu.live_total(), 0);
    }
}
