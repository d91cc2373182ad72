// SPDX-License-Identifier: CEPL-1.0
use ash::prelude::VkResult;
use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VkError {
    #[error("no physical device offers both a graphics and a presentation queue")]
    NoSuitableDevice,
    #[error("logical device creation rejected: {0}")]
    DeviceCreation(vk::Result),
    #[error("surface reports no supported formats")]
    NoSupportedFormat,
    #[error("surface reports no supported present modes")]
    NoSupportedPresentMode,
    #[error("swapchain has not been created")]
    NotInitialized,
    #[error("device lost during {op}: {result}")]
    DeviceLost { op: &'static str, result: vk::Result },
    #[error("{op} failed: {result}")]
    Vulkan { op: &'static str, result: vk::Result },
    #[error("window handle: {0}")]
    Handle(#[from] raw_window_handle::HandleError),
    #[error("shader {id}: {source}")]
    Shader {
        id: String,
        #[source]
        source: std::io::Error,
    },
}

impl VkError {
    pub fn vulkan(op: &'static str, result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST | vk::Result::TIMEOUT => Self::DeviceLost { op, result },
            _ => Self::Vulkan { op, result },
        }
    }
}

/// Name the failing call, the way `anyhow::Context` would, but keep the
/// raw `vk::Result` around for callers that branch on it.
pub trait VkResultExt<T> {
    fn op(self, op: &'static str) -> Result<T, VkError>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn op(self, op: &'static str) -> Result<T, VkError> {
        self.map_err(|result| VkError::vulkan(op, result))
    }
}

/// Out-of-date and suboptimal surfaces are expected during resizes and are
/// answered with a swapchain rebuild, never surfaced to the caller.
pub fn is_stale_surface(result: vk::Result) -> bool {
    matches!(
        result,
        vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_lost_devices_become_device_lost() {
        let timeout: VkResult<()> = Err(vk::Result::TIMEOUT);
        assert!(matches!(
            timeout.op("wait_for_fences"),
            Err(VkError::DeviceLost { op: "wait_for_fences", .. })
        ));
        let lost: VkResult<()> = Err(vk::Result::ERROR_DEVICE_LOST);
        assert!(matches!(lost.op("queue_submit"), Err(VkError::DeviceLost { .. })));
    }

    #[test]
    fn other_failures_keep_their_result() {
        let oom: VkResult<()> = Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        match oom.op("create_fence") {
            Err(VkError::Vulkan { op, result }) => {
                assert_eq!(op, "create_fence");
                assert_eq!(result, vk::Result::ERROR_OUT_OF_HOST_MEMORY);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_out_of_date_and_suboptimal_are_stale() {
        assert!(is_stale_surface(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert!(is_stale_surface(vk::Result::SUBOPTIMAL_KHR));
        assert!(!is_stale_surface(vk::Result::ERROR_SURFACE_LOST_KHR));
    }
}
