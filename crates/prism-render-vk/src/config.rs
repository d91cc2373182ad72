// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use std::ffi::{CStr, CString};
use std::path::PathBuf;
use std::time::Duration;

/// Everything instance and device construction needs to know up front.
/// Built once by the caller and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct VkConfig {
    pub app_name: String,
    /// Enables the validation layers below and routes their messages to tracing.
    pub validation: bool,
    pub validation_layers: Vec<CString>,
    pub device_extensions: Vec<&'static CStr>,
    /// Upper bound on fence waits and image acquisition. `None` waits forever.
    pub fence_timeout: Option<Duration>,
    /// Directory searched for shader binaries before the built-in set.
    pub shader_dir: Option<PathBuf>,
    pub vertex_shader: String,
    pub fragment_shader: String,
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            app_name: "prism".to_owned(),
            validation: cfg!(debug_assertions),
            validation_layers: vec![c"VK_LAYER_KHRONOS_validation".to_owned()],
            device_extensions: vec![swapchain::NAME],
            fence_timeout: None,
            shader_dir: None,
            vertex_shader: "triangle.vert.spv".to_owned(),
            fragment_shader: "triangle.frag.spv".to_owned(),
        }
    }
}

impl VkConfig {
    pub fn timeout_ns(&self) -> u64 {
        self.fence_timeout
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(u64::MAX)
    }
}
