// SPDX-License-Identifier: CEPL-1.0
use prism_render_vk::VkConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            title: "prism".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RenderCfg {
    /// Unset follows the build profile.
    pub validation: Option<bool>,
    pub fence_timeout_ms: Option<u64>,
    pub shader_dir: Option<PathBuf>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub no_validation: bool,
    pub fence_timeout_ms: Option<u64>,
}

impl AppCfg {
    pub fn vk_config(&self, overrides: &Overrides) -> VkConfig {
        let defaults = VkConfig::default();
        VkConfig {
            app_name: self.window.title.clone(),
            validation: !overrides.no_validation
                && self.render.validation.unwrap_or(defaults.validation),
            fence_timeout: overrides
                .fence_timeout_ms
                .or(self.render.fence_timeout_ms)
                .map(Duration::from_millis),
            shader_dir: self.render.shader_dir.clone(),
            ..defaults
        }
    }
}
