// SPDX-License-Identifier: CEPL-1.0
//! The seam between swapchain/frame policy and the driver.
//!
//! Everything above this trait decides *what* to create, in which order, and
//! when to tear it down. Implementors only translate those decisions into
//! native calls. [`crate::backend::AshGpu`] is the real one; tests drive the
//! same policy code through a recording mock.

use ash::prelude::VkResult;
use ash::vk;

use crate::selector::QueueFamilies;

#[derive(Clone, Debug, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

#[derive(Clone, Copy, Debug)]
pub struct SwapchainDesc {
    pub image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub transform: vk::SurfaceTransformFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    pub queue_families: QueueFamilies,
}

#[derive(Clone, Copy, Debug)]
pub struct PipelineDesc {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub vertex: vk::ShaderModule,
    pub fragment: vk::ShaderModule,
    pub extent: vk::Extent2D,
}

/// Inputs for recording one pre-baked command buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassRecording {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear: [f32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSubmit {
    pub command_buffer: vk::CommandBuffer,
    pub wait: vk::Semaphore,
    pub signal: vk::Semaphore,
    pub fence: vk::Fence,
}

/// A GPU object this crate owns and must hand back exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GpuResource {
    CommandBuffers(Vec<vk::CommandBuffer>),
    Framebuffer(vk::Framebuffer),
    ImageView(vk::ImageView),
    Pipeline(vk::Pipeline),
    PipelineLayout(vk::PipelineLayout),
    RenderPass(vk::RenderPass),
    Swapchain(vk::SwapchainKHR),
    Semaphore(vk::Semaphore),
    Fence(vk::Fence),
}

impl GpuResource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CommandBuffers(_) => "command buffers",
            Self::Framebuffer(_) => "framebuffer",
            Self::ImageView(_) => "image view",
            Self::Pipeline(_) => "pipeline",
            Self::PipelineLayout(_) => "pipeline layout",
            Self::RenderPass(_) => "render pass",
            Self::Swapchain(_) => "swapchain",
            Self::Semaphore(_) => "semaphore",
            Self::Fence(_) => "fence",
        }
    }
}

pub trait Gpu {
    fn surface_support(&self) -> VkResult<SurfaceSupport>;

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView>;
    fn create_render_pass(&self, format: vk::Format) -> VkResult<vk::RenderPass>;
    fn create_pipeline_layout(&self) -> VkResult<vk::PipelineLayout>;
    fn create_graphics_pipeline(&self, desc: &PipelineDesc) -> VkResult<vk::Pipeline>;
    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer>;
    fn allocate_command_buffers(&self, count: u32) -> VkResult<Vec<vk::CommandBuffer>>;
    fn record_pass(&self, cmd: vk::CommandBuffer, pass: &PassRecording) -> VkResult<()>;

    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    /// Returns the image index and whether the swapchain is suboptimal.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
        timeout_ns: u64,
    ) -> VkResult<(u32, bool)>;
    fn submit(&self, submit: &FrameSubmit) -> VkResult<()>;
    /// Returns whether the swapchain is suboptimal.
    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool>;
    fn wait_idle(&self) -> VkResult<()>;

    fn release(&self, resource: GpuResource) -> VkResult<()>;
}
