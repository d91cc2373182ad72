// SPDX-License-Identifier: CEPL-1.0
//! One generation of size- and format-dependent objects.
//!
//! A container is either fully built or does not exist: [`SwapchainContainer::build`]
//! unwinds everything it created when any step fails, and
//! [`SwapchainContainer::close`] consumes the container so it cannot be used
//! after teardown.

use ash::vk;
use prism_render::RenderSize;
use tracing::info;

use crate::error::{VkError, VkResultExt};
use crate::gpu::{Gpu, GpuResource, PassRecording, PipelineDesc, SwapchainDesc};
use crate::release::{release_in_order, ReleaseGuard};
use crate::selector::QueueFamilies;
use crate::surface::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, format_name,
    present_mode_name,
};

/// Opaque black.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Long-lived inputs every generation is built from.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainParams {
    pub queue_families: QueueFamilies,
    pub vertex_shader: vk::ShaderModule,
    pub fragment_shader: vk::ShaderModule,
}

#[derive(Debug)]
pub struct SwapchainContainer {
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    image_views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,
    command_buffers: Vec<vk::CommandBuffer>,
}

impl SwapchainContainer {
    pub fn build<G: Gpu + ?Sized>(
        gpu: &G,
        params: &SwapchainParams,
        drawable: RenderSize,
    ) -> Result<Self, VkError> {
        let support = gpu
            .surface_support()
            .op("get_physical_device_surface_support")?;
        let caps = &support.capabilities;

        let image_count = choose_image_count(caps);
        let extent = choose_extent(caps, drawable);
        let format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes)?;

        let mut guard = ReleaseGuard::new(gpu);

        let swapchain = gpu
            .create_swapchain(&SwapchainDesc {
                image_count,
                format,
                extent,
                transform: caps.current_transform,
                present_mode,
                queue_families: params.queue_families,
            })
            .op("create_swapchain")?;
        guard.track(GpuResource::Swapchain(swapchain));

        let images = gpu.swapchain_images(swapchain).op("get_swapchain_images")?;
        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view = gpu
                .create_image_view(image, format.format)
                .op("create_image_view")?;
            guard.track(GpuResource::ImageView(view));
            image_views.push(view);
        }

        let render_pass = gpu
            .create_render_pass(format.format)
            .op("create_render_pass")?;
        guard.track(GpuResource::RenderPass(render_pass));

        let pipeline_layout = gpu
            .create_pipeline_layout()
            .op("create_pipeline_layout")?;
        guard.track(GpuResource::PipelineLayout(pipeline_layout));

        let pipeline = gpu
            .create_graphics_pipeline(&PipelineDesc {
                render_pass,
                layout: pipeline_layout,
                vertex: params.vertex_shader,
                fragment: params.fragment_shader,
                extent,
            })
            .op("create_graphics_pipelines")?;
        guard.track(GpuResource::Pipeline(pipeline));

        let mut framebuffers = Vec::with_capacity(image_views.len());
        for &view in &image_views {
            let fb = gpu
                .create_framebuffer(render_pass, view, extent)
                .op("create_framebuffer")?;
            guard.track(GpuResource::Framebuffer(fb));
            framebuffers.push(fb);
        }

        let command_buffers = if framebuffers.is_empty() {
            Vec::new()
        } else {
            let bufs = gpu
                .allocate_command_buffers(framebuffers.len() as u32)
                .op("allocate_command_buffers")?;
            guard.track(GpuResource::CommandBuffers(bufs.clone()));
            bufs
        };

        for (&cmd, &framebuffer) in command_buffers.iter().zip(&framebuffers) {
            gpu.record_pass(
                cmd,
                &PassRecording {
                    render_pass,
                    framebuffer,
                    pipeline,
                    extent,
                    clear: CLEAR_COLOR,
                },
            )
            .op("record_command_buffer")?;
        }

        guard.commit();

        info!(
            "swapchain: {} images, {}x{}, {} / {}",
            image_views.len(),
            extent.width,
            extent.height,
            format_name(format.format),
            present_mode_name(present_mode),
        );

        Ok(Self {
            swapchain,
            format,
            extent,
            present_mode,
            image_views,
            render_pass,
            pipeline_layout,
            pipeline,
            framebuffers,
            command_buffers,
        })
    }

    /// Release every object, dependents first. Failures are logged and the
    /// rest are still released.
    pub fn close<G: Gpu + ?Sized>(self, gpu: &G) {
        let mut order = Vec::with_capacity(self.framebuffers.len() + self.image_views.len() + 5);
        if !self.command_buffers.is_empty() {
            order.push(GpuResource::CommandBuffers(self.command_buffers));
        }
        order.extend(self.framebuffers.into_iter().map(GpuResource::Framebuffer));
        order.extend(self.image_views.into_iter().map(GpuResource::ImageView));
        order.push(GpuResource::Pipeline(self.pipeline));
        order.push(GpuResource::PipelineLayout(self.pipeline_layout));
        order.push(GpuResource::RenderPass(self.render_pass));
        order.push(GpuResource::Swapchain(self.swapchain));
        release_in_order(gpu, order);
    }

    pub fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn image_count(&self) -> usize {
        self.image_views.len()
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn command_buffers(&self) -> &[vk::CommandBuffer] {
        &self.command_buffers
    }
}
