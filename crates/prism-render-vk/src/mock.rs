// SPDX-License-Identifier: CEPL-1.0
//! Recording [`Gpu`] used by the unit tests.

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::container::SwapchainParams;
use crate::gpu::{
    FrameSubmit, Gpu, GpuResource, PassRecording, PipelineDesc, SurfaceSupport, SwapchainDesc,
};
use crate::selector::QueueFamilies;
use crate::surface::DEFAULT_SURFACE_FORMAT;

pub fn params() -> SwapchainParams {
    SwapchainParams {
        queue_families: QueueFamilies {
            graphics: 0,
            present: 0,
        },
        vertex_shader: vk::ShaderModule::from_raw(900),
        fragment_shader: vk::ShaderModule::from_raw(901),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Create(&'static str, u64),
    Release(&'static str),
    Record(vk::CommandBuffer),
    WaitFence(vk::Fence),
    ResetFence(vk::Fence),
    Acquire(vk::SwapchainKHR, vk::Semaphore),
    Submit(FrameSubmit),
    Present(vk::SwapchainKHR, u32, vk::Semaphore),
    WaitIdle,
}

pub struct MockGpu {
    pub support: RefCell<SurfaceSupport>,
    next_handle: Cell<u64>,
    live: RefCell<HashSet<(&'static str, u64)>>,
    created: RefCell<HashMap<&'static str, usize>>,
    max_live_swapchains: Cell<usize>,
    image_count: Cell<u32>,
    next_image: Cell<u32>,
    fail_create: RefCell<Option<(&'static str, usize)>>,
    fail_release: RefCell<HashSet<&'static str>>,
    pub acquire_script: RefCell<VecDeque<VkResult<(u32, bool)>>>,
    pub present_script: RefCell<VecDeque<VkResult<bool>>>,
    pub fence_script: RefCell<VecDeque<VkResult<()>>>,
    pub swapchain_descs: RefCell<Vec<SwapchainDesc>>,
    pub recordings: RefCell<Vec<(vk::CommandBuffer, PassRecording)>>,
    log: RefCell<Vec<Call>>,
}

impl Default for MockGpu {
    fn default() -> Self {
        Self {
            support: RefCell::new(SurfaceSupport {
                capabilities: vk::SurfaceCapabilitiesKHR {
                    min_image_count: 2,
                    max_image_count: 0,
                    current_extent: vk::Extent2D {
                        width: 800,
                        height: 600,
                    },
                    min_image_extent: vk::Extent2D {
                        width: 1,
                        height: 1,
                    },
                    max_image_extent: vk::Extent2D {
                        width: 4096,
                        height: 4096,
                    },
                    current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                    ..Default::default()
                },
                formats: vec![DEFAULT_SURFACE_FORMAT],
                present_modes: vec![vk::PresentModeKHR::FIFO],
            }),
            next_handle: Cell::new(1),
            live: RefCell::default(),
            created: RefCell::default(),
            max_live_swapchains: Cell::new(0),
            image_count: Cell::new(0),
            next_image: Cell::new(0),
            fail_create: RefCell::new(None),
            fail_release: RefCell::default(),
            acquire_script: RefCell::default(),
            present_script: RefCell::default(),
            fence_script: RefCell::default(),
            swapchain_descs: RefCell::default(),
            recordings: RefCell::default(),
            log: RefCell::default(),
        }
    }
}

impl MockGpu {
    /// Make the `nth` (0-based) creation of `kind` fail.
    pub fn fail_create(&self, kind: &'static str, nth: usize) {
        *self.fail_create.borrow_mut() = Some((kind, nth));
    }

    pub fn fail_release(&self, kind: &'static str) {
        self.fail_release.borrow_mut().insert(kind);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn released_kinds(&self) -> Vec<&'static str> {
        self.log
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Release(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    pub fn live(&self, kind: &'static str) -> usize {
        self.live.borrow().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn live_total(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn created(&self, kind: &'static str) -> usize {
        self.created.borrow().get(kind).copied().unwrap_or(0)
    }

    pub fn max_live_swapchains(&self) -> usize {
        self.max_live_swapchains.get()
    }

    fn push(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn make<H: Handle>(&self, kind: &'static str) -> VkResult<H> {
        let nth = {
            let mut created = self.created.borrow_mut();
            let n = created.entry(kind).or_insert(0);
            *n += 1;
            *n - 1
        };
        if *self.fail_create.borrow() == Some((kind, nth)) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        self.live.borrow_mut().insert((kind, raw));
        self.push(Call::Create(kind, raw));
        if kind == "swapchain" {
            self.max_live_swapchains
                .set(self.max_live_swapchains.get().max(self.live("swapchain")));
        }
        Ok(H::from_raw(raw))
    }

    fn forget(&self, kind: &'static str, raw: u64) {
        self.live.borrow_mut().remove(&(kind, raw));
    }
}

impl Gpu for MockGpu {
    fn surface_support(&self) -> VkResult<SurfaceSupport> {
        Ok(self.support.borrow().clone())
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let swapchain = self.make("swapchain")?;
        self.swapchain_descs.borrow_mut().push(*desc);
        self.image_count.set(desc.image_count);
        self.next_image.set(0);
        Ok(swapchain)
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        // Images belong to the swapchain; they are never tracked as live.
        Ok((0..self.image_count.get())
            .map(|i| vk::Image::from_raw(10_000 + u64::from(i)))
            .collect())
    }

    fn create_image_view(&self, _image: vk::Image, _format: vk::Format) -> VkResult<vk::ImageView> {
        self.make("image view")
    }

    fn create_render_pass(&self, _format: vk::Format) -> VkResult<vk::RenderPass> {
        self.make("render pass")
    }

    fn create_pipeline_layout(&self) -> VkResult<vk::PipelineLayout> {
        self.make("pipeline layout")
    }

    fn create_graphics_pipeline(&self, _desc: &PipelineDesc) -> VkResult<vk::Pipeline> {
        self.make("pipeline")
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        self.make("framebuffer")
    }

    fn allocate_command_buffers(&self, count: u32) -> VkResult<Vec<vk::CommandBuffer>> {
        (0..count).map(|_| self.make("command buffer")).collect()
    }

    fn record_pass(&self, cmd: vk::CommandBuffer, pass: &PassRecording) -> VkResult<()> {
        self.push(Call::Record(cmd));
        self.recordings.borrow_mut().push((cmd, *pass));
        Ok(())
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        self.make("semaphore")
    }

    fn create_fence(&self, _signaled: bool) -> VkResult<vk::Fence> {
        self.make("fence")
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> VkResult<()> {
        self.push(Call::WaitFence(fence));
        self.fence_script.borrow_mut().pop_front().unwrap_or(Ok(()))
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.push(Call::ResetFence(fence));
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
        _timeout_ns: u64,
    ) -> VkResult<(u32, bool)> {
        self.push(Call::Acquire(swapchain, signal));
        if let Some(scripted) = self.acquire_script.borrow_mut().pop_front() {
            return scripted;
        }
        let count = self.image_count.get().max(1);
        let index = self.next_image.get() % count;
        self.next_image.set(index + 1);
        Ok((index, false))
    }

    fn submit(&self, submit: &FrameSubmit) -> VkResult<()> {
        self.push(Call::Submit(*submit));
        Ok(())
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        self.push(Call::Present(swapchain, image_index, wait));
        self.present_script.borrow_mut().pop_front().unwrap_or(Ok(false))
    }

    fn wait_idle(&self) -> VkResult<()> {
        self.push(Call::WaitIdle);
        Ok(())
    }

    fn release(&self, resource: GpuResource) -> VkResult<()> {
        let kind = resource.kind();
        self.push(Call::Release(kind));
        if self.fail_release.borrow().contains(kind) {
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        match resource {
            GpuResource::CommandBuffers(bufs) => {
                for b in bufs {
                    self.forget("command buffer", b.as_raw());
                }
            }
            GpuResource::Framebuffer(h) => self.forget(kind, h.as_raw()),
            GpuResource::ImageView(h) => self.forget(kind, h.as_raw()),
            GpuResource::Pipeline(h) => self.forget(kind, h.as_raw()),
            GpuResource::PipelineLayout(h) => self.forget(kind, h.as_raw()),
            GpuResource::RenderPass(h) => self.forget(kind, h.as_raw()),
            GpuResource::Swapchain(h) => self.forget(kind, h.as_raw()),
            GpuResource::Semaphore(h) => self.forget(kind, h.as_raw()),
            GpuResource::Fence(h) => self.forget(kind, h.as_raw()),
        }
        Ok(())
    }
}
