// SPDX-License-Identifier: CEPL-1.0
//! Double-buffered frame submission.
//!
//! Each frame slot owns an acquire semaphore, a render-complete semaphore and
//! an in-flight fence for the lifetime of the synchronizer. Slot `i` is used
//! every [`FRAMES_IN_FLIGHT`] frames and its fence is waited on before any of
//! its semaphores are touched again.
//!
//! Swapchain recreation only ever happens at the top of
//! [`FrameSynchronizer::render_frame`], after the device is idle. Everything
//! else (resizes, stale acquires, stale presents, [`FrameSynchronizer::refresh`]
//! from another thread) just raises the shared [`RefreshSignal`].

use ash::vk;
use prism_render::{RefreshSignal, RenderSize};
use tracing::{debug, error, trace, warn};

use crate::container::SwapchainParams;
use crate::error::{is_stale_surface, VkError, VkResultExt};
use crate::gpu::{FrameSubmit, Gpu, GpuResource};
use crate::manager::SwapchainManager;
use crate::release::{release_in_order, ReleaseGuard};

pub const FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Acquiring,
    Submitted,
}

#[derive(Debug)]
pub struct FrameSlot {
    image_acquired: vk::Semaphore,
    render_complete: vk::Semaphore,
    in_flight: vk::Fence,
    state: SlotState,
    // Acquire succeeded but the frame was dropped; the semaphore holds a
    // signal nobody will wait on.
    stale_acquire: bool,
}

impl FrameSlot {
    pub fn image_acquired(&self) -> vk::Semaphore {
        self.image_acquired
    }

    pub fn render_complete(&self) -> vk::Semaphore {
        self.render_complete
    }

    pub fn in_flight(&self) -> vk::Fence {
        self.in_flight
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    fn resources(&self) -> [GpuResource; 3] {
        [
            GpuResource::Semaphore(self.image_acquired),
            GpuResource::Semaphore(self.render_complete),
            GpuResource::Fence(self.in_flight),
        ]
    }
}

fn create_slots<G: Gpu + ?Sized>(gpu: &G) -> Result<Vec<FrameSlot>, VkError> {
    let mut guard = ReleaseGuard::new(gpu);
    let mut slots = Vec::with_capacity(FRAMES_IN_FLIGHT);
    for _ in 0..FRAMES_IN_FLIGHT {
        let image_acquired = gpu.create_semaphore().op("create_semaphore")?;
        guard.track(GpuResource::Semaphore(image_acquired));
        let render_complete = gpu.create_semaphore().op("create_semaphore")?;
        guard.track(GpuResource::Semaphore(render_complete));
        // Signaled so the first wait on each slot returns immediately.
        let in_flight = gpu.create_fence(true).op("create_fence")?;
        guard.track(GpuResource::Fence(in_flight));
        slots.push(FrameSlot {
            image_acquired,
            render_complete,
            in_flight,
            state: SlotState::Idle,
            stale_acquire: false,
        });
    }
    guard.commit();
    Ok(slots)
}

pub struct FrameSynchronizer<G: Gpu> {
    gpu: G,
    swapchains: SwapchainManager,
    params: SwapchainParams,
    slots: Vec<FrameSlot>,
    frame_counter: u64,
    refresh: RefreshSignal,
    drawable: RenderSize,
    timeout_ns: u64,
    recreations: u64,
    closed: bool,
}

impl<G: Gpu> FrameSynchronizer<G> {
    /// Create the frame slots and the first swapchain generation.
    pub fn new(
        gpu: G,
        params: SwapchainParams,
        drawable: RenderSize,
        timeout_ns: u64,
    ) -> Result<Self, VkError> {
        let slots = create_slots(&gpu)?;
        let mut frames = Self {
            gpu,
            swapchains: SwapchainManager::new(),
            params,
            slots,
            frame_counter: 0,
            refresh: RefreshSignal::new(),
            drawable,
            timeout_ns,
            recreations: 0,
            closed: false,
        };
        // On failure the Drop impl releases the slots.
        frames
            .swapchains
            .refresh(&frames.gpu, &frames.params, frames.drawable)?;
        Ok(frames)
    }

    pub fn render_frame(&mut self) -> Result<(), VkError> {
        if self.closed {
            return Err(VkError::NotInitialized);
        }
        if self.refresh.take() {
            self.recreate()?;
        }

        let slot_index = (self.frame_counter % FRAMES_IN_FLIGHT as u64) as usize;
        self.frame_counter += 1;
        let slot = &mut self.slots[slot_index];

        self.gpu
            .wait_for_fence(slot.in_flight, self.timeout_ns)
            .op("wait_for_fences")?;
        slot.state = SlotState::Idle;

        let swapchain = self.swapchains.current_swapchain()?;
        slot.state = SlotState::Acquiring;
        let image_index =
            match self
                .gpu
                .acquire_next_image(swapchain, slot.image_acquired, self.timeout_ns)
            {
                Ok((index, false)) => index,
                Ok((_, true)) => {
                    warn!("acquire: swapchain suboptimal, rebuilding");
                    slot.stale_acquire = true;
                    slot.state = SlotState::Idle;
                    self.refresh.request();
                    return Ok(());
                }
                Err(result) if is_stale_surface(result) => {
                    warn!("acquire: {result}, rebuilding");
                    slot.state = SlotState::Idle;
                    self.refresh.request();
                    return Ok(());
                }
                Err(result) => return Err(VkError::vulkan("acquire_next_image", result)),
            };

        let command_buffer = self.swapchains.current_command_buffers()?[image_index as usize];

        // Only now is a submit guaranteed to follow, so the fence can be reset
        // without risking a wait that never returns.
        self.gpu
            .reset_fence(slot.in_flight)
            .op("reset_fences")?;

        self.gpu
            .submit(&FrameSubmit {
                command_buffer,
                wait: slot.image_acquired,
                signal: slot.render_complete,
                fence: slot.in_flight,
            })
            .op("queue_submit")?;
        slot.state = SlotState::Submitted;

        match self
            .gpu
            .present(swapchain, image_index, slot.render_complete)
        {
            Ok(false) => {}
            Ok(true) => {
                warn!("present: swapchain suboptimal, rebuilding");
                self.refresh.request();
            }
            Err(result) if is_stale_surface(result) => {
                warn!("present: {result}, rebuilding");
                self.refresh.request();
            }
            Err(result) => return Err(VkError::vulkan("queue_present", result)),
        }

        trace!(slot = slot_index, image = image_index, "frame submitted");
        Ok(())
    }

    fn recreate(&mut self) -> Result<(), VkError> {
        self.gpu.wait_idle().op("device_wait_idle")?;

        for slot in self.slots.iter_mut().filter(|s| s.stale_acquire) {
            let fresh = self.gpu.create_semaphore().op("create_semaphore")?;
            let old = std::mem::replace(&mut slot.image_acquired, fresh);
            release_in_order(&self.gpu, [GpuResource::Semaphore(old)]);
            slot.stale_acquire = false;
        }

        self.swapchains
            .refresh(&self.gpu, &self.params, self.drawable)?;
        self.recreations += 1;
        debug!(
            recreations = self.recreations,
            "swapchain rebuilt for {}x{}",
            self.drawable.width,
            self.drawable.height
        );
        Ok(())
    }

    /// Request a swapchain rebuild at the start of the next frame.
    pub fn refresh(&self) {
        self.refresh.request();
    }

    pub fn refresh_signal(&self) -> RefreshSignal {
        self.refresh.clone()
    }

    pub fn resize(&mut self, size: RenderSize) {
        self.drawable = size;
        self.refresh.request();
    }

    /// Wait for the GPU, then release the frame slots and the current
    /// swapchain generation. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.gpu.wait_idle() {
            error!("device_wait_idle before teardown: {e}");
        }
        let slots = std::mem::take(&mut self.slots);
        release_in_order(&self.gpu, slots.iter().flat_map(FrameSlot::resources));
        self.swapchains.close(&self.gpu);
        debug!(frames = self.frame_counter, "frame synchronizer closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn swapchains(&self) -> &SwapchainManager {
        &self.swapchains
    }

    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    pub fn drawable(&self) -> RenderSize {
        self.drawable
    }
}

impl<G: Gpu> Drop for FrameSynchronizer<G> {
    fn drop(&mut self) {
        self.close();
    }
}
