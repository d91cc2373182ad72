// SPDX-License-Identifier: CEPL-1.0
//! Physical device scoring and queue planning.

use ash::prelude::VkResult;
use ash::vk;

use crate::error::{VkError, VkResultExt};

/// What the selector needs to know about one queue family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub index: u32,
    pub queue_count: u32,
    pub graphics: bool,
    /// Can present to the target surface.
    pub present: bool,
}

impl QueueFamilyInfo {
    pub fn from_properties(index: u32, props: &vk::QueueFamilyProperties, present: bool) -> Self {
        Self {
            index,
            queue_count: props.queue_count,
            graphics: props.queue_flags.contains(vk::QueueFlags::GRAPHICS),
            present,
        }
    }
}

/// Describe every family of a device in index order. `can_present` asks the
/// driver whether a family can present to the target surface; any failure
/// there aborts discovery.
pub fn discover_families<F>(
    props: &[vk::QueueFamilyProperties],
    mut can_present: F,
) -> Result<Vec<QueueFamilyInfo>, VkError>
where
    F: FnMut(u32) -> VkResult<bool>,
{
    props
        .iter()
        .zip(0u32..)
        .map(|(p, index)| {
            let present = can_present(index).op("get_physical_device_surface_support")?;
            Ok(QueueFamilyInfo::from_properties(index, p, present))
        })
        .collect()
}

/// The graphics and presentation families chosen for a device. They may be
/// the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhysicalDeviceCandidate<D = vk::PhysicalDevice> {
    pub device: D,
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl<D> PhysicalDeviceCandidate<D> {
    /// Pick the first usable graphics family and, independently, the first
    /// usable presentation family. `families` must be in index order.
    pub fn evaluate(device: D, families: &[QueueFamilyInfo]) -> Self {
        let usable = || families.iter().filter(|f| f.queue_count > 0);
        Self {
            device,
            graphics_family: usable().find(|f| f.graphics).map(|f| f.index),
            present_family: usable().find(|f| f.present).map(|f| f.index),
        }
    }

    /// 0 when either role is missing, 1 when both are covered, 2 when a single
    /// family covers both.
    pub fn score(&self) -> u32 {
        match self.queue_families() {
            None => 0,
            Some(q) if q.is_shared() => 2,
            Some(_) => 1,
        }
    }

    pub fn queue_families(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics_family?,
            present: self.present_family?,
        })
    }
}

/// Highest score wins; on a tie the earliest candidate is kept.
pub fn select_device<D>(
    candidates: impl IntoIterator<Item = PhysicalDeviceCandidate<D>>,
) -> Result<PhysicalDeviceCandidate<D>, VkError> {
    let mut best: Option<PhysicalDeviceCandidate<D>> = None;
    for candidate in candidates {
        let score = candidate.score();
        if score == 0 {
            continue;
        }
        if best.as_ref().map_or(true, |b| score > b.score()) {
            best = Some(candidate);
        }
    }
    best.ok_or(VkError::NoSuitableDevice)
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueueRequest {
    pub family: u32,
    pub priorities: Vec<f32>,
}

/// One queue at full priority per distinct family.
pub fn queue_requests(families: QueueFamilies) -> Vec<QueueRequest> {
    families
        .unique()
        .into_iter()
        .map(|family| QueueRequest {
            family,
            priorities: vec![1.0],
        })
        .collect()
}
