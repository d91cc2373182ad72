// SPDX-License-Identifier: CEPL-1.0
use tracing::error;

use crate::gpu::{Gpu, GpuResource};

/// Hand every resource back in the given order. A failed release is logged
/// and the rest still go; returns how many failed.
pub fn release_in_order<G: Gpu + ?Sized>(
    gpu: &G,
    resources: impl IntoIterator<Item = GpuResource>,
) -> usize {
    let mut failures = 0;
    for resource in resources {
        let kind = resource.kind();
        if let Err(e) = gpu.release(resource) {
            error!("failed to release {kind}: {e}");
            failures += 1;
        }
    }
    failures
}

/// Tracks objects created during a multi-step build. Unless the build calls
/// [`ReleaseGuard::commit`], dropping the guard releases everything it saw,
/// newest first.
pub struct ReleaseGuard<'a, G: Gpu + ?Sized> {
    gpu: &'a G,
    created: Vec<GpuResource>,
}

impl<'a, G: Gpu + ?Sized> ReleaseGuard<'a, G> {
    pub fn new(gpu: &'a G) -> Self {
        Self {
            gpu,
            created: Vec::new(),
        }
    }

    pub fn track(&mut self, resource: GpuResource) {
        self.created.push(resource);
    }

    /// The build succeeded; ownership moves to whatever was built.
    pub fn commit(mut self) {
        self.created.clear();
    }
}

impl<G: Gpu + ?Sized> Drop for ReleaseGuard<'_, G> {
    fn drop(&mut self) {
        if self.created.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.created);
        release_in_order(self.gpu, pending.into_iter().rev());
    }
}
