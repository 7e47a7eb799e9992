//! Counting in-memory engine shared by the integration tests.

#![allow(unsafe_code)]
#![allow(dead_code)]

use kiln_core::{read_points, CookMode, CookingParams, NativeMesh, PhysicsNative};
use kiln_shared::MeshDesc;
use std::alloc::Layout;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Unit tetrahedron.
pub const TETRA: [f32; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Engine that counts everything crossing the boundary.
///
/// Cooked meshes are boxed point counts. All-identical points are rejected.
pub struct CountingNative {
    allocations: AtomicUsize,
    frees: AtomicUsize,
    cooks: AtomicUsize,
    rejections: AtomicUsize,
    releases: AtomicUsize,
    budget: AtomicUsize,
    cook_delay: Duration,
    /// When set, only cooks of this many points are delayed.
    delayed_point_count: Option<u32>,
}

impl CountingNative {
    pub fn new() -> Self {
        Self::with_cook_delay(Duration::ZERO)
    }

    /// Every cook sleeps for `cook_delay` to widen race windows.
    pub fn with_cook_delay(cook_delay: Duration) -> Self {
        Self {
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            cooks: AtomicUsize::new(0),
            rejections: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            budget: AtomicUsize::new(usize::MAX),
            cook_delay,
            delayed_point_count: None,
        }
    }

    /// Only cooks of exactly `point_count` points sleep for `cook_delay`.
    pub fn with_cook_delay_for(point_count: u32, cook_delay: Duration) -> Self {
        Self {
            delayed_point_count: Some(point_count),
            ..Self::with_cook_delay(cook_delay)
        }
    }

    /// Fails every allocation after the first `budget`.
    pub fn with_allocation_budget(self, budget: usize) -> Self {
        self.budget.store(budget, Ordering::SeqCst);
        self
    }

    /// Cook calls, accepted or not.
    pub fn cooks(&self) -> usize {
        self.cooks.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn live_meshes(&self) -> usize {
        self.cooks() - self.rejections.load(Ordering::SeqCst) - self.releases()
    }

    pub fn live_allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst) - self.frees.load(Ordering::SeqCst)
    }

    pub fn total_allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }
}

impl PhysicsNative for CountingNative {
    fn alloc(&self, size: usize, align: usize) -> *mut u8 {
        if self
            .budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_err()
        {
            return std::ptr::null_mut();
        }
        let Ok(layout) = Layout::from_size_align(size, align) else {
            return std::ptr::null_mut();
        };
        self.allocations.fetch_add(1, Ordering::SeqCst);
        // SAFETY: the bridge never asks for zero bytes.
        unsafe { std::alloc::alloc(layout) }
    }

    unsafe fn free(&self, ptr: *mut u8, size: usize, align: usize) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        std::alloc::dealloc(ptr, Layout::from_size_align_unchecked(size, align));
    }

    unsafe fn cook(
        &self,
        _mode: CookMode,
        desc: &MeshDesc,
        _params: &CookingParams,
    ) -> Option<NativeMesh> {
        self.cooks.fetch_add(1, Ordering::SeqCst);
        let delayed = self.delayed_point_count.map_or(true, |n| n == desc.point_count);
        if delayed && !self.cook_delay.is_zero() {
            std::thread::sleep(self.cook_delay);
        }

        let points = read_points(desc);
        if points.windows(2).all(|w| w[0] == w[1]) {
            self.rejections.fetch_add(1, Ordering::SeqCst);
            return None;
        }

        NativeMesh::from_raw(Box::into_raw(Box::new(desc.point_count)).cast())
    }

    unsafe fn release(&self, mesh: NativeMesh) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        drop(Box::from_raw(mesh.as_ptr().cast::<u32>()));
    }
}
