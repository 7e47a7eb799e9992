//! In-memory engine for unit tests.

#![allow(unsafe_code)]

use kiln_shared::{CookMode, CookingParams, IndexWidth, MeshDesc};
use parking_lot::Mutex;
use std::alloc::Layout;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::native::{read_points, read_triangles, NativeMesh, PhysicsNative};

/// What the engine saw on its last cook call.
#[derive(Clone, Debug, PartialEq)]
pub struct SeenCook {
    pub mode: CookMode,
    pub points: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
    pub width: Option<IndexWidth>,
}

/// Engine that keeps cooked meshes as boxed copies of their input.
pub struct MockNative {
    live_allocations: AtomicUsize,
    allocation_budget: AtomicUsize,
    cooks: AtomicUsize,
    live_meshes: AtomicUsize,
    last_cook: Mutex<Option<SeenCook>>,
}

impl MockNative {
    pub fn new() -> Self {
        Self {
            live_allocations: AtomicUsize::new(0),
            allocation_budget: AtomicUsize::new(usize::MAX),
            cooks: AtomicUsize::new(0),
            live_meshes: AtomicUsize::new(0),
            last_cook: Mutex::new(None),
        }
    }

    /// Fails every allocation after the first `budget`.
    pub fn with_allocation_budget(self, budget: usize) -> Self {
        self.allocation_budget.store(budget, Ordering::SeqCst);
        self
    }

    pub fn live_allocations(&self) -> usize {
        self.live_allocations.load(Ordering::SeqCst)
    }

    pub fn cooks(&self) -> usize {
        self.cooks.load(Ordering::SeqCst)
    }

    pub fn live_meshes(&self) -> usize {
        self.live_meshes.load(Ordering::SeqCst)
    }

    pub fn last_cook(&self) -> Option<SeenCook> {
        self.last_cook.lock().clone()
    }
}

impl PhysicsNative for MockNative {
    fn alloc(&self, size: usize, align: usize) -> *mut u8 {
        let granted = self
            .allocation_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        let Ok(layout) = Layout::from_size_align(size, align) else {
            return std::ptr::null_mut();
        };
        if !granted || size == 0 {
            return std::ptr::null_mut();
        }
        self.live_allocations.fetch_add(1, Ordering::SeqCst);
        // SAFETY: non-zero size checked above.
        unsafe { std::alloc::alloc(layout) }
    }

    unsafe fn free(&self, ptr: *mut u8, size: usize, align: usize) {
        self.live_allocations.fetch_sub(1, Ordering::SeqCst);
        std::alloc::dealloc(ptr, Layout::from_size_align_unchecked(size, align));
    }

    unsafe fn cook(
        &self,
        mode: CookMode,
        desc: &MeshDesc,
        _params: &CookingParams,
    ) -> Option<NativeMesh> {
        self.cooks.fetch_add(1, Ordering::SeqCst);

        let points = read_points(desc);
        let triangles = read_triangles(desc);
        let width = (!desc.triangles.is_null()).then_some(desc.index_width);
        *self.last_cook.lock() = Some(SeenCook {
            mode,
            points: points.clone(),
            triangles: triangles.clone(),
            width,
        });

        let degenerate = points.windows(2).all(|w| w[0] == w[1]);
        if points.is_empty() || degenerate || (mode.uses_indices() && triangles.is_empty()) {
            return None;
        }

        self.live_meshes.fetch_add(1, Ordering::SeqCst);
        NativeMesh::from_raw(Box::into_raw(Box::new(points)).cast())
    }

    unsafe fn release(&self, mesh: NativeMesh) {
        self.live_meshes.fetch_sub(1, Ordering::SeqCst);
        drop(Box::from_raw(mesh.as_ptr().cast::<Vec<[f32; 3]>>()));
    }
}
