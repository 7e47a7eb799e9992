//! # Parry Cooking
//!
//! Builds `SharedShape`s from a [`MeshDesc`] and rejects geometry the solver
//! cannot use:
//!
//! | Mode           | Rejected when                                              |
//! |----------------|------------------------------------------------------------|
//! | `Convex`       | fewer than 4 points, or hull volume <= `degenerate_volume`  |
//! | `TriangleMesh` | no triangles, an index out of range, or total area <= `degenerate_area` |

#![allow(unsafe_code)]

use kiln_core::native::{read_points, read_triangles};
use kiln_shared::{CookMode, CookingParams, MeshDesc, Vec3};
use rapier3d::math::{Point, Real};
use rapier3d::parry::shape::{Shape, SharedShape};

/// A cooked collision shape, as handed out behind a native mesh pointer.
pub struct CookedMesh {
    shape: SharedShape,
    mode: CookMode,
    vertex_count: u32,
    triangle_count: u32,
}

impl CookedMesh {
    /// The parry shape.
    #[must_use]
    pub fn shape(&self) -> &SharedShape {
        &self.shape
    }

    /// Mode this shape was cooked in.
    #[must_use]
    pub fn mode(&self) -> CookMode {
        self.mode
    }

    /// Vertices of the cooked shape (hull vertices in convex mode).
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Triangles of the cooked shape (hull faces in convex mode).
    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.triangle_count
    }
}

impl std::fmt::Debug for CookedMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookedMesh")
            .field("mode", &self.mode)
            .field("vertex_count", &self.vertex_count)
            .field("triangle_count", &self.triangle_count)
            .finish_non_exhaustive()
    }
}

fn to_parry(points: &[Vec3]) -> Vec<Point<Real>> {
    points.iter().map(|p| Point::new(p.x, p.y, p.z)).collect()
}

/// Volume of the largest tetrahedron found by greedy farthest-point search.
///
/// A lower bound on the hull volume; zero for coplanar input.
#[must_use]
pub fn spanning_volume(points: &[Vec3]) -> f32 {
    let Some(&a) = points.first() else {
        return 0.0;
    };
    let farthest = |score: &dyn Fn(Vec3) -> f32| {
        points
            .iter()
            .copied()
            .max_by(|p, q| score(*p).total_cmp(&score(*q)))
            .unwrap_or(a)
    };

    let b = farthest(&|p| (p - a).length_squared());
    let ab = b - a;
    let c = farthest(&|p| ab.cross(p - a).length_squared());
    let normal = ab.cross(c - a);
    let d = farthest(&|p| normal.dot(p - a).abs());

    normal.dot(d - a).abs() / 6.0
}

/// Sum of triangle areas. Indices must be in range.
#[must_use]
pub fn surface_area(points: &[Vec3], triangles: &[[u32; 3]]) -> f32 {
    triangles
        .iter()
        .map(|&[i, j, k]| {
            let (a, b, c) = (points[i as usize], points[j as usize], points[k as usize]);
            (b - a).cross(c - a).length() * 0.5
        })
        .sum()
}

fn cook_convex(points: &[Vec3], params: &CookingParams) -> Option<CookedMesh> {
    if points.len() < 4 {
        tracing::debug!(points = points.len(), "convex cook rejected: fewer than 4 points");
        return None;
    }
    let volume = spanning_volume(points);
    if volume <= params.degenerate_volume {
        tracing::debug!(volume, "convex cook rejected: flat point cloud");
        return None;
    }

    let shape = SharedShape::convex_hull(&to_parry(points))?;
    let hull = shape.as_convex_polyhedron()?;
    let hull_volume = shape.mass_properties(1.0).mass();
    if hull_volume <= params.degenerate_volume {
        tracing::debug!(hull_volume, "convex cook rejected: degenerate hull");
        return None;
    }

    let (vertices, faces) = hull.to_trimesh();
    Some(CookedMesh {
        vertex_count: u32::try_from(vertices.len()).ok()?,
        triangle_count: u32::try_from(faces.len()).ok()?,
        shape,
        mode: CookMode::Convex,
    })
}

fn cook_triangle_mesh(
    points: &[Vec3],
    triangles: Vec<[u32; 3]>,
    params: &CookingParams,
) -> Option<CookedMesh> {
    if triangles.is_empty() {
        tracing::debug!("triangle mesh cook rejected: no triangles");
        return None;
    }
    if triangles.iter().flatten().any(|&i| i as usize >= points.len()) {
        tracing::debug!(points = points.len(), "triangle mesh cook rejected: index out of range");
        return None;
    }
    let area = surface_area(points, &triangles);
    if area <= params.degenerate_area {
        tracing::debug!(area, "triangle mesh cook rejected: zero area");
        return None;
    }

    let vertex_count = u32::try_from(points.len()).ok()?;
    let triangle_count = u32::try_from(triangles.len()).ok()?;
    Some(CookedMesh {
        shape: SharedShape::trimesh(to_parry(points), triangles),
        mode: CookMode::TriangleMesh,
        vertex_count,
        triangle_count,
    })
}

/// Cooks the mesh `desc` describes. `None` when the geometry is rejected.
///
/// # Safety
///
/// Every pointer in `desc` must be readable for the extent it describes.
pub unsafe fn cook(mode: CookMode, desc: &MeshDesc, params: &CookingParams) -> Option<CookedMesh> {
    if desc.points.is_null() {
        return None;
    }
    let points: Vec<Vec3> = read_points(desc).into_iter().map(Vec3::from_array).collect();
    match mode {
        CookMode::Convex => cook_convex(&points, params),
        CookMode::TriangleMesh => cook_triangle_mesh(&points, read_triangles(desc), params),
    }
}
