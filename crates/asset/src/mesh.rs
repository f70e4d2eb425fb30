//! GPU-ready geometry assembled from decoded PSK records.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use corelib::{Aabb, CoreError, Diagnostics, Vec3};

use crate::psk::{Face, MeshData, Point, Wedge};

/// Interleaved vertex, one per wedge. Values are in object space.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub material_index: i32,
}

impl MeshVertex {
    pub fn new(position: [f32; 3], uv: [f32; 2], material_index: i32) -> Self {
        Self {
            position,
            uv,
            material_index,
        }
    }
}

/// Contiguous run of indices drawn with one material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Batch {
    pub material_index: i32,
    /// Number of indices in the run (triangles × 3).
    pub index_count: u32,
}

/// Vertex/index buffers plus the batch table and bounds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub batches: Vec<Batch>,
    pub bounds: Aabb,
}

impl MeshGeometry {
    pub fn from_mesh_data(data: &MeshData, diag: &mut Diagnostics) -> Self {
        let vertices = assemble_vertices(&data.points, &data.wedges, diag);
        let (indices, batches) = build_batches(&data.faces, diag);
        let bounds = Aabb::from_points(data.points.iter().map(|p| Vec3::from(p.to_array())));
        Self {
            vertices,
            indices,
            batches,
            bounds,
        }
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    /// `(material_index, index range)` per batch, in draw order.
    pub fn index_ranges(&self) -> Vec<(i32, Range<u32>)> {
        index_ranges(&self.batches)
    }
}

/// Join each wedge with the point it references.
///
/// Point indices are trusted by the format. An out-of-range one is placed at
/// the origin and reported once for the whole mesh.
pub fn assemble_vertices(points: &[Point], wedges: &[Wedge], diag: &mut Diagnostics) -> Vec<MeshVertex> {
    let mut dangling = 0usize;
    let vertices = wedges
        .iter()
        .map(|w| {
            let position = match points.get(w.point_index as usize) {
                Some(p) => p.to_array(),
                None => {
                    dangling += 1;
                    [0.0; 3]
                }
            };
            MeshVertex::new(position, [w.u, w.v], w.material_index)
        })
        .collect();

    if dangling > 0 {
        diag.push(CoreError::Format(format!(
            "{dangling} wedges reference points beyond the {} decoded",
            points.len()
        )));
    }
    vertices
}

/// Flatten faces into an index buffer and group them into batches by run order.
///
/// Faces are expected sorted ascending by material index. Unsorted input
/// still yields one batch per run, so a material can appear in several
/// batches; that case is reported as a format warning.
pub fn build_batches(faces: &[Face], diag: &mut Diagnostics) -> (Vec<u32>, Vec<Batch>) {
    let mut indices = Vec::with_capacity(faces.len() * 3);
    let mut batches: Vec<Batch> = Vec::new();
    let mut unsorted = false;

    for face in faces {
        indices.extend(face.wedges.iter().map(|&w| w as u32));

        let material_index = i32::from(face.material_index);
        if let Some(batch) = batches.last_mut() {
            if batch.material_index == material_index {
                batch.index_count += 3;
                continue;
            }
            if batch.material_index > material_index {
                unsorted = true;
            }
        }
        batches.push(Batch {
            material_index,
            index_count: 3,
        });
    }

    if unsorted {
        diag.push(CoreError::Format(format!(
            "faces are not sorted by material index; produced {} batches",
            batches.len()
        )));
    }
    (indices, batches)
}

/// Running offsets over a batch table.
pub fn index_ranges(batches: &[Batch]) -> Vec<(i32, Range<u32>)> {
    let mut offset = 0u32;
    batches
        .iter()
        .map(|b| {
            let range = offset..offset + b.index_count;
            offset = range.end;
            (b.material_index, range)
        })
        .collect()
}
