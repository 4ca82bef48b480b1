// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the renderable-mesh descriptor and the keys used to batch it.

use serde::{Deserialize, Serialize};

/// A 3x4 row-major identity transform.
pub const IDENTITY_TRANSFORM: [[f32; 4]; 3] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

/// A flat, fixed-size description of a single mesh to be drawn.
///
/// The layout is `#[repr(C)]` and plain old data so the descriptor can be copied
/// byte-for-byte into a shared-memory segment and read back on the other side of
/// the process boundary. GPU resources are referenced by id only; their lifetime
/// is managed elsewhere.
#[repr(C)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    bytemuck::Pod,
    bytemuck::Zeroable,
    Serialize,
    Deserialize,
)]
pub struct RenderMesh {
    /// Id of the vertex buffer to bind.
    pub vertex_buffer: u32,
    /// Id of the index buffer to bind.
    pub index_buffer: u32,
    /// Number of vertices in the vertex buffer.
    pub vertex_count: u32,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Packed render-state bucket (pipeline, blend and cull flags).
    pub state: u32,
    /// Id of the diffuse texture.
    pub texture: u32,
    /// Centre of the bounding sphere, in world space.
    pub bounds_center: [f32; 3],
    /// Radius of the bounding sphere.
    pub bounds_radius: f32,
    /// World transform, 3x4 row-major.
    pub transform: [[f32; 4]; 3],
}

impl RenderMesh {
    /// Creates a descriptor for an indexed mesh with an identity transform.
    pub fn new(vertex_buffer: u32, index_buffer: u32, index_count: u32) -> Self {
        Self {
            vertex_buffer,
            index_buffer,
            index_count,
            transform: IDENTITY_TRANSFORM,
            ..Default::default()
        }
    }

    /// Sets the render-state bucket.
    pub fn with_state(mut self, state: u32) -> Self {
        self.state = state;
        self
    }

    /// Sets the diffuse texture id.
    pub fn with_texture(mut self, texture: u32) -> Self {
        self.texture = texture;
        self
    }

    /// Sets the bounding sphere.
    pub fn with_bounds(mut self, center: [f32; 3], radius: f32) -> Self {
        self.bounds_center = center;
        self.bounds_radius = radius;
        self
    }

    /// Number of triangles drawn by this mesh.
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

/// The two orderings used to batch draw calls.
///
/// Sorting by the state key groups meshes that share a pipeline; sorting by the
/// texture key groups meshes that share a texture binding. Both keys only need a
/// total order.
pub trait BatchKeys {
    /// Key grouping elements by render state.
    type StateKey: Ord;
    /// Key grouping elements by texture.
    type TextureKey: Ord;

    /// Returns the render-state key.
    fn state_key(&self) -> Self::StateKey;

    /// Returns the texture key.
    fn texture_key(&self) -> Self::TextureKey;
}

impl BatchKeys for RenderMesh {
    type StateKey = u32;
    type TextureKey = u32;

    fn state_key(&self) -> u32 {
        self.state
    }

    fn texture_key(&self) -> u32 {
        self.texture
    }
}

// Containers of borrowed descriptors sort by the referenced keys.
impl<T: BatchKeys + ?Sized> BatchKeys for &T {
    type StateKey = T::StateKey;
    type TextureKey = T::TextureKey;

    fn state_key(&self) -> Self::StateKey {
        (**self).state_key()
    }

    fn texture_key(&self) -> Self::TextureKey {
        (**self).texture_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_mesh_layout_is_packed() {
        // 6 ids/counts, a 4-float sphere and a 12-float transform, no padding.
        assert_eq!(std::mem::size_of::<RenderMesh>(), 6 * 4 + 4 * 4 + 12 * 4);
        assert_eq!(std::mem::align_of::<RenderMesh>(), 4);
    }

    #[test]
    fn test_render_mesh_builder() {
        let mesh = RenderMesh::new(3, 4, 36)
            .with_state(7)
            .with_texture(11)
            .with_bounds([1.0, 2.0, 3.0], 0.5);

        assert_eq!(mesh.vertex_buffer, 3);
        assert_eq!(mesh.index_buffer, 4);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.state_key(), 7);
        assert_eq!(mesh.texture_key(), 11);
        assert_eq!(mesh.transform, IDENTITY_TRANSFORM);
    }

    #[test]
    fn test_render_mesh_bytes_roundtrip() {
        let mesh = RenderMesh::new(1, 2, 3).with_texture(9);
        let bytes = bytemuck::bytes_of(&mesh).to_vec();
        let copy: RenderMesh = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(copy, mesh);
    }

    #[test]
    fn test_reference_keys_forward() {
        let mesh = RenderMesh::new(1, 2, 3).with_state(5).with_texture(6);
        let by_ref = &mesh;
        assert_eq!(by_ref.state_key(), 5);
        assert_eq!(by_ref.texture_key(), 6);
    }

    #[test]
    fn test_render_mesh_serde() {
        let mesh = RenderMesh::new(1, 2, 3).with_state(4);
        let json = serde_json::to_string(&mesh).unwrap();
        let back: RenderMesh = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mesh);
    }
}
