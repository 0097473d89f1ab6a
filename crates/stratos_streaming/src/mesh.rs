//! # Tile Meshes
//!
//! Renderer-agnostic triangle meshes built from terrain data on the
//! orchestrator thread. A tile is `Ready` once its mesh is attached.

use stratos_procedural::TerrainData;

use crate::tile::TileId;

/// Indexed triangle mesh in world space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// Vertex positions `[x, y, z]`.
    pub positions: Vec<[f32; 3]>,
    /// Unit vertex normals.
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates.
    pub uvs: Vec<[f32; 2]>,
    /// Material id per vertex (biome id).
    pub materials: Vec<u8>,
    /// Triangle list, counter-clockwise seen from above.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Approximate heap footprint in bytes.
    #[must_use]
    pub fn memory_bytes(&self) -> usize {
        self.positions.len() * 12
            + self.normals.len() * 12
            + self.uvs.len() * 8
            + self.materials.len()
            + self.indices.len() * 4
    }
}

/// Turns terrain data into a mesh.
///
/// Runs on the orchestrator thread right after data arrives, so
/// implementations should stay cheap.
pub trait MeshBuilder: Send {
    /// Builds the mesh for `tile`.
    fn build(&mut self, tile: TileId, data: &TerrainData) -> MeshData;
}

/// Regular grid mesh with optional edge skirts that hide LOD cracks.
#[derive(Clone, Copy, Debug, Default)]
pub struct GridMeshBuilder {
    /// Depth of the skirt hanging below each border vertex (meters).
    /// Zero disables skirts.
    pub skirt_depth: f32,
}

impl GridMeshBuilder {
    /// Builder without skirts.
    #[must_use]
    pub const fn new() -> Self {
        Self { skirt_depth: 0.0 }
    }

    /// Builder with skirts of `depth` meters.
    #[must_use]
    pub const fn with_skirts(depth: f32) -> Self {
        Self { skirt_depth: depth }
    }

    fn push_skirts(&self, data: &TerrainData, mesh: &mut MeshData) {
        let res = data.resolution;
        let last = res - 1;

        // Walk the border counter-clockwise: south, east, north, west
        let mut ring = Vec::with_capacity(4 * last);
        ring.extend((0..last).map(|i| data.index(i, 0)));
        ring.extend((0..last).map(|j| data.index(last, j)));
        ring.extend((1..=last).rev().map(|i| data.index(i, last)));
        ring.extend((1..=last).rev().map(|j| data.index(0, j)));

        let first_skirt = mesh.positions.len() as u32;
        for &k in &ring {
            let [x, y, z] = mesh.positions[k];
            mesh.positions.push([x, y - self.skirt_depth, z]);
            mesh.normals.push(mesh.normals[k]);
            mesh.uvs.push(mesh.uvs[k]);
            mesh.materials.push(mesh.materials[k]);
        }

        let count = ring.len() as u32;
        for (n, &k) in ring.iter().enumerate() {
            let n = n as u32;
            let top_a = k as u32;
            let top_b = ring[(n as usize + 1) % ring.len()] as u32;
            let low_a = first_skirt + n;
            let low_b = first_skirt + (n + 1) % count;
            mesh.indices.extend_from_slice(&[top_a, low_a, top_b, top_b, low_a, low_b]);
        }
    }
}

impl MeshBuilder for GridMeshBuilder {
    fn build(&mut self, _tile: TileId, data: &TerrainData) -> MeshData {
        let res = data.resolution;
        if res < 2 || !data.is_consistent() {
            return MeshData::default();
        }
        let spacing = data.spacing();

        let mut mesh = MeshData {
            positions: Vec::with_capacity(res * res),
            normals: data.normals.clone(),
            uvs: data.uvs.clone(),
            materials: data.materials.iter().map(|b| b.id()).collect(),
            indices: Vec::with_capacity((res - 1) * (res - 1) * 6),
        };

        for j in 0..res {
            for i in 0..res {
                mesh.positions.push([
                    (data.origin_x + i as f64 * spacing) as f32,
                    data.height(i, j),
                    (data.origin_z + j as f64 * spacing) as f32,
                ]);
            }
        }

        for j in 0..res - 1 {
            for i in 0..res - 1 {
                let a = data.index(i, j) as u32;
                let b = data.index(i + 1, j) as u32;
                let c = data.index(i, j + 1) as u32;
                let d = data.index(i + 1, j + 1) as u32;
                mesh.indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }

        if self.skirt_depth > 0.0 {
            self.push_skirts(data, &mut mesh);
        }
        mesh
    }
}
