//! # LOD Quadtree
//!
//! A square window of level-0 roots follows the camera. Each frame the tree
//! splits leaves that [`TerrainTile::should_subdivide`] and collapses
//! subtrees the camera has left behind; the resulting leaves are the tiles
//! the streamer should load.
//!
//! Nodes refine only once they hold data, so detail grows outward as the
//! pipeline delivers tiles.

use std::collections::BTreeMap;

use crate::config::StreamingConfig;
use crate::streamer::TerrainStreamer;
use crate::tile::{TerrainTile, TileId, TileLayout};

/// Subtrees collapse beyond `subdivide_distance × COLLAPSE_HYSTERESIS` so a
/// camera sitting on the boundary does not flicker between levels.
const COLLAPSE_HYSTERESIS: f64 = 1.25;

/// Camera-following tile quadtree.
#[derive(Debug)]
pub struct TerrainQuadtree {
    layout: TileLayout,
    error_threshold: f64,
    root_window: i32,
    roots: BTreeMap<(i32, i32), TerrainTile>,
}

impl TerrainQuadtree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new(config: &StreamingConfig) -> Self {
        Self {
            layout: config.layout(),
            error_threshold: config.error_threshold,
            root_window: config.root_window,
            roots: BTreeMap::new(),
        }
    }

    /// Tile geometry.
    #[must_use]
    pub const fn layout(&self) -> TileLayout {
        self.layout
    }

    /// Moves the root window and refines the tree for `camera`.
    ///
    /// Returns the leaf set, coarse to fine. A non-finite camera leaves the
    /// tree untouched.
    pub fn update(&mut self, camera: [f64; 3]) -> Vec<TileId> {
        if !camera.iter().all(|c| c.is_finite()) {
            tracing::warn!("Quadtree update skipped: non-finite camera {:?}", camera);
            return self.leaves();
        }

        // The window stays inside the addressable range, pinned to its edge
        // when the camera flies past it
        let limit = self.layout.root_limit();
        let window = self.root_window.clamp(0, limit);
        let span = limit - window;
        let center = self.layout.tile_at(camera[0], camera[2], 0);
        let (center_x, center_z) = (center.x.clamp(-span, span), center.z.clamp(-span, span));
        let reach = window.unsigned_abs();
        let in_window = |&(x, z): &(i32, i32)| {
            x.abs_diff(center_x) <= reach && z.abs_diff(center_z) <= reach
        };

        let stale: Vec<(i32, i32)> = self.roots.keys().copied().filter(|k| !in_window(k)).collect();
        for key in stale {
            if let Some(mut root) = self.roots.remove(&key) {
                root.dispose();
            }
        }
        for z in center_z - window..=center_z + window {
            for x in center_x - window..=center_x + window {
                let layout = self.layout;
                self.roots
                    .entry((x, z))
                    .or_insert_with(|| TerrainTile::new(TileId::new(0, x, z), layout));
            }
        }

        for root in self.roots.values_mut() {
            refine(root, camera, self.error_threshold, &self.layout);
        }

        let mut leaves = self.leaves();
        leaves.sort();
        leaves
    }

    /// Current leaves.
    #[must_use]
    pub fn leaves(&self) -> Vec<TileId> {
        let mut nodes = Vec::new();
        for root in self.roots.values() {
            root.collect_leaves(&mut nodes);
        }
        nodes.into_iter().map(TerrainTile::id).collect()
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: TileId) -> Option<&TerrainTile> {
        self.root_of(id).and_then(|root| root.find(id))
    }

    /// Looks up a node, mutably.
    pub fn node_mut(&mut self, id: TileId) -> Option<&mut TerrainTile> {
        let key = root_key(id);
        self.roots.get_mut(&key)?.find_mut(id)
    }

    fn root_of(&self, id: TileId) -> Option<&TerrainTile> {
        self.roots.get(&root_key(id))
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        fn count(node: &TerrainTile) -> usize {
            1 + node.children().map_or(0, |c| c.iter().map(count).sum())
        }
        self.roots.values().map(count).sum()
    }

    /// Copies data and meshes the streamer holds onto nodes lacking them.
    ///
    /// Returns the number of nodes updated.
    pub fn attach(&mut self, streamer: &TerrainStreamer) -> usize {
        fn walk(node: &mut TerrainTile, streamer: &TerrainStreamer) -> usize {
            let mut attached = 0;
            if node.data().is_none() {
                if let Some(source) = streamer.tile(node.id()).filter(|t| t.is_ready_for_render()) {
                    if let (Some(data), Some(mesh)) = (source.data(), source.mesh()) {
                        let (data, mesh) = (data.clone(), mesh.clone());
                        node.set_terrain_data(data);
                        node.set_mesh(mesh);
                        attached += 1;
                    }
                }
            }
            if let Some(children) = node.children_mut() {
                attached += children.iter_mut().map(|c| walk(c, streamer)).sum::<usize>();
            }
            attached
        }
        self.roots.values_mut().map(|root| walk(root, streamer)).sum()
    }

    /// Leaves holding a mesh, for rendering.
    #[must_use]
    pub fn renderable(&self) -> Vec<&TerrainTile> {
        let mut nodes = Vec::new();
        for root in self.roots.values() {
            root.collect_leaves(&mut nodes);
        }
        nodes.retain(|n| n.is_ready_for_render());
        nodes
    }
}

/// Address of the level-0 ancestor of `id`.
fn root_key(id: TileId) -> (i32, i32) {
    let shift = u32::from(id.level).min(31);
    (id.x >> shift, id.z >> shift)
}

fn refine(node: &mut TerrainTile, camera: [f64; 3], threshold: f64, layout: &TileLayout) {
    if node.is_leaf() {
        if node.should_subdivide(camera, threshold) {
            tracing::trace!("Subdividing {}", node.id());
            if let Some(children) = node.subdivide() {
                for child in children.iter_mut() {
                    refine(child, camera, threshold, layout);
                }
            }
        }
        return;
    }

    let limit = layout.subdivide_distance(node.level()) * COLLAPSE_HYSTERESIS;
    if node.distance_to(camera) > limit {
        tracing::trace!("Collapsing {}", node.id());
        node.collapse();
    } else if let Some(children) = node.children_mut() {
        for child in children.iter_mut() {
            refine(child, camera, threshold, layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stratos_procedural::{Biome, TerrainData};

    fn config() -> StreamingConfig {
        StreamingConfig {
            base_tile_size: 1000.0,
            max_lod_level: 3,
            root_window: 1,
            error_threshold: 10.0,
            ..StreamingConfig::default()
        }
    }

    fn rough(node: &TerrainTile) -> Arc<TerrainData> {
        let b = node.bounds();
        Arc::new(TerrainData {
            resolution: 2,
            tile_size: b.max_x - b.min_x,
            origin_x: b.min_x,
            origin_z: b.min_z,
            heightmap: vec![0.0, 300.0, 600.0, 900.0],
            normals: vec![[0.0, 1.0, 0.0]; 4],
            slopes: vec![0.0; 4],
            materials: vec![Biome::Mountain; 4],
            water_mask: vec![false; 4],
            uvs: vec![[0.0, 0.0]; 4],
            water_bodies: Vec::new(),
        })
    }

    #[test]
    fn test_root_window_follows_camera() {
        let mut tree = TerrainQuadtree::new(&config());
        let leaves = tree.update([500.0, 100.0, 500.0]);
        assert_eq!(leaves.len(), 9);
        assert!(leaves.contains(&TileId::new(0, -1, -1)));
        assert!(leaves.contains(&TileId::new(0, 1, 1)));

        let leaves = tree.update([5500.0, 100.0, 500.0]);
        assert_eq!(leaves.len(), 9);
        assert!(leaves.contains(&TileId::new(0, 6, 1)));
        assert!(!leaves.contains(&TileId::new(0, 0, 0)));
    }

    #[test]
    fn test_refines_only_with_data() {
        let mut tree = TerrainQuadtree::new(&config());
        let camera = [500.0, 100.0, 500.0];
        tree.update(camera);
        assert_eq!(tree.node_count(), 9);

        let root = TileId::new(0, 0, 0);
        let node = tree.node_mut(root).unwrap();
        let data = rough(node);
        node.set_terrain_data(data);

        let leaves = tree.update(camera);
        assert_eq!(leaves.len(), 12);
        assert_eq!(tree.node_count(), 13);
        for child in root.children() {
            assert!(leaves.contains(&child));
            assert_eq!(tree.node(child).unwrap().parent(), Some(root));
        }
    }

    #[test]
    fn test_leaves_tile_root_area() {
        let mut tree = TerrainQuadtree::new(&config());
        let camera = [100.0, 50.0, 100.0];
        tree.update(camera);
        let root = TileId::new(0, 0, 0);
        let node = tree.node_mut(root).unwrap();
        let data = rough(node);
        node.set_terrain_data(data);
        tree.update(camera);
        let sw = TileId::new(1, 0, 0);
        let node = tree.node_mut(sw).unwrap();
        let data = rough(node);
        node.set_terrain_data(data);
        tree.update(camera);

        let area: f64 = tree
            .leaves()
            .into_iter()
            .filter(|id| root_key(*id) == (0, 0))
            .map(|id| tree.node(id).unwrap().bounds().area())
            .sum();
        assert!((area - 1_000_000.0).abs() < 1e-6);
        assert_eq!(tree.leaves().len(), 8 + 7);
    }

    #[test]
    fn test_collapses_when_camera_leaves() {
        let mut tree = TerrainQuadtree::new(&config());
        let near = [500.0, 100.0, 500.0];
        tree.update(near);
        let root = TileId::new(0, 0, 0);
        let node = tree.node_mut(root).unwrap();
        let data = rough(node);
        node.set_terrain_data(data);
        tree.update(near);
        assert_eq!(tree.node_count(), 13);

        // Same root window, but high above the collapse distance
        let far = [500.0, 900.0 + 1000.0 * 2.5 * COLLAPSE_HYSTERESIS + 100.0, 500.0];
        tree.update(far);
        assert!(tree.node(root).unwrap().is_leaf());
        assert_eq!(tree.node_count(), 9);

        tree.update(far);
        assert_eq!(tree.node_count(), 9, "No re-split while far away");
    }

    #[test]
    fn test_window_pinned_to_addressable_range() {
        let mut tree = TerrainQuadtree::new(&config());
        let limit = tree.layout().root_limit();

        let leaves = tree.update([1.0e14, 1000.0, 0.0]);
        assert_eq!(leaves.len(), 9);
        assert!(leaves.contains(&TileId::new(0, limit, 0)));
        assert!(leaves.iter().all(|id| id.x <= limit));

        let leaves = tree.update([-1.0e14, 1000.0, -1.0e14]);
        assert_eq!(leaves.len(), 9);
        assert!(leaves.contains(&TileId::new(0, -limit, -limit)));
        assert_eq!(tree.node_count(), 9);

        // Edge roots still split into distinct children
        let root = TileId::new(0, -limit, -limit);
        let node = tree.node_mut(root).unwrap();
        let data = rough(node);
        node.set_terrain_data(data);
        let camera = {
            let (x, z) = tree.node(root).unwrap().bounds().center();
            [x, 100.0, z]
        };
        let leaves = tree.update(camera);
        assert_eq!(leaves.len(), 12);
        for child in root.children() {
            assert!(leaves.contains(&child));
        }
    }

    #[test]
    fn test_non_finite_camera_ignored() {
        let mut tree = TerrainQuadtree::new(&config());
        tree.update([0.0, 0.0, 0.0]);
        let before = tree.leaves();
        assert_eq!(tree.update([f64::NAN, 0.0, 0.0]), before);
    }
}
