//! # Terrain Tiles
//!
//! A tile is a quadtree node: one square of terrain at one level of detail.
//! Level 0 tiles have the configured base size; each level halves it.
//!
//! ## Child Layout
//!
//! ```text
//!        +Z
//!   +---------+---------+
//!   |   NW    |   NE    |
//!   | (2x,2z+1)|(2x+1,2z+1)
//!   +---------+---------+
//!   |   SW    |   SE    |
//!   | (2x,2z) |(2x+1,2z)|
//!   +---------+---------+ +X
//! ```

use std::fmt;
use std::sync::Arc;

use stratos_procedural::TerrainData;

use crate::mesh::MeshData;

/// Quadtree address of a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    /// Quadtree level (0 = coarsest).
    pub level: u8,
    /// Tile X at this level.
    pub x: i32,
    /// Tile Z at this level.
    pub z: i32,
}

impl TileId {
    /// Creates a tile id.
    #[inline]
    #[must_use]
    pub const fn new(level: u8, x: i32, z: i32) -> Self {
        Self { level, x, z }
    }

    /// Unique string key, `L{level}_X{x}_Z{z}`.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Children in SW, SE, NW, NE order. Coordinates saturate at the edge
    /// of the `i32` range; see [`TileLayout::root_limit`].
    #[must_use]
    pub const fn children(&self) -> [Self; 4] {
        let level = self.level.saturating_add(1);
        let (x, z) = (self.x.saturating_mul(2), self.z.saturating_mul(2));
        let (x1, z1) = (x.saturating_add(1), z.saturating_add(1));
        [
            Self::new(level, x, z),
            Self::new(level, x1, z),
            Self::new(level, x, z1),
            Self::new(level, x1, z1),
        ]
    }

    /// Parent, or `None` at level 0.
    #[must_use]
    pub const fn parent(&self) -> Option<Self> {
        if self.level == 0 {
            None
        } else {
            Some(Self::new(self.level - 1, self.x.div_euclid(2), self.z.div_euclid(2)))
        }
    }

    /// Same-level neighbor in `direction`.
    #[must_use]
    pub const fn neighbor(&self, direction: Direction) -> Self {
        let (dx, dz) = direction.offset();
        Self::new(self.level, self.x.saturating_add(dx), self.z.saturating_add(dz))
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}_X{}_Z{}", self.level, self.x, self.z)
    }
}

/// Cardinal directions for neighbor links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// +Z
    North,
    /// +X
    East,
    /// -Z
    South,
    /// -X
    West,
}

impl Direction {
    /// All four, in link-array order.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::East => (1, 0),
            Self::South => (0, -1),
            Self::West => (-1, 0),
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }
}

/// Tile geometry shared by every node of a quadtree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileLayout {
    /// Edge length of a level-0 tile (meters).
    pub base_tile_size: f64,
    /// Deepest level.
    pub max_level: u8,
    /// Subdivision distance as a multiple of tile size.
    pub subdivide_distance_factor: f64,
}

impl TileLayout {
    /// Edge length at `level`.
    #[inline]
    #[must_use]
    pub fn tile_size(&self, level: u8) -> f64 {
        self.base_tile_size / f64::from(1u32 << level.min(31))
    }

    /// World bounds of `tile`.
    #[must_use]
    pub fn bounds(&self, tile: TileId) -> TileBounds {
        let size = self.tile_size(tile.level);
        let min_x = f64::from(tile.x) * size;
        let min_z = f64::from(tile.z) * size;
        TileBounds {
            min_x,
            min_z,
            max_x: min_x + size,
            max_z: min_z + size,
        }
    }

    /// The tile at `level` containing a world position.
    #[must_use]
    pub fn tile_at(&self, world_x: f64, world_z: f64, level: u8) -> TileId {
        let size = self.tile_size(level);
        let clamp = |v: f64| (v / size).floor().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
        TileId::new(level, clamp(world_x), clamp(world_z))
    }

    /// Largest level-0 coordinate (in either direction) whose descendants
    /// down to `max_level` still have distinct `i32` addresses.
    #[must_use]
    pub const fn root_limit(&self) -> i32 {
        let shift = if self.max_level > 30 { 30 } else { self.max_level };
        i32::MAX >> shift
    }

    /// Camera distance within which a tile at `level` may subdivide.
    #[must_use]
    pub fn subdivide_distance(&self, level: u8) -> f64 {
        self.tile_size(level) * self.subdivide_distance_factor
    }
}

impl Default for TileLayout {
    fn default() -> Self {
        Self {
            base_tile_size: 8192.0,
            max_level: 6,
            subdivide_distance_factor: 2.5,
        }
    }
}

/// Axis-aligned world bounds of a tile (meters).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileBounds {
    /// West edge.
    pub min_x: f64,
    /// South edge.
    pub min_z: f64,
    /// East edge.
    pub max_x: f64,
    /// North edge.
    pub max_z: f64,
}

impl TileBounds {
    /// Center point.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (0.5 * (self.min_x + self.max_x), 0.5 * (self.min_z + self.max_z))
    }

    /// Whether a point lies inside, edges included.
    #[must_use]
    pub fn contains(&self, x: f64, z: f64) -> bool {
        x >= self.min_x && x <= self.max_x && z >= self.min_z && z <= self.max_z
    }

    /// Horizontal distance from a point to the nearest edge, 0 inside.
    #[must_use]
    pub fn distance_xz(&self, x: f64, z: f64) -> f64 {
        let dx = (self.min_x - x).max(0.0).max(x - self.max_x);
        let dz = (self.min_z - z).max(0.0).max(z - self.max_z);
        dx.hypot(dz)
    }

    /// Area in square meters.
    #[must_use]
    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_z - self.min_z)
    }
}

/// Lifecycle of a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileState {
    /// Nothing requested.
    #[default]
    Unloaded,
    /// Requested, waiting in the queue or for a retry.
    Loading,
    /// Dispatched to a worker.
    Generating,
    /// Terrain data attached.
    Loaded,
    /// Terrain data and mesh attached.
    Ready,
    /// Failed permanently.
    Error,
}

/// A quadtree node.
#[derive(Debug)]
pub struct TerrainTile {
    id: TileId,
    layout: TileLayout,
    bounds: TileBounds,
    state: TileState,
    data: Option<Arc<TerrainData>>,
    mesh: Option<Arc<MeshData>>,
    children: Option<Box<[TerrainTile; 4]>>,
    parent: Option<TileId>,
    neighbors: [Option<TileId>; 4],
    min_elevation: f32,
    max_elevation: f32,
    avg_elevation: f32,
    roughness: f32,
}

impl TerrainTile {
    /// Creates an unloaded tile with same-level neighbor links.
    #[must_use]
    pub fn new(id: TileId, layout: TileLayout) -> Self {
        Self {
            id,
            layout,
            bounds: layout.bounds(id),
            state: TileState::Unloaded,
            data: None,
            mesh: None,
            children: None,
            parent: id.parent(),
            neighbors: Direction::ALL.map(|d| Some(id.neighbor(d))),
            min_elevation: 0.0,
            max_elevation: 0.0,
            avg_elevation: 0.0,
            roughness: 0.0,
        }
    }

    /// Quadtree address.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> TileId {
        self.id
    }

    /// Quadtree level.
    #[inline]
    #[must_use]
    pub const fn level(&self) -> u8 {
        self.id.level
    }

    /// World bounds.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> &TileBounds {
        &self.bounds
    }

    /// Edge length (meters).
    #[must_use]
    pub fn size(&self) -> f64 {
        self.layout.tile_size(self.id.level)
    }

    /// Lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> TileState {
        self.state
    }

    /// Sets the lifecycle state.
    pub fn set_state(&mut self, state: TileState) {
        self.state = state;
    }

    /// Terrain data, if loaded.
    #[must_use]
    pub fn data(&self) -> Option<&Arc<TerrainData>> {
        self.data.as_ref()
    }

    /// Mesh, if built.
    #[must_use]
    pub fn mesh(&self) -> Option<&Arc<MeshData>> {
        self.mesh.as_ref()
    }

    /// Parent address.
    #[must_use]
    pub const fn parent(&self) -> Option<TileId> {
        self.parent
    }

    /// Neighbor link in `direction`.
    #[must_use]
    pub const fn neighbor(&self, direction: Direction) -> Option<TileId> {
        self.neighbors[direction.index()]
    }

    /// Replaces a neighbor link.
    pub fn set_neighbor(&mut self, direction: Direction, neighbor: Option<TileId>) {
        self.neighbors[direction.index()] = neighbor;
    }

    /// Children, if subdivided.
    #[must_use]
    pub fn children(&self) -> Option<&[TerrainTile; 4]> {
        self.children.as_deref()
    }

    /// Children, mutably.
    pub fn children_mut(&mut self) -> Option<&mut [TerrainTile; 4]> {
        self.children.as_deref_mut()
    }

    /// Whether the tile has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Lowest sample of the attached data.
    #[must_use]
    pub const fn min_elevation(&self) -> f32 {
        self.min_elevation
    }

    /// Highest sample of the attached data.
    #[must_use]
    pub const fn max_elevation(&self) -> f32 {
        self.max_elevation
    }

    /// Mean sample of the attached data.
    #[must_use]
    pub const fn avg_elevation(&self) -> f32 {
        self.avg_elevation
    }

    /// Population standard deviation of the attached data.
    #[must_use]
    pub const fn roughness(&self) -> f32 {
        self.roughness
    }

    /// Distance from a camera `[x, y, z]` to the tile's bounding box,
    /// using the tile's elevation range for the vertical extent.
    #[must_use]
    pub fn distance_to(&self, camera: [f64; 3]) -> f64 {
        let horizontal = self.bounds.distance_xz(camera[0], camera[2]);
        let low = f64::from(self.min_elevation);
        let high = f64::from(self.max_elevation);
        let vertical = (low - camera[1]).max(0.0).max(camera[1] - high);
        horizontal.hypot(vertical)
    }

    /// Screen-independent geometric error:
    /// `(elevation_range + roughness) / max(1, distance / 1000)`.
    #[must_use]
    pub fn error_metric(&self, camera: [f64; 3]) -> f64 {
        let range = f64::from(self.max_elevation - self.min_elevation);
        let detail = range + f64::from(self.roughness);
        detail / (self.distance_to(camera) / 1000.0).max(1.0)
    }

    /// Whether this leaf should split for a camera.
    ///
    /// True only for a leaf above the maximum level, within the level's
    /// subdivision distance, whose error exceeds `error_threshold`.
    #[must_use]
    pub fn should_subdivide(&self, camera: [f64; 3], error_threshold: f64) -> bool {
        if !camera.iter().all(|c| c.is_finite()) {
            return false;
        }
        self.is_leaf()
            && self.id.level < self.layout.max_level
            && self.distance_to(camera) < self.layout.subdivide_distance(self.id.level)
            && self.error_metric(camera) > error_threshold
    }

    /// Splits into four children, or returns the existing ones.
    ///
    /// Returns `None` at the maximum level.
    pub fn subdivide(&mut self) -> Option<&mut [TerrainTile; 4]> {
        if self.id.level >= self.layout.max_level {
            return None;
        }
        if self.children.is_none() {
            let layout = self.layout;
            let [sw, se, nw, ne] = self.id.children().map(|id| TerrainTile::new(id, layout));
            self.children = Some(Box::new([sw, se, nw, ne]));
        }
        self.children.as_deref_mut()
    }

    /// Disposes and drops the children.
    pub fn collapse(&mut self) {
        if let Some(mut children) = self.children.take() {
            for child in children.iter_mut() {
                child.dispose();
            }
        }
    }

    /// Attaches terrain data and refreshes the elevation statistics.
    ///
    /// Any previous mesh belongs to the old data and is dropped.
    pub fn set_terrain_data(&mut self, data: Arc<TerrainData>) {
        let stats = data.stats();
        self.min_elevation = stats.min_elevation;
        self.max_elevation = stats.max_elevation;
        self.avg_elevation = stats.mean_elevation;
        self.roughness = stats.roughness;
        self.data = Some(data);
        self.mesh = None;
        self.state = TileState::Loaded;
    }

    /// Attaches a mesh; the tile becomes `Ready` if it has data.
    pub fn set_mesh(&mut self, mesh: Arc<MeshData>) {
        self.mesh = Some(mesh);
        if self.data.is_some() {
            self.state = TileState::Ready;
        }
    }

    /// Whether data and mesh are present and the state is `Ready`.
    #[must_use]
    pub fn is_ready_for_render(&self) -> bool {
        self.state == TileState::Ready && self.data.is_some() && self.mesh.is_some()
    }

    /// Bilinear elevation at a world position inside the bounds.
    #[must_use]
    pub fn height_at(&self, world_x: f64, world_z: f64) -> Option<f32> {
        if !self.bounds.contains(world_x, world_z) {
            return None;
        }
        self.data.as_ref()?.height_at_world(world_x, world_z)
    }

    /// Releases data, mesh and children. Neighbor links are left alone.
    pub fn dispose(&mut self) {
        self.collapse();
        self.data = None;
        self.mesh = None;
        self.state = TileState::Unloaded;
    }

    /// Finds a descendant (or self) by id.
    #[must_use]
    pub fn find(&self, id: TileId) -> Option<&TerrainTile> {
        if self.id == id {
            return Some(self);
        }
        if id.level <= self.id.level || !self.covers(id) {
            return None;
        }
        self.children()?.iter().find_map(|child| child.find(id))
    }

    /// Finds a descendant (or self) by id, mutably.
    pub fn find_mut(&mut self, id: TileId) -> Option<&mut TerrainTile> {
        if self.id == id {
            return Some(self);
        }
        if id.level <= self.id.level || !self.covers(id) {
            return None;
        }
        self.children_mut()?.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Whether `id` is a descendant address of this tile.
    fn covers(&self, id: TileId) -> bool {
        let shift = u32::from(id.level - self.id.level);
        if shift >= 31 {
            return false;
        }
        id.x >> shift == self.id.x && id.z >> shift == self.id.z
    }

    /// Appends every leaf under (and including) this tile.
    pub fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a TerrainTile>) {
        match self.children() {
            Some(children) => children.iter().for_each(|child| child.collect_leaves(out)),
            None => out.push(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> TileLayout {
        TileLayout {
            base_tile_size: 1000.0,
            max_level: 3,
            subdivide_distance_factor: 2.5,
        }
    }

    fn rough_data(bounds: &TileBounds) -> Arc<TerrainData> {
        let res = 3;
        let n = res * res;
        Arc::new(TerrainData {
            resolution: res,
            tile_size: bounds.max_x - bounds.min_x,
            origin_x: bounds.min_x,
            origin_z: bounds.min_z,
            heightmap: vec![0.0, 100.0, 0.0, 200.0, 0.0, 300.0, 0.0, 400.0, 0.0],
            normals: vec![[0.0, 1.0, 0.0]; n],
            slopes: vec![0.0; n],
            materials: vec![stratos_procedural::Biome::Grassland; n],
            water_mask: vec![false; n],
            uvs: vec![[0.0, 0.0]; n],
            water_bodies: Vec::new(),
        })
    }

    #[test]
    fn test_key_format() {
        assert_eq!(TileId::new(3, -4, 17).key(), "L3_X-4_Z17");
    }

    #[test]
    fn test_parent_of_negative_children() {
        for child in TileId::new(1, -1, -3).children() {
            assert_eq!(child.parent(), Some(TileId::new(1, -1, -3)));
        }
        assert_eq!(TileId::new(0, 5, 5).parent(), None);
    }

    #[test]
    fn test_addresses_at_range_edge() {
        let edge = TileId::new(0, i32::MAX, i32::MIN);
        let [sw, _, _, ne] = edge.children();
        assert_eq!((sw.x, sw.z), (i32::MAX, i32::MIN));
        assert_eq!((ne.x, ne.z), (i32::MAX, i32::MIN + 1));
        assert_eq!(edge.neighbor(Direction::East), edge);
        assert_eq!(edge.neighbor(Direction::South), edge);

        let layout = TileLayout {
            max_level: 3,
            ..TileLayout::default()
        };
        let limit = layout.root_limit();
        let mut id = TileId::new(0, limit, -limit);
        for _ in 0..3 {
            id = id.children()[1];
        }
        assert_eq!(id.x, (limit << 3) + 7);
        assert_eq!(id.z, -limit << 3);
        assert_eq!(TileLayout::default().root_limit(), i32::MAX >> 6);
    }

    #[test]
    fn test_subdivision_tiles_parent_exactly() {
        let mut tile = TerrainTile::new(TileId::new(1, 3, -2), layout());
        let parent = *tile.bounds();

        let children = tile.subdivide().unwrap();
        let ids: Vec<TileId> = children.iter().map(TerrainTile::id).collect();
        assert_eq!(
            ids,
            vec![
                TileId::new(2, 6, -4),
                TileId::new(2, 7, -4),
                TileId::new(2, 6, -3),
                TileId::new(2, 7, -3),
            ]
        );

        let total: f64 = children.iter().map(|c| c.bounds().area()).sum();
        assert!((total - parent.area()).abs() < 1e-9);
        for child in children.iter() {
            let b = child.bounds();
            assert!(b.min_x >= parent.min_x && b.max_x <= parent.max_x);
            assert!(b.min_z >= parent.min_z && b.max_z <= parent.max_z);
            assert_eq!(child.level(), 2);
            assert_eq!(child.parent(), Some(tile_id(1, 3, -2)));
        }
        // No overlap: SW/SE share only an edge
        assert_eq!(children[0].bounds().max_x, children[1].bounds().min_x);
        assert_eq!(children[0].bounds().max_z, children[2].bounds().min_z);
    }

    fn tile_id(level: u8, x: i32, z: i32) -> TileId {
        TileId::new(level, x, z)
    }

    #[test]
    fn test_subdivide_idempotent_and_capped() {
        let mut tile = TerrainTile::new(TileId::new(2, 0, 0), layout());
        let first: Vec<TileId> = tile.subdivide().unwrap().iter().map(TerrainTile::id).collect();
        tile.children_mut().unwrap()[0].set_state(TileState::Loading);
        let second = tile.subdivide().unwrap();
        assert_eq!(second[0].state(), TileState::Loading);
        assert_eq!(first, second.iter().map(TerrainTile::id).collect::<Vec<_>>());

        let mut deepest = TerrainTile::new(TileId::new(3, 0, 0), layout());
        assert!(deepest.subdivide().is_none());
        assert!(deepest.is_leaf());
    }

    #[test]
    fn test_collapse_then_subdivide_restores_children() {
        let mut tile = TerrainTile::new(TileId::new(0, 0, 0), layout());
        tile.subdivide();
        tile.collapse();
        assert!(tile.is_leaf());
        let children = tile.subdivide().unwrap();
        assert_eq!(children.len(), 4);
        assert!(children.iter().all(|c| c.state() == TileState::Unloaded));
    }

    #[test]
    fn test_set_terrain_data_statistics() {
        let mut tile = TerrainTile::new(TileId::new(0, 0, 0), layout());
        tile.set_terrain_data(rough_data(tile.bounds()));

        assert_eq!(tile.state(), TileState::Loaded);
        assert_eq!(tile.min_elevation(), 0.0);
        assert_eq!(tile.max_elevation(), 400.0);
        assert!((tile.avg_elevation() - 1000.0 / 9.0).abs() < 1e-3);
        assert!(tile.roughness() > 0.0);
        assert!(!tile.is_ready_for_render());

        tile.set_mesh(Arc::new(MeshData::default()));
        assert!(tile.is_ready_for_render());
    }

    #[test]
    fn test_should_subdivide_rules() {
        let mut tile = TerrainTile::new(TileId::new(0, 0, 0), layout());
        let near = [500.0, 50.0, 500.0];
        let far = [50_000.0, 50.0, 50_000.0];

        // Flat until data arrives
        assert!(!tile.should_subdivide(near, 10.0));

        tile.set_terrain_data(rough_data(tile.bounds()));
        assert!(tile.should_subdivide(near, 10.0));
        assert!(!tile.should_subdivide(far, 10.0));
        assert!(!tile.should_subdivide(near, 10_000.0));
        assert!(!tile.should_subdivide([f64::NAN, 0.0, 0.0], 10.0));

        tile.subdivide();
        assert!(!tile.should_subdivide(near, 10.0), "Only leaves subdivide");
    }

    #[test]
    fn test_error_metric_falls_with_distance() {
        let mut tile = TerrainTile::new(TileId::new(0, 0, 0), layout());
        tile.set_terrain_data(rough_data(tile.bounds()));
        let near = tile.error_metric([500.0, 500.0, 500.0]);
        let far = tile.error_metric([20_000.0, 500.0, 500.0]);
        assert!(near > far);
    }

    #[test]
    fn test_dispose_keeps_neighbor_links() {
        let mut tile = TerrainTile::new(TileId::new(1, 0, 0), layout());
        tile.set_neighbor(Direction::East, None);
        tile.set_terrain_data(rough_data(tile.bounds()));
        tile.subdivide();

        tile.dispose();

        assert!(tile.data().is_none());
        assert!(tile.is_leaf());
        assert_eq!(tile.state(), TileState::Unloaded);
        assert_eq!(tile.neighbor(Direction::East), None);
        assert_eq!(tile.neighbor(Direction::North), Some(TileId::new(1, 0, 1)));
    }

    #[test]
    fn test_height_at_and_find() {
        let mut tile = TerrainTile::new(TileId::new(0, 0, 0), layout());
        tile.set_terrain_data(rough_data(tile.bounds()));
        assert_eq!(tile.height_at(0.0, 0.0), Some(0.0));
        assert_eq!(tile.height_at(500.0, 0.0), Some(100.0));
        assert_eq!(tile.height_at(-1.0, 0.0), None);

        tile.subdivide().unwrap()[3].subdivide();
        assert!(tile.find(TileId::new(2, 3, 3)).is_some());
        assert!(tile.find(TileId::new(2, 0, 3)).is_none());
        let mut leaves = Vec::new();
        tile.collect_leaves(&mut leaves);
        assert_eq!(leaves.len(), 7);
    }
}
