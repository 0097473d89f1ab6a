//! # Water Bodies
//!
//! Samples at or below sea level are grouped into 4-connected regions and
//! each region is classified:
//!
//! | kind  | rule |
//! |-------|------|
//! | Beach | a tiny, shallow puddle; lifted above sea level and painted as beach |
//! | Ocean | touches the tile border and covers enough of the tile |
//! | River | bed gradient is steep and the region is elongated |
//! | Lake  | mostly surrounded by land (coarse enclosure probe) |
//! | Ocean | anything else |
//!
//! Land just above sea level that lies near both water and high land then
//! gets a beach profile. Every published sample at or below sea level is
//! water, and every beach sample stays strictly above it.

use std::collections::VecDeque;

use crate::config::WaterConfig;

/// Classification of a connected water region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaterKind {
    /// Open sea.
    Ocean,
    /// Enclosed still water.
    Lake,
    /// Flowing water.
    River,
    /// Puddle absorbed into the shoreline.
    Beach,
}

/// One connected water region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaterBody {
    /// Region classification.
    pub kind: WaterKind,
    /// Number of samples in the region.
    pub cells: usize,
    /// Mean depth below sea level (meters).
    pub mean_depth: f32,
    /// Fraction of probed surroundings that is land, `[0, 1]`.
    pub enclosedness: f32,
    /// Mean bed gradient (rise over run).
    pub flow_gradient: f32,
    /// Whether the region reaches the tile border.
    pub touches_border: bool,
}

/// Result of water analysis for one tile.
#[derive(Clone, Debug, Default)]
pub struct WaterMap {
    /// Classified regions, in discovery order.
    pub bodies: Vec<WaterBody>,
    /// Per-sample water kind; `None` for land (including beach).
    pub kinds: Vec<Option<WaterKind>>,
    /// Per-sample beach flag.
    pub beach: Vec<bool>,
}

impl WaterMap {
    /// Per-sample water flag.
    #[must_use]
    pub fn mask(&self) -> Vec<bool> {
        self.kinds.iter().map(Option::is_some).collect()
    }
}

/// Water classification over a square heightmap.
pub struct WaterAnalyzer<'a> {
    config: &'a WaterConfig,
    sea_level: f64,
    high_land: f64,
    resolution: usize,
    spacing: f64,
}

/// Region scratch data gathered during the flood fill.
struct Region {
    cells: Vec<usize>,
    touches_border: bool,
    min: (usize, usize),
    max: (usize, usize),
}

impl<'a> WaterAnalyzer<'a> {
    /// Creates an analyzer for a `resolution × resolution` grid.
    #[must_use]
    pub fn new(
        config: &'a WaterConfig,
        sea_level: f64,
        high_land: f64,
        resolution: usize,
        spacing: f64,
    ) -> Self {
        Self {
            config,
            sea_level,
            high_land,
            resolution,
            spacing,
        }
    }

    /// Detects and classifies water, lifts beach puddles and applies beach
    /// profiles. `heights` is modified in place.
    pub fn analyze(&self, heights: &mut [f64]) -> WaterMap {
        let n = self.resolution * self.resolution;
        let mut map = WaterMap {
            bodies: Vec::new(),
            kinds: vec![None; n],
            beach: vec![false; n],
        };
        if heights.len() != n || self.resolution == 0 {
            return map;
        }

        for region in self.flood_fill(heights) {
            let body = self.classify(&region, heights);
            for &cell in &region.cells {
                if body.kind == WaterKind::Beach {
                    heights[cell] = self.sea_level + self.config.beach_min_height;
                    map.beach[cell] = true;
                } else {
                    map.kinds[cell] = Some(body.kind);
                }
            }
            map.bodies.push(body);
        }

        self.beach_profile(heights, &mut map);
        map
    }

    /// 4-connected regions of samples at or below sea level.
    fn flood_fill(&self, heights: &[f64]) -> Vec<Region> {
        let r = self.resolution;
        let mut visited = vec![false; r * r];
        let mut regions = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..r * r {
            if visited[start] || heights[start] > self.sea_level {
                continue;
            }

            let mut region = Region {
                cells: Vec::new(),
                touches_border: false,
                min: (usize::MAX, usize::MAX),
                max: (0, 0),
            };
            visited[start] = true;
            queue.push_back(start);

            while let Some(cell) = queue.pop_front() {
                let (i, j) = (cell % r, cell / r);
                region.cells.push(cell);
                region.touches_border |= i == 0 || j == 0 || i == r - 1 || j == r - 1;
                region.min = (region.min.0.min(i), region.min.1.min(j));
                region.max = (region.max.0.max(i), region.max.1.max(j));

                let neighbors = [
                    (i > 0).then(|| cell - 1),
                    (i + 1 < r).then(|| cell + 1),
                    (j > 0).then(|| cell - r),
                    (j + 1 < r).then(|| cell + r),
                ];
                for next in neighbors.into_iter().flatten() {
                    if !visited[next] && heights[next] <= self.sea_level {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }

            regions.push(region);
        }

        regions
    }

    fn classify(&self, region: &Region, heights: &[f64]) -> WaterBody {
        let c = self.config;
        let cells = region.cells.len();
        let depths = region.cells.iter().map(|&cell| self.sea_level - heights[cell]);
        let max_depth = depths.clone().fold(0.0f64, f64::max);
        let mean_depth = depths.sum::<f64>() / cells.max(1) as f64;
        let enclosedness = self.enclosedness(region, heights);
        let flow_gradient = self.flow_gradient(region, heights);

        let width = (region.max.0 - region.min.0 + 1) as f64;
        let depth = (region.max.1 - region.min.1 + 1) as f64;
        let span = width.max(depth);
        let elongation = span * span / cells.max(1) as f64;
        let area_fraction = cells as f64 / (self.resolution * self.resolution) as f64;

        let kind = if cells <= c.puddle_max_cells && max_depth <= c.puddle_max_depth {
            WaterKind::Beach
        } else if region.touches_border && area_fraction >= c.ocean_min_fraction {
            WaterKind::Ocean
        } else if flow_gradient > c.river_gradient && elongation >= c.river_elongation {
            WaterKind::River
        } else if enclosedness > c.enclosed_land_fraction {
            WaterKind::Lake
        } else {
            WaterKind::Ocean
        };

        WaterBody {
            kind,
            cells,
            mean_depth: mean_depth as f32,
            enclosedness: enclosedness as f32,
            flow_gradient: flow_gradient as f32,
            touches_border: region.touches_border,
        }
    }

    /// Land fraction over a coarse grid around the region's bounding box.
    ///
    /// Only probes outside the region count; probes off the tile are
    /// skipped.
    fn enclosedness(&self, region: &Region, heights: &[f64]) -> f64 {
        let r = self.resolution;
        let radius = self.config.enclosure_radius;
        let step = self.config.enclosure_step.max(1);
        let i0 = region.min.0.saturating_sub(radius);
        let j0 = region.min.1.saturating_sub(radius);
        let i1 = (region.max.0 + radius).min(r - 1);
        let j1 = (region.max.1 + radius).min(r - 1);

        let mut land = 0usize;
        let mut probed = 0usize;
        for j in (j0..=j1).step_by(step) {
            for i in (i0..=i1).step_by(step) {
                let h = heights[j * r + i];
                if h <= self.sea_level {
                    // Water probes inside or outside the region both count as open
                    probed += 1;
                    continue;
                }
                land += 1;
                probed += 1;
            }
        }

        // Water probes belonging to the region itself are not surroundings
        let inside = region
            .cells
            .iter()
            .filter(|&&cell| {
                let (i, j) = (cell % r, cell / r);
                (i - i0) % step == 0 && (j - j0) % step == 0
            })
            .count();
        let surroundings = probed.saturating_sub(inside);

        if surroundings == 0 {
            0.0
        } else {
            (land as f64 / surroundings as f64).min(1.0)
        }
    }

    /// Mean bed gradient magnitude over the region.
    fn flow_gradient(&self, region: &Region, heights: &[f64]) -> f64 {
        let r = self.resolution;
        if r < 2 || region.cells.is_empty() {
            return 0.0;
        }
        let last = r - 1;
        let total: f64 = region
            .cells
            .iter()
            .map(|&cell| {
                let (i, j) = (cell % r, cell / r);
                let (il, ir) = (i.saturating_sub(1), (i + 1).min(last));
                let (jl, jr) = (j.saturating_sub(1), (j + 1).min(last));
                let dx = (heights[j * r + ir] - heights[j * r + il]) / ((ir - il) as f64 * self.spacing);
                let dz = (heights[jr * r + i] - heights[jl * r + i]) / ((jr - jl) as f64 * self.spacing);
                let g = dx.hypot(dz);
                if g.is_finite() {
                    g
                } else {
                    0.0
                }
            })
            .sum();
        total / region.cells.len() as f64
    }

    /// Beach profile for low land near both water and high land.
    ///
    /// `t = d_water / (d_water + d_high)` runs from 0 at the waterline to 1
    /// at the high land, and the beach rises linearly across it.
    fn beach_profile(&self, heights: &mut [f64], map: &mut WaterMap) {
        let c = self.config;
        let r = self.resolution;
        let to_water = distance_field(r, c.beach_search_radius, |cell| map.kinds[cell].is_some());
        let to_high = distance_field(r, c.beach_search_radius, |cell| heights[cell] > self.high_land);

        let floor = self.sea_level + c.beach_min_height;
        let ceiling = self.sea_level + c.beach_max_height.max(c.beach_min_height);

        for cell in 0..r * r {
            let h = heights[cell];
            if map.kinds[cell].is_some() || h <= self.sea_level || h > ceiling {
                continue;
            }
            let (Some(dw), Some(dh)) = (to_water[cell], to_high[cell]) else {
                continue;
            };
            let t = f64::from(dw) / f64::from(dw + dh).max(1.0);
            heights[cell] = floor + t * (ceiling - floor);
            map.beach[cell] = true;
        }
    }
}

/// Multi-source BFS distance (8-connected, in samples) to the nearest cell
/// matching `source`, up to `radius`.
fn distance_field(
    resolution: usize,
    radius: usize,
    source: impl Fn(usize) -> bool,
) -> Vec<Option<u32>> {
    let r = resolution;
    let mut distance = vec![None; r * r];
    let mut queue = VecDeque::new();

    for cell in 0..r * r {
        if source(cell) {
            distance[cell] = Some(0u32);
            queue.push_back(cell);
        }
    }

    while let Some(cell) = queue.pop_front() {
        let Some(d) = distance[cell] else { continue };
        if d as usize >= radius {
            continue;
        }
        let (i, j) = ((cell % r) as i64, (cell / r) as i64);
        for dj in -1..=1 {
            for di in -1..=1 {
                let (ni, nj) = (i + di, j + dj);
                if (di == 0 && dj == 0) || ni < 0 || nj < 0 || ni >= r as i64 || nj >= r as i64 {
                    continue;
                }
                let next = nj as usize * r + ni as usize;
                if distance[next].is_none() {
                    distance[next] = Some(d + 1);
                    queue.push_back(next);
                }
            }
        }
    }

    distance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(heights: &mut [f64], resolution: usize) -> WaterMap {
        let config = WaterConfig::default();
        WaterAnalyzer::new(&config, 0.0, 40.0, resolution, 10.0).analyze(heights)
    }

    #[test]
    fn test_border_sea_is_ocean() {
        let res = 16;
        // West half below sea level
        let mut heights: Vec<f64> = (0..res * res)
            .map(|k| if k % res < 8 { -50.0 } else { 20.0 })
            .collect();
        let map = analyze(&mut heights, res);

        assert_eq!(map.bodies.len(), 1);
        assert_eq!(map.bodies[0].kind, WaterKind::Ocean);
        assert_eq!(map.bodies[0].cells, 128);
        assert!((map.bodies[0].mean_depth - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_enclosed_pond_is_lake() {
        let res = 16;
        let mut heights = vec![30.0; res * res];
        for j in 6..10 {
            for i in 6..10 {
                heights[j * res + i] = -5.0;
            }
        }
        let map = analyze(&mut heights, res);

        assert_eq!(map.bodies.len(), 1);
        assert_eq!(map.bodies[0].kind, WaterKind::Lake);
        assert!(!map.bodies[0].touches_border);
        assert!(map.bodies[0].enclosedness > 0.5);
    }

    #[test]
    fn test_sloped_channel_is_river() {
        let res = 32;
        let mut heights = vec![60.0; res * res];
        // A one-sample wide channel falling along X, away from the border
        for i in 2..30 {
            heights[15 * res + i] = -(i as f64) * 2.0;
        }
        let map = analyze(&mut heights, res);

        assert_eq!(map.bodies.len(), 1);
        assert_eq!(map.bodies[0].kind, WaterKind::River);
    }

    #[test]
    fn test_puddle_becomes_beach_land() {
        let res = 8;
        let mut heights = vec![3.0; res * res];
        heights[3 * res + 3] = -0.5;
        let map = analyze(&mut heights, res);

        assert_eq!(map.bodies[0].kind, WaterKind::Beach);
        assert!(heights[3 * res + 3] > 0.0);
        assert!(map.beach[3 * res + 3]);
        assert!(map.mask().iter().all(|&w| !w));
    }

    #[test]
    fn test_beach_profile_stays_above_sea_and_water_is_consistent() {
        let res = 24;
        // Ocean to the west, a low shelf, then high land to the east
        let mut heights: Vec<f64> = (0..res * res)
            .map(|k| match k % res {
                0..=5 => -30.0,
                6..=11 => 3.0,
                _ => 120.0,
            })
            .collect();
        let map = analyze(&mut heights, res);

        assert!(map.beach.iter().any(|&b| b));
        for (k, &h) in heights.iter().enumerate() {
            if map.beach[k] {
                assert!(h > 0.0);
            }
            if h <= 0.0 {
                assert!(map.kinds[k].is_some());
            }
            if h > 40.0 {
                assert!(map.kinds[k].is_none());
            }
        }
    }
}
