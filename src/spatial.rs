//! Grid cells, buildable terrain bounds and the river used for riparian
//! classification. The indicator core only ever sees the resulting flags.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tuning::Grid;

/// Integer grid position on the ground plane. World coordinates are
/// `cell * cell_size`; the vertical axis is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub z: i32,
}

impl GridCell {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn world_position(self, cell_size: f64) -> (f64, f64) {
        (self.x as f64 * cell_size, self.z as f64 * cell_size)
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Square of buildable cells centred on the origin. Grows by one cell of side
/// length per unlocked terrain unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainBounds {
    max_coord: f64,
    cell_size: f64,
}

impl TerrainBounds {
    pub fn new(grid: &Grid, unlocked_terrain: u32) -> Self {
        let side = (grid.initial_terrain_cells + unlocked_terrain) as f64 * grid.cell_size;
        Self {
            max_coord: side / 2.0 - grid.cell_size / 2.0,
            cell_size: grid.cell_size,
        }
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        let (x, z) = cell.world_position(self.cell_size);
        x.abs() <= self.max_coord && z.abs() <= self.max_coord
    }

    /// Largest absolute cell coordinate inside the bounds.
    pub fn max_cell(&self) -> i32 {
        (self.max_coord / self.cell_size).floor() as i32
    }

    pub fn cells(&self) -> impl Iterator<Item = GridCell> {
        let max = self.max_cell();
        (-max..=max).flat_map(move |x| (-max..=max).map(move |z| GridCell::new(x, z)))
    }
}

fn default_divisions() -> usize {
    50
}

/// River centre line in world coordinates: a centripetal Catmull-Rom curve
/// through `points`, sampled at `divisions + 1` evenly spaced parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiverPath {
    pub points: Vec<(f64, f64)>,
    #[serde(default = "default_divisions")]
    pub divisions: usize,
}

impl Default for RiverPath {
    fn default() -> Self {
        Self {
            points: vec![(-20.0, -30.0), (-22.0, -8.0), (-20.0, 8.0), (-18.0, 30.0)],
            divisions: default_divisions(),
        }
    }
}

impl RiverPath {
    /// Sampled centre line. A single control point is returned as is.
    pub fn centre_line(&self) -> Vec<(f64, f64)> {
        if self.points.len() < 2 {
            return self.points.clone();
        }
        let divisions = self.divisions.max(1);
        (0..=divisions)
            .map(|step| self.point_at(step as f64 / divisions as f64))
            .collect()
    }

    /// Point on the curve at parameter `t` in `[0, 1]`. Needs two or more
    /// control points.
    fn point_at(&self, t: f64) -> (f64, f64) {
        let points = &self.points;
        let last = points.len() - 1;
        let position = last as f64 * t;
        let mut segment = position.floor() as usize;
        let mut weight = position - segment as f64;
        if segment >= last {
            segment = last - 1;
            weight = 1.0;
        }

        let p1 = points[segment];
        let p2 = points[segment + 1];
        // Missing neighbours at either end are mirrored through the endpoint.
        let p0 = if segment > 0 {
            points[segment - 1]
        } else {
            reflect(points[0], points[1])
        };
        let p3 = if segment + 2 <= last {
            points[segment + 2]
        } else {
            reflect(points[last], points[last - 1])
        };

        let mut dt1 = distance(p1, p2).sqrt();
        if dt1 < 1e-4 {
            dt1 = 1.0;
        }
        let mut dt0 = distance(p0, p1).sqrt();
        if dt0 < 1e-4 {
            dt0 = dt1;
        }
        let mut dt2 = distance(p2, p3).sqrt();
        if dt2 < 1e-4 {
            dt2 = dt1;
        }
        let axis = |x0: f64, x1: f64, x2: f64, x3: f64| {
            let t1 = ((x1 - x0) / dt0 - (x2 - x0) / (dt0 + dt1) + (x2 - x1) / dt1) * dt1;
            let t2 = ((x2 - x1) / dt1 - (x3 - x1) / (dt1 + dt2) + (x3 - x2) / dt2) * dt1;
            let c2 = -3.0 * x1 + 3.0 * x2 - 2.0 * t1 - t2;
            let c3 = 2.0 * x1 - 2.0 * x2 + t1 + t2;
            x1 + weight * (t1 + weight * (c2 + weight * c3))
        };
        (
            axis(p0.0, p1.0, p2.0, p3.0),
            axis(p0.1, p1.1, p2.1, p3.1),
        )
    }

    /// Distance from the cell centre to the nearest sample of the centre
    /// line. Infinite when the path has no points.
    pub fn distance_to(&self, cell: GridCell, cell_size: f64) -> f64 {
        let point = cell.world_position(cell_size);
        self.centre_line()
            .into_iter()
            .map(|sample| distance(point, sample))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn is_riparian(&self, cell: GridCell, grid: &Grid) -> bool {
        self.distance_to(cell, grid.cell_size) <= grid.river_proximity
    }
}

fn reflect(end: (f64, f64), next: (f64, f64)) -> (f64, f64) {
    (2.0 * end.0 - next.0, 2.0 * end.1 - next.1)
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}
