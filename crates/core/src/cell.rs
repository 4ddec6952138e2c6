//! Eulerian arrival-time grid backing the cell-derived layers.
//!
//! The simulation domain is split into a rectangular grid of [`Cell`]s. Each
//! cell owns a [`BurningMap`]: a finer sub-grid recording, per sub-cell, the
//! simulated time at which the fire reached it (`+inf` until then). The
//! burning-ratio and max-speed layers reduce over this grid, one value per
//! cell.

use crate::core_types::Vec3;
use crate::field::FieldArray;
use tracing::warn;

/// Arrival times on a regular sub-grid
#[derive(Debug, Clone)]
pub struct BurningMap {
    sw: Vec3,
    ne: Vec3,
    dx: f64,
    dy: f64,
    arrival: FieldArray<f64>,
}

impl BurningMap {
    /// Map over `sw..ne` split into `nx x ny` sub-cells, none reached yet.
    #[must_use]
    pub fn new(sw: Vec3, ne: Vec3, nx: usize, ny: usize) -> Self {
        let arrival = FieldArray::new_2d("ArrivalTime", f64::INFINITY, nx, ny);
        Self {
            dx: (ne.x - sw.x) / arrival.nx() as f64,
            dy: (ne.y - sw.y) / arrival.ny() as f64,
            sw,
            ne,
            arrival,
        }
    }

    #[must_use]
    pub fn nx(&self) -> usize {
        self.arrival.nx()
    }

    #[must_use]
    pub fn ny(&self) -> usize {
        self.arrival.ny()
    }

    /// Sub-cell size `(dx, dy)`
    #[must_use]
    pub fn resolution(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }

    #[must_use]
    pub fn corners(&self) -> (Vec3, Vec3) {
        (self.sw, self.ne)
    }

    #[must_use]
    pub fn arrival_times(&self) -> &FieldArray<f64> {
        &self.arrival
    }

    /// Arrival time of sub-cell `(i, j)`; `+inf` outside the map.
    #[must_use]
    pub fn arrival(&self, i: usize, j: usize) -> f64 {
        if i >= self.nx() || j >= self.ny() {
            return f64::INFINITY;
        }
        self.arrival.get_2d(i, j)
    }

    /// Record the arrival time of sub-cell `(i, j)`.
    pub fn set_arrival(&mut self, i: usize, j: usize, time: f64) {
        if i >= self.nx() || j >= self.ny() {
            warn!(
                "Arrival time write ({}, {}) outside {}x{} burning map",
                i,
                j,
                self.nx(),
                self.ny()
            );
            return;
        }
        self.arrival.set_2d(i, j, time);
    }

    /// Mark the sub-cell containing `loc` as reached at `time`.
    ///
    /// An earlier recorded arrival is kept. Locations outside the map are
    /// ignored.
    pub fn set_burning(&mut self, loc: &Vec3, time: f64) {
        let u = ((loc.x - self.sw.x) / self.dx).floor();
        let v = ((loc.y - self.sw.y) / self.dy).floor();
        if u < 0.0 || v < 0.0 || u >= self.nx() as f64 || v >= self.ny() as f64 {
            return;
        }
        let (i, j) = (u as usize, v as usize);
        if time < self.arrival(i, j) {
            self.arrival.set_2d(i, j, time);
        }
    }

    /// Centre of sub-cell `(i, j)`.
    #[must_use]
    pub fn center(&self, i: usize, j: usize) -> Vec3 {
        Vec3::new(
            self.sw.x + (i as f64 + 0.5) * self.dx,
            self.sw.y + (j as f64 + 0.5) * self.dy,
            0.0,
        )
    }

    /// Latest arrival time, `+inf` if any sub-cell is still unreached.
    #[must_use]
    pub fn max_time(&self) -> f64 {
        self.arrival.max()
    }

    /// Fraction of sub-cells reached at or before `time`.
    #[must_use]
    pub fn burnt_fraction(&self, time: f64) -> f64 {
        let burnt = self.arrival.data().iter().filter(|&&arrival| arrival <= time).count();
        burnt as f64 / self.arrival.len() as f64
    }
}

/// One cell of the domain grid and its arrival-time sub-grid
#[derive(Debug, Clone)]
pub struct Cell {
    pub sw: Vec3,
    pub ne: Vec3,
    pub global_i: usize,
    pub global_j: usize,
    pub map: BurningMap,
}

impl Cell {
    /// Burnt fraction of the cell at `time`; 1 once every sub-cell is reached.
    #[must_use]
    pub fn burning_ratio(&self, time: f64) -> f64 {
        if self.map.max_time() <= time {
            return 1.0;
        }
        self.map.burnt_fraction(time)
    }
}

/// Domain-wide grid of cells
#[derive(Debug, Clone)]
pub struct CellGrid {
    sw: Vec3,
    ne: Vec3,
    nx: usize,
    ny: usize,
    cells: Vec<Cell>,
}

impl CellGrid {
    /// Grid of `nx x ny` cells over `sw..ne`, each with a `map_nx x map_ny`
    /// burning map.
    #[must_use]
    pub fn new(sw: Vec3, ne: Vec3, nx: usize, ny: usize, map_nx: usize, map_ny: usize) -> Self {
        let (nx, ny) = (nx.max(1), ny.max(1));
        let dx = (ne.x - sw.x) / nx as f64;
        let dy = (ne.y - sw.y) / ny as f64;
        let mut cells = Vec::with_capacity(nx * ny);
        for i in 0..nx {
            for j in 0..ny {
                let cell_sw = Vec3::new(sw.x + i as f64 * dx, sw.y + j as f64 * dy, sw.z);
                let cell_ne = Vec3::new(cell_sw.x + dx, cell_sw.y + dy, ne.z);
                cells.push(Cell {
                    sw: cell_sw,
                    ne: cell_ne,
                    global_i: i,
                    global_j: j,
                    map: BurningMap::new(cell_sw, cell_ne, map_nx, map_ny),
                });
            }
        }
        Self { sw, ne, nx, ny, cells }
    }

    #[must_use]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[must_use]
    pub fn ny(&self) -> usize {
        self.ny
    }

    #[must_use]
    pub fn corners(&self) -> (Vec3, Vec3) {
        (self.sw, self.ne)
    }

    #[must_use]
    pub fn cell(&self, i: usize, j: usize) -> Option<&Cell> {
        (i < self.nx && j < self.ny).then(|| &self.cells[i * self.ny + j])
    }

    pub fn cell_mut(&mut self, i: usize, j: usize) -> Option<&mut Cell> {
        (i < self.nx && j < self.ny).then(|| &mut self.cells[i * self.ny + j])
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    fn map_size(&self) -> (usize, usize) {
        self.cells
            .first()
            .map_or((1, 1), |cell| (cell.map.nx(), cell.map.ny()))
    }

    /// Size of the domain-wide sub-cell grid.
    #[must_use]
    pub fn global_map_size(&self) -> (usize, usize) {
        let (mx, my) = self.map_size();
        (self.nx * mx, self.ny * my)
    }

    /// Arrival time of global sub-cell `(ii, jj)`; `+inf` outside the domain.
    #[must_use]
    pub fn arrival_time(&self, ii: usize, jj: usize) -> f64 {
        let (mx, my) = self.map_size();
        self.cell(ii / mx, jj / my)
            .map_or(f64::INFINITY, |cell| cell.map.arrival(ii % mx, jj % my))
    }

    pub fn set_arrival_time(&mut self, ii: usize, jj: usize, time: f64) {
        let (mx, my) = self.map_size();
        if let Some(cell) = self.cell_mut(ii / mx, jj / my) {
            cell.map.set_arrival(ii % mx, jj % my, time);
        }
    }

    /// Mark the sub-cell containing `loc` as reached at `time`.
    pub fn set_burning(&mut self, loc: &Vec3, time: f64) {
        let dx = (self.ne.x - self.sw.x) / self.nx as f64;
        let dy = (self.ne.y - self.sw.y) / self.ny as f64;
        let i = ((loc.x - self.sw.x) / dx).floor();
        let j = ((loc.y - self.sw.y) / dy).floor();
        if i < 0.0 || j < 0.0 {
            return;
        }
        if let Some(cell) = self.cell_mut(i as usize, j as usize) {
            cell.map.set_burning(loc, time);
        }
    }

    /// Front speed at global sub-cell `(ii, jj)` from the arrival-time
    /// gradient, central differences over finite neighbours.
    ///
    /// Returns `+inf` for an unreached sub-cell or a flat neighbourhood.
    #[must_use]
    pub fn sub_cell_speed(&self, ii: usize, jj: usize) -> f64 {
        let (gx, gy) = self.global_map_size();
        let current = self.arrival_time(ii, jj);
        if ii >= gx || jj >= gy || current.is_infinite() {
            return f64::INFINITY;
        }
        let resolution = self.cells.first().map_or(1.0, |cell| cell.map.resolution().0);
        let central = |before: f64, after: f64| {
            if before.is_finite() && after.is_finite() {
                after - before
            } else {
                0.0
            }
        };
        let grad_x = if ii > 0 && ii + 1 < gx {
            central(self.arrival_time(ii - 1, jj), self.arrival_time(ii + 1, jj))
        } else {
            0.0
        };
        let grad_y = if jj > 0 && jj + 1 < gy {
            central(self.arrival_time(ii, jj - 1), self.arrival_time(ii, jj + 1))
        } else {
            0.0
        };
        let norm = grad_x.hypot(grad_y);
        if norm == 0.0 {
            return f64::INFINITY;
        }
        2.0 * resolution / norm
    }

    /// Largest finite sub-cell speed in cell `(i, j)` among sub-cells reached
    /// by `time`, 0 when none.
    #[must_use]
    pub fn cell_max_speed(&self, i: usize, j: usize, time: f64) -> f64 {
        let (mx, my) = self.map_size();
        let Some(cell) = self.cell(i, j) else {
            return 0.0;
        };
        let mut fastest = 0.0_f64;
        for si in 0..mx {
            for sj in 0..my {
                if cell.map.arrival(si, sj) > time {
                    continue;
                }
                let speed = self.sub_cell_speed(i * mx + si, j * my + sj);
                if speed.is_finite() {
                    fastest = fastest.max(speed);
                }
            }
        }
        fastest
    }

    /// Burnt fraction of cell `(i, j)` at `time`, 0 outside the grid.
    #[must_use]
    pub fn cell_burning_ratio(&self, i: usize, j: usize, time: f64) -> f64 {
        self.cell(i, j).map_or(0.0, |cell| cell.burning_ratio(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid() -> CellGrid {
        CellGrid::new(Vec3::zeros(), Vec3::new(100.0, 100.0, 0.0), 2, 2, 5, 5)
    }

    #[test]
    fn test_burning_map_starts_unreached() {
        let map = BurningMap::new(Vec3::zeros(), Vec3::new(10.0, 10.0, 0.0), 2, 2);
        assert_eq!(map.max_time(), f64::INFINITY);
        assert_eq!(map.burnt_fraction(1e9), 0.0);
        assert_eq!(map.center(1, 0), Vec3::new(7.5, 2.5, 0.0));
    }

    #[test]
    fn test_set_burning_keeps_earliest() {
        let mut map = BurningMap::new(Vec3::zeros(), Vec3::new(10.0, 10.0, 0.0), 2, 2);
        map.set_burning(&Vec3::new(1.0, 6.0, 0.0), 20.0);
        map.set_burning(&Vec3::new(2.0, 7.0, 0.0), 30.0);
        map.set_burning(&Vec3::new(50.0, 7.0, 0.0), 1.0);
        assert_eq!(map.arrival(0, 1), 20.0);
        assert_eq!(map.burnt_fraction(20.0), 0.25);
        assert_eq!(map.burnt_fraction(19.0), 0.0);
    }

    #[test]
    fn test_global_indexing_crosses_cells() {
        let mut grid = grid();
        assert_eq!(grid.global_map_size(), (10, 10));
        grid.set_arrival_time(7, 2, 5.0);
        assert_eq!(grid.cell(1, 0).unwrap().map.arrival(2, 2), 5.0);
        assert_eq!(grid.arrival_time(7, 2), 5.0);
        assert_eq!(grid.arrival_time(10, 2), f64::INFINITY);
    }

    #[test]
    fn test_burning_ratio_per_cell() {
        let mut grid = grid();
        for jj in 0..5 {
            grid.set_arrival_time(0, jj, 10.0);
        }
        assert_abs_diff_eq!(grid.cell_burning_ratio(0, 0, 10.0), 0.2);
        assert_eq!(grid.cell_burning_ratio(0, 0, 9.0), 0.0);
        assert_eq!(grid.cell_burning_ratio(1, 1, 10.0), 0.0);

        for ii in 0..5 {
            for jj in 0..5 {
                grid.set_arrival_time(ii, jj, 10.0 + jj as f64);
            }
        }
        let cell = grid.cell(0, 0).unwrap();
        assert_eq!(cell.map.max_time(), 14.0);
        assert_eq!(cell.burning_ratio(14.0), 1.0);
        assert_abs_diff_eq!(cell.burning_ratio(12.0), 0.6);
    }

    #[test]
    fn test_speed_of_planar_front() {
        let mut grid = grid();
        // Front moving along +x at 2 m/s over 10 m sub-cells: 5 s per sub-cell.
        for ii in 0..10 {
            for jj in 0..10 {
                grid.set_arrival_time(ii, jj, ii as f64 * 5.0);
            }
        }
        assert_abs_diff_eq!(grid.sub_cell_speed(3, 4), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grid.cell_max_speed(0, 0, 100.0), 2.0, epsilon = 1e-12);
        assert_eq!(grid.cell_max_speed(1, 0, 1.0), 0.0);
    }
}
