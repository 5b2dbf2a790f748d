//! The spatial cell grid over the toroidal map. Rebuilt once per fixed tick:
//! dead entities are swept out of the simulation vectors first, then every
//! survivor is bucketed by position. Cell entries are plain `(kind, index)`
//! handles, valid until the next refresh.

use glam::DVec2;

use crate::config::settings;
use crate::entity::{EntityKind, EntityRef};
use crate::simulation::SimulationData;

pub struct EntityGrid {
    cols: usize,
    rows: usize,
    cell_size: f64,
    cells: Vec<Vec<EntityRef>>,
}

impl EntityGrid {
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        let cols = (width / cell_size).ceil() as usize + 1;
        let rows = (height / cell_size).ceil() as usize + 1;
        Self {
            cols,
            rows,
            cell_size,
            cells: vec![Vec::new(); cols * rows],
        }
    }

    pub fn for_map(width: f64, height: f64) -> Self {
        Self::new(width, height, settings().environment.grid_cell_size)
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// The cell containing a (wrapped) position.
    pub fn cell_of(&self, position: DVec2) -> (i32, i32) {
        let cx = ((position.x / self.cell_size) as usize).min(self.cols - 1);
        let cy = ((position.y / self.cell_size) as usize).min(self.rows - 1);
        (cx as i32, cy as i32)
    }

    pub fn entities_at(&self, cell: (usize, usize)) -> &[EntityRef] {
        &self.cells[cell.1 * self.cols + cell.0]
    }

    /// Every cell within `layer` of the center, wrapped modulo the grid
    /// dimensions. The center cell is included.
    pub fn neighbors(&self, center: (i32, i32), layer: i32) -> Vec<(usize, usize)> {
        let layer = layer.max(0);
        let mut cells = Vec::with_capacity(((2 * layer + 1) * (2 * layer + 1)) as usize);
        for dy in -layer..=layer {
            for dx in -layer..=layer {
                let cx = (center.0 + dx).rem_euclid(self.cols as i32) as usize;
                let cy = (center.1 + dy).rem_euclid(self.rows as i32) as usize;
                cells.push((cx, cy));
            }
        }
        cells
    }

    fn insert(&mut self, kind: EntityKind, index: usize, position: DVec2) {
        let (cx, cy) = self.cell_of(position);
        self.cells[cy as usize * self.cols + cx as usize].push(EntityRef {
            kind,
            index: index as u32,
        });
    }

    /// Sweep dead entities out of the simulation vectors, rebucket every
    /// survivor, and drop queue entries whose creature no longer exists.
    pub fn refresh(&mut self, data: &mut SimulationData) {
        data.creatures.retain(|c| c.core.is_alive());
        data.food.retain(|f| f.core.is_alive());
        data.eggs.retain(|e| e.core.is_alive());
        data.pheromones.retain(|p| p.core.is_alive());

        for cell in &mut self.cells {
            cell.clear();
        }
        for (index, creature) in data.creatures.iter().enumerate() {
            self.insert(EntityKind::Creature, index, creature.core.position);
        }
        for (index, food) in data.food.iter().enumerate() {
            self.insert(EntityKind::Food, index, food.core.position);
        }
        for (index, egg) in data.eggs.iter().enumerate() {
            self.insert(EntityKind::Egg, index, egg.core.position);
        }
        for (index, pheromone) in data.pheromones.iter().enumerate() {
            self.insert(EntityKind::Pheromone, index, pheromone.core.position);
        }

        let live_ids: std::collections::HashSet<u64> =
            data.creatures.iter().map(|c| c.core.id).collect();
        data.reproduce.retain(|id| live_ids.contains(id));
        data.new_reproduce.retain(|id| live_ids.contains(id));
    }
}
