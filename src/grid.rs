//! Environment grid and the coordinate-bucketed agent registry.

use crate::agent::{Agent, AgentId, Species};
use crate::config::DroughtConfig;
use crate::ecology::drought::DroughtProcess;
use crate::rng::SimRng;
use rand::Rng;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Soil moisture and vegetation density of one cell, both in [0, 1]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnvironmentCell {
    pub moisture: f64,
    pub density: f64,
}

impl EnvironmentCell {
    pub fn new(moisture: f64, density: f64) -> Self {
        Self {
            moisture: moisture.clamp(0.0, 1.0),
            density: density.clamp(0.0, 1.0),
        }
    }
}

/// Dense `width x height` grid of environment cells
#[derive(Clone, Debug)]
pub struct EnvironmentGrid {
    width: usize,
    height: usize,
    /// Row-major: index = y * width + x
    cells: Vec<EnvironmentCell>,
}

impl EnvironmentGrid {
    /// Create a grid of empty, dry cells
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![EnvironmentCell::default(); width * height],
        }
    }

    /// Create a grid with uniformly random moisture and density
    pub fn random(width: usize, height: usize, rng: &mut SimRng) -> Self {
        let mut grid = Self::new(width, height);
        for cell in &mut grid.cells {
            let density = rng.gen::<f64>();
            let moisture = rng.gen::<f64>();
            *cell = EnvironmentCell::new(moisture, density);
        }
        grid
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&EnvironmentCell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut EnvironmentCell> {
        match self.index(x, y) {
            Some(i) => Some(&mut self.cells[i]),
            None => None,
        }
    }

    pub fn cells(&self) -> &[EnvironmentCell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [EnvironmentCell] {
        &mut self.cells
    }

    /// Vegetation density at a position, 0 outside the grid
    #[inline]
    pub fn density(&self, x: usize, y: usize) -> f64 {
        self.get(x, y).map_or(0.0, |c| c.density)
    }

    /// Eat vegetation at a position, returns amount consumed
    #[inline]
    pub fn consume(&mut self, x: usize, y: usize, max_amount: f64) -> f64 {
        match self.get_mut(x, y) {
            Some(cell) => {
                let eaten = cell.density.min(max_amount).max(0.0);
                cell.density -= eaten;
                eaten
            }
            None => 0.0,
        }
    }

    /// In-bounds cells of the box of `radius` around a position, including
    /// the centre, in x-major order
    pub fn neighborhood(&self, x: usize, y: usize, radius: usize) -> impl Iterator<Item = (usize, usize)> {
        let x_min = x.saturating_sub(radius);
        let x_max = x.saturating_add(radius).min(self.width.saturating_sub(1));
        let y_min = y.saturating_sub(radius);
        let y_max = y.saturating_add(radius).min(self.height.saturating_sub(1));

        (x_min..=x_max).flat_map(move |cx| (y_min..=y_max).map(move |cy| (cx, cy)))
    }

    /// Cell with the highest density within `radius`.
    ///
    /// Starts from the current cell and only switches on a strictly higher
    /// density, so ties keep the agent where it is.
    pub fn densest_in_radius(&self, x: usize, y: usize, radius: usize) -> (usize, usize) {
        let mut best = (x, y);
        let mut max_density = self.density(x, y);
        for (cx, cy) in self.neighborhood(x, y, radius) {
            let density = self.density(cx, cy);
            if density > max_density {
                max_density = density;
                best = (cx, cy);
            }
        }
        best
    }

    /// Apply the drought rule to every cell.
    ///
    /// Cells only read the shared drought level, so they update in parallel.
    pub fn update(&mut self, drought: &DroughtProcess, config: &DroughtConfig) {
        self.cells
            .par_iter_mut()
            .for_each(|cell| drought.update_cell(cell, config));
    }

    /// Total vegetation across the grid
    pub fn total_density(&self) -> f64 {
        self.cells.iter().map(|c| c.density).sum()
    }

    pub fn mean_moisture(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.cells.iter().map(|c| c.moisture).sum::<f64>() / self.cells.len() as f64
    }
}

/// Agents keyed by id, bucketed by the cell they stand on.
///
/// Buckets are pruned when they empty, and an agent is in exactly one
/// bucket matching its coordinates. An agent can be checked out with
/// [`AgentRegistry::take`] while it steps; its bucket entry stays put.
#[derive(Clone, Debug, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, Agent>,
    buckets: BTreeMap<(usize, usize), Vec<AgentId>>,
    next_id: AgentId,
    checked_out: usize,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new agent on a cell and return its id
    pub fn spawn(&mut self, species: Species, x: usize, y: usize, energy: f64, max_energy: f64) -> AgentId {
        let id = self.next_id;
        self.next_id += 1;
        self.agents.insert(id, Agent::new(id, species, x, y, energy, max_energy));
        self.buckets.entry((x, y)).or_default().push(id);
        id
    }

    /// Check an agent out of the store for mutation
    pub fn take(&mut self, id: AgentId) -> Option<Agent> {
        let agent = self.agents.remove(&id)?;
        self.checked_out += 1;
        Some(agent)
    }

    /// Return a checked-out agent
    pub fn restore(&mut self, agent: Agent) {
        self.checked_out = self.checked_out.saturating_sub(1);
        self.agents.insert(agent.id, agent);
    }

    /// Move an id from one bucket to another
    pub fn relocate(&mut self, id: AgentId, from: (usize, usize), to: (usize, usize)) {
        if from == to {
            return;
        }
        self.detach(id, from);
        self.buckets.entry(to).or_default().push(id);
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.x = to.0;
            agent.y = to.1;
        }
    }

    /// Remove an agent entirely
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        let agent = self.agents.remove(&id)?;
        self.detach(id, agent.position());
        Some(agent)
    }

    fn detach(&mut self, id: AgentId, at: (usize, usize)) {
        if let Some(bucket) = self.buckets.get_mut(&at) {
            bucket.retain(|&other| other != id);
            if bucket.is_empty() {
                self.buckets.remove(&at);
            }
        }
    }

    #[inline]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Ids of agents on a cell
    pub fn at(&self, x: usize, y: usize) -> &[AgentId] {
        self.buckets.get(&(x, y)).map(|b| b.as_slice()).unwrap_or(&[])
    }

    /// Every registered id, bucket by bucket in coordinate order
    pub fn ids(&self) -> Vec<AgentId> {
        self.buckets.values().flatten().copied().collect()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Number of registered agents, including checked-out ones
    pub fn len(&self) -> usize {
        self.agents.len() + self.checked_out
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, species: Species) -> usize {
        self.agents.values().filter(|a| a.species == species).count()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Every agent sits in exactly one bucket matching its position and no
    /// bucket is empty
    pub fn is_consistent(&self) -> bool {
        if self.buckets.values().any(|b| b.is_empty()) {
            return false;
        }
        let bucketed: usize = self.buckets.values().map(|b| b.len()).sum();
        if bucketed != self.agents.len() || self.checked_out != 0 {
            return false;
        }
        self.buckets.iter().all(|(&(x, y), ids)| {
            ids.iter()
                .all(|id| self.agents.get(id).map_or(false, |a| a.position() == (x, y)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

    #[test]
    fn test_random_grid_in_unit_interval() {
        let mut rng = create_rng(7);
        let grid = EnvironmentGrid::random(10, 8, &mut rng);
        assert_eq!(grid.cells().len(), 80);
        for cell in grid.cells() {
            assert!((0.0..=1.0).contains(&cell.moisture));
            assert!((0.0..=1.0).contains(&cell.density));
        }
    }

    #[test]
    fn test_out_of_bounds_access() {
        let grid = EnvironmentGrid::new(4, 3);
        assert!(grid.get(3, 2).is_some());
        assert!(grid.get(4, 0).is_none());
        assert!(grid.get(0, 3).is_none());
        assert_eq!(grid.density(10, 10), 0.0);
    }

    #[test]
    fn test_consume() {
        let mut grid = EnvironmentGrid::new(4, 4);
        grid.get_mut(1, 1).unwrap().density = 0.25;

        assert_eq!(grid.consume(1, 1, 0.1), 0.1);
        assert!((grid.density(1, 1) - 0.15).abs() < 1e-12);
        assert!((grid.consume(1, 1, 0.5) - 0.15).abs() < 1e-12);
        assert_eq!(grid.density(1, 1), 0.0);
        assert_eq!(grid.consume(9, 9, 0.5), 0.0);
    }

    #[test]
    fn test_neighborhood_clipped_at_edges() {
        let grid = EnvironmentGrid::new(5, 5);

        let corner: Vec<_> = grid.neighborhood(0, 0, 1).collect();
        assert_eq!(corner, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);

        let far_corner: Vec<_> = grid.neighborhood(4, 4, 2).collect();
        assert_eq!(far_corner.len(), 9);
        assert!(far_corner.iter().all(|&(x, y)| x < 5 && y < 5));

        let centre: Vec<_> = grid.neighborhood(2, 2, 1).collect();
        assert_eq!(centre.len(), 9);
    }

    #[test]
    fn test_densest_in_radius_at_edge() {
        let mut grid = EnvironmentGrid::new(3, 3);
        for cell in grid.cells_mut() {
            cell.density = 0.1;
        }
        grid.get_mut(2, 0).unwrap().density = 0.7;
        grid.get_mut(0, 2).unwrap().density = 0.9;

        // Radius larger than the grid never leaves it
        assert_eq!(grid.densest_in_radius(0, 0, 5), (0, 2));
        assert_eq!(grid.densest_in_radius(2, 0, 1), (2, 0));
    }

    #[test]
    fn test_densest_keeps_position_on_tie() {
        let mut grid = EnvironmentGrid::new(3, 3);
        for cell in grid.cells_mut() {
            cell.density = 0.4;
        }
        assert_eq!(grid.densest_in_radius(1, 1, 1), (1, 1));
    }

    #[test]
    fn test_grid_update_respects_bounds() {
        let mut rng = create_rng(11);
        let mut grid = EnvironmentGrid::random(6, 6, &mut rng);
        let config = DroughtConfig::default();
        let mut drought = DroughtProcess::from_config(&config);
        drought.new_drought(1.0);

        for _ in 0..200 {
            grid.update(&drought, &config);
            drought.decay();
        }
        for cell in grid.cells() {
            assert!((0.0..=1.0).contains(&cell.moisture));
            assert!((0.0..=1.0).contains(&cell.density));
        }
    }

    #[test]
    fn test_registry_spawn_and_lookup() {
        let mut registry = AgentRegistry::new();
        let a = registry.spawn(Species::Prey, 1, 1, 5.0, 20.0);
        let b = registry.spawn(Species::Predator, 1, 1, 5.0, 20.0);
        let c = registry.spawn(Species::Prey, 2, 0, 5.0, 20.0);

        assert_eq!(registry.at(1, 1), &[a, b]);
        assert_eq!(registry.at(2, 0), &[c]);
        assert_eq!(registry.count(Species::Prey), 2);
        assert_eq!(registry.count(Species::Predator), 1);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_relocate_prunes_empty_bucket() {
        let mut registry = AgentRegistry::new();
        let a = registry.spawn(Species::Prey, 1, 1, 5.0, 20.0);

        registry.relocate(a, (1, 1), (3, 4));
        assert!(registry.at(1, 1).is_empty());
        assert_eq!(registry.at(3, 4), &[a]);
        assert_eq!(registry.get(a).unwrap().position(), (3, 4));
        assert_eq!(registry.bucket_count(), 1);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_remove_prunes_empty_bucket() {
        let mut registry = AgentRegistry::new();
        let a = registry.spawn(Species::Prey, 1, 1, 5.0, 20.0);
        let b = registry.spawn(Species::Prey, 1, 1, 5.0, 20.0);

        registry.remove(a);
        assert_eq!(registry.at(1, 1), &[b]);
        registry.remove(b);
        assert_eq!(registry.bucket_count(), 0);
        assert!(registry.is_empty());
        assert!(registry.remove(b).is_none());
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_take_and_restore() {
        let mut registry = AgentRegistry::new();
        let a = registry.spawn(Species::Prey, 0, 0, 5.0, 20.0);

        let mut agent = registry.take(a).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_consistent());
        agent.move_to(&mut registry, 2, 2);
        registry.restore(agent);

        assert_eq!(registry.at(2, 2), &[a]);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_ids_follow_coordinate_order() {
        let mut registry = AgentRegistry::new();
        let a = registry.spawn(Species::Prey, 3, 0, 5.0, 20.0);
        let b = registry.spawn(Species::Prey, 0, 2, 5.0, 20.0);
        let c = registry.spawn(Species::Prey, 0, 1, 5.0, 20.0);

        assert_eq!(registry.ids(), vec![c, b, a]);
    }
}
