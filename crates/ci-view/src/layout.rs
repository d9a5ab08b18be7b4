//! Force-directed node placement.
//!
//! A small velocity-Verlet simulation in the style of d3-force: many-body
//! repulsion, spring links toward a target distance and a centering pull.
//! Positions are clamped to a padded viewport after every tick.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::{GraphVariant, Point, VisualGraph};
use crate::ViewError;

/// Alpha the simulation heads towards while a node is being dragged.
const DRAG_ALPHA_TARGET: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    pub charge_strength: f64,
    pub link_distance: f64,
    pub velocity_decay: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    /// Wall-clock ceiling for [`ForceLayout::run`].
    pub budget: Duration,
    /// Fixed seed for reproducible initial positions.
    pub seed: Option<u64>,
}

impl LayoutConfig {
    pub fn for_variant(variant: GraphVariant) -> Self {
        let alpha_min: f64 = 0.001;
        Self {
            width: 900.0,
            height: 600.0,
            padding: 50.0,
            charge_strength: variant.charge_strength(),
            link_distance: variant.link_distance(),
            velocity_decay: 0.4,
            alpha_min,
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            budget: Duration::from_millis(3000),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    fn clamp(&self, p: Point) -> Point {
        let max_x = (self.width - self.padding).max(self.padding);
        let max_y = (self.height - self.padding).max(self.padding);
        Point::new(
            p.x.clamp(self.padding, max_x),
            p.y.clamp(self.padding, max_y),
        )
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::for_variant(GraphVariant::Directed)
    }
}

/// Why [`ForceLayout::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Alpha fell below its minimum.
    Converged,
    /// The wall-clock budget ran out first.
    Budget,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    source: usize,
    target: usize,
    strength: f64,
    bias: f64,
}

#[derive(Debug, Clone)]
pub struct ForceLayout {
    config: LayoutConfig,
    positions: Vec<Point>,
    velocities: Vec<Point>,
    fixed: Vec<Option<Point>>,
    links: Vec<Link>,
    alpha: f64,
    alpha_target: f64,
    ticks: u64,
}

impl ForceLayout {
    /// Seed node positions uniformly inside the padded viewport.
    pub fn new(graph: &VisualGraph, config: LayoutConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let n = graph.nodes.len();
        let (lo_x, hi_x) = (config.padding, (config.width - config.padding).max(config.padding));
        let (lo_y, hi_y) = (config.padding, (config.height - config.padding).max(config.padding));
        let positions = (0..n)
            .map(|_| Point::new(rng.gen_range(lo_x..=hi_x), rng.gen_range(lo_y..=hi_y)))
            .collect();

        let mut degree = vec![0usize; n];
        for edge in &graph.edges {
            degree[edge.source] += 1;
            degree[edge.target] += 1;
        }
        let links = graph
            .edges
            .iter()
            .map(|edge| {
                let (s, t) = (degree[edge.source] as f64, degree[edge.target] as f64);
                Link {
                    source: edge.source,
                    target: edge.target,
                    strength: 1.0 / s.min(t).max(1.0),
                    bias: s / (s + t),
                }
            })
            .collect();

        Self {
            config,
            positions,
            velocities: vec![Point::default(); n],
            fixed: vec![None; n],
            links,
            alpha: 1.0,
            alpha_target: 0.0,
            ticks: 0,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_settled(&self) -> bool {
        self.alpha < self.config.alpha_min
    }

    pub fn is_pinned(&self, index: usize) -> bool {
        self.fixed.get(index).map_or(false, Option::is_some)
    }

    /// Reheat the simulation, e.g. after the graph was replaced.
    pub fn restart(&mut self) {
        self.alpha = 1.0;
    }

    /// Advance one step.
    pub fn tick(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        self.apply_links();
        self.apply_charge();
        self.apply_center();

        for i in 0..self.positions.len() {
            match self.fixed[i] {
                Some(p) => {
                    self.positions[i] = p;
                    self.velocities[i] = Point::default();
                }
                None => {
                    let keep = 1.0 - self.config.velocity_decay;
                    self.velocities[i].x *= keep;
                    self.velocities[i].y *= keep;
                    let moved = Point::new(
                        self.positions[i].x + self.velocities[i].x,
                        self.positions[i].y + self.velocities[i].y,
                    );
                    self.positions[i] = self.config.clamp(moved);
                }
            }
        }
        self.ticks += 1;
    }

    /// Tick until the layout settles or the configured budget elapses.
    pub fn run(&mut self) -> StopReason {
        self.run_for(self.config.budget)
    }

    pub fn run_for(&mut self, budget: Duration) -> StopReason {
        let started = Instant::now();
        loop {
            if self.is_settled() {
                tracing::debug!(ticks = self.ticks, "Layout converged");
                return StopReason::Converged;
            }
            if started.elapsed() >= budget {
                tracing::debug!(ticks = self.ticks, alpha = self.alpha, "Layout budget exhausted");
                return StopReason::Budget;
            }
            self.tick();
        }
    }

    /// Start dragging a node: it is fixed at `at` and the simulation reheats.
    pub fn pin(&mut self, index: usize, at: Point) -> Result<(), ViewError> {
        let slot = self.fixed.get_mut(index).ok_or(ViewError::NodeIndex(index))?;
        let at = self.config.clamp(at);
        *slot = Some(at);
        self.positions[index] = at;
        self.alpha_target = DRAG_ALPHA_TARGET;
        if self.alpha < DRAG_ALPHA_TARGET {
            self.alpha = DRAG_ALPHA_TARGET;
        }
        Ok(())
    }

    /// Move a pinned node.
    pub fn drag_to(&mut self, index: usize, at: Point) -> Result<(), ViewError> {
        match self.fixed.get(index) {
            None => Err(ViewError::NodeIndex(index)),
            Some(None) => self.pin(index, at),
            Some(Some(_)) => {
                let at = self.config.clamp(at);
                self.fixed[index] = Some(at);
                self.positions[index] = at;
                Ok(())
            }
        }
    }

    /// Release a dragged node back to the forces.
    pub fn release(&mut self, index: usize) -> Result<(), ViewError> {
        let slot = self.fixed.get_mut(index).ok_or(ViewError::NodeIndex(index))?;
        *slot = None;
        if self.fixed.iter().all(Option::is_none) {
            self.alpha_target = 0.0;
        }
        Ok(())
    }

    /// Nearest node within `radius` of a world-space point.
    pub fn node_at(&self, at: Point, radius: f64) -> Option<usize> {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.distance(at)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn apply_links(&mut self) {
        for link in &self.links {
            if link.source == link.target {
                continue;
            }
            let (s, t) = (link.source, link.target);
            let mut dx = self.positions[t].x + self.velocities[t].x
                - self.positions[s].x
                - self.velocities[s].x;
            let mut dy = self.positions[t].y + self.velocities[t].y
                - self.positions[s].y
                - self.velocities[s].y;
            if dx == 0.0 && dy == 0.0 {
                dx = 1e-6;
            }
            let len = (dx * dx + dy * dy).sqrt();
            let k = (len - self.config.link_distance) / len * self.alpha * link.strength;
            dx *= k;
            dy *= k;
            self.velocities[t].x -= dx * link.bias;
            self.velocities[t].y -= dy * link.bias;
            self.velocities[s].x += dx * (1.0 - link.bias);
            self.velocities[s].y += dy * (1.0 - link.bias);
        }
    }

    fn apply_charge(&mut self) {
        let n = self.positions.len();
        let strength = self.config.charge_strength * self.alpha;
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let dx = self.positions[j].x - self.positions[i].x;
                let dy = self.positions[j].y - self.positions[i].y;
                let dist2 = (dx * dx + dy * dy).max(1.0);
                let w = strength / dist2;
                self.velocities[i].x += dx * w;
                self.velocities[i].y += dy * w;
            }
        }
    }

    fn apply_center(&mut self) {
        let n = self.positions.len();
        if n == 0 {
            return;
        }
        let center = self.config.center();
        let (sx, sy) = self
            .positions
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
        let shift = Point::new(sx / n as f64 - center.x, sy / n as f64 - center.y);
        for p in &mut self.positions {
            p.x -= shift.x;
            p.y -= shift.y;
        }
    }
}
