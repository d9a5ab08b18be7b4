//! Visual graph model: merged multi-edges, colours and label placement.
//!
//! The backend may return several edges for the same ordered pair of
//! activities (one per relation or count). They are drawn as a single edge
//! whose label joins the original labels and whose stroke grows with the
//! number of merged labels.

use std::collections::HashMap;

use ci_protocol::GraphDescriptor;
use serde::Serialize;

use crate::ViewError;

/// Ordinal palette assigned to nodes by index.
pub const NODE_PALETTE: [(u8, u8, u8); 10] = [
    (0x1f, 0x77, 0xb4),
    (0xff, 0x7f, 0x0e),
    (0x2c, 0xa0, 0x2c),
    (0xd6, 0x27, 0x28),
    (0x94, 0x67, 0xbd),
    (0x8c, 0x56, 0x4b),
    (0xe3, 0x77, 0xc2),
    (0x7f, 0x7f, 0x7f),
    (0xbc, 0xbd, 0x22),
    (0x17, 0xbe, 0xcf),
];

/// Vertical distance between stacked labels sharing a midpoint.
pub const LABEL_STEP: f64 = 12.0;

/// Gap between the arrow tip and the target node's circle.
pub const ARROW_GAP: f64 = 5.0;

/// Labels longer than this are split over two lines.
const LABEL_WRAP_CHARS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn distance(self, other: Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// Plain edges, or arrowed edges for directed relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GraphVariant {
    Plain,
    Directed,
}

impl GraphVariant {
    pub fn node_radius(&self) -> f64 {
        match self {
            GraphVariant::Plain => 20.0,
            GraphVariant::Directed => 38.0,
        }
    }

    pub fn link_distance(&self) -> f64 {
        match self {
            GraphVariant::Plain => 120.0,
            GraphVariant::Directed => 220.0,
        }
    }

    pub fn charge_strength(&self) -> f64 {
        match self {
            GraphVariant::Plain => -300.0,
            GraphVariant::Directed => -600.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualNode {
    pub id: String,
    pub color: (u8, u8, u8),
}

impl VisualNode {
    /// Display lines for the node label; long ids are halved.
    pub fn label_lines(&self) -> Vec<String> {
        let chars: Vec<char> = self.id.chars().collect();
        if chars.len() > LABEL_WRAP_CHARS {
            let mid = chars.len() / 2;
            vec![
                chars[..mid].iter().collect(),
                chars[mid..].iter().collect(),
            ]
        } else {
            vec![self.id.clone()]
        }
    }
}

/// One drawn edge standing for every input edge with the same ordered pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedEdge {
    pub source: usize,
    pub target: usize,
    pub labels: Vec<String>,
    pub color: (u8, u8, u8),
}

impl MergedEdge {
    pub fn label(&self) -> String {
        self.labels.join(", ")
    }

    pub fn weight(&self) -> usize {
        self.labels.len()
    }

    /// Stroke thickness, clamped to [1.5, 8].
    pub fn stroke_width(&self) -> f64 {
        (self.weight() as f64).clamp(1.5, 8.0)
    }
}

/// Where an edge line starts and ends, and where its label sits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeStyle {
    pub start: Point,
    pub end: Point,
    pub label_at: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualGraph {
    pub variant: GraphVariant,
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<MergedEdge>,
}

impl VisualGraph {
    /// Build the drawable graph. Edges whose endpoints are not in the node
    /// list are dropped; duplicate ordered pairs are merged in input order.
    pub fn from_descriptor(descriptor: &GraphDescriptor, variant: GraphVariant) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut nodes = Vec::new();
        for node in &descriptor.nodes {
            if index.contains_key(node.id.as_str()) {
                continue;
            }
            index.insert(node.id.as_str(), nodes.len());
            nodes.push(VisualNode {
                id: node.id.clone(),
                color: NODE_PALETTE[nodes.len() % NODE_PALETTE.len()],
            });
        }

        let mut edges: Vec<MergedEdge> = Vec::new();
        let mut by_pair: HashMap<(usize, usize), usize> = HashMap::new();
        let mut dropped = 0usize;
        for edge in &descriptor.edges {
            let (Some(&source), Some(&target)) =
                (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
            else {
                dropped += 1;
                continue;
            };
            match by_pair.get(&(source, target)) {
                Some(&i) => edges[i].labels.push(edge.label.clone()),
                None => {
                    by_pair.insert((source, target), edges.len());
                    edges.push(MergedEdge {
                        source,
                        target,
                        labels: vec![edge.label.clone()],
                        color: nodes[source].color,
                    });
                }
            }
        }
        if dropped > 0 {
            tracing::debug!(dropped, "Dropped edges referencing unknown nodes");
        }

        Self {
            variant,
            nodes,
            edges,
        }
    }

    pub fn node_index(&self, id: &str) -> Result<usize, ViewError> {
        self.nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| ViewError::UnknownNode(id.to_string()))
    }

    /// Line and label geometry for every edge, given node positions.
    pub fn edge_styles(&self, positions: &[Point]) -> Vec<EdgeStyle> {
        let mut seen: HashMap<(usize, usize), usize> = HashMap::new();
        self.edges
            .iter()
            .map(|edge| {
                let start = positions[edge.source];
                let target = positions[edge.target];
                let end = match self.variant {
                    GraphVariant::Plain => target,
                    GraphVariant::Directed => {
                        shorten_towards(start, target, self.variant.node_radius() + ARROW_GAP)
                    }
                };
                let key = (edge.source.min(edge.target), edge.source.max(edge.target));
                let count = seen.entry(key).or_insert(0);
                *count += 1;
                EdgeStyle {
                    start,
                    end,
                    label_at: label_position(start, target, *count),
                }
            })
            .collect()
    }
}

/// Move `to` back along the segment by `offset`, so an arrowhead drawn at
/// the returned point stops short of the target node.
pub fn shorten_towards(from: Point, to: Point, offset: f64) -> Point {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist <= f64::EPSILON {
        return to;
    }
    Point::new(to.x - dx * offset / dist, to.y - dy * offset / dist)
}

/// Label position for the `count`-th (1-based) label on the same unordered
/// endpoint pair. Successive labels step away from the midpoint, alternating
/// above (odd) and below (even).
pub fn label_position(a: Point, b: Point, count: usize) -> Point {
    let mid = a.midpoint(b);
    let offset = (count.saturating_sub(1)) as f64 * LABEL_STEP;
    let y = if count % 2 == 0 {
        mid.y + offset
    } else {
        mid.y - offset
    };
    Point::new(mid.x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_labels_split_in_half() {
        let node = VisualNode {
            id: "Register Request".into(),
            color: NODE_PALETTE[0],
        };
        assert_eq!(node.label_lines(), vec!["Register", " Request"]);
    }

    #[test]
    fn stroke_width_is_clamped() {
        let mut edge = MergedEdge {
            source: 0,
            target: 1,
            labels: vec!["a".into()],
            color: NODE_PALETTE[0],
        };
        assert_eq!(edge.stroke_width(), 1.5);
        edge.labels = (0..12).map(|i| i.to_string()).collect();
        assert_eq!(edge.stroke_width(), 8.0);
    }

    #[test]
    fn shorten_on_zero_length_returns_target() {
        let p = Point::new(3.0, 3.0);
        assert_eq!(shorten_towards(p, p, 43.0), p);
    }
}
