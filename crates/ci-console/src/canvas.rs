//! Graph drawing on a ratatui canvas.
//!
//! Layout space has its origin top-left with y growing downwards; the
//! canvas has it bottom-left. [`Scene::build`] applies the viewport and
//! flips y so the paint closure only draws.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::Span;
use ratatui::widgets::canvas::{Canvas, Circle, Line as CanvasLine};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

use ci_view::{GraphVariant, Point};

use crate::results::GraphView;

const ARROW_LENGTH: f64 = 12.0;
const ARROW_SPREAD: f64 = 0.45;
/// Gap between the parallel strands of a heavy edge, in screen units.
const STRAND_GAP: f64 = 3.0;

pub fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(r, g, b)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub center: Point,
    pub radius: f64,
    pub color: Color,
    pub lines: Vec<String>,
    pub pinned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneEdge {
    pub start: Point,
    pub end: Point,
    pub color: Color,
    /// Wing tips of the arrowhead at `end`, directed graphs only.
    pub arrow: Option<[Point; 2]>,
    pub label: Option<(Point, String)>,
    /// Parallel lines drawn for the edge; one per unit of stroke width.
    pub strokes: usize,
}

impl SceneEdge {
    /// The edge's lines, fanned out symmetrically around the centre line.
    pub fn strands(&self) -> Vec<(Point, Point)> {
        let (dx, dy) = (self.end.x - self.start.x, self.end.y - self.start.y);
        let len = (dx * dx + dy * dy).sqrt();
        if self.strokes <= 1 || len <= f64::EPSILON {
            return vec![(self.start, self.end)];
        }
        let (nx, ny) = (-dy / len, dx / len);
        let middle = (self.strokes - 1) as f64 / 2.0;
        (0..self.strokes)
            .map(|i| {
                let shift = (i as f64 - middle) * STRAND_GAP;
                (
                    Point::new(self.start.x + nx * shift, self.start.y + ny * shift),
                    Point::new(self.end.x + nx * shift, self.end.y + ny * shift),
                )
            })
            .collect()
    }
}

/// Everything needed to paint one graph, in canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<SceneNode>,
    pub edges: Vec<SceneEdge>,
}

impl Scene {
    pub fn build(view: &GraphView) -> Self {
        let config = view.layout.config();
        let (width, height) = (config.width, config.height);
        let positions = view.layout.positions();
        let scale = view.viewport.scale();
        let project = |p: Point| {
            let s = view.viewport.to_screen(p);
            Point::new(s.x, height - s.y)
        };

        let radius = view.graph.variant.node_radius() * scale;
        let nodes = view
            .graph
            .nodes
            .iter()
            .zip(positions)
            .enumerate()
            .map(|(i, (node, p))| SceneNode {
                center: project(*p),
                radius,
                color: rgb(node.color),
                lines: node.label_lines(),
                pinned: view.layout.is_pinned(i),
            })
            .collect();

        let styles = view.graph.edge_styles(positions);
        let edges = view
            .graph
            .edges
            .iter()
            .zip(styles)
            .map(|(edge, style)| {
                let start = project(style.start);
                let end = project(style.end);
                let arrow = match view.graph.variant {
                    GraphVariant::Directed if edge.source != edge.target => {
                        Some(arrow_wings(start, end))
                    }
                    _ => None,
                };
                let text = edge.label();
                SceneEdge {
                    start,
                    end,
                    color: rgb(edge.color),
                    arrow,
                    label: (!text.is_empty()).then(|| (project(style.label_at), text)),
                    strokes: edge.stroke_width().floor() as usize,
                }
            })
            .collect();

        Self {
            width,
            height,
            nodes,
            edges,
        }
    }
}

fn arrow_wings(start: Point, end: Point) -> [Point; 2] {
    let (dx, dy) = (start.x - end.x, start.y - end.y);
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f64::EPSILON {
        return [end, end];
    }
    let (ux, uy) = (dx / len, dy / len);
    let wing = |angle: f64| {
        let (sin, cos) = angle.sin_cos();
        Point::new(
            end.x + (ux * cos - uy * sin) * ARROW_LENGTH,
            end.y + (ux * sin + uy * cos) * ARROW_LENGTH,
        )
    };
    [wing(ARROW_SPREAD), wing(-ARROW_SPREAD)]
}

pub fn render_graph(frame: &mut Frame, area: Rect, view: &GraphView, title: &str) {
    let scene = Scene::build(view);
    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {title} ")),
        )
        .marker(Marker::Braille)
        .x_bounds([0.0, scene.width])
        .y_bounds([0.0, scene.height])
        .paint(|ctx| {
            for edge in &scene.edges {
                for (from, to) in edge.strands() {
                    ctx.draw(&CanvasLine::new(from.x, from.y, to.x, to.y, edge.color));
                }
                if let Some(wings) = edge.arrow {
                    for wing in wings {
                        ctx.draw(&CanvasLine::new(edge.end.x, edge.end.y, wing.x, wing.y, edge.color));
                    }
                }
            }
            for node in &scene.nodes {
                ctx.draw(&Circle {
                    x: node.center.x,
                    y: node.center.y,
                    radius: node.radius,
                    color: node.color,
                });
            }
            ctx.layer();
            for edge in &scene.edges {
                if let Some((at, text)) = &edge.label {
                    ctx.print(at.x, at.y, Span::styled(text.clone(), Style::default().fg(Color::Gray)));
                }
            }
            for node in &scene.nodes {
                let step = scene.height / 60.0;
                for (i, line) in node.lines.iter().enumerate() {
                    let y = node.center.y - i as f64 * step;
                    let color = if node.pinned { Color::Yellow } else { Color::White };
                    ctx.print(node.center.x, y, Span::styled(line.clone(), Style::default().fg(color)));
                }
            }
        });
    frame.render_widget(canvas, area);
}

/// Map a terminal cell inside a bordered canvas `area` to layout-space
/// screen coordinates (before the viewport is undone).
pub fn cell_to_screen(area: Rect, column: u16, row: u16, width: f64, height: f64) -> Option<Point> {
    let inner_w = area.width.saturating_sub(2);
    let inner_h = area.height.saturating_sub(2);
    if inner_w == 0 || inner_h == 0 {
        return None;
    }
    let left = area.x + 1;
    let top = area.y + 1;
    if column < left || row < top || column >= left + inner_w || row >= top + inner_h {
        return None;
    }
    let fx = (f64::from(column - left) + 0.5) / f64::from(inner_w);
    let fy = (f64::from(row - top) + 0.5) / f64::from(inner_h);
    Some(Point::new(fx * width, fy * height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ci_protocol::{EdgeDescriptor, GraphDescriptor};
    use ci_view::{ForceLayout, LayoutConfig, Viewport, VisualGraph, ZoomPolicy};

    fn view(variant: GraphVariant) -> GraphView {
        let descriptor = GraphDescriptor::new(
            ["A", "B"],
            vec![EdgeDescriptor::new("A", "B", "x"), EdgeDescriptor::new("A", "B", "y")],
        );
        let graph = VisualGraph::from_descriptor(&descriptor, variant);
        let layout = ForceLayout::new(&graph, LayoutConfig::for_variant(variant).with_seed(7));
        GraphView {
            graph,
            layout,
            viewport: Viewport::new(ZoomPolicy::Restricted),
        }
    }

    #[test]
    fn y_axis_is_flipped() {
        let v = view(GraphVariant::Plain);
        let scene = Scene::build(&v);
        let p = v.layout.positions()[0];
        assert_eq!(scene.nodes[0].center, Point::new(p.x, scene.height - p.y));
    }

    #[test]
    fn only_directed_graphs_get_arrows() {
        let plain = Scene::build(&view(GraphVariant::Plain));
        assert!(plain.edges.iter().all(|e| e.arrow.is_none()));

        let directed = Scene::build(&view(GraphVariant::Directed));
        assert_eq!(directed.edges.len(), 1);
        assert!(directed.edges[0].arrow.is_some());
        assert_eq!(directed.edges[0].label.as_ref().unwrap().1, "x, y");
    }

    #[test]
    fn merged_labels_thicken_the_edge() {
        let scene = Scene::build(&view(GraphVariant::Plain));
        let edge = &scene.edges[0];
        assert_eq!(edge.strokes, 2);

        let strands = edge.strands();
        assert_eq!(strands.len(), 2);
        let (a, b) = (strands[0], strands[1]);
        assert!((a.0.distance(b.0) - STRAND_GAP).abs() < 1e-9);
        assert!((a.1.distance(b.1) - STRAND_GAP).abs() < 1e-9);
        let centre = a.0.midpoint(b.0);
        assert!(centre.distance(edge.start) < 1e-9);
    }

    #[test]
    fn single_label_edge_is_one_line() {
        let descriptor = GraphDescriptor::new(["A", "B"], vec![EdgeDescriptor::new("A", "B", "x")]);
        let graph = VisualGraph::from_descriptor(&descriptor, GraphVariant::Plain);
        let layout = ForceLayout::new(&graph, LayoutConfig::for_variant(GraphVariant::Plain).with_seed(7));
        let scene = Scene::build(&GraphView {
            graph,
            layout,
            viewport: Viewport::new(ZoomPolicy::Restricted),
        });
        assert_eq!(scene.edges[0].strokes, 1);
        assert_eq!(scene.edges[0].strands(), vec![(scene.edges[0].start, scene.edges[0].end)]);
    }

    #[test]
    fn cells_outside_the_border_are_ignored() {
        let area = Rect::new(10, 5, 22, 12);
        assert_eq!(cell_to_screen(area, 10, 6, 900.0, 600.0), None);
        assert_eq!(cell_to_screen(area, 31, 6, 900.0, 600.0), None);
        let p = cell_to_screen(area, 11, 6, 900.0, 600.0).unwrap();
        assert!((p.x - 0.5 / 20.0 * 900.0).abs() < 1e-9);
        assert!((p.y - 0.5 / 10.0 * 600.0).abs() < 1e-9);
    }
}
