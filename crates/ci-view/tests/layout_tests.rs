use std::time::Duration;

use ci_protocol::{EdgeDescriptor, GraphDescriptor};
use ci_view::{
    ForceLayout, GraphVariant, LayoutConfig, Point, StopReason, ViewError, Viewport, VisualGraph,
    ZoomPolicy, ZoomTrigger,
};

fn chain(n: usize) -> VisualGraph {
    let ids: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
    let edges = ids
        .windows(2)
        .map(|w| EdgeDescriptor::new(w[0].clone(), w[1].clone(), "1"))
        .collect();
    VisualGraph::from_descriptor(&GraphDescriptor::new(ids, edges), GraphVariant::Directed)
}

fn in_bounds(layout: &ForceLayout) -> bool {
    let cfg = layout.config();
    layout.positions().iter().all(|p| {
        p.x >= cfg.padding
            && p.x <= cfg.width - cfg.padding
            && p.y >= cfg.padding
            && p.y <= cfg.height - cfg.padding
    })
}

#[test]
fn test_seeded_layouts_are_reproducible() {
    let graph = chain(5);
    let a = ForceLayout::new(&graph, LayoutConfig::default().with_seed(7));
    let b = ForceLayout::new(&graph, LayoutConfig::default().with_seed(7));
    assert_eq!(a.positions(), b.positions());
}

#[test]
fn test_initial_positions_inside_padded_viewport() {
    let layout = ForceLayout::new(&chain(20), LayoutConfig::default().with_seed(1));
    assert!(in_bounds(&layout));
}

#[test]
fn test_layout_converges_and_stays_in_bounds() {
    let mut layout = ForceLayout::new(
        &chain(6),
        LayoutConfig::default()
            .with_seed(3)
            .with_budget(Duration::from_secs(30)),
    );
    assert_eq!(layout.run(), StopReason::Converged);
    assert!(layout.is_settled());
    assert!(in_bounds(&layout), "forces must not push nodes past the padding");
    assert!(layout.positions().iter().all(|p| p.x.is_finite() && p.y.is_finite()));
}

#[test]
fn test_zero_budget_stops_immediately() {
    let mut layout = ForceLayout::new(&chain(3), LayoutConfig::default().with_seed(3));
    assert_eq!(layout.run_for(Duration::ZERO), StopReason::Budget);
    assert_eq!(layout.ticks(), 0);
}

#[test]
fn test_pinned_node_does_not_move() {
    let mut layout = ForceLayout::new(&chain(4), LayoutConfig::default().with_seed(9));
    let at = Point::new(200.0, 200.0);
    layout.pin(1, at).unwrap();
    for _ in 0..50 {
        layout.tick();
    }
    assert_eq!(layout.positions()[1], at);
    assert!(layout.is_pinned(1));

    layout.release(1).unwrap();
    assert!(!layout.is_pinned(1));
}

#[test]
fn test_dragging_reheats_simulation() {
    let mut layout = ForceLayout::new(
        &chain(3),
        LayoutConfig::default()
            .with_seed(2)
            .with_budget(Duration::from_secs(30)),
    );
    layout.run();
    layout.drag_to(0, Point::new(100.0, 100.0)).unwrap();
    assert!(layout.alpha() >= 0.3);
}

#[test]
fn test_pin_out_of_range() {
    let mut layout = ForceLayout::new(&chain(2), LayoutConfig::default());
    assert_eq!(
        layout.pin(5, Point::default()),
        Err(ViewError::NodeIndex(5))
    );
}

#[test]
fn test_restricted_zoom_clamps_scale() {
    let mut viewport = Viewport::new(ZoomPolicy::Restricted);
    let anchor = Point::new(450.0, 300.0);
    assert!(viewport.zoom_by(10.0, anchor, ZoomTrigger::Wheel));
    assert_eq!(viewport.scale(), 2.0);
    assert!(viewport.zoom_by(0.01, anchor, ZoomTrigger::Wheel));
    assert_eq!(viewport.scale(), 1.0);
}

#[test]
fn test_restricted_zoom_ignores_double_click() {
    let mut viewport = Viewport::new(ZoomPolicy::Restricted);
    assert!(!viewport.zoom_by(1.5, Point::default(), ZoomTrigger::DoubleClick));
    assert!(!viewport.pan(10.0, 0.0, ZoomTrigger::Touch));
    assert_eq!(viewport.scale(), 1.0);
    assert!(viewport.pan(10.0, 0.0, ZoomTrigger::MouseDown));
    assert_eq!(viewport.translate(), Point::new(10.0, 0.0));
}

#[test]
fn test_zoom_keeps_anchor_fixed() {
    let mut viewport = Viewport::new(ZoomPolicy::Free);
    let anchor = Point::new(100.0, 50.0);
    let before = viewport.to_world(anchor);
    viewport.zoom_by(1.5, anchor, ZoomTrigger::Wheel);
    let after = viewport.to_world(anchor);
    assert!((before.x - after.x).abs() < 1e-9);
    assert!((before.y - after.y).abs() < 1e-9);
}
