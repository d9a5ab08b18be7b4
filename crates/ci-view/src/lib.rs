//! ConfInsights View - presentation models for analysis results
//!
//! Turns backend graph and table descriptors into something a renderer can
//! draw: merged multi-edges, force-directed node positions, label offsets,
//! a zoomable viewport and normalized table rows.

pub mod graph;
pub mod layout;
pub mod table;
pub mod viewport;

pub use graph::{EdgeStyle, GraphVariant, MergedEdge, Point, VisualGraph, VisualNode};
pub use layout::{ForceLayout, LayoutConfig, StopReason};
pub use table::TableView;
pub use viewport::{Viewport, ZoomPolicy, ZoomTrigger};

/// Errors produced by the view layer.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ViewError {
    #[error("node '{0}' is not part of the graph")]
    UnknownNode(String),

    #[error("node index {0} is out of range")]
    NodeIndex(usize),
}
