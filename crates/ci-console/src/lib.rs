//! ConfInsights Console - terminal front end for the conformance backend
//!
//! The `confinsights` binary either runs the interactive console (pages for
//! credentials, log upload, column mapping and results) or executes one
//! backend operation and prints the outcome.

pub mod canvas;
pub mod commands;
pub mod config;
pub mod console;
pub mod logging;
pub mod nav;
pub mod results;

pub use config::{AppConfig, ConfigError};
pub use nav::{MappingOutcome, NavState, Page};
pub use results::{GraphSettings, JobEvent, JobMessage, Notice, ResultsController, TabContent, TabStatus};
