//! ConfInsights Protocol - endpoint registry and wire types
//!
//! Describes the surface of the remote conformance-checking backend:
//! where each operation lives, which analysis variants exist, and the
//! JSON shapes exchanged with it. No I/O happens in this crate.

pub mod analysis;
pub mod constants;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod mapping;
pub mod payload;

pub use analysis::*;
pub use constants::*;
pub use credentials::BackendCredentials;
pub use endpoints::ApiEndpoints;
pub use error::*;
pub use mapping::*;
pub use payload::*;
