//! reqtrace artifact model
//!
//! Typed requirement-engineering artifacts and their version history.
//!
//! # Core Concepts
//!
//! - [`Epic`], [`Requirement`], [`UserStory`], [`TestCase`]: the inbound
//!   artifacts produced by upstream generators
//! - [`TraceArtifact`]: tagged union with total accessors over all four
//! - [`NodeType`] / [`Stage`]: closed enums for trace level and refinement mode
//! - [`VersionLog`]: append-only arena of immutable snapshots
//! - [`ContentHash`]: Blake3 fingerprint of a snapshot
//!
//! # Example
//!
//! ```rust
//! use reqtrace_artifact::{Requirement, Stage, TraceArtifact, VersionLog};
//!
//! let initial: TraceArtifact = Requirement::new("REQ-1", "Login", "Users sign in").into();
//! let mut log = VersionLog::new(initial);
//!
//! let refined = Requirement::new("REQ-1", "Login", "Users sign in with email and password")
//!     .with_criteria(["Valid credentials open the dashboard"]);
//! log.append(refined.into(), Stage::Improve, 0.35, 0.72);
//!
//! assert_eq!(log.len(), 2);
//! assert!(log.latest_changed());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod hash;
mod node_type;
mod version;

/// Concrete artifact types
pub mod types;

pub use artifact::{ArtifactError, TraceArtifact};
pub use hash::{ContentHash, HashError};
pub use node_type::{NodeType, Stage, UnknownVariant};
pub use types::{Epic, Requirement, StoryCriterion, TestCase, TestStep, UserStory};
pub use version::{ArtifactVersion, VersionLog};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
