//! # bugsnag-cli
//!
//! Discovers build artifacts (native symbol files, dSYMs, mapping files,
//! source maps), reads their identity from the artifacts themselves and
//! uploads them for crash symbolication.
//!
//! ## Layers
//!
//! - [`files`], [`readers`] and [`tools`] find artifacts and read metadata
//!   from them, either natively or through external binaries.
//! - [`merge`] composes command-line, manifest and environment values into
//!   one [`model::BuildDescriptor`].
//! - [`resolvers`] turn a verb's options into [`upload::UploadPlan`]s.
//! - [`upload`] sends plans to the [`endpoint`] for each artifact kind.
//!
//! ## Usage
//!
//! ```bash
//! bugsnag-cli upload android-aab app-release.aab
//! bugsnag-cli upload dsym --dry-run build/
//! bugsnag-cli create-build --version-name 1.2.0 .
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod endpoint;
pub mod error;
pub mod files;
pub mod merge;
pub mod model;
pub mod readers;
pub mod resolvers;
pub mod tools;
pub mod upload;

// Re-export main types for public API
pub use cli::Args;
pub use endpoint::{Endpoint, Route, Service};
pub use error::{AppError, Result};
pub use model::{ArtifactKind, BuildDescriptor};
pub use resolvers::ResolveContext;
pub use upload::{UploadOptions, UploadPlan, Uploader};
