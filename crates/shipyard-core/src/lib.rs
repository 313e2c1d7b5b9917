//! Core types for shipyard.
//!
//! This crate defines the `shipyard.toml` schema ([`ShipyardConfig`]), the
//! placeholder templating engine ([`Placeholders`]), pnpm workspace discovery
//! ([`PnpmWorkspace`]) and the shared error taxonomy.

pub mod config;
pub mod error;
pub mod placeholder;
pub mod walk;
pub mod workspace;

pub use config::{
    BuildConfig, BuildStrategy, PipelineConfig, Platform, ServiceConfig, ShipyardConfig, Step,
};
pub use error::{Error, ErrorKind, Result};
pub use placeholder::{GitCli, GitRepositoryInfo, Placeholders, ResolverTable};
pub use walk::{EntryFilter, PatternSet, RepoWalker, WalkEntry};
pub use workspace::{DependencyKind, Package, PackageManifest, PnpmWorkspace};
