//! # themectl Registry Library
//!
//! Discovery, validation and lifecycle management for theme packages stored
//! on disk. A theme is a directory with a `theme.json` manifest; the registry
//! scans the themes root into a cached catalog, tracks which theme is active
//! and installs, clones and deletes themes safely.
//!
//! ## Modules
//!
//! - [`manager`] - Wiring object; start here
//! - [`query`] - Read-only projections over the catalog
//! - [`lifecycle`] - Install, activate, clone, delete, bulk delete
//! - [`catalog`] - Catalog snapshots and the cache in front of the scanner
//! - [`scanner`] - Directory scanning and structural validation
//! - [`manifest`] - Manifest parsing, lookup and rewriting
//! - [`pointer`] - Active theme slot, durable stores and the render pointer
//! - [`archive`] / [`remote`] - Install sources
//! - [`backup`] - Timestamped theme backups
//! - [`requirements`] - Platform version requirement checks
//! - [`config`] - Registry configuration with defaults
//! - [`error`] - Error type shared by every operation

pub mod archive;
pub mod backup;
pub mod bulk;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fs_utils;
pub mod lifecycle;
pub mod locks;
pub mod manager;
pub mod manifest;
pub mod pointer;
pub mod query;
pub mod remote;
pub mod requirements;
pub mod scanner;
pub mod validation;

pub use catalog::{Catalog, ThemeMetadata, ThemeRecord};
pub use config::{InstallSource, RegistryConfig};
pub use error::{ThemeError, ThemeResult};
pub use lifecycle::InstalledTheme;
pub use manager::ThemeManager;
