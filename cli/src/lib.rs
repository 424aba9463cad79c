//! # themectl
//!
//! Command-line host for the theme registry: loads `themectl.toml` plus
//! `THEMECTL_*` environment overrides, sets up logging and dispatches
//! subcommands to a [`registry::ThemeManager`].
//!
//! ## Modules
//!
//! - [`commands`] - Argument definitions and command execution
//! - [`config`] - Configuration discovery and loading
//! - [`error`] - Error type shown to the user
//! - [`logger`] - Logger setup

pub mod commands;
pub mod config;
pub mod error;
pub mod logger;

pub use error::AppError;
