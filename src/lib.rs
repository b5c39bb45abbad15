#![forbid(unsafe_code)]
//! Static site build pipeline.
//!
//! Pages are rendered from Jinja templates, stylesheets are compiled from SCSS
//! and scripts are bundled into one file. Each of the three [`Target`]s owns
//! its own output tree: `.dev` is served with live reload while sources are
//! watched, `build` and `docs` are production exports with purged, minified
//! assets.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kasane::{Config, Entry, pipeline};
//!
//! # fn main() -> Result<(), kasane::KasaneError> {
//! let config = Arc::new(Config::load(None)?);
//! let diagnostics = pipeline::run(config, Entry::Build)?;
//! println!("{} files written", diagnostics.written());
//! # Ok(())
//! # }
//! ```

pub mod blueprint;
pub mod config;
mod core;
mod error;
pub mod executor;
pub mod html;
pub mod pipeline;
mod purge;
pub mod runner;
pub mod task;
mod utils;

pub use crate::blueprint::{Pipeline, Step};
pub use crate::config::{Config, Target};
pub use crate::core::Environment;
pub use crate::error::*;
pub use crate::executor::Diagnostics;
pub use crate::pipeline::Entry;
pub use crate::utils::init_logging;
