//! Needle region editor and needle/screenshot diff viewer.
//!
//! The engines ([`shapes::ShapeCanvas`], [`diff::NeedleDiff`],
//! [`editor::NeedleEditor`]) paint into RGBA frame buffers and know nothing
//! about windows; [`app`] puts them on screen with eframe.

pub mod app;
pub mod config;
pub mod diff;
pub mod editor;
pub mod error;
pub mod loader;
pub mod logging;
pub mod needle;
pub mod raster;
pub mod region;
pub mod save;
pub mod shapes;

pub use error::{NeedleError, Result};
