//! # Desktop Bridge Implementations
//!
//! Native decode engine binding for desktop platforms (Linux, Windows).
//!
//! ## Overview
//!
//! This crate provides:
//! - [`status`] - the DMS library's status codes, names and descriptions
//! - `LibDmsEngine` - a [`DecodeEngine`](bridge_traits::DecodeEngine) over the
//!   vendor's C library
//!
//! ## Feature Flags
//!
//! - `libdms`: Link the native library and expose `LibDmsEngine`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LibDmsConfig, LibDmsEngine};
//! use core_runtime::CoreConfig;
//! use std::sync::Arc;
//!
//! let engine = LibDmsEngine::new(LibDmsConfig {
//!     width: 1998,
//!     height: 1080,
//!     ..Default::default()
//! });
//! let config = CoreConfig::builder().engine(Arc::new(engine)).build()?;
//! ```

pub mod status;

#[cfg(feature = "libdms")]
mod libdms;

#[cfg(feature = "libdms")]
pub use libdms::{LibDmsConfig, LibDmsEngine};
