//! # docpress-render
//!
//! Page templates for docpress.
//!
//! This crate wraps rendered document bodies in full HTML pages using Askama.

pub mod templates;

pub use templates::{IndexTemplate, PostEntry, PostTemplate, SiteContext};
