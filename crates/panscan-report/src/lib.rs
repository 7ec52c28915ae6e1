//! # panscan-report
//!
//! Turns aggregated scan results into the canonical report, its wire
//! projection, and the CSV export. The internal [`model::Report`] is the
//! hashable form; the wire shape is derived from it, never built in
//! parallel.

pub mod builder;
pub mod export;
pub mod model;
pub mod wire;

pub use builder::ReportBuilder;
pub use model::Report;
pub use wire::{check_for_leaks, to_wire, WireReport};
