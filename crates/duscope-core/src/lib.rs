/// duscope core — concurrent directory analysis and its data model.
///
/// This crate contains the analyzer and everything it builds on, with no
/// terminal or UI dependencies. Front ends read the shared tree and the
/// progress record while a walk is running.
///
/// # Modules
///
/// - [`model`] — Arena-allocated file tree, aggregation, sorting, removal.
/// - [`scanner`] — Parallel analyzer with progress, cancellation, and refresh.
/// - [`filter`] — Exact-path ignore list.
/// - [`platform`] — Mount table parsing and device usage.
/// - [`frontend`] — The trait every front end implements.
/// - [`error`] — Typed errors of the operations above.
pub mod error;
pub mod filter;
pub mod frontend;
pub mod model;
pub mod platform;
pub mod scanner;
