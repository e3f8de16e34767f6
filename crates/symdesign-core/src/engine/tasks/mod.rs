//! Computational phases of the point-cloud solve.
//!
//! Each task consumes or updates a [`crate::engine::cloud::PointCloud`] against a read-only
//! problem. Per-point work runs in parallel when the `parallel` feature is enabled and yields
//! the same result as the sequential path.

pub mod dedup;
pub mod materialize;
pub mod newton;
pub mod pareto;
pub mod tolerance;
