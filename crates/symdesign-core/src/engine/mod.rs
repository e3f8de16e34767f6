//! # Engine Module
//!
//! The numerical machinery behind design-space exploration.
//!
//! ## Overview
//!
//! A [`constraints::ConstraintSet`] collects the named equations, derived values and pareto
//! objectives of a design. Once bounds and resolutions are attached it is frozen into a
//! [`constraints::Problem`], which stays read-only for the whole solve. The solver then works on
//! a [`cloud::PointCloud`]: a flat batch of candidate points that the tasks refine and prune.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Solver constants, the builder, and their validation
//! - **Constraints** ([`constraints`]) - Constraint assembly and problem preparation
//! - **Point Cloud** ([`cloud`]) - Sampling, mutation and point storage
//! - **Progress Monitoring** ([`progress`]) - Progress callbacks for front ends
//! - **Error Handling** ([`error`]) - Engine-specific error types
//! - **Tasks** (`tasks`) - Newton refinement, tolerance pruning, deduplication, pareto
//!   pruning and materialization

pub mod cloud;
pub mod config;
pub mod constraints;
pub(crate) mod context;
pub mod error;
pub mod progress;
pub(crate) mod tasks;
