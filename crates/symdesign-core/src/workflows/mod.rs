//! # Workflows Module
//!
//! High-level entry points that run the complete design-space exploration.
//!
//! ## Overview
//!
//! A workflow takes a prepared problem and solver settings, runs every solve phase in a fixed
//! order with progress reporting, and returns materialized design records.
//!
//! - **Exploration Workflow** ([`explore`]) - Seeding, residual minimization, tolerance and
//!   pareto pruning, refinement rounds and materialization
//! - **Design Sessions** ([`session`]) - A caller-owned store of in-progress designs, each
//!   holding its mission, constraints, bounds and latest results

pub mod explore;
pub mod session;
