//! # SymDesign Core Library
//!
//! A constraint-based design-space explorer for vehicles assembled from interchangeable parts.
//! Given a set of physical and mission relationships over named unknowns, the library searches
//! the bounded design space with a stochastic point cloud and returns numerically valid,
//! pareto-optimal design points.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless models: expression trees and their evaluator,
//!   the text expression parser, ocean environment models, mission stages with the
//!   mission-parameter resolver, and design table I/O.
//!
//! - **[`engine`]: The Logic Core.** The constraint assembler, the point cloud, and the
//!   numerical tasks of the solve pipeline (residual minimization, tolerance pruning,
//!   deduplication, pareto pruning, materialization).
//!
//! - **[`workflows`]: The Public API.** The fixed exploration pipeline and the caller-owned
//!   design session store.

pub mod core;
pub mod engine;
pub mod workflows;
