//! # Core Module
//!
//! Stateless building blocks shared by the solver and its callers.
//!
//! - **Expressions** ([`expr`]) - Tagged expression trees, evaluation, residuals, the
//!   [`expr::Surrogate`] capability interface and the text parser
//! - **Missions** ([`mission`]) - Mission stages and the mission-parameter resolver
//! - **Ocean Models** ([`ocean`]) - Seawater pressure, density and viscosity relationships
//! - **Records** ([`record`]) - Materialized design points
//! - **File I/O** ([`io`]) - Tabular persistence of design records

pub mod expr;
pub mod io;
pub mod mission;
pub mod ocean;
pub mod record;
