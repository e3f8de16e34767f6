//! Reading and writing of design results.
//!
//! Records are exchanged as CSV tables whose columns are the problem's unknowns followed by
//! its derived values.

pub mod table;
