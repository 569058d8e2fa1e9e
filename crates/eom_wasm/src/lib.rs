//! Browser bindings for `eom_core`.
//!
//! The front end builds one `WasmEomSolver` per equation/method selection and calls
//! `solve` whenever the initial condition, window or step size changes.

mod solver;

pub use solver::WasmEomSolver;
