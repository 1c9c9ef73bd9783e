//! Core domain types
//!
//! These types describe what crosses the boundary between the host workflow
//! engine, the executor and the DRMAA session. They carry no behavior beyond
//! small accessors; submission and reconciliation live in the executor.

pub mod job;
pub mod task;
pub mod template;
