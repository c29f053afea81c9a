//! Domain model for the catalog.
//!
//! # Responsibility
//! - Define the records persisted by the data-access layer.
//! - Own field-level validation rules.
//!
//! # Invariants
//! - Models never touch storage; validation is a pure function.

pub mod category;
