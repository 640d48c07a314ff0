//! Use-case services over the host boundary.
//!
//! # Responsibility
//! - Orchestrate sync primitives into per-instance APIs.
//! - Keep host adapters decoupled from graph construction details.

pub mod parameters_ui;

pub use parameters_ui::ParametersUi;
