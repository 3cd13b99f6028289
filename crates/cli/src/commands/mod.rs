//! Command implementations

pub mod applications;
pub mod config;
pub mod recommendations;
