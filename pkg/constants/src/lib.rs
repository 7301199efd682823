//! Centralized constants for the ttlgc project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod gc;
pub mod network;
pub mod paths;
pub mod state;
