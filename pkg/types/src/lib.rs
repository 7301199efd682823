//! Wire types shared by the ttlgc controller, API and CLI.

pub mod config;
pub mod event;
pub mod policy;
pub mod resource;
pub mod validate;
