pub mod health;
pub mod policies;
pub mod resources;
