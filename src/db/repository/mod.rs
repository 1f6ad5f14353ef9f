//! Repository layer — entity-scoped database operations.

mod doctor;
mod member;

pub use doctor::*;
pub use member::*;
