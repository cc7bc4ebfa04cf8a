pub mod engine;
pub mod model;

pub use engine::*;
pub use model::*;
