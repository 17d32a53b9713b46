pub mod env;
pub mod grid;

pub use env::Env;
pub use grid::{Action, GridConfig, GridError, GridSnapshot, GridWorld, Position, Transition};
