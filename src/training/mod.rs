//! Training module: the epoch loop and dataset evaluation

pub mod evaluator;
pub mod trainer;

pub use evaluator::{evaluate, EvalReport};
pub use trainer::{train, TrainReport};
