pub mod analysis;
pub mod config;
pub mod error;
pub mod generation;
pub mod input;
pub mod pipeline;
pub mod providers;

pub use error::OptimizerError;
