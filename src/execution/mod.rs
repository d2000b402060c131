//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod scanner;

pub use engine::{BatchEngine, EventHandler, ExecutionEvent};
pub use executor::{EmitFn, VolumeExecutor};
pub use scanner::DatasetScanner;
