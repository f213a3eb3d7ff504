pub mod case;
pub mod dataset;
pub mod errors;
pub mod evaluators;
pub mod persist;
pub mod report;
pub mod runner;

// Re-export main components for easier use
pub use dataset::DatasetManager;
pub use errors::{EvalError, EvalResult};
pub use report::load_run;
pub use runner::{evaluate_cases, EvaluateOptions, Evaluator, Task};
