mod export;
mod latex;
mod loader;
mod stats;
mod types;
mod writer;

pub use export::*;
pub use latex::*;
pub use loader::*;
pub use stats::*;
pub use types::*;
pub use writer::*;
