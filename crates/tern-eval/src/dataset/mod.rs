mod config;
mod hooks;
mod manager;

pub use config::*;
pub use hooks::*;
pub use manager::*;
