pub mod conversations;
pub mod report;
