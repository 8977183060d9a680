pub mod cards;
pub mod errors;
pub mod grading;
pub mod import;
pub mod interval;
pub mod models;
pub mod queue;
pub mod repo;
pub mod scheduler;

pub use cards::*;
pub use errors::*;
pub use grading::*;
pub use import::*;
pub use interval::*;
pub use models::*;
pub use queue::*;
pub use repo::*;
pub use scheduler::*;
