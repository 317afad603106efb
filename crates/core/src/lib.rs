pub mod config;
pub mod error;
pub mod job_type;
pub mod progress;
pub mod repository;

pub use config::Config;
pub use error::*;
pub use job_type::JobType;
pub use progress::*;
pub use repository::*;
