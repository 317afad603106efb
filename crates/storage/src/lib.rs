//! Persistence for repoflow: the per-repository status store and the
//! repository record store.
//!
//! Both stores keep their data in memory and, when opened on a path, write
//! every change through to a JSON file so state survives restarts.

pub mod error;
pub mod json_file;
pub mod map;
pub mod repository;
pub mod status;

pub use error::StorageError;
pub use json_file::JsonFile;
pub use repository::{LocalRepositoryStore, RepositoryStore};
pub use status::{LocalStatusStore, StatusStore};
