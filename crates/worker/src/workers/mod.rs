mod clone;
mod delete;
mod index;

pub use clone::CloneWorker;
pub use delete::DeleteWorker;
pub use index::IndexWorker;
