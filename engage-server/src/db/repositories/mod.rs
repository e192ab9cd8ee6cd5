mod target_repository;
mod pool_repository;
mod review_repository;

pub use target_repository::TargetRepository;
pub use pool_repository::{pool_entry, PoolRepository};
pub use review_repository::ReviewRepository;
