// Library exports for engage-server
// The engage CLI drives the same pipeline and review machine through these modules

pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod normalize;
pub mod pacing;
pub mod pipeline;
pub mod pool;
pub mod resolver;
pub mod review;
pub mod selection;
pub mod state;
pub mod sync;
pub mod timestamps;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;
