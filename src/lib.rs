pub mod cache;
pub mod error;
pub mod github;
pub mod metrics;
pub mod server;
pub mod util;
