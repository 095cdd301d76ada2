pub mod chat;
pub mod config;
pub mod domains;
pub mod feeds;
pub mod metrics;
pub mod recommendation;
pub mod timestamp;
