pub mod api;
pub mod chat;
pub mod coordinator;
pub mod dashboard;
pub mod reconciler;
pub mod scheduler;
pub mod views;
