pub mod admin;
pub mod attribution;
pub mod config;
pub mod event_manager;
pub mod notifier;
pub mod reports;
pub mod store;
pub mod tracker;
