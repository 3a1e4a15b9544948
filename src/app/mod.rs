pub mod notifications;
pub mod store;
