pub mod config;
pub mod event;
pub mod format;
pub mod handler;
pub mod init;
pub mod layer;
pub mod overflow;
pub mod publisher;
pub mod record;

#[cfg(feature = "kafka")]
pub mod kafka;
