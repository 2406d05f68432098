//! Self-hosted application update flow: confirm with the user, download the
//! package through a host download service, poll its progress, verify the
//! MD5 checksum and hand the package to the platform installer.

pub mod application;
pub mod config;
pub mod domain;
pub mod host;
pub mod persistence;
pub mod ui;
pub mod utils;

pub use application::UpdateOrchestrator;
pub use config::UpdaterConfig;
pub use domain::{AppError, TaskHandle, TaskStatus, UpdateDescriptor};
