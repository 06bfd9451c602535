//! Per-camera settings persistence.
//!
//! This crate provides:
//! - The `SettingsRepository` load/save contract
//! - A JSON file store with atomic full-record replace
//! - A reader for legacy `key = value` settings files
//! - An in-memory store for tests

pub mod error;
pub mod file_store;
pub mod legacy;
pub mod memory;
pub mod repository;

pub use error::{StorageError, StorageResult};
pub use file_store::FileConfigStore;
pub use memory::MemoryConfigStore;
pub use repository::SettingsRepository;
