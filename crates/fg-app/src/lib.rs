//! Folio gateway services
//!
//! This crate wires the pure policies of `fg-core` to the ports into the
//! long-lived services the application talks to.

pub mod cache_store;
pub mod gateway;
pub mod image_registry;
pub mod offline_queue;
pub mod preload;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache_store::{CacheStore, SweepReport};
pub use gateway::{GatewayClient, GatewayDeps, GatewaySettings, ReplayReport, RequestOptions};
pub use image_registry::ImageRegistry;
pub use offline_queue::{OfflineUploadQueue, UPLOAD_SYNC_TAG};
pub use preload::{PreloadScheduler, PreloadTick};
