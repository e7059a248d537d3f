//! Port interfaces for the gateway services
//!
//! Ports define the contract between the gateway logic and infrastructure
//! implementations. This follows Hexagonal Architecture principles, so the
//! request pipeline can run against an in-memory store and a scripted
//! transport in tests and against SQLite and reqwest in production.

mod background_sync;
mod clock;
mod cookie;
mod kv_store;
mod network;
mod transport;
pub mod upload_queue;

pub use background_sync::BackgroundSyncPort;
pub use clock::ClockPort;
pub use cookie::CookieSourcePort;
pub use kv_store::KeyValueStorePort;
pub use network::NetworkStatusPort;
pub use transport::HttpTransportPort;
pub use upload_queue::PendingUploadQueuePort;
