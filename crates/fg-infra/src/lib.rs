pub mod db;
pub mod http;
pub mod kv;
pub mod network;
pub mod sync;
pub mod time;

pub use db::repositories::DieselPendingUploadQueue;
pub use http::ReqwestTransport;
pub use kv::{FileKeyValueStore, InMemoryKeyValueStore};
pub use network::NetworkStatusFlag;
pub use sync::NotifyBackgroundSync;
pub use time::SystemClock;
