//! # fg-core
//!
//! Core domain models, policies and ports for the Folio gateway client.
//!
//! This crate contains pure request/caching policy without any infrastructure
//! dependencies. Everything that touches the network, the disk or the clock is
//! expressed as a port in [`ports`].

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod ids;
pub mod image;
pub mod ports;
pub mod response;
pub mod signing;
pub mod upload;

// Re-export commonly used types at the crate root
pub use cache::{CacheEntry, CacheKey, TtlClass, TtlPolicy};
pub use config::GatewayConfig;
pub use error::{BenignCode, GatewayError, QueueError, TransportError};
pub use http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, MultipartPart};
pub use ids::{PendingUploadId, RequestNonce};
pub use image::{canonicalize_image_url, ImageHints, ImageRegistryEntry};
pub use response::{GatewayResponse, ResponseSource};
pub use signing::{RequestSigner, SignedRequest};
pub use upload::{NewPendingUpload, PendingUpload, UploadFile, UploadFingerprint, UploadOutcome};
