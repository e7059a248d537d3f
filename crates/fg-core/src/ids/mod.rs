mod id_macro;
mod nonce;
mod pending_upload_id;

pub use nonce::RequestNonce;
pub use pending_upload_id::PendingUploadId;
