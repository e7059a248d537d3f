mod pending_upload_row;

pub use pending_upload_row::{NewPendingUploadRow, PendingUploadRow};
