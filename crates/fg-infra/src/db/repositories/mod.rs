mod pending_upload_repo;

pub use pending_upload_repo::DieselPendingUploadQueue;
