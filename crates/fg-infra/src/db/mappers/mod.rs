mod pending_upload_mapper;

pub use pending_upload_mapper::PendingUploadRowMapper;
