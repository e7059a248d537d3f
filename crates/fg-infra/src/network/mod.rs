mod status_flag;

pub use status_flag::NetworkStatusFlag;
