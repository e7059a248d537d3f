/// Host-reported connectivity.
pub trait NetworkStatusPort: Send + Sync {
    fn is_online(&self) -> bool;
}
