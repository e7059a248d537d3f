//! Response cache model and TTL policy.

mod entry;
mod key;
mod policy;

pub use entry::{CacheEntry, TtlClass};
pub use key::{path_in_family, resource_family, CacheKey};
pub use policy::TtlPolicy;
