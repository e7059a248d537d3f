use serde::{Deserialize, Serialize};

use super::id_macro::impl_id;

/// Per-request unique token sent as `x-nonce`.
///
/// The backend rejects a nonce it has already seen inside its replay window,
/// so a fresh value is generated for every outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestNonce(String);

impl_id!(RequestNonce);
