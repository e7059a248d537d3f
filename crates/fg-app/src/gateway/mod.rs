//! The gateway client: every backend call goes through here.
//!
//! A request is classified, answered from the image registry or the cache
//! when possible, otherwise signed, sent and its response folded into one of
//! the outcomes of [`GatewayResponse`](fg_core::GatewayResponse) or a
//! [`GatewayError`](fg_core::GatewayError).

mod classify;
mod client;
mod inflight;
mod replay;
mod upload;

pub use client::{GatewayClient, GatewayDeps, GatewaySettings, RequestOptions};
pub use replay::ReplayReport;
