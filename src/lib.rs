//! Folio gateway host: configuration, tracing and dependency wiring around
//! the `fg-app` services.

pub mod bootstrap;
