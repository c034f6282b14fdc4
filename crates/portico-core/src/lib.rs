//! # Portico Core
//!
//! Core types and traits for the Portico HTTP front-end.
//!
//! This crate provides the foundational types used throughout Portico:
//!
//! - [`RuntimeHandle`] - Handle to the shared concurrency runtime, tagged with its ownership
//! - [`RuntimeOwnership`] - Whether this process must close the runtime it booted on
//! - [`RuntimeSupplier`] - How a boot attempt obtains its runtime
//! - [`PorticoOptions`] - Validated process-level options
//! - [`BootError`] - Boot failure taxonomy
//! - [`ShutdownSignal`] - Trigger-once coordination primitive for stop paths

#![doc(html_root_url = "https://docs.rs/portico-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod options;
mod runtime;
mod shutdown;

pub use error::{
    BootError, BootResult, Capability, ConfigurationError, PluginError, RuntimeCloseError,
};
pub use options::PorticoOptions;
pub use runtime::{
    BoxFuture, ExternalRuntimeSupplier, OwnedRuntimeSupplier, Runtime, RuntimeHandle,
    RuntimeOwnership, RuntimeSupplier, TokioRuntime,
};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownReceiver, ShutdownSignal};
