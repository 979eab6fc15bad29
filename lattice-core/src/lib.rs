#![forbid(unsafe_code)]

//! Shared core for LATTICE: the wire codec, data model, configuration,
//! error handling, and the record-sink interface. This crate has no
//! network sockets of its own — it is the leaf dependency of the
//! responder, probe engine, and analyzer crates.

pub mod config;
pub mod error;
pub mod geo;
pub mod secret;
pub mod sink;
pub mod stats;
pub mod types;
pub mod wire;

pub use error::{Error, Result};
