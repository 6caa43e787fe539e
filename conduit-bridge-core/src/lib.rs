//! Wire primitives for the conduit HTTP bridge.
//!
//! This crate provides shared types and functions used by both the server
//! (`conduit-bridge`) and client (`conduit-bridge-client`) crates.
//!
//! ## Modules
//!
//! - [`frame`]: Length-prefixed frame encoding and read-to-completion decoding
//! - [`envelope`]: Error envelope header conventions and the `ApiError` message
//! - [`error`]: Frame decoding errors

pub mod envelope;
pub mod error;
pub mod frame;

pub use envelope::*;
pub use error::*;
pub use frame::*;

pub use prost;
