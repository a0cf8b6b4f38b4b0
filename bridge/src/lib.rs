//! Bridges a legacy numeric-ID, password-login client onto an ATProto backend.
//!
//! The pieces, leaves first:
//! - [`did`] resolves handles to DIDs and PDS endpoints
//! - [`codec`] maps backend string identifiers to integers and back
//! - [`encryption`], [`encoding`] and [`jwt`] make up the credential vault
//! - [`session`] owns encrypted session records and transparent refresh

pub mod codec;
pub mod did;
pub mod encoding;
pub mod encryption;
pub mod errors;
pub mod jwt;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod xrpc;

pub use errors::ErrorKind;
pub use session::{LiveSession, SessionStore};
