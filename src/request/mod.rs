//! Credential requests.
//!
//! - [`credential`]: the credential keys a wallet can attest to
//! - [`config`]: predicates and the serialized request configuration
//! - [`builder`]: the fluent builder and the [`RequestDescriptor`] it yields
//!
//! # Request URL
//!
//! ```text
//! {request_base_url}?d={domain}&t={topic}&c={config}&s={service}&p={pubkey}
//! ```
//!
//! `c` and `s` are URL-safe base64 of JSON, `p` is the session's X25519
//! public key in hex.

pub mod builder;
pub mod config;
pub mod credential;

pub use builder::{CredentialConfigBuilder, RequestDescriptor, Subscriptions};
pub use config::{AmlCheck, CredentialConfig, Predicate, RequestConfig};
pub use credential::{Credential, CredentialValue, ValueKind};
