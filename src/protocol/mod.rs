//! Relay protocol and session state machine.
//!
//! # Message Flow
//!
//! ```text
//! Web app                          Relay                          Wallet
//!    |                               |                               |
//!    |  (request URL shown as QR: topic, config, pk_a)               |
//!    |                               |<------ handshake {pk_b} ------|
//!    |<------ handshake {pk_b} ------|                               |
//!    |------ encrypted(hello) ------>|------ encrypted(hello) ------>|
//!    |                               |<----- encrypted(accept) ------|
//!    |<----- encrypted(accept) ------|                               |
//!    |                               |<-- encrypted(done {proof}) ---|
//!    |<-- encrypted(done {proof}) ---|                               |
//! ```
//!
//! ## State Machine
//!
//! | State | Description | Valid Transitions |
//! |-------|-------------|-------------------|
//! | `Created` | Session registered | → AwaitingHandshake, Established |
//! | `AwaitingHandshake` | Relay connected | → Established |
//! | `Established` | Shared secret agreed | → GeneratingProof, Rejected, Completed |
//! | `GeneratingProof` | User accepted | → Completed, Rejected |
//! | `Completed` | Proof delivered | (terminal) |
//! | `Rejected` | User declined | (terminal) |
//! | `Failed` | Wallet error | (terminal) |
//! | `Cancelled` | Caller cancelled | (terminal) |
//!
//! Any live state may also move to `Failed` or `Cancelled`.
//!
//! ## Error Policy
//!
//! Malformed frames, frames that do not fit the current state and frames that
//! fail to decrypt are logged and ignored. The session stays as it was and
//! keeps accepting valid frames.

mod handler;
mod message;
mod state;

pub use handler::{Outcome, ProtocolHandler, SessionView};
pub use message::{
    InnerMessage, RelayMessage, RpcMessage, JSONRPC_VERSION, METHOD_ACCEPT, METHOD_DONE,
    METHOD_ENCRYPTED, METHOD_ERROR, METHOD_HANDSHAKE, METHOD_HELLO, METHOD_REJECT,
};
pub use state::SessionState;
