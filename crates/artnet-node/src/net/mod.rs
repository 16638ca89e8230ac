//! Network plumbing for the node engine.
//!
//! # Sub-modules
//!
//! - **`interfaces`** – One-shot enumeration of the local interfaces and the
//!   per-interface subnet broadcast address the poll-reply broadcaster sends
//!   to.  Interface changes after startup are not observed.
//!
//! - **`retry`** – The bounded exponential-backoff policy applied when a
//!   sender's outbound socket fails to open.

pub mod interfaces;
pub mod retry;

pub use interfaces::{broadcast_addr, discover, InterfaceSet, Ipv4Interface, Ipv6Interface};
pub use retry::{bind_ephemeral_with_retry, RetryPolicy};
