//! Pure lighting-domain logic: universe addressing and the channel buffer.
//!
//! **Dependency rule**: nothing in this module may touch sockets, timers, or
//! the codec.  The node engine composes these types; they never reach out.

pub mod channels;
pub mod universe;

pub use channels::{ChannelBuffer, ChannelError};
pub use universe::{AddressError, UniverseAddress};
