//! Wire encodings for the pushmask relay.
//!
//! Two encodings, both independent of any transport:
//! - [`binpack`]: a compact self-describing binary map encoding. Relay
//!   messages are maps of short keys to text, bytes, or nested maps; binpack
//!   keeps them far smaller than JSON.
//! - [`base128`]: a 7-bit text-safe encoding for transports that only carry
//!   strings (FCM data payloads). Expands data by exactly 8/7.

pub mod base128;
pub mod binpack;

pub use binpack::{CodecError, Value};
