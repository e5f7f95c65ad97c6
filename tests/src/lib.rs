//! fngate Testing Framework
//!
//! Scripted stand-ins for the invocation service and fallback providers, so
//! gateway behavior can be tested without a live function endpoint.

pub mod fallback;
pub mod transport;

pub use fallback::StaticFallback;
pub use transport::{EchoTransport, MockReply, MockTransport};
