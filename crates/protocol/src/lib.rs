pub mod command;
pub mod constants;
pub mod fields;
pub mod inbound;

// Re-export primary types for convenience.
pub use command::{Command, CommandError, StartParams, encode};
pub use constants::ControlKind;
pub use inbound::{ControlMessage, InboundEvent, ParseError, WireUnit, parse};
