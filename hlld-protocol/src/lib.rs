// hlld-protocol - Wire grammar for the hlld line protocol
//
// This crate defines command encoding and response parsing, with no I/O

pub mod command;
pub mod error;
pub mod response;

// Re-export for convenience
pub use command::*;
pub use error::*;
pub use response::*;
