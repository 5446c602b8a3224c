#![forbid(unsafe_code)]

pub mod codec;
pub mod message;

pub use codec::{RequestStream, ResponseSink, WireError};
pub use message::{Command, Request, Response};
