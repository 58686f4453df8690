//! Core HTTP protocol abstractions.
//!
//! This module provides the message types the parser fills and the writer drains,
//! together with body abstractions and the error types of the crate.
//!
//! # Architecture
//!
//! - **Messages**: [`Request`] and [`Response`], both implementing [`Message`]
//! - **Bodies** ([`body`]): [`Body`], [`BodySource`], [`BodySink`] and the default [`MemoryBody`]
//! - **Headers** ([`header`]): header-safe character checks and header value helpers
//! - **Errors**: [`HttpError`], [`ParseError`] and [`SendError`]

mod message;
pub use message::BodyPlan;
pub use message::Message;
pub use message::PayloadSize;

mod request;
pub use request::Request;

mod response;
pub use response::Response;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
pub use body::{Body, BodySink, BodySource, MemoryBody};

pub mod header;

mod version;
pub use version::{parse_version, version_str};
