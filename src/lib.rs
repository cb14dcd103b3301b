//! A fluent HTTP request builder.
//!
//! [`RequestBuilder`] accumulates headers, parameters, cookies, file
//! attachments, body, and timeout through chained calls, deduplicating
//! parameters and headers by case-insensitive name with replace-in-place
//! semantics, then materializes a [`SendableRequest`](types::SendableRequest)
//! that a [`sender::HttpSender`] can execute.

pub mod builder;
pub mod cookies;
pub mod error;
pub mod file;
pub mod parameter;
pub mod sender;
pub mod types;
mod chained_reader;

pub use builder::RequestBuilder;
pub use cookies::RequestCookie;
pub use error::{Error, Result};
pub use file::{FileAttachment, FileSource};
pub use parameter::{Parameter, ParameterKind, ParameterValue};
pub use sender::{HttpResponse, HttpSender, ReqwestSender};
pub use types::{DataFormat, HeaderEntry, SendableBody, SendableRequest};
