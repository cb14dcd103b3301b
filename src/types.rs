//! The materialized request descriptor and its body assembly.

use crate::chained_reader::{BodySection, ChainedReader};
use crate::cookies::RequestCookie;
use crate::file::{FileAttachment, FileSource};
use crate::parameter::{Parameter, ParameterKind};
use log::warn;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncRead;

// Hardcoded multipart boundary that's unlikely to conflict with content
pub const MULTIPART_BOUNDARY: &str = "----ReqforgeFormBoundaryXb9qL2cFpT3mKdVw";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

/// Serialization format flag copied onto the materialized request. Drives the
/// derived `Accept` header; payload serialization itself is the caller's
/// concern except for the JSON body helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    Json,
    Xml,
    None,
}

impl DataFormat {
    pub(crate) fn accept_header(&self) -> Option<&'static str> {
        match self {
            DataFormat::Json => Some("application/json"),
            DataFormat::Xml => Some("application/xml, text/xml"),
            DataFormat::None => None,
        }
    }
}

/// An opaque request payload with its content type.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub content_type: String,
    pub data: Vec<u8>,
}

pub type BodyStream = Pin<Box<dyn AsyncRead + Send>>;

/// The wire body of a materialized request.
pub enum SendableBody {
    Bytes(Vec<u8>),
    Stream(BodyStream),
}

impl std::fmt::Debug for SendableBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendableBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            SendableBody::Stream(_) => f.debug_tuple("Stream").field(&"<stream>").finish(),
        }
    }
}

/// A fully populated request, ready for an [`HttpSender`](crate::sender::HttpSender).
///
/// Produced by [`RequestBuilder::build`](crate::builder::RequestBuilder::build);
/// each call yields an independent snapshot of the builder's current state.
#[derive(Debug)]
pub struct SendableRequest {
    /// Resource with URL segments substituted and query parameters applied.
    pub url: String,
    pub method: Method,
    /// The accumulated parameters, in insertion order (replaced entries keep
    /// their original position).
    pub parameters: Vec<Parameter>,
    pub headers: Vec<HeaderEntry>,
    pub cookies: Vec<RequestCookie>,
    pub format: DataFormat,
    pub body: Option<SendableBody>,
    pub timeout: Duration,
}

impl SendableRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Substitute `{name}` placeholders and append query parameters, in sequence
/// order. Unmatched placeholders are left verbatim.
pub(crate) fn resolve_url(resource: &str, parameters: &[Parameter]) -> String {
    let mut url = resource.to_string();

    for p in parameters.iter().filter(|p| p.kind == ParameterKind::UrlSegment) {
        let needle = format!("{{{}}}", p.name.to_ascii_lowercase());
        // Byte offsets survive ASCII lowercasing, so search the folded copy
        match url.to_ascii_lowercase().find(&needle) {
            Some(at) => {
                let value = urlencoding::encode(&p.value.to_string()).into_owned();
                url.replace_range(at..at + needle.len(), &value);
            }
            None => warn!("No `{{{}}}` placeholder in resource for URL segment", p.name),
        }
    }

    let mut query = String::new();
    for p in parameters.iter().filter(|p| p.kind == ParameterKind::Query) {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&urlencoding::encode(&p.name));
        query.push('=');
        query.push_str(&urlencoding::encode(&p.value.to_string()));
    }

    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query);
    }

    url
}

/// Render form-kind parameters as an `application/x-www-form-urlencoded` body.
pub(crate) fn build_form_body(parameters: &[Parameter]) -> Option<String> {
    let mut body = String::new();
    for p in parameters.iter().filter(|p| p.kind == ParameterKind::Form) {
        if !body.is_empty() {
            body.push('&');
        }
        body.push_str(&urlencoding::encode(&p.name));
        body.push('=');
        body.push_str(&urlencoding::encode(&p.value.to_string()));
    }

    if body.is_empty() { None } else { Some(body) }
}

/// Assemble a multipart/form-data body as lazily chained sections: text parts
/// for form-kind parameters, then one part per attachment in insertion order.
/// Disk and stream payloads are read only when the body itself is consumed.
pub(crate) fn build_multipart_body(
    parameters: &[Parameter],
    files: &[FileAttachment],
) -> SendableBody {
    let mut sections = Vec::new();

    for p in parameters.iter().filter(|p| p.kind == ParameterKind::Form) {
        sections.push(BodySection::Bytes(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                MULTIPART_BOUNDARY, p.name, p.value
            )
            .into_bytes(),
        ));
    }

    for f in files {
        sections.push(BodySection::Bytes(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                MULTIPART_BOUNDARY,
                f.name,
                f.file_name(),
                f.content_type
            )
            .into_bytes(),
        ));

        match &f.source {
            FileSource::Bytes { data, .. } => sections.push(BodySection::Bytes(data.clone())),
            FileSource::Path(path) => sections.push(BodySection::FilePath(path.clone())),
            FileSource::Stream { provider, .. } => {
                sections.push(BodySection::Stream(provider.clone()))
            }
        }

        sections.push(BodySection::Bytes(b"\r\n".to_vec()));
    }

    sections.push(BodySection::Bytes(format!("--{}--\r\n", MULTIPART_BOUNDARY).into_bytes()));

    SendableBody::Stream(Box::pin(ChainedReader::new(sections)))
}
