//! The fluent request builder.
//!
//! `RequestBuilder` accumulates request state through chained calls and
//! materializes it with [`RequestBuilder::build`]. Mutators validate before
//! touching state, so a failed call leaves the builder exactly as it was.
//! Building is a copy, never a move: the same builder can be finalized any
//! number of times, each snapshot reflecting its current state.

use crate::cookies::RequestCookie;
use crate::error::{Error, Result};
use crate::file::FileAttachment;
use crate::parameter::{Parameter, ParameterKind, ParameterValue};
use crate::types::{
    DataFormat, HeaderEntry, RequestBody, SendableBody, SendableRequest, build_form_body,
    build_multipart_body, resolve_url, MULTIPART_BOUNDARY,
};
use base64::Engine;
use log::debug;
use reqwest::Method;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncRead;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    resource: String,
    method: Method,
    format: DataFormat,
    timeout: Duration,
    parameters: Vec<Parameter>,
    headers: Vec<HeaderEntry>,
    cookies: Vec<RequestCookie>,
    files: Vec<FileAttachment>,
    body: Option<RequestBody>,
}

impl RequestBuilder {
    /// Start a builder for the given resource path or URL.
    pub fn new(resource: impl Into<String>) -> Result<Self> {
        let resource = resource.into();
        if resource.trim().is_empty() {
            return Err(Error::invalid_argument("resource", "resource must not be blank"));
        }
        Ok(Self {
            resource,
            method: Method::GET,
            format: DataFormat::Json,
            timeout: DEFAULT_TIMEOUT,
            parameters: Vec::new(),
            headers: Vec::new(),
            cookies: Vec::new(),
            files: Vec::new(),
            body: None,
        })
    }

    pub fn method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    pub fn format(&mut self, format: DataFormat) -> &mut Self {
        self.format = format;
        self
    }

    /// Set the request timeout. Zero is rejected; use a large value instead
    /// of a sentinel to effectively disable it.
    pub fn timeout(&mut self, timeout: Duration) -> Result<&mut Self> {
        if timeout.is_zero() {
            return Err(Error::invalid_argument("timeout", "timeout must be greater than zero"));
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Add or replace a header. Identity is case-insensitive; a matching
    /// entry keeps its position and stored name casing, and an identical
    /// value is a no-op.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<&mut Self> {
        let name = name.into();
        let value = value.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_argument("name", "header name must not be blank"));
        }
        match self.headers.iter_mut().find(|h| h.name.eq_ignore_ascii_case(&name)) {
            Some(existing) => {
                if existing.value != value {
                    existing.value = value;
                }
            }
            None => self.headers.push(HeaderEntry { name, value }),
        }
        Ok(self)
    }

    /// Add headers in the iteration order of the input, one
    /// [`header`](Self::header) call per entry.
    pub fn headers<I, K, V>(&mut self, entries: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in entries {
            self.header(name, value)?;
        }
        Ok(self)
    }

    /// Add or replace a single parameter. If a parameter with the same name
    /// (case-insensitive) exists, it is overwritten in its original position;
    /// otherwise the new one is appended.
    pub fn param(&mut self, parameter: Parameter) -> Result<&mut Self> {
        if parameter.name.trim().is_empty() {
            return Err(Error::invalid_argument("parameter", "parameter name must not be blank"));
        }
        match self.parameters.iter().position(|p| p.name_matches(&parameter.name)) {
            Some(at) => self.parameters[at] = parameter,
            None => self.parameters.push(parameter),
        }
        Ok(self)
    }

    /// Bulk add with last-write-wins semantics.
    ///
    /// Collisions against pre-existing entries and against earlier entries of
    /// the same batch both resolve to the first-seen position for that name.
    /// Unnamed entries are skipped; an empty batch is a no-op.
    pub fn params<I>(&mut self, parameters: I) -> &mut Self
    where
        I: IntoIterator<Item = Parameter>,
    {
        // Index existing names to their first occurrence
        let mut index: HashMap<String, usize> = HashMap::new();
        for (at, p) in self.parameters.iter().enumerate() {
            index.entry(p.name.to_ascii_lowercase()).or_insert(at);
        }

        for p in parameters {
            if p.name.trim().is_empty() {
                debug!("Skipping unnamed parameter in bulk add");
                continue;
            }
            let key = p.name.to_ascii_lowercase();
            match index.get(&key) {
                Some(&at) => self.parameters[at] = p,
                None => {
                    self.parameters.push(p);
                    // Later entries of this batch with the same name replace
                    // this one instead of appending again
                    index.insert(key, self.parameters.len() - 1);
                }
            }
        }
        self
    }

    /// Add a query-string parameter with an invariant textual value.
    pub fn query_param(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
    ) -> Result<&mut Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_argument("name", "query parameter name must not be blank"));
        }
        self.param(Parameter::new(name, value, ParameterKind::Query))
    }

    /// Add query-string parameters in iteration order. An empty input is a
    /// no-op.
    pub fn query_params<I, K, V>(&mut self, entries: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParameterValue>,
    {
        for (name, value) in entries {
            self.query_param(name, value)?;
        }
        Ok(self)
    }

    /// Add a URL segment parameter, substituted into a `{name}` placeholder
    /// in the resource at build time.
    pub fn url_segment(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
    ) -> Result<&mut Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_argument("name", "URL segment name must not be blank"));
        }
        self.param(Parameter::new(name, value, ParameterKind::UrlSegment))
    }

    /// Remove the parameter with the given name (case-insensitive). Removing
    /// an absent name is a no-op.
    pub fn remove_param(&mut self, name: &str) -> &mut Self {
        self.parameters.retain(|p| !p.name_matches(name));
        self
    }

    /// Remove the header with the given name (case-insensitive). Removing an
    /// absent name is a no-op.
    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.retain(|h| !h.name.eq_ignore_ascii_case(name));
        self
    }

    pub fn clear_params(&mut self) -> &mut Self {
        self.parameters.clear();
        self
    }

    pub fn clear_headers(&mut self) -> &mut Self {
        self.headers.clear();
        self
    }

    pub fn clear_cookies(&mut self) -> &mut Self {
        self.cookies.clear();
        self
    }

    /// Add a cookie. Identity covers the whole (name, value, path, domain)
    /// tuple, so inserting an equal tuple twice keeps one entry, while the
    /// same name with a different value keeps both.
    pub fn cookie(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        path: impl Into<String>,
        domain: impl Into<String>,
    ) -> Result<&mut Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_argument("name", "cookie name must not be blank"));
        }
        let cookie = RequestCookie::new(name, value, path, domain);
        if !self.cookies.contains(&cookie) {
            self.cookies.push(cookie);
        }
        Ok(self)
    }

    /// Attach a file from disk. The payload is read only when the request
    /// body is consumed.
    pub fn file(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.files.push(FileAttachment::from_path(name, path)?);
        Ok(self)
    }

    /// Attach an in-memory payload.
    pub fn file_bytes(
        &mut self,
        name: impl Into<String>,
        data: Vec<u8>,
        file_name: impl Into<String>,
    ) -> Result<&mut Self> {
        self.files.push(FileAttachment::from_bytes(name, data, file_name)?);
        Ok(self)
    }

    /// Attach a streamed payload. The provider is invoked once per body read.
    pub fn file_stream<F, R>(
        &mut self,
        name: impl Into<String>,
        provider: F,
        file_name: impl Into<String>,
    ) -> Result<&mut Self>
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.files.push(FileAttachment::from_stream(name, provider, file_name)?);
        Ok(self)
    }

    /// Attach a prepared [`FileAttachment`], e.g. one with an overridden
    /// content type.
    pub fn attachment(&mut self, attachment: FileAttachment) -> &mut Self {
        self.files.push(attachment);
        self
    }

    /// Set a raw body with an explicit content type.
    pub fn body(
        &mut self,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.body = Some(RequestBody { content_type: content_type.into(), data: data.into() });
        self
    }

    /// Serialize a JSON body and switch the format flag to JSON.
    pub fn json_body<T: Serialize>(&mut self, body: &T) -> Result<&mut Self> {
        let data = serde_json::to_vec(body)
            .map_err(|e| Error::BodyError(format!("Failed to serialize JSON body: {e}")))?;
        self.body = Some(RequestBody { content_type: "application/json".to_string(), data });
        self.format = DataFormat::Json;
        Ok(self)
    }

    /// Set the `Authorization` header to the Basic scheme for the given
    /// credentials.
    pub fn basic_auth(&mut self, user: &str, password: &str) -> Result<&mut Self> {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
        self.header("Authorization", format!("Basic {token}"))
    }

    /// Set the `Authorization` header to the Bearer scheme for the given
    /// token.
    pub fn bearer_auth(&mut self, token: &str) -> Result<&mut Self> {
        self.header("Authorization", format!("Bearer {token}"))
    }

    /// Materialize the accumulated state into a [`SendableRequest`].
    ///
    /// The builder stays usable; calling this again produces an independent
    /// snapshot of whatever the state is at that point.
    pub fn build(&self) -> SendableRequest {
        let url = resolve_url(&self.resource, &self.parameters);

        let mut headers = self.headers.clone();

        let body = if !self.files.is_empty() {
            upsert_missing(
                &mut headers,
                "Content-Type",
                &format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            );
            Some(build_multipart_body(&self.parameters, &self.files))
        } else if let Some(body) = &self.body {
            upsert_missing(&mut headers, "Content-Type", &body.content_type);
            Some(SendableBody::Bytes(body.data.clone()))
        } else if let Some(form) = build_form_body(&self.parameters) {
            upsert_missing(&mut headers, "Content-Type", "application/x-www-form-urlencoded");
            Some(SendableBody::Bytes(form.into_bytes()))
        } else {
            None
        };

        if let Some(accept) = self.format.accept_header() {
            upsert_missing(&mut headers, "Accept", accept);
        }

        SendableRequest {
            url,
            method: self.method.clone(),
            parameters: self.parameters.clone(),
            headers,
            cookies: self.cookies.clone(),
            format: self.format,
            body,
            timeout: self.timeout,
        }
    }
}

/// Add a derived header unless the caller already set one with that name.
fn upsert_missing(headers: &mut Vec<HeaderEntry>, name: &str, value: &str) {
    if !headers.iter().any(|h| h.name.eq_ignore_ascii_case(name)) {
        headers.push(HeaderEntry { name: name.to_string(), value: value.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(b: &RequestBuilder) -> Vec<&str> {
        b.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    fn values(b: &RequestBuilder) -> Vec<String> {
        b.parameters.iter().map(|p| p.value.to_string()).collect()
    }

    #[test]
    fn test_new_rejects_blank_resource() {
        assert!(RequestBuilder::new("").is_err());
        assert!(RequestBuilder::new("   ").is_err());
        assert!(RequestBuilder::new("users").is_ok());
    }

    #[test]
    fn test_defaults() {
        let b = RequestBuilder::new("users").unwrap();
        assert_eq!(b.method, Method::GET);
        assert_eq!(b.format, DataFormat::Json);
        assert_eq!(b.timeout, DEFAULT_TIMEOUT);
        assert!(b.parameters.is_empty());
        assert!(b.headers.is_empty());
    }

    #[test]
    fn test_param_replaces_case_insensitively_in_place() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.param(Parameter::query("Page", 1)).unwrap();
        b.param(Parameter::query("limit", 10)).unwrap();
        b.param(Parameter::query("pAgE", 2)).unwrap();

        assert_eq!(names(&b), vec!["pAgE", "limit"]);
        assert_eq!(values(&b), vec!["2", "10"]);
    }

    #[test]
    fn test_params_last_write_wins_within_batch() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.params(vec![
            Parameter::query("x", "v1"),
            Parameter::query("X", "v2"),
            Parameter::query("x", "v3"),
        ]);

        assert_eq!(b.parameters.len(), 1);
        assert_eq!(values(&b), vec!["v3"]);
    }

    #[test]
    fn test_params_replaces_pre_existing_entries() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.param(Parameter::query("p", "v1")).unwrap();
        b.params(vec![Parameter::query("p", "v2"), Parameter::query("q", "v3")]);

        assert_eq!(names(&b), vec!["p", "q"]);
        assert_eq!(values(&b), vec!["v2", "v3"]);
    }

    #[test]
    fn test_order_preserved_across_single_and_bulk_adds() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.param(Parameter::query("a", 1)).unwrap();
        b.param(Parameter::query("b", 2)).unwrap();
        b.params(vec![Parameter::query("c", 3), Parameter::query("d", 4)]);

        assert_eq!(names(&b), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_params_skips_unnamed_entries() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.params(vec![
            Parameter::query("p1", 1),
            Parameter::query("", "dropped"),
            Parameter::query("p2", 2),
        ]);

        assert_eq!(names(&b), vec!["p1", "p2"]);
    }

    #[test]
    fn test_params_empty_batch_is_noop() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.param(Parameter::query("a", 1)).unwrap();
        b.params(Vec::new());

        assert_eq!(names(&b), vec!["a"]);
    }

    #[test]
    fn test_param_rejects_blank_name_without_mutation() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.param(Parameter::query("a", 1)).unwrap();
        assert!(b.param(Parameter::query(" ", 2)).is_err());
        assert_eq!(names(&b), vec!["a"]);
    }

    #[test]
    fn test_header_identical_value_is_noop() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.header("H", "v").unwrap();
        b.header("H", "v").unwrap();

        assert_eq!(b.headers.len(), 1);
        assert_eq!(b.headers[0].value, "v");
    }

    #[test]
    fn test_header_identity_is_case_insensitive() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.header("X", "1").unwrap();
        b.header("x", "2").unwrap();

        assert_eq!(b.headers.len(), 1);
        // Replacement keeps the stored name casing and position
        assert_eq!(b.headers[0].name, "X");
        assert_eq!(b.headers[0].value, "2");
    }

    #[test]
    fn test_headers_bulk_applies_in_order() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.headers([("A", "1"), ("B", "2"), ("a", "3")]).unwrap();

        assert_eq!(b.headers.len(), 2);
        assert_eq!(b.headers[0].value, "3");
    }

    #[test]
    fn test_remove_operations_tolerate_absent_targets() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.param(Parameter::query("a", 1)).unwrap();
        b.header("H", "v").unwrap();

        b.remove_param("missing").remove_header("missing");
        assert_eq!(b.parameters.len(), 1);
        assert_eq!(b.headers.len(), 1);

        b.remove_param("A").remove_header("h");
        assert!(b.parameters.is_empty());
        assert!(b.headers.is_empty());
    }

    #[test]
    fn test_clear_operations() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.param(Parameter::query("a", 1)).unwrap();
        b.header("H", "v").unwrap();
        b.cookie("c", "v", "/", "d").unwrap();

        b.clear_params().clear_headers().clear_cookies();
        assert!(b.parameters.is_empty());
        assert!(b.headers.is_empty());
        assert!(b.cookies.is_empty());
    }

    #[test]
    fn test_cookie_same_name_different_value_coexist() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.cookie("c", "v1", "/", "d").unwrap();
        b.cookie("c", "v2", "/", "d").unwrap();

        assert_eq!(b.cookies.len(), 2);
    }

    #[test]
    fn test_cookie_equal_tuple_is_idempotent() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.cookie("c", "v", "/", "d").unwrap();
        b.cookie("C", "V", "/", "D").unwrap();

        assert_eq!(b.cookies.len(), 1);
    }

    #[test]
    fn test_timeout_rejects_zero() {
        let mut b = RequestBuilder::new("res").unwrap();
        assert!(b.timeout(Duration::ZERO).is_err());
        assert_eq!(b.timeout, DEFAULT_TIMEOUT);
        b.timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(b.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_query_param_formats_invariantly() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.query_param("price", 19.99).unwrap();
        b.query_param("active", true).unwrap();

        assert_eq!(values(&b), vec!["19.99", "true"]);
    }

    #[test]
    fn test_chaining_reads_naturally() {
        let mut b = RequestBuilder::new("users").unwrap();
        b.query_param("page", 1)
            .unwrap()
            .query_param("page", 2)
            .unwrap()
            .header("X-Trace", "abc")
            .unwrap();

        let req = b.build();
        assert_eq!(req.url, "users?page=2");
        assert_eq!(req.header("x-trace"), Some("abc"));
    }

    #[test]
    fn test_build_is_repeatable_and_reflects_current_state() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.query_param("page", 1).unwrap();

        let first = b.build();
        b.query_param("page", 2).unwrap();
        let second = b.build();

        assert_eq!(first.parameters[0].value.to_string(), "1");
        assert_eq!(second.parameters[0].value.to_string(), "2");
    }

    #[test]
    fn test_build_derives_accept_from_format() {
        let mut b = RequestBuilder::new("res").unwrap();
        assert_eq!(b.build().header("Accept"), Some("application/json"));

        b.format(DataFormat::Xml);
        assert_eq!(b.build().header("Accept"), Some("application/xml, text/xml"));

        b.format(DataFormat::None);
        assert_eq!(b.build().header("Accept"), None);

        b.format(DataFormat::Json);
        b.header("Accept", "text/csv").unwrap();
        assert_eq!(b.build().header("Accept"), Some("text/csv"));
    }

    #[test]
    fn test_build_form_params_become_urlencoded_body() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.method(Method::POST);
        b.param(Parameter::form("a", 1)).unwrap();
        b.param(Parameter::form("b", "x y")).unwrap();

        let req = b.build();
        assert_eq!(req.header("Content-Type"), Some("application/x-www-form-urlencoded"));
        match req.body {
            Some(SendableBody::Bytes(bytes)) => assert_eq!(bytes, b"a=1&b=x%20y"),
            other => panic!("Expected urlencoded bytes body, got {other:?}"),
        }
    }

    #[test]
    fn test_build_explicit_body_wins_over_form_params() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.param(Parameter::form("a", 1)).unwrap();
        b.body("text/plain", "raw");

        let req = b.build();
        assert_eq!(req.header("Content-Type"), Some("text/plain"));
        match req.body {
            Some(SendableBody::Bytes(bytes)) => assert_eq!(bytes, b"raw"),
            other => panic!("Expected raw bytes body, got {other:?}"),
        }
    }

    #[test]
    fn test_build_files_force_multipart() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.file_bytes("g", vec![1], "g.bin").unwrap();

        let req = b.build();
        assert_eq!(
            req.header("Content-Type"),
            Some(format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY).as_str())
        );
        assert!(matches!(req.body, Some(SendableBody::Stream(_))));
    }

    #[test]
    fn test_json_body_sets_content_type_and_format() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.format(DataFormat::Xml);
        b.json_body(&serde_json::json!({"name": "a"})).unwrap();

        let req = b.build();
        assert_eq!(req.format, DataFormat::Json);
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        match req.body {
            Some(SendableBody::Bytes(bytes)) => {
                assert_eq!(bytes, br#"{"name":"a"}"#);
            }
            other => panic!("Expected JSON bytes body, got {other:?}"),
        }
    }

    #[test]
    fn test_auth_helpers_format_authorization() {
        let mut b = RequestBuilder::new("res").unwrap();
        b.basic_auth("user", "pass").unwrap();
        assert_eq!(b.headers[0].value, "Basic dXNlcjpwYXNz");

        // Second auth call replaces through the header rule
        b.bearer_auth("tok").unwrap();
        assert_eq!(b.headers.len(), 1);
        assert_eq!(b.headers[0].value, "Bearer tok");
    }
}
