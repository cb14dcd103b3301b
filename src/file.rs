//! File attachments for multipart requests.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Factory for a fresh payload reader. Invoked each time a materialized
/// request body is consumed, so a builder can be finalized more than once.
pub type StreamProvider = Arc<dyn Fn() -> Box<dyn AsyncRead + Send + Unpin> + Send + Sync>;

/// Payload source for a file attachment. The set is closed: the sender
/// dispatches over these three variants exhaustively.
#[derive(Clone)]
pub enum FileSource {
    /// Read from disk when the body is consumed, not before.
    Path(PathBuf),
    /// In-memory payload with an explicit file name.
    Bytes { data: Vec<u8>, file_name: String },
    /// Caller-supplied reader, obtained lazily from the provider.
    Stream { provider: StreamProvider, file_name: String },
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            FileSource::Bytes { data, file_name } => f
                .debug_struct("Bytes")
                .field("len", &data.len())
                .field("file_name", file_name)
                .finish(),
            FileSource::Stream { file_name, .. } => {
                f.debug_struct("Stream").field("file_name", file_name).finish()
            }
        }
    }
}

/// A named file attachment destined for a multipart body.
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub name: String,
    pub content_type: String,
    pub source: FileSource,
}

impl FileAttachment {
    /// Attach a file on disk. The content type is guessed from the path
    /// extension; the file itself is only opened when the body is read.
    pub fn from_path(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let name = non_blank("name", name.into())?;
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_argument("path", "file path must not be empty"));
        }
        let content_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
        Ok(Self { name, content_type, source: FileSource::Path(path.to_path_buf()) })
    }

    /// Attach an in-memory payload.
    pub fn from_bytes(
        name: impl Into<String>,
        data: Vec<u8>,
        file_name: impl Into<String>,
    ) -> Result<Self> {
        let name = non_blank("name", name.into())?;
        let file_name = non_blank("file_name", file_name.into())?;
        Ok(Self {
            name,
            content_type: OCTET_STREAM.to_string(),
            source: FileSource::Bytes { data, file_name },
        })
    }

    /// Attach a streamed payload. The provider is called once per body read,
    /// when the multipart section is reached.
    pub fn from_stream<F, R>(
        name: impl Into<String>,
        provider: F,
        file_name: impl Into<String>,
    ) -> Result<Self>
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let name = non_blank("name", name.into())?;
        let file_name = non_blank("file_name", file_name.into())?;
        let provider: StreamProvider = Arc::new(move || Box::new(provider()));
        Ok(Self {
            name,
            content_type: OCTET_STREAM.to_string(),
            source: FileSource::Stream { provider, file_name },
        })
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// The file name sent in the part's disposition header.
    pub fn file_name(&self) -> &str {
        match &self.source {
            FileSource::Path(path) => {
                path.file_name().and_then(|n| n.to_str()).unwrap_or("file")
            }
            FileSource::Bytes { file_name, .. } => file_name,
            FileSource::Stream { file_name, .. } => file_name,
        }
    }
}

fn non_blank(field: &'static str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        Err(Error::invalid_argument(field, format!("{field} must not be blank")))
    } else {
        Ok(value)
    }
}
