use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Opaque byte source, read by the transport at send time
pub struct ByteStream(Pin<Box<dyn AsyncRead + Send>>);

impl ByteStream {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self(Box::pin(reader))
    }

    pub async fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.0.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ByteStream")
    }
}

/// Inline attachment content
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AttachmentContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl AttachmentContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AttachmentContent::Text(text) => text.as_bytes(),
            AttachmentContent::Bytes(bytes) => bytes,
        }
    }
}

impl From<&str> for AttachmentContent {
    fn from(text: &str) -> Self {
        AttachmentContent::Text(text.to_string())
    }
}

impl From<String> for AttachmentContent {
    fn from(text: String) -> Self {
        AttachmentContent::Text(text)
    }
}

impl From<Vec<u8>> for AttachmentContent {
    fn from(bytes: Vec<u8>) -> Self {
        AttachmentContent::Bytes(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Inline,
    #[default]
    Attachment,
}

/// An attachment as declared by the caller.
///
/// Exactly one of `path`, `content` or `stream` is expected. When more than
/// one is set, resolution prefers `path`, then `content`, then `stream`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSpec {
    pub filename: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub content: Option<AttachmentContent>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(skip)]
    pub stream: Option<ByteStream>,
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub disposition: Option<Disposition>,
}

impl AttachmentSpec {
    pub fn from_path(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_content(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<AttachmentContent>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn from_stream(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        stream: ByteStream,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            stream: Some(stream),
            ..Default::default()
        }
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Content-ID for images referenced from HTML as `cid:...`
    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = Some(disposition);
        self
    }
}

/// Where a resolved attachment's bytes come from
#[derive(Debug)]
pub enum AttachmentSource {
    Path(PathBuf),
    Content {
        data: AttachmentContent,
        encoding: Option<String>,
    },
    Stream(ByteStream),
}

/// Transport-ready attachment
#[derive(Debug)]
pub struct ResolvedAttachment {
    pub filename: String,
    pub content_type: String,
    pub source: AttachmentSource,
    pub cid: Option<String>,
    pub disposition: Disposition,
}

impl ResolvedAttachment {
    pub fn path(&self) -> Option<&PathBuf> {
        match &self.source {
            AttachmentSource::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn content(&self) -> Option<&AttachmentContent> {
        match &self.source {
            AttachmentSource::Content { data, .. } => Some(data),
            _ => None,
        }
    }
}
