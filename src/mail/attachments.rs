//! Attachment normalization: placeholder substitution, existence checks and
//! source precedence.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::AttachmentError;
use crate::fs::FileSystem;
use crate::models::{AttachmentSource, AttachmentSpec, ResolvedAttachment};

/// Placeholder replaced by `ResolverSettings::assets_dir` in attachment paths
pub const ASSETS_DIR_PLACEHOLDER: &str = "{{assetsDir}}";

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub assets_dir: String,
    pub working_dir: PathBuf,
}

/// Substitute the assets placeholder and anchor `./` and `../` paths at
/// `working_dir`. Anything else is returned as is. No I/O.
pub fn resolve_path(raw: &str, settings: &ResolverSettings) -> PathBuf {
    let substituted = raw.replace(ASSETS_DIR_PLACEHOLDER, &settings.assets_dir);

    if substituted.starts_with("./") || substituted.starts_with("../") {
        normalize(&settings.working_dir.join(&substituted))
    } else {
        PathBuf::from(substituted)
    }
}

/// Lexically collapse `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub struct AttachmentResolver {
    settings: ResolverSettings,
    fs: Arc<dyn FileSystem>,
}

impl AttachmentResolver {
    pub fn new(settings: ResolverSettings, fs: Arc<dyn FileSystem>) -> Self {
        Self { settings, fs }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        resolve_path(raw, &self.settings)
    }

    /// Turn a declared attachment into its transport form.
    ///
    /// A missing file is only logged: the attachment is still passed on and
    /// the transport decides what to do with it.
    pub async fn resolve(&self, spec: AttachmentSpec) -> Result<ResolvedAttachment, AttachmentError> {
        let AttachmentSpec {
            filename,
            content_type,
            path,
            content,
            encoding,
            stream,
            cid,
            disposition,
        } = spec;

        let source = if let Some(raw) = path {
            let resolved = self.resolve_path(&raw);
            if !self.fs.exists(&resolved).await {
                tracing::warn!(
                    filename = %filename,
                    path = %resolved.display(),
                    "Attachment file not found, sending anyway"
                );
            }
            AttachmentSource::Path(resolved)
        } else if let Some(data) = content {
            AttachmentSource::Content { data, encoding }
        } else if let Some(stream) = stream {
            AttachmentSource::Stream(stream)
        } else {
            return Err(AttachmentError::MissingSource { filename });
        };

        Ok(ResolvedAttachment {
            filename,
            content_type,
            source,
            cid,
            disposition: disposition.unwrap_or_default(),
        })
    }
}
