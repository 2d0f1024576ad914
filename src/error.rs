/// Attachment declaration problems found while resolving.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("AttachmentError: missing source for attachment '{filename}' (expected path, content or stream)")]
    MissingSource { filename: String },
}

/// Failures raised by a mail transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Message build error: {0}")]
    Build(String),

    #[error("{0}")]
    Smtp(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Attachment decode error: {0}")]
    Decode(String),

    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Per-message failures. Every variant ends up as a `SendResult.error` string.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("MissingRecipientError: template '{template_id}' has no recipient and no default was given")]
    MissingRecipient { template_id: String },

    #[error("EmptyContentError: template '{template_id}' has neither html nor text content")]
    EmptyContent { template_id: String },

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<lettre::address::AddressError> for TransportError {
    fn from(err: lettre::address::AddressError) -> Self {
        TransportError::Address(err.to_string())
    }
}

impl From<lettre::error::Error> for TransportError {
    fn from(err: lettre::error::Error) -> Self {
        TransportError::Build(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for TransportError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        TransportError::Smtp(err.to_string())
    }
}

impl From<base64::DecodeError> for TransportError {
    fn from(err: base64::DecodeError) -> Self {
        TransportError::Decode(format!("base64: {}", err))
    }
}

impl From<hex::FromHexError> for TransportError {
    fn from(err: hex::FromHexError) -> Self {
        TransportError::Decode(format!("hex: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, MailError>;
