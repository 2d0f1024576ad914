use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::OutgoingMessage;

/// What the transport reports back for an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub message_id: String,
    pub response: Option<String>,
}

/// Capability that actually speaks to the mail submission service.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Check that the service is reachable and accepts our credentials
    async fn verify(&self) -> Result<bool, TransportError>;

    async fn send(&self, message: OutgoingMessage) -> Result<Receipt, TransportError>;
}
