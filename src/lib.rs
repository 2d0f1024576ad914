//! Gmail SMTP mailer: single, bulk and templated sends with attachment
//! resolution and per-message failure isolation.

pub mod config;
pub mod error;
pub mod fs;
pub mod mail;
pub mod models;

pub use config::Config;
pub use error::{AttachmentError, MailError, Result, TransportError};
pub use mail::{AttachmentResolver, MailTransport, Mailer, Receipt};
