pub mod attachments;
pub mod mailer;
pub mod smtp;
pub mod transport;

pub use attachments::{resolve_path, AttachmentResolver, ResolverSettings, ASSETS_DIR_PLACEHOLDER};
pub use mailer::{Mailer, UNKNOWN_RECIPIENT};
pub use smtp::SmtpMailTransport;
pub use transport::{MailTransport, Receipt};
