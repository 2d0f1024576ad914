use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use lettre::message::header::{ContentDisposition, ContentId, ContentType};
use lettre::message::{Attachment, Mailbox, Mailboxes, MultiPart, MultiPartBuilder, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use uuid::Uuid;

use super::transport::{MailTransport, Receipt};
use crate::config::Config;
use crate::error::TransportError;
use crate::fs::FileSystem;
use crate::models::{
    AttachmentContent, AttachmentSource, BodyKind, Disposition, OutgoingMessage,
    ResolvedAttachment,
};

const OCTET_STREAM: &str = "application/octet-stream";

/// Gmail SMTP transport (SMTPS on 465, STARTTLS otherwise; app password auth)
pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    fs: Arc<dyn FileSystem>,
}

/// Body or container being assembled
enum Part {
    Single(SinglePart),
    Multi(MultiPart),
}

impl Part {
    fn wrap(self, container: MultiPartBuilder) -> MultiPart {
        match self {
            Part::Single(part) => container.singlepart(part),
            Part::Multi(multi) => container.multipart(multi),
        }
    }
}

impl SmtpMailTransport {
    pub fn new(config: &Config, fs: Arc<dyn FileSystem>) -> Result<Self, TransportError> {
        let builder = if config.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        };

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.gmail_user.clone(),
                config.gmail_app_password.clone(),
            ))
            .build();

        tracing::info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            implicit_tls = config.implicit_tls(),
            user = %config.gmail_user,
            "SMTP transport created"
        );

        Ok(Self { transport, fs })
    }

    /// Build the lettre message and the Message-ID it carries
    async fn build_message(&self, message: OutgoingMessage) -> Result<(Message, String), TransportError> {
        let OutgoingMessage {
            from,
            to,
            subject,
            body,
            attachments,
        } = message;

        let address: Address = from.address.parse()?;
        let message_id = format!("<{}@{}>", Uuid::new_v4(), address.domain());

        let mut builder = Message::builder()
            .from(Mailbox::new(Some(from.display_name), address))
            .subject(subject)
            .message_id(Some(message_id.clone()));

        let recipients: Mailboxes = to.parse()?;
        for mailbox in recipients {
            builder = builder.to(mailbox);
        }

        let mut content = match (body.kind, body.alt_text) {
            (BodyKind::Html, Some(alt)) => {
                Part::Multi(MultiPart::alternative_plain_html(alt, body.content))
            }
            (BodyKind::Html, None) => Part::Single(SinglePart::html(body.content)),
            (BodyKind::Text, _) => Part::Single(SinglePart::plain(body.content)),
        };

        let mut related = Vec::new();
        let mut files = Vec::new();
        for attachment in attachments {
            let embedded = attachment.cid.is_some();
            let part = self.attachment_part(attachment).await?;
            if embedded {
                related.push(part);
            } else {
                files.push(part);
            }
        }

        if !related.is_empty() {
            let mut multi = content.wrap(MultiPart::related());
            for part in related {
                multi = multi.singlepart(part);
            }
            content = Part::Multi(multi);
        }

        if !files.is_empty() {
            let mut multi = content.wrap(MultiPart::mixed());
            for part in files {
                multi = multi.singlepart(part);
            }
            content = Part::Multi(multi);
        }

        let email = match content {
            Part::Single(part) => builder.singlepart(part)?,
            Part::Multi(multi) => builder.multipart(multi)?,
        };

        Ok((email, message_id))
    }

    async fn attachment_part(&self, attachment: ResolvedAttachment) -> Result<SinglePart, TransportError> {
        let ResolvedAttachment {
            filename,
            content_type,
            source,
            cid,
            disposition,
        } = attachment;

        let data = match source {
            AttachmentSource::Path(path) => self.fs.read(&path).await?,
            AttachmentSource::Content { data, encoding } => decode_content(&data, encoding.as_deref())?,
            AttachmentSource::Stream(stream) => stream.read_all().await?,
        };

        let content_type = match ContentType::parse(&content_type) {
            Ok(parsed) => parsed,
            Err(_) => ContentType::parse(OCTET_STREAM)
                .map_err(|e| TransportError::Build(e.to_string()))?,
        };

        // Embedded parts are always inline so HTML can reference them.
        let part = match (cid, disposition) {
            (Some(cid), _) => SinglePart::builder()
                .header(content_type)
                .header(ContentDisposition::inline_with_name(&filename))
                .header(ContentId::from(format!("<{}>", cid)))
                .body(data),
            (None, Disposition::Inline) => SinglePart::builder()
                .header(content_type)
                .header(ContentDisposition::inline_with_name(&filename))
                .body(data),
            (None, Disposition::Attachment) => Attachment::new(filename).body(data, content_type),
        };

        Ok(part)
    }
}

/// Decode inline content according to its encoding tag
fn decode_content(data: &AttachmentContent, encoding: Option<&str>) -> Result<Vec<u8>, TransportError> {
    let encoding = encoding.map(str::to_ascii_lowercase);

    match encoding.as_deref() {
        None | Some("utf8") | Some("utf-8") | Some("binary") => Ok(data.as_bytes().to_vec()),
        Some("base64") => {
            let compact: Vec<u8> = data
                .as_bytes()
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
        }
        Some("hex") => Ok(hex::decode(data.as_bytes())?),
        Some(other) => Err(TransportError::Decode(format!(
            "unsupported encoding '{}'",
            other
        ))),
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn verify(&self) -> Result<bool, TransportError> {
        Ok(self.transport.test_connection().await?)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<Receipt, TransportError> {
        let (email, message_id) = self.build_message(message).await?;

        let response = self.transport.send(email).await?;
        let reply = response.message().collect::<Vec<_>>().join(" ");

        if !response.is_positive() {
            return Err(TransportError::Rejected(format!("{} {}", response.code(), reply)));
        }

        tracing::debug!(message_id = %message_id, code = %response.code(), "SMTP accepted message");

        Ok(Receipt {
            message_id,
            response: Some(format!("{} {}", response.code(), reply)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::attachments::tests::MemoryFileSystem;
    use crate::models::{ByteStream, MessageBody, SenderIdentity};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn config(port: Option<&str>) -> Config {
        let port = port.map(str::to_string);
        Config::from_lookup(move |key| match key {
            "GMAIL_USER" => Some("sender@gmail.com".to_string()),
            "GMAIL_APP_PASSWORD" => Some("app-password".to_string()),
            "SMTP_PORT" => port.clone(),
            _ => None,
        })
        .expect("Should load config")
    }

    fn transport(fs: MemoryFileSystem) -> SmtpMailTransport {
        SmtpMailTransport::new(&config(None), Arc::new(fs)).expect("Should create transport")
    }

    #[tokio::test]
    async fn test_submission_port_builds_starttls_transport() {
        let submission = config(Some("587"));
        assert!(!submission.implicit_tls());
        tokio_test::assert_ok!(SmtpMailTransport::new(&submission, Arc::new(MemoryFileSystem::default())));

        assert!(config(None).implicit_tls());
    }

    fn message(body: MessageBody, attachments: Vec<ResolvedAttachment>) -> OutgoingMessage {
        OutgoingMessage {
            from: SenderIdentity {
                display_name: "Reports".to_string(),
                address: "sender@gmail.com".to_string(),
            },
            to: "a@x.com, b@x.com".to_string(),
            subject: "Monthly report".to_string(),
            body,
            attachments,
        }
    }

    fn attachment(filename: &str, source: AttachmentSource, cid: Option<&str>) -> ResolvedAttachment {
        ResolvedAttachment {
            filename: filename.to_string(),
            content_type: "text/csv".to_string(),
            source,
            cid: cid.map(str::to_string),
            disposition: Disposition::Attachment,
        }
    }

    async fn render(transport: &SmtpMailTransport, msg: OutgoingMessage) -> (String, String) {
        let (email, message_id) = transport.build_message(msg).await.expect("Should build message");
        (String::from_utf8_lossy(&email.formatted()).into_owned(), message_id)
    }

    #[tokio::test]
    async fn test_plain_text_message_headers() {
        let smtp = transport(MemoryFileSystem::default());
        let (raw, message_id) = render(&smtp, message(MessageBody::text("C"), vec![])).await;

        assert!(message_id.starts_with('<') && message_id.ends_with("@gmail.com>"));
        assert!(raw.contains(&message_id));
        assert!(raw.contains("Reports <sender@gmail.com>"));
        assert!(raw.contains("a@x.com, b@x.com"));
        assert!(raw.contains("Subject: Monthly report"));
        assert!(raw.contains("text/plain"));
        assert!(!raw.contains("multipart/"));
    }

    #[tokio::test]
    async fn test_html_with_alternative_is_multipart() {
        let smtp = transport(MemoryFileSystem::default());
        let body = MessageBody::html("<p>hi</p>", Some("hi".to_string()));
        let (raw, _) = render(&smtp, message(body, vec![])).await;

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[tokio::test]
    async fn test_attachments_are_grouped() {
        let fs = MemoryFileSystem::default().with_file("/assets/logo.png", b"png-bytes");
        let smtp = transport(fs);

        let attachments = vec![
            attachment("logo.png", AttachmentSource::Path(PathBuf::from("/assets/logo.png")), Some("logo@mail")),
            attachment(
                "report.csv",
                AttachmentSource::Content {
                    data: AttachmentContent::from("a,b\n1,2\n"),
                    encoding: None,
                },
                None,
            ),
            attachment("raw.csv", AttachmentSource::Stream(ByteStream::new(&b"x,y"[..])), None),
        ];
        let body = MessageBody::html("<img src=\"cid:logo@mail\">", None);
        let (raw, _) = render(&smtp, message(body, attachments)).await;

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/related"));
        assert!(raw.contains("<logo@mail>"));
        assert!(raw.contains("filename=\"logo.png\""));
        assert!(raw.contains("filename=\"report.csv\""));
        assert!(raw.contains("filename=\"raw.csv\""));
    }

    #[tokio::test]
    async fn test_unreadable_path_fails_the_send() {
        let smtp = transport(MemoryFileSystem::default());
        let attachments = vec![attachment(
            "gone.csv",
            AttachmentSource::Path(PathBuf::from("/nowhere/gone.csv")),
            None,
        )];

        let result = smtp.build_message(message(MessageBody::text("t"), attachments)).await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }

    #[test]
    fn test_decode_content() {
        let b64 = AttachmentContent::from("aGVs\nbG8=");
        assert_eq!(decode_content(&b64, Some("base64")).unwrap(), b"hello".to_vec());
        assert_eq!(decode_content(&b64, Some("BASE64")).unwrap(), b"hello".to_vec());

        let hexed = AttachmentContent::from("68656c6c6f");
        assert_eq!(decode_content(&hexed, Some("hex")).unwrap(), b"hello".to_vec());

        let raw = AttachmentContent::from(vec![0u8, 159, 146, 150]);
        assert_eq!(decode_content(&raw, None).unwrap(), vec![0u8, 159, 146, 150]);

        assert!(matches!(
            decode_content(&raw, Some("quoted-printable")),
            Err(TransportError::Decode(_))
        ));
        assert!(matches!(
            decode_content(&AttachmentContent::from("!!"), Some("base64")),
            Err(TransportError::Decode(_))
        ));
    }
}
