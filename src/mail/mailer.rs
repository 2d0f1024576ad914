use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};

use super::attachments::AttachmentResolver;
use super::smtp::SmtpMailTransport;
use super::transport::{MailTransport, Receipt};
use crate::config::Config;
use crate::error::{MailError, Result, TransportError};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::models::{
    EmailOptions, EmailTemplate, MessageBody, OutgoingMessage, Recipients, SendResult,
    SenderIdentity,
};

/// Recipient reported when a template has no `to` and no default was given
pub const UNKNOWN_RECIPIENT: &str = "unknown";

const GENERIC_FAILURE: &str = "send failed";

/// Sends single, bulk and templated mail through one transport.
///
/// None of the send operations return an error: every failure becomes a
/// `SendResult` with `success: false`.
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    identity: Arc<SenderIdentity>,
    resolver: Arc<AttachmentResolver>,
    limiter: Option<Arc<Semaphore>>,
}

/// Spawned per-item send, plus what to report if the task itself dies
struct Pending {
    to: String,
    template_id: Option<String>,
    handle: JoinHandle<SendResult>,
}

impl Mailer {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        identity: SenderIdentity,
        resolver: AttachmentResolver,
    ) -> Self {
        Self {
            transport,
            identity: Arc::new(identity),
            resolver: Arc::new(resolver),
            limiter: None,
        }
    }

    /// Gmail SMTP mailer backed by the local filesystem
    pub fn from_config(config: &Config) -> std::result::Result<Self, TransportError> {
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem);
        let transport = SmtpMailTransport::new(config, fs.clone())?;
        let resolver = AttachmentResolver::new(config.resolver_settings(), fs);

        let mailer = Self::new(Arc::new(transport), config.sender_identity(), resolver);
        Ok(match config.send_concurrency {
            Some(limit) => mailer.with_concurrency_limit(limit),
            None => mailer,
        })
    }

    /// Cap how many batch items are in flight at once
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    pub fn identity(&self) -> &SenderIdentity {
        &self.identity
    }

    /// Advisory health check. Failures are logged, never returned.
    pub async fn verify_connection(&self) -> bool {
        match self.transport.verify().await {
            Ok(true) => {
                tracing::info!("Mail server connection verified");
                true
            }
            Ok(false) => {
                tracing::warn!("Mail server verification returned false");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Mail server connection verification failed");
                false
            }
        }
    }

    pub async fn send_email(&self, opts: EmailOptions) -> SendResult {
        let to = opts.to.to_header();
        let body = if opts.html {
            MessageBody::html(opts.content, None)
        } else {
            MessageBody::text(opts.content)
        };

        let message = OutgoingMessage {
            from: (*self.identity).clone(),
            to: to.clone(),
            subject: opts.subject,
            body,
            attachments: Vec::new(),
        };

        let result = match self.transport.send(message).await {
            Ok(receipt) => SendResult::sent(to, receipt.message_id),
            Err(e) => SendResult::failed(to, e.to_string()),
        };
        log_outcome(&result);
        result
    }

    /// Send every email concurrently. Results come back in input order and
    /// one failure never affects the others.
    pub async fn send_bulk_emails(&self, emails: Vec<EmailOptions>) -> Vec<SendResult> {
        tracing::info!(count = emails.len(), "Sending bulk emails");

        let pending = emails
            .into_iter()
            .map(|opts| {
                let to = opts.to.to_header();
                let mailer = self.clone();
                Pending {
                    to,
                    template_id: None,
                    handle: self.spawn_limited(async move { mailer.send_email(opts).await }),
                }
            })
            .collect();

        let results = settle(pending).await;
        log_batch(&results);
        results
    }

    /// Send every template concurrently, filling in `default_to` where a
    /// template has no recipient of its own.
    pub async fn send_templated_emails(
        &self,
        templates: Vec<EmailTemplate>,
        default_to: Option<Recipients>,
    ) -> Vec<SendResult> {
        tracing::info!(count = templates.len(), "Sending templated emails");

        let pending = templates
            .into_iter()
            .map(|template| {
                let recipients = template.to.clone().or_else(|| default_to.clone());
                let to = reported_recipient(recipients.as_ref());
                let template_id = template.id.clone();
                let mailer = self.clone();
                Pending {
                    to,
                    template_id: Some(template_id),
                    handle: self.spawn_limited(async move {
                        mailer.send_template(template, recipients).await
                    }),
                }
            })
            .collect();

        let results = settle(pending).await;
        log_batch(&results);
        results
    }

    async fn send_template(&self, template: EmailTemplate, recipients: Option<Recipients>) -> SendResult {
        let template_id = template.id.clone();
        let to = reported_recipient(recipients.as_ref());

        let result = match self.try_send_template(template, recipients).await {
            Ok(receipt) => SendResult::sent(to, receipt.message_id),
            Err(e) => SendResult::failed(to, e.to_string()),
        }
        .for_template(template_id);

        log_outcome(&result);
        result
    }

    async fn try_send_template(
        &self,
        template: EmailTemplate,
        recipients: Option<Recipients>,
    ) -> Result<Receipt> {
        let to = recipients
            .ok_or_else(|| MailError::MissingRecipient {
                template_id: template.id.clone(),
            })?
            .to_header();

        let body = template.body().ok_or_else(|| MailError::EmptyContent {
            template_id: template.id.clone(),
        })?;

        let EmailTemplate {
            subject,
            attachments: specs,
            ..
        } = template;

        let mut attachments = Vec::with_capacity(specs.len());
        for spec in specs {
            attachments.push(self.resolver.resolve(spec).await?);
        }

        let message = OutgoingMessage {
            from: (*self.identity).clone(),
            to,
            subject,
            body,
            attachments,
        };

        Ok(self.transport.send(message).await?)
    }

    fn spawn_limited<F>(&self, job: F) -> JoinHandle<SendResult>
    where
        F: Future<Output = SendResult> + Send + 'static,
    {
        let limiter = self.limiter.clone();
        tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            job.await
        })
    }
}

fn reported_recipient(recipients: Option<&Recipients>) -> String {
    recipients
        .map(Recipients::to_header)
        .unwrap_or_else(|| UNKNOWN_RECIPIENT.to_string())
}

/// Wait for every task, in input order. A task that died becomes a failure
/// record for its original recipient.
async fn settle(pending: Vec<Pending>) -> Vec<SendResult> {
    let (meta, handles): (Vec<_>, Vec<_>) = pending
        .into_iter()
        .map(|p| ((p.to, p.template_id), p.handle))
        .unzip();

    join_all(handles)
        .await
        .into_iter()
        .zip(meta)
        .map(|(joined, (to, template_id))| match joined {
            Ok(result) => result,
            Err(err) => {
                let message = join_error_message(err);
                tracing::error!(to = %to, error = %message, "Send task aborted");
                SendResult {
                    template_id,
                    ..SendResult::failed(to, message)
                }
            }
        })
        .collect()
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(message) = payload.downcast_ref::<&str>() {
            return message.to_string();
        }
        if let Some(message) = payload.downcast_ref::<String>() {
            return message.clone();
        }
    }
    GENERIC_FAILURE.to_string()
}

fn log_outcome(result: &SendResult) {
    if result.success {
        tracing::info!(
            to = %result.to,
            message_id = result.message_id.as_deref().unwrap_or_default(),
            template_id = result.template_id.as_deref(),
            "Email sent"
        );
    } else {
        tracing::warn!(
            to = %result.to,
            error = result.error.as_deref().unwrap_or_default(),
            template_id = result.template_id.as_deref(),
            "Email send failed"
        );
    }
}

fn log_batch(results: &[SendResult]) {
    let sent = results.iter().filter(|r| r.success).count();
    tracing::info!(
        total = results.len(),
        sent,
        failed = results.len() - sent,
        "Batch finished"
    );
}
