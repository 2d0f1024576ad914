use serde::{Deserialize, Serialize};

use super::attachment::ResolvedAttachment;

/// Sender shown in the `From` header of every outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub display_name: String,
    pub address: String,
}

/// One address or an ordered list of addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    /// Comma-joined header value. Order is kept and duplicates are not removed.
    pub fn to_header(&self) -> String {
        match self {
            Recipients::One(addr) => addr.clone(),
            Recipients::Many(addrs) => addrs.join(", "),
        }
    }
}

impl From<&str> for Recipients {
    fn from(addr: &str) -> Self {
        Recipients::One(addr.to_string())
    }
}

impl From<String> for Recipients {
    fn from(addr: String) -> Self {
        Recipients::One(addr)
    }
}

impl From<Vec<String>> for Recipients {
    fn from(addrs: Vec<String>) -> Self {
        Recipients::Many(addrs)
    }
}

impl From<Vec<&str>> for Recipients {
    fn from(addrs: Vec<&str>) -> Self {
        Recipients::Many(addrs.into_iter().map(str::to_string).collect())
    }
}

/// Options for a single, attachment-free send
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailOptions {
    pub to: Recipients,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub html: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Text,
    Html,
}

/// Message body. `alt_text` is only meaningful for HTML bodies, where it
/// becomes the plain text alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    pub kind: BodyKind,
    pub content: String,
    pub alt_text: Option<String>,
}

impl MessageBody {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: BodyKind::Text,
            content: content.into(),
            alt_text: None,
        }
    }

    pub fn html(content: impl Into<String>, alt_text: Option<String>) -> Self {
        Self {
            kind: BodyKind::Html,
            content: content.into(),
            alt_text,
        }
    }
}

/// The message handed to a transport. Built fresh for every send.
#[derive(Debug)]
pub struct OutgoingMessage {
    pub from: SenderIdentity,
    pub to: String,
    pub subject: String,
    pub body: MessageBody,
    pub attachments: Vec<ResolvedAttachment>,
}

impl OutgoingMessage {
    /// HTML part, if the body is HTML
    pub fn html(&self) -> Option<&str> {
        match self.body.kind {
            BodyKind::Html => Some(&self.body.content),
            BodyKind::Text => None,
        }
    }

    /// Plain text part: the body itself, or the alternative of an HTML body
    pub fn text(&self) -> Option<&str> {
        match self.body.kind {
            BodyKind::Text => Some(&self.body.content),
            BodyKind::Html => self.body.alt_text.as_deref(),
        }
    }
}

/// Outcome of one attempted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

impl SendResult {
    pub fn sent(to: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
            to: to.into(),
            template_id: None,
        }
    }

    pub fn failed(to: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            to: to.into(),
            template_id: None,
        }
    }

    pub fn for_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_recipients_join_keeps_order_and_duplicates() {
        let to = Recipients::from(vec!["b@x.com", "a@x.com", "b@x.com"]);
        assert_eq!(to.to_header(), "b@x.com, a@x.com, b@x.com");
        assert_eq!(Recipients::from("solo@x.com").to_header(), "solo@x.com");
    }

    #[test]
    fn test_email_options_from_json() {
        let opts: EmailOptions = serde_json::from_str(
            r#"{"to": ["a@x.com", "b@x.com"], "subject": "S", "content": "C"}"#,
        )
        .expect("Should parse options");

        assert_eq!(opts.to, Recipients::from(vec!["a@x.com", "b@x.com"]));
        assert!(!opts.html);
    }

    #[test]
    fn test_send_result_json_omits_absent_fields() {
        let json = serde_json::to_value(SendResult::failed("unknown", "boom").for_template("welcome"))
            .expect("Should serialize");

        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "error": "boom",
                "to": "unknown",
                "templateId": "welcome"
            })
        );
    }
}
