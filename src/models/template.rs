use serde::Deserialize;

use super::attachment::AttachmentSpec;
use super::message::{MessageBody, Recipients};

/// Reusable message definition. `to` may be left out and supplied at send time.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    pub id: String,
    pub subject: String,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub to: Option<Recipients>,
    #[serde(default)]
    pub attachments: Vec<AttachmentSpec>,
}

impl EmailTemplate {
    /// HTML wins when present, with any text kept as the plain alternative.
    /// Empty strings count as absent; `None` means there is nothing to send.
    pub fn body(&self) -> Option<MessageBody> {
        let html = self.html.as_deref().filter(|s| !s.is_empty());
        let text = self.text.as_deref().filter(|s| !s.is_empty());

        match (html, text) {
            (Some(html), alt) => Some(MessageBody::html(html, alt.map(str::to_string))),
            (None, Some(text)) => Some(MessageBody::text(text)),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BodyKind;
    use pretty_assertions::assert_eq;

    fn template(html: Option<&str>, text: Option<&str>) -> EmailTemplate {
        EmailTemplate {
            id: "t".to_string(),
            subject: "s".to_string(),
            html: html.map(str::to_string),
            text: text.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_body_selection() {
        let text_only = template(None, Some("plain")).body().expect("text body");
        assert_eq!(text_only, MessageBody::text("plain"));

        let both = template(Some("<p>hi</p>"), Some("hi")).body().expect("html body");
        assert_eq!(both.kind, BodyKind::Html);
        assert_eq!(both.alt_text.as_deref(), Some("hi"));

        let html_empty_text = template(Some("<p>hi</p>"), Some("")).body().expect("html body");
        assert_eq!(html_empty_text.alt_text, None);

        assert!(template(None, None).body().is_none());
        assert!(template(Some(""), Some("")).body().is_none());
    }

    #[test]
    fn test_template_from_json() {
        let parsed: Vec<EmailTemplate> = serde_json::from_str(
            r#"[
                {"id": "welcome", "subject": "Hi", "html": "<b>hi</b>", "to": "a@x.com"},
                {"id": "report", "subject": "Report", "text": "see attached",
                 "attachments": [{"filename": "r.csv", "contentType": "text/csv", "content": "a,b"}]}
            ]"#,
        )
        .expect("Should parse templates");

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].to, Some(Recipients::from("a@x.com")));
        assert_eq!(parsed[1].to, None);
        assert_eq!(parsed[1].attachments.len(), 1);
    }
}
