use serde_json::{json, Value};

/// One outbound email: recipient, sender, subject, and text/html bodies.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

impl MailMessage {
    /// Build the v3 Mail Send request payload.
    pub fn to_payload(&self) -> Value {
        let mut content = vec![json!({"type": "text/plain", "value": self.text})];
        if let Some(html) = &self.html {
            content.push(json!({"type": "text/html", "value": html}));
        }
        json!({
            "personalizations": [{"to": [{"email": self.to}]}],
            "from": {"email": self.from},
            "subject": self.subject,
            "content": content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_includes_html_part_when_present() {
        let message = MailMessage {
            to: "provider@example.com".into(),
            from: "noreply@example.org".into(),
            subject: "hello".into(),
            text: "plain".into(),
            html: Some("<p>rich</p>".into()),
        };

        let payload = message.to_payload();
        let content = payload["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[1]["type"], "text/html");
    }

    #[test]
    fn payload_omits_html_part_when_absent() {
        let message = MailMessage {
            to: "provider@example.com".into(),
            from: "noreply@example.org".into(),
            subject: "hello".into(),
            text: "plain".into(),
            html: None,
        };

        let payload = message.to_payload();
        assert_eq!(payload["content"].as_array().unwrap().len(), 1);
    }
}
