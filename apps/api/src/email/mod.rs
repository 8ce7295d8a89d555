//! Outbound email through the SendGrid v3 `mail/send` API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub mod handlers;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("invalid email address: '{0}'")]
    InvalidAddress(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SendGrid rejected the message (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// One address or several. Accepts both `"a@x.com"` and `["a@x.com", ...]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    pub fn addresses(&self) -> Vec<&str> {
        match self {
            Recipients::One(a) => vec![a.as_str()],
            Recipients::Many(list) => list.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Recipients::One(address.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmail {
    pub to: Recipients,
    pub subject: String,
    pub html: String,
    pub from: Option<String>,
    pub cc: Option<Recipients>,
    pub bcc: Option<Recipients>,
    pub reply_to: Option<String>,
}

impl SendEmail {
    pub fn new(to: &str, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            from: None,
            cc: None,
            bcc: None,
            reply_to: None,
        }
    }

    /// Every address on the message must look like `local@domain.tld`.
    pub fn validate(&self) -> Result<(), EmailError> {
        let mut all = self.to.addresses();
        if all.is_empty() {
            return Err(EmailError::InvalidAddress(String::new()));
        }
        all.extend(self.cc.iter().chain(&self.bcc).flat_map(Recipients::addresses));
        all.extend(self.from.as_deref());
        all.extend(self.reply_to.as_deref());

        match all.into_iter().find(|a| !is_valid_address(a)) {
            Some(bad) => Err(EmailError::InvalidAddress(bad.to_string())),
            None => Ok(()),
        }
    }
}

pub fn is_valid_address(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
        }
        None => false,
    }
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<Vec<Address<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bcc: Option<Vec<Address<'a>>>,
    subject: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct MailSendBody<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<Address<'a>>,
    content: Vec<Content<'a>>,
}

fn addresses(recipients: &Recipients) -> Vec<Address<'_>> {
    recipients
        .addresses()
        .into_iter()
        .map(|email| Address { email })
        .collect()
}

fn mail_send_body<'a>(message: &'a SendEmail, from: &'a str) -> MailSendBody<'a> {
    MailSendBody {
        personalizations: vec![Personalization {
            to: addresses(&message.to),
            cc: message.cc.as_ref().map(addresses),
            bcc: message.bcc.as_ref().map(addresses),
            subject: &message.subject,
        }],
        from: Address { email: from },
        reply_to: message.reply_to.as_deref().map(|email| Address { email }),
        content: vec![Content {
            kind: "text/html",
            value: &message.html,
        }],
    }
}

#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_key: Option<String>,
    default_from: Option<String>,
}

impl EmailClient {
    pub fn new(client: Client, api_key: Option<String>, default_from: Option<String>) -> Self {
        Self {
            client,
            api_key,
            default_from,
        }
    }

    pub async fn send(&self, message: &SendEmail) -> Result<(), EmailError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(EmailError::NotConfigured("SendGrid API key"))?;
        let from = message
            .from
            .as_deref()
            .or(self.default_from.as_deref())
            .ok_or(EmailError::NotConfigured("Sender email"))?;
        message.validate()?;

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(api_key)
            .json(&mail_send_body(message, from))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        info!("Email sent to {} recipient(s)", message.to.addresses().len());
        Ok(())
    }
}
