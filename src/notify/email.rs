use async_trait::async_trait;
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::Notifier;
use crate::config::app::EmailConfig;
use crate::error::DeliveryError;

const CHANNEL: &str = "email";

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

/// Alias matching the other notifier names.
pub type EmailNotifier = EmailSender;

impl EmailSender {
    pub fn from_config(cfg: &EmailConfig) -> Result<Self, DeliveryError> {
        let password = cfg.password.clone().ok_or_else(|| build_err("SMTP_PASS missing"))?;
        let user = cfg.username.clone().unwrap_or_else(|| cfg.from.clone());
        let creds = Credentials::new(user, password);

        let builder = if cfg.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
        }
        .map_err(|e| build_err(format!("invalid smtp host {}: {e}", cfg.smtp_host)))?;
        let mailer = builder.port(cfg.smtp_port).credentials(creds).build();

        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e| build_err(format!("invalid sender {}: {e}", cfg.from)))?;
        let to = cfg
            .to
            .iter()
            .map(|addr| {
                addr.parse::<Mailbox>()
                    .map_err(|e| build_err(format!("invalid recipient {addr}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(build_err("no recipients configured"));
        }

        Ok(Self { mailer, from, to })
    }
}

/// Plain-text Markdown alongside its HTML rendering.
pub fn build_message(
    from: &Mailbox,
    to: &[Mailbox],
    subject: &str,
    report: &str,
) -> Result<Message, DeliveryError> {
    let mut builder = Message::builder().from(from.clone()).subject(subject);
    for rcpt in to {
        builder = builder.to(rcpt.clone());
    }
    builder
        .multipart(MultiPart::alternative_plain_html(
            report.to_string(),
            markdown_to_html(report),
        ))
        .map_err(|e| build_err(e.to_string()))
}

pub fn markdown_to_html(md: &str) -> String {
    use pulldown_cmark::{html, Options, Parser};
    let parser = Parser::new_ext(md, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    let mut out = String::with_capacity(md.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

#[async_trait]
impl Notifier for EmailSender {
    fn channel(&self) -> &'static str {
        CHANNEL
    }

    async fn notify(&self, subject: &str, report: &str) -> Result<(), DeliveryError> {
        let msg = build_message(&self.from, &self.to, subject, report)?;
        self.mailer
            .send(msg)
            .await
            .map_err(|e| DeliveryError::Transport {
                channel: CHANNEL,
                message: e.to_string(),
            })?;
        Ok(())
    }
}

fn build_err(message: impl Into<String>) -> DeliveryError {
    DeliveryError::Build {
        channel: CHANNEL,
        message: message.into(),
    }
}
