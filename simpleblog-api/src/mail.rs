//! Outgoing mail.
//!
//! Messages are rendered from askama templates and delivered through a
//! [`Mailer`]; production uses an SMTP relay.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::{ExposeSecret, SecretString};
use simpleblog_common::model::{
    otp::{OTP_VALIDITY, OtpCode},
    user::{Email, UserName},
};
use thiserror::Error;
use tracing::info;

pub const VERIFICATION_SUBJECT: &str = "Verify Your Email - SimpleBlog";

#[derive(Template)]
#[template(path = "email/verification_code.html")]
struct VerificationCodeHtml<'a> {
    name: &'a str,
    code: &'a str,
    validity_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/verification_code.txt")]
struct VerificationCodeText<'a> {
    name: &'a str,
    code: &'a str,
    validity_minutes: i64,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered message with plain text and HTML alternatives.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Mail {
    pub to: Email,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl Mail {
    pub fn verification_code(
        to: &Email,
        name: &UserName,
        code: &OtpCode,
    ) -> Result<Self, MailError> {
        let validity_minutes = OTP_VALIDITY.whole_minutes();
        let html_body = VerificationCodeHtml {
            name: name.get(),
            code: code.get(),
            validity_minutes,
        }
        .render()?;
        let text_body = VerificationCodeText {
            name: name.get(),
            code: code.get(),
            validity_minutes,
        }
        .render()?;

        Ok(Self {
            to: to.clone(),
            subject: VERIFICATION_SUBJECT.to_owned(),
            text_body,
            html_body,
        })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<(), MailError>;
}

#[derive(Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from: String,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let credentials = Credentials::new(
            settings.username.clone(),
            settings.password.expose_secret().to_owned(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port)
            .credentials(credentials)
            .build();
        let from = settings
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(settings.from.clone()))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        let to: Mailbox = mail
            .to
            .get()
            .parse()
            .map_err(|_| MailError::InvalidAddress(mail.to.get().to_owned()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&mail.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(mail.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(mail.html_body.clone()),
                    ),
            )?;

        self.transport.send(message).await?;

        info!(to = %mail.to.get(), subject = %mail.subject, "Email sent");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use crate::mail::{Mail, VERIFICATION_SUBJECT};
    use simpleblog_common::model::user::{Email, UserName};

    #[test]
    fn verification_mail_contains_the_code() {
        let code = "123456".parse().unwrap();
        let mail = Mail::verification_code(
            &Email::new("ada@example.com").unwrap(),
            &UserName::new("Ada <3").unwrap(),
            &code,
        )
        .unwrap();

        assert_eq!(mail.subject, VERIFICATION_SUBJECT);
        assert!(mail.text_body.contains("123456"));
        assert!(mail.text_body.contains("Hi Ada <3,"));
        assert!(mail.text_body.contains("expire in 10 minutes"));
        assert!(mail.html_body.contains("<div class=\"otp-code\">123456</div>"));
        assert!(
            mail.html_body.contains("Hi Ada &#60;3,") || mail.html_body.contains("Hi Ada &lt;3,")
        );
    }
}
