//! Job router: turns a [`MailJob`] into lookup, render, send and token steps.
//!
//! Steps run strictly in that order and the first failure stops the job, so
//! a token is never recorded for a mail that was not sent.
//!
//! There is no transaction across send and record. Once the mail is out, the
//! token write is retried in place with backoff; if it still fails the job
//! ends with [`JobError::Persist`], which is permanent, so the message is
//! dead-lettered instead of being redelivered and the mail is sent only once.

use async_trait::async_trait;
use database::{retry_with_backoff, RetryConfig};
use serde_json::json;
use std::sync::Arc;
use stream_worker::{StreamError, StreamProcessor};
use tracing::{debug, info};

use crate::dispatcher::MailDispatcher;
use crate::error::{JobError, JobResult};
use crate::localizer::Localizer;
use crate::models::{JobKind, MailJob, RenderedMessage};
use crate::templates::{TemplateEngine, TemplateName};
use crate::tokens::{TokenKind, TokenRecorder};
use crate::users::UserDirectory;

const REGISTER_PATH: &str = "/api/v1/register/";
const RESET_PASSWORD_PATH: &str = "/api/v1/resetpassword/";

/// Retries for the token write after a mail has been sent.
fn default_token_retry() -> RetryConfig {
    RetryConfig::new()
        .with_max_retries(3)
        .with_initial_delay(200)
        .with_max_delay(2_000)
}

/// Everything that differs between the link mails.
struct LinkMail {
    template: TemplateName,
    subject_key: &'static str,
    url_path: &'static str,
    token: TokenKind,
}

const EMAIL_VERIFICATION: LinkMail = LinkMail {
    template: TemplateName::EmailVerificationText,
    subject_key: "emails.registerMail.subject",
    url_path: REGISTER_PATH,
    token: TokenKind::Confirmation,
};

const PASSWORD_RESET: LinkMail = LinkMail {
    template: TemplateName::PasswordResetText,
    subject_key: "emails.passwordReset.subject",
    url_path: RESET_PASSWORD_PATH,
    token: TokenKind::PasswordReset,
};

/// Routes mail jobs by type.
#[derive(Clone)]
pub struct JobRouter {
    users: Arc<dyn UserDirectory>,
    localizer: Arc<Localizer>,
    templates: Arc<TemplateEngine>,
    dispatcher: MailDispatcher,
    tokens: TokenRecorder,
    token_retry: RetryConfig,
    company_name: String,
}

impl JobRouter {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        localizer: Arc<Localizer>,
        templates: Arc<TemplateEngine>,
        dispatcher: MailDispatcher,
        tokens: TokenRecorder,
        company_name: impl Into<String>,
    ) -> Self {
        Self {
            users,
            localizer,
            templates,
            dispatcher,
            tokens,
            token_retry: default_token_retry(),
            company_name: company_name.into(),
        }
    }

    pub fn with_token_retry(mut self, retry: RetryConfig) -> Self {
        self.token_retry = retry;
        self
    }

    pub async fn route(&self, job: &MailJob) -> JobResult<()> {
        match &job.kind {
            JobKind::EmailVerification => self.send_link_mail(job, &EMAIL_VERIFICATION).await,
            JobKind::ResetPassword => self.send_link_mail(job, &PASSWORD_RESET).await,
            JobKind::Login => {
                debug!(receiver_id = %job.receiver_id, "Login job, nothing to send");
                Ok(())
            }
            JobKind::Unknown(tag) => Err(JobError::UnknownJobType(tag.clone())),
        }
    }

    async fn send_link_mail(&self, job: &MailJob, mail: &LinkMail) -> JobResult<()> {
        let app_domain = job.app_domain().ok_or(JobError::MissingData("appDomain"))?;
        let url_path = job.url_path().ok_or(JobError::MissingData("urlPath"))?;

        let user = self.users.get_user_data(&job.receiver_id).await?;

        debug!(
            job_type = %job.kind,
            receiver_id = %job.receiver_id,
            to = %user.email,
            "Sending mail"
        );

        let t = self.localizer.resolve(user.language.as_deref());
        let params = json!({
            "username": user.username,
            "registrationUrl": format!("{}{}{}", app_domain, mail.url_path, url_path),
            "companyName": self.company_name,
        });

        let message = RenderedMessage {
            subject: t.t(mail.subject_key, &params)?,
            body: self.templates.render_template(mail.template, &t, &params)?,
        };

        self.dispatcher.send(&user.email, &message).await?;

        let owner_id = job.receiver_id.as_str();
        retry_with_backoff(
            || self.tokens.record(mail.token, url_path, owner_id),
            self.token_retry.clone(),
        )
        .await?;

        info!(
            job_type = %job.kind,
            receiver_id = %job.receiver_id,
            language = t.language(),
            "Mail job completed"
        );
        Ok(())
    }
}

#[async_trait]
impl StreamProcessor<MailJob> for JobRouter {
    async fn process(&self, job: &MailJob) -> Result<(), StreamError> {
        Ok(self.route(job).await?)
    }

    fn name(&self) -> &'static str {
        "mail_job_router"
    }
}
