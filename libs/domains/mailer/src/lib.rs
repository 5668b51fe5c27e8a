//! Mailer Domain
//!
//! Turns queued mail jobs into sent, localized plain-text mails and records
//! the one-time tokens their links carry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Redis Stream   │  ← q_mail, consumer group mail_workers
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   JobRouter     │  ← StreamProcessor<MailJob>
//! └────────┬────────┘
//!          │ lookup → render → send → record token
//! ┌────────▼────────┐
//! │ UserDirectory   │  ← PostgreSQL
//! │ Localizer       │  ← bundled de/en catalogs
//! │ TemplateEngine  │  ← Handlebars layouts
//! │ MailDispatcher  │  ← SMTP
//! │ TokenRecorder   │  ← Redis
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_mailer::{JobRouter, MailStream};
//! use stream_worker::{StreamConsumer, StreamWorker, WorkerConfig};
//!
//! let router = JobRouter::new(users, localizer, templates, dispatcher, tokens, "Acme");
//! let config = WorkerConfig::from_stream_def::<MailStream>();
//! let queue = Arc::new(StreamConsumer::new(redis, config.clone()));
//! StreamWorker::new(queue, Arc::new(router), config.failure_policy, &config.stream_name)
//!     .run(shutdown_rx)
//!     .await?;
//! ```

pub mod dispatcher;
pub mod error;
pub mod localizer;
pub mod models;
pub mod processor;
pub mod providers;
pub mod streams;
pub mod templates;
pub mod tokens;
pub mod users;

pub use dispatcher::{MailDispatcher, Sender};
pub use error::{
    CatalogError, DispatchError, JobError, JobResult, LookupError, PersistError, RenderError,
};
pub use localizer::{Catalog, Localizer, Translator, DEFAULT_FALLBACK_LANGUAGE};
pub use models::{JobData, JobKind, MailJob, RenderedMessage, UserData};
pub use processor::JobRouter;
pub use providers::{
    MailTransport, OutgoingMail, RecordingTransport, SentMail, SmtpConfig, SmtpTls, SmtpTransport,
};
pub use streams::MailStream;
pub use templates::{TemplateEngine, TemplateName};
pub use tokens::{
    InMemoryTokenStore, RedisTokenStore, TokenKind, TokenRecord, TokenRecorder, TokenStore,
    TokenTtl,
};
pub use users::{PgUserDirectory, UserDirectory, DEFAULT_USERS_TABLE};
