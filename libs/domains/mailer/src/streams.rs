//! Stream definitions for the mailer domain.

use stream_worker::StreamDef;

/// Mail job queue consumed by the email worker.
pub struct MailStream;

impl StreamDef for MailStream {
    const STREAM_NAME: &'static str = "q_mail";

    const CONSUMER_GROUP: &'static str = "mail_workers";

    /// Rejected jobs, kept with their raw payload and error.
    const DLQ_STREAM: &'static str = "q_mail:dlq";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_stream_def() {
        assert_eq!(MailStream::STREAM_NAME, "q_mail");
        assert_eq!(MailStream::CONSUMER_GROUP, "mail_workers");
        assert_eq!(MailStream::DLQ_STREAM, "q_mail:dlq");
        assert_eq!(MailStream::MAX_LENGTH, 100_000);
    }
}
