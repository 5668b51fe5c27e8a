//! Mail Worker Service - Entry Point
//!
//! Background worker that sends mails for jobs on the `q_mail` Redis stream.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    mailer_email_worker::run().await
}
