//! Delivery of activation tokens to newly registered users.

use thiserror::Error;

use crate::data::{Account, Token};

#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Sends the one-time activation token to the account's address.
pub trait Mailer: Send + Sync {
    fn send_activation(&self, account: &Account, token: &Token) -> Result<(), MailError>;
}

/// Writes the activation message to the log instead of sending it.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_activation(&self, account: &Account, token: &Token) -> Result<(), MailError> {
        tracing::info!(
            user_id = account.id,
            recipient = %account.email,
            activation_token = %token.plaintext,
            expiry = %token.expiry,
            "Activation message"
        );
        Ok(())
    }
}
