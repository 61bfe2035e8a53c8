//! Webhook signing for local testing.
//!
//! Prints the header value a real delivery of the file's bytes would carry,
//! so a payload can be replayed with `curl --data-binary @file`.

use std::path::Path;

use checkout_server::signature::{
    COMMERCE_SIGNATURE_HEADER, PAYMENT_SIGNATURE_HEADER, sign_commerce, sign_payment,
};
use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Failed to read payload: {0}")]
    Io(#[from] std::io::Error),
}

fn secret_from_env(name: &str) -> Result<SecretString, SignError> {
    dotenvy::dotenv().ok();
    std::env::var(name)
        .map(SecretString::from)
        .map_err(|_| SignError::MissingEnvVar(name.to_string()))
}

/// Sign `file` with the payment scheme, timestamped now.
///
/// # Errors
///
/// Returns an error if the secret is unset or the file cannot be read.
pub fn payments(file: &Path, secret_env: &str) -> Result<(), SignError> {
    let secret = secret_from_env(secret_env)?;
    let body = std::fs::read(file)?;
    let header = sign_payment(&secret, &body, chrono::Utc::now().timestamp());

    #[allow(clippy::print_stdout)]
    {
        println!("{PAYMENT_SIGNATURE_HEADER}: {header}");
    }
    Ok(())
}

/// Sign `file` with the commerce scheme.
///
/// # Errors
///
/// Returns an error if the secret is unset or the file cannot be read.
pub fn commerce(file: &Path, secret_env: &str) -> Result<(), SignError> {
    let secret = secret_from_env(secret_env)?;
    let body = std::fs::read(file)?;
    let header = sign_commerce(&secret, &body);

    #[allow(clippy::print_stdout)]
    {
        println!("{COMMERCE_SIGNATURE_HEADER}: {header}");
    }
    Ok(())
}
