//! Admin account management.
//!
//! # Environment Variables
//!
//! The full API configuration is loaded (`STOREKEEP_DATABASE_URL`,
//! `STOREKEEP_TOKEN_SECRET`, ...) so accounts are created exactly as the
//! server would create them.

use storekeep_api::config::ApiConfig;
use storekeep_api::db::{self, PgStore};
use storekeep_api::services::AuthService;
use storekeep_api::services::auth::TokenCodec;
use storekeep_core::UserId;

use super::CliError;

/// Create a new admin account.
///
/// # Errors
///
/// Returns `CliError::Auth` for invalid input or an email already in use.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<UserId, CliError> {
    let config = ApiConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let store = PgStore::new(db::create_pool(&config.database_url).await?);
    let tokens = TokenCodec::new(config.token_secret.clone());

    let user = AuthService::new(&store, &tokens, config.sessions)
        .create_account(name, email, password, true)
        .await?;

    tracing::info!(
        "Admin account created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}
