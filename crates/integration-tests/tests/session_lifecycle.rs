//! Login, refresh, revocation and the auth gate.

#![allow(clippy::unwrap_used)]

use chrono::TimeDelta;
use secrecy::SecretString;

use storekeep_api::db::SessionStore;
use storekeep_api::services::AuthError;
use storekeep_api::services::auth::{SessionSettings, TokenCodec, TokenError};
use storekeep_integration_tests::{PASSWORD, TestContext};

#[tokio::test]
async fn test_refresh_keeps_the_session_id() {
    let ctx = TestContext::new();
    ctx.customer("keep@example.com").await;

    let login = ctx.auth().login("keep@example.com", PASSWORD).await.unwrap();
    let refreshed = ctx.auth().refresh(&login.refresh_token).await.unwrap();
    assert_eq!(refreshed.session_id, login.session_id);

    let claims = ctx.tokens.verify(&refreshed.access_token).unwrap();
    assert_eq!(claims.sid, login.session_id);
    assert_eq!(claims.sub, login.user.id);
    assert_ne!(refreshed.access_token, login.access_token);

    let gate = ctx.auth().authenticate(&refreshed.access_token).await.unwrap();
    assert_eq!(gate.sid, login.session_id);
}

#[tokio::test]
async fn test_revoked_session_cannot_refresh() {
    let ctx = TestContext::new();
    ctx.customer("revoked@example.com").await;
    let login = ctx.auth().login("revoked@example.com", PASSWORD).await.unwrap();

    ctx.auth().revoke_session(login.session_id).await.unwrap();

    assert!(matches!(
        ctx.auth().refresh(&login.refresh_token).await,
        Err(AuthError::SessionRevoked)
    ));
    assert!(matches!(
        ctx.auth().authenticate(&login.access_token).await,
        Err(AuthError::SessionRevoked)
    ));

    let session = ctx.store.get_session(login.session_id).await.unwrap().unwrap();
    assert!(session.is_revoked);
}

#[tokio::test]
async fn test_gate_without_revocation_checks_only_the_token() {
    let ctx = TestContext::with_sessions(SessionSettings {
        enforce_revocation: false,
        ..SessionSettings::default()
    });
    ctx.customer("lenient@example.com").await;
    let login = ctx.auth().login("lenient@example.com", PASSWORD).await.unwrap();

    ctx.auth().revoke_session(login.session_id).await.unwrap();

    // Access tokens stay valid until they expire; refresh is still refused.
    assert!(ctx.auth().authenticate(&login.access_token).await.is_ok());
    assert!(ctx.auth().refresh(&login.refresh_token).await.is_err());
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let ctx = TestContext::new();
    ctx.customer("bye@example.com").await;
    let login = ctx.auth().login("bye@example.com", PASSWORD).await.unwrap();

    ctx.auth().logout(login.session_id).await.unwrap();
    ctx.auth().logout(login.session_id).await.unwrap();

    assert!(matches!(
        ctx.auth().refresh(&login.refresh_token).await,
        Err(AuthError::SessionNotFound)
    ));
}

#[tokio::test]
async fn test_access_token_is_not_a_refresh_token() {
    let ctx = TestContext::new();
    ctx.customer("swap@example.com").await;
    let login = ctx.auth().login("swap@example.com", PASSWORD).await.unwrap();

    assert!(matches!(
        ctx.auth().refresh(&login.access_token).await,
        Err(AuthError::InvalidSession)
    ));
}

#[tokio::test]
async fn test_expired_tokens_are_rejected() {
    let ctx = TestContext::with_sessions(SessionSettings {
        access_ttl: TimeDelta::seconds(-5),
        refresh_ttl: TimeDelta::seconds(-1),
        enforce_revocation: true,
    });
    ctx.customer("late@example.com").await;
    let login = ctx.auth().login("late@example.com", PASSWORD).await.unwrap();

    assert!(matches!(
        ctx.auth().refresh(&login.refresh_token).await,
        Err(AuthError::Token(TokenError::Expired))
    ));
    assert!(matches!(
        ctx.auth().authenticate(&login.access_token).await,
        Err(AuthError::Token(TokenError::Expired))
    ));
}

#[tokio::test]
async fn test_tokens_from_another_key_are_rejected() {
    let ctx = TestContext::new();
    ctx.customer("forged@example.com").await;
    let login = ctx.auth().login("forged@example.com", PASSWORD).await.unwrap();

    let forged_ctx = TestContext {
        tokens: TokenCodec::new(SecretString::from(
            "some-other-deployment-key-1234567890".to_owned(),
        )),
        ..ctx.clone()
    };

    assert!(matches!(
        forged_ctx.auth().authenticate(&login.access_token).await,
        Err(AuthError::Token(TokenError::InvalidSignature))
    ));
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_look_alike() {
    let ctx = TestContext::new();
    ctx.customer("real@example.com").await;

    let wrong = ctx.auth().login("real@example.com", "not-the-password").await;
    let unknown = ctx.auth().login("ghost@example.com", PASSWORD).await;
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_deleting_an_account_ends_every_device_session() {
    let ctx = TestContext::new();
    let admin = ctx
        .auth()
        .create_account("Root", "root@example.com", PASSWORD, true)
        .await
        .unwrap();
    let laptop = ctx.auth().login("root@example.com", PASSWORD).await.unwrap();
    let phone = ctx.auth().login("root@example.com", PASSWORD).await.unwrap();

    ctx.auth()
        .delete_account(admin.id, laptop.session_id)
        .await
        .unwrap();

    assert!(ctx.auth().authenticate(&laptop.access_token).await.is_err());
    assert!(matches!(
        ctx.auth().authenticate(&phone.access_token).await,
        Err(AuthError::SessionRevoked)
    ));
    assert!(matches!(
        ctx.auth().refresh(&phone.refresh_token).await,
        Err(AuthError::SessionRevoked)
    ));

    // A new account on the same email starts with no inherited sessions.
    ctx.customer("root@example.com").await;
    assert!(ctx.auth().refresh(&phone.refresh_token).await.is_err());
}
