//! Registration, email verification, login and profiles.

use crate::{
    mail::{Mail, MailError, Mailer},
    service::{Conflict, Forbidden, Missing, Result, ServiceError},
};
use simpleblog_common::{
    model::{
        Id,
        auth::{AuthToken, AuthTokenHash, Authentication, PasswordHash, require_password},
        otp::{OtpCode, OtpState, PendingOtp, VerificationStatus},
        user::{CreateUser, Email, User, UserMarker, UserName},
    },
    util::PositiveDuration,
};
use simpleblog_db::store::{Store, UniqueKey};
use time::UtcDateTime;
use tracing::{error, info, warn};

async fn deliver_code(
    mailer: &dyn Mailer,
    to: &Email,
    name: &UserName,
    code: &OtpCode,
) -> Result<(), MailError> {
    let mail = Mail::verification_code(to, name, code)?;
    mailer.send(&mail).await
}

/// Creates an unverified user holding a fresh code and mails the code.
///
/// If the mail cannot be delivered the user is removed again, so the email
/// stays free for another attempt.
pub async fn register(
    store: &dyn Store,
    mailer: &dyn Mailer,
    name: &str,
    email: &str,
    password: &str,
    now: UtcDateTime,
) -> Result<User> {
    let name = UserName::new(name)?;
    let email = Email::new(email)?;
    let password = require_password(password)?;

    if store.fetch_user_by_email(&email).await?.is_some() {
        return Err(ServiceError::Conflict(Conflict::EmailTaken));
    }

    let pending = PendingOtp::issue(now);
    let create_user = CreateUser {
        name,
        email,
        password_hash: PasswordHash::hash(password)?,
        verification: VerificationStatus::Unverified(OtpState::PendingCode(pending.clone())),
        created_at: now,
    };

    let user = store
        .create_user(&create_user)
        .await
        .map_err(|err| match err.unique_violation() {
            Some(UniqueKey::UserEmail) => ServiceError::Conflict(Conflict::EmailTaken),
            _ => err.into(),
        })?;

    if let Err(err) = deliver_code(mailer, &user.email, &user.name, &pending.code).await {
        warn!(user_id = %user.id, error = %err, "Verification mail failed, removing new user");
        if let Err(delete_err) = store.delete_user(user.id).await {
            error!(
                user_id = %user.id,
                mail_error = %err,
                error = %delete_err,
                "Could not remove user after failed verification mail"
            );
        }
        return Err(ServiceError::DeliveryFailed(err));
    }

    info!(user_id = %user.id, "Registered user");
    Ok(user)
}

/// Replaces the pending code of an unverified user and mails the new one.
///
/// A failed delivery leaves the new code stored.
pub async fn resend_code(
    store: &dyn Store,
    mailer: &dyn Mailer,
    email: &str,
    now: UtcDateTime,
) -> Result<()> {
    let email = Email::new(email)?;
    let mut user = store
        .fetch_user_by_email(&email)
        .await?
        .ok_or(ServiceError::NotFound(Missing::User))?;

    let pending = user.verification.issue(now)?;
    store.set_verification(user.id, &user.verification).await?;

    deliver_code(mailer, &user.email, &user.name, &pending.code)
        .await
        .map_err(ServiceError::DeliveryFailed)?;

    info!(user_id = %user.id, "Resent verification code");
    Ok(())
}

pub async fn verify_code(
    store: &dyn Store,
    email: &str,
    code: &str,
    now: UtcDateTime,
) -> Result<User> {
    let email = Email::new(email)?;
    let code: OtpCode = code.parse()?;

    let mut user = store
        .fetch_user_by_email(&email)
        .await?
        .ok_or(ServiceError::NotFound(Missing::User))?;

    user.verification.verify(&code, now)?;
    store.set_verification(user.id, &user.verification).await?;

    info!(user_id = %user.id, "Verified email");
    Ok(user)
}

#[derive(Clone, Debug)]
pub struct Login {
    pub token: AuthToken,
    pub user: User,
}

pub async fn login(
    store: &dyn Store,
    email: &str,
    password: &str,
    token_lifetime: Option<PositiveDuration>,
    now: UtcDateTime,
) -> Result<Login> {
    let email = Email::new(email).map_err(|_| ServiceError::Unauthorized)?;
    let user = store
        .fetch_user_by_email(&email)
        .await?
        .ok_or(ServiceError::Unauthorized)?;

    if !user.password_hash.verify(password) {
        return Err(ServiceError::Unauthorized);
    }
    if !user.verification.is_verified() {
        return Err(ServiceError::Forbidden(Forbidden::Unverified));
    }

    let token = AuthToken::generate_random(user.id);
    let authentication = Authentication {
        user: user.id,
        token_hash: token.hash()?,
        created_at: now,
        expires_after: token_lifetime,
    };
    store.create_authentication(&authentication).await?;

    info!(user_id = %user.id, "Logged in");
    Ok(Login { token, user })
}

pub async fn logout(store: &dyn Store, token_hash: &AuthTokenHash) -> Result<()> {
    store.delete_authentication(token_hash).await?;
    Ok(())
}

pub async fn profile(store: &dyn Store, user_id: Id<UserMarker>) -> Result<User> {
    store
        .fetch_user(user_id)
        .await?
        .ok_or(ServiceError::NotFound(Missing::User))
}

pub async fn rename(store: &dyn Store, user_id: Id<UserMarker>, name: &str) -> Result<User> {
    let name = UserName::new(name)?;

    if !store.set_user_name(user_id, &name).await? {
        return Err(ServiceError::NotFound(Missing::User));
    }
    profile(store, user_id).await
}
