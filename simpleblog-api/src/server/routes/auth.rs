use crate::{
    mail::Mailer,
    server::{
        Result, ServerError, ServerRouter, Settings,
        auth::AuthenticatedUser,
        extract::{Created, Json},
    },
    service::account,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use simpleblog_common::model::user::User;
use simpleblog_db::store::Store;
use std::sync::Arc;
use time::UtcDateTime;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(resend_otp)
        .typed_post(verify_otp)
        .typed_post(login)
        .typed_post(logout)
}

#[derive(Clone, Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/register", rejection(ServerError))]
struct RegisterPath();

#[derive(Clone, Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    message: &'static str,
    user: User,
    needs_verification: bool,
}

async fn register(
    RegisterPath(): RegisterPath,
    State(store): State<Arc<dyn Store>>,
    State(mailer): State<Arc<dyn Mailer>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Created<RegisterResponse>> {
    let user = account::register(
        &*store,
        &*mailer,
        &request.name,
        &request.email,
        &request.password,
        UtcDateTime::now(),
    )
    .await?;

    Ok(Created(RegisterResponse {
        message: "User created successfully. Please check your email for verification code.",
        user,
        needs_verification: true,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/resend-otp", rejection(ServerError))]
struct ResendOtpPath();

#[derive(Clone, Debug, Deserialize)]
struct ResendOtpRequest {
    #[serde(default)]
    email: String,
}

async fn resend_otp(
    ResendOtpPath(): ResendOtpPath,
    State(store): State<Arc<dyn Store>>,
    State(mailer): State<Arc<dyn Mailer>>,
    Json(request): Json<ResendOtpRequest>,
) -> Result<Json<MessageResponse>> {
    account::resend_code(&*store, &*mailer, &request.email, UtcDateTime::now()).await?;

    Ok(Json(MessageResponse {
        message: "Verification code sent successfully",
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/verify-otp", rejection(ServerError))]
struct VerifyOtpPath();

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOtpRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    otp_code: String,
}

#[derive(Clone, Debug, Serialize)]
struct VerifyOtpResponse {
    message: &'static str,
    user: User,
}

async fn verify_otp(
    VerifyOtpPath(): VerifyOtpPath,
    State(store): State<Arc<dyn Store>>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>> {
    let user =
        account::verify_code(&*store, &request.email, &request.otp_code, UtcDateTime::now())
            .await?;

    Ok(Json(VerifyOtpResponse {
        message: "Email verified successfully",
        user,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login", rejection(ServerError))]
struct LoginPath();

#[derive(Clone, Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Clone, Debug, Serialize)]
struct LoginResponse {
    token: String,
    user: User,
}

async fn login(
    LoginPath(): LoginPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let login = account::login(
        &*store,
        &request.email,
        &request.password,
        settings.auth_token_lifetime,
        UtcDateTime::now(),
    )
    .await?;

    Ok(Json(LoginResponse {
        token: login.token.as_token_str(),
        user: login.user,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    account::logout(&*store, user.token_hash()).await?;

    Ok(StatusCode::NO_CONTENT)
}
