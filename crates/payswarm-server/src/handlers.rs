//! HTTP Handlers

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use payswarm_registration::{Pricing, RegistrationError, RegistrationState, RegistrationStatus};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub registration: Option<RegistrationState>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Form the authority posts to the registration callback
#[derive(Debug, Deserialize)]
pub struct CallbackForm {
    #[serde(rename = "encrypted-message")]
    pub encrypted_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KeysResponse {
    pub public_key: String,
    pub public_key_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PricingRequest {
    pub price: String,
    pub auth_rate: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, code: &str, error: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn registration_error(code: &str, e: &RegistrationError) -> HandlerError {
    let status = match e {
        RegistrationError::InvalidPricing(_) => StatusCode::BAD_REQUEST,
        RegistrationError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, code, e.user_message())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
///
/// Reports `degraded` with 503 when the settings store cannot be read.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, registration) = match state.registrar.state() {
        Ok(registration) => (StatusCode::OK, "healthy", Some(registration)),
        Err(e) => {
            tracing::error!("Settings store unavailable: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", None)
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            registration,
        }),
    )
}

/// Stored registration: endpoints, key URL, destination and license
pub async fn registration_status(
    State(state): State<AppState>,
) -> Result<Json<RegistrationStatus>, HandlerError> {
    let status = state.registrar.status().map_err(|e| {
        tracing::error!("Registration status error: {}", e);
        registration_error("STORAGE_ERROR", &e)
    })?;

    Ok(Json(status))
}

/// Start a registration by redirecting the admin to the authority
pub async fn begin_registration(State(state): State<AppState>) -> Result<Redirect, HandlerError> {
    let registrar = state.registrar.clone();

    // Key generation is CPU bound
    let redirect = tokio::task::spawn_blocking(move || registrar.start_or_resume_registration())
        .await
        .map_err(|e| {
            tracing::error!("Registration task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "REGISTRATION_ERROR", "Registration failed")
        })?
        .map_err(|e| {
            tracing::error!("Registration start error: {}", e);
            registration_error("REGISTRATION_ERROR", &e)
        })?;

    Ok(Redirect::to(redirect.url.as_str()))
}

/// Registration callback posted by the authority
///
/// A post without a message starts a new registration instead.
pub async fn registration_callback(
    State(state): State<AppState>,
    Form(form): Form<CallbackForm>,
) -> Result<Response, HandlerError> {
    let Some(message) = form.encrypted_message else {
        return begin_registration(State(state))
            .await
            .map(IntoResponse::into_response);
    };

    let registrar = state.registrar.clone();
    let outcome = tokio::task::spawn_blocking(move || registrar.handle_callback(message.as_bytes()))
        .await
        .map_err(|e| {
            tracing::error!("Callback task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "CALLBACK_ERROR", "Callback processing failed")
        })?;

    if outcome.is_applied() {
        tracing::info!(detail = %outcome.detail, "PaySwarm registration complete");
        let admin_url = state.registrar.config().admin_url.clone();
        Ok(Redirect::to(admin_url.as_str()).into_response())
    } else {
        Err(error_response(
            StatusCode::BAD_REQUEST,
            "REGISTRATION_REJECTED",
            outcome.detail,
        ))
    }
}

/// Public half of the site key pair
pub async fn get_keys(State(state): State<AppState>) -> Result<Json<KeysResponse>, HandlerError> {
    let keys = state
        .registrar
        .current_key_pair()
        .map_err(|e| registration_error("STORAGE_ERROR", &e))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "NO_KEY_PAIR", "No key pair generated yet"))?;

    Ok(Json(KeysResponse {
        public_key: keys.public_key,
        public_key_url: keys.public_key_url,
    }))
}

/// Set the default price and authorization rate
pub async fn set_pricing(
    State(state): State<AppState>,
    Json(payload): Json<PricingRequest>,
) -> Result<StatusCode, HandlerError> {
    let pricing = Pricing::parse(&payload.price, &payload.auth_rate)
        .map_err(|e| registration_error("INVALID_PRICING", &e))?;

    state.registrar.set_default_pricing(pricing).map_err(|e| {
        tracing::error!("Pricing update error: {}", e);
        registration_error("STORAGE_ERROR", &e)
    })?;

    Ok(StatusCode::NO_CONTENT)
}
