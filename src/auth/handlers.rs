use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        claims::Claims,
        dto::{
            HistoryQuery, HistoryResponse, LoginRequest, LoginResponse, MessageResponse,
            NgoRegistrationRequest, SignupRequest, UserResponse,
        },
        extractors::{AuthUser, ClientInfo},
        gate::{require_role, RoleGate},
        jwt::JwtKeys,
        repo_types::Role,
        services::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT},
    },
    error::{AuthError, AuthResult, FieldIssue},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/login-history", get(login_history))
}

/// Routes reachable only with an admin token.
pub fn admin_routes(keys: JwtKeys) -> Router<AppState> {
    Router::new()
        .route("/ngos", post(register_ngo))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::new(keys, Role::Admin),
            require_role,
        ))
}

fn body<T>(message: &'static str, payload: Result<Json<T>, JsonRejection>) -> AuthResult<T> {
    payload.map(|Json(v)| v).map_err(|rejection| {
        AuthError::validation(message, vec![FieldIssue::new("body", rejection.body_text())])
    })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> AuthResult<(StatusCode, Json<UserResponse>)> {
    let req = body("Invalid signup data", payload)?;
    let user = state.auth.register(&req).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "Account created",
            user,
        }),
    ))
}

#[instrument(skip(state, client, payload))]
pub async fn login(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<Json<LoginResponse>> {
    let req = body("Invalid login data", payload)?;
    let out = state.auth.authenticate(&req, client).await?;
    Ok(Json(LoginResponse {
        message: "Authenticated",
        token: out.token,
        user: out.user,
    }))
}

/// Tokens are stateless; the client simply discards its copy.
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Logged out successfully",
    })
}

#[instrument(skip(state, claims, query), fields(user_id = %claims.sub))]
pub async fn login_history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> AuthResult<Json<HistoryResponse>> {
    let bad_limit = || {
        AuthError::validation(
            "Invalid query",
            vec![FieldIssue::new("limit", "limit must be a positive integer")],
        )
    };
    let Query(q) = query.map_err(|_| bad_limit())?;
    let limit = match q.limit {
        None => DEFAULT_HISTORY_LIMIT,
        Some(n) if n >= 1 => n.min(MAX_HISTORY_LIMIT),
        Some(_) => return Err(bad_limit()),
    };

    let history = state.auth.login_history(claims.sub, limit).await?;
    Ok(Json(HistoryResponse {
        history: history.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.sub))]
pub async fn register_ngo(
    State(state): State<AppState>,
    Extension(admin): Extension<Claims>,
    payload: Result<Json<NgoRegistrationRequest>, JsonRejection>,
) -> AuthResult<(StatusCode, Json<UserResponse>)> {
    let req = body("Invalid NGO data", payload)?;
    let user = state.auth.register_ngo(&req).await?;
    info!(admin_id = %admin.sub, ngo_id = %user.id, "ngo provisioned");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "NGO account created",
            user,
        }),
    ))
}
