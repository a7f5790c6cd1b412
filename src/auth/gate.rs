//! Bearer-token authorization.
//!
//! `NoToken -> Verifying -> {Rejected(401) | RoleMismatch(403) | Authorized}`;
//! every request is authorized on its own, there is no retry.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::{
    auth::{claims::Claims, jwt::JwtKeys, repo_types::Role},
    error::{AuthError, AuthResult},
};

/// Verify the `Authorization: Bearer <token>` header and return its claims.
pub fn authorize(headers: &HeaderMap, keys: &JwtKeys) -> AuthResult<Claims> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        AuthError::from(e)
    })
}

/// Role requirement for a group of routes.
#[derive(Clone)]
pub struct RoleGate {
    keys: JwtKeys,
    required: Role,
}

impl RoleGate {
    pub fn new(keys: JwtKeys, required: Role) -> Self {
        Self { keys, required }
    }

    pub fn check(&self, headers: &HeaderMap) -> AuthResult<Claims> {
        let claims = authorize(headers, &self.keys)?;
        if claims.role != self.required {
            warn!(user_id = %claims.sub, role = %claims.role, required = %self.required, "role mismatch");
            return Err(AuthError::Forbidden);
        }
        Ok(claims)
    }
}

/// Middleware: reject unless the caller holds the gate's role, then expose
/// the verified [`Claims`] to the handler as a request extension.
pub async fn require_role(
    State(gate): State<RoleGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = gate.check(request.headers())?;
    debug!(user_id = %claims.sub, role = %claims.role, "authorized");
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
