use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::context::UserIdentity;

pub const USER_HEADER: &str = "x-user";
pub const ROLES_HEADER: &str = "x-roles";

// Stand-in for a real auth layer: trusts `x-user` / `x-roles` (comma-separated)
pub async fn header_identity(mut req: Request, next: Next) -> Response {
    if let Some(user) = identity_from_headers(req.headers()) {
        req.extensions_mut().insert(user);
    }
    next.run(req).await
}

pub fn identity_from_headers(headers: &axum::http::HeaderMap) -> Option<UserIdentity> {
    let username = headers.get(USER_HEADER)?.to_str().ok()?.trim();
    if username.is_empty() {
        return None;
    }

    let roles: Vec<String> = headers
        .get(ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(|r| r.trim())
                .filter(|r| !r.is_empty())
                .map(|r| r.to_string())
                .collect()
        })
        .unwrap_or_default();

    Some(UserIdentity::new(username, roles))
}
