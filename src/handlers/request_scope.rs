//! Per-request cancellation.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Cancellation token tied to the lifetime of a handler.
///
/// When the client goes away hyper drops the handler future, which drops
/// this value and cancels the token. Backend calls made through
/// `CallGuard::run` observe the token and stop instead of running on.
pub struct RequestScope {
    token: CancellationToken,
    _guard: DropGuard,
}

impl RequestScope {
    pub fn new() -> Self {
        let token = CancellationToken::new();
        let _guard = token.clone().drop_guard();
        Self { token, _guard }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl<S> FromRequestParts<S> for RequestScope
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropping_scope_cancels_token() {
        let scope = RequestScope::new();
        let token = scope.token().clone();
        assert!(!token.is_cancelled());

        drop(scope);
        assert!(token.is_cancelled());
    }
}
