use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use braid_core::identity::{Caller, ClientId, UserId};

/// Header anonymous clients use to carry their locally-persisted id.
pub const ANON_ID_HEADER: &str = "x-anon-id";

/// Boundary to the external identity provider: map a bearer token to a
/// stable user id, or nothing.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<UserId>;
}

/// Fixed token→user mapping, configured at startup. Stands in for a real
/// identity provider in development and tests.
pub struct StaticTokenResolver {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenResolver {
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tokens: pairs
                .into_iter()
                .map(|(token, user)| (token, UserId::from_raw(user)))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityResolver for StaticTokenResolver {
    async fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token).cloned()
    }
}

/// Resolve the caller for one request: a valid bearer token wins; otherwise
/// the anonymous-id header; otherwise no identity.
pub async fn caller_from_headers(
    headers: &HeaderMap,
    resolver: &dyn IdentityResolver,
) -> Option<Caller> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            if let Some(user) = resolver.resolve(token).await {
                return Some(Caller::User(user));
            }
        }
    }

    headers
        .get(ANON_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|id| Caller::Anonymous(ClientId::from_raw(id)))
}
