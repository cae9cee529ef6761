//! Access gate.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → identity from the trusted header
//!     → cache hit:  attach bearer token, continue to the relay
//!     → login path: parse form → validate with identity provider
//!                   → ok: cache + 302 to the app root | fail: 401 + login page
//!     → otherwise:  200 + login page
//! ```
//!
//! # Design Decisions
//! - The identity header only picks the cache slot and pre-fills the form;
//!   a token is cached only after the identity provider accepts it
//! - There is no logout; entries leave the cache when their TTL runs out
//! - WebSocket upgrades are not gated

pub mod cache;
pub mod identity;
pub mod login;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use url::Url;

use crate::http::context::RequestContext;
use crate::http::response;
use crate::observability::metrics;
use crate::proxy::{GateSettings, ProxyConfiguration};

pub use cache::CredentialCache;
pub use identity::{IdentityError, IdentityProvider};
pub use login::{LoginForm, LoginPage};

const MAX_FORM_BYTES: usize = 64 * 1024;
const IDENTITY_TIMEOUT: Duration = Duration::from_secs(10);

/// What the gate decided for one request.
pub enum GateOutcome {
    /// Forward to the relay with this body; credentials are in the context.
    Authenticated(Body),
    /// The gate answered the request itself.
    PresentingLogin(Response),
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    settings: GateSettings,
    cache: CredentialCache,
    provider: IdentityProvider,
}

impl AccessGate {
    pub fn new(settings: &GateSettings) -> Result<Self, IdentityError> {
        let provider = IdentityProvider::new(settings.workspace_url.clone(), IDENTITY_TIMEOUT)?;
        Ok(Self {
            cache: CredentialCache::new(settings.credential_ttl, settings.max_entries),
            settings: settings.clone(),
            provider,
        })
    }

    pub async fn admit(
        &self,
        config: &ProxyConfiguration,
        ctx: &mut RequestContext,
        body: Body,
    ) -> GateOutcome {
        let identity = ctx
            .headers
            .get(&self.settings.identity_header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        if let Some(token) = identity.as_deref().and_then(|id| self.cache.get(id)) {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {token}")) {
                ctx.headers.insert(header::AUTHORIZATION, bearer);
                metrics::record_gate("cached");
                return GateOutcome::Authenticated(body);
            }
        }

        if ctx.upstream_path == self.settings.login_path {
            return GateOutcome::PresentingLogin(self.submit(config, ctx, identity, body).await);
        }

        tracing::debug!(
            request_id = %ctx.request_id,
            path = %ctx.path,
            "No cached credential; presenting login page"
        );
        metrics::record_gate("login_page");
        GateOutcome::PresentingLogin(self.login_page(
            StatusCode::OK,
            config,
            ctx,
            identity.as_deref(),
        ))
    }

    async fn submit(
        &self,
        config: &ProxyConfiguration,
        ctx: &RequestContext,
        identity: Option<String>,
        body: Body,
    ) -> Response {
        let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
            Ok(bytes) => bytes,
            Err(_) => return response::bad_request("Unreadable login form"),
        };
        let form = LoginForm::parse(&bytes);
        let user = form.user_name.or(identity);

        if user.is_none() && form.token.is_none() {
            return response::redirect(&ctx.external_root(config));
        }

        if let Some(submitted) = form.workspace_url.as_deref() {
            if !same_workspace(submitted, self.provider.workspace_url()) {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    workspace_url = %submitted,
                    "Login names a different workspace"
                );
                return self.reject(config, ctx, user.as_deref());
            }
        }

        let (Some(user), Some(token)) = (user, form.token) else {
            return self.reject(config, ctx, None);
        };

        if !self.provider.validate(&user, &token).await {
            return self.reject(config, ctx, Some(&user));
        }

        self.cache.insert(&user, &token);
        tracing::info!(request_id = %ctx.request_id, user = %user, "Login accepted");
        metrics::record_gate("login_success");
        response::redirect(&ctx.external_root(config))
    }

    fn reject(
        &self,
        config: &ProxyConfiguration,
        ctx: &RequestContext,
        user: Option<&str>,
    ) -> Response {
        metrics::record_gate("login_rejected");
        self.login_page(StatusCode::UNAUTHORIZED, config, ctx, user)
    }

    fn login_page(
        &self,
        status: StatusCode,
        config: &ProxyConfiguration,
        ctx: &RequestContext,
        user: Option<&str>,
    ) -> Response {
        let action = ctx.external_path(config, &self.settings.login_path);
        let page = LoginPage {
            action: &action,
            workspace_url: self.provider.workspace_url().as_str(),
            user_name: user.unwrap_or_default(),
            rejected: status == StatusCode::UNAUTHORIZED,
        };
        (status, Html(page.render())).into_response()
    }
}

/// Same scheme, host, port and path, ignoring a trailing slash.
fn same_workspace(submitted: &str, configured: &Url) -> bool {
    Url::parse(submitted).is_ok_and(|url| {
        url.origin() == configured.origin()
            && url.path().trim_end_matches('/') == configured.path().trim_end_matches('/')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_comparison_ignores_trailing_slash() {
        let configured = Url::parse("https://dbc-1.cloud.databricks.com/").unwrap();
        assert!(same_workspace("https://dbc-1.cloud.databricks.com", &configured));
        assert!(same_workspace("https://dbc-1.cloud.databricks.com/", &configured));
        assert!(!same_workspace("https://evil.example.com", &configured));
        assert!(!same_workspace("http://dbc-1.cloud.databricks.com", &configured));
        assert!(!same_workspace("not a url", &configured));
    }
}
