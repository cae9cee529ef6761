//! Identity provider client.
//!
//! A submitted token is valid when the workspace's current-user endpoint
//! accepts it and reports the same user name that was submitted.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

const CURRENT_USER_PATH: &str = "api/2.0/preview/scim/v2/Me";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("identity provider answered {0}")]
    Status(reqwest::StatusCode),

    #[error("identity provider response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("invalid identity provider URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentUser {
    user_name: String,
}

#[derive(Debug, Clone)]
pub struct IdentityProvider {
    client: reqwest::Client,
    workspace_url: Url,
}

impl IdentityProvider {
    /// `workspace_url` must end with `/` so the endpoint joins beneath it.
    pub fn new(workspace_url: Url, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(IdentityError::Transport)?;
        Ok(Self {
            client,
            workspace_url,
        })
    }

    pub fn workspace_url(&self) -> &Url {
        &self.workspace_url
    }

    /// User name the provider associates with `token`.
    pub async fn current_user(&self, token: &str) -> Result<String, IdentityError> {
        let endpoint = self.workspace_url.join(CURRENT_USER_PATH)?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(IdentityError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Status(status));
        }

        let user: CurrentUser = response.json().await.map_err(IdentityError::Decode)?;
        Ok(user.user_name)
    }

    /// Whether `token` belongs to `user_name`. Provider failures count as no.
    pub async fn validate(&self, user_name: &str, token: &str) -> bool {
        match self.current_user(token).await {
            Ok(actual) if actual == user_name => true,
            Ok(actual) => {
                tracing::info!(
                    submitted = %user_name,
                    actual = %actual,
                    "Token belongs to a different user"
                );
                false
            }
            Err(error) => {
                tracing::info!(user = %user_name, error = %error, "Token validation failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_under_workspace_path() {
        let base = Url::parse("https://dbc-1.cloud.databricks.com/").unwrap();
        assert_eq!(
            base.join(CURRENT_USER_PATH).unwrap().as_str(),
            "https://dbc-1.cloud.databricks.com/api/2.0/preview/scim/v2/Me"
        );
    }

    #[test]
    fn current_user_reads_user_name() {
        let user: CurrentUser =
            serde_json::from_str(r#"{"id":"42","userName":"ada@example.com","active":true}"#)
                .unwrap();
        assert_eq!(user.user_name, "ada@example.com");
    }
}
