//! Token acquirer variants for Azure AD FEDAUTH.
//!
//! These cover the acquisition strategies [`AzureAdAuth`](crate::azure_ad::AzureAdAuth)
//! doesn't: device-code interactive sign-in, delegating to the `az` CLI,
//! environment-variable client credentials, and trying several of the above
//! in order until one succeeds. All of them resolve to a bearer token plus
//! TTL, cached by the caller via [`crate::token_cache::TokenCache`].

use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::AuthError;
use crate::token_cache::CachedToken;

const AZURE_SQL_RESOURCE: &str = "https://database.windows.net/";

/// Acquires a FEDAUTH access token by whatever means the implementor uses.
#[allow(async_fn_in_trait)]
pub trait TokenAcquirer: Send + Sync {
    /// Acquire a fresh access token.
    async fn acquire(&self) -> Result<CachedToken, AuthError>;

    /// A short, stable name for logging and cache-key disambiguation.
    fn name(&self) -> &str;
}

#[derive(Deserialize)]
struct DeviceCodeStart {
    device_code: String,
    user_code: String,
    verification_uri: String,
    interval: u64,
    expires_in: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
}

/// Callback invoked once the device code and verification URL are known, so
/// the caller can surface them to an interactive user.
pub type DeviceCodePrompt = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Interactive device-code acquirer.
///
/// Starts the OAuth2 device authorization flow against Azure AD, invokes
/// `on_prompt` with the user code and verification URL, then polls the
/// token endpoint at the server-specified interval until the user
/// completes sign-in or the code expires.
pub struct DeviceCodeAcquirer {
    tenant_id: String,
    client_id: String,
    resource: String,
    http: reqwest::Client,
    on_prompt: Option<DeviceCodePrompt>,
}

impl DeviceCodeAcquirer {
    /// Create a device-code acquirer for `tenant_id`/`client_id`.
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            resource: AZURE_SQL_RESOURCE.to_string(),
            http: reqwest::Client::new(),
            on_prompt: None,
        }
    }

    /// Register a callback fired with `(user_code, verification_uri)` once
    /// the device code has been issued.
    #[must_use]
    pub fn on_prompt(mut self, callback: DeviceCodePrompt) -> Self {
        self.on_prompt = Some(callback);
        self
    }

    fn authority(&self) -> String {
        format!("https://login.microsoftonline.com/{}", self.tenant_id)
    }
}

impl TokenAcquirer for DeviceCodeAcquirer {
    async fn acquire(&self) -> Result<CachedToken, AuthError> {
        let start: DeviceCodeStart = self
            .http
            .post(format!("{}/oauth2/v2.0/devicecode", self.authority()))
            .form(&[("client_id", self.client_id.as_str()), ("scope", self.resource.as_str())])
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::TokenAcquisition(format!("malformed devicecode response: {e}")))?;

        if let Some(prompt) = &self.on_prompt {
            prompt(&start.user_code, &start.verification_uri);
        }

        let interval = Duration::from_secs(start.interval.max(1));
        let deadline = tokio::time::Instant::now() + Duration::from_secs(start.expires_in);

        loop {
            tokio::time::sleep(interval).await;
            if tokio::time::Instant::now() >= deadline {
                return Err(AuthError::TokenAcquisition("device code expired before sign-in completed".into()));
            }

            let resp = self
                .http
                .post(format!("{}/oauth2/v2.0/token", self.authority()))
                .form(&[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", start.device_code.as_str()),
                ])
                .send()
                .await
                .map_err(|e| AuthError::Network(e.to_string()))?;

            if resp.status().is_success() {
                let token: TokenResponse = resp
                    .json()
                    .await
                    .map_err(|e| AuthError::TokenAcquisition(format!("malformed token response: {e}")))?;
                return Ok(CachedToken::new(token.access_token, Duration::from_secs(token.expires_in)));
            }

            let err: TokenErrorResponse = resp
                .json()
                .await
                .map_err(|e| AuthError::TokenAcquisition(format!("malformed error response: {e}")))?;
            match err.error.as_str() {
                "authorization_pending" | "slow_down" => continue,
                other => return Err(AuthError::TokenAcquisition(format!("device code flow failed: {other}"))),
            }
        }
    }

    fn name(&self) -> &str {
        "device-code"
    }
}

/// Acquires a token by shelling out to the Azure CLI (`az account get-access-token`).
///
/// Useful in developer environments where `az login` has already established
/// a session; avoids this crate re-implementing CLI credential storage.
pub struct CliAcquirer {
    resource: String,
    tenant_id: Option<String>,
}

impl CliAcquirer {
    /// Acquire a token for the default Azure SQL resource.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resource: AZURE_SQL_RESOURCE.to_string(),
            tenant_id: None,
        }
    }

    /// Restrict the lookup to a specific tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

impl Default for CliAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct AzCliToken {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "expiresOn")]
    #[allow(dead_code)]
    expires_on: Option<String>,
}

impl TokenAcquirer for CliAcquirer {
    async fn acquire(&self) -> Result<CachedToken, AuthError> {
        let mut cmd = Command::new("az");
        cmd.args(["account", "get-access-token", "--resource", self.resource.as_str()]);
        if let Some(tenant) = &self.tenant_id {
            cmd.args(["--tenant", tenant.as_str()]);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| AuthError::TokenAcquisition(format!("failed to run az CLI: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuthError::TokenAcquisition(format!("az CLI exited with failure: {stderr}")));
        }

        let parsed: AzCliToken = serde_json::from_slice(&output.stdout)
            .map_err(|e| AuthError::TokenAcquisition(format!("malformed az CLI output: {e}")))?;

        // az CLI doesn't report a TTL we can parse without a date library
        // dependency; assume the typical Azure AD access token lifetime.
        Ok(CachedToken::new(parsed.access_token, Duration::from_secs(60 * 60)))
    }

    fn name(&self) -> &str {
        "az-cli"
    }
}

/// Acquires a token via the OAuth2 client-credentials grant using
/// `AZURE_CLIENT_ID`/`AZURE_CLIENT_SECRET`/`AZURE_TENANT_ID` from the
/// environment.
pub struct EnvironmentAcquirer {
    http: reqwest::Client,
}

impl EnvironmentAcquirer {
    /// Create an environment-credentials acquirer.
    #[must_use]
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }

    fn read_env(name: &str) -> Result<String, AuthError> {
        std::env::var(name).map_err(|_| AuthError::Configuration(format!("{name} is not set")))
    }
}

impl Default for EnvironmentAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenAcquirer for EnvironmentAcquirer {
    async fn acquire(&self) -> Result<CachedToken, AuthError> {
        let tenant_id = Self::read_env("AZURE_TENANT_ID")?;
        let client_id = Self::read_env("AZURE_CLIENT_ID")?;
        let client_secret = Self::read_env("AZURE_CLIENT_SECRET")?;

        let resp = self
            .http
            .post(format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token"))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", "https://database.windows.net/.default"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::TokenAcquisition(format!("client credentials grant failed: {body}")));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::TokenAcquisition(format!("malformed token response: {e}")))?;
        Ok(CachedToken::new(token.access_token, Duration::from_secs(token.expires_in)))
    }

    fn name(&self) -> &str {
        "environment"
    }
}

/// Tries each acquirer in order, returning the first success.
///
/// Mirrors `DefaultAzureCredential`-style chaining: each failure is
/// swallowed (but logged) so a misconfigured earlier link doesn't prevent a
/// working later one from being tried.
pub struct ChainAcquirer {
    links: Vec<Box<dyn TokenAcquirer>>,
}

impl ChainAcquirer {
    /// Build a chain from an ordered list of acquirers.
    #[must_use]
    pub fn new(links: Vec<Box<dyn TokenAcquirer>>) -> Self {
        Self { links }
    }
}

impl TokenAcquirer for ChainAcquirer {
    async fn acquire(&self) -> Result<CachedToken, AuthError> {
        let mut last_err = AuthError::Configuration("token acquirer chain is empty".into());
        for link in &self.links {
            match link.acquire().await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    tracing::debug!(acquirer = link.name(), error = %e, "token acquirer in chain failed, trying next");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn name(&self) -> &str {
        "chain"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct AlwaysFails;
    impl TokenAcquirer for AlwaysFails {
        async fn acquire(&self) -> Result<CachedToken, AuthError> {
            Err(AuthError::TokenAcquisition("nope".into()))
        }
        fn name(&self) -> &str {
            "always-fails"
        }
    }

    struct AlwaysSucceeds;
    impl TokenAcquirer for AlwaysSucceeds {
        async fn acquire(&self) -> Result<CachedToken, AuthError> {
            Ok(CachedToken::new("ok-token", Duration::from_secs(3600)))
        }
        fn name(&self) -> &str {
            "always-succeeds"
        }
    }

    #[tokio::test]
    async fn chain_falls_through_to_working_link() {
        let chain = ChainAcquirer::new(vec![Box::new(AlwaysFails), Box::new(AlwaysSucceeds)]);
        let token = chain.acquire().await.unwrap();
        assert_eq!(token.token, "ok-token");
    }

    #[tokio::test]
    async fn chain_reports_last_error_when_all_fail() {
        let chain = ChainAcquirer::new(vec![Box::new(AlwaysFails), Box::new(AlwaysFails)]);
        assert!(chain.acquire().await.is_err());
    }

    #[tokio::test]
    async fn environment_acquirer_requires_env_vars() {
        // SAFETY net for CI: don't assume these are unset process-wide, just
        // check the specific failure path when AZURE_TENANT_ID is absent.
        let acquirer = EnvironmentAcquirer::new();
        unsafe {
            std::env::remove_var("AZURE_TENANT_ID");
        }
        let result = acquirer.acquire().await;
        assert!(result.is_err());
    }
}
