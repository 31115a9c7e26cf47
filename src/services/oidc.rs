//! Authorization-code login against the identity provider.
//!
//! Only the redirect and the code-for-token exchange; no PKCE, nonce, or state.
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::{AppEnv, OidcClientConfig};

#[derive(Debug, Error)]
pub enum OidcError {
    #[error("invalid issuer url: {0}")]
    InvalidIssuer(#[from] url::ParseError),
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned status {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("token response has no id_token")]
    MissingIdToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct OidcClient {
    http: reqwest::Client,
    config: OidcClientConfig,
}

impl OidcClient {
    pub fn new(config: OidcClientConfig, timeout: Duration) -> Result<Self, OidcError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }

    /// Where to send the browser to start a login.
    pub fn authorization_url(&self) -> Result<Url, OidcError> {
        let url = Url::parse_with_params(
            &format!("{}/auth", self.config.issuer),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid profile email"),
            ],
        )?;
        Ok(url)
    }

    /// Exchange an authorization code for the provider's identity credential.
    pub async fn exchange_code(&self, code: &str) -> Result<String, OidcError> {
        tracing::info!(redirect_uri = %self.config.redirect_uri, "exchanging authorization code");

        let response = self
            .http
            .post(format!("{}/token", self.config.issuer))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OidcError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        token.id_token.ok_or(OidcError::MissingIdToken)
    }

    /// Where the browser lands after a successful login.
    pub fn landing_url(&self, app_env: AppEnv, id_token: &str) -> String {
        if app_env.is_production() {
            format!("/?token={}", id_token)
        } else {
            format!("{}/?token={}", self.config.frontend_url, id_token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(issuer: &str) -> OidcClient {
        OidcClient::new(
            OidcClientConfig {
                issuer: issuer.to_string(),
                client_id: "client-1".into(),
                client_secret: "s3cret".into(),
                redirect_uri: "http://localhost:3000/auth/callback".into(),
                frontend_url: "http://localhost:5173".into(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn authorization_url_carries_client_parameters() {
        let url = client("https://id.example.com").authorization_url().unwrap();

        assert_eq!(url.path(), "/auth");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "client-1".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:3000/auth/callback".into()
        )));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), "openid profile email".into())));
    }

    #[test]
    fn landing_url_depends_on_environment() {
        let client = client("https://id.example.com");
        assert_eq!(client.landing_url(AppEnv::Production, "t"), "/?token=t");
        assert_eq!(
            client.landing_url(AppEnv::Development, "t"),
            "http://localhost:5173/?token=t"
        );
    }

    #[tokio::test]
    async fn exchange_code_posts_form_and_reads_id_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "abc".into()),
                Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id_token":"id.token.value","access_token":"x"}"#)
            .create_async()
            .await;

        let token = client(&server.url()).exchange_code("abc").await.unwrap();

        assert_eq!(token, "id.token.value");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exchange_code_surfaces_provider_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).exchange_code("bad").await.unwrap_err();

        assert!(matches!(err, OidcError::Provider { status: 400, ref body } if body.contains("invalid_grant")));
    }
}
