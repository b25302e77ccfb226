//! Delegated sign-in against external identity providers.
//!
//! Authorization-code flow: a challenge redirect to the provider, then a
//! code exchange plus userinfo fetch on the callback. Provider endpoints
//! are fixed; only client credentials come from configuration.

use std::collections::HashMap;

use axum::http::header;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config;
use crate::error::{Result, ServerError};

pub const GOOGLE: &str = "google";
pub const GITHUB: &str = "github";

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str =
    "https://openidconnect.googleapis.com/v1/userinfo";
const GOOGLE_SCOPES: &str = "openid email profile";

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USERINFO_URL: &str = "https://api.github.com/user";
const GITHUB_SCOPES: &str = "user:email";

const STATE_BYTES: usize = 16;

/// State stored in the session between the challenge and the callback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub provider: String,
    pub state: String,
    pub return_url: Option<String>,
}

/// Identity assertion resolved from a provider after the callback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalLoginInfo {
    pub provider: String,
    /// Stable provider subject id.
    pub provider_key: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug)]
struct Provider {
    authorize_url: &'static str,
    token_url: &'static str,
    userinfo_url: &'static str,
    scopes: &'static str,
    client_id: String,
    client_secret: String,
}

/// Registry of configured identity providers.
#[derive(Clone)]
pub struct OAuthProviders {
    providers: HashMap<&'static str, Provider>,
    http: reqwest::Client,
    callback: Url,
}

impl OAuthProviders {
    /// Create a new [`OAuthProviders`] registry.
    ///
    /// `public_url` is the instance base URL the callback is built from.
    pub fn new(
        config: &config::Oauth,
        public_url: &str,
    ) -> std::result::Result<Self, url::ParseError> {
        let callback = Url::parse(public_url)?.join("account/external/callback")?;

        let mut providers = HashMap::new();
        providers.insert(
            GOOGLE,
            Provider {
                authorize_url: GOOGLE_AUTHORIZE_URL,
                token_url: GOOGLE_TOKEN_URL,
                userinfo_url: GOOGLE_USERINFO_URL,
                scopes: GOOGLE_SCOPES,
                client_id: config.google.client_id.clone(),
                client_secret: config.google.client_secret.clone(),
            },
        );
        providers.insert(
            GITHUB,
            Provider {
                authorize_url: GITHUB_AUTHORIZE_URL,
                token_url: GITHUB_TOKEN_URL,
                userinfo_url: GITHUB_USERINFO_URL,
                scopes: GITHUB_SCOPES,
                client_id: config.github.client_id.clone(),
                client_secret: config.github.client_secret.clone(),
            },
        );

        Ok(Self {
            providers,
            http: reqwest::Client::new(),
            callback,
        })
    }

    fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    /// Callback URL embedding the post-login destination.
    fn redirect_uri(&self, return_url: Option<&str>) -> Url {
        let mut uri = self.callback.clone();
        if let Some(return_url) = return_url {
            uri.query_pairs_mut().append_pair("return_url", return_url);
        }
        uri
    }

    /// Build the provider challenge: the authorization redirect plus the
    /// attempt to remember until the callback.
    pub fn challenge(
        &self,
        name: &str,
        return_url: Option<&str>,
    ) -> Option<(String, LoginAttempt)> {
        let provider = self.get(name)?;

        let mut bytes = [0u8; STATE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let state = hex::encode(bytes);

        let mut authorize = Url::parse(provider.authorize_url).ok()?;
        authorize
            .query_pairs_mut()
            .append_pair("client_id", &provider.client_id)
            .append_pair("redirect_uri", self.redirect_uri(return_url).as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", provider.scopes)
            .append_pair("state", &state);

        Some((
            authorize.to_string(),
            LoginAttempt {
                provider: name.to_owned(),
                state,
                return_url: return_url.map(str::to_owned),
            },
        ))
    }

    /// Exchange the authorization code and resolve the user's identity.
    pub async fn exchange(
        &self,
        attempt: &LoginAttempt,
        code: &str,
    ) -> Result<ExternalLoginInfo> {
        let provider = self
            .get(&attempt.provider)
            .ok_or(ServerError::UnknownProvider)?;
        let redirect_uri = self.redirect_uri(attempt.return_url.as_deref());

        let params = [
            ("client_id", provider.client_id.as_str()),
            ("client_secret", provider.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let token: TokenResponse = self
            .http
            .post(provider.token_url)
            .header(header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let userinfo = self
            .http
            .get(provider.userinfo_url)
            .header(header::USER_AGENT, env!("CARGO_PKG_NAME"))
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?;

        match attempt.provider.as_str() {
            GITHUB => {
                let claims: GitHubClaims = userinfo.json().await?;
                Ok(ExternalLoginInfo {
                    provider: attempt.provider.clone(),
                    provider_key: claims.id.to_string(),
                    email: claims.email,
                    first_name: None,
                    last_name: None,
                })
            },
            _ => {
                let claims: GoogleClaims = userinfo.json().await?;
                Ok(ExternalLoginInfo {
                    provider: attempt.provider.clone(),
                    provider_key: claims.sub,
                    email: claims.email,
                    first_name: claims.given_name,
                    last_name: claims.family_name,
                })
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubClaims {
    id: i64,
    email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers() -> OAuthProviders {
        OAuthProviders::new(
            &config::Oauth {
                google: config::Provider {
                    client_id: "google-id".into(),
                    client_secret: "google-secret".into(),
                },
                github: config::Provider {
                    client_id: "github-id".into(),
                    client_secret: "github-secret".into(),
                },
            },
            "https://gallery.example.org/",
        )
        .unwrap()
    }

    #[test]
    fn test_challenge_builds_authorize_url() {
        let providers = providers();
        let (url, attempt) = providers.challenge(GOOGLE, Some("/feed")).unwrap();

        assert!(url.starts_with(GOOGLE_AUTHORIZE_URL));
        assert!(url.contains("client_id=google-id"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains(&format!("state={}", attempt.state)));
        // the callback is embedded url-encoded, return_url included.
        assert!(url.contains(
            "gallery.example.org%2Faccount%2Fexternal%2Fcallback%3Freturn_url%3D%252Ffeed"
        ));

        assert_eq!(attempt.provider, GOOGLE);
        assert_eq!(attempt.return_url.as_deref(), Some("/feed"));
        assert_eq!(attempt.state.len(), STATE_BYTES * 2);
    }

    #[test]
    fn test_challenge_without_return_url() {
        let providers = providers();
        let (url, attempt) = providers.challenge(GITHUB, None).unwrap();

        assert!(url.starts_with(GITHUB_AUTHORIZE_URL));
        assert!(url.contains("scope=user%3Aemail"));
        assert!(!url.contains("return_url"));
        assert_eq!(attempt.return_url, None);
    }

    #[test]
    fn test_unknown_provider_has_no_challenge() {
        assert!(providers().challenge("gitlab", None).is_none());
    }

    #[test]
    fn test_challenge_states_are_unique() {
        let providers = providers();
        let (_, first) = providers.challenge(GOOGLE, None).unwrap();
        let (_, second) = providers.challenge(GOOGLE, None).unwrap();
        assert_ne!(first.state, second.state);
    }
}
