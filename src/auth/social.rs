//! Verification of third-party login tokens.

use async_graphql::Enum;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::config::SocialConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum SocialAccountType {
    Facebook,
    Google,
}

impl SocialAccountType {
    /// Users column holding the provider's profile id.
    pub fn profile_column(&self) -> &'static str {
        match self {
            SocialAccountType::Facebook => "facebook_profile_id",
            SocialAccountType::Google => "google_profile_id",
        }
    }

    /// Route segment, as in `/auth/login/google`.
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug.to_ascii_lowercase().as_str() {
            "facebook" => Some(SocialAccountType::Facebook),
            "google" => Some(SocialAccountType::Google),
            _ => None,
        }
    }
}

const INVALID_TOKEN: &str = "Invalid social account token";

/// What a provider tells us about the account behind a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialProfile {
    pub id: String,
    pub email: Option<String>,
    /// The provider vouches that `email` belongs to this account
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[async_trait]
pub trait SocialProvider: Send + Sync {
    /// Resolve a provider token issued to this app to the profile it belongs to.
    async fn verify(&self, kind: SocialAccountType, token: &str) -> AppResult<SocialProfile>;
}

/// Google's tokeninfo sends booleans as `"true"`/`"false"` strings.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(flag)) => flag,
        Some(Flag::Text(text)) => text.eq_ignore_ascii_case("true"),
        None => false,
    })
}

#[derive(Deserialize)]
struct GoogleTokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleTokenInfo {
    /// Accept the token only if it was minted for our OAuth client.
    fn into_profile(self, client_id: &str) -> AppResult<SocialProfile> {
        if client_id.is_empty() {
            return Err(AppError::Unauthenticated(
                "Google login is not enabled".to_string(),
            ));
        }
        if self.aud != client_id {
            tracing::warn!(aud = %self.aud, "Google token issued to another client");
            return Err(AppError::Unauthenticated(INVALID_TOKEN.to_string()));
        }
        Ok(SocialProfile {
            id: self.sub,
            email: self.email,
            email_verified: self.email_verified,
            display_name: self.name,
            thumbnail_url: self.picture,
        })
    }
}

#[derive(Deserialize)]
struct FacebookDebugToken {
    data: FacebookTokenData,
}

#[derive(Deserialize)]
struct FacebookTokenData {
    #[serde(default)]
    app_id: String,
    #[serde(default)]
    is_valid: bool,
    user_id: Option<String>,
}

impl FacebookDebugToken {
    /// The inspected token must be live and belong to our app.
    fn check(&self, app_id: &str) -> AppResult<()> {
        if !self.data.is_valid || self.data.app_id != app_id {
            tracing::warn!(app_id = %self.data.app_id, "Facebook token rejected");
            return Err(AppError::Unauthenticated(INVALID_TOKEN.to_string()));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct FacebookMe {
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

impl FacebookMe {
    fn into_profile(self, debug: &FacebookDebugToken) -> AppResult<SocialProfile> {
        if debug.data.user_id.as_deref().is_some_and(|user_id| user_id != self.id) {
            return Err(AppError::Unauthenticated(INVALID_TOKEN.to_string()));
        }
        Ok(SocialProfile {
            // Graph only returns confirmed addresses
            email_verified: self.email.is_some(),
            id: self.id,
            email: self.email,
            display_name: self.name,
            thumbnail_url: self.picture.and_then(|p| p.data.url),
        })
    }
}

/// Talks to the Google token-info and Facebook Graph endpoints.
#[derive(Clone)]
pub struct HttpSocialProvider {
    client: reqwest::Client,
    config: SocialConfig,
}

impl HttpSocialProvider {
    pub fn new(config: &SocialConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let response = self.client.get(url).query(query).send().await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), url, "Social token rejected");
            return Err(AppError::Unauthenticated(INVALID_TOKEN.to_string()));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SocialProvider for HttpSocialProvider {
    async fn verify(&self, kind: SocialAccountType, token: &str) -> AppResult<SocialProfile> {
        let config = &self.config;
        match kind {
            SocialAccountType::Google => {
                let info: GoogleTokenInfo = self
                    .get(&config.google_token_info_url, &[("id_token", token)])
                    .await?;
                info.into_profile(&config.google_client_id)
            }
            SocialAccountType::Facebook => {
                if config.facebook_app_id.is_empty() || config.facebook_app_token.is_empty() {
                    return Err(AppError::Unauthenticated(
                        "Facebook login is not enabled".to_string(),
                    ));
                }
                let debug: FacebookDebugToken = self
                    .get(
                        &config.facebook_debug_token_url,
                        &[
                            ("input_token", token),
                            ("access_token", config.facebook_app_token.as_str()),
                        ],
                    )
                    .await?;
                debug.check(&config.facebook_app_id)?;

                let me: FacebookMe = self
                    .get(
                        &config.facebook_me_url,
                        &[("fields", "id,name,email,picture"), ("access_token", token)],
                    )
                    .await?;
                me.into_profile(&debug)
            }
        }
    }
}
