use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;

use crate::api::ApiClient;
use crate::store::KeyValueStore;

pub const TOKEN_KEY: &str = "token";
pub const LANG_KEY: &str = "lang";

// Backends disagree on where the user id lives, and some tokens carry more
// than one of these.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    exp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl SessionUser {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

pub struct Session<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> Session<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    pub fn token(&self) -> Result<Option<String>> {
        self.store.get(TOKEN_KEY)
    }

    /// Decodes the stored token. A malformed or expired token is removed
    /// and the user is treated as logged out.
    pub fn current_user(&self) -> Result<Option<SessionUser>> {
        let Some(token) = self.token()? else {
            return Ok(None);
        };
        match decode_user(&token) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unusable session token");
                self.store.remove(TOKEN_KEY)?;
                Ok(None)
            }
        }
    }

    pub fn store_token(&self, token: &str) -> Result<()> {
        self.store.set(TOKEN_KEY, token)
    }

    pub fn logout(&self) -> Result<()> {
        self.store.remove(TOKEN_KEY)
    }

    pub fn language(&self) -> Result<Option<String>> {
        self.store.get(LANG_KEY)
    }

    pub fn set_language(&self, lang: &str) -> Result<()> {
        self.store.set(LANG_KEY, lang)
    }

    pub async fn login(&self, client: &ApiClient, email: &str, password: &str) -> Result<()> {
        let response = client.login(email, password).await?;
        self.store_token(&response.token)
            .context("Failed to persist session token")
    }

    pub async fn register(&self, client: &ApiClient, name: &str, email: &str, password: &str) -> Result<()> {
        let response = client.register(name, email, password).await?;
        self.store_token(&response.token)
            .context("Failed to persist session token")
    }
}

pub fn decode_user(token: &str) -> Result<SessionUser> {
    let header = decode_header(token)?;
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;

    let claims = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?.claims;
    let id = claims
        .id
        .or(claims.user_id)
        .or(claims.object_id)
        .or(claims.sub)
        .ok_or_else(|| anyhow!("Token carries no user id"))?;
    Ok(SessionUser {
        id,
        email: claims.email,
        name: claims.name,
        expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_default(),
    })
}
