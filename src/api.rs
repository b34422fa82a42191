use anyhow::Result as AnyResult;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{ApplicationStatus, Notification, Opportunity, TrackedApplication};
use crate::session::{LANG_KEY, TOKEN_KEY};
use crate::store::KeyValueStore;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

// --- Wire types ---

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct RemindersResponse {
    #[serde(default)]
    reminders: Vec<Opportunity>,
}

#[derive(Debug, Deserialize)]
struct NotificationsResponse {
    #[serde(default)]
    notifications: Vec<Notification>,
}

#[derive(Debug, Deserialize)]
struct OpportunitiesResponse {
    #[serde(default)]
    opportunities: Vec<Opportunity>,
}

#[derive(Debug, Deserialize)]
struct TrackingResponse {
    #[serde(default)]
    applications: Vec<TrackedApplication>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineReminderRequest<'a> {
    pub opportunity_id: &'a str,
    pub deadline: String,
    pub reminder_type: &'static str,
    pub reminder_days: u32,
}

#[derive(Debug, Serialize)]
struct StatusUpdate {
    status: ApplicationStatus,
}

#[derive(Debug, Serialize)]
struct CompletePendingRequest {
    completed: bool,
}

// --- Client ---

/// Thin wrapper over the hub backend. Every method is a single request;
/// nothing is retried or coalesced.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    lang: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            lang: None,
            client: reqwest::Client::new(),
        }
    }

    /// Picks up `token` and `lang` from storage. A missing token is not an
    /// error; the request goes out unauthenticated and the backend decides.
    pub fn from_store(base_url: &str, store: &dyn KeyValueStore) -> AnyResult<Self> {
        Ok(Self::new(base_url)
            .with_token(store.get(TOKEN_KEY)?)
            .with_language(store.get(LANG_KEY)?))
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_language(mut self, lang: Option<String>) -> Self {
        self.lang = lang;
        self
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(lang) = &self.lang {
            builder = builder.header(reqwest::header::ACCEPT_LANGUAGE, lang);
        }
        builder
    }

    pub(crate) async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Response, ApiError> {
        tracing::debug!(path, "Sending request");
        let response = builder.send().await.map_err(|source| ApiError::Network {
            path: path.to_string(),
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                path: path.to_string(),
                status,
                body,
            });
        }
        Ok(response)
    }

    pub(crate) async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(path, self.request(Method::GET, path)).await?;
        Self::decode(path, response).await
    }

    pub(crate) async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(path, self.request(method, path).json(body)).await?;
        Self::decode(path, response).await
    }

    /// For writes whose response body is ignored.
    pub(crate) async fn send_unit<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(path, builder).await?;
        Ok(())
    }

    // --- Auth ---

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        self.send_json(Method::POST, "/api/auth/login", &LoginRequest { email, password })
            .await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        self.send_json(
            Method::POST,
            "/api/auth/register",
            &RegisterRequest { name, email, password },
        )
        .await
    }

    // --- Opportunities ---

    pub async fn list_opportunities(&self) -> Result<Vec<Opportunity>, ApiError> {
        let response: OpportunitiesResponse = self.get_json("/api/opportunities").await?;
        Ok(response.opportunities)
    }

    // --- Reminders ---

    pub async fn incomplete_applications(&self) -> Result<Vec<Opportunity>, ApiError> {
        let response: RemindersResponse = self.get_json("/api/reminders/incomplete-applications").await?;
        Ok(response.reminders)
    }

    pub async fn mark_completed(&self, opportunity_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/reminders/mark-completed/{}", opportunity_id);
        self.send_unit::<()>(Method::PUT, &path, None).await
    }

    pub async fn mark_reminder_sent(&self, reminder_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/reminders/{}/sent", reminder_id);
        self.send_unit::<()>(Method::PUT, &path, None).await
    }

    pub async fn set_deadline_reminder(&self, request: &DeadlineReminderRequest<'_>) -> Result<(), ApiError> {
        self.send_unit(Method::POST, "/api/reminders/deadline", Some(request))
            .await
    }

    // --- Notifications ---

    pub async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let response: NotificationsResponse = self.get_json("/api/notifications").await?;
        Ok(response.notifications)
    }

    // --- Tracking ---

    pub async fn tracked_applications(&self) -> Result<Vec<TrackedApplication>, ApiError> {
        let response: TrackingResponse = self.get_json("/api/tracking").await?;
        Ok(response.applications)
    }

    pub async fn track_application(&self, application: &TrackedApplication) -> Result<(), ApiError> {
        self.send_unit(Method::POST, "/api/tracking", Some(application))
            .await
    }

    pub async fn update_application_status(
        &self,
        opportunity_id: &str,
        status: ApplicationStatus,
    ) -> Result<(), ApiError> {
        let path = format!("/api/tracking/{}/status", opportunity_id);
        self.send_unit(Method::PUT, &path, Some(&StatusUpdate { status }))
            .await
    }

    pub async fn complete_pending(&self, completed: bool) -> Result<(), ApiError> {
        self.send_unit(
            Method::POST,
            "/api/tracking/complete-pending",
            Some(&CompletePendingRequest { completed }),
        )
        .await
    }
}
