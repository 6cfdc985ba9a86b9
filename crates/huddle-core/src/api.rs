use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::CoreConfig;
use crate::models::Event;
use crate::session::Session;

/// A user record from the data provider, read-only to the core.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDetail {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Thin client for the event/user data provider. The records it
/// returns feed the temporal classifier and subscription policy; the
/// core never writes them back.
pub struct EventApi {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl EventApi {
    pub fn new(config: &CoreConfig, session: &Session) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: config.api_url.clone(),
            token: session.token.clone(),
        }
    }

    pub async fn get_events(&self) -> Result<Vec<Event>> {
        self.get_json(&format!("{}events/", self.base))
            .await
            .context("fetching event list")
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Event> {
        self.get_json(&format!("{}events/{}", self.base, event_id))
            .await
            .with_context(|| format!("fetching event {event_id}"))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserDetail> {
        self.get_json(&format!("{}users/{}", self.base, user_id))
            .await
            .with_context(|| format!("fetching user {user_id}"))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
