use super::PersistenceBackend;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// HTTP key/value backend, addressed by a base URL plus bearer token,
/// reached through the same `reqwest` client stack the adapters use for
/// venue REST calls. `GET {base}/{key}` returns 404 for a miss, 200 with a
/// `{"value": ...}` body for a hit; `PUT {base}/{key}` upserts.
pub struct RemotePersistence {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct PutBody<'a> {
    value: &'a str,
}

#[derive(Deserialize)]
struct GetBody {
    value: String,
}

impl RemotePersistence {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl PersistenceBackend for RemotePersistence {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let response = self
            .client
            .get(self.url_for(key))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("remote persistence request failed")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().context("remote persistence returned an error")?;
        let body: GetBody = response.json().await.context("remote persistence returned malformed body")?;
        Ok(Some(body.value))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.client
            .put(self.url_for(key))
            .bearer_auth(&self.token)
            .json(&PutBody { value })
            .send()
            .await
            .context("remote persistence request failed")?
            .error_for_status()
            .context("remote persistence returned an error")?;
        Ok(())
    }
}
