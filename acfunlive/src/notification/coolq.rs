//! OneBot (cqhttp) HTTP API client.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::CoolqConfig;
use crate::error::{Error, Result};
use crate::utils::http_client::build_client;

/// Response envelope of the OneBot HTTP API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    retcode: i64,
}

/// Sends QQ messages through a cqhttp HTTP endpoint.
#[derive(Debug, Clone)]
pub struct CoolqClient {
    base_url: String,
    access_token: String,
    client: Client,
}

impl CoolqClient {
    pub fn new(config: &CoolqConfig) -> Result<Self> {
        let client = build_client()?;
        Ok(Self {
            base_url: config.cqhttp_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    pub async fn send_private_msg(&self, user_id: u64, message: &str) -> Result<()> {
        self.call(
            "send_private_msg",
            json!({ "user_id": user_id, "message": message }),
        )
        .await
    }

    pub async fn send_group_msg(&self, group_id: u64, message: &str) -> Result<()> {
        self.call(
            "send_group_msg",
            json!({ "group_id": group_id, "message": message }),
        )
        .await
    }

    async fn call(&self, action: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}/{}", self.base_url, action);
        let mut request = self.client.post(&url).json(&body);
        if !self.access_token.is_empty() {
            request = request.bearer_auth(&self.access_token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "{action} returned HTTP {}",
                response.status()
            )));
        }

        let api: ApiResponse = response.json().await?;
        debug!(action, status = %api.status, retcode = api.retcode, "Coolq call finished");
        if api.status == "ok" || api.status == "async" {
            Ok(())
        } else {
            Err(Error::Notification(format!(
                "{action} failed with retcode {}",
                api.retcode
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let config = CoolqConfig {
            cqhttp_url: "http://127.0.0.1:5700/".to_string(),
            ..Default::default()
        };
        let client = CoolqClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:5700");
    }
}
