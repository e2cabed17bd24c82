//! DingTalk custom-robot channel.

use async_trait::async_trait;
use serde::Deserialize;

use super::{Message, Notifier, NotifyError};
use crate::registry::Notification;

#[derive(Debug, Deserialize)]
struct RobotResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

pub struct DingTalkNotifier {
    client: reqwest::Client,
}

impl DingTalkNotifier {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Robot markdown payload; every build message @-mentions the whole group.
pub fn payload(message: &Message) -> serde_json::Value {
    serde_json::json!({
        "msgtype": "markdown",
        "markdown": {
            "title": message.title,
            "text": message.text,
        },
        "at": {
            "atMobiles": [],
            "isAtAll": true,
        },
    })
}

#[async_trait]
impl Notifier for DingTalkNotifier {
    async fn send(&self, target: &Notification, message: &Message) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&target.web_hook)
            .json(&payload(message))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{status} {text}")));
        }

        let body: RobotResponse = resp.json().await?;
        if body.errcode != 0 {
            return Err(NotifyError::Rejected(format!(
                "errcode {}: {}",
                body.errcode, body.errmsg
            )));
        }
        Ok(())
    }
}
