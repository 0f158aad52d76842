//! Trello board deliverer.
//!
//! Publishes one card per submission to a configured list. Board, list and
//! member ids are resolved from their configured names once per batch, and
//! a card gets the label matching its judge when the board has one.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ConsumerConfig;
use crate::models::Submission;

use super::{Deliverer, DeliveryContext, DeliveryError};

const API_URL: &str = "https://api.trello.com/1";
// Application key identifying this client to Trello; overridable per
// consumer with `app_key`.
const APP_KEY: &str = "7a0445134100faef2f5bbbc4437a42e6";
const USER_AGENT: &str = concat!("solvetrack/", env!("CARGO_PKG_VERSION"));

pub struct TrelloDeliverer {
    name: String,
    client: Client,
    key: String,
    token: String,
    board_name: String,
    list_name: String,
    time_format: String,
}

/// Board-level ids resolved once per delivery batch.
struct Targets {
    member_id: String,
    list_id: String,
    /// Lower-cased label name → label id.
    labels: HashMap<String, String>,
}

impl TrelloDeliverer {
    pub fn from_config(
        config: &ConsumerConfig,
        context: &DeliveryContext,
    ) -> Result<Self, DeliveryError> {
        let board_name = config
            .board
            .clone()
            .ok_or(DeliveryError::MissingOption("board"))?;
        let list_name = config
            .list
            .clone()
            .ok_or(DeliveryError::MissingOption("list"))?;
        let token = config
            .token
            .clone()
            .or_else(|| context.tokens.get(&config.kind).cloned())
            .ok_or_else(|| DeliveryError::MissingToken(config.kind.clone()))?;
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            name: config.consumer_name().to_string(),
            client,
            key: config.app_key.clone().unwrap_or_else(|| APP_KEY.to_string()),
            token,
            board_name,
            list_name,
            time_format: config
                .submit_time_format
                .clone()
                .unwrap_or_else(|| context.submit_time_format.clone()),
        })
    }

    /// API endpoint with the key and token query parameters attached.
    fn endpoint(&self, path: &str) -> Result<Url, DeliveryError> {
        let mut url = Url::parse(&format!("{}/{}", API_URL, path.trim_start_matches('/')))?;
        url.query_pairs_mut()
            .append_pair("key", &self.key)
            .append_pair("token", &self.token);
        Ok(url)
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, DeliveryError> {
        let mut url = self.endpoint(path)?;
        for (name, value) in query {
            url.query_pairs_mut().append_pair(name, value);
        }
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn resolve_targets(&self) -> Result<Targets, DeliveryError> {
        let me = self.get_json("/members/me", &[("fields", "id")]).await?;
        let member_id = me
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DeliveryError::Payload("member id missing".into()))?
            .to_string();

        let boards = self
            .get_json("/members/me/boards", &[("fields", "name")])
            .await?;
        let board_id = find_id_by_name(&boards, &self.board_name)
            .ok_or_else(|| DeliveryError::TargetNotFound(self.board_name.clone()))?;

        let lists = self
            .get_json(&format!("/boards/{board_id}/lists"), &[("fields", "name")])
            .await?;
        let list_id = find_id_by_name(&lists, &self.list_name)
            .ok_or_else(|| DeliveryError::TargetNotFound(self.list_name.clone()))?;

        let labels = self
            .get_json(&format!("/boards/{board_id}/labels"), &[("fields", "name")])
            .await?;
        let labels = label_index(&labels);

        debug!(board = %self.board_name, list = %self.list_name, labels = labels.len(), "resolved trello targets");
        Ok(Targets {
            member_id,
            list_id,
            labels,
        })
    }

    fn format_submit_time(&self, submission: &Submission) -> String {
        match submission.local_submit_time() {
            Some(local) => local.format(&self.time_format).to_string(),
            None => submission.submit_time.format(&self.time_format).to_string(),
        }
    }

    async fn create_card(
        &self,
        targets: &Targets,
        submission: &Submission,
    ) -> Result<(), DeliveryError> {
        let name = format!("{}. {}", submission.problem_id, submission.title);
        let desc = format!(
            "{}\n-- Accepted on {}",
            submission.url,
            self.format_submit_time(submission)
        );
        let label = targets
            .labels
            .get(&submission.judge)
            .map(String::as_str)
            .unwrap_or("");

        self.client
            .post(self.endpoint("/cards")?)
            .form(&[
                ("idList", targets.list_id.as_str()),
                ("name", name.as_str()),
                ("desc", desc.as_str()),
                ("pos", "top"),
                ("idLabels", label),
                ("idMembers", targets.member_id.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Deliverer for TrelloDeliverer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, submissions: &[Submission]) -> Result<(), DeliveryError> {
        let targets = self.resolve_targets().await?;
        let mut delivered = 0;
        for submission in submissions {
            match self.create_card(&targets, submission).await {
                Ok(()) => delivered += 1,
                Err(source) if delivered > 0 => {
                    return Err(DeliveryError::Partial {
                        delivered,
                        source: Box::new(source),
                    });
                }
                Err(source) => return Err(source),
            }
        }
        debug!(count = delivered, "created trello cards");
        Ok(())
    }
}

/// Find the id of the item whose "name" matches exactly.
fn find_id_by_name(items: &Value, name: &str) -> Option<String> {
    items.as_array()?.iter().find_map(|item| {
        if item.get("name")?.as_str()? == name {
            Some(item.get("id")?.as_str()?.to_string())
        } else {
            None
        }
    })
}

/// Index board labels by lower-cased name, skipping unnamed ones. Judges
/// are stored lower-cased, so lookups match directly.
fn label_index(labels: &Value) -> HashMap<String, String> {
    labels
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?;
                    let id = item.get("id")?.as_str()?;
                    if name.is_empty() {
                        None
                    } else {
                        Some((name.to_lowercase(), id.to_string()))
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}
