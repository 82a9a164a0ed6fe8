//! Activity event feed
//!
//! Drains the upstream GraphQL feed of on-chain activity events into
//! candidate (token, chainId, timestamp) triples. Pagination is exhaustive:
//! pages of up to 1000 items ordered ascending by timestamp, following the
//! opaque `endCursor` until the feed stops returning one. Filtering to the
//! fixed set of activity-event kinds happens in the query itself; the two
//! sentinel null-token addresses are dropped locally.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::error::PriceError;
use crate::types::{is_null_token, EventCandidate};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Page size requested from the feed.
pub const PAGE_LIMIT: usize = 1000;

/// A restartable producer of event candidates.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Materialize every page, filtered and normalized.
    async fn fetch_all(&self) -> Result<Vec<EventCandidate>, PriceError>;
}

// Wire shapes ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GqlResponse {
    data: GqlData,
}

#[derive(Debug, Deserialize)]
struct GqlData {
    #[serde(rename = "activityEvents")]
    activity_events: ActivityEventsPage,
}

#[derive(Debug, Deserialize)]
struct ActivityEventsPage {
    items: Vec<RawActivityEvent>,
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawActivityEvent {
    timestamp: i64,
    #[serde(rename = "chainId")]
    chain_id: i64,
    project: RawProject,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    token: String,
}

/// One page's query. The where-clause restricts results to the activity
/// kinds that imply a priceable payment.
fn activity_events_query(after: Option<&str>) -> String {
    let after_clause = match after {
        Some(cursor) => format!("after: \"{}\",", cursor),
        None => String::new(),
    };

    format!(
        r#"query ActivityEvents {{
  activityEvents(
    {after_clause}
    limit: {PAGE_LIMIT},
    orderBy: "timestamp",
    orderDirection: "asc",
    where: {{ OR: [
      {{payEvent_not: null}},
      {{sendPayoutsEvent_not: null}},
      {{sendPayoutToSplitEvent_not: null}},
      {{addToBalanceEvent_not: null}},
      {{cashOutTokensEvent_not: null}}
    ]}}
  ) {{
    pageInfo {{
      endCursor
    }}
    items {{
      timestamp
      chainId
      project {{
        token
      }}
    }}
  }}
}}"#
    )
}

/// Drop sentinel tokens and lowercase the rest.
fn normalize(events: Vec<RawActivityEvent>) -> Vec<EventCandidate> {
    events
        .into_iter()
        .filter(|e| !is_null_token(&e.project.token))
        .map(|e| EventCandidate {
            token: e.project.token.to_lowercase(),
            chain_id: e.chain_id,
            timestamp: e.timestamp,
        })
        .collect()
}

/// GraphQL-backed feed implementation.
pub struct ActivityEventSource {
    http: reqwest::Client,
    url: String,
}

impl ActivityEventSource {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.to_string(),
        }
    }

    async fn fetch_page(&self, after: Option<&str>) -> Result<ActivityEventsPage, PriceError> {
        let body = json!({
            "operationName": "ActivityEvents",
            "query": activity_events_query(after),
        });

        let response = self.http.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(PriceError::UpstreamStatus(response.status()));
        }

        let parsed: GqlResponse = response.json().await?;
        Ok(parsed.data.activity_events)
    }
}

#[async_trait]
impl EventFeed for ActivityEventSource {
    async fn fetch_all(&self) -> Result<Vec<EventCandidate>, PriceError> {
        let mut events: Vec<RawActivityEvent> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.fetch_page(cursor.as_deref()).await?;
            pages += 1;
            events.extend(page.items);

            match page.page_info.end_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!("Drained event feed: {} events over {} pages", events.len(), pages);
        Ok(normalize(events))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Feed that serves a fixed candidate list.
    pub struct StaticFeed(pub Vec<EventCandidate>);

    #[async_trait]
    impl EventFeed for StaticFeed {
        async fn fetch_all(&self) -> Result<Vec<EventCandidate>, PriceError> {
            Ok(self.0.clone())
        }
    }
}
