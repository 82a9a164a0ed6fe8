//! Webhook notifications for backfill runs
//!
//! Posts the end-of-run summary to a Discord-style webhook as an embed.
//! Absence of a configured URL silently disables this step; a delivery
//! failure is logged and never fails the run.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::backfill::BackfillReport;
use serde::Serialize;
use tracing::{error, info, warn};

/// Webhook message structure
#[derive(Serialize)]
struct WebhookMessage {
    embeds: Vec<Embed>,
}

/// Embed structure for rich formatting
#[derive(Serialize)]
struct Embed {
    title: String,
    author: EmbedAuthor,
    fields: Vec<EmbedField>,
    timestamp: String,
}

#[derive(Serialize)]
struct EmbedAuthor {
    name: String,
}

#[derive(Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

fn report_message(report: &BackfillReport) -> WebhookMessage {
    let field = |name: &str, value: String| EmbedField {
        name: name.to_string(),
        value,
        inline: true,
    };

    WebhookMessage {
        embeds: vec![Embed {
            title: "Updated prices".to_string(),
            author: EmbedAuthor {
                name: "Prices index".to_string(),
            },
            fields: vec![
                field("Total records", report.total_records.to_string()),
                field("Missing prices", report.missing_prices.to_string()),
                field("Attempted", report.attempted.to_string()),
                field("Errors", report.errors.to_string()),
                field("Seed failures", report.seed_failures.to_string()),
            ],
            timestamp: chrono::Utc::now().to_rfc3339(),
        }],
    }
}

/// Webhook notifier for backfill reports
pub struct Notifier {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        if webhook_url.is_some() {
            info!("Webhook notifications enabled");
        } else {
            warn!("WEBHOOK_URL not set - notifications disabled");
        }

        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Deliver the run summary. Failures are logged and swallowed.
    pub async fn send_report(&self, report: &BackfillReport) {
        let webhook_url = match &self.webhook_url {
            Some(url) => url,
            None => return,
        };

        let message = report_message(report);

        match self.client.post(webhook_url).json(&message).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    info!("Backfill report sent to webhook");
                } else {
                    warn!("Webhook returned status: {}", response.status());
                }
            }
            Err(e) => {
                error!("Error sending webhook: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_payload_shape() {
        let report = BackfillReport {
            total_records: 120,
            missing_prices: 7,
            attempted: 65,
            succeeded: 63,
            errors: 2,
            seed_failures: 1,
            batches: 3,
        };

        let payload = serde_json::to_value(report_message(&report)).unwrap();
        let embed = &payload["embeds"][0];

        assert_eq!(embed["title"], "Updated prices");
        assert_eq!(embed["author"]["name"], "Prices index");

        let fields = embed["fields"].as_array().unwrap();
        let pairs: Vec<(String, String)> = fields
            .iter()
            .map(|f| {
                (
                    f["name"].as_str().unwrap().to_string(),
                    f["value"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Total records".to_string(), "120".to_string()),
                ("Missing prices".to_string(), "7".to_string()),
                ("Attempted".to_string(), "65".to_string()),
                ("Errors".to_string(), "2".to_string()),
                ("Seed failures".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_disabled_without_url() {
        let notifier = Notifier::new(None);
        assert!(!notifier.is_enabled());

        let notifier = Notifier::new(Some("https://example.com/hook".into()));
        assert!(notifier.is_enabled());
    }
}
