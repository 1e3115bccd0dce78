use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// A `high_anomaly_rate` event ready to hand to a sink.
#[derive(Clone, Debug, Serialize)]
pub struct AlertEvent {
    pub service: String,
    pub count: u32,
    pub window_seconds: u64,
    pub sample_anomalies: Vec<String>,
}

/// Small capability interface for external alert destinations, in the
/// same shape as the teacher's `AIProvider` trait (one `name`, one async
/// verb) — multiple interchangeable backends behind a trait object.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, event: &AlertEvent) -> Result<(), String>;
}

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const PER_ALERT_TIMEOUT: Duration = Duration::from_secs(10);

/// Best-effort delivery with exponential backoff, capped at `MAX_ATTEMPTS`.
/// 4xx other than 429 are treated as permanent and not retried.
pub async fn deliver_with_retry(sink: &dyn AlertSink, event: &AlertEvent) {
    let deadline = tokio::time::Instant::now() + PER_ALERT_TIMEOUT;
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = tokio::time::timeout_at(deadline, sink.deliver(event)).await;
        match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) if is_permanent(&e) => {
                log::warn!("sink {} permanently rejected alert: {e}", sink.name());
                return;
            }
            Ok(Err(e)) => {
                log::warn!("sink {} transient failure (attempt {attempt}): {e}", sink.name());
            }
            Err(_) => {
                log::warn!("sink {} timed out delivering alert", sink.name());
                return;
            }
        }
        if attempt >= MAX_ATTEMPTS {
            log::error!("sink {} exhausted retries for {:?}", sink.name(), event.service);
            return;
        }
        let backoff = BASE_BACKOFF * 2u32.pow(attempt - 1);
        tokio::time::sleep(backoff).await;
    }
}

fn is_permanent(message: &str) -> bool {
    message
        .split_whitespace()
        .find_map(|tok| tok.parse::<u16>().ok())
        .map(|code| (400..500).contains(&code) && code != 429)
        .unwrap_or(false)
}

pub struct SlackSink {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackSink {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for SlackSink {
    fn name(&self) -> &str {
        "slack"
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<(), String> {
        let text = format!(
            "high_anomaly_rate: {} saw {} anomalies in {}s",
            event.service, event.count, event.window_seconds
        );
        post_json(&self.client, &self.webhook_url, &serde_json::json!({ "text": text })).await
    }
}

pub struct PagerDutySink {
    routing_key: String,
    client: reqwest::Client,
}

impl PagerDutySink {
    const EVENTS_URL: &'static str = "https://events.pagerduty.com/v2/enqueue";

    pub fn new(routing_key: String) -> Self {
        Self {
            routing_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for PagerDutySink {
    fn name(&self) -> &str {
        "pagerduty"
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<(), String> {
        let payload = serde_json::json!({
            "routing_key": self.routing_key,
            "event_action": "trigger",
            "payload": {
                "summary": format!("high_anomaly_rate on {}", event.service),
                "source": event.service,
                "severity": "warning",
                "custom_details": event,
            }
        });
        post_json(&self.client, Self::EVENTS_URL, &payload).await
    }
}

pub struct GenericWebhookSink {
    url: String,
    client: reqwest::Client,
}

impl GenericWebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for GenericWebhookSink {
    fn name(&self) -> &str {
        "generic_webhook"
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<(), String> {
        post_json(&self.client, &self.url, event).await
    }
}

async fn post_json(client: &reqwest::Client, url: &str, body: &impl Serialize) -> Result<(), String> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| format!("request error: {e}"))?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakySink {
        fail_times: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl AlertSink for FlakySink {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn deliver(&self, _event: &AlertEvent) -> Result<(), String> {
            let remaining = self.fail_times.load(std::sync::atomic::Ordering::SeqCst);
            if remaining > 0 {
                self.fail_times.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                Err("500 server error".to_string())
            } else {
                Ok(())
            }
        }
    }

    struct PermanentFailSink;

    #[async_trait]
    impl AlertSink for PermanentFailSink {
        fn name(&self) -> &str {
            "permanent"
        }
        async fn deliver(&self, _event: &AlertEvent) -> Result<(), String> {
            Err("404 not found".to_string())
        }
    }

    fn sample_event() -> AlertEvent {
        AlertEvent {
            service: "web_server".to_string(),
            count: 5,
            window_seconds: 60,
            sample_anomalies: vec![],
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let sink = FlakySink {
            fail_times: std::sync::atomic::AtomicU32::new(2),
        };
        deliver_with_retry(&sink, &sample_event()).await;
        assert_eq!(sink.fail_times.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn permanent_failure_does_not_retry() {
        let sink = PermanentFailSink;
        deliver_with_retry(&sink, &sample_event()).await;
    }
}
