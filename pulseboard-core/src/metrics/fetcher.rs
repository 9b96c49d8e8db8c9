use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EndpointConfig;
use crate::error::PulseError;
use crate::models::{AgentMetricsResponse, RawAgentCounters};

use super::fallback::fallback_roster;

/// Result of one fetch cycle. A fetch never fails outright: on any
/// network or schema problem the counters are the deterministic
/// fallback roster, `synthetic` is set, and the cause rides along for
/// logging and state decisions.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub counters: Vec<RawAgentCounters>,
    pub synthetic: bool,
    pub cause: Option<PulseError>,
}

impl FetchOutcome {
    pub fn live(counters: Vec<RawAgentCounters>) -> Self {
        Self {
            counters,
            synthetic: false,
            cause: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            counters: Vec::new(),
            synthetic: false,
            cause: Some(PulseError::EmptyDataset),
        }
    }

    pub fn fallback(counters: Vec<RawAgentCounters>, cause: PulseError) -> Self {
        Self {
            counters,
            synthetic: true,
            cause: Some(cause),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.synthetic && !self.counters.is_empty()
    }

    pub fn is_empty_dataset(&self) -> bool {
        matches!(self.cause, Some(PulseError::EmptyDataset))
    }
}

/// Source of raw agent counters. The poller is written against this
/// trait so tests can script outcomes without a network.
#[async_trait]
pub trait CounterSource: Send + Sync {
    async fn fetch(&self) -> FetchOutcome;

    /// Distinguishes "backend down" from "backend empty"; best effort.
    async fn health_check(&self) -> bool {
        true
    }
}

/// HTTP fetcher for `GET {base_url}/api/metrics/agents`.
///
/// Owns the request timeout and the fallback substitution; it keeps no
/// cache of its own (caching is the poller's job).
pub struct HttpMetricsFetcher {
    client: Client,
    base_url: String,
    timeout: Duration,
    probe_health_on_failure: bool,
}

impl HttpMetricsFetcher {
    pub fn new(config: &EndpointConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &EndpointConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            probe_health_on_failure: config.probe_health_on_failure,
        }
    }

    fn metrics_url(&self) -> String {
        format!("{}/api/metrics/agents", self.base_url)
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    async fn fetch_live(&self) -> Result<Vec<RawAgentCounters>, PulseError> {
        let url = self.metrics_url();

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PulseError::RequestTimeout {
                        url: url.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    PulseError::RequestFailed {
                        url: url.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PulseError::UnexpectedStatus {
                url,
                status: status.as_u16(),
            });
        }

        let payload: AgentMetricsResponse = response
            .json()
            .await
            .map_err(|e| PulseError::MalformedPayload(e.to_string()))?;

        debug!(
            total_agents = payload.total_agents,
            returned = payload.metrics.len(),
            "Fetched raw agent counters"
        );

        Ok(payload.metrics)
    }
}

#[async_trait]
impl CounterSource for HttpMetricsFetcher {
    async fn fetch(&self) -> FetchOutcome {
        match self.fetch_live().await {
            Ok(counters) if counters.is_empty() => {
                debug!("Backend reachable but reported zero agents");
                FetchOutcome::empty()
            }
            Ok(counters) => FetchOutcome::live(counters),
            Err(cause) => {
                warn!(
                    error = %cause,
                    url = %self.metrics_url(),
                    timestamp = %Utc::now(),
                    "Metrics fetch failed, substituting fallback roster"
                );

                if self.probe_health_on_failure {
                    let healthy = self.health_check().await;
                    debug!(healthy, "Health probe after failed metrics fetch");
                }

                FetchOutcome::fallback(fallback_roster(Utc::now()), cause)
            }
        }
    }

    async fn health_check(&self) -> bool {
        let response = self
            .client
            .get(self.health_url())
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> EndpointConfig {
        EndpointConfig {
            base_url: server.uri(),
            fetch_timeout_secs: 2,
            probe_health_on_failure: false,
        }
    }

    #[test]
    fn test_url_construction_strips_trailing_slash() {
        let fetcher = HttpMetricsFetcher::new(&EndpointConfig {
            base_url: "http://localhost:9000/".to_string(),
            fetch_timeout_secs: 5,
            probe_health_on_failure: true,
        });

        assert_eq!(
            fetcher.metrics_url(),
            "http://localhost:9000/api/metrics/agents"
        );
        assert_eq!(fetcher.health_url(), "http://localhost:9000/health");
    }

    #[tokio::test]
    async fn test_fetch_live_counters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/metrics/agents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "timestamp": "2026-08-26T10:00:00Z",
                "totalAgents": 1,
                "activeAgents": 1,
                "metrics": [{"agentId": "code-reviewer", "requests": 10, "errors": 1}]
            })))
            .mount(&server)
            .await;

        let fetcher = HttpMetricsFetcher::new(&config_for(&server));
        let outcome = fetcher.fetch().await;

        assert!(outcome.is_success());
        assert!(!outcome.synthetic);
        assert!(outcome.cause.is_none());
        assert_eq!(outcome.counters.len(), 1);
        assert_eq!(outcome.counters[0].agent_id, "code-reviewer");
    }

    #[tokio::test]
    async fn test_fetch_empty_dataset_is_not_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/metrics/agents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "totalAgents": 0,
                "metrics": []
            })))
            .mount(&server)
            .await;

        let fetcher = HttpMetricsFetcher::new(&config_for(&server));
        let outcome = fetcher.fetch().await;

        assert!(outcome.counters.is_empty());
        assert!(!outcome.synthetic);
        assert!(outcome.is_empty_dataset());
    }

    #[tokio::test]
    async fn test_fetch_server_error_substitutes_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/metrics/agents"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = HttpMetricsFetcher::new(&config_for(&server));
        let outcome = fetcher.fetch().await;

        assert!(outcome.synthetic);
        assert!(!outcome.counters.is_empty());
        let cause = outcome.cause.unwrap();
        assert!(cause.is_network_error());
        assert!(cause.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_fetch_malformed_payload_substitutes_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/metrics/agents"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let fetcher = HttpMetricsFetcher::new(&config_for(&server));
        let outcome = fetcher.fetch().await;

        assert!(outcome.synthetic);
        assert!(outcome.cause.unwrap().is_schema_error());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_substitutes_fallback() {
        // Nothing listens on this port.
        let fetcher = HttpMetricsFetcher::new(&EndpointConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            fetch_timeout_secs: 1,
            probe_health_on_failure: false,
        });
        let outcome = fetcher.fetch().await;

        assert!(outcome.synthetic);
        assert!(outcome.cause.unwrap().is_network_error());
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let fetcher = HttpMetricsFetcher::new(&config_for(&server));
        assert!(fetcher.health_check().await);

        let down = HttpMetricsFetcher::new(&EndpointConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            fetch_timeout_secs: 1,
            probe_health_on_failure: false,
        });
        assert!(!down.health_check().await);
    }
}
