//! Device polling and gauge updates.
//!
//! One [`DeviceClient::refresh`] call is one fetch attempt: no retries, no
//! background loop. Every failure class is converted into a status update;
//! nothing propagates to the HTTP handler that triggered the scrape.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::device::DeviceReport;
use crate::mapping::{LINES, Quantity, Scalar, field_code};
use crate::registry::{DeviceStatus, MetricRegistry};

/// Error type for fetch operations, one variant per failure class.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("device rate limited the request (HTTP 429)")]
    RateLimited,
    #[error("unexpected HTTP status: {0}")]
    Status(StatusCode),
    #[error("malformed device payload: {0}")]
    Decode(String),
    #[error("device response carried no measurement data")]
    EmptyPayload,
}

/// Fully extracted numeric content of one device report, laid out in the
/// mapping-table order the registry expects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurements {
    /// Per-line values, indexed `[quantity][line]`.
    pub per_line: [[f64; LINES.len()]; Quantity::ALL.len()],
    /// Device-wide scalar values, indexed by [`Scalar::ALL`] order.
    pub scalars: [f64; Scalar::ALL.len()],
}

/// Extract every expected field from a report.
///
/// Missing fields default to 0.0 and extraction continues; this trades
/// correctness for availability and matches what the device does when a
/// line is unused. A field that is present but not numeric fails the whole
/// extraction so the registry keeps its previous values.
pub fn extract(report: &DeviceReport) -> Result<Measurements, FetchError> {
    let mut measurements = Measurements::default();

    for (qi, quantity) in Quantity::ALL.iter().enumerate() {
        for (li, line) in LINES.iter().enumerate() {
            let code = field_code(*quantity, line);
            measurements.per_line[qi][li] = match report.field(&code) {
                Some(value) => value
                    .as_f64()
                    .map_err(|e| FetchError::Decode(format!("field {}: {}", code, e)))?,
                None => 0.0,
            };
        }
    }

    for (si, scalar) in Scalar::ALL.iter().enumerate() {
        let code = scalar.code();
        measurements.scalars[si] = match report.field(code) {
            Some(value) => value
                .as_f64()
                .map_err(|e| FetchError::Decode(format!("field {}: {}", code, e)))?,
            None => 0.0,
        };
    }

    Ok(measurements)
}

/// HTTP client for one Smart Maic device.
pub struct DeviceClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl DeviceClient {
    /// Create a client for the configured device endpoint.
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Fetch and decode one report from the device.
    pub async fn fetch(&self) -> Result<DeviceReport, FetchError> {
        let response = tokio::time::timeout(self.timeout, self.http.get(&self.url).send())
            .await
            .map_err(|_| FetchError::Transport("request timed out".to_string()))?
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited),
            status if !status.is_success() => return Err(FetchError::Status(status)),
            _ => {}
        }

        let body = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| FetchError::Transport("response body timed out".to_string()))?
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let report: DeviceReport =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        if report.data.is_empty() {
            return Err(FetchError::EmptyPayload);
        }

        Ok(report)
    }

    /// Perform one fetch cycle and update the registry.
    ///
    /// Numeric gauges are only written on full success; every failure class
    /// leaves them stale and moves the status gauge.
    pub async fn refresh(&self, registry: &MetricRegistry) -> DeviceStatus {
        let started = Instant::now();
        debug!(url = %self.url, "fetching device report");

        let status = match self.fetch().await {
            Ok(report) => match extract(&report) {
                Ok(measurements) => {
                    registry.apply(&measurements);
                    registry.set_scrape_duration(started.elapsed().as_secs_f64());
                    debug!(
                        devid = %report.devid,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "device report applied"
                    );
                    DeviceStatus::Ok
                }
                Err(e) => {
                    warn!("field extraction failed: {}", e);
                    DeviceStatus::Offline
                }
            },
            Err(FetchError::RateLimited) => {
                warn!("device rate limited the scrape (HTTP 429)");
                DeviceStatus::RateLimited
            }
            Err(FetchError::Transport(e)) => {
                warn!(error = %e, "device unreachable");
                DeviceStatus::Offline
            }
            Err(FetchError::Status(code)) => {
                warn!(status = %code, "unexpected device HTTP status");
                DeviceStatus::Offline
            }
            Err(FetchError::Decode(e)) => {
                warn!(error = %e, "malformed device payload");
                DeviceStatus::Offline
            }
            Err(FetchError::EmptyPayload) => {
                warn!("device responded without measurement data");
                DeviceStatus::Offline
            }
        };

        registry.set_status(status);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_from_json(json: serde_json::Value) -> DeviceReport {
        serde_json::from_value(json).unwrap()
    }

    fn complete_report() -> DeviceReport {
        let mut data = serde_json::Map::new();
        for (qi, quantity) in Quantity::ALL.iter().enumerate() {
            for (li, line) in LINES.iter().enumerate() {
                data.insert(
                    field_code(*quantity, line),
                    serde_json::json!({ "value": format!("{}", qi * 10 + li + 1) }),
                );
            }
        }
        data.insert("A".to_string(), serde_json::json!({ "value": "3.6" }));
        data.insert("W".to_string(), serde_json::json!({ "value": 830 }));
        data.insert("TWh".to_string(), serde_json::json!({ "value": "1000" }));
        data.insert("T".to_string(), serde_json::json!({ "value": "25" }));

        report_from_json(serde_json::json!({ "devid": "test", "data": data }))
    }

    #[test]
    fn test_extract_complete_report() {
        let measurements = extract(&complete_report()).unwrap();

        // Voltage line 1 is the first table entry.
        assert_eq!(measurements.per_line[0][0], 1.0);
        // Frequency line 3 is the last.
        assert_eq!(measurements.per_line[5][2], 53.0);
        assert_eq!(measurements.scalars, [3.6, 830.0, 1000.0, 25.0]);
    }

    #[test]
    fn test_extract_missing_field_defaults_to_zero() {
        let mut report = complete_report();
        report.data.remove("PF2");

        let measurements = extract(&report).unwrap();

        // PF2: power factor (index 4), line 2 (index 1).
        assert_eq!(measurements.per_line[4][1], 0.0);
        // Neighbours are untouched.
        assert_eq!(measurements.per_line[4][0], 41.0);
        assert_eq!(measurements.per_line[4][2], 43.0);
    }

    #[test]
    fn test_extract_malformed_field_fails_whole_report() {
        let mut report = complete_report();
        report.data.insert(
            "V1".to_string(),
            serde_json::from_value(serde_json::json!({ "value": "garbage" })).unwrap(),
        );

        let result = extract(&report);
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_extract_sparse_payload() {
        let report = report_from_json(serde_json::json!({
            "data": {
                "V1": { "value": "230.5" },
                "A1": { "value": "1.2" },
                "T": { "value": "25" },
                "TWh": { "value": "1000" }
            }
        }));

        let measurements = extract(&report).unwrap();
        assert_eq!(measurements.per_line[0][0], 230.5);
        assert_eq!(measurements.per_line[1][0], 1.2);
        assert_eq!(measurements.scalars[3], 25.0);
        assert_eq!(measurements.scalars[2], 1000.0);
    }
}
