//! Gauge registry and Prometheus text exposition rendering.

use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::fetcher::Measurements;
use crate::mapping::{LINES, Quantity, Scalar};

/// Outcome of the most recent device fetch, exposed as a gauge value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceStatus {
    /// Device unreachable, errored, or sent an unusable payload.
    /// Also the initial state before the first scrape.
    #[default]
    Offline,
    /// Last fetch succeeded and all fields were applied.
    Ok,
    /// Device answered HTTP 429.
    RateLimited,
}

impl DeviceStatus {
    /// Numeric encoding used on the wire (0 = offline, 1 = ok, 2 = rate limited).
    pub fn as_f64(self) -> f64 {
        match self {
            DeviceStatus::Offline => 0.0,
            DeviceStatus::Ok => 1.0,
            DeviceStatus::RateLimited => 2.0,
        }
    }
}

/// Current value of every gauge. Indexed in the declaration order of the
/// mapping tables so rendering is deterministic.
#[derive(Debug, Clone, Default)]
struct Gauges {
    per_line: [[f64; LINES.len()]; Quantity::ALL.len()],
    scalars: [f64; Scalar::ALL.len()],
    scrape_duration: f64,
    status: DeviceStatus,
    scrapes: u64,
}

/// Thread-safe registry holding the fixed gauge set for the process lifetime.
///
/// Gauges keep the last successfully applied value; a failed refresh only
/// moves the status gauge. Written by the fetcher, read by the renderer.
pub struct MetricRegistry {
    prefix: String,
    state: RwLock<Gauges>,
}

impl MetricRegistry {
    /// Create a registry with all gauges at zero and status offline.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            state: RwLock::new(Gauges::default()),
        }
    }

    /// Write a full set of measurements into the numeric gauges.
    pub fn apply(&self, measurements: &Measurements) {
        let mut state = self.state.write();
        state.per_line = measurements.per_line;
        state.scalars = measurements.scalars;
    }

    /// Record how long the last successful fetch took.
    pub fn set_scrape_duration(&self, seconds: f64) {
        self.state.write().scrape_duration = seconds;
    }

    /// Record the outcome of a refresh. Called exactly once per scrape.
    pub fn set_status(&self, status: DeviceStatus) {
        let mut state = self.state.write();
        state.status = status;
        state.scrapes += 1;
    }

    /// Outcome of the most recent refresh.
    pub fn status(&self) -> DeviceStatus {
        self.state.read().status
    }

    /// Number of refreshes performed since startup.
    pub fn scrape_count(&self) -> u64 {
        self.state.read().scrapes
    }

    /// Render all gauges in Prometheus text exposition format.
    ///
    /// Iteration follows the fixed mapping-table order, so repeated renders
    /// of unchanged state are byte-identical.
    pub fn render(&self) -> String {
        let state = self.state.read();
        let mut output = Vec::with_capacity(2048);

        for (qi, quantity) in Quantity::ALL.iter().enumerate() {
            let name = format!("{}_{}", self.prefix, quantity.metric_name());
            writeln!(output, "# HELP {} {}", name, quantity.help()).ok();
            writeln!(output, "# TYPE {} gauge", name).ok();
            for (li, line) in LINES.iter().enumerate() {
                writeln!(
                    output,
                    "{}{{line=\"{}\"}} {}",
                    name,
                    line,
                    format_value(state.per_line[qi][li])
                )
                .ok();
            }
        }

        for (si, scalar) in Scalar::ALL.iter().enumerate() {
            let name = format!("{}_{}", self.prefix, scalar.metric_name());
            writeln!(output, "# HELP {} {}", name, scalar.help()).ok();
            writeln!(output, "# TYPE {} gauge", name).ok();
            writeln!(output, "{} {}", name, format_value(state.scalars[si])).ok();
        }

        let name = format!("{}_scrape_duration_seconds", self.prefix);
        writeln!(
            output,
            "# HELP {} Time taken to fetch and map the device report in seconds",
            name
        )
        .ok();
        writeln!(output, "# TYPE {} gauge", name).ok();
        writeln!(output, "{} {}", name, format_value(state.scrape_duration)).ok();

        let name = format!("{}_device_api_status", self.prefix);
        writeln!(
            output,
            "# HELP {} Device API status (0 = offline, 1 = ok, 2 = rate limited)",
            name
        )
        .ok();
        writeln!(output, "# TYPE {} gauge", name).ok();
        writeln!(output, "{} {}", name, format_value(state.status.as_f64())).ok();

        writeln!(output).ok();
        writeln!(output, "# TYPE {}_exporter_scrapes_total counter", self.prefix).ok();
        writeln!(
            output,
            "{}_exporter_scrapes_total {}",
            self.prefix, state.scrapes
        )
        .ok();

        String::from_utf8(output).unwrap_or_default()
    }
}

/// Create a shareable registry handle.
pub type SharedRegistry = Arc<MetricRegistry>;

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_measurements() -> Measurements {
        let mut m = Measurements::default();
        for (qi, _) in Quantity::ALL.iter().enumerate() {
            for (li, _) in LINES.iter().enumerate() {
                m.per_line[qi][li] = (qi * 10 + li + 1) as f64 + 0.5;
            }
        }
        m.scalars = [3.6, 830.0, 1000.0, 25.0];
        m
    }

    #[test]
    fn test_initial_state_renders_zeroes_and_offline() {
        let registry = MetricRegistry::new("smart_maic");
        let output = registry.render();

        assert!(output.contains("smart_maic_voltage{line=\"1\"} 0"));
        assert!(output.contains("smart_maic_device_api_status 0"));
    }

    #[test]
    fn test_apply_and_render_round_trip() {
        let registry = MetricRegistry::new("smart_maic");
        registry.apply(&sample_measurements());
        registry.set_status(DeviceStatus::Ok);

        let output = registry.render();
        assert!(output.contains("smart_maic_voltage{line=\"1\"} 1.5"));
        assert!(output.contains("smart_maic_frequency{line=\"3\"} 53.5"));
        assert!(output.contains("smart_maic_total_energy 1000"));
        assert!(output.contains("smart_maic_temperature 25"));
        assert!(output.contains("smart_maic_device_api_status 1"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let registry = MetricRegistry::new("smart_maic");
        registry.apply(&sample_measurements());
        registry.set_status(DeviceStatus::Ok);

        assert_eq!(registry.render(), registry.render());
    }

    #[test]
    fn test_failed_refresh_only_moves_status() {
        let registry = MetricRegistry::new("smart_maic");
        registry.apply(&sample_measurements());
        registry.set_status(DeviceStatus::Ok);
        let before = registry.render();

        registry.set_status(DeviceStatus::RateLimited);
        let after = registry.render();

        assert!(before.contains("smart_maic_device_api_status 1"));
        assert!(after.contains("smart_maic_device_api_status 2"));
        // Every numeric line is untouched.
        for (a, b) in before.lines().zip(after.lines()) {
            if !a.contains("device_api_status") && !a.contains("scrapes_total") {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_help_and_type_comments_present() {
        let registry = MetricRegistry::new("smart_maic");
        let output = registry.render();

        assert!(output.contains("# HELP smart_maic_voltage Voltage per line (V)"));
        assert!(output.contains("# TYPE smart_maic_voltage gauge"));
        assert!(output.contains("# TYPE smart_maic_device_api_status gauge"));
    }

    #[test]
    fn test_custom_prefix() {
        let registry = MetricRegistry::new("meter");
        let output = registry.render();
        assert!(output.contains("meter_voltage{line=\"1\"}"));
        assert!(!output.contains("smart_maic_"));
    }

    #[test]
    fn test_status_values_are_distinct() {
        assert_eq!(DeviceStatus::Offline.as_f64(), 0.0);
        assert_eq!(DeviceStatus::Ok.as_f64(), 1.0);
        assert_eq!(DeviceStatus::RateLimited.as_f64(), 2.0);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(230.5), "230.5");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }
}
