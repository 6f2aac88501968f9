//! Mapping from Smart Maic field codes to Prometheus metrics.
//!
//! The device reports each measurement under a short field code: per-line
//! quantities carry the line number as a suffix (`V1`, `A2`, `Wh3`), the
//! device-wide totals use bare codes (`A`, `W`, `TWh`, `T`). The tables
//! here are the single source of truth for that naming; both extraction
//! and rendering iterate them in declaration order.

/// Line identifiers as used by the device and as the `line` label value.
pub const LINES: [&str; 3] = ["1", "2", "3"];

/// A per-line electrical quantity reported by the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Voltage,
    Current,
    Power,
    Energy,
    PowerFactor,
    Frequency,
}

impl Quantity {
    /// All per-line quantities, in exposition order.
    pub const ALL: [Quantity; 6] = [
        Quantity::Voltage,
        Quantity::Current,
        Quantity::Power,
        Quantity::Energy,
        Quantity::PowerFactor,
        Quantity::Frequency,
    ];

    /// Field-code prefix used by the device (`V` in `V1`).
    pub fn code_prefix(self) -> &'static str {
        match self {
            Quantity::Voltage => "V",
            Quantity::Current => "A",
            Quantity::Power => "W",
            Quantity::Energy => "Wh",
            Quantity::PowerFactor => "PF",
            Quantity::Frequency => "Fr",
        }
    }

    /// Metric name suffix (prefixed by the configured namespace).
    pub fn metric_name(self) -> &'static str {
        match self {
            Quantity::Voltage => "voltage",
            Quantity::Current => "current",
            Quantity::Power => "power",
            Quantity::Energy => "energy",
            Quantity::PowerFactor => "power_factor",
            Quantity::Frequency => "frequency",
        }
    }

    /// HELP text for the exposition format.
    pub fn help(self) -> &'static str {
        match self {
            Quantity::Voltage => "Voltage per line (V)",
            Quantity::Current => "Current per line (A)",
            Quantity::Power => "Active power per line (W)",
            Quantity::Energy => "Energy per line (Wh)",
            Quantity::PowerFactor => "Power factor per line",
            Quantity::Frequency => "Frequency per line (Hz)",
        }
    }
}

/// Build the device field code for a quantity on a given line.
pub fn field_code(quantity: Quantity, line: &str) -> String {
    format!("{}{}", quantity.code_prefix(), line)
}

/// A device-wide scalar reported by the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    TotalCurrent,
    TotalPower,
    TotalEnergy,
    Temperature,
}

impl Scalar {
    /// All scalar quantities, in exposition order.
    pub const ALL: [Scalar; 4] = [
        Scalar::TotalCurrent,
        Scalar::TotalPower,
        Scalar::TotalEnergy,
        Scalar::Temperature,
    ];

    /// Field code used by the device.
    pub fn code(self) -> &'static str {
        match self {
            Scalar::TotalCurrent => "A",
            Scalar::TotalPower => "W",
            Scalar::TotalEnergy => "TWh",
            Scalar::Temperature => "T",
        }
    }

    /// Metric name suffix (prefixed by the configured namespace).
    pub fn metric_name(self) -> &'static str {
        match self {
            Scalar::TotalCurrent => "total_current",
            Scalar::TotalPower => "total_power",
            Scalar::TotalEnergy => "total_energy",
            Scalar::Temperature => "temperature",
        }
    }

    /// HELP text for the exposition format.
    pub fn help(self) -> &'static str {
        match self {
            Scalar::TotalCurrent => "Total current (A)",
            Scalar::TotalPower => "Total active power (W)",
            Scalar::TotalEnergy => "Total energy (Wh)",
            Scalar::Temperature => "Device temperature (C)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_line_field_codes() {
        assert_eq!(field_code(Quantity::Voltage, "1"), "V1");
        assert_eq!(field_code(Quantity::Current, "2"), "A2");
        assert_eq!(field_code(Quantity::Energy, "3"), "Wh3");
        assert_eq!(field_code(Quantity::PowerFactor, "1"), "PF1");
        assert_eq!(field_code(Quantity::Frequency, "2"), "Fr2");
    }

    #[test]
    fn test_scalar_field_codes() {
        assert_eq!(Scalar::TotalCurrent.code(), "A");
        assert_eq!(Scalar::TotalPower.code(), "W");
        assert_eq!(Scalar::TotalEnergy.code(), "TWh");
        assert_eq!(Scalar::Temperature.code(), "T");
    }

    #[test]
    fn test_full_code_table_is_unique() {
        let mut codes: Vec<String> = Vec::new();
        for quantity in Quantity::ALL {
            for line in LINES {
                codes.push(field_code(quantity, line));
            }
        }
        for scalar in Scalar::ALL {
            codes.push(scalar.code().to_string());
        }

        let mut deduped = codes.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(codes.len(), deduped.len(), "field codes must not collide");
    }

    #[test]
    fn test_metric_names_are_prometheus_safe() {
        for quantity in Quantity::ALL {
            assert!(
                quantity
                    .metric_name()
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c == '_')
            );
        }
        for scalar in Scalar::ALL {
            assert!(
                scalar
                    .metric_name()
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c == '_')
            );
        }
    }
}
