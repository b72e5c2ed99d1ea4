//! Canonical bandwidth-rate grammar: `[0-9]+(\.[0-9]+)?(bps|kbps|Mbps|Gbps)`.
//!
//! Spec §9 calls out that the reference implementation matched rate suffixes
//! ad-hoc; this module is the single place that grammar is enforced so every
//! caller (QoS validation, cluster-config generation) agrees on what a "rate
//! string" means.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+(?:\.[0-9]+)?)(bps|kbps|Mbps|Gbps)$").expect("static pattern is valid"));

/// A validated, parsed bandwidth rate such as `"100Mbps"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    value: f64,
    unit: RateUnit,
}

/// Unit suffix accepted by the rate grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateUnit {
    /// bits per second
    Bps,
    /// kilobits per second
    Kbps,
    /// megabits per second
    Mbps,
    /// gigabits per second
    Gbps,
}

impl RateUnit {
    const fn multiplier(self) -> f64 {
        match self {
            Self::Bps => 1.0,
            Self::Kbps => 1_000.0,
            Self::Mbps => 1_000_000.0,
            Self::Gbps => 1_000_000_000.0,
        }
    }

    const fn suffix(self) -> &'static str {
        match self {
            Self::Bps => "bps",
            Self::Kbps => "kbps",
            Self::Mbps => "Mbps",
            Self::Gbps => "Gbps",
        }
    }
}

impl Rate {
    /// Parse a rate string against the canonical grammar. Case-sensitive:
    /// `"100mbps"` is rejected, only `"100Mbps"` is accepted (matching the
    /// spec's explicit suffix casing).
    pub fn parse(raw: &str) -> Result<Self, RateParseError> {
        let caps = RATE_PATTERN
            .captures(raw)
            .ok_or_else(|| RateParseError::Malformed(raw.to_string()))?;
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| RateParseError::Malformed(raw.to_string()))?;
        let unit = match &caps[2] {
            "bps" => RateUnit::Bps,
            "kbps" => RateUnit::Kbps,
            "Mbps" => RateUnit::Mbps,
            "Gbps" => RateUnit::Gbps,
            _ => unreachable!("regex only captures known suffixes"),
        };
        Ok(Self { value, unit })
    }

    /// Normalize to bits per second.
    #[must_use]
    pub fn as_bps(&self) -> f64 {
        self.value * self.unit.multiplier()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// Error returned when a rate string does not match the canonical grammar.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RateParseError {
    /// The input did not match `[0-9]+(\.[0-9]+)?(bps|kbps|Mbps|Gbps)`.
    #[error("malformed bandwidth rate: {0:?}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_forms() {
        assert!(Rate::parse("100Mbps").is_ok());
        assert!(Rate::parse("0.5Gbps").is_ok());
        assert!(Rate::parse("1500bps").is_ok());
        assert!(Rate::parse("42kbps").is_ok());
    }

    #[test]
    fn rejects_wrong_case_and_garbage() {
        assert!(Rate::parse("100mbps").is_err());
        assert!(Rate::parse("100 Mbps").is_err());
        assert!(Rate::parse("Mbps100").is_err());
        assert!(Rate::parse("").is_err());
        assert!(Rate::parse("100Tbps").is_err());
    }

    #[test]
    fn normalizes_to_bps() {
        let r = Rate::parse("1Mbps").unwrap();
        assert!((r.as_bps() - 1_000_000.0).abs() < f64::EPSILON);
    }

    proptest::proptest! {
        #[test]
        fn display_then_parse_round_trips(
            value in 0u32..1_000_000u32,
            unit_idx in 0usize..4,
        ) {
            let suffix = ["bps", "kbps", "Mbps", "Gbps"][unit_idx];
            let raw = format!("{value}{suffix}");
            let parsed = Rate::parse(&raw).expect("generated string matches the grammar");
            let reparsed = Rate::parse(&parsed.to_string()).expect("Display output must re-parse");
            proptest::prop_assert!((parsed.as_bps() - reparsed.as_bps()).abs() < f64::EPSILON);
        }
    }
}
