//! Network status snapshot and quality classification.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Round-trip time at or above which a connection counts as slow.
const SLOW_RTT_MS: u32 = 1000;

/// Round-trip time below which a 4g connection counts as good.
const GOOD_RTT_MS: u32 = 100;

/// Downlink below which a connection counts as slow.
const SLOW_DOWNLINK_MBPS: f64 = 0.5;

// ============================================================================
// EffectiveType
// ============================================================================

/// Effective connection type reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectiveType {
    /// `slow-2g`
    #[serde(rename = "slow-2g")]
    Slow2g,
    /// `2g`
    #[serde(rename = "2g")]
    TwoG,
    /// `3g`
    #[serde(rename = "3g")]
    ThreeG,
    /// `4g`
    #[serde(rename = "4g")]
    FourG,
    /// No signal, or a value this crate does not recognize.
    #[default]
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl EffectiveType {
    /// Parses a platform string. Unrecognized values map to `Unknown`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Self::Slow2g,
            "2g" => Self::TwoG,
            "3g" => Self::ThreeG,
            "4g" => Self::FourG,
            _ => Self::Unknown,
        }
    }

    /// Returns the platform string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Slow2g => "slow-2g",
            Self::TwoG => "2g",
            Self::ThreeG => "3g",
            Self::FourG => "4g",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ConnectionQuality
// ============================================================================

/// Coarse connection quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    /// Fast, low-latency link.
    Good,
    /// No signal pointing either way.
    #[default]
    Normal,
    /// Constrained or high-latency link.
    Slow,
    /// No connectivity.
    Offline,
}

impl ConnectionQuality {
    /// Per-request timeout recommended for this quality.
    #[must_use]
    pub const fn recommended_timeout(&self) -> Duration {
        match self {
            Self::Good => Duration::from_secs(10),
            Self::Normal => Duration::from_secs(15),
            Self::Slow | Self::Offline => Duration::from_secs(30),
        }
    }
}

// ============================================================================
// ConnectionInfo
// ============================================================================

/// Raw connection signals from the platform. Every field is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Effective connection type.
    pub effective_type: EffectiveType,
    /// Estimated downlink in megabits per second.
    pub downlink: Option<f64>,
    /// Estimated round-trip time in milliseconds.
    pub rtt: Option<u32>,
    /// User requested reduced data usage.
    pub save_data: bool,
}

impl ConnectionInfo {
    /// Creates info with only an effective type.
    #[must_use]
    pub const fn new(effective_type: EffectiveType) -> Self {
        Self {
            effective_type,
            downlink: None,
            rtt: None,
            save_data: false,
        }
    }

    /// Sets the downlink estimate.
    #[must_use]
    pub const fn with_downlink(mut self, mbps: f64) -> Self {
        self.downlink = Some(mbps);
        self
    }

    /// Sets the round-trip estimate.
    #[must_use]
    pub const fn with_rtt(mut self, rtt_ms: u32) -> Self {
        self.rtt = Some(rtt_ms);
        self
    }

    /// Sets the save-data flag.
    #[must_use]
    pub const fn with_save_data(mut self, save_data: bool) -> Self {
        self.save_data = save_data;
        self
    }
}

// ============================================================================
// NetworkStatus
// ============================================================================

/// Full network snapshot delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkStatus {
    /// Whether the platform reports connectivity.
    pub online: bool,
    /// Last reported connection signals.
    pub connection: ConnectionInfo,
    /// Quality derived from `online` and `connection`.
    pub quality: ConnectionQuality,
    /// Per-request timeout derived from `quality`.
    pub recommended_timeout: Duration,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::new(true, ConnectionInfo::default())
    }
}

impl NetworkStatus {
    /// Builds a snapshot and derives quality and timeout.
    #[must_use]
    pub fn new(online: bool, connection: ConnectionInfo) -> Self {
        let quality = classify(online, &connection);
        Self {
            online,
            connection,
            quality,
            recommended_timeout: quality.recommended_timeout(),
        }
    }

    /// Returns `true` when the link is offline or slow.
    #[must_use]
    pub fn is_slow(&self) -> bool {
        matches!(
            self.quality,
            ConnectionQuality::Slow | ConnectionQuality::Offline
        )
    }
}

/// Derives quality from raw signals.
fn classify(online: bool, info: &ConnectionInfo) -> ConnectionQuality {
    if !online {
        return ConnectionQuality::Offline;
    }

    let slow_type = matches!(info.effective_type, EffectiveType::Slow2g | EffectiveType::TwoG);
    let slow_rtt = info.rtt.is_some_and(|rtt| rtt >= SLOW_RTT_MS);
    let slow_downlink = info.downlink.is_some_and(|mbps| mbps < SLOW_DOWNLINK_MBPS);

    if slow_type || slow_rtt || slow_downlink || info.save_data {
        return ConnectionQuality::Slow;
    }

    if info.effective_type == EffectiveType::FourG && info.rtt.is_some_and(|rtt| rtt < GOOD_RTT_MS)
    {
        return ConnectionQuality::Good;
    }

    ConnectionQuality::Normal
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_signals() {
        let status = NetworkStatus::default();
        assert!(status.online);
        assert_eq!(status.connection.effective_type, EffectiveType::Unknown);
        assert_eq!(status.quality, ConnectionQuality::Normal);
        assert_eq!(status.recommended_timeout, Duration::from_secs(15));
        assert!(!status.is_slow());
    }

    #[test]
    fn test_offline_wins() {
        let info = ConnectionInfo::new(EffectiveType::FourG).with_rtt(20);
        let status = NetworkStatus::new(false, info);
        assert_eq!(status.quality, ConnectionQuality::Offline);
        assert_eq!(status.recommended_timeout, Duration::from_secs(30));
        assert!(status.is_slow());
    }

    #[test]
    fn test_slow_signals() {
        let cases = [
            ConnectionInfo::new(EffectiveType::Slow2g),
            ConnectionInfo::new(EffectiveType::TwoG),
            ConnectionInfo::new(EffectiveType::FourG).with_rtt(1000),
            ConnectionInfo::new(EffectiveType::ThreeG).with_downlink(0.4),
            ConnectionInfo::new(EffectiveType::FourG)
                .with_rtt(50)
                .with_save_data(true),
        ];

        for info in cases {
            let status = NetworkStatus::new(true, info);
            assert_eq!(status.quality, ConnectionQuality::Slow, "{info:?}");
            assert_eq!(status.recommended_timeout, Duration::from_secs(30));
        }
    }

    #[test]
    fn test_good_requires_fast_4g() {
        let good = NetworkStatus::new(true, ConnectionInfo::new(EffectiveType::FourG).with_rtt(50));
        assert_eq!(good.quality, ConnectionQuality::Good);
        assert_eq!(good.recommended_timeout, Duration::from_secs(10));

        let no_rtt = NetworkStatus::new(true, ConnectionInfo::new(EffectiveType::FourG));
        assert_eq!(no_rtt.quality, ConnectionQuality::Normal);

        let three_g =
            NetworkStatus::new(true, ConnectionInfo::new(EffectiveType::ThreeG).with_rtt(50));
        assert_eq!(three_g.quality, ConnectionQuality::Normal);
    }

    #[test]
    fn test_effective_type_parse() {
        assert_eq!(EffectiveType::parse("slow-2g"), EffectiveType::Slow2g);
        assert_eq!(EffectiveType::parse("2g"), EffectiveType::TwoG);
        assert_eq!(EffectiveType::parse(" 3G "), EffectiveType::ThreeG);
        assert_eq!(EffectiveType::parse("4g"), EffectiveType::FourG);
        assert_eq!(EffectiveType::parse("5g"), EffectiveType::Unknown);
        assert_eq!(EffectiveType::FourG.to_string(), "4g");
    }

    #[test]
    fn test_connection_info_from_platform_json() {
        let info: ConnectionInfo = serde_json::from_str(
            r#"{"effectiveType":"3g","downlink":1.5,"rtt":300,"saveData":false}"#,
        )
        .expect("parse");

        assert_eq!(info.effective_type, EffectiveType::ThreeG);
        assert_eq!(info.downlink, Some(1.5));
        assert_eq!(info.rtt, Some(300));

        let unknown: ConnectionInfo =
            serde_json::from_str(r#"{"effectiveType":"wifi"}"#).expect("parse");
        assert_eq!(unknown.effective_type, EffectiveType::Unknown);
    }
}
