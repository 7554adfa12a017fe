use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of market event a thread is written about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OptionsSweep,
    DarkPool,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OptionsSweep => "options_sweep",
            EventType::DarkPool => "dark_pool",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "options_sweep" | "sweep" => Ok(EventType::OptionsSweep),
            "dark_pool" | "darkpool" => Ok(EventType::DarkPool),
            other => Err(format!("unknown post type: {}", other)),
        }
    }
}

/// Sentiment label attached to a detected event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

/// Which side of the smile carries the richer implied volatility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkewDirection {
    Call,
    Put,
    Neutral,
}

impl fmt::Display for SkewDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkewDirection::Call => write!(f, "call"),
            SkewDirection::Put => write!(f, "put"),
            SkewDirection::Neutral => write!(f, "neutral"),
        }
    }
}

/// Dealer gamma sign as modeled by the chart data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GammaSign {
    Long,
    Short,
}

impl fmt::Display for GammaSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GammaSign::Long => write!(f, "long"),
            GammaSign::Short => write!(f, "short"),
        }
    }
}

/// One detected market event, produced by the fetch layer and read-only to the gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetrics {
    pub size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contracts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strike: Option<f64>,
    /// ISO date (YYYY-MM-DD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakeven: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub percentile: f64, // 0 to 100
    pub sentiment: Sentiment,
    pub price: f64,
    pub notional_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parsing() {
        assert_eq!("options_sweep".parse::<EventType>().unwrap(), EventType::OptionsSweep);
        assert_eq!("dark-pool".parse::<EventType>().unwrap(), EventType::DarkPool);
        assert!("futures".parse::<EventType>().is_err());
    }

    #[test]
    fn test_metrics_json_shape() {
        let json = serde_json::json!({
            "size": 100.0,
            "strike": 150.0,
            "expiry": "2025-01-17",
            "timestamp": "2025-01-10T15:30:00Z",
            "percentile": 85.0,
            "sentiment": "bullish",
            "price": 150.0,
            "notionalValue": 1500000.0
        });

        let metrics: EventMetrics = serde_json::from_value(json).unwrap();
        assert_eq!(metrics.strike, Some(150.0));
        assert!(metrics.shares.is_none());
        assert_eq!(metrics.sentiment, Sentiment::Bullish);

        let back = serde_json::to_value(&metrics).unwrap();
        assert_eq!(back["notionalValue"], 1500000.0);
        assert!(back.get("shares").is_none());
    }
}
