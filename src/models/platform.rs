use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Advertising platforms the gateway simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Meta,
    Google,
    Tiktok,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Meta, Platform::Google, Platform::Tiktok];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Meta => "meta",
            Platform::Google => "google",
            Platform::Tiktok => "tiktok",
        }
    }

    /// Batch ad creation is only offered by meta and google.
    pub fn supports_batch_ads(&self) -> bool {
        matches!(self, Platform::Meta | Platform::Google)
    }

    /// Fixed reporting baseline for the simulated analytics endpoint.
    pub fn base_metrics(&self) -> BaseMetrics {
        match self {
            Platform::Meta => BaseMetrics {
                spend: 245.67,
                impressions: 25_000,
                clicks: 850,
            },
            Platform::Google => BaseMetrics {
                spend: 189.34,
                impressions: 18_500,
                clicks: 620,
            },
            Platform::Tiktok => BaseMetrics {
                spend: 156.78,
                impressions: 32_000,
                clicks: 720,
            },
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meta" => Ok(Platform::Meta),
            "google" => Ok(Platform::Google),
            "tiktok" => Ok(Platform::Tiktok),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseMetrics {
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
}
