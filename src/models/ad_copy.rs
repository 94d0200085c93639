use serde::{Deserialize, Serialize};
use std::fmt;

/// Which parts of the creative the copywriter should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyFormat {
    #[serde(rename = "headlines")]
    Headlines,
    #[serde(rename = "descriptions")]
    Descriptions,
    #[serde(rename = "headlines+descriptions")]
    HeadlinesAndDescriptions,
}

impl CopyFormat {
    pub fn wants_headlines(&self) -> bool {
        matches!(self, CopyFormat::Headlines | CopyFormat::HeadlinesAndDescriptions)
    }

    pub fn wants_descriptions(&self) -> bool {
        matches!(self, CopyFormat::Descriptions | CopyFormat::HeadlinesAndDescriptions)
    }
}

impl fmt::Display for CopyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyFormat::Headlines => f.write_str("headlines"),
            CopyFormat::Descriptions => f.write_str("descriptions"),
            CopyFormat::HeadlinesAndDescriptions => f.write_str("headlines+descriptions"),
        }
    }
}

/// Brief handed to the copy generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyBrief {
    pub product: String,
    pub audience: String,
    pub tone: String,
    pub format: CopyFormat,
    pub count: usize,
}

/// Generated ad copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdCopy {
    #[serde(default)]
    pub headlines: Vec<String>,
    #[serde(default)]
    pub descriptions: Vec<String>,
}
