pub mod ad;
pub mod ad_copy;
pub mod analytics;
pub mod campaign;
pub mod platform;
pub mod token;

pub use ad::{Ad, AdCreated, AdDraft, AdStatus};
pub use ad_copy::{AdCopy, CopyBrief, CopyFormat};
pub use analytics::AnalyticsReport;
pub use campaign::{Campaign, CampaignCreated, NewCampaign, Objective};
pub use platform::{BaseMetrics, Platform};
pub use token::{TokenPair, TokenRecord, TokenValidation};
