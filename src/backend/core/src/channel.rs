//! Advertising channels and their per-channel report limits.

use serde::{Deserialize, Serialize};

/// An advertising platform the backend syncs reports from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "google-ads")]
    GoogleAds,
    #[serde(rename = "meta-ads")]
    MetaAds,
    #[serde(rename = "tiktok-ads")]
    TikTokAds,
    #[serde(rename = "microsoft-ads")]
    MicrosoftAds,
    #[serde(rename = "amazon-ads")]
    AmazonAds,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::GoogleAds,
        Channel::MetaAds,
        Channel::TikTokAds,
        Channel::MicrosoftAds,
        Channel::AmazonAds,
    ];

    /// Stable identifier used in store keys and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::GoogleAds => "google-ads",
            Channel::MetaAds => "meta-ads",
            Channel::TikTokAds => "tiktok-ads",
            Channel::MicrosoftAds => "microsoft-ads",
            Channel::AmazonAds => "amazon-ads",
        }
    }

    /// Longest date range, in days, the platform accepts in one report
    /// request.
    pub fn max_period_days(&self) -> u32 {
        match self {
            Channel::GoogleAds => 365,
            Channel::MetaAds => 90,
            Channel::TikTokAds => 30,
            Channel::MicrosoftAds => 180,
            Channel::AmazonAds => 31,
        }
    }

    /// Store key of the channel's active-report set.
    pub fn active_report_key(&self) -> String {
        format!("active-report:{}", self.as_str())
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
