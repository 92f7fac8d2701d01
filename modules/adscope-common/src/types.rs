use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Platform enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Meta,
    Google,
    Tiktok,
    Instagram,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Meta => write!(f, "meta"),
            Platform::Google => write!(f, "google"),
            Platform::Tiktok => write!(f, "tiktok"),
            Platform::Instagram => write!(f, "instagram"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "meta" => Ok(Self::Meta),
            "google" => Ok(Self::Google),
            "tiktok" => Ok(Self::Tiktok),
            "instagram" => Ok(Self::Instagram),
            other => Err(format!("unknown Platform: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdFormat {
    Image,
    Video,
    Carousel,
    Reels,
    Text,
}

impl std::fmt::Display for AdFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdFormat::Image => write!(f, "image"),
            AdFormat::Video => write!(f, "video"),
            AdFormat::Carousel => write!(f, "carousel"),
            AdFormat::Reels => write!(f, "reels"),
            AdFormat::Text => write!(f, "text"),
        }
    }
}

impl std::str::FromStr for AdFormat {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "carousel" => Ok(Self::Carousel),
            "reels" => Ok(Self::Reels),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown AdFormat: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Text,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Image => write!(f, "image"),
            MediaType::Video => write!(f, "video"),
            MediaType::Text => write!(f, "text"),
        }
    }
}

/// What kind of scrape target a brand source describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Domain,
    Keyword,
    PageId,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Domain => write!(f, "domain"),
            SourceType::Keyword => write!(f, "keyword"),
            SourceType::PageId => write!(f, "page_id"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "domain" => Ok(Self::Domain),
            "keyword" => Ok(Self::Keyword),
            "page_id" => Ok(Self::PageId),
            other => Err(format!("unknown SourceType: {other}")),
        }
    }
}

// --- Run enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    Incremental,
    Auto,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Full => write!(f, "full"),
            RunMode::Incremental => write!(f, "incremental"),
            RunMode::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown RunMode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchRunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for BatchRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchRunStatus::Running => write!(f, "running"),
            BatchRunStatus::Completed => write!(f, "completed"),
            BatchRunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for BatchRunStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown BatchRunStatus: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Scheduled,
    ScheduledIncremental,
    ScheduledFull,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerType::Manual => write!(f, "manual"),
            TriggerType::Scheduled => write!(f, "scheduled"),
            TriggerType::ScheduledIncremental => write!(f, "scheduled_incremental"),
            TriggerType::ScheduledFull => write!(f, "scheduled_full"),
        }
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            "scheduled_incremental" => Ok(Self::ScheduledIncremental),
            "scheduled_full" => Ok(Self::ScheduledFull),
            other => Err(format!("unknown TriggerType: {other}")),
        }
    }
}

// --- Ads ---

/// A single advertising creative in the shared cross-platform schema.
///
/// `source_id` + `platform` is the stable identity that makes a creative
/// re-discoverable across scrape runs; everything else is mutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedAd {
    pub source_id: String,
    pub platform: Platform,
    pub format: AdFormat,
    pub advertiser_name: String,
    pub advertiser_handle: Option<String>,
    pub advertiser_avatar_url: Option<String>,
    pub thumbnail_url: String,
    pub preview_url: Option<String>,
    pub media_type: MediaType,
    pub ad_copy: Option<String>,
    pub cta_text: Option<String>,
    pub likes: Option<i32>,
    pub comments: Option<i32>,
    pub shares: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub landing_page_url: Option<String>,
    /// Host of the landing page, lowercased, `www.` stripped.
    pub domain: Option<String>,
    /// Platform-native creative ID when recoverable (Google: `CR…`).
    pub creative_id: Option<String>,
    pub brand_id: Option<Uuid>,
    /// Original upstream payload, kept opaque.
    pub raw_data: serde_json::Value,
}

impl NormalizedAd {
    /// Minimal constructor; callers fill the optional fields they have.
    pub fn new(
        source_id: String,
        platform: Platform,
        format: AdFormat,
        advertiser_name: String,
        thumbnail_url: String,
        media_type: MediaType,
    ) -> Self {
        Self {
            source_id,
            platform,
            format,
            advertiser_name,
            advertiser_handle: None,
            advertiser_avatar_url: None,
            thumbnail_url,
            preview_url: None,
            media_type,
            ad_copy: None,
            cta_text: None,
            likes: None,
            comments: None,
            shares: None,
            start_date: None,
            end_date: None,
            tags: Vec::new(),
            landing_page_url: None,
            domain: None,
            creative_id: None,
            brand_id: None,
            raw_data: serde_json::Value::Null,
        }
    }
}

// --- Brands ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: Uuid,
    pub brand_name: String,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandSource {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub platform: Platform,
    pub source_type: SourceType,
    pub source_value: String,
    pub is_active: bool,
}

/// One concrete unit of scrape work: a brand source resolved for this run.
/// Legacy monitored-domain targets carry no `brand_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub brand_id: Option<Uuid>,
    pub brand_name: String,
    pub platform: Platform,
    pub source_type: SourceType,
    pub source_value: String,
}

impl ScrapeTarget {
    /// Stable label used as the key in per-target result maps and error strings.
    pub fn label(&self) -> String {
        if self.brand_name.is_empty() {
            format!("{}:{}", self.platform, self.source_value)
        } else {
            format!("{}/{}:{}", self.brand_name, self.platform, self.source_value)
        }
    }
}

// --- Run accounting ---

/// Outcome of one target within a batch run. Persisted into the run row's
/// JSONB result map, keyed by target label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetResult {
    pub target: String,
    pub ads_scraped: u32,
    pub ads_new: u32,
    pub ads_updated: u32,
    pub duration_seconds: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UpsertCounts {
    pub new: u32,
    pub updated: u32,
    pub total: u32,
}

impl UpsertCounts {
    pub fn add(&mut self, other: UpsertCounts) {
        self.new += other.new;
        self.updated += other.updated;
        self.total += other.total;
    }
}

/// The accountability record for one orchestration pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: BatchRunStatus,
    pub trigger_type: String,
    pub total_targets: u32,
    pub total_ads_scraped: u32,
    pub total_ads_new: u32,
    pub total_ads_updated: u32,
    pub domain_results: serde_json::Value,
    pub errors: Vec<String>,
}

/// Final report returned by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub batch_run_id: Uuid,
    pub trigger_type: String,
    pub mode: RunMode,
    pub status: BatchRunStatus,
    pub total_targets: u32,
    pub total_ads_scraped: u32,
    pub total_ads_new: u32,
    pub total_ads_updated: u32,
    /// Per-target results in processing order.
    pub target_results: Vec<TargetResult>,
    pub errors: Vec<String>,
}

/// What a dry run would have done: the resolved target list, nothing touched.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunPlan {
    pub trigger_type: String,
    pub mode: RunMode,
    pub total_targets: u32,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RunReport {
    Plan(DryRunPlan),
    Summary(RunSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_through_str() {
        for p in [Platform::Meta, Platform::Google, Platform::Tiktok, Platform::Instagram] {
            assert_eq!(p.to_string().parse::<Platform>().unwrap(), p);
        }
    }

    #[test]
    fn target_label_includes_brand_when_present() {
        let target = ScrapeTarget {
            brand_id: Some(Uuid::new_v4()),
            brand_name: "acme".to_string(),
            platform: Platform::Google,
            source_type: SourceType::Domain,
            source_value: "acme.com".to_string(),
        };
        assert_eq!(target.label(), "acme/google:acme.com");

        let legacy = ScrapeTarget {
            brand_id: None,
            brand_name: String::new(),
            platform: Platform::Google,
            source_type: SourceType::Domain,
            source_value: "acme.com".to_string(),
        };
        assert_eq!(legacy.label(), "google:acme.com");
    }
}
