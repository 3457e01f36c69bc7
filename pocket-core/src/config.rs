use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{ConfigError, SyncError};

pub const DEFAULT_API_BASE_URL: &str = "https://getpocket.com";

/// Sync options, read from the same camelCase keys the site build passes to the plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncOptions {
    pub consumer_key: Option<String>,
    pub access_token: Option<String>,
    #[serde(deserialize_with = "u32_or_none")]
    pub weeks_of_history: Option<u32>,
    pub get_current_week_only: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub api_max_records_to_return: Option<u32>,
    pub state_filter_string: String,
    pub tag_filter: bool,
    pub tag_filter_string: Option<String>,
    pub favourite_filter: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub favourite_filter_value: Option<String>,
    pub search_filter: bool,
    pub search_filter_string: Option<String>,
    pub domain_filter: bool,
    pub domain_filter_string: Option<String>,
    pub api_base_url: String,
    pub request_timeout_seconds: u64,
    pub sync_deadline_seconds: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            consumer_key: None,
            access_token: None,
            weeks_of_history: None,
            get_current_week_only: None,
            api_max_records_to_return: None,
            state_filter_string: "all".to_string(),
            tag_filter: false,
            tag_filter_string: None,
            favourite_filter: false,
            favourite_filter_value: None,
            search_filter: false,
            search_filter_string: None,
            domain_filter: false,
            domain_filter_string: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_seconds: 30,
            sync_deadline_seconds: 300,
        }
    }
}

impl SyncOptions {
    /// `<config_dir>/pocket-sync/config.json`
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("pocket-sync").join("config.json"))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Loads the default config file, falling back to defaults when it is missing or unreadable.
    pub fn load() -> Self {
        match Self::config_file_path().and_then(|path| Self::from_file(&path)) {
            Ok(options) => options,
            Err(e) => {
                warn!(error = %e, "unable to load sync options, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn current_week_only(&self) -> bool {
        self.get_current_week_only
            .as_deref()
            .is_some_and(|flag| flag.trim().eq_ignore_ascii_case("y"))
    }

    pub fn credentials(&self) -> Result<(&str, &str), SyncError> {
        let consumer_key = non_empty(self.consumer_key.as_deref())
            .ok_or_else(|| SyncError::configuration("consumerKey was not set"))?;
        let access_token = non_empty(self.access_token.as_deref())
            .ok_or_else(|| SyncError::configuration("accessToken was not set"))?;
        Ok((consumer_key, access_token))
    }

    pub fn max_records(&self) -> Result<u32, SyncError> {
        match self.api_max_records_to_return {
            Some(0) | None => Err(SyncError::configuration(
                "apiMaxRecordsToReturn must be a positive integer",
            )),
            Some(max) => Ok(max),
        }
    }

    /// Checks everything that must hold before the first network call.
    pub fn validate(&self) -> Result<(), SyncError> {
        self.credentials()?;
        self.max_records()?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }

    pub fn sync_deadline(&self) -> Duration {
        Duration::from_secs(self.sync_deadline_seconds.max(1))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// Accepts `500` as well as `"500"`.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a non-negative integer, got {n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a non-negative integer, got {s:?}"))),
        Some(other) => Err(D::Error::custom(format!(
            "expected a non-negative integer, got {other}"
        ))),
    }
}

// Like `lenient_u32`, but an unusable value is left unset so the window calculation
// reports it as a configuration error.
fn u32_or_none<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    })
}

// Accepts `1` as well as `"1"`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(if b { "1" } else { "0" }.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plugin_style_options() {
        let options: SyncOptions = serde_json::from_str(
            r#"{
                "consumerKey": "ck",
                "accessToken": "at",
                "weeksOfHistory": "52",
                "getCurrentWeekOnly": "n",
                "apiMaxRecordsToReturn": "3000",
                "stateFilterString": "archive",
                "favouriteFilter": true,
                "favouriteFilterValue": 1
            }"#,
        )
        .unwrap();

        assert_eq!(options.weeks_of_history, Some(52));
        assert_eq!(options.api_max_records_to_return, Some(3000));
        assert_eq!(options.favourite_filter_value.as_deref(), Some("1"));
        assert_eq!(options.state_filter_string, "archive");
        assert_eq!(options.api_base_url, DEFAULT_API_BASE_URL);
        assert!(!options.current_week_only());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn unusable_history_is_left_unset() {
        let options: SyncOptions = serde_json::from_str(
            r#"{"weeksOfHistory": "a year", "apiMaxRecordsToReturn": 10}"#,
        )
        .unwrap();
        assert_eq!(options.weeks_of_history, None);

        let err = crate::window::fetch_window_start(&options, chrono::Utc::now()).unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
    }

    #[test]
    fn save_then_reload() {
        let mut path = std::env::temp_dir();
        path.push(format!("pocket_sync_config_{}", std::process::id()));
        path.push("config.json");
        let options = SyncOptions {
            consumer_key: Some("ck".into()),
            weeks_of_history: Some(8),
            domain_filter: true,
            domain_filter_string: Some("example.com".into()),
            ..SyncOptions::default()
        };

        options.save(&path).unwrap();
        assert_eq!(SyncOptions::from_file(&path).unwrap(), options);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn rejects_non_numeric_record_cap() {
        let parsed = serde_json::from_str::<SyncOptions>(r#"{"apiMaxRecordsToReturn": "lots"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn current_week_flag_is_case_insensitive() {
        let mut options = SyncOptions::default();
        options.get_current_week_only = Some("Y".into());
        assert!(options.current_week_only());
        options.get_current_week_only = Some("yes".into());
        assert!(!options.current_week_only());
    }

    #[test]
    fn missing_credentials_are_configuration_errors() {
        let mut options = SyncOptions {
            api_max_records_to_return: Some(10),
            consumer_key: Some("ck".into()),
            access_token: Some("   ".into()),
            ..SyncOptions::default()
        };
        assert!(matches!(options.validate(), Err(SyncError::Configuration(_))));

        options.access_token = Some("at".into());
        options.api_max_records_to_return = Some(0);
        assert!(matches!(options.validate(), Err(SyncError::Configuration(_))));
    }
}
