use std::path::PathBuf;

use crate::error::ConfigError;

/// Configuration for the Plant Guardian daemon loaded from environment variables.
///
/// All values come from the environment so the daemon can run unchanged in a
/// container next to the hosted backend it talks to.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted backend (document API and edge functions).
    /// Environment variable: `SUPABASE_URL`
    pub supabase_url: String,

    /// Anonymous API key sent as `apikey` and bearer token.
    /// Environment variable: `SUPABASE_ANON_KEY`
    pub supabase_anon_key: String,

    /// Plants to monitor, comma separated.
    /// Environment variable: `PLANT_IDS`
    pub plant_ids: Vec<String>,

    /// API key for the identification endpoint. Identification is disabled
    /// when unset.
    /// Environment variable: `GEMINI_API_KEY`
    pub gemini_api_key: Option<String>,

    /// Identification endpoint.
    /// Environment variable: `GEMINI_API_URL`
    pub gemini_api_url: String,

    /// Callable SMS relay function.
    ///
    /// Defaults to the `send-sms` edge function under `SUPABASE_URL`.
    /// Environment variable: `SMS_FUNCTION_URL`
    pub sms_function_url: String,

    /// JSON file holding the per-plant phone numbers.
    /// Environment variable: `PHONE_STORE_PATH`
    pub phone_store_path: PathBuf,

    /// Seconds between two polls of the plant documents.
    /// Environment variable: `POLL_INTERVAL_SECONDS`
    pub poll_interval_seconds: u64,

    /// Image to identify once at startup.
    /// Environment variable: `IDENTIFY_IMAGE`
    pub identify_image: Option<PathBuf>,

    /// Plant that receives the care guide produced from `identify_image`.
    /// Environment variable: `IDENTIFY_PLANT_ID`
    pub identify_plant_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are not set or cannot be parsed:
    /// - `SUPABASE_URL`: Backend base URL (required)
    /// - `SUPABASE_ANON_KEY`: Backend API key (required)
    /// - `PLANT_IDS`: Comma separated plant ids (required)
    /// - `GEMINI_API_KEY`: Identification API key (optional)
    /// - `GEMINI_API_URL`: Identification endpoint (default: Gemini flash model)
    /// - `SMS_FUNCTION_URL`: SMS relay (default: "<SUPABASE_URL>/functions/v1/send-sms")
    /// - `PHONE_STORE_PATH`: Phone number file (default: "./phone-numbers.json")
    /// - `POLL_INTERVAL_SECONDS`: Poll interval (default: "30")
    /// - `IDENTIFY_IMAGE` / `IDENTIFY_PLANT_ID`: One-shot identification (optional)
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar {
                    var_name: name.to_string(),
                })
        };

        let supabase_url = required("SUPABASE_URL")?.trim_end_matches('/').to_string();
        let supabase_anon_key = required("SUPABASE_ANON_KEY")?;

        let plant_ids_raw = required("PLANT_IDS")?;
        let plant_ids: Vec<String> = plant_ids_raw
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        if plant_ids.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "PLANT_IDS".to_string(),
                value: plant_ids_raw,
                reason: "at least one plant id is required".to_string(),
            });
        }

        let gemini_api_key = lookup("GEMINI_API_KEY").filter(|key| !key.is_empty());
        let gemini_api_url =
            lookup("GEMINI_API_URL").unwrap_or_else(|| constants::GEMINI_API_URL.to_string());

        let sms_function_url = lookup("SMS_FUNCTION_URL")
            .unwrap_or_else(|| format!("{}/functions/v1/send-sms", supabase_url));

        let phone_store_path = PathBuf::from(
            lookup("PHONE_STORE_PATH").unwrap_or_else(|| "./phone-numbers.json".to_string()),
        );

        let poll_raw = lookup("POLL_INTERVAL_SECONDS").unwrap_or_else(|| "30".to_string());
        let poll_interval_seconds = match poll_raw.parse::<u64>() {
            Ok(0) | Err(_) => {
                return Err(ConfigError::InvalidValue {
                    field: "POLL_INTERVAL_SECONDS".to_string(),
                    value: poll_raw,
                    reason: "must be a positive whole number of seconds".to_string(),
                });
            }
            Ok(seconds) => seconds,
        };

        Ok(Config {
            supabase_url,
            supabase_anon_key,
            plant_ids,
            gemini_api_key,
            gemini_api_url,
            sms_function_url,
            phone_store_path,
            poll_interval_seconds,
            identify_image: lookup("IDENTIFY_IMAGE").map(PathBuf::from),
            identify_plant_id: lookup("IDENTIFY_PLANT_ID"),
        })
    }
}

/// Application constants used throughout the system.
pub mod constants {
    /// Additional identification attempts after the first one fails.
    pub const MAX_RETRIES: u32 = 2;

    /// Backoff before the first retry, doubled for every further attempt.
    pub const INITIAL_RETRY_DELAY_MS: u64 = 1000;

    /// Upstream payload ceiling; larger images are downscaled and re-encoded.
    pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

    /// Longest side of a downscaled image, in pixels.
    pub const MAX_IMAGE_DIMENSION: u32 = 2048;

    /// JPEG quality used when re-encoding oversized images.
    pub const JPEG_QUALITY: u8 = 80;

    /// Minimum time between two SMS alerts for the same plant.
    pub const SMS_COOLDOWN_SECONDS: i64 = 3600;

    /// Default identification endpoint.
    pub const GEMINI_API_URL: &str =
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
}
