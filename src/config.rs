use crate::error::{AppError, Result};

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Hosted-model request timeout (seconds). Search-grounded completions are slow.
pub const GEMINI_TIMEOUT_SECS: u64 = 90;

/// Citations kept per scan and attached to each record.
pub const MAX_CITATIONS: usize = 3;

/// Step applied by the slope range controls.
pub const SLOPE_STEP: f64 = 0.05;

/// Offset above the lower slope bound used when the model omits a score.
pub const DEFAULT_SLOPE_OFFSET: f64 = 0.1;

/// Slope band thresholds shared by the strategy panel and card badges.
pub mod slope_thresholds {
    pub const FLAT_MAX: f64 = 0.10;
    pub const BUILDING_MAX: f64 = 0.35;
    pub const STEADY_MAX: f64 = 0.75;
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Hosted-model credential (GEMINI_API_KEY, falls back to API_KEY).
    pub api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_url: String,
    pub gemini_timeout_secs: u64,
    pub log_level: String,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("API_KEY"))
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            gemini_model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| GEMINI_MODEL.to_string()),
            gemini_api_url: std::env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| GEMINI_API_URL.to_string()),
            gemini_timeout_secs: std::env::var("GEMINI_TIMEOUT_SECS")
                .unwrap_or_else(|_| GEMINI_TIMEOUT_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(GEMINI_TIMEOUT_SECS),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }

    /// Settings handed to the Gemini client. The credential travels with them
    /// so nothing downstream reads the environment.
    pub fn gemini_settings(&self) -> crate::gemini::GeminiSettings {
        crate::gemini::GeminiSettings {
            api_key: self.api_key.clone(),
            model: self.gemini_model.clone(),
            base_url: self.gemini_api_url.clone(),
            timeout_secs: self.gemini_timeout_secs,
        }
    }
}
