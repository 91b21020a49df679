use std::{env, path::PathBuf};

use crate::types::HarvestError;

pub const DEFAULT_PORTAL_BASE_URL: &str = "https://www.lidl.bg/mre/api/v1";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const COUNTRY: &str = "BG";
pub const LANGUAGE_CODE: &str = "bg-BG";

/// Credentials and endpoints for the receipt portal, read once at startup.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub cookie: String,
    pub base_url: String,
    pub country: String,
    pub language: String,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, HarvestError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HarvestError> {
        let cookie = lookup("LIDL_COOKIE").ok_or(HarvestError::MissingEnv("LIDL_COOKIE"))?;
        let base_url = lookup("LIDL_BASE_URL").unwrap_or_else(|| DEFAULT_PORTAL_BASE_URL.into());

        Ok(PortalConfig {
            cookie,
            base_url,
            country: COUNTRY.into(),
            language: LANGUAGE_CODE.into(),
        })
    }
}

/// Credentials for the inference service, read once at startup.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl OpenAiConfig {
    pub fn from_env() -> Result<Self, HarvestError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HarvestError> {
        let api_key = lookup("OPENAI_API_KEY").ok_or(HarvestError::MissingEnv("OPENAI_API_KEY"))?;
        let model = lookup("OPENAI_MODEL").ok_or(HarvestError::MissingEnv("OPENAI_MODEL"))?;
        let base_url = lookup("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into());

        Ok(OpenAiConfig {
            api_key,
            model,
            base_url,
        })
    }
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct HarvestOptions {
    #[builder(default = "self.default_out_dir()")]
    pub out_dir: PathBuf,
    #[builder(default = "3")]
    pub concurrent_analyses: usize,
    #[builder(default = "1")]
    pub min_delay_secs: u64,
    #[builder(default = "3")]
    pub max_delay_secs: u64,
}

impl HarvestOptionsBuilder {
    pub fn default_builder() -> HarvestOptionsBuilder {
        HarvestOptionsBuilder::default()
    }

    fn default_out_dir(&self) -> PathBuf {
        PathBuf::from("out")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_cookie_is_fatal() {
        let err = PortalConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, HarvestError::MissingEnv("LIDL_COOKIE")));
    }

    #[test]
    fn portal_defaults_apply_without_overrides() {
        let config = PortalConfig::from_lookup(|name| {
            (name == "LIDL_COOKIE").then(|| "session=c".to_string())
        })
        .unwrap();
        assert_eq!(config.base_url, DEFAULT_PORTAL_BASE_URL);
        assert_eq!(config.country, "BG");
        assert_eq!(config.language, "bg-BG");
    }

    #[test]
    fn missing_model_is_fatal() {
        let err = OpenAiConfig::from_lookup(|name| {
            (name == "OPENAI_API_KEY").then(|| "key".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, HarvestError::MissingEnv("OPENAI_MODEL")));
    }

    #[test]
    fn options_builder_defaults() {
        let options = HarvestOptionsBuilder::default_builder().build().unwrap();
        assert_eq!(options.out_dir, PathBuf::from("out"));
        assert_eq!(options.concurrent_analyses, 3);
        assert_eq!(options.min_delay_secs, 1);
        assert_eq!(options.max_delay_secs, 3);
    }
}
