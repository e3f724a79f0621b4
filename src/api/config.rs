//! Purpose: Load credentials, endpoints, and job wait bounds for the vendor client.
//! Exports: `Credentials`, `Endpoints`, `WaitPolicy`, `ClientConfig`, env var names.
//! Role: Single place that reads the process environment.
//! Invariants: All three credentials are required; empty values count as missing.
//! Invariants: Endpoint base URLs are http(s) with no path, query, or fragment.
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::core::error::{Error, ErrorKind};

pub const SCRAPER_TOKEN_ENV: &str = "THORDATA_SCRAPER_TOKEN";
pub const PUBLIC_TOKEN_ENV: &str = "THORDATA_PUBLIC_TOKEN";
pub const PUBLIC_KEY_ENV: &str = "THORDATA_PUBLIC_KEY";
pub const SCRAPERAPI_BASE_ENV: &str = "THORDATA_SCRAPERAPI_BASE_URL";
pub const OPENAPI_BASE_ENV: &str = "THORDATA_OPENAPI_BASE_URL";

pub const DEFAULT_SCRAPERAPI_BASE: &str = "https://scraperapi.thordata.com";
pub const DEFAULT_OPENAPI_BASE: &str = "https://openapi.thordata.com";

pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct Credentials {
    pub scraper_token: String,
    pub public_token: String,
    pub public_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("scraper_token", &"<redacted>")
            .field("public_token", &"<redacted>")
            .field("public_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let scraper_token = read(SCRAPER_TOKEN_ENV);
        let public_token = read(PUBLIC_TOKEN_ENV);
        let public_key = read(PUBLIC_KEY_ENV);

        match (scraper_token, public_token, public_key) {
            (Some(scraper_token), Some(public_token), Some(public_key)) => Ok(Self {
                scraper_token,
                public_token,
                public_key,
            }),
            (scraper_token, public_token, public_key) => {
                let missing = [
                    (SCRAPER_TOKEN_ENV, scraper_token.is_none()),
                    (PUBLIC_TOKEN_ENV, public_token.is_none()),
                    (PUBLIC_KEY_ENV, public_key.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect::<Vec<_>>();
                Err(Error::new(ErrorKind::Config)
                    .with_message(format!("missing required tokens: {}", missing.join(", ")))
                    .with_hint("Set them in the environment or in a .env file."))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub scraperapi_base: Url,
    pub openapi_base: Url,
}

impl Endpoints {
    pub fn new(scraperapi_base: &str, openapi_base: &str) -> Result<Self, Error> {
        Ok(Self {
            scraperapi_base: normalize_base_url(scraperapi_base)?,
            openapi_base: normalize_base_url(openapi_base)?,
        })
    }

    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scraperapi =
            lookup(SCRAPERAPI_BASE_ENV).unwrap_or_else(|| DEFAULT_SCRAPERAPI_BASE.to_string());
        let openapi = lookup(OPENAPI_BASE_ENV).unwrap_or_else(|| DEFAULT_OPENAPI_BASE.to_string());
        Self::new(&scraperapi, &openapi)
    }
}

/// Bounds for the blocking wait on a submitted job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self {
            credentials: Credentials::from_env()?,
            endpoints: Endpoints::from_env()?,
        })
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw.trim()).map_err(|err| {
        Error::new(ErrorKind::Config)
            .with_message(format!("invalid base url: {raw}"))
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Config)
            .with_message(format!("base url must use http or https scheme: {raw}")));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::Config)
            .with_message(format!("base url must not include a path: {raw}")));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
