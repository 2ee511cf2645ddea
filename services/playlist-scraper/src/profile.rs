//!
//! src/profile.rs
//!
//! Browser header profile chosic expects on its api. The header set is
//! owned by a third party and changes without notice, so it lives here as
//! versioned data that can be swapped from a json file.
//!

use std::{collections::BTreeMap, path::Path};

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use crate::errors::ScraperError;

pub const BUILTIN_PROFILE_VERSION: &str = "chosic-genre-finder/2025-01";

/// Produces the per-request headers for a chosic lookup
pub trait RequestHeaders: Send + Sync {
    fn headers(&self, track_id: &str, nonce: &str) -> Result<HeaderMap, ScraperError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeaderProfile {
    pub version: String,
    pub user_agent: String,
    pub accept: String,
    #[serde(default)]
    pub accept_language: Option<String>,
    pub app: String,
    pub requested_with: String,
    pub cookie: String,
    /// `{track_id}` is substituted per request
    pub referer_template: String,
    #[serde(default)]
    pub extra: BTreeMap<String, String>
}

impl Default for HeaderProfile {
    fn default() -> Self {
        let mut extra = BTreeMap::new();
        extra.insert("Sec-GPC".to_string(), "1".to_string());

        Self {
            version: BUILTIN_PROFILE_VERSION.to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0"
                .to_string(),
            accept: "application/json, text/javascript, */*; q=0.01".to_string(),
            accept_language: Some("en-US,en;q=0.5".to_string()),
            app: "genre_finder".to_string(),
            requested_with: "XMLHttpRequest".to_string(),
            cookie: "pll_language=en".to_string(),
            referer_template: "https://www.chosic.com/music-genre-finder/?track={track_id}"
                .to_string(),
            extra
        }
    }
}

impl HeaderProfile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ScraperError::Config(
            format!("read header profile {}: {e}", path.display())
        ))?;
        let profile: HeaderProfile = serde_json::from_str(&raw).map_err(|e|
            ScraperError::Config(format!("header profile {}: {e}", path.display()))
        )?;
        // fail at startup rather than on the first request
        profile.headers("probe", "probe")?;
        Ok(profile)
    }

    pub fn referer(&self, track_id: &str) -> String {
        self.referer_template.replace("{track_id}", track_id)
    }
}

fn value(name: &str, raw: &str) -> Result<HeaderValue, ScraperError> {
    HeaderValue::from_str(raw).map_err(|e| ScraperError::Config(
        format!("invalid header value for {name}: {e}")
    ))
}

impl RequestHeaders for HeaderProfile {
    fn headers(&self, track_id: &str, nonce: &str) -> Result<HeaderMap, ScraperError> {
        let mut h = HeaderMap::new();
        h.insert(header::USER_AGENT, value("user-agent", &self.user_agent)?);
        h.insert(header::ACCEPT, value("accept", &self.accept)?);
        if let Some(lang) = &self.accept_language {
            h.insert(header::ACCEPT_LANGUAGE, value("accept-language", lang)?);
        }
        h.insert(HeaderName::from_static("x-wp-nonce"), value("x-wp-nonce", nonce)?);
        h.insert(HeaderName::from_static("app"), value("app", &self.app)?);
        h.insert(
            HeaderName::from_static("x-requested-with"),
            value("x-requested-with", &self.requested_with)?
        );
        h.insert(header::REFERER, value("referer", &self.referer(track_id))?);
        h.insert(header::COOKIE, value("cookie", &self.cookie)?);

        for (name, raw) in &self.extra {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e|
                ScraperError::Config(format!("invalid header name {name}: {e}"))
            )?;
            h.insert(name.clone(), value(name.as_str(), raw)?);
        }
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_profile_carries_nonce_and_referer() {
        let profile = HeaderProfile::default();
        let h = profile.headers("4gT1faTjrtFRFTsr2bqqYV", "d38f6cfdd8").unwrap();

        assert_eq!(h["x-wp-nonce"], "d38f6cfdd8");
        assert_eq!(h["app"], "genre_finder");
        assert_eq!(h["x-requested-with"], "XMLHttpRequest");
        assert_eq!(h[header::COOKIE], "pll_language=en");
        assert_eq!(
            h[header::REFERER],
            "https://www.chosic.com/music-genre-finder/?track=4gT1faTjrtFRFTsr2bqqYV"
        );
        assert_eq!(h["sec-gpc"], "1");
    }

    #[test]
    fn profile_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{
            "version": "test/1",
            "user_agent": "Mozilla/5.0",
            "accept": "application/json",
            "app": "genre_finder",
            "requested_with": "XMLHttpRequest",
            "cookie": "pll_language=de",
            "referer_template": "https://example.test/?t={{track_id}}",
            "extra": {{ "X-Extra": "yes" }}
        }}"#).unwrap();

        let profile = HeaderProfile::from_file(file.path()).unwrap();
        assert_eq!(profile.version, "test/1");
        assert_eq!(profile.accept_language, None);

        let h = profile.headers("abc", "n").unwrap();
        assert_eq!(h[header::REFERER], "https://example.test/?t=abc");
        assert_eq!(h[header::COOKIE], "pll_language=de");
        assert_eq!(h["x-extra"], "yes");
        assert!(h.get(header::ACCEPT_LANGUAGE).is_none());
    }

    #[test]
    fn invalid_nonce_is_config_error() {
        let profile = HeaderProfile::default();
        let err = profile.headers("abc", "bad\nnonce").unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
    }
}
