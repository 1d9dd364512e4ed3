use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::constants;

// --- Catalog model ---

/// A single playable episode inside a play source group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Episode {
  #[serde(default)]
  pub name: String,
  pub url: String,
}

/// One site's entry for a show, as served by `/api/videos`.
///
/// `vod_sub` and `vod_content` may be present but empty; the UI treats
/// empty and absent the same. `play_urls` groups episode lists by play
/// source name and iterates in sorted order.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoSource {
  #[serde(default)]
  pub vod_id: i64,
  #[serde(default)]
  pub source: String,
  #[serde(default)]
  pub vod_name: String,
  #[serde(default)]
  pub vod_sub: String,
  #[serde(default)]
  pub vod_content: String,
  #[serde(default)]
  pub play_urls: BTreeMap<String, Vec<Episode>>,
}

/// The full catalog: category name to the sources aggregated under it.
/// A `BTreeMap` keeps categories in sorted order for display.
pub type Catalog = BTreeMap<String, Vec<VideoSource>>;

// --- Client ---

/// HTTP client for the catalog backend.
#[derive(Clone)]
pub struct CatalogClient {
  http: Client,
  base: String,
}

impl CatalogClient {
  pub fn new(base: &str) -> Result<Self> {
    let c = constants();
    let http = Client::builder()
      .user_agent(&c.user_agent)
      .connect_timeout(Duration::from_secs(c.connect_timeout_secs))
      .timeout(Duration::from_secs(c.request_timeout_secs))
      .build()
      .context("Failed to build HTTP client")?;
    Ok(Self { http, base: base.trim_end_matches('/').to_string() })
  }

  pub fn base(&self) -> &str {
    &self.base
  }

  /// Fetch the full categorized catalog from `/api/videos`.
  pub async fn fetch_catalog(&self) -> Result<Catalog> {
    let url = format!("{}{}", self.base, constants().videos_path);
    debug!(url = %url, "fetching catalog");
    let response = self.http.get(&url).send().await.with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(anyhow!("Catalog request failed ({}): {}", status, body.trim()));
    }

    let catalog: Catalog = response.json().await.context("Failed to decode catalog JSON")?;
    info!(categories = catalog.len(), "catalog fetched");
    Ok(catalog)
  }

  /// Ask the backend to run a search and rebuild its catalog.
  ///
  /// The backend replies with a plain-text body; on a non-2xx status that
  /// body is the user-visible failure message.
  pub async fn search(&self, keyword: &str) -> Result<()> {
    let url = format!("{}{}", self.base, constants().search_path);
    info!(keyword = %keyword, "search request");
    let response = self
      .http
      .post(&url)
      .json(&json!({ "keyword": keyword }))
      .send()
      .await
      .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      let msg = if body.trim().is_empty() { status.to_string() } else { body.trim().to_string() };
      return Err(anyhow!(msg));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- catalog decoding ---

  #[test]
  fn decode_catalog_full_shape() {
    let json = r#"{
      "Drama": [{
        "vod_id": 42,
        "source": "S1",
        "vod_name": "Drama",
        "vod_sub": "2024",
        "vod_content": "A show.",
        "play_urls": {
          "HD": [{"name": "EP1", "url": "http://v.example/ep1.m3u8"}]
        }
      }]
    }"#;
    let catalog: Catalog = serde_json::from_str(json).unwrap();
    let sources = &catalog["Drama"];
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].vod_id, 42);
    assert_eq!(sources[0].source, "S1");
    assert_eq!(sources[0].vod_sub, "2024");
    let episodes = &sources[0].play_urls["HD"];
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0], Episode { name: "EP1".to_string(), url: "http://v.example/ep1.m3u8".to_string() });
  }

  #[test]
  fn decode_source_missing_fields_defaults() {
    let json = r#"{"Show": [{"vod_name": "Show", "source": "Mirror"}]}"#;
    let catalog: Catalog = serde_json::from_str(json).unwrap();
    let source = &catalog["Show"][0];
    assert_eq!(source.vod_id, 0);
    assert_eq!(source.vod_sub, "");
    assert_eq!(source.vod_content, "");
    assert!(source.play_urls.is_empty());
  }

  #[test]
  fn decode_episode_missing_name_defaults_to_empty() {
    let json = r#"{"Show": [{"source": "S", "play_urls": {"HD": [{"url": "http://v/1.mp4"}]}}]}"#;
    let catalog: Catalog = serde_json::from_str(json).unwrap();
    let episodes = &catalog["Show"][0].play_urls["HD"];
    assert_eq!(episodes[0].name, "");
    assert_eq!(episodes[0].url, "http://v/1.mp4");
  }

  #[test]
  fn catalog_categories_iterate_sorted() {
    let json = r#"{"Zebra": [], "Alpha": [], "Mango": []}"#;
    let catalog: Catalog = serde_json::from_str(json).unwrap();
    let names: Vec<&str> = catalog.keys().map(String::as_str).collect();
    assert_eq!(names, ["Alpha", "Mango", "Zebra"]);
  }

  #[test]
  fn play_url_groups_iterate_sorted() {
    let json = r#"{"S": [{"source": "S", "play_urls": {"zm": [], "bd": [], "hd": []}}]}"#;
    let catalog: Catalog = serde_json::from_str(json).unwrap();
    let groups: Vec<&str> = catalog["S"][0].play_urls.keys().map(String::as_str).collect();
    assert_eq!(groups, ["bd", "hd", "zm"]);
  }

  // --- client construction ---

  #[test]
  fn base_url_trailing_slash_trimmed() {
    let client = CatalogClient::new("http://localhost:8080/").unwrap();
    assert_eq!(client.base(), "http://localhost:8080");
  }
}
