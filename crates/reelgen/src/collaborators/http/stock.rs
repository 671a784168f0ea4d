use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{read_json, send};
use crate::collaborators::{service, CollaboratorError, StockFootageMatcher};
use crate::job::StockClip;

/// Pexels-style video search.
pub struct StockSearchClient {
    client: Client,
    url: String,
    api_key: SecretString,
    overfetch_factor: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<SearchVideo>,
}

#[derive(Deserialize)]
struct SearchVideo {
    id: u64,
    /// Whole seconds.
    duration: u32,
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Deserialize)]
struct VideoFile {
    link: String,
    #[serde(default)]
    quality: Option<String>,
}

impl SearchVideo {
    /// Prefers an HD rendition, then whatever comes first.
    fn into_clip(self) -> Option<StockClip> {
        let link = self
            .video_files
            .iter()
            .find(|f| f.quality.as_deref() == Some("hd"))
            .or_else(|| self.video_files.first())
            .map(|f| f.link.clone())?;
        Some(StockClip {
            id: self.id.to_string(),
            url: link,
            duration_secs: f64::from(self.duration),
        })
    }
}

impl StockSearchClient {
    pub fn new(client: Client, url: &str, api_key: SecretString, overfetch_factor: usize) -> Self {
        Self {
            client,
            url: url.to_string(),
            api_key,
            overfetch_factor: overfetch_factor.max(1),
        }
    }

    fn page_size(&self, segment_count: usize) -> usize {
        (segment_count * self.overfetch_factor).clamp(1, 80)
    }
}

#[async_trait]
impl StockFootageMatcher for StockSearchClient {
    async fn find_clips(
        &self,
        essence: &str,
        segment_count: usize,
    ) -> Result<Vec<StockClip>, CollaboratorError> {
        let per_page = self.page_size(segment_count).to_string();
        let request = self
            .client
            .get(&self.url)
            .header("Authorization", self.api_key.expose_secret())
            .header("Accept", "application/json")
            .query(&[("query", essence), ("per_page", per_page.as_str())]);

        let response: SearchResponse =
            read_json(service::STOCK, send(service::STOCK, request).await?).await?;

        let clips: Vec<StockClip> = response
            .videos
            .into_iter()
            .filter_map(SearchVideo::into_clip)
            .collect();

        if clips.is_empty() {
            return Err(CollaboratorError::failed(
                service::STOCK,
                format!("no clips found for '{}'", essence),
            ));
        }
        tracing::debug!(essence, count = clips.len(), "Stock clips found");
        Ok(clips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(factor: usize) -> StockSearchClient {
        StockSearchClient::new(
            Client::new(),
            "http://localhost/search",
            SecretString::from("k".to_string()),
            factor,
        )
    }

    #[test]
    fn test_page_size_overfetches() {
        assert_eq!(client(2).page_size(6), 12);
        assert_eq!(client(0).page_size(6), 6);
        assert_eq!(client(2).page_size(0), 1);
        assert_eq!(client(10).page_size(20), 80);
    }

    #[test]
    fn test_clip_prefers_hd_rendition() {
        let body = r#"{"videos":[
            {"id":1,"duration":12,"video_files":[
                {"link":"https://v/sd.mp4","quality":"sd","file_type":"video/mp4"},
                {"link":"https://v/hd.mp4","quality":"hd","file_type":"video/mp4"}]},
            {"id":2,"duration":7,"video_files":[{"link":"https://v/only.mp4","quality":null}]},
            {"id":3,"duration":9,"video_files":[]}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let clips: Vec<StockClip> = parsed
            .videos
            .into_iter()
            .filter_map(SearchVideo::into_clip)
            .collect();

        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].url, "https://v/hd.mp4");
        assert_eq!(clips[0].duration_ms(), 12_000.0);
        assert_eq!(clips[1].id, "2");
    }
}
