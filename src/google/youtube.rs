// YouTube Data API v3 client: the channel's playlists and their videos

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::auth::TokenProvider;
use super::errors::{check_status, ApiError};
use super::pagination::{collect_pages, Page};
use crate::backup::models::{Playlist, Video};
use crate::backup::traits::PlaylistSource;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const MAX_RESULTS: &str = "50";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    id: String,
    snippet: PlaylistSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemResource {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemSnippet {
    title: String,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

pub struct YouTubeClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl YouTubeClient {
    pub fn new(http: reqwest::Client, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            tokens,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
        page_token: Option<String>,
    ) -> Result<Page<T>, ApiError> {
        let token = self.tokens.access_token().await?;
        let mut request = self
            .http
            .get(format!("{}/{}", self.base_url, resource))
            .bearer_auth(token)
            .query(query)
            .query(&[("maxResults", MAX_RESULTS)]);
        if let Some(page_token) = page_token.as_deref() {
            request = request.query(&[("pageToken", page_token)]);
        }

        let endpoint = format!("youtube/{}", resource);
        let response = check_status(&endpoint, request.send().await?).await?;
        let list: ListResponse<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("{}: {}", endpoint, e)))?;

        Ok(Page {
            items: list.items,
            next_page_token: list.next_page_token,
        })
    }
}

#[async_trait]
impl PlaylistSource for YouTubeClient {
    async fn list_playlists(&self) -> Result<Vec<Playlist>, ApiError> {
        let resources: Vec<PlaylistResource> = collect_pages(|page_token| {
            self.fetch_page("playlists", &[("part", "snippet"), ("mine", "true")], page_token)
        })
        .await?;

        tracing::debug!(count = resources.len(), "fetched playlists");

        Ok(resources
            .into_iter()
            .map(|p| Playlist {
                id: p.id,
                title: p.snippet.title,
            })
            .collect())
    }

    async fn list_videos(&self, playlist_id: &str) -> Result<Vec<Video>, ApiError> {
        let query = [("part", "snippet"), ("playlistId", playlist_id)];
        let items: Vec<PlaylistItemResource> =
            collect_pages(|page_token| self.fetch_page("playlistItems", &query, page_token))
                .await?;

        let videos = items
            .into_iter()
            .filter_map(|item| {
                let snippet = item.snippet;
                match snippet.resource_id.video_id {
                    Some(id) => Some(Video::from_raw(id, &snippet.title)),
                    None => {
                        tracing::debug!(title = %snippet.title, "playlist item is not a video, ignoring");
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(playlist_id, count = videos.len(), "fetched playlist items");
        Ok(videos)
    }
}
