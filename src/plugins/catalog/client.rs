use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

use crate::core::model::{MediaKind, Quality};
use crate::core::records::SearchRecord;
use crate::plugins::catalog::manifest;
use crate::plugins::http::driver::HttpFetcher;
use crate::plugins::http::resolver::{file_name, folder_name, infer_kind};
use crate::plugins::registry::{ClientContext, MusicClient, OperationSink, SearchHit};

#[derive(Deserialize)]
struct CatalogEntry {
    kind: String,
    text: String,
    url: String,
    data: serde_json::Value,
}

/// Searches a local JSON catalog and downloads over HTTP.
///
/// Tracks are fetched while handling the URL. Albums, artists and playlists
/// resolve to a track manifest and queue one sub-operation per track.
pub struct CatalogClient {
    hits: Vec<SearchHit>,
    fetcher: HttpFetcher,
    out_dir: PathBuf,
    quality: Quality,
}

impl CatalogClient {
    pub async fn open(catalog: Option<&Path>, ctx: ClientContext) -> anyhow::Result<Self> {
        let json = match catalog {
            Some(path) => tokio::fs::read_to_string(path).await
                .with_context(|| format!("read catalog {}", path.display()))?,
            None => "[]".to_string(),
        };
        let client = Self::from_json(&json, ctx)?;
        info!(entries = client.hits.len(), "catalog loaded");
        Ok(client)
    }

    pub fn from_json(json: &str, ctx: ClientContext) -> anyhow::Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json).context("parse catalog")?;
        let hits = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| -> anyhow::Result<SearchHit> {
                let kind: MediaKind = e.kind.parse().with_context(|| format!("catalog entry {}", i))?;
                let record = SearchRecord::parse(kind, &e.data).with_context(|| format!("catalog entry {}", i))?;
                Ok(SearchHit { text: e.text, url: e.url, record })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let (out_dir, quality) = (ctx.out_dir.clone(), ctx.quality);
        Ok(Self { hits, fetcher: HttpFetcher::new(ctx)?, out_dir, quality })
    }

    pub fn lookup(&self, url: &str) -> Option<&SearchHit> {
        self.hits.iter().find(|h| h.url == url)
    }

    /// Audio URL with the selected `format_id` appended.
    fn audio_url(&self, mut url: Url) -> Url {
        url.query_pairs_mut().append_pair("format_id", &self.quality.format_id().to_string());
        url
    }

    async fn queue_container(&self, url: &str, title: &str, sink: &mut OperationSink) -> anyhow::Result<()> {
        let body = self.fetcher.fetch_text(url).await?;
        let tracks = manifest::parse(url, &body)?;
        if tracks.is_empty() {
            warn!(url, "manifest lists no tracks");
        }

        let folder = self.out_dir.join(folder_name(title));
        let total = tracks.len();
        for (n, track) in tracks.into_iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let target = folder.join(file_name(track.as_str(), &format!("track-{:02}.bin", n + 1)));
            let track = self.audio_url(track);
            sink.push(format!("{} [{}/{}]", title, n + 1, total), async move {
                fetcher.fetch_to_file(track.as_str(), &target).await.map(|_| ())
            });
        }
        debug!(url, tracks = total, quality = self.quality.as_str(), "container expanded");
        Ok(())
    }
}

#[async_trait]
impl MusicClient for CatalogClient {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn search(&self, query: &str, kind: MediaKind, limit: usize) -> anyhow::Result<Vec<SearchHit>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(vec![]);
        }
        Ok(self
            .hits
            .iter()
            .filter(|h| h.record.kind() == kind && h.text.to_lowercase().contains(&query))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn handle(&self, url: &str, sink: &mut OperationSink) -> anyhow::Result<()> {
        let hit = self.lookup(url);
        let kind = hit.map(|h| h.record.kind()).unwrap_or_else(|| infer_kind(url));
        let title = hit
            .map(|h| h.text.clone())
            .unwrap_or_else(|| file_name(url, "untitled"));

        match kind {
            MediaKind::Track => {
                let target = self.out_dir.join(file_name(url, "download.bin"));
                let source = Url::parse(url).with_context(|| format!("track url {}", url))?;
                self.fetcher.fetch_to_file(self.audio_url(source).as_str(), &target).await?;
                Ok(())
            }
            MediaKind::Album | MediaKind::Artist | MediaKind::Playlist => {
                self.queue_container(url, &title, sink).await
            }
        }
    }
}
