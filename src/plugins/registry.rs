use async_trait::async_trait;
use crate::core::model::{DownloadItem, MediaKind, Quality};
use crate::core::records::SearchRecord;
use clap::{ArgMatches, Command};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub text: String,
    pub url: String,
    pub record: SearchRecord,
}

impl SearchHit {
    pub fn to_item(&self) -> DownloadItem {
        DownloadItem::new(self.record.kind(), self.text.clone(), self.url.clone())
    }
}

/// A nested unit of work queued by a client while handling one URL.
pub struct SubOperation {
    pub label: String,
    future: BoxFuture<'static, anyhow::Result<()>>,
}

impl SubOperation {
    pub async fn run(self) -> anyhow::Result<()> {
        self.future.await
    }
}

#[derive(Default)]
pub struct OperationSink {
    ops: VecDeque<SubOperation>,
}

impl OperationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, label: impl Into<String>, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.ops.push_back(SubOperation { label: label.into(), future: Box::pin(fut) });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn pop(&mut self) -> Option<SubOperation> {
        self.ops.pop_front()
    }
}

/// The external music service the coordinator drives.
#[async_trait]
pub trait MusicClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, kind: MediaKind, limit: usize) -> anyhow::Result<Vec<SearchHit>>;

    /// Downloads `url`, or pushes the work for a container URL into `sink`.
    async fn handle(&self, url: &str, sink: &mut OperationSink) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct ClientContext {
    pub out_dir: PathBuf,
    pub quality: Quality,
    pub headers: Vec<(String, String)>,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("./downloads"),
            quality: Quality::default(),
            headers: vec![],
            user_agent: format!("music-queue/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 60,
            retries: 2,
            retry_backoff_ms: 400,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientCliConfig {
    pub catalog: Option<PathBuf>,
    pub ctx: ClientContext,
}

pub trait CliPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn augment_command(&self, cmd: Command) -> Command;
    fn apply_matches(&self, matches: &ArgMatches, cfg: &mut ClientCliConfig) -> anyhow::Result<()>;
}

pub struct PluginRegistry {
    cli_plugins: Vec<Box<dyn CliPlugin>>,
}

impl PluginRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = Self { cli_plugins: vec![] };
        reg.cli_plugins.push(Box::new(crate::plugins::http::cli::HttpCliPlugin::new()));
        reg.cli_plugins.push(Box::new(crate::plugins::catalog::cli::CatalogCliPlugin::new()));
        reg
    }

    pub fn augment_command(&self, cmd: Command) -> Command {
        self.cli_plugins
            .iter()
            .fold(cmd, |c, p| p.augment_command(c))
    }

    pub fn apply_matches(&self, matches: &ArgMatches, cfg: &mut ClientCliConfig) -> anyhow::Result<()> {
        for p in &self.cli_plugins {
            tracing::debug!(plugin = p.name(), "applying cli options");
            p.apply_matches(matches, cfg)?;
        }
        Ok(())
    }

    pub async fn build_client(&self, cfg: &ClientCliConfig) -> anyhow::Result<Arc<dyn MusicClient>> {
        let client = crate::plugins::catalog::client::CatalogClient::open(cfg.catalog.as_deref(), cfg.ctx.clone()).await?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn sink_runs_operations_in_push_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut sink = OperationSink::new();
        for expected in 0..3 {
            let c = counter.clone();
            sink.push(format!("op {expected}"), async move {
                assert_eq!(c.fetch_add(1, Ordering::SeqCst), expected);
                Ok(())
            });
        }
        assert_eq!(sink.len(), 3);

        while let Some(op) = sink.pop() {
            op.run().await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(sink.is_empty());
    }

    #[test]
    fn registry_applies_every_plugin() {
        let registry = PluginRegistry::with_defaults();
        let cmd = registry.augment_command(Command::new("test"));
        let matches = cmd
            .try_get_matches_from(["test", "--retries", "5", "--catalog", "catalog.json", "--out-dir", "music"])
            .unwrap();

        let mut cfg = ClientCliConfig::default();
        registry.apply_matches(&matches, &mut cfg).unwrap();

        assert_eq!(cfg.ctx.retries, 5);
        assert_eq!(cfg.ctx.out_dir, PathBuf::from("music"));
        assert_eq!(cfg.catalog, Some(PathBuf::from("catalog.json")));
    }
}
