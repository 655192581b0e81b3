use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use futures::{Stream, StreamExt};
use music_queue::core::coordinator::Coordinator;
use music_queue::core::events::QueueEvent;
use music_queue::core::model::{DownloadItem, DownloadStatus, MediaKind, RunId, RunOutcome, RunState};
use music_queue::core::queue::DownloadQueue;
use music_queue::i18n::{get_messages, Locale, Messages};
use music_queue::plugins::http::resolver::infer_kind;
use music_queue::plugins::registry::{ClientCliConfig, MusicClient, PluginRegistry};
use music_queue::view;
use std::sync::Arc;
use tracing::{info, warn};

fn build_cli(registry: &PluginRegistry) -> Command {
    let search = Command::new("search")
        .about("Search the catalog, optionally downloading picked rows")
        .arg(Arg::new("query").help("Search text").required(true).num_args(1))
        .arg(
            Arg::new("type")
                .long("type")
                .short('t')
                .help("Kind of result to search for")
                .value_parser(MediaKind::ALL.map(|k| k.as_str()))
                .default_value("album"),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .help("Maximum number of results")
                .value_parser(value_parser!(u16).range(10..=500))
                .default_value("20"),
        )
        .arg(
            Arg::new("pick")
                .long("pick")
                .short('p')
                .help("Result row to download (1-based, repeatable)")
                .value_parser(value_parser!(usize))
                .action(ArgAction::Append),
        );

    let download = Command::new("download")
        .about("Download one or more URLs")
        .arg(
            Arg::new("urls")
                .help("Album, artist, track or playlist URLs")
                .action(ArgAction::Append)
                .num_args(1..)
                .required(true),
        );

    let app = Command::new("music-queue")
        .about("Sequential music downloader with a cancellable queue")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("locale")
                .long("locale")
                .help("UI language (en, zh)")
                .default_value("en")
                .global(true),
        )
        .subcommand(search)
        .subcommand(download);

    registry.augment_command(app)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "music_queue=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let registry = PluginRegistry::with_defaults();
    let matches = build_cli(&registry).get_matches();

    let Some((name, m)) = matches.subcommand() else {
        return Ok(());
    };

    let locale = m.get_one::<String>("locale").map(|s| Locale::parse(s)).unwrap_or_default();
    let msgs = get_messages(locale);

    let mut cfg = ClientCliConfig::default();
    registry.apply_matches(m, &mut cfg)?;
    let client = registry.build_client(&cfg).await.context("set up music client")?;
    info!(client = client.name(), out_dir = %cfg.ctx.out_dir.display(), "client ready");

    let mut queue = DownloadQueue::new();
    match name {
        "search" => {
            if !search(client.as_ref(), m, &mut queue, msgs).await? {
                return Ok(());
            }
        }
        "download" => {
            let urls = m.get_many::<String>("urls").context("no URLs given")?;
            queue.enqueue(urls.map(|u| DownloadItem::new(infer_kind(u), u.clone(), u.clone())));
        }
        _ => return Ok(()),
    }

    tokio::fs::create_dir_all(&cfg.ctx.out_dir)
        .await
        .with_context(|| format!("create_dir_all {}", cfg.ctx.out_dir.display()))?;

    run_queue(client, &mut queue, msgs).await
}

/// Prints the results and enqueues the picked rows. Returns whether there is
/// anything to download.
async fn search(
    client: &dyn MusicClient,
    m: &ArgMatches,
    queue: &mut DownloadQueue,
    msgs: &Messages,
) -> anyhow::Result<bool> {
    let query = m.get_one::<String>("query").context("missing query")?;
    let kind: MediaKind = m.get_one::<String>("type").context("missing type")?.parse()?;
    let limit = *m.get_one::<u16>("limit").context("missing limit")? as usize;

    let hits = client.search(query, kind, limit).await.with_context(|| format!("search {:?}", query))?;
    if hits.is_empty() {
        println!("{}", msgs.no_results);
        return Ok(false);
    }
    print!("{}", view::results_table(kind, &hits));

    let Some(picks) = m.get_many::<usize>("pick") else {
        return Ok(false);
    };
    for &n in picks {
        let hit = n
            .checked_sub(1)
            .and_then(|i| hits.get(i))
            .with_context(|| format!("--pick {} is not a row between 1 and {}", n, hits.len()))?;
        queue.enqueue([hit.to_item()]);
    }
    Ok(true)
}

async fn run_queue(
    client: Arc<dyn MusicClient>,
    queue: &mut DownloadQueue,
    msgs: &'static Messages,
) -> anyhow::Result<()> {
    let coordinator = Arc::new(Coordinator::new(client));
    let urls = queue.begin_run()?;

    // Subscribe before starting so no event of this run is missed.
    let mut rx = coordinator.subscribe();
    let run_id = coordinator.start(urls).await?;
    println!("{} ({})", msgs.run_started, run_id);

    let interrupt = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let presses = futures::stream::unfold((), |()| async {
                tokio::signal::ctrl_c().await.ok().map(|_| ((), ()))
            });
            if handle_interrupts(Box::pin(presses), &coordinator, run_id).await {
                std::process::exit(130);
            }
        })
    };

    let mut progress = view::RunView::new(msgs);
    let outcome = match progress.drive(&mut rx, run_id, queue).await {
        Some(outcome) => outcome,
        None => coordinator.wait().await.unwrap_or(RunOutcome::Aborted),
    };
    interrupt.abort();

    if queue.is_run_active() {
        // The run ended without its final event reaching the view.
        let _ = queue.apply(&QueueEvent::AllFinished { run_id, outcome });
    }

    println!();
    println!("{}: {}", msgs.outcome(outcome), run_id);
    println!("{}:", msgs.summary_header);
    print!("{}", view::queue_table(queue, msgs));

    let finished: Vec<usize> = queue
        .rows()
        .filter(|(_, item)| item.status == DownloadStatus::Done && item.last_error.is_none())
        .map(|(n, _)| n - 1)
        .collect();
    queue.remove(finished);
    if !queue.is_empty() {
        println!("{}: {}", msgs.left_in_queue, queue.len());
    }

    if outcome == RunOutcome::Aborted {
        anyhow::bail!("run {} aborted", run_id);
    }
    Ok(())
}

/// The first press stops the run cooperatively. Returns `true` on a second
/// press, when the caller should exit even if a client call never returns.
async fn handle_interrupts(
    mut presses: impl Stream<Item = ()> + Unpin,
    coordinator: &Coordinator,
    run_id: RunId,
) -> bool {
    if presses.next().await.is_none() {
        return false;
    }
    if coordinator.state().await == RunState::Running {
        warn!(%run_id, "interrupted, stopping after the current step (Ctrl-C again to exit)");
        coordinator.request_stop().await;
    }
    if presses.next().await.is_none() {
        return false;
    }
    warn!(%run_id, "interrupted again, exiting");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use music_queue::plugins::registry::{OperationSink, SearchHit};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct GatedClient {
        gate: Notify,
    }

    #[async_trait]
    impl MusicClient for GatedClient {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn search(&self, _query: &str, _kind: MediaKind, _limit: usize) -> anyhow::Result<Vec<SearchHit>> {
            Ok(vec![])
        }

        async fn handle(&self, _url: &str, _sink: &mut OperationSink) -> anyhow::Result<()> {
            self.gate.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_interrupt_stops_the_run() {
        let client = Arc::new(GatedClient::default());
        let coordinator = Coordinator::new(client.clone());
        let run_id = coordinator.start(vec!["u0".into(), "u1".into()]).await.unwrap();

        let exit = handle_interrupts(futures::stream::iter([()]), &coordinator, run_id).await;
        assert!(!exit);

        client.gate.notify_one();
        assert_eq!(coordinator.wait().await, Some(RunOutcome::Cancelled));
    }

    #[tokio::test]
    async fn second_interrupt_asks_to_exit_while_client_hangs() {
        let coordinator = Coordinator::new(Arc::new(GatedClient::default()));
        let run_id = coordinator.start(vec!["u0".into()]).await.unwrap();

        let exit = handle_interrupts(futures::stream::iter([(), ()]), &coordinator, run_id).await;

        assert!(exit);
        assert_eq!(coordinator.state().await, RunState::Running);
    }

    fn parse(args: &[&str]) -> Result<ArgMatches, clap::Error> {
        build_cli(&PluginRegistry::with_defaults()).try_get_matches_from(args)
    }

    #[test]
    fn cli_definition_is_valid() {
        build_cli(&PluginRegistry::with_defaults()).debug_assert();
    }

    #[test]
    fn search_limit_is_range_checked() {
        assert!(parse(&["music-queue", "search", "blue", "--limit", "9"]).is_err());
        assert!(parse(&["music-queue", "search", "blue", "--limit", "501"]).is_err());

        let m = parse(&["music-queue", "search", "blue", "--limit", "500", "--type", "track", "-p", "2", "-p", "3"]).unwrap();
        let (_, sub) = m.subcommand().unwrap();
        assert_eq!(*sub.get_one::<u16>("limit").unwrap(), 500);
        assert_eq!(sub.get_one::<String>("type").unwrap(), "track");
        let picks: Vec<usize> = sub.get_many::<usize>("pick").unwrap().copied().collect();
        assert_eq!(picks, vec![2, 3]);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(parse(&["music-queue", "search", "blue", "--type", "label"]).is_err());
    }

    #[test]
    fn global_options_reach_the_client_config() {
        let m = parse(&[
            "music-queue",
            "download",
            "https://x.test/track/1",
            "--out-dir",
            "/tmp/music",
            "--retries",
            "5",
            "--locale",
            "zh",
        ])
        .unwrap();
        let (_, sub) = m.subcommand().unwrap();

        let mut cfg = ClientCliConfig::default();
        PluginRegistry::with_defaults().apply_matches(sub, &mut cfg).unwrap();

        assert_eq!(cfg.ctx.out_dir, std::path::PathBuf::from("/tmp/music"));
        assert_eq!(cfg.ctx.retries, 5);
        assert_eq!(sub.get_one::<String>("locale").unwrap(), "zh");
    }
}
