use crate::core::events::QueueEvent;
use crate::core::model::{MediaKind, RunId, RunOutcome};
use crate::core::queue::DownloadQueue;
use crate::core::records::SearchRecord;
use crate::i18n::Messages;
use crate::plugins::registry::SearchHit;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Terminal view of one run: a spinner per started item, error lines, and
/// the queue kept in step with the coordinator's events.
pub struct RunView {
    mp: MultiProgress,
    style: ProgressStyle,
    bars: HashMap<usize, ProgressBar>,
    msgs: &'static Messages,
}

impl RunView {
    pub fn new(msgs: &'static Messages) -> Self {
        Self::with_target(msgs, ProgressDrawTarget::stdout())
    }

    #[cfg(test)]
    fn hidden(msgs: &'static Messages) -> Self {
        Self::with_target(msgs, ProgressDrawTarget::hidden())
    }

    fn with_target(msgs: &'static Messages, target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template("{spinner:.green} {prefix} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("|/-\\ ");
        Self { mp: MultiProgress::with_draw_target(target), style, bars: HashMap::new(), msgs }
    }

    /// Consumes events of `run_id` until the run ends.
    ///
    /// Returns `None` if the channel closed first.
    pub async fn drive(
        &mut self,
        rx: &mut mpsc::UnboundedReceiver<QueueEvent>,
        run_id: RunId,
        queue: &mut DownloadQueue,
    ) -> Option<RunOutcome> {
        while let Some(event) = rx.recv().await {
            if event.run_id() != run_id {
                continue;
            }
            if let Some(outcome) = self.on_event(queue, &event) {
                return Some(outcome);
            }
        }
        None
    }

    /// Applies one event to `queue` and the bars. Returns the outcome once
    /// the run is over.
    pub fn on_event(&mut self, queue: &mut DownloadQueue, event: &QueueEvent) -> Option<RunOutcome> {
        if let QueueEvent::AllFinished { outcome, .. } = event {
            for (_, pb) in self.bars.drain() {
                if !pb.is_finished() {
                    pb.abandon_with_message(self.msgs.outcome(*outcome));
                }
            }
        }

        if let Err(e) = queue.apply(event) {
            warn!("event not applied: {}", e);
        }

        match event {
            QueueEvent::ItemStarted { index, .. } => {
                let pb = self.mp.add(ProgressBar::new_spinner());
                pb.set_style(self.style.clone());
                if let Some((row, item)) = queue.run_item(*index) {
                    pb.set_prefix(format!("[{}] {}", row, item.description));
                    pb.set_message(self.msgs.status(item.status));
                }
                pb.enable_steady_tick(Duration::from_millis(120));
                self.bars.insert(*index, pb);
                None
            }
            QueueEvent::ItemFinished { index, .. } => {
                if let Some(pb) = self.bars.get(index) {
                    let label = queue
                        .run_item(*index)
                        .map(|(_, item)| self.msgs.status(item.status))
                        .unwrap_or(self.msgs.status_done);
                    pb.finish_with_message(label);
                }
                None
            }
            QueueEvent::ItemError { index, message, .. } => {
                let name = queue
                    .run_item(*index)
                    .map(|(row, item)| format!("[{}] {}", row, item.description))
                    .unwrap_or_else(|| format!("[{}]", index + 1));
                let _ = self.mp.println(format!("[{}] {}: {}", self.msgs.error_prefix, name, message));
                None
            }
            QueueEvent::AllFinished { outcome, .. } => Some(*outcome),
        }
    }
}

/// Search results as a table, rows numbered from 1 for `--pick`.
pub fn results_table(kind: MediaKind, hits: &[SearchHit]) -> String {
    let rows = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let mut row = vec![(i + 1).to_string()];
            row.extend(hit.record.fields().into_iter().map(str::to_string));
            row
        })
        .collect();
    table(SearchRecord::columns(kind), rows)
}

pub fn queue_table(queue: &DownloadQueue, msgs: &Messages) -> String {
    let mut out = table(
        &msgs.queue_columns,
        queue
            .rows()
            .map(|(n, item)| {
                vec![n.to_string(), msgs.status(item.status).to_string(), item.kind.to_string(), item.description.clone()]
            })
            .collect(),
    );
    for (n, item) in queue.rows() {
        if let Some(err) = &item.last_error {
            out.push_str(&format!("{} [{}]: {}\n", msgs.error_prefix, n, err));
        }
    }
    out
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(headers.to_vec());
    for row in &rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{DownloadItem, DownloadStatus};
    use crate::i18n::{get_messages, Locale};
    use uuid::Uuid;

    fn album_hit(n: usize) -> SearchHit {
        SearchHit {
            text: format!("Album {n}"),
            url: format!("https://x.test/album/{n}"),
            record: SearchRecord::Album {
                artist: "Miles Davis".into(),
                name: format!("Album {n}"),
                duration: "00:45:57".into(),
                quality: "HI-RES".into(),
            },
        }
    }

    #[test]
    fn results_table_numbers_rows_and_aligns_columns() {
        let out = results_table(MediaKind::Album, &[album_hit(1), album_hit(2)]);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("#  Artist"));
        assert!(lines[1].starts_with("1  Miles Davis  Album 1  00:45:57  HI-RES"));
        assert!(lines[2].starts_with("2  "));
    }

    #[test]
    fn queue_table_uses_localized_status_and_lists_errors() {
        let mut q = DownloadQueue::new();
        q.enqueue([DownloadItem::new(MediaKind::Track, "So What", "u0")]);
        q.begin_run().unwrap();
        let run_id = Uuid::new_v4();
        q.apply(&QueueEvent::ItemStarted { run_id, index: 0 }).unwrap();
        q.apply(&QueueEvent::ItemError { run_id, index: 0, message: "http status error: 404".into() }).unwrap();

        let out = queue_table(&q, get_messages(Locale::Zh));

        assert!(out.contains("下载中"));
        assert!(out.contains("So What"));
        assert!(out.contains("错误 [1]: http status error: 404"));
    }

    #[test]
    fn events_move_queue_and_report_outcome() {
        let mut q = DownloadQueue::new();
        q.enqueue([DownloadItem::new(MediaKind::Track, "a", "u0"), DownloadItem::new(MediaKind::Track, "b", "u1")]);
        q.begin_run().unwrap();
        let run_id = Uuid::new_v4();
        let mut view = RunView::hidden(get_messages(Locale::En));

        assert_eq!(view.on_event(&mut q, &QueueEvent::ItemStarted { run_id, index: 0 }), None);
        assert_eq!(view.on_event(&mut q, &QueueEvent::ItemFinished { run_id, index: 0 }), None);
        assert_eq!(view.on_event(&mut q, &QueueEvent::ItemStarted { run_id, index: 1 }), None);
        let outcome = view.on_event(&mut q, &QueueEvent::AllFinished { run_id, outcome: RunOutcome::Cancelled });

        assert_eq!(outcome, Some(RunOutcome::Cancelled));
        assert_eq!(q.get(0).unwrap().status, DownloadStatus::Done);
        assert_eq!(q.get(1).unwrap().status, DownloadStatus::Ready);
        assert!(!q.is_run_active());
    }

    #[tokio::test]
    async fn drive_ignores_other_runs() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut q = DownloadQueue::new();
        q.enqueue([DownloadItem::new(MediaKind::Track, "a", "u0")]);
        q.begin_run().unwrap();
        let run_id = Uuid::new_v4();
        let stale = Uuid::new_v4();

        tx.send(QueueEvent::AllFinished { run_id: stale, outcome: RunOutcome::Aborted }).unwrap();
        tx.send(QueueEvent::ItemStarted { run_id, index: 0 }).unwrap();
        tx.send(QueueEvent::ItemFinished { run_id, index: 0 }).unwrap();
        tx.send(QueueEvent::AllFinished { run_id, outcome: RunOutcome::Completed }).unwrap();

        let mut view = RunView::hidden(get_messages(Locale::En));
        let outcome = view.drive(&mut rx, run_id, &mut q).await;

        assert_eq!(outcome, Some(RunOutcome::Completed));
        assert_eq!(q.get(0).unwrap().status, DownloadStatus::Done);
    }

    #[tokio::test]
    async fn drive_returns_none_when_channel_closes() {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueueEvent>();
        drop(tx);
        let mut q = DownloadQueue::new();
        let mut view = RunView::hidden(get_messages(Locale::En));

        assert_eq!(view.drive(&mut rx, Uuid::new_v4(), &mut q).await, None);
    }
}
