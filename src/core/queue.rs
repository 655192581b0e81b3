use crate::core::error::QueueError;
use crate::core::events::QueueEvent;
use crate::core::model::{DownloadItem, DownloadStatus};
use tracing::debug;

/// Ordered download queue. Insertion order is download order.
///
/// Status is only moved forward through [`DownloadQueue::mark`] or by applying
/// coordinator events; the run bookkeeping maps run indices (positions in the
/// URL list handed to the coordinator) back to queue positions.
#[derive(Debug, Default)]
pub struct DownloadQueue {
    items: Vec<DownloadItem>,
    run: Option<ActiveRun>,
}

#[derive(Debug)]
struct ActiveRun {
    // run index -> queue position
    slots: Vec<usize>,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DownloadItem> {
        self.items.get(index)
    }

    pub fn is_run_active(&self) -> bool {
        self.run.is_some()
    }

    /// Rows numbered contiguously from 1, in download order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &DownloadItem)> {
        self.items.iter().enumerate().map(|(i, item)| (i + 1, item))
    }

    pub fn enqueue(&mut self, items: impl IntoIterator<Item = DownloadItem>) {
        for mut item in items {
            item.status = DownloadStatus::Ready;
            item.last_error = None;
            debug!(kind = %item.kind, url = %item.url, "enqueue");
            self.items.push(item);
        }
    }

    /// Removes the given positions where allowed and returns how many went.
    ///
    /// READY items are always removable, DONE items only while no run is
    /// active. Anything else, out-of-range positions included, is skipped.
    pub fn remove(&mut self, indices: impl IntoIterator<Item = usize>) -> usize {
        let active = self.run.is_some();
        let mut doomed: Vec<usize> = indices
            .into_iter()
            .filter(|&i| {
                self.items.get(i).map_or(false, |item| match item.status {
                    DownloadStatus::Ready => true,
                    DownloadStatus::Done => !active,
                    DownloadStatus::Queued | DownloadStatus::InProgress => false,
                })
            })
            .collect();
        doomed.sort_unstable();
        doomed.dedup();

        for &i in doomed.iter().rev() {
            self.items.remove(i);
        }

        if let Some(run) = self.run.as_mut() {
            for slot in run.slots.iter_mut() {
                *slot -= doomed.iter().filter(|&&d| d < *slot).count();
            }
        }

        doomed.len()
    }

    pub fn remove_all(&mut self) -> usize {
        self.remove(0..self.items.len())
    }

    pub fn mark(&mut self, index: usize, status: DownloadStatus) -> Result<(), QueueError> {
        let item = self.items.get_mut(index).ok_or(QueueError::IndexOutOfRange(index))?;
        if item.status.next() != Some(status) {
            return Err(QueueError::InvalidTransition { index, from: item.status, to: status });
        }
        item.status = status;
        Ok(())
    }

    /// Queues every READY item and returns their URLs in download order.
    pub fn begin_run(&mut self) -> Result<Vec<String>, QueueError> {
        if self.run.is_some() {
            return Err(QueueError::RunActive);
        }

        let mut slots = Vec::new();
        let mut urls = Vec::new();
        for (pos, item) in self.items.iter_mut().enumerate() {
            if item.status == DownloadStatus::Ready {
                item.status = DownloadStatus::Queued;
                item.last_error = None;
                slots.push(pos);
                urls.push(item.url.clone());
            }
        }

        self.run = Some(ActiveRun { slots });
        Ok(urls)
    }

    pub fn apply(&mut self, event: &QueueEvent) -> Result<(), QueueError> {
        match event {
            QueueEvent::ItemStarted { index, .. } => {
                let pos = self.slot(*index)?;
                self.mark(pos, DownloadStatus::InProgress)
            }
            QueueEvent::ItemFinished { index, .. } => {
                let pos = self.slot(*index)?;
                self.mark(pos, DownloadStatus::Done)
            }
            QueueEvent::ItemError { index, message, .. } => {
                let pos = self.slot(*index)?;
                self.items[pos].last_error = Some(message.clone());
                Ok(())
            }
            QueueEvent::AllFinished { .. } => {
                self.end_run();
                Ok(())
            }
        }
    }

    /// The item behind a run index, with its displayed row number.
    pub fn run_item(&self, index: usize) -> Option<(usize, &DownloadItem)> {
        let pos = self.slot(index).ok()?;
        self.items.get(pos).map(|item| (pos + 1, item))
    }

    fn slot(&self, index: usize) -> Result<usize, QueueError> {
        self.run
            .as_ref()
            .and_then(|run| run.slots.get(index).copied())
            .ok_or(QueueError::IndexOutOfRange(index))
    }

    // Unfinished items go back to READY so they can be retried or removed.
    fn end_run(&mut self) {
        if let Some(run) = self.run.take() {
            for pos in run.slots {
                let item = &mut self.items[pos];
                if matches!(item.status, DownloadStatus::Queued | DownloadStatus::InProgress) {
                    item.status = DownloadStatus::Ready;
                }
            }
        }
    }
}
