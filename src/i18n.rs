/// Localized labels for the terminal front-end.
/// Locale can be selected via the `--locale` CLI flag (e.g. `--locale zh`).
use crate::core::model::{DownloadStatus, RunOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "zh-hans" | "zh-tw" | "zh_tw" => Self::Zh,
            _ => Self::En,
        }
    }
}

pub struct Messages {
    pub status_ready: &'static str,
    pub status_queued: &'static str,
    pub status_in_progress: &'static str,
    pub status_done: &'static str,
    pub queue_columns: [&'static str; 4],
    pub run_started: &'static str,
    pub run_completed: &'static str,
    pub run_cancelled: &'static str,
    pub run_aborted: &'static str,
    pub no_results: &'static str,
    pub summary_header: &'static str,
    pub left_in_queue: &'static str,
    pub error_prefix: &'static str,
}

impl Messages {
    pub fn status(&self, status: DownloadStatus) -> &'static str {
        match status {
            DownloadStatus::Ready => self.status_ready,
            DownloadStatus::Queued => self.status_queued,
            DownloadStatus::InProgress => self.status_in_progress,
            DownloadStatus::Done => self.status_done,
        }
    }

    pub fn outcome(&self, outcome: RunOutcome) -> &'static str {
        match outcome {
            RunOutcome::Completed => self.run_completed,
            RunOutcome::Cancelled => self.run_cancelled,
            RunOutcome::Aborted => self.run_aborted,
        }
    }
}

pub static EN: Messages = Messages {
    status_ready: "Ready",
    status_queued: "Queued",
    status_in_progress: "In Progress",
    status_done: "Done",
    queue_columns: ["#", "Status", "Type", "Description"],
    run_started: "Download started",
    run_completed: "Download finished",
    run_cancelled: "Download stopped",
    run_aborted: "Download aborted",
    no_results: "No results",
    summary_header: "Summary",
    left_in_queue: "Left in queue",
    error_prefix: "ERR",
};

pub static ZH: Messages = Messages {
    status_ready: "就绪",
    status_queued: "排队中",
    status_in_progress: "下载中",
    status_done: "完成",
    queue_columns: ["#", "状态", "类型", "描述"],
    run_started: "下载已开始",
    run_completed: "下载已完成",
    run_cancelled: "下载已停止",
    run_aborted: "下载已中止",
    no_results: "无结果",
    summary_header: "摘要",
    left_in_queue: "队列剩余",
    error_prefix: "错误",
};

pub fn get_messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::En => &EN,
        Locale::Zh => &ZH,
    }
}
