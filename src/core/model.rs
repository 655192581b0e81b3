use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type RunId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Album,
    Artist,
    Track,
    Playlist,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [MediaKind::Album, MediaKind::Artist, MediaKind::Track, MediaKind::Playlist];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Album => "album",
            MediaKind::Artist => "artist",
            MediaKind::Track => "track",
            MediaKind::Playlist => "playlist",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaKind::Album => "Album",
            MediaKind::Artist => "Artist",
            MediaKind::Track => "Track",
            MediaKind::Playlist => "Playlist",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown media kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for MediaKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "album" => Ok(MediaKind::Album),
            "artist" => Ok(MediaKind::Artist),
            "track" => Ok(MediaKind::Track),
            "playlist" => Ok(MediaKind::Playlist),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Audio format requested for downloads. Each maps to the service's
/// numeric `format_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    Mp3,
    #[default]
    Lossless,
    HiRes,
    HiResMax,
}

impl Quality {
    pub const ALL: [Quality; 4] = [Quality::Mp3, Quality::Lossless, Quality::HiRes, Quality::HiResMax];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Mp3 => "mp3",
            Quality::Lossless => "lossless",
            Quality::HiRes => "hi-res",
            Quality::HiResMax => "hi-res-max",
        }
    }

    pub fn format_id(&self) -> u8 {
        match self {
            Quality::Mp3 => 5,
            Quality::Lossless => 6,
            Quality::HiRes => 7,
            Quality::HiResMax => 27,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quality::Mp3 => "MP3 - 320 kbps",
            Quality::Lossless => "Lossless - 16 bit, 44.1 kHz",
            Quality::HiRes => "Hi-Res - 24 bit, up to 96 kHz",
            Quality::HiResMax => "Hi-Res - 24 bit, above 96 kHz",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown quality: {0} (expected mp3, lossless, hi-res, hi-res-max or a format id)")]
pub struct UnknownQuality(pub String);

impl FromStr for Quality {
    type Err = UnknownQuality;

    /// Accepts the names above or the raw format id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Quality::ALL
            .into_iter()
            .find(|q| q.as_str() == s || q.format_id().to_string() == s)
            .ok_or(UnknownQuality(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DownloadStatus {
    Ready,
    Queued,
    InProgress,
    Done,
}

impl DownloadStatus {
    /// The only forward step allowed from this status, if any.
    pub fn next(&self) -> Option<DownloadStatus> {
        match self {
            DownloadStatus::Ready => Some(DownloadStatus::Queued),
            DownloadStatus::Queued => Some(DownloadStatus::InProgress),
            DownloadStatus::InProgress => Some(DownloadStatus::Done),
            DownloadStatus::Done => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub kind: MediaKind,
    pub description: String,
    pub url: String,
    pub status: DownloadStatus,
    pub last_error: Option<String>,
}

impl DownloadItem {
    pub fn new(kind: MediaKind, description: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            url: url.into(),
            status: DownloadStatus::Ready,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    /// The worker task died before finishing the loop.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_parses_case_insensitively() {
        assert_eq!("Album".parse::<MediaKind>().unwrap(), MediaKind::Album);
        assert_eq!(" PLAYLIST ".parse::<MediaKind>().unwrap(), MediaKind::Playlist);
        assert!("label".parse::<MediaKind>().is_err());
    }

    #[test]
    fn status_steps_forward_only() {
        assert_eq!(DownloadStatus::Ready.next(), Some(DownloadStatus::Queued));
        assert_eq!(DownloadStatus::InProgress.next(), Some(DownloadStatus::Done));
        assert_eq!(DownloadStatus::Done.next(), None);
    }

    #[test]
    fn new_item_is_ready() {
        let item = DownloadItem::new(MediaKind::Track, "Song", "https://example.com/track/1");
        assert_eq!(item.status, DownloadStatus::Ready);
        assert!(item.last_error.is_none());
    }

    #[test]
    fn quality_parses_names_and_format_ids() {
        assert_eq!("Hi-Res".parse::<Quality>().unwrap(), Quality::HiRes);
        assert_eq!("27".parse::<Quality>().unwrap(), Quality::HiResMax);
        assert_eq!(Quality::default().format_id(), 6);
        assert!("flac".parse::<Quality>().is_err());
    }
}
