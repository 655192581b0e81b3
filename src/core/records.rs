use crate::core::model::MediaKind;
use serde::Deserialize;

/// One search result row, typed by media kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRecord {
    Album { artist: String, name: String, duration: String, quality: String },
    Artist { name: String, releases: String },
    Track { artist: String, name: String, duration: String, quality: String },
    Playlist { name: String, releases: String },
}

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: MediaKind,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct AlbumData {
    artist: Named,
    title: String,
    duration: u64,
    #[serde(default)]
    hires_streamable: bool,
}

#[derive(Deserialize)]
struct ArtistData {
    name: String,
    albums_count: u64,
}

#[derive(Deserialize)]
struct TrackData {
    performer: Named,
    title: String,
    duration: u64,
    #[serde(default)]
    hires_streamable: bool,
}

#[derive(Deserialize)]
struct PlaylistData {
    name: String,
    tracks_count: u64,
}

impl SearchRecord {
    pub fn parse(kind: MediaKind, data: &serde_json::Value) -> Result<Self, RecordError> {
        let malformed = |source| RecordError::Malformed { kind, source };
        let record = match kind {
            MediaKind::Album => {
                let d = AlbumData::deserialize(data).map_err(malformed)?;
                SearchRecord::Album {
                    artist: d.artist.name,
                    name: d.title,
                    duration: format_duration(d.duration),
                    quality: quality_label(d.hires_streamable).to_string(),
                }
            }
            MediaKind::Artist => {
                let d = ArtistData::deserialize(data).map_err(malformed)?;
                SearchRecord::Artist { name: d.name, releases: d.albums_count.to_string() }
            }
            MediaKind::Track => {
                let d = TrackData::deserialize(data).map_err(malformed)?;
                SearchRecord::Track {
                    artist: d.performer.name,
                    name: d.title,
                    duration: format_duration(d.duration),
                    quality: quality_label(d.hires_streamable).to_string(),
                }
            }
            MediaKind::Playlist => {
                let d = PlaylistData::deserialize(data).map_err(malformed)?;
                SearchRecord::Playlist { name: d.name, releases: d.tracks_count.to_string() }
            }
        };
        Ok(record)
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            SearchRecord::Album { .. } => MediaKind::Album,
            SearchRecord::Artist { .. } => MediaKind::Artist,
            SearchRecord::Track { .. } => MediaKind::Track,
            SearchRecord::Playlist { .. } => MediaKind::Playlist,
        }
    }

    /// Column headers for a result table of `kind`, row number first.
    pub fn columns(kind: MediaKind) -> &'static [&'static str] {
        match kind {
            MediaKind::Album | MediaKind::Track => &["#", "Artist", "Name", "Duration", "Quality"],
            MediaKind::Artist | MediaKind::Playlist => &["#", "Name", "Releases"],
        }
    }

    pub fn fields(&self) -> Vec<&str> {
        match self {
            SearchRecord::Album { artist, name, duration, quality }
            | SearchRecord::Track { artist, name, duration, quality } => {
                vec![artist.as_str(), name.as_str(), duration.as_str(), quality.as_str()]
            }
            SearchRecord::Artist { name, releases } | SearchRecord::Playlist { name, releases } => {
                vec![name.as_str(), releases.as_str()]
            }
        }
    }
}

fn quality_label(hires: bool) -> &'static str {
    if hires { "HI-RES" } else { "LOSSLESS" }
}

pub fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
