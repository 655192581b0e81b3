use crate::core::model::MediaKind;
use sanitize_filename::sanitize;
use url::Url;

/// Guesses the media kind of a service URL such as
/// `https://play.example.com/album/0060254735180`.
pub fn infer_kind(raw: &str) -> MediaKind {
    let Ok(u) = Url::parse(raw) else {
        return MediaKind::Track;
    };

    let segments: Vec<&str> = u.path_segments().map(|s| s.collect()).unwrap_or_default();
    if let Some(last) = segments.last() {
        let lower = last.to_ascii_lowercase();
        if lower.ends_with(".m3u") || lower.ends_with(".m3u8") {
            return MediaKind::Playlist;
        }
    }

    // The kind segment precedes the id, so scan from the right.
    segments
        .iter()
        .rev()
        .skip(1)
        .find_map(|s| s.parse::<MediaKind>().ok())
        .unwrap_or(MediaKind::Track)
}

/// Sanitized last path segment of `raw`, or `fallback` if there is none.
pub fn file_name(raw: &str, fallback: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|s| s.last().map(|s| s.to_string()))
        })
        .filter(|s| !s.is_empty())
        .map(|s| sanitize(s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Directory name for the tracks of a container.
pub fn folder_name(title: &str) -> String {
    let name = sanitize(title.trim());
    if name.is_empty() { "untitled".to_string() } else { name }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_kind_from_path_segment() {
        assert_eq!(infer_kind("https://play.example.com/album/va4j3hdlwaubc"), MediaKind::Album);
        assert_eq!(infer_kind("https://play.example.com/artist/36819"), MediaKind::Artist);
        assert_eq!(infer_kind("https://www.example.com/us-en/playlist/1234"), MediaKind::Playlist);
        assert_eq!(infer_kind("https://open.example.com/track/55"), MediaKind::Track);
    }

    #[test]
    fn manifest_suffix_means_playlist() {
        assert_eq!(infer_kind("https://cdn.example.com/lists/focus.M3U8"), MediaKind::Playlist);
    }

    #[test]
    fn unknown_urls_default_to_track() {
        assert_eq!(infer_kind("https://cdn.example.com/audio/song.flac"), MediaKind::Track);
        assert_eq!(infer_kind("not a url"), MediaKind::Track);
        // A trailing segment named like a kind is an id, not a kind.
        assert_eq!(infer_kind("https://cdn.example.com/album"), MediaKind::Track);
    }

    #[test]
    fn file_name_is_sanitized() {
        assert_eq!(file_name("https://cdn.example.com/a/b%3Ac.flac", "x"), "b%3Ac.flac");
        assert_eq!(file_name("https://cdn.example.com/dir/", "download.bin"), "download.bin");
        assert_eq!(file_name("::", "download.bin"), "download.bin");
    }

    #[test]
    fn folder_name_never_empty() {
        assert_eq!(folder_name("AC/DC: Live"), "ACDC Live");
        assert_eq!(folder_name("  "), "untitled");
    }
}
