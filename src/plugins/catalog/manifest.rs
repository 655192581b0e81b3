use anyhow::Context;
use url::Url;

/// Parses a track manifest: one URL per line, `#` lines are comments.
/// Relative entries resolve against the manifest's own URL.
pub fn parse(manifest_url: &str, body: &str) -> anyhow::Result<Vec<Url>> {
    let base = Url::parse(manifest_url).with_context(|| format!("manifest url {}", manifest_url))?;
    body.lines()
        .enumerate()
        .map(|(n, line)| (n, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            base.join(line)
                .with_context(|| format!("manifest line {}: {}", n + 1, line))
        })
        .collect()
}
