use crate::plugins::registry::{CliPlugin, ClientCliConfig};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

/// Connection options shared by every request the client makes: catalog
/// manifests as well as the audio files themselves.
pub struct HttpCliPlugin;

impl HttpCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

/// `Name: Value` as given to `--header`.
fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: Value', got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {:?}", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl CliPlugin for HttpCliPlugin {
    fn name(&self) -> &'static str {
        "http"
    }

    fn augment_command(&self, cmd: Command) -> Command {
        let http = |arg: Arg| arg.help_heading("HTTP").global(true);

        cmd.arg(http(
            Arg::new("http_header")
                .long("header")
                .short('H')
                .help("Extra request header (repeatable), e.g. -H 'Authorization: Bearer xxx'")
                .value_parser(parse_header)
                .action(ArgAction::Append),
        ))
        .arg(http(
            Arg::new("http_user_agent")
                .long("user-agent")
                .help("User-Agent sent to the music service"),
        ))
        .arg(http(
            Arg::new("http_timeout_secs")
                .long("timeout-secs")
                .help("Per-request timeout in seconds")
                .value_parser(value_parser!(u64).range(1..))
                .default_value("60"),
        ))
        .arg(http(
            Arg::new("http_retries")
                .long("retries")
                .help("Retries on transport errors, 408, 429 and 5xx")
                .value_parser(value_parser!(u32))
                .default_value("2"),
        ))
        .arg(http(
            Arg::new("http_retry_backoff_ms")
                .long("retry-backoff-ms")
                .help("First retry delay in milliseconds, doubled per attempt")
                .value_parser(value_parser!(u64))
                .default_value("400"),
        ))
    }

    fn apply_matches(&self, matches: &ArgMatches, cfg: &mut ClientCliConfig) -> anyhow::Result<()> {
        if let Some(headers) = matches.get_many::<(String, String)>("http_header") {
            cfg.ctx.headers.extend(headers.cloned());
        }
        if let Some(ua) = matches.get_one::<String>("http_user_agent") {
            cfg.ctx.user_agent = ua.clone();
        }
        if let Some(&secs) = matches.get_one::<u64>("http_timeout_secs") {
            cfg.ctx.timeout_secs = secs;
        }
        if let Some(&retries) = matches.get_one::<u32>("http_retries") {
            cfg.ctx.retries = retries;
        }
        if let Some(&ms) = matches.get_one::<u64>("http_retry_backoff_ms") {
            cfg.ctx.retry_backoff_ms = ms;
        }
        Ok(())
    }
}
