use crate::core::model::Quality;
use crate::plugins::registry::{CliPlugin, ClientCliConfig};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub struct CatalogCliPlugin;

impl CatalogCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CliPlugin for CatalogCliPlugin {
    fn name(&self) -> &'static str {
        "catalog"
    }

    fn augment_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("catalog")
                .long("catalog")
                .help("JSON search catalog to search in and resolve URLs against")
                .env("MUSIC_QUEUE_CATALOG")
                .num_args(1)
                .global(true),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Output directory")
                .env("MUSIC_QUEUE_OUT_DIR")
                .default_value("./downloads")
                .num_args(1)
                .global(true),
        )
        .arg(
            Arg::new("quality")
                .long("quality")
                .short('q')
                .help("Audio quality: mp3, lossless, hi-res, hi-res-max (or format id 5, 6, 7, 27)")
                .env("MUSIC_QUEUE_QUALITY")
                .value_parser(|s: &str| s.parse::<Quality>())
                .default_value("lossless")
                .global(true),
        )
    }

    fn apply_matches(&self, matches: &ArgMatches, cfg: &mut ClientCliConfig) -> anyhow::Result<()> {
        if let Some(path) = matches.get_one::<String>("catalog") {
            cfg.catalog = Some(PathBuf::from(path));
        }
        if let Some(dir) = matches.get_one::<String>("out_dir") {
            cfg.ctx.out_dir = PathBuf::from(dir);
        }
        if let Some(&quality) = matches.get_one::<Quality>("quality") {
            cfg.ctx.quality = quality;
        }
        Ok(())
    }
}
