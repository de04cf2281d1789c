use std::ffi::OsStr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sotrace_config::{CONFIG_FILE_NAME, MissingPolicy, SotraceConfig};

/// Log line shape on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SummaryFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct SummaryArgs {
    #[arg(long, help = "Summary file, '-' for stdout (defaults to output.summary_file)")]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value_t = SummaryFormat::Text,
        help = "Line format: text or json"
    )]
    pub format: SummaryFormat,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct ChangesArgs {
    #[arg(long, help = "Write per-post classifications here instead of stdout")]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        value_parser = parse_missing_policy,
        help = "Missing predecessor handling: treat_as_unchanged or fail"
    )]
    pub missing_policy: Option<MissingPolicy>,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct SimilarityArgs {
    #[arg(long, help = "CSV file (defaults to output.directory/output.similarity_file)")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Lower bound of the accepted average similarity")]
    pub min_similarity: Option<f64>,

    #[arg(long, help = "Upper bound of the accepted average similarity")]
    pub max_similarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct DiffArgs {
    #[arg(long, help = "Diff tree root (defaults to output.directory/output.diff_dir)")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct InitConfigArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Commands {
    /// Write one lineage line per post
    Summary(SummaryArgs),
    /// Classify each post as a code, text, or code+text change
    Changes(ChangesArgs),
    /// Compute per-block similarity statistics as CSV
    Similarity(SimilarityArgs),
    /// Write annotated diff files for every block version with diff rows
    Diff(DiffArgs),
    /// Write a default sotrace.toml
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "SOTorrent post-block lineage analyzer")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = CONFIG_FILE_NAME,
        help = "Path to sotrace.toml"
    )]
    pub config: PathBuf,

    #[arg(long, global = true, help = "SQLite database with PostBlockVersion/PostBlockDiff")]
    pub database: Option<PathBuf>,

    #[arg(long, global = true, help = "File with one post id per line")]
    pub posts: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Human,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Flags win over values from the config file.
    pub fn apply_overrides(&self, config: &mut SotraceConfig) {
        if let Some(database) = &self.database {
            config.store.database = database.clone();
        }
        if let Some(posts) = &self.posts {
            config.input.posts = posts.clone();
        }

        match &self.command {
            Commands::Similarity(args) => {
                if let Some(min) = args.min_similarity {
                    config.similarity.min = min;
                }
                if let Some(max) = args.max_similarity {
                    config.similarity.max = max;
                }
            }
            Commands::Changes(args) => {
                if let Some(policy) = args.missing_policy {
                    config.run.missing_policy = policy;
                }
            }
            Commands::Summary(_) | Commands::Diff(_) | Commands::InitConfig(_) => {}
        }
    }
}

/// Process args, minus a `--` passed right after the binary name.
pub fn parse_cli() -> Cli {
    let args = std::env::args_os()
        .enumerate()
        .filter(|(index, arg)| !(*index == 1 && arg.as_os_str() == OsStr::new("--")))
        .map(|(_, arg)| arg);

    Cli::parse_from(args)
}

fn parse_missing_policy(value: &str) -> Result<MissingPolicy, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use sotrace_config::{MissingPolicy, SotraceConfig};

    use super::{Cli, Commands, LogFormat, SummaryFormat};

    #[test]
    fn similarity_subcommand_parses_band_and_global_flags() {
        let cli = Cli::try_parse_from([
            "sotrace",
            "similarity",
            "--min-similarity",
            "0.5",
            "--max-similarity",
            "0.7",
            "--database",
            "so.sqlite",
            "--posts",
            "ids.txt",
        ])
        .expect("similarity should parse");

        assert_eq!(cli.config, PathBuf::from("sotrace.toml"));
        assert_eq!(cli.log_format, LogFormat::Human);

        let mut config = SotraceConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.similarity.min, 0.5);
        assert_eq!(config.similarity.max, 0.7);
        assert_eq!(config.store.database, PathBuf::from("so.sqlite"));
        assert_eq!(config.input.posts, PathBuf::from("ids.txt"));
    }

    #[test]
    fn summary_subcommand_defaults_to_text() {
        let cli = Cli::try_parse_from(["sotrace", "--log-format", "json", "summary"])
            .expect("summary should parse");

        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Summary(args) => {
                assert_eq!(args.format, SummaryFormat::Text);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn changes_subcommand_overrides_missing_policy() {
        let cli = Cli::try_parse_from(["sotrace", "changes", "--missing-policy", "fail"])
            .expect("changes should parse");

        let mut config = SotraceConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.run.missing_policy, MissingPolicy::Fail);
    }

    #[test]
    fn diff_subcommand_parses_out_dir() {
        let cli = Cli::try_parse_from(["sotrace", "diff", "--out-dir", "/tmp/diffs"])
            .expect("diff should parse");

        match cli.command {
            Commands::Diff(args) => {
                assert_eq!(args.out_dir, Some(PathBuf::from("/tmp/diffs")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_mode_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["sotrace"]).is_err());
        assert!(Cli::try_parse_from(["sotrace", "similarity", "diff"]).is_err());
        assert!(Cli::try_parse_from(["sotrace", "--log-format", "xml", "diff"]).is_err());
    }
}
