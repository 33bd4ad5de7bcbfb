mod check_commands;

use std::path::PathBuf;

use {
    anyhow::{Context, Result},
    clap::{Parser, Subcommand},
    confreader_core::{ConfReader, ReaderOptions},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "confreader", about = "Read typed values from INI configuration files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file to read.
    #[arg(short, long, global = true, env = "CONFREADER_FILE")]
    file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Never re-parse the file between reads unless a command forces it.
    #[arg(long, global = true, default_value_t = false)]
    no_reload: bool,

    /// Memoize whole sections until the file changes.
    #[arg(long, global = true, default_value_t = false)]
    dict_cache: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one value as JSON.
    Get {
        section: String,
        key: String,
        /// Reload the file first if it changed, even with --no-reload.
        #[arg(long)]
        force_reload: bool,
    },
    /// Print a whole section as a JSON object.
    Section {
        section: String,
        #[arg(long)]
        force_reload: bool,
    },
    /// List section names.
    Sections,
    /// Resolve every value and report the ones that fail.
    Check,
}

/// Initialise tracing on stderr so stdout stays machine-readable.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    let path = cli
        .file
        .clone()
        .context("no configuration file given (use --file or CONFREADER_FILE)")?;
    let options = ReaderOptions::default()
        .with_reload(!cli.no_reload)
        .with_dict_cache(cli.dict_cache);
    debug!(path = %path.display(), ?options, "opening configuration");

    let reader = ConfReader::open(&path, options)
        .with_context(|| format!("failed to open {}", path.display()))?;

    match cli.command {
        Commands::Get {
            section,
            key,
            force_reload,
        } => {
            let value = reader.get(&section, &key, force_reload)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        },
        Commands::Section {
            section,
            force_reload,
        } => {
            let values = reader.get_section(&section, force_reload)?;
            println!("{}", serde_json::to_string_pretty(&*values)?);
        },
        Commands::Sections => {
            for name in reader.sections(false)? {
                println!("{name}");
            }
        },
        Commands::Check => check_commands::check(&reader)?,
    }

    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_get_with_global_flags() {
        let cli = Cli::try_parse_from([
            "confreader",
            "get",
            "SECTION_1",
            "config_4",
            "--file",
            "app.ini",
            "--no-reload",
            "--force-reload",
        ])
        .unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("app.ini")));
        assert!(cli.no_reload);
        assert!(!cli.dict_cache);
        assert!(matches!(
            cli.command,
            Commands::Get { force_reload: true, ref section, ref key }
                if section == "SECTION_1" && key == "config_4"
        ));
    }
}
