mod banner_commands;
mod config_commands;
mod flags_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    nudge_config::NudgeConfig,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "nudge", about = "Nudge: promotional banner engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching `./` and the user config dir.
    #[arg(long, global = true, env = "NUDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the project root (demo page, promotion templates) over HTTP.
    Serve {
        /// Port to listen on (overrides config value).
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind to (overrides config value).
        #[arg(long)]
        bind: Option<String>,
        /// Directory to serve (overrides config value).
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Simulate one page visit: decide visibility and print the banner.
    Visit(banner_commands::VisitArgs),
    /// Simulate a click on one of the banner's handlers.
    Click(banner_commands::ClickArgs),
    /// Inspect or clear persisted banner flags.
    Flags {
        #[command(subcommand)]
        action: flags_commands::FlagsAction,
    },
    /// Check a banner description and report errors/warnings.
    Validate {
        /// Description file or URL. Defaults to the configured template.
        source: Option<String>,
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
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

/// Load the explicit config file if one was given, otherwise discover one.
fn load_config(cli: &Cli) -> anyhow::Result<NudgeConfig> {
    let Some(path) = cli.config.as_deref() else {
        return Ok(nudge_config::discover_and_load());
    };
    let mut config = nudge_config::load_config(path)?;
    nudge_config::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    debug!(path = %path.display(), "loaded config from --config");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "nudge starting");

    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Serve { port, bind, root } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(root) = root {
                config.server.root = root;
            }
            nudge_web::serve(&config.server).await?;
            Ok(())
        },
        Commands::Visit(args) => banner_commands::visit(&config, args).await,
        Commands::Click(args) => banner_commands::click(&config, args).await,
        Commands::Flags { action } => flags_commands::handle_flags(&config, action),
        Commands::Validate { source, verbose } => {
            banner_commands::validate(&config, source, verbose).await
        },
        Commands::Config { action } => config_commands::handle_config(cli.config.as_deref(), action),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn visit_bridge_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "nudge",
            "visit",
            "--user-agent",
            "Chrome",
            "--extension-version",
            "1.0",
            "--bridge-error",
            "gone",
        ]);
        assert!(parsed.is_err());
    }
}
