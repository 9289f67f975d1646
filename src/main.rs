use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use speaking_gateway::Config;
use speaking_gateway::api::ApiServerBuilder;
use speaking_gateway::voice::Gateways;

/// Speaking - Real-time voice conversation gateway
#[derive(Parser)]
#[command(name = "speaking", version, about)]
struct Cli {
    /// Port to listen on (overrides PORT and the config file)
    #[arg(long, env = "SPEAKING_PORT")]
    port: Option<u16>,

    /// Conversation limit in seconds (overrides the config file)
    #[arg(long, env = "SPEAKING_SESSION_TIMEOUT_SECS")]
    session_timeout: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway (default)
    Serve,
    /// Resolve configuration and report missing credentials
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,speaking_gateway=info",
        1 => "info,speaking_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(secs) = cli.session_timeout {
        config.session.timeout = Duration::from_secs(secs);
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::CheckConfig => check_config(&config),
        Command::Serve => serve(config).await,
    }
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    println!("port:            {}", config.server.port);
    println!("session timeout: {:?}", config.session.timeout);
    println!("max reply chars: {}", config.turn.max_reply_chars);
    println!("stt:             {}", config.stt.url);
    println!("llm:             {} ({})", config.llm.url, config.llm.model);
    println!("tts:             {}", config.tts.url);

    config.validate()?;
    println!("configuration ok");
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.server.port,
        session_timeout = ?config.session.timeout,
        model = %config.llm.model,
        "starting speaking gateway"
    );

    let gateways = Gateways::from_config(&config)?;

    let server = ApiServerBuilder::new(gateways, config.server.port)
        .session_config(config.session)
        .turn_config(config.turn)
        .build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    Ok(())
}
