use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;
use workerbridge_cli::{run_session, Args, CliError, SessionSummary};

async fn run(args: Args) -> Result<SessionSummary, CliError> {
    let config = args.host_config()?;
    run_session(config, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries envelopes, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
