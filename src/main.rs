use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use kube_discovery::cli::Cli;
use kube_discovery::commands::{execute, render_error};
use kube_discovery::load_config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(&cli).await {
        Ok(rendered) => {
            println!("{}", rendered);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            println!("{}", render_error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<String> {
    let cfg = load_config()?;
    info!("api = {}, command = {:?}", cfg.api_url.base, cli.command);

    let output = execute(cli.command, &cfg).await?;
    Ok(output.render(cli.pretty)?)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
