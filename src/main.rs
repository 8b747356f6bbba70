use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use graphmail::app::{greet_user, initialize_app, load_cached_credentials, run_app_loop};
use graphmail::cli::{handle_credentials_clear, open_store, Cli};
use graphmail::config::Settings;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load_default(cli.config.as_deref())?;
    let store = open_store(&settings)?;

    if cli.clear_credentials {
        handle_credentials_clear(store.as_ref())?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("Microsoft Graph mail client\n");

    let mut client = initialize_app(&settings);
    if cli.load_cached || settings.load_cached_token {
        load_cached_credentials(&mut client, store.as_ref());
    }

    // Signing in happens here on first use; a failure ends the session.
    if let Err(e) = greet_user(&mut client).await {
        eprintln!("Could not load your profile: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    run_app_loop(&mut client, store.as_ref(), &mut input).await?;
    Ok(ExitCode::SUCCESS)
}
