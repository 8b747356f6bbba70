use std::path::PathBuf;

use clap::Parser;

use crate::config::{CredentialBackend, Settings};
use crate::credential_store::{CredentialStore, FileCredentialStore, KeyringCredentialStore};
use crate::error::Result;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file to read instead of pri/config.toml.
    #[clap(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Start from the saved token instead of signing in first.
    #[clap(long)]
    pub load_cached: bool,

    /// Remove the saved token and exit.
    #[clap(long)]
    pub clear_credentials: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[clap(short, long)]
    pub verbose: bool,
}

/// Opens the credential store the settings point at.
pub fn open_store(settings: &Settings) -> Result<Box<dyn CredentialStore>> {
    let store: Box<dyn CredentialStore> = match settings.credential_backend {
        CredentialBackend::File => Box::new(FileCredentialStore::new(&settings.token_file)),
        CredentialBackend::Keyring => Box::new(KeyringCredentialStore::open()?),
    };
    Ok(store)
}

pub fn handle_credentials_clear(store: &dyn CredentialStore) -> Result<()> {
    if store.clear()? {
        println!("Credentials removed from {}. Exiting.", store.location());
    } else {
        println!("No saved credentials at {}.", store.location());
    }
    Ok(())
}
