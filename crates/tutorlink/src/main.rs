// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tutorlink - relays messages between LINE students and Slack tutors.
//!
//! This is the binary entry point.

mod admin;
mod serve;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tutorlink_config::{ConfigError, TutorlinkConfig};
use tutorlink_core::{RelayError, RelayStore};
use tutorlink_storage::SqliteStore;

use crate::admin::{AccountsCommand, LedgerCommand};

/// Tutorlink - relays messages between LINE students and Slack tutors.
#[derive(Parser, Debug)]
#[command(name = "tutorlink", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook relay server.
    Serve,
    /// Link and unlink platform accounts.
    #[command(subcommand)]
    Accounts(AccountsCommand),
    /// Inspect and moderate the message ledger.
    #[command(subcommand)]
    Ledger(LedgerCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("tutorlink: use --help for available commands");
        return;
    };

    let result = match command {
        Commands::Serve => {
            // The server refuses to start on an invalid or incomplete config.
            let config = exit_on_errors(load_validated(cli.config.as_deref()));
            serve::run_serve(config).await
        }
        Commands::Accounts(command) => {
            let config = exit_on_errors(load_unvalidated(cli.config.as_deref()));
            with_store(&config, |store| async move {
                admin::run_accounts(&store, command).await
            })
            .await
        }
        Commands::Ledger(command) => {
            let config = exit_on_errors(load_unvalidated(cli.config.as_deref()));
            with_store(&config, |store| async move {
                admin::run_ledger(&store, command).await
            })
            .await
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_validated(path: Option<&Path>) -> Result<TutorlinkConfig, Vec<ConfigError>> {
    match path {
        Some(path) => tutorlink_config::load_and_validate_path(path),
        None => tutorlink_config::load_and_validate(),
    }
}

/// Admin commands only touch the database, so credentials need not be set.
fn load_unvalidated(path: Option<&Path>) -> Result<TutorlinkConfig, Vec<ConfigError>> {
    let loaded = match path {
        Some(path) => tutorlink_config::load_config_from_path(path),
        None => tutorlink_config::load_config(),
    };
    loaded.map_err(|e| tutorlink_config::diagnostic::figment_to_config_errors(e, &[]))
}

fn exit_on_errors(loaded: Result<TutorlinkConfig, Vec<ConfigError>>) -> TutorlinkConfig {
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            tutorlink_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Open the store, run `f`, print its output, and checkpoint on the way out.
async fn with_store<F, Fut>(config: &TutorlinkConfig, f: F) -> Result<(), RelayError>
where
    F: FnOnce(std::sync::Arc<SqliteStore>) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<String>, RelayError>>,
{
    let store = std::sync::Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;

    let result = f(store.clone()).await;
    if let Err(e) = store.close().await {
        eprintln!("warning: failed to close storage: {e}");
    }

    for line in result? {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_account_link() {
        let cli = Cli::try_parse_from([
            "tutorlink", "accounts", "link", "slack", "W1", "t1", "tutor",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Accounts(AccountsCommand::Link {
                provider,
                external_id,
                party_type,
                ..
            })) => {
                assert_eq!(provider, tutorlink_core::Provider::Slack);
                assert_eq!(external_id, "W1");
                assert_eq!(party_type, tutorlink_core::PartyType::Tutor);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_ledger_list_with_limit_and_config() {
        let cli = Cli::try_parse_from([
            "tutorlink",
            "ledger",
            "list",
            "p1",
            "--limit",
            "20",
            "--config",
            "/tmp/tutorlink.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tutorlink.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Ledger(LedgerCommand::List { limit: Some(20), .. }))
        ));
    }

    #[test]
    fn cli_rejects_unknown_provider() {
        assert!(
            Cli::try_parse_from(["tutorlink", "accounts", "list", "s1", "parent"]).is_err()
        );
        assert!(
            Cli::try_parse_from(["tutorlink", "accounts", "unlink", "discord", "s1", "student"])
                .is_err()
        );
    }
}
