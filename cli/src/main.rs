//! Command line entry point for migrating archived messages into IMAP mailboxes.

mod args;
mod error;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use console::style;
use mailmigrate::coordinator::MigrationPlan;
use mailmigrate::{
    load_accounts, ImapConnector, MailParserMetadataReader, MigrateError, MigrationCoordinator,
    MigrationSummary, ProgressMode,
};
use tracing::{error, info, info_span};

use crate::args::Cli;
use crate::error::CliError;

/// Exit code when some accounts still have messages left for a later run.
const EXIT_PENDING: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let config = cli.resolve_config()?;
    let mode = ProgressMode::from(cli.progress).resolve();
    let console_default = if mode == ProgressMode::Bar { "warn" } else { "info" };
    logging::init(console_default, config.log_file.as_deref())?;

    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("run", id = %run_id);
    let _guard = span.enter();
    info!("Starting mailmigrate v{}", env!("CARGO_PKG_VERSION"));
    match cli.config_file() {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file, using command line settings"),
    }

    let accounts = load_accounts(&config.accounts_file)?;
    if !accounts.errors.is_empty() {
        eprintln!(
            "{} {} invalid line(s) in {}",
            style("warning:").yellow().bold(),
            accounts.errors.len(),
            config.accounts_file.display()
        );
    }

    let connector = ImapConnector::new(config.imap.clone()).map_err(MigrateError::from)?;
    let coordinator = MigrationCoordinator::new(
        config,
        Arc::new(connector),
        Arc::new(MailParserMetadataReader),
        mode.reporter(),
    )?;

    if cli.dry_run {
        let plan = coordinator.plan(&accounts.accounts)?;
        print_plan(&plan);
        return Ok(ExitCode::SUCCESS);
    }

    let summary = coordinator.run(accounts.accounts)?;
    print_summary(&summary);

    if summary.all_migrated() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PENDING))
    }
}

fn print_plan(plan: &MigrationPlan) {
    for entry in &plan.work {
        println!("{:<40} {} pending", entry.account, entry.pending);
    }
    for skipped in &plan.skipped {
        println!("{:<40} {}", skipped.account, style(&skipped.reason).yellow());
    }
    for account in &plan.already_migrated {
        println!("{:<40} {}", account, style("already migrated").dim());
    }
    println!(
        "\n{} message(s) pending across {} account(s)",
        style(plan.total_pending()).bold(),
        plan.work.len()
    );
}

fn print_summary(summary: &MigrationSummary) {
    println!("{}", style("Migration summary").bold().underlined());
    println!("  Accounts attempted:        {}", summary.accounts_attempted);
    println!(
        "  Accounts fully migrated:   {}",
        style(summary.accounts_fully_migrated).green()
    );
    println!("  Accounts pending:          {}", summary.accounts_pending());
    println!("  Accounts failed:           {}", summary.accounts_failed);
    println!("  Accounts skipped:          {}", summary.accounts_skipped);
    println!("  Accounts already migrated: {}", summary.accounts_already_migrated);
    println!("  Messages imported:         {}", summary.messages_imported);
    println!("  Messages failed:           {}", summary.messages_failed);
    println!("  Messages remaining:        {}", summary.messages_remaining);
}
