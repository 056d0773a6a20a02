//! Source connection command line.
//!
//! This binary validates and tests source connections, keeps the ones that
//! pass in a local store, and introspects stored connections. Every result
//! and every error is printed to stdout as JSON.
//!
//! # Security Guarantees
//! - Source passwords come from `--password`, `SOURCE_PASSWORD`, or a prompt
//! - Passwords are written to the store file only and never printed or logged
//! - All database operations are read-only
//!
//! # Exit Status
//! - `0`: the operation succeeded and, for tests, every check passed
//! - `1`: a check failed, the request was rejected, or the connection is unknown
//! - `2`: any other error

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command, GlobalArgs};
use schema_importer_core::config::admin::env_vars_for;
use schema_importer_core::logging::init_logging;
use schema_importer_core::security::Password;
use schema_importer_core::{
    AdminCredentials, ConnectionOrchestrator, ConnectionStore, DatabaseKind, DatabaseProbe,
    Introspectors, JsonFileStore, MemoryStore, ProbeResult, ServiceError, SourceConnectionService,
};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};

const REJECTED: u8 = 1;
const FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet) {
        eprintln!("Error: {e}");
        return ExitCode::from(FATAL);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => report(&e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let service = build_service(&cli.global)?;

    match cli.command {
        Command::Create(args) => {
            let password = source_password(args.password.as_deref())?;
            print_json(&service.create(args.into_config(password)).await?)?;
        }
        Command::Test(args) => {
            let password = source_password(args.password.as_deref())?;
            let result = service.test_new(&args.into_config(password)).await?;
            return report_result(&result);
        }
        Command::TestExisting(args) => {
            let result = service.test_existing(args.id).await?;
            return report_result(&result);
        }
        Command::Update(args) => {
            let password = if args.ask_password {
                Some(prompt_password("New source password: ")?)
            } else {
                None
            };
            let update = args.to_update(password);
            if update.is_empty() {
                anyhow::bail!("Nothing to update: pass at least one field to change");
            }
            print_json(&service.update(args.id, &update).await?)?;
        }
        Command::Delete(args) => {
            service.delete(args.id).await?;
            print_json(&serde_json::json!({ "deleted": args.id }))?;
        }
        Command::Show(args) => print_json(&service.get(args.id).await?)?,
        Command::List => print_json(&service.list().await?)?,
        Command::Tables(args) => print_json(&service.tables(args.id).await?)?,
        Command::TableSchema(args) => print_json(&service.table_schema(args.id).await?)?,
        Command::Rows(args) => print_json(&service.rows(args.id, args.limit).await?)?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Wires the service from the global flags and the process environment.
fn build_service(global: &GlobalArgs) -> anyhow::Result<SourceConnectionService> {
    let settings = global.probe_settings();
    settings.validate()?;

    let admin = Arc::new(AdminCredentials::from_env());
    for kind in DatabaseKind::ALL {
        if kind.checks_create_privileges() && admin.for_kind(kind).is_none() {
            let (user_var, _) = env_vars_for(kind);
            debug!(
                "{} is not set; {} privilege checks will fail",
                user_var,
                kind
            );
        }
    }

    let store: Arc<dyn ConnectionStore> = if global.ephemeral {
        debug!("Using an in-memory connection store");
        Arc::new(MemoryStore::new())
    } else {
        debug!("Using connection store {}", global.store.display());
        Arc::new(JsonFileStore::new(global.store.clone()))
    };

    Ok(SourceConnectionService::new(
        store,
        ConnectionOrchestrator::new(DatabaseProbe::new(admin, settings)),
        Introspectors::new(settings),
    ))
}

fn source_password(given: Option<&str>) -> anyhow::Result<Password> {
    match given {
        Some(password) => Ok(Password::new(password)),
        None => prompt_password("Source password: "),
    }
}

fn prompt_password(prompt: &str) -> anyhow::Result<Password> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Password::new(password))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn report_result(result: &ProbeResult) -> anyhow::Result<ExitCode> {
    print_json(result)?;
    Ok(if result.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(REJECTED)
    })
}

/// Prints a service error as its response body, anything else to stderr.
fn report(e: &anyhow::Error) -> ExitCode {
    let Some(service_error) = e.downcast_ref::<ServiceError>() else {
        eprintln!("Error: {e:#}");
        return ExitCode::from(FATAL);
    };

    if let ServiceError::Internal(inner) = service_error {
        error!("{}", inner);
    }
    match serde_json::to_string_pretty(&service_error.response()) {
        Ok(body) => println!("{body}"),
        Err(_) => eprintln!("Error: {service_error}"),
    }

    if service_error.status_code() < 500 {
        ExitCode::from(REJECTED)
    } else {
        ExitCode::from(FATAL)
    }
}
