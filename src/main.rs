use std::{
    io::{self, Write},
    process,
};

use domaincache::{
    application::{
        error::AppError,
        report::{AffectedReport, CheckReport, InspectReport},
    },
    config::{self, Command},
    domain::types::EntityType,
    infra::{cache::CacheRuntime, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let runtime = CacheRuntime::from_settings(&settings)?;
    let command = cli_args.command.unwrap_or(Command::Check);

    let mut stdout = io::stdout().lock();
    match command {
        Command::Inspect => {
            write!(stdout, "{}", InspectReport::from_registry(&runtime.registry))?;
        }
        Command::Affected(args) => {
            let entity = args.entity.trim();
            if entity.is_empty() {
                return Err(AppError::validation("entity type must not be empty"));
            }
            let report = AffectedReport::from_registry(
                &runtime.registry,
                EntityType::new(entity),
                &args.domain,
            );
            write!(stdout, "{report}")?;
        }
        Command::Check => {
            let report = CheckReport::new(&settings, &runtime.registry);
            info!(
                domains = report.domains,
                entity_types = report.entity_types,
                "Configuration check passed"
            );
            write!(stdout, "{report}")?;
        }
    }

    stdout.flush()?;
    Ok(())
}
