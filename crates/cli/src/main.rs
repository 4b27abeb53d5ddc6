use std::io::{stdin, stdout, BufReader};
use std::process::ExitCode;
use std::sync::mpsc::channel;

use aptdeck_cli::cli_args::{Args, Command};
use aptdeck_cli::session::{run_session, SessionEnd};
use aptdeck_cli::{console, prompts};
use aptdeck_core::actions::PackageAction;
use aptdeck_core::catalog::{search, CatalogLoader, PackageRecord};
use aptdeck_core::config::Settings;
use aptdeck_core::error::{Error, Result};
use aptdeck_core::runner::{CommandRunner, ExecuteOptions, ExecutionOutcome};
use aptdeck_core::{config, file_handling};
use clap::Parser;
use log::{debug, info};

/// Loads the catalog on a worker and waits for it here.
fn load_catalog(loader: &CatalogLoader) -> Result<Vec<PackageRecord>> {
    let (sender, receiver) = channel();
    loader.spawn_load(move |result| {
        let _ = sender.send(result);
    })?;

    receiver
        .recv()
        .map_err(|_| Error::Misc("Catalog worker exited without a result".to_string()))?
}

fn show_packages(loader: &CatalogLoader, query: Option<&str>) -> Result<ExitCode> {
    let packages = load_catalog(loader)?;
    let packages = match query {
        Some(query) => search(query, &packages),
        None => packages,
    };

    console::print_packages(&mut stdout(), &packages)?;
    Ok(ExitCode::SUCCESS)
}

fn run_package_action(
    args: &Args,
    settings: &Settings,
    loader: &CatalogLoader,
    action: &PackageAction,
) -> Result<ExitCode> {
    let argv = action.argv(settings)?;

    if args.dry_run {
        println!("Dry run is specified, would run:\n{}", console::format_argv(&argv));
        return Ok(ExitCode::SUCCESS);
    }

    if !args.force && !prompts::confirm(&prompts::confirmation_question(action))? {
        println!("Not running {action}.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut options = ExecuteOptions::new().envs(settings.environment.clone().unwrap_or_default());
    if PackageAction::needs_credential(settings) {
        options = options.secret(prompts::prompt_secret("Enter your sudo password: ")?);
    }

    let mut out = stdout();
    console::print_running(&mut out, &argv)?;
    info!("Running {}", action);

    let runner = CommandRunner::new();
    let end = run_session(&runner, argv, options, BufReader::new(stdin()), &mut out)?;

    let outcome = match end {
        SessionEnd::Finished(outcome) => outcome,
        SessionEnd::Detached => {
            println!("\nThe command did not exit after being asked to terminate.");
            return Ok(ExitCode::FAILURE);
        }
    };
    console::print_outcome(&mut out, &outcome)?;

    if matches!(outcome, ExecutionOutcome::Failed { .. }) {
        return Ok(ExitCode::FAILURE);
    }

    // The catalog is reloaded after every action, whatever its exit status.
    let packages = load_catalog(loader)?;
    debug!("Catalog reloaded with {} packages", packages.len());
    match action.package() {
        Some(name) => println!("{}", console::describe_package_state(name, &packages)),
        None => println!("{} package(s) installed.", packages.len()),
    }

    if outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn execute() -> Result<ExitCode> {
    let args = Args::parse();

    let config_path = config::get_config_path(&args.config_path);
    debug!("Config path: `{}`", config_path);
    let settings = file_handling::get_settings(&config_path)?;
    let loader = CatalogLoader::from_settings(&settings);

    match (&args.command, args.command.action()) {
        (Command::List, _) => show_packages(&loader, None),
        (Command::Search { query }, _) => show_packages(&loader, Some(query)),
        (_, Some(action)) => run_package_action(&args, &settings, &loader, &action),
        (_, None) => Err(Error::Misc("Unsupported command".to_string())),
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match execute() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
