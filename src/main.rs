// src/main.rs

use clap::CommandFactory;
use pkgctl::cli::{Cli, Command, parse_args};
use pkgctl::config::Config;
use pkgctl::output::{Output, Verbosity};
use pkgctl::session::{Collaborators, ControlSignal, GlobalOptions, Session, run_shell};
use pkgctl::{Error, ExitCode};
use std::io::IsTerminal;
use tracing::{debug, info};

fn init_logging(verbose: u8) {
    let default = if verbose >= 2 { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn run() -> ExitCode {
    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(ControlSignal::ExitWithCode(code)) => return code,
        Err(_) => return ExitCode::Ok,
    };
    init_logging(cli.global.verbose);

    let verbosity = Verbosity::from_flags(cli.global.quiet, cli.global.verbose);
    let out = Output::new(verbosity, cli.global.json);

    let options = match GlobalOptions::from_args(&cli.global) {
        Ok(options) => options,
        Err(e) => {
            out.report(&e);
            return e.exit_code();
        }
    };

    let config = match Config::load_for_root(&options.root, options.config_path.as_deref())
        .and_then(|config| config.validate().map(|()| config))
    {
        Ok(config) => config,
        Err(e) => {
            let err = Error::InitError(format!("{:#}", e));
            out.report(&err);
            return err.exit_code();
        }
    };

    let collab = match Collaborators::local(&options, &config) {
        Ok(collab) => collab,
        Err(e) => {
            out.report(&e);
            return e.exit_code();
        }
    };

    let Some(command) = cli.command else {
        if let Err(e) = Cli::command().print_help() {
            debug!("Could not print help: {}", e);
        }
        return ExitCode::Ok;
    };

    info!("Running '{}'", command.name());
    let mut session = Session::new(options, config, out, collab);
    let code = match command {
        Command::Shell => {
            let stdin = std::io::stdin();
            let interactive = stdin.is_terminal();
            run_shell(&mut session, stdin.lock(), interactive)
        }
        command => session.run_workflow(command),
    };
    session.finish();
    code
}

fn main() -> std::process::ExitCode {
    run().into()
}
