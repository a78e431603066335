//! `ldap-export` command line tool.
//!
//! ```bash
//! # Write a settings template, then edit it
//! ldap-export gen-defaults settings.json
//!
//! # Export, asking for the password if the settings contain "*"
//! ldap-export -v import --user 'EXAMPLE\admin' settings.json users.csv
//! ```
#![allow(clippy::print_stdout)]

use std::{
	fs,
	io::{self, IsTerminal},
	path::{Path, PathBuf},
	process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::Password;
use ldap_export::{import, Overrides, Settings};
use tracing::{debug, error};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Import users from an LDAP server to a CSV file.
#[derive(Debug, Parser)]
#[command(name = "ldap-export", version, about, arg_required_else_help = true)]
struct Cli {
	/// Increase output verbosity
	#[arg(short, long, global = true)]
	verbose: bool,

	/// The command to run
	#[command(subcommand)]
	command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
enum Command {
	/// Import users from the directory.
	Import(ImportArgs),
	/// Generate a sample settings file.
	GenDefaults {
		/// Path of the settings file to write. Printed to stdout if omitted.
		#[arg(value_name = "OUTPUT-JSON-FILE")]
		output_file: Option<PathBuf>,
	},
}

/// Arguments of the `import` command. Options take priority over the settings
/// file.
#[derive(Debug, Args)]
struct ImportArgs {
	/// Override the username to bind as
	#[arg(long, value_name = "NAME")]
	user: Option<String>,

	/// Override the password to bind with
	#[arg(long, value_name = "PASS")]
	password: Option<String>,

	/// Override the address of the LDAP server
	#[arg(long, value_name = "HOST")]
	ldap_server: Option<String>,

	/// Override the port of the LDAP server
	#[arg(long, value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
	ldap_port: Option<u16>,

	/// Override the search base
	#[arg(long, value_name = "DN")]
	base: Option<String>,

	/// JSON file with settings, see `gen-defaults`
	#[arg(value_name = "SETTINGS-FILE")]
	settings_file: PathBuf,

	/// Path to the output CSV file
	#[arg(value_name = "OUTPUT-CSV-FILE")]
	output_file: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	let cli = Cli::parse();
	init_logging(cli.verbose);
	debug!("Verbose mode is On.");

	match run(cli.command).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("{err:#}");
			ExitCode::FAILURE
		}
	}
}

/// Install the log subscriber. `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
	let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
	let filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_ansi(io::stderr().is_terminal())
		.with_writer(io::stderr)
		.init();
}

/// Dispatch a command.
async fn run(command: Command) -> Result<()> {
	match command {
		Command::Import(args) => import_users(args).await,
		Command::GenDefaults { output_file } => print_sample_json(output_file.as_deref()),
	}
}

/// Resolve the settings, ask for the password if needed, and export.
async fn import_users(args: ImportArgs) -> Result<()> {
	let overrides = Overrides {
		username: args.user,
		password: args.password,
		server: args.ldap_server,
		port: args.ldap_port,
		search_base: args.base,
	};
	let settings = Settings::from_file(&args.settings_file, &overrides)?;
	let settings = if settings.needs_password_prompt() {
		let password = ask_password(settings.username())?;
		settings.with_password(password)
	} else {
		settings
	};

	let summary = import(&settings, &args.output_file).await?;
	println!("{} record(s) saved to {} file.", summary.saved, args.output_file.display());
	Ok(())
}

/// Ask for the password interactively.
fn ask_password(username: &str) -> Result<String> {
	Password::new()
		.with_prompt(format!("Please, enter domain password for {username}"))
		.interact()
		.context("Failed to read the password")
}

/// Write the default settings to `output_file`, or stdout.
fn print_sample_json(output_file: Option<&Path>) -> Result<()> {
	let json = Settings::default().to_json()?;
	match output_file {
		Some(path) => fs::write(path, json + "\n")
			.with_context(|| format!("Failed to write {}", path.display()))?,
		None => println!("{json}"),
	}
	Ok(())
}
