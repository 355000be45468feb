use std::io::IsTerminal;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clientgen_cli::BuildRequest;
use clientgen_cli::ConfigFile;
use clientgen_cli::DEFAULT_CONFIG_FILE;
use clientgen_cli::error::CliError;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
	name = "clientgen",
	version,
	about = "Generate typed Rust clients from Solana program IDLs"
)]
struct Cli {
	/// Increase log verbosity. `RUST_LOG` takes precedence when set.
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbose: u8,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Generate the client module for a program.
	Generate {
		/// Configuration file. Defaults to `clientgen.json` in the working
		/// directory.
		#[arg(short, long)]
		config: Option<PathBuf>,

		/// Descriptor file. Overrides `idl` from the configuration.
		#[arg(long)]
		idl: Option<PathBuf>,

		/// Output directory. Overrides `clientOutputPath` from the
		/// configuration.
		#[arg(short, long)]
		out: Option<PathBuf>,
	},
	/// Validate a descriptor and summarize the client it produces.
	Check {
		#[arg(long)]
		idl: PathBuf,
	},
	/// Print the descriptor as a Codama IDL.
	Codama {
		#[arg(long)]
		idl: PathBuf,

		/// Output file. Writes to stdout when omitted.
		#[arg(short, long)]
		output: Option<PathBuf>,
	},
	/// Decode account or event bytes into JSON.
	Decode {
		#[arg(long)]
		idl: PathBuf,

		/// Declared account or event name.
		#[arg(long)]
		account: String,

		/// Hex encoded data, discriminator included.
		#[arg(long)]
		data: String,

		/// Accept bytes past the declared layout.
		#[arg(long, default_value_t = false)]
		prefix: bool,
	},
	/// Build an instruction payload and print its data and accounts.
	BuildIx {
		#[arg(long)]
		idl: PathBuf,

		#[arg(long)]
		instruction: String,

		/// JSON object of arguments.
		#[arg(long, default_value = "{}")]
		args: String,

		/// JSON object mapping account names to base58 addresses.
		#[arg(long, default_value = "{}")]
		accounts: String,

		/// `name=hex` bytes for seeds read from account data. Repeatable.
		#[arg(long = "seed-data")]
		seed_data: Vec<String>,
	},
}

fn main() {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	if let Err(err) = run(cli.command) {
		let label = format!("error[{}]", err.kind());
		if std::io::stderr().is_terminal() {
			eprintln!("{}: {err}", label.red().bold());
		} else {
			eprintln!("{label}: {err}");
		}
		std::process::exit(1);
	}
}

fn init_tracing(verbose: u8) {
	let level = match verbose {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(std::io::stderr().is_terminal())
		.with_target(false)
		.init();
}

fn run(command: Commands) -> Result<(), CliError> {
	match command {
		Commands::Generate { config, idl, out } => run_generate(config, idl, out),
		Commands::Check { idl } => run_check(&idl),
		Commands::Codama { idl, output } => run_codama(&idl, output.as_deref()),
		Commands::Decode {
			idl,
			account,
			data,
			prefix,
		} => print_json(&clientgen_cli::decode_account(&idl, &account, &data, prefix)?),
		Commands::BuildIx {
			idl,
			instruction,
			args,
			accounts,
			seed_data,
		} => {
			let request = BuildRequest {
				instruction: &instruction,
				args: &args,
				accounts: &accounts,
				seed_data: &seed_data,
			};
			print_json(&clientgen_cli::build_instruction(&idl, &request)?)
		}
	}
}

fn run_generate(config: Option<PathBuf>, idl: Option<PathBuf>, out: Option<PathBuf>) -> Result<(), CliError> {
	let file = match config {
		Some(path) => ConfigFile::load(&path)?,
		None if idl.is_some() && out.is_some() => ConfigFile::default(),
		None => {
			let path = PathBuf::from(DEFAULT_CONFIG_FILE);
			if !path.exists() {
				return Err(CliError::configuration(
					path,
					"configuration file not found; pass `--config` or both `--idl` and `--out`",
				));
			}
			ConfigFile::load(&path)?
		}
	};
	let config = file.resolve(idl, out)?;
	let client = clientgen_cli::generate_client(&config)?;

	let label = "generated";
	let label = if std::io::stdout().is_terminal() {
		label.green().bold().to_string()
	} else {
		label.to_owned()
	};
	println!(
		"{label} {} file(s) in {}",
		client.files.len(),
		config.output.display()
	);
	Ok(())
}

fn run_check(idl: &Path) -> Result<(), CliError> {
	let summary = clientgen_cli::check_descriptor(idl)?;
	println!(
		"{} {} ({})",
		summary.program, summary.version, summary.address
	);
	println!("{}", clientgen_cli::summary_table(&summary));
	Ok(())
}

fn run_codama(idl: &Path, output: Option<&Path>) -> Result<(), CliError> {
	let json = clientgen_cli::codama_json(idl)?;
	match output {
		Some(path) => {
			std::fs::write(path, format!("{json}\n")).map_err(|source| {
				CliError::WriteOutput {
					path: path.to_path_buf(),
					source,
				}
			})
		}
		None => {
			println!("{json}");
			Ok(())
		}
	}
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
	let text = serde_json::to_string_pretty(value).map_err(|source| {
		CliError::Serialize {
			what: "the result",
			source,
		}
	})?;
	println!("{text}");
	Ok(())
}
