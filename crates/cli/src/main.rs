use clap::Parser;
use ipn_cli::cli::Cli;
use ipn_cli::{commands, logging, output};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let command = cli.command.name();
	if let Err(err) = commands::dispatch(cli).await {
		error!(target = "ipn", error = %err, "command failed");
		output::print_failure(command, &err, format);
		std::process::exit(1);
	}
}
