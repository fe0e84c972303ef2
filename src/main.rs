use anyhow::Result;
use clap::{Parser, Subcommand};

use execbox::{cli, config, webapp};

#[derive(Parser)]
#[command(name = "execbox")]
#[command(about = "Run uploaded executables with bounded time and output")]
#[command(long_about = "\
Run uploaded executables with bounded time and output

execbox accepts a base64-encoded executable, a calldata string and a timeout,
runs the executable as a child process with the calldata on stdin, and
reports the exit code, captured stdout/stderr and a classified error.

Limits come from flags or the environment:
  MAX_EXECUTABLE  MAX_CALLDATA  MAX_TIMEOUT  MAX_STDOUT  MAX_STDERR

Example:

  $ MAX_TIMEOUT=3000 execbox serve --port 8080

  $ execbox run ./script.py --calldata 'bitcoin' --timeout 1000
")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Global configuration arguments
    #[command(flatten)]
    config: config::ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP executor service
    ///
    /// Example:
    ///
    ///  $ execbox serve
    ///
    ///  $ execbox --port 8080 serve --host 127.0.0.1
    ///
    Serve(webapp::ServeArgs),

    /// Execute a local file once and print the result as JSON
    ///
    /// Example:
    ///
    ///  $ execbox run ./hello.sh
    ///
    ///  $ echo -n 'input' | execbox run --timeout 500 ./script.py
    ///
    Run(cli::run::RunArgs),

    /// Print version and build details
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let global_config = config::GlobalConfig::from_args(&cli.config)?;
    global_config.init_tracing();

    tracing::debug!("execbox starting");

    match cli.command {
        Commands::Serve(args) => webapp::run(args, &global_config).await?,
        Commands::Run(args) => cli::run::run(args, &global_config).await?,
        Commands::Version => println!("{}", cli::version("execbox")),
    }

    tracing::debug!("execbox shutting down");

    Ok(())
}
