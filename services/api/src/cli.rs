use crate::demo::{run_demo, run_poam_report, DemoArgs, PoamReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use comply_ai::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Compliance Scoring Orchestrator",
    about = "Score regulatory controls against ingested evidence and plan remediation from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run an end-to-end scoring and remediation demo with a scripted model
    Demo(DemoArgs),
    /// Generate a POAM report from the demo workspace
    Poam {
        #[command(subcommand)]
        command: PoamCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PoamCommand {
    /// Assemble and print a POAM report
    Report(PoamReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Poam {
            command: PoamCommand::Report(args),
        } => run_poam_report(args),
    }
}
