use clap::Parser;
use cofacade_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cofacade_cli::init_tracing();
    cofacade_cli::run(Cli::parse()).await
}
