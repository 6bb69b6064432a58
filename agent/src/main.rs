mod api;
mod app;
mod board;
mod channel;
mod cli;
mod mqtt;
mod reconciler;
mod store;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run(cli::Cli::parse()).await
}
