use clap::Parser;
use coderag_cli::SearchCli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    SearchCli::parse().run().await
}
