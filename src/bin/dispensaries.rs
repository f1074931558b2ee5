use std::process::ExitCode;

use iheartjane_scraper::{run_cli, Pipeline, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> ExitCode {
    run_cli(Pipeline::Dispensaries, DEFAULT_CONFIG_PATH).await
}
