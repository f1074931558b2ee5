use std::process::ExitCode;

use iheartjane_scraper::{run_cli, Pipeline, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> ExitCode {
    run_cli(Pipeline::Brands, DEFAULT_CONFIG_PATH).await
}
