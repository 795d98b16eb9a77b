use clap::Parser;
use tracing::error;
use tripcard::config::setup_logging;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = tripcard::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    if let Err(err) = tripcard::web::setup_server(&cli).await {
        error!("Application error: {}", err);
    }
}
