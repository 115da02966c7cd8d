use clap::Parser;

use todoq::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::parse();
    todoq::logging::init(config.log_level)?;
    todoq::app::run(config).await?;
    Ok(())
}
