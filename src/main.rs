use clap::Parser;
use log::{error, info};
use requestbin::configuration::config::{Config, Overrides};
use requestbin::controller::Controller;

#[tokio::main]
async fn main() {
    // RUST_LOG=debug for per-capture logs, trace for payload previews
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    info!("Importing configuration");
    let overrides = Overrides::parse();

    let config = match Config::load(&overrides) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration imported successfully");

    let controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.run().await {
        error!("Error occurred in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
