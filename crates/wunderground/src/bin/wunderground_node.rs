use argh::FromArgs;
use wunderground::{Config, WeatherClient, WeatherNode, ZenohBus};

#[derive(FromArgs)]
/// Weather Underground conditions publisher for Zenoh
struct Args {
    /// path to the agent configuration file
    #[argh(option, short = 'c')]
    config: String,

    /// zenoh router endpoint to connect to
    /// Default: tcp/127.0.0.1:7447 (local zenohd router)
    #[argh(option, short = 'z', default = "String::from(\"tcp/127.0.0.1:7447\")")]
    zenoh_endpoint: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();

    // Load and validate configuration
    let config = match Config::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to load config from '{}': {}", args.config, e);
            std::process::exit(1);
        }
    };
    let location = match config.validate() {
        Ok(loc) => loc,
        Err(e) => {
            log::error!("Invalid config: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Agent '{}' using location {:?}", config.agent_id, location);

    // Create shutdown channel
    let shutdown_tx = tokio::sync::watch::Sender::new(());

    // Set up Ctrl+C handler
    {
        let shutdown_tx = shutdown_tx.clone();
        ctrlc::set_handler(move || {
            log::info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown_tx.send(());
        })
        .expect("Error setting Ctrl+C handler");
    }

    // Open the Zenoh session
    let endpoint = std::env::var("ZENOH_ENDPOINT").unwrap_or(args.zenoh_endpoint);
    log::info!("Connecting to Zenoh at: {}", endpoint);
    let mut zenoh_config = zenoh::Config::default();
    zenoh_config
        .insert_json5("connect/endpoints", &format!("[\"{}\"]", endpoint))
        .ok();
    let session = zenoh::open(zenoh_config).await?;

    // Create and run the weather node
    let node = WeatherNode::new(&config, &location, WeatherClient::new(), ZenohBus::new(session));
    node.run(shutdown_tx).await;

    log::info!("Weather node shut down, exiting");

    Ok(())
}
