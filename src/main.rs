use truck_loadout::api;
use truck_loadout::config::AppConfig;

#[tokio::main]
async fn main() {
    // .env may carry RUST_LOG, so load it before the logger
    let dotenv_result = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            log::warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let api_config = app_config.api.clone();
    let optimizer_config = app_config.optimizer.clone();

    println!("🚚 Truck loading service starting...");
    api::start_api_server(api_config, optimizer_config).await;
}
