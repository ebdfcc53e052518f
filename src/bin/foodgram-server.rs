use std::{error::Error, sync::Arc};

use foodgram_sdk::{
    config::Config,
    media::MediaStorage,
    postgres::PgStore,
    routes::{routes, AppState},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;

    let store = PgStore::connect(&config.database_url, config.max_connections).await?;
    store.migrate().await?;
    log::info!("Connected to database");

    let mut state = AppState::new(
        Arc::new(store),
        MediaStorage::new(config.media_root.clone()),
        config.jwt_secret.as_bytes(),
    );

    if let Some(url) = &config.redis_url {
        match redis::Client::open(url.as_str()) {
            Ok(client) => match client.get_multiplexed_async_connection().await {
                Ok(connection) => {
                    log::info!("Connected to redis");
                    state = state.with_cache(connection);
                }
                Err(e) => log::warn!("Redis unavailable, caching disabled: {e}"),
            },
            Err(e) => log::warn!("Invalid REDIS_URL, caching disabled: {e}"),
        }
    }

    log::info!("Listening on {}", config.bind);
    warp::serve(routes(state)).run(config.bind).await;

    Ok(())
}
