use std::sync::Arc;

use anyhow::Context;
use jobwatch_config::Config;
use jobwatch_status::{StatusClient, StatusOptions};
use jobwatch_store::RedisStore;

/// Build status client options from application config.
pub fn status_options_from_config(cfg: &Config) -> StatusOptions {
    StatusOptions {
        ttl: cfg.status.ttl(),
        key_prefix: cfg.status.key_prefix.clone(),
        kill_key: cfg.status.kill_key.clone(),
    }
}

/// Connect to the configured Redis and wrap it in a status client.
pub async fn status_client_from_config(cfg: &Config) -> anyhow::Result<StatusClient> {
    let store = RedisStore::connect(&cfg.redis.url)
        .await
        .with_context(|| format!("failed to connect to {}", cfg.redis.url))?;
    tracing::debug!(redis_url = %cfg.redis.url, "connected to status store");
    Ok(StatusClient::with_options(
        Arc::new(store),
        status_options_from_config(cfg),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn options_follow_config() {
        let mut cfg = Config::default();
        cfg.status.ttl_secs = 90;
        cfg.status.key_prefix = "jobs".into();
        cfg.status.kill_key = "jobs_kills".into();

        let options = status_options_from_config(&cfg);
        assert_eq!(options.ttl, Duration::from_secs(90));
        assert_eq!(options.key_prefix, "jobs");
        assert_eq!(options.kill_key, "jobs_kills");
    }
}
