//! Runnable party server.
//!
//! Configured from the environment:
//!
//! | variable | default |
//! |---|---|
//! | `PARTYGATE_BIND` | `0.0.0.0:3000` |
//! | `PARTYGATE_PASSKEY` | `welcome` |
//! | `PARTYGATE_MAX_USERS` | `5` |
//! | `PARTYGATE_REQUEST_LIMIT` | `1000` |
//!
//! Logging follows `RUST_LOG` (default `info`).

use std::str::FromStr;

use partygate::prelude::*;
use tracing_subscriber::EnvFilter;

/// Reads `name`, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(name, value = %raw, "ignoring unparsable setting");
                default
            }
        },
        Err(_) => default,
    }
}

fn party_config() -> PartyConfig {
    let defaults = PartyConfig::default();
    PartyConfig::default()
        .with_passkey(env_or("PARTYGATE_PASSKEY", defaults.passkey.clone()))
        .with_max_users(env_or("PARTYGATE_MAX_USERS", defaults.max_users).max(1))
        .with_request_limit(env_or("PARTYGATE_REQUEST_LIMIT", defaults.request_limit))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind: String = env_or("PARTYGATE_BIND", "0.0.0.0:3000".to_string());
    let config = party_config();
    tracing::info!(%bind, max_users = config.max_users, "starting party server");

    let server = PartygateServer::builder()
        .bind(&bind)
        .party_config(config)
        .build()
        .await?;
    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_starts_and_answers_status() {
        let server = PartygateServer::builder()
            .bind("127.0.0.1:0")
            .party_config(party_config())
            .build()
            .await
            .unwrap();
        let base = format!("http://{}", server.local_addr().unwrap());
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let api = HttpPartyApi::new(base).unwrap();
        let status = api.status(None).await.unwrap();

        assert!(!status.session_valid);
        assert_eq!(status.occupancy.total_users, 0);
    }

    #[test]
    fn test_env_or_falls_back_when_unset() {
        assert_eq!(env_or("PARTYGATE_TEST_UNSET_VARIABLE", 7usize), 7);
    }
}
