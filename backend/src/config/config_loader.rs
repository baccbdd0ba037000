use std::str::FromStr;

use anyhow::{Context, Result};

use super::{
    config_model::{Console, Database, DotEnvyConfig, Panel, Server, Session, Stripe},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the config from any key/value source; `load` feeds it the process env.
pub fn from_lookup<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("{} is invalid", key))
    };
    let parsed = |key: &str| -> Result<_> { parse::<u64>(key, &required(key)?) };
    let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    let server = Server {
        port: parse("SERVER_PORT", &required("SERVER_PORT")?)?,
        body_limit: parsed("SERVER_BODY_LIMIT")?,
        timeout: parsed("SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: match optional("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => parse("DATABASE_MAX_CONNECTIONS", &raw)?,
            None => 10,
        },
    };

    let session = Session {
        jwt_secret: required("SESSION_JWT_SECRET")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        webhook_tolerance_secs: match optional("STRIPE_WEBHOOK_TOLERANCE_SECS") {
            Some(raw) => parse("STRIPE_WEBHOOK_TOLERANCE_SECS", &raw)?,
            None => 300,
        },
        success_url: required("STRIPE_SUCCESS_URL")?,
        cancel_url: required("STRIPE_CANCEL_URL")?,
        portal_return_url: required("STRIPE_PORTAL_RETURN_URL")?,
    };

    let panel = Panel {
        url: required("PANEL_URL")?,
        application_key: required("PANEL_APPLICATION_KEY")?,
        client_key: required("PANEL_CLIENT_KEY")?,
        default_location_id: parse(
            "PANEL_DEFAULT_LOCATION_ID",
            &required("PANEL_DEFAULT_LOCATION_ID")?,
        )?,
    };

    let console = Console {
        reconnect_delay_secs: match optional("CONSOLE_RECONNECT_DELAY_SECS") {
            Some(raw) => parse("CONSOLE_RECONNECT_DELAY_SECS", &raw)?,
            None => 5,
        },
    };

    let stage = match optional("STAGE") {
        Some(raw) => Stage::try_from(raw.as_str())?,
        None => Stage::default(),
    };

    Ok(DotEnvyConfig {
        server,
        database,
        session,
        stripe,
        panel,
        console,
        stage,
    })
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{} is invalid", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SERVER_PORT", "8080"),
            ("SERVER_BODY_LIMIT", "10"),
            ("SERVER_TIMEOUT", "30"),
            ("DATABASE_URL", "postgres://localhost:5432/storefront"),
            ("SESSION_JWT_SECRET", "session-secret"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
            ("STRIPE_SUCCESS_URL", "https://games.example/dashboard"),
            ("STRIPE_CANCEL_URL", "https://games.example/pricing"),
            ("STRIPE_PORTAL_RETURN_URL", "https://games.example/dashboard"),
            ("PANEL_URL", "https://panel.example"),
            ("PANEL_APPLICATION_KEY", "ptla_123"),
            ("PANEL_CLIENT_KEY", "ptlc_123"),
            ("PANEL_DEFAULT_LOCATION_ID", "1"),
        ])
    }

    fn load_from(env: HashMap<&'static str, &'static str>) -> Result<DotEnvyConfig> {
        from_lookup(move |key| env.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn optional_values_take_defaults() {
        let config = load_from(base_env()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.stripe.webhook_tolerance_secs, 300);
        assert_eq!(config.console.reconnect_delay_secs, 5);
        assert_eq!(config.stage, Stage::Local);
    }

    #[test]
    fn missing_required_variable_is_named() {
        let mut env = base_env();
        env.remove("PANEL_CLIENT_KEY");
        let err = load_from(env).unwrap_err();
        assert_eq!(err.to_string(), "PANEL_CLIENT_KEY is invalid");
    }

    #[test]
    fn unparsable_number_is_an_error() {
        let mut env = base_env();
        env.insert("SERVER_PORT", "eighty");
        assert!(load_from(env).is_err());
    }

    #[test]
    fn overrides_are_read() {
        let mut env = base_env();
        env.insert("CONSOLE_RECONNECT_DELAY_SECS", "2");
        env.insert("STAGE", "production");
        let config = load_from(env).unwrap();
        assert_eq!(config.console.reconnect_delay_secs, 2);
        assert_eq!(config.stage, Stage::Production);
    }
}
