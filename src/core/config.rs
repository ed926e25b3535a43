use std::{collections::HashMap, env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{cart::DEFAULT_CART_TTL_MINUTES, checkout::CheckoutRules, location::Location};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` runs the service on the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub dispatch_url: String,
    pub confirmation_template: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TerminalConfig {
    pub poll_interval: Duration,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub email: EmailConfig,
    pub checkout: CheckoutRules,
    pub terminal: TerminalConfig,
    pub cart_ttl_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
            },
            email: EmailConfig {
                dispatch_url: "http://localhost:3000/email-service/send".into(),
                confirmation_template: "order_confirmation".into(),
                timeout: Duration::from_secs(10),
            },
            checkout: CheckoutRules::default(),
            terminal: TerminalConfig::default(),
            cart_ttl_minutes: DEFAULT_CART_TTL_MINUTES,
        }
    }
}

/// Reads the configuration from the environment, falling back to defaults for unset keys.
pub fn load() -> Result<Config> {
    let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
    if database_url.is_none() {
        warn!("DATABASE_URL not set, orders will only be kept in memory");
    }

    let mut marketplace_urls = HashMap::new();
    for location in Location::ALL {
        let key = format!("MARKETPLACE_URL_{}", location.code().to_ascii_uppercase());
        let default = default_marketplace_url(location);
        marketplace_urls.insert(location, try_load::<String>(&key, &default)?);
    }

    let email = EmailConfig {
        dispatch_url: try_load(
            "EMAIL_DISPATCH_URL",
            "http://localhost:3000/email-service/send",
        )?,
        confirmation_template: try_load("EMAIL_CONFIRMATION_TEMPLATE", "order_confirmation")?,
        timeout: Duration::from_secs(try_load("EMAIL_TIMEOUT_SECONDS", "10")?),
    };

    let defaults = CheckoutRules::default();
    let checkout = CheckoutRules {
        anonymous_ceiling: try_load("ANONYMOUS_ORDER_CEILING", &defaults.anonymous_ceiling.to_string())?,
        delivery_minimum: try_load("DELIVERY_MINIMUM", &defaults.delivery_minimum.to_string())?,
        marketplace_urls,
        delivery_handoff: try_load("DELIVERY_HANDOFF", "true")?,
        confirmation_template: email.confirmation_template.clone(),
        ..defaults
    };

    Ok(Config {
        server: ServerConfig {
            port: try_load("PORT", "3000")?,
        },
        database: DatabaseConfig {
            url: database_url,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "10")?,
        },
        email,
        checkout,
        terminal: TerminalConfig {
            poll_interval: Duration::from_secs(try_load("TERMINAL_POLL_SECONDS", "30")?),
        },
        cart_ttl_minutes: try_load("CART_TTL_MINUTES", &DEFAULT_CART_TTL_MINUTES.to_string())?,
    })
}

pub fn default_marketplace_url(location: Location) -> String {
    format!("https://wolt.com/sv/swe/{}/restaurant/bistro-{}", location.code(), location.code())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}
