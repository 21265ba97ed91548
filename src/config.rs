use std::env;

/// Deployment mode, drives the forced-HTTPS redirect rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Local,
    Review,
    Staging,
    Production,
}

impl RuntimeMode {
    /// Unrecognized values fall back to `Local`, which never redirects.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "review" => RuntimeMode::Review,
            "staging" => RuntimeMode::Staging,
            "production" => RuntimeMode::Production,
            "local" | "" => RuntimeMode::Local,
            other => {
                tracing::warn!("unrecognized APP_MODE '{}', treating as local", other);
                RuntimeMode::Local
            }
        }
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeMode::Local => write!(f, "local"),
            RuntimeMode::Review => write!(f, "review"),
            RuntimeMode::Staging => write!(f, "staging"),
            RuntimeMode::Production => write!(f, "production"),
        }
    }
}

/// PEM materials for a `rediss://` connection.
#[derive(Clone)]
pub struct RedisTls {
    pub cert: Option<String>,
    pub key: Option<String>,
    pub ca: Option<String>,
}

#[derive(Clone)]
pub struct RedisConfig {
    pub url: String,
    pub password: Option<String>,
    pub tls: Option<RedisTls>,
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &self.url)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field(
                "tls",
                &self.tls.as_ref().map(|tls| {
                    format!(
                        "cert={} key={} ca={}",
                        tls.cert.is_some(),
                        tls.key.as_ref().map_or("none", |_| "[REDACTED]"),
                        tls.ca.is_some()
                    )
                }),
            )
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub redis: RedisConfig,
    pub mode: RuntimeMode,
    pub app_domain: String,
    pub public_domain: String,
    pub ip_whitelist: String,
    pub port: u16,
    pub debug: bool,
}

fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(v) => match v.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("invalid {} value '{}', using default", name, v);
                default
            }
        },
        None => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

        let url = get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into());
        let password = get("REDIS_PASSWORD");

        let cert = get("REDIS_TLS_CERT");
        let key = get("REDIS_TLS_KEY");
        let ca = get("REDIS_TLS_CA");
        let tls = if cert.is_some() || key.is_some() || ca.is_some() {
            Some(RedisTls { cert, key, ca })
        } else {
            None
        };

        let mode = get("APP_MODE")
            .map(|m| RuntimeMode::parse(&m))
            .unwrap_or(RuntimeMode::Local);
        let app_domain = get("APP_DOMAIN").unwrap_or_default();
        let public_domain = get("PUBLIC_DOMAIN").unwrap_or_default();
        let ip_whitelist = get("IP_WHITELIST").unwrap_or_default();

        let port: u16 = parse_or("PORT", get("PORT"), 3000);
        let debug = get("APP_DEBUG").is_some();

        Self {
            redis: RedisConfig { url, password, tls },
            mode,
            app_domain: app_domain.trim().to_string(),
            public_domain: public_domain.trim().to_string(),
            ip_whitelist,
            port,
            debug,
        }
    }
}
