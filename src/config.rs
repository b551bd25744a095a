use std::time::Duration;

use anyhow::{bail, Context};

/// JWT signing configuration. Keys are PEM strings as found in the
/// environment; parsing into key objects happens once in `JwtKeys`.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub private_key_pem: String,
    pub public_key_pem: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let jwt = JwtConfig {
            private_key_pem: std::env::var("JWT_PRIVATE_KEY").context("JWT_KEYS_MISSING")?,
            public_key_pem: std::env::var("JWT_PUBLIC_KEY").context("JWT_KEYS_MISSING")?,
            access_ttl: parse_ttl(
                &std::env::var("ACCESS_TOKEN_TTL").unwrap_or_else(|_| "15m".into()),
            )
            .context("ACCESS_TOKEN_TTL is invalid")?,
            refresh_ttl: parse_ttl(
                &std::env::var("REFRESH_TOKEN_TTL").unwrap_or_else(|_| "30d".into()),
            )
            .context("REFRESH_TOKEN_TTL is invalid")?,
        };

        Ok(Self {
            database_url,
            allowed_origins,
            jwt,
        })
    }
}

/// Parse a token TTL: either a raw positive second count ("900") or a
/// duration shorthand ("15m", "30d"). Anything else rejects the
/// configuration, so a typo fails at startup rather than at request time.
pub fn parse_ttl(v: &str) -> anyhow::Result<Duration> {
    let v = v.trim();
    if let Ok(secs) = v.parse::<u64>() {
        if secs == 0 {
            bail!("TTL must be positive: {v}");
        }
        return Ok(Duration::from_secs(secs));
    }

    let (num, unit) = v.split_at(v.len().saturating_sub(1));
    let n: u64 = num
        .parse()
        .with_context(|| format!("invalid TTL: {v:?}"))?;
    if n == 0 {
        bail!("TTL must be positive: {v}");
    }
    let secs = match unit {
        "s" => n,
        "m" => n * 60,
        "h" => n * 3600,
        "d" => n * 86_400,
        "w" => n * 604_800,
        _ => bail!("invalid TTL unit: {v:?}"),
    };
    Ok(Duration::from_secs(secs))
}
