use crate::attendance::engine::SameDayPolicy;
use crate::geo::DEFAULT_RADIUS_KM;
use crate::geo::geocode::GeocodeProvider;
use crate::geo::location::FixOptions;
use anyhow::{Context, Result, bail};
use dotenvy::dotenv;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Logging
    pub log_dir: String,
    pub log_level: tracing::Level,

    // Attendance
    pub geofence_radius_km: f64,
    pub location_timeout: Duration,
    pub location_max_age: Duration,
    pub location_max_skew: Duration,
    pub same_day_policy: SameDayPolicy,

    // Reverse geocoding, empty = disabled
    pub geocoders: Vec<GeocodeProvider>,
    pub geocode_timeout: Duration,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{key}={raw:?} is invalid: {e}"))
}

fn providers(raw: &str) -> Result<Vec<GeocodeProvider>> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "none")
        .map(|name| {
            GeocodeProvider::from_str(name)
                .map_err(|_| anyhow::anyhow!("unknown geocoder {name:?} in GEOCODERS"))
        })
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parsed("REFRESH_TOKEN_TTL", "604800")?, // 7 days

            rate_login_per_min: parsed("RATE_LOGIN_PER_MIN", "60")?,
            rate_refresh_per_min: parsed("RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: parsed("LOG_LEVEL", "debug")?,

            geofence_radius_km: parsed("GEOFENCE_RADIUS_KM", &DEFAULT_RADIUS_KM.to_string())?,
            location_timeout: Duration::from_millis(parsed("LOCATION_TIMEOUT_MS", "10000")?),
            location_max_age: Duration::from_secs(parsed("LOCATION_MAX_AGE_SECS", "300")?),
            location_max_skew: Duration::from_secs(parsed("LOCATION_MAX_SKEW_SECS", "30")?),
            same_day_policy: parsed("ATTENDANCE_SAME_DAY_POLICY", "multiple")?,

            geocoders: providers(
                &env::var("GEOCODERS").unwrap_or_else(|_| "nominatim,bigdatacloud".to_string()),
            )?,
            geocode_timeout: Duration::from_millis(parsed("GEOCODE_TIMEOUT_MS", "3000")?),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.geofence_radius_km.is_finite() && self.geofence_radius_km > 0.0) {
            bail!("GEOFENCE_RADIUS_KM must be a positive number");
        }
        if self.rate_login_per_min == 0
            || self.rate_refresh_per_min == 0
            || self.rate_protected_per_min == 0
        {
            bail!("rate limits must be at least 1 request per minute");
        }
        if self.location_timeout.is_zero() {
            bail!("LOCATION_TIMEOUT_MS must be greater than zero");
        }
        Ok(())
    }

    pub fn fix_options(&self) -> FixOptions {
        FixOptions {
            timeout: self.location_timeout,
            maximum_age: self.location_max_age,
            maximum_skew: self.location_max_skew,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geocoder_list_parses() {
        assert_eq!(
            providers("nominatim, bigdatacloud").unwrap(),
            vec![GeocodeProvider::Nominatim, GeocodeProvider::BigDataCloud]
        );
        assert!(providers("none").unwrap().is_empty());
        assert!(providers("").unwrap().is_empty());
        assert!(providers("nominatim,mapquest").is_err());
    }

    #[test]
    fn defaults_apply_when_unset() {
        let radius: f64 = parsed("SITE_ATTENDANCE_TEST_UNSET_RADIUS", "0.5").unwrap();
        assert_eq!(radius, 0.5);

        let policy: SameDayPolicy =
            parsed("SITE_ATTENDANCE_TEST_UNSET_POLICY", "single").unwrap();
        assert_eq!(policy, SameDayPolicy::Single);

        let level: tracing::Level = parsed("SITE_ATTENDANCE_TEST_UNSET_LEVEL", "info").unwrap();
        assert_eq!(level, tracing::Level::INFO);

        assert!(parsed::<u32>("SITE_ATTENDANCE_TEST_UNSET_RATE", "lots").is_err());
    }
}
