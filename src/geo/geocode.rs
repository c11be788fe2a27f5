use crate::geo::Coordinate;
use moka::future::Cache;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::time::Duration;
use strum::{Display, EnumString};
use tracing::{debug, warn};

/// Resolved addresses keyed by coordinate rounded to ~1 m.
static ADDRESS_CACHE: Lazy<Cache<(i64, i64), String>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(50_000)
        .time_to_live(Duration::from_secs(7 * 86400))
        .build()
});

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/reverse";
const BIGDATACLOUD_URL: &str = "https://api.bigdatacloud.net/data/reverse-geocode-client";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum GeocodeProvider {
    Nominatim,
    BigDataCloud,
}

#[derive(Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct BigDataCloudResponse {
    locality: String,
    city: String,
    principal_subdivision: String,
    country_name: String,
}

impl BigDataCloudResponse {
    fn into_address(self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        for part in [self.locality, self.city, self.principal_subdivision, self.country_name] {
            let part = part.trim().to_string();
            if !part.is_empty() && !parts.contains(&part) {
                parts.push(part);
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

fn cache_key(coordinate: Coordinate) -> (i64, i64) {
    (
        (coordinate.latitude() * 1e5).round() as i64,
        (coordinate.longitude() * 1e5).round() as i64,
    )
}

/// Best-effort reverse geocoding. Providers are tried in order; when all of
/// them fail the raw coordinate string is returned.
#[derive(Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    providers: Vec<GeocodeProvider>,
}

impl Geocoder {
    pub fn new(providers: Vec<GeocodeProvider>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, providers })
    }

    pub fn is_enabled(&self) -> bool {
        !self.providers.is_empty()
    }

    pub async fn reverse(&self, coordinate: Coordinate) -> String {
        if !self.is_enabled() {
            return coordinate.to_string();
        }

        let key = cache_key(coordinate);
        if let Some(address) = ADDRESS_CACHE.get(&key).await {
            return address;
        }

        for provider in &self.providers {
            match self.lookup(*provider, coordinate).await {
                Ok(Some(address)) => {
                    debug!(%provider, %coordinate, "Reverse geocoded");
                    ADDRESS_CACHE.insert(key, address.clone()).await;
                    return address;
                }
                Ok(None) => debug!(%provider, %coordinate, "Provider returned no address"),
                Err(e) => warn!(%provider, error = %e, "Reverse geocoding failed"),
            }
        }

        coordinate.to_string()
    }

    async fn lookup(
        &self,
        provider: GeocodeProvider,
        coordinate: Coordinate,
    ) -> Result<Option<String>, reqwest::Error> {
        let lat = coordinate.latitude().to_string();
        let lng = coordinate.longitude().to_string();

        match provider {
            GeocodeProvider::Nominatim => {
                let body: NominatimResponse = self
                    .client
                    .get(NOMINATIM_URL)
                    .query(&[("format", "jsonv2"), ("lat", lat.as_str()), ("lon", lng.as_str())])
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;

                Ok(body.display_name.filter(|name| !name.trim().is_empty()))
            }
            GeocodeProvider::BigDataCloud => {
                let body: BigDataCloudResponse = self
                    .client
                    .get(BIGDATACLOUD_URL)
                    .query(&[
                        ("latitude", lat.as_str()),
                        ("longitude", lng.as_str()),
                        ("localityLanguage", "en"),
                    ])
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;

                Ok(body.into_address())
            }
        }
    }
}
