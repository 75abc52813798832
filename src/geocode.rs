use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::config::GeocodingConfig;

/// A resolved address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
}

/// What a coordinate pair resolves to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Place {
    pub country: Option<String>,
    pub formatted_address: Option<String>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves a free-text address; `None` when the provider has no match.
    async fn forward(&self, address: &str) -> anyhow::Result<Option<GeoPoint>>;

    /// Resolves coordinates to the nearest place; `None` when the provider has no match.
    async fn reverse(&self, lat: f64, lng: f64) -> anyhow::Result<Option<Place>>;
}

#[derive(Clone)]
pub struct MapTilerGeocoder {
    http: Client,
    base_url: String,
    api_key: String,
}

impl MapTilerGeocoder {
    pub fn new(http: Client, cfg: &GeocodingConfig) -> Self {
        Self {
            http,
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    fn query_url(&self, query: &str) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.base_url).context("parse geocoding base url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("geocoding base url cannot have path segments"))?
            .pop_if_empty()
            .push(&format!("{query}.json"));
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    fn forward_url(&self, address: &str) -> anyhow::Result<Url> {
        self.query_url(address)
    }

    /// MapTiler takes reverse queries as `{lng},{lat}`.
    fn reverse_url(&self, lat: f64, lng: f64) -> anyhow::Result<Url> {
        self.query_url(&format!("{lng},{lat}"))
    }

    async fn features(&self, url: Url) -> anyhow::Result<FeatureCollection> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("geocoding request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("geocoding failed with status {}", status.as_u16());
        }
        response.json().await.context("geocoding parse failed")
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    center: [f64; 2],
    place_name: Option<String>,
    text: Option<String>,
    #[serde(default)]
    place_type: Vec<String>,
    #[serde(default)]
    context: Vec<ContextEntry>,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    id: Option<String>,
    text: Option<String>,
}

fn first_match(collection: FeatureCollection, address: &str) -> Option<GeoPoint> {
    let feature = collection.features.into_iter().next()?;
    let [lng, lat] = feature.center;
    Some(GeoPoint {
        lat,
        lng,
        formatted_address: feature.place_name.unwrap_or_else(|| address.to_string()),
    })
}

/// The nearest feature's name and the country it lies in.
///
/// A feature that is itself a country names the country; otherwise the
/// `context` entry whose id starts with `country` does.
fn nearest_place(collection: FeatureCollection) -> Option<Place> {
    let feature = collection.features.into_iter().next()?;
    let country = if feature.place_type.iter().any(|t| t == "country") {
        feature.text
    } else {
        feature
            .context
            .into_iter()
            .find(|c| c.id.as_deref().is_some_and(|id| id.starts_with("country")))
            .and_then(|c| c.text)
    };
    Some(Place {
        country,
        formatted_address: feature.place_name,
    })
}

#[async_trait]
impl Geocoder for MapTilerGeocoder {
    async fn forward(&self, address: &str) -> anyhow::Result<Option<GeoPoint>> {
        let collection = self.features(self.forward_url(address)?).await?;
        Ok(first_match(collection, address))
    }

    async fn reverse(&self, lat: f64, lng: f64) -> anyhow::Result<Option<Place>> {
        let collection = self.features(self.reverse_url(lat, lng)?).await?;
        Ok(nearest_place(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geocoder() -> MapTilerGeocoder {
        MapTilerGeocoder::new(
            Client::new(),
            &GeocodingConfig {
                api_key: "k3y".into(),
                base_url: "https://api.maptiler.com/geocoding".into(),
            },
        )
    }

    #[test]
    fn forward_url_encodes_address_and_key() {
        let url = geocoder().forward_url("Kochi, Kerala").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.maptiler.com/geocoding/Kochi,%20Kerala.json?key=k3y"
        );
    }

    #[test]
    fn first_match_swaps_center_into_lat_lng() {
        let collection: FeatureCollection = serde_json::from_value(serde_json::json!({
            "features": [
                {"center": [76.26, 9.93], "place_name": "Kochi, Kerala, India"},
                {"center": [0.0, 0.0], "place_name": "elsewhere"}
            ]
        }))
        .unwrap();
        let point = first_match(collection, "kochi").unwrap();
        assert_eq!(point.lat, 9.93);
        assert_eq!(point.lng, 76.26);
        assert_eq!(point.formatted_address, "Kochi, Kerala, India");
    }

    #[test]
    fn reverse_url_puts_longitude_first() {
        let url = geocoder().reverse_url(9.93, 76.26).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.maptiler.com/geocoding/76.26,9.93.json?key=k3y"
        );
    }

    #[test]
    fn nearest_place_reads_country_from_context() {
        let collection: FeatureCollection = serde_json::from_value(serde_json::json!({
            "features": [{
                "center": [76.26, 9.93],
                "place_name": "Ernakulam, Kerala, India",
                "text": "Ernakulam",
                "place_type": ["municipality"],
                "context": [
                    {"id": "region.1234", "text": "Kerala"},
                    {"id": "country.5678", "text": "India"}
                ]
            }]
        }))
        .unwrap();
        assert_eq!(
            nearest_place(collection),
            Some(Place {
                country: Some("India".into()),
                formatted_address: Some("Ernakulam, Kerala, India".into()),
            })
        );
    }

    #[test]
    fn nearest_place_that_is_a_country_names_itself() {
        let collection: FeatureCollection = serde_json::from_value(serde_json::json!({
            "features": [{
                "center": [78.0, 21.0],
                "place_name": "India",
                "text": "India",
                "place_type": ["country"]
            }]
        }))
        .unwrap();
        let place = nearest_place(collection).unwrap();
        assert_eq!(place.country.as_deref(), Some("India"));
    }

    #[test]
    fn nearest_place_without_country_context_leaves_country_empty() {
        let collection: FeatureCollection = serde_json::from_value(serde_json::json!({
            "features": [{"center": [0.0, 0.0], "context": [{"id": "region.1", "text": "Sea"}]}]
        }))
        .unwrap();
        assert_eq!(nearest_place(collection), Some(Place::default()));

        let empty: FeatureCollection = serde_json::from_str("{}").unwrap();
        assert!(nearest_place(empty).is_none());
    }

    #[test]
    fn first_match_is_none_without_features() {
        let collection: FeatureCollection = serde_json::from_str("{}").unwrap();
        assert!(first_match(collection, "nowhere").is_none());
    }
}
