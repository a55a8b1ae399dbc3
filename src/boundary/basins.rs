//! Watershed basin layer: local cache with remote fallback.

use std::fs;
use std::path::{Path, PathBuf};

use geojson::feature;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use super::{feature_collection, parse_polygon_features, polygon_feature, read_polygon_features, PolygonFeature};
use crate::error::{BasinFetchError, BoundaryLoadError};
use crate::models::Basin;

/// Source columns with no use downstream
const DROPPED_COLUMNS: &[&str] = &["OBJECTID_1", "CONDITION"];
/// Source column holding the basin name
const NAME_SOURCE_COLUMN: &str = "STUDY_UNIT";
const NAME_COLUMN: &str = "basin";
const ID_COLUMN: &str = "OBJECTID";

/// Outcome of loading the basin layer
#[derive(Debug)]
pub enum BasinLoad {
    /// Read from the local cache file
    Cached(Vec<Basin>),
    /// Downloaded and written to the cache
    Fetched(Vec<Basin>),
    /// Download failed; enrichment proceeds with no basins
    Unavailable(BasinFetchError),
}

impl BasinLoad {
    pub fn basins(&self) -> &[Basin] {
        match self {
            BasinLoad::Cached(b) | BasinLoad::Fetched(b) => b,
            BasinLoad::Unavailable(_) => &[],
        }
    }

    pub fn into_basins(self) -> Vec<Basin> {
        match self {
            BasinLoad::Cached(b) | BasinLoad::Fetched(b) => b,
            BasinLoad::Unavailable(_) => Vec::new(),
        }
    }
}

/// Loads basins from the cache path, downloading them on a cache miss
pub struct BasinProvider {
    cache_path: PathBuf,
    url: String,
    client: reqwest::blocking::Client,
}

impl BasinProvider {
    pub fn new(cache_path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            cache_path: cache_path.into(),
            url: url.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Load the basin layer.
    ///
    /// A present cache file is trusted as-is; reading it is fatal on error.
    /// Download failures are returned as [`BasinLoad::Unavailable`].
    pub fn load(&self) -> Result<BasinLoad, BoundaryLoadError> {
        if self.cache_path.exists() {
            info!("Loading cached watersheds from {}", self.cache_path.display());
            let basins = basins_from_features(read_polygon_features(&self.cache_path)?);
            info!("Loaded {} cached basins", basins.len());
            return Ok(BasinLoad::Cached(basins));
        }

        info!("Downloading watersheds from {}", self.url);
        match self.fetch_and_cache() {
            Ok(basins) => {
                info!(
                    "Downloaded {} basins, cached at {}",
                    basins.len(),
                    self.cache_path.display()
                );
                Ok(BasinLoad::Fetched(basins))
            }
            Err(e) => {
                warn!("Error fetching watersheds: {}", e);
                Ok(BasinLoad::Unavailable(e))
            }
        }
    }

    fn fetch_and_cache(&self) -> Result<Vec<Basin>, BasinFetchError> {
        let url = query_url(&self.url)?;
        let response = self
            .client
            .get(url)
            .header("Accept", "application/geo+json, application/json")
            .send()?;

        if !response.status().is_success() {
            return Err(BasinFetchError::Status(response.status().as_u16()));
        }

        let body = response.text()?;
        let basins = normalize_remote(&body)?;
        write_cache(&self.cache_path, &basins)?;
        Ok(basins)
    }
}

/// Add the open-data query parameters unless the URL already carries a query
fn query_url(base: &str) -> Result<Url, BasinFetchError> {
    let mut url = Url::parse(base)?;
    if url.query().is_none() {
        url.query_pairs_mut()
            .append_pair("outFields", "*")
            .append_pair("where", "1=1")
            .append_pair("f", "geojson");
    }
    Ok(url)
}

/// Parse a service response and normalize its columns
fn normalize_remote(body: &str) -> Result<Vec<Basin>, BasinFetchError> {
    let mut features = parse_polygon_features(body, Path::new("<basin service>"))
        .map_err(|e| BasinFetchError::Parse(e.to_string()))?;

    for feature in &mut features {
        for column in DROPPED_COLUMNS {
            feature.properties.remove(*column);
        }
        if let Some(name) = feature.properties.remove(NAME_SOURCE_COLUMN) {
            feature.properties.insert(NAME_COLUMN.to_string(), name);
        }
    }

    Ok(basins_from_features(features))
}

/// Build basins from polygon features.
///
/// The id comes from the `OBJECTID` column, then the feature id, then the
/// feature's position in the file.
pub fn basins_from_features(features: Vec<PolygonFeature>) -> Vec<Basin> {
    features
        .into_iter()
        .enumerate()
        .map(|(idx, mut feature)| {
            let id = feature
                .properties
                .remove(ID_COLUMN)
                .as_ref()
                .and_then(json_id)
                .or_else(|| feature.id.as_ref().and_then(feature_id))
                .unwrap_or(idx as i64);

            let name = match feature.properties.remove(NAME_COLUMN) {
                Some(Value::String(s)) => Some(s),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            };

            let mut basin = Basin::new(id, name, feature.geometry);
            basin.properties = feature.properties;
            basin
        })
        .collect()
}

fn json_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn feature_id(id: &feature::Id) -> Option<i64> {
    match id {
        feature::Id::Number(n) => n.as_i64(),
        feature::Id::String(s) => s.trim().parse().ok(),
    }
}

/// Persist basins as a GeoJSON FeatureCollection
fn write_cache(path: &Path, basins: &[Basin]) -> Result<(), BasinFetchError> {
    let persist_err = |source: std::io::Error| BasinFetchError::Persist {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(persist_err)?;
    }

    let features = basins
        .iter()
        .map(|basin| {
            let mut properties = basin.properties.clone();
            properties.insert(
                NAME_COLUMN.to_string(),
                basin.name.clone().map(Value::String).unwrap_or(Value::Null),
            );
            polygon_feature(
                Some(feature::Id::Number(basin.id.into())),
                &basin.geometry,
                properties,
            )
        })
        .collect();

    let body = serde_json::to_string(&feature_collection(features))
        .map_err(|e| persist_err(std::io::Error::other(e)))?;
    fs::write(path, body).map_err(persist_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    const SERVICE_RESPONSE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": 1,
             "properties": {"OBJECTID": 11, "OBJECTID_1": 99, "CONDITION": "x",
                            "STUDY_UNIT": "Bear Creek", "WRIA": 8},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}},
            {"type": "Feature", "id": 2,
             "properties": {"OBJECTID": 12, "STUDY_UNIT": "Issaquah Creek"},
             "geometry": {"type": "Polygon", "coordinates": [[[2,0],[4,0],[4,2],[2,2],[2,0]]]}}
        ]
    }"#;

    /// Answer a single HTTP request with `status` and `body`.
    ///
    /// Returns the base URL and a handle yielding the raw request head.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/MapServer/237/query", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/geo+json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });

        (url, handle)
    }

    #[test]
    fn test_fetch_writes_cache_then_reuses_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gis").join("watersheds.geojson");
        let (url, server) = serve_once("200 OK", SERVICE_RESPONSE);

        let provider = BasinProvider::new(&path, url);
        let fetched = provider.load().unwrap();
        let request = server.join().unwrap();

        assert!(matches!(fetched, BasinLoad::Fetched(_)));
        assert!(request.starts_with("GET /MapServer/237/query?outFields=*&where=1%3D1&f=geojson "));
        assert!(path.exists());
        assert_eq!(fetched.basins().len(), 2);
        assert_eq!(fetched.basins()[0].name.as_deref(), Some("Bear Creek"));

        // The listener is gone, so this can only come from the cache
        let cached = provider.load().unwrap();
        assert!(matches!(cached, BasinLoad::Cached(_)));
        assert_eq!(cached.basins(), fetched.basins());
    }

    #[test]
    fn test_http_error_status_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watersheds.geojson");
        let (url, server) = serve_once("503 Service Unavailable", "{}");

        let load = BasinProvider::new(&path, url).load().unwrap();
        server.join().unwrap();

        match load {
            BasinLoad::Unavailable(BasinFetchError::Status(503)) => {}
            other => panic!("expected HTTP 503, got {:?}", other),
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_normalize_remote_columns() {
        let basins = normalize_remote(SERVICE_RESPONSE).unwrap();
        assert_eq!(basins.len(), 2);
        assert_eq!(basins[0].id, 11);
        assert_eq!(basins[0].name.as_deref(), Some("Bear Creek"));
        assert!(!basins[0].properties.contains_key("OBJECTID_1"));
        assert!(!basins[0].properties.contains_key("CONDITION"));
        assert!(!basins[0].properties.contains_key("STUDY_UNIT"));
        assert_eq!(basins[0].properties["WRIA"], 8);
        assert_eq!(basins[1].id, 12);
    }

    #[test]
    fn test_cache_round_trip_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gis").join("watersheds.geojson");
        let basins = normalize_remote(SERVICE_RESPONSE).unwrap();
        write_cache(&path, &basins).unwrap();

        let provider = BasinProvider::new(&path, "http://127.0.0.1:9/unused");
        let first = provider.load().unwrap();
        assert!(matches!(first, BasinLoad::Cached(_)));
        assert_eq!(first.basins(), basins.as_slice());

        let before = fs::read(&path).unwrap();
        let second = provider.load().unwrap();
        assert_eq!(second.basins(), first.basins());
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_fetch_failure_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watersheds.geojson");
        let provider = BasinProvider::new(&path, "http://127.0.0.1:9/query");
        let load = provider.load().unwrap();
        assert!(matches!(load, BasinLoad::Unavailable(_)));
        assert!(load.basins().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_url_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = BasinProvider::new(dir.path().join("w.geojson"), "not a url");
        match provider.load().unwrap() {
            BasinLoad::Unavailable(BasinFetchError::Url(_)) => {}
            other => panic!("expected URL error, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_cache_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watersheds.geojson");
        fs::write(&path, "{").unwrap();
        let provider = BasinProvider::new(&path, "http://127.0.0.1:9/query");
        assert!(matches!(
            provider.load(),
            Err(BoundaryLoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_query_url() {
        let url = query_url("https://example.org/MapServer/237/query").unwrap();
        assert_eq!(url.query(), Some("outFields=*&where=1%3D1&f=geojson"));
        let kept = query_url("https://example.org/q?f=json").unwrap();
        assert_eq!(kept.query(), Some("f=json"));
    }
}
