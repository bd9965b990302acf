//! Country lookups for geolocated search and outlet-restricted search.
//!
//! Two read-only mappings: country name → Google `gl` code, and country name
//! → Media Cloud outlet domains. Bundled copies ship with the crate; callers
//! can load their own files instead.

use indexmap::IndexMap;
use std::path::Path;

use crate::error::{CollectionError, InputError, Result};

const BUNDLED_CODES: &str = include_str!("../../data/country_to_code.json");
const BUNDLED_SOURCES: &str = include_str!("../../data/country_to_mc_sources.json");

/// Country name lookups, in file order.
#[derive(Debug, Clone, Default)]
pub struct CountryCatalog {
    codes: IndexMap<String, String>,
    sources: IndexMap<String, Vec<String>>,
}

impl CountryCatalog {
    /// Catalog built from the bundled data files.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_CODES, BUNDLED_SOURCES)
    }

    /// Parse both mappings from JSON text.
    pub fn from_json(codes_json: &str, sources_json: &str) -> Result<Self> {
        Ok(Self {
            codes: serde_json::from_str(codes_json)?,
            sources: serde_json::from_str(sources_json)?,
        })
    }

    /// Load both mappings from files.
    pub fn from_files(codes_path: &Path, sources_path: &Path) -> Result<Self> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|e| {
                CollectionError::Config(format!("cannot read {}: {}", path.display(), e))
            })
        };
        Self::from_json(&read(codes_path)?, &read(sources_path)?)
    }

    /// Geolocation code for a country name (exact match).
    pub fn geolocation_code(&self, country: &str) -> std::result::Result<&str, InputError> {
        self.codes
            .get(country)
            .map(String::as_str)
            .ok_or_else(|| InputError::UnknownGeolocationCountry(country.to_string()))
    }

    /// Media Cloud outlet domains for a country name (exact match).
    pub fn media_cloud_sources(&self, country: &str) -> std::result::Result<&[String], InputError> {
        self.sources
            .get(country)
            .map(Vec::as_slice)
            .ok_or_else(|| InputError::UnknownMediaCloudCountry(country.to_string()))
    }

    /// Countries usable for geolocation.
    pub fn geolocation_countries(&self) -> Vec<&str> {
        self.codes.keys().map(String::as_str).collect()
    }

    /// Countries that have a Media Cloud collection.
    pub fn media_cloud_countries(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }
}
