//! Normalisation of the hub's JSON search envelope into [`CatalogRecord`]s.
//!
//! The hub serialises its Atom feed loosely: `feed.entry` is an object when
//! exactly one product matches and an array otherwise, and the same holds for
//! each typed attribute container (`str`, `int`, `double`, `date`) inside an
//! entry. Attribute values are always transported as `{name, content}` pairs
//! with a string `content`, which is routed here into typed fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::Result;

/// A JSON value that may be a single item or an array of items.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(item) => vec![item],
        }
    }
}

fn flatten<T>(value: Option<OneOrMany<T>>) -> Vec<T> {
    value.map(OneOrMany::into_vec).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    feed: Feed,
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default, rename = "opensearch:totalResults")]
    total_results: Value,
    #[serde(default, rename = "opensearch:startIndex")]
    start_index: Value,
    #[serde(default, rename = "opensearch:itemsPerPage")]
    items_per_page: Value,
    #[serde(default)]
    entry: Option<OneOrMany<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    link: Option<OneOrMany<Link>>,
    #[serde(default)]
    ondemand: Value,
    #[serde(default, rename = "str")]
    strings: Option<OneOrMany<TypedAttribute>>,
    #[serde(default, rename = "int")]
    ints: Option<OneOrMany<TypedAttribute>>,
    #[serde(default, rename = "double")]
    doubles: Option<OneOrMany<TypedAttribute>>,
    #[serde(default, rename = "date")]
    dates: Option<OneOrMany<TypedAttribute>>,
}

#[derive(Debug, Deserialize)]
struct TypedAttribute {
    #[serde(default)]
    name: String,
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub rel: Option<String>,
    #[serde(default)]
    pub href: String,
}

/// One catalog product.
///
/// Fields are filled only from attributes present in the payload; anything
/// the hub omitted (or sent in an unparsable form) keeps its zero value:
/// empty string, `0`, `0.0` or `None` for timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogRecord {
    /// Opaque product identifier, the key for downloads.
    pub id: String,
    pub title: String,
    pub summary: String,
    pub links: Vec<Link>,
    pub on_demand: bool,

    pub sensor_operational_mode: String,
    pub gml_footprint: String,
    /// Footprint as WKT.
    pub footprint: String,
    pub tile_id: String,
    pub hv_order_tile_id: String,
    pub format: String,
    pub processing_baseline: String,
    pub platform_name: String,
    pub filename: String,
    pub instrument_name: String,
    pub instrument_short_name: String,
    /// Human readable size as reported by the hub, e.g. `1.09 GB`.
    pub size: String,
    pub s2_datatake_id: String,
    pub product_type: String,
    pub platform_identifier: String,
    pub level1c_pdi_identifier: String,
    pub orbit_direction: String,
    pub platform_serial_identifier: String,
    pub processing_level: String,
    pub datastrip_identifier: String,
    pub granule_identifier: String,
    pub identifier: String,
    pub uuid: String,

    pub orbit_number: i64,
    pub relative_orbit_number: i64,

    pub cloud_cover_percentage: f64,
    pub illumination_azimuth_angle: f64,
    pub illumination_zenith_angle: f64,
    pub vegetation_percentage: f64,
    pub not_vegetated_percentage: f64,
    pub water_percentage: f64,
    pub unclassified_percentage: f64,
    pub medium_proba_clouds_percentage: f64,
    pub high_proba_clouds_percentage: f64,
    pub snow_ice_percentage: f64,

    pub datatake_sensing_start: Option<DateTime<Utc>>,
    pub generation_date: Option<DateTime<Utc>>,
    pub begin_position: Option<DateTime<Utc>>,
    pub end_position: Option<DateTime<Utc>>,
    pub ingestion_date: Option<DateTime<Utc>>,
}

impl CatalogRecord {
    fn set_string(&mut self, name: &str, content: String) {
        let slot = match name {
            "sensoroperationalmode" => &mut self.sensor_operational_mode,
            "gmlfootprint" => &mut self.gml_footprint,
            "footprint" => &mut self.footprint,
            "tileid" => &mut self.tile_id,
            "hv_order_tileid" => &mut self.hv_order_tile_id,
            "format" => &mut self.format,
            "processingbaseline" => &mut self.processing_baseline,
            "platformname" => &mut self.platform_name,
            "filename" => &mut self.filename,
            "instrumentname" => &mut self.instrument_name,
            "instrumentshortname" => &mut self.instrument_short_name,
            "size" => &mut self.size,
            "s2datatakeid" => &mut self.s2_datatake_id,
            "producttype" => &mut self.product_type,
            "platformidentifier" => &mut self.platform_identifier,
            "level1cpdiidentifier" => &mut self.level1c_pdi_identifier,
            "orbitdirection" => &mut self.orbit_direction,
            "platformserialidentifier" => &mut self.platform_serial_identifier,
            "processinglevel" => &mut self.processing_level,
            "datastripidentifier" => &mut self.datastrip_identifier,
            "granuleidentifier" => &mut self.granule_identifier,
            "identifier" => &mut self.identifier,
            "uuid" => &mut self.uuid,
            _ => return,
        };
        *slot = content;
    }

    fn set_int(&mut self, name: &str, content: &str) {
        let slot = match name {
            "orbitnumber" => &mut self.orbit_number,
            "relativeorbitnumber" => &mut self.relative_orbit_number,
            _ => return,
        };
        match content.trim().parse::<i64>() {
            Ok(v) => *slot = v,
            Err(_) => warn!(field = name, content, "ignoring unparsable integer attribute"),
        }
    }

    fn set_double(&mut self, name: &str, content: &str) {
        let slot = match name {
            "cloudcoverpercentage" => &mut self.cloud_cover_percentage,
            "illuminationazimuthangle" => &mut self.illumination_azimuth_angle,
            "illuminationzenithangle" => &mut self.illumination_zenith_angle,
            "vegetationpercentage" => &mut self.vegetation_percentage,
            "notvegetatedpercentage" => &mut self.not_vegetated_percentage,
            "waterpercentage" => &mut self.water_percentage,
            "unclassifiedpercentage" => &mut self.unclassified_percentage,
            "mediumprobacloudspercentage" => &mut self.medium_proba_clouds_percentage,
            "highprobacloudspercentage" => &mut self.high_proba_clouds_percentage,
            "snowicepercentage" => &mut self.snow_ice_percentage,
            _ => return,
        };
        match content.trim().parse::<f64>() {
            Ok(v) => *slot = v,
            Err(_) => warn!(field = name, content, "ignoring unparsable float attribute"),
        }
    }

    fn set_date(&mut self, name: &str, content: &str) {
        let slot = match name {
            "datatakesensingstart" => &mut self.datatake_sensing_start,
            "generationdate" => &mut self.generation_date,
            "beginposition" => &mut self.begin_position,
            "endposition" => &mut self.end_position,
            "ingestiondate" => &mut self.ingestion_date,
            _ => return,
        };
        match DateTime::parse_from_rfc3339(content.trim()) {
            Ok(v) => *slot = Some(v.with_timezone(&Utc)),
            Err(_) => warn!(field = name, content, "ignoring unparsable date attribute"),
        }
    }
}

/// One decoded page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Size of the whole result set as declared by the hub.
    pub total_results: usize,
    pub start_index: usize,
    pub items_per_page: usize,
    /// Records in the order the hub returned them.
    pub records: Vec<CatalogRecord>,
}

/// Decodes one raw search response body.
///
/// A body that is not the expected envelope is an error; individual scalar
/// attributes that fail to convert are skipped with a warning.
pub fn normalize_page(body: &[u8]) -> Result<SearchPage> {
    let envelope: SearchEnvelope = serde_json::from_slice(body)?;
    let feed = envelope.feed;

    let records = flatten(feed.entry).into_iter().map(normalize_entry).collect();

    Ok(SearchPage {
        total_results: count(&feed.total_results),
        start_index: count(&feed.start_index),
        items_per_page: count(&feed.items_per_page),
        records,
    })
}

fn normalize_entry(raw: RawEntry) -> CatalogRecord {
    let mut record = CatalogRecord {
        id: raw.id,
        title: raw.title,
        summary: raw.summary,
        links: flatten(raw.link),
        on_demand: text(&raw.ondemand).is_some_and(|v| v.eq_ignore_ascii_case("true")),
        ..CatalogRecord::default()
    };

    for attr in flatten(raw.strings) {
        if let Some(content) = text(&attr.content) {
            record.set_string(&attr.name, content);
        }
    }
    for attr in flatten(raw.ints) {
        if let Some(content) = text(&attr.content) {
            record.set_int(&attr.name, &content);
        }
    }
    for attr in flatten(raw.doubles) {
        if let Some(content) = text(&attr.content) {
            record.set_double(&attr.name, &content);
        }
    }
    for attr in flatten(raw.dates) {
        if let Some(content) = text(&attr.content) {
            record.set_date(&attr.name, &content);
        }
    }

    record
}

/// String form of a scalar JSON value; the hub usually quotes numbers.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn count(value: &Value) -> usize {
    text(value)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_default()
}
