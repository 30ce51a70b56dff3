//! Translation of structured search criteria into the hub's query language.
//!
//! A query is a list of field groups joined by `AND`. Every multi-value field
//! becomes one parenthesised `OR` group, the sensing window is always present
//! and the footprint is a single quoted spatial predicate:
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use scihub::{Platform, SearchCriteria, build_query};
//!
//! let criteria = SearchCriteria::new(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap())
//!     .with_platform(Platform::Sentinel2)
//!     .with_tile("36UYA");
//! assert_eq!(
//!     build_query(&criteria).unwrap(),
//!     "(platformname:'Sentinel-2') AND (tileid:36UYA) AND beginposition:[2022-01-01T00:00:00.000Z TO NOW]"
//! );
//! ```

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    Sentinel1,
    Sentinel2,
    Sentinel3,
    Sentinel5Precursor,
    /// Any platform name the hub knows but this crate does not list.
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::Sentinel1 => "Sentinel-1",
            Platform::Sentinel2 => "Sentinel-2",
            Platform::Sentinel3 => "Sentinel-3",
            Platform::Sentinel5Precursor => "Sentinel-5 Precursor",
            Platform::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Platform {
    fn from(name: &str) -> Self {
        match name {
            "Sentinel-1" => Platform::Sentinel1,
            "Sentinel-2" => Platform::Sentinel2,
            "Sentinel-3" => Platform::Sentinel3,
            "Sentinel-5 Precursor" => Platform::Sentinel5Precursor,
            other => Platform::Other(other.to_string()),
        }
    }
}

/// How the product footprint must relate to the search polygon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SpatialRelation {
    #[default]
    Intersects,
    Contains,
    IsWithin,
}

impl SpatialRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            SpatialRelation::Intersects => "Intersects",
            SpatialRelation::Contains => "Contains",
            SpatialRelation::IsWithin => "IsWithin",
        }
    }
}

impl fmt::Display for SpatialRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpatialRelation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            SpatialRelation::Intersects,
            SpatialRelation::Contains,
            SpatialRelation::IsWithin,
        ]
        .into_iter()
        .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| Error::InvalidCriteria(format!("incorrect AOI relation provided: {}", s)))
    }
}

/// Area of interest as a WKT polygon plus the relation to test against it.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub wkt: String,
    pub relation: SpatialRelation,
}

impl Footprint {
    pub fn new(wkt: impl Into<String>, relation: SpatialRelation) -> Self {
        Self {
            wkt: wkt.into(),
            relation,
        }
    }

    /// Builds a footprint from a relation name as users type it (`intersects`, `IsWithin`, ...).
    pub fn parse(wkt: impl Into<String>, relation: &str) -> Result<Self> {
        Ok(Self::new(wkt, relation.parse()?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub platforms: Vec<Platform>,
    pub tile_ids: Vec<String>,
    pub filenames: Vec<String>,
    pub product_types: Vec<String>,
    pub footprint: Option<Footprint>,
    /// Start of the sensing window.
    pub begin: DateTime<Utc>,
    /// End of the sensing window; `None` means "now".
    pub end: Option<DateTime<Utc>>,
    /// Range expressions such as `[0 TO 30]`.
    pub cloud_cover: Vec<String>,
}

impl SearchCriteria {
    pub fn new(begin: DateTime<Utc>) -> Self {
        Self {
            platforms: Vec::new(),
            tile_ids: Vec::new(),
            filenames: Vec::new(),
            product_types: Vec::new(),
            footprint: None,
            begin,
            end: None,
            cloud_cover: Vec::new(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platforms.push(platform);
        self
    }

    pub fn with_tile(mut self, tile_id: impl Into<String>) -> Self {
        self.tile_ids.push(tile_id.into());
        self
    }

    /// Filename pattern; the hub accepts `*` wildcards.
    pub fn with_filename(mut self, pattern: impl Into<String>) -> Self {
        self.filenames.push(pattern.into());
        self
    }

    pub fn with_product_type(mut self, product_type: impl Into<String>) -> Self {
        self.product_types.push(product_type.into());
        self
    }

    pub fn with_footprint(mut self, footprint: Footprint) -> Self {
        self.footprint = Some(footprint);
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_cloud_cover(mut self, expression: impl Into<String>) -> Self {
        self.cloud_cover.push(expression.into());
        self
    }

    pub fn with_max_cloud_cover(self, max_percent: u8) -> Self {
        self.with_cloud_cover(format!("[0 TO {}]", max_percent))
    }
}

/// Renders the criteria as an unencoded query string.
pub fn build_query(criteria: &SearchCriteria) -> Result<String> {
    if let Some(end) = criteria.end {
        if end < criteria.begin {
            return Err(Error::InvalidCriteria(format!(
                "end of sensing window {} precedes its begin {}",
                end.format(TIMESTAMP_FORMAT),
                criteria.begin.format(TIMESTAMP_FORMAT)
            )));
        }
    }

    let mut groups = Vec::new();

    let platforms: Vec<String> = criteria
        .platforms
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    push_group(&mut groups, "platformname", &platforms, |v| format!("'{}'", v))?;
    push_group(&mut groups, "tileid", &criteria.tile_ids, str::to_string)?;
    push_group(&mut groups, "filename", &criteria.filenames, str::to_string)?;
    push_group(&mut groups, "producttype", &criteria.product_types, str::to_string)?;

    let end = criteria
        .end
        .map(|e| e.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "NOW".to_string());
    groups.push(format!(
        "beginposition:[{} TO {}]",
        criteria.begin.format(TIMESTAMP_FORMAT),
        end
    ));

    if let Some(footprint) = &criteria.footprint {
        let wkt = footprint.wkt.trim();
        if wkt.is_empty() {
            return Err(Error::InvalidCriteria("footprint polygon is empty".into()));
        }
        groups.push(format!("footprint:\"{}({})\"", footprint.relation, wkt));
    }

    push_group(
        &mut groups,
        "cloudcoverpercentage",
        &criteria.cloud_cover,
        str::to_string,
    )?;

    Ok(groups.join(" AND "))
}

/// Full query component for the search endpoint: `q` is percent-encoded once,
/// after assembly, followed by the paging parameters.
pub fn encoded_query(criteria: &SearchCriteria, rows: usize) -> Result<String> {
    let raw = build_query(criteria)?;
    let q: String = url::form_urlencoded::byte_serialize(raw.as_bytes()).collect();
    Ok(format!("q={}&format=json&rows={}", q, rows))
}

fn push_group<F>(groups: &mut Vec<String>, field: &str, values: &[String], render: F) -> Result<()>
where
    F: Fn(&str) -> String,
{
    if values.is_empty() {
        return Ok(());
    }
    let mut terms = Vec::with_capacity(values.len());
    for v in values {
        let v = v.trim();
        if v.is_empty() {
            return Err(Error::InvalidCriteria(format!("empty value for {}", field)));
        }
        terms.push(format!("{}:{}", field, render(v)));
    }
    groups.push(format!("({})", terms.join(" OR ")));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn begin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn empty_criteria_is_date_bounded() {
        let q = build_query(&SearchCriteria::new(begin())).unwrap();
        assert_eq!(q, "beginposition:[2022-01-01T00:00:00.000Z TO NOW]");
    }

    #[test]
    fn groups_follow_declaration_order() {
        let end = Utc.with_ymd_and_hms(2022, 3, 1, 12, 30, 15).unwrap();
        let criteria = SearchCriteria::new(begin())
            .with_max_cloud_cover(30)
            .with_footprint(Footprint::new("POLYGON((0 0,1 0,1 1,0 0))", SpatialRelation::Contains))
            .with_product_type("S2MSI2A")
            .with_product_type("S2MS2Ap")
            .with_filename("*36UYA*")
            .with_tile("36UYA")
            .with_platform(Platform::Sentinel2)
            .with_end(end);

        assert_eq!(
            build_query(&criteria).unwrap(),
            "(platformname:'Sentinel-2') AND (tileid:36UYA) AND (filename:*36UYA*) AND \
             (producttype:S2MSI2A OR producttype:S2MS2Ap) AND \
             beginposition:[2022-01-01T00:00:00.000Z TO 2022-03-01T12:30:15.000Z] AND \
             footprint:\"Contains(POLYGON((0 0,1 0,1 1,0 0)))\" AND \
             (cloudcoverpercentage:[0 TO 30])"
        );
    }

    #[test]
    fn one_or_group_per_populated_field() {
        let criteria = SearchCriteria::new(begin())
            .with_tile("A")
            .with_tile("B")
            .with_tile("C")
            .with_product_type("S2MSI1C");
        let q = build_query(&criteria).unwrap();
        let parts: Vec<&str> = q.split(" AND ").collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "(tileid:A OR tileid:B OR tileid:C)");
        assert_eq!(q.matches("beginposition:").count(), 1);
    }

    #[test]
    fn relation_parsing() {
        assert_eq!("intersects".parse::<SpatialRelation>().unwrap(), SpatialRelation::Intersects);
        assert_eq!("ISWITHIN".parse::<SpatialRelation>().unwrap(), SpatialRelation::IsWithin);
        let err = Footprint::parse("POLYGON((0 0,1 1,0 0))", "Overlaps").unwrap_err();
        assert!(matches!(err, Error::InvalidCriteria(_)));
        assert!(err.to_string().contains("Overlaps"));
    }

    #[test]
    fn empty_footprint_and_values_are_rejected() {
        let criteria = SearchCriteria::new(begin()).with_footprint(Footprint::new("  ", SpatialRelation::Intersects));
        assert!(matches!(build_query(&criteria), Err(Error::InvalidCriteria(_))));

        let criteria = SearchCriteria::new(begin()).with_tile("");
        assert!(matches!(build_query(&criteria), Err(Error::InvalidCriteria(_))));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let criteria = SearchCriteria::new(begin()).with_end(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        assert!(matches!(build_query(&criteria), Err(Error::InvalidCriteria(_))));
    }

    #[test]
    fn encoding_happens_once_after_assembly() {
        let criteria = SearchCriteria::new(begin())
            .with_platform(Platform::Sentinel5Precursor)
            .with_tile("36UYA");
        let q = encoded_query(&criteria, 50).unwrap();
        assert!(q.starts_with("q=%28platformname%3A%27Sentinel-5+Precursor%27%29+AND+%28tileid%3A36UYA%29"));
        assert!(q.ends_with("&format=json&rows=50"));
        assert!(!q.contains("%25"));
    }

    #[test]
    fn platform_names_round_trip() {
        assert_eq!(Platform::from("Sentinel-1"), Platform::Sentinel1);
        assert_eq!(Platform::from("Landsat-8"), Platform::Other("Landsat-8".into()));
        assert_eq!(Platform::Sentinel5Precursor.to_string(), "Sentinel-5 Precursor");
    }
}
