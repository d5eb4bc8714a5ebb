use crate::decoder::Encoding;
use crate::octree::aabb::{Aabb, ConformingExtent};
use crate::octree::point_attributes::{Attribute, AttributeDataType, AttributeSchema};
use crate::octree::statistics::{
    AttributeStatistics, ClassificationHistogram, HistogramMap, StatisticsMap,
};
use glam::DVec3;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, span, Level};

/// The only hierarchy page format this reader understands.
pub const HIERARCHY_TYPE_JSON: &str = "json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field `{0}`")]
    MissingField(String),

    #[error("Unsupported point data encoding `{0}`")]
    UnsupportedEncoding(String),

    #[error("Unsupported hierarchy format `{0}`")]
    UnsupportedHierarchyFormat(String),

    #[error("`{field}` must hold 6 numbers, found {len}")]
    MalformedBounds { field: &'static str, len: usize },

    #[error("Attribute `{name}` has unsupported type `{type_tag}` of size {size}")]
    UnsupportedAttributeType {
        name: String,
        type_tag: String,
        size: u64,
    },

    #[error("Attribute `{0}` is declared twice")]
    DuplicateAttribute(String),

    #[error("Invalid `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    version: Option<String>,
    data_type: Option<String>,
    hierarchy_type: Option<String>,
    span: Option<u64>,
    points: Option<u64>,
    srs: Option<RawSrs>,
    bounds: Option<Vec<f64>>,
    bounds_conforming: Option<Vec<f64>>,
    schema: Option<Vec<RawAttribute>>,
}

#[derive(Deserialize, Debug, Default)]
struct RawSrs {
    wkt: Option<String>,
    authority: Option<String>,
    horizontal: Option<String>,
    vertical: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawAttribute {
    name: Option<String>,
    r#type: Option<String>,
    size: Option<u64>,
    scale: Option<f64>,
    offset: Option<f64>,
    count: Option<i64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    mean: Option<f64>,
    stddev: Option<f64>,
    variance: Option<f64>,
    counts: Option<Vec<RawClassCount>>,
}

#[derive(Deserialize, Debug)]
struct RawClassCount {
    value: Option<i64>,
    count: Option<i64>,
}

/// Coordinate reference system as declared by the dataset. Every part may be
/// empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrsDefinition {
    pub wkt: String,
    pub authority: Option<String>,
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
}

impl CrsDefinition {
    pub fn is_empty(&self) -> bool {
        self.wkt.is_empty() && self.authority.is_none() && self.horizontal.is_none()
    }
}

/// Per axis `real = offset + scale * stored`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleOffset {
    pub scale: DVec3,
    pub offset: DVec3,
}

impl Default for ScaleOffset {
    fn default() -> Self {
        Self {
            scale: DVec3::ONE,
            offset: DVec3::ZERO,
        }
    }
}

impl ScaleOffset {
    pub fn to_real(&self, stored: DVec3) -> DVec3 {
        self.offset + self.scale * stored
    }

    pub fn to_stored(&self, real: DVec3) -> DVec3 {
        (real - self.offset) / self.scale
    }
}

/// Everything `ept.json` declares, validated.
#[derive(Clone, Debug)]
pub struct Manifest {
    pub version: Option<String>,
    pub encoding: Encoding,
    pub span: u64,
    pub points: u64,
    pub crs: CrsDefinition,
    /// Root cube in real world units, as written in `bounds`.
    pub root_bounds: Aabb,
    /// Root cube in stored units.
    pub data_bounds: Aabb,
    pub extent: ConformingExtent,
    pub scale_offset: ScaleOffset,
    pub schema: AttributeSchema,
    pub statistics: StatisticsMap,
    pub histograms: HistogramMap,
}

impl Manifest {
    pub fn root_edge_lengths(&self) -> DVec3 {
        self.data_bounds.size()
    }
}

/// Parses and validates a manifest. Nothing is returned unless every check
/// passes.
pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    let raw: RawManifest = serde_json::from_slice(bytes)?;
    let _span = span!(Level::DEBUG, "parse_manifest").entered();

    let data_type = required(raw.data_type, "dataType")?;
    let encoding = data_type
        .parse::<Encoding>()
        .map_err(|_| ManifestError::UnsupportedEncoding(data_type.clone()))?;

    let hierarchy_type = required(raw.hierarchy_type, "hierarchyType")?;
    if hierarchy_type != HIERARCHY_TYPE_JSON {
        return Err(ManifestError::UnsupportedHierarchyFormat(hierarchy_type));
    }

    let span = required(raw.span, "span")?;
    if span == 0 {
        return Err(ManifestError::InvalidField {
            field: "span".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    let points = required(raw.points, "points")?;

    let srs = raw.srs.unwrap_or_default();
    let crs = CrsDefinition {
        wkt: srs.wkt.unwrap_or_default(),
        authority: srs.authority,
        horizontal: srs.horizontal,
        vertical: srs.vertical,
    };

    let bounds = six_numbers(required(raw.bounds, "bounds")?, "bounds")?;
    let bounds_conforming = six_numbers(
        required(raw.bounds_conforming, "boundsConforming")?,
        "boundsConforming",
    )?;

    let raw_schema = required(raw.schema, "schema")?;
    let mut attributes = Vec::with_capacity(raw_schema.len());
    let mut scale_offset = ScaleOffset::default();
    let mut statistics = StatisticsMap::new();
    let mut histograms = HistogramMap::new();

    for (index, entry) in raw_schema.into_iter().enumerate() {
        let name = required(entry.name, &format!("schema[{index}].name"))?;
        let type_tag = required(entry.r#type, &format!("schema[{index}].type"))?;
        let size = required(entry.size, &format!("schema[{index}].size"))?;

        let data_type = AttributeDataType::from_manifest(&type_tag, size).ok_or_else(|| {
            ManifestError::UnsupportedAttributeType {
                name: name.clone(),
                type_tag: type_tag.clone(),
                size,
            }
        })?;

        let axis = match name.as_str() {
            "X" => Some(0),
            "Y" => Some(1),
            "Z" => Some(2),
            _ => None,
        };
        if let Some(axis) = axis {
            let scale = entry.scale.unwrap_or(1.0);
            if scale == 0.0 || !scale.is_finite() {
                return Err(ManifestError::InvalidField {
                    field: format!("{name}.scale"),
                    reason: format!("{scale} is not a usable scale"),
                });
            }
            scale_offset.scale[axis] = scale;
            scale_offset.offset[axis] = entry.offset.unwrap_or(0.0);
        }

        let stats = AttributeStatistics {
            count: entry.count,
            minimum: entry.minimum,
            maximum: entry.maximum,
            mean: entry.mean,
            std_dev: entry.stddev,
            variance: entry.variance,
        };
        if !stats.is_empty() {
            statistics.insert(name.clone(), stats);
        }

        if let Some(counts) = entry.counts {
            let mut histogram = ClassificationHistogram::new();
            for (position, class) in counts.into_iter().enumerate() {
                let value = required(class.value, &format!("{name}.counts[{position}].value"))?;
                let count = required(class.count, &format!("{name}.counts[{position}].count"))?;
                let total = histogram.entry(value).or_insert(0);
                *total = total.checked_add(count).ok_or_else(|| ManifestError::InvalidField {
                    field: format!("{name}.counts[{position}].count"),
                    reason: format!("total for class {value} overflows"),
                })?;
            }
            histograms.insert(name.clone(), histogram);
        }

        debug!(attribute = %name, %data_type, "schema attribute");
        attributes.push(Attribute::new(name, data_type));
    }

    let schema = AttributeSchema::new(attributes).map_err(ManifestError::DuplicateAttribute)?;

    let root_bounds = Aabb::from_array(bounds);
    let data_bounds = Aabb::new(
        scale_offset.to_stored(root_bounds.min),
        scale_offset.to_stored(root_bounds.max),
    );

    Ok(Manifest {
        version: raw.version,
        encoding,
        span,
        points,
        crs,
        root_bounds,
        data_bounds,
        extent: ConformingExtent::from_array(bounds_conforming),
        scale_offset,
        schema,
        statistics,
        histograms,
    })
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ManifestError> {
    value.ok_or_else(|| ManifestError::MissingField(field.to_string()))
}

fn six_numbers(values: Vec<f64>, field: &'static str) -> Result<[f64; 6], ManifestError> {
    let len = values.len();
    values
        .try_into()
        .map_err(|_| ManifestError::MalformedBounds { field, len })
}
