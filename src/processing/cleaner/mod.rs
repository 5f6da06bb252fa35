
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::normalizer::normalize;

/// Canonical field names of an event record
pub mod fields {
    pub const ID: &str = "id";
    pub const TITLE: &str = "titre";
    pub const DESCRIPTION: &str = "description";
    pub const LONG_DESCRIPTION: &str = "description_complete";
    pub const KEYWORDS: &str = "mots_cles";
    pub const START_DATE: &str = "date_debut";
    pub const END_DATE: &str = "date_fin";
    pub const LOCATION_NAME: &str = "lieu";
    pub const ADDRESS: &str = "adresse";
    pub const POSTAL_CODE: &str = "code_postal";
    pub const CITY: &str = "ville";
    pub const DEPARTMENT: &str = "departement";
    pub const COORDINATES: &str = "coordonnees_gps";
    pub const URL: &str = "url";
    pub const UPDATED_AT: &str = "date_mise_a_jour";
    pub const CONDITIONS: &str = "conditions";
    pub const SEMANTIC_TEXT: &str = "texte_complet";
}

/// Agenda API column names and the canonical name each one is stored under
pub const API_FIELD_MAP: [(&str, &str); 16] = [
    ("uid", fields::ID),
    ("title_fr", fields::TITLE),
    ("description_fr", fields::DESCRIPTION),
    ("longdescription_fr", fields::LONG_DESCRIPTION),
    ("keywords_fr", fields::KEYWORDS),
    ("firstdate_begin", fields::START_DATE),
    ("lastdate_end", fields::END_DATE),
    ("location_name", fields::LOCATION_NAME),
    ("location_address", fields::ADDRESS),
    ("location_postalcode", fields::POSTAL_CODE),
    ("location_city", fields::CITY),
    ("location_department", fields::DEPARTMENT),
    ("location_coordinates", fields::COORDINATES),
    ("canonicalurl", fields::URL),
    ("updatedat", fields::UPDATED_AT),
    ("conditions_fr", fields::CONDITIONS),
];

/// Fields joined, in this order, into the semantic text
pub const SEMANTIC_FIELDS: [&str; 6] = [
    fields::TITLE,
    fields::DESCRIPTION,
    fields::LONG_DESCRIPTION,
    fields::KEYWORDS,
    fields::LOCATION_NAME,
    fields::CITY,
];

/// Separator placed between the fields of the semantic text
pub const SEMANTIC_SEPARATOR: &str = " . ";

/// An event as delivered by the data source, keyed by canonical field name.
///
/// Every field is optional and may hold any JSON value; accessors fall back to
/// an empty default instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Build a record from an agenda API result, keeping only the known columns
    /// and renaming them to their canonical names
    #[inline]
    pub fn from_api(value: Value) -> Self {
        let Value::Object(mut api_fields) = value else {
            return Self::default();
        };

        let fields = API_FIELD_MAP
            .iter()
            .filter_map(|(api_name, name)| {
                api_fields
                    .remove(*api_name)
                    .map(|value| ((*name).to_string(), value))
            })
            .collect();

        Self(fields)
    }

    /// Non-null value of a field
    #[inline]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|value| !value.is_null())
    }

    /// Whether the record carries a non-null value for the field
    #[inline]
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Field coerced to a string, the empty string when absent or null
    #[inline]
    pub fn text(&self, field: &str) -> String {
        self.get(field).map(value_to_string).unwrap_or_default()
    }

    /// Field coerced to a string, `None` when absent, null or empty
    #[inline]
    pub fn opt_text(&self, field: &str) -> Option<String> {
        Some(self.text(field)).filter(|text| !text.is_empty())
    }

    /// Keyword field flattened into a single `", "` separated string
    #[inline]
    pub fn keywords(&self) -> String {
        match self.get(fields::KEYWORDS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(value_to_string)
                .collect::<Vec<_>>()
                .join(", "),
            Some(other) => value_to_string(other),
            None => String::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawRecord {
    #[inline]
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl From<Value> for RawRecord {
    /// Anything other than a JSON object becomes an empty record
    #[inline]
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::default(),
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// An event whose textual fields have been normalized, with its semantic text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub long_description: String,
    pub keywords: String,
    pub location_name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub department: String,
    pub conditions: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub url: Option<String>,
    pub updated_at: Option<String>,
    pub coordinates: Option<Value>,
    /// Ordered concatenation of the non-empty semantic fields
    pub semantic_text: String,
}

impl CleanedRecord {
    /// Clean a single raw record.
    ///
    /// Returns `None` when nothing usable is left for the semantic text.
    #[inline]
    pub fn from_raw(raw: &RawRecord) -> Option<Self> {
        let mut record = Self {
            id: raw.opt_text(fields::ID),
            title: normalize(&raw.text(fields::TITLE)),
            description: normalize(&raw.text(fields::DESCRIPTION)),
            long_description: normalize(&raw.text(fields::LONG_DESCRIPTION)),
            keywords: normalize(&raw.keywords()),
            location_name: normalize(&raw.text(fields::LOCATION_NAME)),
            address: normalize(&raw.text(fields::ADDRESS)),
            postal_code: normalize(&raw.text(fields::POSTAL_CODE)),
            city: normalize(&raw.text(fields::CITY)),
            department: normalize(&raw.text(fields::DEPARTMENT)),
            conditions: normalize(&raw.text(fields::CONDITIONS)),
            start_date: raw.opt_text(fields::START_DATE),
            end_date: raw.opt_text(fields::END_DATE),
            url: raw.opt_text(fields::URL),
            updated_at: raw.opt_text(fields::UPDATED_AT),
            coordinates: raw.get(fields::COORDINATES).cloned(),
            semantic_text: String::new(),
        };

        record.semantic_text = record.build_semantic_text();
        if record.semantic_text.is_empty() {
            return None;
        }
        Some(record)
    }

    /// Cleaned value of a semantic field, by canonical name
    #[inline]
    pub fn semantic_field(&self, field: &str) -> &str {
        match field {
            fields::TITLE => &self.title,
            fields::DESCRIPTION => &self.description,
            fields::LONG_DESCRIPTION => &self.long_description,
            fields::KEYWORDS => &self.keywords,
            fields::LOCATION_NAME => &self.location_name,
            fields::CITY => &self.city,
            _ => "",
        }
    }

    fn build_semantic_text(&self) -> String {
        SEMANTIC_FIELDS
            .iter()
            .map(|field| self.semantic_field(field))
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join(SEMANTIC_SEPARATOR)
    }
}

/// Clean a batch of raw records, dropping those without usable text.
///
/// Surviving records keep their relative input order.
#[inline]
pub fn clean_records(records: &[RawRecord]) -> Vec<CleanedRecord> {
    info!("Cleaning {} raw records", records.len());

    let cleaned: Vec<CleanedRecord> = records.iter().filter_map(CleanedRecord::from_raw).collect();

    let dropped = records.len() - cleaned.len();
    if dropped > 0 {
        debug!("Dropped {} records with no usable text", dropped);
    }
    info!("Cleaning produced {} records", cleaned.len());

    cleaned
}
