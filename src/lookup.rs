use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::table_id::TableId;

fn default_eu_alias() -> String {
    "EU".to_string()
}

/// On-disk form of the static dictionaries the dashboard ships with.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LookupDocument {
    /// Display name -> two-letter code.
    pub countries: BTreeMap<String, String>,
    /// Name of the pseudo-country standing for the EU aggregate.
    #[serde(default = "default_eu_alias")]
    pub eu_alias: String,
    pub eu_codes: Vec<String>,
    /// Point id -> display name.
    pub points: BTreeMap<String, String>,
    /// Point-type short code -> long name (may hold several `/`-separated names).
    pub point_types: BTreeMap<String, String>,
    pub supply_point_types: Vec<String>,
    #[serde(default)]
    pub consumer_point_types: Vec<String>,
    #[serde(default)]
    pub lng_point_types: Vec<String>,
    /// Every known table identifier.
    pub tables: Vec<String>,
    /// Country name -> category -> table identifiers.
    #[serde(default)]
    pub consumer_categories: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// Aggregate exporter selections with a precomputed table list.
    #[serde(default)]
    pub group_export: BTreeMap<String, Vec<String>>,
}

/// Lookup/config provider: resolved dictionaries plus the parsed catalog.
#[derive(Debug, Clone)]
pub struct Lookup {
    name_to_code: HashMap<String, String>,
    code_to_name: HashMap<String, String>,
    eu_alias: String,
    eu_codes: HashSet<String>,
    point_names: HashMap<String, String>,
    point_ids: HashMap<String, String>,
    point_types: HashMap<String, String>,
    supply_types: HashSet<String>,
    consumer_types: HashSet<String>,
    lng_types: HashSet<String>,
    catalog: Vec<TableId>,
    consumer_categories: HashMap<String, BTreeMap<String, Vec<TableId>>>,
    group_export: HashMap<String, Vec<TableId>>,
}

fn parse_tables(raw: &[String]) -> Result<Vec<TableId>, FlowError> {
    raw.iter().map(|t| t.parse()).collect()
}

impl Lookup {
    pub fn from_document(doc: LookupDocument) -> Result<Self, FlowError> {
        let mut code_to_name = HashMap::new();
        for (name, code) in &doc.countries {
            code_to_name
                .entry(code.clone())
                .or_insert_with(|| name.clone());
        }

        let point_ids = doc
            .points
            .iter()
            .map(|(id, name)| (name.clone(), id.clone()))
            .collect();

        let catalog = parse_tables(&doc.tables)?;

        let mut consumer_categories = HashMap::new();
        for (country, categories) in &doc.consumer_categories {
            let mut parsed = BTreeMap::new();
            for (category, tables) in categories {
                parsed.insert(category.clone(), parse_tables(tables)?);
            }
            consumer_categories.insert(country.clone(), parsed);
        }

        let mut group_export = HashMap::new();
        for (name, tables) in &doc.group_export {
            group_export.insert(name.clone(), parse_tables(tables)?);
        }

        Ok(Lookup {
            name_to_code: doc.countries.into_iter().collect(),
            code_to_name,
            eu_alias: doc.eu_alias,
            eu_codes: doc.eu_codes.into_iter().collect(),
            point_names: doc.points.into_iter().collect(),
            point_ids,
            point_types: doc.point_types.into_iter().collect(),
            supply_types: doc.supply_point_types.into_iter().collect(),
            consumer_types: doc.consumer_point_types.into_iter().collect(),
            lng_types: doc.lng_point_types.into_iter().collect(),
            catalog,
            consumer_categories,
            group_export,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, FlowError> {
        let doc: LookupDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    // ── Dictionaries ────────────────────────────────────────────────────────

    pub fn country_code(&self, name: &str) -> Result<&str, FlowError> {
        self.name_to_code
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| FlowError::lookup("country", name))
    }

    pub fn country_name(&self, code: &str) -> Result<&str, FlowError> {
        self.code_to_name
            .get(code)
            .map(String::as_str)
            .ok_or_else(|| FlowError::lookup("country code", code))
    }

    pub fn point_name(&self, id: &str) -> Result<&str, FlowError> {
        self.point_names
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| FlowError::lookup("point id", id))
    }

    pub fn point_id(&self, name: &str) -> Result<&str, FlowError> {
        self.point_ids
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| FlowError::lookup("point", name))
    }

    pub fn point_type_name(&self, short: &str) -> Result<&str, FlowError> {
        self.point_types
            .get(short)
            .map(String::as_str)
            .ok_or_else(|| FlowError::lookup("point type", short))
    }

    // ── EU aggregate ────────────────────────────────────────────────────────

    pub fn eu_alias(&self) -> &str {
        &self.eu_alias
    }

    pub fn is_eu_alias(&self, name: &str) -> bool {
        name == self.eu_alias
    }

    pub fn eu_member_codes(&self) -> &HashSet<String> {
        &self.eu_codes
    }

    pub fn is_eu_member(&self, code: &str) -> bool {
        self.eu_codes.contains(code)
    }

    // ── Point-type sets ─────────────────────────────────────────────────────

    pub fn supply_point_types(&self) -> &HashSet<String> {
        &self.supply_types
    }

    pub fn consumer_point_types(&self) -> &HashSet<String> {
        &self.consumer_types
    }

    pub fn lng_point_types(&self) -> &HashSet<String> {
        &self.lng_types
    }

    // ── Catalog ─────────────────────────────────────────────────────────────

    pub fn all_table_identifiers(&self) -> &[TableId] {
        &self.catalog
    }

    pub fn consumer_categories(&self, country: &str) -> Option<&BTreeMap<String, Vec<TableId>>> {
        self.consumer_categories.get(country)
    }

    pub fn group_export_override(&self, name: &str) -> Option<&[TableId]> {
        self.group_export.get(name).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> LookupDocument {
        LookupDocument {
            countries: [("Russia", "RU"), ("Germany", "DE")]
                .into_iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
            eu_alias: "EU".into(),
            eu_codes: vec!["DE".into()],
            points: [("P1".to_string(), "Greifswald".to_string())].into(),
            point_types: [("CTWIT".to_string(), "Cross-Border IP/Transmission".to_string())]
                .into(),
            supply_point_types: vec!["CTWIT".into()],
            tables: vec!["RU_DE_CTWIT_ex_P1".into()],
            ..Default::default()
        }
    }

    #[test]
    fn resolves_both_directions() {
        let lookup = Lookup::from_document(doc()).unwrap();
        assert_eq!(lookup.country_code("Russia").unwrap(), "RU");
        assert_eq!(lookup.country_name("DE").unwrap(), "Germany");
        assert_eq!(lookup.point_id("Greifswald").unwrap(), "P1");
        assert_eq!(lookup.all_table_identifiers().len(), 1);
        assert!(lookup.is_eu_member("DE"));
    }

    #[test]
    fn unknown_name_is_lookup_error() {
        let lookup = Lookup::from_document(doc()).unwrap();
        let err = lookup.country_code("Atlantis").unwrap_err();
        assert!(matches!(err, FlowError::Lookup { kind: "country", .. }));
    }

    #[test]
    fn bad_catalog_entry_fails_load() {
        let mut d = doc();
        d.tables.push("garbage".into());
        assert!(matches!(
            Lookup::from_document(d),
            Err(FlowError::InvalidTableId(_))
        ));
    }

    #[test]
    fn loads_from_json() {
        let json = r#"{
            "countries": {"Norway": "NO"},
            "eu_codes": [],
            "points": {},
            "point_types": {},
            "supply_point_types": [],
            "tables": ["NO_DE_CTWIT_ex_X9"]
        }"#;
        let lookup = Lookup::from_json_str(json).unwrap();
        assert_eq!(lookup.eu_alias(), "EU");
        assert_eq!(lookup.all_table_identifiers()[0].exporter(), "NO");
    }
}
