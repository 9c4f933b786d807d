//! Table selection: resolve a filter combination into the catalog tables
//! that hold the matching flows.
//!
//! Every function here is pure over the [`Lookup`] catalog. Results keep
//! catalog order and never repeat an identifier.

use std::collections::{BTreeSet, HashSet};

use crate::error::FlowError;
use crate::lookup::Lookup;
use crate::table_id::TableId;

/// Which family of flow points a view works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Cross-border supply between two different countries.
    Supply,
    /// Domestic consumer points.
    Demand,
    /// Domestic LNG terminals.
    Lng,
}

impl FlowKind {
    pub fn point_types<'a>(&self, lookup: &'a Lookup) -> &'a HashSet<String> {
        match self {
            FlowKind::Supply => lookup.supply_point_types(),
            FlowKind::Demand => lookup.consumer_point_types(),
            FlowKind::Lng => lookup.lng_point_types(),
        }
    }

    /// Domestic kinds only ever match tables whose exporter equals importer.
    pub fn is_domestic(&self) -> bool {
        !matches!(self, FlowKind::Supply)
    }
}

fn scan<F>(lookup: &Lookup, mut keep: F) -> Vec<TableId>
where
    F: FnMut(&TableId) -> bool,
{
    lookup
        .all_table_identifiers()
        .iter()
        .filter(|id| keep(id))
        .cloned()
        .collect()
}

fn dedup(tables: Vec<TableId>) -> Vec<TableId> {
    let mut seen = HashSet::new();
    tables
        .into_iter()
        .filter(|t| seen.insert(t.as_str().to_string()))
        .collect()
}

/// Tables whose identifier contains the id of any of the named points.
pub fn by_points(lookup: &Lookup, point_names: &[String]) -> Result<Vec<TableId>, FlowError> {
    let mut tables = Vec::new();
    for name in point_names {
        let id = lookup.point_id(name)?;
        tables.extend(scan(lookup, |t| t.as_str().contains(id)));
    }
    Ok(dedup(tables))
}

/// Cross-border supply tables for an exporter/importer pair.
///
/// Either side may be absent, and either side may be the EU pseudo-country.
/// EU on both sides selects nothing.
pub fn by_country(
    lookup: &Lookup,
    exporter: Option<&str>,
    importer: Option<&str>,
) -> Result<Vec<TableId>, FlowError> {
    let supply = lookup.supply_point_types();
    let exporter_is_eu = exporter.is_some_and(|e| lookup.is_eu_alias(e));
    let importer_is_eu = importer.is_some_and(|i| lookup.is_eu_alias(i));

    let tables = match (exporter, importer) {
        _ if exporter_is_eu && importer_is_eu => Vec::new(),

        (Some(_), Some(imp)) if exporter_is_eu => {
            let imp_code = lookup.country_code(imp)?;
            scan(lookup, |t| {
                lookup.is_eu_member(t.exporter())
                    && !lookup.is_eu_member(t.importer())
                    && supply.contains(t.point_type())
                    && t.importer() == imp_code
            })
        }
        (Some(_), None) if exporter_is_eu => scan(lookup, |t| {
            lookup.is_eu_member(t.exporter()) && supply.contains(t.point_type())
        }),

        (Some(exp), Some(_)) if importer_is_eu => {
            let exp_code = lookup.country_code(exp)?;
            scan(lookup, |t| {
                lookup.is_eu_member(t.importer())
                    && !lookup.is_eu_member(t.exporter())
                    && supply.contains(t.point_type())
                    && t.exporter() == exp_code
            })
        }
        (None, Some(_)) if importer_is_eu => scan(lookup, |t| {
            lookup.is_eu_member(t.importer()) && supply.contains(t.point_type())
        }),

        (Some(exp), Some(imp)) => {
            let imp_code = lookup.country_code(imp)?;
            let exp_code = lookup.country_code(exp)?;
            scan(lookup, |t| {
                !t.is_domestic()
                    && t.importer() == imp_code
                    && t.exporter() == exp_code
                    && supply.contains(t.point_type())
            })
        }
        (Some(exp), None) => {
            let exp_code = lookup.country_code(exp)?;
            scan(lookup, |t| {
                !t.is_domestic() && t.exporter() == exp_code && supply.contains(t.point_type())
            })
        }
        (None, Some(imp)) => {
            let imp_code = lookup.country_code(imp)?;
            scan(lookup, |t| {
                !t.is_domestic() && t.importer() == imp_code && supply.contains(t.point_type())
            })
        }
        (None, None) => Vec::new(),
    };

    Ok(tables)
}

/// Supply tables from one exporter into any EU member.
///
/// Aggregate selections listed in the `GROUP_EXPORT` override table use the
/// precomputed list instead of scanning the catalog.
pub fn exporter_to_eu(lookup: &Lookup, exporter: &str) -> Result<Vec<TableId>, FlowError> {
    if let Some(tables) = lookup.group_export_override(exporter) {
        return Ok(tables.to_vec());
    }

    let code = lookup.country_code(exporter)?;
    let supply = lookup.supply_point_types();
    Ok(scan(lookup, |t| {
        !t.is_domestic()
            && lookup.is_eu_member(t.importer())
            && t.exporter() == code
            && supply.contains(t.point_type())
    }))
}

/// Resolve country names to codes, expanding the EU pseudo-country.
fn domestic_codes(lookup: &Lookup, countries: &[String]) -> Result<BTreeSet<String>, FlowError> {
    let mut codes = BTreeSet::new();
    for name in countries {
        if lookup.is_eu_alias(name) {
            codes.extend(lookup.eu_member_codes().iter().cloned());
        } else {
            codes.insert(lookup.country_code(name)?.to_string());
        }
    }
    Ok(codes)
}

/// Domestic demand or LNG tables for the given countries.
pub fn domestic(
    lookup: &Lookup,
    kind: FlowKind,
    countries: &[String],
) -> Result<Vec<TableId>, FlowError> {
    if !kind.is_domestic() {
        return Err(FlowError::InvalidArgument(format!(
            "{kind:?} points are not domestic"
        )));
    }

    let codes = domestic_codes(lookup, countries)?;
    let types = kind.point_types(lookup);
    Ok(scan(lookup, |t| {
        t.is_domestic() && codes.contains(t.exporter()) && types.contains(t.point_type())
    }))
}

/// Tables per (country, consumer category) pair, tagged with the category.
///
/// Categories a country does not define are skipped.
pub fn by_category(
    lookup: &Lookup,
    countries: &[String],
    categories: &[String],
) -> Result<Vec<(String, TableId)>, FlowError> {
    let codes = domestic_codes(lookup, countries)?;

    let mut tagged = Vec::new();
    let mut seen = HashSet::new();
    for code in &codes {
        let country = lookup.country_name(code)?;
        let Some(defined) = lookup.consumer_categories(country) else {
            continue;
        };
        for category in categories {
            let Some(tables) = defined.get(category) else {
                continue;
            };
            for table in tables {
                if seen.insert((category.clone(), table.as_str().to_string())) {
                    tagged.push((category.clone(), table.clone()));
                }
            }
        }
    }
    Ok(tagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupDocument;

    fn lookup() -> Lookup {
        let countries = [
            ("Russia", "RU"),
            ("Germany", "DE"),
            ("Poland", "PL"),
            ("Norway", "NO"),
            ("Ukraine", "UA"),
        ];
        Lookup::from_document(LookupDocument {
            countries: countries
                .into_iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
            eu_alias: "EU".into(),
            eu_codes: vec!["DE".into(), "PL".into()],
            points: [
                ("P1", "Greifswald"),
                ("P2", "Mallnow"),
                ("P3", "Ellund"),
                ("P4", "Hermanowice"),
                ("P5", "Germany Storage"),
                ("P6", "Swinoujscie"),
            ]
            .into_iter()
            .map(|(i, n)| (i.to_string(), n.to_string()))
            .collect(),
            point_types: Default::default(),
            supply_point_types: vec!["CTWIT".into(), "CTWOT".into()],
            consumer_point_types: vec!["DISTR".into()],
            lng_point_types: vec!["LNGTE".into()],
            tables: [
                "RU_DE_CTWOT_ex_P1",
                "RU_PL_CTWOT_ex_P2",
                "NO_DE_CTWOT_ex_P3",
                "PL_UA_CTWOT_ex_P4",
                "DE_PL_CTWIT_ex_P2",
                "DE_DE_DISTR_ex_P5",
                "PL_PL_LNGTE_en_P6",
                "DE_DE_STORE_ex_P5",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            consumer_categories: [(
                "Germany".to_string(),
                [("Industry".to_string(), vec!["DE_DE_DISTR_ex_P5".to_string()])].into(),
            )]
            .into(),
            group_export: [(
                "Norway+Russia".to_string(),
                vec!["NO_DE_CTWOT_ex_P3".to_string(), "RU_DE_CTWOT_ex_P1".to_string()],
            )]
            .into(),
        })
        .unwrap()
    }

    fn names(tables: &[TableId]) -> Vec<&str> {
        tables.iter().map(TableId::as_str).collect()
    }

    #[test]
    fn exporter_only() {
        let l = lookup();
        let t = by_country(&l, Some("Russia"), None).unwrap();
        assert_eq!(names(&t), ["RU_DE_CTWOT_ex_P1", "RU_PL_CTWOT_ex_P2"]);
    }

    #[test]
    fn importer_only_excludes_domestic() {
        let l = lookup();
        let t = by_country(&l, None, Some("Germany")).unwrap();
        assert_eq!(names(&t), ["RU_DE_CTWOT_ex_P1", "NO_DE_CTWOT_ex_P3"]);
    }

    #[test]
    fn explicit_pair() {
        let l = lookup();
        let t = by_country(&l, Some("Russia"), Some("Poland")).unwrap();
        assert_eq!(names(&t), ["RU_PL_CTWOT_ex_P2"]);
    }

    #[test]
    fn eu_on_both_sides_is_empty() {
        let l = lookup();
        assert!(by_country(&l, Some("EU"), Some("EU")).unwrap().is_empty());
    }

    #[test]
    fn eu_exporter_with_importer_skips_eu_importers() {
        let l = lookup();
        let t = by_country(&l, Some("EU"), Some("Ukraine")).unwrap();
        assert_eq!(names(&t), ["PL_UA_CTWOT_ex_P4"]);
        assert!(by_country(&l, Some("EU"), Some("Germany")).unwrap().is_empty());
    }

    #[test]
    fn eu_exporter_alone_keeps_intra_eu() {
        let l = lookup();
        let t = by_country(&l, Some("EU"), None).unwrap();
        assert_eq!(names(&t), ["PL_UA_CTWOT_ex_P4", "DE_PL_CTWIT_ex_P2"]);
    }

    #[test]
    fn eu_importer_variants() {
        let l = lookup();
        let t = by_country(&l, Some("Russia"), Some("EU")).unwrap();
        assert_eq!(names(&t), ["RU_DE_CTWOT_ex_P1", "RU_PL_CTWOT_ex_P2"]);
        let t = by_country(&l, None, Some("EU")).unwrap();
        assert_eq!(
            names(&t),
            [
                "RU_DE_CTWOT_ex_P1",
                "RU_PL_CTWOT_ex_P2",
                "NO_DE_CTWOT_ex_P3",
                "DE_PL_CTWIT_ex_P2"
            ]
        );
    }

    #[test]
    fn disjoint_pairs_share_nothing() {
        let l = lookup();
        let a = by_country(&l, Some("Russia"), Some("Germany")).unwrap();
        let b = by_country(&l, Some("Norway"), Some("Poland")).unwrap();
        assert!(a.iter().all(|t| !b.contains(t)));
    }

    #[test]
    fn unknown_country_is_hard_failure() {
        let l = lookup();
        assert!(matches!(
            by_country(&l, Some("Atlantis"), None),
            Err(FlowError::Lookup { .. })
        ));
    }

    #[test]
    fn points_match_id_substring() {
        let l = lookup();
        let t = by_points(&l, &["Mallnow".into(), "Mallnow".into()]).unwrap();
        assert_eq!(names(&t), ["RU_PL_CTWOT_ex_P2", "DE_PL_CTWIT_ex_P2"]);
        assert!(by_points(&l, &["Nowhere".into()]).is_err());
    }

    #[test]
    fn exporter_to_eu_scan_and_override() {
        let l = lookup();
        let t = exporter_to_eu(&l, "Russia").unwrap();
        assert_eq!(names(&t), ["RU_DE_CTWOT_ex_P1", "RU_PL_CTWOT_ex_P2"]);
        let t = exporter_to_eu(&l, "Norway+Russia").unwrap();
        assert_eq!(names(&t), ["NO_DE_CTWOT_ex_P3", "RU_DE_CTWOT_ex_P1"]);
    }

    #[test]
    fn domestic_by_kind() {
        let l = lookup();
        let demand = domestic(&l, FlowKind::Demand, &["Germany".into()]).unwrap();
        assert_eq!(names(&demand), ["DE_DE_DISTR_ex_P5"]);
        let lng = domestic(&l, FlowKind::Lng, &["EU".into()]).unwrap();
        assert_eq!(names(&lng), ["PL_PL_LNGTE_en_P6"]);
        assert!(domestic(&l, FlowKind::Supply, &[]).is_err());
    }

    #[test]
    fn category_skips_undefined() {
        let l = lookup();
        let tagged = by_category(
            &l,
            &["Germany".into(), "Poland".into()],
            &["Industry".into(), "Households".into()],
        )
        .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].0, "Industry");
        assert_eq!(tagged[0].1.as_str(), "DE_DE_DISTR_ex_P5");
    }
}
