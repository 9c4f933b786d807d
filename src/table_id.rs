use std::fmt;
use std::str::FromStr;

use crate::error::FlowError;

/// Structured flow-point table identifier.
///
/// Layout: `EX_IM_TTTTT_DD_POINTID`, e.g. `AT_HU_CTWIT_ex_21Z000000000003C`.
/// Parsed once when the catalog is loaded; every selector reads the typed
/// fields instead of slicing the raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId {
    raw: String,
    exporter: String,
    importer: String,
    point_type: String,
    direction: String,
    point_id: String,
}

impl TableId {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Two-letter exporter country code.
    pub fn exporter(&self) -> &str {
        &self.exporter
    }

    /// Two-letter importer country code.
    pub fn importer(&self) -> &str {
        &self.importer
    }

    pub fn point_type(&self) -> &str {
        &self.point_type
    }

    pub fn direction(&self) -> &str {
        &self.direction
    }

    pub fn point_id(&self) -> &str {
        &self.point_id
    }

    /// Consumption, production or LNG point inside one country.
    pub fn is_domestic(&self) -> bool {
        self.exporter == self.importer
    }

    /// Name of the backing relation in the relational store.
    pub fn relation_name(&self) -> String {
        format!("table_{}", self.raw.replace('-', "_"))
    }
}

impl FromStr for TableId {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FlowError::InvalidTableId(s.to_string());

        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid());
        }

        let mut parts = s.splitn(5, '_');
        let exporter = parts.next().ok_or_else(invalid)?;
        let importer = parts.next().ok_or_else(invalid)?;
        let point_type = parts.next().ok_or_else(invalid)?;
        let direction = parts.next().ok_or_else(invalid)?;
        let point_id = parts.next().ok_or_else(invalid)?;

        let is_code = |c: &str| c.len() == 2 && c.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_code(exporter)
            || !is_code(importer)
            || point_type.is_empty()
            || direction.is_empty()
            || point_id.is_empty()
        {
            return Err(invalid());
        }

        Ok(TableId {
            raw: s.to_string(),
            exporter: exporter.to_string(),
            importer: importer.to_string(),
            point_type: point_type.to_string(),
            direction: direction.to_string(),
            point_id: point_id.to_string(),
        })
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
