use std::collections::HashMap;

use chrono::NaiveDate;
use polars::prelude::*;

use super::{records_to_frame, restrict_range, DailyRecord, FlowStore};
use crate::error::FlowError;
use crate::table_id::TableId;

/// In-process store keyed by table identifier.
#[derive(Default, Clone)]
pub struct MemoryStore {
    tables: HashMap<String, DataFrame>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw frame for `table`, replacing any previous one.
    pub fn insert(&mut self, table: &str, frame: DataFrame) {
        self.tables.insert(table.to_string(), frame);
    }

    pub fn insert_records(
        &mut self,
        table: &str,
        records: &[DailyRecord],
    ) -> Result<(), FlowError> {
        let frame = records_to_frame(records)?;
        self.insert(table, frame);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FlowStore for MemoryStore {
    fn load(
        &self,
        table: &TableId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, FlowError> {
        let frame = self
            .tables
            .get(table.as_str())
            .ok_or_else(|| FlowError::MissingTable(table.to_string()))?;
        restrict_range(frame.clone(), start, end)
    }
}
