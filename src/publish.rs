//! Result publisher: the shared "last computed result" slot read by the
//! export-current-view feature.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use polars::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::combine::ComparisonBundle;
use crate::error::FlowError;
use crate::schema::compare;

/// What a query produced.
#[derive(Clone)]
pub enum ResultView {
    Series(DataFrame),
    Comparison(ComparisonBundle),
}

impl ResultView {
    pub fn is_empty(&self) -> bool {
        match self {
            ResultView::Series(frame) => frame.height() == 0,
            ResultView::Comparison(bundle) => bundle.values().all(|f| f.height() == 0),
        }
    }

    /// Single frame suitable for export. Comparison partitions are stacked
    /// diagonally: envelope rows get nulls for `year`, `period_from` and
    /// `period`. `flag` and `group_by` lead.
    pub fn to_frame(&self) -> Result<DataFrame, FlowError> {
        match self {
            ResultView::Series(frame) => Ok(frame.clone()),
            ResultView::Comparison(bundle) => {
                let parts: Vec<LazyFrame> = bundle
                    .values()
                    .filter(|f| f.height() > 0)
                    .map(|f| f.clone().lazy())
                    .collect();
                if parts.is_empty() {
                    return Ok(DataFrame::empty());
                }
                let stacked = concat_lf_diagonal(parts, UnionArgs::default())?.collect()?;

                let mut order = vec![compare::FLAG, compare::GROUP_BY];
                order.extend(
                    stacked
                        .get_column_names_str()
                        .into_iter()
                        .filter(|c| *c != compare::FLAG && *c != compare::GROUP_BY),
                );
                Ok(stacked.select(order)?)
            }
        }
    }
}

/// One published result.
#[derive(Clone)]
pub struct Snapshot {
    pub query_id: Uuid,
    pub published_at: DateTime<Utc>,
    /// Name of the view that produced it, e.g. `supply_time`.
    pub view_name: String,
    pub view: ResultView,
}

/// Shared handle to the most recent result.
///
/// Every top-level query overwrites the slot on success, including with an
/// empty value. Concurrent queries race: last writer wins, and a reader may
/// get the snapshot of a different request than the one it issued. Compare
/// `query_id` when that matters.
#[derive(Clone, Default)]
pub struct ResultCache {
    slot: Arc<RwLock<Option<Snapshot>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, view_name: &str, view: ResultView) -> Uuid {
        let snapshot = Snapshot {
            query_id: Uuid::new_v4(),
            published_at: Utc::now(),
            view_name: view_name.to_string(),
            view,
        };
        let id = snapshot.query_id;
        debug!(
            query_id = %id,
            view = view_name,
            empty = snapshot.view.is_empty(),
            "published result"
        );
        *self.slot.write() = Some(snapshot);
        id
    }

    pub fn publish_empty(&self, view_name: &str) -> Uuid {
        self.publish(view_name, ResultView::Series(DataFrame::empty()))
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.slot.read().clone()
    }

    pub fn latest_frame(&self) -> Result<Option<DataFrame>, FlowError> {
        match self.latest() {
            Some(snapshot) => Ok(Some(snapshot.view.to_frame()?)),
            None => Ok(None),
        }
    }

    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    // ── Export ──────────────────────────────────────────────────────────────

    /// Write the current view as CSV. Returns `false` when nothing has been
    /// published yet.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<bool, FlowError> {
        let Some(mut frame) = self.latest_frame()? else {
            return Ok(false);
        };
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .finish(&mut frame)?;
        Ok(true)
    }

    pub fn export_parquet(&self, path: impl AsRef<Path>) -> Result<bool, FlowError> {
        let Some(mut frame) = self.latest_frame()? else {
            return Ok(false);
        };
        let mut file = File::create(path)?;
        ParquetWriter::new(&mut file).finish(&mut frame)?;
        Ok(true)
    }
}
