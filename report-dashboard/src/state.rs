use shared::config::ReportSettings;
use tokio::sync::{Mutex, RwLock};

use report_core::{Bucketing, GraphKey, HexbinGraph, MemoSlot};

use crate::datasets::DatasetStore;

/// Memo key of a hexbin graph: the dataset plus the graph inputs.
pub type HexbinKey = (String, GraphKey);

pub struct AppState {
    pub settings: ReportSettings,
    pub datasets: RwLock<DatasetStore>,
    pub hexbin_memo: Mutex<MemoSlot<HexbinKey, Option<HexbinGraph>>>,
}

impl AppState {
    pub fn new(settings: ReportSettings) -> Self {
        AppState {
            settings,
            datasets: RwLock::new(DatasetStore::new()),
            hexbin_memo: Mutex::new(MemoSlot::new()),
        }
    }

    pub fn hexbin_bucketing(&self) -> Bucketing {
        Bucketing::Adaptive {
            ladder_hours: self.settings.hexbin_ladder_hours.clone(),
            ceiling: self.settings.hexbin_ceiling,
        }
    }
}
