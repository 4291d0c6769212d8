//! Case-directory backend writing JSON records.
//!
//! Layout under the output directory, for case name `CASE`:
//! - `CASE.INIT.json`: the initial state
//! - `CASE.X0003.json`: the restart record of episode 3 (not written for substeps)
//! - `CASE.SUMMARY.jsonl`: one summary line per step, substeps included

use crate::data::block::BlockData;
use crate::data::restart::{ExtraKeys, RestartCatalog, RestartValues};
use crate::data::wells::WellData;
use crate::export_error::ExportError;
use crate::io::{InitialState, PersistenceBackend, select_restart, stored_cell_data};
use crate::output::snapshot::StepSnapshot;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// One line of the summary file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub episode_index: usize,
    pub is_substep: bool,
    pub seconds_elapsed: f64,
    pub scalars: BTreeMap<String, f64>,
    pub regions: BTreeMap<String, Vec<f64>>,
    pub blocks: BlockData,
    pub wells: WellData,
}

#[derive(Debug)]
pub struct JsonDirBackend {
    dir: PathBuf,
    case_name: String,
    summary_lock: Mutex<()>,
}

impl JsonDirBackend {
    /// Create the output directory if needed.
    pub fn create(
        dir: impl Into<PathBuf>,
        case_name: impl Into<String>,
    ) -> Result<Self, ExportError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            case_name: case_name.into(),
            summary_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn init_path(&self) -> PathBuf {
        self.dir.join(format!("{}.INIT.json", self.case_name))
    }

    pub fn restart_path(&self, episode: usize) -> PathBuf {
        self.dir.join(format!("{}.X{episode:04}.json", self.case_name))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(format!("{}.SUMMARY.jsonl", self.case_name))
    }

    /// Read back every summary line written so far.
    pub fn read_summary(&self) -> Result<Vec<SummaryLine>, ExportError> {
        let text = match fs::read_to_string(self.summary_path()) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(ExportError::from))
            .collect()
    }

    pub fn read_initial_state(&self) -> Result<InitialState, ExportError> {
        let file = File::open(self.init_path())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
        fs::write(path, serde_json::to_vec(value)?)?;
        Ok(())
    }
}

impl PersistenceBackend for JsonDirBackend {
    fn write_initial_state(&self, state: &InitialState) -> Result<(), ExportError> {
        let path = self.init_path();
        Self::write_json(&path, state)?;
        log::info!("wrote initial state to {}", path.display());
        Ok(())
    }

    fn write_time_step(&self, snapshot: &StepSnapshot) -> Result<(), ExportError> {
        if !snapshot.is_substep {
            let record = StepSnapshot {
                cell_data: stored_cell_data(snapshot),
                ..snapshot.clone()
            };
            Self::write_json(&self.restart_path(snapshot.episode_index), &record)?;
        }

        let line = SummaryLine {
            episode_index: snapshot.episode_index,
            is_substep: snapshot.is_substep,
            seconds_elapsed: snapshot.seconds_elapsed,
            scalars: snapshot.scalar_summary.clone(),
            regions: snapshot.region_summary.clone(),
            blocks: snapshot.block_summary.clone(),
            wells: snapshot.well_data.clone(),
        };
        let mut encoded = serde_json::to_vec(&line)?;
        encoded.push(b'\n');
        let _guard = self.summary_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.summary_path())?;
        file.write_all(&encoded)?;
        Ok(())
    }

    fn load_restart(
        &self,
        episode: usize,
        catalog: &RestartCatalog,
        extra: &ExtraKeys,
    ) -> Result<RestartValues, ExportError> {
        let file = match File::open(self.restart_path(episode)) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExportError::RestartRecordNotFound(episode));
            }
            Err(e) => return Err(e.into()),
        };
        let record: StepSnapshot = serde_json::from_reader(BufReader::new(file))?;
        select_restart(&record, catalog, extra)
    }
}
