use crate::error::Result;
use crate::schema::{BudgetRecord, FarmSnapshot, GlRecord, HarvestRecord, LaborRecord, SalesRecord};
use log::debug;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Reads typed records from CSV with a header row. Columns not named by the
/// record type are ignored.
pub fn read_records<T, R>(reader: R) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.deserialize() {
        records.push(row?);
    }

    Ok(records)
}

pub fn read_records_from_path<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let records = read_records(File::open(path)?)?;
    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Locations of the five CSV exports.
#[derive(Debug, Clone)]
pub struct SnapshotFiles {
    pub labor: PathBuf,
    pub sales: PathBuf,
    pub harvest: PathBuf,
    pub gl: PathBuf,
    pub budget: PathBuf,
}

impl SnapshotFiles {
    /// Conventional file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            labor: dir.join("labor_cost_sot.csv"),
            sales: dir.join("sales_orders.csv"),
            harvest: dir.join("harvest_yields.csv"),
            gl: dir.join("gl_summary.csv"),
            budget: dir.join("budget_plan.csv"),
        }
    }

    pub fn load(&self) -> Result<FarmSnapshot> {
        Ok(FarmSnapshot {
            labor: read_records_from_path(&self.labor)?,
            sales: read_records_from_path(&self.sales)?,
            harvest: read_records_from_path(&self.harvest)?,
            gl: read_records_from_path(&self.gl)?,
            budget: read_records_from_path(&self.budget)?,
        })
    }
}

pub fn load_snapshot<L, S, H, G, B>(labor: L, sales: S, harvest: H, gl: G, budget: B) -> Result<FarmSnapshot>
where
    L: Read,
    S: Read,
    H: Read,
    G: Read,
    B: Read,
{
    Ok(FarmSnapshot {
        labor: read_records::<LaborRecord, _>(labor)?,
        sales: read_records::<SalesRecord, _>(sales)?,
        harvest: read_records::<HarvestRecord, _>(harvest)?,
        gl: read_records::<GlRecord, _>(gl)?,
        budget: read_records::<BudgetRecord, _>(budget)?,
    })
}
