//! Destinations for collected tables.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::error::SinkError;

pub trait TableSink: Send + Sync {
    fn write_table(&self, name: &str, table: &mut DataFrame) -> Result<(), SinkError>;
}

/// Writes each table to `<directory>/<name>.csv` with a header row.
#[derive(Debug, Clone)]
pub struct CsvSink {
    directory: PathBuf,
}

impl CsvSink {
    /// Creates the sink, creating `directory` if it does not exist.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.csv"))
    }
}

impl TableSink for CsvSink {
    fn write_table(&self, name: &str, table: &mut DataFrame) -> Result<(), SinkError> {
        let path = self.path_for(name);
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file).include_header(true).finish(table)?;
        info!(table = name, path = %path.display(), rows = table.height(), "wrote table");
        Ok(())
    }
}
