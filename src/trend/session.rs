use crate::error::TrendError;
use crate::trend::load_with;
use crate::trend::LoadOptions;
use crate::trend::NormalizedTable;
use log::info;
use log::warn;
use std::path::Path;
use std::path::PathBuf;

/// The state behind a trend view: the file last opened and the table on display.
///
/// A failed load leaves the displayed table unchanged.
#[derive(Debug, Default)]
pub struct TrendSession {
    options: LoadOptions,
    path: Option<PathBuf>,
    table: Option<NormalizedTable>,
    source: Option<PathBuf>,
}

impl TrendSession {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            path: None,
            table: None,
            source: None,
        }
    }

    /// Loads `path` and remembers it for [`TrendSession::refresh`].
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<&NormalizedTable, TrendError> {
        let path = path.as_ref().to_path_buf();
        self.path = Some(path.clone());
        self.reload(&path)
    }

    /// Reloads the last opened file to pick up external edits.
    ///
    /// # Errors
    ///
    /// [`TrendError::NothingLoaded`] when no file has been opened yet, or the
    /// error of the reload.
    pub fn refresh(&mut self) -> Result<&NormalizedTable, TrendError> {
        let path = self.path.clone().ok_or(TrendError::NothingLoaded)?;
        self.reload(&path)
    }

    /// The table on display, if any load has succeeded
    pub fn current(&self) -> Option<&NormalizedTable> {
        self.table.as_ref()
    }

    /// The file `refresh` reloads
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The file the current table was loaded from. Differs from
    /// [`TrendSession::path`] after a failed `open`.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn reload(&mut self, path: &Path) -> Result<&NormalizedTable, TrendError> {
        match load_with(path, &self.options) {
            Ok(table) => {
                info!("Loaded {} rows and {} channels from '{}'", table.len(), table.channels().len(), path.display());
                self.source = Some(path.to_path_buf());
                Ok(&*self.table.insert(table))
            }
            Err(error) => {
                warn!("Reload of '{}' failed, keeping the previous table: {error}", path.display());
                Err(error)
            }
        }
    }
}
