//! Durable `ID,Name` CSV store

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::record::ResultRecord;

const HEADER: [&str; 2] = ["ID", "Name"];

/// Error from reading or writing the store
#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(_) => write!(f, "store I/O failed"),
            Self::Csv(_) => write!(f, "store CSV read or write failed"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for StoreError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

/// CSV file of achievement rows.
///
/// Appends and the final rewrite serialize on one lock, so rows from
/// different writers never interleave.
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvStore {
    /// Create (or truncate) the store and write the header row
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_rows(File::create(&path)?, &[])?;
        Ok(Self::at(path))
    }

    /// Open a store left by an earlier run, keeping its rows.
    ///
    /// A missing or empty file is initialized with the header. A last row
    /// without its newline (killed mid-append) is cut off, so its ID is
    /// fetched again.
    pub fn open_existing(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::create(path),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Self::create(path);
        }
        if !bytes.ends_with(b"\n") {
            let keep = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
            log::warn!(
                "{}: dropping incomplete last row ({} bytes)",
                path.display(),
                bytes.len() - keep
            );
            if keep == 0 {
                return Self::create(path);
            }
            OpenOptions::new()
                .write(true)
                .open(&path)?
                .set_len(keep as u64)?;
        }
        Ok(Self::at(path))
    }

    fn at(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append rows (no header) and sync them to disk
    pub fn append(&self, records: &[ResultRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let _guard = self.lock();
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_data()?;
        Ok(())
    }

    /// Replace the store with `records` sorted by ID, one row per ID.
    ///
    /// Written to `<file>.tmp` first and renamed over the store, so a crash
    /// leaves either the old or the new file. Returns the rows written.
    pub fn rewrite(&self, mut records: Vec<ResultRecord>) -> Result<usize, StoreError> {
        records.sort_by_key(|r| r.id);
        records.dedup_by_key(|r| r.id);

        let _guard = self.lock();
        let tmp_path = tmp_path(&self.path);
        let file = write_rows(File::create(&tmp_path)?, &records)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(records.len())
    }

    /// All rows in file order
    pub fn read_all(&self) -> Result<Vec<ResultRecord>, StoreError> {
        let _guard = self.lock();
        read_records(&self.path)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Header followed by `records`; returns the flushed file
fn write_rows(file: File, records: &[ResultRecord]) -> Result<File, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))
}

/// Read every row of a store file (header required)
pub fn read_records(path: &Path) -> Result<Vec<ResultRecord>, StoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize()
        .collect::<Result<Vec<ResultRecord>, csv::Error>>()?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::create(dir.path().join("out.csv")).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "ID,Name\n");
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn create_makes_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::create(dir.path().join("a/b/out.csv")).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn append_keeps_order_and_header() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::create(dir.path().join("out.csv")).unwrap();
        store.append(&[ResultRecord::new(3, "Gamma")]).unwrap();
        store
            .append(&[ResultRecord::new(1, "Alpha"), ResultRecord::new(2, "Beta")])
            .unwrap();
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "ID,Name\n3,Gamma\n1,Alpha\n2,Beta\n"
        );
    }

    #[test]
    fn names_with_commas_are_quoted() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::create(dir.path().join("out.csv")).unwrap();
        let record = ResultRecord::new(7, "Swift, Silent, Deadly");
        store.append(std::slice::from_ref(&record)).unwrap();
        assert!(fs::read_to_string(store.path())
            .unwrap()
            .contains("7,\"Swift, Silent, Deadly\""));
        assert_eq!(store.read_all().unwrap(), vec![record]);
    }

    #[test]
    fn rewrite_sorts_and_dedups() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::create(dir.path().join("out.csv")).unwrap();
        store.append(&[ResultRecord::new(9, "Old")]).unwrap();
        let written = store
            .rewrite(vec![
                ResultRecord::new(3, "Gamma"),
                ResultRecord::new(1, "Alpha"),
                ResultRecord::new(3, "Gamma"),
            ])
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "ID,Name\n1,Alpha\n3,Gamma\n"
        );
        assert!(!tmp_path(store.path()).exists());
    }

    #[test]
    fn open_existing_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        CsvStore::create(&path)
            .unwrap()
            .append(&[ResultRecord::new(5, "Epsilon")])
            .unwrap();

        let reopened = CsvStore::open_existing(&path).unwrap();
        assert_eq!(reopened.read_all().unwrap(), vec![ResultRecord::new(5, "Epsilon")]);
    }

    #[test]
    fn open_existing_cuts_incomplete_last_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "ID,Name\n1,Alpha\n2").unwrap();

        let store = CsvStore::open_existing(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "ID,Name\n1,Alpha\n");
        assert_eq!(store.read_all().unwrap(), vec![ResultRecord::new(1, "Alpha")]);
    }

    #[test]
    fn open_existing_rewrites_cut_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "ID,Na").unwrap();

        let store = CsvStore::open_existing(&path).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "ID,Name\n");
    }

    #[test]
    fn error_display_leaves_cause_to_source() {
        use std::error::Error;

        let err = StoreError::from(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(err.to_string(), "store I/O failed");
        assert_eq!(err.source().unwrap().to_string(), "disk full");
    }

    #[test]
    fn open_existing_initializes_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::open_existing(dir.path().join("fresh.csv")).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "ID,Name\n");
    }

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("/data/out.csv")),
            PathBuf::from("/data/out.csv.tmp")
        );
    }
}
