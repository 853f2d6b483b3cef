//! Combine stores from separate runs into one

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::record::ResultRecord;
use crate::store::{CsvStore, read_records};

/// Merge `inputs` into `output`: sorted by ID, one row per ID.
///
/// When two inputs disagree on a name the first one wins. All inputs are
/// read before `output` is written, so `output` may be one of them.
/// Returns the number of rows written.
pub fn merge_stores(inputs: &[PathBuf], output: &Path) -> Result<usize> {
    let mut merged: BTreeMap<u32, String> = BTreeMap::new();
    for input in inputs {
        let records = read_records(input)
            .with_context(|| format!("Failed to read store {}", input.display()))?;
        log::info!("{}: {} rows", input.display(), records.len());
        for record in records {
            match merged.entry(record.id) {
                Entry::Vacant(slot) => {
                    slot.insert(record.name);
                }
                Entry::Occupied(kept) if *kept.get() != record.name => {
                    log::warn!(
                        "ID {}: keeping {:?}, ignoring {:?} from {}",
                        record.id,
                        kept.get(),
                        record.name,
                        input.display()
                    );
                }
                Entry::Occupied(_) => {}
            }
        }
    }

    let records: Vec<ResultRecord> = merged
        .into_iter()
        .map(|(id, name)| ResultRecord { id, name })
        .collect();
    let store = CsvStore::create(output)
        .with_context(|| format!("Cannot create store {}", output.display()))?;
    let written = store
        .rewrite(records)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Merged {} inputs into {} ({written} rows)", inputs.len(), output.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(dir: &Path, name: &str, rows: &[(u32, &str)]) -> PathBuf {
        let path = dir.join(name);
        let store = CsvStore::create(&path).unwrap();
        let records: Vec<_> = rows.iter().map(|(id, n)| ResultRecord::new(*id, *n)).collect();
        store.append(&records).unwrap();
        path
    }

    #[test]
    fn disjoint_inputs_interleave_sorted() {
        let dir = TempDir::new().unwrap();
        let a = store_with(dir.path(), "a.csv", &[(4, "Delta"), (1, "Alpha")]);
        let b = store_with(dir.path(), "b.csv", &[(3, "Gamma")]);
        let out = dir.path().join("out.csv");

        assert_eq!(merge_stores(&[a, b], &out).unwrap(), 3);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "ID,Name\n1,Alpha\n3,Gamma\n4,Delta\n"
        );
    }

    #[test]
    fn first_input_wins_on_conflict() {
        let dir = TempDir::new().unwrap();
        let a = store_with(dir.path(), "a.csv", &[(1, "Alpha")]);
        let b = store_with(dir.path(), "b.csv", &[(1, "Other"), (2, "Beta")]);
        let out = dir.path().join("out.csv");

        merge_stores(&[a, b], &out).unwrap();
        assert_eq!(
            read_records(&out).unwrap(),
            vec![ResultRecord::new(1, "Alpha"), ResultRecord::new(2, "Beta")]
        );
    }

    #[test]
    fn output_may_be_an_input() {
        let dir = TempDir::new().unwrap();
        let a = store_with(dir.path(), "a.csv", &[(2, "Beta")]);
        let b = store_with(dir.path(), "b.csv", &[(1, "Alpha")]);

        merge_stores(&[a.clone(), b], &a).unwrap();
        assert_eq!(read_records(&a).unwrap().len(), 2);
    }

    #[test]
    fn missing_input_is_error() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.csv");
        assert!(merge_stores(&[dir.path().join("nope.csv")], &out).is_err());
    }
}
