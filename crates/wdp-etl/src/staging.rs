//! Staging store
//!
//! The exchange between pipeline stages: a raw zone of immutable provider
//! JSON files and a processed zone of immutable, timestamp-named artifacts.
//! The [`StagingStore`] trait carries the hand-off contract (naming
//! convention, latest-wins selection, immutability once written) so the
//! stages can be tested against [`MemStagingStore`] without touching a real
//! filesystem.
//!
//! No locking is provided. Runs never overlap (single-scheduler assumption),
//! so the only requirement is that readers never observe a partially written
//! artifact; [`FsStagingStore`] writes to a temporary sibling and renames.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{EtlError, Result};
use crate::models::WeatherRecord;

/// Prefix of every processed artifact file name
pub const ARTIFACT_PREFIX: &str = "processed_weather_data_";

/// Extension of processed artifact files
pub const ARTIFACT_EXTENSION: &str = "csv";

/// Extension of raw observation files
pub const RAW_EXTENSION: &str = "json";

/// Handle to one raw observation file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RawHandle {
    pub name: String,
}

/// Handle to one processed artifact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArtifactHandle {
    pub name: String,
}

/// The staged hand-off contract between extract, transform, and load.
///
/// Raw files and artifacts are immutable once written; each transform run
/// adds one new uniquely named artifact and `latest_artifact` resolves the
/// newest one. Nothing here ever mutates or deletes existing files.
pub trait StagingStore {
    /// Enumerate raw observation files, sorted by name.
    ///
    /// Fails with [`EtlError::RawZoneMissing`] when the raw zone does not
    /// exist at all (extract never ran); an existing-but-empty zone yields
    /// an empty list.
    fn list_raw(&self) -> Result<Vec<RawHandle>>;

    /// Read one raw observation document.
    fn read_raw(&self, handle: &RawHandle) -> Result<String>;

    /// Write one raw observation document, creating the raw zone if absent.
    fn write_raw(&self, name: &str, contents: &str) -> Result<RawHandle>;

    /// Create the processed zone if absent.
    fn ensure_processed_zone(&self) -> Result<()>;

    /// Write one new artifact holding `records`, named with the current
    /// timestamp so that name order reflects creation order.
    fn write_artifact(&self, records: &[WeatherRecord]) -> Result<ArtifactHandle>;

    /// Resolve the artifact with the greatest embedded timestamp.
    ///
    /// Fails with [`EtlError::NoArtifact`] when zero matching files exist;
    /// the load stage cannot proceed without input and must not silently
    /// skip.
    fn latest_artifact(&self) -> Result<ArtifactHandle>;

    /// Read all rows of one artifact.
    fn read_artifact(&self, handle: &ArtifactHandle) -> Result<Vec<WeatherRecord>>;
}

/// File name for an artifact created at `at` (UTC, second resolution).
///
/// Lexicographic order of these names equals creation order, which is what
/// makes `latest_artifact` deterministic. Two writers racing within the
/// same second would collide; that risk is accepted under the
/// single-scheduler assumption.
pub(crate) fn artifact_file_name(at: DateTime<Utc>) -> String {
    format!(
        "{}{}.{}",
        ARTIFACT_PREFIX,
        at.format("%Y%m%d_%H%M%S"),
        ARTIFACT_EXTENSION
    )
}

fn is_artifact_name(name: &str) -> bool {
    name.starts_with(ARTIFACT_PREFIX) && name.ends_with(&format!(".{}", ARTIFACT_EXTENSION))
}

/// Encode records as the artifact CSV format (header row + one row per record).
pub(crate) fn encode_artifact(records: &[WeatherRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    Ok(buf)
}

/// Decode an artifact back into rows. A header-only artifact yields zero rows.
pub(crate) fn decode_artifact(bytes: &[u8]) -> Result<Vec<WeatherRecord>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

// ============================================================================
// Filesystem store
// ============================================================================

/// Directory-backed staging store: `<root>/raw` and `<root>/processed`.
#[derive(Debug, Clone)]
pub struct FsStagingStore {
    root: PathBuf,
}

impl FsStagingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    fn matching_names(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if keep(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

impl StagingStore for FsStagingStore {
    fn list_raw(&self) -> Result<Vec<RawHandle>> {
        let raw_dir = self.raw_dir();
        if !raw_dir.is_dir() {
            return Err(EtlError::RawZoneMissing(raw_dir.display().to_string()));
        }
        let suffix = format!(".{}", RAW_EXTENSION);
        let names = Self::matching_names(&raw_dir, |name| name.ends_with(&suffix))?;
        Ok(names.into_iter().map(|name| RawHandle { name }).collect())
    }

    fn read_raw(&self, handle: &RawHandle) -> Result<String> {
        Ok(fs::read_to_string(self.raw_dir().join(&handle.name))?)
    }

    fn write_raw(&self, name: &str, contents: &str) -> Result<RawHandle> {
        let raw_dir = self.raw_dir();
        fs::create_dir_all(&raw_dir)?;
        fs::write(raw_dir.join(name), contents)?;
        debug!(file = name, "wrote raw observation");
        Ok(RawHandle {
            name: name.to_string(),
        })
    }

    fn ensure_processed_zone(&self) -> Result<()> {
        fs::create_dir_all(self.processed_dir())?;
        Ok(())
    }

    fn write_artifact(&self, records: &[WeatherRecord]) -> Result<ArtifactHandle> {
        let processed_dir = self.processed_dir();
        fs::create_dir_all(&processed_dir)?;

        let name = artifact_file_name(Utc::now());
        let bytes = encode_artifact(records)?;

        // Write-then-rename so no reader sees a partial artifact. The
        // temporary name does not match the artifact pattern, so a crashed
        // write is invisible to latest_artifact.
        let tmp_path = processed_dir.join(format!("{}.tmp", name));
        let final_path = processed_dir.join(&name);
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &final_path)?;

        debug!(file = name, rows = records.len(), "wrote artifact");
        Ok(ArtifactHandle { name })
    }

    fn latest_artifact(&self) -> Result<ArtifactHandle> {
        let processed_dir = self.processed_dir();
        if !processed_dir.is_dir() {
            return Err(EtlError::NoArtifact(processed_dir.display().to_string()));
        }
        Self::matching_names(&processed_dir, is_artifact_name)?
            .into_iter()
            .max()
            .map(|name| ArtifactHandle { name })
            .ok_or_else(|| EtlError::NoArtifact(processed_dir.display().to_string()))
    }

    fn read_artifact(&self, handle: &ArtifactHandle) -> Result<Vec<WeatherRecord>> {
        let bytes = fs::read(self.processed_dir().join(&handle.name))?;
        decode_artifact(&bytes)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct MemState {
    raw_zone_created: bool,
    raw: std::collections::BTreeMap<String, String>,
    artifacts: std::collections::BTreeMap<String, Vec<WeatherRecord>>,
    seq: i64,
}

/// In-memory staging store implementing the same contract as
/// [`FsStagingStore`]. Artifact names advance one second per write from a
/// fixed epoch, keeping name order equal to creation order without a real
/// clock.
#[derive(Debug, Default)]
pub struct MemStagingStore {
    state: Mutex<MemState>,
}

/// Epoch the fake clock counts from (2023-11-14 22:13:20 UTC).
const MEM_CLOCK_EPOCH: i64 = 1_700_000_000;

impl MemStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the raw zone without writing anything, mirroring a filesystem
    /// raw directory that exists but is empty.
    pub fn create_raw_zone(&self) {
        self.lock().raw_zone_created = true;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StagingStore for MemStagingStore {
    fn list_raw(&self) -> Result<Vec<RawHandle>> {
        let state = self.lock();
        if !state.raw_zone_created {
            return Err(EtlError::RawZoneMissing("mem://raw".to_string()));
        }
        Ok(state
            .raw
            .keys()
            .map(|name| RawHandle { name: name.clone() })
            .collect())
    }

    fn read_raw(&self, handle: &RawHandle) -> Result<String> {
        self.lock().raw.get(&handle.name).cloned().ok_or_else(|| {
            EtlError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no raw file '{}'", handle.name),
            ))
        })
    }

    fn write_raw(&self, name: &str, contents: &str) -> Result<RawHandle> {
        let mut state = self.lock();
        state.raw_zone_created = true;
        state.raw.insert(name.to_string(), contents.to_string());
        Ok(RawHandle {
            name: name.to_string(),
        })
    }

    fn ensure_processed_zone(&self) -> Result<()> {
        Ok(())
    }

    fn write_artifact(&self, records: &[WeatherRecord]) -> Result<ArtifactHandle> {
        let mut state = self.lock();
        let at = DateTime::from_timestamp(MEM_CLOCK_EPOCH + state.seq, 0)
            .unwrap_or_else(Utc::now);
        state.seq += 1;
        let name = artifact_file_name(at);
        state.artifacts.insert(name.clone(), records.to_vec());
        Ok(ArtifactHandle { name })
    }

    fn latest_artifact(&self) -> Result<ArtifactHandle> {
        self.lock()
            .artifacts
            .keys()
            .max()
            .map(|name| ArtifactHandle { name: name.clone() })
            .ok_or_else(|| EtlError::NoArtifact("mem://processed".to_string()))
    }

    fn read_artifact(&self, handle: &ArtifactHandle) -> Result<Vec<WeatherRecord>> {
        self.lock()
            .artifacts
            .get(&handle.name)
            .cloned()
            .ok_or_else(|| EtlError::NoArtifact(handle.name.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> WeatherRecord {
        WeatherRecord {
            city: "Testville".to_string(),
            timestamp_utc: "2023-11-14 22:13:20".to_string(),
            temperature_celsius: 20.0,
            temperature_fahrenheit: 68.0,
            humidity_percent: 50.0,
            wind_speed_ms: 3.5,
            weather_description: "clear sky".to_string(),
        }
    }

    #[test]
    fn test_artifact_file_name_embeds_sortable_timestamp() {
        let t1 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let t2 = DateTime::from_timestamp(1_700_000_001, 0).unwrap();
        let n1 = artifact_file_name(t1);
        let n2 = artifact_file_name(t2);
        assert_eq!(n1, "processed_weather_data_20231114_221320.csv");
        assert!(n1 < n2);
    }

    #[test]
    fn test_artifact_round_trip() {
        let records = vec![sample_record()];
        let bytes = encode_artifact(&records).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with(
            "city,timestamp_utc,temperature_celsius,temperature_fahrenheit,\
             humidity_percent,wind_speed_ms,weather_description"
        ));
        assert_eq!(decode_artifact(&bytes).unwrap(), records);
    }

    #[test]
    fn test_fs_latest_artifact_picks_greatest_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStagingStore::new(dir.path());
        store.ensure_processed_zone().unwrap();

        // Created out of order on disk; name order must still win.
        for name in [
            "processed_weather_data_20240105_120000.csv",
            "processed_weather_data_20240301_000000.csv",
            "processed_weather_data_20240102_090000.csv",
        ] {
            fs::write(store.processed_dir().join(name), "city\n").unwrap();
        }
        // Non-matching files are ignored.
        fs::write(store.processed_dir().join("notes.txt"), "x").unwrap();
        fs::write(
            store
                .processed_dir()
                .join("processed_weather_data_20990101_000000.csv.tmp"),
            "x",
        )
        .unwrap();

        let latest = store.latest_artifact().unwrap();
        assert_eq!(latest.name, "processed_weather_data_20240301_000000.csv");
    }

    #[test]
    fn test_fs_latest_artifact_empty_zone_is_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStagingStore::new(dir.path());
        store.ensure_processed_zone().unwrap();
        assert!(matches!(
            store.latest_artifact(),
            Err(EtlError::NoArtifact(_))
        ));
    }

    #[test]
    fn test_fs_list_raw_missing_zone() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStagingStore::new(dir.path());
        assert!(matches!(
            store.list_raw(),
            Err(EtlError::RawZoneMissing(_))
        ));
    }

    #[test]
    fn test_fs_list_raw_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStagingStore::new(dir.path());
        store.write_raw("b.json", "{}").unwrap();
        store.write_raw("a.json", "{}").unwrap();
        fs::write(store.raw_dir().join("ignore.txt"), "x").unwrap();

        let names: Vec<_> = store
            .list_raw()
            .unwrap()
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_fs_write_artifact_leaves_no_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStagingStore::new(dir.path());
        let handle = store.write_artifact(&[sample_record()]).unwrap();

        let names = fs::read_dir(store.processed_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec![handle.name.clone()]);

        let rows = store.read_artifact(&handle).unwrap();
        assert_eq!(rows, vec![sample_record()]);
    }

    #[test]
    fn test_mem_store_latest_wins_across_writes() {
        let store = MemStagingStore::new();
        let first = store.write_artifact(&[sample_record()]).unwrap();
        let second = store.write_artifact(&[]).unwrap();
        let third = store.write_artifact(&[sample_record()]).unwrap();

        assert!(first.name < second.name && second.name < third.name);
        assert_eq!(store.latest_artifact().unwrap(), third);
    }

    #[test]
    fn test_mem_store_mirrors_raw_zone_semantics() {
        let store = MemStagingStore::new();
        assert!(matches!(
            store.list_raw(),
            Err(EtlError::RawZoneMissing(_))
        ));

        store.create_raw_zone();
        assert!(store.list_raw().unwrap().is_empty());

        store.write_raw("one.json", "{}").unwrap();
        assert_eq!(store.list_raw().unwrap().len(), 1);
    }
}
