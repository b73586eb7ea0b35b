//! Reader session
//!
//! `RepoReader` ties the pieces together for one open/close session:
//! open parses the index and maps the data, start validates the options
//! and activates iteration, and every `next_record` call produces one
//! assembled record until all epochs are done.
//!
//! Options can change while the reader is idle or open. Once active they
//! are frozen until `close`. Any error during open, start or a read fails
//! the session and releases the data file.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{error, info, warn};

use super::record::{Record, RecordReader};
use super::source::open_source;
use crate::config::{validate, ReaderConfig, ValidatedPlan};
use crate::index::{IndexMetadata, IndexSource};
use crate::layout::OffsetTable;
use crate::metrics::ReadStats;
use crate::sampling::{SampleIterator, TensorSelection};
use crate::utils::{RepoError, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Nothing open
    Idle,
    /// Index parsed and data file open, not iterating yet
    Open,
    /// Producing records
    Active,
    /// All epochs done
    Exhausted,
    /// Open, start or a read failed; resources are released
    Failed,
}

impl ReaderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderState::Idle => "idle",
            ReaderState::Open => "open",
            ReaderState::Active => "active",
            ReaderState::Exhausted => "exhausted",
            ReaderState::Failed => "failed",
        }
    }
}

/// Options that decide what gets opened
#[derive(Debug, Clone, PartialEq)]
struct SourceKey {
    location: Option<PathBuf>,
    index_path: Option<PathBuf>,
    descriptor: Option<String>,
}

impl SourceKey {
    fn of(config: &ReaderConfig) -> Self {
        Self {
            location: config.location().map(|p| p.to_path_buf()),
            index_path: config.index_path().map(|p| p.to_path_buf()),
            descriptor: config.descriptor().map(str::to_string),
        }
    }
}

/// Resources held from open to close
struct OpenRepo {
    key: SourceKey,
    metadata: IndexMetadata,
    sample_lengths: Option<Vec<u64>>,
    records: RecordReader,
}

/// Resources of an active session
struct ActiveSession {
    iterator: SampleIterator,
    selection: TensorSelection,
    plan: ValidatedPlan,
}

/// Indexed sample repository reader
pub struct RepoReader {
    config: ReaderConfig,
    state: ReaderState,
    repo: Option<OpenRepo>,
    session: Option<ActiveSession>,
    stats: ReadStats,
}

impl RepoReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            state: ReaderState::Idle,
            repo: None,
            session: None,
            stats: ReadStats::new(),
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Mutable access to the options; refused once the session is active
    pub fn config_mut(&mut self) -> Result<&mut ReaderConfig> {
        match self.state {
            ReaderState::Idle | ReaderState::Open => Ok(&mut self.config),
            state => Err(RepoError::config(format!(
                "options cannot change while the reader is {}",
                state.as_str()
            ))),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Parsed index, once open
    pub fn metadata(&self) -> Option<&IndexMetadata> {
        self.repo.as_ref().map(|r| &r.metadata)
    }

    /// Offset table, once open
    pub fn offset_table(&self) -> Option<&OffsetTable> {
        self.repo.as_ref().map(|r| r.records.table())
    }

    /// Tensor sequence in effect, rendered as "0,1"
    pub fn tensors_sequence(&self) -> String {
        if let Some(session) = &self.session {
            return session.selection.to_string();
        }
        match (self.config.tensors_sequence(), &self.repo) {
            (Some(selection), _) => selection.to_string(),
            (None, Some(repo)) => {
                TensorSelection::identity(repo.metadata.tensors_per_sample).to_string()
            }
            (None, None) => String::new(),
        }
    }

    /// Records the active session produces in total
    pub fn total_records(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.plan.total_records())
    }

    /// Records still to come in the active session
    pub fn remaining(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.iterator.remaining())
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Parse the index and open the data
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            ReaderState::Idle => {}
            ReaderState::Open => return Ok(()),
            state => {
                return Err(RepoError::config(format!(
                    "cannot open a reader that is {}",
                    state.as_str()
                )))
            }
        }

        match self.open_repo() {
            Ok(repo) => {
                info!("Opened repository: {}", repo.metadata.summary());
                self.repo = Some(repo);
                self.state = ReaderState::Open;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn open_repo(&self) -> Result<OpenRepo> {
        let location = self
            .config
            .location()
            .ok_or_else(|| RepoError::config("no data location configured"))?;
        let index_source =
            IndexSource::from_options(self.config.index_path(), self.config.descriptor())?;

        let mut source = open_source(location)?;
        let parsed = index_source.parse(|stride| source.capacity(stride))?;
        let table = OffsetTable::build(&parsed.metadata, parsed.sample_lengths.as_deref())?;
        source.verify(&table)?;
        info!(
            "Data {} holds {} samples",
            source.describe(),
            table.total_samples()
        );

        let records = RecordReader::new(source, table, &parsed.metadata);
        Ok(OpenRepo {
            key: SourceKey::of(&self.config),
            metadata: parsed.metadata,
            sample_lengths: parsed.sample_lengths,
            records,
        })
    }

    /// Validate the options and activate iteration
    ///
    /// Opens the reader first when needed.
    pub fn start(&mut self) -> Result<()> {
        if self.state == ReaderState::Open {
            let stale = self
                .repo
                .as_ref()
                .map_or(true, |repo| repo.key != SourceKey::of(&self.config));
            if stale {
                info!("Source options changed since open, reopening");
                self.repo = None;
                self.state = ReaderState::Idle;
            }
        }
        if self.state == ReaderState::Idle {
            self.open()?;
        }
        if self.state != ReaderState::Open {
            return Err(RepoError::config(format!(
                "cannot start a reader that is {}",
                self.state.as_str()
            )));
        }

        let plan = match self.repo.as_ref() {
            Some(repo) => validate(&self.config, &repo.metadata, repo.sample_lengths.as_deref()),
            None => Err(RepoError::config("reader is not open")),
        };
        let plan = match plan {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(e)),
        };

        let iterator = SampleIterator::new(plan.range, plan.epochs, plan.shuffle, plan.seed);
        info!(
            "Reader active: samples {}..={}, {} epoch(s), tensors '{}'{}",
            plan.range.start,
            plan.range.stop,
            plan.epochs,
            plan.selection,
            if plan.shuffle { ", shuffled" } else { "" }
        );
        self.session = Some(ActiveSession {
            iterator,
            selection: plan.selection.clone(),
            plan,
        });
        self.stats = ReadStats::new();
        self.state = ReaderState::Active;
        Ok(())
    }

    /// Produce the next record, `None` once every epoch is done
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        match self.state {
            ReaderState::Active => {}
            ReaderState::Exhausted => return Ok(None),
            state => {
                return Err(RepoError::config(format!(
                    "cannot read from a reader that is {}",
                    state.as_str()
                )))
            }
        }

        let (session, repo) = match (self.session.as_mut(), self.repo.as_mut()) {
            (Some(session), Some(repo)) => (session, repo),
            _ => return Err(self.fail(RepoError::config("active reader lost its session"))),
        };

        let draw = match session.iterator.next_draw() {
            Some(draw) => draw,
            None => {
                self.state = ReaderState::Exhausted;
                return Ok(None);
            }
        };

        let started = Instant::now();
        let result = repo.records.read(draw.index, &session.selection);
        let exhausted = session.iterator.is_exhausted();

        match result {
            Ok(mut record) => {
                record.epoch = draw.epoch;
                self.stats.record_read(record.len(), started.elapsed());
                if exhausted {
                    self.state = ReaderState::Exhausted;
                }
                Ok(Some(record))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Release the data file and all session state
    pub fn close(&mut self) {
        if self.state == ReaderState::Active {
            if let Some(remaining) = self.remaining() {
                warn!("Closing active reader with {} record(s) unread", remaining);
            }
        }
        self.session = None;
        self.repo = None;
        self.state = ReaderState::Idle;
    }

    fn fail(&mut self, err: RepoError) -> RepoError {
        error!("Reader failed: {}", err);
        self.session = None;
        self.repo = None;
        self.state = ReaderState::Failed;
        err
    }
}

impl Iterator for RepoReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ErrorKind;
    use std::path::Path;

    const CAPS: &str =
        "other/tensors, format=static, num_tensors=2, dimensions=2.1, types=uint8.uint8";

    fn write_data(dir: &Path, samples: u8) -> PathBuf {
        let path = dir.join("repo.data");
        let bytes: Vec<u8> = (0..samples).flat_map(|s| [s, s, 100 + s]).collect();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_data(dir.path(), 4);

        let mut config = ReaderConfig::with_descriptor(&data, CAPS);
        config.set_stop_sample_index(3);
        config.set_shuffle(false);
        let mut reader = RepoReader::new(config);
        assert_eq!(reader.state(), ReaderState::Idle);

        reader.open().unwrap();
        assert_eq!(reader.state(), ReaderState::Open);
        assert_eq!(reader.metadata().unwrap().total_samples, 4);
        assert_eq!(reader.tensors_sequence(), "0,1");

        reader.start().unwrap();
        assert_eq!(reader.state(), ReaderState::Active);
        assert_eq!(reader.total_records(), Some(4));

        let mut seen = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            seen.push(record.sample_index);
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(reader.state(), ReaderState::Exhausted);
        assert!(reader.next_record().unwrap().is_none());
        assert_eq!(reader.stats().records(), 4);
        assert_eq!(reader.stats().bytes(), 12);

        reader.close();
        assert_eq!(reader.state(), ReaderState::Idle);
        assert!(reader.metadata().is_none());
    }

    #[test]
    fn test_options_frozen_while_active() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_data(dir.path(), 4);

        let mut reader = RepoReader::new(ReaderConfig::with_descriptor(&data, CAPS));
        reader.config_mut().unwrap().set_epochs(2);
        reader.start().unwrap();

        let err = reader.config_mut().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(reader.config().epochs(), 2);

        reader.close();
        reader.config_mut().unwrap().set_epochs(3);
        assert_eq!(reader.config().epochs(), 3);
    }

    #[test]
    fn test_start_failure_releases_resources() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_data(dir.path(), 4);

        let mut config = ReaderConfig::with_descriptor(&data, CAPS);
        config.set_start_sample_index(1000);
        let mut reader = RepoReader::new(config);
        reader.open().unwrap();

        let err = reader.start().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(reader.state(), ReaderState::Failed);
        assert!(reader.metadata().is_none());
        assert_eq!(reader.next_record().unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_reopen_after_source_change() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_data(dir.path(), 4);
        let other = dir.path().join("other.data");
        std::fs::write(&other, vec![7u8; 6]).unwrap();

        let mut reader = RepoReader::new(ReaderConfig::with_descriptor(&data, CAPS));
        reader.open().unwrap();
        assert_eq!(reader.metadata().unwrap().total_samples, 4);

        reader.config_mut().unwrap().set_location(&other);
        reader.start().unwrap();
        assert_eq!(reader.metadata().unwrap().total_samples, 2);
    }

    #[test]
    fn test_missing_index_and_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_data(dir.path(), 4);

        let mut config = ReaderConfig::default();
        config.set_location(&data);
        let mut reader = RepoReader::new(config);
        let err = reader.open().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(reader.state(), ReaderState::Failed);
    }

    #[test]
    fn test_iterator_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_data(dir.path(), 3);

        let mut config = ReaderConfig::with_descriptor(&data, CAPS);
        config.set_stop_sample_index(2);
        config.set_epochs(2);
        let mut reader = RepoReader::new(config);
        reader.start().unwrap();

        let records: Vec<Record> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records.iter().filter(|r| r.epoch == 1).count(), 3);
        for record in &records {
            let s = record.sample_index as u8;
            assert_eq!(record.tensor(0).unwrap(), &[s, s]);
            assert_eq!(record.tensor(1).unwrap(), &[100 + s]);
        }
    }
}
