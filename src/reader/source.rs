//! Sample byte sources
//!
//! A source hands out the raw bytes of a sample. The usual source is one
//! flat data file addressed by absolute offsets; a location holding a
//! printf-style index pattern (`img_%02d.png`) addresses one file per
//! sample instead.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::layout::{OffsetTable, SampleSpan};
use crate::utils::{RepoError, Result};

/// Random-access provider of sample bytes
pub trait SampleSource {
    /// Fill `buf` with the bytes starting `rel_offset` bytes into a sample
    ///
    /// A range past the end of the underlying file is an IO error.
    fn read_at(&mut self, sample: u64, span: SampleSpan, rel_offset: u64, buf: &mut [u8])
        -> Result<()>;

    /// Check the actual data against the layout declared by the index
    fn verify(&mut self, table: &OffsetTable) -> Result<()>;

    /// Number of whole samples of `stride` bytes the data holds
    fn capacity(&mut self, stride: u64) -> Result<u64>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Open the source for a location
///
/// An existing regular file is always read as one flat file, even when its
/// name contains `%`.
pub fn open_source(location: &Path) -> Result<Box<dyn SampleSource>> {
    if location.is_file() {
        return Ok(Box::new(FileSource::open(location)?));
    }
    if let Some(pattern) = location.to_str().and_then(SequencePattern::parse) {
        debug!("Location {:?} is a file sequence", location);
        return Ok(Box::new(FileSequenceSource::new(pattern)));
    }
    Ok(Box::new(FileSource::open(location)?))
}

/// One flat data file, samples addressed by absolute offset
pub struct FileSource {
    path: PathBuf,
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(RepoError::io(path))?;
        let meta = file.metadata().map_err(RepoError::io(path))?;
        if !meta.is_file() {
            return Err(RepoError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len: meta.len(),
        })
    }

    /// File length at open time
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl SampleSource for FileSource {
    fn read_at(
        &mut self,
        _sample: u64,
        span: SampleSpan,
        rel_offset: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(span.offset + rel_offset))
            .map_err(RepoError::io(&self.path))?;
        self.file.read_exact(buf).map_err(RepoError::io(&self.path))
    }

    fn verify(&mut self, table: &OffsetTable) -> Result<()> {
        table.verify_data_len(self.len)
    }

    fn capacity(&mut self, stride: u64) -> Result<u64> {
        if stride == 0 {
            return Err(RepoError::format("sample stride is zero"));
        }
        let trailing = self.len % stride;
        if trailing != 0 {
            warn!(
                "{} has {} trailing bytes after the last {}-byte sample",
                self.path.display(),
                trailing,
                stride
            );
        }
        Ok(self.len / stride)
    }

    fn describe(&self) -> String {
        format!("{} ({} bytes)", self.path.display(), self.len)
    }
}

/// printf-style sample index pattern (`%d`, `%05d`, `%%` for a literal `%`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePattern {
    prefix: String,
    width: usize,
    zero_pad: bool,
    suffix: String,
}

impl SequencePattern {
    /// Recognize a pattern; `None` when the location is a plain path
    ///
    /// Exactly one `%[0][width]d` conversion is required. Any other use of
    /// `%` besides `%%` makes the location a plain path.
    pub fn parse(location: &str) -> Option<Self> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut conversion: Option<(usize, bool)> = None;
        let mut chars = location.chars().peekable();

        while let Some(c) = chars.next() {
            let out = if conversion.is_some() { &mut suffix } else { &mut prefix };
            if c != '%' {
                out.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
                continue;
            }

            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            if chars.next() != Some('d') || conversion.is_some() {
                return None;
            }
            let width = if digits.is_empty() {
                0
            } else {
                digits.parse().ok()?
            };
            conversion = Some((width, digits.starts_with('0')));
        }

        let (width, zero_pad) = conversion?;
        Some(Self {
            prefix,
            width,
            zero_pad,
            suffix,
        })
    }

    /// Path of the file holding `sample`
    pub fn path_for(&self, sample: u64) -> PathBuf {
        let number = if self.zero_pad {
            format!("{:0width$}", sample, width = self.width)
        } else {
            format!("{:width$}", sample, width = self.width)
        };
        PathBuf::from(format!("{}{}{}", self.prefix, number, self.suffix))
    }
}

/// One file per sample
pub struct FileSequenceSource {
    pattern: SequencePattern,
}

impl FileSequenceSource {
    pub fn new(pattern: SequencePattern) -> Self {
        Self { pattern }
    }

    fn file_len(path: &Path) -> Result<u64> {
        let meta = std::fs::metadata(path).map_err(RepoError::io(path))?;
        Ok(meta.len())
    }
}

impl SampleSource for FileSequenceSource {
    fn read_at(
        &mut self,
        sample: u64,
        _span: SampleSpan,
        rel_offset: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        let path = self.pattern.path_for(sample);
        let mut file = File::open(&path).map_err(RepoError::io(&path))?;
        file.seek(SeekFrom::Start(rel_offset))
            .map_err(RepoError::io(&path))?;
        file.read_exact(buf).map_err(RepoError::io(&path))
    }

    fn verify(&mut self, table: &OffsetTable) -> Result<()> {
        let exact = !matches!(table, OffsetTable::Static { .. });
        for sample in 0..table.total_samples() {
            let span = table.resolve(sample)?;
            let path = self.pattern.path_for(sample);
            let len = Self::file_len(&path)?;
            if len < span.length || (exact && len != span.length) {
                return Err(RepoError::format(format!(
                    "{} has {} bytes but the index declares {}",
                    path.display(),
                    len,
                    span.length
                )));
            }
        }
        Ok(())
    }

    fn capacity(&mut self, stride: u64) -> Result<u64> {
        if stride == 0 {
            return Err(RepoError::format("sample stride is zero"));
        }
        let mut count = 0u64;
        loop {
            let path = self.pattern.path_for(count);
            match std::fs::metadata(&path) {
                Ok(meta) if meta.len() >= stride => count += 1,
                Ok(_) => {
                    warn!("{} is shorter than one sample, sequence ends", path.display());
                    break;
                }
                Err(_) => break,
            }
        }
        Ok(count)
    }

    fn describe(&self) -> String {
        format!(
            "file sequence {}",
            self.pattern.path_for(0).display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ErrorKind;

    #[test]
    fn test_sequence_pattern() {
        let p = SequencePattern::parse("img_%02d.png").unwrap();
        assert_eq!(p.path_for(3), PathBuf::from("img_03.png"));
        assert_eq!(p.path_for(123), PathBuf::from("img_123.png"));

        let p = SequencePattern::parse("/data/s%d.bin").unwrap();
        assert_eq!(p.path_for(7), PathBuf::from("/data/s7.bin"));

        assert!(SequencePattern::parse("mnist.data").is_none());
        assert!(SequencePattern::parse("100%.data").is_none());
        assert!(SequencePattern::parse("a%d_%d").is_none());
        assert!(SequencePattern::parse("50%x.bin").is_none());
        assert!(SequencePattern::parse("50%%done.bin").is_none());

        let p = SequencePattern::parse("100%%_%03d.raw").unwrap();
        assert_eq!(p.path_for(7), PathBuf::from("100%_007.raw"));

        let p = SequencePattern::parse("s%3d.raw").unwrap();
        assert_eq!(p.path_for(7), PathBuf::from("s  7.raw"));
    }

    #[test]
    fn test_existing_file_with_percent_is_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("50%done.bin");
        std::fs::write(&path, vec![9u8; 8]).unwrap();

        let mut src = open_source(&path).unwrap();
        assert_eq!(src.capacity(4).unwrap(), 2);
        let mut buf = [0u8; 2];
        src.read_at(1, SampleSpan { offset: 4, length: 4 }, 1, &mut buf)
            .unwrap();
        assert_eq!(buf, [9, 9]);
        assert!(src.describe().contains("8 bytes"));
    }

    #[test]
    fn test_file_source_reads_and_short_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.data");
        std::fs::write(&path, (0u8..20).collect::<Vec<u8>>()).unwrap();

        let mut src = FileSource::open(&path).unwrap();
        assert_eq!(src.len(), 20);

        let span = SampleSpan { offset: 10, length: 10 };
        let mut buf = [0u8; 4];
        src.read_at(1, span, 2, &mut buf).unwrap();
        assert_eq!(buf, [12, 13, 14, 15]);

        let span = SampleSpan { offset: 18, length: 10 };
        let mut buf = [0u8; 10];
        let err = src.read_at(2, span, 0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_file_source_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.data");
        std::fs::write(&path, vec![0u8; 35]).unwrap();
        let mut src = FileSource::open(&path).unwrap();
        assert_eq!(src.capacity(10).unwrap(), 3);
        assert_eq!(src.capacity(0).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn test_missing_file() {
        let err = FileSource::open(Path::new("/nonexistent/x.data")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);

        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::open(dir.path()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_file_sequence() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3u8 {
            let path = dir.path().join(format!("img_{:02}.raw", i));
            std::fs::write(&path, vec![i; 8]).unwrap();
        }
        let location = dir.path().join("img_%02d.raw");
        let mut src = open_source(&location).unwrap();
        assert_eq!(src.capacity(8).unwrap(), 3);
        assert_eq!(src.capacity(9).unwrap(), 0);

        let mut buf = [0u8; 3];
        src.read_at(2, SampleSpan { offset: 16, length: 8 }, 5, &mut buf)
            .unwrap();
        assert_eq!(buf, [2, 2, 2]);

        let err = src
            .read_at(3, SampleSpan { offset: 24, length: 8 }, 0, &mut buf)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
