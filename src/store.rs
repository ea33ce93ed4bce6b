use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::catalog::Catalog;
use crate::limits::MAX_TIMESTAMP;
use crate::model::{Holder, Reservation, Secs, Span};

#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "reservation store {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
        }
    }
}

/// Why a stored line was skipped on load.
#[derive(Debug, PartialEq, Eq)]
pub enum LineError {
    MissingField(&'static str),
    BadTimestamp(String),
    EmptySpan { start: Secs, end: Secs },
    TimestampOutOfRange(Secs),
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::MissingField(field) => write!(f, "missing {field}"),
            LineError::BadTimestamp(raw) => write!(f, "bad timestamp {raw:?}"),
            LineError::EmptySpan { start, end } => write!(f, "end {end} not after start {start}"),
            LineError::TimestampOutOfRange(t) => {
                write!(f, "timestamp {t} outside 0..={MAX_TIMESTAMP}")
            }
        }
    }
}

/// Encode one reservation as
/// `<resource> <start> <end> <holder> <info>`.
pub fn encode_line(resource_id: &str, r: &Reservation) -> String {
    format!(
        "{resource_id} {} {} {} {}",
        r.span.start, r.span.end, r.holder, r.info
    )
}

/// Split off the next whitespace-delimited token.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

fn parse_secs(raw: &str) -> Result<Secs, LineError> {
    let secs: Secs = raw
        .parse()
        .map_err(|_| LineError::BadTimestamp(raw.to_string()))?;
    if !(0..=MAX_TIMESTAMP).contains(&secs) {
        return Err(LineError::TimestampOutOfRange(secs));
    }
    Ok(secs)
}

pub fn decode_line(line: &str) -> Result<(String, Reservation), LineError> {
    let (resource_id, rest) = next_token(line).ok_or(LineError::MissingField("resource id"))?;
    let (start, rest) = next_token(rest).ok_or(LineError::MissingField("start"))?;
    let (end, rest) = next_token(rest).ok_or(LineError::MissingField("end"))?;
    let (holder, rest) = next_token(rest).ok_or(LineError::MissingField("session"))?;

    let start = parse_secs(start)?;
    let end = parse_secs(end)?;
    if end <= start {
        return Err(LineError::EmptySpan { start, end });
    }

    let holder = Holder::parse(holder);
    let info = rest.trim_start().to_string();
    Ok((
        resource_id.to_string(),
        Reservation::new(holder, info, Span::new(start, end)),
    ))
}

/// Flat-file reservation store, fully rewritten on every save.
///
/// The rewrite truncates the file in place; a crash mid-write leaves a truncated store.
pub struct ReservationStore {
    path: PathBuf,
}

impl ReservationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Read every reservation whose resource exists in `catalog`.
    /// A missing file is an empty store; malformed lines are skipped.
    pub fn load(&self, catalog: &Catalog) -> Result<Vec<(String, Reservation)>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        let mut loaded = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(line) {
                Ok((resource_id, reservation)) => {
                    if catalog.contains(&resource_id) {
                        loaded.push((resource_id, reservation));
                    } else {
                        tracing::debug!("dropping reservation for unknown resource {resource_id}");
                    }
                }
                Err(e) => warn!("{}:{}: skipping line: {e}", self.path.display(), lineno + 1),
            }
        }
        Ok(loaded)
    }

    /// Replace the store contents. Returns the number of lines written.
    pub fn write<'a, I>(&mut self, snapshot: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a [Reservation])>,
    {
        let file = File::create(&self.path).map_err(|e| self.io_err(e))?;
        let mut writer = BufWriter::new(file);
        let mut written = 0usize;
        for (resource_id, reservations) in snapshot {
            for r in reservations {
                writeln!(writer, "{}", encode_line(resource_id, r)).map_err(|e| self.io_err(e))?;
                written += 1;
            }
        }
        writer.flush().map_err(|e| self.io_err(e))?;
        writer.get_ref().sync_all().map_err(|e| self.io_err(e))?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("bookit_test_store");
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn catalog() -> Catalog {
        Catalog::parse("id cluster9\n\n.\nid dev1\n\n.\n")
    }

    #[test]
    fn encode_matches_store_format() {
        let r = Reservation::new(
            Holder::Session("abcd1234".into()),
            "mperron",
            Span::new(1704479574, 1704483174),
        );
        assert_eq!(
            encode_line("cluster9", &r),
            "cluster9 1704479574 1704483174 abcd1234 mperron"
        );
    }

    #[test]
    fn decode_keeps_rest_of_line_as_info() {
        let (rid, r) = decode_line("cluster9 100 200 tok Jane  Doe (lab)").unwrap();
        assert_eq!(rid, "cluster9");
        assert_eq!(r.span, Span::new(100, 200));
        assert_eq!(r.holder, Holder::Session("tok".into()));
        assert_eq!(r.info, "Jane  Doe (lab)");
    }

    #[test]
    fn decode_open_slot_with_empty_info() {
        let (_, r) = decode_line("cluster9 100 200 open ").unwrap();
        assert_eq!(r.holder, Holder::Open);
        assert_eq!(r.info, "");
    }

    #[test]
    fn decode_rejects_malformed() {
        assert_eq!(
            decode_line("cluster9 100 200"),
            Err(LineError::MissingField("session"))
        );
        assert_eq!(
            decode_line("cluster9 abc 200 tok x"),
            Err(LineError::BadTimestamp("abc".into()))
        );
        assert_eq!(
            decode_line("cluster9 200 200 tok x"),
            Err(LineError::EmptySpan { start: 200, end: 200 })
        );
    }

    #[test]
    fn decode_rejects_timestamps_out_of_range() {
        assert_eq!(
            decode_line("cluster9 0 9223372036854775807 other far"),
            Err(LineError::TimestampOutOfRange(i64::MAX))
        );
        assert_eq!(
            decode_line("cluster9 -5 200 tok x"),
            Err(LineError::TimestampOutOfRange(-5))
        );
        assert!(decode_line(&format!("cluster9 0 {MAX_TIMESTAMP} tok x")).is_ok());
    }

    #[test]
    fn write_then_load() {
        let path = tmp_path("write_then_load.txt");
        let _ = fs::remove_file(&path);
        let mut store = ReservationStore::new(&path);

        let a = vec![
            Reservation::new(Holder::Session("s1".into()), "alice", Span::new(100, 200)),
            Reservation::new(Holder::Open, "", Span::new(201, 300)),
        ];
        let b = vec![Reservation::new(Holder::Session("s2".into()), "bob smith", Span::new(50, 90))];

        let written = store
            .write([("cluster9", a.as_slice()), ("dev1", b.as_slice())])
            .unwrap();
        assert_eq!(written, 3);

        let loaded = store.load(&catalog()).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0], ("cluster9".to_string(), a[0].clone()));
        assert_eq!(loaded[1], ("cluster9".to_string(), a[1].clone()));
        assert_eq!(loaded[2], ("dev1".to_string(), b[0].clone()));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn load_skips_unknown_and_garbage() {
        let path = tmp_path("skips_unknown.txt");
        fs::write(
            &path,
            "ghost 100 200 tok x\ncluster9 100 200 tok ok\n\nnot a line\ndev1 5 1 tok x\n",
        )
        .unwrap();
        let loaded = ReservationStore::new(&path).load(&catalog()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "cluster9");
        assert_eq!(loaded[0].1.info, "ok");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn load_nonexistent_file() {
        let path = tmp_path("nonexistent.txt");
        let _ = fs::remove_file(&path);
        let loaded = ReservationStore::new(&path).load(&catalog()).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn write_truncates_previous_contents() {
        let path = tmp_path("truncates.txt");
        let mut store = ReservationStore::new(&path);
        let many: Vec<_> = (0..10)
            .map(|i| Reservation::new(Holder::Session("s".into()), "x", Span::new(i * 10, i * 10 + 5)))
            .collect();
        store.write([("cluster9", many.as_slice())]).unwrap();
        store.write([("cluster9", &many[..1])]).unwrap();
        let loaded = store.load(&catalog()).unwrap();
        assert_eq!(loaded.len(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn write_to_missing_directory_fails() {
        let path = std::env::temp_dir()
            .join("bookit_test_store_missing_dir")
            .join("nested")
            .join("reservations.txt");
        let _ = fs::remove_dir_all(std::env::temp_dir().join("bookit_test_store_missing_dir"));
        let mut store = ReservationStore::new(&path);
        let err = store.write(std::iter::empty()).unwrap_err();
        assert!(err.to_string().contains("reservation store"));
    }
}
