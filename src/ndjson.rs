use crate::util::{create_with_backoff, open_with_backoff, replace_file_atomic_backoff, tmp_path_for};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const BUF_BYTES: usize = 64 * 1024;

/// Minimal NDJSON reader with buffering and empty-line trimming.
pub struct NdjsonReader {
    rdr: BufReader<File>,
}

impl NdjsonReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        let f = open_with_backoff(path, 16, 50)?;
        Ok(Self { rdr: BufReader::with_capacity(BUF_BYTES, f) })
    }

    /// Read the next line into `buf`. Returns the number of bytes read (0 on EOF).
    /// Strips trailing `\r?\n`.
    pub fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        buf.clear();
        let n = self.rdr.read_line(buf)?;
        if n == 0 { return Ok(0); }
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') { buf.pop(); }
        }
        Ok(n)
    }
}

/// Typed records read from an NDJSON file, plus the lines that failed validation.
#[derive(Debug)]
pub struct Records<T> {
    pub items: Vec<T>,
    /// 1-based line numbers that did not match the schema.
    pub malformed: Vec<usize>,
}

/// Read every non-empty line of `path` as `T`. Lines that fail to parse are
/// reported in `malformed` rather than aborting the read.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Records<T>> {
    let mut rdr = NdjsonReader::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut items = Vec::new();
    let mut malformed = Vec::new();
    let mut buf = String::with_capacity(16 * 1024);
    let mut lineno = 0usize;
    loop {
        let n = rdr.read_line(&mut buf).with_context(|| format!("read {}", path.display()))?;
        if n == 0 { break; }
        lineno += 1;
        if buf.trim().is_empty() { continue; }
        match serde_json::from_str::<T>(&buf) {
            Ok(v) => items.push(v),
            Err(e) => {
                tracing::warn!("{}:{}: skipping malformed record: {}", path.display(), lineno, e);
                malformed.push(lineno);
            }
        }
    }
    Ok(Records { items, malformed })
}

/// NDJSON writer that always writes to a temp sibling of its destination and
/// only promotes it on `finish_atomic`. Dropping the writer unfinished leaves
/// the destination untouched.
pub struct NdjsonWriter {
    tmp: PathBuf,
    dest: PathBuf,
    w: Option<BufWriter<File>>,
}

impl NdjsonWriter {
    pub fn create(dest: &Path) -> Result<Self> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let tmp = tmp_path_for(dest);
        let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
        Ok(Self { tmp, dest: dest.to_path_buf(), w: Some(BufWriter::with_capacity(BUF_BYTES, f)) })
    }

    pub fn write_record<T: Serialize>(&mut self, rec: &T) -> Result<()> {
        if let Some(w) = &mut self.w {
            serde_json::to_writer(&mut *w, rec)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Flushes, syncs and atomically promotes the temp file to the destination.
    pub fn finish_atomic(mut self) -> Result<()> {
        if let Some(w) = self.w.take() {
            let f = w
                .into_inner()
                .map_err(|e| e.into_error())
                .with_context(|| format!("flush {}", self.tmp.display()))?;
            f.sync_all().with_context(|| format!("sync {}", self.tmp.display()))?;
        }
        replace_file_atomic_backoff(&self.tmp, &self.dest)
    }
}

impl Drop for NdjsonWriter {
    fn drop(&mut self) {
        // Unfinished: discard the partial temp file.
        if self.w.take().is_some() {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// Write all `records` to `dest` atomically.
pub fn write_records_atomic<'a, T, I>(dest: &Path, records: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut w = NdjsonWriter::create(dest)?;
    let mut n = 0usize;
    for r in records {
        w.write_record(r)?;
        n += 1;
    }
    w.finish_atomic()?;
    Ok(n)
}
