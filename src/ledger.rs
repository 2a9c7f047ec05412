// Dedup ledger: `<id>.submitted`, one previously recorded result line per
// line. The file is only ever appended to. Lines are raw bytes; results
// files are not required to be UTF-8.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{ClientError, Result};

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

/// Non-empty lines of a results file, without their `\n` / `\r\n` terminators.
pub fn result_lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    content
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
}

impl Ledger {
    pub fn for_id(dir: &Path, id: &str) -> Self {
        Self {
            path: dir.join(format!("{}.submitted", id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every recorded line. Creates an empty ledger on first use.
    pub fn load(&self) -> Result<HashSet<Vec<u8>>> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.err(e))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(|e| self.err(e))?;
        Ok(result_lines(&content).map(<[u8]>::to_vec).collect())
    }

    /// Appends each line not yet in `seen`, in order, and records it there.
    /// Returns how many lines were written.
    pub fn append_new<'a, I>(&self, lines: I, seen: &mut HashSet<Vec<u8>>) -> Result<usize>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let fresh: Vec<&[u8]> = lines
            .into_iter()
            .filter(|line| !line.is_empty() && seen.insert(line.to_vec()))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let needs_separator = self.ends_without_newline()?;
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.err(e))?;
        let mut out = BufWriter::new(file);

        if needs_separator {
            out.write_all(b"\n").map_err(|e| self.err(e))?;
        }
        for line in &fresh {
            out.write_all(line).map_err(|e| self.err(e))?;
            out.write_all(b"\n").map_err(|e| self.err(e))?;
        }
        out.flush().map_err(|e| self.err(e))?;
        Ok(fresh.len())
    }

    // A hand-edited ledger may lack its final newline.
    fn ends_without_newline(&self) -> Result<bool> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(self.err(e)),
        };
        let len = file.metadata().map_err(|e| self.err(e))?.len();
        if len == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1)).map_err(|e| self.err(e))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).map_err(|e| self.err(e))?;
        Ok(last[0] != b'\n')
    }

    fn err(&self, source: std::io::Error) -> ClientError {
        ClientError::io(&self.path, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_creates_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::for_id(dir.path(), "17");

        let seen = ledger.load().unwrap();

        assert!(seen.is_empty());
        assert_eq!(ledger.path(), dir.path().join("17.submitted"));
        assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "");
    }

    #[test]
    fn test_append_in_order_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::for_id(dir.path(), "1");
        let mut seen = ledger.load().unwrap();

        let written = ledger
            .append_new(result_lines(b"a\nb\na\nc\n\n"), &mut seen)
            .unwrap();

        assert_eq!(written, 3);
        assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "a\nb\nc\n");
    }

    #[test]
    fn test_append_skips_known_lines() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::for_id(dir.path(), "1");
        fs::write(ledger.path(), "a\nb\n").unwrap();

        let mut seen = ledger.load().unwrap();
        let written = ledger.append_new([&b"b"[..], b"c", b"a"], &mut seen).unwrap();

        assert_eq!(written, 1);
        assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "a\nb\nc\n");
        assert_eq!(ledger.load().unwrap().len(), 3);
    }

    #[test]
    fn test_nothing_new_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::for_id(dir.path(), "1");
        fs::write(ledger.path(), "a\n").unwrap();

        let mut seen = ledger.load().unwrap();
        assert_eq!(ledger.append_new([&b"a"[..]], &mut seen).unwrap(), 0);
        assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "a\n");
    }

    #[test]
    fn test_missing_trailing_newline_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::for_id(dir.path(), "1");
        fs::write(ledger.path(), "a").unwrap();

        let mut seen = ledger.load().unwrap();
        ledger.append_new([&b"b"[..]], &mut seen).unwrap();

        assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_crlf_results_compare_equal() {
        let lines: Vec<&[u8]> = result_lines(b"a\r\nb\r\n").collect();
        assert_eq!(lines, vec![&b"a"[..], b"b"]);
    }

    #[test]
    fn test_non_utf8_lines_are_recorded_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::for_id(dir.path(), "1");
        fs::write(ledger.path(), b"5f4d:caf\xe9\n").unwrap();

        let mut seen = ledger.load().unwrap();
        assert!(seen.contains(&b"5f4d:caf\xe9"[..]));

        let content = b"5f4d:caf\xe9\r\n\xff\xfe:x\n";
        let written = ledger.append_new(result_lines(content), &mut seen).unwrap();

        assert_eq!(written, 1);
        assert_eq!(fs::read(ledger.path()).unwrap(), b"5f4d:caf\xe9\n\xff\xfe:x\n");
    }
}
