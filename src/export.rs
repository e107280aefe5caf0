use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

/// One JSON object per line, flushed after every record.
pub struct JsonlWriter<W: Write = BufWriter<File>> {
    out: W,
    written: usize,
}

impl JsonlWriter {
    /// Append to `path`, creating it and its parent directories if needed.
    pub fn append(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn appends_lines_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("2024").join("docs.jsonl");

        let mut w = JsonlWriter::append(&path).unwrap();
        w.write(&json!({"n": 1})).unwrap();
        assert_eq!(w.written(), 1);
        drop(w);

        let mut w = JsonlWriter::append(&path).unwrap();
        w.write(&json!({"n": 2, "text": "line\nbreak"})).unwrap();
        drop(w);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![r#"{"n":1}"#, r#"{"n":2,"text":"line\nbreak"}"#]);
    }

    #[test]
    fn writes_to_any_sink() {
        let mut w = JsonlWriter::new(Vec::new());
        w.write(&json!(["a", "b"])).unwrap();
        w.write(&json!(null)).unwrap();
        assert_eq!(String::from_utf8(w.out).unwrap(), "[\"a\",\"b\"]\nnull\n");
    }
}
