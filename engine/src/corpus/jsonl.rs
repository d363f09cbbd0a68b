use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use shared::CorpusEntry;

use super::{CorpusError, PlotCorpus};

/// Append-only JSON lines corpus, one `CorpusEntry` per line
///
/// The file is read once on open and then mirrored in memory.
#[derive(Debug)]
pub struct JsonlCorpus {
    path: PathBuf,
    entries: RwLock<Vec<Arc<CorpusEntry>>>,
    file: Mutex<File>,
}

impl JsonlCorpus {
    pub fn open(path: &Path) -> Result<Self, CorpusError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut entries = Vec::new();
        let mut unterminated = false;
        if path.exists() {
            let contents = fs::read(path)?;
            let mut offset = 0;
            for (index, line) in contents.split_inclusive(|&b| b == b'\n').enumerate() {
                let start = offset;
                offset += line.len();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }

                let terminated = line.ends_with(b"\n");
                match serde_json::from_slice::<CorpusEntry>(line) {
                    Ok(entry) => {
                        entries.push(Arc::new(entry));
                        unterminated = !terminated;
                    }
                    // A write cut short by a crash leaves a partial last line
                    Err(e) if !terminated => {
                        tracing::warn!(
                            path = %path.display(),
                            line = index + 1,
                            "Dropping torn corpus record: {}",
                            e
                        );
                        OpenOptions::new().write(true).open(path)?.set_len(start as u64)?;
                    }
                    Err(e) => {
                        return Err(CorpusError::InvalidRecord {
                            line: index + 1,
                            message: e.to_string(),
                        })
                    }
                }
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if unterminated {
            file.write_all(b"\n")?;
        }
        tracing::info!(path = %path.display(), entries = entries.len(), "Opened plot corpus");

        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PlotCorpus for JsonlCorpus {
    fn snapshot(&self) -> Result<Vec<Arc<CorpusEntry>>, CorpusError> {
        let entries = self.entries.read().map_err(|_| CorpusError::Poisoned)?;
        Ok(entries.clone())
    }

    fn append(&self, entry: CorpusEntry) -> Result<(), CorpusError> {
        let mut line = serde_json::to_string(&entry).map_err(|e| CorpusError::InvalidRecord {
            line: 0,
            message: e.to_string(),
        })?;
        line.push('\n');

        {
            let mut file = self.file.lock().map_err(|_| CorpusError::Poisoned)?;
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }

        self.entries
            .write()
            .map_err(|_| CorpusError::Poisoned)?
            .push(Arc::new(entry));
        Ok(())
    }
}
