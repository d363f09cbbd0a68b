use std::sync::{Arc, RwLock};

use shared::CorpusEntry;

use super::{CorpusError, PlotCorpus};

/// Process-local corpus
#[derive(Debug, Default)]
pub struct InMemoryCorpus {
    entries: RwLock<Vec<Arc<CorpusEntry>>>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = CorpusEntry>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().map(Arc::new).collect()),
        }
    }
}

impl PlotCorpus for InMemoryCorpus {
    fn snapshot(&self) -> Result<Vec<Arc<CorpusEntry>>, CorpusError> {
        let entries = self.entries.read().map_err(|_| CorpusError::Poisoned)?;
        Ok(entries.clone())
    }

    fn append(&self, entry: CorpusEntry) -> Result<(), CorpusError> {
        let mut entries = self.entries.write().map_err(|_| CorpusError::Poisoned)?;
        entries.push(Arc::new(entry));
        Ok(())
    }

    fn len(&self) -> Result<usize, CorpusError> {
        Ok(self.entries.read().map_err(|_| CorpusError::Poisoned)?.len())
    }
}
