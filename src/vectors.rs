//! Persisted session id → embedding vector map.
//!
//! The whole store is held in memory and rewritten on every save. The file
//! is a bincode encoding of [`EmbeddingStore`]: a list of session ids and a
//! parallel list of vectors. Saves go through a temp file in the same
//! directory and a rename, so a reader sees either the old or the new
//! store, never a torn write.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingStore {
    /// Name of the model that produced the vectors, once known.
    pub model: Option<String>,
    /// Length shared by every stored vector; 0 while empty.
    pub dims: usize,
    session_ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingStore {
    /// Load the store at `path`; a missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read embedding store: {}", path.display()))?;
        let store: Self = bincode::deserialize(&bytes)
            .with_context(|| format!("Corrupt embedding store: {}", path.display()))?;
        if store.session_ids.len() != store.vectors.len() {
            bail!(
                "Corrupt embedding store {}: {} ids but {} vectors",
                path.display(),
                store.session_ids.len(),
                store.vectors.len()
            );
        }
        Ok(store)
    }

    /// Atomically replace the file at `path` with this store.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .with_context(|| format!("Failed to write embedding store: {}", path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.session_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session_ids.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.session_ids.iter().any(|id| id == session_id)
    }

    /// Whether `vectors` may be merged: all share one non-zero length,
    /// equal to [`dims`](Self::dims) unless the store is empty.
    pub fn accepts(&self, vectors: &[Vec<f32>]) -> bool {
        let Some(first) = vectors.first() else {
            return true;
        };
        let len = first.len();
        len > 0 && (self.is_empty() || len == self.dims) && vectors.iter().all(|v| v.len() == len)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.session_ids.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.session_ids
            .iter()
            .zip(self.vectors.iter())
            .map(|(id, v)| (id.as_str(), v.as_slice()))
    }

    /// Insert or overwrite. Existing ids keep their position; new ids append.
    pub fn merge(&mut self, pairs: impl IntoIterator<Item = (String, Vec<f32>)>) {
        let mut position: HashMap<String, usize> = self
            .session_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        for (id, vector) in pairs {
            if self.dims == 0 {
                self.dims = vector.len();
            }
            match position.get(&id) {
                Some(&i) => self.vectors[i] = vector,
                None => {
                    position.insert(id.clone(), self.session_ids.len());
                    self.session_ids.push(id);
                    self.vectors.push(vector);
                }
            }
        }
    }

    /// Drop the given ids. Returns how many were present.
    pub fn remove(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.session_ids.len();
        let mut kept_ids = Vec::with_capacity(before);
        let mut kept_vectors = Vec::with_capacity(before);
        for (id, vector) in self.session_ids.drain(..).zip(self.vectors.drain(..)) {
            if !ids.contains(&id) {
                kept_ids.push(id);
                kept_vectors.push(vector);
            }
        }
        self.session_ids = kept_ids;
        self.vectors = kept_vectors;
        if self.session_ids.is_empty() {
            self.dims = 0;
        }
        before - self.session_ids.len()
    }
}
