//! Name-code registry.
//!
//! Collection, type and field names are written as small integer codes.
//! A name is keyed by `(scope, name)`: collection names live in the empty
//! scope, type and field names in the scope of their collection. Codes start
//! at 1, are issued monotonically and are never reassigned.
//!
//! A persistent registry is only built through [`NameRegistry::open`], which
//! loads every stored code first, so local allocation continues after the
//! store's highest code. One registry allocates against a store at a time;
//! others attached to the same store only resolve.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::{CodecError, Result};

/// Scope of collection names.
pub const COLLECTION_SCOPE: &str = "";

/// A registered name and the scope it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameEntry {
    pub scope: Arc<str>,
    pub name: Arc<str>,
}

impl NameEntry {
    pub fn new(scope: &str, name: &str) -> Self {
        Self {
            scope: Arc::from(scope),
            name: Arc::from(name),
        }
    }
}

/// Backing store the registry persists its codes to.
#[async_trait]
pub trait NameStore: Send + Sync {
    /// Every persisted code.
    async fn load_all(&self) -> Result<Vec<(u32, NameEntry)>>;

    async fn lookup(&self, code: u32) -> Result<Option<NameEntry>>;

    /// Persists newly issued codes.
    async fn append(&self, entries: &[(u32, NameEntry)]) -> Result<()>;
}

/// In-process [`NameStore`].
#[derive(Debug, Default)]
pub struct MemoryNameStore {
    entries: Mutex<BTreeMap<u32, NameEntry>>,
}

impl MemoryNameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl NameStore for MemoryNameStore {
    async fn load_all(&self) -> Result<Vec<(u32, NameEntry)>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .map(|(code, entry)| (*code, entry.clone()))
            .collect())
    }

    async fn lookup(&self, code: u32) -> Result<Option<NameEntry>> {
        Ok(self.entries.lock().get(&code).cloned())
    }

    async fn append(&self, entries: &[(u32, NameEntry)]) -> Result<()> {
        let mut stored = self.entries.lock();
        for (code, entry) in entries {
            match stored.get(code) {
                Some(existing) if existing != entry => {
                    return Err(CodecError::Store(format!(
                        "Code {} already stored for {}/{}",
                        code, existing.scope, existing.name
                    )))
                }
                Some(_) => {}
                None => {
                    stored.insert(*code, entry.clone());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct NameTable {
    codes: HashMap<Arc<str>, HashMap<Arc<str>, u32>>,
    names: HashMap<u32, NameEntry>,
    next_code: u32,
    /// Codes issued since the last flush.
    pending: Vec<u32>,
}

impl Default for NameTable {
    fn default() -> Self {
        Self {
            codes: HashMap::new(),
            names: HashMap::new(),
            next_code: 1,
            pending: Vec::new(),
        }
    }
}

impl NameTable {
    fn get(&self, scope: &str, name: &str) -> Option<u32> {
        self.codes.get(scope)?.get(name).copied()
    }

    /// Records `code` for `entry`, or fails if either side is already bound
    /// to something else.
    fn install(&mut self, code: u32, entry: NameEntry) -> Result<NameEntry> {
        if let Some(existing) = self.names.get(&code) {
            if *existing == entry {
                return Ok(existing.clone());
            }
            return Err(conflict(code, &entry));
        }
        if let Some(other) = self.get(&entry.scope, &entry.name) {
            if other != code {
                return Err(conflict(code, &entry));
            }
        }
        self.codes
            .entry(entry.scope.clone())
            .or_default()
            .insert(entry.name.clone(), code);
        self.names.insert(code, entry.clone());
        self.next_code = self.next_code.max(code.saturating_add(1));
        Ok(entry)
    }
}

fn conflict(code: u32, entry: &NameEntry) -> CodecError {
    CodecError::NameConflict {
        code,
        scope: entry.scope.to_string(),
        name: entry.name.to_string(),
    }
}

/// Shared, thread-safe map between names and their codes.
pub struct NameRegistry {
    table: RwLock<NameTable>,
    store: Option<Arc<dyn NameStore>>,
}

impl fmt::Debug for NameRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameRegistry")
            .field("len", &self.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl Default for NameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NameRegistry {
    /// A registry with no backing store.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(NameTable::default()),
            store: None,
        }
    }

    /// A registry preloaded with every code in `store`. Codes missing
    /// locally are later resolved from `store` on demand, and new codes
    /// are flushed to it.
    pub async fn open(store: Arc<dyn NameStore>) -> Result<Self> {
        let entries = store.load_all().await?;
        let mut table = NameTable::default();
        for (code, entry) in entries {
            table.install(code, entry)?;
        }
        let registry = Self {
            table: RwLock::new(table),
            store: Some(store),
        };
        tracing::debug!(codes = registry.len(), "opened name registry");
        Ok(registry)
    }

    /// Returns the code of `(scope, name)`, allocating one on first sight.
    pub fn code_for(&self, scope: &str, name: &str) -> u32 {
        if let Some(code) = self.table.read().get(scope, name) {
            return code;
        }
        let mut table = self.table.write();
        // another writer may have won between the two locks
        if let Some(code) = table.get(scope, name) {
            return code;
        }
        let code = table.next_code;
        table.next_code += 1;
        let entry = NameEntry::new(scope, name);
        table
            .codes
            .entry(entry.scope.clone())
            .or_default()
            .insert(entry.name.clone(), code);
        table.names.insert(code, entry);
        table.pending.push(code);
        tracing::debug!(code, scope, name, "allocated name code");
        code
    }

    pub fn lookup_code(&self, scope: &str, name: &str) -> Option<u32> {
        self.table.read().get(scope, name)
    }

    /// Returns the name of `code` from the in-memory table only.
    ///
    /// # Errors
    /// `UnknownNameCode` when the code has not been seen by this process;
    /// [`NameRegistry::resolve`] can fetch it from the store.
    pub fn name_for(&self, code: u32) -> Result<NameEntry> {
        self.table
            .read()
            .names
            .get(&code)
            .cloned()
            .ok_or(CodecError::UnknownNameCode(code))
    }

    /// Returns the name of `code`, consulting the store on a miss.
    ///
    /// No lock is held while the store is awaited; the fetched entry is then
    /// installed unless another caller installed a different one first.
    pub async fn resolve(&self, code: u32) -> Result<NameEntry> {
        if let Ok(entry) = self.name_for(code) {
            return Ok(entry);
        }
        let Some(store) = &self.store else {
            return Err(CodecError::UnknownNameCode(code));
        };
        let entry = store
            .lookup(code)
            .await?
            .ok_or(CodecError::UnknownNameCode(code))?;
        tracing::debug!(code, scope = &*entry.scope, name = &*entry.name, "resolved name code");
        self.table.write().install(code, entry)
    }

    /// Codes issued since the last call, in issue order.
    pub fn take_pending(&self) -> Vec<(u32, NameEntry)> {
        let mut table = self.table.write();
        let pending = std::mem::take(&mut table.pending);
        pending
            .into_iter()
            .filter_map(|code| table.names.get(&code).map(|entry| (code, entry.clone())))
            .collect()
    }

    /// Appends newly issued codes to the store. Returns how many were written.
    ///
    /// On failure the codes stay pending and the next flush retries them.
    pub async fn flush(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let pending = self.take_pending();
        if pending.is_empty() {
            return Ok(0);
        }
        if let Err(e) = store.append(&pending).await {
            let mut table = self.table.write();
            let retry = std::mem::take(&mut table.pending);
            table.pending = pending.iter().map(|(code, _)| *code).chain(retry).collect();
            return Err(e);
        }
        Ok(pending.len())
    }

    pub fn len(&self) -> usize {
        self.table.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
