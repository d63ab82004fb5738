//! Translation store interface and the bundled in-memory implementation
//!
//! The synchronizer and the language session only talk to a store through the
//! [`TranslationStore`] trait, so any localization backend can sit behind it.
//! [`MemoryTranslationStore`] keeps the whole table in an immutable snapshot
//! and swaps in a new one per import: readers see either the old table or the
//! new one, never a mix.

use crate::config::UpdateMode;
use crate::error::SyncResult;
use crate::events::{Observers, SubscriptionId};
use crate::table::{ParsedTable, TranslationEntry, parse_table};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// What an import changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub mode: UpdateMode,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Known languages after the import
    pub languages: usize,
}

/// The narrow capability the synchronizer and session depend on
pub trait TranslationStore: Send + Sync {
    /// Parse `csv` and apply it according to `mode`
    ///
    /// Either the whole table is applied or nothing is.
    fn import_csv(
        &self,
        prefix: &str,
        csv: &str,
        mode: UpdateMode,
        separator: char,
    ) -> SyncResult<ImportReport>;

    /// Tell every dependent view to recompute from the current table
    fn refresh_all(&self);

    /// Known language codes in table order
    fn known_languages(&self) -> Vec<String>;

    /// Look up a term for a language; `None` when the term or the translation is missing
    fn translate(&self, term: &str, language: &str) -> Option<String>;
}

/// Immutable view of the store at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSnapshot {
    pub languages: Vec<String>,
    pub entries: BTreeMap<String, TranslationEntry>,
}

impl TableSnapshot {
    /// Build the post-import snapshot without touching `self`
    fn merged(&self, table: ParsedTable, mode: UpdateMode) -> (TableSnapshot, ImportReport) {
        let mut report = ImportReport {
            mode,
            added: 0,
            updated: 0,
            removed: 0,
            languages: 0,
        };

        let next = match mode {
            UpdateMode::Replace => {
                for key in table.entries.keys() {
                    if self.entries.contains_key(key) {
                        report.updated += 1;
                    } else {
                        report.added += 1;
                    }
                }
                report.removed = self
                    .entries
                    .keys()
                    .filter(|key| !table.entries.contains_key(*key))
                    .count();
                TableSnapshot {
                    languages: table.languages,
                    entries: table.entries,
                }
            }
            UpdateMode::AddOnly => {
                let mut next = self.clone();
                next.append_languages(&table.languages);
                for (key, entry) in table.entries {
                    if !next.entries.contains_key(&key) {
                        next.entries.insert(key, entry);
                        report.added += 1;
                    }
                }
                next
            }
            UpdateMode::Merge => {
                let mut next = self.clone();
                next.append_languages(&table.languages);
                for (key, incoming) in table.entries {
                    match next.entries.get_mut(&key) {
                        Some(existing) => {
                            for language in &table.languages {
                                match incoming.translations.get(language) {
                                    Some(text) => {
                                        existing
                                            .translations
                                            .insert(language.clone(), text.clone());
                                    }
                                    None => {
                                        existing.translations.remove(language);
                                    }
                                }
                            }
                            report.updated += 1;
                        }
                        None => {
                            next.entries.insert(key, incoming);
                            report.added += 1;
                        }
                    }
                }
                next
            }
        };

        report.languages = next.languages.len();
        (next, report)
    }

    fn append_languages(&mut self, languages: &[String]) {
        for language in languages {
            if !self.languages.contains(language) {
                self.languages.push(language.clone());
            }
        }
    }
}

/// In-memory [`TranslationStore`] backed by swapped snapshots
pub struct MemoryTranslationStore {
    snapshot: RwLock<Arc<TableSnapshot>>,
    // Held from clone to swap so two imports never build on the same base.
    write_lock: Mutex<()>,
    revision: AtomicU64,
    refresh: Observers<u64>,
}

impl MemoryTranslationStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(TableSnapshot::default())),
            write_lock: Mutex::new(()),
            revision: AtomicU64::new(0),
            refresh: Observers::new(),
        }
    }

    /// The current table; cheap to call and safe to hold across imports
    pub fn snapshot(&self) -> Arc<TableSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn entry(&self, key: &str) -> Option<TranslationEntry> {
        self.snapshot.read().entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().entries.is_empty()
    }

    /// Number of refresh broadcasts so far
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Register a listener for [`TranslationStore::refresh_all`]; it receives the new revision
    pub fn on_refresh<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&u64) + Send + Sync + 'static,
    {
        self.refresh.subscribe(listener)
    }

    pub fn unsubscribe_refresh(&self, id: SubscriptionId) -> bool {
        self.refresh.unsubscribe(id)
    }
}

impl Default for MemoryTranslationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryTranslationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.read();
        f.debug_struct("MemoryTranslationStore")
            .field("languages", &snapshot.languages)
            .field("entries", &snapshot.entries.len())
            .field("revision", &self.revision())
            .finish()
    }
}

impl TranslationStore for MemoryTranslationStore {
    fn import_csv(
        &self,
        prefix: &str,
        csv: &str,
        mode: UpdateMode,
        separator: char,
    ) -> SyncResult<ImportReport> {
        let table = parse_table(csv, separator, prefix)?;

        let _guard = self.write_lock.lock();
        let base = self.snapshot();
        let (next, report) = base.merged(table, mode);
        *self.snapshot.write() = Arc::new(next);

        debug!(
            "Applied table ({}): {} added, {} updated, {} removed, {} languages",
            mode, report.added, report.updated, report.removed, report.languages
        );
        Ok(report)
    }

    fn refresh_all(&self) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        self.refresh.notify(&revision);
    }

    fn known_languages(&self) -> Vec<String> {
        self.snapshot.read().languages.clone()
    }

    fn translate(&self, term: &str, language: &str) -> Option<String> {
        self.snapshot
            .read()
            .entries
            .get(term)
            .and_then(|entry| entry.get(language))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    const BASE: &str = "key,en,es\nHELLO,Hello,Hola\nBYE,Bye,Adios\n";
    const INCOMING: &str = "key,en,fr\nHELLO,Hi,Salut\nNEW,New,Nouveau\n";

    fn seeded() -> MemoryTranslationStore {
        let store = MemoryTranslationStore::new();
        store
            .import_csv("", BASE, UpdateMode::Replace, ',')
            .unwrap();
        store
    }

    // ========== Replace Mode ==========

    #[test]
    fn test_replace_yields_exactly_incoming_table() {
        let store = seeded();
        let report = store
            .import_csv("", INCOMING, UpdateMode::Replace, ',')
            .unwrap();

        let snapshot = store.snapshot();
        let keys: Vec<&str> = snapshot.entries.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["HELLO", "NEW"]);
        assert_eq!(snapshot.languages, vec!["en", "fr"]);
        assert_eq!(store.translate("HELLO", "es"), None);
        assert_eq!(store.translate("HELLO", "en"), Some("Hi".to_string()));
        assert_eq!(
            report,
            ImportReport {
                mode: UpdateMode::Replace,
                added: 1,
                updated: 1,
                removed: 1,
                languages: 2,
            }
        );
    }

    #[test]
    fn test_replace_into_empty_store() {
        let store = MemoryTranslationStore::new();
        store
            .import_csv("", "key,en\nHELLO,Hi\n", UpdateMode::Replace, ',')
            .unwrap();

        let mut expected = BTreeMap::new();
        expected.insert(
            "HELLO".to_string(),
            TranslationEntry::new("HELLO").with_translation("en", "Hi"),
        );
        assert_eq!(store.snapshot().entries, expected);
        assert_eq!(store.known_languages(), vec!["en"]);
    }

    // ========== AddOnly Mode ==========

    #[test]
    fn test_add_only_never_overwrites() {
        let store = seeded();
        let before = store.snapshot();
        let report = store
            .import_csv("", INCOMING, UpdateMode::AddOnly, ',')
            .unwrap();

        assert_eq!(store.entry("HELLO"), before.entries.get("HELLO").cloned());
        assert_eq!(store.entry("BYE"), before.entries.get("BYE").cloned());
        assert_eq!(store.translate("NEW", "fr"), Some("Nouveau".to_string()));
        assert_eq!(store.known_languages(), vec!["en", "es", "fr"]);
        assert_eq!(report.added, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.removed, 0);
    }

    // ========== Merge Mode ==========

    #[test]
    fn test_merge_overwrites_overlap_and_keeps_rest() {
        let store = seeded();
        let report = store
            .import_csv("", INCOMING, UpdateMode::Merge, ',')
            .unwrap();

        // Overlapping key takes incoming values for incoming languages
        assert_eq!(store.translate("HELLO", "en"), Some("Hi".to_string()));
        assert_eq!(store.translate("HELLO", "fr"), Some("Salut".to_string()));
        // Languages missing from the table keep their values
        assert_eq!(store.translate("HELLO", "es"), Some("Hola".to_string()));
        // Keys missing from the table are kept
        assert_eq!(store.translate("BYE", "en"), Some("Bye".to_string()));
        assert_eq!(store.translate("NEW", "en"), Some("New".to_string()));
        assert_eq!(report.added, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.languages, 3);
    }

    #[test]
    fn test_merge_empty_cell_clears_translation() {
        let store = seeded();
        store
            .import_csv("", "key,es\nBYE,\n", UpdateMode::Merge, ',')
            .unwrap();
        assert_eq!(store.translate("BYE", "es"), None);
        assert_eq!(store.translate("BYE", "en"), Some("Bye".to_string()));
    }

    // ========== Atomicity ==========

    #[test]
    fn test_failed_import_leaves_store_untouched() {
        let store = seeded();
        let before = store.snapshot();

        for mode in [UpdateMode::Replace, UpdateMode::AddOnly, UpdateMode::Merge] {
            let result = store.import_csv("", "key,Type,Desc\nHELLO,,\n", mode, ',');
            assert!(matches!(result, Err(SyncError::Import(_))));
            assert_eq!(*store.snapshot(), *before);
        }
    }

    #[test]
    fn test_snapshot_held_across_import_is_stable() {
        let store = seeded();
        let held = store.snapshot();
        store
            .import_csv("", INCOMING, UpdateMode::Replace, ',')
            .unwrap();
        assert!(held.entries.contains_key("BYE"));
        assert!(!store.snapshot().entries.contains_key("BYE"));
    }

    // ========== Refresh Broadcast ==========

    #[test]
    fn test_refresh_notifies_with_revision() {
        let store = MemoryTranslationStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = store.on_refresh(move |revision| sink.lock().push(*revision));

        store.refresh_all();
        store.refresh_all();
        assert!(store.unsubscribe_refresh(id));
        store.refresh_all();

        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(store.revision(), 3);
    }

    #[test]
    fn test_import_does_not_refresh_by_itself() {
        let store = seeded();
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_prefixed_import() {
        let store = MemoryTranslationStore::new();
        store
            .import_csv("Menu", "key,en\nSTART,Start\n", UpdateMode::Replace, ',')
            .unwrap();
        assert_eq!(store.translate("Menu/START", "en"), Some("Start".to_string()));
        assert_eq!(store.translate("START", "en"), None);
    }
}
