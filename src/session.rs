//! The process-wide active language
//!
//! A [`LanguageSession`] starts uninitialized, becomes active through
//! [`initialize`](LanguageSession::initialize), and from then on only changes
//! through [`set_language`](LanguageSession::set_language), which validates
//! the code against the store's known languages, persists it and notifies
//! every listener before returning.
//!
//! Language changes are serialized: one change runs from validation to the
//! last notification before the next one starts, so the current language,
//! the persisted preference and the last broadcast always agree. Listeners
//! run while the change is held and may call back into the session on the
//! same thread.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::events::{Observers, SubscriptionId};
use crate::preferences::PreferenceStore;
use crate::store::TranslationStore;
use parking_lot::{ReentrantMutex, RwLock};
use std::sync::Arc;
use tracing::{info, warn};

pub struct LanguageSession {
    store: Arc<dyn TranslationStore>,
    preferences: Arc<dyn PreferenceStore>,
    preference_key: String,
    default_language: String,
    load_persisted: bool,
    current: RwLock<Option<String>>,
    /// Held for the whole of a language change
    change_lock: ReentrantMutex<()>,
    listeners: Observers<str>,
}

impl LanguageSession {
    pub fn new(
        store: Arc<dyn TranslationStore>,
        preferences: Arc<dyn PreferenceStore>,
        preference_key: &str,
        default_language: &str,
    ) -> Self {
        Self {
            store,
            preferences,
            preference_key: preference_key.to_string(),
            default_language: default_language.to_string(),
            load_persisted: true,
            current: RwLock::new(None),
            change_lock: ReentrantMutex::new(()),
            listeners: Observers::new(),
        }
    }

    pub fn from_config(
        store: Arc<dyn TranslationStore>,
        preferences: Arc<dyn PreferenceStore>,
        config: &SyncConfig,
    ) -> Self {
        let mut session = Self::new(
            store,
            preferences,
            &config.preference_key,
            &config.default_language,
        );
        session.load_persisted = config.load_persisted_language;
        session
    }

    pub fn is_initialized(&self) -> bool {
        self.current.read().is_some()
    }

    /// Make the session active; this succeeds at most once per session
    ///
    /// A supported `persisted` language wins; otherwise `default_language` is
    /// used. The chosen language is applied like [`set_language`](Self::set_language),
    /// so it is persisted and broadcast.
    ///
    /// # Errors
    ///
    /// `SyncError::Configuration` when the session is already initialized or
    /// when the fallback default is not supported.
    pub fn initialize(&self, default_language: &str, persisted: Option<&str>) -> SyncResult<String> {
        let _change = self.change_lock.lock();
        if self.is_initialized() {
            return Err(SyncError::Configuration(
                "Language session is already initialized".to_string(),
            ));
        }

        if let Some(saved) = persisted {
            if self.set_language(saved) {
                return Ok(saved.to_string());
            }
            warn!("Persisted language '{}' is no longer supported", saved);
        }

        if self.set_language(default_language) {
            Ok(default_language.to_string())
        } else {
            Err(SyncError::Configuration(format!(
                "Default language '{}' is not supported",
                default_language
            )))
        }
    }

    /// [`initialize`](Self::initialize) with the configured default and, when
    /// enabled, the language stored under the preference key
    pub fn initialize_from_preferences(&self) -> SyncResult<String> {
        let persisted = if self.load_persisted {
            self.preferences.get(&self.preference_key)
        } else {
            None
        };
        let default_language = self.default_language.clone();
        self.initialize(&default_language, persisted.as_deref())
    }

    /// Switch to `code`; false (and no change) when it is empty or unknown
    ///
    /// Listeners are notified on every successful call, even when `code` is
    /// already the current language.
    pub fn set_language(&self, code: &str) -> bool {
        let _change = self.change_lock.lock();
        if code.is_empty() || !self.is_supported(code) {
            warn!("Language '{}' is not supported or invalid", code);
            return false;
        }

        *self.current.write() = Some(code.to_string());

        self.preferences.set(&self.preference_key, code);
        if let Err(e) = self.preferences.save() {
            warn!("Failed to persist language '{}': {}", code, e);
        }

        info!("Language changed to: {}", code);
        self.listeners.notify(code);
        true
    }

    /// `None` until the session is initialized
    pub fn current_language(&self) -> Option<String> {
        self.current.read().clone()
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.store.known_languages().iter().any(|known| known == code)
    }

    pub fn available_languages(&self) -> Vec<String> {
        self.store.known_languages()
    }

    /// Translate `term` into the current language
    ///
    /// An empty term yields an empty string; a term without a translation
    /// (or any term before initialization) yields the term itself.
    pub fn translate(&self, term: &str) -> String {
        if term.is_empty() {
            warn!("Translation term is empty");
            return String::new();
        }

        let translation = self
            .current_language()
            .and_then(|language| self.store.translate(term, &language));
        match translation {
            Some(text) => text,
            None => {
                warn!("Translation term not found: {}", term);
                term.to_string()
            }
        }
    }

    /// Advance to the next known language, wrapping around
    ///
    /// When the current language is not known (the session is uninitialized,
    /// or an import removed it) the first known language is selected.
    ///
    /// # Errors
    ///
    /// `SyncError::NoLanguagesAvailable` when the store knows no language.
    pub fn cycle_to_next_language(&self) -> SyncResult<String> {
        let _change = self.change_lock.lock();
        let languages = self.store.known_languages();
        if languages.is_empty() {
            warn!("No languages available");
            return Err(SyncError::NoLanguagesAvailable);
        }

        let current = self.current_language();
        let next = match current
            .as_deref()
            .and_then(|code| languages.iter().position(|known| known == code))
        {
            Some(index) => (index + 1) % languages.len(),
            None => 0,
        };

        let code = languages[next].clone();
        if self.set_language(&code) {
            Ok(code)
        } else {
            // The store changed between the read and the switch.
            Err(SyncError::NoLanguagesAvailable)
        }
    }

    /// Re-check the current language after the store changed
    ///
    /// A language that is still known is kept as is and nothing is broadcast.
    /// Otherwise the session falls back to the default language, or to the
    /// first known language if the default is gone too.
    pub fn revalidate(&self) -> SyncResult<String> {
        let _change = self.change_lock.lock();
        if let Some(current) = self.current_language() {
            if self.is_supported(&current) {
                return Ok(current);
            }
            warn!("Language '{}' was removed from the store", current);
        }

        let default_language = self.default_language.clone();
        if self.set_language(&default_language) {
            return Ok(default_language);
        }

        let first = self
            .store
            .known_languages()
            .into_iter()
            .next()
            .ok_or(SyncError::NoLanguagesAvailable)?;
        if self.set_language(&first) {
            Ok(first)
        } else {
            Err(SyncError::NoLanguagesAvailable)
        }
    }

    /// Listen for language changes; the listener receives the new code
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl std::fmt::Debug for LanguageSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageSession")
            .field("current", &*self.current.read())
            .field("preference_key", &self.preference_key)
            .field("default_language", &self.default_language)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
