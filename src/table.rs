//! Reader for spreadsheet-exported translation tables
//!
//! The first row is a header. Its first column holds the term key, `Type` and
//! `Desc` columns are exporter metadata and are ignored, and every other
//! column is a language:
//!
//! ```text
//! Key,Type,Desc,English,Spanish [es]
//! MENU/START,Text,,Start,Empezar
//! ```

use crate::error::{SyncError, SyncResult};
use serde::Serialize;
use std::collections::BTreeMap;

/// One term key and its per-language text
///
/// A language without an entry in `translations` is untranslated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationEntry {
    pub key: String,
    pub translations: BTreeMap<String, String>,
}

impl TranslationEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            translations: BTreeMap::new(),
        }
    }

    pub fn with_translation(mut self, language: &str, text: &str) -> Self {
        self.translations
            .insert(language.to_string(), text.to_string());
        self
    }

    pub fn get(&self, language: &str) -> Option<&str> {
        self.translations.get(language).map(String::as_str)
    }
}

/// A fully parsed table, not yet applied to any store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    /// Language columns in header order
    pub languages: Vec<String>,
    pub entries: BTreeMap<String, TranslationEntry>,
}

const METADATA_COLUMNS: [&str; 2] = ["type", "desc"];

/// Parse CSV text into a [`ParsedTable`]
///
/// Rows with an empty key are skipped; when a key repeats, the later row wins.
/// A non-empty `prefix` is joined to every key as `prefix/key`.
///
/// # Errors
///
/// `SyncError::Import` for a non-ASCII separator, malformed CSV, a header
/// without language columns, or a language column that appears twice.
pub fn parse_table(csv_text: &str, separator: char, prefix: &str) -> SyncResult<ParsedTable> {
    if !separator.is_ascii() {
        return Err(SyncError::Import(format!(
            "Separator '{}' is not a single-byte character",
            separator
        )));
    }

    let text = csv_text.strip_prefix('\u{feff}').unwrap_or(csv_text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut columns: Vec<(usize, String)> = Vec::new();
    for (index, raw) in headers.iter().enumerate().skip(1) {
        let name = language_name(raw);
        if name.is_empty()
            || METADATA_COLUMNS
                .iter()
                .any(|meta| name.eq_ignore_ascii_case(meta))
        {
            continue;
        }
        if columns.iter().any(|(_, existing)| existing == name) {
            return Err(SyncError::Import(format!(
                "Language column '{}' appears more than once",
                name
            )));
        }
        columns.push((index, name.to_string()));
    }

    if columns.is_empty() {
        return Err(SyncError::Import(
            "Table header has no language columns".to_string(),
        ));
    }

    let mut entries = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let key = record.get(0).unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        let key = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", prefix, key)
        };

        let mut entry = TranslationEntry::new(key.clone());
        for (index, language) in &columns {
            match record.get(*index) {
                Some(text) if !text.is_empty() => {
                    entry.translations.insert(language.clone(), text.to_string());
                }
                _ => {}
            }
        }
        entries.insert(key, entry);
    }

    Ok(ParsedTable {
        languages: columns.into_iter().map(|(_, name)| name).collect(),
        entries,
    })
}

/// `"English [en]"` → `"English"`; anything else is only trimmed
fn language_name(header: &str) -> &str {
    let header = header.trim();
    match header.find('[') {
        Some(open) if header.ends_with(']') => header[..open].trim(),
        _ => header,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_table() {
        let table = parse_table("key,en\nHELLO,Hi\n", ',', "").unwrap();
        assert_eq!(table.languages, vec!["en"]);
        assert_eq!(table.entries.len(), 1);
        assert_eq!(table.entries["HELLO"].get("en"), Some("Hi"));
    }

    #[test]
    fn test_parse_skips_metadata_columns() {
        let csv = "Key,Type,Desc,English,Spanish\nSTART,Text,Main menu,Start,Empezar\n";
        let table = parse_table(csv, ',', "").unwrap();
        assert_eq!(table.languages, vec!["English", "Spanish"]);
        let entry = &table.entries["START"];
        assert_eq!(entry.get("English"), Some("Start"));
        assert_eq!(entry.get("Spanish"), Some("Empezar"));
        assert_eq!(entry.translations.len(), 2);
    }

    #[test]
    fn test_parse_language_code_suffix() {
        let table = parse_table("Key,English [en],French [fr]\nA,a,b\n", ',', "").unwrap();
        assert_eq!(table.languages, vec!["English", "French"]);
    }

    #[test]
    fn test_parse_empty_cells_are_untranslated() {
        let table = parse_table("key,en,fr\nBYE,Bye,\nSHORT,Short\n", ',', "").unwrap();
        assert_eq!(table.entries["BYE"].get("fr"), None);
        assert_eq!(table.entries["SHORT"].get("fr"), None);
        assert_eq!(table.entries["SHORT"].get("en"), Some("Short"));
    }

    #[test]
    fn test_parse_quoted_fields_and_crlf() {
        let csv = "key,en\r\nGREET,\"Hello, \"\"friend\"\"\"\r\nMULTI,\"line one\nline two\"\r\n";
        let table = parse_table(csv, ',', "").unwrap();
        assert_eq!(table.entries["GREET"].get("en"), Some("Hello, \"friend\""));
        assert_eq!(table.entries["MULTI"].get("en"), Some("line one\nline two"));
    }

    #[test]
    fn test_parse_custom_separator() {
        let table = parse_table("key;en;de\nYES;Yes;Ja\n", ';', "").unwrap();
        assert_eq!(table.entries["YES"].get("de"), Some("Ja"));
    }

    #[test]
    fn test_parse_prefix_and_blank_keys() {
        let table = parse_table("key,en\nSTART,Start\n,orphan\n  ,blank\n", ',', "Menu").unwrap();
        assert_eq!(table.entries.len(), 1);
        assert!(table.entries.contains_key("Menu/START"));
        assert_eq!(table.entries["Menu/START"].key, "Menu/START");
    }

    #[test]
    fn test_parse_duplicate_key_later_row_wins() {
        let table = parse_table("key,en\nA,first\nA,second\n", ',', "").unwrap();
        assert_eq!(table.entries["A"].get("en"), Some("second"));
    }

    #[test]
    fn test_parse_strips_bom() {
        let table = parse_table("\u{feff}key,en\nA,a\n", ',', "").unwrap();
        assert!(table.entries.contains_key("A"));
    }

    #[test]
    fn test_parse_rejects_header_without_languages() {
        match parse_table("Key,Type,Desc\nA,Text,\n", ',', "") {
            Err(SyncError::Import(msg)) => assert!(msg.contains("no language columns")),
            other => panic!("Expected Import error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_duplicate_language() {
        match parse_table("key,en,en\nA,a,b\n", ',', "") {
            Err(SyncError::Import(msg)) => assert!(msg.contains("more than once")),
            other => panic!("Expected Import error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_multibyte_separator() {
        assert!(matches!(
            parse_table("key§en\n", '§', ""),
            Err(SyncError::Import(_))
        ));
    }
}
