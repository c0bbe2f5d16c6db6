//! Whole-word keyword search for gazetteer names in free text.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use aho_corasick::{AhoCorasick, MatchKind};

use crate::data::document::{Document, DocumentMatches};
use crate::data::gazetteer::EntryType;
use crate::errors::{Error, Result};

/// Separator placed between body blocks before matching.
pub const BODY_SEPARATOR: &str = "\n";

/// Street name endings that take a genitive inflection ("-straße", "-weg", ...).
#[derive(Debug, Clone, Default)]
pub struct StreetSuffixes {
    suffixes: Vec<String>,
}

impl StreetSuffixes {
    /// One suffix per line; blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Self {
        let suffixes = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_lowercase)
            .collect();
        StreetSuffixes { suffixes }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// Case-insensitive.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }
}

/// Maps every keyword to register onto the name it stands for. Street names
/// with a known suffix also get their "+s" and "+es" genitive forms.
pub fn expand_keywords<I, S>(keywords: I, entry_type: EntryType, suffixes: &StreetSuffixes) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<String> = keywords
        .into_iter()
        .map(|keyword| keyword.as_ref().trim().to_string())
        .filter(|keyword| !keyword.is_empty())
        .collect();

    let mut expanded: BTreeMap<String, String> = names
        .iter()
        .map(|name| (name.clone(), name.clone()))
        .collect();

    if entry_type.is_street() {
        for name in names.iter().filter(|name| suffixes.matches(name)) {
            for ending in ["s", "es"] {
                expanded
                    .entry(format!("{name}{ending}"))
                    .or_insert_with(|| name.clone());
            }
        }
    }
    expanded
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

/// Compiled multi-pattern matcher for one entry type. Immutable once built, so
/// it can be shared between threads.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    entry_type: EntryType,
    automaton: AhoCorasick,
    /// Reported name for each pattern id.
    canonical: Vec<String>,
}

impl KeywordMatcher {
    pub fn build<I, S>(keywords: I, entry_type: EntryType, suffixes: &StreetSuffixes) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let expanded = expand_keywords(keywords, entry_type, suffixes);
        if expanded.is_empty() {
            return Err(Error::EmptyKeywordSet(entry_type.to_string()));
        }

        let (patterns, canonical): (Vec<String>, Vec<String>) = expanded.into_iter().unzip();
        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&patterns)?;

        Ok(KeywordMatcher {
            entry_type,
            automaton,
            canonical,
        })
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn pattern_count(&self) -> usize {
        self.canonical.len()
    }

    /// Counts whole-word occurrences per keyword. Overlapping hits are
    /// resolved in favour of the longer, then the earlier one.
    pub fn count_matches<'a>(&self, text: impl Into<Option<&'a str>>) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        let Some(text) = text.into() else {
            return counts;
        };

        let mut candidates: Vec<(usize, usize, usize)> = self
            .automaton
            .find_overlapping_iter(text)
            .filter(|hit| is_whole_word(text, hit.start(), hit.end()))
            .map(|hit| (hit.start(), hit.end(), hit.pattern().as_usize()))
            .collect();
        candidates.sort_by(|a, b| (b.1 - b.0).cmp(&(a.1 - a.0)).then(a.0.cmp(&b.0)));

        let mut taken: Vec<(usize, usize)> = Vec::new();
        for (start, end, pattern) in candidates {
            if taken.iter().any(|&(s, e)| start < e && s < end) {
                continue;
            }
            taken.push((start, end));
            *counts.entry(self.canonical[pattern].clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Header and body of a document are matched separately.
    pub fn match_document(&self, document: &Document) -> DocumentMatches {
        let body = document.body.join(BODY_SEPARATOR);
        DocumentMatches {
            document_id: document.id.clone(),
            header: self.count_matches(document.header().unwrap_or("")),
            body: self.count_matches(body.as_str()),
        }
    }
}
