use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{info, warn};
use strum::IntoEnumIterator;

use crate::classify::keyword_name;
use crate::data::document::{Document, ReferenceEdge};
use crate::data::gazetteer::{AdminLevel, AdminRecord, Category, EntryType, Gazetteer};
use crate::errors::Result;
use crate::etl::{admin_tree, gazetteer, read_json, write_json, Etl};
use crate::matcher::{KeywordMatcher, StreetSuffixes};

pub const ETL_NAME: &str = "match_documents";
pub const OUTPUT_FILE_NAME: &str = "references.json";

pub struct Input {
    gazetteer: Gazetteer,
    admin: Vec<AdminRecord>,
    documents: Vec<Document>,
    suffixes: StreetSuffixes,
}

pub struct MatchDocumentsEtl {
    documents_path: PathBuf,
    suffixes_path: PathBuf,
}

impl MatchDocumentsEtl {
    pub fn new(documents_path: &Path, suffixes_path: &Path) -> MatchDocumentsEtl {
        MatchDocumentsEtl {
            documents_path: documents_path.to_path_buf(),
            suffixes_path: suffixes_path.to_path_buf(),
        }
    }
}

/// One document per line. Lines that do not parse are logged and skipped.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(path)?);
    let mut documents = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Document>(&line) {
            Ok(document) => documents.push(document),
            Err(err) => {
                let message = err.to_string();
                warn!(line = idx + 1, err = message.as_str(); "Skipping unreadable document");
            }
        }
    }
    Ok(documents)
}

/// Names to search for, per entry type. Numbered districts are only known by
/// number and get no keywords.
pub fn keyword_sets(gazetteer: &Gazetteer, admin: &[AdminRecord]) -> BTreeMap<EntryType, BTreeSet<String>> {
    let mut sets: BTreeMap<EntryType, BTreeSet<String>> = Category::iter()
        .map(EntryType::Category)
        .chain(
            AdminLevel::iter()
                .filter(|level| *level != AdminLevel::NumberedDistrict)
                .map(EntryType::Admin),
        )
        .map(|entry_type| (entry_type, BTreeSet::new()))
        .collect();

    let mut add = |entry_type: EntryType, name: &str| {
        if let Some(set) = sets.get_mut(&entry_type) {
            set.insert(name.to_string());
        }
    };

    for street in &gazetteer.streets {
        add(EntryType::Category(Category::Street), &street.name);
    }
    for poi in &gazetteer.points_of_interest {
        if let Some(name) = &poi.name {
            for label in &poi.labels {
                add(EntryType::Category(*label), keyword_name(name));
            }
        }
    }
    for record in admin {
        add(EntryType::Admin(record.level), &record.name);
    }
    sets
}

pub fn build_matchers(
    sets: &BTreeMap<EntryType, BTreeSet<String>>,
    suffixes: &StreetSuffixes,
) -> Result<Vec<KeywordMatcher>> {
    let mut matchers = Vec::new();
    for (entry_type, keywords) in sets {
        if keywords.is_empty() {
            info!(entry_type = entry_type.label(); "No entries, skipping matcher");
            continue;
        }
        let matcher = KeywordMatcher::build(keywords, *entry_type, suffixes)?;
        info!(entry_type = entry_type.label(), keywords = keywords.len(), patterns = matcher.pattern_count(); "Built matcher");
        matchers.push(matcher);
    }
    Ok(matchers)
}

pub fn match_documents(matchers: &[KeywordMatcher], documents: &[Document]) -> Vec<ReferenceEdge> {
    let mut edges = Vec::new();
    for document in tqdm::tqdm(documents.iter()) {
        for matcher in matchers {
            let matches = matcher.match_document(document);
            if !matches.is_empty() {
                edges.extend(ReferenceEdge::collapse(matcher.entry_type(), &matches));
            }
        }
    }
    edges
}

impl Etl for MatchDocumentsEtl {
    type Input = Input;
    type Output = Vec<ReferenceEdge>;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_file_name(&self) -> &str {
        OUTPUT_FILE_NAME
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        Ok(Input {
            gazetteer: read_json(&dir.join(gazetteer::OUTPUT_FILE_NAME))?,
            admin: admin_tree::read_records(dir)?,
            documents: read_documents(&self.documents_path)?,
            suffixes: StreetSuffixes::load(&self.suffixes_path)?,
        })
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        info!(street_suffixes = input.suffixes.len(); "Loaded street suffixes");
        let sets = keyword_sets(&input.gazetteer, &input.admin);
        let matchers = build_matchers(&sets, &input.suffixes)?;
        let edges = match_documents(&matchers, &input.documents);
        info!(documents = input.documents.len(), references = edges.len(); "Matched documents");
        Ok(edges)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        write_json(&self.output_path(dir), &output)
    }
}
