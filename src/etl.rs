pub mod admin_tree;
pub mod gazetteer;
pub mod match_documents;
pub mod parse_osm;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{error, info};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::UserConfig;
use crate::errors::{Error, Result};

/// One pipeline stage. Every stage writes a single file into the output
/// directory and is skipped while that file exists.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;
    fn output_file_name(&self) -> &str;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.output_file_name())
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(self.output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        if self.is_cached(dir)? {
            info!(etl_name = self.etl_name(); "Removing cached output");
            fs::remove_file(self.output_path(dir))?;
        }
        Ok(())
    }

    fn process(&mut self, dir: &Path) -> Result<()> {
        let started = Instant::now();
        info!(etl_name = self.etl_name(); "Starting ETL process");
        if self.is_cached(dir)? {
            info!(etl_name = self.etl_name(); "Using cached value");
        } else {
            info!(etl_name = self.etl_name(); "Extracting");
            let input = self
                .extract(dir)
                .map_err(|err| log_failure(self.etl_name(), "Extraction", err))?;

            info!(etl_name = self.etl_name(); "Transforming");
            let output = self
                .transform(input)
                .map_err(|err| log_failure(self.etl_name(), "Transformation", err))?;

            info!(etl_name = self.etl_name(); "Loading");
            self.load(dir, output)
                .map_err(|err| log_failure(self.etl_name(), "Loading", err))?;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(etl_name = self.etl_name(), elapsed_ms = elapsed_ms; "Process finished");
        Ok(())
    }
}

fn log_failure(etl_name: &str, step: &str, err: Error) -> Error {
    let message = err.to_string();
    error!(etl_name = etl_name, step = step, err = message.as_str(); "ETL step failed with error");
    err
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Runs all four stages in order, optionally dropping cached outputs first.
pub fn run_pipeline(config: &UserConfig, clean: bool) -> Result<()> {
    let dir = config.output_dir.as_path();
    fs::create_dir_all(dir)?;

    let mut admin_tree = admin_tree::AdminTreeEtl::new(&config.reference);
    let mut parse_osm = parse_osm::ParseOsmEtl::new(&config.osm_path);
    let mut gazetteer = gazetteer::GazetteerEtl::new();
    let mut match_documents =
        match_documents::MatchDocumentsEtl::new(&config.documents_path, &config.street_suffixes_path);

    if clean {
        admin_tree.clean(dir)?;
        parse_osm.clean(dir)?;
        gazetteer.clean(dir)?;
        match_documents.clean(dir)?;
    }

    admin_tree.process(dir)?;
    parse_osm.process(dir)?;
    gazetteer.process(dir)?;
    match_documents.process(dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReferenceConfig;
    use crate::data::document::ReferenceEdge;
    use crate::data::gazetteer::{AdminLevel, AdminRecord, Category, EntryType, Gazetteer};

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
    }

    fn fixture_config(output_dir: &Path) -> UserConfig {
        UserConfig {
            osm_path: fixture("sample.osm"),
            reference: ReferenceConfig {
                boroughs_path: fixture("bezirke.xml"),
                borough_names_path: fixture("bezirk_namen.properties"),
                named_areas_path: fixture("stadtteile.xml"),
                districts_path: fixture("ortsteile.xml"),
            },
            street_suffixes_path: fixture("strassen_suffixe.txt"),
            documents_path: fixture("documents.jsonl"),
            output_dir: output_dir.to_path_buf(),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn json_helpers_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();
        let values: Vec<u32> = read_json(&path).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn pipeline_runs_on_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_config(dir.path());
        run_pipeline(&config, false).unwrap();

        let admin: Vec<AdminRecord> = read_json(&dir.path().join(admin_tree::OUTPUT_FILE_NAME)).unwrap();
        assert_eq!(admin.iter().filter(|record| record.level == AdminLevel::Borough).count(), 7);

        let gazetteer: Gazetteer = read_json(&dir.path().join(gazetteer::OUTPUT_FILE_NAME)).unwrap();
        assert!(gazetteer.streets.iter().any(|street| street.name == "Uhlenhorster Weg"));

        let edges: Vec<ReferenceEdge> = read_json(&dir.path().join(match_documents::OUTPUT_FILE_NAME)).unwrap();
        let street_edge = edges
            .iter()
            .find(|edge| edge.document_id == "2019-0001" && edge.entry == "Uhlenhorster Weg")
            .unwrap();
        assert_eq!(street_edge.entry_type, EntryType::Category(Category::Street));
        assert_eq!(street_edge.header_count, Some(1));
        assert_eq!(street_edge.body_count, Some(1));
        assert!(edges
            .iter()
            .any(|edge| edge.entry == "Uhlenhorst" && edge.entry_type == EntryType::Admin(AdminLevel::NamedArea)));
    }

    #[test]
    fn cached_stages_are_skipped_until_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_config(dir.path());
        run_pipeline(&config, false).unwrap();

        let references = dir.path().join(match_documents::OUTPUT_FILE_NAME);
        fs::write(&references, "[]").unwrap();
        run_pipeline(&config, false).unwrap();
        assert_eq!(fs::read_to_string(&references).unwrap(), "[]");

        run_pipeline(&config, true).unwrap();
        let edges: Vec<ReferenceEdge> = read_json(&references).unwrap();
        assert!(!edges.is_empty());
    }

    #[test]
    fn missing_reference_data_aborts_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fixture_config(dir.path());
        config.reference.boroughs_path = fixture("missing.xml");
        assert!(matches!(run_pipeline(&config, false), Err(Error::ReferenceData(_))));
        assert!(!dir.path().join(admin_tree::OUTPUT_FILE_NAME).exists());
    }
}
