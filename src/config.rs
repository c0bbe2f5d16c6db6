use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{Error, Result};

/// Static boundary files of the administrative tree.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceConfig {
    pub boroughs_path: PathBuf,
    pub borough_names_path: PathBuf,
    pub named_areas_path: PathBuf,
    pub districts_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    /// `.osm` or `.osm.xz` extract.
    pub osm_path: PathBuf,
    pub reference: ReferenceConfig,
    pub street_suffixes_path: PathBuf,
    /// One JSON document per line.
    pub documents_path: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| Error::Message(format!("Could not open config file {}: {err}", path.display())))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_config_parses() {
        let config: UserConfig = serde_json::from_str(include_str!("../config/hamburg.json")).unwrap();
        assert_eq!(config.osm_path, PathBuf::from("data/hamburg-latest.osm.xz"));
        assert_eq!(config.reference.borough_names_path, PathBuf::from("data/bezirk_namen.properties"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn log_level_defaults_to_info() {
        let config: UserConfig = serde_json::from_str(
            r#"{
                "osm_path": "a.osm",
                "reference": {
                    "boroughs_path": "b.xml",
                    "borough_names_path": "b.properties",
                    "named_areas_path": "s.xml",
                    "districts_path": "o.xml"
                },
                "street_suffixes_path": "s.txt",
                "documents_path": "d.jsonl",
                "output_dir": "out"
            }"#,
        )
        .unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(load_user_config(Path::new("config/missing.json")).is_err());
    }
}
