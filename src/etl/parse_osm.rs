use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{error, info};
use rkyv::AlignedVec;

use crate::data::OsmMapData;
use crate::errors::{Error, Result};
use crate::etl::Etl;
use crate::osm_xml::OsmFile;

pub const ETL_NAME: &str = "parse_osm";
pub const OUTPUT_FILE_NAME: &str = "osm_elements.rkyv";

pub struct ParseOsmEtl {
    osm_path: PathBuf,
}

impl ParseOsmEtl {
    pub fn new(osm_path: &Path) -> ParseOsmEtl {
        ParseOsmEtl {
            osm_path: osm_path.to_path_buf(),
        }
    }
}

/// Drains one entity stream. Elements read before a failure are kept; the
/// failure ends this stream only.
fn collect_stream<E, I>(element: &str, stream: I) -> Vec<E>
where
    I: Iterator<Item = Result<E>>,
{
    let mut entities = Vec::new();
    for item in stream {
        match item {
            Ok(entity) => entities.push(entity),
            Err(err) => {
                let message = err.to_string();
                error!(element = element, parsed = entities.len(), err = message.as_str(); "Entity stream aborted");
                break;
            }
        }
    }
    info!(element = element, count = entities.len(); "Parsed entities");
    entities
}

pub fn read_cache(dir: &Path) -> Result<OsmMapData> {
    let bytes = fs::read(dir.join(OUTPUT_FILE_NAME))?;
    let mut aligned = AlignedVec::with_capacity(bytes.len());
    aligned.extend_from_slice(&bytes);
    rkyv::from_bytes::<OsmMapData>(&aligned)
        .map_err(|err| Error::Cache(format!("Could not deserialize {OUTPUT_FILE_NAME}: {err:?}")))
}

impl Etl for ParseOsmEtl {
    type Input = OsmFile;
    type Output = OsmMapData;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_file_name(&self) -> &str {
        OUTPUT_FILE_NAME
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        if !self.osm_path.try_exists()? {
            return Err(Error::MissingElement(format!("OSM extract {}", self.osm_path.display())));
        }
        Ok(OsmFile::new(&self.osm_path))
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        Ok(OsmMapData {
            nodes: collect_stream("node", input.nodes()?),
            ways: collect_stream("way", input.ways()?),
            relations: collect_stream("relation", input.relations()?),
        })
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let bytes = rkyv::to_bytes::<_, 256>(&output)
            .map_err(|err| Error::Cache(format!("Could not serialize OSM elements: {err:?}")))?;
        let mut output_file = File::create(self.output_path(dir))?;
        output_file.write_all(&bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample.osm")
    }

    #[test]
    fn cache_round_trips_through_rkyv() {
        let dir = tempfile::tempdir().unwrap();
        let mut etl = ParseOsmEtl::new(&fixture());
        assert!(!etl.is_cached(dir.path()).unwrap());
        etl.process(dir.path()).unwrap();
        assert!(etl.is_cached(dir.path()).unwrap());

        let data = read_cache(dir.path()).unwrap();
        assert_eq!(data.nodes.len(), 12);
        assert_eq!(data.ways.len(), 5);
        assert_eq!(data.relations.len(), 1);
        assert_eq!(data.relations[0].tags.get("name").map(String::as_str), Some("Alsterpark"));
    }

    #[test]
    fn corrupt_cache_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(OUTPUT_FILE_NAME), b"definitely not rkyv").unwrap();
        assert!(matches!(read_cache(dir.path()), Err(Error::Cache(_))));
    }

    #[test]
    fn failing_stream_keeps_earlier_entities() {
        let xml = r#"<osm><node id="1" lat="1" lon="2"/><node id="2"/><node id="3" lat="1" lon="2"/></osm>"#;
        let nodes = collect_stream("node", crate::osm_xml::EntityStream::<_, crate::data::osm::Node>::new(xml.as_bytes()));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, 1);
    }

    #[test]
    fn missing_extract_fails_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let mut etl = ParseOsmEtl::new(&dir.path().join("missing.osm"));
        assert!(matches!(etl.extract(dir.path()), Err(Error::MissingElement(_))));
    }
}
