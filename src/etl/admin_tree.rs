use std::path::Path;

use crate::admin::{build_raw_tree, convert_tree, ReferenceData};
use crate::config::ReferenceConfig;
use crate::data::gazetteer::AdminRecord;
use crate::errors::Result;
use crate::etl::{read_json, write_json, Etl};
use crate::geometry::reproject::ETRS89_UTM32N;

pub const ETL_NAME: &str = "admin_tree";
pub const OUTPUT_FILE_NAME: &str = "admin_tree.json";

pub struct AdminTreeEtl {
    paths: ReferenceConfig,
}

impl AdminTreeEtl {
    pub fn new(paths: &ReferenceConfig) -> AdminTreeEtl {
        AdminTreeEtl {
            paths: paths.clone(),
        }
    }
}

pub fn read_records(dir: &Path) -> Result<Vec<AdminRecord>> {
    read_json(&dir.join(OUTPUT_FILE_NAME))
}

impl Etl for AdminTreeEtl {
    type Input = ReferenceData;
    type Output = Vec<AdminRecord>;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_file_name(&self) -> &str {
        OUTPUT_FILE_NAME
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        ReferenceData::load(&self.paths)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let raw = build_raw_tree(&input)?;
        let tree = convert_tree(&raw, &ETRS89_UTM32N)?;
        Ok(tree.to_records())
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        write_json(&self.output_path(dir), &output)
    }
}
