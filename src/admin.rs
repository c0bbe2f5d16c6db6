//! Builds the Hamburg administrative tree: city, boroughs, named areas and
//! numbered districts.

use std::collections::{BTreeMap, HashMap};

use geo::Polygon;
use log::{debug, info, warn};

use crate::config::ReferenceConfig;
use crate::data::gazetteer::{AdminId, AdminLevel, AdminTree};
use crate::errors::{Error, Result};
use crate::geometry::reproject::Reprojection;
use crate::geometry::{parse_raw_ring, union_boundary};
use crate::reference::{self, field, Record};

pub const ROOT_NAME: &str = "Hamburg";

const POS_LIST: &str = "posList";
const BOROUGH_ID: &str = "bezirk";
const NAMED_AREA_NAME: &str = "stadtteil";
const DISTRICT_NUMBER: &str = "ortsteilnummer";

/// Named areas with two geometry records in the boundary data. The first
/// record is kept; any other duplicate named area is a reference data error.
pub const KNOWN_DUPLICATE_AREAS: &[&str] = &["Neuwerk", "Moorburg"];

/// Named areas spelled differently in the district data.
pub const NAMED_AREA_FIXUPS: &[(&str, &str)] = &[("St.Pauli", "St. Pauli"), ("St.Georg", "St. Georg")];

pub fn fix_area_name(name: &str) -> &str {
    NAMED_AREA_FIXUPS
        .iter()
        .find(|(raw, _)| *raw == name)
        .map_or(name, |(_, fixed)| *fixed)
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    /// Borough id to display name.
    pub borough_names: BTreeMap<String, String>,
    pub boroughs: Vec<Record>,
    pub named_areas: Vec<Record>,
    pub districts: Vec<Record>,
}

impl ReferenceData {
    pub fn load(paths: &ReferenceConfig) -> Result<Self> {
        Ok(ReferenceData {
            borough_names: reference::load_properties(&paths.borough_names_path)?,
            boroughs: reference::load_records(&paths.boroughs_path)?,
            named_areas: reference::load_records(&paths.named_areas_path)?,
            districts: reference::load_records(&paths.districts_path)?,
        })
    }
}

/// Tree with the raw projected coordinate string of every node as payload.
/// The root payload stays empty until [`convert_tree`].
pub fn build_raw_tree(data: &ReferenceData) -> Result<AdminTree<String>> {
    let mut tree = AdminTree::new(ROOT_NAME, String::new());
    let root = tree.root();
    let mut boroughs: HashMap<String, AdminId> = HashMap::new();

    for record in &data.boroughs {
        let id = field(record, BOROUGH_ID)?;
        let name = data
            .borough_names
            .get(id)
            .ok_or_else(|| Error::ReferenceData(format!("no name for borough id {id}")))?;
        match tree.add_child(root, name, field(record, POS_LIST)?.to_string())? {
            Some(node) => {
                boroughs.insert(id.to_string(), node);
            }
            None => warn!(borough = name.as_str(); "Duplicate borough record skipped"),
        }
    }

    for record in &data.named_areas {
        let name = fix_area_name(field(record, NAMED_AREA_NAME)?);
        let borough_id = field(record, BOROUGH_ID)?;
        let borough = *boroughs.get(borough_id).ok_or_else(|| {
            Error::ReferenceData(format!("named area {name} refers to unknown borough {borough_id}"))
        })?;
        if tree.child(borough, name).is_some() {
            if !KNOWN_DUPLICATE_AREAS.contains(&name) {
                return Err(Error::ReferenceData(format!("duplicate named area {name}")));
            }
            debug!(named_area = name; "Skipping known duplicate named area");
            continue;
        }
        tree.add_child(borough, name, field(record, POS_LIST)?.to_string())?;
    }

    for record in &data.districts {
        let number = field(record, DISTRICT_NUMBER)?;
        let area_name = fix_area_name(field(record, NAMED_AREA_NAME)?);
        // The leading digit of a district number is its borough id.
        let borough_id = number
            .get(..1)
            .ok_or_else(|| Error::ReferenceData("empty district number".to_string()))?;
        let area = boroughs
            .get(borough_id)
            .and_then(|borough| tree.child(*borough, area_name))
            .ok_or_else(|| {
                Error::ReferenceData(format!(
                    "district {number} refers to unknown named area {area_name} in borough {borough_id}"
                ))
            })?;
        if tree.add_child(area, number, field(record, POS_LIST)?.to_string())?.is_none() {
            warn!(district = number; "Duplicate district skipped");
        }
    }

    info!(
        boroughs = tree.at_level(AdminLevel::Borough).count(),
        named_areas = tree.at_level(AdminLevel::NamedArea).count(),
        districts = tree.at_level(AdminLevel::NumberedDistrict).count();
        "Built administrative tree"
    );
    Ok(tree)
}

/// Parses and reprojects every boundary, then derives the root boundary from
/// the union of the boroughs. A boundary that does not parse is logged and
/// left empty; its node stays in the tree.
pub fn convert_tree(
    raw: &AdminTree<String>,
    projection: &dyn Reprojection,
) -> Result<AdminTree<Option<Polygon<f64>>>> {
    let root = raw.root();
    let mut tree = raw.try_map(|id, node| {
        if id == root {
            return Ok(None);
        }
        match parse_raw_ring(&node.payload) {
            Ok(polygon) => Ok(Some(projection.reproject(&polygon))),
            Err(err) => {
                let message = err.to_string();
                warn!(name = node.name.as_str(), level = node.level.as_ref(), err = message.as_str(); "Dropping unparseable boundary");
                Ok(None)
            }
        }
    })?;

    let boroughs: Vec<Polygon<f64>> = tree
        .children(root)
        .filter_map(|id| tree.node(id).payload.clone())
        .collect();
    let boundary = union_boundary(&boroughs)?;
    tree.set_payload(root, Some(boundary));
    Ok(tree)
}
