use std::path::Path;

use geo::{Centroid, Point};
use log::{debug, info};

use crate::classify;
use crate::data::gazetteer::{Gazetteer, PointOfInterest};
use crate::data::osm::{OsmId, Tagged};
use crate::data::OsmMapData;
use crate::errors::Result;
use crate::etl::{parse_osm, write_json, Etl};
use crate::geometry::{build_multipolygon, line_lookup, point_lookup, way_location, StreetIndex};

pub const ETL_NAME: &str = "gazetteer";
pub const OUTPUT_FILE_NAME: &str = "gazetteer.json";

const HOUSE_NUMBER: &str = "addr:housenumber";
const STREET: &str = "addr:street";

pub struct GazetteerEtl {}

impl GazetteerEtl {
    pub fn new() -> GazetteerEtl {
        GazetteerEtl {}
    }
}

impl Default for GazetteerEtl {
    fn default() -> Self {
        Self::new()
    }
}

/// `None` when the tags earn no category.
fn point_of_interest(osm_id: OsmId, tags: &impl Tagged, location: Point<f64>) -> Option<PointOfInterest> {
    let labels = classify::labels(tags);
    if labels.is_empty() {
        return None;
    }
    let owned = |key: &str| tags.tag(key).map(str::to_string);
    Some(PointOfInterest {
        osm_id,
        labels,
        location,
        house_number: owned(HOUSE_NUMBER),
        street: owned(STREET),
        name: owned("name"),
        linked_street: None,
    })
}

/// Builds streets and points of interest from parsed OSM entities.
pub fn build_gazetteer(data: &OsmMapData) -> Gazetteer {
    let points = point_lookup(&data.nodes);
    let lines = line_lookup(&data.ways, &points);

    let mut streets = StreetIndex::default();
    for way in data.ways.iter().filter(|way| classify::is_street(*way)) {
        if let (Some(name), Some(line)) = (way.tag("name"), lines.get(&way.id)) {
            streets.add(name, line.clone());
        }
    }

    let mut points_of_interest = Vec::new();
    for node in data.nodes.iter().filter(|node| classify::is_interesting_with_buildings(*node)) {
        points_of_interest.extend(point_of_interest(node.id, node, Point::new(node.lon, node.lat)));
    }
    for way in data.ways.iter().filter(|way| classify::is_interesting_with_buildings(*way)) {
        match lines.get(&way.id).and_then(|line| way_location(way, line)) {
            Some(location) => points_of_interest.extend(point_of_interest(way.id, way, location)),
            None => debug!(way_id = way.id; "Interesting way has no location"),
        }
    }
    for relation in data
        .relations
        .iter()
        .filter(|relation| classify::is_interesting_with_buildings(*relation))
    {
        match build_multipolygon(relation, &lines).and_then(|polygon| polygon.centroid()) {
            Some(location) => {
                points_of_interest.extend(point_of_interest(relation.id, relation, location))
            }
            None => debug!(relation_id = relation.id; "Interesting relation has no polygon"),
        }
    }

    for poi in &mut points_of_interest {
        poi.linked_street = poi.street.clone().filter(|street| streets.contains(street));
    }

    info!(
        streets = streets.len(),
        points_of_interest = points_of_interest.len(),
        linked = points_of_interest.iter().filter(|poi| poi.linked_street.is_some()).count();
        "Built gazetteer"
    );
    Gazetteer {
        streets: streets.into_streets(),
        points_of_interest,
    }
}

impl Etl for GazetteerEtl {
    type Input = OsmMapData;
    type Output = Gazetteer;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_file_name(&self) -> &str {
        OUTPUT_FILE_NAME
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        parse_osm::read_cache(dir)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        Ok(build_gazetteer(&input))
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        write_json(&self.output_path(dir), &output)
    }
}
