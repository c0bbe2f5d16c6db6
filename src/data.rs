use self::osm::{Node, Relation, Way};

pub mod document;
pub mod gazetteer;
pub mod osm;

/// Map data as defined in the .osm file, in document order. Entities are kept
/// without any processing; references between them are not resolved.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct OsmMapData {
    pub nodes: Vec<Node>,
    pub ways: Vec<Way>,
    pub relations: Vec<Relation>,
}
