//! Turns OSM references and raw boundary strings into `geo` geometries.

pub mod reproject;

use std::collections::{BTreeMap, HashMap};

use geo::{Area, BooleanOps, Centroid, Coord, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use log::{debug, warn};

use crate::data::gazetteer::Street;
use crate::data::osm::{MemberKind, Node, OsmId, Relation, Tagged, Way};
use crate::errors::{Error, Result};

/// Coordinates of every node in an extract, keyed by node id.
pub type PointLookup = HashMap<OsmId, Coord<f64>>;

/// Built line strings keyed by way id.
pub type LineLookup = HashMap<OsmId, LineString<f64>>;

pub fn point_lookup(nodes: &[Node]) -> PointLookup {
    nodes
        .iter()
        .map(|node| (node.id, Coord { x: node.lon, y: node.lat }))
        .collect()
}

/// Visits each resolvable node of `node_refs` in order. Unresolved ids are
/// dropped; `None` only when nothing resolves.
pub fn build_line_string(way_id: OsmId, node_refs: &[OsmId], points: &PointLookup) -> Option<LineString<f64>> {
    let coords: Vec<Coord<f64>> = node_refs
        .iter()
        .filter_map(|id| points.get(id).copied())
        .collect();

    let unresolved = node_refs.len() - coords.len();
    if unresolved > 0 {
        debug!(way_id = way_id, unresolved = unresolved; "Skipping node references missing from the extract");
    }

    match coords.len() {
        0 => {
            debug!(way_id = way_id; "No node of the way could be resolved");
            None
        }
        1 => {
            warn!(way_id = way_id; "Way resolves to a single point");
            Some(LineString::new(coords))
        }
        _ => Some(LineString::new(coords)),
    }
}

pub fn line_lookup(ways: &[Way], points: &PointLookup) -> LineLookup {
    ways.iter()
        .filter_map(|way| {
            build_line_string(way.id, &way.node_refs, points).map(|line| (way.id, line))
        })
        .collect()
}

/// Streets keyed by their textual name. Later ways with a known name are
/// merged into the existing entry.
#[derive(Debug, Default)]
pub struct StreetIndex {
    streets: BTreeMap<String, MultiLineString<f64>>,
}

impl StreetIndex {
    /// A line equal to a part already stored under `name` is skipped.
    pub fn add(&mut self, name: &str, line: LineString<f64>) {
        let parts = &mut self
            .streets
            .entry(name.to_string())
            .or_insert_with(|| MultiLineString::new(Vec::new()))
            .0;
        if !parts.contains(&line) {
            parts.push(line);
        }
    }

    pub fn get(&self, name: &str) -> Option<&MultiLineString<f64>> {
        self.streets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.streets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streets.is_empty()
    }

    pub fn into_streets(self) -> Vec<Street> {
        self.streets
            .into_iter()
            .map(|(name, geometry)| Street { name, geometry })
            .collect()
    }
}

/// A usable ring is closed and has at least four coordinates.
fn ring(line: &LineString<f64>) -> Option<LineString<f64>> {
    if line.0.len() >= 4 && line.is_closed() {
        Some(line.clone())
    } else {
        None
    }
}

/// Joins open line strings end to end. Succeeds only if all of them together
/// form exactly one closed ring.
fn stitch_ring(parts: &[LineString<f64>]) -> Option<LineString<f64>> {
    let mut remaining: Vec<Vec<Coord<f64>>> = parts.iter().map(|line| line.0.clone()).collect();
    if remaining.is_empty() {
        return None;
    }
    let mut chain = remaining.remove(0);

    while !remaining.is_empty() {
        let link = *chain.last()?;
        let next_idx = remaining
            .iter()
            .position(|part| part.first() == Some(&link) || part.last() == Some(&link))?;
        let mut next = remaining.remove(next_idx);
        if next.first() != Some(&link) {
            next.reverse();
        }
        chain.extend(next.into_iter().skip(1));
    }

    ring(&LineString::new(chain))
}

/// Builds the polygon of a `type=multipolygon` relation from its outer and
/// inner way members. Returns `None` for anything that cannot be assembled.
pub fn build_multipolygon(relation: &Relation, lines: &LineLookup) -> Option<Polygon<f64>> {
    if relation.tag("type") != Some("multipolygon") {
        return None;
    }

    let resolve = |role: &str| -> Option<Vec<LineString<f64>>> {
        relation
            .members_with_role(role)
            .filter(|member| member.kind == MemberKind::Way)
            .map(|member| {
                let line = lines.get(&member.id).cloned();
                if line.is_none() {
                    debug!(relation_id = relation.id, way_id = member.id; "Member way has no geometry");
                }
                line
            })
            .collect()
    };

    let outer = resolve("outer")?;
    let shell = match outer.as_slice() {
        [] => {
            debug!(relation_id = relation.id; "Multipolygon has no outer member");
            return None;
        }
        [single] => ring(single),
        several => stitch_ring(several),
    };
    let Some(shell) = shell else {
        debug!(relation_id = relation.id; "Outer members do not form one closed ring");
        return None;
    };

    let holes = resolve("inner")?
        .iter()
        .map(ring)
        .collect::<Option<Vec<_>>>();
    let Some(holes) = holes else {
        debug!(relation_id = relation.id; "Inner member is not a closed ring");
        return None;
    };

    Some(Polygon::new(shell, holes))
}

/// Representative point of a way: centroid of the enclosed area for closed
/// ways, of the line otherwise.
pub fn way_location(way: &Way, line: &LineString<f64>) -> Option<Point<f64>> {
    if way.is_closed() {
        if let Some(shell) = ring(line) {
            return Polygon::new(shell, Vec::new()).centroid();
        }
    }
    line.centroid()
}

/// Parses a flat "x y x y ..." string into a polygon. The ring is closed even
/// if the last pair does not repeat the first.
pub fn parse_raw_ring(raw: &str) -> Result<Polygon<f64>> {
    let values = raw
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if values.len() % 2 != 0 {
        return Err(Error::MalformedCoordinates(format!(
            "odd number of values ({})",
            values.len()
        )));
    }
    if values.len() < 6 {
        return Err(Error::MalformedCoordinates(format!(
            "a ring needs at least three coordinate pairs, got {}",
            values.len() / 2
        )));
    }

    let coords: Vec<Coord<f64>> = values
        .chunks_exact(2)
        .map(|pair| Coord { x: pair[0], y: pair[1] })
        .collect();
    Ok(Polygon::new(LineString::new(coords), Vec::new()))
}

/// Outer boundary of the union of `polygons`, as a polygon without holes.
pub fn union_boundary(polygons: &[Polygon<f64>]) -> Result<Polygon<f64>> {
    let (first, rest) = polygons
        .split_first()
        .ok_or_else(|| Error::MissingElement("no child polygons to union".to_string()))?;

    let union = rest.iter().fold(MultiPolygon::new(vec![first.clone()]), |acc, polygon| {
        acc.union(&MultiPolygon::new(vec![polygon.clone()]))
    });
    if union.0.len() > 1 {
        warn!(parts = union.0.len(); "Union is not connected, keeping the largest part");
    }

    let largest = union
        .0
        .iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
        .ok_or_else(|| Error::MissingElement("union of child polygons is empty".to_string()))?;
    Ok(Polygon::new(largest.exterior().clone(), Vec::new()))
}
