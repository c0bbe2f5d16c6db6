//! Streaming reader for OpenStreetMap XML.
//!
//! Each entity kind is read by its own forward-only [`EntityStream`]. A stream
//! yields its entities in document order and stops for good after the first
//! error, so a broken `<way>` never affects the node or relation streams.

use std::fs;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{Member, MemberKind, Metadata, Node, Relation, Tags, Way};
use crate::errors::{Error, Result};

/// An OSM element kind that can be rebuilt from its start tag and children.
pub trait OsmElement: Sized {
    const ELEMENT: &'static str;

    fn from_start(start: &BytesStart) -> Result<Self>;

    fn tags_mut(&mut self) -> &mut Tags;

    /// Handles a nested element other than `<tag>`.
    fn add_child(&mut self, _child: &BytesStart) -> Result<()> {
        Ok(())
    }
}

impl OsmElement for Node {
    const ELEMENT: &'static str = "node";

    fn from_start(start: &BytesStart) -> Result<Self> {
        Ok(Node {
            id: required(start, Self::ELEMENT, "id")?.parse()?,
            meta: parse_metadata(start)?,
            tags: Tags::new(),
            lon: required(start, Self::ELEMENT, "lon")?.parse()?,
            lat: required(start, Self::ELEMENT, "lat")?.parse()?,
        })
    }

    fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }
}

impl OsmElement for Way {
    const ELEMENT: &'static str = "way";

    fn from_start(start: &BytesStart) -> Result<Self> {
        Ok(Way {
            id: required(start, Self::ELEMENT, "id")?.parse()?,
            meta: parse_metadata(start)?,
            tags: Tags::new(),
            node_refs: Vec::new(),
        })
    }

    fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    fn add_child(&mut self, child: &BytesStart) -> Result<()> {
        if child.name().as_ref() == b"nd" {
            self.node_refs.push(required(child, "nd", "ref")?.parse()?);
        }
        Ok(())
    }
}

impl OsmElement for Relation {
    const ELEMENT: &'static str = "relation";

    fn from_start(start: &BytesStart) -> Result<Self> {
        Ok(Relation {
            id: required(start, Self::ELEMENT, "id")?.parse()?,
            meta: parse_metadata(start)?,
            tags: Tags::new(),
            members: Vec::new(),
        })
    }

    fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    fn add_child(&mut self, child: &BytesStart) -> Result<()> {
        if child.name().as_ref() == b"member" {
            let kind = MemberKind::parse(&required(child, "member", "type")?)?;
            let id = required(child, "member", "ref")?.parse()?;
            let role = attribute(child, "role")?.filter(|role| !role.is_empty());
            self.members.push(Member { kind, id, role });
        }
        Ok(())
    }
}

fn attribute(start: &BytesStart, key: &str) -> Result<Option<String>> {
    match start.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn required(start: &BytesStart, element: &'static str, key: &'static str) -> Result<String> {
    attribute(start, key)?.ok_or(Error::MissingAttribute {
        element,
        attribute: key,
    })
}

fn parse_timestamp(value: &str) -> Result<i64> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc).timestamp())
}

fn parse_metadata(start: &BytesStart) -> Result<Metadata> {
    Ok(Metadata {
        version: attribute(start, "version")?.map(|v| v.parse()).transpose()?,
        timestamp: attribute(start, "timestamp")?
            .map(|v| parse_timestamp(&v))
            .transpose()?,
        changeset: attribute(start, "changeset")?.map(|v| v.parse()).transpose()?,
        uid: attribute(start, "uid")?.map(|v| v.parse()).transpose()?,
        user: attribute(start, "user")?,
    })
}

/// Forward-only sequence of one entity kind read from an OSM XML document.
pub struct EntityStream<R: BufRead, E: OsmElement> {
    reader: Reader<R>,
    buf: Vec<u8>,
    finished: bool,
    _element: PhantomData<E>,
}

impl<R: BufRead, E: OsmElement> EntityStream<R, E> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);

        EntityStream {
            reader,
            buf: Vec::new(),
            finished: false,
            _element: PhantomData,
        }
    }

    fn next_entity(&mut self) -> Result<Option<E>> {
        let element = E::ELEMENT.as_bytes();
        loop {
            // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
            self.buf.clear();
            let (mut entity, has_children) = match self.reader.read_event_into(&mut self.buf)? {
                Event::Eof => return Ok(None),
                Event::Start(e) if e.name().as_ref() == element => (E::from_start(&e)?, true),
                Event::Empty(e) if e.name().as_ref() == element => (E::from_start(&e)?, false),
                _ => continue,
            };
            if has_children {
                self.read_children(&mut entity)?;
            }
            return Ok(Some(entity));
        }
    }

    fn read_children(&mut self, entity: &mut E) -> Result<()> {
        let element = E::ELEMENT.as_bytes();
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::End(e) if e.name().as_ref() == element => return Ok(()),
                Event::Start(e) | Event::Empty(e) => {
                    if e.name().as_ref() == b"tag" {
                        let key = required(&e, "tag", "k")?;
                        let value = required(&e, "tag", "v")?;
                        entity.tags_mut().insert(key, value);
                    } else {
                        entity.add_child(&e)?;
                    }
                }
                Event::Eof => {
                    return Err(format!("Document ended inside <{}>", E::ELEMENT).into());
                }
                _ => (),
            }
        }
    }
}

impl<R: BufRead, E: OsmElement> Iterator for EntityStream<R, E> {
    type Item = Result<E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_entity() {
            Ok(Some(entity)) => Some(Ok(entity)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// An OSM XML file on disk, plain or xz-compressed. Every call to one of the
/// stream constructors re-opens the file and starts from the beginning.
pub struct OsmFile {
    path: PathBuf,
}

impl OsmFile {
    pub fn new(path: &Path) -> Self {
        OsmFile {
            path: path.to_path_buf(),
        }
    }

    fn open(&self) -> Result<Box<dyn BufRead>> {
        let file = fs::File::open(&self.path)?;
        let file_reader = BufReader::new(file);
        let is_xz = self
            .path
            .extension()
            .is_some_and(|extension| extension == "xz");
        if is_xz {
            let xz_reader = XzDecoder::new(file_reader);
            Ok(Box::new(BufReader::new(xz_reader)))
        } else {
            Ok(Box::new(file_reader))
        }
    }

    pub fn nodes(&self) -> Result<EntityStream<Box<dyn BufRead>, Node>> {
        Ok(EntityStream::new(self.open()?))
    }

    pub fn ways(&self) -> Result<EntityStream<Box<dyn BufRead>, Way>> {
        Ok(EntityStream::new(self.open()?))
    }

    pub fn relations(&self) -> Result<EntityStream<Box<dyn BufRead>, Relation>> {
        Ok(EntityStream::new(self.open()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../fixtures/sample.osm");

    fn stream<E: OsmElement>(xml: &str) -> EntityStream<&[u8], E> {
        EntityStream::new(xml.as_bytes())
    }

    #[test]
    fn reads_nodes_with_metadata_and_tags() {
        let nodes: Vec<Node> = stream(SAMPLE).collect::<Result<_>>().unwrap();
        assert_eq!(nodes.len(), 12);

        let school = nodes.iter().find(|node| node.id == 100).unwrap();
        assert_eq!(school.tags.get("amenity").map(String::as_str), Some("school"));
        assert_eq!(school.meta.version, Some(3));
        assert_eq!(school.meta.user.as_deref(), Some("mapper"));
        assert_eq!(school.meta.timestamp().unwrap().to_rfc3339(), "2019-05-01T10:00:00+00:00");
        assert!((school.lat - 53.5702).abs() < 1e-9);
        assert!((school.lon - 10.0125).abs() < 1e-9);
    }

    #[test]
    fn reads_ways_in_document_order() {
        let ways: Vec<Way> = stream(SAMPLE).collect::<Result<_>>().unwrap();
        let ids: Vec<i64> = ways.iter().map(|way| way.id).collect();
        assert_eq!(ids, vec![200, 201, 202, 203, 204]);
        assert_eq!(ways[0].node_refs, vec![1, 2, 3]);
        assert!(ways[2].is_closed());
    }

    #[test]
    fn reads_relation_members_and_normalizes_empty_roles() {
        let relations: Vec<Relation> = stream(SAMPLE).collect::<Result<_>>().unwrap();
        assert_eq!(relations.len(), 1);
        let members = &relations[0].members;
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].kind, MemberKind::Way);
        assert_eq!(members[0].role.as_deref(), Some("outer"));
        assert_eq!(members[2].kind, MemberKind::Node);
        assert_eq!(members[2].role, None);
    }

    #[test]
    fn timestamps_are_converted_to_utc() {
        let xml = r#"<osm><node id="1" lat="1" lon="2" timestamp="2020-01-01T02:00:00+02:00"/></osm>"#;
        let node: Node = stream(xml).next().unwrap().unwrap();
        assert_eq!(node.meta.timestamp, Some(1_577_836_800));
    }

    #[test]
    fn duplicate_tag_keys_keep_last_value() {
        let xml = r#"<osm><node id="1" lat="1" lon="2"><tag k="name" v="A"/><tag k="name" v="B"/></node></osm>"#;
        let node: Node = stream(xml).next().unwrap().unwrap();
        assert_eq!(node.tags.get("name").map(String::as_str), Some("B"));
    }

    #[test]
    fn missing_coordinate_aborts_only_the_node_stream() {
        let xml = r#"<osm>
            <node id="1" lat="1" lon="2"/>
            <node id="2" lat="1"/>
            <node id="3" lat="1" lon="2"/>
            <way id="10"><nd ref="1"/><nd ref="3"/></way>
        </osm>"#;

        let mut nodes = stream::<Node>(xml);
        assert_eq!(nodes.next().unwrap().unwrap().id, 1);
        let err = nodes.next().unwrap().unwrap_err();
        assert!(matches!(err, Error::MissingAttribute { element: "node", attribute: "lon" }));
        assert!(nodes.next().is_none());

        let ways: Vec<Way> = stream(xml).collect::<Result<_>>().unwrap();
        assert_eq!(ways[0].node_refs, vec![1, 3]);
    }

    #[test]
    fn unknown_member_type_is_fatal_for_relations() {
        let xml = r#"<osm><relation id="5"><member type="area" ref="1" role=""/></relation></osm>"#;
        let mut relations = stream::<Relation>(xml);
        assert!(matches!(relations.next(), Some(Err(Error::UnknownMemberType(kind))) if kind == "area"));
        assert!(relations.next().is_none());
    }

    #[test]
    fn ignores_comments_and_unrelated_elements() {
        let xml = r#"<?xml version="1.0"?><!-- extract --><osm><bounds minlat="0"/><node id="7" lat="0.5" lon="0.25"/></osm>"#;
        let nodes: Vec<Node> = stream(xml).collect::<Result<_>>().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, 7);
    }

    #[test]
    fn xz_files_are_decompressed() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.osm.xz");
        let mut encoder = xz::write::XzEncoder::new(fs::File::create(&path).unwrap(), 6);
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let file = OsmFile::new(&path);
        let nodes: Vec<Node> = file.nodes().unwrap().collect::<Result<_>>().unwrap();
        let plain: Vec<Node> = stream(SAMPLE).collect::<Result<_>>().unwrap();
        assert_eq!(nodes.len(), 12);
        assert_eq!(nodes, plain);
        assert_eq!(file.ways().unwrap().count(), stream::<Way>(SAMPLE).count());
    }
}
