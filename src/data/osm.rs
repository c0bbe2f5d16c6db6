use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::errors::{Error, Result};

pub type OsmId = i64;

/// Key uniqueness is enforced by the map; on duplicate keys the last `<tag>` wins.
pub type Tags = HashMap<String, String>;

/// Optional editing metadata shared by all three entity kinds.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Metadata {
    pub version: Option<u32>,
    /// Seconds since the epoch, UTC.
    pub timestamp: Option<i64>,
    pub changeset: Option<i64>,
    pub uid: Option<i64>,
    pub user: Option<String>,
}

impl Metadata {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Node {
    pub id: OsmId,
    pub meta: Metadata,
    pub tags: Tags,
    pub lon: f64,
    pub lat: f64,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Way {
    pub id: OsmId,
    pub meta: Metadata,
    pub tags: Tags,
    /// May repeat the first id at the end to close a ring.
    pub node_refs: Vec<OsmId>,
}

impl Way {
    pub fn is_closed(&self) -> bool {
        self.node_refs.len() > 2 && self.node_refs.first() == self.node_refs.last()
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Relation {
    pub id: OsmId,
    pub meta: Metadata,
    pub tags: Tags,
    pub members: Vec<Member>,
}

impl Relation {
    pub fn members_with_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a Member> + 'a {
        self.members
            .iter()
            .filter(move |member| member.role.as_deref() == Some(role))
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Member {
    pub kind: MemberKind,
    pub id: OsmId,
    /// `None` when the role attribute is absent or empty.
    pub role: Option<String>,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[archive(check_bytes)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

impl MemberKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "node" => Ok(MemberKind::Node),
            "way" => Ok(MemberKind::Way),
            "relation" => Ok(MemberKind::Relation),
            other => Err(Error::UnknownMemberType(other.to_string())),
        }
    }
}

/// Read access to the tag map of any entity kind.
pub trait Tagged {
    fn tags(&self) -> &Tags;

    fn tag(&self, key: &str) -> Option<&str> {
        self.tags().get(key).map(String::as_str)
    }

    /// True when the tag exists and is not blank.
    fn has_value(&self, key: &str) -> bool {
        self.tag(key).is_some_and(|value| !value.trim().is_empty())
    }
}

impl Tagged for Tags {
    fn tags(&self) -> &Tags {
        self
    }
}

impl Tagged for Node {
    fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl Tagged for Way {
    fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl Tagged for Relation {
    fn tags(&self) -> &Tags {
        &self.tags
    }
}
