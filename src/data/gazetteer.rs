use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use geo::{MultiLineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::data::osm::OsmId;
use crate::errors::{Error, Result};

/// Gazetteer categories for streets and points of interest. The string form is
/// the label used by the storage layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Display, EnumString, AsRefStr, IntoStaticStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Street,
    School,
    Kindergarten,
    University,
    Hospital,
    Police,
    FireStation,
    Authority,
    Library,
    Culture,
    PlaceOfWorship,
    TransportStop,
    Park,
    Water,
    Sports,
    Playground,
    Historic,
    Building,
}

/// Levels of the administrative tree, root first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Display, EnumString, AsRefStr, IntoStaticStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminLevel {
    City,
    Borough,
    NamedArea,
    NumberedDistrict,
}

impl AdminLevel {
    pub fn child_level(self) -> Option<AdminLevel> {
        match self {
            AdminLevel::City => Some(AdminLevel::Borough),
            AdminLevel::Borough => Some(AdminLevel::NamedArea),
            AdminLevel::NamedArea => Some(AdminLevel::NumberedDistrict),
            AdminLevel::NumberedDistrict => None,
        }
    }
}

/// What kind of gazetteer entry a keyword matcher looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryType {
    Category(Category),
    Admin(AdminLevel),
}

impl EntryType {
    pub fn label(&self) -> &'static str {
        match self {
            EntryType::Category(category) => category.into(),
            EntryType::Admin(level) => level.into(),
        }
    }

    pub fn is_street(&self) -> bool {
        *self == EntryType::Category(Category::Street)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// All distinct ways sharing one street name, as one multi-part line. A way
/// listed twice contributes one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Street {
    pub name: String,
    pub geometry: MultiLineString<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub osm_id: OsmId,
    /// Never empty.
    pub labels: BTreeSet<Category>,
    pub location: Point<f64>,
    pub house_number: Option<String>,
    pub street: Option<String>,
    pub name: Option<String>,
    /// Set when `street` names an indexed street exactly.
    pub linked_street: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gazetteer {
    pub streets: Vec<Street>,
    pub points_of_interest: Vec<PointOfInterest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdminId(usize);

#[derive(Debug, Clone)]
pub struct AdminNode<P> {
    pub name: String,
    pub level: AdminLevel,
    pub payload: P,
    pub parent: Option<AdminId>,
    pub children: BTreeMap<String, AdminId>,
}

/// Administrative tree stored as an arena; nodes refer to each other by index.
#[derive(Debug, Clone)]
pub struct AdminTree<P> {
    nodes: Vec<AdminNode<P>>,
}

impl<P> AdminTree<P> {
    pub fn new(root_name: &str, root_payload: P) -> Self {
        AdminTree {
            nodes: vec![AdminNode {
                name: root_name.to_string(),
                level: AdminLevel::City,
                payload: root_payload,
                parent: None,
                children: BTreeMap::new(),
            }],
        }
    }

    pub fn root(&self) -> AdminId {
        AdminId(0)
    }

    pub fn node(&self, id: AdminId) -> &AdminNode<P> {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attaches a new child one level below `parent`. Returns `None` when the
    /// parent already has a child of that name.
    pub fn add_child(&mut self, parent: AdminId, name: &str, payload: P) -> Result<Option<AdminId>> {
        let parent_node = &self.nodes[parent.0];
        let level = parent_node.level.child_level().ok_or_else(|| {
            Error::Message(format!("'{}' is a leaf and cannot have children", parent_node.name))
        })?;
        if parent_node.children.contains_key(name) {
            return Ok(None);
        }

        let id = AdminId(self.nodes.len());
        self.nodes.push(AdminNode {
            name: name.to_string(),
            level,
            payload,
            parent: Some(parent),
            children: BTreeMap::new(),
        });
        self.nodes[parent.0].children.insert(name.to_string(), id);
        Ok(Some(id))
    }

    pub fn child(&self, parent: AdminId, name: &str) -> Option<AdminId> {
        self.nodes[parent.0].children.get(name).copied()
    }

    pub fn children(&self, id: AdminId) -> impl Iterator<Item = AdminId> + '_ {
        self.nodes[id.0].children.values().copied()
    }

    /// Follows child names starting below the root.
    pub fn find_path(&self, names: &[&str]) -> Option<AdminId> {
        names
            .iter()
            .try_fold(self.root(), |current, name| self.child(current, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (AdminId, &AdminNode<P>)> {
        self.nodes.iter().enumerate().map(|(idx, node)| (AdminId(idx), node))
    }

    pub fn at_level(&self, level: AdminLevel) -> impl Iterator<Item = &AdminNode<P>> {
        self.nodes.iter().filter(move |node| node.level == level)
    }

    pub fn set_payload(&mut self, id: AdminId, payload: P) {
        self.nodes[id.0].payload = payload;
    }

    /// Names from the root down to `id`, inclusive.
    pub fn path(&self, id: AdminId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            path.push(node.name.clone());
            current = node.parent;
        }
        path.reverse();
        path
    }

    /// Converts every payload, keeping the shape of the tree.
    pub fn try_map<Q, F>(&self, mut convert: F) -> Result<AdminTree<Q>>
    where
        F: FnMut(AdminId, &AdminNode<P>) -> Result<Q>,
    {
        let nodes = self
            .iter()
            .map(|(id, node)| {
                Ok(AdminNode {
                    name: node.name.clone(),
                    level: node.level,
                    payload: convert(id, node)?,
                    parent: node.parent,
                    children: node.children.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(AdminTree { nodes })
    }
}

/// Flattened admin tree node as written by the `admin_tree` stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub name: String,
    pub level: AdminLevel,
    pub path: Vec<String>,
    /// Absent when the boundary record could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<Polygon<f64>>,
}

impl AdminTree<Option<Polygon<f64>>> {
    pub fn to_records(&self) -> Vec<AdminRecord> {
        self.iter()
            .map(|(id, node)| AdminRecord {
                name: node.name.clone(),
                level: node.level,
                path: self.path(id),
                boundary: node.payload.clone(),
            })
            .collect()
    }
}
