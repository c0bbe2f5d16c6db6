pub mod admin;
pub mod classify;
pub mod config;
pub mod data;
pub mod errors;
pub mod etl;
pub mod geometry;
pub mod matcher;
pub mod osm_xml;
pub mod reference;
