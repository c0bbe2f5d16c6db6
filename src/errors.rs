use std::{io, num::{ParseFloatError, ParseIntError}, str::Utf8Error};
use quick_xml::events::attributes::AttrError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("<{element}> is missing mandatory attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Unknown relation member type '{0}'")]
    UnknownMemberType(String),

    #[error("Malformed coordinate string: {0}")]
    MalformedCoordinates(String),

    #[error("Missing element: {0}")]
    MissingElement(String),

    #[error("Cannot build a keyword matcher from an empty keyword set ({0})")]
    EmptyKeywordSet(String),

    #[error("Reference data error: {0}")]
    ReferenceData(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    Attr(#[from] AttrError),

    #[error(transparent)]
    ParseFloat(#[from] ParseFloatError),

    #[error(transparent)]
    ParseInt(#[from] ParseIntError),

    #[error(transparent)]
    Utf8(#[from] Utf8Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Matcher(#[from] aho_corasick::BuildError),

    #[error("{0}")]
    Message(String),
}

impl From<&AttrError> for Error {
    fn from(value: &AttrError) -> Self {
        Error::Attr(value.clone())
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Message(value.to_string())
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Message(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
