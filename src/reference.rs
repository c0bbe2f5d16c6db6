//! Readers for the static administrative boundary files.
//!
//! Boundary files are XML feature collections. Every `featureMember` becomes
//! one [`Record`]: leaf element local name to text, first occurrence wins, so
//! the first `posList` of a feature is its exterior ring.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::errors::{Error, Result};

pub type Record = HashMap<String, String>;

const FEATURE_MEMBER: &[u8] = b"featureMember";

pub fn field<'a>(record: &'a Record, name: &str) -> Result<&'a str> {
    record
        .get(name)
        .map(|value| value.trim())
        .ok_or_else(|| Error::ReferenceData(format!("record without '{name}'")))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .map_err(|err| Error::ReferenceData(format!("cannot open {}: {err}", path.display())))?;
    Ok(BufReader::new(file))
}

pub fn read_records<R: BufRead>(source: R) -> Result<Vec<Record>> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<Record> = None;
    let mut open_elements: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = e.local_name();
                if name.as_ref() == FEATURE_MEMBER {
                    current = Some(Record::new());
                    open_elements.clear();
                } else if current.is_some() {
                    open_elements.push(str::from_utf8(name.as_ref())?.to_string());
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == FEATURE_MEMBER {
                    if let Some(record) = current.take() {
                        records.push(record);
                    }
                } else if current.is_some() {
                    open_elements.pop();
                }
            }
            Event::Text(text) => {
                if let (Some(record), Some(element)) = (current.as_mut(), open_elements.last()) {
                    if !record.contains_key(element) {
                        record.insert(element.clone(), text.unescape()?.into_owned());
                    }
                }
            }
            _ => (),
        }
    }

    if current.is_some() {
        return Err(Error::ReferenceData("document ended inside a featureMember".to_string()));
    }
    Ok(records)
}

pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    read_records(open(path)?)
}

/// Replaces `\uXXXX` escapes, leaving anything unparsable as it is.
fn unescape_unicode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find("\\u") {
        out.push_str(&rest[..pos]);
        let decoded = rest
            .get(pos + 2..pos + 6)
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[pos + 6..];
            }
            None => {
                out.push_str("\\u");
                rest = &rest[pos + 2..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parses `key=value` lines. `#` and `!` start comments.
pub fn read_properties(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unescape_unicode(value.trim())))
        .collect()
}

pub fn load_properties(path: &Path) -> Result<BTreeMap<String, String>> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| Error::ReferenceData(format!("cannot read {}: {err}", path.display())))?;
    Ok(read_properties(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEATURES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs" xmlns:gml="http://www.opengis.net/gml" xmlns:app="http://www.deegree.org/app">
  <gml:featureMember>
    <app:stadtteile>
      <app:stadtteil>Uhlenhorst</app:stadtteil>
      <app:bezirk>4</app:bezirk>
      <app:geom>
        <gml:Polygon>
          <gml:exterior><gml:LinearRing><gml:posList>0 0 1 0 1 1</gml:posList></gml:LinearRing></gml:exterior>
          <gml:interior><gml:LinearRing><gml:posList>9 9 9 9 9 9</gml:posList></gml:LinearRing></gml:interior>
        </gml:Polygon>
      </app:geom>
    </app:stadtteile>
  </gml:featureMember>
  <gml:featureMember>
    <app:stadtteile>
      <app:stadtteil>St. Georg &amp; Hammerbrook</app:stadtteil>
    </app:stadtteile>
  </gml:featureMember>
</wfs:FeatureCollection>
"#;

    #[test]
    fn feature_members_become_records() {
        let records = read_records(FEATURES.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(field(&records[0], "stadtteil").unwrap(), "Uhlenhorst");
        assert_eq!(field(&records[0], "bezirk").unwrap(), "4");
        assert_eq!(field(&records[0], "posList").unwrap(), "0 0 1 0 1 1");
        assert_eq!(field(&records[1], "stadtteil").unwrap(), "St. Georg & Hammerbrook");
        assert!(field(&records[1], "posList").is_err());
    }

    #[test]
    fn unterminated_feature_is_an_error() {
        let truncated = "<c><gml:featureMember><a>1</a>";
        assert!(read_records(truncated.as_bytes()).is_err());
    }

    #[test]
    fn properties_skip_comments_and_decode_escapes() {
        let properties = read_properties("# Bezirke\n1=Hamburg-Mitte\n\n3 = Eimsb\\u00fcttel\n!x=y\n");
        assert_eq!(properties.len(), 2);
        assert_eq!(properties["1"], "Hamburg-Mitte");
        assert_eq!(properties["3"], "Eimsbüttel");
    }

    #[test]
    fn missing_file_is_reported_as_reference_error() {
        let result = load_records(Path::new("does/not/exist.xml"));
        assert!(matches!(result, Err(Error::ReferenceData(_))));
    }
}
