//! Tag based selection and labelling of OSM entities.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::data::gazetteer::Category;
use crate::data::osm::Tagged;

struct Rule {
    key: &'static str,
    /// `None` accepts any value.
    value: Option<&'static str>,
    category: Category,
    /// Only counts when the entity also has a non-empty `name`.
    named: bool,
}

const fn rule(key: &'static str, value: &'static str, category: Category) -> Rule {
    Rule { key, value: Some(value), category, named: false }
}

const fn named(key: &'static str, value: Option<&'static str>, category: Category) -> Rule {
    Rule { key, value, category, named: true }
}

const RULES: &[Rule] = &[
    rule("amenity", "school", Category::School),
    rule("amenity", "kindergarten", Category::Kindergarten),
    rule("amenity", "university", Category::University),
    rule("amenity", "college", Category::University),
    rule("amenity", "hospital", Category::Hospital),
    rule("amenity", "clinic", Category::Hospital),
    rule("amenity", "police", Category::Police),
    rule("amenity", "fire_station", Category::FireStation),
    rule("amenity", "townhall", Category::Authority),
    rule("amenity", "courthouse", Category::Authority),
    rule("office", "government", Category::Authority),
    rule("amenity", "library", Category::Library),
    rule("amenity", "theatre", Category::Culture),
    rule("amenity", "cinema", Category::Culture),
    rule("amenity", "arts_centre", Category::Culture),
    rule("amenity", "community_centre", Category::Culture),
    rule("tourism", "museum", Category::Culture),
    rule("amenity", "place_of_worship", Category::PlaceOfWorship),
    rule("public_transport", "station", Category::TransportStop),
    rule("public_transport", "stop_position", Category::TransportStop),
    rule("public_transport", "platform", Category::TransportStop),
    rule("railway", "station", Category::TransportStop),
    rule("railway", "halt", Category::TransportStop),
    rule("railway", "tram_stop", Category::TransportStop),
    rule("leisure", "playground", Category::Playground),
    rule("leisure", "sports_centre", Category::Sports),
    rule("leisure", "stadium", Category::Sports),
    rule("leisure", "swimming_pool", Category::Sports),
    Rule { key: "historic", value: None, category: Category::Historic, named: false },
    named("leisure", Some("park"), Category::Park),
    named("natural", Some("water"), Category::Water),
    named("water", None, Category::Water),
    named("waterway", Some("river"), Category::Water),
    named("waterway", Some("canal"), Category::Water),
    named("waterway", Some("stream"), Category::Water),
];

/// `highway` values that make a named way a street.
const STREET_HIGHWAYS: &[&str] = &[
    "motorway", "trunk", "primary", "secondary", "tertiary", "unclassified",
    "residential", "living_street", "pedestrian", "service", "road",
];

const HOUSE_NUMBER: &str = "addr:housenumber";

/// Multi-valued tags separate values with ';'.
fn has_kv_pair(tags: &impl Tagged, key: &str, value: &str) -> bool {
    tags.tag(key)
        .is_some_and(|tag_value| tag_value.split(';').any(|part| part.trim() == value))
}

fn applies(tags: &impl Tagged, rule: &Rule) -> bool {
    let tag_matches = match rule.value {
        Some(value) => has_kv_pair(tags, rule.key, value),
        None => tags.has_value(rule.key),
    };
    tag_matches && (!rule.named || tags.has_value("name"))
}

/// True if the tags match any point-of-interest rule.
pub fn is_interesting(tags: &impl Tagged) -> bool {
    RULES.iter().any(|rule| applies(tags, rule))
}

/// Like [`is_interesting`], but also accepts buildings carrying a house number.
pub fn is_interesting_with_buildings(tags: &impl Tagged) -> bool {
    is_interesting(tags) || (tags.has_value("building") && tags.has_value(HOUSE_NUMBER))
}

/// Gazetteer categories for the tags. Any `building` tag adds BUILDING.
pub fn labels(tags: &impl Tagged) -> BTreeSet<Category> {
    let mut labels: BTreeSet<Category> = RULES
        .iter()
        .filter(|rule| applies(tags, rule))
        .map(|rule| rule.category)
        .collect();
    if tags.has_value("building") {
        labels.insert(Category::Building);
    }
    labels
}

pub fn is_street(tags: &impl Tagged) -> bool {
    tags.has_value("name")
        && STREET_HIGHWAYS
            .iter()
            .any(|highway| has_kv_pair(tags, "highway", highway))
}

// Names like "Mundsburg (U3)" carry a qualifier we don't want to search for.
static QUALIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?<base_name>[^(]*)(\(.*\))?$").expect("valid regex"));

/// The name as it would appear in running text.
pub fn keyword_name(name: &str) -> &str {
    QUALIFIER_RE
        .captures(name)
        .and_then(|captures| captures.name("base_name"))
        .map(|base| base.as_str().trim())
        .filter(|base| !base.is_empty())
        .unwrap_or_else(|| name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::osm::Tags;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn school_and_hospital_are_labelled() {
        assert_eq!(labels(&tags(&[("amenity", "school")])), BTreeSet::from([Category::School]));
        assert_eq!(labels(&tags(&[("amenity", "hospital")])), BTreeSet::from([Category::Hospital]));
        assert!(is_interesting(&tags(&[("amenity", "school")])));
    }

    #[test]
    fn parks_need_a_name() {
        let unnamed = tags(&[("leisure", "park")]);
        assert!(!is_interesting(&unnamed));
        assert!(labels(&unnamed).is_empty());

        let park = tags(&[("leisure", "park"), ("name", "Alsterpark")]);
        assert!(is_interesting(&park));
        assert_eq!(labels(&park), BTreeSet::from([Category::Park]));
    }

    #[test]
    fn transport_stops_do_not_need_a_name() {
        assert_eq!(
            labels(&tags(&[("public_transport", "stop_position")])),
            BTreeSet::from([Category::TransportStop])
        );
        assert_eq!(
            labels(&tags(&[("railway", "station")])),
            BTreeSet::from([Category::TransportStop])
        );
    }

    #[test]
    fn any_historic_value_is_interesting() {
        assert!(is_interesting(&tags(&[("historic", "memorial")])));
    }

    #[test]
    fn buildings_need_a_house_number_in_the_building_variant() {
        let building = tags(&[("building", "yes")]);
        assert!(!is_interesting(&building));
        assert!(!is_interesting_with_buildings(&building));

        let addressed = tags(&[("building", "yes"), ("addr:housenumber", "12a")]);
        assert!(!is_interesting(&addressed));
        assert!(is_interesting_with_buildings(&addressed));
        assert_eq!(labels(&addressed), BTreeSet::from([Category::Building]));
    }

    #[test]
    fn multi_valued_tags_are_split() {
        assert_eq!(
            labels(&tags(&[("amenity", "school;kindergarten")])),
            BTreeSet::from([Category::School, Category::Kindergarten])
        );
    }

    #[test]
    fn uninteresting_tags_get_no_label() {
        let shop = tags(&[("shop", "bakery"), ("name", "Bäcker")]);
        assert!(!is_interesting(&shop));
        assert!(labels(&shop).is_empty());
    }

    #[test]
    fn streets_are_named_highways() {
        assert!(is_street(&tags(&[("highway", "residential"), ("name", "Hofweg")])));
        assert!(!is_street(&tags(&[("highway", "residential")])));
        assert!(!is_street(&tags(&[("highway", "footway"), ("name", "Alsterwanderweg")])));
    }

    #[test]
    fn keyword_name_strips_qualifier() {
        assert_eq!(keyword_name("Mundsburg (U3)"), "Mundsburg");
        assert_eq!(keyword_name("Hauptbahnhof"), "Hauptbahnhof");
        assert_eq!(keyword_name("(U3)"), "(U3)");
    }
}
