//! Contains the in-memory zone snapshots the mirror reconciles
//!
//! A `Zone` holds every node of one origin, keyed by the node's name
//! relative to that origin. The special name `@` refers to the zone apex.
//! Each node carries at most one `RecordSet` per record type; a record set
//! groups all values of that type together with their shared TTL.
//!
//! Snapshots are value objects: they are assembled once, from a zone
//! transfer or from a provider listing, and only read afterwards.

use std::collections::BTreeMap;

use crate::dns::protocol::{RecordType, RecordValue};

/// All values of one record type at a node, sharing a TTL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSet {
    pub rtype: RecordType,
    pub ttl: u32,
    values: Vec<RecordValue>,
}

impl RecordSet {
    pub fn new(rtype: RecordType, ttl: u32) -> RecordSet {
        RecordSet {
            rtype,
            ttl,
            values: Vec::new(),
        }
    }

    /// Adds a value, refusing duplicates. Returns whether the value was new.
    pub fn add_value(&mut self, value: RecordValue) -> bool {
        if self.values.contains(&value) {
            return false;
        }

        self.values.push(value);
        true
    }

    pub fn values(&self) -> &[RecordValue] {
        &self.values
    }

    /// Compares the value sets of two record sets, ignoring value order and
    /// TTL. TTL sensitivity is the caller's decision.
    pub fn values_equal(&self, other: &RecordSet) -> bool {
        if self.values.len() != other.values.len() {
            return false;
        }

        let mut ours = self.values.clone();
        let mut theirs = other.values.clone();
        ours.sort();
        theirs.sort();

        ours == theirs
    }
}

/// The record sets of one node, keyed by record type
pub type Node = BTreeMap<RecordType, RecordSet>;

/// A zone snapshot: one origin plus its nodes
#[derive(Clone, Debug, Default)]
pub struct Zone {
    pub origin: String,
    nodes: BTreeMap<String, Node>,
}

impl Zone {
    /// Creates an empty zone. The origin is normalized to its fully
    /// qualified form.
    pub fn new(origin: &str) -> Zone {
        let origin = if origin.ends_with('.') {
            origin.to_string()
        } else {
            format!("{}.", origin)
        };

        Zone {
            origin,
            nodes: BTreeMap::new(),
        }
    }

    /// Adds a value to the record set of `rtype` at `name`, creating the
    /// node and the set as needed. The set's TTL follows the last add.
    pub fn add_value(&mut self, name: &str, rtype: RecordType, ttl: u32, value: RecordValue) {
        let node = self.nodes.entry(name.to_string()).or_insert_with(Node::new);
        let record_set = node
            .entry(rtype)
            .or_insert_with(|| RecordSet::new(rtype, ttl));
        record_set.ttl = ttl;
        record_set.add_value(value);
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn record_set(&self, name: &str, rtype: RecordType) -> Option<&RecordSet> {
        self.nodes.get(name).and_then(|node| node.get(&rtype))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The serial of the zone's SOA record, if the snapshot has one
    pub fn soa_serial(&self) -> Option<u32> {
        let soa = self.record_set("@", RecordType::Soa)?;
        soa.values().iter().find_map(|value| match value {
            RecordValue::Soa { serial, .. } => Some(*serial),
            _ => None,
        })
    }
}

/// Strips the trailing root separator, if any
pub fn strip_trailing_dot(name: &str) -> &str {
    name.trim_end_matches('.')
}

/// Fully qualifies `name` against `origin`. The apex token `@` resolves to
/// the origin itself; an already absolute name passes through unchanged.
pub fn qualify_name(name: &str, origin: &str) -> String {
    let origin = if origin.ends_with('.') {
        origin.to_string()
    } else {
        format!("{}.", origin)
    };

    if name == "@" {
        origin
    } else if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.{}", name, origin)
    }
}

/// Makes `name` relative to `origin` where possible: the origin itself
/// becomes `@`, names below it lose the origin suffix, and names outside
/// the origin stay fully qualified.
pub fn relativize_name(name: &str, origin: &str) -> String {
    let stripped = strip_trailing_dot(name);
    let origin_stripped = strip_trailing_dot(origin);

    if stripped == origin_stripped {
        "@".to_string()
    } else if stripped.ends_with(&format!(".{}", origin_stripped)) {
        stripped[..stripped.len() - origin_stripped.len() - 1].to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_value_dedupes() {
        let mut zone = Zone::new("example.org");
        let addr = RecordValue::A {
            addr: "10.0.0.1".parse().unwrap(),
        };

        zone.add_value("www", RecordType::A, 300, addr.clone());
        zone.add_value("www", RecordType::A, 300, addr);

        assert_eq!(1, zone.record_set("www", RecordType::A).unwrap().values().len());
    }

    #[test]
    fn test_origin_is_normalized() {
        assert_eq!("example.org.", Zone::new("example.org").origin);
        assert_eq!("example.org.", Zone::new("example.org.").origin);
    }

    #[test]
    fn test_values_equal_ignores_order() {
        let mut first = RecordSet::new(RecordType::A, 300);
        first.add_value(RecordValue::A {
            addr: "10.0.0.1".parse().unwrap(),
        });
        first.add_value(RecordValue::A {
            addr: "10.0.0.2".parse().unwrap(),
        });

        let mut second = RecordSet::new(RecordType::A, 600);
        second.add_value(RecordValue::A {
            addr: "10.0.0.2".parse().unwrap(),
        });
        second.add_value(RecordValue::A {
            addr: "10.0.0.1".parse().unwrap(),
        });

        assert!(first.values_equal(&second));
        assert_ne!(first, second);
    }

    #[test]
    fn test_soa_serial() {
        let mut zone = Zone::new("example.org");
        assert_eq!(None, zone.soa_serial());

        zone.add_value(
            "@",
            RecordType::Soa,
            3600,
            RecordValue::Soa {
                m_name: "ns1.example.org.".to_string(),
                r_name: "admin.example.org.".to_string(),
                serial: 42,
                refresh: 7200,
                retry: 900,
                expire: 1209600,
                minimum: 86400,
            },
        );

        assert_eq!(Some(42), zone.soa_serial());
    }

    #[test]
    fn test_qualify_name() {
        assert_eq!("example.org.", qualify_name("@", "example.org."));
        assert_eq!("www.example.org.", qualify_name("www", "example.org."));
        assert_eq!("www.example.org.", qualify_name("www", "example.org"));
        assert_eq!("other.com.", qualify_name("other.com.", "example.org."));
    }

    #[test]
    fn test_relativize_name() {
        assert_eq!("@", relativize_name("example.org.", "example.org."));
        assert_eq!("www", relativize_name("www.example.org.", "example.org."));
        assert_eq!(
            "other.com.",
            relativize_name("other.com.", "example.org.")
        );
        // A partial label match is not a suffix match.
        assert_eq!(
            "badexample.org.",
            relativize_name("badexample.org.", "example.org.")
        );
    }
}
