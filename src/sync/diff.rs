//! diffs two zone snapshots into an ordered, deduplicated change list

use crate::dns::protocol::{RecordType, RecordValue};
use crate::dns::zone::Zone;
use crate::sync::change::ChangeAction;
use crate::sync::names::is_under_domain;

/// One entry of a zone diff
///
/// Entries are deduplicated by full equality; the first occurrence wins the
/// position in the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub node: String,
    pub rtype: RecordType,
    pub values: Vec<RecordValue>,
    pub ttl: u32,
    pub action: ChangeAction,
}

/// Compares the `current` zone snapshot against the `desired` one and
/// returns the changes that make current match desired, scoped to `domain`.
///
/// Only nodes under `domain` take part; nodes under any of
/// `ignored_domains` are excluded from both sides, so aggregated target
/// zones holding several source domains do not cross-contaminate each
/// other's diffs.
///
/// The pass order matters for reproducibility: removals and updates seen
/// from the current zone come first, then creations and updates seen from
/// the desired zone. SOA record sets and NS record sets at the zone apex
/// are never diffed; the provider manages both. A mismatching record set
/// yields one UPSERT carrying the desired values and the desired TTL. TTL
/// drift on otherwise equal record sets is tolerated under `ignore_ttl`.
pub fn diff_zones(
    domain: &str,
    current: &Zone,
    desired: &Zone,
    ignore_ttl: bool,
    ignored_domains: &[String],
) -> Vec<DiffEntry> {
    let mut differences: Vec<DiffEntry> = Vec::new();

    // Pass 1: what has to go away or change, from the current zone's
    // perspective.
    for (name, current_node) in current.nodes() {
        if !is_under_domain(domain, name, &current.origin) {
            continue;
        }
        if ignored_domains
            .iter()
            .any(|ignored| is_under_domain(ignored, name, &current.origin))
        {
            continue;
        }

        match desired.node(name) {
            None => {
                // The whole node is gone: one DELETE per record set, not
                // one per value.
                for record_set in current_node.values() {
                    push_unique(
                        &mut differences,
                        DiffEntry {
                            node: name.clone(),
                            rtype: record_set.rtype,
                            values: record_set.values().to_vec(),
                            ttl: record_set.ttl,
                            action: ChangeAction::Delete,
                        },
                    );
                }
            }
            Some(desired_node) => {
                for (rtype, current_set) in current_node {
                    match desired_node.get(rtype) {
                        None => push_unique(
                            &mut differences,
                            DiffEntry {
                                node: name.clone(),
                                rtype: *rtype,
                                values: current_set.values().to_vec(),
                                ttl: current_set.ttl,
                                action: ChangeAction::Delete,
                            },
                        ),
                        Some(desired_set) => {
                            let differs = !current_set.values_equal(desired_set)
                                || (!ignore_ttl && current_set.ttl != desired_set.ttl);
                            if differs {
                                push_unique(
                                    &mut differences,
                                    DiffEntry {
                                        node: name.clone(),
                                        rtype: *rtype,
                                        values: desired_set.values().to_vec(),
                                        ttl: desired_set.ttl,
                                        action: ChangeAction::Upsert,
                                    },
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    // Pass 2: what has to appear or change, from the desired zone's
    // perspective.
    for (name, desired_node) in desired.nodes() {
        if !is_under_domain(domain, name, &desired.origin) {
            continue;
        }
        if ignored_domains
            .iter()
            .any(|ignored| is_under_domain(ignored, name, &desired.origin))
        {
            continue;
        }

        let current_node = current.node(name);

        for (rtype, desired_set) in desired_node {
            if *rtype == RecordType::Soa {
                continue;
            }
            if *rtype == RecordType::Ns && name == "@" {
                continue;
            }

            match current_node.and_then(|node| node.get(rtype)) {
                None => push_unique(
                    &mut differences,
                    DiffEntry {
                        node: name.clone(),
                        rtype: *rtype,
                        values: desired_set.values().to_vec(),
                        ttl: desired_set.ttl,
                        action: ChangeAction::Upsert,
                    },
                ),
                Some(current_set) => {
                    if !current_set.values_equal(desired_set) {
                        push_unique(
                            &mut differences,
                            DiffEntry {
                                node: name.clone(),
                                rtype: *rtype,
                                values: desired_set.values().to_vec(),
                                ttl: desired_set.ttl,
                                action: ChangeAction::Upsert,
                            },
                        );
                    }

                    if current_set.ttl != desired_set.ttl {
                        if !ignore_ttl {
                            // When the values differ as well this collapses
                            // into the UPSERT above through deduplication.
                            push_unique(
                                &mut differences,
                                DiffEntry {
                                    node: name.clone(),
                                    rtype: *rtype,
                                    values: desired_set.values().to_vec(),
                                    ttl: desired_set.ttl,
                                    action: ChangeAction::Upsert,
                                },
                            );
                        } else {
                            log::info!("ignoring TTL update for {}", name);
                        }
                    }
                }
            }
        }
    }

    differences
}

fn push_unique(differences: &mut Vec<DiffEntry>, entry: DiffEntry) {
    if !differences.contains(&entry) {
        differences.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a_value(addr: &str) -> RecordValue {
        RecordValue::A {
            addr: addr.parse().unwrap(),
        }
    }

    fn zone_with_www(ttl: u32, addr: &str) -> Zone {
        let mut zone = Zone::new("example.org");
        zone.add_value("www", RecordType::A, ttl, a_value(addr));
        zone
    }

    #[test]
    fn test_diff_against_self_is_empty() {
        let mut zone = Zone::new("example.org");
        zone.add_value("www", RecordType::A, 300, a_value("10.0.0.1"));
        zone.add_value("www", RecordType::A, 300, a_value("10.0.0.2"));
        zone.add_value(
            "mail",
            RecordType::Cname,
            600,
            RecordValue::Cname {
                host: "www.example.org.".to_string(),
            },
        );

        assert!(diff_zones("example.org", &zone, &zone, false, &[]).is_empty());
    }

    #[test]
    fn test_value_change_yields_one_upsert() {
        let current = zone_with_www(300, "10.0.0.1");
        let desired = zone_with_www(300, "10.0.0.2");

        let diff = diff_zones("example.org", &current, &desired, false, &[]);

        assert_eq!(
            vec![DiffEntry {
                node: "www".to_string(),
                rtype: RecordType::A,
                values: vec![a_value("10.0.0.2")],
                ttl: 300,
                action: ChangeAction::Upsert,
            }],
            diff
        );
    }

    #[test]
    fn test_ttl_change_respects_ignore_ttl() {
        let current = zone_with_www(300, "10.0.0.1");
        let desired = zone_with_www(600, "10.0.0.1");

        let diff = diff_zones("example.org", &current, &desired, false, &[]);
        assert_eq!(
            vec![DiffEntry {
                node: "www".to_string(),
                rtype: RecordType::A,
                values: vec![a_value("10.0.0.1")],
                ttl: 600,
                action: ChangeAction::Upsert,
            }],
            diff
        );

        let diff = diff_zones("example.org", &current, &desired, true, &[]);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_value_and_ttl_change_yield_one_combined_upsert() {
        // Locks in the resolution of the double-emit ambiguity: the
        // desired values and the desired TTL travel in a single entry.
        let current = zone_with_www(300, "10.0.0.1");
        let desired = zone_with_www(600, "10.0.0.2");

        let diff = diff_zones("example.org", &current, &desired, false, &[]);

        assert_eq!(
            vec![DiffEntry {
                node: "www".to_string(),
                rtype: RecordType::A,
                values: vec![a_value("10.0.0.2")],
                ttl: 600,
                action: ChangeAction::Upsert,
            }],
            diff
        );
    }

    #[test]
    fn test_node_missing_from_desired_yields_delete_per_record_set() {
        let mut current = Zone::new("example.org");
        current.add_value("old", RecordType::A, 300, a_value("10.0.0.1"));
        current.add_value("old", RecordType::A, 300, a_value("10.0.0.2"));
        current.add_value(
            "old",
            RecordType::Txt,
            60,
            RecordValue::Txt {
                data: "\"legacy\"".to_string(),
            },
        );
        let desired = Zone::new("example.org");

        let diff = diff_zones("example.org", &current, &desired, false, &[]);

        assert_eq!(2, diff.len());
        assert!(diff.iter().all(|entry| entry.action == ChangeAction::Delete));
        let a_entry = diff.iter().find(|e| e.rtype == RecordType::A).unwrap();
        assert_eq!(2, a_entry.values.len());
    }

    #[test]
    fn test_record_set_missing_from_desired_node_yields_delete() {
        let mut current = zone_with_www(300, "10.0.0.1");
        current.add_value(
            "www",
            RecordType::Txt,
            60,
            RecordValue::Txt {
                data: "\"stale\"".to_string(),
            },
        );
        let desired = zone_with_www(300, "10.0.0.1");

        let diff = diff_zones("example.org", &current, &desired, false, &[]);

        assert_eq!(
            vec![DiffEntry {
                node: "www".to_string(),
                rtype: RecordType::Txt,
                values: vec![RecordValue::Txt {
                    data: "\"stale\"".to_string()
                }],
                ttl: 60,
                action: ChangeAction::Delete,
            }],
            diff
        );
    }

    #[test]
    fn test_new_node_yields_upsert() {
        let current = Zone::new("example.org");
        let desired = zone_with_www(300, "10.0.0.1");

        let diff = diff_zones("example.org", &current, &desired, false, &[]);

        assert_eq!(1, diff.len());
        assert_eq!(ChangeAction::Upsert, diff[0].action);
        assert_eq!("www", diff[0].node);
    }

    #[test]
    fn test_soa_and_apex_ns_are_never_created() {
        let current = Zone::new("example.org");
        let mut desired = Zone::new("example.org");
        desired.add_value(
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
        desired.add_value(
            "@",
            RecordType::Ns,
            3600,
            RecordValue::Ns {
                host: "ns1.example.org.".to_string(),
            },
        );
        // NS below the apex is fair game.
        desired.add_value(
            "sub",
            RecordType::Ns,
            3600,
            RecordValue::Ns {
                host: "ns1.sub.example.org.".to_string(),
            },
        );

        let diff = diff_zones("example.org", &current, &desired, false, &[]);

        assert_eq!(1, diff.len());
        assert_eq!("sub", diff[0].node);
        assert_eq!(RecordType::Ns, diff[0].rtype);
    }

    #[test]
    fn test_nodes_outside_domain_are_out_of_scope() {
        let mut current = Zone::new("example.org");
        current.add_value("www.other", RecordType::A, 300, a_value("10.0.0.9"));
        let desired = Zone::new("example.org");

        let diff = diff_zones("ad.example.org", &current, &desired, false, &[]);

        assert!(diff.is_empty());
    }

    #[test]
    fn test_ignored_domains_are_excluded_in_both_directions() {
        let mut current = Zone::new("example.org");
        current.add_value("www.corp", RecordType::A, 300, a_value("10.0.0.1"));
        let mut desired = Zone::new("example.org");
        desired.add_value("www.corp", RecordType::A, 300, a_value("10.0.0.2"));
        desired.add_value("www.lab.corp", RecordType::A, 300, a_value("10.0.0.3"));

        let ignored = vec!["lab.corp.example.org".to_string()];
        let diff = diff_zones("corp.example.org", &current, &desired, false, &ignored);

        assert_eq!(1, diff.len());
        assert_eq!("www.corp", diff[0].node);
    }
}
