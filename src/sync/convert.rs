//! re-addresses a whole zone snapshot under a different origin

use crate::dns::protocol::RecordValue;
use crate::dns::zone::{qualify_name, Zone};
use crate::sync::names::{rebase_name, RebaseError};

type Result<T> = std::result::Result<T, RebaseError>;

/// Builds a new zone holding every node of `source_zone` rebased under
/// `target_origin`.
///
/// Record values that reference other names inside the zone (CNAME, NS and
/// SRV targets, MX exchanges) must follow the same origin translation as
/// node names, or cross-references break after the rebase. Only relative
/// embedded names are translated; fully qualified ones pass through
/// verbatim. TTLs are copied unchanged.
pub fn convert_zone(target_origin: &str, source_zone: &Zone) -> Result<Zone> {
    let mut new_zone = Zone::new(target_origin);

    for (name, node) in source_zone.nodes() {
        let new_name = rebase_name(&source_zone.origin, &new_zone.origin, name)?;

        for (rtype, record_set) in node {
            for value in record_set.values() {
                let new_value =
                    rebase_record_value(value, &source_zone.origin, &new_zone.origin)?;
                new_zone.add_value(&new_name, *rtype, record_set.ttl, new_value);
            }
        }
    }

    Ok(new_zone)
}

fn rebase_record_value(
    value: &RecordValue,
    source_origin: &str,
    target_origin: &str,
) -> Result<RecordValue> {
    let rebased = match value {
        RecordValue::Cname { host } if !host.ends_with('.') => RecordValue::Cname {
            host: rebase_target(host, source_origin, target_origin)?,
        },
        RecordValue::Ns { host } if !host.ends_with('.') => RecordValue::Ns {
            host: rebase_target(host, source_origin, target_origin)?,
        },
        RecordValue::Mx {
            preference,
            exchange,
        } if !exchange.ends_with('.') => RecordValue::Mx {
            preference: *preference,
            exchange: rebase_target(exchange, source_origin, target_origin)?,
        },
        RecordValue::Srv {
            priority,
            weight,
            port,
            target,
        } if !target.ends_with('.') => RecordValue::Srv {
            priority: *priority,
            weight: *weight,
            port: *port,
            target: rebase_target(target, source_origin, target_origin)?,
        },
        other => other.clone(),
    };

    Ok(rebased)
}

/// Rebases a relative embedded name the same way node names are rebased,
/// then re-qualifies it under the new origin
fn rebase_target(target: &str, source_origin: &str, target_origin: &str) -> Result<String> {
    let rebased = rebase_name(source_origin, target_origin, target)?;

    Ok(qualify_name(&rebased, target_origin))
}
