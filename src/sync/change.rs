//! builds the change batch submitted to the hosted zone provider

use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::dns::protocol::{RecordType, RecordValue};
use crate::dns::zone::strip_trailing_dot;

/// The mutation kinds the provider's batch change API accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Create,
    Upsert,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ChangeAction::Create => write!(f, "CREATE"),
            ChangeAction::Upsert => write!(f, "UPSERT"),
            ChangeAction::Delete => write!(f, "DELETE"),
        }
    }
}

/// One value cell of a change record or provider record row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRecord {
    pub value: String,
}

/// One record mutation in the provider's wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeRecord {
    pub action: ChangeAction,
    pub name: String,
    #[serde(rename = "Type")]
    pub rtype: String,
    #[serde(rename = "TTL")]
    pub ttl: u32,
    pub resource_records: Vec<ResourceRecord>,
}

/// The atomic batch submitted to the provider, one per domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeBatch {
    pub comment: String,
    pub changes: Vec<ChangeRecord>,
}

/// Builds one change record for the provider's batch API, fully qualifying
/// `host_name` against `domain`.
///
/// NS records at the zone apex are delegation records the provider manages
/// itself; they are never emitted and yield `None`. Callers skip a `None`
/// without treating it as an error.
pub fn build_change(
    host_name: &str,
    domain: &str,
    rtype: RecordType,
    values: &[RecordValue],
    ttl: u32,
    action: ChangeAction,
) -> Option<ChangeRecord> {
    if rtype == RecordType::Ns && host_name == "@" {
        return None;
    }

    let domain = format!("{}.", strip_trailing_dot(domain));
    let fqdn = if host_name == "@" {
        domain
    } else if host_name.ends_with('.') {
        format!("{}{}", host_name, domain)
    } else {
        format!("{}.{}", host_name, domain)
    };

    let mut resource_records = Vec::new();
    for value in values {
        let value = value.to_value_string();
        log::info!("{}: {} {} => {} (ttl {})", action, rtype, fqdn, value, ttl);
        resource_records.push(ResourceRecord { value });
    }

    Some(ChangeRecord {
        action,
        name: fqdn,
        rtype: rtype.to_string(),
        ttl,
        resource_records,
    })
}
