//! drives one mirror run: serial guard, conversion, diff and submission

use std::collections::BTreeMap;

use crate::dns::protocol::{RecordType, RecordValue};
use crate::dns::zone::{strip_trailing_dot, Zone};
use crate::sync::change::{build_change, ChangeAction, ChangeBatch};
use crate::sync::context::SyncContext;
use crate::sync::convert::convert_zone;
use crate::sync::diff::diff_zones;
use crate::sync::names::rebase_name;

/// TTL of the serial marker record
const MARKER_TTL: u32 = 5;

#[derive(Debug)]
pub enum SyncError {
    Rebase(crate::sync::names::RebaseError),
    Client(crate::dns::client::ClientError),
    Provider(crate::sync::provider::ProviderError),
    /// The serial recorded in the target zone is ahead of the source; the
    /// target was advanced out-of-band and overwriting it would lose newer
    /// state. Requires operator intervention.
    SerialRegression {
        domain: String,
        recorded: u32,
        source: u32,
    },
    MissingSoa {
        domain: String,
    },
    InvalidMarker {
        domain: String,
        value: String,
    },
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Rebase(e) => write!(f, "Rebase error: {}", e),
            SyncError::Client(e) => write!(f, "Transfer error: {}", e),
            SyncError::Provider(e) => write!(f, "Provider error: {}", e),
            SyncError::SerialRegression {
                domain,
                recorded,
                source,
            } => write!(
                f,
                "Recorded serial {} for domain {} is greater than source serial {}",
                recorded, domain, source
            ),
            SyncError::MissingSoa { domain } => {
                write!(f, "Transferred zone {} carries no SOA record", domain)
            }
            SyncError::InvalidMarker { domain, value } => {
                write!(f, "Serial marker for domain {} is not a serial: {}", domain, value)
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl From<crate::sync::names::RebaseError> for SyncError {
    fn from(err: crate::sync::names::RebaseError) -> Self {
        SyncError::Rebase(err)
    }
}

impl From<crate::dns::client::ClientError> for SyncError {
    fn from(err: crate::dns::client::ClientError) -> Self {
        SyncError::Client(err)
    }
}

impl From<crate::sync::provider::ProviderError> for SyncError {
    fn from(err: crate::sync::provider::ProviderError) -> Self {
        SyncError::Provider(err)
    }
}

type Result<T> = std::result::Result<T, SyncError>;

/// How a domain's mirror pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// A change batch was submitted with this many changes
    Submitted(usize),
    /// Nothing to do, or dry-run; no batch was submitted
    SkippedNoop,
}

/// Mirrors every configured domain into the hosted target zone.
///
/// All source zones are transferred first, then the target zone is listed
/// once and treated as immutable while each domain is reconciled against
/// it sequentially.
pub fn run(context: &SyncContext) -> Result<()> {
    let mut master_zones = BTreeMap::new();
    for domain in &context.config.domains {
        let zone = context.transfer.transfer_zone(domain)?;
        master_zones.insert(domain.clone(), zone);
    }

    log::info!("getting records from the hosted zone provider");
    let rows = context.provider.list_record_rows(&context.config.zone_id)?;
    let target_zone = crate::sync::provider::build_target_zone(&context.config.zone_name, &rows)?;

    for domain in &context.config.domains {
        mirror_domain(context, domain, &master_zones[domain], &target_zone)?;
    }

    Ok(())
}

/// Reconciles one domain: read the serial marker, guard against regression,
/// build the diff and decide whether to submit.
pub fn mirror_domain(
    context: &SyncContext,
    domain: &str,
    master_zone: &Zone,
    target_zone: &Zone,
) -> Result<MirrorOutcome> {
    let config = &context.config;
    log::info!(
        "mirroring zone {} into hosted zone {}",
        domain,
        config.zone_name
    );

    // ReadSerial
    let serial = master_zone
        .soa_serial()
        .ok_or_else(|| SyncError::MissingSoa {
            domain: domain.to_string(),
        })?;

    let marker_fqdn = format!("{}.{}.", config.serial_record, strip_trailing_dot(domain));
    let marker_name = rebase_name(&master_zone.origin, &target_zone.origin, &marker_fqdn)?;
    let recorded = read_marker(target_zone, &marker_name, domain)?;

    // CompareSerial
    if let Some(recorded) = recorded {
        if recorded > serial {
            log::error!(
                "recorded serial {} for domain {} is greater than source serial {}",
                recorded,
                domain,
                serial
            );
            return Err(SyncError::SerialRegression {
                domain: domain.to_string(),
                recorded,
                source: serial,
            });
        }
    }
    log::info!(
        "comparing SOA serial (recorded={:?}, transferred={})",
        recorded,
        serial
    );

    // BuildDiff
    let converted = convert_zone(&target_zone.origin, master_zone)?;
    let ignored_domains: Vec<String> = config
        .domains
        .iter()
        .filter(|other| other.as_str() != domain)
        .cloned()
        .collect();
    let differences = diff_zones(
        domain,
        target_zone,
        &converted,
        config.ignore_ttl,
        &ignored_domains,
    );

    // The marker upsert always leads the batch; entries for the marker's
    // own name and for SOA record sets are handled here, never by the diff.
    let mut changes = Vec::new();
    changes.extend(build_change(
        &marker_name,
        &config.zone_name,
        RecordType::Txt,
        &[RecordValue::Txt {
            data: format!("\"{}\"", serial),
        }],
        MARKER_TTL,
        ChangeAction::Upsert,
    ));
    for entry in &differences {
        if entry.node == marker_name {
            continue;
        }
        if entry.rtype == RecordType::Soa {
            continue;
        }
        changes.extend(build_change(
            &entry.node,
            &config.zone_name,
            entry.rtype,
            &entry.values,
            entry.ttl,
            entry.action,
        ));
    }

    // Submit | SkipNoop
    if changes.len() == 1 && recorded == Some(serial) {
        log::info!("no change for {}", domain);
        return Ok(MirrorOutcome::SkippedNoop);
    }

    if config.dry_run {
        log::info!(
            "dry-run: not submitting {} changes for {}",
            changes.len(),
            domain
        );
        return Ok(MirrorOutcome::SkippedNoop);
    }

    let batch = ChangeBatch {
        comment: "zonemirror".to_string(),
        changes,
    };
    context.provider.submit_changes(&config.zone_id, &batch)?;
    log::info!(
        "submitted {} changes for {} (serial {})",
        batch.changes.len(),
        domain,
        serial
    );

    Ok(MirrorOutcome::Submitted(batch.changes.len()))
}

fn read_marker(target_zone: &Zone, marker_name: &str, domain: &str) -> Result<Option<u32>> {
    let record_set = match target_zone.record_set(marker_name, RecordType::Txt) {
        Some(record_set) => record_set,
        None => return Ok(None),
    };

    let data = match record_set.values().first() {
        Some(RecordValue::Txt { data }) => data,
        _ => return Ok(None),
    };

    data.trim_matches('"')
        .parse::<u32>()
        .map(Some)
        .map_err(|_| SyncError::InvalidMarker {
            domain: domain.to_string(),
            value: data.clone(),
        })
}
