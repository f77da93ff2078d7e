//! client for the hosted zone provider's record listing and batch change APIs

use std::time::Duration;

use serde_derive::{Deserialize, Serialize};

use crate::dns::protocol::{RecordType, RecordValue};
use crate::dns::zone::{relativize_name, Zone};
use crate::sync::change::{ChangeBatch, ResourceRecord};

#[derive(Debug)]
pub enum ProviderError {
    Http(reqwest::Error),
    Protocol(crate::dns::protocol::ProtocolError),
    Rejected { status: u16, body: String },
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Http(e) => write!(f, "HTTP error: {}", e),
            ProviderError::Protocol(e) => write!(f, "Protocol error: {}", e),
            ProviderError::Rejected { status, body } => {
                write!(f, "Change batch rejected ({}): {}", status, body)
            }
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err)
    }
}

impl From<crate::dns::protocol::ProtocolError> for ProviderError {
    fn from(err: crate::dns::protocol::ProtocolError) -> Self {
        ProviderError::Protocol(err)
    }
}

type Result<T> = std::result::Result<T, ProviderError>;

/// One flattened record row as the provider lists it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordRow {
    pub name: String,
    #[serde(rename = "Type")]
    pub rtype: String,
    #[serde(rename = "TTL")]
    pub ttl: u32,
    pub resource_records: Vec<ResourceRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListRecordsResponse {
    record_sets: Vec<RecordRow>,
    next_token: Option<String>,
}

/// Access to the hosted target zone: list its record rows and apply one
/// atomic change batch
pub trait ZoneProvider {
    fn list_record_rows(&self, zone_id: &str) -> Result<Vec<RecordRow>>;
    fn submit_changes(&self, zone_id: &str, batch: &ChangeBatch) -> Result<()>;
}

/// Talks to the provider's HTTP API, following its listing pagination
pub struct HttpZoneProvider {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpZoneProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<HttpZoneProvider> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(HttpZoneProvider {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl ZoneProvider for HttpZoneProvider {
    fn list_record_rows(&self, zone_id: &str) -> Result<Vec<RecordRow>> {
        let mut rows = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/zones/{}/records", self.endpoint, zone_id));
            if let Some(token) = &next_token {
                request = request.query(&[("next", token.as_str())]);
            }

            let page: ListRecordsResponse =
                request.send()?.error_for_status()?.json()?;
            rows.extend(page.record_sets);

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(rows)
    }

    fn submit_changes(&self, zone_id: &str, batch: &ChangeBatch) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/zones/{}/changes", self.endpoint, zone_id))
            .json(batch)
            .send()?;

        if !response.status().is_success() {
            return Err(ProviderError::Rejected {
                status: response.status().as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        Ok(())
    }
}

/// Assembles the flattened provider rows into one zone snapshot anchored at
/// `origin`.
///
/// Rows of a record type outside the closed enumeration are logged and
/// skipped; they stay invisible to the diff and are therefore never
/// touched.
pub fn build_target_zone(origin: &str, rows: &[RecordRow]) -> Result<Zone> {
    let mut zone = Zone::new(origin);

    for row in rows {
        let rtype = match RecordType::from_name(&row.rtype) {
            Some(rtype) => rtype,
            None => {
                log::warn!(
                    "skipping record {} with unsupported type {}",
                    row.name,
                    row.rtype
                );
                continue;
            }
        };

        let node = relativize_name(&row.name, &zone.origin);
        for resource_record in &row.resource_records {
            let value = RecordValue::from_value_string(rtype, &resource_record.value)?;
            zone.add_value(&node, rtype, row.ttl, value);
        }
    }

    Ok(zone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, rtype: &str, ttl: u32, values: &[&str]) -> RecordRow {
        RecordRow {
            name: name.to_string(),
            rtype: rtype.to_string(),
            ttl,
            resource_records: values
                .iter()
                .map(|value| ResourceRecord {
                    value: value.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_rows_assemble_into_zone() {
        let rows = vec![
            row("example.org.", "NS", 172800, &["ns1.provider.net."]),
            row(
                "example.org.",
                "SOA",
                900,
                &["ns1.provider.net. hostmaster.provider.net. 1 7200 900 1209600 86400"],
            ),
            row(
                "www.activedirectory.example.org.",
                "A",
                300,
                &["10.0.0.1", "10.0.0.2"],
            ),
            row(
                "zoneserial.activedirectory.example.org.",
                "TXT",
                5,
                &["\"42\""],
            ),
        ];

        let zone = build_target_zone("example.org.", &rows).unwrap();

        assert_eq!(
            2,
            zone.record_set("www.activedirectory", RecordType::A)
                .unwrap()
                .values()
                .len()
        );
        assert!(zone.record_set("@", RecordType::Ns).is_some());
        assert_eq!(
            &[RecordValue::Txt {
                data: "\"42\"".to_string()
            }],
            zone.record_set("zoneserial.activedirectory", RecordType::Txt)
                .unwrap()
                .values()
        );
    }

    #[test]
    fn test_unsupported_row_types_are_skipped() {
        let rows = vec![
            row("example.org.", "CAA", 300, &["0 issue \"ca.example.net\""]),
            row("www.example.org.", "A", 300, &["10.0.0.1"]),
        ];

        let zone = build_target_zone("example.org.", &rows).unwrap();

        assert!(zone.record_set("www", RecordType::A).is_some());
        assert!(zone.node("@").is_none());
    }

    #[test]
    fn test_malformed_row_value_is_fatal() {
        let rows = vec![row("www.example.org.", "A", 300, &["not-an-address"])];

        assert!(build_target_zone("example.org.", &rows).is_err());
    }

    #[test]
    fn test_row_wire_shape() {
        let json = serde_json::json!({
            "Name": "www.example.org.",
            "Type": "A",
            "TTL": 300,
            "ResourceRecords": [{"Value": "10.0.0.1"}],
        });

        let parsed: RecordRow = serde_json::from_value(json).unwrap();
        assert_eq!(row("www.example.org.", "A", 300, &["10.0.0.1"]), parsed);
    }
}
