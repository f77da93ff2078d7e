//! clients for pulling zones off the authoritative master

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use rand::random;

use crate::dns::buffer::{BytePacketBuffer, StreamPacketBuffer, VectorPacketBuffer};
use crate::dns::netutil::{read_packet_length_generic, write_packet_length_generic};
use crate::dns::protocol::{DnsPacket, DnsQuestion, RecordType, RecordValue, ResultCode};
use crate::dns::zone::{relativize_name, strip_trailing_dot, Zone};

/// How long to wait on a candidate master before moving to the next one
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub enum ClientError {
    Buffer(crate::dns::buffer::BufferError),
    Protocol(crate::dns::protocol::ProtocolError),
    Io(std::io::Error),
    TransferRefused(ResultCode),
    EmptyAnswer,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Buffer(e) => write!(f, "Buffer error: {}", e),
            ClientError::Protocol(e) => write!(f, "Protocol error: {}", e),
            ClientError::Io(e) => write!(f, "IO error: {}", e),
            ClientError::TransferRefused(rescode) => {
                write!(f, "Transfer refused by master: {:?}", rescode)
            }
            ClientError::EmptyAnswer => write!(f, "Transfer reply carried no records"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err)
    }
}

impl From<crate::dns::buffer::BufferError> for ClientError {
    fn from(err: crate::dns::buffer::BufferError) -> Self {
        ClientError::Buffer(err)
    }
}

impl From<crate::dns::protocol::ProtocolError> for ClientError {
    fn from(err: crate::dns::protocol::ProtocolError) -> Self {
        ClientError::Protocol(err)
    }
}

type Result<T> = std::result::Result<T, ClientError>;

/// Retrieves a full zone snapshot from an authoritative source
pub trait TransferClient {
    fn transfer_zone(&self, domain: &str) -> Result<Zone>;
}

/// Transfers zones from a master server over DNS-over-TCP (AXFR)
pub struct AxfrTransferClient {
    master: SocketAddr,
    timeout: Duration,
}

impl AxfrTransferClient {
    pub fn new(master: SocketAddr, timeout: Duration) -> AxfrTransferClient {
        AxfrTransferClient { master, timeout }
    }

    /// Reads length-prefixed reply packets off `stream` until the closing
    /// SOA arrives, assembling them into a zone snapshot.
    ///
    /// Node names and in-zone record targets are stored relative to the
    /// zone origin; names outside the origin stay fully qualified.
    fn read_zone<R: Read>(&self, domain: &str, stream: &mut R) -> Result<Zone> {
        let mut zone = Zone::new(domain);
        let mut soa_seen = false;

        'transfer: loop {
            let _ = read_packet_length_generic(stream)?;

            let mut stream_buffer = StreamPacketBuffer::new(stream);
            let response = DnsPacket::from_buffer(&mut stream_buffer)?;

            if response.header.rescode != ResultCode::NOERROR {
                return Err(ClientError::TransferRefused(response.header.rescode));
            }
            if response.answers.is_empty() {
                return Err(ClientError::EmptyAnswer);
            }

            for record in response.answers {
                if record.rtype == RecordType::Soa {
                    if soa_seen {
                        // The transfer closes with a repeat of the opening
                        // SOA.
                        break 'transfer;
                    }
                    soa_seen = true;
                }

                let value = match record.value {
                    Some(value) => value,
                    None => {
                        log::debug!(
                            "skipping unsupported record type {} at {}",
                            record.rtype,
                            record.name
                        );
                        continue;
                    }
                };

                let node = relativize_name(&record.name, &zone.origin);
                let value = relativize_value(value, &zone.origin);
                zone.add_value(&node, record.rtype, record.ttl, value);
            }
        }

        Ok(zone)
    }
}

impl TransferClient for AxfrTransferClient {
    fn transfer_zone(&self, domain: &str) -> Result<Zone> {
        log::info!("transferring zone {} from {}", domain, self.master);

        let mut stream = TcpStream::connect_timeout(&self.master, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let mut packet = DnsPacket::new();
        packet.header.id = random::<u16>();
        packet.questions.push(DnsQuestion::new(
            strip_trailing_dot(domain).to_string(),
            RecordType::Axfr,
        ));

        let mut req_buffer = VectorPacketBuffer::new();
        packet.write(&mut req_buffer)?;

        write_packet_length_generic(&mut stream, req_buffer.pos)?;
        stream.write_all(&req_buffer.buffer[0..req_buffer.pos])?;

        self.read_zone(domain, &mut stream)
    }
}

/// Makes the names embedded in a record value relative to `origin`, the way
/// node names are stored
fn relativize_value(value: RecordValue, origin: &str) -> RecordValue {
    match value {
        RecordValue::Cname { host } => RecordValue::Cname {
            host: relativize_name(&host, origin),
        },
        RecordValue::Ns { host } => RecordValue::Ns {
            host: relativize_name(&host, origin),
        },
        RecordValue::Mx {
            preference,
            exchange,
        } => RecordValue::Mx {
            preference,
            exchange: relativize_name(&exchange, origin),
        },
        RecordValue::Srv {
            priority,
            weight,
            port,
            target,
        } => RecordValue::Srv {
            priority,
            weight,
            port,
            target: relativize_name(&target, origin),
        },
        other => other,
    }
}

/// Walks the candidate master servers in order and returns the first one
/// that answers an NS query for `domain` within the probe timeout.
pub fn probe_master(candidates: &[String], domain: &str) -> Option<SocketAddr> {
    for candidate in candidates {
        let addrs = match resolve_candidate(candidate) {
            Ok(addrs) => addrs,
            Err(e) => {
                log::warn!("! {}: {}", candidate, e);
                continue;
            }
        };

        for addr in addrs {
            log::info!("testing master candidate {} ({})", candidate, addr);
            match probe_one(addr, domain) {
                Ok(true) => {
                    log::info!("{} ({}) OK", candidate, addr);
                    return Some(addr);
                }
                Ok(false) => log::info!("{} ({}) NG", candidate, addr),
                Err(e) => log::warn!("! {}: {}", candidate, e),
            }
        }
    }

    None
}

fn resolve_candidate(candidate: &str) -> std::io::Result<Vec<SocketAddr>> {
    if let Ok(addr) = candidate.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }

    Ok(format!("{}:53", strip_trailing_dot(candidate))
        .to_socket_addrs()?
        .collect())
}

fn probe_one(addr: SocketAddr, domain: &str) -> Result<bool> {
    let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr)?;
    socket.set_read_timeout(Some(PROBE_TIMEOUT))?;

    let mut packet = DnsPacket::new();
    packet.header.id = random::<u16>();
    packet.header.recursion_desired = false;
    packet.questions.push(DnsQuestion::new(
        strip_trailing_dot(domain).to_string(),
        RecordType::Ns,
    ));

    let mut req_buffer = VectorPacketBuffer::new();
    packet.write(&mut req_buffer)?;
    socket.send_to(&req_buffer.buffer[0..req_buffer.pos], addr)?;

    let mut res_buffer = BytePacketBuffer::new();
    socket.recv_from(&mut res_buffer.buf)?;

    let response = DnsPacket::from_buffer(&mut res_buffer)?;

    Ok(response.header.rescode == ResultCode::NOERROR)
}
