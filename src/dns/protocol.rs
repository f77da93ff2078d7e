//! implements the DNS protocol in a transport agnostic fashion

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use derive_more::{Display, Error, From};
use serde_derive::{Deserialize, Serialize};

use crate::dns::buffer::PacketBuffer;

#[derive(Debug, Display, From, Error)]
pub enum ProtocolError {
    Buffer(crate::dns::buffer::BufferError),
    Io(std::io::Error),
    Addr(std::net::AddrParseError),
    Int(std::num::ParseIntError),
    MalformedValue,
}

type Result<T> = std::result::Result<T, ProtocolError>;

/// `RecordType` is the closed enumeration of record types the mirror
/// understands.
///
/// The specific type Unknown takes an integer parameter in order to retain
/// the code of an unknown record when skipping over it. An integer can be
/// converted to a record type using the `from_num` function, and back to an
/// integer using the `to_num` method. The textual names used by the hosted
/// zone provider map through `from_name` and the `Display` impl.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    Unknown(u16),
    A,     // 1
    Ns,    // 2
    Cname, // 5
    Soa,   // 6
    Mx,    // 15
    Txt,   // 16
    Aaaa,  // 28
    Srv,   // 33
    Axfr,  // 252
}

impl RecordType {
    pub fn to_num(&self) -> u16 {
        match *self {
            RecordType::Unknown(x) => x,
            RecordType::A => 1,
            RecordType::Ns => 2,
            RecordType::Cname => 5,
            RecordType::Soa => 6,
            RecordType::Mx => 15,
            RecordType::Txt => 16,
            RecordType::Aaaa => 28,
            RecordType::Srv => 33,
            RecordType::Axfr => 252,
        }
    }

    pub fn from_num(num: u16) -> RecordType {
        match num {
            1 => RecordType::A,
            2 => RecordType::Ns,
            5 => RecordType::Cname,
            6 => RecordType::Soa,
            15 => RecordType::Mx,
            16 => RecordType::Txt,
            28 => RecordType::Aaaa,
            33 => RecordType::Srv,
            252 => RecordType::Axfr,
            _ => RecordType::Unknown(num),
        }
    }

    pub fn from_name(name: &str) -> Option<RecordType> {
        match name.to_ascii_uppercase().as_str() {
            "A" => Some(RecordType::A),
            "NS" => Some(RecordType::Ns),
            "CNAME" => Some(RecordType::Cname),
            "SOA" => Some(RecordType::Soa),
            "MX" => Some(RecordType::Mx),
            "TXT" => Some(RecordType::Txt),
            "AAAA" => Some(RecordType::Aaaa),
            "SRV" => Some(RecordType::Srv),
            _ => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RecordType::Unknown(x) => write!(f, "TYPE{}", x),
            RecordType::A => write!(f, "A"),
            RecordType::Ns => write!(f, "NS"),
            RecordType::Cname => write!(f, "CNAME"),
            RecordType::Soa => write!(f, "SOA"),
            RecordType::Mx => write!(f, "MX"),
            RecordType::Txt => write!(f, "TXT"),
            RecordType::Aaaa => write!(f, "AAAA"),
            RecordType::Srv => write!(f, "SRV"),
            RecordType::Axfr => write!(f, "AXFR"),
        }
    }
}

/// `RecordValue` is the type-specific payload of a single record.
///
/// Names embedded in a value (CNAME/NS/SRV targets, MX exchanges) follow the
/// same relative/absolute convention as node names: a trailing separator
/// marks the name as fully qualified. TXT payloads are kept in their quoted
/// presentation form, which is also what the hosted zone provider stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecordValue {
    A {
        addr: Ipv4Addr,
    }, // 1
    Ns {
        host: String,
    }, // 2
    Cname {
        host: String,
    }, // 5
    Soa {
        m_name: String,
        r_name: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    }, // 6
    Mx {
        preference: u16,
        exchange: String,
    }, // 15
    Txt {
        data: String,
    }, // 16
    Aaaa {
        addr: Ipv6Addr,
    }, // 28
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    }, // 33
}

impl RecordValue {
    pub fn record_type(&self) -> RecordType {
        match *self {
            RecordValue::A { .. } => RecordType::A,
            RecordValue::Ns { .. } => RecordType::Ns,
            RecordValue::Cname { .. } => RecordType::Cname,
            RecordValue::Soa { .. } => RecordType::Soa,
            RecordValue::Mx { .. } => RecordType::Mx,
            RecordValue::Txt { .. } => RecordType::Txt,
            RecordValue::Aaaa { .. } => RecordType::Aaaa,
            RecordValue::Srv { .. } => RecordType::Srv,
        }
    }

    /// Renders the value into the presentation form the hosted zone
    /// provider uses in its record rows.
    pub fn to_value_string(&self) -> String {
        match *self {
            RecordValue::A { ref addr } => addr.to_string(),
            RecordValue::Aaaa { ref addr } => addr.to_string(),
            RecordValue::Ns { ref host } => host.clone(),
            RecordValue::Cname { ref host } => host.clone(),
            RecordValue::Mx {
                preference,
                ref exchange,
            } => format!("{} {}", preference, exchange),
            RecordValue::Txt { ref data } => data.clone(),
            RecordValue::Srv {
                priority,
                weight,
                port,
                ref target,
            } => format!("{} {} {} {}", priority, weight, port, target),
            RecordValue::Soa {
                ref m_name,
                ref r_name,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => format!(
                "{} {} {} {} {} {} {}",
                m_name, r_name, serial, refresh, retry, expire, minimum
            ),
        }
    }

    /// Parses a provider value string back into a typed value.
    pub fn from_value_string(rtype: RecordType, value: &str) -> Result<RecordValue> {
        match rtype {
            RecordType::A => Ok(RecordValue::A {
                addr: value.parse::<Ipv4Addr>()?,
            }),
            RecordType::Aaaa => Ok(RecordValue::Aaaa {
                addr: value.parse::<Ipv6Addr>()?,
            }),
            RecordType::Ns => Ok(RecordValue::Ns {
                host: value.to_string(),
            }),
            RecordType::Cname => Ok(RecordValue::Cname {
                host: value.to_string(),
            }),
            RecordType::Mx => {
                let mut parts = value.split_whitespace();
                let preference = parts.next().ok_or(ProtocolError::MalformedValue)?;
                let exchange = parts.next().ok_or(ProtocolError::MalformedValue)?;

                Ok(RecordValue::Mx {
                    preference: preference.parse::<u16>()?,
                    exchange: exchange.to_string(),
                })
            }
            RecordType::Txt => {
                let data = if value.starts_with('"') {
                    value.to_string()
                } else {
                    format!("\"{}\"", value)
                };

                Ok(RecordValue::Txt { data })
            }
            RecordType::Srv => {
                let parts = value.split_whitespace().collect::<Vec<&str>>();
                if parts.len() != 4 {
                    return Err(ProtocolError::MalformedValue);
                }

                Ok(RecordValue::Srv {
                    priority: parts[0].parse::<u16>()?,
                    weight: parts[1].parse::<u16>()?,
                    port: parts[2].parse::<u16>()?,
                    target: parts[3].to_string(),
                })
            }
            RecordType::Soa => {
                let parts = value.split_whitespace().collect::<Vec<&str>>();
                if parts.len() != 7 {
                    return Err(ProtocolError::MalformedValue);
                }

                Ok(RecordValue::Soa {
                    m_name: parts[0].to_string(),
                    r_name: parts[1].to_string(),
                    serial: parts[2].parse::<u32>()?,
                    refresh: parts[3].parse::<u32>()?,
                    retry: parts[4].parse::<u32>()?,
                    expire: parts[5].parse::<u32>()?,
                    minimum: parts[6].parse::<u32>()?,
                })
            }
            RecordType::Unknown(_) | RecordType::Axfr => Err(ProtocolError::MalformedValue),
        }
    }
}

/// The quoted character-string segments of a TXT payload
fn txt_segments(data: &str) -> Vec<String> {
    if data.starts_with('"') && data.ends_with('"') && data.len() >= 2 {
        data[1..data.len() - 1]
            .split("\" \"")
            .map(|s| s.to_string())
            .collect()
    } else {
        vec![data.to_string()]
    }
}

/// One resource record as it appears in a packet section
///
/// The name and any embedded names are fully qualified, trailing separator
/// included. Records of a type outside the closed enumeration carry no
/// value; their payload has been skipped over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRecord {
    pub name: String,
    pub rtype: RecordType,
    pub ttl: u32,
    pub value: Option<RecordValue>,
}

impl WireRecord {
    pub fn read<T: PacketBuffer>(buffer: &mut T) -> Result<WireRecord> {
        let mut name = String::new();
        buffer.read_qname(&mut name)?;
        let name = qualified(name);

        let rtype_num = buffer.read_u16()?;
        let rtype = RecordType::from_num(rtype_num);
        let _class = buffer.read_u16()?;
        let ttl = buffer.read_u32()?;
        let data_len = buffer.read_u16()?;

        let value = match rtype {
            RecordType::A => {
                let raw_addr = buffer.read_u32()?;
                let addr = Ipv4Addr::new(
                    ((raw_addr >> 24) & 0xFF) as u8,
                    ((raw_addr >> 16) & 0xFF) as u8,
                    ((raw_addr >> 8) & 0xFF) as u8,
                    (raw_addr & 0xFF) as u8,
                );

                Some(RecordValue::A { addr })
            }
            RecordType::Aaaa => {
                let raw_addr1 = buffer.read_u32()?;
                let raw_addr2 = buffer.read_u32()?;
                let raw_addr3 = buffer.read_u32()?;
                let raw_addr4 = buffer.read_u32()?;
                let addr = Ipv6Addr::new(
                    ((raw_addr1 >> 16) & 0xFFFF) as u16,
                    (raw_addr1 & 0xFFFF) as u16,
                    ((raw_addr2 >> 16) & 0xFFFF) as u16,
                    (raw_addr2 & 0xFFFF) as u16,
                    ((raw_addr3 >> 16) & 0xFFFF) as u16,
                    (raw_addr3 & 0xFFFF) as u16,
                    ((raw_addr4 >> 16) & 0xFFFF) as u16,
                    (raw_addr4 & 0xFFFF) as u16,
                );

                Some(RecordValue::Aaaa { addr })
            }
            RecordType::Ns => {
                let mut ns = String::new();
                buffer.read_qname(&mut ns)?;

                Some(RecordValue::Ns {
                    host: qualified(ns),
                })
            }
            RecordType::Cname => {
                let mut cname = String::new();
                buffer.read_qname(&mut cname)?;

                Some(RecordValue::Cname {
                    host: qualified(cname),
                })
            }
            RecordType::Srv => {
                let priority = buffer.read_u16()?;
                let weight = buffer.read_u16()?;
                let port = buffer.read_u16()?;

                let mut srv = String::new();
                buffer.read_qname(&mut srv)?;

                Some(RecordValue::Srv {
                    priority,
                    weight,
                    port,
                    target: qualified(srv),
                })
            }
            RecordType::Mx => {
                let preference = buffer.read_u16()?;
                let mut mx = String::new();
                buffer.read_qname(&mut mx)?;

                Some(RecordValue::Mx {
                    preference,
                    exchange: qualified(mx),
                })
            }
            RecordType::Soa => {
                let mut m_name = String::new();
                buffer.read_qname(&mut m_name)?;

                let mut r_name = String::new();
                buffer.read_qname(&mut r_name)?;

                let serial = buffer.read_u32()?;
                let refresh = buffer.read_u32()?;
                let retry = buffer.read_u32()?;
                let expire = buffer.read_u32()?;
                let minimum = buffer.read_u32()?;

                Some(RecordValue::Soa {
                    m_name: qualified(m_name),
                    r_name: qualified(r_name),
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                })
            }
            RecordType::Txt => {
                let mut data = String::new();
                let mut remaining = data_len as usize;
                while remaining > 0 {
                    let len = buffer.read()? as usize;
                    remaining -= 1;

                    let cur_pos = buffer.pos();
                    let segment =
                        String::from_utf8_lossy(buffer.get_range(cur_pos, len)?).to_string();
                    buffer.step(len)?;
                    remaining = remaining.saturating_sub(len);

                    if !data.is_empty() {
                        data.push(' ');
                    }
                    data.push('"');
                    data.push_str(&segment);
                    data.push('"');
                }

                Some(RecordValue::Txt { data })
            }
            RecordType::Axfr | RecordType::Unknown(_) => {
                buffer.step(data_len as usize)?;

                None
            }
        };

        Ok(WireRecord {
            name,
            rtype,
            ttl,
            value,
        })
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<usize> {
        let start_pos = buffer.pos();

        let value = match self.value {
            Some(ref value) => value,
            None => {
                log::info!("Skipping record: {:?}", self);
                return Ok(0);
            }
        };

        buffer.write_qname(&self.name)?;
        buffer.write_u16(value.record_type().to_num())?;
        buffer.write_u16(1)?;
        buffer.write_u32(self.ttl)?;

        match *value {
            RecordValue::A { ref addr } => {
                buffer.write_u16(4)?;

                let octets = addr.octets();
                buffer.write_u8(octets[0])?;
                buffer.write_u8(octets[1])?;
                buffer.write_u8(octets[2])?;
                buffer.write_u8(octets[3])?;
            }
            RecordValue::Aaaa { ref addr } => {
                buffer.write_u16(16)?;

                for octet in &addr.segments() {
                    buffer.write_u16(*octet)?;
                }
            }
            RecordValue::Ns { ref host } | RecordValue::Cname { ref host } => {
                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_qname(host)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            RecordValue::Srv {
                priority,
                weight,
                port,
                ref target,
            } => {
                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_u16(priority)?;
                buffer.write_u16(weight)?;
                buffer.write_u16(port)?;
                buffer.write_qname(target)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            RecordValue::Mx {
                preference,
                ref exchange,
            } => {
                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_u16(preference)?;
                buffer.write_qname(exchange)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            RecordValue::Soa {
                ref m_name,
                ref r_name,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_qname(m_name)?;
                buffer.write_qname(r_name)?;
                buffer.write_u32(serial)?;
                buffer.write_u32(refresh)?;
                buffer.write_u32(retry)?;
                buffer.write_u32(expire)?;
                buffer.write_u32(minimum)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            RecordValue::Txt { ref data } => {
                let pos = buffer.pos();
                buffer.write_u16(0)?;

                for segment in txt_segments(data) {
                    buffer.write_u8(segment.len() as u8)?;
                    for b in segment.as_bytes() {
                        buffer.write_u8(*b)?;
                    }
                }

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
        }

        Ok(buffer.pos() - start_pos)
    }
}

/// Restores the trailing root separator a wire-format name loses in
/// `read_qname`
fn qualified(name: String) -> String {
    if name.ends_with('.') {
        name
    } else {
        format!("{}.", name)
    }
}

/// The result code for a DNS query, as described in the specification
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ResultCode {
    #[default]
    NOERROR = 0,
    FORMERR = 1,
    SERVFAIL = 2,
    NXDOMAIN = 3,
    NOTIMP = 4,
    REFUSED = 5,
}

impl ResultCode {
    pub fn from_num(num: u8) -> ResultCode {
        match num {
            1 => ResultCode::FORMERR,
            2 => ResultCode::SERVFAIL,
            3 => ResultCode::NXDOMAIN,
            4 => ResultCode::NOTIMP,
            5 => ResultCode::REFUSED,
            _ => ResultCode::NOERROR,
        }
    }
}

/// Representation of a DNS header
#[derive(Clone, Debug, Default)]
pub struct DnsHeader {
    pub id: u16, // 16 bits

    pub recursion_desired: bool,    // 1 bit
    pub truncated_message: bool,    // 1 bit
    pub authoritative_answer: bool, // 1 bit
    pub opcode: u8,                 // 4 bits
    pub response: bool,             // 1 bit

    pub rescode: ResultCode,       // 4 bits
    pub checking_disabled: bool,   // 1 bit
    pub authed_data: bool,         // 1 bit
    pub z: bool,                   // 1 bit
    pub recursion_available: bool, // 1 bit

    pub questions: u16,             // 16 bits
    pub answers: u16,               // 16 bits
    pub authoritative_entries: u16, // 16 bits
    pub resource_entries: u16,      // 16 bits
}

impl DnsHeader {
    pub fn new() -> DnsHeader {
        DnsHeader::default()
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_u16(self.id)?;

        buffer.write_u8(
            (self.recursion_desired as u8)
                | ((self.truncated_message as u8) << 1)
                | ((self.authoritative_answer as u8) << 2)
                | (self.opcode << 3)
                | ((self.response as u8) << 7),
        )?;

        buffer.write_u8(
            (self.rescode as u8)
                | ((self.checking_disabled as u8) << 4)
                | ((self.authed_data as u8) << 5)
                | ((self.z as u8) << 6)
                | ((self.recursion_available as u8) << 7),
        )?;

        buffer.write_u16(self.questions)?;
        buffer.write_u16(self.answers)?;
        buffer.write_u16(self.authoritative_entries)?;
        buffer.write_u16(self.resource_entries)?;

        Ok(())
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        self.id = buffer.read_u16()?;

        let flags = buffer.read_u16()?;
        let a = (flags >> 8) as u8;
        let b = (flags & 0xFF) as u8;
        self.recursion_desired = (a & (1 << 0)) > 0;
        self.truncated_message = (a & (1 << 1)) > 0;
        self.authoritative_answer = (a & (1 << 2)) > 0;
        self.opcode = (a >> 3) & 0x0F;
        self.response = (a & (1 << 7)) > 0;

        self.rescode = ResultCode::from_num(b & 0x0F);
        self.checking_disabled = (b & (1 << 4)) > 0;
        self.authed_data = (b & (1 << 5)) > 0;
        self.z = (b & (1 << 6)) > 0;
        self.recursion_available = (b & (1 << 7)) > 0;

        self.questions = buffer.read_u16()?;
        self.answers = buffer.read_u16()?;
        self.authoritative_entries = buffer.read_u16()?;
        self.resource_entries = buffer.read_u16()?;

        Ok(())
    }
}

/// Representation of a DNS question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: RecordType,
}

impl DnsQuestion {
    pub fn new(name: String, qtype: RecordType) -> DnsQuestion {
        DnsQuestion { name, qtype }
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_qname(&self.name)?;

        buffer.write_u16(self.qtype.to_num())?;
        buffer.write_u16(1)?;

        Ok(())
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        buffer.read_qname(&mut self.name)?;
        self.qtype = RecordType::from_num(buffer.read_u16()?); // qtype
        let _ = buffer.read_u16()?; // class

        Ok(())
    }
}

/// Representation of a complete DNS packet
///
/// A packet can be read and written in a single operation. The transfer
/// client builds its AXFR query this way and walks the answer sections of
/// the reply packets.
#[derive(Clone, Debug, Default)]
pub struct DnsPacket {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<WireRecord>,
    pub authorities: Vec<WireRecord>,
    pub resources: Vec<WireRecord>,
}

impl DnsPacket {
    pub fn new() -> DnsPacket {
        DnsPacket::default()
    }

    pub fn from_buffer<T: PacketBuffer>(buffer: &mut T) -> Result<DnsPacket> {
        let mut result = DnsPacket::new();
        result.header.read(buffer)?;

        for _ in 0..result.header.questions {
            let mut question = DnsQuestion::new("".to_string(), RecordType::Unknown(0));
            question.read(buffer)?;
            result.questions.push(question);
        }

        for _ in 0..result.header.answers {
            result.answers.push(WireRecord::read(buffer)?);
        }
        for _ in 0..result.header.authoritative_entries {
            result.authorities.push(WireRecord::read(buffer)?);
        }
        for _ in 0..result.header.resource_entries {
            result.resources.push(WireRecord::read(buffer)?);
        }

        Ok(result)
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        let mut header = self.header.clone();
        header.questions = self.questions.len() as u16;
        header.answers = self.answers.len() as u16;
        header.authoritative_entries = self.authorities.len() as u16;
        header.resource_entries = self.resources.len() as u16;

        header.write(buffer)?;

        for question in &self.questions {
            question.write(buffer)?;
        }
        for record in &self.answers {
            record.write(buffer)?;
        }
        for record in &self.authorities {
            record.write(buffer)?;
        }
        for record in &self.resources {
            record.write(buffer)?;
        }

        Ok(())
    }
}
