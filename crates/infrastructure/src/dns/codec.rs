//! Wire helpers around `hickory-proto` messages.
//!
//! Packing and unpacking go through hickory; ID rewriting and the EDNS
//! option scan work directly on the packed bytes so the caller's `Message`
//! is never touched.

use dnsperf_domain::ProbeError;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Largest DNS message any transport will accept.
pub const MAX_MESSAGE_SIZE: usize = 65535;

const HEADER_LEN: usize = 12;
const OPT_RR_TYPE: u16 = 41;
/// EDNS(0) TCP keepalive, RFC 7828.
pub const EDNS_TCP_KEEPALIVE: u16 = 11;

pub fn pack(message: &Message) -> Result<Vec<u8>, ProbeError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message
        .emit(&mut encoder)
        .map_err(|e| ProbeError::Codec(format!("Failed to serialize DNS message: {}", e)))?;
    Ok(buf)
}

pub fn unpack(bytes: &[u8]) -> Result<Message, ProbeError> {
    Message::from_vec(bytes)
        .map_err(|e| ProbeError::Codec(format!("Failed to parse DNS message: {}", e)))
}

pub fn wire_id(bytes: &[u8]) -> Option<u16> {
    if bytes.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub fn set_wire_id(bytes: &mut [u8], id: u16) {
    if bytes.len() >= 2 {
        bytes[..2].copy_from_slice(&id.to_be_bytes());
    }
}

/// Non-fatal error for a decoded reply whose RCODE is not NOERROR.
pub fn rcode_error(response: &Message) -> Option<ProbeError> {
    let rcode = response.response_code();
    if rcode == ResponseCode::NoError {
        None
    } else {
        Some(ProbeError::ResponseCode(format!("{:?}", rcode)))
    }
}

pub fn id_mismatch(expected: u16, reply: &[u8]) -> Option<ProbeError> {
    match wire_id(reply) {
        Some(actual) if actual != expected => Some(ProbeError::IdMismatch { expected, actual }),
        _ => None,
    }
}

/// Whether the packed message carries an OPT record with the TCP keepalive
/// option.
pub fn has_tcp_keepalive(bytes: &[u8]) -> bool {
    has_edns_option(bytes, EDNS_TCP_KEEPALIVE).unwrap_or(false)
}

fn has_edns_option(buf: &[u8], option_code: u16) -> Option<bool> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let count = |at: usize| u16::from_be_bytes([buf[at], buf[at + 1]]) as usize;
    let qdcount = count(4);
    let ancount = count(6);
    let nscount = count(8);
    let arcount = count(10);

    let mut pos = HEADER_LEN;
    for _ in 0..qdcount {
        pos = skip_name(buf, pos)? + 4;
    }
    for _ in 0..ancount + nscount {
        pos = skip_record(buf, pos)?;
    }

    for _ in 0..arcount {
        let name_end = skip_name(buf, pos)?;
        if name_end + 10 > buf.len() {
            return None;
        }
        let rr_type = u16::from_be_bytes([buf[name_end], buf[name_end + 1]]);
        let rdlen = u16::from_be_bytes([buf[name_end + 8], buf[name_end + 9]]) as usize;
        let rdata_start = name_end + 10;
        let rdata_end = rdata_start + rdlen;
        if rdata_end > buf.len() {
            return None;
        }

        if rr_type == OPT_RR_TYPE {
            let mut opt = rdata_start;
            while opt + 4 <= rdata_end {
                let code = u16::from_be_bytes([buf[opt], buf[opt + 1]]);
                let len = u16::from_be_bytes([buf[opt + 2], buf[opt + 3]]) as usize;
                if code == option_code {
                    return Some(true);
                }
                opt += 4 + len;
            }
        }
        pos = rdata_end;
    }

    Some(false)
}

fn skip_record(buf: &[u8], pos: usize) -> Option<usize> {
    let name_end = skip_name(buf, pos)?;
    if name_end + 10 > buf.len() {
        return None;
    }
    let rdlen = u16::from_be_bytes([buf[name_end + 8], buf[name_end + 9]]) as usize;
    Some(name_end + 10 + rdlen)
}

fn skip_name(buf: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *buf.get(pos)? as usize;
        if len == 0 {
            return Some(pos + 1);
        }
        // Compression pointer ends the name.
        if len & 0xC0 == 0xC0 {
            return Some(pos + 2);
        }
        pos += 1 + len;
    }
}

pub(crate) async fn send_with_length_prefix<S>(
    stream: &mut S,
    message_bytes: &[u8],
) -> std::io::Result<()>
where
    S: AsyncWriteExt + Unpin,
{
    let length = u16::try_from(message_bytes.len()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("DNS message too large: {} bytes", message_bytes.len()),
        )
    })?;

    let mut frame = Vec::with_capacity(message_bytes.len() + 2);
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(message_bytes);
    stream.write_all(&frame).await?;
    stream.flush().await
}

pub(crate) async fn read_with_length_prefix<S>(stream: &mut S) -> std::io::Result<Vec<u8>>
where
    S: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;

    let response_len = u16::from_be_bytes(len_buf) as usize;
    let mut response = vec![0u8; response_len];
    stream.read_exact(&mut response).await?;
    Ok(response)
}
