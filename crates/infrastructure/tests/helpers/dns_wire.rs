use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::str::FromStr;

pub const ANSWER_IP: [u8; 4] = [93, 184, 216, 34];
pub const RCODE_NXDOMAIN: u8 = 3;

pub fn a_query(name: &str, id: u16) -> Message {
    let mut query = Query::new();
    query.set_name(Name::from_str(name).unwrap());
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);
    message
}

pub fn pack(message: &Message) -> Vec<u8> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder).unwrap();
    buf
}

/// Query carrying an EDNS(0) OPT record with the TCP keepalive option.
pub fn keepalive_query(name: &str, id: u16) -> Message {
    let mut bytes = pack(&a_query(name, id));
    bytes.push(0x00);
    bytes.extend_from_slice(&41u16.to_be_bytes());
    bytes.extend_from_slice(&1232u16.to_be_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    // RDLEN, then option 11 with a two-byte timeout
    bytes.extend_from_slice(&6u16.to_be_bytes());
    bytes.extend_from_slice(&11u16.to_be_bytes());
    bytes.extend_from_slice(&2u16.to_be_bytes());
    bytes.extend_from_slice(&[0x00, 0x64]);
    bytes[11] = 1;
    Message::from_vec(&bytes).unwrap()
}

pub fn wire_id(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Echoes the question and adds one A record. Only the header fields and
/// the first question are taken from the query.
pub fn answer(query: &[u8], rcode: u8) -> Vec<u8> {
    if query.len() < 12 {
        return vec![];
    }

    let question_end = question_end(query).unwrap_or(query.len());
    let mut response = Vec::with_capacity(512);

    response.extend_from_slice(&query[0..2]);
    response.push(0x81);
    response.push(0x80 | (rcode & 0x0f));
    response.extend_from_slice(&[0x00, 0x01]);
    let ancount: u8 = if rcode == 0 { 1 } else { 0 };
    response.extend_from_slice(&[0x00, ancount]);
    response.extend_from_slice(&[0x00, 0x00]);
    response.extend_from_slice(&[0x00, 0x00]);
    response.extend_from_slice(&query[12..question_end]);

    if rcode == 0 {
        response.extend_from_slice(&[
            0xc0, 0x0c,
            0x00, 0x01,
            0x00, 0x01,
            0x00, 0x00, 0x00, 0x3c,
            0x00, 0x04,
        ]);
        response.extend_from_slice(&ANSWER_IP);
    }

    response
}

fn question_end(query: &[u8]) -> Option<usize> {
    let mut pos = 12;
    loop {
        let len = *query.get(pos)? as usize;
        if len == 0 {
            return Some(pos + 1 + 4);
        }
        pos += 1 + len;
    }
}
