//! Packet builders shared by unit tests.

use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::{self, MutableIpv4Packet};
use pnet_packet::ipv6::MutableIpv6Packet;
use pnet_packet::tcp::{self, MutableTcpPacket, TcpFlags};
use std::net::{Ipv4Addr, Ipv6Addr};

/// One framed TLS extension (type, length, body)
pub fn extension(ext_type: u16, body: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&ext_type.to_be_bytes());
    v.extend_from_slice(&(body.len() as u16).to_be_bytes());
    v.extend_from_slice(body);
    v
}

/// TLS record carrying a minimal ClientHello with an SNI extension
pub fn client_hello(server_name: &[u8]) -> Vec<u8> {
    client_hello_with(server_name, &[])
}

/// Same, with arbitrary framed extensions placed before server_name
pub fn client_hello_with(server_name: &[u8], leading_exts: &[u8]) -> Vec<u8> {
    let mut sni = Vec::new();
    sni.extend_from_slice(&((server_name.len() + 3) as u16).to_be_bytes()); // list length
    sni.push(0); // name type: host_name
    sni.extend_from_slice(&(server_name.len() as u16).to_be_bytes());
    sni.extend_from_slice(server_name);

    let mut extensions = Vec::new();
    extensions.extend_from_slice(leading_exts);
    extensions.extend_from_slice(&extension(0, &sni));

    let mut body = Vec::new();
    body.extend_from_slice(&0x0303u16.to_be_bytes()); // client version
    body.extend_from_slice(&[0x42; 32]); // random
    body.push(0); // session id length
    body.extend_from_slice(&2u16.to_be_bytes()); // cipher suites length
    body.extend_from_slice(&[0x13, 0x01]);
    body.push(1); // compression methods length
    body.push(0);
    body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    body.extend_from_slice(&extensions);

    let mut record = Vec::new();
    record.push(22); // content type: handshake
    record.extend_from_slice(&0x0301u16.to_be_bytes());
    record.extend_from_slice(&((body.len() + 4) as u16).to_be_bytes());
    record.push(1); // handshake type: client_hello
    record.push(0); // high byte of the 24-bit handshake length
    record.extend_from_slice(&(body.len() as u16).to_be_bytes());
    record.extend_from_slice(&body);
    record
}

/// IPv4 TCP packet with valid checksums
pub fn ipv4_tcp(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    sport: u16,
    dport: u16,
    seq: u32,
    payload: &[u8],
) -> Vec<u8> {
    let total = 40 + payload.len();
    let mut buf = vec![0u8; total];
    {
        let mut ip = MutableIpv4Packet::new(&mut buf).unwrap();
        ip.set_version(4);
        ip.set_header_length(5);
        ip.set_ttl(64);
        ip.set_identification(0x1337);
        ip.set_total_length(total as u16);
        ip.set_next_level_protocol(IpNextHeaderProtocols::Tcp);
        ip.set_source(src);
        ip.set_destination(dst);
    }
    {
        let mut tcp = MutableTcpPacket::new(&mut buf[20..]).unwrap();
        tcp.set_source(sport);
        tcp.set_destination(dport);
        tcp.set_sequence(seq);
        tcp.set_acknowledgement(0x6161);
        tcp.set_data_offset(5);
        tcp.set_flags(TcpFlags::PSH | TcpFlags::ACK);
        tcp.set_window(0xffff);
        tcp.set_payload(payload);
        let ck = tcp::ipv4_checksum(&tcp.to_immutable(), &src, &dst);
        tcp.set_checksum(ck);
    }
    {
        let mut ip = MutableIpv4Packet::new(&mut buf).unwrap();
        let ck = ipv4::checksum(&ip.to_immutable());
        ip.set_checksum(ck);
    }
    buf
}

/// IPv6 TCP packet with a valid TCP checksum
pub fn ipv6_tcp(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    sport: u16,
    dport: u16,
    seq: u32,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = vec![0u8; 60 + payload.len()];
    {
        let mut ip = MutableIpv6Packet::new(&mut buf).unwrap();
        ip.set_version(6);
        ip.set_payload_length((20 + payload.len()) as u16);
        ip.set_next_header(IpNextHeaderProtocols::Tcp);
        ip.set_hop_limit(64);
        ip.set_source(src);
        ip.set_destination(dst);
    }
    {
        let mut tcp = MutableTcpPacket::new(&mut buf[40..]).unwrap();
        tcp.set_source(sport);
        tcp.set_destination(dport);
        tcp.set_sequence(seq);
        tcp.set_acknowledgement(0x6161);
        tcp.set_data_offset(5);
        tcp.set_flags(TcpFlags::PSH | TcpFlags::ACK);
        tcp.set_window(0xffff);
        tcp.set_payload(payload);
        let ck = tcp::ipv6_checksum(&tcp.to_immutable(), &src, &dst);
        tcp.set_checksum(ck);
    }
    buf
}
