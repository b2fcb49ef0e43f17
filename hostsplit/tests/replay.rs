use assert_cmd::Command;
use pcap_parser::{parse_pcap_frame, parse_pcap_header, LegacyPcapBlock, Linktype, PcapHeader, ToVec};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::{self, MutableIpv4Packet};
use pnet_packet::tcp::{self, MutableTcpPacket, TcpFlags};
use std::env;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

fn temp_path(name: &str) -> PathBuf {
    env::temp_dir().join(format!("hostsplit-replay-{}-{}", name, std::process::id()))
}

/// TLS record carrying a minimal ClientHello with an SNI extension
fn client_hello(server_name: &[u8]) -> Vec<u8> {
    let mut sni = Vec::new();
    sni.extend_from_slice(&((server_name.len() + 3) as u16).to_be_bytes());
    sni.push(0); // name type: host_name
    sni.extend_from_slice(&(server_name.len() as u16).to_be_bytes());
    sni.extend_from_slice(server_name);

    let mut extensions = Vec::new();
    extensions.extend_from_slice(&0u16.to_be_bytes()); // extension type: server_name
    extensions.extend_from_slice(&(sni.len() as u16).to_be_bytes());
    extensions.extend_from_slice(&sni);

    let mut body = Vec::new();
    body.extend_from_slice(&0x0303u16.to_be_bytes());
    body.extend_from_slice(&[0x42; 32]);
    body.push(0); // session id length
    body.extend_from_slice(&2u16.to_be_bytes());
    body.extend_from_slice(&[0x13, 0x01]);
    body.push(1);
    body.push(0);
    body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    body.extend_from_slice(&extensions);

    let mut record = Vec::new();
    record.push(22); // content type: handshake
    record.extend_from_slice(&0x0301u16.to_be_bytes());
    record.extend_from_slice(&((body.len() + 4) as u16).to_be_bytes());
    record.push(1); // handshake type: client_hello
    record.push(0);
    record.extend_from_slice(&(body.len() as u16).to_be_bytes());
    record.extend_from_slice(&body);
    record
}

/// IPv4 TCP packet with valid checksums
fn ipv4_tcp(sport: u16, dport: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
    let src = Ipv4Addr::new(10, 0, 0, 1);
    let dst = Ipv4Addr::new(10, 0, 0, 2);
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

/// IPv4 UDP packet, opaque to the splitting engine
fn ipv4_udp() -> Vec<u8> {
    let mut buf = vec![0u8; 28];
    {
        let mut ip = MutableIpv4Packet::new(&mut buf).unwrap();
        ip.set_version(4);
        ip.set_header_length(5);
        ip.set_ttl(64);
        ip.set_total_length(28);
        ip.set_next_level_protocol(IpNextHeaderProtocols::Udp);
        ip.set_source(Ipv4Addr::new(10, 0, 0, 1));
        ip.set_destination(Ipv4Addr::new(10, 0, 0, 2));
        let ck = ipv4::checksum(&ip.to_immutable());
        ip.set_checksum(ck);
    }
    buf[20..28].copy_from_slice(&[0, 53, 0, 53, 0, 8, 0, 0]);
    buf
}

fn ethernet(ip: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; 12];
    frame.extend_from_slice(&[0x08, 0x00]);
    frame.extend_from_slice(ip);
    frame
}

fn write_pcap(path: &Path, linktype: Linktype, packets: &[(Vec<u8>, u32, u32)]) {
    let mut bytes = Vec::new();
    let mut hdr = PcapHeader::new();
    hdr.snaplen = 65535;
    hdr.network = linktype;
    bytes.extend_from_slice(&hdr.to_vec().unwrap());
    for (data, ts_sec, ts_usec) in packets {
        let block = LegacyPcapBlock {
            ts_sec: *ts_sec,
            ts_usec: *ts_usec,
            caplen: data.len() as u32,
            origlen: data.len() as u32,
            data: data.as_slice(),
        };
        bytes.extend_from_slice(&block.to_vec_raw().unwrap());
    }
    fs::write(path, bytes).unwrap();
}

struct Record {
    ts_sec: u32,
    ts_usec: u32,
    data: Vec<u8>,
}

fn read_pcap(path: &Path) -> (PcapHeader, Vec<Record>) {
    let bytes = fs::read(path).unwrap();
    let (mut rem, hdr) = parse_pcap_header(&bytes).unwrap();
    let mut records = Vec::new();
    while !rem.is_empty() {
        let (next, block) = parse_pcap_frame(rem).unwrap();
        records.push(Record {
            ts_sec: block.ts_sec,
            ts_usec: block.ts_usec,
            data: block.data.to_vec(),
        });
        rem = next;
    }
    (hdr, records)
}

fn seq_of(data: &[u8]) -> u32 {
    u32::from_be_bytes(data[24..28].try_into().unwrap())
}

#[test]
fn replay_splits_matching_packets_and_forwards_the_rest() {
    let config_path = temp_path("split.toml");
    let input_path = temp_path("split-in.pcap");
    let output_path = temp_path("split-out.pcap");
    fs::write(
        &config_path,
        r#"[global]
include_subdomains = true

[global.https]
enabled = true
offset = 2
out_of_order = false

[global.http]
enabled = true
offset = 4
out_of_order = false

[[domains]]
name = "example.com"
"#,
    )
    .unwrap();

    let hello_match = ipv4_tcp(40000, 443, 1000, &client_hello(b"www.example.com"));
    let hello_other = ipv4_tcp(40001, 443, 2000, &client_hello(b"other.net"));
    let http_match = ipv4_tcp(
        40002,
        80,
        3000,
        b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n",
    );
    let udp = ipv4_udp();
    write_pcap(
        &input_path,
        Linktype::ETHERNET,
        &[
            (ethernet(&hello_match), 10, 100),
            (ethernet(&hello_other), 11, 200),
            (ethernet(&http_match), 12, 300),
            (ethernet(&udp), 13, 400),
        ],
    );

    let output = Command::cargo_bin(env!("CARGO_PKG_NAME"))
        .unwrap()
        .arg("-c")
        .arg(&config_path)
        .arg("replay")
        .arg("-i")
        .arg(&input_path)
        .arg("-o")
        .arg(&output_path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let (hdr, records) = read_pcap(&output_path);
    assert_eq!(hdr.network, Linktype::RAW);
    assert_eq!(records.len(), 6);

    // first packet split at offset 2, in order
    assert_eq!(seq_of(&records[0].data), 1000);
    assert_eq!(&records[0].data[40..], &hello_match[40..42]);
    assert_eq!((records[0].ts_sec, records[0].ts_usec), (10, 100));
    assert_eq!(seq_of(&records[1].data), 1002);
    assert_eq!(&records[1].data[40..], &hello_match[42..]);
    assert_eq!((records[1].ts_sec, records[1].ts_usec), (10, 100));

    // unmatched ClientHello forwarded untouched
    assert_eq!(records[2].data, hello_other);
    assert_eq!((records[2].ts_sec, records[2].ts_usec), (11, 200));

    // http request split at offset 4
    assert_eq!(seq_of(&records[3].data), 3000);
    assert_eq!(&records[3].data[40..], b"GET ");
    assert_eq!(seq_of(&records[4].data), 3004);
    assert_eq!(&records[4].data[40..], &http_match[44..]);

    // non-tcp passes through byte for byte
    assert_eq!(records[5].data, udp);
    assert_eq!((records[5].ts_sec, records[5].ts_usec), (13, 400));

    for path in [&config_path, &input_path, &output_path] {
        let _ = fs::remove_file(path);
    }
}

#[test]
fn replay_injects_out_of_order_by_default() {
    let config_path = temp_path("ooo.toml");
    let input_path = temp_path("ooo-in.pcap");
    let output_path = temp_path("ooo-out.pcap");
    fs::write(&config_path, "[[domains]]\nname = \"example.com\"\n").unwrap();

    let hello = ipv4_tcp(40000, 443, 5000, &client_hello(b"example.com"));
    write_pcap(&input_path, Linktype::RAW, &[(hello.clone(), 1, 0)]);

    let output = Command::cargo_bin(env!("CARGO_PKG_NAME"))
        .unwrap()
        .arg("-c")
        .arg(&config_path)
        .arg("replay")
        .arg("-i")
        .arg(&input_path)
        .arg("-o")
        .arg(&output_path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let (_, records) = read_pcap(&output_path);
    assert_eq!(records.len(), 2);
    // the tail fragment goes out first
    assert_eq!(seq_of(&records[0].data), 5002);
    assert_eq!(&records[0].data[40..], &hello[42..]);
    assert_eq!(seq_of(&records[1].data), 5000);
    assert_eq!(&records[1].data[40..], &hello[40..42]);

    for path in [&config_path, &input_path, &output_path] {
        let _ = fs::remove_file(path);
    }
}
