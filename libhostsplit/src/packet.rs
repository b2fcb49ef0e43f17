//! Owned view over a captured TCP/IP packet.

use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;
use pnet_packet::tcp::TcpPacket;

/// Capture metadata attached to each packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketMeta {
    pub ts_sec: u32,
    pub ts_usec: u32,
    /// Position in the capture stream, starting at 1
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

/// Give-back error of [`PacketView::parse`]: the buffer is not an intact
/// TCP/IP packet. It returns the original data so the caller can forward
/// the packet unchanged.
#[derive(Debug)]
pub struct NotTcp {
    pub data: Vec<u8>,
}

/// A validated TCP/IP packet, starting at the IP header.
///
/// Offsets are checked once at construction, so the accessors can index
/// the buffer directly. `data` may extend past the IP total length when
/// the capture carried link-layer padding; the payload never includes it.
#[derive(Debug, Clone)]
pub struct PacketView {
    data: Vec<u8>,
    meta: PacketMeta,
    version: IpVersion,
    ip_header_len: usize,
    tcp_header_len: usize,
    total_len: usize,
}

impl PacketView {
    /// Dissect a raw IP buffer. Non-IP and non-TCP packets, truncated
    /// packets and IPv6 packets carrying extension headers are handed
    /// back untouched.
    pub fn parse(data: Vec<u8>, meta: PacketMeta) -> Result<PacketView, NotTcp> {
        let dissected = match data.first().map(|b| b >> 4) {
            Some(4) => dissect_v4(&data),
            Some(6) => dissect_v6(&data),
            _ => None,
        };
        let Some((version, ip_header_len, total_len)) = dissected else {
            return Err(NotTcp { data });
        };
        let tcp_header_len = TcpPacket::new(&data[ip_header_len..total_len])
            .map(|tcp| usize::from(tcp.get_data_offset()) * 4)
            .filter(|len| {
                *len >= TcpPacket::minimum_packet_size() && ip_header_len + *len <= total_len
            });
        let Some(tcp_header_len) = tcp_header_len else {
            return Err(NotTcp { data });
        };
        Ok(PacketView {
            data,
            meta,
            version,
            ip_header_len,
            tcp_header_len,
            total_len,
        })
    }

    pub fn version(&self) -> IpVersion {
        self.version
    }

    pub fn meta(&self) -> PacketMeta {
        self.meta
    }

    /// The full buffer as received, padding included
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// IP and TCP headers, back to back
    pub fn headers(&self) -> &[u8] {
        &self.data[..self.ip_header_len + self.tcp_header_len]
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[self.ip_header_len + self.tcp_header_len..self.total_len]
    }

    pub fn payload_len(&self) -> usize {
        self.total_len - self.ip_header_len - self.tcp_header_len
    }

    pub fn ip_header_len(&self) -> usize {
        self.ip_header_len
    }

    pub fn tcp_header_len(&self) -> usize {
        self.tcp_header_len
    }

    pub fn src_port(&self) -> u16 {
        self.be16(self.ip_header_len)
    }

    pub fn dst_port(&self) -> u16 {
        self.be16(self.ip_header_len + 2)
    }

    pub fn seq(&self) -> u32 {
        let o = self.ip_header_len + 4;
        u32::from_be_bytes([
            self.data[o],
            self.data[o + 1],
            self.data[o + 2],
            self.data[o + 3],
        ])
    }

    pub fn tcp_flags(&self) -> u8 {
        self.data[self.ip_header_len + 13]
    }

    fn be16(&self, o: usize) -> u16 {
        u16::from_be_bytes([self.data[o], self.data[o + 1]])
    }
}

fn dissect_v4(data: &[u8]) -> Option<(IpVersion, usize, usize)> {
    let ip = Ipv4Packet::new(data)?;
    let ip_header_len = usize::from(ip.get_header_length()) * 4;
    let total_len = usize::from(ip.get_total_length());
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Tcp
        || ip_header_len < Ipv4Packet::minimum_packet_size()
        || total_len < ip_header_len + TcpPacket::minimum_packet_size()
        || total_len > data.len()
    {
        return None;
    }
    Some((IpVersion::V4, ip_header_len, total_len))
}

fn dissect_v6(data: &[u8]) -> Option<(IpVersion, usize, usize)> {
    let ip = Ipv6Packet::new(data)?;
    // extension header chains are not walked; such packets are not candidates
    if ip.get_next_header() != IpNextHeaderProtocols::Tcp {
        return None;
    }
    let ip_header_len = Ipv6Packet::minimum_packet_size();
    let total_len = ip_header_len + usize::from(ip.get_payload_length());
    if total_len < ip_header_len + TcpPacket::minimum_packet_size() || total_len > data.len() {
        return None;
    }
    Some((IpVersion::V6, ip_header_len, total_len))
}
