//! TCP segment fragmentation.

use crate::packet::{IpVersion, PacketView};
use pnet_packet::ipv4::{self, MutableIpv4Packet};
use pnet_packet::ipv6::MutableIpv6Packet;
use pnet_packet::tcp::{self, MutableTcpPacket};

/// Two fragments carrying the original payload, plus the injection order
#[derive(Debug, Clone)]
pub struct FragmentPlan {
    pub first: PacketView,
    pub second: PacketView,
    pub out_of_order: bool,
}

impl FragmentPlan {
    /// Fragments in injection order
    pub fn send_order(&self) -> [&PacketView; 2] {
        if self.out_of_order {
            [&self.second, &self.first]
        } else {
            [&self.first, &self.second]
        }
    }
}

/// Split the segment at `offset` bytes into its payload.
///
/// Requires `0 < offset < payload_len`; anything else is a no-op `None`.
/// Both fragments get correct length fields and checksums, the second
/// fragment's sequence number is advanced by `offset` (wrapping), and
/// every other header field is copied verbatim.
pub fn split(view: &PacketView, offset: u32, out_of_order: bool) -> Option<FragmentPlan> {
    let cut = offset as usize;
    if cut == 0 || cut >= view.payload_len() {
        return None;
    }
    let payload = view.payload();
    let first = build_fragment(view, &payload[..cut], 0)?;
    let second = build_fragment(view, &payload[cut..], offset)?;
    Some(FragmentPlan {
        first,
        second,
        out_of_order,
    })
}

fn build_fragment(view: &PacketView, chunk: &[u8], seq_offset: u32) -> Option<PacketView> {
    let header_len = view.headers().len();
    let total_len = header_len + chunk.len();
    let mut data = Vec::with_capacity(total_len);
    data.extend_from_slice(view.headers());
    data.extend_from_slice(chunk);

    let seq = view.seq().wrapping_add(seq_offset);
    match view.version() {
        IpVersion::V4 => {
            let (src, dst) = {
                let mut ip = MutableIpv4Packet::new(&mut data)?;
                ip.set_total_length(total_len as u16);
                let ck = ipv4::checksum(&ip.to_immutable());
                ip.set_checksum(ck);
                (ip.get_source(), ip.get_destination())
            };
            let mut tcp = MutableTcpPacket::new(&mut data[view.ip_header_len()..])?;
            tcp.set_sequence(seq);
            let ck = tcp::ipv4_checksum(&tcp.to_immutable(), &src, &dst);
            tcp.set_checksum(ck);
        }
        IpVersion::V6 => {
            let (src, dst) = {
                let mut ip = MutableIpv6Packet::new(&mut data)?;
                ip.set_payload_length((total_len - view.ip_header_len()) as u16);
                (ip.get_source(), ip.get_destination())
            };
            let mut tcp = MutableTcpPacket::new(&mut data[view.ip_header_len()..])?;
            tcp.set_sequence(seq);
            let ck = tcp::ipv6_checksum(&tcp.to_immutable(), &src, &dst);
            tcp.set_checksum(ck);
        }
    }
    PacketView::parse(data, view.meta()).ok()
}
