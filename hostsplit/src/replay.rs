//! Offline capture backend.
//!
//! Reads a pcap or pcap-ng capture, hands each packet to the engine at
//! the network layer, and records every injected packet into a legacy
//! pcap file with linktype RAW. Ethernet frames are stripped to L3 on
//! the way in, so the output holds plain IP packets.

use libhostsplit::{Error, PacketChannel, PacketMeta};
use log::{trace, warn};
use pcap_parser::data::{get_packetdata, PacketData};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{
    Block, LegacyPcapBlock, Linktype, PcapBlockOwned, PcapError, PcapHeader, ToVec,
};
use std::io::{self, ErrorKind, Read, Write};

pub const BUFFER_CAPACITY: usize = 128 * 1024;
pub const SNAPLEN: usize = 65535;

/// Writer for the legacy pcap format
pub struct PcapWriter<W>
where
    W: Write,
{
    w: W,
}

impl<W: Write> PcapWriter<W> {
    pub fn new(w: W) -> Self {
        PcapWriter { w }
    }

    pub fn init_file(&mut self, snaplen: usize, linktype: Linktype) -> Result<usize, io::Error> {
        let mut hdr = PcapHeader::new();
        hdr.snaplen = snaplen as u32;
        hdr.network = linktype;
        let s = hdr
            .to_vec()
            .map_err(|_| io::Error::new(ErrorKind::Other, "pcap header serialization failed"))?;
        self.w.write(&s)
    }

    pub fn write_packet(&mut self, data: &[u8], meta: &PacketMeta) -> Result<usize, io::Error> {
        let record = LegacyPcapBlock {
            ts_sec: meta.ts_sec,
            ts_usec: meta.ts_usec,
            caplen: data.len() as u32,
            origlen: data.len() as u32,
            data,
        };
        let s = record
            .to_vec_raw()
            .map_err(|_| io::Error::new(ErrorKind::Other, "pcap block serialization failed"))?;
        self.w.write(&s)
    }
}

/// One capture interface of the input file
struct InterfaceInfo {
    link_type: Linktype,
    /// Timestamp ticks per second
    ts_unit: u64,
    if_tsoffset: u64,
}

/// [`PacketChannel`] over capture files: packets come out of the input
/// capture and injected packets go into the output capture.
pub struct ReplayChannel<W: Write> {
    reader: Box<dyn PcapReaderIterator>,
    writer: PcapWriter<W>,
    interfaces: Vec<InterfaceInfo>,
    block_index: usize,
    last_incomplete: Option<usize>,
    packet_index: usize,
}

impl<W: Write> ReplayChannel<W> {
    /// Open a channel over `input`, writing the output file header right
    /// away so even an empty run leaves a valid capture behind.
    pub fn new<R: Read + Send + 'static>(input: R, output: W) -> Result<Self, Error> {
        let reader = pcap_parser::create_reader(BUFFER_CAPACITY, input)?;
        let mut writer = PcapWriter::new(output);
        writer.init_file(SNAPLEN, Linktype::RAW)?;
        Ok(ReplayChannel {
            reader,
            writer,
            interfaces: Vec::new(),
            block_index: 0,
            last_incomplete: None,
            packet_index: 0,
        })
    }
}

impl<W: Write> PacketChannel for ReplayChannel<W> {
    fn receive(&mut self) -> Result<Option<(Vec<u8>, PacketMeta)>, Error> {
        loop {
            match self.reader.next() {
                Ok((offset, block)) => {
                    let packet =
                        handle_block(&block, &mut self.interfaces, &mut self.packet_index);
                    self.block_index += 1;
                    self.reader.consume_noshift(offset);
                    if packet.is_some() {
                        return Ok(packet);
                    }
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::Incomplete(_)) => {
                    if self.last_incomplete == Some(self.block_index) {
                        warn!(
                            "could not read a complete block (block {}), input truncated?",
                            self.block_index
                        );
                        return Ok(None);
                    }
                    self.last_incomplete = Some(self.block_index);
                    self.reader.refill().map_err(Error::from)?;
                }
                Err(e) => return Err(Error::from(e)),
            }
        }
    }

    fn send(&mut self, data: &[u8], meta: &PacketMeta) -> Result<(), Error> {
        self.writer.write_packet(data, meta)?;
        Ok(())
    }
}

fn handle_block(
    block: &PcapBlockOwned,
    interfaces: &mut Vec<InterfaceInfo>,
    packet_index: &mut usize,
) -> Option<(Vec<u8>, PacketMeta)> {
    match block {
        PcapBlockOwned::LegacyHeader(hdr) => {
            let ts_unit: u64 = if hdr.is_nanosecond_precision() {
                1_000_000_000
            } else {
                1_000_000
            };
            trace!("legacy pcap, link type {}", hdr.network);
            interfaces.clear();
            interfaces.push(InterfaceInfo {
                link_type: hdr.network,
                ts_unit,
                if_tsoffset: 0,
            });
            None
        }
        PcapBlockOwned::Legacy(b) => {
            *packet_index += 1;
            let if_info = interfaces.first()?;
            let ts_usec = if if_info.ts_unit == 1_000_000_000 {
                b.ts_usec / 1000
            } else {
                b.ts_usec
            };
            let meta = PacketMeta {
                ts_sec: b.ts_sec,
                ts_usec,
                index: *packet_index,
            };
            extract(b.data, b.caplen as usize, if_info, meta)
        }
        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
            interfaces.clear();
            None
        }
        PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
            trace!("pcapng interface, link type {}", idb.linktype);
            interfaces.push(InterfaceInfo {
                link_type: idb.linktype,
                ts_unit: tsresol_unit(idb.if_tsresol),
                if_tsoffset: idb.if_tsoffset as u64,
            });
            None
        }
        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
            *packet_index += 1;
            let Some(if_info) = interfaces.get(epb.if_id as usize) else {
                warn!("packet #{} references unknown interface {}", *packet_index, epb.if_id);
                return None;
            };
            let (ts_sec, ts_usec) = epb_timestamp(if_info, epb.ts_high, epb.ts_low);
            let meta = PacketMeta {
                ts_sec,
                ts_usec,
                index: *packet_index,
            };
            extract(epb.data, epb.caplen as usize, if_info, meta)
        }
        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
            *packet_index += 1;
            let if_info = interfaces.first()?;
            let caplen = (spb.block_len1 as usize).saturating_sub(16);
            let meta = PacketMeta {
                ts_sec: 0,
                ts_usec: 0,
                index: *packet_index,
            };
            extract(spb.data, caplen, if_info, meta)
        }
        // statistics, name resolution and custom blocks carry no traffic
        PcapBlockOwned::NG(_) => None,
    }
}

fn extract(
    data: &[u8],
    caplen: usize,
    if_info: &InterfaceInfo,
    meta: PacketMeta,
) -> Option<(Vec<u8>, PacketMeta)> {
    let Some(data) = get_packetdata(data, if_info.link_type, caplen).and_then(network_data) else {
        warn!(
            "skipping packet #{}, link type {} not usable",
            meta.index, if_info.link_type
        );
        return None;
    };
    Some((data, meta))
}

/// Reduce a data block to the network layer
fn network_data(data: PacketData) -> Option<Vec<u8>> {
    match data {
        PacketData::L2(eth) => {
            if eth.len() < 14 {
                return None;
            }
            Some(eth[14..].to_vec())
        }
        PacketData::L3(_, data) => Some(data.to_vec()),
        PacketData::L4(_, _) | PacketData::Unsupported(_) => None,
    }
}

fn tsresol_unit(if_tsresol: u8) -> u64 {
    if if_tsresol & 0x80 != 0 {
        1u64 << u32::from(if_tsresol & 0x7f).min(63)
    } else {
        10u64.pow(u32::from(if_tsresol).min(19))
    }
}

fn epb_timestamp(if_info: &InterfaceInfo, ts_high: u32, ts_low: u32) -> (u32, u32) {
    let unit = if_info.ts_unit;
    let (ts_sec, ts_frac) = pcap_parser::build_ts(ts_high, ts_low, if_info.if_tsoffset, unit);
    // scale the fraction to microseconds, losing sub-microsecond detail
    let ts_usec = if unit > 1_000_000 {
        ts_frac / ((unit / 1_000_000) as u32)
    } else if unit < 1_000_000 {
        ts_frac * ((1_000_000 / unit) as u32)
    } else {
        ts_frac
    };
    (ts_sec, ts_usec)
}
