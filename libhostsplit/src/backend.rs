use crate::error::Error;
use crate::packet::PacketMeta;

/// A packet capture and injection channel.
///
/// Captured packets come out of `receive` as raw IP buffers; verdict
/// packets go back in through `send`. Implementations decide what the
/// two ends are wired to.
pub trait PacketChannel {
    /// Block until the next packet. `Ok(None)` means the channel closed.
    fn receive(&mut self) -> Result<Option<(Vec<u8>, PacketMeta)>, Error>;

    /// Inject one packet
    fn send(&mut self, data: &[u8], meta: &PacketMeta) -> Result<(), Error>;
}
