//! The worker loop tying a packet channel to the decision pipeline.

use crate::backend::PacketChannel;
use crate::error::Error;
use crate::packet::{PacketMeta, PacketView};
use crate::pipeline::{self, Verdict};
use crate::rules::RuleHandle;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Counters kept across one [`Engine::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Packets taken from the channel
    pub received: usize,
    /// Packets replaced by a fragment pair
    pub split: usize,
    /// Packets injected unchanged
    pub forwarded: usize,
    /// Failed injections
    pub send_errors: usize,
}

pub struct Engine<C: PacketChannel> {
    channel: C,
    rules: RuleHandle,
    stats: EngineStats,
}

impl<C: PacketChannel> Engine<C> {
    pub fn new(channel: C, rules: RuleHandle) -> Self {
        Engine {
            channel,
            rules,
            stats: EngineStats::default(),
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Process packets until the channel ends, `running` turns false or
    /// receiving fails.
    ///
    /// Per-packet trouble never aborts the loop: a packet that cannot be
    /// dissected is injected unchanged, and a failed injection is counted
    /// and logged. Only a receive error is fatal.
    pub fn run(&mut self, running: Arc<AtomicBool>) -> Result<(), Error> {
        while running.load(Ordering::SeqCst) {
            let Some((data, meta)) = self.channel.receive()? else {
                break;
            };
            self.stats.received += 1;
            self.handle(data, meta);
        }
        info!(
            "done: {} received, {} split, {} forwarded, {} send errors",
            self.stats.received, self.stats.split, self.stats.forwarded, self.stats.send_errors
        );
        Ok(())
    }

    fn handle(&mut self, data: Vec<u8>, meta: PacketMeta) {
        let view = match PacketView::parse(data, meta) {
            Ok(view) => view,
            Err(give_back) => {
                self.forward(&give_back.data, &meta);
                return;
            }
        };
        // one snapshot per packet, so a reload applies between packets
        let rules = self.rules.current();
        match pipeline::decide(&rules, &view) {
            Verdict::Split(plan) => {
                debug!("packet #{} replaced by a fragment pair", meta.index);
                for fragment in plan.send_order() {
                    self.send(fragment.data(), &fragment.meta());
                }
                self.stats.split += 1;
            }
            Verdict::Forward => self.forward(view.data(), &view.meta()),
        }
    }

    fn forward(&mut self, data: &[u8], meta: &PacketMeta) {
        if self.send(data, meta) {
            self.stats.forwarded += 1;
        }
    }

    fn send(&mut self, data: &[u8], meta: &PacketMeta) -> bool {
        match self.channel.send(data, meta) {
            Ok(()) => true,
            Err(e) => {
                warn!("could not inject packet #{}: {}", meta.index, e);
                self.stats.send_errors += 1;
                false
            }
        }
    }
}
