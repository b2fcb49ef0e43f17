//! Per-packet decision logic.
//!
//! Every path through here ends in a verdict and never in an error: a
//! packet that cannot or should not be split is forwarded as is.

use crate::http::{self, ParseResult};
use crate::packet::PacketView;
use crate::rules::{ProtocolSettings, RuleSet};
use crate::split::{self, FragmentPlan};
use crate::tls;
use log::debug;
use std::str;

pub const HTTPS_PORT: u16 = 443;
pub const HTTP_PORT: u16 = 80;

#[derive(Debug)]
pub enum Verdict {
    /// Inject the packet unchanged
    Forward,
    /// Inject the two fragments instead of the packet
    Split(FragmentPlan),
}

/// Decide what to do with one TCP segment
pub fn decide(rules: &RuleSet, view: &PacketView) -> Verdict {
    if view.payload_len() == 0 {
        return Verdict::Forward;
    }
    let plan = match view.dst_port() {
        HTTPS_PORT => decide_https(rules, view),
        HTTP_PORT => decide_http(rules, view),
        _ => None,
    };
    match plan {
        Some(plan) => Verdict::Split(plan),
        None => Verdict::Forward,
    }
}

fn decide_https(rules: &RuleSet, view: &PacketView) -> Option<FragmentPlan> {
    let hello = tls::parse_client_hello(view.payload())?;
    let host = str::from_utf8(hello.server_name).ok()?;
    let rule = rules.lookup(host)?;
    debug!(
        "client hello for '{}' matches rule '{}'",
        host,
        rule.domain()
    );
    split_with(view, rule.https)
}

fn decide_http(rules: &RuleSet, view: &PacketView) -> Option<FragmentPlan> {
    let request = match http::parse_request(view.payload()) {
        ParseResult::Complete(request) => request,
        ParseResult::Incomplete | ParseResult::Malformed => return None,
    };
    let host = request.header(view.payload(), b"Host")?;
    // drop any :port suffix
    let host = match host.iter().position(|b| *b == b':') {
        Some(cut) => &host[..cut],
        None => host,
    };
    let host = str::from_utf8(host).ok()?;
    let rule = rules.lookup(host)?;
    debug!("request for '{}' matches rule '{}'", host, rule.domain());
    split_with(view, rule.http)
}

fn split_with(view: &PacketView, settings: ProtocolSettings) -> Option<FragmentPlan> {
    if !settings.enabled || view.payload_len() <= settings.offset as usize {
        return None;
    }
    split::split(view, settings.offset, settings.out_of_order)
}
