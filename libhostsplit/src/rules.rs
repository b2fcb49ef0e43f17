use serde::Deserialize;
use std::sync::{Arc, PoisonError, RwLock};

/// Per-protocol segment splitting settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolSettings {
    pub enabled: bool,
    /// Split offset into the payload, in bytes
    pub offset: u32,
    /// Inject the second fragment before the first
    pub out_of_order: bool,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        ProtocolSettings {
            enabled: true,
            offset: 2,
            out_of_order: true,
        }
    }
}

/// One entry of the ordered rule list, with its patterns precomputed
#[derive(Debug, Clone)]
pub struct DomainRule {
    domain: String,
    include_subdomains: bool,
    patterns: Vec<String>,
    pub https: ProtocolSettings,
    pub http: ProtocolSettings,
}

impl DomainRule {
    pub fn new(
        domain: &str,
        include_subdomains: bool,
        https: ProtocolSettings,
        http: ProtocolSettings,
    ) -> Self {
        let domain = domain.to_ascii_lowercase();
        let mut patterns = vec![domain.clone()];
        if include_subdomains {
            patterns.push(format!("*.{domain}"));
        }
        DomainRule {
            domain,
            include_subdomains,
            patterns,
            https,
            http,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn include_subdomains(&self) -> bool {
        self.include_subdomains
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// `host` must already be lowercase
    fn matches(&self, host: &str) -> bool {
        self.patterns.iter().any(|p| glob_match(p, host))
    }
}

/// Immutable snapshot of the active rules.
///
/// Lookups walk the list in configuration order and the first rule with
/// a matching pattern wins; a duplicate domain later in the list is
/// simply unreachable.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<DomainRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<DomainRule>) -> Self {
        RuleSet { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainRule> {
        self.rules.iter()
    }

    /// Find the first rule matching `host`, case-insensitively
    pub fn lookup(&self, host: &str) -> Option<&DomainRule> {
        let host = host.to_ascii_lowercase();
        self.rules.iter().find(|r| r.matches(&host))
    }
}

/// Shared handle to the active [`RuleSet`], swapped atomically on reload.
///
/// Readers hold the lock only long enough to clone the inner `Arc`, so a
/// reload never blocks packet processing while the replacement set is
/// being built.
#[derive(Debug, Clone, Default)]
pub struct RuleHandle {
    inner: Arc<RwLock<Arc<RuleSet>>>,
}

impl RuleHandle {
    pub fn new(rules: RuleSet) -> Self {
        RuleHandle {
            inner: Arc::new(RwLock::new(Arc::new(rules))),
        }
    }

    /// Snapshot of the currently active rules
    pub fn current(&self) -> Arc<RuleSet> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the active rules
    pub fn install(&self, rules: RuleSet) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(rules);
    }
}

/// Glob match with `*` (any run of bytes, including empty) and `?`
/// (exactly one byte). Matching is byte-wise; callers lowercase both
/// sides beforehand.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let mut pi = 0;
    let mut ti = 0;
    // position to resume from when a branch taken after '*' fails
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            star = Some((pi + 1, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}
