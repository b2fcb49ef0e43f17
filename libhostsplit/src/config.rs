//! TOML configuration model with global defaults and per-domain overrides.

use crate::error::Error;
use crate::rules::{DomainRule, ProtocolSettings, RuleSet};
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use toml::map::Map;
use toml::Value;

/// The `[global]` table. Fields missing from the file keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalSettings {
    pub include_subdomains: bool,
    pub https: ProtocolSettings,
    pub http: ProtocolSettings,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            include_subdomains: true,
            https: ProtocolSettings::default(),
            http: ProtocolSettings::default(),
        }
    }
}

/// Subset of [`ProtocolSettings`] a domain entry may override
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolOverride {
    pub enabled: Option<bool>,
    pub offset: Option<u32>,
    pub out_of_order: Option<bool>,
}

impl ProtocolOverride {
    fn apply(&self, base: ProtocolSettings) -> ProtocolSettings {
        ProtocolSettings {
            enabled: self.enabled.unwrap_or(base.enabled),
            offset: self.offset.unwrap_or(base.offset),
            out_of_order: self.out_of_order.unwrap_or(base.out_of_order),
        }
    }

    fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.offset.is_none() && self.out_of_order.is_none()
    }
}

/// One element of the `domains` array. A bare string in the file becomes
/// an entry with no overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainEntry {
    pub name: String,
    #[serde(default)]
    pub include_subdomains: Option<bool>,
    #[serde(default)]
    pub https: Option<ProtocolOverride>,
    #[serde(default)]
    pub http: Option<ProtocolOverride>,
}

impl DomainEntry {
    pub fn bare(name: &str) -> Self {
        DomainEntry {
            name: name.to_owned(),
            include_subdomains: None,
            https: None,
            http: None,
        }
    }

    fn is_bare(&self) -> bool {
        self.include_subdomains.is_none() && self.https.is_none() && self.http.is_none()
    }

    fn from_value(value: &Value) -> Result<DomainEntry, Error> {
        match value {
            Value::String(name) => Ok(DomainEntry::bare(name)),
            Value::Table(_) => Ok(value.clone().try_into()?),
            _ => Err(Error::Config(
                "domain entries must be strings or tables".to_owned(),
            )),
        }
    }

    fn into_value(self) -> Value {
        if self.is_bare() {
            return Value::String(self.name);
        }
        let mut table = Map::new();
        table.insert("name".to_owned(), Value::String(self.name));
        if let Some(include) = self.include_subdomains {
            table.insert("include_subdomains".to_owned(), Value::Boolean(include));
        }
        if let Some(o) = self.https {
            table.insert("https".to_owned(), override_value(&o));
        }
        if let Some(o) = self.http {
            table.insert("http".to_owned(), override_value(&o));
        }
        Value::Table(table)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub global: GlobalSettings,
    pub domains: Vec<DomainEntry>,
}

impl AppConfig {
    /// Parse a config document. Unknown keys, wrong types and malformed
    /// domain entries reject the whole document.
    pub fn parse(input: &str) -> Result<AppConfig, Error> {
        let value: Value = input.parse()?;
        let table = value
            .as_table()
            .ok_or_else(|| Error::Config("top level must be a table".to_owned()))?;
        let mut config = AppConfig::default();
        for (key, item) in table {
            match key.as_str() {
                "global" => config.global = item.clone().try_into()?,
                "domains" => {
                    let entries = item
                        .as_array()
                        .ok_or_else(|| Error::Config("'domains' must be an array".to_owned()))?;
                    for entry in entries {
                        config.domains.push(DomainEntry::from_value(entry)?);
                    }
                }
                other => return Err(Error::Config(format!("unknown key '{other}'"))),
            }
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<AppConfig, Error> {
        let input = fs::read_to_string(path)?;
        AppConfig::parse(&input)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Load `path`, or write a default config there if it does not exist.
    ///
    /// After a successful load the file is rewritten in canonical form,
    /// so hand-edited entries collapse back to their shortest spelling.
    pub fn load_or_create(path: &Path) -> Result<AppConfig, Error> {
        if path.exists() {
            let config = AppConfig::load(path)?;
            if let Err(e) = config.save(path) {
                warn!("could not rewrite config {}: {}", path.display(), e);
            }
            Ok(config)
        } else {
            info!("no config at {}, writing defaults", path.display());
            let config = AppConfig::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Resolve inheritance for every entry into an immutable lookup snapshot
    pub fn rule_set(&self) -> RuleSet {
        RuleSet::new(self.domains.iter().map(|e| self.effective_rule(e)).collect())
    }

    fn effective_rule(&self, entry: &DomainEntry) -> DomainRule {
        let include_subdomains = entry
            .include_subdomains
            .unwrap_or(self.global.include_subdomains);
        let https = entry.https.unwrap_or_default().apply(self.global.https);
        let http = entry.http.unwrap_or_default().apply(self.global.http);
        DomainRule::new(&entry.name, include_subdomains, https, http)
    }

    /// Serialize in canonical form: an entry whose effective settings equal
    /// the global settings becomes a bare string, and any other entry keeps
    /// only the fields that differ.
    pub fn to_toml_string(&self) -> Result<String, Error> {
        let mut root = Map::new();
        let domains = self
            .domains
            .iter()
            .map(|e| self.normalized_entry(e).into_value())
            .collect();
        root.insert("domains".to_owned(), Value::Array(domains));
        root.insert("global".to_owned(), global_value(&self.global));
        Ok(toml::to_string(&Value::Table(root))?)
    }

    fn normalized_entry(&self, entry: &DomainEntry) -> DomainEntry {
        let include_subdomains = entry
            .include_subdomains
            .unwrap_or(self.global.include_subdomains);
        let https = entry.https.unwrap_or_default().apply(self.global.https);
        let http = entry.http.unwrap_or_default().apply(self.global.http);
        DomainEntry {
            name: entry.name.clone(),
            include_subdomains: Some(include_subdomains)
                .filter(|v| *v != self.global.include_subdomains),
            https: diff_settings(https, self.global.https),
            http: diff_settings(http, self.global.http),
        }
    }
}

fn diff_settings(effective: ProtocolSettings, base: ProtocolSettings) -> Option<ProtocolOverride> {
    let diff = ProtocolOverride {
        enabled: Some(effective.enabled).filter(|v| *v != base.enabled),
        offset: Some(effective.offset).filter(|v| *v != base.offset),
        out_of_order: Some(effective.out_of_order).filter(|v| *v != base.out_of_order),
    };
    if diff.is_empty() {
        None
    } else {
        Some(diff)
    }
}

fn override_value(o: &ProtocolOverride) -> Value {
    let mut table = Map::new();
    if let Some(enabled) = o.enabled {
        table.insert("enabled".to_owned(), Value::Boolean(enabled));
    }
    if let Some(offset) = o.offset {
        table.insert("offset".to_owned(), Value::Integer(i64::from(offset)));
    }
    if let Some(out_of_order) = o.out_of_order {
        table.insert("out_of_order".to_owned(), Value::Boolean(out_of_order));
    }
    Value::Table(table)
}

fn proto_value(settings: ProtocolSettings) -> Value {
    let mut table = Map::new();
    table.insert("enabled".to_owned(), Value::Boolean(settings.enabled));
    table.insert("offset".to_owned(), Value::Integer(i64::from(settings.offset)));
    table.insert(
        "out_of_order".to_owned(),
        Value::Boolean(settings.out_of_order),
    );
    Value::Table(table)
}

fn global_value(global: &GlobalSettings) -> Value {
    let mut table = Map::new();
    table.insert(
        "include_subdomains".to_owned(),
        Value::Boolean(global.include_subdomains),
    );
    table.insert("https".to_owned(), proto_value(global.https));
    table.insert("http".to_owned(), proto_value(global.http));
    Value::Table(table)
}
