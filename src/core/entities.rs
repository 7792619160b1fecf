use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The two kinds of routing entity kept in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "listener")]
    Listener,
    #[serde(rename = "pool")]
    BackendPool,
}

impl EntityKind {
    /// Prefix shared by every store key of this kind, separator included.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            EntityKind::Listener => "listener/",
            EntityKind::BackendPool => "pool/",
        }
    }

    /// Composite store key `{kind}/{name}`.
    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.key_prefix(), name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Listener => write!(f, "frontend"),
            EntityKind::BackendPool => write!(f, "backend"),
        }
    }
}

/// Behaviour shared by everything the store and the sync service handle.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);

    /// Reject values that cannot be rendered as single config lines.
    fn validate(&self) -> Result<(), String> {
        single_line("name", self.name())
    }
}

fn single_line(field: &str, value: &str) -> Result<(), String> {
    if value.contains(['\n', '\r']) {
        return Err(format!("{field} must not contain line breaks"));
    }
    Ok(())
}

/// A routing front door, rendered as an HAProxy `frontend` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listener {
    pub name: String,
    pub bind: String,
    #[serde(rename = "defaultBackend")]
    pub default_backend: String,
    pub mode: String,
    #[serde(rename = "keepalive")]
    pub keep_alive: String,
    pub option: String,
    /// Raw directive lines emitted verbatim after the modeled directives.
    pub rules: Vec<String>,
    #[serde(rename = "meta")]
    pub metadata: BTreeMap<String, String>,
}

impl Listener {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    pub fn default_backend(mut self, backend: impl Into<String>) -> Self {
        self.default_backend = backend.into();
        self
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.option = option.into();
        self
    }

    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rules.push(rule.into());
        self
    }
}

impl Entity for Listener {
    const KIND: EntityKind = EntityKind::Listener;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn validate(&self) -> Result<(), String> {
        single_line("name", &self.name)?;
        single_line("bind", &self.bind)?;
        single_line("mode", &self.mode)?;
        single_line("defaultBackend", &self.default_backend)?;
        single_line("option", &self.option)?;
        for (i, rule) in self.rules.iter().enumerate() {
            single_line(&format!("rules[{i}]"), rule)?;
        }
        Ok(())
    }
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A named group of upstream members, rendered as an HAProxy `backend` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendPool {
    pub name: String,
    /// Application release tag. Never interpreted here.
    pub version: String,
    pub balance: String,
    pub host: String,
    pub mode: String,
    pub members: Vec<Member>,
    #[serde(rename = "meta")]
    pub metadata: BTreeMap<String, String>,
}

impl BackendPool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn balance(mut self, balance: impl Into<String>) -> Self {
        self.balance = balance.into();
        self
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }
}

impl Entity for BackendPool {
    const KIND: EntityKind = EntityKind::BackendPool;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn validate(&self) -> Result<(), String> {
        single_line("name", &self.name)?;
        single_line("mode", &self.mode)?;
        single_line("balance", &self.balance)?;
        for (i, member) in self.members.iter().enumerate() {
            single_line(&format!("members[{i}].name"), &member.name)?;
            single_line(&format!("members[{i}].host"), &member.host)?;
        }
        Ok(())
    }
}

impl fmt::Display for BackendPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One upstream endpoint of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Member {
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    #[serde(rename = "lastKnown")]
    pub last_known: Option<DateTime<Utc>>,
    #[serde(rename = "meta")]
    pub metadata: BTreeMap<String, String>,
}

impl Member {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            ..Default::default()
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}
