//! Service directory lookup.
//!
//! # Design
//! The login payload hands out a map from logical service name to one or
//! more hosts. Only the first host of a list is ever used; the rest are
//! carried but no failover is attempted. A missing service is always an
//! error value, with one exception: a `profile` service the directory does
//! not list at all falls back to [`DEFAULT_PROFILE_HOST`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NotFoundError;

/// Host used for the account-settings (`profile`) service when the
/// directory has no entry for it.
pub const DEFAULT_PROFILE_HOST: &str = "https://wpa.chat.zalo.me";

/// Service names handed out by the remote API's directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Group,
    Profile,
    Conversation,
    Catalog,
    QuickMessage,
    Friend,
    FriendBoard,
    GroupBoard,
    AutoReply,
    Alias,
    Label,
    Chat,
    File,
    GroupPoll,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::Group => "group",
            Service::Profile => "profile",
            Service::Conversation => "conversation",
            Service::Catalog => "catalog",
            Service::QuickMessage => "quick_message",
            Service::Friend => "friend",
            Service::FriendBoard => "friend_board",
            Service::GroupBoard => "group_board",
            Service::AutoReply => "auto_reply",
            Service::Alias => "alias",
            Service::Label => "label",
            Service::Chat => "chat",
            Service::File => "file",
            Service::GroupPoll => "group_poll",
        }
    }
}

impl AsRef<str> for Service {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One directory entry: a bare host or an ordered host list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceEntry {
    Single(String),
    Multiple(Vec<String>),
}

impl ServiceEntry {
    /// The host actually used for requests.
    pub fn primary(&self) -> Option<&str> {
        match self {
            ServiceEntry::Single(host) => Some(host.as_str()),
            ServiceEntry::Multiple(hosts) => hosts.first().map(String::as_str),
        }
    }
}

impl From<&str> for ServiceEntry {
    fn from(host: &str) -> Self {
        ServiceEntry::Single(host.to_string())
    }
}

impl From<Vec<&str>> for ServiceEntry {
    fn from(hosts: Vec<&str>) -> Self {
        ServiceEntry::Multiple(hosts.into_iter().map(str::to_string).collect())
    }
}

/// Per-session map from service name to hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceDirectory {
    entries: HashMap<String, ServiceEntry>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, service: impl Into<String>, entry: impl Into<ServiceEntry>) {
        self.entries.insert(service.into(), entry.into());
    }

    pub fn with(mut self, service: impl Into<String>, entry: impl Into<ServiceEntry>) -> Self {
        self.insert(service, entry);
        self
    }

    pub fn get(&self, service: &str) -> Option<&ServiceEntry> {
        self.entries.get(service)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `service` to exactly one base host.
    ///
    /// An entry that is an empty list is an error, even for `profile`; the
    /// default host only stands in for an absent key.
    pub fn resolve(&self, service: impl AsRef<str>) -> Result<&str, NotFoundError> {
        let service = service.as_ref();
        let not_found = || NotFoundError {
            service: service.to_string(),
        };
        match self.entries.get(service) {
            Some(entry) => entry.primary().ok_or_else(not_found),
            None if service == Service::Profile.name() => Ok(DEFAULT_PROFILE_HOST),
            None => Err(not_found()),
        }
    }
}

impl FromIterator<(String, ServiceEntry)> for ServiceDirectory {
    fn from_iter<I: IntoIterator<Item = (String, ServiceEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
