//! The subscription list: data channels, channel groups, presence channels.
//!
//! The three sets are disjoint by role; the same underlying name may appear
//! as both a data channel and a presence feed. Presence entries are stored in
//! wire form (with the `-pnpres` suffix).

use std::collections::HashSet;

use crate::events::PRESENCE_CHANNEL_SUFFIX;

pub fn is_presence_name(name: &str) -> bool {
    name.ends_with(PRESENCE_CHANNEL_SUFFIX)
}

fn presence_name(name: &str) -> String {
    if is_presence_name(name) {
        name.to_string()
    } else {
        format!("{name}{PRESENCE_CHANNEL_SUFFIX}")
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionList {
    channels: HashSet<String>,
    groups: HashSet<String>,
    presence: HashSet<String>,
    version: u64,
}

impl SubscriptionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic mutation counter; lets the scheduler detect a list change
    /// that raced an in-flight leave request.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.groups.is_empty() && self.presence.is_empty()
    }

    /// Add data channels; presence-suffixed names route to the presence set.
    pub fn add_channels<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.version += 1;
        for name in names {
            let name = name.into();
            if is_presence_name(&name) {
                self.presence.insert(name);
            } else {
                self.channels.insert(name);
            }
        }
    }

    /// Remove channels under either role: a plain name drops both the data
    /// entry and its presence sibling.
    pub fn remove_channels<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.version += 1;
        for name in names {
            if is_presence_name(name) {
                self.presence.remove(name);
            } else {
                self.channels.remove(name);
                self.presence.remove(&presence_name(name));
            }
        }
    }

    pub fn add_groups<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.version += 1;
        for name in names {
            self.groups.insert(name.into());
        }
    }

    pub fn remove_groups<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.version += 1;
        for name in names {
            self.groups.remove(name);
        }
    }

    /// Add presence feeds; plain names are normalized to wire form.
    pub fn add_presence<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.version += 1;
        for name in names {
            self.presence.insert(presence_name(name));
        }
    }

    pub fn remove_presence<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.version += 1;
        for name in names {
            self.presence.remove(&presence_name(name));
        }
    }

    /// Every subscribed object name (data, presence, groups). Order is not
    /// meaningful; used for the empty check and request building.
    pub fn all(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .iter()
            .chain(self.presence.iter())
            .chain(self.groups.iter())
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Channel names for the request path (data plus presence), sorted for a
    /// stable wire form.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .iter()
            .chain(self.presence.iter())
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Data channels only, sorted.
    pub fn data_channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().cloned().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_names_route_to_presence_set() {
        let mut list = SubscriptionList::new();
        list.add_channels(["alerts", "alerts-pnpres"]);
        assert_eq!(list.data_channel_names(), vec!["alerts"]);
        assert_eq!(list.channel_names(), vec!["alerts", "alerts-pnpres"]);
    }

    #[test]
    fn test_remove_channels_drops_both_roles() {
        let mut list = SubscriptionList::new();
        list.add_channels(["alerts"]);
        list.add_presence(["alerts"]);
        list.remove_channels(["alerts"]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_add_then_remove_is_identity() {
        let mut list = SubscriptionList::new();
        list.add_channels(["a"]);
        let before = list.all();
        list.add_channels(["b"]);
        list.remove_channels(["b"]);
        assert_eq!(list.all(), before);
    }

    #[test]
    fn test_mutations_are_idempotent() {
        let mut list = SubscriptionList::new();
        list.add_groups(["g"]);
        list.add_groups(["g"]);
        assert_eq!(list.group_names(), vec!["g"]);
        list.remove_groups(["g"]);
        list.remove_groups(["g"]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_version_advances_on_mutation() {
        let mut list = SubscriptionList::new();
        let v0 = list.version();
        list.add_channels(["a"]);
        assert!(list.version() > v0);
    }
}
