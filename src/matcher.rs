//! Rule lookup for decoded MIDI events
//!
//! Events are normalized before lookup (Note Off reads as Note On, controller
//! values are bucketed) and the first rule in configuration order wins.
//! Lookups are memoized per exact input tuple; the cache lives as long as the
//! matcher because the rule set it reads is never reloaded.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

use crate::midi::{DecodedEvent, Status};
use crate::rules::{controller_bucket, Rule, RuleSet};

type LookupKey = (Status, Option<u8>, Option<u8>, Option<u8>);

/// Finds the rule for an incoming event
pub struct Matcher {
    rules: Arc<RuleSet>,
    cache: DashMap<LookupKey, Option<Arc<Rule>>>,
}

impl Matcher {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            cache: DashMap::new(),
        }
    }

    /// Look up the rule for a decoded event
    pub fn lookup_event(&self, event: &DecodedEvent) -> Option<Arc<Rule>> {
        self.lookup(event.status, event.channel, event.data1, event.data2)
    }

    /// Look up the first rule matching the given event fields
    pub fn lookup(
        &self,
        status: Status,
        channel: Option<u8>,
        data1: Option<u8>,
        data2: Option<u8>,
    ) -> Option<Arc<Rule>> {
        let key = (status, channel, data1, data2);
        if let Some(hit) = self.cache.get(&key) {
            return hit.value().clone();
        }

        let found = self.find(status, channel, data1, data2);
        self.cache.insert(key, found.clone());
        found
    }

    /// Number of memoized lookups
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    fn find(
        &self,
        status: Status,
        channel: Option<u8>,
        data1: Option<u8>,
        data2: Option<u8>,
    ) -> Option<Arc<Rule>> {
        let status = status.normalized();
        let data2 = match status {
            Status::ControllerChange => data2.map(controller_bucket),
            _ => data2,
        };

        let found = self
            .rules
            .rules_for(status)
            .iter()
            .find(|rule| rule.matches(channel, data1, data2))
            .cloned();

        trace!(
            "lookup {} ch:{:?} d1:{:?} d2:{:?} -> {:?}",
            status,
            channel,
            data1,
            data2,
            found.as_ref().map(|r| r.name.as_str())
        );

        found
    }
}
