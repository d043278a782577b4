//! Per-address state carried between pipeline runs.

use std::num::NonZeroU32;

use crate::model::{AddressMatch, AddressQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// When a session resolves its address again after the first success.
pub enum ResolvePolicy {
    /// Keep the first resolved location for the life of the session.
    #[default]
    CacheForever,
    /// Resolve again before every n-th schedule fetch.
    EveryNPolls(NonZeroU32),
}

impl ResolvePolicy {
    /// Policy from an optional poll count, `None` meaning cache forever.
    #[must_use]
    pub fn from_polls(polls: Option<NonZeroU32>) -> Self {
        polls.map_or(Self::CacheForever, Self::EveryNPolls)
    }
}

#[derive(Debug, Clone)]
/// A watched address and its cached resolution.
///
/// Owned by the caller, so separate addresses never share state.
pub struct AddressSession {
    query: AddressQuery,
    policy: ResolvePolicy,
    resolved: Option<AddressMatch>,
    polls_since_resolve: u32,
}

impl AddressSession {
    /// Start an unresolved session for `query`.
    #[must_use]
    pub fn new(query: AddressQuery, policy: ResolvePolicy) -> Self {
        Self {
            query,
            policy,
            resolved: None,
            polls_since_resolve: 0,
        }
    }

    /// Address text as supplied by the user.
    #[must_use]
    pub fn query(&self) -> &AddressQuery {
        &self.query
    }

    /// Re-resolution policy in effect.
    #[must_use]
    pub fn policy(&self) -> ResolvePolicy {
        self.policy
    }

    /// Last successful resolution, if any.
    #[must_use]
    pub fn resolved(&self) -> Option<&AddressMatch> {
        self.resolved.as_ref()
    }

    /// Cached match that may be reused for the next fetch.
    #[must_use]
    pub fn reusable_match(&self) -> Option<&AddressMatch> {
        let resolved = self.resolved.as_ref()?;
        match self.policy {
            ResolvePolicy::CacheForever => Some(resolved),
            ResolvePolicy::EveryNPolls(polls) => {
                (self.polls_since_resolve < polls.get()).then_some(resolved)
            }
        }
    }

    /// Store a fresh resolution and restart the poll count.
    pub fn record_resolution(&mut self, address: AddressMatch) {
        self.resolved = Some(address);
        self.polls_since_resolve = 0;
    }

    /// Count one schedule fetch against the cached resolution.
    pub fn record_poll(&mut self) {
        self.polls_since_resolve = self.polls_since_resolve.saturating_add(1);
    }

    /// Drop the cached resolution so the next run resolves again.
    pub fn invalidate(&mut self) {
        self.resolved = None;
        self.polls_since_resolve = 0;
    }
}
