//! Peer capability lookups
//!
//! Sessions never own capability data. They ask "does the peer have token
//! X" through [`CapabilityOracles`], a chain of collaborators where the first
//! one that knows the answer wins. [`PeerCapabilityCache`] is the stock
//! oracle, fed from disco results.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{CapabilitySet, QuirkResolver};
use crate::xml::Element;

/// Answers capability queries about a peer
pub trait CapabilityOracle: Send + Sync {
    /// `Some(answer)` if this oracle knows the peer, `None` to pass
    fn query_cap(&self, peer: &str, token: &str) -> Option<bool>;
}

/// Ordered oracle chain
#[derive(Clone, Default)]
pub struct CapabilityOracles {
    chain: Vec<Arc<dyn CapabilityOracle>>,
}

impl CapabilityOracles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, oracle: Arc<dyn CapabilityOracle>) {
        self.chain.push(oracle);
    }

    /// First definite answer in the chain, `false` if nobody knows
    pub fn query(&self, peer: &str, token: &str) -> bool {
        self.chain
            .iter()
            .find_map(|oracle| oracle.query_cap(peer, token))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }
}

impl std::fmt::Debug for CapabilityOracles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityOracles")
            .field("oracles", &self.chain.len())
            .finish()
    }
}

/// Capabilities of known peers, keyed by full address
#[derive(Debug, Default)]
pub struct PeerCapabilityCache {
    resolver: QuirkResolver,
    peers: RwLock<HashMap<String, CapabilitySet>>,
}

impl PeerCapabilityCache {
    pub fn new(resolver: QuirkResolver) -> Self {
        Self {
            resolver,
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Record a peer's disco result, replacing anything cached
    pub fn update_from_disco(&self, peer: &str, query: &Element) -> CapabilitySet {
        let caps = self.resolver.resolve_disco(query);
        debug!("Caching {} capabilities for {}", caps.size(), peer);
        self.peers.write().insert(peer.to_owned(), caps.clone());
        caps
    }

    pub fn set(&self, peer: &str, caps: CapabilitySet) {
        self.peers.write().insert(peer.to_owned(), caps);
    }

    pub fn get(&self, peer: &str) -> Option<CapabilitySet> {
        self.peers.read().get(peer).cloned()
    }

    /// Forget a peer (it went offline)
    pub fn remove(&self, peer: &str) -> Option<CapabilitySet> {
        self.peers.write().remove(peer)
    }
}

impl CapabilityOracle for PeerCapabilityCache {
    fn query_cap(&self, peer: &str, token: &str) -> Option<bool> {
        self.peers.read().get(peer).map(|caps| caps.has(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::QUIRK_OMITS_CONTENT_CREATORS;

    struct Always(bool);

    impl CapabilityOracle for Always {
        fn query_cap(&self, _peer: &str, _token: &str) -> Option<bool> {
            Some(self.0)
        }
    }

    #[test]
    fn first_answer_wins() {
        let cache = Arc::new(PeerCapabilityCache::default());
        cache.set(
            "romeo@montague.lit/orchard",
            CapabilitySet::from_tokens([QUIRK_OMITS_CONTENT_CREATORS]),
        );

        let mut oracles = CapabilityOracles::new();
        oracles.push(cache.clone());
        oracles.push(Arc::new(Always(true)));

        assert!(oracles.query("romeo@montague.lit/orchard", QUIRK_OMITS_CONTENT_CREATORS));
        // known peer without the token: the cache answers before the fallback
        assert!(!oracles.query("romeo@montague.lit/orchard", "urn:other"));
        // unknown peer: the fallback answers
        assert!(oracles.query("juliet@capulet.lit/balcony", "urn:other"));
    }

    #[test]
    fn empty_chain_answers_false() {
        assert!(!CapabilityOracles::new().query("a", "b"));
    }
}
