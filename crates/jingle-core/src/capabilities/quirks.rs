//! Quirk synthesis
//!
//! Turns a peer's service discovery result (or just its client name) into a
//! [`CapabilitySet`] holding the advertised features plus quirk tokens for
//! known bugs, according to the configured [`QuirkRules`].

use std::sync::Arc;

use tracing::debug;

use super::{CapabilitySet, TokenPool, QUIRK_OMITS_CONTENT_CREATORS};
use crate::config::QuirkRules;
use crate::namespaces;
use crate::xml::Element;

#[derive(Debug, Clone)]
pub struct QuirkResolver {
    rules: QuirkRules,
    pool: Arc<TokenPool>,
}

impl QuirkResolver {
    pub fn new(rules: QuirkRules, pool: Arc<TokenPool>) -> Self {
        Self { rules, pool }
    }

    pub fn rules(&self) -> &QuirkRules {
        &self.rules
    }

    /// Build a set from a `disco#info` query element
    ///
    /// `feature` children contribute their `var`; `identity` children and
    /// the query `node` contribute quirks.
    pub fn resolve_disco(&self, query: &Element) -> CapabilitySet {
        let mut caps = CapabilitySet::with_pool(self.pool.clone());

        if let Some(node) = query.attr("node") {
            self.add_node_quirks(node, &mut caps);
        }

        for child in query.children() {
            if child.ns() != Some(namespaces::DISCO_INFO) && child.ns().is_some() {
                continue;
            }
            match child.name() {
                "feature" => {
                    if let Some(var) = child.attr("var") {
                        caps.add(var);
                    }
                }
                "identity" => {
                    if let Some(name) = child.attr("name") {
                        if self.omits_content_creators(name) {
                            caps.add(QUIRK_OMITS_CONTENT_CREATORS);
                        }
                    }
                }
                _ => {}
            }
        }
        caps
    }

    /// Build a quirk-only set from a raw client identity string
    pub fn resolve_client_name(&self, client_name: &str) -> CapabilitySet {
        let mut caps = CapabilitySet::with_pool(self.pool.clone());
        if self.omits_content_creators(client_name) {
            caps.add(QUIRK_OMITS_CONTENT_CREATORS);
        }
        caps
    }

    /// Add quirks tied to a capability node (`node` or `node#ver`)
    pub fn add_node_quirks(&self, node: &str, caps: &mut CapabilitySet) {
        for rule in self.rules.node_quirks.iter().filter(|r| r.matches(node)) {
            debug!("Node {} carries quirk {:?}", node, rule.quirk);
            caps.add(rule.quirk.token());
        }
    }

    /// True if this client version is known to drop content creators
    pub fn omits_content_creators(&self, client_name: &str) -> bool {
        let hit = self
            .rules
            .creator_omission
            .iter()
            .any(|rule| rule.matches(client_name));
        if hit {
            debug!("Client '{}' omits content creators", client_name);
        }
        hit
    }
}

impl Default for QuirkResolver {
    fn default() -> Self {
        Self::new(QuirkRules::default(), TokenPool::global())
    }
}
