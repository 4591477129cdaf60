//! Capability sets
//!
//! A [`CapabilitySet`] is a set of feature namespaces a peer advertises,
//! plus synthesized "quirk" tokens describing known peer bugs. Quirk tokens
//! start with [`QUIRK_PREFIX`], a control character that can never appear
//! in a real namespace, and are never enumerated by [`CapabilitySet::foreach`].
//!
//! Token strings are interned in a [`TokenPool`] shared by every set created
//! for one connection; sets only hold [`TokenId`]s, so membership tests are
//! integer comparisons.

pub mod cache;
pub mod quirks;

pub use cache::{CapabilityOracle, CapabilityOracles, PeerCapabilityCache};
pub use quirks::QuirkResolver;

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Marks a token as a quirk rather than a protocol namespace
pub const QUIRK_PREFIX: char = '\u{7}';

/// Peer omits the `creator` attribute on content elements
pub const QUIRK_OMITS_CONTENT_CREATORS: &str = "\u{7}omits-content-creators";
/// Peer is Google's webmail client, which cannot modify contents
pub const QUIRK_GOOGLE_WEBMAIL_CLIENT: &str = "\u{7}google-webmail-client";
/// Peer is the Android GTalk client
pub const QUIRK_ANDROID_GTALK_CLIENT: &str = "\u{7}android-gtalk-client";

/// True if the token is a synthesized quirk
pub fn is_quirk(token: &str) -> bool {
    token.starts_with(QUIRK_PREFIX)
}

static GLOBAL_POOL: Lazy<Arc<TokenPool>> = Lazy::new(|| Arc::new(TokenPool::default()));

/// Index of an interned token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u32);

#[derive(Default)]
struct PoolInner {
    tokens: Vec<Arc<str>>,
    index: HashMap<Arc<str>, TokenId>,
}

/// Interning table for capability tokens
#[derive(Default)]
pub struct TokenPool {
    inner: RwLock<PoolInner>,
}

impl TokenPool {
    /// Create a pool scoped to one connection
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Process-wide pool used by [`CapabilitySet::new`]
    pub fn global() -> Arc<Self> {
        GLOBAL_POOL.clone()
    }

    /// Intern a token, returning its stable id
    pub fn intern(&self, token: &str) -> TokenId {
        if let Some(id) = self.lookup(token) {
            return id;
        }
        let mut inner = self.inner.write();
        if let Some(id) = inner.index.get(token) {
            return *id;
        }
        let id = TokenId(inner.tokens.len() as u32);
        let token: Arc<str> = Arc::from(token);
        inner.tokens.push(token.clone());
        inner.index.insert(token, id);
        id
    }

    /// Id of a token if it has been interned
    pub fn lookup(&self, token: &str) -> Option<TokenId> {
        self.inner.read().index.get(token).copied()
    }

    pub fn resolve(&self, id: TokenId) -> Option<Arc<str>> {
        self.inner.read().tokens.get(id.0 as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().tokens.len()
    }
}

impl fmt::Debug for TokenPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPool").field("tokens", &self.len()).finish()
    }
}

/// A set of feature and quirk tokens
#[derive(Clone)]
pub struct CapabilitySet {
    pool: Arc<TokenPool>,
    tokens: BTreeSet<TokenId>,
}

impl CapabilitySet {
    /// Empty set backed by the global pool
    pub fn new() -> Self {
        Self::with_pool(TokenPool::global())
    }

    /// Empty set backed by a connection-scoped pool
    pub fn with_pool(pool: Arc<TokenPool>) -> Self {
        Self {
            pool,
            tokens: BTreeSet::new(),
        }
    }

    /// Set containing the given tokens, backed by the global pool
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for token in tokens {
            set.add(token.as_ref());
        }
        set
    }

    pub fn pool(&self) -> &Arc<TokenPool> {
        &self.pool
    }

    pub fn add(&mut self, token: &str) {
        let id = self.pool.intern(token);
        self.tokens.insert(id);
    }

    /// Remove a token, returning whether it was present
    pub fn remove(&mut self, token: &str) -> bool {
        match self.pool.lookup(token) {
            Some(id) => self.tokens.remove(&id),
            None => false,
        }
    }

    pub fn has(&self, token: &str) -> bool {
        self.pool
            .lookup(token)
            .map_or(false, |id| self.tokens.contains(&id))
    }

    /// True if at least one token of `other` is in this set
    pub fn has_one_of(&self, other: &CapabilitySet) -> bool {
        let other_ids = self.foreign_ids(other);
        other_ids.iter().any(|id| self.tokens.contains(id))
    }

    /// True if every token of `other` is in this set
    pub fn is_superset_of(&self, other: &CapabilitySet) -> bool {
        if !self.same_pool(other) {
            return other.token_strings().iter().all(|t| self.has(t));
        }
        other.tokens.is_subset(&self.tokens)
    }

    pub fn equals(&self, other: &CapabilitySet) -> bool {
        if self.same_pool(other) {
            return self.tokens == other.tokens;
        }
        self.size() == other.size() && self.is_superset_of(other)
    }

    /// Add every token of `other`
    pub fn union_with(&mut self, other: &CapabilitySet) {
        if self.same_pool(other) {
            self.tokens.extend(other.tokens.iter().copied());
            return;
        }
        for token in other.token_strings() {
            self.add(&token);
        }
    }

    /// Keep only tokens also present in `other`
    pub fn intersect_with(&mut self, other: &CapabilitySet) {
        let other_ids = self.foreign_ids(other);
        self.tokens.retain(|id| other_ids.contains(id));
    }

    /// Remove every token present in `other`
    pub fn exclude(&mut self, other: &CapabilitySet) {
        let other_ids = self.foreign_ids(other);
        self.tokens.retain(|id| !other_ids.contains(id));
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Visit every real namespace token; quirks are skipped
    pub fn foreach<F: FnMut(&str)>(&self, mut visitor: F) {
        for id in &self.tokens {
            if let Some(token) = self.pool.resolve(*id) {
                if !is_quirk(&token) {
                    visitor(&token);
                }
            }
        }
    }

    /// Real namespace tokens, in interning order
    pub fn features(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.foreach(|t| out.push(t.to_owned()));
        out
    }

    /// Number of tokens, quirks included
    pub fn size(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn same_pool(&self, other: &CapabilitySet) -> bool {
        Arc::ptr_eq(&self.pool, &other.pool)
    }

    fn token_strings(&self) -> Vec<Arc<str>> {
        self.tokens
            .iter()
            .filter_map(|id| self.pool.resolve(*id))
            .collect()
    }

    /// `other`'s tokens expressed as ids of this set's pool
    fn foreign_ids<'a>(&self, other: &'a CapabilitySet) -> Cow<'a, BTreeSet<TokenId>> {
        if self.same_pool(other) {
            return Cow::Borrowed(&other.tokens);
        }
        Cow::Owned(
            other
                .token_strings()
                .iter()
                .filter_map(|t| self.pool.lookup(t))
                .collect(),
        )
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CapabilitySet {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for CapabilitySet {}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self
            .token_strings()
            .iter()
            .map(|t| match t.strip_prefix(QUIRK_PREFIX) {
                Some(quirk) => format!("quirk:{}", quirk),
                None => t.to_string(),
            })
            .collect();
        f.debug_set().entries(tokens).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set_of(tokens: &[&str]) -> CapabilitySet {
        CapabilitySet::from_tokens(tokens.iter().copied())
    }

    #[test]
    fn quirks_are_never_enumerated() {
        let mut set = set_of(&["urn:xmpp:jingle:1", QUIRK_OMITS_CONTENT_CREATORS]);
        assert!(set.has(QUIRK_OMITS_CONTENT_CREATORS));
        assert_eq!(set.size(), 2);
        assert_eq!(set.features(), vec!["urn:xmpp:jingle:1".to_string()]);

        assert!(set.remove(QUIRK_OMITS_CONTENT_CREATORS));
        assert!(!set.remove(QUIRK_OMITS_CONTENT_CREATORS));
    }

    #[test]
    fn exclude_with_copy_of_self_empties() {
        let mut set = set_of(&["a", "b", "c"]);
        let copy = set.clone();
        set.exclude(&copy);
        assert!(set.is_empty());
    }

    #[test]
    fn intersect_with_copy_of_self_is_noop() {
        let mut set = set_of(&["a", "b"]);
        let copy = set.clone();
        set.intersect_with(&copy);
        assert!(set.equals(&copy));
    }

    #[test]
    fn operations_work_across_pools() {
        let mut local = CapabilitySet::with_pool(TokenPool::new());
        local.add("urn:a");
        local.add("urn:b");
        let global = set_of(&["urn:b", "urn:c"]);

        assert!(local.has_one_of(&global));
        assert!(!local.is_superset_of(&global));

        let mut merged = local.clone();
        merged.union_with(&global);
        assert_eq!(merged.size(), 3);
        assert!(merged.is_superset_of(&global));

        local.intersect_with(&global);
        assert!(local.equals(&set_of(&["urn:b"])));
    }

    proptest! {
        #[test]
        fn union_is_commutative_and_idempotent(
            a in proptest::collection::vec("[a-d]{1,2}", 0..6),
            b in proptest::collection::vec("[a-d]{1,2}", 0..6),
        ) {
            let (x, y) = (CapabilitySet::from_tokens(&a), CapabilitySet::from_tokens(&b));

            let mut xy = x.clone();
            xy.union_with(&y);
            let mut yx = y.clone();
            yx.union_with(&x);
            prop_assert!(xy.equals(&yx));

            let mut again = xy.clone();
            again.union_with(&y);
            prop_assert!(again.equals(&xy));
        }

        #[test]
        fn add_then_has(tokens in proptest::collection::vec("[a-z]{1,4}", 0..6), t in "[a-z]{1,4}") {
            let mut set = CapabilitySet::from_tokens(&tokens);
            set.add(&t);
            prop_assert!(set.has(&t));
        }

        #[test]
        fn equals_is_an_equivalence(tokens in proptest::collection::vec("[a-c]", 0..4)) {
            let x = CapabilitySet::from_tokens(&tokens);
            let y = CapabilitySet::from_tokens(tokens.iter().rev());
            let mut z = CapabilitySet::with_pool(TokenPool::new());
            for t in &tokens {
                z.add(t);
            }
            prop_assert!(x.equals(&x));
            prop_assert_eq!(x.equals(&y), y.equals(&x));
            prop_assert!(x.equals(&y) && y.equals(&z) && x.equals(&z));
        }
    }
}
