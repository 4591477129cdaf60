//! Creator-partitioned content storage

use indexmap::IndexMap;

use super::{Content, ContentId, ContentInfo};
use crate::errors::{JingleError, Result};
use crate::protocol::{Creator, Dialect};

/// Contents of one session, split by creator role
///
/// Names are unique across both partitions. Iteration visits the initiator
/// partition first, each in insertion order.
#[derive(Debug, Default)]
pub struct ContentRegistry {
    initiator: IndexMap<String, Content>,
    responder: IndexMap<String, Content>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, creator: Creator) -> &IndexMap<String, Content> {
        match creator {
            Creator::Initiator => &self.initiator,
            Creator::Responder => &self.responder,
        }
    }

    fn partition_mut(&mut self, creator: Creator) -> &mut IndexMap<String, Content> {
        match creator {
            Creator::Initiator => &mut self.initiator,
            Creator::Responder => &mut self.responder,
        }
    }

    pub fn get(&self, id: &ContentId) -> Option<&Content> {
        self.partition(id.creator).get(&id.name)
    }

    pub fn get_mut(&mut self, id: &ContentId) -> Option<&mut Content> {
        self.partition_mut(id.creator).get_mut(&id.name)
    }

    /// True if either partition holds this name
    pub fn contains_name(&self, name: &str) -> bool {
        self.initiator.contains_key(name) || self.responder.contains_key(name)
    }

    /// Insert into the partition of the content's creator
    pub fn insert(&mut self, content: Content) -> Result<ContentId> {
        if self.contains_name(content.name()) {
            return Err(JingleError::bad_request(format!(
                "content '{}' already exists",
                content.name()
            )));
        }
        let id = content.id().clone();
        self.partition_mut(id.creator).insert(id.name.clone(), content);
        Ok(id)
    }

    pub fn remove(&mut self, id: &ContentId) -> Option<Content> {
        self.partition_mut(id.creator).shift_remove(&id.name)
    }

    /// Resolve the content a peer message refers to
    ///
    /// Google dialects have no creator attribute and keep everything in the
    /// initiator partition. Peers with the creator-omission quirk may leave
    /// `creator` out, in which case both partitions are searched, initiator
    /// first. `Ok(None)` means "not found" and is only returned when
    /// `fail_if_missing` is false.
    pub fn lookup(
        &self,
        name: Option<&str>,
        creator: Option<&str>,
        dialect: Dialect,
        omits_creators: bool,
        fail_if_missing: bool,
    ) -> Result<Option<ContentId>> {
        let name = name.ok_or_else(|| JingleError::bad_request("'name' attribute unset"))?;

        let found = if dialect.is_google() {
            self.find_in(Creator::Initiator, name)
        } else {
            match creator {
                None if omits_creators => self
                    .find_in(Creator::Initiator, name)
                    .or_else(|| self.find_in(Creator::Responder, name)),
                None => {
                    return Err(JingleError::bad_request(
                        "'creator' attribute missing".to_string(),
                    ));
                }
                Some(value) => match Creator::parse(value) {
                    Some(creator) => self.find_in(creator, name),
                    None => {
                        return Err(JingleError::bad_request(format!(
                            "invalid 'creator' attribute '{}'",
                            value
                        )));
                    }
                },
            }
        };

        if found.is_none() && fail_if_missing {
            return Err(JingleError::bad_request(format!(
                "content '{}' does not exist",
                name
            )));
        }
        Ok(found)
    }

    /// Find a content by name in any partition, initiator first
    pub fn find_by_name(&self, name: &str) -> Option<ContentId> {
        self.find_in(Creator::Initiator, name)
            .or_else(|| self.find_in(Creator::Responder, name))
    }

    fn find_in(&self, creator: Creator, name: &str) -> Option<ContentId> {
        self.partition(creator)
            .get(name)
            .map(|content| content.id().clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Content> {
        self.initiator.values().chain(self.responder.values())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Content> {
        self.initiator.values_mut().chain(self.responder.values_mut())
    }

    /// Contents of one partition
    pub fn iter_partition(&self, creator: Creator) -> impl Iterator<Item = &Content> {
        self.partition(creator).values()
    }

    pub fn ids(&self) -> Vec<ContentId> {
        self.iter().map(|c| c.id().clone()).collect()
    }

    pub fn ids_in(&self, creator: Creator) -> Vec<ContentId> {
        self.iter_partition(creator).map(|c| c.id().clone()).collect()
    }

    pub fn infos(&self) -> Vec<ContentInfo> {
        self.iter().map(Content::info).collect()
    }

    /// Contents not on their way out
    pub fn active_count(&self) -> usize {
        self.iter().filter(|c| c.is_active()).count()
    }

    pub fn len(&self) -> usize {
        self.initiator.len() + self.responder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every content, initiator partition first
    pub fn drain(&mut self) -> Vec<Content> {
        let mut out: Vec<Content> = self.initiator.drain(..).map(|(_, c)| c).collect();
        out.extend(self.responder.drain(..).map(|(_, c)| c));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentHandler, ContentSpec, ContentState};
    use crate::protocol::MediaType;

    struct Idle;

    impl ContentHandler for Idle {
        fn is_ready(&self) -> bool {
            false
        }
    }

    fn content(name: &str, creator: Creator) -> Content {
        let spec = ContentSpec {
            name: name.into(),
            media_type: MediaType::Audio,
            content_ns: crate::namespaces::JINGLE_RTP.into(),
            transport_ns: "urn:t".into(),
            created_by_us: false,
            dialect: Dialect::V1,
        };
        Content::new(ContentId::new(name, creator), &spec, Box::new(Idle))
    }

    #[test]
    fn omitted_creator_needs_the_quirk() {
        let mut registry = ContentRegistry::new();
        registry.insert(content("video", Creator::Responder)).unwrap();

        let found = registry
            .lookup(Some("video"), None, Dialect::V1, true, true)
            .unwrap();
        assert_eq!(found, Some(ContentId::new("video", Creator::Responder)));

        let err = registry
            .lookup(Some("video"), None, Dialect::V1, false, true)
            .unwrap_err();
        assert!(matches!(err, JingleError::BadRequest { .. }));
    }

    #[test]
    fn explicit_creator_searches_one_partition() {
        let mut registry = ContentRegistry::new();
        registry.insert(content("audio", Creator::Initiator)).unwrap();

        assert_eq!(
            registry
                .lookup(Some("audio"), Some("responder"), Dialect::V1, true, false)
                .unwrap(),
            None
        );
        assert!(registry
            .lookup(Some("audio"), Some("responder"), Dialect::V1, true, true)
            .is_err());
        assert!(registry
            .lookup(Some("audio"), Some("sideways"), Dialect::V1, false, false)
            .is_err());
        assert!(registry
            .lookup(None, Some("initiator"), Dialect::V1, false, false)
            .is_err());
    }

    #[test]
    fn google_ignores_creator() {
        let mut registry = ContentRegistry::new();
        registry.insert(content("gtalk", Creator::Initiator)).unwrap();
        let found = registry
            .lookup(Some("gtalk"), Some("responder"), Dialect::GTalk4, false, true)
            .unwrap();
        assert_eq!(found, Some(ContentId::new("gtalk", Creator::Initiator)));
    }

    #[test]
    fn names_are_unique_across_partitions() {
        let mut registry = ContentRegistry::new();
        registry.insert(content("audio", Creator::Initiator)).unwrap();
        assert!(registry.insert(content("audio", Creator::Responder)).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removing_contents_are_not_active() {
        let mut registry = ContentRegistry::new();
        let a = registry.insert(content("a", Creator::Initiator)).unwrap();
        registry.insert(content("b", Creator::Responder)).unwrap();
        assert_eq!(registry.active_count(), 2);

        registry.get_mut(&a).unwrap().set_state(ContentState::Removing);
        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.ids().len(), 2);
    }
}
