//! Cluster identity tags and order-independent tag comparison

use std::collections::BTreeMap;
use tierflow_nsxt::Tag;

pub const SCOPE_GARDEN: &str = "garden";
pub const SCOPE_CLUSTER: &str = "cluster";

/// Garden and cluster a set of remote objects belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub garden_id: String,
    pub cluster_name: String,
}

impl ClusterIdentity {
    pub fn new(garden_id: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            garden_id: garden_id.into(),
            cluster_name: cluster_name.into(),
        }
    }

    /// Tags put on every object created for the cluster
    pub fn tags(&self) -> Vec<Tag> {
        vec![
            Tag::new(SCOPE_GARDEN, &self.garden_id),
            Tag::new(SCOPE_CLUSTER, &self.cluster_name),
        ]
    }

    /// Whether `tags` carry this identity's garden and cluster pair.
    pub fn is_tagged(&self, tags: &[Tag]) -> bool {
        let tags = TagSet::from(tags);
        tags.get(SCOPE_GARDEN) == Some(self.garden_id.as_str())
            && tags.get(SCOPE_CLUSTER) == Some(self.cluster_name.as_str())
    }
}

/// Tags keyed by scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn get(&self, scope: &str) -> Option<&str> {
        self.0.get(scope).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[Tag]> for TagSet {
    fn from(tags: &[Tag]) -> Self {
        Self(
            tags.iter()
                .map(|t| (t.scope.clone(), t.tag.clone()))
                .collect(),
        )
    }
}

/// Compare two tag collections ignoring their order.
pub fn same_tags(a: &[Tag], b: &[Tag]) -> bool {
    TagSet::from(a) == TagSet::from(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_does_not_matter() {
        let a = vec![Tag::new("garden", "g1"), Tag::new("cluster", "c1")];
        let b = vec![Tag::new("cluster", "c1"), Tag::new("garden", "g1")];
        assert!(same_tags(&a, &b));
    }

    #[test]
    fn test_differing_value_is_unequal() {
        let a = vec![Tag::new("garden", "g1"), Tag::new("cluster", "c1")];
        let b = vec![Tag::new("cluster", "c2"), Tag::new("garden", "g1")];
        assert!(!same_tags(&a, &b));
    }

    #[test]
    fn test_extra_scope_is_unequal() {
        let a = vec![Tag::new("garden", "g1")];
        let b = vec![Tag::new("garden", "g1"), Tag::new("owner", "ops")];
        assert!(!same_tags(&a, &b));
        assert!(same_tags(&[], &[]));
    }

    #[test]
    fn test_identity_matching() {
        let id = ClusterIdentity::new("g1", "c1");
        assert!(id.is_tagged(&id.tags()));

        let mut extra = id.tags();
        extra.push(Tag::new("policyPath", "/infra/segments/x"));
        assert!(id.is_tagged(&extra));

        assert!(!id.is_tagged(&[Tag::new("garden", "g1")]));
        assert!(!ClusterIdentity::new("g1", "c2").is_tagged(&id.tags()));
    }
}
