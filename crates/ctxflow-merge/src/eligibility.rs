//! Edge eligibility per merge point
//!
//! The merge-point kind never changes how a strategy picks a winner; it only
//! decides which recorded edges take part. [`EligibilityPolicy`] holds that
//! decision and is part of the engine configuration.

use ctxflow_model::{EdgeKind, MergeEdge, MergeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which edge kinds a merge point admits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeFilter {
    /// Solid and dotted edges
    #[default]
    All,

    /// Solid edges only
    SolidOnly,

    /// Dotted edges only (the initial snapshot stands in for the solid edge)
    DottedOnly,
}

impl EdgeFilter {
    /// Check whether an edge kind passes
    #[inline]
    #[must_use]
    pub fn admits(self, kind: EdgeKind) -> bool {
        match self {
            Self::All => true,
            Self::SolidOnly => kind == EdgeKind::Solid,
            Self::DottedOnly => kind == EdgeKind::Dotted,
        }
    }
}

/// Edge filters keyed by merge-point name
///
/// ```toml
/// default = "all"
///
/// [overrides]
/// listener-invoke = "solid_only"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityPolicy {
    /// Filter for merge points without an override
    pub default: EdgeFilter,

    /// Per merge-point filters, keyed by [`MergeKind::name`]
    pub overrides: BTreeMap<String, EdgeFilter>,
}

impl EligibilityPolicy {
    /// Policy admitting every edge at every merge point
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the filter for one merge point
    #[must_use]
    pub fn with_override(mut self, kind: MergeKind, filter: EdgeFilter) -> Self {
        self.overrides.insert(kind.name().to_string(), filter);
        self
    }

    /// Filter applied at `kind`
    #[must_use]
    pub fn filter_for(&self, kind: MergeKind) -> EdgeFilter {
        self.overrides
            .get(kind.name())
            .copied()
            .unwrap_or(self.default)
    }

    /// Check whether `edge` is eligible at `kind`
    #[inline]
    #[must_use]
    pub fn admits(&self, kind: MergeKind, edge: &MergeEdge) -> bool {
        self.filter_for(kind).admits(edge.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxflow_model::Snapshot;

    #[test]
    fn default_admits_everything() {
        let policy = EligibilityPolicy::new();
        let dotted = MergeEdge::new(Snapshot::bootstrap(), EdgeKind::Dotted, 1);
        assert!(policy.admits(MergeKind::TimerFire, &dotted));
        assert!(policy.admits(MergeKind::ListenerInvoke, &dotted));
    }

    #[test]
    fn override_applies_to_named_kind_only() {
        let policy =
            EligibilityPolicy::new().with_override(MergeKind::ListenerInvoke, EdgeFilter::SolidOnly);
        let dotted = MergeEdge::new(Snapshot::bootstrap(), EdgeKind::Dotted, 1);
        assert!(!policy.admits(MergeKind::ListenerInvoke, &dotted));
        assert!(policy.admits(MergeKind::TimerFire, &dotted));
        assert_eq!(policy.filter_for(MergeKind::Other("io")), EdgeFilter::All);
    }

    #[test]
    fn filter_admits() {
        assert!(EdgeFilter::All.admits(EdgeKind::Dotted));
        assert!(EdgeFilter::SolidOnly.admits(EdgeKind::Solid));
        assert!(!EdgeFilter::SolidOnly.admits(EdgeKind::Dotted));
        assert!(!EdgeFilter::DottedOnly.admits(EdgeKind::Solid));
    }

    #[test]
    fn policy_from_toml() {
        let policy: EligibilityPolicy = toml::from_str(
            r#"
            default = "all"

            [overrides]
            suspension-resume = "dotted_only"
            "#,
        )
        .unwrap();
        assert_eq!(
            policy.filter_for(MergeKind::SuspensionResume),
            EdgeFilter::DottedOnly
        );
        assert_eq!(policy.filter_for(MergeKind::TimerFire), EdgeFilter::All);
    }
}
