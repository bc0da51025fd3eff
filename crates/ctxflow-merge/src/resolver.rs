//! Merge resolver
//!
//! Provides [`MergeResolver`], called immediately before a scheduled callback
//! runs. It gathers the token's eligible edges, lets every declared variable
//! pick a winner through its strategy, and assembles one merged snapshot.
//! Activating that snapshot around the callback is the caller's job.

use crate::eligibility::EligibilityPolicy;
use crate::error::{MergeError, MergeResult};
use crate::token::OperationToken;
use ctxflow_model::{
    ContextValue, ContextVariable, MergeEdge, MergeInput, MergeKind, MergeStrategy, Realm,
    Snapshot, VariableId,
};
use std::sync::Arc;

/// Computes merged snapshots from operation tokens
#[derive(Debug, Clone)]
pub struct MergeResolver {
    realm: Arc<Realm>,
    policy: EligibilityPolicy,
}

impl MergeResolver {
    /// Create resolver admitting every edge at every merge point
    #[inline]
    #[must_use]
    pub fn new(realm: Arc<Realm>) -> Self {
        Self::with_policy(realm, EligibilityPolicy::default())
    }

    /// Create resolver with an eligibility policy
    #[inline]
    #[must_use]
    pub fn with_policy(realm: Arc<Realm>, policy: EligibilityPolicy) -> Self {
        Self { realm, policy }
    }

    /// Realm the resolver reads variables and the initial snapshot from
    #[inline]
    #[must_use]
    pub fn realm(&self) -> &Arc<Realm> {
        &self.realm
    }

    /// Eligibility policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    /// Resolve `token` at a merge point of kind `kind`
    ///
    /// Marks the token finalized; later edges only reach its history.
    /// Resolving a finalized token again recomputes from the same edges.
    ///
    /// # Errors
    /// - `MissingInitialSnapshot` if no eligible solid edge exists and the
    ///   realm was never bootstrapped
    /// - `Strategy` if a custom strategy fails; nothing is produced
    /// - `Registry` if a custom strategy returns a value of the wrong type
    pub fn resolve(&self, token: &OperationToken, kind: MergeKind) -> MergeResult<Snapshot> {
        let edges = self.eligible_edges(token, kind)?;
        let primary = execution_flow_edge(token, &edges).ok_or(MergeError::MissingInitialSnapshot)?;
        let solid = source_graph_edge(&edges).ok_or(MergeError::MissingInitialSnapshot)?;
        let cancelled = token.is_cancelled();

        let variables = self.realm.registry().variables();
        let mut winners: Vec<(VariableId, Option<ContextValue>)> = Vec::with_capacity(variables.len());
        for variable in &variables {
            let winner = match variable.strategy() {
                MergeStrategy::ExecutionFlow => primary.snapshot().value(variable.id()).cloned(),
                MergeStrategy::SourceGraph => solid.snapshot().value(variable.id()).cloned(),
                MergeStrategy::Custom(merge) => {
                    let input = MergeInput::new(variable, &edges, kind, token.id(), cancelled);
                    custom_winner(variable, merge(&input))?
                }
            };
            tracing::trace!(
                token = %token.id(),
                variable = %variable.key(),
                strategy = variable.strategy().name(),
                explicit = winner.is_some(),
                "selected winner"
            );
            winners.push((variable.id(), winner));
        }

        let merged = Snapshot::merged(primary.snapshot(), winners, token.resolution_mark());
        let resolutions = token.finalize();

        if cancelled {
            tracing::debug!(token = %token.id(), %kind, "resolved cancelled token");
        }
        tracing::debug!(
            token = %token.id(),
            %kind,
            edges = edges.len(),
            primary_seq = primary.seq(),
            snapshot = %merged.id(),
            resolutions,
            "resolved merge point"
        );
        Ok(merged)
    }

    /// Edges taking part in resolution at `kind`, in recording order
    ///
    /// When no eligible solid edge exists, the realm's initial snapshot is
    /// prepended as a synthesized dotted edge.
    ///
    /// # Errors
    /// Returns `MissingInitialSnapshot` if that fallback is needed and the
    /// realm was never bootstrapped.
    pub fn eligible_edges(
        &self,
        token: &OperationToken,
        kind: MergeKind,
    ) -> MergeResult<Vec<MergeEdge>> {
        let mut edges: Vec<MergeEdge> = token
            .edges()
            .into_iter()
            .filter(|e| self.policy.admits(kind, e))
            .collect();

        if !edges.iter().any(|e| e.kind().is_solid()) {
            let initial = self.realm.initial_snapshot()?;
            edges.insert(0, MergeEdge::initial(initial));
        }
        Ok(edges)
    }
}

/// Edge an execution-flow variable follows
///
/// Deepest chained resolution (latest on ties), else the latest solid edge,
/// else the latest dotted edge.
fn execution_flow_edge<'a>(token: &OperationToken, edges: &'a [MergeEdge]) -> Option<&'a MergeEdge> {
    let lineage = token.lineage();
    let root = token.root_id();

    let chained = edges
        .iter()
        .filter_map(|e| e.chained_depth(lineage, root).map(|depth| (depth, e.seq(), e)))
        .max_by_key(|(depth, seq, _)| (*depth, *seq))
        .map(|(_, _, e)| e);

    chained
        .or_else(|| {
            edges
                .iter()
                .filter(|e| e.kind().is_solid())
                .max_by_key(|e| e.seq())
        })
        .or_else(|| edges.iter().max_by_key(|e| e.seq()))
}

/// Edge a source-graph variable follows
///
/// The first recorded solid edge (the registration point), else the
/// synthesized initial edge.
fn source_graph_edge(edges: &[MergeEdge]) -> Option<&MergeEdge> {
    edges
        .iter()
        .filter(|e| e.kind().is_solid())
        .min_by_key(|e| e.seq())
        .or_else(|| edges.iter().find(|e| e.is_synthesized()))
}

fn custom_winner(
    variable: &ContextVariable,
    outcome: Result<Option<ContextValue>, ctxflow_model::StrategyError>,
) -> MergeResult<Option<ContextValue>> {
    let winner = outcome.map_err(|source| MergeError::Strategy {
        key: variable.key().to_string(),
        source,
    })?;
    if let Some(value) = &winner {
        variable.check(value)?;
    }
    Ok(winner)
}
