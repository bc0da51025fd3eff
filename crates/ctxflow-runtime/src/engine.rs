//! Context engine
//!
//! [`ContextEngine`] is one isolate's view of the system: a realm (shared
//! registry and initial snapshot), its own active-context stack, and the
//! recorder and resolver that scheduler adapters call into.

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::stack::{ContextStack, ScopeGuard};
use ctxflow_merge::{BranchRecorder, MergeResolver, OperationToken};
use ctxflow_model::{
    ContextValue, ContextVar, ContextVariable, EdgeKind, MergeKind, MergeStrategy, Realm,
    Snapshot, VariableKey, VariableRegistry,
};
use std::any::Any;
use std::sync::Arc;

/// Facade over stack, recorder and resolver for one isolate
///
/// An engine can be shared through an `Arc` and used from any thread, but
/// only one thread may be inside its scopes at a time: adapters that run
/// callbacks concurrently need one engine per thread (see [`Self::new`] for
/// engines sharing a realm). [`ContextStack`] checks this in debug builds.
#[derive(Debug)]
pub struct ContextEngine {
    realm: Arc<Realm>,
    stack: ContextStack,
    recorder: BranchRecorder,
    resolver: MergeResolver,
    config: EngineConfig,
}

impl ContextEngine {
    /// Create an engine over a bootstrapped realm
    ///
    /// The realm's initial snapshot becomes the stack's root frame.
    ///
    /// # Errors
    /// - `Config` if `config` fails validation
    /// - `Realm(MissingInitialSnapshot)` if the realm was never bootstrapped
    pub fn new(realm: Arc<Realm>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let initial = realm.initial_snapshot()?;

        let engine = Self {
            stack: ContextStack::new(initial),
            recorder: BranchRecorder::new().with_history_limit(config.history_limit),
            resolver: MergeResolver::with_policy(Arc::clone(&realm), config.eligibility.clone()),
            realm,
            config,
        };
        tracing::info!(
            registry = %engine.registry().id(),
            variables = engine.registry().len(),
            history_limit = engine.config.history_limit,
            "context engine started"
        );
        Ok(engine)
    }

    /// Bootstrap a fresh realm over `registry` and create its first engine
    ///
    /// Further isolates of the same realm are created with [`Self::new`]
    /// and [`Self::realm`].
    ///
    /// # Errors
    /// Returns `Config` if `config` fails validation.
    pub fn bootstrap(registry: Arc<VariableRegistry>, config: EngineConfig) -> EngineResult<Self> {
        let realm = Arc::new(Realm::new(registry));
        realm.bootstrap()?;
        Self::new(realm, config)
    }

    /// Realm shared with other isolates
    #[inline]
    #[must_use]
    pub fn realm(&self) -> &Arc<Realm> {
        &self.realm
    }

    /// Variable registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<VariableRegistry> {
        self.realm.registry()
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Active-context stack
    #[inline]
    #[must_use]
    pub fn stack(&self) -> &ContextStack {
        &self.stack
    }

    // Registry

    /// Declare an untyped variable
    ///
    /// # Errors
    /// Returns `Registry(DuplicateVariable)` if `key` is taken.
    pub fn declare(
        &self,
        key: impl Into<VariableKey>,
        default: Option<ContextValue>,
        strategy: MergeStrategy,
    ) -> EngineResult<ContextVariable> {
        Ok(self.registry().declare(key, default, strategy)?)
    }

    /// Declare a typed variable
    ///
    /// # Errors
    /// Returns `Registry(DuplicateVariable)` if `key` is taken.
    pub fn declare_typed<T: Any + Send + Sync>(
        &self,
        key: impl Into<VariableKey>,
        default: Option<T>,
        strategy: MergeStrategy,
    ) -> EngineResult<ContextVar<T>> {
        Ok(self.registry().declare_typed(key, default, strategy)?)
    }

    /// Look up a variable by key
    #[must_use]
    pub fn variable(&self, key: &str) -> Option<ContextVariable> {
        self.registry().get(key)
    }

    /// Re-derive a typed handle
    ///
    /// # Errors
    /// Returns `Registry(UnknownVariable)` or `Registry(TypeMismatch)`.
    pub fn lookup<T: Any + Send + Sync>(&self, key: &str) -> EngineResult<ContextVar<T>> {
        Ok(self.registry().lookup(key)?)
    }

    // Stack

    /// Active snapshot
    #[inline]
    #[must_use]
    pub fn current(&self) -> Snapshot {
        self.stack.current()
    }

    /// Activate `snapshot` until the guard drops
    #[inline]
    pub fn enter(&self, snapshot: Snapshot) -> ScopeGuard<'_> {
        self.stack.enter(snapshot)
    }

    /// Run `body` with `snapshot` active
    #[inline]
    pub fn with_snapshot<R>(&self, snapshot: Snapshot, body: impl FnOnce() -> R) -> R {
        self.stack.with_snapshot(snapshot, body)
    }

    /// Run a fallible `body` with `snapshot` active
    ///
    /// # Errors
    /// Returns whatever `body` returns.
    #[inline]
    pub fn try_with_snapshot<T, E>(
        &self,
        snapshot: Snapshot,
        body: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        self.stack.try_with_snapshot(snapshot, body)
    }

    /// Assign in the current frame
    ///
    /// # Errors
    /// Returns `Registry(TypeMismatch)` for a value of the wrong type.
    pub fn set_variable(&self, variable: &ContextVariable, value: ContextValue) -> EngineResult<()> {
        Ok(self.stack.set_variable(variable, value)?)
    }

    /// Typed assignment in the current frame
    #[inline]
    pub fn set<T: Any + Send + Sync>(&self, variable: &ContextVar<T>, value: T) {
        self.stack.set(variable, value);
    }

    /// Typed read of the current value
    #[inline]
    #[must_use]
    pub fn get<T: Any + Send + Sync + Clone>(&self, variable: &ContextVar<T>) -> Option<T> {
        self.stack.get(variable)
    }

    // Recorder

    /// Record a branch point against the active snapshot
    pub fn record_branch(&self, existing: Option<&OperationToken>, kind: EdgeKind) -> OperationToken {
        self.recorder.record_branch(&self.stack, existing, kind)
    }

    /// Token with no edges
    #[inline]
    #[must_use]
    pub fn open(&self) -> OperationToken {
        self.recorder.open()
    }

    /// Token for an operation nested inside `outer`
    pub fn chain(&self, outer: &OperationToken) -> OperationToken {
        self.recorder.chain(&self.stack, outer)
    }

    /// Move a chained operation under `outer`
    #[inline]
    #[must_use]
    pub fn rechain(&self, source: &OperationToken, outer: &OperationToken) -> OperationToken {
        self.recorder.rechain(source, outer)
    }

    /// Re-arm a recurring operation
    #[inline]
    #[must_use]
    pub fn fork(&self, source: &OperationToken) -> OperationToken {
        self.recorder.fork(source)
    }

    /// Mark a token cancelled
    #[inline]
    pub fn cancel(&self, token: &OperationToken) {
        self.recorder.cancel(token);
    }

    // Resolver

    /// Compute the merged snapshot for `token`
    ///
    /// # Errors
    /// Returns `Merge` if resolution fails.
    pub fn resolve(&self, token: &OperationToken, kind: MergeKind) -> EngineResult<Snapshot> {
        Ok(self.resolver.resolve(token, kind)?)
    }

    /// Resolve `token` and run `body` inside the merged snapshot
    ///
    /// # Errors
    /// Returns `Merge` if resolution fails; `body` does not run and the
    /// active snapshot is untouched.
    pub fn dispatch<R>(
        &self,
        token: &OperationToken,
        kind: MergeKind,
        body: impl FnOnce() -> R,
    ) -> EngineResult<R> {
        let snapshot = self.resolve(token, kind).map_err(|e| {
            tracing::warn!(token = %token.id(), %kind, error = %e, "merge failed; callback skipped");
            e
        })?;
        Ok(self.with_snapshot(snapshot, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use ctxflow_merge::MergeError;
    use ctxflow_model::{RealmError, StrategyError};

    fn engine() -> ContextEngine {
        ContextEngine::bootstrap(Arc::new(VariableRegistry::new()), EngineConfig::default()).unwrap()
    }

    #[test]
    fn unbootstrapped_realm_is_rejected() {
        let realm = Arc::new(Realm::new(Arc::new(VariableRegistry::new())));
        let err = ContextEngine::new(realm, EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::Realm(RealmError::MissingInitialSnapshot)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig::new().with_history_limit(usize::MAX);
        let err = ContextEngine::bootstrap(Arc::new(VariableRegistry::new()), config).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn stack_root_is_initial_snapshot() {
        let engine = engine();
        let initial = engine.realm().initial_snapshot().unwrap();
        assert!(engine.current().ptr_eq(&initial));
    }

    #[test]
    fn isolates_share_realm_but_not_stack() {
        let first = engine();
        let v = first
            .declare_typed::<i64>("v", None, MergeStrategy::ExecutionFlow)
            .unwrap();
        let second = ContextEngine::new(Arc::clone(first.realm()), EngineConfig::default()).unwrap();

        first.set(&v, 1);
        assert_eq!(first.get(&v), Some(1));
        assert_eq!(second.get(&v), None);
        assert!(second.lookup::<i64>("v").is_ok());
    }

    #[test]
    fn dispatch_runs_inside_merged_snapshot() {
        let engine = engine();
        let v = engine
            .declare_typed::<i64>("v", None, MergeStrategy::ExecutionFlow)
            .unwrap();

        engine.set(&v, 1);
        let token = engine.record_branch(None, EdgeKind::Solid);
        engine.set(&v, 2);

        let seen = engine
            .dispatch(&token, MergeKind::TimerFire, || engine.get(&v))
            .unwrap();
        assert_eq!(seen, Some(1));
        assert_eq!(engine.get(&v), Some(2));
    }

    #[test]
    fn failed_merge_skips_body_and_keeps_snapshot() {
        let engine = engine();
        engine
            .declare(
                "strict",
                None,
                MergeStrategy::custom(|_| Err(StrategyError::new("refused"))),
            )
            .unwrap();
        let token = engine.record_branch(None, EdgeKind::Solid);
        let before = engine.current();

        let mut ran = false;
        let err = engine
            .dispatch(&token, MergeKind::TimerFire, || ran = true)
            .unwrap_err();

        assert!(matches!(err, EngineError::Merge(MergeError::Strategy { .. })));
        assert!(!ran);
        assert!(engine.current().ptr_eq(&before));
    }

    #[test]
    fn duplicate_declaration_surfaces_registry_error() {
        let engine = engine();
        engine.declare("k", None, MergeStrategy::SourceGraph).unwrap();
        let err = engine.declare("k", None, MergeStrategy::SourceGraph).unwrap_err();
        assert!(matches!(err, EngineError::Registry(_)));
    }

    #[test]
    fn history_limit_flows_from_config() {
        let engine = ContextEngine::bootstrap(
            Arc::new(VariableRegistry::new()),
            EngineConfig::new().with_history_limit(1),
        )
        .unwrap();
        let token = engine.record_branch(None, EdgeKind::Solid);
        engine.resolve(&token, MergeKind::TimerFire).unwrap();
        engine.record_branch(Some(&token), EdgeKind::Dotted);
        engine.record_branch(Some(&token), EdgeKind::Dotted);
        assert_eq!(token.history().len(), 1);
    }
}
