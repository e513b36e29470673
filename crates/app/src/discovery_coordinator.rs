//! Discovery batch coordinator: turns a discovery job's candidates into
//! inventory certificates under bounded concurrency.
//!
//! Triggers are resolved once per batch. Each candidate then runs in its
//! own worker task and its own transaction:
//!
//! 1. pool slot, then stage permit
//! 2. parse the raw bytes
//! 3. exclusion phase, rows keyed by the candidate id
//! 4. excluded: complete the candidate and commit
//! 5. otherwise persist the certificate, back-fill the rows from step 3,
//!    run the action phase, save mutations, complete and commit
//! 6. after commit, record the public key and validate the certificate
//!
//! A failing candidate rolls back alone and is marked processed with its
//! error. A [`BatchFatalError`] stops the batch instead: candidates not yet
//! committed stay unprocessed and the error reaches the caller. Once every
//! task has joined, certificates sharing a public key are reconciled one
//! key at a time.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use futures::FutureExt;

use certflow_domain::certificate::Certificate;
use certflow_domain::discovery::{DiscoveryCertificate, DiscoveryStatus};
use certflow_domain::error::{
    BatchFatalError, CertflowError, ItemProcessingError, NotFoundError, ValidationError,
};
use certflow_domain::id::{CertificateId, DiscoveryCertificateId, DiscoveryId};
use certflow_domain::resource::{Resource, ResourceEvent};

use crate::event_processor::{EventContext, EventProcessor, ExclusionVerdict};
use crate::ports::{
    CertificateFactory, CertificateValidator, DiscoveryRepository, ItemStore, ItemTransaction,
    KeyRepository, TriggerRepository,
};
use crate::trigger_resolver::TriggerAssociationResolver;
use crate::worker_pool::{StageGate, WorkerPool};

/// Entry point for processing a finished discovery job.
pub trait BatchProcessor: Send + Sync {
    fn process_batch(
        &self,
        discovery_id: DiscoveryId,
    ) -> impl Future<Output = Result<BatchReport, CertflowError>> + Send;
}

/// Concurrency and progress settings for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Candidates in flight at once.
    pub pool_width: usize,
    /// Candidates inside the parse-evaluate-persist stage at once.
    pub stage_permits: usize,
    /// Update the job's progress every this many candidates.
    pub progress_interval: u64,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            pool_width: 16,
            stage_permits: 4,
            progress_interval: 10,
        }
    }
}

impl BatchLimits {
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroLimit`] when a limit is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pool_width == 0 {
            return Err(ValidationError::ZeroLimit("pool width"));
        }
        if self.stage_permits == 0 {
            return Err(ValidationError::ZeroLimit("stage permits"));
        }
        if self.progress_interval == 0 {
            return Err(ValidationError::ZeroLimit("progress interval"));
        }
        Ok(())
    }
}

/// What happened to a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub candidates: usize,
    /// Persisted as inventory certificates.
    pub accepted: usize,
    /// Stopped by an exclusion trigger.
    pub excluded: usize,
    /// Rolled back and marked processed with an error.
    pub failed: usize,
    /// Workers that panicked or were cancelled.
    pub interrupted: usize,
    /// Distinct public keys reconciled after the join.
    pub keys_reconciled: usize,
}

/// The collaborators a coordinator needs.
pub struct BatchPorts<R, D, K, S, F, V> {
    pub triggers: R,
    pub discoveries: D,
    pub keys: K,
    pub store: S,
    pub factory: F,
    pub validator: V,
}

/// Processes discovery batches.
pub struct DiscoveryBatchCoordinator<R, D, K, S, F, V> {
    resolver: TriggerAssociationResolver<R>,
    discoveries: Arc<D>,
    keys: K,
    store: Arc<S>,
    factory: Arc<F>,
    validator: Arc<V>,
    processor: Arc<EventProcessor<Certificate>>,
    limits: BatchLimits,
}

enum ItemOutcome {
    Accepted,
    Excluded,
    Failed,
    /// Not started because the batch was already aborting.
    Skipped,
    Aborted(BatchFatalError),
}

/// State shared by every worker of one batch.
struct Batch<D, S, F, V> {
    discovery_id: DiscoveryId,
    context: EventContext<Certificate>,
    processor: Arc<EventProcessor<Certificate>>,
    discoveries: Arc<D>,
    store: Arc<S>,
    factory: Arc<F>,
    validator: Arc<V>,
    keys: DashMap<String, Vec<CertificateId>>,
    processed: AtomicU64,
    total: u64,
    progress_interval: u64,
    interrupted: Mutex<Vec<DiscoveryCertificateId>>,
    aborted: AtomicBool,
}

/// Records the candidate as interrupted unless the worker completes.
struct InFlight<'a> {
    ledger: &'a Mutex<Vec<DiscoveryCertificateId>>,
    id: DiscoveryCertificateId,
    completed: bool,
}

impl InFlight<'_> {
    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.ledger
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(self.id);
        }
    }
}

impl<D, S, F, V> Batch<D, S, F, V>
where
    D: DiscoveryRepository + Send + Sync + 'static,
    S: ItemStore + 'static,
    F: CertificateFactory + 'static,
    V: CertificateValidator + 'static,
{
    async fn run_item(
        self: Arc<Self>,
        gate: StageGate,
        candidate: DiscoveryCertificate,
    ) -> ItemOutcome {
        let guard = InFlight {
            ledger: &self.interrupted,
            id: candidate.id,
            completed: false,
        };

        let permit = match gate.enter().await {
            Ok(permit) => permit,
            Err(_) if self.aborted.load(Ordering::SeqCst) => {
                guard.complete();
                return ItemOutcome::Skipped;
            }
            Err(err) => {
                guard.complete();
                return self.abort(err);
            }
        };
        if self.aborted.load(Ordering::SeqCst) {
            guard.complete();
            return ItemOutcome::Skipped;
        }
        let committed = self.transact(&candidate).await;
        drop(permit);

        let outcome = match committed {
            Ok(committed) => {
                guard.complete();
                match committed {
                    None => ItemOutcome::Excluded,
                    Some(certificate) => {
                        self.accept(&certificate).await;
                        ItemOutcome::Accepted
                    }
                }
            }
            Err(CertflowError::BatchFatal(err)) => {
                // Nothing was committed; the candidate waits for the next run.
                guard.complete();
                return self.abort(err);
            }
            Err(err) => {
                tracing::warn!(
                    candidate_id = %candidate.id,
                    error = %err,
                    "discovery candidate failed"
                );
                if let Err(mark) = self
                    .discoveries
                    .mark_processed(candidate.id, Some(err.to_string()))
                    .await
                {
                    tracing::error!(
                        candidate_id = %candidate.id,
                        error = %mark,
                        "cannot record candidate failure"
                    );
                }
                guard.complete();
                ItemOutcome::Failed
            }
        };

        self.advance_progress().await;
        outcome
    }

    fn abort(&self, err: BatchFatalError) -> ItemOutcome {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            tracing::error!(
                discovery_id = %self.discovery_id,
                error = %err,
                "aborting discovery batch"
            );
        }
        ItemOutcome::Aborted(err)
    }

    /// Run one candidate inside its own transaction.
    ///
    /// Returns the persisted certificate, or `None` when excluded.
    async fn transact(
        &self,
        candidate: &DiscoveryCertificate,
    ) -> Result<Option<Certificate>, CertflowError> {
        let mut tx = self.store.begin().await?;
        match self.pipeline(&mut tx, candidate).await {
            Ok(result) => {
                tx.commit().await?;
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(
                        candidate_id = %candidate.id,
                        error = %rollback,
                        "rollback failed"
                    );
                }
                Err(err)
            }
        }
    }

    async fn pipeline(
        &self,
        tx: &mut S::Tx,
        candidate: &DiscoveryCertificate,
    ) -> Result<Option<Certificate>, CertflowError> {
        let mut certificate = self.factory.create_entity(&candidate.content)?;
        for (key, value) in &candidate.metadata {
            certificate
                .metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        let reference = Some(candidate.id.as_uuid());
        let triggers = &self.context.triggers;
        let verdict = self
            .processor
            .check_exclusions(triggers, &certificate, reference, tx)
            .await?;
        if let ExclusionVerdict::Excluded(trigger_id) = verdict {
            tracing::debug!(candidate_id = %candidate.id, %trigger_id, "candidate excluded");
            tx.complete_candidate(candidate.id, None).await?;
            return Ok(None);
        }

        let mut certificate = tx.insert_certificate(certificate).await?;
        let Some(certificate_id) = certificate.id else {
            return Err(CertflowError::Storage(
                "certificate persisted without an id".into(),
            ));
        };
        tx.backfill_history_object(candidate.id.as_uuid(), certificate_id.as_uuid())
            .await?;

        let report = self
            .processor
            .apply_actions(triggers, &mut certificate, reference, tx)
            .await?;
        if report.performed {
            tx.update_certificate(&certificate).await?;
        }
        if let Some(failure) = report.failure {
            tracing::warn!(
                candidate_id = %candidate.id,
                %certificate_id,
                trigger_id = %failure.trigger_id,
                "certificate accepted with failed actions"
            );
        }

        tx.complete_candidate(candidate.id, Some(certificate_id))
            .await?;
        Ok(Some(certificate))
    }

    /// Work done once the candidate's transaction committed. Validation
    /// failures, panics included, are only logged.
    async fn accept(&self, certificate: &Certificate) {
        let Some(id) = certificate.id else {
            return;
        };
        self.keys
            .entry(certificate.public_key_fingerprint.clone())
            .or_default()
            .push(id);
        let validation = AssertUnwindSafe(async { self.validator.validate(certificate).await })
            .catch_unwind()
            .await;
        match validation {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(certificate_id = %id, error = %err, "certificate validation failed");
            }
            Err(_) => tracing::error!(certificate_id = %id, "certificate validator panicked"),
        }
    }

    async fn advance_progress(&self) {
        let done = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        if done % self.progress_interval != 0 {
            return;
        }
        if let Err(err) = self
            .discoveries
            .update_progress(self.discovery_id, done, self.total)
            .await
        {
            tracing::warn!(discovery_id = %self.discovery_id, error = %err, "cannot update progress");
        }
    }
}

impl<R, D, K, S, F, V> DiscoveryBatchCoordinator<R, D, K, S, F, V>
where
    R: TriggerRepository + Sync,
    D: DiscoveryRepository + Send + Sync + 'static,
    K: KeyRepository + Sync,
    S: ItemStore + 'static,
    F: CertificateFactory + 'static,
    V: CertificateValidator + 'static,
{
    /// Create a coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroLimit`] when a limit is zero.
    pub fn new(
        ports: BatchPorts<R, D, K, S, F, V>,
        processor: Arc<EventProcessor<Certificate>>,
        limits: BatchLimits,
    ) -> Result<Self, ValidationError> {
        limits.validate()?;
        Ok(Self {
            resolver: TriggerAssociationResolver::new(ports.triggers),
            discoveries: Arc::new(ports.discoveries),
            keys: ports.keys,
            store: Arc::new(ports.store),
            factory: Arc::new(ports.factory),
            validator: Arc::new(ports.validator),
            processor,
            limits,
        })
    }

    /// Process every unprocessed, newly discovered candidate of a job.
    ///
    /// Returns at once when there is nothing to do.
    ///
    /// # Errors
    ///
    /// Returns [`CertflowError::NotFound`] for an unknown job,
    /// [`CertflowError::BatchFatal`] when the worker pool shut down, and
    /// storage errors outside the per-candidate transactions.
    #[tracing::instrument(skip_all, fields(discovery_id = %discovery_id))]
    pub async fn run(&self, discovery_id: DiscoveryId) -> Result<BatchReport, CertflowError> {
        if self.discoveries.get_discovery(discovery_id).await?.is_none() {
            return Err(NotFoundError {
                entity: "Discovery",
                id: discovery_id.to_string(),
            }
            .into());
        }

        let candidates = self
            .discoveries
            .find_unprocessed_candidates(discovery_id)
            .await?;
        if candidates.is_empty() {
            tracing::debug!("no unprocessed candidates");
            return Ok(BatchReport::default());
        }

        let (already_processed, total) = self.progress_of(discovery_id).await?;
        let triggers = self
            .resolver
            .resolve(
                ResourceEvent::CertificateDiscovered,
                Resource::Discovery,
                Some(discovery_id.as_uuid()),
            )
            .await?;
        self.discoveries
            .set_status(discovery_id, DiscoveryStatus::Processing)
            .await?;

        let batch = Arc::new(Batch {
            discovery_id,
            context: EventContext::new(
                ResourceEvent::CertificateDiscovered,
                Resource::Discovery,
                triggers,
            ),
            processor: Arc::clone(&self.processor),
            discoveries: Arc::clone(&self.discoveries),
            store: Arc::clone(&self.store),
            factory: Arc::clone(&self.factory),
            validator: Arc::clone(&self.validator),
            keys: DashMap::new(),
            processed: AtomicU64::new(already_processed),
            total,
            progress_interval: self.limits.progress_interval,
            interrupted: Mutex::new(Vec::new()),
            aborted: AtomicBool::new(false),
        });
        tracing::info!(
            candidates = candidates.len(),
            triggers = batch.context.triggers.len(),
            "processing discovery batch"
        );

        let mut report = BatchReport {
            candidates: candidates.len(),
            ..BatchReport::default()
        };
        let mut fatal = None;
        let mut pool = WorkerPool::new(self.limits.pool_width, self.limits.stage_permits)?;
        for candidate in candidates {
            if batch.aborted.load(Ordering::SeqCst) {
                pool.close();
                break;
            }
            let batch = Arc::clone(&batch);
            if let Err(err) = pool
                .spawn(move |gate| batch.run_item(gate, candidate))
                .await
            {
                fatal = Some(err);
                break;
            }
        }

        let joined = pool.join().await;
        report.interrupted = joined.interrupted;
        for outcome in joined.outputs {
            match outcome {
                ItemOutcome::Accepted => report.accepted += 1,
                ItemOutcome::Excluded => report.excluded += 1,
                ItemOutcome::Failed => report.failed += 1,
                ItemOutcome::Skipped => {}
                ItemOutcome::Aborted(err) => {
                    fatal.get_or_insert(err);
                }
            }
        }

        let interrupted = std::mem::take(
            &mut *batch
                .interrupted
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for id in interrupted {
            self.discoveries
                .mark_interrupted(id, ItemProcessingError::Interrupted.to_string())
                .await?;
        }

        if let Some(err) = fatal {
            self.discoveries
                .set_status(discovery_id, DiscoveryStatus::Failed)
                .await?;
            return Err(err.into());
        }

        report.keys_reconciled = self.reconcile_keys(&batch.keys).await?;

        let (finished, total) = self.progress_of(discovery_id).await?;
        self.discoveries
            .update_progress(discovery_id, finished, total)
            .await?;
        self.discoveries
            .set_status(discovery_id, DiscoveryStatus::Completed)
            .await?;

        tracing::info!(
            accepted = report.accepted,
            excluded = report.excluded,
            failed = report.failed,
            interrupted = report.interrupted,
            "discovery batch finished"
        );
        Ok(report)
    }

    /// Processed and total newly discovered candidates of a job, across
    /// every run so far.
    async fn progress_of(&self, discovery_id: DiscoveryId) -> Result<(u64, u64), CertflowError> {
        let candidates = self.discoveries.find_candidates(discovery_id).await?;
        let (processed, total) = candidates
            .iter()
            .filter(|candidate| candidate.newly_discovered)
            .fold((0_u64, 0_u64), |(processed, total), candidate| {
                (processed + u64::from(candidate.processed), total + 1)
            });
        Ok((processed, total))
    }

    /// One serialized pass per distinct public key, in key order.
    async fn reconcile_keys(
        &self,
        keys: &DashMap<String, Vec<CertificateId>>,
    ) -> Result<usize, CertflowError> {
        let mut entries: Vec<(String, Vec<CertificateId>)> = keys
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (fingerprint, mut ids) in entries.iter().cloned() {
            ids.sort_unstable();
            let key = self.keys.reconcile(&fingerprint, &ids).await?;
            tracing::debug!(key_id = %key.id, certificates = ids.len(), "reconciled key");
        }
        Ok(entries.len())
    }
}

impl<R, D, K, S, F, V> BatchProcessor for DiscoveryBatchCoordinator<R, D, K, S, F, V>
where
    R: TriggerRepository + Send + Sync,
    D: DiscoveryRepository + Send + Sync + 'static,
    K: KeyRepository + Send + Sync,
    S: ItemStore + 'static,
    F: CertificateFactory + 'static,
    V: CertificateValidator + 'static,
{
    fn process_batch(
        &self,
        discovery_id: DiscoveryId,
    ) -> impl Future<Output = Result<BatchReport, CertflowError>> + Send {
        self.run(discovery_id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use certflow_domain::action::{Action, Execution, ExecutionItem};
    use certflow_domain::discovery::progress_message;
    use certflow_domain::trigger::TriggerKind;
    use serde_json::json;

    use super::*;
    use crate::action_executor::{ActionExecutor, ActionRegistry};
    use crate::ports::AcceptAll;
    use crate::test_support::{
        InMemoryPlatform, InMemoryTriggerRepo, RecordingSideEffect, RecordingValidator,
        TextCertificateFactory, action_trigger, exclusion_trigger,
    };

    type Coordinator<V> = DiscoveryBatchCoordinator<
        InMemoryTriggerRepo,
        InMemoryPlatform,
        InMemoryPlatform,
        InMemoryPlatform,
        TextCertificateFactory,
        V,
    >;

    fn processor() -> Arc<EventProcessor<Certificate>> {
        Arc::new(EventProcessor::new(ActionExecutor::new(ActionRegistry::new())))
    }

    fn coordinator_with<V: CertificateValidator + 'static>(
        triggers: InMemoryTriggerRepo,
        platform: &InMemoryPlatform,
        validator: V,
        processor: Arc<EventProcessor<Certificate>>,
        limits: BatchLimits,
    ) -> Coordinator<V> {
        DiscoveryBatchCoordinator::new(
            BatchPorts {
                triggers,
                discoveries: platform.clone(),
                keys: platform.clone(),
                store: platform.clone(),
                factory: TextCertificateFactory,
                validator,
            },
            processor,
            limits,
        )
        .unwrap()
    }

    fn coordinator(triggers: InMemoryTriggerRepo, platform: &InMemoryPlatform) -> Coordinator<AcceptAll> {
        coordinator_with(triggers, platform, AcceptAll, processor(), BatchLimits::default())
    }

    /// T1 excludes CNs containing "test"; T2 puts CNs containing "prod"
    /// into the Production group.
    fn scenario_triggers(discovery_id: DiscoveryId) -> InMemoryTriggerRepo {
        let triggers = InMemoryTriggerRepo::default();
        let event = ResourceEvent::CertificateDiscovered;
        triggers.bind(
            &exclusion_trigger("T1", "common_name", "test"),
            event,
            Resource::Discovery,
            Some(discovery_id.as_uuid()),
            TriggerKind::Exclusion,
        );
        triggers.bind(
            &action_trigger("T2", "common_name", "prod", "group", "Production"),
            event,
            Resource::Discovery,
            Some(discovery_id.as_uuid()),
            TriggerKind::Action { order: 0 },
        );
        triggers
    }

    #[tokio::test]
    async fn should_exclude_and_accept_candidates_of_a_batch() {
        let platform = InMemoryPlatform::default();
        let (discovery_id, ids) =
            platform.seed("scan", &["cert:test.example.com", "cert:prod.example.com"]);
        let coordinator = coordinator(scenario_triggers(discovery_id), &platform);

        let report = coordinator.process_batch(discovery_id).await.unwrap();

        assert_eq!(report.candidates, 2);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.failed, 0);

        let state = platform.state();
        assert_eq!(state.certificates.len(), 1);
        assert!(state.certificate_named("test.example.com").is_none());
        let prod = state.certificate_named("prod.example.com").unwrap();
        assert_eq!(prod.group.as_deref(), Some("Production"));
        let prod_uuid = prod.id.unwrap().as_uuid();

        let excluded = state.candidate(ids[0]);
        assert!(excluded.processed);
        assert!(excluded.certificate_id.is_none());
        let excluded_rows = state.rows_for_reference(ids[0].as_uuid());
        assert_eq!(excluded_rows.len(), 1);
        assert!(excluded_rows[0].conditions_matched);
        assert!(excluded_rows[0].object_uuid.is_none());

        let accepted = state.candidate(ids[1]);
        assert!(accepted.processed);
        assert_eq!(accepted.certificate_id, prod.id);
        let accepted_rows = state.rows_for_reference(ids[1].as_uuid());
        assert_eq!(accepted_rows.len(), 2);
        assert!(accepted_rows.iter().all(|row| row.object_uuid == Some(prod_uuid)));
        assert!(!accepted_rows[0].conditions_matched);
        assert!(accepted_rows[1].actions_performed);

        let discovery = &state.discoveries[&discovery_id];
        assert_eq!(discovery.status, DiscoveryStatus::Completed);
        assert_eq!(discovery.processed_certificates, 2);
        assert_eq!(
            discovery.message.as_deref(),
            Some("Processed 2 of 2 discovered certificates")
        );
    }

    #[tokio::test]
    async fn should_do_nothing_on_second_run() {
        let platform = InMemoryPlatform::default();
        let (discovery_id, _) =
            platform.seed("scan", &["cert:test.example.com", "cert:prod.example.com"]);
        let coordinator = coordinator(scenario_triggers(discovery_id), &platform);
        coordinator.process_batch(discovery_id).await.unwrap();
        let rows = platform.state().history.len();

        let report = coordinator.process_batch(discovery_id).await.unwrap();

        assert_eq!(report, BatchReport::default());
        assert_eq!(platform.state().history.len(), rows);
        assert_eq!(platform.state().certificates.len(), 1);
    }

    #[tokio::test]
    async fn should_isolate_failing_candidates() {
        let platform = InMemoryPlatform::default().failing_insert("broken.example.com");
        let (discovery_id, ids) = platform.seed(
            "scan",
            &["cert:prod.example.com", "garbage", "cert:broken.example.com"],
        );
        let coordinator = coordinator(scenario_triggers(discovery_id), &platform);

        let report = coordinator.process_batch(discovery_id).await.unwrap();

        assert_eq!(report.accepted, 1);
        assert_eq!(report.failed, 2);
        let state = platform.state();
        assert_eq!(state.certificates.len(), 1);
        assert!(state.certificate_named("prod.example.com").is_some());

        let garbage = state.candidate(ids[1]);
        assert!(garbage.processed);
        assert!(garbage.processed_error.as_deref().unwrap().contains("not a certificate"));

        let broken = state.candidate(ids[2]);
        assert!(broken.processed);
        assert!(broken.processed_error.as_deref().unwrap().contains("disk full"));
        assert!(state.rows_for_reference(ids[2].as_uuid()).is_empty());
        assert_eq!(state.discoveries[&discovery_id].status, DiscoveryStatus::Completed);
    }

    #[tokio::test]
    async fn should_keep_certificate_when_actions_fail() {
        let platform = InMemoryPlatform::default();
        let (discovery_id, ids) = platform.seed("scan", &["cert:prod.example.com"]);
        let triggers = InMemoryTriggerRepo::default();
        let mut notify = action_trigger("notify", "common_name", "prod", "group", "x");
        notify.actions = vec![Action::new("notify", Resource::Certificate).execution(
            Execution::new("notify").item(ExecutionItem::invoke("notification_profile", json!("ops"))),
        )];
        triggers.bind(
            &notify,
            ResourceEvent::CertificateDiscovered,
            Resource::Discovery,
            None,
            TriggerKind::Action { order: 0 },
        );
        let processor = Arc::new(EventProcessor::new(ActionExecutor::new(
            ActionRegistry::<Certificate>::new().side_effect(
                "notification_profile",
                Arc::new(RecordingSideEffect::failing("profile not found")),
            ),
        )));
        let coordinator =
            coordinator_with(triggers, &platform, AcceptAll, processor, BatchLimits::default());

        let report = coordinator.process_batch(discovery_id).await.unwrap();

        assert_eq!(report.accepted, 1);
        let state = platform.state();
        assert!(state.candidate(ids[0]).processed_error.is_none());
        let rows = state.rows_for_reference(ids[0].as_uuid());
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].actions_performed);
        assert!(rows[0].message.as_deref().unwrap().contains("profile not found"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_bound_concurrent_item_transactions() {
        let platform = InMemoryPlatform::default().holding(Duration::from_millis(5));
        let contents: Vec<String> = (0..12).map(|n| format!("cert:host{n}.example.com")).collect();
        let contents: Vec<&str> = contents.iter().map(String::as_str).collect();
        let (discovery_id, _) = platform.seed("scan", &contents);
        let limits = BatchLimits {
            pool_width: 6,
            stage_permits: 2,
            progress_interval: 4,
        };
        let coordinator = coordinator_with(
            InMemoryTriggerRepo::default(),
            &platform,
            AcceptAll,
            processor(),
            limits,
        );

        let report = coordinator.process_batch(discovery_id).await.unwrap();

        assert_eq!(report.accepted, 12);
        assert!(platform.peak_open() <= 2, "peak was {}", platform.peak_open());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_only_move_progress_forward() {
        let platform = InMemoryPlatform::default();
        let contents: Vec<String> = (0..25).map(|n| format!("cert:host{n}.example.com")).collect();
        let contents: Vec<&str> = contents.iter().map(String::as_str).collect();
        let (discovery_id, _) = platform.seed("scan", &contents);
        let limits = BatchLimits {
            pool_width: 8,
            stage_permits: 4,
            progress_interval: 5,
        };
        let coordinator = coordinator_with(
            InMemoryTriggerRepo::default(),
            &platform,
            AcceptAll,
            processor(),
            limits,
        );

        coordinator.process_batch(discovery_id).await.unwrap();

        let state = platform.state();
        assert!(state.progress.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(state.progress.last(), Some(&25));
        assert_eq!(state.discoveries[&discovery_id].processed_certificates, 25);
    }

    #[tokio::test]
    async fn should_reconcile_each_public_key_once() {
        let platform = InMemoryPlatform::default();
        let (discovery_id, _) = platform.seed(
            "scan",
            &["cert:a.example.com|pk-a", "cert:b.example.com|pk-a", "cert:c.example.com|pk-a", "cert:d.example.com|pk-b"],
        );
        let validator = Arc::new(RecordingValidator::default());
        let coordinator = coordinator_with(
            InMemoryTriggerRepo::default(),
            &platform,
            validator.clone(),
            processor(),
            BatchLimits::default(),
        );

        let report = coordinator.process_batch(discovery_id).await.unwrap();

        assert_eq!(report.accepted, 4);
        assert_eq!(report.keys_reconciled, 2);
        let state = platform.state();
        assert_eq!(state.keys.len(), 2);
        let shared = &state.keys["pk-a"];
        assert_eq!(shared.certificate_ids.len(), 3);
        assert!(
            state
                .certificates
                .values()
                .filter(|c| c.public_key_fingerprint == "pk-a")
                .all(|c| c.key_id == Some(shared.id))
        );
        assert_eq!(
            validator.seen(),
            ["a.example.com", "b.example.com", "c.example.com", "d.example.com"]
        );
    }

    #[tokio::test]
    async fn should_leave_interrupted_candidate_unprocessed() {
        let platform = InMemoryPlatform::default();
        let (discovery_id, ids) = platform.seed("scan", &["panic", "cert:prod.example.com"]);
        let coordinator = coordinator(InMemoryTriggerRepo::default(), &platform);

        let report = coordinator.process_batch(discovery_id).await.unwrap();

        assert_eq!(report.interrupted, 1);
        assert_eq!(report.accepted, 1);
        let state = platform.state();
        let interrupted = state.candidate(ids[0]);
        assert!(!interrupted.processed);
        assert_eq!(interrupted.processed_error.as_deref(), Some("processing interrupted"));
        assert!(state.candidate(ids[1]).processed);
    }

    #[tokio::test]
    async fn should_abort_batch_when_storage_is_exhausted() {
        let platform = InMemoryPlatform::default().exhausted();
        let (discovery_id, ids) = platform.seed(
            "scan",
            &["cert:prod.example.com", "cert:api.example.com"],
        );
        let coordinator = coordinator(InMemoryTriggerRepo::default(), &platform);

        let result = coordinator.process_batch(discovery_id).await;

        assert!(matches!(
            result,
            Err(CertflowError::BatchFatal(BatchFatalError::StorageExhausted(_)))
        ));
        let state = platform.state();
        for id in ids {
            let candidate = state.candidate(id);
            assert!(!candidate.processed);
            assert!(candidate.processed_error.is_none());
        }
        assert!(state.certificates.is_empty());
        assert_eq!(
            state.discoveries[&discovery_id].status,
            DiscoveryStatus::Failed
        );
    }

    #[tokio::test]
    async fn should_bring_progress_to_final_value_after_retry() {
        let platform = InMemoryPlatform::default();
        let (discovery_id, ids) = platform.seed(
            "scan",
            &["panic", "cert:a.example.com", "cert:b.example.com"],
        );
        let coordinator = coordinator(InMemoryTriggerRepo::default(), &platform);

        coordinator.process_batch(discovery_id).await.unwrap();
        assert_eq!(platform.state().discoveries[&discovery_id].processed_certificates, 2);

        platform
            .state()
            .candidates
            .iter_mut()
            .find(|c| c.id == ids[0])
            .unwrap()
            .content = b"cert:c.example.com".to_vec();
        let report = coordinator.process_batch(discovery_id).await.unwrap();

        assert_eq!(report.candidates, 1);
        assert_eq!(report.accepted, 1);
        let state = platform.state();
        let job = &state.discoveries[&discovery_id];
        assert_eq!(job.processed_certificates, 3);
        assert_eq!(job.total_certificates_discovered, 3);
        assert_eq!(job.message.as_deref(), Some(progress_message(3, 3).as_str()));
        assert_eq!(job.status, DiscoveryStatus::Completed);
    }

    struct PanickingValidator;

    impl CertificateValidator for PanickingValidator {
        async fn validate(&self, _certificate: &Certificate) -> Result<(), CertflowError> {
            panic!("validator blew up");
        }
    }

    #[tokio::test]
    async fn should_keep_committed_candidate_when_validator_panics() {
        let platform = InMemoryPlatform::default();
        let (discovery_id, ids) = platform.seed("scan", &["cert:prod.example.com"]);
        let coordinator = coordinator_with(
            InMemoryTriggerRepo::default(),
            &platform,
            PanickingValidator,
            processor(),
            BatchLimits::default(),
        );

        let report = coordinator.process_batch(discovery_id).await.unwrap();

        assert_eq!(report.accepted, 1);
        assert_eq!(report.interrupted, 0);
        {
            let state = platform.state();
            let candidate = state.candidate(ids[0]);
            assert!(candidate.processed);
            assert!(candidate.certificate_id.is_some());
            assert!(candidate.processed_error.is_none());
            assert_eq!(state.certificates.len(), 1);
        }

        let second = coordinator.process_batch(discovery_id).await.unwrap();
        assert_eq!(second, BatchReport::default());
        assert_eq!(platform.state().certificates.len(), 1);
    }

    #[tokio::test]
    async fn should_fail_for_unknown_discovery() {
        let platform = InMemoryPlatform::default();
        let coordinator = coordinator(InMemoryTriggerRepo::default(), &platform);
        let result = coordinator.process_batch(DiscoveryId::new()).await;
        assert!(matches!(result, Err(CertflowError::NotFound(_))));
    }

    #[test]
    fn should_reject_zero_progress_interval() {
        let limits = BatchLimits {
            progress_interval: 0,
            ..BatchLimits::default()
        };
        assert_eq!(
            limits.validate(),
            Err(ValidationError::ZeroLimit("progress interval"))
        );
    }
}
