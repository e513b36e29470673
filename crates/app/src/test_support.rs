//! In-memory port implementations and fixtures shared by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::json;

use certflow_domain::action::{Action, Execution, ExecutionItem};
use certflow_domain::certificate::{Certificate, CertificateState};
use certflow_domain::discovery::{
    DiscoveryCertificate, DiscoveryHistory, DiscoveryStatus, progress_message,
};
use certflow_domain::error::{
    BatchFatalError, CertflowError, ItemProcessingError, ResolutionError,
};
use certflow_domain::id::{CertificateId, DiscoveryCertificateId, DiscoveryId, TriggerId};
use certflow_domain::key::CryptographicKey;
use certflow_domain::resource::{Resource, ResourceEvent};
use certflow_domain::rule::{Condition, ConditionItem, FilterOperator, Rule};
use certflow_domain::trigger::{Trigger, TriggerAssociation, TriggerHistory, TriggerKind};

use crate::ports::{
    CertificateFactory, CertificateRepository, CertificateValidator, DiscoveryRepository,
    HistorySink, ItemStore, ItemTransaction, KeyRepository, SideEffect, SideEffectCall,
    TriggerHistoryRepository, TriggerRepository,
};

/// An unpersisted certificate expiring in 30 days.
pub(crate) fn certificate(common_name: &str) -> Certificate {
    let now = Utc::now();
    Certificate {
        id: None,
        common_name: common_name.to_string(),
        subject_dn: format!("CN={common_name}"),
        issuer_dn: "CN=Certflow Test CA".to_string(),
        serial_number: "01".to_string(),
        fingerprint: format!("fp-{common_name}"),
        public_key_fingerprint: "pk-shared".to_string(),
        not_before: now - chrono::Duration::days(1),
        not_after: now + chrono::Duration::days(30),
        subject_alternative_names: vec![common_name.to_string()],
        key_algorithm: "EC".to_string(),
        group: None,
        owner: None,
        state: CertificateState::Issued,
        metadata: BTreeMap::new(),
        custom_attributes: BTreeMap::new(),
        key_id: None,
    }
}

fn contains_rule(field: &str, text: &str) -> Rule {
    Rule::new(format!("{field} contains {text}"), Resource::Certificate).condition(
        Condition::new(field).item(ConditionItem::property(
            field,
            FilterOperator::Contains,
            json!(text),
        )),
    )
}

/// `field CONTAINS text` → set `set_field` to `set_value`.
pub(crate) fn action_trigger(
    name: &str,
    field: &str,
    text: &str,
    set_field: &str,
    set_value: &str,
) -> Trigger {
    Trigger::builder()
        .name(name)
        .rule(contains_rule(field, text))
        .action(
            Action::new(format!("set {set_field}"), Resource::Certificate).execution(
                Execution::new(set_field)
                    .item(ExecutionItem::set_property(set_field, json!(set_value))),
            ),
        )
        .build()
        .unwrap()
}

/// Ignore objects whose `field` contains `text`.
pub(crate) fn exclusion_trigger(name: &str, field: &str, text: &str) -> Trigger {
    Trigger::builder()
        .name(name)
        .ignore_object(true)
        .rule(contains_rule(field, text))
        .build()
        .unwrap()
}

#[derive(Default)]
pub(crate) struct InMemoryTriggerRepo {
    triggers: Mutex<HashMap<TriggerId, Trigger>>,
    associations: Mutex<Vec<TriggerAssociation>>,
    failures: Mutex<HashMap<TriggerId, ResolutionError>>,
}

impl InMemoryTriggerRepo {
    /// Store `trigger` and associate it, in creation order.
    pub(crate) fn bind(
        &self,
        trigger: &Trigger,
        event: ResourceEvent,
        resource: Resource,
        object_uuid: Option<uuid::Uuid>,
        kind: TriggerKind,
    ) {
        self.triggers
            .lock()
            .unwrap()
            .insert(trigger.id, trigger.clone());
        self.associations.lock().unwrap().push(TriggerAssociation::new(
            trigger.id,
            event,
            resource,
            object_uuid,
            kind,
        ));
    }

    /// Associate a trigger id that was never stored.
    pub(crate) fn associate_missing(&self, id: TriggerId, event: ResourceEvent, resource: Resource) {
        self.associations.lock().unwrap().push(TriggerAssociation::new(
            id,
            event,
            resource,
            None,
            TriggerKind::Action { order: 0 },
        ));
    }

    /// Make loading `id` fail with `error`.
    pub(crate) fn fail_with(&self, id: TriggerId, error: ResolutionError) {
        self.failures.lock().unwrap().insert(id, error);
    }
}

impl TriggerRepository for InMemoryTriggerRepo {
    fn create_trigger(
        &self,
        trigger: Trigger,
    ) -> impl Future<Output = Result<Trigger, CertflowError>> + Send {
        self.triggers
            .lock()
            .unwrap()
            .insert(trigger.id, trigger.clone());
        async { Ok(trigger) }
    }

    fn get_trigger(
        &self,
        id: TriggerId,
    ) -> impl Future<Output = Result<Option<Trigger>, CertflowError>> + Send {
        let result = match self.failures.lock().unwrap().get(&id) {
            Some(err) => Err(err.clone().into()),
            None => Ok(self.triggers.lock().unwrap().get(&id).cloned()),
        };
        async { result }
    }

    fn create_association(
        &self,
        association: TriggerAssociation,
    ) -> impl Future<Output = Result<TriggerAssociation, CertflowError>> + Send {
        self.associations.lock().unwrap().push(association.clone());
        async { Ok(association) }
    }

    fn find_associations(
        &self,
        event: ResourceEvent,
        resource: Resource,
        object_uuid: Option<uuid::Uuid>,
    ) -> impl Future<Output = Result<Vec<TriggerAssociation>, CertflowError>> + Send {
        let result: Vec<TriggerAssociation> = self
            .associations
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.applies_to(event, resource, object_uuid))
            .cloned()
            .collect();
        async { Ok(result) }
    }
}

#[derive(Default)]
pub(crate) struct InMemoryHistoryRepo {
    rows: Mutex<Vec<TriggerHistory>>,
}

impl TriggerHistoryRepository for InMemoryHistoryRepo {
    fn append(
        &self,
        history: TriggerHistory,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send {
        self.rows.lock().unwrap().push(history);
        async { Ok(()) }
    }

    fn find_by_object(
        &self,
        object_uuid: uuid::Uuid,
    ) -> impl Future<Output = Result<Vec<TriggerHistory>, CertflowError>> + Send {
        let result: Vec<TriggerHistory> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.object_uuid == Some(object_uuid))
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn find_by_reference_object(
        &self,
        reference_uuid: uuid::Uuid,
    ) -> impl Future<Output = Result<Vec<TriggerHistory>, CertflowError>> + Send {
        let result: Vec<TriggerHistory> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.reference_object_uuid == Some(reference_uuid))
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn backfill_object(
        &self,
        reference_uuid: uuid::Uuid,
        object_uuid: uuid::Uuid,
    ) -> impl Future<Output = Result<u64, CertflowError>> + Send {
        let updated = backfill(&mut self.rows.lock().unwrap(), reference_uuid, object_uuid);
        async move { Ok(updated) }
    }
}

fn backfill(rows: &mut [TriggerHistory], reference_uuid: uuid::Uuid, object_uuid: uuid::Uuid) -> u64 {
    let mut updated = 0;
    for row in rows
        .iter_mut()
        .filter(|row| row.reference_object_uuid == Some(reference_uuid) && row.object_uuid.is_none())
    {
        row.object_uuid = Some(object_uuid);
        updated += 1;
    }
    updated
}

#[derive(Default)]
pub(crate) struct InMemoryCertificateRepo {
    store: Mutex<HashMap<CertificateId, Certificate>>,
}

impl CertificateRepository for InMemoryCertificateRepo {
    fn create(
        &self,
        mut certificate: Certificate,
    ) -> impl Future<Output = Result<Certificate, CertflowError>> + Send {
        let id = *certificate.id.get_or_insert_with(CertificateId::new);
        self.store.lock().unwrap().insert(id, certificate.clone());
        async { Ok(certificate) }
    }

    fn get_by_id(
        &self,
        id: CertificateId,
    ) -> impl Future<Output = Result<Option<Certificate>, CertflowError>> + Send {
        let result = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn update(
        &self,
        certificate: Certificate,
    ) -> impl Future<Output = Result<Certificate, CertflowError>> + Send {
        if let Some(id) = certificate.id {
            self.store.lock().unwrap().insert(id, certificate.clone());
        }
        async { Ok(certificate) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Certificate>, CertflowError>> + Send {
        let result: Vec<Certificate> = self.store.lock().unwrap().values().cloned().collect();
        async { Ok(result) }
    }
}

/// Side effect that records its calls.
#[derive(Default)]
pub(crate) struct RecordingSideEffect {
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    failure: Option<String>,
}

impl RecordingSideEffect {
    pub(crate) fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// `(object name, data)` per call.
    pub(crate) fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

impl SideEffect for RecordingSideEffect {
    fn invoke<'a>(&'a self, call: SideEffectCall<'a>) -> BoxFuture<'a, Result<String, CertflowError>> {
        self.calls
            .lock()
            .unwrap()
            .push((call.object_name.to_string(), call.data.clone()));
        let result = match &self.failure {
            Some(reason) => Err(CertflowError::Storage(reason.clone().into())),
            None => Ok(format!(
                "bound {}",
                call.data.as_str().unwrap_or("profile")
            )),
        };
        async move { result }.boxed()
    }
}

/// Reads candidates written as `cert:<cn>` or `cert:<cn>|<public key>`;
/// `panic` makes the worker panic.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TextCertificateFactory;

impl CertificateFactory for TextCertificateFactory {
    fn create_entity(&self, content: &[u8]) -> Result<Certificate, CertflowError> {
        let text = String::from_utf8_lossy(content);
        assert!(text != "panic", "factory blew up on purpose");
        let Some(body) = text.strip_prefix("cert:") else {
            return Err(ItemProcessingError::Parse(format!("not a certificate: {text}")).into());
        };
        let (cn, key) = body.split_once('|').unwrap_or((body, "pk-shared"));
        let mut cert = certificate(cn);
        cert.public_key_fingerprint = key.to_string();
        Ok(cert)
    }
}

/// Validator that records what it saw.
#[derive(Default)]
pub(crate) struct RecordingValidator {
    seen: Mutex<Vec<String>>,
}

impl RecordingValidator {
    pub(crate) fn seen(&self) -> Vec<String> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort();
        seen
    }
}

impl CertificateValidator for Arc<RecordingValidator> {
    fn validate(
        &self,
        certificate: &Certificate,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send {
        self.seen
            .lock()
            .unwrap()
            .push(certificate.common_name.clone());
        async { Err(CertflowError::Storage("chain incomplete".into())) }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PlatformState {
    pub(crate) certificates: HashMap<CertificateId, Certificate>,
    pub(crate) history: Vec<TriggerHistory>,
    pub(crate) discoveries: HashMap<DiscoveryId, DiscoveryHistory>,
    pub(crate) candidates: Vec<DiscoveryCertificate>,
    pub(crate) keys: BTreeMap<String, CryptographicKey>,
    /// Every progress value that was accepted, in write order.
    pub(crate) progress: Vec<u64>,
}

impl PlatformState {
    pub(crate) fn candidate(&self, id: DiscoveryCertificateId) -> &DiscoveryCertificate {
        self.candidates.iter().find(|c| c.id == id).unwrap()
    }

    pub(crate) fn certificate_named(&self, cn: &str) -> Option<&Certificate> {
        self.certificates.values().find(|c| c.common_name == cn)
    }

    pub(crate) fn rows_for_reference(&self, reference: uuid::Uuid) -> Vec<&TriggerHistory> {
        self.history
            .iter()
            .filter(|row| row.reference_object_uuid == Some(reference))
            .collect()
    }
}

/// Discovery, key and item storage over one shared in-memory state.
///
/// Transactions buffer their writes and apply them on commit.
#[derive(Clone, Default)]
pub(crate) struct InMemoryPlatform {
    state: Arc<Mutex<PlatformState>>,
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    hold: Duration,
    failing_insert: Option<String>,
    exhausted: bool,
}

impl InMemoryPlatform {
    /// Keep each transaction open for `hold` before committing.
    pub(crate) fn holding(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Fail inserting the certificate with this common name.
    pub(crate) fn failing_insert(mut self, cn: &str) -> Self {
        self.failing_insert = Some(cn.to_string());
        self
    }

    /// Refuse every transaction as if no connection were left.
    pub(crate) fn exhausted(mut self) -> Self {
        self.exhausted = true;
        self
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap()
    }

    /// Most transactions open at once.
    pub(crate) fn peak_open(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn seed(&self, name: &str, contents: &[&str]) -> (DiscoveryId, Vec<DiscoveryCertificateId>) {
        let discovery = DiscoveryHistory::new(name);
        let discovery_id = discovery.id;
        let mut state = self.state();
        state.discoveries.insert(discovery_id, discovery);
        let ids = contents
            .iter()
            .map(|content| {
                let candidate = DiscoveryCertificate::new(discovery_id, content.as_bytes());
                let id = candidate.id;
                state.candidates.push(candidate);
                id
            })
            .collect();
        (discovery_id, ids)
    }
}

impl DiscoveryRepository for InMemoryPlatform {
    fn create_discovery(
        &self,
        discovery: DiscoveryHistory,
    ) -> impl Future<Output = Result<DiscoveryHistory, CertflowError>> + Send {
        self.state()
            .discoveries
            .insert(discovery.id, discovery.clone());
        async { Ok(discovery) }
    }

    fn get_discovery(
        &self,
        id: DiscoveryId,
    ) -> impl Future<Output = Result<Option<DiscoveryHistory>, CertflowError>> + Send {
        let result = self.state().discoveries.get(&id).cloned();
        async { Ok(result) }
    }

    fn add_candidate(
        &self,
        candidate: DiscoveryCertificate,
    ) -> impl Future<Output = Result<DiscoveryCertificate, CertflowError>> + Send {
        self.state().candidates.push(candidate.clone());
        async { Ok(candidate) }
    }

    fn find_unprocessed_candidates(
        &self,
        discovery_id: DiscoveryId,
    ) -> impl Future<Output = Result<Vec<DiscoveryCertificate>, CertflowError>> + Send {
        let result: Vec<DiscoveryCertificate> = self
            .state()
            .candidates
            .iter()
            .filter(|c| c.discovery_id == discovery_id && c.newly_discovered && !c.processed)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn find_candidates(
        &self,
        discovery_id: DiscoveryId,
    ) -> impl Future<Output = Result<Vec<DiscoveryCertificate>, CertflowError>> + Send {
        let result: Vec<DiscoveryCertificate> = self
            .state()
            .candidates
            .iter()
            .filter(|c| c.discovery_id == discovery_id)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn mark_processed(
        &self,
        id: DiscoveryCertificateId,
        error: Option<String>,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send {
        if let Some(candidate) = self.state().candidates.iter_mut().find(|c| c.id == id) {
            candidate.processed = true;
            candidate.processed_error = error;
        }
        async { Ok(()) }
    }

    fn mark_interrupted(
        &self,
        id: DiscoveryCertificateId,
        reason: String,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send {
        if let Some(candidate) = self.state().candidates.iter_mut().find(|c| c.id == id) {
            candidate.processed = false;
            candidate.processed_error = Some(reason);
        }
        async { Ok(()) }
    }

    fn update_progress(
        &self,
        id: DiscoveryId,
        processed: u64,
        total: u64,
    ) -> impl Future<Output = Result<bool, CertflowError>> + Send {
        let mut state = self.state();
        let changed = match state.discoveries.get_mut(&id) {
            Some(discovery) if processed > discovery.processed_certificates => {
                discovery.processed_certificates = processed;
                discovery.total_certificates_discovered = total;
                discovery.message = Some(progress_message(processed, total));
                true
            }
            _ => false,
        };
        if changed {
            state.progress.push(processed);
        }
        async move { Ok(changed) }
    }

    fn set_status(
        &self,
        id: DiscoveryId,
        status: DiscoveryStatus,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send {
        if let Some(discovery) = self.state().discoveries.get_mut(&id) {
            discovery.status = status;
        }
        async { Ok(()) }
    }
}

impl KeyRepository for InMemoryPlatform {
    fn reconcile(
        &self,
        public_key_fingerprint: &str,
        certificate_ids: &[CertificateId],
    ) -> impl Future<Output = Result<CryptographicKey, CertflowError>> + Send {
        let mut state = self.state();
        let key = state
            .keys
            .entry(public_key_fingerprint.to_string())
            .or_insert_with(|| CryptographicKey::new(public_key_fingerprint));
        key.link(certificate_ids);
        let key = key.clone();
        for id in certificate_ids {
            if let Some(cert) = state.certificates.get_mut(id) {
                cert.key_id = Some(key.id);
            }
        }
        async { Ok(key) }
    }

    fn get_by_fingerprint(
        &self,
        public_key_fingerprint: &str,
    ) -> impl Future<Output = Result<Option<CryptographicKey>, CertflowError>> + Send {
        let result = self.state().keys.get(public_key_fingerprint).cloned();
        async { Ok(result) }
    }
}

impl ItemStore for InMemoryPlatform {
    type Tx = InMemoryTx;

    fn begin(&self) -> impl Future<Output = Result<InMemoryTx, CertflowError>> + Send {
        if self.exhausted {
            let err = BatchFatalError::StorageExhausted("pool timed out".into());
            return futures::future::ready(Err(err.into())).left_future();
        }
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        let tx = InMemoryTx {
            platform: self.clone(),
            certificates: Vec::new(),
            history: Vec::new(),
            completed: Vec::new(),
            finished: false,
        };
        futures::future::ready(Ok(tx)).right_future()
    }
}

pub(crate) struct InMemoryTx {
    platform: InMemoryPlatform,
    certificates: Vec<Certificate>,
    history: Vec<TriggerHistory>,
    completed: Vec<(DiscoveryCertificateId, Option<CertificateId>)>,
    finished: bool,
}

impl InMemoryTx {
    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.platform.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        self.finish();
    }
}

impl HistorySink for InMemoryTx {
    async fn append(&mut self, history: TriggerHistory) -> Result<(), CertflowError> {
        self.history.push(history);
        Ok(())
    }
}

impl ItemTransaction for InMemoryTx {
    async fn insert_certificate(
        &mut self,
        mut certificate: Certificate,
    ) -> Result<Certificate, CertflowError> {
        if self.platform.failing_insert.as_deref() == Some(certificate.common_name.as_str()) {
            return Err(CertflowError::Storage("disk full".into()));
        }
        certificate.id = Some(CertificateId::new());
        self.certificates.push(certificate.clone());
        Ok(certificate)
    }

    async fn update_certificate(&mut self, certificate: &Certificate) -> Result<(), CertflowError> {
        if let Some(stored) = self
            .certificates
            .iter_mut()
            .find(|c| c.id == certificate.id)
        {
            *stored = certificate.clone();
        }
        Ok(())
    }

    async fn backfill_history_object(
        &mut self,
        reference_uuid: uuid::Uuid,
        object_uuid: uuid::Uuid,
    ) -> Result<u64, CertflowError> {
        Ok(backfill(&mut self.history, reference_uuid, object_uuid))
    }

    async fn complete_candidate(
        &mut self,
        id: DiscoveryCertificateId,
        certificate_id: Option<CertificateId>,
    ) -> Result<(), CertflowError> {
        self.completed.push((id, certificate_id));
        Ok(())
    }

    async fn commit(mut self) -> Result<(), CertflowError> {
        if !self.platform.hold.is_zero() {
            tokio::time::sleep(self.platform.hold).await;
        }
        {
            let mut state = self.platform.state();
            for cert in self.certificates.drain(..) {
                if let Some(id) = cert.id {
                    state.certificates.insert(id, cert);
                }
            }
            state.history.append(&mut self.history);
            for (id, certificate_id) in self.completed.drain(..) {
                if let Some(candidate) = state.candidates.iter_mut().find(|c| c.id == id) {
                    candidate.processed = true;
                    candidate.processed_error = None;
                    candidate.certificate_id = certificate_id;
                }
            }
        }
        self.finish();
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), CertflowError> {
        self.finish();
        Ok(())
    }
}
