//! Trigger history: append-only audit ledger of trigger evaluations.

use serde::{Deserialize, Serialize};

use crate::id::{
    ConditionId, ExecutionId, TriggerAssociationId, TriggerHistoryId, TriggerHistoryRecordId,
    TriggerId,
};
use crate::time::{Timestamp, now};

/// One evaluation of one trigger against one object.
///
/// During batch discovery the certificate does not exist yet when the
/// exclusion phase runs, so `object_uuid` starts empty and
/// `reference_object_uuid` carries the discovery candidate's id until
/// the row is backfilled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerHistory {
    pub id: TriggerHistoryId,
    pub trigger_id: TriggerId,
    pub trigger_association_id: Option<TriggerAssociationId>,
    pub object_uuid: Option<uuid::Uuid>,
    pub reference_object_uuid: Option<uuid::Uuid>,
    pub conditions_matched: bool,
    pub actions_performed: bool,
    pub triggered_at: Timestamp,
    pub message: Option<String>,
    pub records: Vec<TriggerHistoryRecord>,
}

impl TriggerHistory {
    /// Start a not-matched, not-performed row stamped with the current time.
    #[must_use]
    pub fn new(
        trigger_id: TriggerId,
        trigger_association_id: Option<TriggerAssociationId>,
        object_uuid: Option<uuid::Uuid>,
        reference_object_uuid: Option<uuid::Uuid>,
    ) -> Self {
        Self {
            id: TriggerHistoryId::new(),
            trigger_id,
            trigger_association_id,
            object_uuid,
            reference_object_uuid,
            conditions_matched: false,
            actions_performed: false,
            triggered_at: now(),
            message: None,
            records: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// One condition item or execution item touched during an evaluation.
///
/// A record points at the owning condition or execution, never both; the
/// message tells whether the item held, failed, or ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerHistoryRecord {
    pub id: TriggerHistoryRecordId,
    pub condition_id: Option<ConditionId>,
    pub execution_id: Option<ExecutionId>,
    pub message: String,
}

impl TriggerHistoryRecord {
    #[must_use]
    pub fn condition(condition_id: ConditionId, message: impl Into<String>) -> Self {
        Self {
            id: TriggerHistoryRecordId::new(),
            condition_id: Some(condition_id),
            execution_id: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn execution(execution_id: ExecutionId, message: impl Into<String>) -> Self {
        Self {
            id: TriggerHistoryRecordId::new(),
            condition_id: None,
            execution_id: Some(execution_id),
            message: message.into(),
        }
    }
}
