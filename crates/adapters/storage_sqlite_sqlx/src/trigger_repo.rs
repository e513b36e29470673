//! `SQLite` implementation of [`TriggerRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use certflow_app::ports::TriggerRepository;
use certflow_domain::action::{Action, Execution};
use certflow_domain::error::{CertflowError, ResolutionError};
use certflow_domain::id::{ActionId, RuleId, TriggerAssociationId, TriggerId};
use certflow_domain::resource::{Resource, ResourceEvent};
use certflow_domain::rule::{Condition, Rule};
use certflow_domain::trigger::{Trigger, TriggerAssociation, TriggerKind};

use crate::error::StorageError;
use crate::row;

/// Storage value of [`TriggerKind::Exclusion`].
const EXCLUSION_ORDER: i64 = -1;

fn order_of(kind: TriggerKind) -> i64 {
    match kind {
        TriggerKind::Exclusion => EXCLUSION_ORDER,
        TriggerKind::Action { order } => i64::from(order),
    }
}

fn kind_of(order: i64) -> Result<TriggerKind, sqlx::Error> {
    if order == EXCLUSION_ORDER {
        return Ok(TriggerKind::Exclusion);
    }
    u32::try_from(order)
        .map(|order| TriggerKind::Action { order })
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Trigger columns only; rules and actions are loaded separately.
struct TriggerRow(Trigger);

impl<'r> FromRow<'r, SqliteRow> for TriggerRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let ignore_object: bool = row.try_get("ignore_object")?;
        Ok(Self(Trigger {
            id: TriggerId::from_uuid(id),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            resource: row::parsed(row, "resource")?,
            ignore_object,
            event: row::parsed_opt(row, "event")?,
            event_resource: row::parsed_opt(row, "event_resource")?,
            rules: Vec::new(),
            actions: Vec::new(),
        }))
    }
}

struct AssociationRow(TriggerAssociation);

impl<'r> FromRow<'r, SqliteRow> for AssociationRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let trigger_id: uuid::Uuid = row.try_get("trigger_id")?;
        let order: i64 = row.try_get("trigger_order")?;
        Ok(Self(TriggerAssociation {
            id: TriggerAssociationId::from_uuid(id),
            trigger_id: TriggerId::from_uuid(trigger_id),
            event: row::parsed(row, "event")?,
            resource: row::parsed(row, "resource")?,
            object_uuid: row.try_get("object_uuid")?,
            kind: kind_of(order)?,
        }))
    }
}

/// A rule slot of a trigger; the rule columns are null when it is gone.
struct RuleSlot {
    rule_id: uuid::Uuid,
    rule: Option<Rule>,
}

impl<'r> FromRow<'r, SqliteRow> for RuleSlot {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let rule_id: uuid::Uuid = row.try_get("rule_id")?;
        let name: Option<String> = row.try_get("name")?;
        let rule = match name {
            None => None,
            Some(name) => {
                let conditions: Vec<Condition> = row::json(row, "conditions")?;
                Some(Rule {
                    id: RuleId::from_uuid(rule_id),
                    name,
                    description: row.try_get("description")?,
                    resource: row::parsed(row, "resource")?,
                    conditions,
                })
            }
        };
        Ok(Self { rule_id, rule })
    }
}

/// An action slot of a trigger; the action columns are null when it is gone.
struct ActionSlot {
    action_id: uuid::Uuid,
    action: Option<Action>,
}

impl<'r> FromRow<'r, SqliteRow> for ActionSlot {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let action_id: uuid::Uuid = row.try_get("action_id")?;
        let name: Option<String> = row.try_get("name")?;
        let action = match name {
            None => None,
            Some(name) => {
                let executions: Vec<Execution> = row::json(row, "executions")?;
                Some(Action {
                    id: ActionId::from_uuid(action_id),
                    name,
                    resource: row::parsed(row, "resource")?,
                    executions,
                })
            }
        };
        Ok(Self { action_id, action })
    }
}

const UPSERT_RULE: &str = r"
    INSERT INTO rules (id, name, description, resource, conditions)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET
        name = excluded.name,
        description = excluded.description,
        resource = excluded.resource,
        conditions = excluded.conditions
";

const UPSERT_ACTION: &str = r"
    INSERT INTO actions (id, name, resource, executions)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET
        name = excluded.name,
        resource = excluded.resource,
        executions = excluded.executions
";

const INSERT_TRIGGER: &str = r"
    INSERT INTO triggers (id, name, description, resource, ignore_object, event, event_resource)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";

const SELECT_RULE_SLOTS: &str = r"
    SELECT tr.rule_id, r.name, r.description, r.resource, r.conditions
    FROM trigger_rules tr
    LEFT JOIN rules r ON r.id = tr.rule_id
    WHERE tr.trigger_id = ?
    ORDER BY tr.position
";

const SELECT_ACTION_SLOTS: &str = r"
    SELECT ta.action_id, a.name, a.resource, a.executions
    FROM trigger_actions ta
    LEFT JOIN actions a ON a.id = ta.action_id
    WHERE ta.trigger_id = ?
    ORDER BY ta.position
";

const INSERT_ASSOCIATION: &str = r"
    INSERT INTO trigger_associations (id, trigger_id, event, resource, object_uuid, trigger_order)
    VALUES (?, ?, ?, ?, ?, ?)
";

const SELECT_ASSOCIATIONS: &str = r"
    SELECT * FROM trigger_associations
    WHERE event = ? AND resource = ? AND (object_uuid IS NULL OR object_uuid = ?)
    ORDER BY CASE WHEN trigger_order = -1 THEN 0 ELSE 1 END, trigger_order, seq
";

/// `SQLite`-backed trigger repository.
pub struct SqliteTriggerRepository {
    pool: SqlitePool,
}

impl SqliteTriggerRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Rules and actions are shared rows; saving a trigger updates them.
    async fn insert_trigger(
        conn: &mut SqliteConnection,
        trigger: &Trigger,
    ) -> Result<(), StorageError> {
        for rule in &trigger.rules {
            sqlx::query(UPSERT_RULE)
                .bind(rule.id.as_uuid())
                .bind(&rule.name)
                .bind(&rule.description)
                .bind(rule.resource.as_str())
                .bind(row::to_json(&rule.conditions)?)
                .execute(&mut *conn)
                .await?;
        }
        for action in &trigger.actions {
            sqlx::query(UPSERT_ACTION)
                .bind(action.id.as_uuid())
                .bind(&action.name)
                .bind(action.resource.as_str())
                .bind(row::to_json(&action.executions)?)
                .execute(&mut *conn)
                .await?;
        }

        sqlx::query(INSERT_TRIGGER)
            .bind(trigger.id.as_uuid())
            .bind(&trigger.name)
            .bind(&trigger.description)
            .bind(trigger.resource.as_str())
            .bind(trigger.ignore_object)
            .bind(trigger.event.map(ResourceEvent::as_str))
            .bind(trigger.event_resource.map(Resource::as_str))
            .execute(&mut *conn)
            .await?;

        for (position, rule) in (0_i64..).zip(&trigger.rules) {
            sqlx::query("INSERT INTO trigger_rules (trigger_id, position, rule_id) VALUES (?, ?, ?)")
                .bind(trigger.id.as_uuid())
                .bind(position)
                .bind(rule.id.as_uuid())
                .execute(&mut *conn)
                .await?;
        }
        for (position, action) in (0_i64..).zip(&trigger.actions) {
            sqlx::query(
                "INSERT INTO trigger_actions (trigger_id, position, action_id) VALUES (?, ?, ?)",
            )
            .bind(trigger.id.as_uuid())
            .bind(position)
            .bind(action.id.as_uuid())
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }
}

impl TriggerRepository for SqliteTriggerRepository {
    async fn create_trigger(&self, trigger: Trigger) -> Result<Trigger, CertflowError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        Self::insert_trigger(&mut tx, &trigger).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(trigger)
    }

    async fn get_trigger(&self, id: TriggerId) -> Result<Option<Trigger>, CertflowError> {
        let row: Option<TriggerRow> = sqlx::query_as("SELECT * FROM triggers WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        let Some(TriggerRow(mut trigger)) = row else {
            return Ok(None);
        };

        let rules: Vec<RuleSlot> = sqlx::query_as(SELECT_RULE_SLOTS)
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        for slot in rules {
            let rule = slot.rule.ok_or_else(|| ResolutionError::DanglingRule {
                trigger: id.to_string(),
                rule: slot.rule_id.to_string(),
            })?;
            trigger.rules.push(rule);
        }

        let actions: Vec<ActionSlot> = sqlx::query_as(SELECT_ACTION_SLOTS)
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        for slot in actions {
            let action = slot.action.ok_or_else(|| ResolutionError::DanglingAction {
                trigger: id.to_string(),
                action: slot.action_id.to_string(),
            })?;
            trigger.actions.push(action);
        }

        Ok(Some(trigger))
    }

    async fn create_association(
        &self,
        association: TriggerAssociation,
    ) -> Result<TriggerAssociation, CertflowError> {
        sqlx::query(INSERT_ASSOCIATION)
            .bind(association.id.as_uuid())
            .bind(association.trigger_id.as_uuid())
            .bind(association.event.as_str())
            .bind(association.resource.as_str())
            .bind(association.object_uuid)
            .bind(order_of(association.kind))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(association)
    }

    async fn find_associations(
        &self,
        event: ResourceEvent,
        resource: Resource,
        object_uuid: Option<uuid::Uuid>,
    ) -> Result<Vec<TriggerAssociation>, CertflowError> {
        let rows: Vec<AssociationRow> = sqlx::query_as(SELECT_ASSOCIATIONS)
            .bind(event.as_str())
            .bind(resource.as_str())
            .bind(object_uuid)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
