//! # certflowd
//!
//! Composition root that wires the adapters together and runs one command.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Install the `tracing` subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Construct application services, injecting repositories via port traits
//! - Dispatch the requested subcommand
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod cli;
mod config;
mod notify;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use certflow_adapter_storage_sqlite_sqlx::{
    SqliteCertificateRepository, SqliteDiscoveryRepository, SqliteItemStore, SqliteKeyRepository,
    SqliteTriggerHistoryRepository, SqliteTriggerRepository,
};
use certflow_adapter_x509::X509CertificateFactory;
use certflow_app::action_executor::{ActionExecutor, ActionRegistry};
use certflow_app::discovery_coordinator::{BatchPorts, DiscoveryBatchCoordinator};
use certflow_app::event_processor::EventProcessor;
use certflow_app::ports::{AcceptAll, CertificateFactory, DiscoveryRepository};
use certflow_app::services::event_service::{EventOutcome, EventService};
use certflow_app::services::trigger_service::TriggerService;
use certflow_domain::certificate::Certificate;
use certflow_domain::discovery::{DiscoveryCertificate, DiscoveryHistory};
use certflow_domain::event::EventMessage;
use certflow_domain::resource::{Resource, ResourceEvent};

use crate::cli::{Cli, Command, TriggerDocument};
use crate::config::Config;
use crate::notify::{NOTIFICATION_PROFILE, TracingNotifier};

type Coordinator = DiscoveryBatchCoordinator<
    SqliteTriggerRepository,
    SqliteDiscoveryRepository,
    SqliteKeyRepository,
    SqliteItemStore,
    X509CertificateFactory,
    AcceptAll,
>;

type Events = EventService<
    SqliteTriggerRepository,
    SqliteCertificateRepository,
    SqliteTriggerHistoryRepository,
    Coordinator,
>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .with_writer(std::io::stderr)
        .init();

    let db = config.storage().build().await?;
    let pool = db.pool().clone();

    // Evaluation
    let registry = ActionRegistry::<Certificate>::new()
        .side_effect(NOTIFICATION_PROFILE, Arc::new(TracingNotifier));
    let processor = Arc::new(EventProcessor::new(ActionExecutor::new(registry)));

    // Services
    let coordinator: Coordinator = DiscoveryBatchCoordinator::new(
        BatchPorts {
            triggers: SqliteTriggerRepository::new(pool.clone()),
            discoveries: SqliteDiscoveryRepository::new(pool.clone()),
            keys: SqliteKeyRepository::new(pool.clone()),
            store: SqliteItemStore::new(pool.clone()),
            factory: X509CertificateFactory::new(),
            validator: AcceptAll,
        },
        Arc::clone(&processor),
        config.batch_limits(),
    )?;
    let events: Events = EventService::new(
        SqliteTriggerRepository::new(pool.clone()),
        SqliteCertificateRepository::new(pool.clone()),
        SqliteTriggerHistoryRepository::new(pool.clone()),
        processor,
        coordinator,
    );

    match cli.command {
        Command::HandleEvent(args) => {
            let outcome = events.handle_event(args.message()).await?;
            report(&outcome);
        }
        Command::ProcessBatch { discovery_id } => {
            let message = EventMessage::new(
                Resource::Discovery,
                ResourceEvent::DiscoveryFinished,
                Some(discovery_id),
            );
            let outcome = events.handle_event(message).await?;
            report(&outcome);
        }
        Command::History {
            object_uuid,
            reference,
        } => {
            let rows = if reference {
                events.history().for_reference_object(object_uuid).await?
            } else {
                events.history().for_object(object_uuid).await?
            };
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Command::Discover { name, files } => {
            let discoveries = SqliteDiscoveryRepository::new(pool);
            let discovery = discoveries
                .create_discovery(DiscoveryHistory::new(name))
                .await?;
            let factory = X509CertificateFactory::new();
            for path in files {
                let content = tokio::fs::read(&path).await?;
                let mut candidate = DiscoveryCertificate::new(discovery.id, content);
                // Unparseable files stay anonymous; the batch records their error.
                if let Ok(parsed) = factory.create_entity(&candidate.content) {
                    candidate.common_name = parsed.common_name;
                    candidate.fingerprint = parsed.fingerprint;
                }
                candidate = candidate.with_metadata("source", path.display().to_string());
                discoveries.add_candidate(candidate).await?;
            }
            println!("{}", discovery.id);
        }
        Command::AddTrigger { file } => {
            let document: TriggerDocument =
                serde_json::from_slice(&tokio::fs::read(&file).await?)?;
            let triggers = TriggerService::new(SqliteTriggerRepository::new(pool));
            let trigger = triggers.create_trigger(document.trigger).await?;
            for association in document.associations {
                triggers
                    .associate(
                        trigger.id,
                        association.event,
                        association.resource,
                        association.object_uuid,
                        association.kind,
                    )
                    .await?;
            }
            println!("{}", trigger.id);
        }
    }

    Ok(())
}

fn report(outcome: &EventOutcome) {
    match outcome {
        EventOutcome::Batch(report) => println!(
            "batch: {} candidates, {} accepted, {} excluded, {} failed, {} interrupted, {} keys",
            report.candidates,
            report.accepted,
            report.excluded,
            report.failed,
            report.interrupted,
            report.keys_reconciled
        ),
        EventOutcome::Object(outcome) => match outcome.excluded_by {
            Some(trigger_id) => println!("excluded by trigger {trigger_id}"),
            None => println!(
                "{} of {} triggers matched, actions performed: {}",
                outcome.report.matched, outcome.report.evaluated, outcome.report.performed
            ),
        },
        EventOutcome::Ignored => println!("ignored"),
    }
}
