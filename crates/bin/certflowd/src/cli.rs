//! Command line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use certflow_domain::event::EventMessage;
use certflow_domain::resource::{Resource, ResourceEvent};
use certflow_domain::trigger::{Trigger, TriggerKind};

/// Certificate lifecycle trigger engine.
#[derive(Parser, Debug)]
#[command(name = "certflowd", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "CERTFLOW_CONFIG", default_value = crate::config::DEFAULT_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dispatch one lifecycle event.
    HandleEvent(EventArgs),
    /// Process the candidates of a finished discovery job.
    ProcessBatch {
        /// Discovery job id.
        discovery_id: uuid::Uuid,
    },
    /// Print the trigger history of an object as JSON lines.
    History {
        object_uuid: uuid::Uuid,
        /// Look the id up as a reference object (e.g. a discovery candidate).
        #[arg(long)]
        reference: bool,
    },
    /// Register a discovery job with certificate files as its candidates.
    Discover {
        /// Job name.
        #[arg(long, default_value = "manual import")]
        name: String,
        /// PEM or DER certificate files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Create a trigger and its associations from a JSON document.
    AddTrigger {
        /// Path to a JSON [`TriggerDocument`].
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
pub struct EventArgs {
    /// Resource the event is raised on, e.g. `CERTIFICATE`.
    #[arg(long)]
    pub resource: Resource,
    /// Event name, e.g. `CERTIFICATE_EXPIRING`.
    #[arg(long)]
    pub event: ResourceEvent,
    /// Object the event concerns.
    #[arg(long)]
    pub object: Option<uuid::Uuid>,
    /// Resolve triggers on this resource instead.
    #[arg(long, requires = "override_object")]
    pub override_resource: Option<Resource>,
    /// Resolve triggers on this object instead.
    #[arg(long)]
    pub override_object: Option<uuid::Uuid>,
}

impl EventArgs {
    #[must_use]
    pub fn message(&self) -> EventMessage {
        let message = EventMessage::new(self.resource, self.event, self.object);
        match self.override_resource {
            Some(resource) => message.with_override(resource, self.override_object),
            None => message,
        }
    }
}

/// A trigger together with where it should fire.
#[derive(Debug, Deserialize)]
pub struct TriggerDocument {
    pub trigger: Trigger,
    #[serde(default)]
    pub associations: Vec<AssociationDocument>,
}

#[derive(Debug, Deserialize)]
pub struct AssociationDocument {
    pub event: ResourceEvent,
    pub resource: Resource,
    #[serde(default)]
    pub object_uuid: Option<uuid::Uuid>,
    pub kind: TriggerKind,
}
