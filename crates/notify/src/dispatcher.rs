//! Notification dispatcher - resolves who hears about a transition and sends it.

use std::sync::Arc;

use crewline_core::{ordered_set, Actor, Property, TransitionAux, UserId, WorkState, WorkUnit};
use crewline_storage::{Storage, StorageError};
use tracing::{debug, info, warn};

use crate::channel::MessageChannel;
use crate::resolver::RecipientResolver;
use crate::template::{TemplateContext, TemplateKind, TemplateSet};

/// A committed transition, as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    /// Unit state after the transition was persisted
    pub unit: WorkUnit,
    /// State before
    pub from: WorkState,
    /// State after
    pub to: WorkState,
    /// Who triggered it
    pub actor: Actor,
    /// Crew or report carried by the request
    pub aux: TransitionAux,
}

/// Failures that stop a dispatch before any recipient is tried.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Loading the property or booking failed
    #[error("could not resolve recipients: {0}")]
    Storage(#[from] StorageError),
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Template used, `None` when the target notifies nobody
    pub kind: Option<TemplateKind>,
    /// Recipients the channel accepted
    pub sent: Vec<UserId>,
    /// Recipients without a linked channel identity
    pub skipped: Vec<UserId>,
    /// Recipients whose delivery failed
    pub failed: Vec<UserId>,
}

/// Maps transitions to recipients and sends them rendered messages.
pub struct Dispatcher {
    storage: Arc<dyn Storage>,
    resolver: Arc<dyn RecipientResolver>,
    channel: Arc<dyn MessageChannel>,
    templates: TemplateSet,
}

impl Dispatcher {
    /// Create a dispatcher with the built-in templates.
    pub fn new(
        storage: Arc<dyn Storage>,
        resolver: Arc<dyn RecipientResolver>,
        channel: Arc<dyn MessageChannel>,
    ) -> Self {
        Self {
            storage,
            resolver,
            channel,
            templates: TemplateSet::new(),
        }
    }

    /// Set the template set.
    pub fn with_templates(mut self, templates: TemplateSet) -> Self {
        self.templates = templates;
        self
    }

    /// Notify everyone interested in `event`.
    ///
    /// Each recipient is attempted independently; a failed send is recorded
    /// in the report and never stops the loop.
    pub async fn dispatch(&self, event: &TransitionEvent) -> Result<DispatchReport, DispatchError> {
        let Some(kind) = TemplateKind::for_target(event.to) else {
            debug!(unit = %event.unit.id, to = %event.to, "no notification for target state");
            return Ok(DispatchReport::default());
        };

        let property = self.storage.load_property(&event.unit.property_id).await?;
        let recipients = self.recipients(kind, event, property.as_ref()).await?;
        let context = Self::context(event, property.as_ref());
        let message = self.templates.render(kind, &context);

        let mut report = DispatchReport {
            kind: Some(kind),
            ..Default::default()
        };

        for user in recipients {
            let Some(external_id) = self.resolver.external_id(&user).await else {
                debug!(user = %user, "recipient has no linked channel, skipping");
                report.skipped.push(user);
                continue;
            };

            match self.channel.send(&external_id, &message).await {
                Ok(()) => {
                    info!(
                        unit = %event.unit.id,
                        user = %user,
                        channel = self.channel.name(),
                        kind = kind.as_str(),
                        "notification sent"
                    );
                    report.sent.push(user);
                }
                Err(e) => {
                    warn!(
                        unit = %event.unit.id,
                        user = %user,
                        channel = self.channel.name(),
                        error = %e,
                        "notification failed"
                    );
                    report.failed.push(user);
                }
            }
        }

        Ok(report)
    }

    async fn recipients(
        &self,
        kind: TemplateKind,
        event: &TransitionEvent,
        property: Option<&Property>,
    ) -> Result<Vec<UserId>, DispatchError> {
        let users = match kind {
            TemplateKind::Assigned => event.aux.assigned_crew_ids.clone(),
            TemplateKind::Accepted | TemplateKind::Started | TemplateKind::Completed => {
                match property {
                    Some(property) => property.manager_ids.clone(),
                    None => {
                        warn!(property = %event.unit.property_id, "property missing, no managers to notify");
                        Vec::new()
                    }
                }
            }
            TemplateKind::Confirmed => {
                let creator = match event.unit.booking_entry_id {
                    Some(id) => self
                        .storage
                        .load_booking(id)
                        .await?
                        .map(|entry| entry.created_by),
                    None => None,
                };
                vec![creator.unwrap_or_else(|| event.unit.created_by.clone())]
            }
        };
        Ok(ordered_set(users))
    }

    fn context(event: &TransitionEvent, property: Option<&Property>) -> TemplateContext {
        let property_name = property
            .map(|p| p.name.clone())
            .unwrap_or_else(|| event.unit.property_id.to_string());

        let crew = event
            .unit
            .assigned_crew_ids
            .iter()
            .map(UserId::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        TemplateContext::new()
            .set("property", property_name)
            .set("work_date", event.unit.work_date.to_string())
            .set("occupants", event.unit.occupant_count.to_string())
            .set("actor", event.actor.user_id.to_string())
            .set("crew", crew)
            .set("state", event.to.as_str())
            .set("unit", event.unit.id.to_string())
            .set(
                "report",
                event
                    .aux
                    .manager_report
                    .clone()
                    .or_else(|| event.unit.manager_report.clone())
                    .unwrap_or_default(),
            )
    }
}
