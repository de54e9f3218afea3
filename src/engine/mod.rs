//! Reconciliation engine.
//!
//! Drives an intent through validate → obtain resources → compute
//! parameters → render/deploy, and on deletion through remove → free
//! resources. Audit runs independently and never changes state.
//!
//! # State machine
//!
//! ```text
//! Idle → Validating → ResourceObtaining → ComputingParameters → Synchronizing → Audited
//! Idle | Audited | Failed → Deleting → ResourceFreeing → Removed
//! any working state → Failed (retry with a new synchronize)
//! ```
//!
//! At most one run per target is in flight; a second call for the same
//! target returns [`EngineError::Busy`].

mod audit;
mod error;
mod state;

pub use audit::{AuditReport, MisalignedAttribute, MisalignedObject};
pub use error::EngineError;
pub use state::{ReconcileState, TargetStatus};

use crate::config::{EngineConfig, NetweaveConfig};
use crate::intent::{
    HandlerContext, HandlerRegistry, Intent, IntentError, IntentHandler, Site, SiteNames,
    Topology, ValidationErrors,
};
use crate::platform::{DeviceError, ElementInfo, Platform};
use crate::resource::ResourceAdmin;
use crate::template::TemplateDispatcher;
use dashmap::{DashMap, DashSet};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Result of pushing configuration to one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteOutcome {
    pub element_id: String,
    pub element_name: String,
    pub template: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Result of one synchronize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncOutcome {
    pub target: String,
    pub run_id: Uuid,
    pub success: bool,
    pub state: ReconcileState,
    /// Per-site results, in site order
    pub sites: Vec<SiteOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushAction {
    Deploy,
    Remove,
}

struct SitePlan {
    element_id: String,
    element_name: String,
    template: String,
    config: String,
}

/// Marks a target in flight until dropped.
struct InFlight<'a> {
    targets: &'a DashSet<String>,
    target: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.targets.remove(&self.target);
    }
}

/// Orchestrates handlers, pools and platform capabilities.
pub struct ReconciliationEngine {
    handlers: HandlerRegistry,
    ctx: HandlerContext,
    platform: Platform,
    config: EngineConfig,
    status: DashMap<String, TargetStatus>,
    in_flight: DashSet<String>,
}

impl ReconciliationEngine {
    pub fn new(
        handlers: HandlerRegistry,
        resources: Arc<ResourceAdmin>,
        templates: TemplateDispatcher,
        platform: Platform,
        config: EngineConfig,
    ) -> Self {
        let ctx = HandlerContext {
            resources,
            templates: Arc::new(templates),
            devices: Arc::clone(&platform.devices),
            inventory: Arc::clone(&platform.inventory),
        };
        Self {
            handlers,
            ctx,
            platform,
            config,
            status: DashMap::new(),
            in_flight: DashSet::new(),
        }
    }

    /// Build an engine from configuration, declaring the configured pools.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Resource` if a pool declaration fails.
    pub fn from_config(
        config: &NetweaveConfig,
        handlers: HandlerRegistry,
        platform: Platform,
    ) -> Result<Self, EngineError> {
        let resources = ResourceAdmin::new();
        resources.declare_pools(&config.pools)?;
        Ok(Self::new(
            handlers,
            Arc::new(resources),
            TemplateDispatcher::from_config(&config.templates),
            platform,
            config.engine.clone(),
        ))
    }

    pub fn resources(&self) -> &Arc<ResourceAdmin> {
        &self.ctx.resources
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Context handed to handlers.
    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    /// Tracked status of a target, `None` if it was never reconciled.
    pub fn status(&self, target: &str) -> Option<TargetStatus> {
        self.status.get(target).map(|s| s.clone())
    }

    pub fn state(&self, target: &str) -> ReconcileState {
        self.status
            .get(target)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    /// Forget targets that have been `Removed` for at least `grace`.
    ///
    /// Status entries otherwise live as long as the engine. A delete repeated
    /// after pruning runs the removal again. Returns the number of entries
    /// dropped.
    pub fn prune_removed(&self, grace: Duration) -> usize {
        let now = chrono::Utc::now();
        let mut pruned = 0;
        self.status.retain(|target, status| {
            let expired = status.state == ReconcileState::Removed
                && !self.in_flight.contains(target)
                && now
                    .signed_duration_since(status.updated_at)
                    .to_std()
                    .is_ok_and(|age| age >= grace);
            if expired {
                pruned += 1;
            }
            !expired
        });
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned removed targets");
        }
        pruned
    }

    fn handler(&self, intent_type: &str) -> Result<Arc<dyn IntentHandler>, EngineError> {
        self.handlers
            .get(intent_type)
            .ok_or_else(|| EngineError::UnknownIntentType(intent_type.to_string()))
    }

    fn begin(&self, target: &str) -> Result<InFlight<'_>, EngineError> {
        if !self.in_flight.insert(target.to_string()) {
            return Err(EngineError::Busy(target.to_string()));
        }
        let guard = InFlight {
            targets: &self.in_flight,
            target: target.to_string(),
        };

        // A run whose future was dropped leaves a working state behind
        if let Some(mut status) = self.status.get_mut(target) {
            if !status.state.is_resting() {
                tracing::warn!(
                    target_name = target,
                    state = %status.state,
                    "Previous run was interrupted"
                );
                status.last_error = Some(format!("interrupted while {}", status.state));
                status.state = ReconcileState::Failed;
            }
        }

        Ok(guard)
    }

    /// Move a target to `to`, returning the state it left.
    fn transition(
        &self,
        target: &str,
        to: ReconcileState,
        run_id: Uuid,
    ) -> Result<ReconcileState, EngineError> {
        let mut status = self.status.entry(target.to_string()).or_default();
        let from = status.state;
        if !from.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                target: target.to_string(),
                from,
                to,
            });
        }

        status.state = to;
        status.updated_at = chrono::Utc::now();
        status.run_id = Some(run_id);
        if to != ReconcileState::Failed {
            status.last_error = None;
        }
        tracing::debug!(target_name = target, %from, %to, "State transition");
        Ok(from)
    }

    fn fail(&self, target: &str, run_id: Uuid, message: String) {
        if let Err(e) = self.transition(target, ReconcileState::Failed, run_id) {
            tracing::error!(target_name = target, error = %e, "Cannot mark target failed");
        }
        tracing::warn!(target_name = target, error = %message, "Reconciliation failed");
        if let Some(mut status) = self.status.get_mut(target) {
            status.last_error = Some(message);
        }
    }

    /// Check an intent without changing anything.
    ///
    /// Returns a field → message map; empty means the intent is valid.
    ///
    /// # Errors
    ///
    /// `EngineError::UnknownIntentType`, or a non-validation handler error.
    pub fn validate(&self, intent: &Intent) -> Result<ValidationErrors, EngineError> {
        let handler = self.handler(&intent.intent_type)?;
        self.collect_validation(handler.as_ref(), intent)
    }

    fn collect_validation(
        &self,
        handler: &dyn IntentHandler,
        intent: &Intent,
    ) -> Result<ValidationErrors, EngineError> {
        let mut errors = ValidationErrors::new();

        if intent.intent_type_version != handler.version() {
            errors.insert(
                "intent-type-version".to_string(),
                format!(
                    "{} handler is version {}, intent declares {}",
                    handler.intent_type(),
                    handler.version(),
                    intent.intent_type_version
                ),
            );
        }

        match handler.get_sites(&intent.target, &intent.config) {
            Ok(_) => {}
            Err(IntentError::Validation { field, message }) => {
                errors.insert(field, message);
                return Ok(errors);
            }
            Err(e) => return Err(e.into()),
        }

        match handler.validate_hook(&self.ctx, intent, &mut errors) {
            Ok(()) => {}
            Err(IntentError::Validation { field, message }) => {
                errors.insert(field, message);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(errors)
    }

    /// Reconcile an intent onto the network.
    ///
    /// Intents in the `deleted` network state are removed and their
    /// resources freed; every other state deploys. The token is honored
    /// until the first device write; once deployment starts the run
    /// completes.
    ///
    /// # Returns
    ///
    /// - `Ok(SyncOutcome)` once devices were contacted, `success` reflects
    ///   whether every site succeeded
    /// - `Err(EngineError::Validation)` if the write was rejected
    /// - `Err(EngineError::Busy)` if the target is already being reconciled
    /// - `Err(EngineError::Cancelled)` if cancelled before any device write
    pub async fn synchronize(
        &self,
        intent: &Intent,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, EngineError> {
        let handler = self.handler(&intent.intent_type)?;
        let _guard = self.begin(&intent.target)?;
        let run_id = Uuid::new_v4();
        let operation = if intent.is_delete() { "delete" } else { "deploy" };
        let span = tracing::info_span!(
            "synchronize",
            target_name = %intent.target,
            intent_type = %intent.intent_type,
            %run_id,
            operation
        );
        let started = Instant::now();

        let result = async {
            if intent.is_delete() {
                self.remove(handler.as_ref(), intent, cancel, run_id).await
            } else {
                self.deploy(handler.as_ref(), intent, cancel, run_id).await
            }
        }
        .instrument(span)
        .await;

        metrics::histogram!(
            "netweave_reconcile_duration_seconds",
            "intent_type" => intent.intent_type.clone(),
            "operation" => operation,
        )
        .record(started.elapsed().as_secs_f64());

        result
    }

    async fn deploy(
        &self,
        handler: &dyn IntentHandler,
        intent: &Intent,
        cancel: &CancellationToken,
        run_id: Uuid,
    ) -> Result<SyncOutcome, EngineError> {
        let target = intent.target.as_str();
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled(target.to_string()));
        }

        let previous = self.transition(target, ReconcileState::Validating, run_id)?;
        let errors = match self.collect_validation(handler, intent) {
            Ok(errors) => errors,
            Err(e) => {
                self.fail(target, run_id, e.to_string());
                return Err(e);
            }
        };
        if !errors.is_empty() {
            tracing::info!(errors = errors.len(), "Write rejected by validation");
            self.transition(target, previous, run_id)?;
            return Err(EngineError::Validation(errors));
        }

        if cancel.is_cancelled() {
            self.transition(target, previous, run_id)?;
            return Err(EngineError::Cancelled(target.to_string()));
        }

        if handler.has_resources() {
            self.transition(target, ReconcileState::ResourceObtaining, run_id)?;
            if let Err(e) = handler.obtain_resources(&self.ctx, intent) {
                self.fail(target, run_id, e.to_string());
                return Err(e.into());
            }
        }

        self.transition(target, ReconcileState::ComputingParameters, run_id)?;
        let plans = match self.plan(handler, intent).await {
            Ok(plans) => plans,
            Err(e) => {
                self.fail(target, run_id, e.to_string());
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            self.fail(target, run_id, "cancelled before deployment".to_string());
            return Err(EngineError::Cancelled(target.to_string()));
        }

        self.transition(target, ReconcileState::Synchronizing, run_id)?;
        let sites = self.push(plans, PushAction::Deploy).await;
        let failed = sites.iter().filter(|s| !s.success).count();
        if failed > 0 {
            self.fail(
                target,
                run_id,
                format!("{} of {} sites failed to deploy", failed, sites.len()),
            );
            return Ok(self.outcome(target, run_id, sites));
        }

        self.save_topology(intent, run_id, &sites).await;

        if let Err(e) = handler.post_sync_hook(&self.ctx, intent).await {
            self.fail(target, run_id, e.to_string());
            return Err(e.into());
        }

        self.transition(target, ReconcileState::Audited, run_id)?;
        tracing::info!(sites = sites.len(), "Intent synchronized");
        Ok(self.outcome(target, run_id, sites))
    }

    async fn remove(
        &self,
        handler: &dyn IntentHandler,
        intent: &Intent,
        cancel: &CancellationToken,
        run_id: Uuid,
    ) -> Result<SyncOutcome, EngineError> {
        let target = intent.target.as_str();

        // Resources are freed exactly once; repeating a delete is a no-op
        if self.state(target) == ReconcileState::Removed {
            tracing::info!("Target already removed");
            return Ok(self.outcome(target, run_id, Vec::new()));
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled(target.to_string()));
        }

        self.transition(target, ReconcileState::Deleting, run_id)?;
        let plans = match self.plan(handler, intent).await {
            Ok(plans) => plans,
            Err(e) => {
                self.fail(target, run_id, e.to_string());
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            self.fail(target, run_id, "cancelled before removal".to_string());
            return Err(EngineError::Cancelled(target.to_string()));
        }

        let sites = self.push(plans, PushAction::Remove).await;
        let failed = sites.iter().filter(|s| !s.success).count();
        if failed > 0 {
            self.fail(
                target,
                run_id,
                format!("{} of {} sites failed to remove", failed, sites.len()),
            );
            return Ok(self.outcome(target, run_id, sites));
        }

        self.transition(target, ReconcileState::ResourceFreeing, run_id)?;
        if handler.has_resources() {
            if let Err(e) = handler.free_resources(&self.ctx, target, &intent.config) {
                self.fail(target, run_id, e.to_string());
                return Err(e.into());
            }
        }
        if let Err(e) = self.platform.topology.delete(target).await {
            tracing::warn!(error = %e, "Failed to delete topology");
        }
        if let Err(e) = handler.post_sync_hook(&self.ctx, intent).await {
            self.fail(target, run_id, e.to_string());
            return Err(e.into());
        }

        self.transition(target, ReconcileState::Removed, run_id)?;
        tracing::info!(sites = sites.len(), "Intent removed");
        Ok(self.outcome(target, run_id, sites))
    }

    fn outcome(&self, target: &str, run_id: Uuid, sites: Vec<SiteOutcome>) -> SyncOutcome {
        SyncOutcome {
            target: target.to_string(),
            run_id,
            success: sites.iter().all(|s| s.success),
            state: self.state(target),
            sites,
        }
    }

    /// Inventory records for every site. Unknown elements keep their id as
    /// name and get the default template.
    async fn resolve_elements(&self, target: &str, site_ids: &[String]) -> Vec<ElementInfo> {
        let mut elements = Vec::with_capacity(site_ids.len());
        for element_id in site_ids {
            match self.platform.inventory.element(element_id).await {
                Ok(element) => elements.push(element),
                Err(e) => {
                    tracing::warn!(
                        target_name = target,
                        element_id = %element_id,
                        error = %e,
                        "Element not in inventory"
                    );
                    elements.push(ElementInfo::unknown(element_id));
                }
            }
        }
        elements
    }

    /// Sites with their parameters, plus the inventory record of each.
    async fn derive_sites(
        &self,
        handler: &dyn IntentHandler,
        intent: &Intent,
    ) -> Result<(Vec<Site>, Vec<ElementInfo>), EngineError> {
        let site_ids = handler.get_sites(&intent.target, &intent.config)?;
        let elements = self.resolve_elements(&intent.target, &site_ids).await;
        let names: SiteNames = elements
            .iter()
            .map(|e| (e.element_id.clone(), e.name.clone()))
            .collect();

        let sites = handler.get_site_parameters(&self.ctx, intent, &names)?;
        let in_order = sites.len() == site_ids.len()
            && sites
                .iter()
                .zip(&site_ids)
                .all(|(site, id)| &site.element_id == id);
        if !in_order {
            return Err(IntentError::Contract(format!(
                "{} returned parameters for {} sites, expected {:?}",
                handler.intent_type(),
                sites.len(),
                site_ids
            ))
            .into());
        }

        Ok((sites, elements))
    }

    async fn plan(
        &self,
        handler: &dyn IntentHandler,
        intent: &Intent,
    ) -> Result<Vec<SitePlan>, EngineError> {
        let (sites, elements) = self.derive_sites(handler, intent).await?;
        let global = handler.get_global_parameters(&self.ctx, intent)?;

        let mut plans = Vec::with_capacity(sites.len());
        for (site, element) in sites.into_iter().zip(elements) {
            let template = self
                .ctx
                .templates
                .get_template_name(&site.element_id, &element.family_type_release)
                .to_string();
            let config = self
                .platform
                .renderer
                .render(&template, &site.params, &global)
                .map_err(IntentError::from)?;
            plans.push(SitePlan {
                element_id: site.element_id,
                element_name: site.element_name,
                template,
                config,
            });
        }
        Ok(plans)
    }

    /// Push every plan, at most `deploy_concurrency` at a time. Results keep
    /// plan order.
    async fn push(&self, plans: Vec<SitePlan>, action: PushAction) -> Vec<SiteOutcome> {
        let timeout_secs = self.config.site_timeout_seconds;
        let timeout = Duration::from_secs(timeout_secs);
        let deployer = &self.platform.deployer;

        stream::iter(plans)
            .map(|plan| async move {
                let call = async {
                    match action {
                        PushAction::Deploy => {
                            deployer
                                .deploy(&plan.element_id, &plan.template, &plan.config)
                                .await
                        }
                        PushAction::Remove => {
                            deployer
                                .remove(&plan.element_id, &plan.template, &plan.config)
                                .await
                        }
                    }
                };
                let result = match tokio::time::timeout(timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(DeviceError::Timeout(timeout_secs)),
                };

                let error = match result {
                    Ok(()) => {
                        tracing::debug!(
                            element_id = %plan.element_id,
                            template = %plan.template,
                            ?action,
                            "Site updated"
                        );
                        None
                    }
                    Err(e) => {
                        tracing::warn!(
                            element_id = %plan.element_id,
                            template = %plan.template,
                            ?action,
                            error = %e,
                            "Site update failed"
                        );
                        Some(e.to_string())
                    }
                };

                SiteOutcome {
                    element_id: plan.element_id,
                    element_name: plan.element_name,
                    template: plan.template,
                    success: error.is_none(),
                    error,
                }
            })
            .buffered(self.config.deploy_concurrency.max(1))
            .collect()
            .await
    }

    async fn save_topology(&self, intent: &Intent, run_id: Uuid, sites: &[SiteOutcome]) {
        let mut topology: Topology = intent.topology.clone();
        topology.insert("intent-type".to_string(), json!(intent.intent_type));
        topology.insert("run-id".to_string(), json!(run_id.to_string()));
        topology.insert(
            "sites".to_string(),
            Value::Array(
                sites
                    .iter()
                    .map(|s| json!({"element-id": s.element_id, "template": s.template}))
                    .collect(),
            ),
        );

        if let Err(e) = self.platform.topology.save(&intent.target, &topology).await {
            tracing::warn!(error = %e, "Failed to persist topology");
        }
    }

    /// Compare desired state with the devices. Never mutates pools or
    /// reconciliation state.
    pub async fn audit(&self, intent: &Intent) -> Result<AuditReport, EngineError> {
        let handler = self.handler(&intent.intent_type)?;
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "audit",
            target_name = %intent.target,
            intent_type = %intent.intent_type,
            %run_id
        );

        async {
            let (sites, _) = self.derive_sites(handler.as_ref(), intent).await?;
            let mut report = AuditReport::new(&intent.target, run_id);
            for site in &sites {
                let expected = handler.expected_objects(site);
                audit::audit_site(
                    self.platform.devices.as_ref(),
                    &site.element_id,
                    &expected,
                    &mut report,
                )
                .await;
            }

            let misaligned = report.misalignment_count();
            if misaligned > 0 {
                metrics::counter!(
                    "netweave_audit_misalignments_total",
                    "intent_type" => intent.intent_type.clone(),
                )
                .increment(misaligned as u64);
                tracing::warn!(
                    misaligned,
                    unreachable = report.unreachable.len(),
                    "Intent misaligned"
                );
            } else {
                tracing::info!(unreachable = report.unreachable.len(), "Audit complete");
            }
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Read-only display snapshot, with the tracked reconciliation state.
    pub fn get_state(
        &self,
        intent: &Intent,
        topology: &Topology,
    ) -> Result<Map<String, Value>, EngineError> {
        let handler = self.handler(&intent.intent_type)?;
        let mut state = handler.get_state(&self.ctx, intent, topology)?;
        state.insert(
            "reconcile-state".to_string(),
            json!(self.state(&intent.target)),
        );
        Ok(state)
    }

    /// Reconstruct a config for `target` from the devices.
    pub async fn discover(
        &self,
        intent_type: &str,
        target: &str,
        seed: &Value,
    ) -> Result<Value, EngineError> {
        let handler = self.handler(intent_type)?;
        let discovered = handler
            .discover(&self.ctx, target, seed)
            .instrument(tracing::info_span!("discover", target_name = target, intent_type))
            .await?;
        Ok(discovered)
    }
}
