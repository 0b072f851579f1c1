use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tomato_accounting::bucket::BucketType;
use tomato_accounting::combine::combine;
use tomato_accounting::statistics::UsageStatistics;
use tomato_accounting::store::UsageStore;
use tomato_core::config::TimeoutConfig;
use tomato_core::ids::{ConnectionId, ElementId, StatisticsId, TopologyId};
use tomato_elements::element_type::ElementTypeTag;
use tomato_elements::error::ElementError;
use tomato_elements::model::{Connection, Element};
use tomato_elements::registry::ElementRegistry;
use tomato_elements::state::ElementAction;

use crate::error::TopologyError;
use crate::orchestrator::{compound_action, spec_for};
use crate::permissions::{Caller, Role, UserId};
use crate::store::TopologyStore;
use crate::timeout::TimeoutStep;
use crate::topology::Topology;

/// Resolves a user's organization membership for `topology_list` filtering.
/// The core depends on this collaborator but does not implement it — the
/// backend that owns user/organization records lives outside this
/// workspace.
#[async_trait]
pub trait PermissionsView: Send + Sync {
    async fn organization_of(&self, user: &UserId) -> Option<String>;
}

/// RAII handle on a topology's busy latch; releases automatically on drop
/// via the underlying owned mutex guard.
pub struct BusyGuard(tokio::sync::OwnedMutexGuard<()>);

/// The external contract every topology operation is expressed through.
/// An RPC layer thunking JSON onto this is out of scope here; this is the
/// plain async API that layer would call.
pub struct TopologyService {
    store: Arc<dyn TopologyStore>,
    usage_store: Arc<dyn UsageStore>,
    registry: Arc<ElementRegistry>,
    timeouts: TimeoutConfig,
    /// Process-local busy latches, one per topology id, independent of
    /// whatever the backing store does to persist the topology itself — a
    /// document store returns a fresh deserialized `Topology` on every
    /// `get`, so the latch has to live here rather than on that value to
    /// actually be shared across concurrent callers.
    busy: DashMap<TopologyId, Arc<Mutex<()>>>,
}

impl TopologyService {
    pub fn new(
        store: Arc<dyn TopologyStore>,
        usage_store: Arc<dyn UsageStore>,
        registry: Arc<ElementRegistry>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            store,
            usage_store,
            registry,
            timeouts,
            busy: DashMap::new(),
        }
    }

    fn initial_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.timeouts.initial_secs as i64)
    }

    /// Creation itself only checks the caller's `NoTopologyCreate` flag,
    /// a collaborator this workspace does not implement (it lives on the
    /// user-account backend, out of scope here) — callers that
    /// reach this far are assumed already cleared for it.
    pub async fn create(&self, owner: UserId) -> Result<TopologyId, TopologyError> {
        let topology = Topology::new(owner, self.initial_deadline(Utc::now()));
        let id = topology.id;
        self.store.save(&topology).await?;
        tracing::info!(topology = %id, "topology created");
        Ok(id)
    }

    /// Applies attribute changes to a topology's `name`/`site`/client-data
    /// bag. Unknown non-`_`-prefixed keys are rejected wholesale — no
    /// partial application.
    pub async fn modify(
        &self,
        id: TopologyId,
        caller: &Caller,
        attrs: Map<String, Value>,
    ) -> Result<(), TopologyError> {
        let mut topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::Manager)?;
        let _guard = self.acquire_busy(id)?;

        for key in attrs.keys() {
            if !matches!(key.as_str(), "name" | "site") && !key.starts_with('_') {
                return Err(TopologyError::UnsupportedAttribute(key.clone()));
            }
        }

        for (key, value) in attrs {
            match key.as_str() {
                "name" => {
                    topology.name = value
                        .as_str()
                        .ok_or_else(|| TopologyError::InvalidValue("name must be a string".into()))?
                        .to_string();
                }
                "site" => {
                    topology.site = value.as_str().map(|s| s.to_string());
                }
                _ => {
                    let stripped = key.trim_start_matches('_').to_string();
                    topology.client_data.insert(stripped, value);
                }
            }
        }

        self.store.save(&topology).await?;
        Ok(())
    }

    /// Runs a compound action (`prepare`/`start`/`stop`/`destroy`) across
    /// every eligible element. `start` runs a `prepare` pass first and
    /// `destroy` runs a `stop` pass first, so a
    /// created→started transition traverses `prepared` implicitly. Refuses
    /// if the topology's deadline has already passed for `prepare`/`start`;
    /// `stop`/`destroy` are always reachable, even on a timed-out topology.
    pub async fn action(
        &self,
        id: TopologyId,
        caller: &Caller,
        action: ElementAction,
    ) -> Result<Vec<ElementId>, TopologyError> {
        let mut topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::Manager)?;
        let _guard = self.acquire_busy(id)?;

        if matches!(action, ElementAction::Prepare | ElementAction::Start)
            && Utc::now() > topology.timeout
        {
            return Err(TopologyError::TimedOut);
        }

        let mut actioned = Vec::new();
        if matches!(action, ElementAction::Start) {
            let pre = spec_for(ElementAction::Prepare);
            actioned.extend(compound_action(&mut topology, &self.registry, &pre).await?);
        }
        if matches!(action, ElementAction::Destroy) {
            let pre = spec_for(ElementAction::Stop);
            actioned.extend(compound_action(&mut topology, &self.registry, &pre).await?);
        }

        let spec = spec_for(action);
        actioned.extend(compound_action(&mut topology, &self.registry, &spec).await?);

        self.store.save(&topology).await?;
        Ok(actioned)
    }

    /// Removes a topology outright. Refuses on a non-empty topology unless
    /// `recursive` — matching `checkRemove`'s guard against silently
    /// destroying live elements.
    pub async fn remove(
        &self,
        id: TopologyId,
        caller: &Caller,
        recursive: bool,
    ) -> Result<(), TopologyError> {
        let topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::Owner)?;
        let _guard = self.acquire_busy(id)?;

        if !topology.is_empty() && !recursive {
            return Err(TopologyError::NotEmpty);
        }

        self.store.remove(id).await?;
        tracing::info!(topology = %id, "topology removed");
        Ok(())
    }

    /// Creates an element under `topology`, top-level if `parent` is
    /// `None` or as a child otherwise. A child is only legal in a state
    /// the parent's `CAP_CHILDREN[childType]` lists and inherits the parent's current state rather than starting
    /// at `Created`. Attribute validation runs against that starting
    /// state, same as `modify` would for an existing element.
    pub async fn add_element(
        &self,
        id: TopologyId,
        caller: &Caller,
        typ: ElementTypeTag,
        parent: Option<ElementId>,
        attrs: Map<String, Value>,
    ) -> Result<ElementId, TopologyError> {
        let mut topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::Manager)?;
        let _guard = self.acquire_busy(id)?;

        let driver = self
            .registry
            .get(typ)
            .map_err(|e| ElementError::Driver(e.to_string()))?;
        let caps = driver.capabilities();

        let mut element = match parent {
            Some(parent_id) => {
                let parent_el = topology
                    .elements
                    .get(&parent_id)
                    .ok_or(TopologyError::ElementNotFound(parent_id))?;
                if !caps.parents.contains(&parent_el.typ) {
                    return Err(ElementError::ChildNotAllowed {
                        child: typ,
                        parent: parent_el.typ,
                    }
                    .into());
                }
                let parent_driver = self
                    .registry
                    .get(parent_el.typ)
                    .map_err(|e| ElementError::Driver(e.to_string()))?;
                let parent_caps = parent_driver.capabilities();
                let allowed = parent_caps.children.get(&typ);
                if !allowed.is_some_and(|states| states.contains(&parent_el.state)) {
                    return Err(ElementError::ChildNotAllowed {
                        child: typ,
                        parent: parent_el.typ,
                    }
                    .into());
                }
                let mut child = Element::child_of(id, typ, parent_id);
                child.state = parent_el.state;
                child
            }
            None => {
                if !caps.parents.is_empty() {
                    return Err(TopologyError::InvalidValue(format!(
                        "{typ} cannot be created without a parent element"
                    )));
                }
                Element::new(id, typ)
            }
        };

        for (key, value) in attrs {
            if !caps.attr_allowed(&key, element.state) {
                return Err(ElementError::UnsupportedAttribute(key).into());
            }
            element.attrs.insert(key, value);
        }

        let element_id = element.id;
        tracing::info!(topology = %id, element = %element_id, %typ, "element created");
        topology.elements.insert(element_id, element);
        self.store.save(&topology).await?;
        Ok(element_id)
    }

    /// Removes an element outright (`REMOVE_ACTION`). Refuses
    /// if the element still has children (remove those first) or is
    /// attached to a connection (remove the connection first), and if the
    /// type's capability table does not list the element's current state
    /// as removable (invariant E4).
    pub async fn remove_element(
        &self,
        id: TopologyId,
        caller: &Caller,
        element_id: ElementId,
    ) -> Result<(), TopologyError> {
        let mut topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::Manager)?;
        let _guard = self.acquire_busy(id)?;

        let element = topology
            .elements
            .get(&element_id)
            .ok_or(TopologyError::ElementNotFound(element_id))?;

        if element.connection.is_some() {
            return Err(TopologyError::InvalidValue(
                "element is attached to a connection; remove the connection first".into(),
            ));
        }
        if topology
            .elements
            .values()
            .any(|e| e.parent == Some(element_id))
        {
            return Err(TopologyError::NotEmpty);
        }

        let driver = self
            .registry
            .get(element.typ)
            .map_err(|e| ElementError::Driver(e.to_string()))?;
        if !driver.capabilities().remove_allowed(element.state) {
            return Err(ElementError::InvalidAction {
                action: ElementAction::Custom("remove".to_string()),
            }
            .into());
        }

        topology.elements.remove(&element_id);
        tracing::info!(topology = %id, element = %element_id, "element removed");
        self.store.save(&topology).await?;
        Ok(())
    }

    /// Joins two interface-bearing elements into a connection. Both
    /// endpoints must speak the same connection concept (invariant C1) and
    /// neither may already be attached to another connection (invariant
    /// C2).
    pub async fn add_connection(
        &self,
        id: TopologyId,
        caller: &Caller,
        element_a: ElementId,
        element_b: ElementId,
        attrs: Map<String, Value>,
    ) -> Result<ConnectionId, TopologyError> {
        let mut topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::Manager)?;
        let _guard = self.acquire_busy(id)?;

        if element_a == element_b {
            return Err(TopologyError::InvalidValue(
                "a connection cannot join an element to itself".into(),
            ));
        }

        let concept_of = |eid: ElementId| -> Result<tomato_elements::element_type::ConnectionConcept, TopologyError> {
            let el = topology
                .elements
                .get(&eid)
                .ok_or(TopologyError::ElementNotFound(eid))?;
            let driver = self
                .registry
                .get(el.typ)
                .map_err(|e| ElementError::Driver(e.to_string()))?;
            driver.capabilities().con_concept.ok_or_else(|| {
                TopologyError::InvalidValue(format!(
                    "{} does not speak a connection concept",
                    el.typ
                ))
            })
        };
        let concept_a = concept_of(element_a)?;
        let concept_b = concept_of(element_b)?;
        if concept_a != concept_b {
            return Err(TopologyError::InvalidValue(
                "endpoints speak different connection concepts".into(),
            ));
        }

        let already_attached = topology.connections.values().any(|c| {
            c.element_a == element_a
                || c.element_b == element_a
                || c.element_a == element_b
                || c.element_b == element_b
        });
        if already_attached {
            return Err(TopologyError::InvalidValue(
                "an endpoint may appear in at most one connection".into(),
            ));
        }

        let mut connection = Connection::new(id, element_a, element_b);
        for (key, value) in attrs {
            connection.attrs.insert(key, value);
        }
        let connection_id = connection.id;

        topology.connections.insert(connection_id, connection);
        topology.elements.get_mut(&element_a).unwrap().connection = Some(connection_id);
        topology.elements.get_mut(&element_b).unwrap().connection = Some(connection_id);

        tracing::info!(topology = %id, connection = %connection_id, "connection created");
        self.store.save(&topology).await?;
        Ok(connection_id)
    }

    /// Tears down a connection, freeing both endpoints to join another one.
    pub async fn remove_connection(
        &self,
        id: TopologyId,
        caller: &Caller,
        connection_id: ConnectionId,
    ) -> Result<(), TopologyError> {
        let mut topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::Manager)?;
        let _guard = self.acquire_busy(id)?;

        let connection = topology
            .connections
            .remove(&connection_id)
            .ok_or(TopologyError::ConnectionNotFound(connection_id))?;
        if let Some(e) = topology.elements.get_mut(&connection.element_a) {
            e.connection = None;
        }
        if let Some(e) = topology.elements.get_mut(&connection.element_b) {
            e.connection = None;
        }

        tracing::info!(topology = %id, connection = %connection_id, "connection removed");
        self.store.save(&topology).await?;
        Ok(())
    }

    /// Grants or revokes a role for `target`. Only an `Owner` may change
    /// permissions, and a caller may never change their own role this way.
    pub async fn permission(
        &self,
        id: TopologyId,
        caller: &Caller,
        target: UserId,
        role: Option<Role>,
    ) -> Result<(), TopologyError> {
        let mut topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::Owner)?;

        if target == caller.user {
            return Err(TopologyError::InvalidValue(
                "cannot change your own role".into(),
            ));
        }

        match role {
            Some(role) => topology.permissions.set_role(target, role),
            None => topology.permissions.revoke(&target),
        }
        self.store.save(&topology).await?;
        Ok(())
    }

    /// A read-only snapshot of the topology: its own fields plus every
    /// element and connection. Requires only `User`, and is never guarded
    /// by the busy latch — reads are allowed to observe a
    /// partially-applied state while a mutation is in flight.
    pub async fn info(&self, id: TopologyId, caller: &Caller) -> Result<Topology, TopologyError> {
        let topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::User)?;
        Ok(topology)
    }

    pub async fn usage(
        &self,
        id: TopologyId,
        caller: &Caller,
    ) -> Result<UsageStatistics, TopologyError> {
        let topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::User)?;
        self.usage_store
            .get(topology.statistics_id)
            .await
            .map_err(|_| TopologyError::NotFound(id))
    }

    /// Sets the timeout deadline to `now + timeout_secs`.
    /// Ordinary callers are capped at `TOPOLOGY_TIMEOUT_MAX`; only the
    /// `GlobalAdmin` identity may renew past it. A renewal longer than the
    /// warning lead time resets the escalation to `Initial` so a future
    /// warning fires again; a short renewal jumps straight to `Warned`
    /// (the rationale: no warning is owed for a renewal that is itself
    /// shorter than the warning window). A topology already at `Destroyed`
    /// cannot be renewed — the reaper has already torn down its contents.
    pub async fn renew(
        &self,
        id: TopologyId,
        caller: &Caller,
        timeout_secs: u64,
    ) -> Result<(), TopologyError> {
        let mut topology = self.store.get(id).await?;
        self.require_role(&topology, caller, Role::Manager)?;
        let _guard = self.acquire_busy(id)?;

        if topology.timeout_step == TimeoutStep::Destroyed {
            return Err(TopologyError::InvalidValue(
                "cannot renew a destroyed topology".into(),
            ));
        }

        if timeout_secs > self.timeouts.max_secs && !caller.is_global_admin {
            return Err(TopologyError::InvalidValue(format!(
                "timeout {timeout_secs} exceeds maximum {}",
                self.timeouts.max_secs
            )));
        }

        let now = Utc::now();
        topology.timeout = now + Duration::seconds(timeout_secs as i64);
        topology.timeout_step = if timeout_secs > self.timeouts.warning_secs {
            TimeoutStep::Initial
        } else {
            TimeoutStep::Warned
        };
        self.store.save(&topology).await?;
        Ok(())
    }

    /// Every topology currently sitting at exactly `step`. Reaper-internal:
    /// feeds its three independent escalation sweeps.
    pub async fn list_by_step(&self, step: TimeoutStep) -> Result<Vec<TopologyId>, TopologyError> {
        self.store.list_by_step(step).await
    }

    /// Escalates a topology straight to `step` without touching any
    /// element. The reaper's warn sweep only needs to record that a
    /// warning has gone out (this first tier neither stops nor
    /// destroys anything); the `stop`/`destroy` sweeps call [`Self::action`]
    /// for the compound action itself and then this method to record the
    /// step reached.
    pub async fn advance_timeout_step(
        &self,
        id: TopologyId,
        step: TimeoutStep,
    ) -> Result<(), TopologyError> {
        let mut topology = self.store.get(id).await?;
        topology.timeout_step = step;
        self.store.save(&topology).await?;
        Ok(())
    }

    /// Every topology id known to the store, regardless of timeout step.
    /// The sampler uses this — unlike the reaper's escalation sweeps, a
    /// usage tick applies uniformly to every topology.
    pub async fn list(&self) -> Result<Vec<TopologyId>, TopologyError> {
        self.store.list().await
    }

    /// Runs one sampler tick for every element and connection of
    /// `topology`, then folds their latest `single` records into the
    /// topology's own usage history. Missing
    /// per-entity statistics are treated as a fresh, empty history rather
    /// than an error — the first tick an element ever sees has nothing to
    /// load yet.
    pub async fn sample_tick(
        &self,
        id: TopologyId,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), TopologyError> {
        let mut topology = self.store.get(id).await?;
        let mut latest_singles = Vec::new();

        for element in topology.elements.values_mut() {
            let driver = self
                .registry
                .get(element.typ)
                .map_err(|e| ElementError::Driver(e.to_string()))?;
            let measurement = driver.sample_usage(&mut element.attrs).await;

            let mut stats = self.load_or_create_usage(element.statistics_id).await?;
            stats.update(measurement, begin, end);
            if let Some(single) = stats.last_single() {
                latest_singles.push(single.clone());
            }
            self.save_usage(&stats).await?;
        }

        for connection in topology.connections.values() {
            // No connection-level driver is wired up in this workspace
            // (the hosts that would report link traffic are out of
            // scope); a connection's own usage stays zero-valued until
            // one is.
            let mut stats = self.load_or_create_usage(connection.statistics_id).await?;
            stats.update(tomato_core::measurement::Measurement::zero(), begin, end);
            if let Some(single) = stats.last_single() {
                latest_singles.push(single.clone());
            }
            self.save_usage(&stats).await?;
        }

        if !latest_singles.is_empty() {
            let mut topology_stats = self.load_or_create_usage(topology.statistics_id).await?;
            let combined = combine(
                topology.statistics_id,
                BucketType::Single,
                begin,
                end,
                &latest_singles,
            );
            topology_stats.ingest(combined);
            self.save_usage(&topology_stats).await?;
        }

        self.store.save(&topology).await?;
        Ok(())
    }

    async fn load_or_create_usage(&self, id: StatisticsId) -> Result<UsageStatistics, TopologyError> {
        match self.usage_store.get(id).await {
            Ok(stats) => Ok(stats),
            Err(_) => Ok(UsageStatistics::with_id(id)),
        }
    }

    async fn save_usage(&self, stats: &UsageStatistics) -> Result<(), TopologyError> {
        self.usage_store
            .save(stats)
            .await
            .map_err(|_| TopologyError::InvalidValue("failed to persist usage statistics".into()))
    }

    fn require_role(
        &self,
        topology: &Topology,
        caller: &Caller,
        required: Role,
    ) -> Result<(), TopologyError> {
        if topology.permissions.check_role(caller, required) {
            Ok(())
        } else {
            Err(TopologyError::Denied { required })
        }
    }

    /// Attempts to acquire `id`'s busy latch without waiting. A second
    /// mutating call against the same topology while one is already in
    /// flight rejects outright with `ENTITY_BUSY` rather than queuing
    /// behind the first — matching the "latch, not a lock" contract.
    fn acquire_busy(&self, id: TopologyId) -> Result<BusyGuard, TopologyError> {
        let latch = self
            .busy
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        latch
            .try_lock_owned()
            .map(BusyGuard)
            .map_err(|_| TopologyError::Busy)
    }
}
