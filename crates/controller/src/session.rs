//! Team session: owns the team, serializes authoring, runs goals.
//!
//! The team lives behind an `Arc` snapshot. Authoring operations build a new
//! snapshot and swap it in; a run holds the snapshot it started with, so it
//! never observes a half-edited team.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use bouncer_core::{
    traits::RunObserver,
    types::{AgentPatch, AgentSpec, RosterEntry},
    Error, Result,
};

use crate::coordinator::{build_coordinator, CoordinatorAgent};
use crate::delegation::normalize_tool_name;
use crate::factory::AgentFactory;
use crate::orchestrator::Orchestrator;
use crate::specialist::SpecialistAgent;

/// Immutable view of a team.
pub struct Team {
    pub specs: Vec<AgentSpec>,
    pub agents: Vec<Arc<SpecialistAgent>>,
    pub coordinator: Arc<CoordinatorAgent>,
}

impl Team {
    fn assemble(specs: Vec<AgentSpec>, agents: Vec<Arc<SpecialistAgent>>, delegation_timeout: Duration) -> Self {
        let coordinator = Arc::new(build_coordinator(&agents, delegation_timeout));
        Self {
            specs,
            agents,
            coordinator,
        }
    }
}

/// Decrements the running counter when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicUsize);

impl<'a> RunGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One orchestration session: a team plus the means to run it.
pub struct TeamSession {
    factory: AgentFactory,
    orchestrator: Orchestrator,
    team: RwLock<Option<Arc<Team>>>,
    authoring: tokio::sync::Mutex<()>,
    running: AtomicUsize,
    cancel: Mutex<CancellationToken>,
}

impl TeamSession {
    pub(crate) fn new(factory: AgentFactory, orchestrator: Orchestrator) -> Self {
        Self {
            factory,
            orchestrator,
            team: RwLock::new(None),
            authoring: tokio::sync::Mutex::new(()),
            running: AtomicUsize::new(0),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Current team, if one has been created.
    pub fn snapshot(&self) -> Option<Arc<Team>> {
        self.team
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swap in a new team. Callers hold the authoring lock, which `run` also
    /// takes to start, so the idle check here cannot race a run starting.
    fn commit(&self, team: Option<Team>) -> Result<()> {
        self.ensure_idle()?;
        self.replace(team);
        Ok(())
    }

    fn replace(&self, team: Option<Team>) {
        *self
            .team
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = team.map(Arc::new);
    }

    fn require_team(&self) -> Result<Arc<Team>> {
        self.snapshot()
            .ok_or_else(|| Error::invalid_request("no team has been created"))
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_running() {
            Err(Error::TeamBusy)
        } else {
            Ok(())
        }
    }

    pub fn has_team(&self) -> bool {
        self.snapshot().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) > 0
    }

    pub fn specs(&self) -> Vec<AgentSpec> {
        self.snapshot().map(|t| t.specs.clone()).unwrap_or_default()
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.snapshot()
            .map(|t| t.coordinator.roster().to_vec())
            .unwrap_or_default()
    }

    pub fn agents(&self) -> Vec<Arc<SpecialistAgent>> {
        self.snapshot().map(|t| t.agents.clone()).unwrap_or_default()
    }

    pub fn coordinator(&self) -> Option<Arc<CoordinatorAgent>> {
        self.snapshot().map(|t| t.coordinator.clone())
    }

    // =========================================================================
    // Authoring
    // =========================================================================

    /// Replace the whole team. Agents are created one by one, in order.
    pub async fn create_team(&self, specs: Vec<AgentSpec>) -> Result<()> {
        let _authoring = self.authoring.lock().await;
        self.ensure_idle()?;
        if specs.is_empty() {
            return Err(Error::invalid_request("a team needs at least one member"));
        }
        check_unique_names(&specs)?;

        tracing::info!(members = specs.len(), "Creating team");
        let mut agents = Vec::with_capacity(specs.len());
        for spec in &specs {
            agents.push(Arc::new(self.factory.create_agent(spec.clone()).await?));
        }

        self.commit(Some(Team::assemble(specs, agents, self.delegation_timeout())))?;
        tracing::info!("Team ready");
        Ok(())
    }

    /// Rebuild one member from a patch; every other member is kept as is.
    pub async fn update_agent(&self, patch: AgentPatch) -> Result<()> {
        let (index, spec) = patch.into_spec();
        let _authoring = self.authoring.lock().await;
        self.ensure_idle()?;
        let team = self.require_team()?;
        if index >= team.specs.len() {
            return Err(Error::InvalidAgentIndex {
                index,
                len: team.specs.len(),
            });
        }

        let mut specs = team.specs.clone();
        specs[index] = spec.clone();
        check_unique_names(&specs)?;

        tracing::info!(index, agent = %spec.name, "Updating agent");
        let agent = Arc::new(self.factory.create_agent(spec).await?);
        let mut agents = team.agents.clone();
        agents[index] = agent;

        self.commit(Some(Team::assemble(specs, agents, self.delegation_timeout())))
    }

    /// Append a member.
    pub async fn add_agent(&self, spec: AgentSpec) -> Result<()> {
        let _authoring = self.authoring.lock().await;
        self.ensure_idle()?;
        let team = self.require_team()?;

        let mut specs = team.specs.clone();
        specs.push(spec.clone());
        check_unique_names(&specs)?;

        tracing::info!(agent = %spec.name, "Adding agent");
        let mut agents = team.agents.clone();
        agents.push(Arc::new(self.factory.create_agent(spec).await?));

        self.commit(Some(Team::assemble(specs, agents, self.delegation_timeout())))
    }

    /// Remove a member. The last member cannot be removed; use `reset`.
    pub async fn remove_agent(&self, index: usize) -> Result<AgentSpec> {
        let _authoring = self.authoring.lock().await;
        self.ensure_idle()?;
        let team = self.require_team()?;
        if index >= team.specs.len() {
            return Err(Error::InvalidAgentIndex {
                index,
                len: team.specs.len(),
            });
        }
        if team.specs.len() == 1 {
            return Err(Error::invalid_request("cannot remove the last team member"));
        }

        let mut specs = team.specs.clone();
        let removed = specs.remove(index);
        let mut agents = team.agents.clone();
        agents.remove(index);

        tracing::info!(index, agent = %removed.name, "Removing agent");
        self.commit(Some(Team::assemble(specs, agents, self.delegation_timeout())))?;
        Ok(removed)
    }

    /// Drop the team. Fails while a run is in flight.
    pub async fn reset(&self) -> Result<()> {
        let _authoring = self.authoring.lock().await;
        self.ensure_idle()?;
        self.commit(None)?;
        tracing::info!("Team reset");
        Ok(())
    }

    /// Cancel any in-flight run, then drop the team.
    pub async fn dispose(&self) {
        self.cancel();
        let _authoring = self.authoring.lock().await;
        self.replace(None);
        tracing::info!("Session disposed");
    }

    // =========================================================================
    // Running
    // =========================================================================

    /// Run `goal` against the current team.
    ///
    /// Waits for any authoring operation in progress, then holds the snapshot
    /// taken at start for the whole run.
    pub async fn run(&self, goal: &str, observer: &dyn RunObserver) -> Result<String> {
        let (team, cancel, _running) = {
            let _authoring = self.authoring.lock().await;
            let team = self.require_team()?;
            let cancel = lock(&self.cancel).child_token();
            (team, cancel, RunGuard::enter(&self.running))
        };

        self.orchestrator
            .run(&team.coordinator, goal, observer, &cancel)
            .await
    }

    /// Cancel every in-flight run. Later runs are unaffected.
    pub fn cancel(&self) {
        let mut parent = lock(&self.cancel);
        if self.is_running() {
            tracing::info!("Cancelling in-flight runs");
        }
        parent.cancel();
        *parent = CancellationToken::new();
    }

    fn delegation_timeout(&self) -> Duration {
        self.orchestrator.limits().delegation_timeout
    }
}

/// Member names must stay distinct as tool identifiers.
fn check_unique_names(specs: &[AgentSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in specs {
        let name = normalize_tool_name(&spec.name);
        if !seen.insert(name.clone()) {
            return Err(Error::invalid_request(format!(
                "duplicate team member name '{}'",
                name
            )));
        }
    }
    Ok(())
}
