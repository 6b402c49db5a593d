//! Deployment orchestrator (spec §4.8): fans out fetch, check, deliver,
//! and apply across all target hosts in parallel and aggregates a
//! per-host status map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

use crate::compiler::{self, Directive};
use crate::error::{FireletError, Result};
use crate::model::{FireSet, Host};
use crate::parsers::{self, InterfaceAddresses, IptablesSave};
use crate::reconcile;
use crate::session::SessionBackend;
use crate::slicer::{self, SlicedRules};

/// Per-host remote state, as specified in §3: `RemoteConf`.
#[derive(Debug, Clone)]
pub struct RemoteConf {
    pub iptables: IptablesSave,
    pub interfaces: InterfaceAddresses,
}

/// The outcome of a deployment for a single host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStatus {
    Ok,
    Error(FireletError),
}

pub type StatusMap = HashMap<String, HostStatus>;

pub struct Orchestrator {
    backend: Arc<dyn SessionBackend>,
    remote_user: String,
    op_timeout: Duration,
    step_deadline: Duration,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        remote_user: String,
        op_timeout: Duration,
        step_deadline: Duration,
    ) -> Orchestrator {
        Orchestrator {
            backend,
            remote_user,
            op_timeout,
            step_deadline,
        }
    }

    /// Runs the full compile-and-deploy pipeline (spec §4.8).
    ///
    /// Compile errors and reconciliation mismatches are raised once and
    /// abort the whole run (spec §7): a single host whose live
    /// interfaces don't match its declared row halts delivery to every
    /// host, mirroring the original's uncaught-exception-from-`_check_ifaces`
    /// behavior. Only per-host fetch/deliver/apply failures are captured
    /// into the returned status map instead of aborting.
    pub async fn deploy(&self, fireset: &FireSet) -> Result<StatusMap> {
        if fireset.is_dirty() {
            return Err(FireletError::ConfigurationDirty);
        }

        let compiled = compiler::compile(fireset)?;
        let mgmt = fireset.management_addresses();

        let fetched = self.fetch_all(&mgmt).await;

        let mut statuses: StatusMap = HashMap::new();
        for (name, _addr) in &mgmt {
            let status = match &fetched.get(name) {
                Some(Ok(_)) => HostStatus::Ok,
                Some(Err(e)) => HostStatus::Error(e.clone()),
                None => HostStatus::Error(FireletError::Unreachable(name.clone())),
            };
            statuses.insert(name.clone(), status);
        }

        let remote_ok: HashMap<String, RemoteConf> = fetched
            .into_iter()
            .filter_map(|(name, res)| res.ok().map(|conf| (name, conf)))
            .collect();

        self.check_all(fireset, &remote_ok)?;

        let ready_hosts: Vec<Host> = fireset
            .hosts
            .iter()
            .filter(|h| matches!(statuses.get(&h.name), Some(HostStatus::Ok)))
            .cloned()
            .collect();

        if ready_hosts.is_empty() {
            return Ok(statuses);
        }

        let sliced = slicer::slice(&ready_hosts, &compiled);

        let deliver_results = self.deliver_all(&sliced).await;
        for (host, res) in deliver_results {
            if let Err(e) = res {
                statuses.insert(host, HostStatus::Error(e));
            }
        }

        let apply_hosts: Vec<String> = ready_hosts
            .iter()
            .map(|h| h.name.clone())
            .filter(|name| matches!(statuses.get(name), Some(HostStatus::Ok)))
            .collect();

        let apply_results = self.apply_all(&apply_hosts).await;
        for (host, res) in apply_results {
            if let Err(e) = res {
                statuses.insert(host, HostStatus::Error(e));
            }
        }

        for (host, status) in &statuses {
            match status {
                HostStatus::Ok => info!(host = host.as_str(), "deployment succeeded"),
                HostStatus::Error(e) => error!(host = host.as_str(), error = %e, "deployment failed"),
            }
        }

        Ok(statuses)
    }

    /// Reconciles every successfully-fetched host's declared interface
    /// against its live state in one pass. A single mismatch aborts the
    /// whole pipeline (see `deploy`'s doc comment) rather than being
    /// recorded per host.
    fn check_all(&self, fireset: &FireSet, remote_ok: &HashMap<String, RemoteConf>) -> Result<()> {
        let ifaces_only: HashMap<String, InterfaceAddresses> = remote_ok
            .iter()
            .map(|(k, v)| (k.clone(), v.interfaces.clone()))
            .collect();

        let reachable_hosts: Vec<Host> = fireset
            .hosts
            .iter()
            .filter(|h| remote_ok.contains_key(&h.name))
            .cloned()
            .collect();

        reconcile::check_interfaces(&reachable_hosts, &ifaces_only)
    }

    /// Fan-out step: fetch live iptables/interface state from every
    /// host in parallel (spec §4.5, §4.6).
    async fn fetch_all(&self, mgmt: &[(String, std::net::Ipv4Addr)]) -> HashMap<String, Result<RemoteConf>> {
        let mut set = JoinSet::new();
        for (name, addr) in mgmt.iter().cloned() {
            let backend = Arc::clone(&self.backend);
            let user = self.remote_user.clone();
            set.spawn(async move {
                let res = Self::fetch_one(backend, &name, addr, &user).await;
                (name, res)
            });
        }
        self.drain(set, "fetch").await
    }

    async fn fetch_one(
        backend: Arc<dyn SessionBackend>,
        name: &str,
        addr: std::net::Ipv4Addr,
        user: &str,
    ) -> Result<RemoteConf> {
        backend.open(name, addr, user).await?;
        let iptables_lines = backend.run(name, "sudo /sbin/iptables-save").await;
        let addr_lines = backend.run(name, "/bin/ip addr show").await;
        backend.close(name).await;

        let iptables = parsers::parse_iptables_save(&iptables_lines?);
        let interfaces = parsers::parse_ip_addr_show(&addr_lines?);
        Ok(RemoteConf { iptables, interfaces })
    }

    /// Fan-out step: deliver the sliced ruleset to every host (spec §4.8.6, §6.1).
    async fn deliver_all(&self, sliced: &SlicedRules) -> HashMap<String, Result<()>> {
        let mut set = JoinSet::new();
        for (name, ifaces) in sliced {
            let backend = Arc::clone(&self.backend);
            let name = name.clone();
            let mut block = vec![
                format!("# Created by Firelet for host {name}"),
                "*filter".to_string(),
            ];
            for directives in ifaces.values() {
                block.extend(directives.iter().cloned());
            }
            block.push("COMMIT".to_string());

            set.spawn(async move {
                let res = backend.send_lines(&name, &block).await;
                (name, res)
            });
        }
        self.drain(set, "deliver").await
    }

    /// Fan-out step: apply the delivered ruleset on every host (spec §4.8.7).
    async fn apply_all(&self, hosts: &[String]) -> HashMap<String, Result<()>> {
        let mut set = JoinSet::new();
        for name in hosts.iter().cloned() {
            let backend = Arc::clone(&self.backend);
            set.spawn(async move {
                let res = backend
                    .run(&name, "iptables-restore < /tmp/newiptables")
                    .await
                    .map(|_| ());
                (name, res)
            });
        }
        self.drain(set, "apply").await
    }

    /// Waits for all tasks to complete, enforcing the step's wall-clock
    /// deadline (spec §5); outstanding tasks are aborted on expiry.
    async fn drain<T: Send + 'static>(&self, mut set: JoinSet<(String, T)>, step: &str) -> HashMap<String, T> {
        let mut out = HashMap::new();
        let deadline = self.step_deadline;
        let result = timeout(deadline, async {
            while let Some(joined) = set.join_next().await {
                if let Ok((host, value)) = joined {
                    out.insert(host, value);
                }
            }
        })
        .await;

        if result.is_err() {
            warn!(step, "step deadline exceeded, aborting outstanding tasks");
            set.abort_all();
            while set.join_next().await.is_some() {}
        }
        out
    }
}

/// Emitted per-host for callers wanting compiled rules without
/// deploying (spec §6.5 `compile_per_host`).
pub fn compile_per_host(fireset: &FireSet) -> Result<SlicedRules> {
    let compiled: Vec<Directive> = compiler::compile(fireset)?;
    Ok(slicer::slice(&fireset.hosts, &compiled))
}
