//! Lifecycle Controller
//!
//! Drives the agent through install and activation. Installation
//! populates the static partition: the essential resource set is
//! all-or-nothing, the optional set is best-effort. Activation sweeps
//! every partition whose name is not currently whitelisted, then takes
//! control of open clients. A skip-ahead signal can force the
//! installed agent straight through activation.

use alloc::string::String;
use alloc::vec::Vec;
use spin::RwLock;

use crate::clients::ClientRegistry;
use crate::request::{Request, Response};
use crate::store::{PartitionStore, StoreError};
use crate::strategy::{NetworkBackend, NetworkError};

/// Lifecycle states. Transitions only move forward, except that a
/// failed installation returns the agent to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Loaded, nothing populated yet
    Idle,
    /// Install in progress
    Installing,
    /// Installed, waiting for activation
    Installed,
    /// Activation sweep in progress
    Activating,
    /// Controlling clients
    Active,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Installation failure. Any essential failure is fatal to the whole
/// install; the agent stays uninstalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    /// An essential resource could not be fetched.
    EssentialFetch { url: String, error: NetworkError },
    /// An essential resource came back with a non-cacheable status.
    EssentialStatus { url: String, status: u16 },
    /// An essential resource could not be stored.
    EssentialStore { url: String, error: StoreError },
    /// Install attempted from the wrong state.
    InvalidState(AgentState),
}

impl core::fmt::Display for InstallError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InstallError::EssentialFetch { url, error } => {
                write!(f, "essential resource {} unreachable: {}", url, error)
            }
            InstallError::EssentialStatus { url, status } => {
                write!(f, "essential resource {} returned status {}", url, status)
            }
            InstallError::EssentialStore { url, error } => {
                write!(f, "essential resource {} could not be stored: {}", url, error)
            }
            InstallError::InvalidState(state) => {
                write!(f, "install not possible in state {:?}", state)
            }
        }
    }
}

/// Invalid lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: AgentState,
    pub to: AgentState,
}

impl core::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid transition {:?} -> {:?}", self.from, self.to)
    }
}

/// What an activation sweep did.
#[derive(Debug, Clone, Default)]
pub struct ActivationReport {
    /// Partitions deleted because they were not whitelisted.
    pub removed_partitions: Vec<String>,
    /// Number of clients claimed.
    pub claimed_clients: usize,
}

/// The resources installation populates the static partition with.
#[derive(Debug, Clone, Default)]
pub struct InstallManifest {
    /// Must all be cached or installation fails.
    pub essential: Vec<String>,
    /// Cached best-effort; failures are logged and swallowed.
    pub optional: Vec<String>,
}

/// Check if a state transition is valid.
fn is_valid_transition(from: AgentState, to: AgentState) -> bool {
    use AgentState::*;
    matches!(
        (from, to),
        (Idle, Installing)
            | (Installing, Installed)
            | (Installing, Idle) // install failed
            | (Installed, Activating)
            | (Activating, Active)
    )
}

/// Lifecycle state machine plus the install/activate transition bodies.
pub struct LifecycleController {
    state: AgentState,
    /// Set by the skip-ahead signal; consumed when installation lands.
    skip_requested: bool,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self {
            state: AgentState::Idle,
            skip_requested: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Whether a skip-ahead was requested and not yet honored.
    pub fn skip_requested(&self) -> bool {
        self.skip_requested
    }

    /// Record the external skip-ahead signal.
    pub fn request_skip(&mut self) {
        self.skip_requested = true;
    }

    /// Apply a validated transition.
    pub fn transition(&mut self, to: AgentState) -> Result<(), InvalidTransition> {
        if !is_valid_transition(self.state, to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Populate the static partition. The essential set is fetched in
    /// full before anything is committed; optional resources follow
    /// individually and never abort the install.
    pub fn install(
        &mut self,
        store: &RwLock<PartitionStore>,
        static_partition: &str,
        origin: &str,
        manifest: &InstallManifest,
        net: &dyn NetworkBackend,
    ) -> Result<(), InstallError> {
        if self.state != AgentState::Idle {
            return Err(InstallError::InvalidState(self.state));
        }
        self.state = AgentState::Installing;

        match self.populate(store, static_partition, origin, manifest, net) {
            Ok(()) => {
                self.state = AgentState::Installed;
                log::info!(
                    "installed: {} essential, {} optional resources requested",
                    manifest.essential.len(),
                    manifest.optional.len()
                );
                Ok(())
            }
            Err(error) => {
                // Fatal: discard anything staged and stay uninstalled.
                store.write().delete_partition(static_partition);
                self.state = AgentState::Idle;
                Err(error)
            }
        }
    }

    fn populate(
        &mut self,
        store: &RwLock<PartitionStore>,
        static_partition: &str,
        origin: &str,
        manifest: &InstallManifest,
        net: &dyn NetworkBackend,
    ) -> Result<(), InstallError> {
        // Fetch every essential resource before committing any of them,
        // so a late failure cannot leave a partial essential set behind.
        let mut fetched: Vec<(String, Response)> = Vec::new();
        for url in &manifest.essential {
            let request = Request::get(url.clone(), origin);
            let response =
                net.fetch(&request)
                    .map_err(|error| InstallError::EssentialFetch {
                        url: url.clone(),
                        error,
                    })?;
            if !response.cacheable() {
                return Err(InstallError::EssentialStatus {
                    url: url.clone(),
                    status: response.status,
                });
            }
            fetched.push((url.clone(), response));
        }

        {
            let mut guard = store.write();
            for (url, response) in &fetched {
                guard
                    .put(static_partition, url, response)
                    .map_err(|error| InstallError::EssentialStore {
                        url: url.clone(),
                        error,
                    })?;
            }
        }

        for url in &manifest.optional {
            let request = Request::get(url.clone(), origin);
            match net.fetch(&request) {
                Ok(response) if response.cacheable() => {
                    if let Err(error) = store.write().put(static_partition, url, &response) {
                        log::warn!("optional resource {} not stored: {}", url, error);
                    }
                }
                Ok(response) => {
                    log::warn!("optional resource {} returned status {}", url, response.status);
                }
                Err(error) => {
                    log::warn!("optional resource {} unreachable: {}", url, error);
                }
            }
        }

        Ok(())
    }

    /// Sweep partitions and take control of clients. Every partition not
    /// named in `keep` is deleted; the sweep finishes before the state
    /// advances to `Active`, so no request can observe a partial set.
    pub fn activate(
        &mut self,
        store: &RwLock<PartitionStore>,
        keep: &[&str],
        clients: &mut ClientRegistry,
    ) -> Result<ActivationReport, InvalidTransition> {
        self.transition(AgentState::Activating)?;
        self.skip_requested = false;

        let mut report = ActivationReport::default();
        {
            let mut guard = store.write();
            for name in guard.partition_names() {
                if !keep.contains(&name.as_str()) {
                    guard.delete_partition(&name);
                    report.removed_partitions.push(name);
                }
            }
        }
        if !report.removed_partitions.is_empty() {
            log::info!(
                "activation swept {} stale partition(s)",
                report.removed_partitions.len()
            );
        }

        report.claimed_clients = clients.claim();
        self.transition(AgentState::Active)?;
        Ok(report)
    }
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    const ORIGIN: &str = "https://app.example";

    /// Backend that serves 200s for every URL except the listed ones.
    struct SelectiveNet {
        unreachable: Vec<String>,
    }

    impl SelectiveNet {
        fn all_up() -> Self {
            Self {
                unreachable: Vec::new(),
            }
        }

        fn down(urls: &[&str]) -> Self {
            Self {
                unreachable: urls.iter().map(|u| u.to_string()).collect(),
            }
        }
    }

    impl NetworkBackend for SelectiveNet {
        fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
            if self.unreachable.iter().any(|u| u == &request.url) {
                Err(NetworkError::Unreachable)
            } else {
                Ok(Response::new(200).with_body(request.url.as_bytes().to_vec()))
            }
        }
    }

    fn manifest() -> InstallManifest {
        InstallManifest {
            essential: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
            ],
            optional: vec!["/icon-192.png".to_string()],
        }
    }

    #[test]
    fn test_valid_transitions() {
        assert!(is_valid_transition(AgentState::Idle, AgentState::Installing));
        assert!(is_valid_transition(AgentState::Installing, AgentState::Installed));
        assert!(is_valid_transition(AgentState::Installing, AgentState::Idle));
        assert!(is_valid_transition(AgentState::Installed, AgentState::Activating));
        assert!(is_valid_transition(AgentState::Activating, AgentState::Active));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut controller = LifecycleController::new();
        let err = controller.transition(AgentState::Active).unwrap_err();
        assert_eq!(err.from, AgentState::Idle);
        assert_eq!(err.to, AgentState::Active);
    }

    #[test]
    fn test_install_populates_essentials() {
        let store = RwLock::new(PartitionStore::new());
        let mut controller = LifecycleController::new();
        controller
            .install(&store, "static-v1", ORIGIN, &manifest(), &SelectiveNet::all_up())
            .unwrap();

        assert_eq!(controller.state(), AgentState::Installed);
        let guard = store.read();
        assert!(guard.get("static-v1", "/").is_some());
        assert!(guard.get("static-v1", "/index.html").is_some());
        assert!(guard.get("static-v1", "/manifest.json").is_some());
    }

    #[test]
    fn test_optional_failure_does_not_abort_install() {
        let store = RwLock::new(PartitionStore::new());
        let mut controller = LifecycleController::new();
        controller
            .install(
                &store,
                "static-v1",
                ORIGIN,
                &manifest(),
                &SelectiveNet::down(&["/icon-192.png"]),
            )
            .unwrap();

        assert_eq!(controller.state(), AgentState::Installed);
        let guard = store.read();
        assert_eq!(guard.partition("static-v1").unwrap().len(), 3);
        assert!(guard.get("static-v1", "/icon-192.png").is_none());
    }

    #[test]
    fn test_essential_failure_aborts_install() {
        let store = RwLock::new(PartitionStore::new());
        let mut controller = LifecycleController::new();
        let err = controller
            .install(
                &store,
                "static-v1",
                ORIGIN,
                &manifest(),
                &SelectiveNet::down(&["/index.html"]),
            )
            .unwrap_err();

        assert!(matches!(err, InstallError::EssentialFetch { .. }));
        assert_eq!(controller.state(), AgentState::Idle);
        // No partial essential set survives.
        assert!(!store.read().has("static-v1"));
    }

    #[test]
    fn test_essential_bad_status_aborts_install() {
        struct NotFoundNet;
        impl NetworkBackend for NotFoundNet {
            fn fetch(&self, _request: &Request) -> Result<Response, NetworkError> {
                Ok(Response::new(404))
            }
        }
        let store = RwLock::new(PartitionStore::new());
        let mut controller = LifecycleController::new();
        let err = controller
            .install(&store, "static-v1", ORIGIN, &manifest(), &NotFoundNet)
            .unwrap_err();
        assert!(matches!(err, InstallError::EssentialStatus { status: 404, .. }));
        assert_eq!(controller.state(), AgentState::Idle);
    }

    #[test]
    fn test_install_twice_rejected() {
        let store = RwLock::new(PartitionStore::new());
        let mut controller = LifecycleController::new();
        controller
            .install(&store, "static-v1", ORIGIN, &manifest(), &SelectiveNet::all_up())
            .unwrap();
        let err = controller
            .install(&store, "static-v1", ORIGIN, &manifest(), &SelectiveNet::all_up())
            .unwrap_err();
        assert!(matches!(err, InstallError::InvalidState(AgentState::Installed)));
    }

    #[test]
    fn test_activation_sweeps_stale_partitions() {
        let store = RwLock::new(PartitionStore::new());
        {
            let mut guard = store.write();
            guard.open("static-v1");
            guard.open("static-v2");
            guard.open("runtime-v2");
            guard.open("images-old");
        }

        let mut controller = LifecycleController::new();
        let mut clients = ClientRegistry::new();
        controller
            .install(
                &store,
                "static-v2",
                ORIGIN,
                &InstallManifest::default(),
                &SelectiveNet::all_up(),
            )
            .unwrap();
        let report = controller
            .activate(&store, &["static-v2", "runtime-v2"], &mut clients)
            .unwrap();

        assert_eq!(controller.state(), AgentState::Active);
        let mut removed = report.removed_partitions.clone();
        removed.sort();
        assert_eq!(removed, vec!["images-old", "static-v1"]);
        let guard = store.read();
        assert!(guard.has("static-v2"));
        assert!(guard.has("runtime-v2"));
        assert!(!guard.has("static-v1"));
        assert!(!guard.has("images-old"));
    }

    #[test]
    fn test_activation_claims_clients() {
        let store = RwLock::new(PartitionStore::new());
        let mut controller = LifecycleController::new();
        let mut clients = ClientRegistry::new();
        clients.add("/", ORIGIN);
        clients.add("/quiz", ORIGIN);

        controller
            .install(
                &store,
                "static-v1",
                ORIGIN,
                &InstallManifest::default(),
                &SelectiveNet::all_up(),
            )
            .unwrap();
        let report = controller
            .activate(&store, &["static-v1", "runtime-v1"], &mut clients)
            .unwrap();
        assert_eq!(report.claimed_clients, 2);
    }

    #[test]
    fn test_activation_requires_installed() {
        let store = RwLock::new(PartitionStore::new());
        let mut controller = LifecycleController::new();
        let mut clients = ClientRegistry::new();
        let err = controller
            .activate(&store, &["static-v1"], &mut clients)
            .unwrap_err();
        assert_eq!(err.from, AgentState::Idle);
    }

    #[test]
    fn test_skip_request_flag() {
        let mut controller = LifecycleController::new();
        assert!(!controller.skip_requested());
        controller.request_skip();
        assert!(controller.skip_requested());
    }
}
