//! Offline Agent
//!
//! The process-wide agent value. It owns all mutable state behind
//! `spin::RwLock`s (one logical agent per origin; the host may drive it
//! from many concurrent invocations) and exposes exactly one entry
//! point per external signal: fetch interception, install, activation,
//! skip-ahead, sync trigger, push signal, notification interaction,
//! and the control channel.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use spin::RwLock;

use crate::channel::{self, ChannelError, ControlMessage, ControlReply};
use crate::classify::TrustPolicy;
use crate::clients::ClientRegistry;
use crate::lifecycle::{
    ActivationReport, AgentState, InstallError, InstallManifest, InvalidTransition,
    LifecycleController,
};
use crate::notify::{InteractionOutcome, NotificationDispatcher, NotificationRequest};
use crate::outbox::{DeliveryEndpoint, DeliveryQueue, SnapshotError, SyncError};
use crate::prompt::{InstallPrompt, PromptOutcome};
use crate::request::{Request, Response};
use crate::store::{PartitionName, PartitionStore, DEFAULT_QUOTA};
use crate::strategy::{FetchOutcome, NetworkBackend, RetrievalEngine};

/// Everything that parameterizes one agent instance.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// The agent's own origin.
    pub origin: String,
    /// Third-party origins whose responses may be intercepted.
    pub trusted_origins: Vec<String>,
    /// Static partition (install-time assets).
    pub static_partition: PartitionName,
    /// Runtime partition (request-time writes).
    pub runtime_partition: PartitionName,
    /// Resources that must all cache at install.
    pub essential_resources: Vec<String>,
    /// Resources cached best-effort at install.
    pub optional_resources: Vec<String>,
    /// Key of the cached document served as offline fallback.
    pub fallback_shell: String,
    /// Path opened when an interaction finds no open instance.
    pub default_entry: String,
    /// Action ID that dismisses a notification.
    pub dismiss_action: String,
    /// Default notification template.
    pub notification_template: NotificationRequest,
    /// Queue keys the sync trigger is matched against.
    pub queue_keys: Vec<String>,
    /// Partition store byte quota.
    pub store_quota: usize,
}

impl AgentConfig {
    /// A config with sensible defaults for the given origin.
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        Self {
            origin,
            trusted_origins: Vec::new(),
            static_partition: PartitionName::new("static", "v1"),
            runtime_partition: PartitionName::new("runtime", "v1"),
            essential_resources: Vec::new(),
            optional_resources: Vec::new(),
            fallback_shell: "/".to_string(),
            default_entry: "/".to_string(),
            dismiss_action: "dismiss".to_string(),
            notification_template: NotificationRequest::new("Update", "Something new is ready"),
            queue_keys: Vec::new(),
            store_quota: DEFAULT_QUOTA,
        }
    }
}

/// The offline-resilience agent.
pub struct OfflineAgent {
    config: AgentConfig,
    engine: RetrievalEngine,
    dispatcher: NotificationDispatcher,
    lifecycle: RwLock<LifecycleController>,
    store: RwLock<PartitionStore>,
    outbox: RwLock<DeliveryQueue>,
    clients: RwLock<ClientRegistry>,
    prompt: RwLock<InstallPrompt>,
}

impl OfflineAgent {
    /// Initialize an agent from its config. State starts empty; nothing
    /// is populated until the install signal arrives.
    pub fn new(config: AgentConfig) -> Self {
        let store = PartitionStore::with_quota(config.store_quota);
        Self::with_existing_store(config, store)
    }

    /// Initialize an agent over a pre-existing partition store. Cached
    /// partitions survive agent upgrades; anything a previous version
    /// left behind is swept at the next activation.
    pub fn with_existing_store(config: AgentConfig, store: PartitionStore) -> Self {
        let policy = TrustPolicy::new(config.origin.clone(), config.trusted_origins.clone());
        let engine = RetrievalEngine::new(
            policy,
            config.static_partition.full(),
            config.runtime_partition.full(),
            config.fallback_shell.clone(),
        );
        let dispatcher = NotificationDispatcher::new(
            config.notification_template.clone(),
            config.dismiss_action.clone(),
            config.origin.clone(),
            config.default_entry.clone(),
        );
        Self {
            config,
            engine,
            dispatcher,
            lifecycle: RwLock::new(LifecycleController::new()),
            store: RwLock::new(store),
            outbox: RwLock::new(DeliveryQueue::new()),
            clients: RwLock::new(ClientRegistry::new()),
            prompt: RwLock::new(InstallPrompt::new()),
        }
    }

    /// The agent's config.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AgentState {
        self.lifecycle.read().state()
    }

    /// The static partition's version identifier.
    pub fn version(&self) -> String {
        self.config.static_partition.version().to_string()
    }

    // ── Lifecycle signals ───────────────────────────────────

    /// Install signal: populate the static partition. If a skip-ahead
    /// arrived during installation, activation runs immediately after.
    pub fn install(&self, net: &dyn NetworkBackend) -> Result<(), InstallError> {
        let manifest = InstallManifest {
            essential: self.config.essential_resources.clone(),
            optional: self.config.optional_resources.clone(),
        };
        let skip = {
            let mut lifecycle = self.lifecycle.write();
            lifecycle.install(
                &self.store,
                &self.config.static_partition.full(),
                &self.config.origin,
                &manifest,
                net,
            )?;
            lifecycle.skip_requested()
        };
        if skip {
            if let Err(error) = self.activate() {
                log::warn!("skip-ahead activation failed: {}", error);
            }
        }
        Ok(())
    }

    /// Activation signal: sweep stale partitions, claim clients.
    pub fn activate(&self) -> Result<ActivationReport, InvalidTransition> {
        let static_name = self.config.static_partition.full();
        let runtime_name = self.config.runtime_partition.full();
        let keep: [&str; 2] = [static_name.as_str(), runtime_name.as_str()];
        let mut clients = self.clients.write();
        self.lifecycle
            .write()
            .activate(&self.store, &keep, &mut clients)
    }

    /// Skip-ahead signal: activate now if installed, or mark the intent
    /// so installation activates on completion.
    pub fn skip_waiting(&self) {
        let state = {
            let mut lifecycle = self.lifecycle.write();
            lifecycle.request_skip();
            lifecycle.state()
        };
        if state == AgentState::Installed {
            if let Err(error) = self.activate() {
                log::warn!("skip-ahead activation failed: {}", error);
            }
        }
    }

    // ── Interception boundary ───────────────────────────────

    /// Route one intercepted request through the strategy engine.
    pub fn handle_fetch(&self, request: &Request, net: &dyn NetworkBackend) -> FetchOutcome {
        self.engine.retrieve(&self.store, request, net)
    }

    // ── Deferred delivery ───────────────────────────────────

    /// Queue a locally-produced payload for later delivery.
    pub fn enqueue_deferred(&self, queue_key: &str, payload: Vec<u8>) {
        self.outbox.write().enqueue(queue_key, payload);
    }

    /// Sync trigger: drain the queue whose key matches `tag`. A tag the
    /// config does not know is ignored (logged at debug). Returns how
    /// many items were delivered.
    pub fn handle_sync(
        &self,
        tag: &str,
        endpoint: &dyn DeliveryEndpoint,
    ) -> Result<usize, SyncError> {
        if !self.config.queue_keys.iter().any(|k| k == tag) {
            log::debug!("sync trigger for unknown tag {}", tag);
            return Ok(0);
        }
        self.outbox.write().drain(tag, endpoint)
    }

    /// Items currently queued under a key.
    pub fn deferred_len(&self, queue_key: &str) -> usize {
        self.outbox.read().len(queue_key)
    }

    /// Serialize the outbox for persistence.
    pub fn snapshot_outbox(&self) -> Result<Vec<u8>, SnapshotError> {
        self.outbox.read().snapshot()
    }

    /// Replace the outbox with a restored snapshot.
    pub fn restore_outbox(&self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let restored = DeliveryQueue::restore(bytes)?;
        *self.outbox.write() = restored;
        Ok(())
    }

    // ── Notifications ───────────────────────────────────────

    /// Push signal: resolve the notification to display.
    pub fn handle_push(&self, payload: Option<&[u8]>) -> NotificationRequest {
        self.dispatcher.present(payload)
    }

    /// Notification interaction signal.
    pub fn handle_notification_click(&self, action_id: &str) -> InteractionOutcome {
        let mut clients = self.clients.write();
        self.dispatcher.interact(action_id, &mut clients)
    }

    // ── Control channel ─────────────────────────────────────

    /// Handle one control message. `GetVersion` is the only message
    /// with a reply.
    pub fn handle_message(
        &self,
        message: ControlMessage,
    ) -> Result<Option<ControlReply>, ChannelError> {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting();
                Ok(None)
            }
            ControlMessage::GetVersion => Ok(Some(ControlReply::Version {
                version: self.version(),
            })),
            ControlMessage::CacheData { payload } => {
                let bytes = channel::payload_bytes(&payload);
                let response = Response::new(200).with_body(bytes);
                let runtime = self.config.runtime_partition.full();
                self.store
                    .write()
                    .put(&runtime, channel::CACHE_DATA_KEY, &response)
                    .map_err(|error| {
                        log::warn!("cache-data write failed: {}", error);
                        ChannelError::CacheWrite(error.to_string())
                    })?;
                Ok(None)
            }
        }
    }

    // ── Clients ─────────────────────────────────────────────

    /// An application instance opened under the agent's scope.
    pub fn client_connected(&self, url: &str) -> u64 {
        self.clients.write().add(url, self.config.origin.clone())
    }

    /// An application instance closed.
    pub fn client_disconnected(&self, id: u64) -> bool {
        self.clients.write().remove(id)
    }

    /// Number of open instances.
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    // ── Install prompt collaborator ─────────────────────────

    /// Host signal: the application became installable.
    pub fn prompt_available(&self) {
        self.prompt.write().make_available();
    }

    /// Whether the UI may show its install control.
    pub fn is_prompt_available(&self) -> bool {
        self.prompt.read().available()
    }

    /// UI signal: the user answered the install prompt.
    pub fn record_prompt_outcome(&self, outcome: PromptOutcome) {
        self.prompt.write().record_outcome(outcome);
    }

    // ── Introspection (used by the host and tests) ──────────

    /// Run a closure against the partition store.
    pub fn with_store<R>(&self, f: impl FnOnce(&PartitionStore) -> R) -> R {
        f(&self.store.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::NetworkError;

    struct DownNet;

    impl NetworkBackend for DownNet {
        fn fetch(&self, _request: &Request) -> Result<Response, NetworkError> {
            Err(NetworkError::Unreachable)
        }
    }

    fn agent() -> OfflineAgent {
        OfflineAgent::new(AgentConfig::new("https://app.example"))
    }

    #[test]
    fn starts_idle() {
        assert_eq!(agent().state(), AgentState::Idle);
    }

    #[test]
    fn version_comes_from_static_partition() {
        let mut config = AgentConfig::new("https://app.example");
        config.static_partition = PartitionName::new("app-static", "v7");
        let agent = OfflineAgent::new(config);
        assert_eq!(agent.version(), "v7");

        let reply = agent.handle_message(ControlMessage::GetVersion).unwrap();
        assert_eq!(
            reply,
            Some(ControlReply::Version {
                version: "v7".to_string()
            })
        );
    }

    #[test]
    fn empty_manifest_install_succeeds_offline() {
        let agent = agent();
        agent.install(&DownNet).unwrap();
        assert_eq!(agent.state(), AgentState::Installed);
    }

    #[test]
    fn skip_waiting_before_install_activates_after() {
        let agent = agent();
        agent.skip_waiting();
        assert_eq!(agent.state(), AgentState::Idle);
        agent.install(&DownNet).unwrap();
        assert_eq!(agent.state(), AgentState::Active);
    }

    #[test]
    fn cache_data_message_overwrites_fixed_key() {
        let agent = agent();
        let first = ControlMessage::parse(br#"{"type":"CACHE_DATA","payload":{"n":1}}"#).unwrap();
        let second = ControlMessage::parse(br#"{"type":"CACHE_DATA","payload":{"n":2}}"#).unwrap();
        agent.handle_message(first).unwrap();
        agent.handle_message(second).unwrap();

        let runtime = agent.config().runtime_partition.full();
        agent.with_store(|store| {
            let entry = store.get(&runtime, channel::CACHE_DATA_KEY).unwrap();
            assert_eq!(entry.body, br#"{"n":2}"#);
        });
    }

    #[test]
    fn clients_connect_and_disconnect() {
        let agent = agent();
        let id = agent.client_connected("/");
        assert_eq!(agent.client_count(), 1);
        assert!(agent.client_disconnected(id));
        assert_eq!(agent.client_count(), 0);
    }

    #[test]
    fn prompt_signals() {
        let agent = agent();
        assert!(!agent.is_prompt_available());
        agent.prompt_available();
        assert!(agent.is_prompt_available());
        agent.record_prompt_outcome(PromptOutcome::Accepted);
        assert!(!agent.is_prompt_available());
    }
}
