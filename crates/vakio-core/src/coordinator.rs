// ── Device coordinator ──
//
// Owns one device's broker link and state store. Handles login, the
// optional refresh hook, and serialized command execution, and exposes
// typed getters plus reconciled setters to the entities.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use vakio_api::{MqttSession, SessionHandlers, SessionState};

use crate::command::{Command, CommandEnvelope, CommandPublisher, CommandResult};
use crate::config::DeviceConfig;
use crate::error::CoreError;
use crate::link::BrokerLink;
use crate::model::{
    AttributeValue, DeviceAttribute, GatePosition, PowerState, Preset, SpeedOrdinal, Workmode,
};
use crate::reconcile::{self, FanSnapshot};
use crate::store::{DeviceCondition, DeviceStore};
use crate::stream::ConditionStream;

const COMMAND_CHANNEL_SIZE: usize = 16;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── Coordinator ──────────────────────────────────────────────────────

/// Shared hub for one device.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Every entity of a device
/// holds a clone; the link and store are created and torn down with it.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: DeviceConfig,
    store: Arc<DeviceStore>,
    link: Arc<dyn BrokerLink>,
    publisher: CommandPublisher,
    connection_state: watch::Sender<ConnectionState>,
    command_tx: Mutex<mpsc::Sender<CommandEnvelope>>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    /// Child token for the current login, replaced on every login.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Change cursor consumed by [`Coordinator::refresh`].
    refresh_cursor: std::sync::Mutex<ConditionStream>,
}

impl Coordinator {
    /// Create a coordinator backed by an MQTT session. Does NOT connect;
    /// call [`login()`](Self::login).
    pub fn new(config: DeviceConfig) -> Self {
        let store = Arc::new(DeviceStore::new(config.topic.clone()));

        let handlers = {
            let store = Arc::clone(&store);
            let prefix = config.topic.clone();
            SessionHandlers {
                on_message: Arc::new(move |topic, payload| {
                    store.apply_message(topic, payload);
                }),
                on_connect: Arc::new(move || {
                    debug!(prefix = %prefix, "subscribed to device topics");
                }),
            }
        };
        let session = MqttSession::new(config.transport(), store.topics(), handlers);

        Self::assemble(config, store, Arc::new(session))
    }

    /// Create a coordinator over an arbitrary link. Inbound telemetry must
    /// then be fed through [`store()`](Self::store).
    pub fn with_link(config: DeviceConfig, link: Arc<dyn BrokerLink>) -> Self {
        let store = Arc::new(DeviceStore::new(config.topic.clone()));
        Self::assemble(config, store, link)
    }

    fn assemble(config: DeviceConfig, store: Arc<DeviceStore>, link: Arc<dyn BrokerLink>) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();
        let publisher = CommandPublisher::new(config.topic.clone(), Arc::clone(&link));
        let refresh_cursor = std::sync::Mutex::new(store.subscribe());

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                store,
                link,
                publisher,
                connection_state,
                command_tx: Mutex::new(command_tx),
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
                refresh_cursor,
            }),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Connect to the broker and start the background tasks.
    ///
    /// An unreachable broker maps to `ConnectionFailed`, a refused login to
    /// `AuthenticationFailed`, malformed options to `Config`.
    pub async fn login(&self) -> Result<(), CoreError> {
        let state = *self.inner.connection_state.borrow();
        match state {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Disconnected => {}
            // A link lost mid-session still owns its background tasks.
            ConnectionState::Connecting | ConnectionState::Failed => {
                self.disconnect().await;
            }
        }
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let accepted = match self.inner.link.connect().await {
            Ok(accepted) => accepted,
            Err(e) => {
                self.inner.connection_state.send_replace(ConnectionState::Failed);
                return Err(e.into());
            }
        };
        if !accepted {
            self.inner.connection_state.send_replace(ConnectionState::Failed);
            let failure = self.inner.link.take_failure();
            if let Some(e) = &failure {
                warn!(
                    broker = %self.inner.config.address(),
                    error = %e,
                    retryable = e.is_transient(),
                    "login failed"
                );
            }
            return Err(connect_error(&self.inner.config, failure));
        }

        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let coordinator = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(command_processor_task(coordinator, rx, cancel)));
        }

        let interval = self.inner.config.refresh_interval;
        if !interval.is_zero() {
            let coordinator = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(refresh_task(coordinator, interval, cancel)));
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Connected);

        if let Some(link_state) = self.inner.link.subscribe_state() {
            let coordinator = self.clone();
            handles.push(tokio::spawn(link_state_task(coordinator, link_state, child)));
        }
        drop(handles);

        info!(
            broker = %self.inner.config.address(),
            prefix = %self.inner.config.topic,
            "connected to device"
        );
        Ok(())
    }

    /// Stop background tasks and close the link.
    ///
    /// Safe to call before `login`, after a failed `login`, and more than
    /// once. A later `login` starts over.
    pub async fn disconnect(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        drop(handles);

        self.inner.link.disconnect().await;

        // Fresh channel so a later login can spawn a new processor. The
        // state flips under the sender lock; `execute` checks it there.
        {
            let mut command_tx = self.inner.command_tx.lock().await;
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
            *command_tx = tx;
            *self.inner.command_rx.lock().await = Some(rx);
            self.inner
                .connection_state
                .send_replace(ConnectionState::Disconnected);
        }
        debug!("disconnected");
    }

    /// Check that `config` reaches a broker that accepts its credentials.
    ///
    /// Connects a throwaway session with no subscriptions and closes it.
    pub async fn probe(config: &DeviceConfig) -> Result<(), CoreError> {
        let session = MqttSession::new(config.transport(), Vec::new(), SessionHandlers::noop());
        let accepted = session.connect().await?;
        let failure = session.take_failure();
        session.disconnect().await;

        if accepted {
            Ok(())
        } else {
            Err(connect_error(config, failure))
        }
    }

    /// Refresh hook for an external timer.
    ///
    /// Telemetry arrives by push, so this only stamps the store and reports
    /// whether anything arrived since the previous call.
    pub fn refresh(&self) -> bool {
        let changed = self
            .inner
            .refresh_cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_change();
        self.inner.store.mark_refreshed();
        if changed {
            debug!("device condition changed since last refresh");
        } else {
            trace!("refresh: no new telemetry");
        }
        changed
    }

    // ── Command execution ────────────────────────────────────────────

    /// Execute a command against the device.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result. Commands run one at a time.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let command_tx = {
            let guard = self.inner.command_tx.lock().await;
            if !self.is_connected() {
                return Err(CoreError::Disconnected);
            }
            guard.clone()
        };

        let (tx, rx) = tokio::sync::oneshot::channel();

        command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        rx.await.map_err(|_| CoreError::Disconnected)?
    }

    async fn send(&self, cmd: Command) -> Result<bool, CoreError> {
        Ok(self.execute(cmd).await?.is_sent())
    }

    // ── One-shot convenience ─────────────────────────────────────────

    /// One-shot: login, run closure, disconnect.
    ///
    /// Disables the refresh hook since the closure runs once.
    pub async fn oneshot<F, Fut, T>(config: DeviceConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Coordinator) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.refresh_interval = Duration::ZERO;

        let coordinator = Coordinator::new(cfg);
        coordinator.login().await?;
        let result = f(coordinator.clone()).await;
        coordinator.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connection_state.borrow() == ConnectionState::Connected
    }

    /// Subscribe to condition changes.
    pub fn subscribe(&self) -> ConditionStream {
        self.inner.store.subscribe()
    }

    /// Wait until every attribute has reported or `timeout` elapses, and
    /// return whatever is known by then.
    pub async fn wait_for_condition(&self, timeout: Duration) -> DeviceCondition {
        let mut stream = self.inner.store.subscribe();
        let wait = async {
            if stream.current().is_complete() {
                return;
            }
            while let Some(cond) = stream.changed().await {
                if cond.is_complete() {
                    return;
                }
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_err() {
            debug!(?timeout, "not every attribute reported in time");
        }
        self.inner.store.snapshot()
    }

    // ── Getters ──────────────────────────────────────────────────────

    pub fn condition(&self) -> DeviceCondition {
        self.inner.store.snapshot()
    }

    pub fn raw(&self, attribute: DeviceAttribute) -> Option<String> {
        self.inner.store.read(attribute)
    }

    pub fn speed(&self) -> Option<SpeedOrdinal> {
        self.inner.store.with_condition(DeviceCondition::speed)
    }

    pub fn gate(&self) -> Option<GatePosition> {
        self.inner.store.with_condition(DeviceCondition::gate)
    }

    pub fn state(&self) -> Option<PowerState> {
        self.inner.store.with_condition(DeviceCondition::power)
    }

    pub fn workmode(&self) -> Option<Workmode> {
        self.inner.store.with_condition(DeviceCondition::workmode)
    }

    pub fn is_on(&self) -> Option<bool> {
        reconcile::is_on(self.state())
    }

    pub fn percentage(&self) -> Option<u8> {
        reconcile::speed_to_percentage(self.speed())
    }

    pub fn preset(&self) -> Option<Preset> {
        self.inner
            .store
            .with_condition(|c| reconcile::derive_preset(c.workmode(), c.gate()))
    }

    pub fn fan_snapshot(&self) -> FanSnapshot {
        self.inner.store.with_condition(FanSnapshot::derive)
    }

    // ── Plain setters ────────────────────────────────────────────────
    //
    // One publish each, no reconciliation. `Ok(true)` when it went out.

    pub async fn set_speed(&self, speed: SpeedOrdinal) -> Result<bool, CoreError> {
        self.send(Command::Set(AttributeValue::Speed(speed))).await
    }

    pub async fn set_gate(&self, gate: GatePosition) -> Result<bool, CoreError> {
        self.send(Command::Set(AttributeValue::Gate(gate))).await
    }

    pub async fn set_state(&self, state: PowerState) -> Result<bool, CoreError> {
        self.send(Command::Set(AttributeValue::Power(state))).await
    }

    pub async fn set_workmode(&self, workmode: Workmode) -> Result<bool, CoreError> {
        self.send(Command::Set(AttributeValue::Workmode(workmode))).await
    }

    // ── Reconciled setters ───────────────────────────────────────────

    /// `Ok(false)` without publishing when the device already reports on.
    pub async fn turn_on(&self) -> Result<bool, CoreError> {
        self.send(Command::TurnOn).await
    }

    /// `Ok(false)` without publishing when the device already reports off.
    pub async fn turn_off(&self) -> Result<bool, CoreError> {
        self.send(Command::TurnOff).await
    }

    /// 0% turns off; otherwise turns on if needed and sets the band's speed.
    pub async fn set_percentage(&self, percentage: u8) -> Result<bool, CoreError> {
        reconcile::percentage_to_speed(percentage)?;
        self.send(Command::SetPercentage(percentage)).await
    }

    /// Select a preset by label. Unknown labels fail before anything is sent.
    pub async fn set_preset(&self, label: &str) -> Result<bool, CoreError> {
        let preset: Preset = label.parse()?;
        self.apply_preset(preset).await
    }

    pub async fn apply_preset(&self, preset: Preset) -> Result<bool, CoreError> {
        self.send(Command::SetPreset(preset)).await
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("broker", &self.inner.config.address())
            .field("prefix", &self.inner.config.topic)
            .field("state", &*self.inner.connection_state.borrow())
            .finish_non_exhaustive()
    }
}

fn connect_error(config: &DeviceConfig, failure: Option<vakio_api::Error>) -> CoreError {
    failure.map_or_else(
        || CoreError::ConnectionFailed {
            address: config.address(),
            reason: "broker did not accept the connection".into(),
        },
        CoreError::from,
    )
}

// ── Background tasks ─────────────────────────────────────────────────

/// Periodically run the refresh hook.
async fn refresh_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                coordinator.refresh();
            }
        }
    }
}

/// Mirror the link's lifecycle into the coordinator's connection state.
///
/// Ends once the link is gone for good; the next `login` starts over.
async fn link_state_task(
    coordinator: Coordinator,
    mut link_state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
) {
    loop {
        let state = match *link_state.borrow_and_update() {
            SessionState::Connected => Some(ConnectionState::Connected),
            SessionState::Reconnecting => Some(ConnectionState::Connecting),
            SessionState::Closed => Some(ConnectionState::Failed),
            SessionState::Idle | SessionState::Connecting => None,
        };
        if let Some(state) = state {
            coordinator.inner.connection_state.send_if_modified(|current| {
                let changed = *current != state;
                *current = state;
                changed
            });
            if state == ConnectionState::Failed {
                warn!(broker = %coordinator.inner.config.address(), "broker link lost");
                break;
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = link_state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

/// Process commands from the mpsc channel one at a time.
async fn command_processor_task(
    coordinator: Coordinator,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&coordinator, envelope.command).await;
                if envelope.response_tx.send(result).is_err() {
                    trace!("command caller went away before the result");
                }
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────────

/// Plan a command against the current condition and publish the plan.
async fn route_command(coordinator: &Coordinator, cmd: Command) -> Result<CommandResult, CoreError> {
    let condition = coordinator.inner.store.snapshot();

    let plan = match &cmd {
        Command::Set(value) => vec![*value],
        Command::TurnOn => reconcile::turn_on_plan(condition.power()),
        Command::TurnOff => reconcile::turn_off_plan(condition.power()),
        Command::SetPercentage(pct) => reconcile::percentage_plan(*pct, condition.power())?,
        Command::SetPreset(preset) => reconcile::preset_plan(*preset, condition.workmode()),
    };
    debug!(?cmd, steps = plan.len(), "executing command");

    let result = coordinator.inner.publisher.run(plan).await;
    match &result {
        CommandResult::Failed {
            attribute,
            published,
        } => warn!(
            ?cmd,
            %attribute,
            sent = published.len(),
            "command abandoned after publish failure"
        ),
        CommandResult::Unchanged => debug!(?cmd, "device already in requested state"),
        CommandResult::Sent { .. } => {}
    }
    Ok(result)
}
