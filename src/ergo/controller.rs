//! Command dispatcher: login, single-shot writes and repeat sessions.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::auth::{AuthProvider, StaticAuth};
use super::protocol::{command_frame, login_frame};
use super::repeat::{RepeatOptions, RepeatTimer};
use super::sequence::MessageSequence;
use super::session::{Connector, Session, TcpConnector};
use crate::config::AppConfig;
use crate::error::{DriverError, Result};

/// Cadence between cycles when the caller gives no wait.
pub const DEFAULT_REPEAT_WAIT: Duration = Duration::from_millis(300);

/// What a dispatch call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// One command frame was written.
    Sent,
    /// A repeat session was started.
    Repeating,
    /// Nothing was sent.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The credential provider had no session to offer.
    NoCredentials,
}

/// Operations a device controller offers.
#[async_trait]
pub trait Controller: Send + Sync {
    async fn write_command(&self, command: u32, options: RepeatOptions) -> Result<Dispatch> {
        self.write_commands(&[command], options).await
    }

    async fn write_commands(&self, commands: &[u32], options: RepeatOptions) -> Result<Dispatch>;

    async fn cancel_commands(&self);
}

enum RepeatSlot {
    Idle,
    Active { id: u64, timer: RepeatTimer },
}

/// Sends commands to one device.
///
/// At most one repeat session is alive per dispatcher: every dispatch first
/// cancels and awaits the previous session.
pub struct CommandDispatcher {
    device_id: u32,
    auth: Arc<dyn AuthProvider>,
    connector: Arc<dyn Connector>,
    sequence: Arc<MessageSequence>,
    default_wait: Duration,
    slot: Arc<Mutex<RepeatSlot>>,
    next_session_id: AtomicU64,
    dispatch_lock: Mutex<()>,
}

impl CommandDispatcher {
    pub fn new(device_id: u32, auth: Arc<dyn AuthProvider>, connector: Arc<dyn Connector>) -> Self {
        Self {
            device_id,
            auth,
            connector,
            sequence: MessageSequence::global(),
            default_wait: DEFAULT_REPEAT_WAIT,
            slot: Arc::new(Mutex::new(RepeatSlot::Idle)),
            next_session_id: AtomicU64::new(1),
            dispatch_lock: Mutex::new(()),
        }
    }

    /// Dispatcher for the configured device, over TCP with stored credentials.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.device.id,
            Arc::new(StaticAuth::from_config(&config.account)),
            Arc::new(TcpConnector::from_config(&config.device)),
        )
        .with_default_wait(Duration::from_millis(config.repeat.default_wait_ms))
    }

    /// Load the config file at `path` and build a dispatcher from it.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = AppConfig::load(path)?;
        Ok(Self::from_config(&config))
    }

    /// Use a dedicated message id counter instead of the process-wide one.
    pub fn with_sequence(mut self, sequence: Arc<MessageSequence>) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_default_wait(mut self, wait: Duration) -> Self {
        self.default_wait = wait;
        self
    }

    /// Whether a repeat session is still running.
    pub async fn is_repeating(&self) -> bool {
        match &*self.slot.lock().await {
            RepeatSlot::Active { timer, .. } => !timer.is_finished(),
            RepeatSlot::Idle => false,
        }
    }

    /// Wait until the current repeat session (if any) stops.
    pub async fn wait_for_repeat(&self) {
        let mut done = match &*self.slot.lock().await {
            RepeatSlot::Active { timer, .. } => timer.subscribe(),
            RepeatSlot::Idle => return,
        };
        let _ = done.wait_for(|outcome| outcome.is_some()).await;
    }

    async fn cancel_active(&self) {
        let previous = std::mem::replace(&mut *self.slot.lock().await, RepeatSlot::Idle);
        if let RepeatSlot::Active { id, timer } = previous {
            info!("Cancelling repeat session {id}");
            timer.cancel().await;
            debug!("Repeat session {id} stopped");
        }
    }

    async fn start_repeat(&self, session: Box<dyn Session>, commands: Vec<u32>, options: RepeatOptions) {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let wait = options.wait_or(self.default_wait);
        info!(
            "Starting repeat session {id}: commands={commands:?} count={:?} wait={wait:?}",
            options.count
        );

        let session = Arc::new(Mutex::new(session));
        let sequence = self.sequence.clone();
        let device_id = self.device_id;
        let action = move |command: u32| {
            let session = session.clone();
            let sequence = sequence.clone();
            async move {
                let frame = command_frame(&sequence, device_id, command)?;
                let mut session = session.lock().await;
                session.write(&frame).await
            }
        };

        let slot = self.slot.clone();
        let on_finish = move || async move {
            let mut slot = slot.lock().await;
            if matches!(&*slot, RepeatSlot::Active { id: active, .. } if *active == id) {
                *slot = RepeatSlot::Idle;
                info!("Repeat session {id} finished");
            }
        };

        // Hold the slot while spawning so a fast session cannot finish before
        // it is installed.
        let mut slot = self.slot.lock().await;
        let timer = RepeatTimer::spawn(commands, options.count, wait, action, on_finish);
        *slot = RepeatSlot::Active { id, timer };
    }
}

#[async_trait]
impl Controller for CommandDispatcher {
    async fn write_commands(&self, commands: &[u32], options: RepeatOptions) -> Result<Dispatch> {
        if commands.is_empty() {
            return Err(DriverError::invalid_command("no commands given"));
        }
        if options.count == Some(0) {
            return Err(DriverError::invalid_command("repeat count must be at least 1"));
        }

        let _dispatch = self.dispatch_lock.lock().await;
        self.cancel_active().await;

        let Some(details) = self.auth.auth_details().await? else {
            warn!("No credentials available, skipping {} command(s)", commands.len());
            return Ok(Dispatch::Skipped(SkipReason::NoCredentials));
        };

        let login = login_frame(details.user_id, &details.authorize)?;
        let mut session = self.connector.connect(login).await?;

        if let ([command], true) = (commands, options.is_unset()) {
            let frame = command_frame(&self.sequence, self.device_id, *command)?;
            session.write(&frame).await?;
            info!("Sent command {command} to device {}", self.device_id);
            return Ok(Dispatch::Sent);
        }

        self.start_repeat(session, commands.to_vec(), options).await;
        Ok(Dispatch::Repeating)
    }

    async fn cancel_commands(&self) {
        self.cancel_active().await;
    }
}

impl Drop for CommandDispatcher {
    fn drop(&mut self) {
        if let Ok(slot) = self.slot.try_lock() {
            if let RepeatSlot::Active { timer, .. } = &*slot {
                timer.request_cancel();
            }
        }
    }
}
