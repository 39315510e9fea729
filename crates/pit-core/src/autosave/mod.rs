//! Debounced autosave for free-text fields.
//!
//! Each field has a baseline (the last value the server confirmed) and a
//! save status published through a watch channel. Typing re-arms a debounce
//! timer; when it fires, the commit runs as its own task so that later
//! edits, which only cancel the timer, never abort a request already sent.
//!
//! A response is applied only if the coordinator has not been reset or shut
//! down since the request was dispatched. A response for a field that was
//! edited again meanwhile updates the baseline but leaves the status to the
//! newer edit.

pub mod fields;

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pit_api::error::ApiError;

pub use fields::{ChecklistNotes, NotesField, PlanField, PlanObjectives};

/// Save status of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error(String),
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Saving => f.write_str("saving"),
            Self::Saved => f.write_str("saved"),
            Self::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Autosave timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before committing.
    pub debounce: Duration,
    /// How long `saved` is shown before returning to `idle`.
    pub saved_window: Duration,
}

impl AutosaveConfig {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);
    pub const DEFAULT_SAVED_WINDOW: Duration = Duration::from_secs(2);

    /// Shorter debounce used for checklist notes.
    pub fn notes() -> Self {
        Self {
            debounce: Duration::from_millis(600),
            ..Self::default()
        }
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Self::DEFAULT_DEBOUNCE,
            saved_window: Self::DEFAULT_SAVED_WINDOW,
        }
    }
}

/// Sends one field value to the server.
#[async_trait]
pub trait FieldCommitter: Send + Sync + 'static {
    type Field: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Save `value` and return the value the server stored, which may be
    /// normalized (e.g. trimmed).
    async fn commit(&self, field: Self::Field, value: String) -> Result<String, ApiError>;
}

struct FieldSlot {
    baseline: String,
    latest: String,
    /// Bumped on every edit; lets a response tell whether it is still the
    /// newest.
    edit_seq: u64,
    /// Edit most recently handed to the committer.
    dispatched_seq: Option<u64>,
    timer: Option<JoinHandle<()>>,
    saved_timer: Option<JoinHandle<()>>,
    status: watch::Sender<SaveStatus>,
}

impl FieldSlot {
    fn new(baseline: String) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            latest: baseline.clone(),
            baseline,
            edit_seq: 0,
            dispatched_seq: None,
            timer: None,
            saved_timer: None,
            status,
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(t) = self.timer.take() {
            t.abort();
        }
        if let Some(t) = self.saved_timer.take() {
            t.abort();
        }
    }
}

struct Inner<C: FieldCommitter> {
    committer: C,
    config: AutosaveConfig,
    fields: Mutex<HashMap<C::Field, FieldSlot>>,
    generation: AtomicU64,
    shutdown: CancellationToken,
}

impl<C: FieldCommitter> Inner<C> {
    fn lock(&self) -> MutexGuard<'_, HashMap<C::Field, FieldSlot>> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.fields.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start the commit for `field` as a detached task.
    fn dispatch(self: &Arc<Self>, field: C::Field) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let (value, seq) = {
            let mut fields = self.lock();
            let Some(slot) = fields.get_mut(&field) else {
                return;
            };
            slot.timer = None;
            // A timer that fired while `flush` held the lock must not
            // commit the same edit twice.
            if slot.dispatched_seq == Some(slot.edit_seq) {
                return;
            }
            slot.dispatched_seq = Some(slot.edit_seq);
            (slot.latest.clone(), slot.edit_seq)
        };
        let generation = self.generation.load(Ordering::SeqCst);
        debug!(?field, seq, "dispatching autosave");

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.committer.commit(field, value).await;
            inner.complete(field, seq, generation, result);
        });
    }

    /// Start the debounce timer for `field`.
    fn arm(self: &Arc<Self>, field: C::Field, slot: &mut FieldSlot) {
        let inner = Arc::clone(self);
        let debounce = self.config.debounce;
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            inner.dispatch(field);
        }));
    }

    /// Re-check an edit that was decided against a baseline which has
    /// since moved under it.
    fn reconcile(self: &Arc<Self>, field: C::Field, slot: &mut FieldSlot) {
        if slot.dispatched_seq == Some(slot.edit_seq) {
            return;
        }
        if slot.latest == slot.baseline {
            if let Some(t) = slot.timer.take() {
                t.abort();
            }
            slot.status.send_replace(SaveStatus::Idle);
        } else if slot.timer.is_none() {
            debug!(?field, "baseline moved under an edit, saving again");
            slot.status.send_replace(SaveStatus::Saving);
            self.arm(field, slot);
        }
    }

    fn complete(
        self: &Arc<Self>,
        field: C::Field,
        seq: u64,
        generation: u64,
        result: Result<String, ApiError>,
    ) {
        if self.shutdown.is_cancelled() || self.generation.load(Ordering::SeqCst) != generation {
            debug!(?field, "discarding autosave response for a reset coordinator");
            return;
        }

        let mut fields = self.lock();
        let Some(slot) = fields.get_mut(&field) else {
            return;
        };
        let newest = slot.edit_seq == seq;

        match result {
            Ok(confirmed) => {
                slot.baseline = confirmed;
                if !newest {
                    self.reconcile(field, slot);
                    return;
                }
                slot.latest = slot.baseline.clone();
                slot.status.send_replace(SaveStatus::Saved);

                let inner = Arc::clone(self);
                let window = self.config.saved_window;
                slot.saved_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(window).await;
                    let fields = inner.lock();
                    if let Some(slot) = fields.get(&field) {
                        if slot.edit_seq == seq && *slot.status.borrow() == SaveStatus::Saved {
                            slot.status.send_replace(SaveStatus::Idle);
                        }
                    }
                }));
            }
            Err(e) => {
                warn!(?field, error = %e, "autosave failed");
                if newest {
                    slot.status.send_replace(SaveStatus::Error(e.user_message()));
                }
            }
        }
    }
}

/// Debounced saving for the free-text fields of one entity.
pub struct AutosaveCoordinator<C: FieldCommitter> {
    inner: Arc<Inner<C>>,
}

impl<C: FieldCommitter> AutosaveCoordinator<C> {
    pub fn new(committer: C, config: AutosaveConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                committer,
                config,
                fields: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> AutosaveConfig {
        self.inner.config
    }

    /// Register `field` with the value the server currently holds.
    pub fn track(&self, field: C::Field, baseline: impl Into<String>) {
        let mut fields = self.inner.lock();
        match fields.get_mut(&field) {
            Some(slot) => {
                slot.cancel_timers();
                slot.baseline = baseline.into();
                slot.latest = slot.baseline.clone();
                slot.edit_seq += 1;
                slot.status.send_replace(SaveStatus::Idle);
            }
            None => {
                fields.insert(field, FieldSlot::new(baseline.into()));
            }
        }
    }

    pub fn status(&self, field: C::Field) -> SaveStatus {
        self.inner
            .lock()
            .get(&field)
            .map(|s| s.status.borrow().clone())
            .unwrap_or_default()
    }

    /// Watch the save status of `field`, registering it with an empty
    /// baseline if it is not tracked yet.
    pub fn subscribe(&self, field: C::Field) -> watch::Receiver<SaveStatus> {
        self.inner
            .lock()
            .entry(field)
            .or_insert_with(|| FieldSlot::new(String::new()))
            .status
            .subscribe()
    }

    /// Last value the server confirmed for `field`.
    pub fn baseline(&self, field: C::Field) -> Option<String> {
        self.inner.lock().get(&field).map(|s| s.baseline.clone())
    }

    /// Record an edit.
    ///
    /// Returning to the baseline cancels any pending commit and shows
    /// `idle`. Any other value shows `saving` and (re)arms the debounce
    /// timer.
    pub fn change(&self, field: C::Field, value: impl Into<String>) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        let value = value.into();
        let mut fields = self.inner.lock();
        let slot = fields
            .entry(field)
            .or_insert_with(|| FieldSlot::new(String::new()));

        slot.cancel_timers();
        slot.edit_seq += 1;
        slot.latest = value;

        if slot.latest == slot.baseline {
            slot.status.send_replace(SaveStatus::Idle);
            return;
        }

        slot.status.send_replace(SaveStatus::Saving);
        self.inner.arm(field, slot);
    }

    /// Commit a pending edit of `field` now and wait for its outcome.
    ///
    /// With nothing pending this returns the current status immediately.
    pub async fn flush(&self, field: C::Field) -> SaveStatus {
        let mut rx = {
            let mut fields = self.inner.lock();
            let Some(slot) = fields.get_mut(&field) else {
                return SaveStatus::Idle;
            };
            let rx = slot.status.subscribe();
            if let Some(timer) = slot.timer.take() {
                timer.abort();
                drop(fields);
                self.inner.dispatch(field);
            }
            rx
        };

        match rx.wait_for(|s| *s != SaveStatus::Saving).await {
            Ok(status) => status.clone(),
            Err(_) => SaveStatus::Idle,
        }
    }

    /// Start over for a reloaded entity.
    ///
    /// Pending timers are cancelled, and responses to requests already in
    /// flight will not be applied. Every field is re-tracked with the given
    /// baselines; fields not listed keep their baseline.
    pub fn reset(&self, baselines: impl IntoIterator<Item = (C::Field, String)>) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let mut fields = self.inner.lock();
        for slot in fields.values_mut() {
            slot.cancel_timers();
            slot.edit_seq += 1;
            slot.latest = slot.baseline.clone();
            slot.status.send_replace(SaveStatus::Idle);
        }
        for (field, baseline) in baselines {
            let slot = fields
                .entry(field)
                .or_insert_with(|| FieldSlot::new(String::new()));
            slot.baseline = baseline.clone();
            slot.latest = baseline;
        }
        debug!("autosave coordinator reset");
    }

    /// Stop for good: cancel timers and ignore every later response.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let mut fields = self.inner.lock();
        for slot in fields.values_mut() {
            slot.cancel_timers();
            if *slot.status.borrow() == SaveStatus::Saving {
                slot.status.send_replace(SaveStatus::Idle);
            }
        }
        debug!("autosave coordinator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl<C: FieldCommitter> Drop for AutosaveCoordinator<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
