//! The per-uid run state machine.
//!
//! Each uid owns at most one `Run`. All run mutations (phase, seq, buffers,
//! timers, socket set) are serialized by a per-run async mutex; the adapter
//! task, timer tasks, socket sessions, and the sweeper all take it, which
//! keeps delta ordering and the single terminal broadcast without any
//! further coordination.

use crate::dispatch::Driver;
use crate::run::log::{Delta, DeltaLog, Snapshot};
use compact_str::CompactString;
use futures_util::StreamExt;
use llm::{StreamEvent, is_cancel};
use notify::Notifier;
use protocol::{Phase, PollResponse, ServerMessage};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc::UnboundedSender},
    task::AbortHandle,
    time,
};
use tokio_util::sync::CancellationToken;

/// Pending text flushes once it reaches this many bytes.
pub const BATCH_BYTES: usize = 3400;
/// Pending output flushes this long after the first byte lands in an
/// empty buffer.
pub const BATCH_MS: u64 = 800;
/// A running run older than this is force-failed.
pub const MAX_RUN_MS: u64 = 9 * 60 * 1000;

/// The failure reason used when a run outlives [`MAX_RUN_MS`].
pub fn timeout_message() -> String {
    format!("Run timed out after {} minutes.", MAX_RUN_MS / 60_000)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A validated `begin` request.
pub struct BeginRequest {
    /// Client-chosen run identifier.
    pub rid: CompactString,
    /// Upstream API key.
    pub api_key: String,
    /// Upstream dialect.
    pub provider: llm::ProviderKind,
    /// Sanitized normalized body.
    pub body: llm::RequestBody,
    /// Replay cursor.
    pub after: i64,
}

/// Why a `begin` was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginError {
    /// The uid already has a different run in flight.
    Busy,
}

impl BeginError {
    /// The wire error string for this rejection.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Busy => "busy",
        }
    }
}

/// Per-uid run state. Created lazily, destroyed by the sweeper once
/// terminal with no connected sockets.
pub struct Run {
    rid: CompactString,
    seq: i64,
    phase: Phase,
    error: Option<String>,
    started_at: u64,
    sockets: BTreeMap<CompactString, UnboundedSender<ServerMessage>>,
    pending: String,
    pending_images: Vec<Value>,
    flush_timer: Option<AbortHandle>,
    timeout_timer: Option<AbortHandle>,
    cancel: CancellationToken,
}

impl Run {
    fn new() -> Self {
        Self {
            rid: CompactString::default(),
            seq: -1,
            phase: Phase::Idle,
            error: None,
            started_at: 0,
            sockets: BTreeMap::new(),
            pending: String::new(),
            pending_images: Vec::new(),
            flush_timer: None,
            timeout_timer: None,
            cancel: CancellationToken::new(),
        }
    }

    fn clear_timers(&mut self) {
        if let Some(timer) = self.flush_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.timeout_timer.take() {
            timer.abort();
        }
    }
}

struct Inner<D> {
    driver: D,
    log: DeltaLog,
    notifier: Notifier,
    runs: Mutex<HashMap<CompactString, Arc<AsyncMutex<Run>>>>,
}

/// The run coordinator: owns the in-memory run table, batches adapter
/// output into sequenced deltas, fans them out, and enforces lifecycle
/// rules. Cheap to clone; clones share the run table.
pub struct Coordinator<D> {
    inner: Arc<Inner<D>>,
}

impl<D> Clone for Coordinator<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> Coordinator<D> {
    /// Create a coordinator.
    pub fn new(driver: D, log: DeltaLog, notifier: Notifier) -> Self {
        Self {
            inner: Arc::new(Inner {
                driver,
                log,
                notifier,
                runs: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn get(&self, uid: &str) -> Option<Arc<AsyncMutex<Run>>> {
        self.inner.runs.lock().unwrap().get(uid).cloned()
    }

    fn get_or_create(&self, uid: &str) -> Arc<AsyncMutex<Run>> {
        self.inner
            .runs
            .lock()
            .unwrap()
            .entry(uid.into())
            .or_insert_with(|| Arc::new(AsyncMutex::new(Run::new())))
            .clone()
    }

    /// Subscribe a socket to its uid's run.
    pub async fn attach(
        &self,
        uid: &str,
        socket_id: CompactString,
        tx: UnboundedSender<ServerMessage>,
    ) {
        let run = self.get_or_create(uid);
        run.lock().await.sockets.insert(socket_id, tx);
    }

    /// Unsubscribe a socket. The run itself stays until the sweeper
    /// collects it.
    pub async fn detach(&self, uid: &str, socket_id: &str) {
        if let Some(run) = self.get(uid) {
            run.lock().await.sockets.remove(socket_id);
        }
    }

    /// Start a run, or resume one that already exists under this rid.
    pub async fn begin(
        &self,
        uid: &str,
        socket_id: &str,
        request: BeginRequest,
    ) -> Result<(), BeginError> {
        let run = self.get_or_create(uid);
        let mut state = run.lock().await;

        // A rid with persisted state revives an idle run, so replay works
        // after the in-memory instance was evicted and seq never regresses
        // for a rid that already assigned some.
        let mut carried_seq = -1;
        if state.phase == Phase::Idle
            && let Some(snapshot) = self.inner.log.read_snapshot(&request.rid)
        {
            if snapshot.phase.is_terminal() {
                state.rid = snapshot.rid;
                state.seq = snapshot.seq;
                state.phase = snapshot.phase;
                state.error = snapshot.error;
                state.started_at = snapshot.started_at;
            } else {
                carried_seq = snapshot.seq;
            }
        }

        if state.phase == Phase::Running {
            if state.rid == request.rid {
                self.replay(&state, socket_id, request.after);
                return Ok(());
            }
            return Err(BeginError::Busy);
        }
        if state.phase.is_terminal() && state.rid == request.rid {
            self.replay(&state, socket_id, request.after);
            return Ok(());
        }

        tracing::info!("starting run {} for uid {uid}", request.rid);
        self.start(&mut state, uid.into(), request, carried_seq);
        Ok(())
    }

    /// Stop the current run if `rid` matches it. Stopping is a normal
    /// completion, not a failure.
    pub async fn stop(&self, uid: &str, rid: &str) {
        self.complete(uid, rid).await;
    }

    /// Redeliver persisted deltas with `seq > after` to one socket, then
    /// the terminal signal if the run is terminal. Runs under the run
    /// lock, so replayed seq-space cannot interleave with live fan-out.
    fn replay(&self, state: &Run, socket_id: &str, after: i64) {
        let Some(tx) = state.sockets.get(socket_id) else {
            return;
        };
        for delta in self.inner.log.read_all(&state.rid) {
            if delta.seq > after {
                let _ = tx.send(ServerMessage::Delta {
                    seq: delta.seq,
                    text: delta.text,
                    images: delta.images,
                });
            }
        }
        if state.phase.is_terminal() {
            let _ = tx.send(Self::terminal_frame(state));
        }
    }

    fn start(&self, state: &mut Run, uid: CompactString, request: BeginRequest, carried_seq: i64) {
        state.rid = request.rid.clone();
        state.seq = carried_seq;
        state.phase = Phase::Running;
        state.error = None;
        state.started_at = now_ms();
        state.pending.clear();
        state.pending_images.clear();
        state.clear_timers();
        state.cancel = CancellationToken::new();

        self.inner.log.write_snapshot(&Self::snapshot_of(state));
        self.inner.log.write_prompt(&state.rid, &request.body.messages);

        let coordinator = self.clone();
        let (timeout_uid, timeout_rid) = (uid.clone(), state.rid.clone());
        let timeout = tokio::spawn(async move {
            time::sleep(Duration::from_millis(MAX_RUN_MS)).await;
            coordinator
                .fail(&timeout_uid, &timeout_rid, &timeout_message())
                .await;
        });
        state.timeout_timer = Some(timeout.abort_handle());

        let coordinator = self.clone();
        let cancel = state.cancel.clone();
        let rid = state.rid.clone();
        tokio::spawn(async move {
            let BeginRequest {
                api_key,
                provider,
                body,
                ..
            } = request;
            let mut stream = coordinator
                .inner
                .driver
                .drive(provider, &api_key, &body, cancel.clone());
            let result = loop {
                tokio::select! {
                    _ = cancel.cancelled() => break Ok(()),
                    next = stream.next() => match next {
                        Some(Ok(event)) => coordinator.on_event(&uid, &rid, event).await,
                        Some(Err(e)) => break Err(e),
                        None => break Ok(()),
                    },
                }
            };
            match result {
                Ok(()) => coordinator.complete(&uid, &rid).await,
                Err(e) if is_cancel(&e) => tracing::debug!("run {rid} stream aborted"),
                Err(e) => coordinator.fail(&uid, &rid, &format!("{e:#}")).await,
            }
        });
    }

    /// Accept one adapter output increment: buffer it and flush on the
    /// size, image, or time trigger.
    async fn on_event(&self, uid: &CompactString, rid: &str, event: StreamEvent) {
        let Some(run) = self.get(uid) else {
            return;
        };
        let mut state = run.lock().await;
        if state.phase != Phase::Running || state.rid != rid {
            return;
        }

        state.pending.push_str(&event.text);
        let has_images = !event.images.is_empty();
        state.pending_images.extend(event.images);

        if has_images || state.pending.len() >= BATCH_BYTES {
            self.flush(&mut state);
        } else if !state.pending.is_empty() && state.flush_timer.is_none() {
            let coordinator = self.clone();
            let (timer_uid, timer_rid) = (uid.clone(), CompactString::from(rid));
            let timer = tokio::spawn(async move {
                time::sleep(Duration::from_millis(BATCH_MS)).await;
                coordinator.flush_tick(&timer_uid, &timer_rid).await;
            });
            state.flush_timer = Some(timer.abort_handle());
        }
    }

    async fn flush_tick(&self, uid: &str, rid: &str) {
        let Some(run) = self.get(uid) else {
            return;
        };
        let mut state = run.lock().await;
        if state.phase != Phase::Running || state.rid != rid {
            return;
        }
        state.flush_timer = None;
        self.flush(&mut state);
    }

    /// Assign the next `seq`, persist the delta, and fan it out. A no-op
    /// when nothing is pending.
    fn flush(&self, state: &mut Run) {
        if let Some(timer) = state.flush_timer.take() {
            timer.abort();
        }
        if state.pending.is_empty() && state.pending_images.is_empty() {
            return;
        }
        state.seq += 1;
        let images = if state.pending_images.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut state.pending_images))
        };
        let delta = Delta {
            seq: state.seq,
            text: std::mem::take(&mut state.pending),
            images,
        };
        self.inner.log.append(&state.rid, &delta);
        Self::broadcast(
            state,
            ServerMessage::Delta {
                seq: delta.seq,
                text: delta.text,
                images: delta.images,
            },
        );
    }

    /// Normal completion: upstream finished, the client stopped, or an
    /// abort raced a normal end. Idempotent on non-running runs.
    pub async fn complete(&self, uid: &str, rid: &str) {
        let Some(run) = self.get(uid) else {
            return;
        };
        let mut state = run.lock().await;
        if state.phase != Phase::Running || state.rid != rid {
            return;
        }

        self.flush(&mut state);
        state.phase = Phase::Done;
        self.inner.log.write_snapshot(&Self::snapshot_of(&state));
        state.clear_timers();
        state.cancel.cancel();
        Self::broadcast(&state, ServerMessage::Done);
        tracing::info!("run {rid} for uid {uid} done at seq {}", state.seq);
        self.notify(format!("{uid}: run {rid} done"), 3, "checkered_flag");
    }

    /// Terminal failure: a synthetic trailer records the cause in the
    /// delta stream, then the error fans out. Idempotent on non-running
    /// runs.
    pub async fn fail(&self, uid: &str, rid: &str, message: &str) {
        let Some(run) = self.get(uid) else {
            return;
        };
        let mut state = run.lock().await;
        if state.phase != Phase::Running || state.rid != rid {
            return;
        }

        state.pending.push_str(&format!("\n\nRun failed: {message}"));
        self.flush(&mut state);
        state.phase = Phase::Error;
        state.error = Some(message.to_owned());
        self.inner.log.write_snapshot(&Self::snapshot_of(&state));
        state.clear_timers();
        state.cancel.cancel();
        Self::broadcast(
            &state,
            ServerMessage::Error {
                message: message.to_owned(),
            },
        );
        tracing::warn!("run {rid} for uid {uid} failed: {message}");
        self.notify(
            format!("{uid}: run {rid} failed: {message}"),
            4,
            "rotating_light",
        );
    }

    /// Snapshot view for the HTTP poll endpoint.
    pub async fn poll(&self, uid: &str) -> PollResponse {
        let Some(run) = self.get(uid) else {
            return PollResponse::sentinel();
        };
        let state = run.lock().await;
        if state.phase == Phase::Idle && state.rid.is_empty() {
            return PollResponse::sentinel();
        }

        let mut text = String::new();
        let mut images = Vec::new();
        for delta in self.inner.log.read_all(&state.rid) {
            text.push_str(&delta.text);
            images.extend(delta.images.unwrap_or_default());
        }
        text.push_str(&state.pending);
        images.extend(state.pending_images.iter().cloned());

        PollResponse {
            rid: Some(state.rid.clone()),
            seq: state.seq,
            phase: state.phase,
            done: state.phase.is_terminal(),
            error: state.error.clone(),
            text,
            images,
        }
    }

    /// Defence-in-depth pass: force-fail overdue runs the timeout timer
    /// somehow missed, then drop terminal runs nobody is connected to.
    pub async fn sweep(&self) {
        let entries: Vec<(CompactString, Arc<AsyncMutex<Run>>)> = self
            .inner
            .runs
            .lock()
            .unwrap()
            .iter()
            .map(|(uid, run)| (uid.clone(), Arc::clone(run)))
            .collect();

        let now = now_ms();
        let mut overdue = Vec::new();
        for (uid, run) in &entries {
            let state = run.lock().await;
            if state.phase == Phase::Running && now.saturating_sub(state.started_at) > MAX_RUN_MS {
                overdue.push((uid.clone(), state.rid.clone()));
            }
        }
        for (uid, rid) in overdue {
            self.fail(&uid, &rid, &timeout_message()).await;
        }

        self.inner
            .runs
            .lock()
            .unwrap()
            .retain(|uid, run| match run.try_lock() {
                Ok(state) => {
                    let evict = state.phase.is_terminal() && state.sockets.is_empty();
                    if evict {
                        tracing::debug!("evicting run {} for uid {uid}", state.rid);
                    }
                    !evict
                }
                Err(_) => true,
            });
    }

    /// Number of runs currently held in memory.
    pub fn len(&self) -> usize {
        self.inner.runs.lock().unwrap().len()
    }

    /// Whether no runs are held in memory.
    pub fn is_empty(&self) -> bool {
        self.inner.runs.lock().unwrap().is_empty()
    }

    fn broadcast(state: &Run, frame: ServerMessage) {
        // Best effort per socket; closed receivers are cleaned up by the
        // session loop on its own close event.
        for tx in state.sockets.values() {
            let _ = tx.send(frame.clone());
        }
    }

    fn terminal_frame(state: &Run) -> ServerMessage {
        match state.phase {
            Phase::Done => ServerMessage::Done,
            _ => ServerMessage::Error {
                message: state.error.clone().unwrap_or_else(|| "evicted".to_owned()),
            },
        }
    }

    fn snapshot_of(state: &Run) -> Snapshot {
        Snapshot {
            rid: state.rid.clone(),
            seq: state.seq,
            phase: state.phase,
            error: state.error.clone(),
            started_at: state.started_at,
        }
    }

    fn notify(&self, text: String, priority: u8, tags: &'static str) {
        if !self.inner.notifier.enabled() {
            return;
        }
        let notifier = self.inner.notifier.clone();
        tokio::spawn(async move {
            notifier.send(&text, priority, tags).await;
        });
    }
}
