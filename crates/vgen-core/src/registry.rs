//! Run Registry: the single owner of every run's mutable state.
//!
//! Writes are serialized behind one `RwLock`; readers get cloned snapshots and
//! never observe a half-applied update. Each run also owns a single-slot
//! hand-off channel that carries human input to its gate.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::{
    Result, RunEvent, RunOutcome, RunRequest, RunState, RunStatus, Stage, VgenError,
};
use crate::obs;

struct RunEntry {
    state: RunState,
    input_tx: mpsc::Sender<String>,
    input_rx: Option<mpsc::Receiver<String>>,
    /// Input waits begun so far.
    input_waits: u64,
}

impl RunEntry {
    fn ensure_live(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(VgenError::RunFinished(self.state.run_id.clone()));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.state.last_update = Utc::now();
    }

    fn push(&mut self, mut event: RunEvent) -> u64 {
        let seq = self.state.outputs.len() as u64;
        event.seq = seq;
        self.state.current_stage = Some(event.stage);
        self.state.outputs.push(event);
        self.touch();
        seq
    }

    fn close(&mut self, status: RunStatus, outcome: Option<RunOutcome>, event: RunEvent) -> u64 {
        let seq = self.push(event);
        self.state.status = status;
        self.state.waiting_for_input = false;
        if outcome.is_some() {
            self.state.outcome = outcome;
        }
        seq
    }
}

/// Events appended since a cursor position, plus the flags a stream needs.
#[derive(Debug, Clone, PartialEq)]
pub struct EventsSince {
    pub events: Vec<RunEvent>,
    pub status: RunStatus,
    pub waiting_for_input: bool,
    /// Input waits begun so far; tells consecutive waits apart.
    pub input_waits: u64,
}

#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, RunEntry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RunEntry>> {
        self.runs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RunEntry>> {
        self.runs.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_entry<T>(&self, run_id: &str, f: impl FnOnce(&mut RunEntry) -> Result<T>) -> Result<T> {
        let mut runs = self.write();
        let entry = runs
            .get_mut(run_id)
            .ok_or_else(|| VgenError::RunNotFound(run_id.to_string()))?;
        f(entry)
    }

    /// Register a new run in `starting` status.
    pub fn create(&self, run_id: &str, request: &RunRequest) -> Result<RunState> {
        let mut runs = self.write();
        if runs.contains_key(run_id) {
            return Err(VgenError::RunExists(run_id.to_string()));
        }
        let (input_tx, input_rx) = mpsc::channel(1);
        let state = RunState::new(run_id, request);
        runs.insert(
            run_id.to_string(),
            RunEntry {
                state: state.clone(),
                input_tx,
                input_rx: Some(input_rx),
                input_waits: 0,
            },
        );
        Ok(state)
    }

    /// Snapshot of one run.
    pub fn get(&self, run_id: &str) -> Result<RunState> {
        self.read()
            .get(run_id)
            .map(|entry| entry.state.clone())
            .ok_or_else(|| VgenError::RunNotFound(run_id.to_string()))
    }

    pub fn contains(&self, run_id: &str) -> bool {
        self.read().contains_key(run_id)
    }

    /// Snapshots of all runs, oldest first.
    pub fn list(&self) -> Vec<RunState> {
        let mut states: Vec<RunState> = self.read().values().map(|e| e.state.clone()).collect();
        states.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.run_id.cmp(&b.run_id))
        });
        states
    }

    /// Drop a run and its input channel. In-flight work is not interrupted;
    /// a gate waiting on the channel sees it close.
    pub fn remove(&self, run_id: &str) -> Result<RunState> {
        self.write()
            .remove(run_id)
            .map(|entry| entry.state)
            .ok_or_else(|| VgenError::RunNotFound(run_id.to_string()))
    }

    /// Append an event; the registry assigns its `seq`.
    pub fn append_event(&self, run_id: &str, event: RunEvent) -> Result<u64> {
        let stage = event.stage;
        let seq = self.with_entry(run_id, |entry| {
            entry.ensure_live()?;
            Ok(entry.push(event))
        })?;
        obs::emit_event_appended(run_id, stage, seq);
        Ok(seq)
    }

    /// Set a non-terminal status. Finished runs keep their status.
    pub fn set_status(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.with_entry(run_id, |entry| {
            entry.ensure_live()?;
            entry.state.status = status;
            entry.touch();
            Ok(())
        })
    }

    pub fn set_iteration(&self, run_id: &str, iteration_count: u32) -> Result<()> {
        self.with_entry(run_id, |entry| {
            entry.state.iteration_count = iteration_count;
            entry.touch();
            Ok(())
        })
    }

    /// Append the final event and move to a terminal status in one step, so
    /// no observer sees the status without its event (or the reverse).
    pub fn finish(
        &self,
        run_id: &str,
        status: RunStatus,
        outcome: Option<RunOutcome>,
        final_event: RunEvent,
    ) -> Result<RunState> {
        let stage = final_event.stage;
        let (seq, state) = self.with_entry(run_id, |entry| {
            entry.ensure_live()?;
            let seq = entry.close(status, outcome, final_event);
            Ok((seq, entry.state.clone()))
        })?;
        obs::emit_event_appended(run_id, stage, seq);
        Ok(state)
    }

    /// Record a fatal error: one `error` event, then `failed`.
    pub fn fail(&self, run_id: &str, message: &str) -> Result<RunState> {
        let event = RunEvent::new(Stage::Error, format!("Run failed: {message}"));
        let (seq, state) = self.with_entry(run_id, |entry| {
            entry.ensure_live()?;
            entry.state.error = Some(message.to_string());
            let seq = entry.close(RunStatus::Failed, Some(RunOutcome::Fatal), event);
            Ok((seq, entry.state.clone()))
        })?;
        obs::emit_event_appended(run_id, Stage::Error, seq);
        Ok(state)
    }

    /// Events from position `index` onward.
    pub fn events_since(&self, run_id: &str, index: usize) -> Result<EventsSince> {
        let runs = self.read();
        let entry = runs
            .get(run_id)
            .ok_or_else(|| VgenError::RunNotFound(run_id.to_string()))?;
        let events = entry
            .state
            .outputs
            .get(index..)
            .map(<[RunEvent]>::to_vec)
            .unwrap_or_default();
        Ok(EventsSince {
            events,
            status: entry.state.status,
            waiting_for_input: entry.state.waiting_for_input,
            input_waits: entry.input_waits,
        })
    }

    /// Hand the run's input receiver to its gate. Only one gate per run.
    pub fn take_input_receiver(&self, run_id: &str) -> Result<mpsc::Receiver<String>> {
        self.with_entry(run_id, |entry| {
            entry
                .input_rx
                .take()
                .ok_or_else(|| VgenError::InputChannelClosed(run_id.to_string()))
        })
    }

    /// Mark the run as suspended on human input.
    pub fn begin_input_wait(&self, run_id: &str) -> Result<()> {
        self.with_entry(run_id, |entry| {
            entry.ensure_live()?;
            entry.state.waiting_for_input = true;
            entry.state.status = RunStatus::WaitingForInput;
            entry.input_waits += 1;
            entry.touch();
            Ok(())
        })
    }

    /// Deliver human input to a waiting run.
    ///
    /// # Errors
    ///
    /// `RunNotFound` for unknown runs and `NotWaitingForInput` when the run is
    /// not suspended on its gate (including when another value already
    /// arrived). Rejections leave the run untouched.
    pub fn supply_input(&self, run_id: &str, value: String) -> Result<()> {
        self.with_entry(run_id, |entry| {
            if !entry.state.waiting_for_input {
                return Err(VgenError::NotWaitingForInput(run_id.to_string()));
            }
            match entry.input_tx.try_send(value) {
                Ok(()) => {
                    entry.state.waiting_for_input = false;
                    entry.state.status = RunStatus::Running;
                    entry.touch();
                    Ok(())
                }
                Err(TrySendError::Full(_)) => {
                    Err(VgenError::NotWaitingForInput(run_id.to_string()))
                }
                Err(TrySendError::Closed(_)) => {
                    Err(VgenError::InputChannelClosed(run_id.to_string()))
                }
            }
        })
    }
}

/// One item of a run's progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(RunEvent),
    WaitingForInput,
    Terminal(RunStatus),
    NotFound,
}

/// Incremental reader over a run's event log.
///
/// Each [`poll`](StreamCursor::poll) yields the events appended since the
/// previous poll, a waiting marker when the run newly suspends on input, and a
/// terminal marker once the run has finished. After the terminal (or
/// not-found) marker the cursor is exhausted.
#[derive(Debug, Clone)]
pub struct StreamCursor {
    run_id: String,
    next_index: usize,
    waits_announced: u64,
    finished: bool,
}

impl StreamCursor {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            next_index: 0,
            waits_announced: 0,
            finished: false,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn poll(&mut self, registry: &RunRegistry) -> Vec<StreamItem> {
        if self.finished {
            return Vec::new();
        }
        let since = match registry.events_since(&self.run_id, self.next_index) {
            Ok(since) => since,
            Err(_) => {
                self.finished = true;
                return vec![StreamItem::NotFound];
            }
        };

        self.next_index += since.events.len();
        let mut items: Vec<StreamItem> = since.events.into_iter().map(StreamItem::Event).collect();

        if since.waiting_for_input && since.input_waits > self.waits_announced {
            items.push(StreamItem::WaitingForInput);
            self.waits_announced = since.input_waits;
        }

        if since.status.is_terminal() {
            items.push(StreamItem::Terminal(since.status));
            self.finished = true;
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunType;

    fn registry_with(run_id: &str) -> RunRegistry {
        let registry = RunRegistry::new();
        registry
            .create(run_id, &RunRequest::new("4-bit adder", RunType::Full))
            .unwrap();
        registry
    }

    #[test]
    fn test_create_twice_rejected() {
        let registry = registry_with("r1");
        assert!(matches!(
            registry.create("r1", &RunRequest::default()),
            Err(VgenError::RunExists(_))
        ));
    }

    #[test]
    fn test_append_assigns_sequential_seq() {
        let registry = registry_with("r1");
        for i in 0..3 {
            let seq = registry
                .append_event("r1", RunEvent::new(Stage::Planning, format!("step {i}")))
                .unwrap();
            assert_eq!(seq, i);
        }
        let state = registry.get("r1").unwrap();
        assert_eq!(state.outputs.len(), 3);
        assert_eq!(state.current_stage, Some(Stage::Planning));
    }

    #[test]
    fn test_unknown_run_not_found() {
        let registry = RunRegistry::new();
        assert!(matches!(registry.get("nope"), Err(VgenError::RunNotFound(_))));
        assert!(matches!(
            registry.append_event("nope", RunEvent::new(Stage::Planning, "x")),
            Err(VgenError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_finished_run_is_frozen() {
        let registry = registry_with("r1");
        registry
            .finish(
                "r1",
                RunStatus::Completed,
                Some(RunOutcome::Success),
                RunEvent::new(Stage::Result, "done"),
            )
            .unwrap();
        assert!(matches!(
            registry.append_event("r1", RunEvent::new(Stage::Fixing, "late")),
            Err(VgenError::RunFinished(_))
        ));
        assert!(matches!(
            registry.set_status("r1", RunStatus::Running),
            Err(VgenError::RunFinished(_))
        ));
        let state = registry.get("r1").unwrap();
        assert_eq!(state.status, RunStatus::Completed);
        assert_eq!(state.last_event().unwrap().stage, Stage::Result);
    }

    #[test]
    fn test_fail_records_single_error_event() {
        let registry = registry_with("r1");
        let state = registry.fail("r1", "collaborator failure: boom").unwrap();
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.outcome, Some(RunOutcome::Fatal));
        assert_eq!(state.outputs.len(), 1);
        assert_eq!(state.outputs[0].stage, Stage::Error);
        assert!(state.outputs[0].message.contains("boom"));
        assert_eq!(state.error.as_deref(), Some("collaborator failure: boom"));
    }

    #[test]
    fn test_input_rejected_when_not_waiting() {
        let registry = registry_with("r1");
        registry
            .append_event("r1", RunEvent::new(Stage::Planning, "started"))
            .unwrap();
        let before = registry.get("r1").unwrap();

        let err = registry.supply_input("r1", "ok".to_string()).unwrap_err();
        assert!(matches!(err, VgenError::NotWaitingForInput(_)));
        assert_eq!(registry.get("r1").unwrap(), before);
    }

    #[tokio::test]
    async fn test_input_hand_off() {
        let registry = registry_with("r1");
        let mut rx = registry.take_input_receiver("r1").unwrap();
        registry.begin_input_wait("r1").unwrap();
        assert_eq!(registry.get("r1").unwrap().status, RunStatus::WaitingForInput);

        registry.supply_input("r1", "looks good".to_string()).unwrap();
        let state = registry.get("r1").unwrap();
        assert!(!state.waiting_for_input);
        assert_eq!(state.status, RunStatus::Running);

        assert!(matches!(
            registry.supply_input("r1", "again".to_string()),
            Err(VgenError::NotWaitingForInput(_))
        ));
        assert_eq!(rx.recv().await.as_deref(), Some("looks good"));
    }

    #[test]
    fn test_input_to_closed_gate() {
        let registry = registry_with("r1");
        drop(registry.take_input_receiver("r1").unwrap());
        registry.begin_input_wait("r1").unwrap();
        assert!(matches!(
            registry.supply_input("r1", "x".to_string()),
            Err(VgenError::InputChannelClosed(_))
        ));
        assert!(registry.get("r1").unwrap().waiting_for_input);
    }

    #[test]
    fn test_remove_drops_entry() {
        let registry = registry_with("r1");
        registry.remove("r1").unwrap();
        assert!(!registry.contains("r1"));
        assert!(matches!(registry.remove("r1"), Err(VgenError::RunNotFound(_))));
    }

    #[test]
    fn test_list_oldest_first() {
        let registry = registry_with("r1");
        registry.create("r2", &RunRequest::default()).unwrap();
        let ids: Vec<String> = registry.list().into_iter().map(|s| s.run_id).collect();
        assert_eq!(ids, vec!["r1".to_string(), "r2".to_string()]);
    }

    #[test]
    fn test_stream_cursor_markers() {
        let registry = registry_with("r1");
        let mut cursor = StreamCursor::new("r1");
        assert!(cursor.poll(&registry).is_empty());

        registry
            .append_event("r1", RunEvent::new(Stage::Testbench, "generated"))
            .unwrap();
        registry.begin_input_wait("r1").unwrap();
        let items = cursor.poll(&registry);
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], StreamItem::Event(ref e) if e.seq == 0));
        assert_eq!(items[1], StreamItem::WaitingForInput);
        assert!(cursor.poll(&registry).is_empty());

        registry
            .finish(
                "r1",
                RunStatus::Completed,
                Some(RunOutcome::Success),
                RunEvent::new(Stage::Complete, "done"),
            )
            .unwrap();
        let items = cursor.poll(&registry);
        assert!(matches!(items[0], StreamItem::Event(ref e) if e.seq == 1));
        assert_eq!(items[1], StreamItem::Terminal(RunStatus::Completed));
        assert!(cursor.is_finished());
        assert!(cursor.poll(&registry).is_empty());
    }

    #[test]
    fn test_stream_cursor_announces_back_to_back_waits() {
        let registry = registry_with("r1");
        let _gate = registry.take_input_receiver("r1").unwrap();
        let mut cursor = StreamCursor::new("r1");

        registry.begin_input_wait("r1").unwrap();
        assert_eq!(cursor.poll(&registry), vec![StreamItem::WaitingForInput]);

        // Answered and suspended again between two polls.
        registry.supply_input("r1", "tighten timing".to_string()).unwrap();
        registry.begin_input_wait("r1").unwrap();
        assert_eq!(cursor.poll(&registry), vec![StreamItem::WaitingForInput]);
        assert!(cursor.poll(&registry).is_empty());
    }

    #[test]
    fn test_stream_cursor_unknown_run() {
        let registry = RunRegistry::new();
        let mut cursor = StreamCursor::new("ghost");
        assert_eq!(cursor.poll(&registry), vec![StreamItem::NotFound]);
        assert!(cursor.is_finished());
    }
}
