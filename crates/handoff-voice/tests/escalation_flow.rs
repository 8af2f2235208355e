//! End-to-end sessions over a local room and an on-disk escalation store.

use async_trait::async_trait;
use handoff_db::{create_pool, DbRuntimeSettings};
use handoff_escalation::{EscalationError, EscalationStore, SqliteEscalationStore};
use handoff_types::{EscalationRecord, EscalationUpdate, Participant, RequestState};
use handoff_voice::{
    AgentConfig, AgentSession, BootstrapOutcome, ChatRole, EngineRequest, EngineTurn, LocalRoom,
    LocalRoomHandle, PersonaKind, ReasoningEngine, SessionEvent, ToolCall, VoiceError, Worker,
    CONNECT_SUPERVISOR, SUPERVISOR_CONNECTING, SUPERVISOR_ERROR_PREFIX,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const GREETING: &str = "How can I help you today?";

/// Escalates whenever the caller mentions a human, answers tool results by
/// reading them back, and otherwise gives a canned reply.
struct RuleEngine {
    arguments: serde_json::Value,
    calls: AtomicUsize,
}

impl RuleEngine {
    fn new(arguments: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            arguments,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningEngine for RuleEngine {
    async fn next_turn(&self, request: EngineRequest<'_>) -> Result<EngineTurn, VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(
            request.tools.iter().any(|t| t.function.name == CONNECT_SUPERVISOR),
            "interactive persona must offer {CONNECT_SUPERVISOR}"
        );

        let last = request.conversation.last().expect("conversation is never empty");
        let turn = match last.role {
            ChatRole::Tool => EngineTurn::Reply(format!("tool said: {}", last.content)),
            _ if last.content.contains("human") => {
                EngineTurn::ToolCall(ToolCall::new(CONNECT_SUPERVISOR, self.arguments.clone()))
            }
            _ => EngineTurn::Reply("I can help with that.".to_string()),
        };
        Ok(turn)
    }
}

/// Fails the next write with "quota exceeded" when armed.
struct FlakyStore {
    inner: SqliteEscalationStore,
    fail_next: AtomicBool,
}

#[async_trait]
impl EscalationStore for FlakyStore {
    async fn upsert(
        &self,
        room_id: &str,
        update: EscalationUpdate,
    ) -> Result<EscalationRecord, EscalationError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EscalationError::Backend("quota exceeded".to_string()));
        }
        self.inner.upsert(room_id, update).await
    }

    async fn get(&self, room_id: &str) -> Result<Option<EscalationRecord>, EscalationError> {
        self.inner.get(room_id).await
    }

    async fn resolve(&self, room_id: &str) -> Result<Option<EscalationRecord>, EscalationError> {
        self.inner.resolve(room_id).await
    }

    async fn list(
        &self,
        state: Option<RequestState>,
    ) -> Result<Vec<EscalationRecord>, EscalationError> {
        self.inner.list(state).await
    }
}

/// Never finishes a write.
struct StalledStore;

#[async_trait]
impl EscalationStore for StalledStore {
    async fn upsert(
        &self,
        _room_id: &str,
        _update: EscalationUpdate,
    ) -> Result<EscalationRecord, EscalationError> {
        std::future::pending().await
    }

    async fn get(&self, _room_id: &str) -> Result<Option<EscalationRecord>, EscalationError> {
        Ok(None)
    }

    async fn resolve(&self, _room_id: &str) -> Result<Option<EscalationRecord>, EscalationError> {
        Ok(None)
    }

    async fn list(
        &self,
        _state: Option<RequestState>,
    ) -> Result<Vec<EscalationRecord>, EscalationError> {
        Ok(Vec::new())
    }
}

async fn sqlite_store() -> (TempDir, SqliteEscalationStore) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("escalations.db");
    let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default()).expect("pool");
    let store = SqliteEscalationStore::open(pool).await.expect("open store");
    (dir, store)
}

fn caller() -> Participant {
    Participant::new("caller-17")
}

fn speech(text: &str) -> SessionEvent {
    SessionEvent::SpeechCommitted {
        participant: caller(),
        transcript: text.to_string(),
    }
}

/// Bootstraps a session for `caller()` in `room`.
async fn start(worker: &Worker, room: Option<&str>) -> (AgentSession<LocalRoom>, LocalRoomHandle) {
    let (transport, handle) = LocalRoom::new(room);
    handle.join(caller());
    match worker.bootstrap(transport).await.expect("bootstrap") {
        BootstrapOutcome::Started(session) => (session, handle),
        BootstrapOutcome::Declined { participant } => {
            panic!("unexpectedly declined for {}", participant.identity)
        }
    }
}

#[tokio::test]
async fn talk_to_a_human_escalates_and_goes_silent() {
    let (_dir, store) = sqlite_store().await;
    let store = Arc::new(store);
    let engine = RuleEngine::new(json!({}));
    let worker = Worker::prewarm(AgentConfig::default(), store.clone(), engine.clone()).unwrap();

    let (session, mut handle) = start(&worker, Some("room-42")).await;
    handle.say(&caller(), "I want to talk to a human");
    handle.say(&caller(), "Hello? Is anyone there? Help!");
    handle.close();

    let report = session.run().await.expect("session runs");

    assert_eq!(
        handle.drain_replies(),
        vec![GREETING.to_string(), SUPERVISOR_CONNECTING.to_string()]
    );
    assert_eq!(engine.calls(), 1, "silent persona never asks the engine");
    assert_eq!(report.final_persona, PersonaKind::Silent);
    assert!(report.monitored_for.is_some());

    let record = store.get("room-42").await.unwrap().expect("record written");
    assert_eq!(record.request_state, RequestState::Pending);
    assert!(record.requestor_name.is_none());
    assert!(record.issue_summary.is_none());
}

#[tokio::test]
async fn second_escalation_for_a_room_overwrites_the_first() {
    let (_dir, store) = sqlite_store().await;
    let store = Arc::new(store);

    let first = RuleEngine::new(json!({ "name": "Ada", "issue": "billing" }));
    let worker = Worker::prewarm(AgentConfig::default(), store.clone(), first).unwrap();
    let (mut session, _handle) = start(&worker, Some("room-7")).await;
    session.handle_event(speech("a human please")).await.unwrap();
    let before = store.get("room-7").await.unwrap().expect("first record");

    let second = RuleEngine::new(json!({ "issue": "refund" }));
    let worker = Worker::prewarm(AgentConfig::default(), store.clone(), second).unwrap();
    let (mut session, _handle) = start(&worker, Some("room-7")).await;
    session.handle_event(speech("a human please")).await.unwrap();

    let records = store.list(None).await.unwrap();
    assert_eq!(records.len(), 1);
    let after = &records[0];
    assert_eq!(after.request_state, RequestState::Pending);
    assert!(after.requestor_name.is_none());
    assert_eq!(after.issue_summary.as_deref(), Some("refund"));
    assert!(after.requested_at >= before.requested_at);
}

#[tokio::test]
async fn escalation_without_a_room_is_refused() {
    let (_dir, store) = sqlite_store().await;
    let store = Arc::new(store);
    let worker =
        Worker::prewarm(AgentConfig::default(), store.clone(), RuleEngine::new(json!({}))).unwrap();

    let (mut session, mut handle) = start(&worker, None).await;
    session.handle_event(speech("get me a human")).await.unwrap();

    assert_eq!(session.persona_kind(), PersonaKind::Interactive);
    let replies = handle.drain_replies();
    assert_eq!(replies.len(), 2);
    assert!(replies[1].contains(SUPERVISOR_ERROR_PREFIX), "got {:?}", replies[1]);
    assert!(replies[1].contains("no room is associated with this session"));
    assert!(store.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_write_keeps_the_agent_talking_and_retry_succeeds() {
    let (_dir, inner) = sqlite_store().await;
    let store = Arc::new(FlakyStore {
        inner,
        fail_next: AtomicBool::new(true),
    });
    let worker =
        Worker::prewarm(AgentConfig::default(), store.clone(), RuleEngine::new(json!({}))).unwrap();

    let (mut session, mut handle) = start(&worker, Some("room-9")).await;
    handle.drain_replies();

    session.handle_event(speech("a human, please")).await.unwrap();
    let replies = handle.drain_replies();
    assert_eq!(replies.len(), 1);
    assert!(
        replies[0].contains("Error connecting to a supervisor: quota exceeded"),
        "got {:?}",
        replies[0]
    );
    assert_eq!(session.persona_kind(), PersonaKind::Interactive);
    assert!(store.get("room-9").await.unwrap().is_none());

    session.handle_event(speech("a human, please")).await.unwrap();
    assert_eq!(handle.drain_replies(), vec![SUPERVISOR_CONNECTING.to_string()]);
    assert_eq!(session.persona_kind(), PersonaKind::Silent);
    let record = store.get("room-9").await.unwrap().expect("record");
    assert_eq!(record.request_state, RequestState::Pending);
}

#[tokio::test]
async fn supervisor_messages_never_trigger_replies() {
    let (_dir, store) = sqlite_store().await;
    let engine = RuleEngine::new(json!({}));
    let worker = Worker::prewarm(AgentConfig::default(), Arc::new(store), engine.clone()).unwrap();

    let (session, mut handle) = start(&worker, Some("room-3")).await;
    let supervisor = Participant::new("maria-supervisor");
    handle.join(supervisor.clone());
    handle.say(&supervisor, "Hi, I'm taking over. Can a human help?");
    handle.message(&supervisor, "typing a note");
    handle.interrupt(&supervisor);
    handle.leave(supervisor);
    handle.close();

    let report = session.run().await.unwrap();

    assert_eq!(engine.calls(), 0);
    assert_eq!(handle.drain_replies(), vec![GREETING.to_string()]);
    assert_eq!(report.final_persona, PersonaKind::Interactive);
}

#[tokio::test]
async fn supervisor_joining_first_gets_no_session() {
    let (_dir, store) = sqlite_store().await;
    let engine = RuleEngine::new(json!({}));
    let worker = Worker::prewarm(AgentConfig::default(), Arc::new(store), engine.clone()).unwrap();

    let (transport, mut handle) = LocalRoom::new(Some("room-3"));
    handle.join(Participant::new("maria-supervisor"));
    let report = worker.entry(transport).await.unwrap();

    assert!(report.is_none());
    assert!(handle.drain_replies().is_empty());
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn bootstrap_on_a_pending_room_starts_fresh() {
    let (_dir, store) = sqlite_store().await;
    let store = Arc::new(store);
    store
        .upsert("room-5", EscalationUpdate::pending(Some("Ada".into()), None))
        .await
        .unwrap();
    let worker =
        Worker::prewarm(AgentConfig::default(), store.clone(), RuleEngine::new(json!({}))).unwrap();

    for _ in 0..2 {
        let (session, mut handle) = start(&worker, Some("room-5")).await;
        assert_eq!(session.persona_kind(), PersonaKind::Interactive);
        assert_eq!(handle.drain_replies(), vec![GREETING.to_string()]);
    }

    let record = store.get("room-5").await.unwrap().unwrap();
    assert_eq!(record.request_state, RequestState::Pending);
    assert_eq!(record.requestor_name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn silent_persona_stays_quiet_for_every_event() {
    let (_dir, store) = sqlite_store().await;
    let engine = RuleEngine::new(json!({}));
    let worker = Worker::prewarm(AgentConfig::default(), Arc::new(store), engine.clone()).unwrap();

    let (mut session, mut handle) = start(&worker, Some("room-8")).await;
    session.handle_event(speech("human")).await.unwrap();
    handle.drain_replies();

    for text in ["help", "urgent, I need a human now", "what is my balance?"] {
        session.handle_event(speech(text)).await.unwrap();
    }
    session
        .handle_event(SessionEvent::Message {
            participant: caller(),
            text: "hello?".to_string(),
        })
        .await
        .unwrap();
    session
        .handle_event(SessionEvent::SpeechInterrupted {
            participant: caller(),
        })
        .await
        .unwrap();

    assert!(handle.drain_replies().is_empty());
    assert_eq!(engine.calls(), 1);
    assert_eq!(session.persona_kind(), PersonaKind::Silent);
}

#[tokio::test(start_paused = true)]
async fn stalled_write_times_out_when_bounded() {
    let config = AgentConfig {
        store_write_timeout_secs: Some(2),
        ..AgentConfig::default()
    };
    let worker = Worker::prewarm(config, Arc::new(StalledStore), RuleEngine::new(json!({}))).unwrap();

    let (mut session, mut handle) = start(&worker, Some("room-1")).await;
    handle.drain_replies();
    session.handle_event(speech("human")).await.unwrap();

    let replies = handle.drain_replies();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains(SUPERVISOR_ERROR_PREFIX));
    assert!(replies[0].contains("timed out after 2s"));
    assert_eq!(session.persona_kind(), PersonaKind::Interactive);
}

#[tokio::test]
async fn timed_out_write_leaves_no_pending_record() {
    let (dir, store) = sqlite_store().await;
    let store = Arc::new(store);
    let config = AgentConfig {
        store_write_timeout_secs: Some(1),
        ..AgentConfig::default()
    };
    let worker = Worker::prewarm(config, store.clone(), RuleEngine::new(json!({}))).unwrap();

    let writer = rusqlite::Connection::open(dir.path().join("escalations.db")).expect("writer");
    writer.execute_batch("BEGIN IMMEDIATE;").expect("take write lock");

    let (mut session, mut handle) = start(&worker, Some("room-1")).await;
    handle.drain_replies();
    session.handle_event(speech("human please")).await.unwrap();

    let replies = handle.drain_replies();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains(SUPERVISOR_ERROR_PREFIX));
    assert!(replies[0].contains("timed out after 1s"), "reply: {}", replies[0]);
    assert_eq!(session.persona_kind(), PersonaKind::Interactive);

    writer.execute_batch("COMMIT;").expect("release write lock");
    assert!(store.get("room-1").await.unwrap().is_none());
}

#[tokio::test]
async fn escalation_survives_a_caller_who_already_left() {
    let (_dir, store) = sqlite_store().await;
    let store = Arc::new(store);
    let worker =
        Worker::prewarm(AgentConfig::default(), store.clone(), RuleEngine::new(json!({}))).unwrap();

    let (mut session, handle) = start(&worker, Some("room-9")).await;
    drop(handle);

    let result = session.handle_event(speech("get me a human")).await;

    assert!(matches!(result, Err(VoiceError::Transport(_))));
    assert_eq!(session.persona_kind(), PersonaKind::Silent);
    let record = store.get("room-9").await.unwrap().expect("record written");
    assert_eq!(record.request_state, RequestState::Pending);
}
