//! End-to-end tests for the Remindly assistant.
//!
//! These wire the real tool registry, in-memory store, console transport,
//! assistant and scheduler together around a scripted model, and follow a
//! reminder from the chat turn that creates it to the tick that delivers it.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use remindly_agent::{Assistant, Orchestrator};
use remindly_channels::{ConsoleTransport, InboundEvent};
use remindly_config::AppConfig;
use remindly_core::channel::Transport;
use remindly_core::error::ProviderError;
use remindly_core::locks::UserLocks;
use remindly_core::message::Role;
use remindly_core::provider::{
    CompletionRequest, DeltaStream, FinishReason, Provider, StreamDelta, ToolCallDelta,
};
use remindly_core::store::{Store, UserId};
use remindly_core::task::{Task, TaskStatus};
use remindly_scheduler::Scheduler;
use remindly_store::InMemoryStore;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};

// ── Scripted model ───────────────────────────────────────────────────────

type Script = Vec<Result<StreamDelta, ProviderError>>;
type Responder = Box<dyn Fn(&CompletionRequest) -> Script + Send + Sync>;

/// Answers each `stream()` call with the next responder, which can look at
/// the request (e.g. to pick up a task id from the prompt).
///
/// With a hold installed, the first call waits for it before answering.
struct ScriptedProvider {
    responders: Mutex<VecDeque<Responder>>,
    requests: Mutex<Vec<CompletionRequest>>,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
    holding: AtomicBool,
}

impl ScriptedProvider {
    fn new(responders: Vec<Responder>) -> Self {
        Self {
            responders: Mutex::new(responders.into()),
            requests: Mutex::new(Vec::new()),
            hold: Mutex::new(None),
            holding: AtomicBool::new(false),
        }
    }

    /// Keep the next model call open until the returned sender fires.
    fn hold_next(&self) -> oneshot::Sender<()> {
        let (release, hold) = oneshot::channel();
        *self.hold.lock().unwrap() = Some(hold);
        release
    }

    fn is_holding(&self) -> bool {
        self.holding.load(Ordering::SeqCst)
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, ProviderError> {
        let hold = self.hold.lock().unwrap().take();
        if let Some(hold) = hold {
            self.holding.store(true, Ordering::SeqCst);
            let _ = hold.await;
            self.holding.store(false, Ordering::SeqCst);
        }

        let responder = self
            .responders
            .lock()
            .unwrap()
            .pop_front()
            .expect("model called more often than scripted");
        let script = responder(&request);
        self.requests.lock().unwrap().push(request);

        let (tx, rx) = mpsc::channel(script.len().max(1));
        for item in script {
            tx.try_send(item).unwrap();
        }
        Ok(rx)
    }
}

fn says(text: &'static str) -> Responder {
    Box::new(move |_| {
        vec![
            Ok(StreamDelta::text(text)),
            Ok(StreamDelta::finish(FinishReason::Stop)),
        ]
    })
}

fn tool_call(id: &str, name: &str, arguments: &Value) -> Script {
    vec![
        Ok(StreamDelta::ToolCall(ToolCallDelta {
            index: 0,
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            arguments: Some(arguments.to_string()),
        })),
        Ok(StreamDelta::finish(FinishReason::ToolCalls)),
    ]
}

fn calls(name: &'static str, arguments: Value) -> Responder {
    Box::new(move |_| tool_call("call_1", name, &arguments))
}

/// Reschedules whatever task the scheduler prompt names.
fn reschedules_prompted_task() -> Responder {
    Box::new(|request| {
        let prompt = &request.messages.last().unwrap().content;
        let start = prompt.find("(task ").unwrap() + "(task ".len();
        let end = start + prompt[start..].find(')').unwrap();
        tool_call(
            "call_replan",
            "reschedule_task",
            &json!({ "task_id": &prompt[start..end] }),
        )
    })
}

// ── Harness ──────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Screen(Arc<Mutex<Vec<u8>>>);

impl Screen {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Screen {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct App {
    store: Arc<InMemoryStore>,
    provider: Arc<ScriptedProvider>,
    assistant: Arc<Assistant>,
    scheduler: Arc<Scheduler>,
    screen: Screen,
}

fn app(responders: Vec<Responder>) -> App {
    let config = AppConfig::default();
    let store = Arc::new(InMemoryStore::new());
    let provider = Arc::new(ScriptedProvider::new(responders));
    let screen = Screen::default();
    let console: Arc<dyn Transport> =
        Arc::new(ConsoleTransport::with_writer("bot> ", Box::new(screen.clone())));

    let registry = remindly_tools::default_registry(store.clone(), config.cadence.policy());
    let orchestrator = Orchestrator::from_config(provider.clone(), Arc::new(registry), &config);

    let locks = UserLocks::new();
    let assistant = Arc::new(
        Assistant::new(store.clone(), console, orchestrator, config.agent.clone())
            .with_locks(locks.clone()),
    );
    let scheduler = Arc::new(Scheduler::from_config(
        store.clone(),
        assistant.clone(),
        locks,
        &config,
    ));

    App {
        store,
        provider,
        assistant,
        scheduler,
        screen,
    }
}

fn alice() -> UserId {
    UserId::from("alice")
}

fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, hour, minute, second).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn routine_created_in_chat_fires_and_is_replanned() {
    let app = app(vec![
        calls(
            "create_routine",
            json!({ "name": "take vitamins", "recurrence": "0 9 * * *", "requires_action": true }),
        ),
        says("Routine saved."),
        reschedules_prompted_task(),
        says("Vitamins time! I'll check back soon."),
    ]);

    let reply = app
        .assistant
        .respond(&alice(), "remind me to take vitamins at 9 every day", true)
        .await
        .unwrap();
    assert_eq!(reply.text, "[✓ create_routine]\nRoutine saved.");

    let fired = app.scheduler.run_tick_at(at(9, 0, 30)).await;
    assert_eq!(fired.routines_fired, 1);
    assert_eq!(fired.notifications, 0);

    let replanned = app.scheduler.run_tick_at(at(9, 1, 30)).await;
    assert_eq!(replanned.routines_fired, 0);
    assert_eq!(replanned.tasks_replanning, 1);
    assert_eq!(replanned.notifications, 1);
    assert_eq!(replanned.errors, 0);

    let record = app.store.load(&alice()).await.unwrap();
    assert_eq!(record.tasks.len(), 1);
    let task = &record.tasks[0];
    assert_eq!(task.name, "take vitamins");
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.postpone_count, 1);
    assert_eq!(task.occurrence, Some(at(9, 0, 0)));

    // Chat turn plus the scheduler turn, each as prompt + visible reply.
    assert_eq!(record.history.len(), 4);
    assert_eq!(record.history[2].role, Role::System);
    assert!(record.history[2].content.contains("take vitamins"));

    let requests = app.provider.requests();
    assert_eq!(requests.len(), 4);
    assert!(!requests[2].tools.is_empty());
    assert!(app.screen.text().contains("Vitamins time!"));
}

#[tokio::test]
async fn informational_task_completes_with_a_plain_notice() {
    let app = app(vec![
        calls(
            "create_task",
            json!({ "name": "stretch", "ping_at": "2030-01-07T15:00:00Z" }),
        ),
        says("I'll tell you at 3."),
        says("Time to stretch!"),
    ]);

    app.assistant
        .respond(&alice(), "tell me to stretch at 3pm", true)
        .await
        .unwrap();

    let early = app.scheduler.run_tick_at(at(14, 59, 0)).await;
    assert_eq!(early.notifications, 0);

    let due = app.scheduler.run_tick_at(at(15, 0, 10)).await;
    assert_eq!(due.tasks_completed, 1);
    assert_eq!(due.notifications, 1);

    let record = app.store.load(&alice()).await.unwrap();
    assert_eq!(record.tasks[0].status, TaskStatus::Completed);

    let notice = &app.provider.requests()[2];
    assert!(notice.tools.is_empty());
    assert!(app.screen.text().contains("Time to stretch!"));
}

#[tokio::test]
async fn media_events_reach_the_model_as_text() {
    let app = app(vec![says("Got the photo.")]);

    let event = InboundEvent::Photo {
        caption: Some("pay this by friday".into()),
        description: "a parking ticket".into(),
    };
    app.assistant
        .respond(&alice(), &event.into_text(), true)
        .await
        .unwrap();

    let request = &app.provider.requests()[0];
    let last = request.messages.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert_eq!(last.content, "[photo: a parking ticket] pay this by friday");
}

#[tokio::test]
async fn a_broken_model_leaves_the_record_untouched() {
    let app = app(vec![Box::new(|_| {
        vec![Err(ProviderError::Network("connection reset".into()))]
    })]);

    let mut record = app.store.load(&alice()).await.unwrap();
    record
        .tasks
        .push(Task::new("water plants", at(18, 0, 0), at(8, 0, 0)));
    app.store.save(&alice(), &record).await.unwrap();

    let reply = app.assistant.respond(&alice(), "hi", true).await.unwrap();
    assert!(reply.degraded);
    assert_eq!(reply.text, AppConfig::default().agent.apology);

    let after = app.store.load(&alice()).await.unwrap();
    assert!(after.history.is_empty());
    assert_eq!(after.tasks.len(), 1);
    assert!(app.screen.text().contains(&AppConfig::default().agent.apology));
}

#[tokio::test]
async fn tick_during_a_slow_turn_keeps_both_writes() {
    let app = app(vec![says("Morning!")]);

    let mut record = app.store.load(&alice()).await.unwrap();
    record
        .routines
        .push(remindly_core::task::Routine::new("standup", "0 9 * * *", at(8, 0, 0)));
    app.store.save(&alice(), &record).await.unwrap();

    let release = app.provider.hold_next();
    let ticked = AtomicBool::new(false);

    let alice_id = alice();
    let chat = app.assistant.respond(&alice_id, "good morning", true);
    let tick = async {
        let report = app.scheduler.run_tick_at(at(9, 0, 30)).await;
        ticked.store(true, Ordering::SeqCst);
        report
    };
    let model = async {
        while !app.provider.is_holding() {
            tokio::task::yield_now().await;
        }
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        // The tick waits for the turn to finish with the user's record.
        assert!(!ticked.load(Ordering::SeqCst));
        release.send(()).unwrap();
    };

    let (reply, report, ()) = tokio::join!(chat, tick, model);
    assert_eq!(reply.unwrap().text, "Morning!");
    assert_eq!(report.routines_fired, 1);
    assert_eq!(report.errors, 0);

    let record = app.store.load(&alice()).await.unwrap();
    assert_eq!(record.tasks.len(), 1);
    assert_eq!(record.tasks[0].name, "standup");
    assert_eq!(record.history.len(), 2);
    assert_eq!(record.history[0].content, "good morning");
    assert_eq!(record.history[1].content, "Morning!");
}
