//! Scheduler tick: routine firing, due-task evaluation and retention.
//!
//! Each tick walks every stored user. Under the user's lock it evaluates
//! due tasks, materializes routine firings that fall inside the tick
//! window, prunes old finished tasks and writes the record back. The lock
//! is released before any notification goes out, so the assistant can take
//! it again to answer.
//!
//! Firing is "last occurrence within this window": the window is
//! `(now - tick_interval, now]`, or `(previous tick, now]` while the driver
//! keeps running. Nothing is checkpointed, so a tick that never ran
//! (downtime) is skipped rather than backfilled. A task records
//! the occurrence it was created for, which keeps repeated ticks inside one
//! window from firing a routine twice.

use chrono::{DateTime, Utc};
use remindly_config::AppConfig;
use remindly_core::error::Error;
use remindly_core::locks::UserLocks;
use remindly_core::notify::{DueKind, TaskNotifier};
use remindly_core::recurrence::Recurrence;
use remindly_core::store::{Store, UserId, UserRecord};
use remindly_core::task::{Task, TaskStatus};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Totals for one tick across all users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub users: usize,
    pub routines_fired: usize,
    pub tasks_completed: usize,
    pub tasks_replanning: usize,
    pub notifications: usize,
    /// Notices handed to the driver's consumer instead of delivered inline.
    pub queued: usize,
    pub pruned: usize,
    pub errors: usize,
}

impl TickReport {
    fn absorb(&mut self, user: &Evaluation) {
        self.routines_fired += user.routines_fired;
        self.tasks_completed += user.tasks_completed;
        self.tasks_replanning += user.tasks_replanning;
        self.pruned += user.pruned;
        self.errors += user.errors;
    }
}

/// What one user's evaluation changed and who needs telling.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub routines_fired: usize,
    pub tasks_completed: usize,
    pub tasks_replanning: usize,
    pub pruned: usize,
    pub errors: usize,
    pub due: Vec<(Task, DueKind)>,
}

impl Evaluation {
    fn changed(&self) -> bool {
        self.routines_fired > 0 || self.tasks_completed > 0 || self.tasks_replanning > 0 || self.pruned > 0
    }
}

/// Evaluate one record at `now` for the window `(window_start, now]`.
///
/// Tasks materialized here are first evaluated on the next tick.
pub fn evaluate(
    record: &mut UserRecord,
    now: DateTime<Utc>,
    window_start: DateTime<Utc>,
    retention_ceiling: usize,
) -> Evaluation {
    let mut eval = Evaluation::default();
    let mut auto_completed_routines: Vec<String> = Vec::new();

    for task in record.tasks.iter_mut().filter(|t| t.ping_at <= now) {
        match task.status {
            TaskStatus::Pending => match task.mark_due() {
                Ok(TaskStatus::Completed) => {
                    info!(task_id = %task.id, name = %task.name, "Task reached ping, completed");
                    eval.tasks_completed += 1;
                    if let Some(routine_id) = &task.routine_id {
                        auto_completed_routines.push(routine_id.clone());
                    }
                    eval.due.push((task.clone(), DueKind::Notice));
                }
                Ok(status) => {
                    info!(task_id = %task.id, name = %task.name, status = %status, "Task reached ping, needs replanning");
                    eval.tasks_replanning += 1;
                    eval.due.push((task.clone(), DueKind::Replan));
                }
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Task could not be marked due");
                    eval.errors += 1;
                }
            },
            TaskStatus::NeedsReplanning => {
                debug!(task_id = %task.id, "Task still awaiting a decision, prompting again");
                eval.due.push((task.clone(), DueKind::Replan));
            }
            TaskStatus::Completed | TaskStatus::Failed => {}
        }
    }

    for routine_id in auto_completed_routines {
        if let Some(routine) = record.routine_mut(&routine_id) {
            routine.stats.completed += 1;
        }
    }

    let mut fired: Vec<Task> = Vec::new();
    for routine in record.routines.iter().filter(|r| r.is_active) {
        let recurrence = match Recurrence::parse(&routine.recurrence) {
            Ok(r) => r,
            Err(e) => {
                warn!(routine_id = %routine.id, error = %e, "Invalid recurrence, routine skipped");
                eval.errors += 1;
                continue;
            }
        };

        let Some(occurrence) = recurrence.last_fire_at_or_before(now) else {
            continue;
        };
        if occurrence <= window_start {
            continue;
        }

        let already = record
            .tasks
            .iter()
            .any(|t| t.routine_id.as_deref() == Some(routine.id.as_str()) && t.occurrence == Some(occurrence));
        if already {
            debug!(routine_id = %routine.id, occurrence = %occurrence, "Occurrence already materialized");
            continue;
        }

        let task = Task::from_routine(routine, occurrence, now);
        info!(routine_id = %routine.id, task_id = %task.id, occurrence = %occurrence, "Routine fired");
        fired.push(task);
    }
    eval.routines_fired = fired.len();
    record.tasks.extend(fired);

    eval.pruned = record.prune_finished(retention_ceiling);
    if eval.pruned > 0 {
        debug!(pruned = eval.pruned, "Pruned finished tasks");
    }
    eval
}

pub struct Scheduler {
    store: Arc<dyn Store>,
    notifier: Arc<dyn TaskNotifier>,
    locks: UserLocks,
    tick_interval: Duration,
    retention_ceiling: usize,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn TaskNotifier>, locks: UserLocks) -> Self {
        Self {
            store,
            notifier,
            locks,
            tick_interval: Duration::from_secs(60),
            retention_ceiling: 50,
        }
    }

    pub fn from_config(
        store: Arc<dyn Store>,
        notifier: Arc<dyn TaskNotifier>,
        locks: UserLocks,
        config: &AppConfig,
    ) -> Self {
        Self::new(store, notifier, locks)
            .with_tick_interval(Duration::from_secs(config.scheduler.tick_interval_secs))
            .with_retention_ceiling(config.store.retention_ceiling)
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_retention_ceiling(mut self, ceiling: usize) -> Self {
        self.retention_ceiling = ceiling;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// One tick at the current wall-clock time.
    pub async fn run_tick(&self) -> TickReport {
        self.run_tick_at(Utc::now()).await
    }

    /// One tick at `now`, delivering notifications before returning.
    ///
    /// Used by the one-shot `tick` command. Failures are counted per user,
    /// never propagated.
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let (mut report, due) = self.sweep(now, now - self.window()).await;
        for notice in due {
            match deliver(self.notifier.as_ref(), &notice).await {
                Ok(()) => report.notifications += 1,
                Err(_) => report.errors += 1,
            }
        }
        log_report(&report);
        report
    }

    fn window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.tick_interval.as_millis() as i64)
    }

    /// Evaluate every user for `(window_start, now]` and collect who is due.
    async fn sweep(&self, now: DateTime<Utc>, window_start: DateTime<Utc>) -> (TickReport, Vec<DueNotice>) {
        let mut report = TickReport::default();
        let mut due = Vec::new();
        let users = match self.store.users().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "Could not list users, tick skipped");
                report.errors += 1;
                return (report, due);
            }
        };
        info!(users = users.len(), now = %now, "Scheduler tick started");

        for user in users {
            report.users += 1;
            match self.evaluate_user(&user, now, window_start).await {
                Ok(mut eval) => {
                    report.absorb(&eval);
                    due.extend(eval.due.drain(..).map(|(task, kind)| DueNotice {
                        user: user.clone(),
                        task,
                        kind,
                    }));
                }
                Err(e) => {
                    warn!(user = %user, error = %e, "Tick failed for user");
                    report.errors += 1;
                }
            }
        }
        (report, due)
    }

    /// Evaluate and persist one user's record under their lock.
    async fn evaluate_user(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<Evaluation, Error> {
        let _guard = self.locks.lock(user).await;
        let mut record = self.store.load(user).await?;
        let eval = evaluate(&mut record, now, window_start, self.retention_ceiling);
        if eval.changed() {
            self.store.save(user, &record).await?;
        }
        Ok(eval)
    }

    /// Spawn the periodic driver. Missed ticks are skipped, not replayed.
    ///
    /// Due tasks go through a queue to a single consumer task, so a slow
    /// model turn never holds up the next tick. A task already waiting in
    /// the queue is not queued again.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let (tx, rx) = mpsc::unbounded_channel::<DueNotice>();
        let queued: Arc<Mutex<HashSet<(UserId, String)>>> = Arc::default();
        tokio::spawn(consume(self.notifier.clone(), rx, queued.clone()));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = self.tick_interval.as_secs(), "Scheduler started");

            let mut previous: Option<DateTime<Utc>> = None;
            loop {
                interval.tick().await;
                let now = Utc::now();
                let from = window_start(previous, now, self.window());
                previous = Some(now);

                let (mut report, due) = self.sweep(now, from).await;
                for notice in due {
                    if !queued.lock().await.insert(notice.key()) {
                        debug!(user = %notice.user, task_id = %notice.task.id, "Already queued");
                        continue;
                    }
                    if tx.send(notice).is_err() {
                        error!("Notification consumer stopped");
                        report.errors += 1;
                        continue;
                    }
                    report.queued += 1;
                }
                log_report(&report);
            }
        })
    }
}

/// A due task waiting to be handed to the notifier.
#[derive(Debug, Clone)]
pub struct DueNotice {
    pub user: UserId,
    pub task: Task,
    pub kind: DueKind,
}

impl DueNotice {
    fn key(&self) -> (UserId, String) {
        (self.user.clone(), self.task.id.clone())
    }
}

/// Start of the next driver window.
///
/// While the driver keeps running, each window begins where the previous
/// tick ended, so a late tick widens its window instead of dropping the
/// occurrences in between. The first tick after a start looks back one
/// interval only; downtime is never replayed.
pub fn window_start(
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    interval: chrono::Duration,
) -> DateTime<Utc> {
    match previous {
        Some(previous) if previous < now => previous,
        _ => now - interval,
    }
}

async fn deliver(notifier: &dyn TaskNotifier, notice: &DueNotice) -> Result<(), Error> {
    notifier
        .task_due(&notice.user, &notice.task, notice.kind)
        .await
        .inspect_err(|e| {
            warn!(user = %notice.user, task_id = %notice.task.id, kind = %notice.kind, error = %e, "Notification failed");
        })
}

/// Drain the driver's queue one notice at a time until the driver is gone.
async fn consume(
    notifier: Arc<dyn TaskNotifier>,
    mut rx: mpsc::UnboundedReceiver<DueNotice>,
    queued: Arc<Mutex<HashSet<(UserId, String)>>>,
) {
    while let Some(notice) = rx.recv().await {
        if deliver(notifier.as_ref(), &notice).await.is_ok() {
            debug!(user = %notice.user, task_id = %notice.task.id, "Notification delivered");
        }
        queued.lock().await.remove(&notice.key());
    }
    debug!("Notification consumer finished");
}

fn log_report(report: &TickReport) {
    info!(
        users = report.users,
        routines_fired = report.routines_fired,
        tasks_completed = report.tasks_completed,
        tasks_replanning = report.tasks_replanning,
        notifications = report.notifications,
        queued = report.queued,
        errors = report.errors,
        "Scheduler tick finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use remindly_core::task::{Annoyance, Routine};
    use remindly_store::InMemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(String, String, DueKind, bool)>>,
        locks: Option<UserLocks>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn calls(&self) -> Vec<(String, String, DueKind, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskNotifier for RecordingNotifier {
        async fn task_due(&self, user: &UserId, task: &Task, kind: DueKind) -> Result<(), Error> {
            let lock_free = self
                .locks
                .as_ref()
                .map(|locks| locks.try_lock(user).is_some())
                .unwrap_or(true);
            self.calls
                .lock()
                .unwrap()
                .push((user.to_string(), task.name.clone(), kind, lock_free));
            if self.fail {
                return Err(Error::Internal("transport down".into()));
            }
            Ok(())
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    fn alice() -> UserId {
        UserId::from("alice")
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
        scheduler: Scheduler,
    }

    fn fixture_with(notifier: RecordingNotifier, locks: UserLocks) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(notifier);
        let scheduler = Scheduler::new(store.clone(), notifier.clone(), locks);
        Fixture {
            store,
            notifier,
            scheduler,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingNotifier::default(), UserLocks::new())
    }

    async fn put(store: &InMemoryStore, user: &UserId, record: &UserRecord) {
        store.save(user, record).await.unwrap();
    }

    async fn get(store: &InMemoryStore, user: &UserId) -> UserRecord {
        store.load(user).await.unwrap()
    }

    #[tokio::test]
    async fn routine_fires_once_per_occurrence() {
        let f = fixture();
        let mut record = UserRecord::default();
        record.routines.push(Routine::new("standup", "0 9 * * *", at(8, 0)));
        put(&f.store, &alice(), &record).await;

        let first = f.scheduler.run_tick_at(at(9, 0) + ChronoDuration::seconds(20)).await;
        assert_eq!(first.routines_fired, 1);

        let record = get(&f.store, &alice()).await;
        assert_eq!(record.tasks.len(), 1);
        let task = &record.tasks[0];
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.occurrence, Some(at(9, 0)));
        assert_eq!(task.ping_at, at(9, 0) + ChronoDuration::seconds(20));
        assert_eq!(task.routine_id.as_deref(), Some(record.routines[0].id.as_str()));

        // Same window again: the occurrence is already materialized.
        let second = f.scheduler.run_tick_at(at(9, 0) + ChronoDuration::seconds(50)).await;
        assert_eq!(second.routines_fired, 0);
        assert_eq!(get(&f.store, &alice()).await.tasks.len(), 1);
    }

    #[tokio::test]
    async fn missed_window_is_skipped_not_backfilled() {
        let f = fixture();
        let mut record = UserRecord::default();
        record.routines.push(Routine::new("standup", "0 9 * * *", at(8, 0)));
        put(&f.store, &alice(), &record).await;

        let report = f.scheduler.run_tick_at(at(9, 10)).await;
        assert_eq!(report.routines_fired, 0);
        assert!(get(&f.store, &alice()).await.tasks.is_empty());
    }

    #[tokio::test]
    async fn paused_routines_do_not_fire() {
        let f = fixture();
        let mut record = UserRecord::default();
        let mut routine = Routine::new("standup", "* * * * *", at(8, 0));
        routine.is_active = false;
        record.routines.push(routine);
        put(&f.store, &alice(), &record).await;

        assert_eq!(f.scheduler.run_tick_at(at(9, 0)).await.routines_fired, 0);
    }

    #[tokio::test]
    async fn informational_task_completes_directly() {
        let f = fixture();
        let mut record = UserRecord::default();
        record.tasks.push(Task::new("drink water", at(9, 0), at(8, 0)));
        put(&f.store, &alice(), &record).await;

        let report = f.scheduler.run_tick_at(at(9, 0)).await;
        assert_eq!(report.tasks_completed, 1);
        assert_eq!(report.tasks_replanning, 0);
        assert_eq!(get(&f.store, &alice()).await.tasks[0].status, TaskStatus::Completed);
        assert_eq!(f.notifier.calls()[0].2, DueKind::Notice);
    }

    #[tokio::test]
    async fn future_tasks_are_left_alone() {
        let f = fixture();
        let mut record = UserRecord::default();
        record.tasks.push(Task::new("later", at(10, 0), at(8, 0)));
        put(&f.store, &alice(), &record).await;

        let report = f.scheduler.run_tick_at(at(9, 0)).await;
        assert_eq!(report.tasks_completed, 0);
        assert!(f.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn high_annoyance_routine_scenario() {
        let f = fixture();
        let mut record = UserRecord::default();
        let mut routine = Routine::new("take meds", "0 9 * * *", at(8, 0));
        routine.default_annoyance = Annoyance::High;
        routine.requires_action = true;
        record.routines.push(routine);
        put(&f.store, &alice(), &record).await;

        // Fires at the boundary: a pending task, not yet evaluated.
        let fired = f.scheduler.run_tick_at(at(9, 0)).await;
        assert_eq!(fired.routines_fired, 1);
        let task = get(&f.store, &alice()).await.tasks[0].clone();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.annoyance, Annoyance::High);
        assert!(f.notifier.calls().is_empty());

        // Next tick: ping reached, agent (the recording notifier) does nothing.
        let next = f.scheduler.run_tick_at(at(9, 1)).await;
        assert_eq!(next.tasks_replanning, 1);
        assert_eq!(get(&f.store, &alice()).await.tasks[0].status, TaskStatus::NeedsReplanning);

        // Still undecided: prompted again, never auto-failed.
        f.scheduler.run_tick_at(at(9, 2)).await;
        let record = get(&f.store, &alice()).await;
        assert_eq!(record.tasks.len(), 1);
        assert_eq!(record.tasks[0].status, TaskStatus::NeedsReplanning);
        let kinds: Vec<DueKind> = f.notifier.calls().into_iter().map(|c| c.2).collect();
        assert_eq!(kinds, vec![DueKind::Replan, DueKind::Replan]);
    }

    #[tokio::test]
    async fn auto_completed_routine_task_counts_in_stats() {
        let f = fixture();
        let mut record = UserRecord::default();
        let routine = Routine::new("vitamins", "0 8 * * *", at(7, 0));
        let task = Task::from_routine(&routine, at(8, 0), at(8, 0));
        record.routines.push(routine);
        record.tasks.push(task);
        put(&f.store, &alice(), &record).await;

        f.scheduler.run_tick_at(at(8, 30)).await;
        assert_eq!(get(&f.store, &alice()).await.routines[0].stats.completed, 1);
    }

    #[tokio::test]
    async fn bad_recurrence_does_not_block_other_users() {
        let f = fixture();
        let mut broken = UserRecord::default();
        broken.routines.push(Routine::new("broken", "61 * * * *", at(8, 0)));
        put(&f.store, &alice(), &broken).await;

        let bob = UserId::from("bob");
        let mut healthy = UserRecord::default();
        healthy.tasks.push(Task::new("stretch", at(9, 0), at(8, 0)));
        put(&f.store, &bob, &healthy).await;

        let report = f.scheduler.run_tick_at(at(9, 0)).await;
        assert_eq!(report.users, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.tasks_completed, 1);
        assert_eq!(f.notifier.calls()[0].0, "bob");
    }

    #[tokio::test]
    async fn notifications_run_after_the_lock_is_released() {
        let locks = UserLocks::new();
        let notifier = RecordingNotifier {
            locks: Some(locks.clone()),
            ..RecordingNotifier::default()
        };
        let f = fixture_with(notifier, locks);
        let mut record = UserRecord::default();
        let mut task = Task::new("pay rent", at(9, 0), at(8, 0));
        task.requires_action = true;
        record.tasks.push(task);
        put(&f.store, &alice(), &record).await;

        f.scheduler.run_tick_at(at(9, 0)).await;
        let calls = f.notifier.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].3, "user lock was still held during notification");
    }

    #[tokio::test]
    async fn failed_notification_is_counted_and_state_kept() {
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };
        let f = fixture_with(notifier, UserLocks::new());
        let mut record = UserRecord::default();
        record.tasks.push(Task::new("a", at(9, 0), at(8, 0)));
        record.tasks.push(Task::new("b", at(9, 0), at(8, 0)));
        put(&f.store, &alice(), &record).await;

        let report = f.scheduler.run_tick_at(at(9, 0)).await;
        assert_eq!(report.errors, 2);
        assert_eq!(report.notifications, 0);
        assert_eq!(f.notifier.calls().len(), 2);
        assert!(get(&f.store, &alice()).await.tasks.iter().all(|t| t.status == TaskStatus::Completed));
    }

    #[tokio::test]
    async fn finished_tasks_are_pruned_past_the_ceiling() {
        let f = fixture();
        let scheduler = Scheduler::new(f.store.clone(), f.notifier.clone(), UserLocks::new()).with_retention_ceiling(2);
        let mut record = UserRecord::default();
        for i in 0..4 {
            let mut task = Task::new(format!("old {i}"), at(6, 0), at(6, i));
            task.status = TaskStatus::Failed;
            record.tasks.push(task);
        }
        record.tasks.push(Task::new("open", at(12, 0), at(5, 0)));
        put(&f.store, &alice(), &record).await;

        let report = scheduler.run_tick_at(at(9, 0)).await;
        assert_eq!(report.pruned, 2);
        let names: Vec<String> = get(&f.store, &alice()).await.tasks.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["old 2", "old 3", "open"]);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_ticks_on_its_own() {
        let f = fixture();
        let mut record = UserRecord::default();
        record.tasks.push(Task::new("due long ago", Utc::now() - ChronoDuration::hours(1), Utc::now() - ChronoDuration::hours(2)));
        put(&f.store, &alice(), &record).await;

        let scheduler = Arc::new(
            Scheduler::new(f.store.clone(), f.notifier.clone(), UserLocks::new()).with_tick_interval(Duration::from_secs(60)),
        );
        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.abort();

        assert_eq!(f.notifier.calls().len(), 1);
    }

    /// Takes `delay` over every notification, like a slow model turn.
    struct SlowNotifier {
        delay: Duration,
        started: Mutex<Vec<String>>,
    }

    impl SlowNotifier {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                started: Mutex::new(Vec::new()),
            }
        }

        fn started(&self) -> Vec<String> {
            self.started.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskNotifier for SlowNotifier {
        async fn task_due(&self, _user: &UserId, task: &Task, _kind: DueKind) -> Result<(), Error> {
            self.started.lock().unwrap().push(task.name.clone());
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    fn overdue(name: &str) -> Task {
        Task::new(name, Utc::now() - ChronoDuration::hours(1), Utc::now() - ChronoDuration::hours(2))
    }

    #[test]
    fn window_follows_the_previous_tick() {
        let mut record = UserRecord::default();
        record.routines.push(Routine::new("standup", "1 9 * * *", at(8, 0)));
        let now = at(9, 2) + ChronoDuration::seconds(45);
        let interval = ChronoDuration::seconds(60);

        // A fresh driver looks back one interval and misses 09:01.
        let fresh = window_start(None, now, interval);
        assert_eq!(fresh, now - interval);
        assert_eq!(evaluate(&mut record.clone(), now, fresh, 50).routines_fired, 0);

        // A late tick picks up where the previous one stopped.
        let previous = at(9, 0) + ChronoDuration::seconds(30);
        let late = window_start(Some(previous), now, interval);
        assert_eq!(late, previous);
        let eval = evaluate(&mut record, now, late, 50);
        assert_eq!(eval.routines_fired, 1);
        assert_eq!(record.tasks[0].occurrence, Some(at(9, 1)));

        // A clock that went backwards falls back to one interval.
        assert_eq!(window_start(Some(now), now, interval), now - interval);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_notifier_does_not_hold_up_the_next_tick() {
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(SlowNotifier::new(Duration::from_secs(300)));
        let mut record = UserRecord::default();
        record.tasks.push(overdue("a"));
        put(&store, &alice(), &record).await;

        let scheduler = Arc::new(
            Scheduler::new(store.clone(), notifier.clone(), UserLocks::new())
                .with_tick_interval(Duration::from_secs(60)),
        );
        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(notifier.started(), vec!["a"]);

        let bob = UserId::from("bob");
        let mut record = UserRecord::default();
        record.tasks.push(overdue("b"));
        put(&store, &bob, &record).await;

        // The second tick runs while "a" is still being delivered.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(get(&store, &bob).await.tasks[0].status, TaskStatus::Completed);
        assert_eq!(notifier.started(), vec!["a"]);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(notifier.started(), vec!["a", "b"]);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn queued_task_is_not_queued_again() {
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(SlowNotifier::new(Duration::from_secs(600)));
        let mut record = UserRecord::default();
        let mut task = overdue("pay rent");
        task.requires_action = true;
        record.tasks.push(task);
        put(&store, &alice(), &record).await;

        let scheduler = Arc::new(
            Scheduler::new(store.clone(), notifier.clone(), UserLocks::new())
                .with_tick_interval(Duration::from_secs(60)),
        );
        let handle = scheduler.start();

        // Five ticks while the first prompt is still open.
        tokio::time::sleep(Duration::from_secs(250)).await;
        assert_eq!(notifier.started().len(), 1);
        assert_eq!(get(&store, &alice()).await.tasks[0].status, TaskStatus::NeedsReplanning);

        // Once it is answered, a still-undecided task is prompted again.
        tokio::time::sleep(Duration::from_secs(450)).await;
        assert_eq!(notifier.started().len(), 2);
        handle.abort();
    }
}
