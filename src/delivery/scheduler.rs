// =============================================================================
// Delivery Scheduler — routes triggers through the report pipeline
// =============================================================================
//
// Two independent trigger sources feed the same pipeline:
//
//   On-demand — every inbound chat message produces one report, replied to
//               the originating chat.  `/start` (or the first message when
//               nobody is registered) also registers that chat as the
//               recipient of daily pushes.
//   Daily     — a single process-lifetime job fires at the configured time
//               and pushes one report to the registered recipient.
//
// Each inbound message is handled on its own task so a slow batch never
// blocks polling.  Runs are independent; there is no queueing.
// =============================================================================

use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::chat::{ChatId, ChatTransport, InboundMessage};
use crate::delivery::DailySchedule;
use crate::error::PipelineError;
use crate::pipeline::{ReportPipeline, Trigger};

/// Back-off after a failed inbound poll.
const POLL_RETRY_SECS: u64 = 5;

pub struct DeliveryScheduler {
    pipeline: ReportPipeline,
    transport: Arc<dyn ChatTransport>,
    recipient: RwLock<Option<ChatId>>,
    daily_job: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryScheduler {
    pub fn new(
        pipeline: ReportPipeline,
        transport: Arc<dyn ChatTransport>,
        recipient: Option<ChatId>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            transport,
            recipient: RwLock::new(recipient),
            daily_job: Mutex::new(None),
        })
    }

    /// Chat that receives daily pushes, if one is registered.
    pub fn recipient(&self) -> Option<ChatId> {
        *self.recipient.read()
    }

    /// Register `chat_id` as the daily recipient.  Returns `true` when the
    /// recipient changed.  Never touches the daily job.
    pub fn register_recipient(&self, chat_id: ChatId) -> bool {
        let mut recipient = self.recipient.write();
        if *recipient == Some(chat_id) {
            return false;
        }
        info!(chat_id, previous = ?*recipient, "daily recipient registered");
        *recipient = Some(chat_id);
        true
    }

    // -------------------------------------------------------------------------
    // On-demand
    // -------------------------------------------------------------------------

    /// Handle one inbound message: optionally register the sender, build a
    /// report and reply with it.
    pub async fn handle_inbound(&self, message: &InboundMessage) -> Result<(), PipelineError> {
        if message.is_start_command() || self.recipient().is_none() {
            self.register_recipient(message.chat_id);
        }

        let report = self.pipeline.run(Trigger::OnDemand).await;
        self.transport
            .send_message(message.chat_id, &report.render())
            .await
    }

    /// Poll the transport forever, spawning one task per inbound message.
    pub async fn run_inbound_loop(self: Arc<Self>) {
        info!("inbound message loop started");
        let mut offset = None;

        loop {
            let batch = match self.transport.poll_updates(offset).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "inbound poll failed — retrying in {POLL_RETRY_SECS}s");
                    tokio::time::sleep(Duration::from_secs(POLL_RETRY_SECS)).await;
                    continue;
                }
            };

            if batch.next_offset.is_some() {
                offset = batch.next_offset;
            }

            for message in batch.messages {
                let this = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.handle_inbound(&message).await {
                        error!(chat_id = message.chat_id, error = %e, "on-demand report delivery failed");
                    }
                });
            }
        }
    }

    // -------------------------------------------------------------------------
    // Daily
    // -------------------------------------------------------------------------

    /// Build one report and push it to the registered recipient.
    ///
    /// Returns `Ok(false)` without running the pipeline when no recipient is
    /// registered.
    pub async fn deliver_daily(&self) -> Result<bool, PipelineError> {
        let Some(chat_id) = self.recipient() else {
            warn!("daily report skipped — no recipient registered yet");
            return Ok(false);
        };

        let report = self.pipeline.run(Trigger::Daily).await;
        self.transport.send_message(chat_id, &report.render()).await?;
        info!(chat_id, "daily report delivered");
        Ok(true)
    }

    /// Spawn the daily job.  Idempotent: while a job is alive, further calls
    /// return `false` and spawn nothing.
    pub fn start_daily_job(self: &Arc<Self>, schedule: DailySchedule) -> bool {
        let mut slot = self.daily_job.lock();
        if slot.as_ref().is_some_and(|job| !job.is_finished()) {
            return false;
        }

        let weak = Arc::downgrade(self);
        *slot = Some(tokio::spawn(run_daily_job(weak, schedule)));
        info!(schedule = %schedule, "daily report job started");
        true
    }

    /// Abort the daily job, if running.
    pub fn stop_daily_job(&self) {
        if let Some(job) = self.daily_job.lock().take() {
            job.abort();
            info!("daily report job stopped");
        }
    }

    pub fn daily_job_active(&self) -> bool {
        self.daily_job
            .lock()
            .as_ref()
            .is_some_and(|job| !job.is_finished())
    }
}

/// Sleep until each firing, then deliver.  Holds only a weak reference so
/// the scheduler can be dropped.
async fn run_daily_job(scheduler: Weak<DeliveryScheduler>, schedule: DailySchedule) {
    loop {
        let now = Utc::now();
        let next = schedule.next_after(now);
        info!(next = %next, "next daily report scheduled");
        tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

        let Some(scheduler) = scheduler.upgrade() else {
            return;
        };
        if let Err(e) = scheduler.deliver_daily().await {
            error!(error = %e, "daily report delivery failed");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::chat::UpdateBatch;
    use crate::evaluator::tests::{rising, FakeSource, Script};
    use crate::evaluator::{BatchEvaluator, EvaluatorSettings};
    use crate::types::Instrument;

    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<(ChatId, String)>>,
        delivered: Notify,
        batches: Mutex<VecDeque<Result<UpdateBatch, PipelineError>>>,
        fail_sends: bool,
    }

    impl FakeTransport {
        fn with_batches(batches: Vec<Result<UpdateBatch, PipelineError>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                ..Self::default()
            }
        }

        async fn wait_for_sent(&self, count: usize) {
            while self.sent.lock().len() < count {
                self.delivered.notified().await;
            }
        }
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), PipelineError> {
            if self.fail_sends {
                return Err(PipelineError::Transport("chat down".into()));
            }
            self.sent.lock().push((chat_id, text.to_string()));
            self.delivered.notify_one();
            Ok(())
        }

        async fn poll_updates(&self, _offset: Option<i64>) -> Result<UpdateBatch, PipelineError> {
            let next = self.batches.lock().pop_front();
            match next {
                Some(batch) => batch,
                None => std::future::pending().await,
            }
        }
    }

    fn pipeline() -> ReportPipeline {
        let source = FakeSource::default()
            .with("X", Script::Closes(rising(30)))
            .with("Y", Script::Fail);
        ReportPipeline::new(
            BatchEvaluator::new(Arc::new(source), EvaluatorSettings::default()),
            vec![Instrument::new("X", "Inst1"), Instrument::new("Y", "Inst2")],
        )
    }

    fn message(chat_id: ChatId, text: &str) -> InboundMessage {
        InboundMessage {
            chat_id,
            text: Some(text.to_string()),
        }
    }

    #[tokio::test]
    async fn inbound_message_gets_report_reply() {
        let transport = Arc::new(FakeTransport::default());
        let scheduler = DeliveryScheduler::new(pipeline(), transport.clone(), None);

        scheduler.handle_inbound(&message(5, "rsi")).await.unwrap();

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 5);
        assert!(sent[0].1.contains("🔴 Inst1: 100"));
        assert!(sent[0].1.ends_with("Errors\nY"));
    }

    #[tokio::test]
    async fn start_registers_and_replaces_recipient() {
        let transport = Arc::new(FakeTransport::default());
        let scheduler = DeliveryScheduler::new(pipeline(), transport, Some(1));

        scheduler.handle_inbound(&message(2, "hello")).await.unwrap();
        assert_eq!(scheduler.recipient(), Some(1));

        scheduler.handle_inbound(&message(3, "/start")).await.unwrap();
        assert_eq!(scheduler.recipient(), Some(3));
    }

    #[tokio::test]
    async fn first_message_registers_when_nobody_is() {
        let transport = Arc::new(FakeTransport::default());
        let scheduler = DeliveryScheduler::new(pipeline(), transport, None);

        scheduler.handle_inbound(&message(9, "hi")).await.unwrap();
        assert_eq!(scheduler.recipient(), Some(9));
    }

    #[tokio::test]
    async fn transport_failure_is_reported_not_panicked() {
        let transport = Arc::new(FakeTransport {
            fail_sends: true,
            ..FakeTransport::default()
        });
        let scheduler = DeliveryScheduler::new(pipeline(), transport, None);

        let err = scheduler.handle_inbound(&message(9, "hi")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Transport(_)));
    }

    #[tokio::test]
    async fn daily_delivery_needs_a_recipient() {
        let transport = Arc::new(FakeTransport::default());
        let scheduler = DeliveryScheduler::new(pipeline(), transport.clone(), None);

        assert!(!scheduler.deliver_daily().await.unwrap());
        assert!(transport.sent.lock().is_empty());

        scheduler.register_recipient(77);
        assert!(scheduler.deliver_daily().await.unwrap());
        assert_eq!(transport.sent.lock()[0].0, 77);
    }

    #[tokio::test]
    async fn daily_job_is_started_once() {
        let transport = Arc::new(FakeTransport::default());
        let scheduler = DeliveryScheduler::new(pipeline(), transport, Some(1));
        let schedule = DailySchedule::at(8, 0).unwrap();

        assert!(scheduler.start_daily_job(schedule));
        assert!(!scheduler.start_daily_job(schedule));
        assert!(!scheduler.start_daily_job(DailySchedule::at(9, 0).unwrap()));
        assert!(scheduler.daily_job_active());

        // Re-registering the recipient never spawns another job.
        scheduler.register_recipient(2);
        assert!(!scheduler.start_daily_job(schedule));

        scheduler.stop_daily_job();
        tokio::task::yield_now().await;
        assert!(!scheduler.daily_job_active());
        assert!(scheduler.start_daily_job(schedule));
        scheduler.stop_daily_job();
    }

    #[tokio::test(start_paused = true)]
    async fn daily_job_pushes_to_recipient() {
        let transport = Arc::new(FakeTransport::default());
        let scheduler = DeliveryScheduler::new(pipeline(), transport.clone(), Some(42));

        scheduler.start_daily_job(DailySchedule::at(6, 0).unwrap());
        transport.wait_for_sent(1).await;
        scheduler.stop_daily_job();

        let sent = transport.sent.lock();
        assert_eq!(sent[0].0, 42);
        assert!(sent[0].1.contains("Inst1"));
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_loop_replies_to_every_message() {
        let transport = Arc::new(FakeTransport::with_batches(vec![
            Err(PipelineError::Transport("flaky".into())),
            Ok(UpdateBatch {
                next_offset: Some(11),
                messages: vec![message(7, "/start"), message(8, "rsi?")],
            }),
        ]));
        let scheduler = DeliveryScheduler::new(pipeline(), transport.clone(), None);

        let poller = tokio::spawn(scheduler.clone().run_inbound_loop());
        tokio::time::timeout(Duration::from_secs(30), transport.wait_for_sent(2))
            .await
            .expect("both messages answered");
        poller.abort();

        let mut chats: Vec<ChatId> = transport.sent.lock().iter().map(|(c, _)| *c).collect();
        chats.sort();
        assert_eq!(chats, vec![7, 8]);
        assert_eq!(scheduler.recipient(), Some(7));
    }
}
