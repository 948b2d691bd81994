use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    pub sequence_no: u64,
    pub timestamp: String,
    pub kind: RuntimeEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RuntimeEventKind {
    Pipeline(PipelineEvent),
    Step(StepEvent),
    Reconciliation(ReconciliationEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        run_id: String,
        step_order: Vec<String>,
    },
    Completed {
        run_id: String,
        entity_count: usize,
        relationship_count: usize,
    },
    Failed {
        run_id: String,
        step_id: Option<String>,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepEvent {
    Started {
        run_id: String,
        step_id: String,
        name: String,
    },
    Completed {
        run_id: String,
        step_id: String,
        entities_added: usize,
        relationships_added: usize,
        duration_ms: u64,
    },
    Failed {
        run_id: String,
        step_id: String,
        reason: String,
    },
    Skipped {
        run_id: String,
        step_id: String,
        blocked_by: String,
    },
    UndeclaredType {
        run_id: String,
        step_id: String,
        type_name: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconciliationEvent {
    CrossReferenceSkipped {
        run_id: String,
        step_id: String,
        relationship_type: String,
        from_key: String,
        missing_key: String,
    },
    DanglingRelationship {
        run_id: String,
        relationship_type: String,
        from_key: String,
        to_key: String,
        missing_keys: Vec<String>,
    },
}

pub trait RuntimeEventObserver: Send + Sync {
    fn on_event(&self, event: &RuntimeEvent);
}

impl<F> RuntimeEventObserver for F
where
    F: Fn(&RuntimeEvent) + Send + Sync,
{
    fn on_event(&self, event: &RuntimeEvent) {
        self(event);
    }
}

pub type SharedRuntimeEventObserver = Arc<dyn RuntimeEventObserver>;
pub type RuntimeEventSender = mpsc::UnboundedSender<RuntimeEvent>;
pub type RuntimeEventReceiver = mpsc::UnboundedReceiver<RuntimeEvent>;

#[derive(Clone, Default)]
pub struct RuntimeEventSink {
    observer: Option<SharedRuntimeEventObserver>,
    sender: Option<RuntimeEventSender>,
}

impl RuntimeEventSink {
    pub fn with_observer(observer: SharedRuntimeEventObserver) -> Self {
        Self {
            observer: Some(observer),
            sender: None,
        }
    }

    pub fn with_sender(sender: RuntimeEventSender) -> Self {
        Self {
            observer: None,
            sender: Some(sender),
        }
    }

    pub fn sender(mut self, sender: RuntimeEventSender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.observer.is_some() || self.sender.is_some()
    }

    pub fn emit(&self, event: RuntimeEvent) {
        if let Some(observer) = self.observer.as_ref() {
            observer.on_event(&event);
        }
        if let Some(sender) = self.sender.as_ref() {
            let _ = sender.send(event);
        }
    }
}

pub fn runtime_event_channel() -> (RuntimeEventSender, RuntimeEventReceiver) {
    mpsc::unbounded_channel()
}

/// Stamps events of one run with a monotonically increasing sequence number
/// before handing them to the sink.
pub struct RunEvents {
    run_id: String,
    sink: RuntimeEventSink,
    next_sequence_no: AtomicU64,
}

impl RunEvents {
    pub fn new(run_id: impl Into<String>, sink: RuntimeEventSink) -> Self {
        Self {
            run_id: run_id.into(),
            sink,
            next_sequence_no: AtomicU64::new(1),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&self, kind: RuntimeEventKind) {
        if !self.sink.is_enabled() {
            return;
        }
        let sequence_no = self.next_sequence_no.fetch_add(1, Ordering::Relaxed);
        self.sink.emit(RuntimeEvent {
            sequence_no,
            timestamp: timestamp_now(),
            kind,
        });
    }

    pub fn pipeline(&self, event: PipelineEvent) {
        self.emit(RuntimeEventKind::Pipeline(event));
    }

    pub fn step(&self, event: StepEvent) {
        self.emit(RuntimeEventKind::Step(event));
    }

    pub fn reconciliation(&self, event: ReconciliationEvent) {
        self.emit(RuntimeEventKind::Reconciliation(event));
    }
}

pub(crate) fn timestamp_now() -> String {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "{}.{:03}Z",
        since_epoch.as_secs(),
        since_epoch.subsec_millis()
    )
}
