//! Scripted collaborators for engine tests.

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use serde_json::Value;
use tokio::{
    sync::{Notify, oneshot},
    task::JoinHandle,
    time::sleep,
};

use crate::{
    data::{CapturedValues, FieldNode, FieldTree, FieldValue},
    error::{RenderError, TransportError},
    render::{
        FieldEvent, FieldEvents, FieldHandle, FieldHandleSet, RenderOptions, RenderTarget,
        event_channel,
    },
    submit::{Notice, Transport, TransportResponse},
    validate::ValidationError,
};

/// A canned transport answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(u16, Option<Value>),
    Fail(String),
    /// Responds with the status after a delay.
    Delayed(Duration, u16),
    /// Responds 200 after a delay from a detached task, like a request
    /// that keeps running after its caller gave up.
    Late(Duration),
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Reply::Respond(status, None)
    }

    pub fn status_with(status: u16, data: Value) -> Self {
        Reply::Respond(status, Some(data))
    }
}

/// Serves a fixed schema and answers posts from a queue.
///
/// Posts beyond the queue are answered with a bare 200.
pub struct ScriptedTransport {
    schema: Value,
    schema_reply: Option<Reply>,
    replies: Mutex<VecDeque<Reply>>,
    posted: Arc<Mutex<Vec<Value>>>,
    late: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(schema: Value) -> Self {
        Self {
            schema,
            schema_reply: None,
            replies: Mutex::new(VecDeque::new()),
            posted: Arc::new(Mutex::new(Vec::new())),
            late: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reply(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Replaces the schema response.
    pub fn schema_reply(mut self, reply: Reply) -> Self {
        self.schema_reply = Some(reply);
        self
    }

    /// Bodies posted so far.
    pub fn posted(&self) -> Vec<Value> {
        self.posted.lock().unwrap().clone()
    }

    /// Shared view of the posted bodies, usable after the transport moved.
    pub fn posted_handle(&self) -> Arc<Mutex<Vec<Value>>> {
        self.posted.clone()
    }

    /// Number of `Late` replies that completed.
    pub fn late_responses(&self) -> usize {
        self.late.load(Ordering::SeqCst)
    }

    async fn answer(&self, reply: Reply) -> Result<TransportResponse, TransportError> {
        match reply {
            Reply::Respond(status, data) => Ok(TransportResponse { status, data }),
            Reply::Fail(message) => Err(TransportError::Request(message)),
            Reply::Delayed(after, status) => {
                sleep(after).await;
                Ok(TransportResponse { status, data: None })
            }
            Reply::Late(after) => {
                let (tx, rx) = oneshot::channel();
                let late = self.late.clone();
                tokio::spawn(async move {
                    sleep(after).await;
                    late.fetch_add(1, Ordering::SeqCst);
                    let _ = tx.send(TransportResponse {
                        status: 200,
                        data: None,
                    });
                });
                rx.await.map_err(|e| TransportError::Request(e.to_string()))
            }
        }
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, _url: &str, _timeout: Duration) -> Result<TransportResponse, TransportError> {
        let reply = self
            .schema_reply
            .clone()
            .unwrap_or_else(|| Reply::status_with(200, self.schema.clone()));
        self.answer(reply).await
    }

    async fn post(
        &self,
        _url: &str,
        body: &Value,
        _timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        self.posted.lock().unwrap().push(body.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::status(200));
        self.answer(reply).await
    }
}

/// One simulated user interaction.
#[derive(Debug, Clone)]
pub enum Action {
    Set(String, FieldValue),
    /// Requests a submit and waits until the attempt settled.
    Submit,
    /// Requests a submit without waiting.
    SubmitNoWait,
    Pause(Duration),
}

pub fn set(key: &str, value: impl Into<FieldValue>) -> Action {
    Action::Set(key.to_string(), value.into())
}

/// Everything the engine pushed to the rendered steps.
#[derive(Debug, Default)]
pub struct RenderLog {
    pub rendered: Vec<u32>,
    pub options: Vec<RenderOptions>,
    /// One entry per `show_errors` call.
    pub shown: Vec<Vec<ValidationError>>,
    /// Keys of cleared errors.
    pub cleared: Vec<String>,
    pub submitting: Vec<bool>,
    pub notices: Vec<Notice>,
    pub notice_clears: usize,
    pub teardowns: usize,
}

/// Renders steps by replaying one script of actions per step.
#[derive(Default)]
pub struct ScriptedRenderer {
    scripts: VecDeque<Vec<Action>>,
    omitted: HashSet<String>,
    log: Arc<Mutex<RenderLog>>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the script of the next step.
    pub fn step(mut self, actions: Vec<Action>) -> Self {
        self.scripts.push_back(actions);
        self
    }

    /// Leaves a field out of every render.
    pub fn omitting(mut self, key: &str) -> Self {
        self.omitted.insert(key.to_string());
        self
    }

    pub fn log(&self) -> Arc<Mutex<RenderLog>> {
        self.log.clone()
    }
}

impl RenderTarget for ScriptedRenderer {
    type Handles = ScriptedHandles;

    fn render(&mut self, tree: &FieldTree, options: &RenderOptions) -> Result<ScriptedHandles, RenderError> {
        {
            let mut log = self.log.lock().unwrap();
            log.rendered.push(tree.step);
            log.options.push(options.clone());
        }

        let mut values = CapturedValues::new();
        seed(&mut values, &tree.fields);

        let handles = tree
            .iter()
            .filter(|n| !self.omitted.contains(&n.key))
            .map(|n| FieldHandle {
                key: n.key.clone(),
                name: n.name.clone(),
                field_type: n.field_type,
            })
            .collect();

        Ok(ScriptedHandles {
            handles,
            values: Arc::new(Mutex::new(values)),
            script: self.scripts.pop_front().unwrap_or_default(),
            settled: Arc::new(Notify::new()),
            log: self.log.clone(),
            feeder: None,
        })
    }
}

fn seed(values: &mut CapturedValues, nodes: &[FieldNode]) {
    for node in nodes {
        if let Some(v) = node.initial() {
            values.insert(node.key.clone(), v.clone());
        }
        for group in node.groups() {
            seed(values, &group.fields);
        }
    }
}

pub struct ScriptedHandles {
    handles: Vec<FieldHandle>,
    values: Arc<Mutex<CapturedValues>>,
    script: Vec<Action>,
    settled: Arc<Notify>,
    log: Arc<Mutex<RenderLog>>,
    feeder: Option<JoinHandle<()>>,
}

impl FieldHandleSet for ScriptedHandles {
    fn handles(&self) -> Vec<FieldHandle> {
        self.handles.clone()
    }

    fn captured(&self) -> CapturedValues {
        self.values.lock().unwrap().clone()
    }

    fn subscribe(&mut self) -> FieldEvents {
        let (tx, rx) = event_channel();
        let script = std::mem::take(&mut self.script);
        let values = self.values.clone();
        let settled = self.settled.clone();

        self.feeder = Some(tokio::spawn(async move {
            for action in script {
                match action {
                    Action::Set(key, value) => {
                        let Ok(permit) = tx.reserve().await else { return };
                        values.lock().unwrap().insert(key.clone(), value);
                        permit.send(FieldEvent::Changed { key });
                    }
                    Action::Submit => {
                        if tx.send(FieldEvent::SubmitRequested).await.is_err() {
                            return;
                        }
                        settled.notified().await;
                    }
                    Action::SubmitNoWait => {
                        if tx.send(FieldEvent::SubmitRequested).await.is_err() {
                            return;
                        }
                    }
                    Action::Pause(d) => sleep(d).await,
                }
            }
        }));
        rx
    }

    fn show_errors(&mut self, errors: &[ValidationError]) {
        self.log.lock().unwrap().shown.push(errors.to_vec());
        self.settled.notify_one();
    }

    fn clear_errors(&mut self, errors: &[ValidationError]) {
        let mut log = self.log.lock().unwrap();
        log.cleared.extend(errors.iter().map(|e| e.field.key.clone()));
    }

    fn set_submitting(&mut self, submitting: bool) {
        self.log.lock().unwrap().submitting.push(submitting);
        if !submitting {
            self.settled.notify_one();
        }
    }

    fn show_notice(&mut self, notice: &Notice) {
        self.log.lock().unwrap().notices.push(notice.clone());
    }

    fn clear_notice(&mut self) {
        self.log.lock().unwrap().notice_clears += 1;
    }

    fn teardown(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        self.log.lock().unwrap().teardowns += 1;
    }
}
