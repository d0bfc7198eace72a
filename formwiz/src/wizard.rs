//! Step sequencing.
//!
//! A [`Wizard`] loads the schema once and then walks the steps in order:
//! compile, render, wait for an accepted and submitted attempt, advance.
//! All run state lives in the [`WizardContext`] the wizard owns; observers
//! register callbacks on it instead of reading shared state.

use serde::Serialize;

use crate::{
    aggregate::{StructuredRecord, reshape},
    compile::compile_step,
    config::WizardConfig,
    data::{FieldSchema, FieldTree, schema::total_steps},
    error::{RenderError, WizardError},
    render::{FieldEvent, FieldHandleSet, RenderOptions, RenderTarget},
    submit::{SubmissionResult, Transport, fetch_schema, submit},
    validate::{ErrorBoard, check_completeness},
};

/// Phase of a wizard run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WizardPhase {
    /// Fetching the schema.
    Loading,
    /// Waiting for the given step to be submitted.
    StepActive(u32),
    /// Every step was submitted.
    Finished,
    /// The run stopped on an unrecoverable error.
    Failed,
}

impl WizardPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WizardPhase::Finished | WizardPhase::Failed)
    }
}

/// Notification delivered to context subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    PhaseChanged(WizardPhase),
    /// A submission attempt settled, successfully or not.
    StepSubmitted { step: u32, result: SubmissionResult },
}

type Subscriber = Box<dyn FnMut(&WizardEvent) + Send>;

/// State of one wizard run.
pub struct WizardContext {
    schema: Vec<FieldSchema>,
    total_steps: u32,
    current_step: u32,
    running: bool,
    phase: WizardPhase,
    subscribers: Vec<Subscriber>,
}

impl Default for WizardContext {
    fn default() -> Self {
        Self {
            schema: Vec::new(),
            total_steps: 0,
            current_step: 1,
            running: true,
            phase: WizardPhase::Loading,
            subscribers: Vec::new(),
        }
    }
}

impl WizardContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for every [`WizardEvent`] of this context.
    pub fn subscribe(&mut self, callback: impl FnMut(&WizardEvent) + Send + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    /// The full schema, all steps.
    pub fn schema(&self) -> &[FieldSchema] {
        &self.schema
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn phase(&self) -> WizardPhase {
        self.phase
    }

    fn emit(&mut self, event: &WizardEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }

    fn set_phase(&mut self, phase: WizardPhase) {
        info!("Wizard phase: {:?} -> {phase:?}", self.phase);
        self.phase = phase;
        self.emit(&WizardEvent::PhaseChanged(phase));
    }
}

/// Summary of one submitted step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: u32,
    /// The record that was posted.
    pub record: StructuredRecord,
    /// The accepted submission.
    pub result: SubmissionResult,
}

/// Terminal result of [`Wizard::run`].
#[derive(Debug)]
pub enum WizardOutcome {
    /// Every step was submitted, in order.
    Finished { reports: Vec<StepReport> },
    /// The run stopped. `step` is `None` when loading failed.
    Failed {
        step: Option<u32>,
        error: WizardError,
    },
}

impl WizardOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, WizardOutcome::Finished { .. })
    }
}

/// The wizard engine.
///
/// Generic over the transport used for fetching and submitting and the
/// target that renders each step.
pub struct Wizard<T, R> {
    config: WizardConfig,
    transport: T,
    renderer: R,
    ctx: WizardContext,
}

impl<T, R> Wizard<T, R>
where
    T: Transport,
    R: RenderTarget,
{
    pub fn new(config: WizardConfig, transport: T, renderer: R) -> Self {
        Self {
            config,
            transport,
            renderer,
            ctx: WizardContext::new(),
        }
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn context(&self) -> &WizardContext {
        &self.ctx
    }

    /// Mutable access to the context, for registering subscribers.
    pub fn context_mut(&mut self) -> &mut WizardContext {
        &mut self.ctx
    }

    /// Runs the wizard to a terminal phase.
    ///
    /// Steps are visited strictly in order; step `n + 1` is only compiled
    /// after step `n` was accepted by the endpoint.
    pub async fn run(&mut self) -> WizardOutcome {
        if let Err(e) = self.load().await {
            return self.fail(None, e);
        }

        let mut reports = Vec::new();
        while self.ctx.running {
            let step = self.ctx.current_step;
            match self.run_step(step).await {
                Ok(report) => {
                    reports.push(report);
                    self.advance();
                }
                Err(e) => return self.fail(Some(step), e),
            }
        }

        info!("Form wizard finished after {} step(s)", reports.len());
        WizardOutcome::Finished { reports }
    }

    async fn load(&mut self) -> Result<(), WizardError> {
        self.ctx.running = true;
        self.ctx.current_step = 1;
        self.ctx.set_phase(WizardPhase::Loading);
        self.config.validate()?;

        let schema = fetch_schema(
            &self.transport,
            &self.config.data_req_url,
            self.config.timeout(),
        )
        .await?;
        self.ctx.total_steps = total_steps(&schema)?;
        self.ctx.schema = schema;

        info!("Form wizard loaded with {} step(s)", self.ctx.total_steps);
        self.ctx.set_phase(WizardPhase::StepActive(1));
        Ok(())
    }

    async fn run_step(&mut self, step: u32) -> Result<StepReport, WizardError> {
        let tree = compile_step(&self.ctx.schema, step)?;
        debug!("Compiled step {step}: {tree:?}");

        let options = RenderOptions::new(&self.config, step, self.ctx.total_steps);
        let mut handles = self.renderer.render(&tree, &options)?;
        let report = self.drive_step(&tree, &mut handles).await;
        handles.teardown();
        report
    }

    /// Handles the events of one rendered step until a submission is accepted.
    async fn drive_step<H: FieldHandleSet>(
        &mut self,
        tree: &FieldTree,
        handles: &mut H,
    ) -> Result<StepReport, WizardError> {
        let step = tree.step;
        let rendered = handles.handles();
        if let Some(node) = tree.iter().find(|n| !rendered.iter().any(|h| h.key == n.key)) {
            return Err(RenderError(format!("field `{}` of step {step} was not rendered", node.name)).into());
        }

        let mut events = handles.subscribe();
        let mut board = ErrorBoard::new();
        let mut notice_shown = false;

        while let Some(event) = events.recv().await {
            if std::mem::take(&mut notice_shown) {
                handles.clear_notice();
            }
            match event {
                FieldEvent::Changed { key } => {
                    clear_live(&mut board, handles, &key);
                    continue;
                }
                FieldEvent::SubmitRequested => {}
            }

            let captured = handles.captured();
            debug!("Submit requested on step {step}: {captured:?}");

            let report = check_completeness(tree, &captured);
            let update = board.post(&report);
            if !update.cleared.is_empty() {
                handles.clear_errors(&update.cleared);
            }
            if !report.ok {
                warn!("Step {step} has {} incomplete field(s)", report.errors.len());
                handles.show_errors(&update.shown);
                continue;
            }

            let record = reshape(tree, &captured)
                .inspect_err(|e| error!("Internal contract violation in step {step}: {e}"))?;

            handles.set_submitting(true);
            let result = {
                let submission = submit(
                    &self.transport,
                    &self.config.submit_url_origin,
                    &record,
                    self.config.timeout(),
                );
                tokio::pin!(submission);
                let mut open = true;
                loop {
                    tokio::select! {
                        result = &mut submission => break result,
                        event = events.recv(), if open => match event {
                            Some(FieldEvent::Changed { key }) => clear_live(&mut board, handles, &key),
                            Some(FieldEvent::SubmitRequested) => {
                                debug!("Ignoring submit request on step {step}: a submission is in flight");
                            }
                            None => open = false,
                        },
                    }
                }
            };
            handles.set_submitting(false);

            if let Some(notice) = result.notice(self.config.success_message.as_deref()) {
                handles.show_notice(&notice);
                notice_shown = true;
            }
            self.ctx.emit(&WizardEvent::StepSubmitted {
                step,
                result: result.clone(),
            });

            if result.ok {
                info!("Step {step} of {} submitted", self.ctx.total_steps);
                return Ok(StepReport {
                    step,
                    record,
                    result,
                });
            }
            if self.config.abort_on_submit_failure {
                return Err(WizardError::Submission {
                    step,
                    message: result.message,
                });
            }
        }

        Err(WizardError::Aborted { step })
    }

    fn advance(&mut self) {
        self.ctx.current_step += 1;
        if self.ctx.current_step > self.ctx.total_steps {
            self.ctx.running = false;
            self.ctx.set_phase(WizardPhase::Finished);
        } else {
            self.ctx.set_phase(WizardPhase::StepActive(self.ctx.current_step));
        }
    }

    fn fail(&mut self, step: Option<u32>, error: WizardError) -> WizardOutcome {
        match step {
            Some(step) if error.is_defect() => {
                error!("Form wizard stopped by a defect in step {step}: {error}")
            }
            Some(step) => error!("Form wizard failed in step {step}: {error}"),
            None => error!("Form wizard failed to start: {error}"),
        }
        self.ctx.running = false;
        self.ctx.set_phase(WizardPhase::Failed);
        WizardOutcome::Failed { step, error }
    }
}

fn clear_live<H: FieldHandleSet>(board: &mut ErrorBoard, handles: &mut H, key: &str) {
    let cleared = board.clear_for(key);
    if !cleared.is_empty() {
        debug!("Cleared {} error(s) after `{key}` changed", cleared.len());
        handles.clear_errors(&cleared);
    }
}
