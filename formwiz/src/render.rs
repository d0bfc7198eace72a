//! Rendering target interface.
//!
//! The engine never touches a presentation surface. It hands a compiled
//! [`FieldTree`] to a [`RenderTarget`] and from then on talks only to the
//! returned [`FieldHandleSet`]: it reads captured values, reacts to the
//! events the set reports and pushes errors, notices and the submitting
//! indicator back.

use tokio::sync::mpsc;

use crate::{
    config::WizardConfig,
    data::{CapturedValues, FieldTree, FieldType},
    error::RenderError,
    submit::Notice,
    validate::ValidationError,
};

/// Capacity of the event channel between a handle set and the engine.
pub const EVENT_CAPACITY: usize = 64;

/// An input event reported by a rendered step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEvent {
    /// The value captured under `key` changed.
    Changed { key: String },
    /// The user asked to submit the step.
    SubmitRequested,
}

/// Receiving end of a handle set's events.
///
/// The engine treats a closed channel as the user abandoning the step.
pub type FieldEvents = mpsc::Receiver<FieldEvent>;

/// Creates an event channel with the default capacity.
pub fn event_channel() -> (mpsc::Sender<FieldEvent>, FieldEvents) {
    mpsc::channel(EVENT_CAPACITY)
}

/// Presentation hints passed through to the rendering target.
///
/// None of these are interpreted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub form_name: String,
    pub button_text: String,
    /// Whether required fields should also carry a native required hint.
    pub add_required_attribute: bool,
    pub form_css_classes: String,
    /// Class applied while a submission is in flight.
    pub loading_css_class: String,
    pub step: u32,
    pub total_steps: u32,
}

impl RenderOptions {
    pub fn new(config: &WizardConfig, step: u32, total_steps: u32) -> Self {
        Self {
            form_name: config.form_name.clone(),
            button_text: config.button_text.clone(),
            add_required_attribute: config.add_required_attribute,
            form_css_classes: config.form_css_classes.clone(),
            loading_css_class: config.loading_css_class.clone(),
            step,
            total_steps,
        }
    }
}

/// A rendered field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHandle {
    /// Capture key the field reports under.
    pub key: String,
    pub name: String,
    pub field_type: FieldType,
}

/// The live fields of one rendered step.
pub trait FieldHandleSet: Send {
    /// The rendered top-level fields.
    fn handles(&self) -> Vec<FieldHandle>;

    /// Snapshot of the values currently captured.
    fn captured(&self) -> CapturedValues;

    /// Starts reporting events.
    ///
    /// Called once per render pass.
    fn subscribe(&mut self) -> FieldEvents;

    /// Displays the errors of a rejected submit attempt.
    ///
    /// Receives only errors that are not displayed yet, and is called on
    /// every rejected attempt even when that list is empty.
    fn show_errors(&mut self, errors: &[ValidationError]);

    /// Removes displayed errors.
    fn clear_errors(&mut self, errors: &[ValidationError]);

    /// Toggles the submitting indicator.
    fn set_submitting(&mut self, submitting: bool);

    /// Replaces the current notice.
    fn show_notice(&mut self, notice: &Notice);

    /// Removes the current notice.
    ///
    /// Called on the first change or submit attempt after a notice was shown.
    fn clear_notice(&mut self);

    /// Stops reporting events and releases every subscription of this pass.
    fn teardown(&mut self);
}

/// Paints field trees.
pub trait RenderTarget {
    type Handles: FieldHandleSet;

    /// Renders the tree of one step.
    fn render(&mut self, tree: &FieldTree, options: &RenderOptions) -> Result<Self::Handles, RenderError>;
}
