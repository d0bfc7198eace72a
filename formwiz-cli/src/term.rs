//! Line-oriented terminal rendering target.
//!
//! Each step is rendered as a sequence of prompts read from one shared
//! input. A prompter task asks every field once, requests a submit and then
//! waits for the engine to settle the attempt: fields with errors are asked
//! again, and after a failed submission the user confirms a retry. An
//! accepted submission ends the prompter without reading further input. End
//! of input ends the prompter too, which the engine sees as an abandoned
//! step.

use std::{
    collections::{BTreeMap, HashSet},
    future::Future,
    io::Write,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use colored::Colorize;
use formwiz::{
    data::{
        AddOnGroup, CaptureKey, CapturedValues, FieldNode, FieldTree, FieldType, FieldValue,
        GroupField,
        capture::{GROUP_KEY_SEPARATOR, group_key},
    },
    error::RenderError,
    render::{
        FieldEvent, FieldEvents, FieldHandle, FieldHandleSet, RenderOptions, RenderTarget,
        event_channel,
    },
    submit::Notice,
    validate::ValidationError,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader, Lines},
    sync::{Notify, mpsc},
    task::JoinHandle,
};

type Input = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Renders steps as terminal prompts.
pub struct TermRenderer {
    input: Arc<tokio::sync::Mutex<Input>>,
}

impl TermRenderer {
    pub fn stdin() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            input: Arc::new(tokio::sync::Mutex::new(BufReader::new(reader).lines())),
        }
    }
}

impl RenderTarget for TermRenderer {
    type Handles = TermHandles;

    fn render(&mut self, tree: &FieldTree, options: &RenderOptions) -> Result<TermHandles, RenderError> {
        if tree.is_empty() {
            return Err(RenderError(format!("step {} has no fields", tree.step)));
        }

        println!();
        println!(
            "{}",
            format!(
                "{} - step {} of {}",
                options.form_name, options.step, options.total_steps
            )
            .bold()
        );

        let mut values = CapturedValues::new();
        seed(&mut values, &tree.fields);

        Ok(TermHandles {
            state: Arc::new(Prompter {
                tree: tree.clone(),
                options: options.clone(),
                values: Mutex::new(values),
                errors: Mutex::new(BTreeMap::new()),
                accepted: Mutex::new(None),
                input: self.input.clone(),
                resume: Notify::new(),
            }),
            task: None,
        })
    }
}

/// The live prompts of one step.
pub struct TermHandles {
    state: Arc<Prompter>,
    task: Option<JoinHandle<()>>,
}

impl FieldHandleSet for TermHandles {
    fn handles(&self) -> Vec<FieldHandle> {
        self.state
            .tree
            .iter()
            .map(|n| FieldHandle {
                key: n.key.clone(),
                name: n.name.clone(),
                field_type: n.field_type,
            })
            .collect()
    }

    fn captured(&self) -> CapturedValues {
        lock(&self.state.values).clone()
    }

    fn subscribe(&mut self) -> FieldEvents {
        let (tx, rx) = event_channel();
        let state = self.state.clone();
        self.task = Some(tokio::spawn(async move {
            if state.run(tx).await.is_none() {
                debug!("Prompter for step {} stopped", state.options.step);
            }
        }));
        rx
    }

    fn show_errors(&mut self, errors: &[ValidationError]) {
        {
            let mut active = lock(&self.state.errors);
            for e in errors {
                println!("  {} {}: {}", "x".red(), e.field.name, e.message.red());
                active.insert(e.field.key.clone(), e.message.clone());
            }
        }
        self.state.resume.notify_one();
    }

    fn clear_errors(&mut self, errors: &[ValidationError]) {
        let mut active = lock(&self.state.errors);
        for e in errors {
            active.remove(&e.field.key);
        }
    }

    fn set_submitting(&mut self, submitting: bool) {
        if submitting {
            println!(
                "{}",
                format!("[{}] submitting...", self.state.options.loading_css_class).dimmed()
            );
        }
    }

    fn show_notice(&mut self, notice: &Notice) {
        if notice.ok {
            println!("{}", notice.text.green());
        } else {
            println!("{}", notice.text.yellow());
        }
        *lock(&self.state.accepted) = Some(notice.ok);
        self.state.resume.notify_one();
    }

    // Printed notices stay in the scrollback.
    fn clear_notice(&mut self) {}

    fn teardown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// State shared between the handles and the prompter task.
struct Prompter {
    tree: FieldTree,
    options: RenderOptions,
    values: Mutex<CapturedValues>,
    /// Displayed errors by capture key.
    errors: Mutex<BTreeMap<String, String>>,
    /// Outcome of the last settled submission.
    accepted: Mutex<Option<bool>>,
    input: Arc<tokio::sync::Mutex<Input>>,
    resume: Notify,
}

type Boxed<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

impl Prompter {
    /// Prompts until the input ends or the engine stops listening.
    async fn run(&self, tx: mpsc::Sender<FieldEvent>) -> Option<()> {
        let mut pending = self.tree.iter().collect::<Vec<_>>();
        loop {
            for node in pending {
                self.ask_field(node, &tx).await?;
            }
            println!("{}", format!("[{}]", self.options.button_text).cyan());
            tx.send(FieldEvent::SubmitRequested).await.ok()?;
            self.resume.notified().await;

            pending = self.fields_with_errors();
            if !pending.is_empty() {
                continue;
            }
            let accepted = lock(&self.accepted).take();
            if accepted == Some(true) {
                return Some(());
            }
            self.prompt(&format!("Press Enter to {}", self.options.button_text), None)
                .await?;
        }
    }

    fn fields_with_errors(&self) -> Vec<&FieldNode> {
        let names = lock(&self.errors)
            .keys()
            .filter_map(|k| CaptureKey::parse(k).ok().map(|k| k.base_name().to_string()))
            .collect::<HashSet<_>>();
        self.tree.iter().filter(|n| names.contains(&n.name)).collect()
    }

    async fn ask_field(&self, node: &FieldNode, tx: &mpsc::Sender<FieldEvent>) -> Option<()> {
        let error = lock(&self.errors).get(&node.key).cloned();
        if let Some(message) = error {
            println!("{}", message.red());
        }

        if !node.is_addon() {
            let current = lock(&self.values).get(&node.key).cloned();
            let value = self.ask_value(node, current, 0).await?;
            return self.set(tx, node.key.clone(), Some(value)).await;
        }

        let groups = self.ask_groups(node, 0).await?;
        let prefix = format!("{}{GROUP_KEY_SEPARATOR}", node.key);
        let stale = lock(&self.values)
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.to_string())
            .collect::<Vec<_>>();
        for key in stale {
            self.set(tx, key, None).await?;
        }
        for group in groups {
            for field in group.fields {
                let key = group_key(&node.key, &field.name, group.order);
                self.set(tx, key, Some(field.value)).await?;
            }
        }
        // Reported even without groups so that a count error clears.
        self.set(tx, node.key.clone(), None).await
    }

    /// Stores a value, or removes it for `None`, and reports the change.
    async fn set(
        &self,
        tx: &mpsc::Sender<FieldEvent>,
        key: String,
        value: Option<FieldValue>,
    ) -> Option<()> {
        let permit = tx.reserve().await.ok()?;
        {
            let mut values = lock(&self.values);
            match value {
                Some(value) => {
                    values.insert(key.clone(), value);
                }
                None => {
                    values.remove(&key);
                }
            }
        }
        permit.send(FieldEvent::Changed { key });
        Some(())
    }

    fn ask_groups<'a>(&'a self, node: &'a FieldNode, depth: usize) -> Boxed<'a, Option<Vec<AddOnGroup>>> {
        Box::pin(async move {
            let indent = "  ".repeat(depth);
            let label = self.label(node);
            let count = loop {
                let line = self
                    .prompt(&format!("{indent}How many {label} entries?"), Some("0"))
                    .await?;
                if line.is_empty() {
                    break 0;
                }
                match line.parse::<u32>() {
                    Ok(n) => break n,
                    Err(_) => println!("{indent}{}", "Please enter a number.".yellow()),
                }
            };

            let mut groups = Vec::new();
            for order in 0..count {
                println!("{indent}{} #{}", label, order + 1);
                let mut fields = Vec::new();
                for child in node.template() {
                    let value = self.ask_value(child, None, depth + 1).await?;
                    fields.push(GroupField {
                        name: child.name.clone(),
                        value,
                    });
                }
                groups.push(AddOnGroup { order, fields });
            }
            Some(groups)
        })
    }

    async fn ask_value(&self, node: &FieldNode, current: Option<FieldValue>, depth: usize) -> Option<FieldValue> {
        let indent = "  ".repeat(depth);
        let label = format!("{indent}{}", self.label(node));
        let default = current.as_ref().map(display_value);
        let keep = || current.clone().unwrap_or_else(|| node.empty_value());

        match node.field_type {
            FieldType::Addon => Some(FieldValue::Groups(self.ask_groups(node, depth).await?)),
            FieldType::Select | FieldType::Radio => {
                list_options(node, &indent);
                loop {
                    let line = self.prompt(&label, default.as_deref()).await?;
                    if line.is_empty() {
                        return Some(keep());
                    }
                    match pick(&node.options, &line) {
                        Some(option) => return Some(FieldValue::Text(option)),
                        None => println!("{indent}{}", "Unknown option.".yellow()),
                    }
                }
            }
            FieldType::Checkbox if node.is_multi_choice() => {
                list_options(node, &indent);
                loop {
                    let line = self
                        .prompt(&format!("{label} (comma separated)"), default.as_deref())
                        .await?;
                    if line.is_empty() {
                        return Some(keep());
                    }
                    let picked = line
                        .split(',')
                        .map(|s| pick(&node.options, s.trim()))
                        .collect::<Option<Vec<_>>>();
                    match picked {
                        Some(picked) => return Some(FieldValue::Many(picked)),
                        None => println!("{indent}{}", "Unknown option.".yellow()),
                    }
                }
            }
            FieldType::Checkbox => {
                let line = self.prompt(&format!("{label} [y/N]"), None).await?;
                let checked = matches!(line.to_lowercase().as_str(), "y" | "yes");
                let on = node.options.first().cloned().unwrap_or_else(|| "on".to_string());
                Some(FieldValue::Text(if checked { on } else { String::new() }))
            }
            FieldType::Text
            | FieldType::Email
            | FieldType::Password
            | FieldType::Number
            | FieldType::Textarea => {
                let hint = default.as_deref().or(node.placeholder.as_deref());
                let line = self.prompt(&label, hint).await?;
                if line.is_empty() {
                    Some(keep())
                } else {
                    Some(FieldValue::Text(line))
                }
            }
        }
    }

    fn label(&self, node: &FieldNode) -> String {
        let label = node.label.clone().unwrap_or_else(|| node.name.clone());
        if node.required && self.options.add_required_attribute {
            format!("{label} *")
        } else {
            label
        }
    }

    /// Prints a prompt and reads one trimmed line.
    async fn prompt(&self, text: &str, hint: Option<&str>) -> Option<String> {
        match hint {
            Some(hint) => print!("{text} {}: ", format!("[{hint}]").dimmed()),
            None => print!("{text}: "),
        }
        let _ = std::io::stdout().flush();

        let mut input = self.input.lock().await;
        let line = input.next_line().await.ok().flatten()?;
        Some(line.trim().to_string())
    }
}

/// Stores the initial values of `nodes` and of every group below them.
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

fn list_options(node: &FieldNode, indent: &str) {
    for (i, option) in node.options.iter().enumerate() {
        println!("{indent}  {}) {option}", i + 1);
    }
}

/// Resolves user input to an option, by 1-based number or by name.
fn pick(options: &[String], input: &str) -> Option<String> {
    if let Ok(n) = input.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| options.get(i)).cloned();
    }
    options.iter().find(|o| o.as_str() == input).cloned()
}

fn display_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Many(v) => v.join(","),
        FieldValue::Groups(g) => format!("{} group(s)", g.len()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use formwiz::{
        Wizard, WizardConfig, WizardOutcome,
        compile::compile_step,
        data::FieldSchema,
        error::TransportError,
        submit::{Transport, TransportResponse},
    };
    use serde_json::{Value, json};

    use super::*;

    struct Canned {
        schema: Value,
        posted: Arc<Mutex<Vec<Value>>>,
        /// Posts answered with 500 before posts are accepted.
        failures: Mutex<u32>,
    }

    impl Canned {
        fn new(schema: Value) -> Self {
            Self {
                schema,
                posted: Arc::new(Mutex::new(Vec::new())),
                failures: Mutex::new(0),
            }
        }

        fn failing(self, failures: u32) -> Self {
            *self.failures.lock().unwrap() = failures;
            self
        }
    }

    impl Transport for Canned {
        async fn get(&self, _url: &str, _timeout: Duration) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                status: 200,
                data: Some(self.schema.clone()),
            })
        }

        async fn post(
            &self,
            _url: &str,
            body: &Value,
            _timeout: Duration,
        ) -> Result<TransportResponse, TransportError> {
            self.posted.lock().unwrap().push(body.clone());
            let status = {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    500
                } else {
                    200
                }
            };
            Ok(TransportResponse { status, data: None })
        }
    }

    fn config() -> WizardConfig {
        WizardConfig {
            data_req_url: "schema.json".into(),
            submit_url_origin: "http://form.test/submit".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_pick_option() {
        let options = vec!["red".to_string(), "green".to_string()];
        assert_eq!(pick(&options, "2").as_deref(), Some("green"));
        assert_eq!(pick(&options, "red").as_deref(), Some("red"));
        assert_eq!(pick(&options, "0"), None);
        assert_eq!(pick(&options, "3"), None);
        assert_eq!(pick(&options, "blue"), None);
    }

    #[tokio::test]
    async fn test_reprompts_fields_with_errors() {
        let transport = Canned::new(json!([
            {"step": 1, "order": 1, "name": "name", "type": "text", "required": true},
            {"step": 1, "order": 2, "name": "size", "type": "radio", "options": ["s", "m"]},
            {"step": 2, "order": 1, "name": "contacts", "type": "addon", "minimumRequired": 1,
             "schema": [{"order": 1, "name": "phone", "type": "text"}]}
        ]));
        let posted = transport.posted.clone();
        // step 1: empty name, size 2, rejected, then the name again
        // step 2: two contacts
        let input: &'static [u8] = b"\n2\nAlice\n2\n555\n666\n";
        let renderer = TermRenderer::from_reader(input);

        let outcome = Wizard::new(config(), transport, renderer).run().await;
        let WizardOutcome::Finished { reports } = outcome else {
            panic!("wizard did not finish: {outcome:?}");
        };
        assert_eq!(reports[0].record.get("name"), Some(&FieldValue::from("Alice")));
        assert_eq!(reports[0].record.get("size"), Some(&FieldValue::from("m")));

        let posted = posted.lock().unwrap();
        assert_eq!(posted.len(), 2);
        assert_eq!(
            posted[1],
            json!([{"id": null, "name": "contacts", "value": [
                {"order": 0, "fields": [{"name": "phone", "value": "555"}]},
                {"order": 1, "fields": [{"name": "phone", "value": "666"}]}
            ]}])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_accepted_step_leaves_input_to_next_step() {
        let transport = Canned::new(json!([
            {"step": 1, "order": 1, "name": "first", "type": "text"},
            {"step": 2, "order": 1, "name": "second", "type": "text"}
        ]));
        let input: &'static [u8] = b"A\nB\n";
        let renderer = TermRenderer::from_reader(input);

        let config = WizardConfig {
            success_message: Some("Saved.".into()),
            ..config()
        };
        let outcome = Wizard::new(config, transport, renderer).run().await;
        let WizardOutcome::Finished { reports } = outcome else {
            panic!("wizard did not finish: {outcome:?}");
        };
        assert_eq!(reports[0].record.get("first"), Some(&FieldValue::from("A")));
        assert_eq!(reports[1].record.get("second"), Some(&FieldValue::from("B")));
    }

    #[tokio::test]
    async fn test_failed_submission_asks_for_retry() {
        let transport = Canned::new(json!([
            {"step": 1, "order": 1, "name": "name", "type": "text"}
        ]))
        .failing(1);
        let posted = transport.posted.clone();
        // the name, then Enter to retry
        let input: &'static [u8] = b"A\n\n";
        let renderer = TermRenderer::from_reader(input);

        let outcome = Wizard::new(config(), transport, renderer).run().await;
        assert!(outcome.is_finished(), "{outcome:?}");
        assert_eq!(posted.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_seeds_nested_initial_values() {
        let schema = vec![
            FieldSchema::new(1, 1, "people", FieldType::Addon)
                .with_sub_schema(vec![
                    FieldSchema::sub_field(1, "phones", FieldType::Addon)
                        .with_sub_schema(vec![FieldSchema::sub_field(1, "number", FieldType::Text)]),
                ])
                .with_value(json!([
                    {"order": 0, "fields": [{"name": "phones", "value": [
                        {"order": 2, "fields": [{"name": "number", "value": "555"}]}
                    ]}]}
                ])),
        ];
        let tree = compile_step(&schema, 1).unwrap();

        let mut values = CapturedValues::new();
        seed(&mut values, &tree.fields);
        assert_eq!(
            values.get("people__phones__0__number__2"),
            Some(&FieldValue::from("555"))
        );
    }

    #[tokio::test]
    async fn test_end_of_input_abandons_step() {
        let transport = Canned::new(json!([
            {"step": 1, "order": 1, "name": "name", "type": "text", "required": true}
        ]));
        let input: &'static [u8] = b"\n";
        let renderer = TermRenderer::from_reader(input);

        let outcome = Wizard::new(config(), transport, renderer).run().await;
        assert!(matches!(
            outcome,
            WizardOutcome::Failed {
                error: formwiz::WizardError::Aborted { step: 1 },
                ..
            }
        ));
    }
}
