//! Headless terminal front end for the setup wizard.
//!
//! Layout:
//! - Centered window titled "Initial Setup"
//! - Left panel listing the three steps and their status
//! - Main panel with the active step's form
//! - Bottom button row; triggers appear only once the wizard reveals them
//!
//! Everything shown here is driven by controller effects. Requests run on the shared tokio runtime
//! and their replies come back over a channel that the render loop drains each tick.
//!
//! Note: Logging is file-only in TUI mode (stdout logging is disabled) to avoid corrupting the terminal UI.

use crate::api::client::{ApiError, SetupBackend};
use crate::models::responses::InitialResponse;
use crate::wizard::controller::{Outcome, PendingRequest, WizardController};
use crate::wizard::form::{collect, FormId, FormSource, FormValues};
use crate::wizard::requests::RequestKind;
use crate::wizard::state::{
    transition, ConnectionOutcome, Control, Effect, FormStatus, StepStatus, WizardEvent,
    WizardState, WizardStep,
};
use crate::wizard::WizardError;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use log::{info, warn};
use ratatui::backend::{CrosstermBackend, TestBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use std::collections::{HashMap, HashSet};
use std::io::{self, Stdout};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

const SOURCE_FIELDS: &[(&str, &str)] = &[
    ("system_name", "System name"),
    ("site_id", "Site ID"),
    ("host", "Host"),
    ("username", "Username"),
    ("password", "Password"),
    ("logmech", "Logon mechanism"),
    ("environment", "Environment"),
];

const TARGET_FIELDS: &[(&str, &str)] = &[
    ("system_name", "System name"),
    ("host", "Host"),
    ("username", "Username"),
    ("password", "Password"),
    ("logmech", "Logon mechanism"),
    ("db_coa", "COA database"),
    ("db_region", "Region database"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonFocus {
    AddSource,
    TestConnection,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusTarget {
    Field(usize),
    Button(ButtonFocus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modal {
    ConfirmQuit,
}

#[derive(Debug)]
enum UiMsg {
    Reply {
        pending: PendingRequest,
        reply: Result<InitialResponse, ApiError>,
    },
}

// =========================
// Text input
// =========================

/// Single-line editable text. `cursor` counts characters, not bytes.
#[derive(Debug, Clone)]
struct TextInput {
    value: String,
    cursor: usize,
    masked: bool,
}

impl TextInput {
    fn new(value: impl Into<String>, masked: bool) -> Self {
        let v = value.into();
        Self {
            cursor: v.chars().count(),
            value: v,
            masked,
        }
    }

    fn display(&self) -> String {
        if self.masked {
            "*".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }

    fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.chars().count();
    }

    fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_index(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => {
                let idx = self.byte_index();
                self.value.insert(idx, c);
                self.cursor += 1;
                true
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let idx = self.byte_index();
                    self.value.remove(idx);
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor < self.char_len() {
                    let idx = self.byte_index();
                    self.value.remove(idx);
                }
                true
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                true
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.char_len());
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.char_len();
                true
            }
            _ => false,
        }
    }
}

// =========================
// Forms
// =========================

#[derive(Debug, Clone)]
struct FormField {
    name: &'static str,
    label: &'static str,
    input: TextInput,
}

#[derive(Debug, Clone)]
struct SystemForm {
    fields: Vec<FormField>,
}

impl SystemForm {
    fn with_fields(fields: &[(&'static str, &'static str)]) -> Self {
        let fields = fields
            .iter()
            .map(|&(name, label)| FormField {
                name,
                label,
                input: TextInput::new("", name == "password"),
            })
            .collect();
        Self { fields }
    }

    fn folder() -> Self {
        Self::with_fields(&[("path", "Working folder")])
    }

    fn source() -> Self {
        Self::with_fields(SOURCE_FIELDS)
    }

    fn target() -> Self {
        Self::with_fields(TARGET_FIELDS)
    }

    fn value(&self, name: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.input.value.as_str())
            .unwrap_or("")
    }

    /// Fill fields named in `values`; names this form does not have are ignored.
    fn prefill(&mut self, values: &FormValues) {
        for field in self.fields.iter_mut() {
            if let Some(v) = values.get(field.name) {
                field.input.set(v);
            }
        }
    }
}

impl FormSource for SystemForm {
    fn field_values(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| (f.name.to_string(), f.input.value.clone()))
            .collect()
    }
}

// =========================
// View model
// =========================

/// What the terminal shows. Mutated only by `apply(effect)` and by typing into fields.
#[derive(Debug)]
struct WizardView {
    page: WizardStep,
    steps: HashMap<WizardStep, StepStatus>,
    folder: SystemForm,
    sources: Vec<SystemForm>,
    active_source: usize,
    target: SystemForm,
    revealed: HashSet<Control>,
    loading: HashSet<Control>,
    status: HashMap<FormId, FormStatus>,
    errors: HashMap<FormId, String>,
    notes: HashMap<FormId, String>,
    banner: Option<String>,
    message: Option<String>,
    focus: FocusTarget,
}

impl WizardView {
    fn new() -> Self {
        let steps = WizardStep::ALL
            .iter()
            .map(|s| {
                let status = if *s == WizardStep::FolderSetup {
                    StepStatus::Active
                } else {
                    StepStatus::Pending
                };
                (*s, status)
            })
            .collect();
        Self {
            page: WizardStep::FolderSetup,
            steps,
            folder: SystemForm::folder(),
            sources: vec![SystemForm::source()],
            active_source: 0,
            target: SystemForm::target(),
            revealed: HashSet::new(),
            loading: HashSet::new(),
            status: HashMap::new(),
            errors: HashMap::new(),
            notes: HashMap::new(),
            banner: None,
            message: None,
            focus: FocusTarget::Field(0),
        }
    }

    fn apply_all(&mut self, effects: &[Effect]) {
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::SetLoading { control, loading } => {
                if *loading {
                    self.loading.insert(*control);
                } else {
                    self.loading.remove(control);
                }
            }
            Effect::RevealTrigger(control) => {
                self.revealed.insert(*control);
            }
            Effect::ClearFormStatus(form) => {
                self.status.remove(form);
                self.errors.remove(form);
                self.notes.remove(form);
            }
            Effect::SetFormStatus { form, status } => {
                self.status.insert(*form, *status);
            }
            Effect::ShowErrorMessage { form, message } => {
                self.errors.insert(*form, message.clone());
            }
            Effect::AppendSuccessNote { form, note } => {
                self.notes.entry(*form).or_default().push_str(note);
            }
            Effect::CompleteStep(step) => {
                self.steps.insert(*step, StepStatus::Completed);
            }
            Effect::ActivateStep(step) => {
                self.steps.insert(*step, StepStatus::Active);
                self.page = *step;
                self.focus = FocusTarget::Field(0);
            }
            Effect::SlideTransition { from, to } => {
                self.banner = Some(format!(
                    "Step {} complete. Continue with step {}: {}.",
                    from.number(),
                    to.number(),
                    to.title()
                ));
            }
            Effect::PrefillForm { form, values } => {
                if let FormId::Source(i) = form {
                    while self.sources.len() <= *i {
                        self.sources.push(SystemForm::source());
                    }
                }
                if let Some(f) = self.form_mut(*form) {
                    f.prefill(values);
                }
            }
        }
    }

    fn form(&self, id: FormId) -> Option<&SystemForm> {
        match id {
            FormId::Folder => Some(&self.folder),
            FormId::Source(i) => self.sources.get(i),
            FormId::Target => Some(&self.target),
        }
    }

    fn form_mut(&mut self, id: FormId) -> Option<&mut SystemForm> {
        match id {
            FormId::Folder => Some(&mut self.folder),
            FormId::Source(i) => self.sources.get_mut(i),
            FormId::Target => Some(&mut self.target),
        }
    }

    fn current_form_id(&self) -> FormId {
        match self.page {
            WizardStep::FolderSetup => FormId::Folder,
            WizardStep::SourceConfig => FormId::Source(self.active_source),
            WizardStep::TargetConfig => FormId::Target,
        }
    }

    fn buttons(&self) -> Vec<ButtonFocus> {
        match self.page {
            WizardStep::FolderSetup => {
                if self.revealed.contains(&Control::FolderNext) {
                    vec![ButtonFocus::Next]
                } else {
                    vec![]
                }
            }
            WizardStep::SourceConfig => {
                let mut b = vec![ButtonFocus::AddSource, ButtonFocus::TestConnection];
                if self.revealed.contains(&Control::SourceNext) {
                    b.push(ButtonFocus::Next);
                }
                b
            }
            WizardStep::TargetConfig => vec![ButtonFocus::TestConnection],
        }
    }

    fn focus_order(&self) -> Vec<FocusTarget> {
        let field_count = self
            .form(self.current_form_id())
            .map(|f| f.fields.len())
            .unwrap_or(0);
        (0..field_count)
            .map(FocusTarget::Field)
            .chain(self.buttons().into_iter().map(FocusTarget::Button))
            .collect()
    }

    fn button_label(&self, b: ButtonFocus) -> &'static str {
        match b {
            ButtonFocus::AddSource => "Add Source",
            ButtonFocus::TestConnection => {
                if self
                    .loading
                    .contains(&Control::TestConnection(self.current_form_id()))
                {
                    "Testing..."
                } else {
                    "Test Connection"
                }
            }
            ButtonFocus::Next => {
                if self.page == WizardStep::FolderSetup && self.loading.contains(&Control::FolderNext)
                {
                    "Saving..."
                } else {
                    "Next"
                }
            }
        }
    }

    fn button_enabled(&self, b: ButtonFocus) -> bool {
        match b {
            ButtonFocus::AddSource => true,
            ButtonFocus::TestConnection => !self
                .loading
                .contains(&Control::TestConnection(self.current_form_id())),
            ButtonFocus::Next => !self.loading.contains(&Control::FolderNext),
        }
    }
}

// =========================
// App: controller + view
// =========================

/// Sends requests on the shared runtime and posts replies back to the render loop.
struct Dispatcher {
    tx: mpsc::Sender<UiMsg>,
    runtime: Handle,
}

impl Dispatcher {
    fn spawn(&self, backend: Arc<dyn SetupBackend>, pending: PendingRequest) {
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let reply = backend.send(&pending.request).await;
            // Receiver is gone only after the UI has exited.
            let _ = tx.send(UiMsg::Reply { pending, reply });
        });
    }
}

struct App {
    controller: WizardController,
    view: WizardView,
    modal: Option<Modal>,
    quit: bool,
}

impl App {
    fn new(controller: WizardController) -> Self {
        let mut view = WizardView::new();
        view.apply_all(&controller.startup_effects());
        Self {
            controller,
            view,
            modal: None,
            quit: false,
        }
    }

    fn report(&mut self, e: WizardError) {
        warn!("[PHASE: tui] [STEP: action] {}", e);
        self.view.message = Some(e.to_string());
    }

    fn handle_outcome(&mut self, outcome: Outcome, dispatcher: &Dispatcher) {
        self.view.apply_all(&outcome.effects);
        if let Some(pending) = outcome.follow_up {
            dispatcher.spawn(self.controller.backend(), pending);
        }
    }

    fn handle_msg(&mut self, msg: UiMsg, dispatcher: &Dispatcher) {
        match msg {
            UiMsg::Reply { pending, reply } => match self.controller.complete(pending, reply) {
                Ok(outcome) => self.handle_outcome(outcome, dispatcher),
                Err(e) => self.report(e),
            },
        }
    }

    fn drain_messages(&mut self, rx: &mpsc::Receiver<UiMsg>, dispatcher: &Dispatcher) {
        while let Ok(msg) = rx.try_recv() {
            self.handle_msg(msg, dispatcher);
        }
    }

    /// The folder path field counts as blurred whenever focus leaves it.
    fn blur_current(&mut self) {
        if self.view.page != WizardStep::FolderSetup || self.view.focus != FocusTarget::Field(0) {
            return;
        }
        let raw = self.view.folder.value("path").to_string();
        match self.controller.folder_path_blurred(&raw) {
            Ok(effects) => self.view.apply_all(&effects),
            Err(e) => self.report(e),
        }
    }

    fn move_focus(&mut self, forward: bool) {
        self.blur_current();
        let order = self.view.focus_order();
        if order.is_empty() {
            return;
        }
        let idx = order
            .iter()
            .position(|f| *f == self.view.focus)
            .unwrap_or(0);
        let next = if forward {
            (idx + 1) % order.len()
        } else {
            (idx + order.len() - 1) % order.len()
        };
        self.view.focus = order[next];
    }

    fn press_button(&mut self, button: ButtonFocus, dispatcher: &Dispatcher) {
        if !self.view.button_enabled(button) {
            return;
        }
        self.view.message = None;
        match (self.view.page, button) {
            (WizardStep::FolderSetup, ButtonFocus::Next) => {
                let raw = self.view.folder.value("path").to_string();
                match self.controller.begin_folder_setup(&raw) {
                    Ok(outcome) => self.handle_outcome(outcome, dispatcher),
                    Err(e) => self.report(e),
                }
            }
            (WizardStep::SourceConfig, ButtonFocus::Next) => {
                match self.controller.advance_to_target() {
                    Ok(effects) => self.view.apply_all(&effects),
                    Err(e) => self.report(e),
                }
            }
            (_, ButtonFocus::TestConnection) => {
                let form = self.view.current_form_id();
                let Some(values) = self.view.form(form).map(collect) else {
                    return;
                };
                match self.controller.begin_connection_test(form, &values) {
                    Ok(outcome) => self.handle_outcome(outcome, dispatcher),
                    Err(e) => self.report(e),
                }
            }
            (WizardStep::SourceConfig, ButtonFocus::AddSource) => {
                self.view.sources.push(SystemForm::source());
                self.view.active_source = self.view.sources.len() - 1;
                self.view.focus = FocusTarget::Field(0);
                info!(
                    "[PHASE: tui] [STEP: add_source] Added source system form #{}",
                    self.view.sources.len()
                );
            }
            _ => {}
        }
    }

    /// Cancel the current page's in-flight folder setup or connection tests. Saves are left alone.
    fn cancel_in_flight(&mut self) -> bool {
        let kinds: Vec<RequestKind> = match self.view.page {
            WizardStep::FolderSetup => vec![RequestKind::FsSetup],
            WizardStep::SourceConfig => (0..self.view.sources.len())
                .map(|i| RequestKind::TestConnection(FormId::Source(i)))
                .collect(),
            WizardStep::TargetConfig => vec![RequestKind::TestConnection(FormId::Target)],
        };

        let mut cancelled = false;
        for kind in kinds {
            if self.controller.session().requests().is_in_flight(kind) {
                let effects = self.controller.cancel(kind);
                self.view.apply_all(&effects);
                cancelled = true;
            }
        }
        cancelled
    }

    fn switch_source(&mut self, forward: bool) {
        let n = self.view.sources.len();
        if self.view.page != WizardStep::SourceConfig || n < 2 {
            return;
        }
        self.view.active_source = if forward {
            (self.view.active_source + 1) % n
        } else {
            (self.view.active_source + n - 1) % n
        };
        self.view.focus = FocusTarget::Field(0);
    }

    fn handle_key(&mut self, code: KeyCode, dispatcher: &Dispatcher) {
        if let Some(Modal::ConfirmQuit) = self.modal {
            match code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    info!("[PHASE: tui] [STEP: exit] User quit the wizard");
                    self.quit = true;
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.modal = None,
                _ => {}
            }
            return;
        }

        match code {
            KeyCode::Tab | KeyCode::Down => self.move_focus(true),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(false),
            KeyCode::PageDown => self.switch_source(true),
            KeyCode::PageUp => self.switch_source(false),
            KeyCode::Esc => {
                if !self.cancel_in_flight() {
                    self.modal = Some(Modal::ConfirmQuit);
                }
            }
            KeyCode::Enter => match self.view.focus {
                FocusTarget::Field(_) => self.move_focus(true),
                FocusTarget::Button(b) => self.press_button(b, dispatcher),
            },
            other => {
                if let FocusTarget::Field(i) = self.view.focus {
                    let id = self.view.current_form_id();
                    let edited = self
                        .view
                        .form_mut(id)
                        .and_then(|f| f.fields.get_mut(i))
                        .map(|field| field.input.handle_key(other))
                        .unwrap_or(false);
                    if edited {
                        self.view.message = None;
                    }
                }
            }
        }
    }
}

// =========================
// Entry points
// =========================

pub fn run(controller: WizardController, runtime: Handle) -> Result<()> {
    info!("[PHASE: tui] [STEP: start] Starting TUI wizard");

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, controller, runtime);
    restore_terminal(&mut terminal)?;

    result
}

/// Non-interactive smoke mode: render a single frame and exit.
/// Target pages: folder|source|target
pub fn smoke(target: &str) -> Result<()> {
    info!(
        "[PHASE: tui] [STEP: smoke] Rendering single-frame TUI smoke target={}",
        target
    );

    let t = target.trim().to_ascii_lowercase();
    let view = new_smoke_view(t.as_str())?;

    // In-memory backend: no raw mode or alternate screen.
    let backend = TestBackend::new(100, 30);
    let mut terminal = Terminal::new(backend)?;
    terminal.draw(|f| draw(f.size(), f, &view, None))?;

    Ok(())
}

/// Smoke-only: walk the state machine to `target` with sample values, no server involved.
fn new_smoke_view(target: &str) -> Result<WizardView> {
    let to_source = vec![
        WizardEvent::FolderPathBlurred { has_path: true },
        WizardEvent::FolderSubmitted,
        WizardEvent::FolderSaved,
    ];
    let events = match target {
        "folder" => vec![WizardEvent::FolderPathBlurred { has_path: true }],
        "source" => to_source,
        "target" => {
            let form = FormId::Source(0);
            let mut events = to_source;
            events.extend([
                WizardEvent::ConnectionTestStarted { form },
                WizardEvent::ConnectionTestFinished {
                    form,
                    outcome: ConnectionOutcome::Connected,
                },
                WizardEvent::SourceSaveSucceeded { form },
                WizardEvent::AdvanceToTarget,
            ]);
            events
        }
        other => anyhow::bail!(
            "unknown smoke page '{}' (expected folder|source|target)",
            other
        ),
    };

    let mut view = WizardView::new();
    view.folder
        .prefill(&[("path", "/srv/initial-setup")].into_iter().collect());
    view.sources[0].prefill(
        &[
            ("system_name", "SAMPLE_SOURCE"),
            ("host", "source.example.invalid"),
            ("username", "sample_user"),
            ("password", "sample_password"),
            ("logmech", "ldap"),
        ]
        .into_iter()
        .collect(),
    );

    let mut state = WizardState::default();
    for event in &events {
        let t = transition(&state, event)?;
        view.apply_all(&t.effects);
        state = t.state;
    }
    Ok(view)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    controller: WizardController,
    runtime: Handle,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let (tx, rx) = mpsc::channel::<UiMsg>();
    let dispatcher = Dispatcher { tx, runtime };
    let mut app = App::new(controller);

    while !app.quit {
        app.drain_messages(&rx, &dispatcher);
        terminal.draw(|f| draw(f.size(), f, &app.view, app.modal.as_ref()))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, &dispatcher);
            }
        }
    }

    Ok(())
}

// =========================
// Rendering
// =========================

fn draw(area: Rect, f: &mut ratatui::Frame<'_>, view: &WizardView, modal: Option<&Modal>) {
    let window_area = centered_window(area, 100, 30);

    let outer_block = Block::default().borders(Borders::ALL).title("Initial Setup");
    f.render_widget(outer_block, window_area);

    let inner = window_area.inner(&ratatui::layout::Margin {
        vertical: 1,
        horizontal: 1,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(inner);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(28), Constraint::Min(0)].as_ref())
        .split(rows[0]);

    draw_steps(f, cols[0], view);
    draw_page(f, cols[1], view);
    draw_buttons(f, rows[1], view);

    if let Some(Modal::ConfirmQuit) = modal {
        draw_quit_modal(f, window_area);
    }
}

fn centered_window(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width.saturating_sub(2)).max(60);
    let h = height.min(area.height.saturating_sub(2)).max(20);
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect {
        x,
        y,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn draw_steps(f: &mut ratatui::Frame<'_>, area: Rect, view: &WizardView) {
    let mut lines = Vec::new();
    for step in WizardStep::ALL {
        let status = view
            .steps
            .get(&step)
            .copied()
            .unwrap_or(StepStatus::Pending);
        let (marker, style) = match status {
            StepStatus::Completed => ("[x]", Style::default().fg(Color::Green)),
            StepStatus::Active => ("[>]", Style::default().add_modifier(Modifier::BOLD)),
            StepStatus::Pending => ("[ ]", Style::default().fg(Color::DarkGray)),
        };
        lines.push(Line::from(Span::styled(
            format!("{} {}. {}", marker, step.number(), step.title()),
            style,
        )));
    }
    if let Some(banner) = view.banner.as_ref() {
        lines.push(Line::from(""));
        lines.push(Line::from(banner.clone()));
    }

    let p = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Steps"))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

fn draw_page(f: &mut ratatui::Frame<'_>, area: Rect, view: &WizardView) {
    let form_id = view.current_form_id();
    let mut lines = Vec::new();

    match view.page {
        WizardStep::FolderSetup => {
            lines.push(Line::from(
                "Choose the working folder for configuration and output files.",
            ));
        }
        WizardStep::SourceConfig => {
            lines.push(Line::from(format!(
                "Source system {} of {}",
                view.active_source + 1,
                view.sources.len()
            )));
            if let Some(names) = saved_source_names(view) {
                lines.push(Line::from(names));
            }
        }
        WizardStep::TargetConfig => {
            lines.push(Line::from("Connection details for the target system."));
        }
    }
    lines.push(Line::from(""));

    if let Some(form) = view.form(form_id) {
        for (i, field) in form.fields.iter().enumerate() {
            let focused = view.focus == FocusTarget::Field(i);
            let mut value = field.input.display();
            if focused {
                value.push('_');
            }
            let style = if focused {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            lines.push(Line::from(vec![
                Span::raw(format!("{:<18}", field.label)),
                Span::styled(value, style),
            ]));
        }
    }

    lines.push(Line::from(""));
    if view.loading.contains(&Control::TestConnection(form_id)) {
        lines.push(Line::from("Testing connection..."));
    }
    match view.status.get(&form_id) {
        Some(FormStatus::Success) => {
            let note = view.notes.get(&form_id).cloned().unwrap_or_default();
            lines.push(Line::from(Span::styled(
                format!("Connection successful.{}", note),
                Style::default().fg(Color::Green),
            )));
        }
        Some(FormStatus::Error) => {
            let msg = view.errors.get(&form_id).cloned().unwrap_or_default();
            lines.push(Line::from(Span::styled(
                format!("Connection failed: {}", msg),
                Style::default().fg(Color::Red),
            )));
            if let Some(note) = view.notes.get(&form_id) {
                lines.push(Line::from(note.trim().to_string()));
            }
        }
        None => {}
    }
    if let Some(msg) = view.message.as_ref() {
        lines.push(Line::from(Span::styled(
            msg.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }

    lines.push(Line::from(""));
    let mut help = String::from("Tab/Shift+Tab move. Enter selects. Esc cancels a request or quits.");
    if view.page == WizardStep::SourceConfig {
        help.push_str(" PgUp/PgDn switch source.");
    }
    lines.push(Line::from(Span::styled(
        help,
        Style::default().fg(Color::DarkGray),
    )));

    let p = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(view.page.title()),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

/// Source systems that have a status on screen, for the page header.
fn saved_source_names(view: &WizardView) -> Option<String> {
    let names: Vec<&str> = view
        .sources
        .iter()
        .enumerate()
        .filter(|(i, _)| view.notes.contains_key(&FormId::Source(*i)))
        .map(|(_, f)| f.value("system_name"))
        .filter(|n| !n.trim().is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(format!("Saved: {}", names.join(", ")))
    }
}

fn draw_buttons(f: &mut ratatui::Frame<'_>, area: Rect, view: &WizardView) {
    let mut spans = Vec::new();
    for b in view.buttons() {
        if !spans.is_empty() {
            spans.push(Span::raw(" "));
        }
        spans.push(button_text(
            view.button_label(b),
            view.focus == FocusTarget::Button(b),
            view.button_enabled(b),
        ));
    }

    let p = Paragraph::new(Text::from(Line::from(spans))).alignment(Alignment::Right);
    f.render_widget(p, area);
}

fn button_text(label: &str, focused: bool, enabled: bool) -> Span<'static> {
    let mut style = Style::default();
    if !enabled {
        style = style.fg(Color::DarkGray);
    }
    if focused && enabled {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(format!("[ {} ]", label), style)
}

fn draw_quit_modal(f: &mut ratatui::Frame<'_>, window_area: Rect) {
    let modal_w = 52u16.min(window_area.width.saturating_sub(4)).max(40);
    let modal_h = 6u16;
    let x = window_area.x + (window_area.width.saturating_sub(modal_w)) / 2;
    let y = window_area.y + (window_area.height.saturating_sub(modal_h)) / 2;
    let area = Rect {
        x,
        y,
        width: modal_w,
        height: modal_h,
    };

    let body = Paragraph::new(Text::from(vec![
        Line::from("Quit setup? Saved settings are kept on the server."),
        Line::from(""),
        Line::from("[ y ] Quit    [ n ] Stay"),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Quit Setup?"))
    .wrap(Wrap { trim: false });
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(body, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::requests::InitialRequest;
    use crate::models::responses::TestConnectionResponse;
    use crate::models::state::{DevSeed, SetupSession};
    use crate::wizard::state::SAVED_NOTE;
    use async_trait::async_trait;

    /// Accepts everything: 2xx for FS_SETUP / saves, `conn_status: true` for tests.
    struct AcceptingBackend;

    #[async_trait]
    impl SetupBackend for AcceptingBackend {
        async fn send(&self, request: &InitialRequest) -> Result<InitialResponse, ApiError> {
            Ok(match request {
                InitialRequest::TestConnection { .. } => {
                    InitialResponse::ConnectionTest(TestConnectionResponse {
                        conn_status: true,
                        error_msg: None,
                    })
                }
                _ => InitialResponse::Ack,
            })
        }
    }

    struct Harness {
        _rt: tokio::runtime::Runtime,
        rx: mpsc::Receiver<UiMsg>,
        dispatcher: Dispatcher,
    }

    impl Harness {
        fn new() -> Self {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .expect("runtime");
            let (tx, rx) = mpsc::channel();
            let dispatcher = Dispatcher {
                tx,
                runtime: rt.handle().clone(),
            };
            Self {
                _rt: rt,
                rx,
                dispatcher,
            }
        }

        /// Wait for one reply and hand it to the app.
        fn pump(&self, app: &mut App) {
            let msg = self
                .rx
                .recv_timeout(Duration::from_secs(5))
                .expect("reply within timeout");
            app.handle_msg(msg, &self.dispatcher);
        }
    }

    fn app_with(seed: Option<DevSeed>) -> App {
        let controller =
            WizardController::new(Arc::new(AcceptingBackend), SetupSession::new(seed));
        App::new(controller)
    }

    fn type_text(app: &mut App, text: &str, d: &Dispatcher) {
        for c in text.chars() {
            app.handle_key(KeyCode::Char(c), d);
        }
    }

    // -------------------------------------------------------------------------
    // A) Text input
    // -------------------------------------------------------------------------

    #[test]
    fn text_input_edits_multibyte_values() {
        let mut input = TextInput::new("", false);
        for c in "pä€h".chars() {
            input.handle_key(KeyCode::Char(c));
        }
        assert_eq!(input.value, "pä€h");

        input.handle_key(KeyCode::Left);
        input.handle_key(KeyCode::Backspace);
        assert_eq!(input.value, "päh", "Backspace removes the char before the cursor");

        input.handle_key(KeyCode::Home);
        input.handle_key(KeyCode::Delete);
        assert_eq!(input.value, "äh");
    }

    #[test]
    fn masked_input_hides_value() {
        let input = TextInput::new("secret", true);
        assert_eq!(input.display(), "******");
    }

    // -------------------------------------------------------------------------
    // B) Effects -> view
    // -------------------------------------------------------------------------

    #[test]
    fn view_applies_status_and_note_effects() {
        let mut view = WizardView::new();
        let form = FormId::Source(0);
        view.apply_all(&[
            Effect::SetLoading {
                control: Control::TestConnection(form),
                loading: true,
            },
            Effect::SetFormStatus {
                form,
                status: FormStatus::Success,
            },
            Effect::SetLoading {
                control: Control::TestConnection(form),
                loading: false,
            },
            Effect::RevealTrigger(Control::SourceNext),
            Effect::AppendSuccessNote {
                form,
                note: SAVED_NOTE.to_string(),
            },
            Effect::AppendSuccessNote {
                form,
                note: SAVED_NOTE.to_string(),
            },
        ]);

        assert!(view.loading.is_empty());
        assert!(view.revealed.contains(&Control::SourceNext));
        assert_eq!(view.status.get(&form), Some(&FormStatus::Success));
        assert_eq!(
            view.notes.get(&form).map(String::as_str),
            Some(" System configuration saved. System configuration saved."),
            "notes accumulate like appended text"
        );

        view.apply(&Effect::ClearFormStatus(form));
        assert!(view.status.get(&form).is_none());
        assert!(view.notes.get(&form).is_none());
    }

    #[test]
    fn activate_step_switches_page() {
        let mut view = WizardView::new();
        view.apply_all(&[
            Effect::CompleteStep(WizardStep::FolderSetup),
            Effect::ActivateStep(WizardStep::SourceConfig),
            Effect::SlideTransition {
                from: WizardStep::FolderSetup,
                to: WizardStep::SourceConfig,
            },
        ]);
        assert_eq!(view.page, WizardStep::SourceConfig);
        assert_eq!(view.steps[&WizardStep::FolderSetup], StepStatus::Completed);
        assert_eq!(view.steps[&WizardStep::SourceConfig], StepStatus::Active);
        assert!(view.banner.is_some());
    }

    #[test]
    fn prefill_fills_known_fields_and_grows_source_list() {
        let mut view = WizardView::new();
        let values: FormValues = [("system_name", "DB2"), ("unknown", "x")]
            .into_iter()
            .collect();
        view.apply(&Effect::PrefillForm {
            form: FormId::Source(1),
            values,
        });
        assert_eq!(view.sources.len(), 2);
        assert_eq!(view.sources[1].value("system_name"), "DB2");
        assert!(view.sources[1].fields.iter().all(|f| f.name != "unknown"));
    }

    #[test]
    fn system_form_collects_every_field() {
        let mut form = SystemForm::source();
        form.prefill(&[("system_name", "Foo"), ("logmech", "regular")].into_iter().collect());
        let values = collect(&form);
        assert_eq!(values.len(), SOURCE_FIELDS.len(), "empty fields are collected too");
        assert_eq!(values.get("system_name"), Some("Foo"));
        assert_eq!(values.get("host"), Some(""));
    }

    // -------------------------------------------------------------------------
    // C) Key handling against the controller
    // -------------------------------------------------------------------------

    #[test]
    fn blank_folder_path_does_not_reveal_next() {
        let h = Harness::new();
        let mut app = app_with(None);
        type_text(&mut app, "   ", &h.dispatcher);
        app.handle_key(KeyCode::Tab, &h.dispatcher);

        assert!(!app.view.revealed.contains(&Control::FolderNext));
        assert!(app.view.buttons().is_empty());
    }

    #[test]
    fn folder_then_source_flow() {
        let h = Harness::new();
        let mut app = app_with(None);

        type_text(&mut app, "/srv/setup", &h.dispatcher);
        app.handle_key(KeyCode::Enter, &h.dispatcher);
        assert!(app.view.revealed.contains(&Control::FolderNext));
        assert_eq!(app.view.focus, FocusTarget::Button(ButtonFocus::Next));

        app.handle_key(KeyCode::Enter, &h.dispatcher);
        assert!(app.view.loading.contains(&Control::FolderNext));
        h.pump(&mut app);
        assert_eq!(app.view.page, WizardStep::SourceConfig);
        assert_eq!(app.controller.session().folder_path(), Some("/srv/setup"));

        type_text(&mut app, "DB1", &h.dispatcher);
        app.view.focus = FocusTarget::Button(ButtonFocus::TestConnection);
        app.handle_key(KeyCode::Enter, &h.dispatcher);
        h.pump(&mut app); // connection test
        h.pump(&mut app); // save

        let form = FormId::Source(0);
        assert_eq!(app.view.status.get(&form), Some(&FormStatus::Success));
        assert_eq!(app.view.notes.get(&form).map(String::as_str), Some(SAVED_NOTE));
        assert!(app.view.revealed.contains(&Control::SourceNext));
        assert!(app.controller.session().source_systems().contains("DB1"));

        app.view.focus = FocusTarget::Button(ButtonFocus::Next);
        app.handle_key(KeyCode::Enter, &h.dispatcher);
        assert_eq!(app.view.page, WizardStep::TargetConfig);
    }

    #[test]
    fn escape_cancels_pending_folder_setup() {
        let h = Harness::new();
        let mut app = app_with(None);
        type_text(&mut app, "/srv/setup", &h.dispatcher);
        app.handle_key(KeyCode::Enter, &h.dispatcher);
        app.handle_key(KeyCode::Enter, &h.dispatcher);

        app.handle_key(KeyCode::Esc, &h.dispatcher);
        assert!(app.modal.is_none(), "Esc cancels the request before offering quit");
        assert!(!app.view.loading.contains(&Control::FolderNext));

        h.pump(&mut app);
        assert_eq!(
            app.view.page,
            WizardStep::FolderSetup,
            "late reply after cancel is ignored"
        );

        app.handle_key(KeyCode::Esc, &h.dispatcher);
        assert_eq!(app.modal, Some(Modal::ConfirmQuit));
        app.handle_key(KeyCode::Char('y'), &h.dispatcher);
        assert!(app.quit);
    }

    #[test]
    fn dev_seed_prefills_folder_and_source() {
        let seed = DevSeed {
            folder_path: Some("/tmp/seeded".to_string()),
            source: [("system_name", "SeedDB")].into_iter().collect(),
            target: FormValues::new(),
        };
        let app = app_with(Some(seed));
        assert_eq!(app.view.folder.value("path"), "/tmp/seeded");
        assert_eq!(app.view.sources[0].value("system_name"), "SeedDB");
        assert!(
            !app.controller.session().requests().is_in_flight(RequestKind::FsSetup),
            "seed never submits"
        );
    }

    // -------------------------------------------------------------------------
    // D) Smoke rendering
    // -------------------------------------------------------------------------

    #[test]
    fn smoke_renders_every_page() {
        for page in ["folder", "source", "target", " TARGET "] {
            assert!(smoke(page).is_ok(), "smoke page {} should render", page);
        }
    }

    #[test]
    fn smoke_rejects_unknown_page() {
        assert!(smoke("mapping").is_err());
    }

    #[test]
    fn smoke_target_view_has_completed_steps() {
        let view = new_smoke_view("target").expect("view");
        assert_eq!(view.page, WizardStep::TargetConfig);
        assert_eq!(view.steps[&WizardStep::SourceConfig], StepStatus::Completed);
    }
}
