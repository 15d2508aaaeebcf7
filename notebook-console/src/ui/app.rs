//! Interactive state of the console: selection, active tab, input prompts
//! and confirmation dialogs. Key handling is pure; it returns a [`Command`]
//! for the event loop to run against the lifecycle manager.

use crossterm::event::{KeyCode, KeyModifiers};

use notebook_core::filter::{ProjectFilter, QueryFilter};
use notebook_core::form::EditRequest;
use notebook_core::lifecycle::{self, Action};
use notebook_core::model::{ConnectKind, Instance, InstanceId, Tag};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tab {
    Overview,
    Events,
    Storage,
    Tags,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Overview, Tab::Events, Tab::Storage, Tab::Tags];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Events => "Events",
            Tab::Storage => "Storage",
            Tab::Tags => "Tags",
        }
    }

    fn next(self) -> Self {
        match self {
            Tab::Overview => Tab::Events,
            Tab::Events => Tab::Storage,
            Tab::Storage => Tab::Tags,
            Tab::Tags => Tab::Overview,
        }
    }

    fn prev(self) -> Self {
        match self {
            Tab::Overview => Tab::Tags,
            Tab::Events => Tab::Overview,
            Tab::Storage => Tab::Events,
            Tab::Tags => Tab::Storage,
        }
    }
}

/// Which line prompt is open
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Search,
    TagQuery,
    Project,
    Description,
    NewInstance,
    /// `key=value` sets, `-key` removes
    Tag,
    /// `name=..; image=..; spec=..`, prefilled with the current values
    Edit,
}

impl Field {
    pub fn prompt(&self) -> &'static str {
        match self {
            Field::Search => "search",
            Field::TagQuery => "tag filter",
            Field::Project => "project (all for every project)",
            Field::Description => "description",
            Field::NewInstance => "new instance name",
            Field::Tag => "tag (key=value, -key to remove)",
            Field::Edit => "edit (name=..; image=..; spec=..)",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirm {
    Stop(InstanceId),
    Delete(InstanceId),
}

impl Confirm {
    pub fn question(&self) -> String {
        match self {
            Confirm::Stop(id) => format!("Stop {}? (y/n)", id),
            Confirm::Delete(id) => format!("Delete {}? This cannot be undone. (y/n)", id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Input { field: Field, buffer: String },
    Confirm(Confirm),
    /// Picking jupyter/vscode/ssh for the selected instance
    Connect,
    Help,
}

/// What the event loop should do after a key press
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start(InstanceId),
    Stop(InstanceId),
    Delete(InstanceId),
    Create(String),
    Edit(InstanceId, EditRequest),
    UpdateDescription(InstanceId, String),
    SetTag(InstanceId, Tag),
    RemoveTag(InstanceId, String),
    Connect(InstanceId, ConnectKind),
    Quit,
}

pub struct App {
    pub filter: QueryFilter,
    pub tab: Tab,
    pub mode: Mode,
    pub selected: usize,
    /// Ids of the rows currently shown, in display order
    visible: Vec<InstanceId>,
    /// Local feedback that never reaches the manager (bad input etc.)
    pub hint: Option<String>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            filter: QueryFilter::new(),
            tab: Tab::Overview,
            mode: Mode::Normal,
            selected: 0,
            visible: Vec::new(),
            hint: None,
        }
    }

    /// Refresh the visible rows, keeping the selection on the same instance
    /// when it is still listed.
    pub fn sync(&mut self, visible: Vec<InstanceId>) {
        let current = self.selected_id().cloned();
        self.visible = visible;
        if let Some(id) = current {
            if let Some(pos) = self.visible.iter().position(|v| *v == id) {
                self.selected = pos;
                return;
            }
        }
        self.selected = self.selected.min(self.visible.len().saturating_sub(1));
    }

    pub fn selected_id(&self) -> Option<&InstanceId> {
        self.visible.get(self.selected)
    }

    /// Handle one key press. `selected` is the instance under the cursor.
    pub fn handle_key(
        &mut self,
        code: KeyCode,
        modifiers: KeyModifiers,
        selected: Option<&Instance>,
    ) -> Option<Command> {
        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Command::Quit);
        }

        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => self.normal_key(code, selected),
            Mode::Input { field, mut buffer } => match code {
                KeyCode::Esc => None,
                KeyCode::Enter => self.submit(field, buffer, selected),
                KeyCode::Backspace => {
                    buffer.pop();
                    self.mode = Mode::Input { field, buffer };
                    None
                }
                KeyCode::Char(ch) => {
                    buffer.push(ch);
                    self.mode = Mode::Input { field, buffer };
                    None
                }
                _ => {
                    self.mode = Mode::Input { field, buffer };
                    None
                }
            },
            Mode::Confirm(confirm) => match code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(match confirm {
                    Confirm::Stop(id) => Command::Stop(id),
                    Confirm::Delete(id) => Command::Delete(id),
                }),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => None,
                _ => {
                    self.mode = Mode::Confirm(confirm);
                    None
                }
            },
            Mode::Connect => {
                let kind = match code {
                    KeyCode::Char('j') => ConnectKind::Jupyter,
                    KeyCode::Char('v') => ConnectKind::VsCode,
                    KeyCode::Char('s') => ConnectKind::Ssh,
                    _ => return None,
                };
                selected.map(|inst| Command::Connect(inst.id.clone(), kind))
            }
            Mode::Help => None,
        }
    }

    fn normal_key(&mut self, code: KeyCode, selected: Option<&Instance>) -> Option<Command> {
        self.hint = None;
        match code {
            KeyCode::Char('q') => return Some(Command::Quit),
            KeyCode::Char('?') => self.mode = Mode::Help,
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.visible.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::BackTab => self.tab = self.tab.prev(),
            KeyCode::Char('/') => self.open(Field::Search, self.filter.search_term.clone()),
            KeyCode::Char('#') => self.open(Field::TagQuery, self.filter.tag_query.clone()),
            KeyCode::Char('p') => {
                let current = match &self.filter.project_filter {
                    ProjectFilter::All => String::new(),
                    ProjectFilter::Only(p) => p.clone(),
                };
                self.open(Field::Project, current)
            }
            KeyCode::Char('i') => {
                self.filter.case_sensitive = !self.filter.case_sensitive;
                self.hint = Some(if self.filter.case_sensitive {
                    "case-sensitive search".into()
                } else {
                    "case-insensitive search".into()
                });
            }
            KeyCode::Char('r') => self.filter.reset(),
            KeyCode::Char('n') => self.open(Field::NewInstance, String::new()),
            _ => return self.instance_key(code, selected?),
        }
        None
    }

    /// Keys that act on the selected instance. Keys for actions the status
    /// does not allow only leave a hint; the manager re-checks anyway.
    fn instance_key(&mut self, code: KeyCode, inst: &Instance) -> Option<Command> {
        let action = match code {
            KeyCode::Char('s') => Action::Start,
            KeyCode::Char('x') => Action::Stop { confirmed: true },
            KeyCode::Char('d') => Action::Delete,
            KeyCode::Char('E') => Action::Edit,
            KeyCode::Char('e') => Action::UpdateDescription,
            KeyCode::Char('t') => Action::Retag,
            KeyCode::Char('c') => Action::Connect(ConnectKind::Jupyter),
            _ => return None,
        };

        if !lifecycle::can(inst.status, action) {
            self.hint = Some(format!("cannot {} while {}", action.label(), inst.status));
            return None;
        }

        match action {
            Action::Start => return Some(Command::Start(inst.id.clone())),
            Action::Stop { .. } => self.mode = Mode::Confirm(Confirm::Stop(inst.id.clone())),
            Action::Delete => self.mode = Mode::Confirm(Confirm::Delete(inst.id.clone())),
            Action::Edit => self.open(
                Field::Edit,
                format!("name={}; image={}; spec={}", inst.name, inst.image, inst.spec),
            ),
            Action::UpdateDescription => self.open(Field::Description, inst.description.clone()),
            Action::Retag => self.open(Field::Tag, String::new()),
            Action::Connect(_) => self.mode = Mode::Connect,
            _ => {}
        }
        None
    }

    fn open(&mut self, field: Field, buffer: String) {
        self.mode = Mode::Input { field, buffer };
    }

    fn submit(&mut self, field: Field, buffer: String, selected: Option<&Instance>) -> Option<Command> {
        let value = buffer.trim();
        match field {
            Field::Search => self.filter.search_term = value.to_string(),
            Field::TagQuery => self.filter.tag_query = value.to_string(),
            Field::Project => self.filter.project_filter = ProjectFilter::parse(value),
            Field::NewInstance => return Some(Command::Create(value.to_string())),
            Field::Description => {
                return selected.map(|i| Command::UpdateDescription(i.id.clone(), value.to_string()));
            }
            Field::Tag => {
                let inst = selected?;
                return match parse_tag_input(value) {
                    Ok(TagEdit::Set(tag)) => Some(Command::SetTag(inst.id.clone(), tag)),
                    Ok(TagEdit::Remove(key)) => Some(Command::RemoveTag(inst.id.clone(), key)),
                    Err(msg) => {
                        self.hint = Some(msg);
                        None
                    }
                };
            }
            Field::Edit => {
                let inst = selected?;
                return match parse_edit_input(value, inst) {
                    Ok(patch) => Some(Command::Edit(inst.id.clone(), patch)),
                    Err(msg) => {
                        self.hint = Some(msg);
                        None
                    }
                };
            }
        }
        self.selected = 0;
        None
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TagEdit {
    Set(Tag),
    Remove(String),
}

fn parse_tag_input(input: &str) -> Result<TagEdit, String> {
    if let Some(key) = input.strip_prefix('-') {
        let key = key.trim();
        if key.is_empty() {
            return Err("tag key is required".into());
        }
        return Ok(TagEdit::Remove(key.to_string()));
    }
    match input.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok(TagEdit::Set(Tag::new(k.trim(), v.trim()))),
        _ => Err("expected key=value or -key".into()),
    }
}

/// Only fields whose value differs from `inst` end up in the patch.
fn parse_edit_input(input: &str, inst: &Instance) -> Result<EditRequest, String> {
    let mut patch = EditRequest::default();
    for part in input.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = part.split_once('=') else {
            return Err(format!("expected field=value, got '{}'", part));
        };
        let (slot, current) = match key.trim() {
            "name" => (&mut patch.name, &inst.name),
            "image" => (&mut patch.image, &inst.image),
            "spec" => (&mut patch.spec, &inst.spec),
            other => return Err(format!("unknown field '{}'; use name, image or spec", other)),
        };
        let value = value.trim();
        if value != current.as_str() {
            *slot = Some(value.to_string());
        }
    }
    if patch.is_empty() {
        return Err("nothing to change".into());
    }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use notebook_core::model::InstanceStatus;

    fn inst(id: &str, status: InstanceStatus) -> Instance {
        Instance {
            id: id.into(),
            name: id.to_lowercase(),
            description: "old".into(),
            status,
            spec: "CPU".into(),
            image: "python".into(),
            runtime: None,
            ssh_enabled: false,
            auto_stop_hours: None,
            url: None,
            ssh_command: None,
            created_at: Utc::now(),
            creator: "alice".into(),
            project: None,
            tags: Vec::new(),
            storage: Vec::new(),
        }
    }

    fn press(app: &mut App, code: KeyCode, selected: Option<&Instance>) -> Option<Command> {
        app.handle_key(code, KeyModifiers::NONE, selected)
    }

    fn type_str(app: &mut App, s: &str, selected: Option<&Instance>) {
        for ch in s.chars() {
            press(app, KeyCode::Char(ch), selected);
        }
    }

    #[test]
    fn test_stop_requires_confirmation() {
        let mut app = App::new();
        let running = inst("NB-1", InstanceStatus::Running);

        assert_eq!(press(&mut app, KeyCode::Char('x'), Some(&running)), None);
        assert_eq!(app.mode, Mode::Confirm(Confirm::Stop("NB-1".into())));

        assert_eq!(
            press(&mut app, KeyCode::Char('y'), Some(&running)),
            Some(Command::Stop("NB-1".into()))
        );
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn test_declined_confirmation_does_nothing() {
        let mut app = App::new();
        let stopped = inst("NB-1", InstanceStatus::Stopped);

        press(&mut app, KeyCode::Char('d'), Some(&stopped));
        assert_eq!(press(&mut app, KeyCode::Char('n'), Some(&stopped)), None);
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn test_disallowed_action_leaves_hint() {
        let mut app = App::new();
        let starting = inst("NB-1", InstanceStatus::Starting);

        assert_eq!(press(&mut app, KeyCode::Char('s'), Some(&starting)), None);
        assert_eq!(app.hint.as_deref(), Some("cannot start while starting"));

        let failed = inst("NB-2", InstanceStatus::Failed);
        assert_eq!(
            press(&mut app, KeyCode::Char('s'), Some(&failed)),
            Some(Command::Start("NB-2".into()))
        );
    }

    #[test]
    fn test_search_prompt_updates_filter() {
        let mut app = App::new();
        press(&mut app, KeyCode::Char('/'), None);
        type_str(&mut app, "NB-2024", None);
        assert_eq!(press(&mut app, KeyCode::Enter, None), None);
        assert_eq!(app.filter.search_term, "NB-2024");

        press(&mut app, KeyCode::Char('r'), None);
        assert!(app.filter.is_empty());
    }

    #[test]
    fn test_escape_discards_prompt() {
        let mut app = App::new();
        press(&mut app, KeyCode::Char('/'), None);
        type_str(&mut app, "abc", None);
        press(&mut app, KeyCode::Esc, None);
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.filter.search_term.is_empty());
    }

    #[test]
    fn test_description_prompt_is_prefilled() {
        let mut app = App::new();
        let stopped = inst("NB-1", InstanceStatus::Running);
        press(&mut app, KeyCode::Char('e'), Some(&stopped));
        press(&mut app, KeyCode::Backspace, Some(&stopped));
        type_str(&mut app, "k", Some(&stopped));
        assert_eq!(
            press(&mut app, KeyCode::Enter, Some(&stopped)),
            Some(Command::UpdateDescription("NB-1".into(), "olk".into()))
        );
    }

    #[test]
    fn test_tag_prompt_parses_set_and_remove() {
        let mut app = App::new();
        let i = inst("NB-1", InstanceStatus::Stopped);

        press(&mut app, KeyCode::Char('t'), Some(&i));
        type_str(&mut app, "team=cv", Some(&i));
        assert_eq!(
            press(&mut app, KeyCode::Enter, Some(&i)),
            Some(Command::SetTag("NB-1".into(), Tag::new("team", "cv")))
        );

        press(&mut app, KeyCode::Char('t'), Some(&i));
        type_str(&mut app, "-team", Some(&i));
        assert_eq!(
            press(&mut app, KeyCode::Enter, Some(&i)),
            Some(Command::RemoveTag("NB-1".into(), "team".into()))
        );

        press(&mut app, KeyCode::Char('t'), Some(&i));
        type_str(&mut app, "nonsense", Some(&i));
        assert_eq!(press(&mut app, KeyCode::Enter, Some(&i)), None);
        assert!(app.hint.is_some());
    }

    #[test]
    fn test_edit_refused_unless_stopped() {
        let mut app = App::new();
        let running = inst("NB-1", InstanceStatus::Running);
        assert_eq!(press(&mut app, KeyCode::Char('E'), Some(&running)), None);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.hint.as_deref(), Some("cannot edit while running"));

        let failed = inst("NB-1", InstanceStatus::Failed);
        press(&mut app, KeyCode::Char('E'), Some(&failed));
        assert_eq!(app.hint.as_deref(), Some("cannot edit while failed"));
    }

    #[test]
    fn test_edit_prompt_sends_changed_fields() {
        let mut app = App::new();
        let stopped = inst("NB-1", InstanceStatus::Stopped);

        press(&mut app, KeyCode::Char('E'), Some(&stopped));
        assert_eq!(app.mode, Mode::Input {
            field: Field::Edit,
            buffer: "name=nb-1; image=python; spec=CPU".into(),
        });
        // Append to the spec; name and image stay as they are
        type_str(&mut app, " 4 vCPUs", Some(&stopped));
        assert_eq!(
            press(&mut app, KeyCode::Enter, Some(&stopped)),
            Some(Command::Edit("NB-1".into(), EditRequest {
                spec: Some("CPU 4 vCPUs".into()),
                ..Default::default()
            }))
        );
    }

    #[test]
    fn test_edit_prompt_rejects_bad_input() {
        let stopped = inst("NB-1", InstanceStatus::Stopped);
        assert!(parse_edit_input("name=nb-1; image=python", &stopped).is_err());
        assert!(parse_edit_input("flavor=large", &stopped).is_err());
        assert!(parse_edit_input("name", &stopped).is_err());
        assert_eq!(
            parse_edit_input("name=renamed", &stopped),
            Ok(EditRequest {
                name: Some("renamed".into()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_connect_menu_only_when_running() {
        let mut app = App::new();
        let stopped = inst("NB-1", InstanceStatus::Stopped);
        press(&mut app, KeyCode::Char('c'), Some(&stopped));
        assert_eq!(app.mode, Mode::Normal);

        let running = inst("NB-1", InstanceStatus::Running);
        press(&mut app, KeyCode::Char('c'), Some(&running));
        assert_eq!(app.mode, Mode::Connect);
        assert_eq!(
            press(&mut app, KeyCode::Char('v'), Some(&running)),
            Some(Command::Connect("NB-1".into(), ConnectKind::VsCode))
        );
    }

    #[test]
    fn test_sync_follows_selected_instance() {
        let mut app = App::new();
        app.sync(vec!["a".into(), "b".into(), "c".into()]);
        press(&mut app, KeyCode::Down, None);
        assert_eq!(app.selected_id().map(String::as_str), Some("b"));

        // A new instance is prepended; the cursor stays on "b"
        app.sync(vec!["new".into(), "a".into(), "b".into(), "c".into()]);
        assert_eq!(app.selected_id().map(String::as_str), Some("b"));

        // "b" is deleted; the cursor clamps
        app.sync(vec!["new".into()]);
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn test_ctrl_c_quits_from_any_mode() {
        let mut app = App::new();
        press(&mut app, KeyCode::Char('/'), None);
        assert_eq!(
            app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL, None),
            Some(Command::Quit)
        );
    }
}
