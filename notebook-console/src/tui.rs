//! Interactive console: terminal setup, event loop and command dispatch

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event as CEvent, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use notebook_core::form::CreateRequest;
use notebook_core::manager::LifecycleManager;
use notebook_core::model::{Dataset, Project};
use notebook_core::notify::{Level, NotificationCenter, Notifier, op_key};

use crate::console::Setup;
use crate::ui::app::{App, Command};
use crate::ui::render::{self, View};

const TICK: Duration = Duration::from_secs(1);
const NEW_INSTANCE_SPEC: &str = "CPU: 2 vCPUs 8GB";
const NEW_INSTANCE_IMAGE: &str = "python-3.11";

type Term = Terminal<CrosstermBackend<io::Stdout>>;

// --- Terminal setup/teardown ---
fn setup_terminal() -> io::Result<Term> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

fn restore_terminal(mut terminal: Term) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

pub async fn run_tui(setup: &Setup) -> io::Result<()> {
    let center = Arc::new(NotificationCenter::new());
    let manager = setup
        .manager(center.clone())
        .await
        .map_err(io::Error::other)?;

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &manager, &center, &setup.title).await;

    // Pending completions must not land after the view is gone
    manager.dispose();
    restore_terminal(terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Term,
    manager: &LifecycleManager,
    center: &NotificationCenter,
    title: &str,
) -> io::Result<()> {
    let mut app = App::new();
    let mut last_tick = Instant::now();

    loop {
        let elapsed = last_tick.elapsed();
        if elapsed >= TICK {
            manager.tick(elapsed).await;
            last_tick = Instant::now();
        }

        // Snapshot under one read lock, then draw without holding it
        let (rows, total, events, project, datasets) = {
            let state = manager.read().await;
            let rows: Vec<_> = app
                .filter
                .apply(&state.instances)
                .into_iter()
                .cloned()
                .collect();
            app.sync(rows.iter().map(|i| i.id.clone()).collect());

            let selected = app.selected_id().and_then(|id| state.get(id));
            let events: Vec<_> = selected
                .map(|i| state.events.get(&i.id).cloned().collect())
                .unwrap_or_default();
            let project: Option<Project> = selected
                .and_then(|i| i.project.as_deref())
                .and_then(|p| state.project(p))
                .cloned();
            let datasets: Vec<Dataset> = project
                .as_ref()
                .map(|p| state.datasets_of(&p.id).cloned().collect())
                .unwrap_or_default();
            (rows, state.instances.len(), events, project, datasets)
        };
        let selected = app
            .selected_id()
            .and_then(|id| rows.iter().find(|i| &i.id == id))
            .cloned();
        let toast = center.latest();

        terminal.draw(|f| {
            let view = View {
                title,
                backend: manager.backend_name(),
                rows: &rows,
                total,
                selected: selected.as_ref(),
                events: &events,
                project: project.as_ref(),
                datasets: &datasets,
                toast: toast.as_ref(),
            };
            render::draw(f, &app, &view);
        })?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let CEvent::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let Some(command) = app.handle_key(code, modifiers, selected.as_ref()) else {
            continue;
        };
        if command == Command::Quit {
            break;
        }
        dispatch(manager, center, command).await;
    }

    Ok(())
}

/// Run a UI command against the manager. Failures become error toasts.
async fn dispatch(manager: &LifecycleManager, center: &NotificationCenter, command: Command) {
    let (key, result) = match command {
        Command::Start(id) => (op_key("start", &id), manager.start(&id).await),
        Command::Stop(id) => (op_key("stop", &id), manager.stop(&id, true).await),
        Command::Delete(id) => (op_key("delete", &id), manager.delete(&id).await.map(|_| ())),
        Command::Create(name) => {
            let req = CreateRequest::new(name, NEW_INSTANCE_SPEC, NEW_INSTANCE_IMAGE);
            ("create:form".to_string(), manager.create(req).await.map(|_| ()))
        }
        Command::Edit(id, patch) => (op_key("edit", &id), manager.edit(&id, patch).await),
        Command::UpdateDescription(id, text) => {
            (op_key("edit", &id), manager.update_description(&id, &text).await)
        }
        Command::SetTag(id, tag) => {
            let text = format!("Tagged {}", tag);
            let result = manager.set_tag(&id, tag).await;
            if result.is_ok() {
                center.notify(&op_key("tag", &id), Level::Success, &text);
            }
            (op_key("tag", &id), result)
        }
        Command::RemoveTag(id, key) => {
            let result = manager.remove_tag(&id, &key).await.map(|existed| {
                let text = if existed {
                    format!("Removed tag {}", key)
                } else {
                    format!("No tag {}", key)
                };
                center.notify(&op_key("tag", &id), Level::Info, &text);
            });
            (op_key("tag", &id), result)
        }
        Command::Connect(id, kind) => {
            let result = manager.connect(&id, kind).await.map(|target| {
                tracing::info!(%id, kind = kind.label(), target = target.as_str(), "connect");
                center.notify(
                    &op_key("connect", &id),
                    Level::Info,
                    &format!("{}: {}", kind.label(), target.as_str()),
                );
            });
            (op_key("connect", &id), result)
        }
        Command::Quit => return,
    };

    if let Err(e) = result {
        tracing::warn!(%key, error = %e, "operation refused");
        center.notify(&key, Level::Error, &e.to_string());
    }
}
