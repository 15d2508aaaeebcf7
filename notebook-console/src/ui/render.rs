//! Frame layout for the interactive console

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use notebook_core::lifecycle::{self, Action};
use notebook_core::link::build_notebook_detail_url;
use notebook_core::model::{ConnectKind, Dataset, Instance, InstanceStatus, Project};
use notebook_core::notify::Notification;
use notebook_core::state::InstanceEvent;

use super::app::{App, Mode, Tab};
use super::styles;

/// Everything a frame shows, snapshotted before drawing
pub struct View<'a> {
    pub title: &'a str,
    pub backend: &'a str,
    pub rows: &'a [Instance],
    pub total: usize,
    pub selected: Option<&'a Instance>,
    pub events: &'a [InstanceEvent],
    pub project: Option<&'a Project>,
    pub datasets: &'a [Dataset],
    pub toast: Option<&'a Notification>,
}

pub fn draw(f: &mut Frame, app: &App, view: &View) {
    let area = f.area();

    // [ top bar ]
    // [ filter bar ]
    // [ list | detail ]
    // [ footer ]
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(outer[2]);

    draw_top_bar(f, view, outer[0]);
    draw_filter_bar(f, app, view, outer[1]);
    draw_list(f, app, view, main[0]);
    draw_detail(f, app, view, main[1]);
    draw_footer(f, app, view, outer[3]);

    match &app.mode {
        Mode::Confirm(confirm) => draw_modal(f, " Confirm ", vec![Line::from(Span::styled(
            confirm.question(),
            styles::busy(),
        ))]),
        Mode::Connect => {
            let lines = ConnectKind::ALL
                .iter()
                .map(|k| {
                    let key = match k {
                        ConnectKind::Jupyter => "j",
                        ConnectKind::VsCode => "v",
                        ConnectKind::Ssh => "s",
                    };
                    Line::from(vec![
                        Span::styled(format!(" {} ", key), styles::key_hint()),
                        Span::styled(k.label(), styles::text()),
                    ])
                })
                .collect();
            draw_modal(f, " Connect ", lines);
        }
        Mode::Help => draw_modal(f, " Keys ", help_lines()),
        _ => {}
    }
}

fn draw_top_bar(f: &mut Frame, view: &View, area: Rect) {
    let count = |status: InstanceStatus| view.rows.iter().filter(|i| i.status == status).count();
    let busy = view.rows.iter().filter(|i| i.status.is_transient()).count();

    let mut spans = vec![
        Span::styled(" Notebooks ", styles::heading()),
        Span::styled(view.title.to_string(), styles::text()),
        Span::raw("  "),
        Span::styled(
            format!("{} running", count(InstanceStatus::Running)),
            styles::running(),
        ),
    ];
    if busy > 0 {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!("{} busy", busy), styles::busy()));
    }
    let failed = count(InstanceStatus::Failed);
    if failed > 0 {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!("{} failed", failed), styles::failed()));
    }
    spans.push(Span::raw("    "));
    spans.push(Span::styled(format!("backend: {}", view.backend), styles::idle()));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_filter_bar(f: &mut Frame, app: &App, view: &View, area: Rect) {
    let line = if let Mode::Input { field, buffer } = &app.mode {
        Line::from(vec![
            Span::styled(format!(" {}: ", field.prompt()), styles::highlight()),
            Span::styled(buffer.clone(), styles::text()),
            Span::styled("▏", styles::highlight()),
        ])
    } else {
        let label_style = if app.filter.is_empty() {
            styles::label()
        } else {
            styles::busy()
        };
        let mut spans = vec![
            Span::styled(" filter ", styles::idle()),
            Span::styled(format!("[{}]", app.filter.label()), label_style),
            Span::styled(
                format!("  {} of {}", view.rows.len(), view.total),
                styles::label(),
            ),
        ];
        if !app.filter.case_sensitive {
            spans.push(Span::styled("  (ignore case)", styles::idle()));
        }
        Line::from(spans)
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_list(f: &mut Frame, app: &App, view: &View, area: Rect) {
    let items: Vec<ListItem> = view
        .rows
        .iter()
        .map(|inst| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{} ", styles::status_icon(inst.status)),
                    styles::status(inst.status),
                ),
                Span::styled(format!("{:<20}", inst.name), styles::text()),
                Span::styled(format!(" {:<9}", inst.status.label()), styles::status(inst.status)),
                Span::styled(format!(" {}", inst.runtime_label()), styles::label()),
            ]))
        })
        .collect();

    let title = fit_title(&format!("Instances ({})", view.rows.len()), area.width);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(styles::frame_focused());

    if items.is_empty() {
        let empty = Paragraph::new(Line::from(Span::styled(
            "No instances match the filter (r to reset)",
            styles::idle(),
        )))
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(styles::cursor())
        .highlight_symbol("▶ ");
    let mut state = ListState::default();
    state.select(Some(app.selected));
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_detail(f: &mut Frame, app: &App, view: &View, area: Rect) {
    let Some(inst) = view.selected else {
        let block = Block::default()
            .title("Detail")
            .borders(Borders::ALL)
            .border_style(styles::frame());
        f.render_widget(block, area);
        return;
    };

    let mut tabs: Vec<Span> = Vec::new();
    for tab in Tab::ALL {
        tabs.push(Span::styled(format!(" {} ", tab.title()), styles::tab(tab == app.tab)));
    }

    let block = Block::default()
        .title(Line::from(tabs))
        .borders(Borders::ALL)
        .border_style(styles::frame());

    let lines = match app.tab {
        Tab::Overview => overview_lines(inst, view),
        Tab::Events => event_lines(view.events),
        Tab::Storage => storage_lines(inst),
        Tab::Tags => tag_lines(inst),
    };

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn field<'a>(label: &'a str, value: String) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{:<14}", label), styles::label()),
        Span::styled(value, styles::text()),
    ])
}

fn overview_lines<'a>(inst: &'a Instance, view: &View) -> Vec<Line<'a>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled(inst.name.clone(), styles::heading()),
            Span::raw("  "),
            Span::styled(
                format!("{} {}", styles::status_icon(inst.status), inst.status.label()),
                styles::status(inst.status),
            ),
        ]),
        field("id", inst.id.clone()),
        field("link", build_notebook_detail_url(&inst.id)),
        field(
            "description",
            if inst.description.is_empty() {
                "-".into()
            } else {
                inst.description.clone()
            },
        ),
        Line::default(),
        field("spec", inst.spec.clone()),
        field("image", inst.image.clone()),
        field("runtime", inst.runtime_label()),
        field(
            "auto-stop",
            inst.auto_stop_hours
                .map(|h| format!("after {}h", h))
                .unwrap_or_else(|| "off".into()),
        ),
        field("ssh", (if inst.ssh_enabled { "enabled" } else { "disabled" }).to_string()),
        field("url", inst.url.clone().unwrap_or_else(|| "-".into())),
    ];
    if let Some(cmd) = &inst.ssh_command {
        lines.push(field("ssh command", cmd.clone()));
    }
    lines.push(Line::default());
    lines.push(field("created", inst.created_at.format("%Y-%m-%d %H:%M").to_string()));
    lines.push(field("creator", inst.creator.clone()));
    match view.project {
        Some(p) => {
            lines.push(field("project", format!("{} ({})", p.name, p.id)));
            lines.push(field("datasets", view.datasets.len().to_string()));
            for ds in view.datasets {
                lines.push(Line::from(Span::styled(
                    format!("  {} · {} records", ds.name, ds.records),
                    styles::idle(),
                )));
            }
        }
        None => lines.push(field("project", inst.project.clone().unwrap_or_else(|| "-".into()))),
    }

    let actions: Vec<&str> = lifecycle::available_actions(inst.status)
        .into_iter()
        .filter_map(|a| match a {
            Action::Connect(ConnectKind::Jupyter) => Some("connect"),
            Action::Connect(_) => None,
            other => Some(other.label()),
        })
        .collect();
    lines.push(Line::default());
    lines.push(Line::from(vec![
        Span::styled(format!("{:<14}", "actions"), styles::label()),
        Span::styled(actions.join(", "), styles::highlight()),
    ]));
    lines
}

fn event_lines(events: &[InstanceEvent]) -> Vec<Line<'static>> {
    if events.is_empty() {
        return vec![Line::from(Span::styled("No events yet", styles::idle()))];
    }
    events
        .iter()
        .rev()
        .map(|e| {
            Line::from(vec![
                Span::styled(e.at.format("%H:%M:%S ").to_string(), styles::idle()),
                Span::styled(format!("{:<7} ", e.level.label()), styles::event(e.level)),
                Span::styled(e.message.clone(), styles::text()),
            ])
        })
        .collect()
}

fn storage_lines(inst: &Instance) -> Vec<Line<'static>> {
    if inst.storage.is_empty() {
        return vec![Line::from(Span::styled("No storage mounted", styles::idle()))];
    }
    let mut lines = vec![Line::from(Span::styled(
        format!("{:<14}{:<7}{:<26}{}", "name", "kind", "mount path", "capacity"),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    for m in &inst.storage {
        lines.push(Line::from(Span::styled(
            format!(
                "{:<14}{:<7}{:<26}{}",
                m.name,
                m.kind.label(),
                m.mount_path,
                m.capacity_gb
                    .map(|gb| format!("{} GB", gb))
                    .unwrap_or_else(|| "-".into())
            ),
            styles::text(),
        )));
    }
    lines
}

fn tag_lines(inst: &Instance) -> Vec<Line<'static>> {
    if inst.tags.is_empty() {
        return vec![Line::from(Span::styled(
            "No tags (t to add key=value)",
            styles::idle(),
        ))];
    }
    inst.tags
        .iter()
        .map(|t| {
            Line::from(vec![
                Span::styled(format!("{:<16}", t.key), styles::highlight()),
                Span::styled(t.value.clone(), styles::text()),
            ])
        })
        .collect()
}

fn draw_footer(f: &mut Frame, app: &App, view: &View, area: Rect) {
    // Local hints win over toasts; toasts win over key help
    if let Some(hint) = &app.hint {
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(format!(" {}", hint), styles::busy()))),
            area,
        );
        return;
    }
    if let Some(toast) = view.toast {
        let line = Line::from(vec![
            Span::styled(format!(" {} ", styles::toast_icon(toast.level)), styles::toast(toast.level)),
            Span::styled(toast.text.clone(), styles::toast(toast.level)),
            Span::styled(format!("  [{}]", toast.key), styles::idle()),
        ]);
        f.render_widget(Paragraph::new(line), area);
        return;
    }

    let hints = [
        ("s", " start  "),
        ("x", " stop  "),
        ("c", " connect  "),
        ("n", " new  "),
        ("e", " describe  "),
        ("E", " edit  "),
        ("t", " tag  "),
        ("d", " delete  "),
        ("/", " search  "),
        ("#", " tags  "),
        ("?", " help  "),
        ("q", " quit"),
    ];
    let spans: Vec<Span> = hints
        .iter()
        .flat_map(|(key, label)| {
            [
                Span::styled(*key, styles::key_hint()),
                Span::styled(*label, styles::label()),
            ]
        })
        .collect();
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn help_lines() -> Vec<Line<'static>> {
    [
        ("↑↓ / jk", "select instance"),
        ("Tab", "next detail tab"),
        ("s", "start (stopped or failed)"),
        ("x", "stop (running, asks first)"),
        ("c", "connect: jupyter, vscode, ssh"),
        ("n", "create instance"),
        ("e", "edit description"),
        ("E", "edit name, image, spec (stopped)"),
        ("t", "set key=value or remove -key tag"),
        ("d", "delete (asks first)"),
        ("/", "search id or name"),
        ("#", "filter by tag"),
        ("p", "filter by project"),
        ("i", "toggle case sensitivity"),
        ("r", "reset filters"),
        ("q", "quit"),
    ]
    .into_iter()
    .map(|(key, what)| {
        Line::from(vec![
            Span::styled(format!(" {:<10}", key), styles::key_hint()),
            Span::styled(what, styles::text()),
        ])
    })
    .collect()
}

fn draw_modal(f: &mut Frame, title: &str, lines: Vec<Line>) {
    let area = f.area();
    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let height = (lines.len() as u16 + 2).min(area.height);
    let rect = Rect {
        x: area.width.saturating_sub(width) / 2,
        y: area.height.saturating_sub(height) / 2,
        width,
        height,
    };

    f.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::frame_focused())
        .title(title.to_string());
    f.render_widget(Paragraph::new(lines).block(block), rect);
}

pub fn fit_title(s: &str, width: u16) -> String {
    // width includes borders; keep safe margin
    let max = width.saturating_sub(4) as usize;
    if max == 0 {
        return "".into();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max {
        return s.to_string();
    }
    if max <= 1 {
        return "…".into();
    }
    let mut out: String = chars.into_iter().take(max - 1).collect();
    out.push('…');
    out
}
