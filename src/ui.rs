use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{AnswerForm, App, FormInput, HubScreen, Mode, StoryScreen};
use crate::clock::format_time;
use crate::hub::HubView;
use crate::puzzle::{AttemptStatus, Room, RowStatus};
use crate::story::{Cell, Obstacle, Stage};

const TITLE_ART: &str = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║     ███████╗███████╗ ██████╗ █████╗ ██████╗ ███████╗      ║
║     ██╔════╝██╔════╝██╔════╝██╔══██╗██╔══██╗██╔════╝      ║
║     █████╗  ███████╗██║     ███████║██████╔╝█████╗        ║
║     ██╔══╝  ╚════██║██║     ██╔══██║██╔═══╝ ██╔══╝        ║
║     ███████╗███████║╚██████╗██║  ██║██║     ███████╗      ║
║     ╚══════╝╚══════╝ ╚═════╝╚═╝  ╚═╝╚═╝     ╚══════╝      ║
║                                                           ║
║                 ██╗      █████╗ ██████╗                   ║
║                 ██║     ██╔══██╗██╔══██╗                  ║
║                 ██║     ███████║██████╔╝                  ║
║                 ██║     ██╔══██║██╔══██╗                  ║
║                 ███████╗██║  ██║██████╔╝                  ║
║                 ╚══════╝╚═╝  ╚═╝╚═════╝                   ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

pub fn draw(f: &mut Frame, app: &App) {
    match &app.mode {
        Mode::Hub(screen) if !screen.session.is_started() => draw_title(
            f,
            "Tres salas. Un cronómetro. +15 s por cada error.",
            "ENTER para empezar  •  q para salir",
        ),
        Mode::Hub(screen) if screen.session.is_finished() => draw_hub_finished(f, app, screen),
        Mode::Hub(screen) => draw_hub(f, app, screen),
        Mode::Story(screen) if screen.game.stage() == Stage::Intro => {
            let meta = &screen.game.script().meta;
            draw_title(
                f,
                &format!("{}\n{}\n\n{}", meta.title, meta.subtitle, meta.intro),
                "ENTER para empezar  •  q para salir",
            )
        }
        Mode::Story(screen) => draw_story(f, app, screen),
    }
}

fn draw_title(f: &mut Frame, tagline: &str, help: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(20),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    let title = Paragraph::new(TITLE_ART)
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let tagline = Paragraph::new(tagline)
        .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false });
    f.render_widget(tagline, chunks[1]);

    let help = Paragraph::new(help)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(help, chunks[2]);
}

/// Status bar, body and message panel.
fn frame_layout(area: Rect) -> (Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(10),
            Constraint::Length(5),
        ])
        .split(area);
    (chunks[0], chunks[1], chunks[2])
}

fn draw_status(f: &mut Frame, area: Rect, spans: Vec<Span>) {
    let mut line = vec![Span::styled(
        " ESCAPE LAB ",
        Style::default().fg(Color::Black).bg(Color::Cyan),
    )];
    for span in spans {
        line.push(Span::raw("  "));
        line.push(span);
    }
    let status = Paragraph::new(Line::from(line)).block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(status, area);
}

fn draw_message(f: &mut Frame, app: &App, area: Rect, help: &str) {
    let message = Paragraph::new(app.message.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {help} ")),
        )
        .wrap(Wrap { trim: false })
        .style(app.message_style);
    f.render_widget(message, area);
}

fn draw_hub(f: &mut Frame, app: &App, screen: &HubScreen) {
    let session = &screen.session;
    let (status, body, message) = frame_layout(f.area());

    draw_status(
        f,
        status,
        vec![
            Span::styled(
                format!(
                    " {} {} ",
                    if session.is_clock_running() { "⏱" } else { "⏸" },
                    format_time(session.elapsed())
                ),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" Errores: {} ", session.errors()),
                Style::default().fg(if session.errors() == 0 { Color::Green } else { Color::Red }),
            ),
            Span::styled(
                format!(
                    " Salas {}/{} ",
                    session.completed_rooms().len(),
                    session.rooms().len()
                ),
                Style::default().fg(Color::Cyan),
            ),
        ],
    );

    match session.view() {
        HubView::Lobby => {
            draw_lobby(f, screen, body);
            draw_message(f, app, message, "←/→ elegir sala • ENTER entrar • q salir");
        }
        HubView::Room(index) => {
            draw_room(f, screen, index, body);
            let help = match session.attempt(index).map(|attempt| attempt.status()) {
                Some(AttemptStatus::Active) => {
                    "TAB campo • ←/→ opción • ENTER validar • F1 datos • ESC hub"
                }
                Some(AttemptStatus::Failed) => "r reintentar • F1 datos • ESC hub",
                _ => "ENTER comenzar • F1 datos • ESC hub",
            };
            draw_message(f, app, message, help);
        }
    }
}

fn draw_lobby(f: &mut Frame, screen: &HubScreen, area: Rect) {
    let session = &screen.session;
    let count = session.rooms().len() as u32;
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, count); count as usize])
        .split(area);

    for (i, (room, column)) in session.rooms().iter().zip(columns.iter()).enumerate() {
        let id = room.meta.id.as_str();
        let (badge, color) = if session.is_completed(id) {
            let at = session.checkpoint(id).map(format_time).unwrap_or_default();
            (format!("✓ COMPLETADA {at}"), Color::Green)
        } else if session.is_unlocked(id) {
            ("▶ DISPONIBLE".to_string(), Color::Yellow)
        } else {
            ("🔒 BLOQUEADA".to_string(), Color::DarkGray)
        };

        let mut border = Style::default().fg(color);
        if i == screen.selected {
            border = border.add_modifier(Modifier::BOLD | Modifier::REVERSED);
        }
        let card = Paragraph::new(vec![
            Line::from(Span::styled(
                room.meta.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(room.meta.description.clone()),
            Line::from(""),
            Line::from(Span::styled(badge, Style::default().fg(color))),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(format!(" Sala {} ", room.meta.room_number)),
        )
        .wrap(Wrap { trim: true });
        f.render_widget(card, *column);
    }
}

fn draw_room(f: &mut Frame, screen: &HubScreen, index: usize, area: Rect) {
    let session = &screen.session;
    let room = &session.rooms()[index];
    let Some(attempt) = session.attempt(index) else {
        return;
    };

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let mut briefing = room.narrative.intro.clone();
    if let Some(context) = &room.narrative.context {
        briefing.push_str("\n\n");
        briefing.push_str(context);
    }
    briefing.push_str(&format!(
        "\n\nErrores: {}/{}",
        attempt.errors(),
        attempt.max_errors()
    ));
    let narrative = Paragraph::new(briefing)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", room.meta.title)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(narrative, columns[0]);

    if screen.show_reference {
        draw_reference(f, room, columns[1]);
        return;
    }

    match attempt.status() {
        AttemptStatus::Active => draw_form(f, &screen.forms[index], columns[1]),
        AttemptStatus::Idle => {
            let idle = Paragraph::new("Pulsa ENTER para comenzar la validación.\nF1 muestra los datos de referencia.")
                .block(Block::default().borders(Borders::ALL).title(" Validación "))
                .style(Style::default().fg(Color::Yellow));
            f.render_widget(idle, columns[1]);
        }
        AttemptStatus::Solved => {
            let mut text = room.narrative.success.clone();
            if let Some(remaining) = session.completion_countdown(index) {
                text.push_str(&format!("\n\nVolviendo al hub en {remaining} s..."));
            }
            let solved = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title(" ¡Sala superada! "))
                .style(Style::default().fg(Color::Black).bg(Color::Green))
                .wrap(Wrap { trim: false });
            f.render_widget(solved, columns[1]);
        }
        AttemptStatus::Failed => {
            let text = format!(
                "{}\n\n{}",
                attempt.game_over_message(room),
                attempt.feedback().unwrap_or_default()
            );
            let failed = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title(" GAME OVER "))
                .style(Style::default().fg(Color::White).bg(Color::Red))
                .wrap(Wrap { trim: false });
            f.render_widget(failed, columns[1]);
        }
    }
}

fn draw_form(f: &mut Frame, form: &AnswerForm, area: Rect) {
    let mut constraints = vec![Constraint::Length(3); form.fields.len()];
    constraints.push(Constraint::Min(0));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (i, field) in form.fields.iter().enumerate() {
        let focused = i == form.focus;
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::DarkGray }))
            .title(format!(" {} ", field.label));
        let inner = block.inner(rows[i]);
        f.render_widget(block, rows[i]);

        match &field.input {
            FormInput::Choice { options, selected } => {
                let spans: Vec<Span> = options
                    .iter()
                    .enumerate()
                    .map(|(j, option)| {
                        let style = if Some(j) == *selected {
                            Style::default().fg(Color::Black).bg(Color::Yellow)
                        } else {
                            Style::default().fg(Color::White)
                        };
                        Span::styled(format!(" {option} "), style)
                    })
                    .collect();
                f.render_widget(Paragraph::new(Line::from(spans)), inner);
            }
            FormInput::Text(textarea) => f.render_widget(textarea, inner),
        }
    }
}

fn draw_reference(f: &mut Frame, room: &Room, area: Rect) {
    let mut constraints: Vec<Constraint> = room
        .reference
        .iter()
        .map(|table| Constraint::Length(table.rows.len() as u16 + 3))
        .collect();
    constraints.push(Constraint::Min(0));
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (table, part) in room.reference.iter().zip(parts.iter()) {
        let rows = table.rows.iter().map(|row| {
            let mut cells = row.cells.clone();
            let style = match row.status() {
                Some(RowStatus::Faulty) => {
                    cells.push("✖".into());
                    Style::default().fg(Color::Red)
                }
                Some(RowStatus::Suspect) => {
                    cells.push("⚠".into());
                    Style::default().fg(Color::Yellow)
                }
                Some(RowStatus::Clean) => {
                    cells.push("✓".into());
                    Style::default().fg(Color::Green)
                }
                None => Style::default(),
            };
            Row::new(cells).style(style)
        });
        let widths = vec![Constraint::Fill(1); table.headers.len() + 1];
        let widget = Table::new(rows, widths)
            .header(
                Row::new(table.headers.clone())
                    .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)),
            )
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} ", table.title)),
            );
        f.render_widget(widget, *part);
    }

    let notes: Vec<Line> = room
        .notes
        .iter()
        .flat_map(|section| {
            std::iter::once(Line::from(Span::styled(
                section.title.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )))
            .chain(section.lines.iter().map(|line| Line::from(line.clone())))
            .chain(std::iter::once(Line::from("")))
        })
        .collect();
    if let Some(part) = parts.last() {
        let notes = Paragraph::new(notes)
            .block(Block::default().borders(Borders::ALL).title(" Notas "))
            .wrap(Wrap { trim: false });
        f.render_widget(notes, *part);
    }
}

fn draw_hub_finished(f: &mut Frame, app: &App, screen: &HubScreen) {
    let session = &screen.session;
    let (status, body, message) = frame_layout(f.area());
    draw_status(
        f,
        status,
        vec![Span::styled(
            " ¡MISIÓN CUMPLIDA! ",
            Style::default().fg(Color::Black).bg(Color::Green),
        )],
    );

    let mut lines = vec![
        Line::from(Span::styled(
            format!("Tiempo final: {}", format_time(session.elapsed())),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!(
            "Errores: {} (+{} s)",
            session.errors(),
            u64::from(session.errors()) * session.penalty_seconds()
        )),
        Line::from(""),
    ];
    for room in session.rooms() {
        let at = session
            .checkpoint(&room.meta.id)
            .map(format_time)
            .unwrap_or_else(|| "--:--".to_string());
        lines.push(Line::from(format!("{:<30} {at}", room.meta.title)));
    }
    let summary = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" Resultados "));
    f.render_widget(summary, body);
    draw_message(f, app, message, "ENTER nueva partida • q salir");
}

fn draw_story(f: &mut Frame, app: &App, screen: &StoryScreen) {
    let game = &screen.game;
    let (status, body, message) = frame_layout(f.area());

    let time_color = match game.time_left() {
        t if t > 1800 => Color::Green,
        t if t > 600 => Color::Yellow,
        _ => Color::Red,
    };
    draw_status(
        f,
        status,
        vec![
            Span::styled(
                format!(" {} ", game.script().meta.title),
                Style::default().fg(Color::White).bg(Color::DarkGray),
            ),
            Span::styled(
                format!(
                    " {} {} ",
                    if game.is_clock_running() { "⏳" } else { "⌛" },
                    format_time(game.time_left())
                ),
                Style::default().fg(time_color).add_modifier(Modifier::BOLD),
            ),
        ],
    );

    let help = match game.stage() {
        Stage::Obstacles => match game.course().obstacle {
            Obstacle::Jump => "ESPACIO saltar",
            Obstacle::Climb => "a / d escalar",
            Obstacle::Bridge => "←/→ cruzar el puente",
        },
        Stage::Laboratory => "F1 lupa • F2-F4 tubos • escribe la fórmula y ENTER",
        Stage::ControlRoom => "flechas mover • ENTER elegir casilla • g modo guía",
        Stage::Quiz => "a-d responder",
        Stage::Decision => "t terminar con victoria • r arriesgar",
        Stage::Bonus => "escribe el número y ENTER",
        Stage::Intro | Stage::Victory | Stage::Defeat => "ENTER volver a empezar • q salir",
    };

    match game.stage() {
        Stage::Obstacles => draw_obstacles(f, screen, body),
        Stage::Laboratory => draw_laboratory(f, screen, body),
        Stage::ControlRoom => draw_control(f, screen, body),
        Stage::Quiz => draw_quiz(f, screen, body),
        Stage::Decision => draw_text(f, body, " Decisión ", &game.script().bonus.offer),
        Stage::Bonus => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(3)])
                .split(body);
            draw_text(f, parts[0], " Pregunta final ", &game.script().bonus.prompt);
            draw_input(f, screen, parts[1], " Respuesta ");
        }
        Stage::Victory => draw_text(f, body, " ¡VICTORIA! ", &game.script().endings.victory),
        Stage::Defeat => draw_text(f, body, " DERROTA ", &game.script().endings.defeat),
        Stage::Intro => {}
    }
    draw_message(f, app, message, help);
}

fn draw_text(f: &mut Frame, area: Rect, title: &str, text: &str) {
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}

fn draw_input(f: &mut Frame, screen: &StoryScreen, area: Rect, title: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(&screen.input, inner);
}

fn draw_obstacles(f: &mut Frame, screen: &StoryScreen, area: Rect) {
    let script = &screen.game.script().obstacles;
    let course = screen.game.course();
    let done = Style::default().fg(Color::Green);
    let pending = Style::default().fg(Color::DarkGray);
    let current = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let stage_style = |obstacle: Obstacle| match (course.obstacle, obstacle) {
        (now, o) if now == o => current,
        (Obstacle::Climb, Obstacle::Jump) | (Obstacle::Bridge, _) => done,
        _ => pending,
    };

    let climb: Vec<Span> = script
        .climb_keys()
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let style = if i < course.climb_progress || course.obstacle == Obstacle::Bridge {
                done
            } else {
                pending
            };
            Span::styled(format!(" {key} "), style)
        })
        .collect();
    let bridge: Vec<Span> = (0..script.bridge_sequence.len())
        .map(|i| match course.bridge.get(i) {
            Some(direction) => Span::styled(format!(" {direction} "), done),
            None => Span::styled(" · ", pending),
        })
        .collect();

    let lines = vec![
        Line::from(Span::styled(script.jump_prompt.clone(), stage_style(Obstacle::Jump))),
        Line::from(""),
        Line::from(Span::styled("Obstáculo 2: Muro de escalada", stage_style(Obstacle::Climb))),
        Line::from(climb),
        Line::from(""),
        Line::from(Span::styled("Obstáculo 3: Puente inestable", stage_style(Obstacle::Bridge))),
        Line::from(bridge),
    ];
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", script.title)))
        .wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}

fn draw_laboratory(f: &mut Frame, screen: &StoryScreen, area: Rect) {
    let game = &screen.game;
    let script = &game.script().laboratory;
    let lab = game.lab();

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(3)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(parts[0]);

    let documents: Vec<Line> = script
        .documents
        .iter()
        .map(|doc| {
            let text = format!("{}: {}", doc.label, doc.text);
            if lab.loupe && doc.starred {
                Line::from(Span::styled(
                    format!("★ {text}"),
                    Style::default().fg(Color::Black).bg(Color::Yellow),
                ))
            } else {
                Line::from(format!("  {text}"))
            }
        })
        .collect();
    let documents = Paragraph::new(documents).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", script.title)),
    );
    f.render_widget(documents, columns[0]);

    let mut tubes: Vec<Line> = script
        .tubes
        .iter()
        .enumerate()
        .map(|(i, tube)| {
            if lab.inspected_tubes.contains(&i) {
                Line::from(Span::styled(format!("F{} ✓ {tube}", i + 2), Style::default().fg(Color::Green)))
            } else {
                Line::from(Span::styled(format!("F{} ? tubo {}", i + 2, i + 1), Style::default().fg(Color::DarkGray)))
            }
        })
        .collect();
    if lab.loupe {
        tubes.push(Line::from(""));
        tubes.push(Line::from(Span::styled(script.hint.clone(), Style::default().fg(Color::Cyan))));
    }
    let tubes = Paragraph::new(tubes)
        .block(Block::default().borders(Borders::ALL).title(" Tubos "))
        .wrap(Wrap { trim: false });
    f.render_widget(tubes, columns[1]);

    draw_input(f, screen, parts[1], " Fórmula ");
}

fn draw_control(f: &mut Frame, screen: &StoryScreen, area: Rect) {
    let game = &screen.game;
    let script = &game.script().control;
    let control = game.control();

    let mut lines = vec![Line::from(format!(
        "Llaves: {}/{}{}",
        control.collected.len(),
        script.keys.len(),
        if control.trap_sprung { "   ¡Trampa activada!" } else { "" }
    ))];
    lines.push(Line::from(""));

    let header: String = (1..=script.grid_size).map(|c| format!(" {c} ")).collect();
    lines.push(Line::from(format!("   {header}")));
    for row in 0..script.grid_size {
        let mut spans = vec![Span::raw(format!(" {} ", (b'A' + row) as char))];
        for col in 0..script.grid_size {
            let cell = Cell::new(row, col);
            let (mark, mut style) = if control.collected.contains(&cell) {
                ("◆", Style::default().fg(Color::Green))
            } else if control.guide_mode && script.keys.contains(&cell) {
                ("◇", Style::default().fg(Color::Cyan))
            } else if control.guide_mode && script.traps.contains(&cell) {
                ("✖", Style::default().fg(Color::Red))
            } else {
                ("·", Style::default().fg(Color::DarkGray))
            };
            if cell == screen.cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(format!("[{mark}]"), style));
        }
        lines.push(Line::from(spans));
    }

    let title = if control.guide_mode {
        format!(" {} (modo guía) ", script.title)
    } else {
        format!(" {} ", script.title)
    };
    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn draw_quiz(f: &mut Frame, screen: &StoryScreen, area: Rect) {
    let game = &screen.game;
    let Some(question) = game.current_question() else {
        return;
    };
    let progress = game.quiz();

    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                "Pregunta {}/{}  •  aciertos {}  •  se necesitan {}",
                progress.index + 1,
                game.script().quiz.len(),
                progress.correct,
                game.quiz_threshold()
            ),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        Line::from(Span::styled(
            question.prompt.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for (i, option) in question.options.iter().enumerate() {
        let letter = (b'a' + i as u8) as char;
        lines.push(Line::from(format!("  {letter}) {option}")));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Cada error divide el tiempo restante por dos.",
        Style::default().fg(Color::Red),
    )));

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Quiz final "))
        .wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}
