//! Key handling for both variants.
//!
//! `App` owns the session by value and translates key presses into session
//! operations. Drawing lives in `ui`; nothing here touches the terminal.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::{Color, Modifier, Style};
use std::time::Instant;
use tracing::debug;
use tui_textarea::TextArea;

use crate::error::GameError;
use crate::hub::{HubSession, HubView};
use crate::puzzle::{Answers, AttemptStatus, InputKind, Room, SubmitOutcome};
use crate::story::{Cell, Direction, Outcome, Stage, StoryGame};

/// One line of feedback for the message panel.
pub struct Notice {
    pub text: String,
    pub style: Style,
}

impl Notice {
    fn new(text: impl Into<String>, color: Color) -> Self {
        Notice {
            text: text.into(),
            style: Style::default().fg(color),
        }
    }

    fn info(text: impl Into<String>) -> Self {
        Notice::new(text, Color::Yellow)
    }

    fn success(text: impl Into<String>) -> Self {
        let mut notice = Notice::new(text, Color::Green);
        notice.style = notice.style.add_modifier(Modifier::BOLD);
        notice
    }

    fn wrong(text: impl Into<String>) -> Self {
        Notice::new(text, Color::Red)
    }

    fn rejected(err: GameError) -> Self {
        Notice::new(err.to_string(), Color::Magenta)
    }
}

pub enum FormInput {
    Choice {
        options: Vec<String>,
        selected: Option<usize>,
    },
    Text(TextArea<'static>),
}

pub struct FormField {
    pub name: String,
    pub label: String,
    pub input: FormInput,
}

/// The answer fields of one room, as the player is filling them in.
pub struct AnswerForm {
    pub fields: Vec<FormField>,
    pub focus: usize,
}

impl AnswerForm {
    pub fn new(room: &Room) -> Self {
        let fields = room
            .challenge
            .fields
            .iter()
            .map(|field| {
                let input = match field.input {
                    InputKind::Choice => FormInput::Choice {
                        options: field.options.clone(),
                        selected: None,
                    },
                    InputKind::Text | InputKind::Number => {
                        FormInput::Text(text_input(&field.placeholder))
                    }
                };
                FormField {
                    name: field.name.clone(),
                    label: field.label.clone(),
                    input,
                }
            })
            .collect();
        AnswerForm { fields, focus: 0 }
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn focus_prev(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    /// Arrows cycle a choice, a letter jumps to the option starting with
    /// it. Text fields take the key as typed.
    pub fn input(&mut self, key: KeyEvent) {
        let Some(field) = self.fields.get_mut(self.focus) else {
            return;
        };
        match &mut field.input {
            FormInput::Choice { options, selected } => {
                let count = options.len();
                if count == 0 {
                    return;
                }
                *selected = match (key.code, *selected) {
                    (KeyCode::Right | KeyCode::Down, None) => Some(0),
                    (KeyCode::Right | KeyCode::Down, Some(i)) => Some((i + 1) % count),
                    (KeyCode::Left | KeyCode::Up, None) => Some(count - 1),
                    (KeyCode::Left | KeyCode::Up, Some(i)) => Some((i + count - 1) % count),
                    (KeyCode::Char(c), current) => options
                        .iter()
                        .position(|option| {
                            option
                                .chars()
                                .next()
                                .is_some_and(|first| first.eq_ignore_ascii_case(&c))
                        })
                        .or(current),
                    (_, current) => current,
                };
            }
            FormInput::Text(area) => {
                area.input(key);
            }
        }
    }

    pub fn answers(&self) -> Answers {
        self.fields
            .iter()
            .filter_map(|field| {
                let value = match &field.input {
                    FormInput::Choice { options, selected } => {
                        selected.and_then(|i| options.get(i)).cloned()?
                    }
                    FormInput::Text(area) => area.lines().join(""),
                };
                Some((field.name.clone(), value))
            })
            .collect()
    }

    fn focused_is_text(&self) -> bool {
        matches!(
            self.fields.get(self.focus).map(|field| &field.input),
            Some(FormInput::Text(_))
        )
    }
}

fn text_input(placeholder: &str) -> TextArea<'static> {
    let mut area = TextArea::default();
    area.set_placeholder_text(placeholder.to_string());
    area.set_cursor_line_style(Style::default());
    area
}

pub struct HubScreen {
    pub session: HubSession,
    /// Lobby cursor.
    pub selected: usize,
    pub forms: Vec<AnswerForm>,
    pub show_reference: bool,
}

impl HubScreen {
    pub fn new(session: HubSession) -> Self {
        let forms = session.rooms().iter().map(AnswerForm::new).collect();
        HubScreen {
            session,
            selected: 0,
            forms,
            show_reference: false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Option<Notice> {
        if !self.session.is_started() {
            if key.code != KeyCode::Enter {
                return None;
            }
            self.session.start_session(now);
            self.selected = 0;
            self.forms = self.session.rooms().iter().map(AnswerForm::new).collect();
            return Some(Notice::info("Cronómetro en marcha. Elige la sala desbloqueada."));
        }
        if self.session.is_finished() {
            if key.code != KeyCode::Enter {
                return None;
            }
            self.session.restart();
            return Some(Notice::info("Nueva partida. Pulsa ENTER para empezar."));
        }
        match self.session.view() {
            HubView::Lobby => self.lobby_key(key),
            HubView::Room(index) => self.room_key(index, key),
        }
    }

    fn lobby_key(&mut self, key: KeyEvent) -> Option<Notice> {
        let count = self.session.rooms().len();
        match key.code {
            KeyCode::Right | KeyCode::Down => {
                self.selected = (self.selected + 1) % count;
                None
            }
            KeyCode::Left | KeyCode::Up => {
                self.selected = (self.selected + count - 1) % count;
                None
            }
            KeyCode::Enter => {
                let room = &self.session.rooms()[self.selected];
                let id = room.meta.id.clone();
                let title = room.meta.title.clone();
                if let Err(err) = self.session.enter_room(&id) {
                    return Some(Notice::rejected(err));
                }
                let fresh = self
                    .session
                    .attempt(self.selected)
                    .is_some_and(|attempt| attempt.status() == AttemptStatus::Idle);
                if fresh {
                    self.forms[self.selected] = AnswerForm::new(&self.session.rooms()[self.selected]);
                }
                self.show_reference = false;
                Some(Notice::info(format!("{title}. Pulsa ENTER para comenzar.")))
            }
            _ => None,
        }
    }

    fn room_key(&mut self, index: usize, key: KeyEvent) -> Option<Notice> {
        match key.code {
            KeyCode::Esc => {
                self.session.exit_to_hub();
                return Some(Notice::info("De vuelta en el hub."));
            }
            KeyCode::F(1) => {
                self.show_reference = !self.show_reference;
                return None;
            }
            _ => {}
        }

        let status = self.session.attempt(index)?.status();
        match (status, key.code) {
            (AttemptStatus::Idle, KeyCode::Enter) => match self.session.start_attempt() {
                Ok(()) => Some(Notice::info("Completa los campos y pulsa ENTER para validar.")),
                Err(err) => Some(Notice::rejected(err)),
            },
            (AttemptStatus::Active, KeyCode::Tab) => {
                self.forms[index].focus_next();
                None
            }
            (AttemptStatus::Active, KeyCode::BackTab) => {
                self.forms[index].focus_prev();
                None
            }
            (AttemptStatus::Active, KeyCode::Enter) => self.submit(index),
            (AttemptStatus::Active, _) => {
                self.forms[index].input(key);
                None
            }
            (AttemptStatus::Failed, KeyCode::Char('r')) => {
                if let Err(err) = self.session.reset_attempt() {
                    return Some(Notice::rejected(err));
                }
                self.forms[index] = AnswerForm::new(&self.session.rooms()[index]);
                Some(Notice::info("Intento reiniciado. Pulsa ENTER para comenzar."))
            }
            _ => None,
        }
    }

    fn submit(&mut self, index: usize) -> Option<Notice> {
        let answers = self.forms[index].answers();
        let notice = match self.session.submit(answers) {
            Ok(SubmitOutcome::Solved) => {
                Notice::success(self.session.rooms()[index].narrative.success.clone())
            }
            Ok(SubmitOutcome::Wrong { exhausted, .. }) => {
                let room = &self.session.rooms()[index];
                let attempt = self.session.attempt(index)?;
                if exhausted {
                    Notice::wrong(format!(
                        "{} Pulsa r para reintentar.",
                        attempt.game_over_message(room)
                    ))
                } else {
                    Notice::wrong(attempt.feedback().unwrap_or_default().to_string())
                }
            }
            Err(err) => Notice::rejected(err),
        };
        Some(notice)
    }

    /// Text fields swallow letters, so `q` only quits elsewhere.
    fn captures_text(&self) -> bool {
        match self.session.view() {
            HubView::Room(index) => {
                self.session
                    .attempt(index)
                    .is_some_and(|attempt| attempt.status() == AttemptStatus::Active)
                    && self.forms[index].focused_is_text()
            }
            HubView::Lobby => false,
        }
    }
}

pub struct StoryScreen {
    pub game: StoryGame,
    /// Formula in the laboratory, number on the bonus question.
    pub input: TextArea<'static>,
    pub cursor: Cell,
}

impl StoryScreen {
    pub fn new(game: StoryGame) -> Self {
        StoryScreen {
            game,
            input: text_input(""),
            cursor: Cell::new(0, 0),
        }
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Option<Notice> {
        let stage = self.game.stage();
        let result = match (stage, key.code) {
            (Stage::Intro, KeyCode::Enter) => self.game.start(now).map(|()| {
                Notice::info(self.game.script().obstacles.jump_prompt.clone())
            }),
            (Stage::Obstacles, KeyCode::Char(' ')) => self.game.jump().map(|outcome| {
                self.notice(outcome, "¡Salto superado! Ahora escalad: A, D, A, D...")
            }),
            (Stage::Obstacles, KeyCode::Char(c @ ('a' | 'd' | 'A' | 'D'))) => {
                self.game.climb(c).map(|outcome| self.notice(outcome, "Buen agarre."))
            }
            (Stage::Obstacles, KeyCode::Left) => self
                .game
                .step(Direction::Left)
                .map(|outcome| self.notice(outcome, "Paso firme.")),
            (Stage::Obstacles, KeyCode::Right) => self
                .game
                .step(Direction::Right)
                .map(|outcome| self.notice(outcome, "Paso firme.")),

            (Stage::Laboratory, KeyCode::F(1)) => self.game.toggle_loupe().map(|()| {
                Notice::info(if self.game.lab().loupe {
                    "Lupa activada."
                } else {
                    "Lupa guardada."
                })
            }),
            (Stage::Laboratory, KeyCode::F(n @ 2..=4)) => {
                let tube = usize::from(n - 2);
                self.game.inspect_tube(tube).map(|outcome| {
                    let name = self.game.script().laboratory.tubes.get(tube);
                    match (outcome, name) {
                        (Outcome::Progress, Some(name)) => {
                            Notice::info(format!("Tubo analizado: {name}"))
                        }
                        _ => Notice::info("Ese tubo ya está analizado."),
                    }
                })
            }
            (Stage::Laboratory, KeyCode::Enter) => {
                let formula = self.input.lines().join("");
                self.game.submit_formula(&formula).map(|outcome| {
                    self.input = text_input("");
                    self.notice(outcome, "¡Fórmula correcta! La puerta de la sala de control se abre.")
                })
            }
            (Stage::Laboratory, _) => {
                self.input.input(key);
                return None;
            }

            (Stage::ControlRoom, KeyCode::Char('g')) => self.game.toggle_guide().map(|()| {
                Notice::info(if self.game.control().guide_mode {
                    "Modo guía: uno describe, el resto busca."
                } else {
                    "Modo guía desactivado."
                })
            }),
            (Stage::ControlRoom, KeyCode::Up | KeyCode::Down | KeyCode::Left | KeyCode::Right) => {
                self.move_cursor(key.code);
                return None;
            }
            (Stage::ControlRoom, KeyCode::Enter) => {
                let cell = self.cursor;
                self.game
                    .pick_cell(cell)
                    .map(|outcome| self.notice(outcome, format!("¡Llave encontrada en {cell}!")))
            }

            (Stage::Quiz, KeyCode::Char(c @ 'a'..='z')) => {
                let option = usize::from(c as u8 - b'a');
                self.game
                    .answer_quiz(option)
                    .map(|outcome| self.notice(outcome, "¡Correcto!"))
            }

            (Stage::Decision, KeyCode::Char('t')) => self
                .game
                .bank()
                .map(|()| Notice::success(self.game.script().endings.victory.clone())),
            (Stage::Decision, KeyCode::Char('r')) => self
                .game
                .risk()
                .map(|()| Notice::info(self.game.script().bonus.prompt.clone())),

            (Stage::Bonus, KeyCode::Enter) => {
                let answer = self.input.lines().join("");
                self.game.answer_bonus(&answer).map(|outcome| {
                    self.input = text_input("");
                    self.notice(outcome, "¡Respuesta exacta!")
                })
            }
            (Stage::Bonus, _) => {
                self.input.input(key);
                return None;
            }

            (Stage::Victory | Stage::Defeat, KeyCode::Enter) => self.game.restart().map(|()| {
                self.cursor = Cell::new(0, 0);
                Notice::info("Pulsa ENTER para empezar de nuevo.")
            }),
            _ => return None,
        };

        Some(match result {
            Ok(notice) => self.ending_over(stage).unwrap_or(notice),
            Err(err) => Notice::rejected(err),
        })
    }

    /// The ending text wins over the per-action notice once the game ends.
    fn ending_over(&self, before: Stage) -> Option<Notice> {
        let endings = &self.game.script().endings;
        match self.game.stage() {
            stage if stage == before => None,
            Stage::Victory => Some(Notice::success(endings.victory.clone())),
            Stage::Defeat => Some(Notice::wrong(endings.defeat.clone())),
            _ => None,
        }
    }

    fn notice(&self, outcome: Outcome, progress: impl Into<String>) -> Notice {
        match outcome {
            Outcome::Progress => Notice::success(progress),
            Outcome::Wrong { seconds_lost } => Notice::wrong(format!(
                "¡Error! -{seconds_lost} s. Quedan {}.",
                crate::clock::format_time(self.game.time_left())
            )),
            Outcome::Ignored => Notice::new("Nada que hacer aquí.", Color::DarkGray),
        }
    }

    fn move_cursor(&mut self, code: KeyCode) {
        let last = self.game.script().control.grid_size.saturating_sub(1);
        let Cell { row, col } = self.cursor;
        self.cursor = match code {
            KeyCode::Up => Cell::new(row.saturating_sub(1), col),
            KeyCode::Down => Cell::new((row + 1).min(last), col),
            KeyCode::Left => Cell::new(row, col.saturating_sub(1)),
            KeyCode::Right => Cell::new(row, (col + 1).min(last)),
            _ => self.cursor,
        };
    }

    fn captures_text(&self) -> bool {
        matches!(self.game.stage(), Stage::Laboratory | Stage::Bonus)
    }
}

pub enum Mode {
    Hub(HubScreen),
    Story(StoryScreen),
}

pub struct App {
    pub mode: Mode,
    pub message: String,
    pub message_style: Style,
    pub running: bool,
}

impl App {
    pub fn hub(session: HubSession) -> Self {
        App::with_mode(Mode::Hub(HubScreen::new(session)))
    }

    pub fn story(game: StoryGame) -> Self {
        App::with_mode(Mode::Story(StoryScreen::new(game)))
    }

    fn with_mode(mode: Mode) -> Self {
        App {
            mode,
            message: String::from("Pulsa ENTER para empezar."),
            message_style: Style::default().fg(Color::Yellow),
            running: true,
        }
    }

    /// Advances whichever clock is running and reports what the clock
    /// itself caused: a delayed room completion or the countdown running out.
    pub fn poll(&mut self, now: Instant) {
        let notice = match &mut self.mode {
            Mode::Hub(screen) => {
                let before = screen.session.completed_rooms().len();
                screen.session.poll(now);
                let session = &screen.session;
                if session.completed_rooms().len() == before {
                    None
                } else if session.is_finished() {
                    Some(Notice::success(format!(
                        "¡Misión cumplida! Tiempo final {}.",
                        crate::clock::format_time(session.elapsed())
                    )))
                } else {
                    Some(Notice::success("Sala completada. La siguiente sala está desbloqueada."))
                }
            }
            Mode::Story(screen) => {
                let before = screen.game.stage();
                screen.game.poll(now);
                screen.ending_over(before)
            }
        };
        if let Some(notice) = notice {
            self.show(notice);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.running = false;
            return;
        }
        let captures_text = match &self.mode {
            Mode::Hub(screen) => screen.captures_text(),
            Mode::Story(screen) => screen.captures_text(),
        };
        if key.code == KeyCode::Char('q') && !captures_text {
            self.running = false;
            return;
        }

        let notice = match &mut self.mode {
            Mode::Hub(screen) => screen.handle_key(key, now),
            Mode::Story(screen) => screen.handle_key(key, now),
        };
        if let Some(notice) = notice {
            debug!(text = %notice.text, "notice");
            self.show(notice);
        }
    }

    fn show(&mut self, notice: Notice) {
        self.message = notice.text;
        self.message_style = notice.style;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HubSettings, StorySettings};
    use crate::puzzle::builtin_rooms;
    use crate::story::builtin_script;

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), Instant::now());
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn hub_app() -> App {
        let session = HubSession::new(builtin_rooms().unwrap(), HubSettings::default()).unwrap();
        App::hub(session)
    }

    fn hub(app: &App) -> &HubScreen {
        match &app.mode {
            Mode::Hub(screen) => screen,
            Mode::Story(_) => panic!("not a hub app"),
        }
    }

    fn story(app: &App) -> &StoryScreen {
        match &app.mode {
            Mode::Story(screen) => screen,
            Mode::Hub(_) => panic!("not a story app"),
        }
    }

    #[test]
    fn choice_field_cycles_and_jumps_by_letter() {
        let rooms = builtin_rooms().unwrap();
        let mut form = AnswerForm::new(&rooms[0]);
        assert!(form.answers().get("incorrect_box").is_none());

        form.input(KeyEvent::new(KeyCode::Right, KeyModifiers::NONE));
        assert_eq!(form.answers()["incorrect_box"], "A");
        form.input(KeyEvent::new(KeyCode::Left, KeyModifiers::NONE));
        assert_eq!(form.answers()["incorrect_box"], "D");
        form.input(KeyEvent::new(KeyCode::Char('b'), KeyModifiers::NONE));
        assert_eq!(form.answers()["incorrect_box"], "B");
    }

    #[test]
    fn focus_wraps_around_the_form() {
        let rooms = builtin_rooms().unwrap();
        let mut form = AnswerForm::new(&rooms[1]);
        form.focus_prev();
        assert_eq!(form.focus, 2);
        form.focus_next();
        assert_eq!(form.focus, 0);
    }

    #[test]
    fn hub_room_can_be_solved_from_the_keyboard() {
        let mut app = hub_app();
        press(&mut app, KeyCode::Enter);
        assert!(hub(&app).session.is_started());

        press(&mut app, KeyCode::Enter);
        assert_eq!(hub(&app).session.view(), HubView::Room(0));
        press(&mut app, KeyCode::Enter);

        type_text(&mut app, "d");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "3,75");
        press(&mut app, KeyCode::Enter);

        let attempt = hub(&app).session.attempt(0).unwrap();
        assert_eq!(attempt.status(), AttemptStatus::Solved);
        assert_eq!(app.message_style.fg, Some(Color::Green));
    }

    #[test]
    fn q_types_into_text_fields_but_quits_elsewhere() {
        let mut app = hub_app();
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.running);

        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.running);
    }

    #[test]
    fn locked_room_is_reported() {
        let mut app = hub_app();
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);
        assert_eq!(hub(&app).session.view(), HubView::Lobby);
        assert_eq!(app.message_style.fg, Some(Color::Magenta));
    }

    #[test]
    fn story_obstacles_from_the_keyboard() {
        let game = StoryGame::new(builtin_script().unwrap(), StorySettings::default());
        let mut app = App::story(game);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char(' '));
        type_text(&mut app, "adadad");
        for code in [KeyCode::Left, KeyCode::Left, KeyCode::Right, KeyCode::Right, KeyCode::Left] {
            press(&mut app, code);
        }
        assert_eq!(story(&app).game.stage(), Stage::Laboratory);

        type_text(&mut app, "O2-Mg-Fe");
        press(&mut app, KeyCode::Enter);
        assert_eq!(story(&app).game.stage(), Stage::ControlRoom);
        assert_eq!(story(&app).game.time_left(), 3600);
    }

    #[test]
    fn grid_cursor_stays_on_the_board() {
        let game = StoryGame::new(builtin_script().unwrap(), StorySettings::default());
        let mut screen = StoryScreen::new(game);
        screen.move_cursor(KeyCode::Up);
        screen.move_cursor(KeyCode::Left);
        assert_eq!(screen.cursor, Cell::new(0, 0));
        for _ in 0..10 {
            screen.move_cursor(KeyCode::Down);
        }
        assert_eq!(screen.cursor, Cell::new(4, 0));
    }
}
