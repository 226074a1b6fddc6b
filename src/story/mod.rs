//! Linear story: one countdown, one stage at a time.
//!
//! Every wrong move costs a fixed slice of the countdown, except in the quiz
//! where a wrong answer halves whatever is left. The countdown reaching zero
//! ends the game from any stage.

pub mod script;

use std::fmt;
use std::time::Instant;

use tracing::info;

use crate::clock::Ticker;
use crate::config::StorySettings;
use crate::error::GameError;

pub use script::{builtin_script, load_script, Cell, Direction, Question, StoryScript};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Intro,
    Obstacles,
    Laboratory,
    ControlRoom,
    Quiz,
    /// Quiz passed: bank the win or risk it on the bonus question.
    Decision,
    Bonus,
    Victory,
    Defeat,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Victory | Stage::Defeat)
    }

    /// The countdown only runs in active stages.
    pub fn is_active(self) -> bool {
        !matches!(self, Stage::Intro | Stage::Victory | Stage::Defeat)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Intro => "intro",
            Stage::Obstacles => "obstacles",
            Stage::Laboratory => "laboratory",
            Stage::ControlRoom => "control room",
            Stage::Quiz => "quiz",
            Stage::Decision => "decision",
            Stage::Bonus => "bonus",
            Stage::Victory => "victory",
            Stage::Defeat => "defeat",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Progress,
    Wrong { seconds_lost: u64 },
    /// Nothing to do, e.g. a key already collected.
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Obstacle {
    #[default]
    Jump,
    Climb,
    Bridge,
}

#[derive(Debug, Clone, Default)]
pub struct ObstacleCourse {
    pub obstacle: Obstacle,
    pub climb_progress: usize,
    pub bridge: Vec<Direction>,
}

#[derive(Debug, Clone, Default)]
pub struct Laboratory {
    pub loupe: bool,
    pub inspected_tubes: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ControlRoom {
    pub guide_mode: bool,
    pub collected: Vec<Cell>,
    pub trap_sprung: bool,
}

#[derive(Debug, Clone, Default)]
pub struct QuizProgress {
    pub index: usize,
    pub correct: usize,
    pub errors: usize,
}

#[derive(Debug)]
pub struct StoryGame {
    script: StoryScript,
    settings: StorySettings,
    stage: Stage,
    time_left: u64,
    ticker: Ticker,
    course: ObstacleCourse,
    lab: Laboratory,
    control: ControlRoom,
    quiz: QuizProgress,
}

impl StoryGame {
    pub fn new(script: StoryScript, settings: StorySettings) -> Self {
        StoryGame {
            time_left: settings.time_budget_seconds,
            script,
            settings,
            stage: Stage::Intro,
            ticker: Ticker::default(),
            course: ObstacleCourse::default(),
            lab: Laboratory::default(),
            control: ControlRoom::default(),
            quiz: QuizProgress::default(),
        }
    }

    pub fn start(&mut self, now: Instant) -> Result<(), GameError> {
        self.require(Stage::Intro)?;
        self.ticker.start(now);
        info!(time_left = self.time_left, "story started");
        self.enter(Stage::Obstacles);
        Ok(())
    }

    /// Full reset to the intro, only from victory or defeat.
    pub fn restart(&mut self) -> Result<(), GameError> {
        if !self.stage.is_terminal() {
            return Err(GameError::WrongStage(self.stage));
        }
        self.ticker.stop();
        self.stage = Stage::Intro;
        self.time_left = self.settings.time_budget_seconds;
        self.course = ObstacleCourse::default();
        self.lab = Laboratory::default();
        self.control = ControlRoom::default();
        self.quiz = QuizProgress::default();
        info!("story reset");
        Ok(())
    }

    pub fn tick(&mut self) {
        if !self.stage.is_active() {
            return;
        }
        if self.time_left <= 1 {
            self.time_left = 0;
            info!(stage = %self.stage, "countdown expired");
            self.enter(Stage::Defeat);
        } else {
            self.time_left -= 1;
        }
    }

    pub fn poll(&mut self, now: Instant) {
        for _ in 0..self.ticker.due(now) {
            self.tick();
        }
    }

    pub fn jump(&mut self) -> Result<Outcome, GameError> {
        self.require(Stage::Obstacles)?;
        if self.course.obstacle != Obstacle::Jump {
            return Ok(Outcome::Ignored);
        }
        self.course.obstacle = Obstacle::Climb;
        Ok(Outcome::Progress)
    }

    pub fn climb(&mut self, key: char) -> Result<Outcome, GameError> {
        self.require(Stage::Obstacles)?;
        if self.course.obstacle != Obstacle::Climb {
            return Ok(Outcome::Ignored);
        }
        let sequence = self.script.obstacles.climb_keys();
        if sequence.get(self.course.climb_progress) != Some(&key.to_ascii_uppercase()) {
            self.course.climb_progress = 0;
            return Ok(self.lose_time());
        }
        self.course.climb_progress += 1;
        if self.course.climb_progress >= sequence.len() {
            self.course.obstacle = Obstacle::Bridge;
        }
        Ok(Outcome::Progress)
    }

    pub fn step(&mut self, direction: Direction) -> Result<Outcome, GameError> {
        self.require(Stage::Obstacles)?;
        if self.course.obstacle != Obstacle::Bridge {
            return Ok(Outcome::Ignored);
        }
        let sequence = &self.script.obstacles.bridge_sequence;
        if sequence.get(self.course.bridge.len()) != Some(&direction) {
            self.course.bridge.clear();
            return Ok(self.lose_time());
        }
        self.course.bridge.push(direction);
        if self.course.bridge.len() >= sequence.len() {
            self.enter(Stage::Laboratory);
        }
        Ok(Outcome::Progress)
    }

    pub fn toggle_loupe(&mut self) -> Result<(), GameError> {
        self.require(Stage::Laboratory)?;
        self.lab.loupe = !self.lab.loupe;
        Ok(())
    }

    pub fn inspect_tube(&mut self, tube: usize) -> Result<Outcome, GameError> {
        self.require(Stage::Laboratory)?;
        if tube >= self.script.laboratory.tubes.len() || self.lab.inspected_tubes.contains(&tube) {
            return Ok(Outcome::Ignored);
        }
        self.lab.inspected_tubes.push(tube);
        Ok(Outcome::Progress)
    }

    pub fn submit_formula(&mut self, formula: &str) -> Result<Outcome, GameError> {
        self.require(Stage::Laboratory)?;
        let formula = compact(formula);
        if formula.is_empty() {
            return Err(GameError::MissingAnswer("formula".into()));
        }
        if formula != compact(&self.script.laboratory.formula) {
            return Ok(self.lose_time());
        }
        self.enter(Stage::ControlRoom);
        Ok(Outcome::Progress)
    }

    pub fn toggle_guide(&mut self) -> Result<(), GameError> {
        self.require(Stage::ControlRoom)?;
        self.control.guide_mode = !self.control.guide_mode;
        Ok(())
    }

    pub fn pick_cell(&mut self, cell: Cell) -> Result<Outcome, GameError> {
        self.require(Stage::ControlRoom)?;
        let script = &self.script.control;
        if script.traps.contains(&cell) {
            self.control.trap_sprung = true;
            return Ok(self.lose_time());
        }
        if !script.keys.contains(&cell) || self.control.collected.contains(&cell) {
            return Ok(Outcome::Ignored);
        }
        self.control.collected.push(cell);
        if self.control.collected.len() >= script.keys.len() {
            self.enter(Stage::Quiz);
        }
        Ok(Outcome::Progress)
    }

    pub fn answer_quiz(&mut self, option: usize) -> Result<Outcome, GameError> {
        self.require(Stage::Quiz)?;
        let question = &self.script.quiz[self.quiz.index];
        if option >= question.options.len() {
            return Ok(Outcome::Ignored);
        }

        let outcome = if option == question.correct {
            self.quiz.correct += 1;
            Outcome::Progress
        } else {
            self.quiz.errors += 1;
            let before = self.time_left;
            self.time_left /= 2;
            info!(before, after = self.time_left, "quiz error halves the countdown");
            if self.time_left == 0 {
                self.enter(Stage::Defeat);
                return Ok(Outcome::Wrong {
                    seconds_lost: before,
                });
            }
            Outcome::Wrong {
                seconds_lost: before - self.time_left,
            }
        };

        if self.quiz.index + 1 < self.script.quiz.len() {
            self.quiz.index += 1;
        } else if self.quiz.correct >= self.quiz_threshold() {
            self.enter(Stage::Decision);
        } else {
            info!(correct = self.quiz.correct, "quiz failed");
            self.enter(Stage::Defeat);
        }
        Ok(outcome)
    }

    /// Take the formula now.
    pub fn bank(&mut self) -> Result<(), GameError> {
        self.require(Stage::Decision)?;
        self.enter(Stage::Victory);
        Ok(())
    }

    /// Everything on the bonus question.
    pub fn risk(&mut self) -> Result<(), GameError> {
        self.require(Stage::Decision)?;
        self.enter(Stage::Bonus);
        Ok(())
    }

    pub fn answer_bonus(&mut self, answer: &str) -> Result<Outcome, GameError> {
        self.require(Stage::Bonus)?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(GameError::MissingAnswer("bonus".into()));
        }
        if answer == self.script.bonus.answer.trim() {
            self.enter(Stage::Victory);
            Ok(Outcome::Progress)
        } else {
            self.enter(Stage::Defeat);
            Ok(Outcome::Wrong { seconds_lost: 0 })
        }
    }

    fn lose_time(&mut self) -> Outcome {
        let before = self.time_left;
        self.time_left = self.time_left.saturating_sub(self.settings.penalty_seconds);
        info!(stage = %self.stage, time_left = self.time_left, "penalty applied");
        if self.time_left == 0 {
            self.enter(Stage::Defeat);
        }
        Outcome::Wrong {
            seconds_lost: before - self.time_left,
        }
    }

    fn enter(&mut self, stage: Stage) {
        info!(from = %self.stage, to = %stage, time_left = self.time_left, "stage change");
        self.stage = stage;
        if stage.is_terminal() {
            self.ticker.stop();
        }
    }

    fn require(&self, stage: Stage) -> Result<(), GameError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(GameError::WrongStage(self.stage))
        }
    }

    pub fn quiz_threshold(&self) -> usize {
        self.settings
            .quiz_pass_threshold
            .min(self.script.quiz.len())
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn time_left(&self) -> u64 {
        self.time_left
    }

    pub fn is_clock_running(&self) -> bool {
        self.ticker.is_running()
    }

    pub fn script(&self) -> &StoryScript {
        &self.script
    }

    pub fn course(&self) -> &ObstacleCourse {
        &self.course
    }

    pub fn lab(&self) -> &Laboratory {
        &self.lab
    }

    pub fn control(&self) -> &ControlRoom {
        &self.control
    }

    pub fn quiz(&self) -> &QuizProgress {
        &self.quiz
    }

    pub fn current_question(&self) -> Option<&Question> {
        (self.stage == Stage::Quiz).then(|| &self.script.quiz[self.quiz.index])
    }
}

/// Formulas compare without whitespace: `O2 - Mg - Fe` is `O2-Mg-Fe`.
fn compact(formula: &str) -> String {
    formula.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn game() -> StoryGame {
        let mut game = StoryGame::new(builtin_script().unwrap(), StorySettings::default());
        game.start(Instant::now()).unwrap();
        game
    }

    fn cell(name: &str) -> Cell {
        name.parse().unwrap()
    }

    fn clear_obstacles(game: &mut StoryGame) {
        game.jump().unwrap();
        for key in "ADADAD".chars() {
            assert_eq!(game.climb(key).unwrap(), Outcome::Progress);
        }
        use Direction::{Left, Right};
        for direction in [Left, Left, Right, Right, Left] {
            assert_eq!(game.step(direction).unwrap(), Outcome::Progress);
        }
    }

    fn reach_quiz(game: &mut StoryGame) {
        clear_obstacles(game);
        game.submit_formula("O2-Mg-Fe").unwrap();
        for key in ["B2", "D4", "E1"] {
            game.pick_cell(cell(key)).unwrap();
        }
        assert_eq!(game.stage(), Stage::Quiz);
    }

    #[test]
    fn start_leaves_the_intro_once() {
        let mut game = StoryGame::new(builtin_script().unwrap(), StorySettings::default());
        assert_eq!(game.jump(), Err(GameError::WrongStage(Stage::Intro)));
        game.start(Instant::now()).unwrap();
        assert_eq!(game.stage(), Stage::Obstacles);
        assert!(game.is_clock_running());
        assert_eq!(
            game.start(Instant::now()),
            Err(GameError::WrongStage(Stage::Obstacles))
        );
    }

    #[test]
    fn intro_does_not_count_down() {
        let mut game = StoryGame::new(builtin_script().unwrap(), StorySettings::default());
        game.tick();
        assert_eq!(game.time_left(), 3600);
    }

    #[test]
    fn wrong_climb_key_resets_progress_and_costs_a_minute() {
        let mut game = game();
        game.jump().unwrap();
        game.climb('a').unwrap();
        game.climb('d').unwrap();
        assert_eq!(game.course().climb_progress, 2);

        assert_eq!(game.climb('d').unwrap(), Outcome::Wrong { seconds_lost: 60 });
        assert_eq!(game.course().climb_progress, 0);
        assert_eq!(game.time_left(), 3540);
    }

    #[test]
    fn obstacles_must_be_taken_in_order() {
        let mut game = game();
        assert_eq!(game.climb('a').unwrap(), Outcome::Ignored);
        assert_eq!(game.step(Direction::Left).unwrap(), Outcome::Ignored);
        assert_eq!(game.time_left(), 3600);
    }

    #[test]
    fn wrong_bridge_step_clears_the_buffer() {
        let mut game = game();
        game.jump().unwrap();
        for key in "ADADAD".chars() {
            game.climb(key).unwrap();
        }
        game.step(Direction::Left).unwrap();
        assert_eq!(
            game.step(Direction::Right).unwrap(),
            Outcome::Wrong { seconds_lost: 60 }
        );
        assert!(game.course().bridge.is_empty());
        assert_eq!(game.stage(), Stage::Obstacles);
    }

    #[test]
    fn obstacle_course_leads_to_the_laboratory() {
        let mut game = game();
        clear_obstacles(&mut game);
        assert_eq!(game.stage(), Stage::Laboratory);
        assert_eq!(game.time_left(), 3600);
    }

    #[test]
    fn formula_must_match_the_starred_paper() {
        let mut game = game();
        clear_obstacles(&mut game);
        game.toggle_loupe().unwrap();
        assert!(game.lab().loupe);
        assert_eq!(game.inspect_tube(0).unwrap(), Outcome::Progress);
        assert_eq!(game.inspect_tube(0).unwrap(), Outcome::Ignored);
        assert!(matches!(
            game.submit_formula("  "),
            Err(GameError::MissingAnswer(_))
        ));

        assert_eq!(
            game.submit_formula("H2O-NaCl-CO2").unwrap(),
            Outcome::Wrong { seconds_lost: 60 }
        );
        assert_eq!(game.stage(), Stage::Laboratory);
        game.submit_formula(" O2 - Mg - Fe ").unwrap();
        assert_eq!(game.stage(), Stage::ControlRoom);
    }

    #[test]
    fn traps_cost_time_and_keys_open_the_quiz() {
        let mut game = game();
        clear_obstacles(&mut game);
        game.submit_formula("O2-Mg-Fe").unwrap();

        assert_eq!(game.pick_cell(cell("A3")).unwrap(), Outcome::Wrong { seconds_lost: 60 });
        assert!(game.control().trap_sprung);
        assert_eq!(game.pick_cell(cell("A1")).unwrap(), Outcome::Ignored);
        game.pick_cell(cell("B2")).unwrap();
        assert_eq!(game.pick_cell(cell("B2")).unwrap(), Outcome::Ignored);
        game.pick_cell(cell("D4")).unwrap();
        assert_eq!(game.stage(), Stage::ControlRoom);
        game.pick_cell(cell("E1")).unwrap();
        assert_eq!(game.stage(), Stage::Quiz);
        assert_eq!(game.time_left(), 3540);
    }

    #[test]
    fn perfect_quiz_reaches_the_decision() {
        let mut game = game();
        reach_quiz(&mut game);
        for option in [1, 2, 1, 0] {
            assert_eq!(game.answer_quiz(option).unwrap(), Outcome::Progress);
        }
        assert_eq!(game.quiz().correct, 4);
        assert_eq!(game.stage(), Stage::Decision);
        assert!(game.current_question().is_none());
    }

    #[test]
    fn penalties_then_quiz_error_halve_the_remainder() {
        let mut game = game();
        game.jump().unwrap();
        game.climb('d').unwrap();
        assert_eq!(game.time_left(), 3540);

        reach_quiz(&mut game);
        assert_eq!(
            game.answer_quiz(0).unwrap(),
            Outcome::Wrong { seconds_lost: 1770 }
        );
        assert_eq!(game.time_left(), 1770);
        assert_eq!(game.quiz().errors, 1);
        assert_eq!(game.quiz().index, 1);
    }

    #[test]
    fn three_of_four_passes_two_does_not() {
        let mut passing = game();
        reach_quiz(&mut passing);
        for option in [1, 2, 1, 3] {
            passing.answer_quiz(option).unwrap();
        }
        assert_eq!(passing.stage(), Stage::Decision);

        let mut failing = game();
        reach_quiz(&mut failing);
        for option in [1, 2, 0, 3] {
            failing.answer_quiz(option).unwrap();
        }
        assert_eq!(failing.quiz().correct, 2);
        assert_eq!(failing.stage(), Stage::Defeat);
        assert!(!failing.is_clock_running());
    }

    #[test]
    fn banking_wins_immediately() {
        let mut game = game();
        reach_quiz(&mut game);
        for option in [1, 2, 1, 0] {
            game.answer_quiz(option).unwrap();
        }
        game.bank().unwrap();
        assert_eq!(game.stage(), Stage::Victory);
        assert!(!game.is_clock_running());
    }

    fn reach_bonus() -> StoryGame {
        let mut game = game();
        reach_quiz(&mut game);
        for option in [1, 2, 1, 0] {
            game.answer_quiz(option).unwrap();
        }
        game.risk().unwrap();
        game
    }

    #[test]
    fn bonus_is_all_or_nothing() {
        let mut winner = reach_bonus();
        assert!(matches!(winner.answer_bonus(""), Err(GameError::MissingAnswer(_))));
        winner.answer_bonus(" 174 ").unwrap();
        assert_eq!(winner.stage(), Stage::Victory);

        let mut loser = reach_bonus();
        assert_eq!(
            loser.answer_bonus("175").unwrap(),
            Outcome::Wrong { seconds_lost: 0 }
        );
        assert_eq!(loser.stage(), Stage::Defeat);
    }

    #[test]
    fn bonus_needs_the_exact_digits() {
        for answer in ["+174", "0174", "00174", "174.0", "174 kg"] {
            let mut game = reach_bonus();
            game.answer_bonus(answer).unwrap();
            assert_eq!(game.stage(), Stage::Defeat, "{answer:?} should lose");
        }
    }

    #[test]
    fn quiz_error_halving_to_zero_is_a_defeat() {
        let settings = StorySettings {
            time_budget_seconds: 1,
            ..StorySettings::default()
        };
        let mut game = StoryGame::new(builtin_script().unwrap(), settings);
        game.start(Instant::now()).unwrap();
        game.stage = Stage::Quiz;

        assert_eq!(game.answer_quiz(0).unwrap(), Outcome::Wrong { seconds_lost: 1 });
        assert_eq!(game.time_left(), 0);
        assert_eq!(game.stage(), Stage::Defeat);
        assert!(!game.is_clock_running());
        assert_eq!(game.quiz().index, 0);
    }

    #[test]
    fn countdown_expiry_forces_defeat_from_any_stage() {
        let settings = StorySettings {
            time_budget_seconds: 3,
            ..StorySettings::default()
        };
        let mut game = StoryGame::new(builtin_script().unwrap(), settings);
        let start = Instant::now();
        game.start(start).unwrap();
        game.jump().unwrap();

        game.poll(start + Duration::from_secs(2));
        assert_eq!(game.time_left(), 1);
        assert_eq!(game.stage(), Stage::Obstacles);
        game.tick();
        assert_eq!(game.time_left(), 0);
        assert_eq!(game.stage(), Stage::Defeat);
        assert!(!game.is_clock_running());

        game.tick();
        assert_eq!(game.time_left(), 0);
        assert_eq!(game.climb('a'), Err(GameError::WrongStage(Stage::Defeat)));
    }

    #[test]
    fn penalty_to_zero_is_a_defeat() {
        let settings = StorySettings {
            time_budget_seconds: 50,
            ..StorySettings::default()
        };
        let mut game = StoryGame::new(builtin_script().unwrap(), settings);
        game.start(Instant::now()).unwrap();
        game.jump().unwrap();
        assert_eq!(game.climb('d').unwrap(), Outcome::Wrong { seconds_lost: 50 });
        assert_eq!(game.time_left(), 0);
        assert_eq!(game.stage(), Stage::Defeat);
    }

    #[test]
    fn restart_only_from_the_end() {
        let mut game = game();
        assert_eq!(game.restart(), Err(GameError::WrongStage(Stage::Obstacles)));

        game.jump().unwrap();
        game.climb('d').unwrap();
        game.enter(Stage::Defeat);
        game.restart().unwrap();

        assert_eq!(game.stage(), Stage::Intro);
        assert_eq!(game.time_left(), 3600);
        assert_eq!(game.course().obstacle, Obstacle::Jump);
        assert!(!game.is_clock_running());
    }
}
