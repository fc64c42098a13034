use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use lift_core::confirm::ConfirmationRequest;
use lift_core::reorder::{CardBounds, PointerTarget};
use lift_core::timer::{TickOutcome, TickSource};
use lift_core::*;
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_USER: &str = "local@liftlog";
const CARD_HEIGHT: f64 = 100.0;

#[derive(Parser)]
#[command(name = "liftlog")]
#[command(about = "Weightlifting session logger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this user
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSON-lines script of session intents against an in-memory backend
    Replay {
        script: PathBuf,

        /// JSON file seeding the backend (user id -> records)
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Session date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Count down a rest period
    Rest {
        /// Length in seconds (defaults to the configured rest)
        seconds: Option<u32>,
    },

    /// Print the workout records a script would save, without saving
    Payload {
        script: PathBuf,

        /// Session date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

/// One line of a replay script. Exercises are addressed by zero-based
/// position, sets by their one-based sequence.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Intent {
    AddExercise {
        name: String,
    },
    AddSet {
        exercise: usize,
    },
    CopyLastSet {
        exercise: usize,
    },
    UpdateSet {
        exercise: usize,
        set: usize,
        weight: Option<f64>,
        unit: Option<Unit>,
        reps: Option<u32>,
    },
    DeleteSet {
        exercise: usize,
        set: usize,
    },
    DeleteExercise {
        exercise: usize,
    },
    SetNote {
        exercise: usize,
        note: String,
    },
    Drag {
        from: usize,
        to: usize,
    },
    Rest {
        seconds: Option<u32>,
    },
    ExtendRest {
        seconds: Option<i64>,
    },
    Tick {
        count: Option<u32>,
    },
    Save,
}

impl Intent {
    fn name(&self) -> &'static str {
        match self {
            Intent::AddExercise { .. } => "add_exercise",
            Intent::AddSet { .. } => "add_set",
            Intent::CopyLastSet { .. } => "copy_last_set",
            Intent::UpdateSet { .. } => "update_set",
            Intent::DeleteSet { .. } => "delete_set",
            Intent::DeleteExercise { .. } => "delete_exercise",
            Intent::SetNote { .. } => "set_note",
            Intent::Drag { .. } => "drag",
            Intent::Rest { .. } => "rest",
            Intent::ExtendRest { .. } => "extend_rest",
            Intent::Tick { .. } => "tick",
            Intent::Save => "save",
        }
    }
}

/// Terminal presenter. Snapshots are printed per script step, so `render`
/// only draws the live countdown of the `rest` command.
struct Console {
    countdown: bool,
}

impl Presenter for Console {
    fn render(&mut self, snapshot: &DisplaySnapshot) {
        if self.countdown && snapshot.timer_running {
            print!("\r{}", snapshot.timer);
            let _ = io::stdout().flush();
        }
    }

    fn request_confirmation(&mut self, request: &ConfirmationRequest) {
        println!("  {} (confirmed)", request.action.prompt());
    }

    fn timer_finished(&mut self) {
        if self.countdown {
            println!("\rRest over");
        } else {
            println!("  Rest over");
        }
    }

    fn report_error(&mut self, error: &Error) {
        tracing::debug!("Reported: {}", error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    lift_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let user = cli
        .user
        .clone()
        .or_else(|| config.user.default_user.clone())
        .unwrap_or_else(|| DEFAULT_USER.to_string());

    match cli.command {
        Commands::Replay {
            script,
            fixture,
            date,
        } => cmd_replay(&script, fixture.as_deref(), date, UserId::new(user), config).await,
        Commands::Rest { seconds } => cmd_rest(seconds, config).await,
        Commands::Payload { script, date } => {
            cmd_payload(&script, date, UserId::new(user), config).await
        }
    }
}

async fn cmd_replay(
    script: &Path,
    fixture: Option<&Path>,
    date: Option<NaiveDate>,
    user: UserId,
    config: Config,
) -> Result<()> {
    let intents = read_script(script)?;
    let backend = match fixture {
        Some(path) => MemoryBackend::from_json(&std::fs::read_to_string(path)?)?,
        None => MemoryBackend::new(),
    };
    let mut ctl = start_session(backend, date, user, config).await?;
    let mut rest = None;

    for (step, intent) in intents.into_iter().enumerate() {
        let name = intent.name();
        let outcome = apply(&mut ctl, intent, &mut rest, true).await?;

        println!("[{}] {}", step + 1, name);
        print_snapshot(&ctl.snapshot());
        if let Some(outcome) = outcome {
            print_save(&outcome);
        }
    }

    Ok(())
}

async fn cmd_payload(
    script: &Path,
    date: Option<NaiveDate>,
    user: UserId,
    config: Config,
) -> Result<()> {
    let intents = read_script(script)?;
    let mut ctl = start_session(MemoryBackend::new(), date, user, config).await?;
    let mut rest = None;

    for intent in intents {
        apply(&mut ctl, intent, &mut rest, false).await?;
    }

    let session = ctl.session();
    let records = session.to_persistable_payload(session.date(), &Local::now());
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

async fn cmd_rest(seconds: Option<u32>, config: Config) -> Result<()> {
    let console = Console { countdown: true };
    let mut ctl = SessionController::new(
        Arc::new(MemoryBackend::new()),
        console,
        config,
        Local::now().date_naive(),
    );

    let source = ctl.start_rest(seconds);
    if !ctl.timer().is_running() {
        println!("Rest over");
        return Ok(());
    }

    let mut interval = tokio::time::interval(ctl.timer().tick_interval());
    // first tick fires immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        match ctl.tick(source) {
            TickOutcome::Running { .. } => {}
            TickOutcome::Completed | TickOutcome::Ignored => break,
        }
    }

    Ok(())
}

async fn start_session(
    backend: MemoryBackend,
    date: Option<NaiveDate>,
    user: UserId,
    config: Config,
) -> Result<SessionController<Console>> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let console = Console { countdown: false };
    let mut ctl = SessionController::new(Arc::new(backend), console, config, date);
    ctl.login(user).await?;
    Ok(ctl)
}

fn read_script(path: &Path) -> Result<Vec<Intent>> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| {
                Error::Validation(format!("{}:{}: {}", path.display(), i + 1, e))
            })
        })
        .collect()
}

fn exercise_at(ctl: &SessionController<Console>, position: usize) -> Result<ExerciseId> {
    ctl.session()
        .ids()
        .get(position)
        .copied()
        .ok_or_else(|| Error::Validation(format!("no exercise at position {}", position)))
}

async fn apply(
    ctl: &mut SessionController<Console>,
    intent: Intent,
    rest: &mut Option<TickSource>,
    allow_save: bool,
) -> Result<Option<SaveOutcome>> {
    match intent {
        Intent::AddExercise { name } => {
            let ticket = ctl.add_exercise(&name)?;
            ctl.resolve_performance(&ticket).await;
        }
        Intent::AddSet { exercise } => {
            let id = exercise_at(ctl, exercise)?;
            ctl.add_set(id)?;
        }
        Intent::CopyLastSet { exercise } => {
            let id = exercise_at(ctl, exercise)?;
            ctl.copy_last_set(id)?;
        }
        Intent::UpdateSet {
            exercise,
            set,
            weight,
            unit,
            reps,
        } => {
            let id = exercise_at(ctl, exercise)?;
            ctl.update_set(id, set, SetUpdate { weight, unit, reps })?;
        }
        Intent::DeleteSet { exercise, set } => {
            let id = exercise_at(ctl, exercise)?;
            ctl.delete_set(id, set)?;
        }
        Intent::DeleteExercise { exercise } => {
            let id = exercise_at(ctl, exercise)?;
            let request = ctl.request_delete_exercise(id)?;
            ctl.confirm(request.token).await?;
        }
        Intent::SetNote { exercise, note } => {
            let id = exercise_at(ctl, exercise)?;
            ctl.set_note(id, &note)?;
        }
        Intent::Drag { from, to } => drag(ctl, from, to)?,
        Intent::Rest { seconds } => {
            *rest = Some(ctl.start_rest(seconds));
        }
        Intent::ExtendRest { seconds } => {
            if ctl.extend_rest(seconds) == TickOutcome::Ignored {
                tracing::info!("Rest timer not running, extend ignored");
            }
        }
        Intent::Tick { count } => {
            if let Some(source) = *rest {
                for _ in 0..count.unwrap_or(1) {
                    ctl.tick(source);
                }
            }
        }
        Intent::Save => {
            if allow_save {
                return Ok(Some(ctl.save_workout().await?));
            }
            tracing::info!("Skipping save");
        }
    }
    Ok(None)
}

/// Drag the exercise at `from` so it ends up at `to`, on a layout of
/// equally tall cards stacked in session order
fn drag(ctl: &mut SessionController<Console>, from: usize, to: usize) -> Result<()> {
    let id = exercise_at(ctl, from)?;
    let cards: Vec<CardBounds> = ctl
        .session()
        .ids()
        .iter()
        .enumerate()
        .map(|(i, id)| CardBounds {
            id: *id,
            top: i as f64 * CARD_HEIGHT,
            height: CARD_HEIGHT,
        })
        .collect();

    let start_y = from as f64 * CARD_HEIGHT + CARD_HEIGHT / 2.0;
    let target_y = cards
        .iter()
        .filter(|c| c.id != id)
        .nth(to)
        .map(|c| c.midpoint() - 1.0)
        .unwrap_or(cards.len() as f64 * CARD_HEIGHT);

    ctl.pointer_down(PointerTarget::DragHandle(id), start_y, &cards);
    ctl.pointer_move(target_y, &cards);
    ctl.pointer_up()
}

fn print_snapshot(snapshot: &DisplaySnapshot) {
    for (i, exercise) in snapshot.exercises.iter().enumerate() {
        print!(
            "  {}. {} ({} sets) {:.2} kg",
            i, exercise.name, exercise.set_count, exercise.volume
        );
        if let Some(last) = exercise.last_performance {
            print!(" [last {:.2} kg x {}]", last.weight_kg, last.reps);
        }
        println!();
    }
    println!("  total: {:.2} kg", snapshot.daily_total);
    if snapshot.timer_running {
        println!("  rest: {}", snapshot.timer);
    }
}

fn print_save(outcome: &SaveOutcome) {
    println!("{}", outcome.message);
    for pr in &outcome.new_prs {
        println!("New PR: {}", pr);
    }
    if let Some(ref err) = outcome.pr_error {
        println!("PR check failed: {}", err);
    }
}
