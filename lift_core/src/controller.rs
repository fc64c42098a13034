//! Session controller.
//!
//! Owns one session's worth of state (model, drag, cache, timer, pending
//! confirmation) and routes user intents to it. After every change that
//! affects what is on screen it pushes a fresh [`DisplaySnapshot`] to the
//! [`Presenter`]. Errors are reported to the presenter and returned; a failed
//! remote call never leaves a partial mutation behind.
//!
//! All mutation goes through `&mut self`, so there is a single thread of
//! control. The only work that outlives a call is the performance lookup
//! started by `add_exercise`: it is a detached future whose result is fed
//! back through [`SessionController::apply_performance`] and dropped if the
//! target has gone away in the meantime.

use crate::backend::{Backend, RemoteResult};
use crate::cache::{CacheAction, CacheFreshness, PartitionData, ResultCache};
use crate::confirm::{ConfirmationGate, ConfirmationRequest, ConfirmationToken, PendingAction};
use crate::reorder::{CardBounds, DragFeedback, PointerTarget, ReorderCommit, ReorderController};
use crate::session::{PerformanceLookup, SessionModel, SetDeletion, SetUpdate};
use crate::timer::{RestTimer, TickOutcome, TickSource};
use crate::{
    AnalysisData, Config, Error, ExerciseId, InitialData, LastPerformance, PhotoRecord, PrData,
    Profile, Result, Templates, UserId, WriteAck,
};
use chrono::{Local, NaiveDate};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Presentation
// ============================================================================

/// Render-ready view of one exercise
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseView {
    pub id: ExerciseId,
    pub name: String,
    pub set_count: usize,
    /// kg, rounded to 2 decimals
    pub volume: f64,
    pub last_performance: Option<LastPerformance>,
}

/// Everything the presentation layer needs to redraw
#[derive(Clone, Debug, PartialEq)]
pub struct DisplaySnapshot {
    pub exercises: Vec<ExerciseView>,
    pub daily_total: f64,
    pub timer: String,
    pub timer_running: bool,
    pub cache: CacheFreshness,
}

/// Presentation collaborator (rendering, dialogs, toasts)
pub trait Presenter {
    fn render(&mut self, snapshot: &DisplaySnapshot);

    /// Ask the user; answer with `confirm` or `cancel_confirmation`
    fn request_confirmation(&mut self, _request: &ConfirmationRequest) {}

    fn timer_finished(&mut self) {}

    fn report_error(&mut self, _error: &Error) {}

    fn report_success(&mut self, _message: &str) {}
}

/// Routes an asynchronous performance lookup back to its exercise
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupTicket {
    pub lookup: PerformanceLookup,
    pub user: UserId,
}

impl LookupTicket {
    pub fn exercise(&self) -> ExerciseId {
        self.lookup.exercise
    }
}

/// Result of a successful save
#[derive(Clone, Debug, PartialEq)]
pub struct SaveOutcome {
    pub message: String,
    pub new_prs: Vec<String>,
    /// Set when the workout was saved but PR processing failed
    pub pr_error: Option<String>,
}

// ============================================================================
// Controller
// ============================================================================

pub struct SessionController<P: Presenter> {
    backend: Arc<dyn Backend>,
    presenter: P,
    config: Config,
    session: SessionModel,
    reorder: ReorderController,
    cache: ResultCache,
    timer: RestTimer,
    confirmations: ConfirmationGate,
    initial: Option<InitialData>,
}

impl<P: Presenter> SessionController<P> {
    pub fn new(backend: Arc<dyn Backend>, presenter: P, config: Config, date: NaiveDate) -> Self {
        let tick = Duration::from_millis(config.timer.tick_millis);
        Self {
            backend,
            presenter,
            session: SessionModel::new(date, config.session.default_unit),
            reorder: ReorderController::new(),
            cache: ResultCache::new(),
            timer: RestTimer::new(tick),
            confirmations: ConfirmationGate::new(),
            initial: None,
            config,
        }
    }

    pub fn session(&self) -> &SessionModel {
        &self.session
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn timer(&self) -> &RestTimer {
        &self.timer
    }

    pub fn reorder(&self) -> &ReorderController {
        &self.reorder
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn active_user(&self) -> Option<&UserId> {
        self.cache.active_user()
    }

    /// Profile and user list loaded for the active user
    pub fn initial_data(&self) -> Option<&InitialData> {
        self.initial.as_ref()
    }

    pub fn pending_confirmation(&self) -> Option<&ConfirmationRequest> {
        self.confirmations.pending()
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.session.set_date(date);
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        let exercises = self
            .session
            .exercises()
            .map(|e| ExerciseView {
                id: e.id(),
                name: e.name.clone(),
                set_count: e.sets().len(),
                volume: self.session.exercise_volume(e.id()).unwrap_or(0.0),
                last_performance: e.last_performance(),
            })
            .collect();

        DisplaySnapshot {
            exercises,
            daily_total: self.session.daily_total_volume(),
            timer: self.timer.display(),
            timer_running: self.timer.is_running(),
            cache: self.cache.freshness(),
        }
    }

    fn refresh(&mut self) {
        let snapshot = self.snapshot();
        self.presenter.render(&snapshot);
    }

    /// Report an error to the presenter on its way out
    fn reported<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            tracing::warn!("{}", e);
            self.presenter.report_error(e);
        }
        result
    }

    fn require_user(&self) -> Result<UserId> {
        self.cache
            .active_user()
            .cloned()
            .ok_or_else(|| Error::Validation("no active user".into()))
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    /// Sign in as `user`
    pub async fn login(&mut self, user: UserId) -> Result<InitialData> {
        self.switch_user(user).await
    }

    /// Make `user` active: load their profile, then drop every cached
    /// partition. Nothing changes if the profile cannot be loaded.
    pub async fn switch_user(&mut self, user: UserId) -> Result<InitialData> {
        let result = self
            .backend
            .fetch_initial_data(&user)
            .await
            .map_err(Error::from);
        let initial = self.reported(result)?;

        self.cache.switch_user(user);
        self.confirmations.clear();
        self.initial = Some(initial.clone());
        self.refresh();
        Ok(initial)
    }

    /// Forget the active user and everything derived from them
    pub fn logout(&mut self) {
        self.reorder.cancel();
        self.confirmations.clear();
        self.session.clear();
        self.timer.reset();
        self.cache.clear_user();
        self.initial = None;
        tracing::info!("Logged out");
        self.refresh();
    }

    // ------------------------------------------------------------------------
    // Session editing
    // ------------------------------------------------------------------------

    /// Add an exercise. The returned ticket drives the lookup of its last
    /// performance (see [`Self::performance_lookup`]).
    pub fn add_exercise(&mut self, name: &str) -> Result<LookupTicket> {
        let result = self.require_user().and_then(|user| {
            let (_, lookup) = self.session.add_exercise(name)?;
            Ok(LookupTicket { lookup, user })
        });
        let ticket = self.reported(result)?;
        self.refresh();
        Ok(ticket)
    }

    /// Fetch for a lookup ticket. The future owns everything it needs, so
    /// the controller stays free for other intents while it runs.
    pub fn performance_lookup(
        &self,
        ticket: &LookupTicket,
    ) -> impl Future<Output = RemoteResult<Option<LastPerformance>>> + Send + 'static {
        let backend = Arc::clone(&self.backend);
        let name = ticket.lookup.name.clone();
        let user = ticket.user.clone();
        async move { backend.fetch_latest_performance(&name, &user).await }
    }

    /// Apply a finished lookup. Returns `false` (and changes nothing) if the
    /// call failed, the exercise is gone, a newer lookup replaced it, or a
    /// different user is now active.
    pub fn apply_performance(
        &mut self,
        ticket: &LookupTicket,
        result: RemoteResult<Option<LastPerformance>>,
    ) -> bool {
        let performance = match result {
            Ok(performance) => performance,
            Err(e) => {
                tracing::warn!("Performance lookup for '{}' failed: {}", ticket.lookup.name, e);
                return false;
            }
        };

        if self.cache.active_user() != Some(&ticket.user) {
            tracing::debug!("Dropping performance lookup for previous user");
            return false;
        }

        let applied = self.session.apply_performance(&ticket.lookup, performance);
        if applied {
            self.refresh();
        }
        applied
    }

    /// Run a lookup to completion and apply it
    pub async fn resolve_performance(&mut self, ticket: &LookupTicket) -> bool {
        let result = self.performance_lookup(ticket).await;
        self.apply_performance(ticket, result)
    }

    /// Start a fresh lookup for an existing exercise, superseding any in flight
    pub fn refresh_performance(&mut self, id: ExerciseId) -> Result<LookupTicket> {
        let result = self.require_user().and_then(|user| {
            let lookup = self.session.renew_lookup(id)?;
            Ok(LookupTicket { lookup, user })
        });
        self.reported(result)
    }

    pub fn add_set(&mut self, id: ExerciseId) -> Result<usize> {
        let result = self.session.add_set(id);
        self.finish(result)
    }

    pub fn copy_last_set(&mut self, id: ExerciseId) -> Result<usize> {
        let result = self.session.copy_last_set(id);
        self.finish(result)
    }

    pub fn update_set(&mut self, id: ExerciseId, sequence: usize, update: SetUpdate) -> Result<()> {
        let result = self.session.update_set(id, sequence, update);
        self.finish(result)
    }

    pub fn set_note(&mut self, id: ExerciseId, note: &str) -> Result<()> {
        let result = self.session.set_note(id, note);
        self.finish(result)
    }

    /// Delete one set; deleting the last set removes the exercise
    pub fn delete_set(&mut self, id: ExerciseId, sequence: usize) -> Result<SetDeletion> {
        let result = self.check_set(id, sequence).and_then(|_| {
            self.teardown_drag();
            self.session.delete_set(id, sequence)
        });
        self.finish(result)
    }

    fn check_set(&self, id: ExerciseId, sequence: usize) -> Result<()> {
        let entry = self.session.get(id).ok_or(Error::UnknownExercise(id))?;
        if sequence == 0 || sequence > entry.sets().len() {
            return Err(Error::UnknownSet {
                exercise: id,
                sequence,
            });
        }
        Ok(())
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        let value = self.reported(result)?;
        self.refresh();
        Ok(value)
    }

    // ------------------------------------------------------------------------
    // Confirmation-gated actions
    // ------------------------------------------------------------------------

    fn ask(&mut self, action: PendingAction) -> ConfirmationRequest {
        let user = self.cache.active_user().cloned();
        let request = self.confirmations.request(action, user);
        self.presenter.request_confirmation(&request);
        request
    }

    pub fn request_delete_exercise(&mut self, id: ExerciseId) -> Result<ConfirmationRequest> {
        let result = self
            .session
            .get(id)
            .map(|e| e.name.clone())
            .ok_or(Error::UnknownExercise(id));
        let name = self.reported(result)?;
        Ok(self.ask(PendingAction::DeleteExercise { id, name }))
    }

    pub fn request_clear_session(&mut self) -> ConfirmationRequest {
        self.ask(PendingAction::ClearSession)
    }

    pub fn request_delete_template(&mut self, name: &str) -> Result<ConfirmationRequest> {
        let name = name.trim();
        if name.is_empty() {
            let result = Err(Error::Validation("template name must not be empty".into()));
            return self.reported(result);
        }
        Ok(self.ask(PendingAction::DeleteTemplate {
            name: name.to_string(),
        }))
    }

    /// The user agreed: carry out the pending action
    pub async fn confirm(&mut self, token: ConfirmationToken) -> Result<()> {
        let user = self.cache.active_user().cloned();
        let result = self.confirmations.confirm(token, user.as_ref());
        let action = self.reported(result)?;

        match action {
            PendingAction::DeleteExercise { id, .. } => {
                let result = if self.session.contains(id) {
                    self.teardown_drag();
                    self.session.delete_exercise(id).map(|_| ())
                } else {
                    Err(Error::UnknownExercise(id))
                };
                self.finish(result)
            }
            PendingAction::ClearSession => {
                self.reorder.cancel();
                self.session.clear();
                self.refresh();
                Ok(())
            }
            PendingAction::DeleteTemplate { name } => {
                let result = self.delete_template_remote(&name).await;
                let ack = self.reported(result)?;
                self.presenter.report_success(&ack.message);
                self.refresh();
                Ok(())
            }
        }
    }

    /// The user declined
    pub fn cancel_confirmation(&mut self, token: ConfirmationToken) -> Result<()> {
        let result = self.confirmations.cancel(token);
        self.reported(result)
    }

    async fn delete_template_remote(&mut self, name: &str) -> Result<WriteAck> {
        let user = self.require_user()?;
        let ack = self.backend.delete_template(&user, name).await?;
        self.cache.apply(CacheAction::DeleteTemplate);
        tracing::info!("Deleted template '{}'", name);
        Ok(ack)
    }

    // ------------------------------------------------------------------------
    // Reordering
    // ------------------------------------------------------------------------

    /// Pointer down in the exercise list. Only the drag handle of an
    /// exercise in this session starts a drag.
    pub fn pointer_down(
        &mut self,
        target: PointerTarget,
        pointer_y: f64,
        cards: &[CardBounds],
    ) -> Option<DragFeedback> {
        if let PointerTarget::DragHandle(id) | PointerTarget::Card(id) = target {
            if !self.session.contains(id) {
                return None;
            }
        }
        self.reorder.pointer_down(target, pointer_y, cards)
    }

    pub fn pointer_move(&mut self, pointer_y: f64, cards: &[CardBounds]) -> Option<DragFeedback> {
        self.reorder.pointer_move(pointer_y, cards)
    }

    /// Pointer released: move the dragged exercise to the placeholder
    pub fn pointer_up(&mut self) -> Result<()> {
        let Some(commit) = self.reorder.pointer_up() else {
            return Ok(());
        };
        let result = self.apply_commit(commit);
        self.finish(result)
    }

    /// Drag torn down from outside; the exercise lands at the placeholder
    pub fn cancel_drag(&mut self) -> Result<()> {
        let Some(commit) = self.reorder.cancel() else {
            return Ok(());
        };
        let result = self.apply_commit(commit);
        self.finish(result)
    }

    fn teardown_drag(&mut self) {
        if let Some(commit) = self.reorder.cancel() {
            if let Err(e) = self.apply_commit(commit) {
                tracing::warn!("Failed to restore dragged exercise: {}", e);
            }
        }
    }

    fn apply_commit(&mut self, commit: ReorderCommit) -> Result<()> {
        if !self.session.contains(commit.id) {
            tracing::warn!("Dragged exercise {} no longer exists", commit.id);
            return Ok(());
        }
        self.session.move_exercise(commit.id, commit.to_index)
    }

    // ------------------------------------------------------------------------
    // Rest timer
    // ------------------------------------------------------------------------

    /// Start the rest countdown (configured default when `seconds` is None)
    pub fn start_rest(&mut self, seconds: Option<u32>) -> TickSource {
        let seconds = seconds.unwrap_or(self.config.timer.default_rest_seconds);
        let source = self.timer.start(seconds);
        self.refresh();
        source
    }

    /// Extend a running countdown (configured step when `delta` is None)
    pub fn extend_rest(&mut self, delta_seconds: Option<i64>) -> TickOutcome {
        let delta = delta_seconds.unwrap_or(self.config.timer.extend_step_seconds);
        let outcome = self.timer.extend(delta);
        match outcome {
            TickOutcome::Ignored => {}
            TickOutcome::Running { .. } => self.refresh(),
            TickOutcome::Completed => {
                self.presenter.timer_finished();
                self.refresh();
            }
        }
        outcome
    }

    pub fn reset_rest(&mut self) {
        self.timer.reset();
        self.refresh();
    }

    pub fn tick(&mut self, source: TickSource) -> TickOutcome {
        let outcome = self.timer.tick(source);
        match outcome {
            TickOutcome::Ignored => {}
            TickOutcome::Running { .. } => self.refresh(),
            TickOutcome::Completed => {
                self.presenter.timer_finished();
                self.refresh();
            }
        }
        outcome
    }

    // ------------------------------------------------------------------------
    // Cached reads
    // ------------------------------------------------------------------------

    async fn cached<T, F, Fut>(&mut self, fetch: F) -> Result<Arc<T>>
    where
        T: PartitionData,
        F: FnOnce(Arc<dyn Backend>, UserId) -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        if let Some(hit) = self.cache.get::<T>() {
            return Ok(hit);
        }
        let ticket = self
            .cache
            .begin_fetch::<T>()
            .ok_or_else(|| Error::Validation("no active user".into()))?;
        let data = fetch(Arc::clone(&self.backend), ticket.user.clone()).await?;
        Ok(self.cache.store(ticket, data))
    }

    pub async fn analysis_data(&mut self) -> Result<Arc<AnalysisData>> {
        let result = self
            .cached(|backend, user| async move { backend.fetch_analysis_data(&user).await })
            .await;
        self.reported(result)
    }

    pub async fn all_prs(&mut self) -> Result<Arc<PrData>> {
        let result = self
            .cached(|backend, user| async move { backend.fetch_all_prs(&user).await })
            .await;
        self.reported(result)
    }

    pub async fn photo_history(&mut self) -> Result<Arc<Vec<PhotoRecord>>> {
        let result = self
            .cached(|backend, user| async move { backend.fetch_all_photo_records(&user).await })
            .await;
        self.reported(result)
    }

    pub async fn templates(&mut self) -> Result<Arc<Templates>> {
        let result = self
            .cached(|backend, user| async move { backend.fetch_templates(&user).await })
            .await;
        self.reported(result)
    }

    /// Names the user has logged before, for suggestions. Not cached.
    pub async fn exercise_names(&mut self) -> Result<Vec<String>> {
        let result = match self.require_user() {
            Ok(user) => self
                .backend
                .fetch_unique_exercise_names(&user)
                .await
                .map_err(Error::from),
            Err(e) => Err(e),
        };
        self.reported(result)
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Save the session, then let the backend look for new PRs
    ///
    /// The session is cleared once the workout is stored. A PR-processing
    /// failure after that is reported but does not undo the save.
    pub async fn save_workout(&mut self) -> Result<SaveOutcome> {
        let result = self.save_workout_inner().await;
        let outcome = self.reported(result)?;

        if let Some(ref err) = outcome.pr_error {
            let err = Error::Validation(format!("workout saved, PR check failed: {}", err));
            self.presenter.report_error(&err);
        }
        self.presenter.report_success(&outcome.message);
        self.refresh();
        Ok(outcome)
    }

    async fn save_workout_inner(&mut self) -> Result<SaveOutcome> {
        let user = self.require_user()?;
        let payload = self
            .session
            .to_persistable_payload(self.session.date(), &Local::now());
        if payload.is_empty() {
            return Err(Error::Validation("nothing to save: log at least one set".into()));
        }

        let ack = self.backend.save_workout(&user, &payload).await?;
        self.cache.apply(CacheAction::SaveWorkout);
        tracing::info!("Saved workout with {} sets for {}", payload.len(), user);

        let (new_prs, pr_error) = match self.backend.process_workout_for_prs(&user, &payload).await
        {
            Ok(outcome) => {
                self.cache.apply(CacheAction::ProcessPrs);
                (outcome.new_prs, None)
            }
            Err(e) => {
                tracing::warn!("PR processing failed: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        self.reorder.cancel();
        self.session.clear();

        Ok(SaveOutcome {
            message: ack.message,
            new_prs,
            pr_error,
        })
    }

    /// Save the current exercise list as a named template
    pub async fn save_template(&mut self, name: &str) -> Result<WriteAck> {
        let result = self.save_template_inner(name).await;
        let ack = self.reported(result)?;
        self.presenter.report_success(&ack.message);
        self.refresh();
        Ok(ack)
    }

    async fn save_template_inner(&mut self, name: &str) -> Result<WriteAck> {
        let user = self.require_user()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("template name must not be empty".into()));
        }
        let exercises: Vec<String> = self.session.exercises().map(|e| e.name.clone()).collect();
        if exercises.is_empty() {
            return Err(Error::Validation("template needs at least one exercise".into()));
        }

        let ack = self.backend.save_template(&user, name, &exercises).await?;
        self.cache.apply(CacheAction::SaveTemplate);
        tracing::info!("Saved template '{}' ({} exercises)", name, exercises.len());
        Ok(ack)
    }

    /// Append every exercise of a template, each with its own lookup ticket
    pub async fn load_template(&mut self, name: &str) -> Result<Vec<LookupTicket>> {
        let templates = self.templates().await?;
        let result = templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("no template named '{}'", name)));
        let exercises = self.reported(result)?;

        let mut tickets = Vec::with_capacity(exercises.len());
        for exercise in &exercises {
            tickets.push(self.add_exercise(exercise)?);
        }
        Ok(tickets)
    }

    pub async fn save_profile(&mut self, profile: Profile) -> Result<WriteAck> {
        let result = self.save_profile_inner(&profile).await;
        let ack = self.reported(result)?;
        if let Some(initial) = self.initial.as_mut() {
            initial.profile = profile;
        }
        self.presenter.report_success(&ack.message);
        self.refresh();
        Ok(ack)
    }

    async fn save_profile_inner(&mut self, profile: &Profile) -> Result<WriteAck> {
        let user = self.require_user()?;
        let ack = self.backend.save_profile(&user, profile).await?;
        self.cache.apply(CacheAction::SaveProfile);
        Ok(ack)
    }

    pub async fn save_body_photos(&mut self, photos: PhotoRecord) -> Result<WriteAck> {
        let result = self.save_body_photos_inner(&photos).await;
        let ack = self.reported(result)?;
        if let Some(initial) = self.initial.as_mut() {
            initial.profile.should_show_reminder = false;
        }
        self.presenter.report_success(&ack.message);
        self.refresh();
        Ok(ack)
    }

    async fn save_body_photos_inner(&mut self, photos: &PhotoRecord) -> Result<WriteAck> {
        let user = self.require_user()?;
        let ack = self.backend.save_body_photos(&user, photos).await?;
        self.cache.apply(CacheAction::SaveBodyPhotos);
        Ok(ack)
    }
}
