//! Backend collaborator.
//!
//! [`Backend`] is the request/response API the engine talks to; transport
//! and authentication live behind it. [`MemoryBackend`] keeps everything in
//! memory and is what tests and the CLI run against.

use crate::{
    AnalysisData, InitialData, LastPerformance, PhotoRecord, PrData, Profile, RemoteError,
    Templates, UserId, UserSummary, VolumePoint, WeightPoint, WorkoutRecord, WriteAck,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Answer of `process_workout_for_prs`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrOutcome {
    #[serde(rename = "newPRs")]
    pub new_prs: Vec<String>,
}

/// Remote API used by the session controller
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_initial_data(&self, user: &UserId) -> RemoteResult<InitialData>;

    async fn fetch_latest_performance(
        &self,
        exercise: &str,
        user: &UserId,
    ) -> RemoteResult<Option<LastPerformance>>;

    async fn fetch_unique_exercise_names(&self, user: &UserId) -> RemoteResult<Vec<String>>;

    async fn fetch_analysis_data(&self, user: &UserId) -> RemoteResult<AnalysisData>;

    async fn fetch_all_prs(&self, user: &UserId) -> RemoteResult<PrData>;

    async fn fetch_all_photo_records(&self, user: &UserId) -> RemoteResult<Vec<PhotoRecord>>;

    async fn fetch_templates(&self, user: &UserId) -> RemoteResult<Templates>;

    async fn save_workout(&self, user: &UserId, records: &[WorkoutRecord])
        -> RemoteResult<WriteAck>;

    async fn process_workout_for_prs(
        &self,
        user: &UserId,
        records: &[WorkoutRecord],
    ) -> RemoteResult<PrOutcome>;

    async fn save_template(
        &self,
        user: &UserId,
        name: &str,
        exercises: &[String],
    ) -> RemoteResult<WriteAck>;

    async fn delete_template(&self, user: &UserId, name: &str) -> RemoteResult<WriteAck>;

    async fn save_profile(&self, user: &UserId, profile: &Profile) -> RemoteResult<WriteAck>;

    async fn save_body_photos(&self, user: &UserId, photos: &PhotoRecord)
        -> RemoteResult<WriteAck>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// Backend operations, for call counting and failure injection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendCall {
    InitialData,
    LatestPerformance,
    ExerciseNames,
    AnalysisData,
    AllPrs,
    PhotoRecords,
    Templates,
    SaveWorkout,
    ProcessPrs,
    SaveTemplate,
    DeleteTemplate,
    SaveProfile,
    SaveBodyPhotos,
}

/// Everything the backend knows about one user
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecords {
    pub profile: Profile,
    pub analysis: AnalysisData,
    pub prs: PrData,
    pub photos: Vec<PhotoRecord>,
    pub templates: Templates,
    pub workouts: Vec<WorkoutRecord>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserRecords>,
    calls: HashMap<BackendCall, usize>,
    failing: HashSet<BackendCall>,
}

impl State {
    fn user(&mut self, user: &UserId) -> &mut UserRecords {
        self.users.entry(user.clone()).or_insert_with(|| UserRecords {
            profile: Profile {
                email: user.to_string(),
                ..Profile::default()
            },
            ..UserRecords::default()
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from per-user records
    pub fn with_users(users: BTreeMap<UserId, UserRecords>) -> Self {
        let backend = Self::new();
        backend.lock().users.extend(users);
        backend
    }

    /// Seed from a JSON object mapping user id to [`UserRecords`]
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let users: BTreeMap<UserId, UserRecords> = serde_json::from_str(json)?;
        tracing::debug!("Seeded memory backend with {} users", users.len());
        Ok(Self::with_users(users))
    }

    /// Number of times `call` reached the backend
    pub fn calls(&self, call: BackendCall) -> usize {
        self.lock().calls.get(&call).copied().unwrap_or(0)
    }

    /// Make the next `call` fail with [`RemoteError::Unavailable`]
    pub fn fail_next(&self, call: BackendCall) {
        self.lock().failing.insert(call);
    }

    /// Snapshot of a user's records
    pub fn records(&self, user: &UserId) -> Option<UserRecords> {
        self.lock().users.get(user).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and apply any injected failure
    fn enter(&self, call: BackendCall) -> RemoteResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        *state.calls.entry(call).or_insert(0) += 1;
        if state.failing.remove(&call) {
            return Err(RemoteError::Unavailable(format!("{:?} failed", call)));
        }
        Ok(state)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_initial_data(&self, user: &UserId) -> RemoteResult<InitialData> {
        let mut state = self.enter(BackendCall::InitialData)?;
        let profile = state.user(user).profile.clone();
        let all_users = if profile.is_admin {
            let mut users: Vec<UserSummary> = state
                .users
                .values()
                .map(|r| UserSummary {
                    email: r.profile.email.clone(),
                    name: r.profile.name.clone(),
                })
                .collect();
            users.sort_by(|a, b| a.email.cmp(&b.email));
            users
        } else {
            Vec::new()
        };
        Ok(InitialData { profile, all_users })
    }

    async fn fetch_latest_performance(
        &self,
        exercise: &str,
        user: &UserId,
    ) -> RemoteResult<Option<LastPerformance>> {
        let mut state = self.enter(BackendCall::LatestPerformance)?;
        let latest = state
            .user(user)
            .workouts
            .iter()
            .rev()
            .find(|r| r.motion == exercise)
            .map(|r| LastPerformance {
                weight_kg: r.weight_in_kg,
                reps: r.reps,
            });
        Ok(latest)
    }

    async fn fetch_unique_exercise_names(&self, user: &UserId) -> RemoteResult<Vec<String>> {
        let mut state = self.enter(BackendCall::ExerciseNames)?;
        let names: BTreeSet<String> = state
            .user(user)
            .workouts
            .iter()
            .map(|r| r.motion.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn fetch_analysis_data(&self, user: &UserId) -> RemoteResult<AnalysisData> {
        let mut state = self.enter(BackendCall::AnalysisData)?;
        Ok(state.user(user).analysis.clone())
    }

    async fn fetch_all_prs(&self, user: &UserId) -> RemoteResult<PrData> {
        let mut state = self.enter(BackendCall::AllPrs)?;
        Ok(state.user(user).prs.clone())
    }

    async fn fetch_all_photo_records(&self, user: &UserId) -> RemoteResult<Vec<PhotoRecord>> {
        let mut state = self.enter(BackendCall::PhotoRecords)?;
        Ok(state.user(user).photos.clone())
    }

    async fn fetch_templates(&self, user: &UserId) -> RemoteResult<Templates> {
        let mut state = self.enter(BackendCall::Templates)?;
        Ok(state.user(user).templates.clone())
    }

    async fn save_workout(
        &self,
        user: &UserId,
        records: &[WorkoutRecord],
    ) -> RemoteResult<WriteAck> {
        if records.is_empty() {
            return Err(RemoteError::Rejected("no sets to save".into()));
        }
        let mut state = self.enter(BackendCall::SaveWorkout)?;
        let data = state.user(user);

        let volume: f64 = records
            .iter()
            .map(|r| f64::from(r.reps) * r.weight_in_kg)
            .sum();
        data.analysis.volume_history.push(VolumePoint {
            date: records[0].date.date_naive(),
            volume,
        });
        data.workouts.extend_from_slice(records);

        Ok(WriteAck {
            message: format!("Saved {} sets", records.len()),
        })
    }

    async fn process_workout_for_prs(
        &self,
        user: &UserId,
        records: &[WorkoutRecord],
    ) -> RemoteResult<PrOutcome> {
        let mut state = self.enter(BackendCall::ProcessPrs)?;
        let prs = &mut state.user(user).prs;

        // heaviest set per movement in this workout
        let mut heaviest: BTreeMap<&str, &WorkoutRecord> = BTreeMap::new();
        for record in records.iter().filter(|r| r.reps > 0) {
            let best = heaviest.entry(record.motion.as_str()).or_insert(record);
            if record.weight_in_kg > best.weight_in_kg {
                *best = record;
            }
        }

        let mut new_prs = Vec::new();
        for (motion, record) in heaviest {
            let previous = prs
                .bests
                .get(motion)
                .and_then(|v| v.get("weightKg"))
                .and_then(serde_json::Value::as_f64);
            if previous.map_or(true, |p| record.weight_in_kg > p) {
                prs.bests.insert(
                    motion.to_string(),
                    serde_json::json!({
                        "weightKg": record.weight_in_kg,
                        "reps": record.reps,
                    }),
                );
                new_prs.push(format!(
                    "{}: {} {} x {}",
                    motion, record.weight, record.unit, record.reps
                ));
            }
        }

        Ok(PrOutcome { new_prs })
    }

    async fn save_template(
        &self,
        user: &UserId,
        name: &str,
        exercises: &[String],
    ) -> RemoteResult<WriteAck> {
        let mut state = self.enter(BackendCall::SaveTemplate)?;
        state
            .user(user)
            .templates
            .insert(name.to_string(), exercises.to_vec());
        Ok(WriteAck {
            message: format!("Template '{}' saved", name),
        })
    }

    async fn delete_template(&self, user: &UserId, name: &str) -> RemoteResult<WriteAck> {
        let mut state = self.enter(BackendCall::DeleteTemplate)?;
        match state.user(user).templates.remove(name) {
            Some(_) => Ok(WriteAck {
                message: format!("Template '{}' deleted", name),
            }),
            None => Err(RemoteError::NotFound(format!("template '{}'", name))),
        }
    }

    async fn save_profile(&self, user: &UserId, profile: &Profile) -> RemoteResult<WriteAck> {
        let mut state = self.enter(BackendCall::SaveProfile)?;
        let data = state.user(user);
        if let Some(weight) = profile.body_weight_kg {
            data.analysis.weight_history.push(WeightPoint {
                date: chrono::Utc::now().date_naive(),
                weight,
            });
        }
        data.profile = profile.clone();
        Ok(WriteAck {
            message: "Profile saved".into(),
        })
    }

    async fn save_body_photos(
        &self,
        user: &UserId,
        photos: &PhotoRecord,
    ) -> RemoteResult<WriteAck> {
        let mut state = self.enter(BackendCall::SaveBodyPhotos)?;
        let data = state.user(user);
        data.photos.push(photos.clone());
        data.profile.should_show_reminder = false;
        Ok(WriteAck {
            message: format!("Saved {} photos", photos.urls.len()),
        })
    }
}
