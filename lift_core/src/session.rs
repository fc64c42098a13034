//! In-memory model of a workout session.
//!
//! A session is an ordered list of exercise entries, each owning an ordered
//! list of sets. Entries live in an id-keyed arena; the display order is a
//! separate list of ids so reordering never touches entry identity.
//!
//! Invariants maintained by every mutation:
//! - set sequence numbers are exactly `1..=N` for each entry
//! - an entry never exists with zero sets (deleting the last set removes it)
//! - volumes are accumulated at full precision and rounded once, at the end

use crate::units::{canonical_kg, round2};
use crate::{Error, ExerciseId, LastPerformance, Result, Unit, WorkoutRecord};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;

// ============================================================================
// Entries
// ============================================================================

/// One recorded attempt within an exercise
#[derive(Clone, Debug, PartialEq)]
pub struct SetEntry {
    /// Weight as entered; 0 means blank
    pub weight: f64,
    pub unit: Unit,
    /// Repetitions; 0 means blank
    pub reps: u32,
    sequence: usize,
}

impl SetEntry {
    fn new(weight: f64, unit: Unit, reps: u32) -> Self {
        Self {
            weight,
            unit,
            reps,
            sequence: 0,
        }
    }

    /// 1-based position within the parent exercise
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// Volume of this set in kilograms, unrounded
    pub fn volume_kg(&self) -> f64 {
        f64::from(self.reps) * canonical_kg(self.weight, self.unit)
    }

    fn is_blank(&self) -> bool {
        self.weight <= 0.0 && self.reps == 0
    }
}

/// Partial edit of a set; `None` fields are left as they are
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SetUpdate {
    pub weight: Option<f64>,
    pub unit: Option<Unit>,
    pub reps: Option<u32>,
}

/// One named movement within the session
#[derive(Clone, Debug)]
pub struct ExerciseEntry {
    id: ExerciseId,
    pub name: String,
    pub note: String,
    sets: Vec<SetEntry>,
    last_performance: Option<LastPerformance>,
    generation: u64,
}

impl ExerciseEntry {
    pub fn id(&self) -> ExerciseId {
        self.id
    }

    pub fn sets(&self) -> &[SetEntry] {
        &self.sets
    }

    /// Previously recorded performance, once the async lookup has resolved
    pub fn last_performance(&self) -> Option<LastPerformance> {
        self.last_performance
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn raw_volume(&self) -> f64 {
        self.sets.iter().map(SetEntry::volume_kg).sum()
    }

    fn renumber(&mut self) {
        for (idx, set) in self.sets.iter_mut().enumerate() {
            set.sequence = idx + 1;
        }
    }

    fn push_set(&mut self, set: SetEntry) -> usize {
        self.sets.push(set);
        self.renumber();
        self.sets.len()
    }
}

/// Outcome of [`SessionModel::delete_set`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetDeletion {
    /// Set removed, the exercise still has sets
    SetRemoved,
    /// That was the last set, so the whole exercise was removed
    ExerciseRemoved,
}

/// Everything needed to route an asynchronous performance lookup back to
/// the entry that asked for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerformanceLookup {
    pub exercise: ExerciseId,
    pub name: String,
    pub generation: u64,
}

// ============================================================================
// Session Model
// ============================================================================

/// Ordered collection of exercises for one training day
#[derive(Clone, Debug)]
pub struct SessionModel {
    date: NaiveDate,
    order: Vec<ExerciseId>,
    entries: HashMap<ExerciseId, ExerciseEntry>,
    default_unit: Unit,
    last_unit: Option<Unit>,
    next_generation: u64,
}

impl SessionModel {
    pub fn new(date: NaiveDate, default_unit: Unit) -> Self {
        Self {
            date,
            order: Vec::new(),
            entries: HashMap::new(),
            default_unit,
            last_unit: None,
            next_generation: 1,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.date = date;
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Exercise ids in display order
    pub fn ids(&self) -> &[ExerciseId] {
        &self.order
    }

    /// Exercises in display order
    pub fn exercises(&self) -> impl Iterator<Item = &ExerciseEntry> + '_ {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn get(&self, id: ExerciseId) -> Option<&ExerciseEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: ExerciseId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn position(&self, id: ExerciseId) -> Option<usize> {
        self.order.iter().position(|e| *e == id)
    }

    fn entry_mut(&mut self, id: ExerciseId) -> Result<&mut ExerciseEntry> {
        self.entries.get_mut(&id).ok_or(Error::UnknownExercise(id))
    }

    fn fresh_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    fn fallback_unit(&self) -> Unit {
        self.last_unit.unwrap_or(self.default_unit)
    }

    /// Append a new exercise with one blank set
    ///
    /// Returns the new id plus the lookup the caller should resolve
    /// asynchronously to fill in the last known performance.
    pub fn add_exercise(&mut self, name: &str) -> Result<(ExerciseId, PerformanceLookup)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("exercise name must not be empty".into()));
        }

        let id = ExerciseId::new();
        let generation = self.fresh_generation();
        let mut entry = ExerciseEntry {
            id,
            name: name.to_string(),
            note: String::new(),
            sets: Vec::new(),
            last_performance: None,
            generation,
        };
        entry.push_set(SetEntry::new(0.0, self.fallback_unit(), 0));

        self.entries.insert(id, entry);
        self.order.push(id);
        tracing::debug!("Added exercise '{}' ({})", name, id);

        Ok((
            id,
            PerformanceLookup {
                exercise: id,
                name: name.to_string(),
                generation,
            },
        ))
    }

    /// Append a set pre-filled with the previous set's weight and unit
    ///
    /// Returns the new set's sequence number.
    pub fn add_set(&mut self, id: ExerciseId) -> Result<usize> {
        let fallback = self.fallback_unit();
        let entry = self.entry_mut(id)?;
        let set = match entry.sets.last() {
            Some(prev) => SetEntry::new(prev.weight, prev.unit, 0),
            None => SetEntry::new(0.0, fallback, 0),
        };
        let sequence = entry.push_set(set);
        tracing::debug!("Added set #{} to {}", sequence, id);
        Ok(sequence)
    }

    /// Duplicate the last set (weight, unit and reps); same as `add_set` when
    /// there is nothing to copy
    pub fn copy_last_set(&mut self, id: ExerciseId) -> Result<usize> {
        let entry = self.entry_mut(id)?;
        let Some(last) = entry.sets.last() else {
            return self.add_set(id);
        };
        let set = SetEntry::new(last.weight, last.unit, last.reps);
        let sequence = entry.push_set(set);
        tracing::debug!("Copied last set of {} into #{}", id, sequence);
        Ok(sequence)
    }

    /// Remove a set and renumber the rest; removes the exercise when its last
    /// set goes
    pub fn delete_set(&mut self, id: ExerciseId, sequence: usize) -> Result<SetDeletion> {
        let entry = self.entry_mut(id)?;
        if sequence == 0 || sequence > entry.sets.len() {
            return Err(Error::UnknownSet {
                exercise: id,
                sequence,
            });
        }

        entry.sets.remove(sequence - 1);
        entry.renumber();

        if entry.sets.is_empty() {
            self.remove_entry(id);
            tracing::debug!("Deleted last set of {}, exercise removed", id);
            return Ok(SetDeletion::ExerciseRemoved);
        }

        tracing::debug!("Deleted set #{} of {}", sequence, id);
        Ok(SetDeletion::SetRemoved)
    }

    /// Remove an exercise entirely. Callers gate this behind confirmation.
    pub fn delete_exercise(&mut self, id: ExerciseId) -> Result<ExerciseEntry> {
        let entry = self.remove_entry(id).ok_or(Error::UnknownExercise(id))?;
        tracing::debug!("Deleted exercise '{}' ({})", entry.name, id);
        Ok(entry)
    }

    fn remove_entry(&mut self, id: ExerciseId) -> Option<ExerciseEntry> {
        self.order.retain(|e| *e != id);
        self.entries.remove(&id)
    }

    /// Edit a set in place
    pub fn update_set(&mut self, id: ExerciseId, sequence: usize, update: SetUpdate) -> Result<()> {
        if let Some(weight) = update.weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::Validation(format!("invalid weight {}", weight)));
            }
        }

        let entry = self.entry_mut(id)?;
        let set = sequence
            .checked_sub(1)
            .and_then(|idx| entry.sets.get_mut(idx))
            .ok_or(Error::UnknownSet {
                exercise: id,
                sequence,
            })?;

        if let Some(weight) = update.weight {
            set.weight = weight;
        }
        if let Some(reps) = update.reps {
            set.reps = reps;
        }
        if let Some(unit) = update.unit {
            set.unit = unit;
            self.last_unit = Some(unit);
        }
        Ok(())
    }

    pub fn set_note(&mut self, id: ExerciseId, note: &str) -> Result<()> {
        self.entry_mut(id)?.note = note.to_string();
        Ok(())
    }

    /// Volume of one exercise in kg, rounded to 2 decimals
    pub fn exercise_volume(&self, id: ExerciseId) -> Result<f64> {
        self.entries
            .get(&id)
            .map(|e| round2(e.raw_volume()))
            .ok_or(Error::UnknownExercise(id))
    }

    /// Total volume of the session in kg
    ///
    /// Per-exercise volumes are summed unrounded; rounding happens once.
    pub fn daily_total_volume(&self) -> f64 {
        round2(self.exercises().map(ExerciseEntry::raw_volume).sum())
    }

    /// Move an exercise to `to_index` in the display order
    pub fn move_exercise(&mut self, id: ExerciseId, to_index: usize) -> Result<()> {
        let from = self.position(id).ok_or(Error::UnknownExercise(id))?;
        debug_assert!(
            to_index < self.order.len(),
            "reorder index {} out of range for {} exercises",
            to_index,
            self.order.len()
        );
        if to_index >= self.order.len() {
            return Err(Error::Invariant(format!(
                "reorder index {} out of range for {} exercises",
                to_index,
                self.order.len()
            )));
        }

        let moved = self.order.remove(from);
        self.order.insert(to_index, moved);
        tracing::debug!("Moved {} from {} to {}", id, from, to_index);
        Ok(())
    }

    /// Start a new lookup for an entry, invalidating any still in flight
    pub fn renew_lookup(&mut self, id: ExerciseId) -> Result<PerformanceLookup> {
        let generation = self.fresh_generation();
        let entry = self.entry_mut(id)?;
        entry.generation = generation;
        Ok(PerformanceLookup {
            exercise: id,
            name: entry.name.clone(),
            generation,
        })
    }

    /// Store a resolved lookup. Returns `false` without touching anything if
    /// the entry is gone or a newer lookup superseded this one.
    pub fn apply_performance(
        &mut self,
        lookup: &PerformanceLookup,
        performance: Option<LastPerformance>,
    ) -> bool {
        match self.entries.get_mut(&lookup.exercise) {
            Some(entry) if entry.generation == lookup.generation => {
                entry.last_performance = performance;
                true
            }
            _ => {
                tracing::debug!(
                    "Discarding stale performance lookup for '{}'",
                    lookup.name
                );
                false
            }
        }
    }

    /// Flatten the session into backend records
    ///
    /// Each record's date is `session_date` at the time of day of `now`.
    /// Sets with neither weight nor reps are skipped.
    pub fn to_persistable_payload<Tz: TimeZone>(
        &self,
        session_date: NaiveDate,
        now: &DateTime<Tz>,
    ) -> Vec<WorkoutRecord> {
        let naive = session_date.and_time(now.time());
        let tz = now.timezone();
        // a wall time inside a DST gap moves forward past the gap
        let date = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive));

        self.exercises()
            .flat_map(|entry| {
                entry
                    .sets
                    .iter()
                    .filter(|set| !set.is_blank())
                    .map(move |set| WorkoutRecord {
                        date,
                        motion: entry.name.clone(),
                        set: set.sequence,
                        weight: set.weight,
                        unit: set.unit,
                        reps: set.reps,
                        weight_in_kg: canonical_kg(set.weight, set.unit),
                        note: entry.note.clone(),
                    })
            })
            .collect()
    }

    /// Remove every exercise
    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
        tracing::debug!("Session cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, LocalResult, NaiveDateTime, NaiveTime, Timelike};
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn model() -> SessionModel {
        SessionModel::new(date(), Unit::Kg)
    }

    fn set(model: &mut SessionModel, id: ExerciseId, seq: usize, weight: f64, unit: Unit, reps: u32) {
        model
            .update_set(
                id,
                seq,
                SetUpdate {
                    weight: Some(weight),
                    unit: Some(unit),
                    reps: Some(reps),
                },
            )
            .unwrap();
    }

    fn sequences(model: &SessionModel, id: ExerciseId) -> Vec<usize> {
        model.get(id).unwrap().sets().iter().map(|s| s.sequence()).collect()
    }

    #[test]
    fn test_add_exercise_has_one_blank_set() {
        let mut m = model();
        let (id, lookup) = m.add_exercise("  Bench Press ").unwrap();

        let entry = m.get(id).unwrap();
        assert_eq!(entry.name, "Bench Press");
        assert_eq!(entry.sets().len(), 1);
        assert_eq!(entry.sets()[0].weight, 0.0);
        assert_eq!(entry.sets()[0].reps, 0);
        assert_eq!(entry.sets()[0].unit, Unit::Kg);
        assert_eq!(lookup.exercise, id);
        assert_eq!(lookup.name, "Bench Press");
    }

    #[test]
    fn test_add_exercise_rejects_blank_name() {
        let mut m = model();
        assert!(matches!(m.add_exercise("   "), Err(Error::Validation(_))));
        assert!(m.is_empty());
    }

    #[test]
    fn test_new_exercise_uses_last_unit() {
        let mut m = model();
        let (a, _) = m.add_exercise("Curl").unwrap();
        set(&mut m, a, 1, 30.0, Unit::Lb, 10);

        let (b, _) = m.add_exercise("Row").unwrap();
        assert_eq!(m.get(b).unwrap().sets()[0].unit, Unit::Lb);
    }

    #[test]
    fn test_add_set_prefills_weight_and_unit() {
        let mut m = model();
        let (id, _) = m.add_exercise("Squat").unwrap();
        set(&mut m, id, 1, 225.0, Unit::Lb, 5);

        assert_eq!(m.add_set(id).unwrap(), 2);
        let second = &m.get(id).unwrap().sets()[1];
        assert_eq!(second.weight, 225.0);
        assert_eq!(second.unit, Unit::Lb);
        assert_eq!(second.reps, 0);
    }

    #[test]
    fn test_copy_last_set_copies_reps() {
        let mut m = model();
        let (id, _) = m.add_exercise("Deadlift").unwrap();
        set(&mut m, id, 1, 180.0, Unit::Kg, 3);

        assert_eq!(m.copy_last_set(id).unwrap(), 2);
        let copy = &m.get(id).unwrap().sets()[1];
        assert_eq!((copy.weight, copy.unit, copy.reps), (180.0, Unit::Kg, 3));
    }

    #[test]
    fn test_sequences_stay_contiguous() {
        let mut m = model();
        let (id, _) = m.add_exercise("Press").unwrap();
        for _ in 0..5 {
            m.add_set(id).unwrap();
        }
        assert_eq!(sequences(&m, id), vec![1, 2, 3, 4, 5, 6]);

        m.delete_set(id, 3).unwrap();
        m.delete_set(id, 1).unwrap();
        assert_eq!(sequences(&m, id), vec![1, 2, 3, 4]);

        m.add_set(id).unwrap();
        m.delete_set(id, 5).unwrap();
        m.delete_set(id, 2).unwrap();
        assert_eq!(sequences(&m, id), vec![1, 2, 3]);
    }

    #[test]
    fn test_delete_only_set_removes_exercise() {
        let mut m = model();
        let (a, _) = m.add_exercise("A").unwrap();
        let (b, _) = m.add_exercise("B").unwrap();

        assert_eq!(m.delete_set(a, 1).unwrap(), SetDeletion::ExerciseRemoved);
        assert!(!m.contains(a));
        assert_eq!(m.ids(), &[b]);
    }

    #[test]
    fn test_delete_unknown_set() {
        let mut m = model();
        let (id, _) = m.add_exercise("A").unwrap();
        assert!(matches!(m.delete_set(id, 0), Err(Error::UnknownSet { .. })));
        assert!(matches!(m.delete_set(id, 2), Err(Error::UnknownSet { .. })));
        assert_eq!(sequences(&m, id), vec![1]);
    }

    #[test]
    fn test_mixed_unit_volume() {
        let mut m = model();
        let (id, _) = m.add_exercise("Bench").unwrap();
        set(&mut m, id, 1, 100.0, Unit::Kg, 5);
        m.add_set(id).unwrap();
        set(&mut m, id, 2, 10.0, Unit::Lb, 10);

        assert_eq!(m.exercise_volume(id).unwrap(), 545.36);
        assert_eq!(m.daily_total_volume(), 545.36);
    }

    #[test]
    fn test_daily_total_rounds_once() {
        let mut m = model();
        // each exercise is 4.5359237 kg; per-exercise rounding would give 4.54 * 3 = 13.62
        for name in ["A", "B", "C"] {
            let (id, _) = m.add_exercise(name).unwrap();
            set(&mut m, id, 1, 1.0, Unit::Lb, 10);
        }
        assert_eq!(m.daily_total_volume(), 13.61);

        let per_exercise: f64 = m
            .ids()
            .iter()
            .map(|id| m.exercise_volume(*id).unwrap())
            .sum();
        assert!((per_exercise - m.daily_total_volume()).abs() <= 0.01 + 1e-9);
    }

    #[test]
    fn test_update_set_rejects_negative_weight() {
        let mut m = model();
        let (id, _) = m.add_exercise("A").unwrap();
        let update = SetUpdate {
            weight: Some(-5.0),
            reps: Some(3),
            ..Default::default()
        };
        assert!(matches!(m.update_set(id, 1, update), Err(Error::Validation(_))));
        assert_eq!(m.get(id).unwrap().sets()[0].reps, 0);
    }

    #[test]
    fn test_move_exercise() {
        let mut m = model();
        let (a, _) = m.add_exercise("A").unwrap();
        let (b, _) = m.add_exercise("B").unwrap();
        let (c, _) = m.add_exercise("C").unwrap();
        set(&mut m, a, 1, 50.0, Unit::Kg, 10);
        let before = m.daily_total_volume();

        m.move_exercise(a, 2).unwrap();
        assert_eq!(m.ids(), &[b, c, a]);
        assert_eq!(m.daily_total_volume(), before);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn test_move_out_of_range_fails_loudly() {
        let mut m = model();
        let (a, _) = m.add_exercise("A").unwrap();
        let _ = m.move_exercise(a, 3);
    }

    #[test]
    fn test_payload_skips_blank_sets() {
        let mut m = model();
        let (a, _) = m.add_exercise("Squat").unwrap();
        set(&mut m, a, 1, 100.0, Unit::Kg, 5);
        m.add_set(a).unwrap();
        set(&mut m, a, 2, 0.0, Unit::Kg, 0);
        m.add_set(a).unwrap();
        set(&mut m, a, 3, 0.0, Unit::Kg, 12);
        m.set_note(a, "felt easy").unwrap();

        let (b, _) = m.add_exercise("Row").unwrap();
        set(&mut m, b, 1, 20.0, Unit::Lb, 0);

        let now = Utc.with_ymd_and_hms(2024, 5, 20, 14, 30, 0).unwrap();
        let payload = m.to_persistable_payload(date(), &now);

        assert_eq!(payload.len(), 3);
        assert_eq!(payload[0].set, 1);
        assert_eq!(payload[1].set, 3);
        assert_eq!(payload[1].reps, 12);
        assert_eq!(payload[0].note, "felt easy");
        assert_eq!(payload[2].motion, "Row");
        assert!((payload[2].weight_in_kg - 9.0718474).abs() < 1e-9);

        let stamp = payload[0].date;
        assert_eq!(stamp.date_naive(), date());
        assert_eq!(stamp.time(), NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert_eq!(stamp.hour(), 14);
    }

    #[test]
    fn test_stale_lookup_is_ignored() {
        let mut m = model();
        let (a, lookup) = m.add_exercise("Bench").unwrap();
        let perf = Some(LastPerformance {
            weight_kg: 90.0,
            reps: 5,
        });

        let renewed = m.renew_lookup(a).unwrap();
        assert!(!m.apply_performance(&lookup, perf));
        assert!(m.get(a).unwrap().last_performance().is_none());

        assert!(m.apply_performance(&renewed, perf));
        assert_eq!(m.get(a).unwrap().last_performance(), perf);

        m.delete_exercise(a).unwrap();
        assert!(!m.apply_performance(&renewed, perf));
        assert!(m.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut m = model();
        let (a, _) = m.add_exercise("A").unwrap();
        set(&mut m, a, 1, 10.0, Unit::Kg, 10);
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.daily_total_volume(), 0.0);
    }

    /// Zone that skips 02:00-03:00 local on 2024-03-31 (+01:00 -> +02:00)
    #[derive(Clone, Copy, Debug)]
    struct SpringForward;

    impl SpringForward {
        fn switch_day() -> NaiveDate {
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
        }

        fn winter() -> FixedOffset {
            FixedOffset::east_opt(3600).unwrap()
        }

        fn summer() -> FixedOffset {
            FixedOffset::east_opt(7200).unwrap()
        }
    }

    impl TimeZone for SpringForward {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            SpringForward
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            if *local < Self::switch_day() {
                LocalResult::Single(Self::winter())
            } else {
                LocalResult::Single(Self::summer())
            }
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let day = Self::switch_day();
            if local.date() == day && local.hour() == 2 {
                LocalResult::None
            } else if local.date() < day || (local.date() == day && local.hour() < 2) {
                LocalResult::Single(Self::winter())
            } else {
                LocalResult::Single(Self::summer())
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            if *utc < Self::switch_day() {
                Self::winter()
            } else {
                Self::summer()
            }
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            let switch = Self::switch_day().and_hms_opt(1, 0, 0).unwrap();
            if *utc < switch {
                Self::winter()
            } else {
                Self::summer()
            }
        }
    }

    #[test]
    fn test_payload_keeps_session_date_in_dst_gap() {
        let mut m = SessionModel::new(SpringForward::switch_day(), Unit::Kg);
        let (a, _) = m.add_exercise("Squat").unwrap();
        set(&mut m, a, 1, 100.0, Unit::Kg, 5);

        // 02:30 local on another summer day
        let utc = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 30, 0)
            .unwrap();
        let now = SpringForward.from_utc_datetime(&utc);
        assert_eq!(now.hour(), 2);

        let payload = m.to_persistable_payload(SpringForward::switch_day(), &now);
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].date.date_naive(), SpringForward::switch_day());
        // 03:30 at +02:00
        assert_eq!(payload[0].date.hour(), 1);
        assert_eq!(payload[0].date.minute(), 30);
    }

    #[derive(Clone, Debug)]
    enum SetOp {
        Add,
        Copy,
        Delete(usize),
    }

    fn set_op() -> impl Strategy<Value = SetOp> {
        prop_oneof![
            Just(SetOp::Add),
            Just(SetOp::Copy),
            (1usize..8).prop_map(SetOp::Delete),
        ]
    }

    fn logged_set() -> impl Strategy<Value = (f64, Unit, u32)> {
        (
            0.0f64..500.0,
            prop_oneof![Just(Unit::Kg), Just(Unit::Lb)],
            0u32..30,
        )
    }

    proptest! {
        #[test]
        fn test_sequences_contiguous_for_any_ops(ops in prop::collection::vec(set_op(), 1..40)) {
            let mut m = model();
            let (mut id, _) = m.add_exercise("Press").unwrap();
            let mut count = 1usize;

            for op in ops {
                match op {
                    SetOp::Add => {
                        prop_assert_eq!(m.add_set(id).unwrap(), count + 1);
                        count += 1;
                    }
                    SetOp::Copy => {
                        prop_assert_eq!(m.copy_last_set(id).unwrap(), count + 1);
                        count += 1;
                    }
                    SetOp::Delete(seq) if seq <= count => {
                        let outcome = m.delete_set(id, seq).unwrap();
                        count -= 1;
                        if count == 0 {
                            prop_assert_eq!(outcome, SetDeletion::ExerciseRemoved);
                            prop_assert!(!m.contains(id));
                            prop_assert!(m.is_empty());
                            id = m.add_exercise("Press").unwrap().0;
                            count = 1;
                        } else {
                            prop_assert_eq!(outcome, SetDeletion::SetRemoved);
                        }
                    }
                    SetOp::Delete(seq) => {
                        let is_unknown_set = matches!(
                            m.delete_set(id, seq),
                            Err(Error::UnknownSet { .. })
                        );
                        prop_assert!(is_unknown_set);
                    }
                }
                let expected: Vec<usize> = (1..=count).collect();
                prop_assert_eq!(sequences(&m, id), expected);
            }
        }

        #[test]
        fn test_daily_total_matches_exercise_volumes(
            exercises in prop::collection::vec(prop::collection::vec(logged_set(), 1..6), 1..6)
        ) {
            let mut m = model();
            let mut exact = 0.0;

            for (i, sets) in exercises.iter().enumerate() {
                let (id, _) = m.add_exercise(&format!("Lift {}", i)).unwrap();
                for (seq, (weight, unit, reps)) in sets.iter().enumerate() {
                    if seq > 0 {
                        m.add_set(id).unwrap();
                    }
                    set(&mut m, id, seq + 1, *weight, *unit, *reps);
                    exact += f64::from(*reps) * canonical_kg(*weight, *unit);
                }
            }

            let total = m.daily_total_volume();
            let per_exercise: f64 = m.ids().iter().map(|id| m.exercise_volume(*id).unwrap()).sum();
            let tolerance = 0.005 * (exercises.len() + 1) as f64 + 1e-6;

            prop_assert!((total - exact).abs() <= 0.005 + 1e-6);
            prop_assert!((total - per_exercise).abs() <= tolerance.max(0.01));
        }
    }
}
