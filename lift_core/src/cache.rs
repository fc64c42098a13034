//! Per-user memoization of server-derived data.
//!
//! Four partitions are cached independently: analysis, PRs, photo history
//! and templates. Every cached value records the user it was fetched for and
//! is only served while that user is active. Writes invalidate exactly the
//! partitions they can affect (see [`CacheAction::invalidates`]); switching
//! user drops everything.
//!
//! Remote reads go through a [`FetchTicket`]: the ticket remembers the user
//! and the partition epoch at the time the request went out, and a result is
//! only stored if neither changed while the call was in flight.

use crate::{AnalysisData, PhotoRecord, PrData, Templates, UserId};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Partitions
// ============================================================================

/// The independently invalidated slices of cached data
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    Analysis,
    Prs,
    PhotoHistory,
    Templates,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 4] = [
        PartitionKind::Analysis,
        PartitionKind::Prs,
        PartitionKind::PhotoHistory,
        PartitionKind::Templates,
    ];
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartitionKind::Analysis => "analysis",
            PartitionKind::Prs => "prs",
            PartitionKind::PhotoHistory => "photo_history",
            PartitionKind::Templates => "templates",
        };
        f.write_str(name)
    }
}

/// Successful writes that change server-side truth
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheAction {
    SaveWorkout,
    ProcessPrs,
    SaveBodyPhotos,
    SaveProfile,
    SaveTemplate,
    DeleteTemplate,
}

impl CacheAction {
    /// Partitions whose cached value may be wrong after this action
    pub fn invalidates(self) -> &'static [PartitionKind] {
        match self {
            CacheAction::SaveWorkout | CacheAction::ProcessPrs => {
                &[PartitionKind::Analysis, PartitionKind::Prs]
            }
            CacheAction::SaveBodyPhotos => &[PartitionKind::Analysis, PartitionKind::PhotoHistory],
            CacheAction::SaveProfile => &[PartitionKind::Analysis],
            CacheAction::SaveTemplate | CacheAction::DeleteTemplate => &[PartitionKind::Templates],
        }
    }
}

/// A memoized value and who it belongs to
#[derive(Debug)]
pub struct CachedResult<T> {
    pub data: Arc<T>,
    pub owner: UserId,
    /// Logical timestamp, increasing with every store
    pub fetched_at: u64,
}

/// One partition: absent, or valid for a specific user
#[derive(Debug)]
pub struct Partition<T> {
    slot: Option<CachedResult<T>>,
    epoch: u64,
}

impl<T> Default for Partition<T> {
    fn default() -> Self {
        Self {
            slot: None,
            epoch: 0,
        }
    }
}

impl<T> Partition<T> {
    fn get(&self, user: &UserId) -> Option<&CachedResult<T>> {
        self.slot.as_ref().filter(|c| &c.owner == user)
    }

    fn invalidate(&mut self) {
        self.slot = None;
        self.epoch += 1;
    }
}

/// Maps a cached data type to its partition
pub trait PartitionData: Sized {
    const KIND: PartitionKind;

    fn partition(cache: &ResultCache) -> &Partition<Self>;

    fn partition_mut(cache: &mut ResultCache) -> &mut Partition<Self>;
}

impl PartitionData for AnalysisData {
    const KIND: PartitionKind = PartitionKind::Analysis;

    fn partition(cache: &ResultCache) -> &Partition<Self> {
        &cache.analysis
    }

    fn partition_mut(cache: &mut ResultCache) -> &mut Partition<Self> {
        &mut cache.analysis
    }
}

impl PartitionData for PrData {
    const KIND: PartitionKind = PartitionKind::Prs;

    fn partition(cache: &ResultCache) -> &Partition<Self> {
        &cache.prs
    }

    fn partition_mut(cache: &mut ResultCache) -> &mut Partition<Self> {
        &mut cache.prs
    }
}

impl PartitionData for Vec<PhotoRecord> {
    const KIND: PartitionKind = PartitionKind::PhotoHistory;

    fn partition(cache: &ResultCache) -> &Partition<Self> {
        &cache.photo_history
    }

    fn partition_mut(cache: &mut ResultCache) -> &mut Partition<Self> {
        &mut cache.photo_history
    }
}

impl PartitionData for Templates {
    const KIND: PartitionKind = PartitionKind::Templates;

    fn partition(cache: &ResultCache) -> &Partition<Self> {
        &cache.templates
    }

    fn partition_mut(cache: &mut ResultCache) -> &mut Partition<Self> {
        &mut cache.templates
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Issued when a remote read starts; required to store its result
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    pub kind: PartitionKind,
    pub user: UserId,
    epoch: u64,
}

/// Which partitions currently hold a value for the active user
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheFreshness {
    pub analysis: bool,
    pub prs: bool,
    pub photo_history: bool,
    pub templates: bool,
}

#[derive(Debug, Default)]
pub struct ResultCache {
    active_user: Option<UserId>,
    clock: u64,
    analysis: Partition<AnalysisData>,
    prs: Partition<PrData>,
    photo_history: Partition<Vec<PhotoRecord>>,
    templates: Partition<Templates>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_user(&self) -> Option<&UserId> {
        self.active_user.as_ref()
    }

    /// Make `user` the active user. Every partition is dropped, even when
    /// switching to the same user.
    pub fn switch_user(&mut self, user: UserId) {
        tracing::info!("Active user switched to {}", user);
        self.invalidate_all();
        self.active_user = Some(user);
    }

    /// Forget the active user (logout)
    pub fn clear_user(&mut self) {
        self.invalidate_all();
        self.active_user = None;
    }

    pub fn invalidate(&mut self, kind: PartitionKind) {
        match kind {
            PartitionKind::Analysis => self.analysis.invalidate(),
            PartitionKind::Prs => self.prs.invalidate(),
            PartitionKind::PhotoHistory => self.photo_history.invalidate(),
            PartitionKind::Templates => self.templates.invalidate(),
        }
        tracing::debug!("Invalidated {} partition", kind);
    }

    pub fn invalidate_all(&mut self) {
        for kind in PartitionKind::ALL {
            self.invalidate(kind);
        }
    }

    /// Apply the invalidation rules for a successful write
    pub fn apply(&mut self, action: CacheAction) {
        for kind in action.invalidates() {
            self.invalidate(*kind);
        }
    }

    /// Cached value for the active user, if valid
    pub fn get<T: PartitionData>(&self) -> Option<Arc<T>> {
        self.entry::<T>().map(|c| Arc::clone(&c.data))
    }

    /// Cached value with its metadata, if valid for the active user
    pub fn entry<T: PartitionData>(&self) -> Option<&CachedResult<T>> {
        let user = self.active_user.as_ref()?;
        T::partition(self).get(user)
    }

    pub fn is_valid(&self, kind: PartitionKind) -> bool {
        match kind {
            PartitionKind::Analysis => self.entry::<AnalysisData>().is_some(),
            PartitionKind::Prs => self.entry::<PrData>().is_some(),
            PartitionKind::PhotoHistory => self.entry::<Vec<PhotoRecord>>().is_some(),
            PartitionKind::Templates => self.entry::<Templates>().is_some(),
        }
    }

    pub fn freshness(&self) -> CacheFreshness {
        CacheFreshness {
            analysis: self.is_valid(PartitionKind::Analysis),
            prs: self.is_valid(PartitionKind::Prs),
            photo_history: self.is_valid(PartitionKind::PhotoHistory),
            templates: self.is_valid(PartitionKind::Templates),
        }
    }

    /// Start a remote read for `T`'s partition. `None` without an active user.
    pub fn begin_fetch<T: PartitionData>(&self) -> Option<FetchTicket> {
        let user = self.active_user.clone()?;
        Some(FetchTicket {
            kind: T::KIND,
            user,
            epoch: T::partition(self).epoch,
        })
    }

    /// Finish a remote read. The value is memoized only if the ticket's user
    /// is still active and the partition was not invalidated meanwhile; the
    /// caller gets the data back either way.
    pub fn store<T: PartitionData>(&mut self, ticket: FetchTicket, data: T) -> Arc<T> {
        debug_assert_eq!(ticket.kind, T::KIND);
        let data = Arc::new(data);

        let current_user = self.active_user.as_ref() == Some(&ticket.user);
        let partition_epoch = T::partition(self).epoch;
        if !current_user || partition_epoch != ticket.epoch {
            tracing::warn!(
                "Discarding stale {} result fetched for {}",
                ticket.kind,
                ticket.user
            );
            return data;
        }

        self.clock += 1;
        let fetched_at = self.clock;
        T::partition_mut(self).slot = Some(CachedResult {
            data: Arc::clone(&data),
            owner: ticket.user,
            fetched_at,
        });
        data
    }
}
