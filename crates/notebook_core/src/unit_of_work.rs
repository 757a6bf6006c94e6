//! Unit of work: batched change tracking and ordered commit.
//!
//! # Responsibility
//! - Record the pending action (new/dirty/removed) of each observed object.
//! - Replay pending actions through the registry on commit.
//!
//! # Invariants
//! - A unit of work is an explicit value owned by one logical transaction.
//!   Nothing is shared process-wide.
//! - Commit order is New, then Dirty, then Removed, independent of mark order.
//! - Within New, an object is inserted before pending objects that reference
//!   it, and its assigned id is written into those references.
//! - Pending actions are cleared by every commit, successful or not.
//! - Under `CommitPolicy::Atomic` a failed commit leaves storage untouched.

use crate::db::DbError;
use crate::identity::{EntityId, ObjectState};
use crate::mapper::MapperError;
use crate::model::{Category, Entity, EntityKind};
use crate::registry::{MapperRegistry, RegistryError};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type UnitOfWorkResult<T> = Result<T, UnitOfWorkError>;

/// How commit failures affect operations already applied in the same commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Whole commit in one storage transaction; any failure rolls it back.
    #[default]
    Atomic,
    /// Each mapper call commits on its own; earlier successes stay.
    BestEffort,
}

impl CommitPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::BestEffort => "best_effort",
        }
    }
}

/// One mapper operation executed by a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedOperation {
    pub state: ObjectState,
    pub kind: EntityKind,
    pub id: EntityId,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Default)]
pub struct CommitReport {
    /// Inserted objects carrying their assigned ids.
    pub inserted: Vec<Entity>,
    pub updated: Vec<Entity>,
    pub removed: Vec<Entity>,
    /// Applied operations in execution order.
    pub operations: Vec<AppliedOperation>,
}

impl CommitReport {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// First failure that stopped a commit.
#[derive(Debug)]
pub enum CommitFailure {
    Registry(RegistryError),
    Mapper(MapperError),
    Transaction(DbError),
    /// An unsaved reference matches more than one pending new object.
    AmbiguousReference { kind: EntityKind, name: String },
}

impl Display for CommitFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry(err) => write!(f, "{err}"),
            Self::Mapper(err) => write!(f, "{err}"),
            Self::Transaction(err) => write!(f, "transaction failed: {err}"),
            Self::AmbiguousReference { kind, name } => write!(
                f,
                "unsaved {kind} reference '{name}' matches several pending new objects"
            ),
        }
    }
}

impl Error for CommitFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            Self::Mapper(err) => Some(err),
            Self::Transaction(err) => Some(err),
            Self::AmbiguousReference { .. } => None,
        }
    }
}

impl From<RegistryError> for CommitFailure {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<MapperError> for CommitFailure {
    fn from(value: MapperError) -> Self {
        Self::Mapper(value)
    }
}

impl From<DbError> for CommitFailure {
    fn from(value: DbError) -> Self {
        Self::Transaction(value)
    }
}

/// Unit-of-work failure.
#[derive(Debug)]
pub enum UnitOfWorkError {
    /// Dirty/removed marks need an object that already has an id.
    NotPersisted(EntityKind),
    /// Commit stopped at `source`.
    ///
    /// `applied` lists operations that succeeded before the failure. When
    /// `rolled_back` is true none of them remain in storage.
    CommitAborted {
        applied: Vec<AppliedOperation>,
        rolled_back: bool,
        source: CommitFailure,
    },
}

impl Display for UnitOfWorkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPersisted(kind) => {
                write!(f, "cannot track {kind} without storage identity")
            }
            Self::CommitAborted {
                applied,
                rolled_back,
                source,
            } => write!(
                f,
                "commit aborted after {} applied operation(s) (rolled_back={rolled_back}): {source}",
                applied.len()
            ),
        }
    }
}

impl Error for UnitOfWorkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CommitAborted { source, .. } => Some(source),
            Self::NotPersisted(_) => None,
        }
    }
}

/// Handle to one pending entry of a unit of work.
///
/// Unsaved readers and categories have no identity to look them up by, so
/// callers keep the key returned by the `mark_*` call instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingKey(u64);

#[derive(Debug)]
struct Tracked {
    key: PendingKey,
    entity: Entity,
    state: ObjectState,
}

/// Pending changes of one logical transaction.
pub struct UnitOfWork<'s> {
    registry: MapperRegistry<'s>,
    policy: CommitPolicy,
    pending: Vec<Tracked>,
    next_key: u64,
}

impl<'s> UnitOfWork<'s> {
    /// Starts an empty unit of work with the atomic policy.
    pub fn new(registry: MapperRegistry<'s>) -> Self {
        Self::with_policy(registry, CommitPolicy::default())
    }

    pub fn with_policy(registry: MapperRegistry<'s>, policy: CommitPolicy) -> Self {
        Self {
            registry,
            policy,
            pending: Vec::new(),
            next_key: 0,
        }
    }

    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    pub fn registry(&self) -> MapperRegistry<'s> {
        self.registry
    }

    pub fn mark_new(&mut self, entity: impl Into<Entity>) -> PendingKey {
        self.track(entity.into(), ObjectState::New)
    }

    pub fn mark_dirty(&mut self, entity: impl Into<Entity>) -> UnitOfWorkResult<PendingKey> {
        self.track_persisted(entity.into(), ObjectState::Dirty)
    }

    pub fn mark_removed(&mut self, entity: impl Into<Entity>) -> UnitOfWorkResult<PendingKey> {
        self.track_persisted(entity.into(), ObjectState::Removed)
    }

    /// Pending state of `entity`; `Clean` when it is not tracked.
    ///
    /// Only persisted objects and unsaved notes can be found this way. Use
    /// [`UnitOfWork::state_by_key`] for other unsaved objects.
    pub fn state_of(&self, entity: &Entity) -> ObjectState {
        self.position(entity)
            .map_or(ObjectState::Clean, |index| self.pending[index].state)
    }

    /// Pending state of the entry behind `key`; `Clean` once committed.
    pub fn state_by_key(&self, key: PendingKey) -> ObjectState {
        self.pending
            .iter()
            .find(|tracked| tracked.key == key)
            .map_or(ObjectState::Clean, |tracked| tracked.state)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every pending action without touching storage.
    pub fn discard(&mut self) {
        let dropped = self.pending.len();
        self.pending.clear();
        debug!("event=uow_discard module=unit_of_work status=ok dropped={dropped}");
    }

    /// Applies pending actions in New, Dirty, Removed order.
    pub fn commit(&mut self) -> UnitOfWorkResult<CommitReport> {
        let started_at = Instant::now();
        let batch = std::mem::take(&mut self.pending);
        info!(
            "event=uow_commit module=unit_of_work status=start policy={} pending={}",
            self.policy.as_str(),
            batch.len()
        );

        let result = match self.policy {
            CommitPolicy::Atomic => self.commit_atomic(batch),
            CommitPolicy::BestEffort => {
                let mut report = CommitReport::default();
                apply_batch(self.registry, batch, &mut report)
                    .map(|()| report)
                    .map_err(|(report, source)| abort(report, false, source))
            }
        };

        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(report) => info!(
                "event=uow_commit module=unit_of_work status=ok policy={} inserted={} updated={} removed={} duration_ms={duration_ms}",
                self.policy.as_str(),
                report.inserted.len(),
                report.updated.len(),
                report.removed.len()
            ),
            Err(err) => error!(
                "event=uow_commit module=unit_of_work status=error policy={} duration_ms={duration_ms} error={err}",
                self.policy.as_str()
            ),
        }
        result
    }

    fn commit_atomic(&self, batch: Vec<Tracked>) -> UnitOfWorkResult<CommitReport> {
        let storage = self.registry.storage();
        if storage.in_transaction() {
            // Joined the caller's transaction; the caller commits or rolls back.
            let mut report = CommitReport::default();
            return apply_batch(self.registry, batch, &mut report)
                .map(|()| report)
                .map_err(|(report, source)| abort(report, false, source));
        }

        let tx = storage
            .begin()
            .map_err(|err| abort(CommitReport::default(), false, err.into()))?;
        let mut report = CommitReport::default();
        if let Err((report, source)) = apply_batch(self.registry, batch, &mut report) {
            let rolled_back = match tx.rollback() {
                Ok(()) => true,
                Err(err) => {
                    warn!("event=uow_rollback module=unit_of_work status=error error={err}");
                    false
                }
            };
            if rolled_back {
                warn!(
                    "event=uow_rollback module=unit_of_work status=ok discarded={}",
                    report.operations.len()
                );
            }
            return Err(abort(report, rolled_back, source));
        }
        tx.commit()
            .map_err(|err| abort(report.clone(), true, err.into()))?;
        Ok(report)
    }

    fn track(&mut self, entity: Entity, state: ObjectState) -> PendingKey {
        match self.position(&entity) {
            Some(index) => {
                let tracked = &mut self.pending[index];
                if tracked.state != state {
                    debug!(
                        "event=uow_mark module=unit_of_work kind={} from={} to={}",
                        entity.kind(),
                        tracked.state.as_str(),
                        state.as_str()
                    );
                }
                tracked.entity = entity;
                tracked.state = state;
                tracked.key
            }
            None => {
                let key = PendingKey(self.next_key);
                self.next_key += 1;
                self.pending.push(Tracked { key, entity, state });
                key
            }
        }
    }

    fn track_persisted(
        &mut self,
        entity: Entity,
        state: ObjectState,
    ) -> UnitOfWorkResult<PendingKey> {
        if entity.id().is_none() {
            return Err(UnitOfWorkError::NotPersisted(entity.kind()));
        }
        Ok(self.track(entity, state))
    }

    fn position(&self, entity: &Entity) -> Option<usize> {
        self.pending
            .iter()
            .position(|tracked| tracked.entity.same_object(entity))
    }
}

fn abort(report: CommitReport, rolled_back: bool, source: CommitFailure) -> UnitOfWorkError {
    UnitOfWorkError::CommitAborted {
        applied: report.operations,
        rolled_back,
        source,
    }
}

/// Reference field of a pending object that may point at an unsaved object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefSlot {
    NoteCategory,
    NoteReader,
    CategoryParent,
}

impl RefSlot {
    const ALL: [RefSlot; 3] = [
        RefSlot::NoteCategory,
        RefSlot::NoteReader,
        RefSlot::CategoryParent,
    ];

    fn kind(self) -> EntityKind {
        match self {
            Self::NoteCategory | Self::CategoryParent => EntityKind::Category,
            Self::NoteReader => EntityKind::Reader,
        }
    }

    /// Name of the referenced object when the reference has no id yet.
    fn unsaved_target(self, entity: &Entity) -> Option<&str> {
        match (self, entity) {
            (Self::NoteCategory, Entity::Note(note)) if note.category.id.is_none() => {
                Some(note.category.name.as_str())
            }
            (Self::NoteReader, Entity::Note(note)) => note
                .reader
                .as_ref()
                .filter(|reader| reader.id.is_none())
                .map(|reader| reader.name.as_str()),
            (Self::CategoryParent, Entity::Category(category)) => category
                .parent
                .as_deref()
                .filter(|parent| parent.id.is_none())
                .map(|parent| parent.name.as_str()),
            _ => None,
        }
    }

    /// Whether the unsaved reference of `entity` denotes `candidate`.
    fn resolves_to(self, entity: &Entity, candidate: &Entity) -> bool {
        if candidate.id().is_some() {
            return false;
        }
        match (self, entity, candidate) {
            (Self::CategoryParent, Entity::Category(category), Entity::Category(candidate)) => {
                category
                    .parent
                    .as_deref()
                    .is_some_and(|parent| same_unsaved_lineage(parent, candidate))
            }
            (Self::NoteCategory, _, Entity::Category(candidate)) => {
                self.unsaved_target(entity) == Some(candidate.name.as_str())
            }
            (Self::NoteReader, _, Entity::Reader(candidate)) => {
                self.unsaved_target(entity) == Some(candidate.name.as_str())
            }
            _ => false,
        }
    }

    fn assign(self, entity: &mut Entity, id: EntityId) {
        match (self, entity) {
            (Self::NoteCategory, Entity::Note(note)) => note.category.id = Some(id),
            (Self::NoteReader, Entity::Note(note)) => {
                if let Some(reader) = note.reader.as_mut() {
                    reader.id = Some(id);
                }
            }
            (Self::CategoryParent, Entity::Category(category)) => {
                if let Some(parent) = category.parent.as_deref_mut() {
                    parent.id = Some(id);
                }
            }
            _ => {}
        }
    }
}

/// Same name and same parent chain, comparing ids where they exist.
fn same_unsaved_lineage(left: &Category, right: &Category) -> bool {
    if left.name != right.name {
        return false;
    }
    match (left.parent.as_deref(), right.parent.as_deref()) {
        (None, None) => true,
        (Some(left), Some(right)) => match (left.id, right.id) {
            (Some(left), Some(right)) => left == right,
            (None, None) => same_unsaved_lineage(left, right),
            _ => false,
        },
        _ => false,
    }
}

/// Pending entry `dependent` refers through `slot` to pending new `provider`.
#[derive(Debug, Clone, Copy)]
struct PendingLink {
    dependent: usize,
    slot: RefSlot,
    provider: usize,
}

fn pending_links(batch: &[Tracked]) -> Result<Vec<PendingLink>, CommitFailure> {
    let mut links = Vec::new();
    for (dependent, tracked) in batch.iter().enumerate() {
        for slot in RefSlot::ALL {
            let Some(name) = slot.unsaved_target(&tracked.entity) else {
                continue;
            };
            let providers = batch
                .iter()
                .enumerate()
                .filter(|(index, candidate)| {
                    *index != dependent
                        && candidate.state == ObjectState::New
                        && slot.resolves_to(&tracked.entity, &candidate.entity)
                })
                .map(|(index, _)| index)
                .collect::<Vec<_>>();
            match providers.as_slice() {
                [] => {}
                [provider] => links.push(PendingLink {
                    dependent,
                    slot,
                    provider: *provider,
                }),
                _ => {
                    return Err(CommitFailure::AmbiguousReference {
                        kind: slot.kind(),
                        name: name.to_string(),
                    })
                }
            }
        }
    }
    Ok(links)
}

/// Batch indices in execution order.
///
/// States follow `COMMIT_ORDER`. Inside one state mark order is kept, except
/// that a pending link's provider runs before its dependent.
fn commit_sequence(batch: &[Tracked], links: &[PendingLink]) -> Vec<usize> {
    let mut sequence = Vec::with_capacity(batch.len());
    for state in ObjectState::COMMIT_ORDER {
        let mut waiting = batch
            .iter()
            .enumerate()
            .filter(|(_, tracked)| tracked.state == state)
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        while !waiting.is_empty() {
            let ready = waiting
                .iter()
                .position(|index| {
                    !links
                        .iter()
                        .any(|link| link.dependent == *index && waiting.contains(&link.provider))
                })
                .unwrap_or(0);
            sequence.push(waiting.remove(ready));
        }
    }
    sequence
}

/// Runs the batch in commit order. On failure returns the partial report.
fn apply_batch(
    registry: MapperRegistry<'_>,
    batch: Vec<Tracked>,
    report: &mut CommitReport,
) -> Result<(), (CommitReport, CommitFailure)> {
    let links = pending_links(&batch).map_err(|source| (std::mem::take(report), source))?;
    let sequence = commit_sequence(&batch, &links);
    let mut slots = batch.into_iter().map(Some).collect::<Vec<_>>();

    for index in sequence {
        let Some(tracked) = slots[index].take() else {
            continue;
        };
        let inserted = tracked.state == ObjectState::New;
        let id = match apply_one(registry, tracked, report) {
            Ok(id) => id,
            Err(source) => return Err((std::mem::take(report), source)),
        };
        let Some(id) = id.filter(|_| inserted) else {
            continue;
        };
        for link in links.iter().filter(|link| link.provider == index) {
            if let Some(dependent) = slots[link.dependent].as_mut() {
                link.slot.assign(&mut dependent.entity, id);
            }
        }
    }
    Ok(())
}

fn apply_one(
    registry: MapperRegistry<'_>,
    tracked: Tracked,
    report: &mut CommitReport,
) -> Result<Option<EntityId>, CommitFailure> {
    let Tracked {
        mut entity, state, ..
    } = tracked;
    let mapper = registry.for_instance(&entity)?;
    let id = match state {
        ObjectState::New => mapper.insert(&mut entity)?,
        ObjectState::Dirty => {
            mapper.update(&entity)?;
            entity.id().ok_or(MapperError::NotPersisted(entity.kind()))?
        }
        ObjectState::Removed => {
            mapper.delete(&entity)?;
            entity.id().ok_or(MapperError::NotPersisted(entity.kind()))?
        }
        ObjectState::Clean => return Ok(None),
    };

    debug!(
        "event=uow_apply module=unit_of_work status=ok state={} kind={} id={id}",
        state.as_str(),
        entity.kind()
    );
    report.operations.push(AppliedOperation {
        state,
        kind: entity.kind(),
        id,
    });
    match state {
        ObjectState::New => report.inserted.push(entity),
        ObjectState::Dirty => report.updated.push(entity),
        ObjectState::Removed => report.removed.push(entity),
        ObjectState::Clean => {}
    }
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::{CommitPolicy, UnitOfWork, UnitOfWorkError};
    use crate::db::Storage;
    use crate::identity::ObjectState;
    use crate::mapper::ReaderMapper;
    use crate::model::{Entity, Reader};
    use crate::registry::MapperRegistry;

    fn saved_reader(id: i64, name: &str) -> Reader {
        let mut reader = Reader::new(name);
        reader.id = Some(id);
        reader
    }

    #[test]
    fn remarking_same_object_overwrites_intent() {
        let storage = Storage::memory();
        let mut uow = UnitOfWork::new(MapperRegistry::new(&storage));
        uow.mark_dirty(saved_reader(1, "a")).expect("dirty");
        uow.mark_dirty(saved_reader(1, "a2")).expect("dirty again");
        assert_eq!(uow.pending_len(), 1);

        uow.mark_removed(saved_reader(1, "a2")).expect("removed");
        assert_eq!(uow.pending_len(), 1);
        assert_eq!(
            uow.state_of(&Entity::from(saved_reader(1, "whatever"))),
            ObjectState::Removed
        );
    }

    #[test]
    fn unsaved_objects_cannot_be_marked_dirty_or_removed() {
        let storage = Storage::memory();
        let mut uow = UnitOfWork::new(MapperRegistry::new(&storage));
        assert!(matches!(
            uow.mark_removed(Reader::new("x")),
            Err(UnitOfWorkError::NotPersisted(_))
        ));
        assert!(uow.is_empty());
    }

    #[test]
    fn discard_clears_pending_without_writes() {
        let storage = Storage::memory();
        let registry = MapperRegistry::new(&storage);
        let mut uow = UnitOfWork::with_policy(registry, CommitPolicy::BestEffort);
        uow.mark_new(Reader::new("x"));
        uow.discard();
        let report = uow.commit().expect("empty commit");
        assert!(report.is_empty());
        assert!(registry.readers().all().expect("all").is_empty());
    }
}
