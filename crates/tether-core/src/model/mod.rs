//! # Target Object Model
//!
//! A hierarchical, path-addressed tree of debuggable entities.
//!
//! ## Ownership
//!
//! [`ObjectModel::new`] returns two halves:
//!
//! - [`ObjectModel`]: a cheap, cloneable read handle. Lookups take a short read
//!   lock and clone `Arc`s out, so concurrent `resolve` calls for the same path
//!   return the same object and never mutate the tree.
//! - [`ModelWriter`]: the single writer, owned by the session's event pump.
//!   It applies [`ModelEvent`]s in order and republishes them to subscribers.
//!
//! ## Finding a suitable object
//!
//! Commands name a path, not an object. [`ObjectModel::suitable`] looks for
//! the capability on the object at that path and then on each ancestor
//! (nearest wins). If no ancestor qualifies it searches the descendants
//! breadth first, at most `search_depth` levels down, in key order.
//!
//! ```text
//! Sessions[0]                      Launchable, Attachable
//! └── Processes
//!     └── [4242]                   Resumable, Killable, ExecutionStateful
//!         └── Threads
//!             └── [1]              ExecutionStateful
//! ```
//!
//! Resuming `Sessions[0].Processes[4242].Threads[1]` finds the process; launching
//! at the same path finds the session.

mod object;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

pub use object::TargetObject;

use crate::breakpoints::BreakpointView;
use crate::capability::{Capability, CapabilityKind};
use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::events::{notification_channel, ModelEvent, ModelEventReceiver, ObjectSpec};
use crate::operation::{operation, Completer, Operation};
use crate::types::TargetPath;

type ObjectMap = BTreeMap<TargetPath, Arc<TargetObject>>;

#[derive(Default)]
struct ObjectWaiters
{
    closed: bool,
    pending: Vec<(TargetPath, Completer<Arc<TargetObject>>)>,
}

struct Shared
{
    objects: RwLock<ObjectMap>,
    waiters: Mutex<ObjectWaiters>,
    breakpoints: BreakpointView,
    notifications: broadcast::Sender<ModelEvent>,
    config: ModelConfig,
}

impl Shared
{
    fn read(&self) -> RwLockReadGuard<'_, ObjectMap>
    {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn waiters(&self) -> MutexGuard<'_, ObjectWaiters>
    {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Objects at or below `path`, in key order.
fn subtree<'a>(objects: &'a ObjectMap, path: &'a TargetPath) -> impl Iterator<Item = (&'a TargetPath, &'a Arc<TargetObject>)>
{
    objects.range(path.clone()..).take_while(move |(candidate, _)| path.is_ancestor_of(candidate))
}

/// Read handle on the target model.
#[derive(Clone)]
pub struct ObjectModel
{
    shared: Arc<Shared>,
}

impl ObjectModel
{
    /// Create an empty model and its single writer.
    #[must_use]
    pub fn new(config: ModelConfig) -> (ObjectModel, ModelWriter)
    {
        let shared = Arc::new(Shared {
            objects: RwLock::new(BTreeMap::new()),
            waiters: Mutex::new(ObjectWaiters::default()),
            breakpoints: BreakpointView::new(),
            notifications: notification_channel(config.notification_capacity),
            config,
        });
        (
            ObjectModel {
                shared: shared.clone(),
            },
            ModelWriter { shared },
        )
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig
    {
        &self.shared.config
    }

    /// Object at `path`, if present.
    #[must_use]
    pub fn get(&self, path: &TargetPath) -> Option<Arc<TargetObject>>
    {
        self.shared.read().get(path).cloned()
    }

    /// Object at `path`.
    ///
    /// ## Errors
    ///
    /// `NotFound` if no object has that path.
    pub fn resolve(&self, path: &TargetPath) -> ModelResult<Arc<TargetObject>>
    {
        self.get(path)
            .ok_or_else(|| ModelError::NotFound(format!("no object at '{path}'")))
    }

    /// Whether the object at `path` exists and supports `kind`.
    #[must_use]
    pub fn supports(&self, path: &TargetPath, kind: CapabilityKind) -> bool
    {
        self.get(path).is_some_and(|object| object.supports(kind))
    }

    /// Direct children of `path`, in key order.
    #[must_use]
    pub fn children(&self, path: &TargetPath) -> Vec<Arc<TargetObject>>
    {
        let depth = path.len() + 1;
        let objects = self.shared.read();
        subtree(&objects, path)
            .filter(|(candidate, _)| candidate.len() == depth)
            .map(|(_, object)| object.clone())
            .collect()
    }

    /// Number of objects in the model.
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.shared.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.shared.read().is_empty()
    }

    /// Nearest object in scope of `path` that supports `kind`.
    ///
    /// ## Errors
    ///
    /// `NotFound` if neither `path`, its ancestors, nor its descendants within
    /// the configured search depth support `kind`.
    pub fn suitable_object(&self, kind: CapabilityKind, path: &TargetPath) -> ModelResult<Arc<TargetObject>>
    {
        let objects = self.shared.read();

        let found = path
            .ancestors()
            .find_map(|ancestor| objects.get(&ancestor).filter(|object| object.supports(kind)).cloned())
            .or_else(|| {
                let limit = path.len() + self.shared.config.search_depth;
                subtree(&objects, path)
                    .filter(|(candidate, object)| candidate.len() > path.len() && candidate.len() <= limit && object.supports(kind))
                    .min_by_key(|(candidate, _)| candidate.len())
                    .map(|(_, object)| object.clone())
            });

        match found {
            Some(object) => {
                trace!(%kind, requested = %path, found = %object.path(), "suitable object");
                Ok(object)
            }
            None => Err(ModelError::NotFound(format!("nothing supporting {kind} in scope of '{path}'"))),
        }
    }

    /// Capability handle of the nearest suitable object,
    /// e.g. `model.suitable::<dyn Resumable>(&path)`.
    ///
    /// ## Errors
    ///
    /// See [`suitable_object`](Self::suitable_object).
    pub fn suitable<C: Capability + ?Sized>(&self, path: &TargetPath) -> ModelResult<Arc<C>>
    {
        let object = self.suitable_object(C::KIND, path)?;
        object
            .capability::<C>()
            .ok_or_else(|| ModelError::NotFound(format!("{} lost its {} handle", object.path(), C::KIND)))
    }

    /// Resolves with the object at `path` once it exists.
    ///
    /// Completes immediately if the object is already present. Fails with
    /// `ObjectGone` if the model is closed first.
    #[must_use]
    pub fn wait_for_object(&self, path: &TargetPath) -> Operation<Arc<TargetObject>>
    {
        // The waiter lock is held across the lookup so an object added in
        // between is seen by the writer's waiter sweep.
        let mut waiters = self.shared.waiters();
        if waiters.closed {
            return Operation::failed(ModelError::ObjectGone(path.clone()));
        }
        if let Some(object) = self.get(path) {
            return Operation::ready(object);
        }
        waiters.pending.retain(|(_, completer)| !completer.is_cancelled());
        let (completer, op) = operation();
        waiters.pending.push((path.clone(), completer));
        op
    }

    /// Breakpoints reported by the backend.
    #[must_use]
    pub fn breakpoints(&self) -> &BreakpointView
    {
        &self.shared.breakpoints
    }

    /// Receive every event after it has been applied.
    #[must_use]
    pub fn subscribe(&self) -> ModelEventReceiver
    {
        self.shared.notifications.subscribe()
    }

    /// Whether the model was closed (backend disconnected).
    #[must_use]
    pub fn is_closed(&self) -> bool
    {
        self.shared.waiters().closed
    }
}

impl std::fmt::Debug for ObjectModel
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("ObjectModel")
            .field("objects", &self.len())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

/// The single writer of an [`ObjectModel`].
pub struct ModelWriter
{
    shared: Arc<Shared>,
}

impl ModelWriter
{
    /// Read handle on the model this writer mutates.
    #[must_use]
    pub fn model(&self) -> ObjectModel
    {
        ObjectModel {
            shared: self.shared.clone(),
        }
    }

    /// Apply one event and publish it to subscribers.
    pub fn apply(&mut self, event: ModelEvent)
    {
        debug!(event = %event.describe(), "applying model event");
        match &event {
            ModelEvent::ObjectAdded(spec) => self.add(spec.clone()),
            ModelEvent::ObjectRemoved { path } => self.remove(path),
            ModelEvent::StateChanged { path, state } => {
                match self.model().get(path).as_deref().and_then(TargetObject::state_cell) {
                    Some(cell) => {
                        cell.set(*state);
                    }
                    None => warn!(%path, %state, "state change for an unknown or stateless object"),
                }
            }
            ModelEvent::AttributeChanged { path, name, value } => match self.model().get(path) {
                Some(object) => object.set_attribute(name.clone(), value.clone()),
                None => warn!(%path, name, "attribute change for an unknown object"),
            },
            ModelEvent::BreakpointUpdated(info) => {
                self.shared.breakpoints.write(|store| store.apply(info.clone()));
            }
            ModelEvent::BreakpointDeleted(id) => {
                if self.shared.breakpoints.write(|store| store.remove(*id)).is_none() {
                    warn!(id = id.raw(), "delete for an unknown breakpoint");
                }
            }
            ModelEvent::BreakpointHit { address } => {
                let hits = self.shared.breakpoints.write(|store| store.record_hit(*address));
                trace!(%address, hits = hits.len(), "breakpoint hit recorded");
            }
            ModelEvent::Output { path, text } => debug!(%path, output = text.trim_end(), "target output"),
        }
        // No subscribers is not an error.
        let _ = self.shared.notifications.send(event);
    }

    fn add(&mut self, spec: ObjectSpec)
    {
        let path = spec.path.clone();
        let object = {
            let mut objects = self.shared.objects.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = objects.get(&path) {
                debug!(%path, "object already present; merging attributes");
                existing.merge_attributes(spec.attributes);
                return;
            }
            let object = Arc::new(TargetObject::from_spec(spec));
            objects.insert(path.clone(), object.clone());
            object
        };

        let mut waiters = self.shared.waiters();
        let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut waiters.pending)
            .into_iter()
            .partition(|(wanted, _)| *wanted == path);
        waiters.pending = pending;
        drop(waiters);

        for (_, completer) in ready {
            completer.complete(object.clone());
        }
    }

    fn remove(&mut self, path: &TargetPath)
    {
        let removed: Vec<Arc<TargetObject>> = {
            let mut objects = self.shared.objects.write().unwrap_or_else(PoisonError::into_inner);
            let doomed: Vec<TargetPath> = subtree(&objects, path).map(|(candidate, _)| candidate.clone()).collect();
            doomed.iter().filter_map(|candidate| objects.remove(candidate)).collect()
        };

        if removed.is_empty() {
            warn!(%path, "removal of an unknown object");
        }
        for object in removed {
            if let Some(cell) = object.state_cell() {
                cell.invalidate();
            }
        }
    }

    /// Close the model: drop every object, fail every waiter with
    /// `ObjectGone`. Further events are still applied but nobody can wait on
    /// new objects.
    pub fn close(&mut self)
    {
        let pending = {
            let mut waiters = self.shared.waiters();
            if waiters.closed {
                return;
            }
            waiters.closed = true;
            std::mem::take(&mut waiters.pending)
        };
        for (path, completer) in pending {
            completer.fail(ModelError::ObjectGone(path));
        }

        let objects = std::mem::take(&mut *self.shared.objects.write().unwrap_or_else(PoisonError::into_inner));
        for object in objects.values() {
            if let Some(cell) = object.state_cell() {
                cell.invalidate();
            }
        }
        debug!(dropped = objects.len(), "model closed");
    }
}

impl std::fmt::Debug for ModelWriter
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("ModelWriter").finish_non_exhaustive()
    }
}
