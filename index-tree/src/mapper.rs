//! Translation between caller objects and the integer ids the tree stores.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::envelope::Envelope;
use crate::tree::rtree_types::{ElementId, TreeError, TreeResult, MAX_ELEMENT_ID};

/// Maps domain objects to tree identifiers and envelopes, and back.
pub trait TreeElementMapper<E> {
    /// Identifier of `element`, assigning a fresh one if it has none yet.
    fn tree_identifier(&mut self, element: &E) -> TreeResult<ElementId>;

    /// Identifier of `element` if it is bound, without assigning one.
    fn existing_identifier(&self, element: &E) -> TreeResult<Option<ElementId>>;

    /// Envelope `element` is indexed under.
    fn envelope(&self, element: &E) -> TreeResult<Envelope>;

    /// Binds `element` to `id`, replacing any previous binding of either.
    fn set_tree_identifier(&mut self, element: &E, id: ElementId) -> TreeResult<()>;

    /// Drops the binding of `element`, returning the id it held.
    fn remove_tree_identifier(&mut self, element: &E) -> TreeResult<Option<ElementId>>;

    /// Object bound to `id`, if any.
    fn object_from_tree_identifier(&self, id: ElementId) -> TreeResult<Option<E>>;

    /// Forgets every binding.
    fn clear(&mut self) -> TreeResult<()>;

    fn close(&mut self) -> TreeResult<()>;

    fn is_closed(&self) -> bool;
}

type EnvelopeFn<E> = Box<dyn Fn(&E) -> TreeResult<Envelope> + Send + Sync>;

/// Hash map backed mapper. Ids are handed out sequentially from 1 and the
/// envelope of an object is computed by a caller-supplied function.
pub struct MemoryElementMapper<E> {
    ids: HashMap<E, ElementId>,
    objects: HashMap<ElementId, E>,
    next_id: ElementId,
    envelope_fn: EnvelopeFn<E>,
    closed: bool,
}

impl<E> MemoryElementMapper<E>
where
    E: Clone + Eq + Hash,
{
    pub fn new<F>(envelope_fn: F) -> Self
    where
        F: Fn(&E) -> TreeResult<Envelope> + Send + Sync + 'static,
    {
        Self {
            ids: HashMap::new(),
            objects: HashMap::new(),
            next_id: 1,
            envelope_fn: Box::new(envelope_fn),
            closed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn check_closed(&self) -> TreeResult<()> {
        if self.closed {
            Err(TreeError::Mapper("mapper is closed".into()))
        } else {
            Ok(())
        }
    }
}

impl<E> TreeElementMapper<E> for MemoryElementMapper<E>
where
    E: Clone + Eq + Hash,
{
    fn tree_identifier(&mut self, element: &E) -> TreeResult<ElementId> {
        self.check_closed()?;
        if let Some(id) = self.ids.get(element) {
            return Ok(*id);
        }
        let mut id = self.next_id;
        while self.objects.contains_key(&id) {
            id += 1;
        }
        if id > MAX_ELEMENT_ID {
            return Err(TreeError::Mapper("element ids exhausted".into()));
        }
        self.next_id = id + 1;
        self.ids.insert(element.clone(), id);
        self.objects.insert(id, element.clone());
        Ok(id)
    }

    fn existing_identifier(&self, element: &E) -> TreeResult<Option<ElementId>> {
        self.check_closed()?;
        Ok(self.ids.get(element).copied())
    }

    fn envelope(&self, element: &E) -> TreeResult<Envelope> {
        self.check_closed()?;
        (self.envelope_fn)(element)
    }

    fn set_tree_identifier(&mut self, element: &E, id: ElementId) -> TreeResult<()> {
        self.check_closed()?;
        if id == 0 || id > MAX_ELEMENT_ID {
            return Err(TreeError::InvalidArgument(format!(
                "element id {} is outside 1..={}",
                id, MAX_ELEMENT_ID
            )));
        }
        if let Some(old_id) = self.ids.remove(element) {
            self.objects.remove(&old_id);
        }
        if let Some(old_object) = self.objects.remove(&id) {
            self.ids.remove(&old_object);
        }
        self.ids.insert(element.clone(), id);
        self.objects.insert(id, element.clone());
        Ok(())
    }

    fn remove_tree_identifier(&mut self, element: &E) -> TreeResult<Option<ElementId>> {
        self.check_closed()?;
        let id = self.ids.remove(element);
        if let Some(id) = id {
            self.objects.remove(&id);
        }
        Ok(id)
    }

    fn object_from_tree_identifier(&self, id: ElementId) -> TreeResult<Option<E>> {
        self.check_closed()?;
        Ok(self.objects.get(&id).cloned())
    }

    fn clear(&mut self) -> TreeResult<()> {
        self.check_closed()?;
        self.ids.clear();
        self.objects.clear();
        self.next_id = 1;
        Ok(())
    }

    fn close(&mut self) -> TreeResult<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<E> fmt::Debug for MemoryElementMapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryElementMapper")
            .field("elements", &self.objects.len())
            .field("next_id", &self.next_id)
            .field("closed", &self.closed)
            .finish()
    }
}
