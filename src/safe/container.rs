//! Set-like container of identity-safe references.
//!
//! Members are held through [`SafeRef`]s, so containers may (indirectly)
//! contain themselves and still be hashed and rendered. Values inserted by
//! value are owned by the container's pool; values inserted as `Rc` are only
//! referenced.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::reference::{HashError, SafeRef, Signature, StructuralHash};

/// Hash of a container with no members.
pub const EMPTY_CONTAINER_HASH: Signature = 0x9e37_79b9_7f4a_7c15;

thread_local! {
    static RENDERED: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
    static RENDER_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Tracks reference ids rendered during the current top-level `Display` call.
struct RenderScope;

impl RenderScope {
    fn enter() -> Self {
        RENDER_DEPTH.with(|depth| depth.set(depth.get() + 1));
        RenderScope
    }

    /// Returns true the first time `id` is seen in this render.
    fn first_visit(id: u64) -> bool {
        RENDERED.with(|rendered| rendered.borrow_mut().insert(id))
    }
}

impl Drop for RenderScope {
    fn drop(&mut self) {
        let remaining = RENDER_DEPTH.with(|depth| {
            let next = depth.get().saturating_sub(1);
            depth.set(next);
            next
        });
        if remaining == 0 {
            RENDERED.with(|rendered| rendered.borrow_mut().clear());
        }
    }
}

/// Set of values addressed through [`SafeRef`]s.
///
/// No two members share an equal (hash, value) pair.
pub struct SafeContainer<T> {
    refs: Vec<SafeRef<T>>,
    owned: Vec<Rc<T>>,
}

impl<T> SafeContainer<T> {
    /// Create an empty container.
    pub fn new() -> Self {
        Self {
            refs: Vec::new(),
            owned: Vec::new(),
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Whether the container has no members.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Remove every member.
    pub fn clear(&mut self) {
        self.refs.clear();
        self.owned.clear();
    }

    /// Member references in insertion order.
    pub fn refs(&self) -> &[SafeRef<T>] {
        &self.refs
    }

    /// Dereference members; `None` marks a value that is no longer available.
    pub fn iter(&self) -> impl Iterator<Item = Option<Rc<T>>> + '_ {
        self.refs.iter().map(SafeRef::value)
    }

    /// Drop pooled values no member refers to anymore.
    fn release_orphans(&mut self) {
        let refs = &self.refs;
        self.owned.retain(|value| refs.iter().any(|r| r.points_to(value)));
    }
}

impl<T: StructuralHash + PartialEq> SafeContainer<T> {
    /// Build a container that owns the given values.
    pub fn from_values<I: IntoIterator<Item = T>>(values: I) -> Self {
        let mut container = Self::new();
        container.extend(values);
        container
    }

    /// Build a container referencing shared values.
    pub fn from_shared<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Rc<T>>,
        T: 'a,
    {
        let mut container = Self::new();
        for value in values {
            container.insert_shared(value);
        }
        container
    }

    fn position_of(&self, value: &T) -> Option<usize> {
        let mut target = None;
        self.refs.iter().position(|r| r.matches(value, &mut target))
    }

    /// Insert an owned value. Returns false if an equal member exists.
    pub fn insert(&mut self, value: T) -> bool {
        if self.position_of(&value).is_some() {
            return false;
        }
        let value = Rc::new(value);
        self.refs.push(SafeRef::new(&value));
        self.owned.push(value);
        true
    }

    /// Reference a shared value. Returns false if an equal member exists.
    pub fn insert_shared(&mut self, value: &Rc<T>) -> bool {
        if self.position_of(value).is_some() {
            return false;
        }
        self.refs.push(SafeRef::new(value));
        true
    }

    /// Remove the member equal to `value`.
    pub fn remove(&mut self, value: &T) -> bool {
        match self.position_of(value) {
            Some(index) => {
                self.refs.remove(index);
                self.release_orphans();
                true
            }
            None => false,
        }
    }

    /// Remove every member equal to one of `values`. Returns true if anything changed.
    pub fn remove_all<'a, I>(&mut self, values: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut changed = false;
        for value in values {
            changed |= self.remove(value);
        }
        changed
    }

    /// Keep only members equal to one of `values`. Returns true if anything changed.
    pub fn retain_only<'a, I>(&mut self, values: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let keep: Vec<&T> = values.into_iter().collect();
        let before = self.refs.len();
        self.refs
            .retain(|r| keep.iter().any(|value| r.matches(value, &mut None)));
        let changed = self.refs.len() != before;
        if changed {
            self.release_orphans();
        }
        changed
    }

    /// Whether a member equals `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.position_of(value).is_some()
    }

    /// Whether every one of `values` is a member.
    pub fn contains_all<'a, I>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        values.into_iter().all(|value| self.contains(value))
    }

    /// Map available members into a new container that owns the results.
    pub fn map<R, F>(&self, mut f: F) -> SafeContainer<R>
    where
        R: StructuralHash + PartialEq,
        F: FnMut(&T) -> R,
    {
        self.iter().flatten().map(|value| f(value.as_ref())).collect()
    }

    /// Order-insensitive hash: wrapping sum of member signatures.
    pub fn signature(&self) -> Signature {
        if self.refs.is_empty() {
            return EMPTY_CONTAINER_HASH;
        }
        self.refs
            .iter()
            .fold(0u64, |acc, r| acc.wrapping_add(r.signature()))
    }
}

impl<T> Default for SafeContainer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StructuralHash + PartialEq> Extend<T> for SafeContainer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: StructuralHash + PartialEq> FromIterator<T> for SafeContainer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl<T: StructuralHash + PartialEq> StructuralHash for SafeContainer<T> {
    fn structural_hash(&self) -> Result<Signature, HashError> {
        Ok(self.signature())
    }
}

impl<T: StructuralHash + PartialEq> PartialEq for SafeContainer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|value| value.is_some_and(|v| other.contains(&v)))
    }
}

impl<T: fmt::Display> fmt::Display for SafeContainer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _scope = RenderScope::enter();
        f.write_str("{")?;
        for (index, r) in self.refs.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            if RenderScope::first_visit(r.id()) {
                match r.value() {
                    Some(value) => write!(f, "{value}")?,
                    None => f.write_str("null")?,
                }
            } else {
                write!(f, "<<<{}>>>", r.id())?;
            }
        }
        f.write_str("}")
    }
}

impl<T> fmt::Debug for SafeContainer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeContainer")
            .field("refs", &self.refs)
            .field("owned", &self.owned.len())
            .finish()
    }
}
