//! Bidirectional name ↔ identifier index.
//!
//! The registry is derived state: records own their names, the registry only
//! mirrors them so both directions resolve in O(1). `put` refuses to silently
//! rebind a name or an identifier that already belongs to someone else.

use std::collections::HashMap;
use std::hash::Hash;

use chainstorm_core::{GraphError, RecordKind, Result};

#[derive(Debug, Clone)]
pub struct NameRegistry<I> {
    kind: RecordKind,
    by_name: HashMap<String, I>,
    by_id: HashMap<I, String>,
}

impl<I> NameRegistry<I>
where
    I: Clone + Eq + Hash + ToString,
{
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            by_name: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Bind `name` to `id`.
    ///
    /// Re-binding an identical pair is a no-op. Binding a name already held by
    /// another id fails with `DuplicateName`; binding an id already known under
    /// another name fails with `AlreadyExists`. Nothing changes on failure.
    pub fn put(&mut self, name: &str, id: I) -> Result<()> {
        if let Some(existing) = self.by_name.get(name) {
            if existing == &id {
                return Ok(());
            }
            return Err(GraphError::DuplicateName {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        if self.by_id.contains_key(&id) {
            return Err(GraphError::AlreadyExists {
                kind: self.kind,
                id: id.to_string(),
            });
        }
        self.by_name.insert(name.to_string(), id.clone());
        self.by_id.insert(id, name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&I> {
        self.by_name.get(name).ok_or_else(|| GraphError::NotFound {
            kind: self.kind,
            key: name.to_string(),
        })
    }

    pub fn get_by_id(&self, id: &I) -> Result<&str> {
        self.by_id
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| GraphError::NotFound {
                kind: self.kind,
                key: id.to_string(),
            })
    }

    /// Remove a name and its identifier. Returns the identifier it held.
    pub fn remove(&mut self, name: &str) -> Option<I> {
        let id = self.by_name.remove(name)?;
        self.by_id.remove(&id);
        Some(id)
    }

    /// Remove whatever name `id` is registered under.
    pub fn remove_id(&mut self, id: &I) -> Option<String> {
        let name = self.by_id.remove(id)?;
        self.by_name.remove(&name);
        Some(name)
    }

    /// Move `id` to `new_name`, keeping the bijection intact.
    pub fn rename(&mut self, id: &I, new_name: &str) -> Result<()> {
        if let Some(holder) = self.by_name.get(new_name) {
            if holder == id {
                return Ok(());
            }
            return Err(GraphError::DuplicateName {
                kind: self.kind,
                name: new_name.to_string(),
            });
        }
        self.remove_id(id);
        self.put(new_name, id.clone())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// All (name, id) pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &I)> {
        self.by_name.iter().map(|(name, id)| (name.as_str(), id))
    }
}
