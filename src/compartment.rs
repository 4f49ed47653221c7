//! Compartment handles and the name arena.
//!
//! Compartments (a.k.a. segments) are identified in the input tables by opaque
//! strings such as `dend5_0(0.5)`: a section name plus a fractional position.
//! Inside the engine they are replaced by small integer [`CompartmentId`]
//! handles into a [`CompartmentIndex`], so pools and graphs can be indexed by
//! position instead of hashing strings on every access.

use std::collections::HashMap;

/// Handle of a compartment inside a [`CompartmentIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct CompartmentId(u32);

impl CompartmentId {
    /// Position of this compartment in its index.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl std::fmt::Display for CompartmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cmp:{}", self.0)
    }
}

/// Arena of compartment names.
///
/// Ids are dense and assigned in insertion order, so `id.index()` can be used
/// directly to address per-compartment storage.
#[derive(Debug, Clone, Default)]
pub struct CompartmentIndex {
    names: Vec<String>,
    lookup: HashMap<String, CompartmentId>,
}

impl CompartmentIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from names, skipping duplicates.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        for name in names {
            index.intern(name.as_ref());
        }
        index
    }

    /// Return the id for `name`, allocating one if it is new.
    pub fn intern(&mut self, name: &str) -> CompartmentId {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = CompartmentId::from_index(self.names.len());
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), id);
        id
    }

    /// Look up an existing compartment.
    pub fn get(&self, name: &str) -> Option<CompartmentId> {
        self.lookup.get(name).copied()
    }

    /// Name of a compartment.
    ///
    /// Panics if `id` was not produced by this index.
    pub fn name(&self, id: CompartmentId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate `(id, name)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (CompartmentId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (CompartmentId::from_index(i), name.as_str()))
    }
}

/// Strip the positional suffix from a segment name: `dend5_0(0.5)` → `dend5_0`.
pub fn base_name(segment: &str) -> &str {
    match segment.find('(') {
        Some(pos) => segment[..pos].trim(),
        None => segment.trim(),
    }
}

/// Whether `segment` is one of the positional segments of `section`,
/// i.e. it is written `section(x)`.
pub fn is_segment_of(segment: &str, section: &str) -> bool {
    segment
        .strip_prefix(section)
        .is_some_and(|rest| rest.starts_with('('))
}
