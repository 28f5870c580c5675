// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Open-addressed hash table keyed by interned strings.
//!
//! Linear probing with tombstones: a deleted slot keeps its place in every
//! probe sequence that ran through it, so lookups continue past tombstones
//! while inserts reuse the first one they meet. The table doubles at 75%
//! load, counting tombstones, which guarantees every probe sequence ends at
//! a truly empty slot.
//!
//! The same structure serves double duty as the string interner: interned
//! strings are stored as keys with a `Nil` value, and [`Table::find_string`]
//! probes by content instead of by handle.

use std::rc::Rc;

use crate::object::{LoxString, hash_string};
use crate::value::Value;

const MIN_CAPACITY: usize = 8;

#[derive(Clone)]
struct Entry {
    key: Option<Rc<LoxString>>,
    value: Value,
}

impl Entry {
    fn empty() -> Entry {
        Entry {
            key: None,
            value: Value::Nil,
        }
    }

    /// A tombstone has no key and a `Bool(true)` value; a truly empty slot
    /// has no key and a `Nil` value.
    fn is_tombstone(&self) -> bool {
        self.key.is_none() && !matches!(self.value, Value::Nil)
    }
}

/// A hash map from interned strings to values.
pub struct Table {
    /// Live entries plus tombstones.
    count: usize,
    entries: Vec<Entry>,
}

impl Table {
    /// Create a new empty table. No buckets are allocated until the first
    /// insert.
    pub fn new() -> Table {
        Table {
            count: 0,
            entries: Vec::new(),
        }
    }

    /// Look up `key`, which must be an interned handle.
    pub fn get(&self, key: &Rc<LoxString>) -> Option<Value> {
        if self.count == 0 {
            return None;
        }
        let index = find_entry(&self.entries, key);
        let entry = &self.entries[index];
        entry.key.as_ref().map(|_| entry.value.clone())
    }

    /// Insert or overwrite. Returns true when the key was not present.
    pub fn set(&mut self, key: Rc<LoxString>, value: Value) -> bool {
        if 4 * (self.count + 1) > 3 * self.entries.len() {
            let capacity = if self.entries.len() < MIN_CAPACITY {
                MIN_CAPACITY
            } else {
                self.entries.len() * 2
            };
            self.adjust_capacity(capacity);
        }

        let index = find_entry(&self.entries, &key);
        let entry = &mut self.entries[index];
        let is_new_key = entry.key.is_none();
        // Reusing a tombstone does not change the count: the tombstone was
        // already counted when its original key went in.
        if is_new_key && !entry.is_tombstone() {
            self.count += 1;
        }
        entry.key = Some(key);
        entry.value = value;
        is_new_key
    }

    /// Remove `key`, leaving a tombstone. Returns true when the key existed.
    pub fn delete(&mut self, key: &Rc<LoxString>) -> bool {
        if self.count == 0 {
            return false;
        }
        let index = find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        if entry.key.is_none() {
            return false;
        }
        entry.key = None;
        entry.value = Value::Bool(true);
        true
    }

    /// Copy every live entry of `from` into this table.
    pub fn add_all(&mut self, from: &Table) {
        for entry in &from.entries {
            if let Some(key) = &entry.key {
                self.set(Rc::clone(key), entry.value.clone());
            }
        }
    }

    /// Content-based probe used by interning: compares hash, length, then
    /// bytes, and stops at the first truly empty slot.
    pub fn find_string(&self, text: &str, hash: u32) -> Option<Rc<LoxString>> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.entries.len();
        let mut index = hash as usize % capacity;
        loop {
            let entry = &self.entries[index];
            match &entry.key {
                None => {
                    if !entry.is_tombstone() {
                        return None;
                    }
                }
                Some(key) => {
                    if key.hash == hash && key.text.len() == text.len() && key.text == text {
                        return Some(Rc::clone(key));
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    /// Intern `text`: return the existing handle for equal content, or
    /// allocate, record, and return a fresh one.
    pub fn intern(&mut self, text: &str) -> Rc<LoxString> {
        let hash = hash_string(text);
        if let Some(existing) = self.find_string(text, hash) {
            return existing;
        }
        let string = Rc::new(LoxString {
            text: text.to_string(),
            hash,
        });
        self.set(Rc::clone(&string), Value::Nil);
        string
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        let mut entries = vec![Entry::empty(); capacity];
        // Tombstones are dropped here, so the count is rebuilt from the live
        // entries alone.
        let mut count = 0;
        for entry in self.entries.drain(..) {
            if let Some(key) = entry.key {
                let index = find_entry(&entries, &key);
                entries[index] = Entry {
                    key: Some(key),
                    value: entry.value,
                };
                count += 1;
            }
        }
        self.entries = entries;
        self.count = count;
    }
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

/// Probe for `key`, returning the index of its entry, or of the slot an
/// insert should use: the first tombstone seen on the probe path if any,
/// otherwise the terminating empty slot.
fn find_entry(entries: &[Entry], key: &Rc<LoxString>) -> usize {
    let capacity = entries.len();
    let mut index = key.hash as usize % capacity;
    let mut tombstone: Option<usize> = None;
    loop {
        let entry = &entries[index];
        match &entry.key {
            None => {
                if entry.is_tombstone() {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                } else {
                    return tombstone.unwrap_or(index);
                }
            }
            // Keys are interned, so identity comparison suffices.
            Some(existing) if Rc::ptr_eq(existing, key) => return index,
            Some(_) => {}
        }
        index = (index + 1) % capacity;
    }
}
