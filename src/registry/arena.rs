//! Generation-checked arena with insertion order
//!
//! Keys carry the generation of the slot they were issued for, so a key kept
//! after its entry was removed never resolves to a later occupant of the slot.

use std::collections::VecDeque;

/// Stable key of an arena entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientKey {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of live entries, iterated newest first
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    order: VecDeque<ClientKey>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            order: VecDeque::new(),
        }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert at the front of the iteration order
    pub fn push_front(&mut self, value: T) -> ClientKey {
        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                ClientKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                ClientKey {
                    index,
                    generation: 0,
                }
            }
        };

        self.order.push_front(key);
        key
    }

    fn slot(&self, key: ClientKey) -> Option<&Slot<T>> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
    }

    pub fn contains(&self, key: ClientKey) -> bool {
        self.slot(key).is_some_and(|slot| slot.value.is_some())
    }

    pub fn get(&self, key: ClientKey) -> Option<&T> {
        self.slot(key)?.value.as_ref()
    }

    pub fn get_mut(&mut self, key: ClientKey) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)?
            .value
            .as_mut()
    }

    /// Remove an entry; stale keys return `None`
    pub fn remove(&mut self, key: ClientKey) -> Option<T> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)?;

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.order.retain(|k| *k != key);
        Some(value)
    }

    /// Keys in iteration order
    pub fn keys(&self) -> Vec<ClientKey> {
        self.order.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClientKey, &T)> + '_ {
        self.order
            .iter()
            .filter_map(move |&key| self.get(key).map(|value| (key, value)))
    }

    /// Remove every entry, in iteration order
    pub fn drain(&mut self) -> Vec<T> {
        let keys = self.keys();
        keys.into_iter().filter_map(|key| self.remove(key)).collect()
    }
}
