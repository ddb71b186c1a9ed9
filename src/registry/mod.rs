//! Membership tracking for open pinned windows.
//!
//! Entries are addressed by generation-checked [`PinId`] handles, so a handle
//! kept by a background task after its window closed can never reach a
//! different window that reused the slot.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastTarget {
    Pin(PinId),
    Standalone,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub struct PinRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for PinRegistry<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> PinRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, value: T) -> PinId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return PinId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        PinId {
            index,
            generation: 0,
        }
    }

    /// Removes the entry and invalidates every copy of `id`. Stale ids are ignored.
    pub fn unregister(&mut self, id: PinId) -> Option<T> {
        let slot = self.live_slot_mut(id)?;
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        value
    }

    pub fn get(&self, id: PinId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: PinId) -> Option<&mut T> {
        self.live_slot_mut(id).and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, id: PinId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (PinId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    PinId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    pub fn first(&self) -> Option<PinId> {
        self.iter().next().map(|(id, _)| id)
    }

    /// Picks where a toast should appear: the first open pin, else a standalone overlay.
    pub fn broadcast_toast(&self, message: &str) -> ToastTarget {
        let target = match self.first() {
            Some(id) => ToastTarget::Pin(id),
            None => ToastTarget::Standalone,
        };
        tracing::debug!(message, ?target, "toast routed");
        target
    }

    fn live_slot_mut(&mut self, id: PinId) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.value.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister_track_membership() {
        let mut registry = PinRegistry::new();
        let first = registry.register("first");
        let second = registry.register("second");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(first), Some(&"first"));
        assert_eq!(registry.unregister(first), Some("first"));
        assert!(!registry.contains(first));
        assert!(registry.contains(second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn stale_handles_do_not_reach_reused_slots() {
        let mut registry = PinRegistry::new();
        let stale = registry.register(1);
        registry.unregister(stale);
        let fresh = registry.register(2);

        assert_ne!(stale, fresh);
        assert_eq!(registry.get(stale), None);
        assert_eq!(registry.get(fresh), Some(&2));
        assert_eq!(registry.unregister(stale), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn broadcast_toast_prefers_first_open_pin() {
        let mut registry = PinRegistry::new();
        assert_eq!(registry.broadcast_toast("Saved"), ToastTarget::Standalone);

        let first = registry.register("a");
        let second = registry.register("b");
        assert_eq!(registry.broadcast_toast("Saved"), ToastTarget::Pin(first));

        registry.unregister(first);
        assert_eq!(registry.broadcast_toast("Saved"), ToastTarget::Pin(second));

        registry.unregister(second);
        assert_eq!(registry.broadcast_toast("Saved"), ToastTarget::Standalone);
    }

    #[test]
    fn iter_skips_vacated_slots() {
        let mut registry = PinRegistry::new();
        let a = registry.register('a');
        let b = registry.register('b');
        let c = registry.register('c');
        registry.unregister(b);

        let ids: Vec<PinId> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn get_mut_allows_in_place_updates() {
        let mut registry = PinRegistry::new();
        let id = registry.register(String::from("pin"));
        if let Some(value) = registry.get_mut(id) {
            value.push_str("ned");
        }
        assert_eq!(registry.get(id).map(String::as_str), Some("pinned"));
    }
}
