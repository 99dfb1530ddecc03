//! Typed slot arenas
//!
//! Ids are never recycled: a removed slot stays empty, so a stale id can be
//! detected instead of silently aliasing a newer object.

use std::marker::PhantomData;

pub trait ArenaId: Copy {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) u32);

        impl $crate::arena::ArenaId for $name {
            fn from_index(index: usize) -> Self {
                $name(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

pub(crate) use arena_id;

#[derive(Debug, Clone)]
pub struct Arena<I, T> {
    slots: Vec<Option<T>>,
    live: usize,
    _id: PhantomData<I>,
}

impl<I, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            _id: PhantomData,
        }
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    pub fn alloc(&mut self, value: T) -> I {
        let id = I::from_index(self.slots.len());
        self.slots.push(Some(value));
        self.live += 1;
        id
    }

    /// Id the next `alloc` will return
    pub fn next_id(&self) -> I {
        I::from_index(self.slots.len())
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        let taken = self.slots.get_mut(id.index()).and_then(Option::take);
        if taken.is_some() {
            self.live -= 1;
        }
        taken
    }

    /// Temporarily move a value out; pair with [`Arena::restore`]
    pub fn take(&mut self, id: I) -> Option<T> {
        self.remove(id)
    }

    pub fn restore(&mut self, id: I, value: T) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            if slot.is_none() {
                self.live += 1;
            }
            *slot = Some(value);
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (I::from_index(i), v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    arena_id!(TestId);

    #[test]
    fn test_ids_are_not_recycled() {
        let mut arena: Arena<TestId, &str> = Arena::default();
        let a = arena.alloc("a");
        arena.remove(a);
        let b = arena.alloc("b");
        assert_ne!(a, b);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_take_and_restore() {
        let mut arena: Arena<TestId, u32> = Arena::default();
        let id = arena.alloc(7);
        let v = arena.take(id).unwrap();
        assert!(!arena.contains(id));
        arena.restore(id, v + 1);
        assert_eq!(arena.get(id), Some(&8));
        assert_eq!(arena.len(), 1);
    }
}
