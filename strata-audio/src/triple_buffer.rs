//! Lock-free single-writer/single-reader triple buffer.
//!
//! The writer always has exclusive access to one slot ("back"), the reader
//! always has exclusive access to another ("front"); the third slot is
//! either idle or holds the most recently published-but-unconsumed value
//! ("middle"). Publishing and consuming both reduce to a single CAS on a
//! packed `AtomicU8` state word, so neither side ever blocks the other.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const FRESH_BIT: u8 = 0x80;
const SLOT_MASK: u8 = 0b11;

fn pack(front: u8, middle: u8, back: u8, fresh: bool) -> u8 {
    let base = front | (middle << 2) | (back << 4);
    if fresh {
        base | FRESH_BIT
    } else {
        base
    }
}

fn unpack(state: u8) -> (u8, u8, u8, bool) {
    (
        state & SLOT_MASK,
        (state >> 2) & SLOT_MASK,
        (state >> 4) & SLOT_MASK,
        state & FRESH_BIT != 0,
    )
}

struct Shared<T> {
    slots: [UnsafeCell<T>; 3],
    state: AtomicU8,
}

// SAFETY: the state machine in `state` guarantees the writer's slot, the
// reader's slot, and the idle/middle slot are always disjoint, so the
// `UnsafeCell` accesses from either side never alias.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn back_mut(&self) -> *mut T {
        let (_, _, back, _) = unpack(self.state.load(Ordering::Acquire));
        self.slots[back as usize].get()
    }

    fn publish(&self) {
        loop {
            let state = self.state.load(Ordering::Acquire);
            let (front, _middle, back, _fresh) = unpack(state);
            // The old back becomes the new middle (the fresh value the
            // reader will pick up); the writer's next slot is whichever of
            // the three isn't front or the new middle.
            let next_back = (0..3u8).find(|s| *s != front && *s != back).unwrap_or(back);
            let new_state = pack(front, back, next_back, true);
            match self.state.compare_exchange_weak(
                state,
                new_state,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }

    fn has_fresh(&self) -> bool {
        self.state.load(Ordering::Acquire) & FRESH_BIT != 0
    }

    fn consume(&self) {
        loop {
            let state = self.state.load(Ordering::Acquire);
            let (front, middle, back, fresh) = unpack(state);
            if !fresh {
                return;
            }
            let new_state = pack(middle, front, back, false);
            match self.state.compare_exchange_weak(
                state,
                new_state,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }

    fn front(&self) -> *const T {
        let (front, _, _, _) = unpack(self.state.load(Ordering::Acquire));
        self.slots[front as usize].get()
    }
}

pub struct TripleBufferWriter<T> {
    shared: Arc<Shared<T>>,
}

// SAFETY: only the writer ever calls `back_mut`/`publish`; see `Shared`.
unsafe impl<T: Send> Send for TripleBufferWriter<T> {}

impl<T> TripleBufferWriter<T> {
    pub fn write(&self, value: T) {
        unsafe {
            *self.shared.back_mut() = value;
        }
        self.shared.publish();
    }

    pub fn write_with(&self, f: impl FnOnce(&mut T)) {
        unsafe {
            f(&mut *self.shared.back_mut());
        }
        self.shared.publish();
    }
}

pub struct TripleBufferReader<T> {
    shared: Arc<Shared<T>>,
}

unsafe impl<T: Send> Send for TripleBufferReader<T> {}

impl<T: Clone> TripleBufferReader<T> {
    pub fn has_fresh(&self) -> bool {
        self.shared.has_fresh()
    }

    /// Returns the latest published value, consuming freshness.
    pub fn read(&self) -> T {
        self.shared.consume();
        unsafe { (*self.shared.front()).clone() }
    }

    /// A cheaply cloneable read-only handle sharing this reader's slot.
    pub fn handle(&self) -> TripleBufferHandle<T> {
        TripleBufferHandle {
            shared: self.shared.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TripleBufferHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> TripleBufferHandle<T> {
    pub fn read(&self) -> T {
        self.shared.consume();
        unsafe { (*self.shared.front()).clone() }
    }
}

pub fn triple_buffer<T: Default>() -> (TripleBufferWriter<T>, TripleBufferReader<T>) {
    triple_buffer_with(T::default())
}

pub fn triple_buffer_with<T: Clone>(value: T) -> (TripleBufferWriter<T>, TripleBufferReader<T>) {
    let shared = Arc::new(Shared {
        slots: [
            UnsafeCell::new(value.clone()),
            UnsafeCell::new(value.clone()),
            UnsafeCell::new(value),
        ],
        state: AtomicU8::new(pack(0, 1, 2, false)),
    });
    (
        TripleBufferWriter {
            shared: shared.clone(),
        },
        TripleBufferReader { shared },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_write_read() {
        let (w, r) = triple_buffer::<i32>();
        w.write(42);
        assert!(r.has_fresh());
        assert_eq!(r.read(), 42);
        assert!(!r.has_fresh());
    }

    #[test]
    fn multiple_writes_only_latest_observed() {
        let (w, r) = triple_buffer::<i32>();
        w.write(1);
        w.write(2);
        w.write(3);
        assert_eq!(r.read(), 3);
    }

    #[test]
    fn no_fresh_data_returns_last_value() {
        let (w, r) = triple_buffer_with(7);
        assert!(!r.has_fresh());
        assert_eq!(r.read(), 7);
        w.write(9);
        assert_eq!(r.read(), 9);
        assert_eq!(r.read(), 9);
    }

    #[test]
    fn write_with_mutates_in_place() {
        let (w, r) = triple_buffer_with(vec![1, 2, 3]);
        w.write_with(|v| v.push(4));
        assert_eq!(r.read(), vec![1, 2, 3, 4]);
    }
}
