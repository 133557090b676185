//! # Memory Manager — Arena, Tracing Collector, Singletons
//!
//! The heap is a slab arena (`Vec<Entry>`) rather than the pointer-linked
//! list the reference implementation threads through every value's `next`
//! field: freed slots are chained onto an internal free list instead, so the
//! arena reuses space without a second allocator and without any `unsafe`.
//! Every [`crate::value::Ref::Heap`] is an index into this arena; ownership
//! of every [`Obj`] is exclusively the `Heap`'s.
//!
//! `True`, `False`, and `Unit` live outside the arena entirely, in
//! `singletons`, created once by [`Heap::new`] and never marked or swept —
//! matching the reference VM's separate, permanent internal memory manager
//! for these three values.
//!
//! Collection policy mirrors the reference allocator: a full mark-sweep runs
//! only once `size >= capacity`; if the heap is still over capacity after
//! sweeping, `capacity` doubles. Marking is iterative (an explicit worklist)
//! rather than recursive, since `Obj::children` already gives us an owned
//! list of references to walk.

use crate::value::{Color, Obj, Ref, SINGLETON_FALSE, SINGLETON_TRUE, SINGLETON_UNIT};

const DEFAULT_HEAP_CAPACITY: usize = 2;

enum Entry {
    Occupied { color: Color, obj: Obj },
    Free(Option<usize>),
}

pub struct Heap {
    singletons: [Obj; 3],
    slots: Vec<Entry>,
    free_head: Option<usize>,
    size: usize,
    capacity: usize,
    color: Color,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            singletons: [Obj::Bool(false), Obj::Bool(true), Obj::Unit],
            slots: Vec::new(),
            free_head: None,
            size: 0,
            capacity: DEFAULT_HEAP_CAPACITY,
            color: Color::White,
        }
    }

    pub fn singleton_false(&self) -> Ref {
        SINGLETON_FALSE
    }

    pub fn singleton_true(&self) -> Ref {
        SINGLETON_TRUE
    }

    pub fn singleton_unit(&self) -> Ref {
        SINGLETON_UNIT
    }

    pub fn bool_ref(&self, b: bool) -> Ref {
        if b { SINGLETON_TRUE } else { SINGLETON_FALSE }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, r: Ref) -> &Obj {
        match r {
            Ref::Singleton(i) => &self.singletons[i as usize],
            Ref::Heap(idx) => match &self.slots[idx] {
                Entry::Occupied { obj, .. } => obj,
                Entry::Free(_) => unreachable!("dangling Ref::Heap({idx})"),
            },
        }
    }

    /// Mutable access for `ENTER`/`STORE_VAR`, the only opcodes that mutate a
    /// value already on the heap (an activation's saved state) rather than
    /// allocating a new one.
    pub fn get_mut(&mut self, r: Ref) -> &mut Obj {
        match r {
            Ref::Singleton(i) => &mut self.singletons[i as usize],
            Ref::Heap(idx) => match &mut self.slots[idx] {
                Entry::Occupied { obj, .. } => obj,
                Entry::Free(_) => unreachable!("dangling Ref::Heap({idx})"),
            },
        }
    }

    /// Allocate `obj` into a free slot (or grow the arena), colouring it with
    /// the heap's current colour so it survives an imminent mark if it is
    /// already reachable from a root. Does **not** check or trigger GC —
    /// callers collect first via [`Heap::collect_if_due`].
    pub fn alloc(&mut self, obj: Obj) -> Ref {
        let entry = Entry::Occupied { color: self.color, obj };
        let idx = match self.free_head {
            Some(idx) => {
                self.free_head = match &self.slots[idx] {
                    Entry::Free(next) => *next,
                    Entry::Occupied { .. } => unreachable!(),
                };
                self.slots[idx] = entry;
                idx
            }
            None => {
                self.slots.push(entry);
                self.slots.len() - 1
            }
        };
        self.size += 1;
        Ref::Heap(idx)
    }

    /// Runs a full mark-sweep if `size >= capacity`, then doubles `capacity`
    /// if the heap is still over capacity afterward. `roots` are the GC
    /// roots live at the moment of the call: the operand stack plus the
    /// current activation.
    pub fn collect_if_due(&mut self, roots: impl IntoIterator<Item = Ref>) {
        if self.size < self.capacity {
            return;
        }
        self.mark(roots);
        self.sweep();
        if self.size >= self.capacity {
            self.capacity *= 2;
        }
    }

    fn mark(&mut self, roots: impl IntoIterator<Item = Ref>) {
        let new_color = self.color.flip();
        let mut worklist: Vec<Ref> = roots.into_iter().collect();
        while let Some(r) = worklist.pop() {
            let idx = match r {
                Ref::Singleton(_) => continue,
                Ref::Heap(idx) => idx,
            };
            let already_marked = match &self.slots[idx] {
                Entry::Occupied { color, .. } => *color == new_color,
                Entry::Free(_) => continue,
            };
            if already_marked {
                continue;
            }
            if let Entry::Occupied { color, obj } = &mut self.slots[idx] {
                *color = new_color;
                worklist.extend(obj.children());
            }
        }
        self.color = new_color;
    }

    fn sweep(&mut self) {
        let keep = self.color;
        let mut live = 0;
        for idx in 0..self.slots.len() {
            let should_free = match &self.slots[idx] {
                Entry::Occupied { color, .. } => *color != keep,
                Entry::Free(_) => false,
            };
            if should_free {
                self.slots[idx] = Entry::Free(self.free_head);
                self.free_head = Some(idx);
            } else if matches!(self.slots[idx], Entry::Occupied { .. }) {
                live += 1;
            }
        }
        self.size = live;
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_reuses_freed_slots() {
        let mut heap = Heap::new();
        let a = heap.alloc(Obj::Int(1));
        let _b = heap.alloc(Obj::Int(2));
        assert_eq!(heap.size(), 2);

        // Nothing roots `a` or `b`: a collection should free both and the
        // next allocation should reuse a freed slot rather than growing.
        heap.collect_if_due(std::iter::empty());
        assert_eq!(heap.size(), 0);

        let c = heap.alloc(Obj::Int(3));
        match c {
            Ref::Heap(idx) => assert!(idx <= 1, "expected slot reuse, got fresh slot {idx}"),
            Ref::Singleton(_) => panic!("unexpected singleton"),
        }
        let _ = a;
    }

    #[test]
    fn rooted_value_survives_collection() {
        let mut heap = Heap::new();
        let kept = heap.alloc(Obj::Int(42));
        heap.alloc(Obj::Int(0));
        heap.collect_if_due(std::iter::once(kept));
        assert_eq!(heap.size(), 1);
        assert!(matches!(heap.get(kept), Obj::Int(42)));
    }

    #[test]
    fn tuple_keeps_its_fields_alive() {
        let mut heap = Heap::new();
        let field = heap.alloc(Obj::Int(7));
        let tuple = heap.alloc(Obj::Tuple(vec![field]));
        heap.collect_if_due(std::iter::once(tuple));
        assert_eq!(heap.size(), 2);
        assert!(matches!(heap.get(field), Obj::Int(7)));
    }

    #[test]
    fn singletons_are_never_collected() {
        let mut heap = Heap::new();
        heap.collect_if_due(std::iter::empty());
        assert!(matches!(heap.get(heap.singleton_true()), Obj::Bool(true)));
        assert!(matches!(heap.get(heap.singleton_false()), Obj::Bool(false)));
        assert!(matches!(heap.get(heap.singleton_unit()), Obj::Unit));
    }
}
