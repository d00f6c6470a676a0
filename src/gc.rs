//! Mark-and-sweep garbage collection over an object arena.
//!
//! Objects live in fixed-size chunks and are addressed by [`ObjectId`], an index
//! plus a generation. Handles are plain `Copy` data, so object graphs may form
//! arbitrary cycles (object -> prototype -> constructor -> prototype ...).
//! Reachability is decided by an explicit mark phase from caller-supplied roots
//! plus pinned handles; unreachable slots are reset, pooled for reuse and their
//! generation bumped so stale handles stop resolving.

use std::fmt;

use rustc_hash::FxHashMap;

// ============================================================================
// ChunkBitmask - 256-bit bitmask for marking objects within a chunk
// ============================================================================

/// 256-bit bitmask for marking objects within a chunk.
/// Each bit corresponds to an index in the chunk (0-255).
#[derive(Clone, Copy, Default)]
struct ChunkBitmask {
    /// 4 × u64 = 256 bits
    bits: [u64; 4],
}

impl ChunkBitmask {
    #[inline]
    fn set(&mut self, index: usize) {
        if let Some(word) = self.bits.get_mut(index >> 6) {
            *word |= 1 << (index & 63);
        }
    }

    #[inline]
    fn get(&self, index: usize) -> bool {
        self.bits
            .get(index >> 6)
            .is_some_and(|word| word & (1 << (index & 63)) != 0)
    }

    #[inline]
    fn clear(&mut self) {
        self.bits = [0; 4];
    }

    /// Iterate over unmarked indices (bits that are 0) up to `len`
    fn iter_unmarked(&self, len: usize) -> UnmarkedIter<'_> {
        UnmarkedIter {
            bitmask: self,
            len,
            current_word: 0,
            current_bits: !self.bits.first().copied().unwrap_or(0),
            base_index: 0,
        }
    }
}

/// Iterator over unmarked (zero) bits in a ChunkBitmask
struct UnmarkedIter<'a> {
    bitmask: &'a ChunkBitmask,
    len: usize,
    current_word: usize,
    current_bits: u64, // Inverted bits (1 = unmarked)
    base_index: usize,
}

impl Iterator for UnmarkedIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current_bits != 0 {
                let bit_pos = self.current_bits.trailing_zeros() as usize;
                let index = self.base_index + bit_pos;
                self.current_bits &= self.current_bits - 1;
                if index < self.len {
                    return Some(index);
                }
            }

            self.current_word += 1;
            self.base_index = self.current_word << 6;
            if self.base_index >= self.len {
                return None;
            }
            self.current_bits = !self.bitmask.bits.get(self.current_word).copied()?;
        }
    }
}

// ============================================================================
// ObjectId - handle to an arena slot
// ============================================================================

/// Handle to a GC-managed object.
///
/// Two handles are equal when they name the same slot in the same generation;
/// this is the identity used for object equality in scripts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Slot index in the arena
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn chunk(&self) -> usize {
        self.index() / CHUNK_CAPACITY
    }

    fn offset(&self) -> usize {
        self.index() % CHUNK_CAPACITY
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

// ============================================================================
// Traceable / Reset
// ============================================================================

/// Trait for types that can be traced by the garbage collector.
///
/// Implementations call `visitor` once for every [`ObjectId`] they hold.
pub trait Traceable {
    fn trace(&self, visitor: &mut dyn FnMut(ObjectId));
}

/// Trait for types that can be reset to a clean state for pooling.
///
/// When an object is collected it is reset in place (dropping whatever host
/// resources it holds) and its slot is placed in a pool for reuse.
pub trait Reset: Default {
    fn reset(&mut self);
}

// ============================================================================
// Heap
// ============================================================================

/// Chunk capacity: objects per chunk (matches ChunkBitmask size)
const CHUNK_CAPACITY: usize = 256;

/// Default threshold: net allocations between automatic collections
pub const DEFAULT_GC_THRESHOLD: usize = 1024;

struct Slot<T> {
    generation: u32,
    pooled: bool,
    data: T,
}

/// Arena of GC-managed objects.
pub struct Heap<T: Traceable + Reset> {
    /// Chunks never grow past CHUNK_CAPACITY, so a slot keeps its index for life.
    chunks: Vec<Vec<Slot<T>>>,
    /// One mark bitmask per chunk
    marked_chunks: Vec<ChunkBitmask>,
    /// Indices of pooled slots available for reuse
    free_list: Vec<u32>,
    /// Persistent mark stack, reused between collections
    mark_stack: Vec<ObjectId>,
    /// Handles held by the host outside the object graph, with pin counts
    pins: FxHashMap<ObjectId, usize>,
    /// Allocations minus collections since the last cycle
    net_allocs: isize,
    /// Threshold for `should_collect` (0 = never)
    gc_threshold: usize,
    /// Number of completed collection cycles
    cycles: usize,
}

impl<T: Traceable + Reset> Heap<T> {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            marked_chunks: Vec::new(),
            free_list: Vec::new(),
            mark_stack: Vec::new(),
            pins: FxHashMap::default(),
            net_allocs: 0,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            cycles: 0,
        }
    }

    /// Move `data` into the arena and return its handle.
    pub fn alloc(&mut self, data: T) -> ObjectId {
        self.net_allocs += 1;

        if let Some(index) = self.free_list.pop() {
            let candidate = ObjectId {
                index,
                generation: 0,
            };
            if let Some(slot) = self
                .chunks
                .get_mut(candidate.chunk())
                .and_then(|chunk| chunk.get_mut(candidate.offset()))
            {
                slot.data = data;
                slot.pooled = false;
                return ObjectId {
                    index,
                    generation: slot.generation,
                };
            }
        }

        let need_new_chunk = self
            .chunks
            .last()
            .is_none_or(|chunk| chunk.len() >= CHUNK_CAPACITY);
        if need_new_chunk {
            self.chunks.push(Vec::with_capacity(CHUNK_CAPACITY));
            self.marked_chunks.push(ChunkBitmask::default());
        }

        let chunk_idx = self.chunks.len().saturating_sub(1);
        let mut index = 0;
        if let Some(chunk) = self.chunks.last_mut() {
            index = chunk_idx * CHUNK_CAPACITY + chunk.len();
            chunk.push(Slot {
                generation: 0,
                pooled: false,
                data,
            });
        }

        ObjectId {
            index: index as u32,
            generation: 0,
        }
    }

    fn slot(&self, id: ObjectId) -> Option<&Slot<T>> {
        self.chunks
            .get(id.chunk())
            .and_then(|chunk| chunk.get(id.offset()))
            .filter(|slot| !slot.pooled && slot.generation == id.generation)
    }

    /// Borrow a live object
    pub fn get(&self, id: ObjectId) -> Option<&T> {
        self.slot(id).map(|slot| &slot.data)
    }

    /// Borrow a live object mutably
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut T> {
        self.chunks
            .get_mut(id.chunk())
            .and_then(|chunk| chunk.get_mut(id.offset()))
            .filter(|slot| !slot.pooled && slot.generation == id.generation)
            .map(|slot| &mut slot.data)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.slot(id).is_some()
    }

    /// Keep `id` alive across collections until a matching `unpin`.
    pub fn pin(&mut self, id: ObjectId) {
        *self.pins.entry(id).or_insert(0) += 1;
    }

    /// Release one pin. Returns false if the handle was not pinned.
    pub fn unpin(&mut self, id: ObjectId) -> bool {
        match self.pins.get_mut(&id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.pins.remove(&id);
                true
            }
            None => false,
        }
    }

    /// Drop every pin at once
    pub fn clear_pins(&mut self) {
        self.pins.clear();
    }

    /// True once enough allocations happened since the last cycle
    pub fn should_collect(&self) -> bool {
        self.gc_threshold > 0 && self.net_allocs >= self.gc_threshold as isize
    }

    /// Run a full mark-and-sweep cycle. Returns the number of objects collected.
    pub fn collect<I: IntoIterator<Item = ObjectId>>(&mut self, roots: I) -> usize {
        self.mark(roots);
        let collected = self.sweep();
        self.net_allocs = 0;
        self.cycles += 1;
        collected
    }

    /// Mark phase: trace from roots to find all reachable objects
    fn mark<I: IntoIterator<Item = ObjectId>>(&mut self, roots: I) {
        for bitmask in &mut self.marked_chunks {
            bitmask.clear();
        }

        let mut stack = std::mem::take(&mut self.mark_stack);
        stack.clear();
        stack.extend(roots);
        stack.extend(self.pins.keys().copied());

        while let Some(id) = stack.pop() {
            let Some(slot) = self
                .chunks
                .get(id.chunk())
                .and_then(|chunk| chunk.get(id.offset()))
            else {
                continue;
            };
            if slot.pooled || slot.generation != id.generation {
                continue;
            }
            let Some(bitmask) = self.marked_chunks.get_mut(id.chunk()) else {
                continue;
            };
            if bitmask.get(id.offset()) {
                continue;
            }
            bitmask.set(id.offset());

            let marked = &self.marked_chunks;
            slot.data.trace(&mut |child: ObjectId| {
                let already = marked
                    .get(child.chunk())
                    .is_some_and(|bits| bits.get(child.offset()));
                if !already {
                    stack.push(child);
                }
            });
        }

        self.mark_stack = stack;
    }

    /// Sweep phase: reset and pool every live slot that was not marked
    fn sweep(&mut self) -> usize {
        let mut collected = 0;
        for (chunk_idx, (chunk, bitmask)) in self
            .chunks
            .iter_mut()
            .zip(self.marked_chunks.iter())
            .enumerate()
        {
            let len = chunk.len();
            for offset in bitmask.iter_unmarked(len) {
                if let Some(slot) = chunk.get_mut(offset) {
                    if !slot.pooled {
                        slot.data.reset();
                        slot.pooled = true;
                        slot.generation = slot.generation.wrapping_add(1);
                        self.free_list
                            .push((chunk_idx * CHUNK_CAPACITY + offset) as u32);
                        collected += 1;
                    }
                }
            }
        }
        collected
    }

    pub fn stats(&self) -> GcStats {
        let total_objects: usize = self.chunks.iter().map(|c| c.len()).sum();
        GcStats {
            total_objects,
            pooled_objects: self.free_list.len(),
            live_objects: total_objects - self.free_list.len(),
            pinned_objects: self.pins.len(),
            cycles: self.cycles,
        }
    }

    /// Set the GC threshold (0 = disable automatic collection)
    pub fn set_gc_threshold(&mut self, threshold: usize) {
        self.gc_threshold = threshold;
    }

    pub fn gc_threshold(&self) -> usize {
        self.gc_threshold
    }
}

impl<T: Traceable + Reset> Default for Heap<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// GcStats - statistics about the GC
// ============================================================================

/// Statistics about the garbage collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcStats {
    /// Total number of slots (including pooled)
    pub total_objects: usize,
    /// Number of slots in the pool (available for reuse)
    pub pooled_objects: usize,
    /// Number of live objects
    pub live_objects: usize,
    /// Number of distinct pinned handles
    pub pinned_objects: usize,
    /// Completed collection cycles
    pub cycles: usize,
}

// ============================================================================
// Tests
// ============================================================================
