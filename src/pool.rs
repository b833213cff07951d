//! Fixed-capacity particle storage.
//!
//! A [`ParticlePool`] pre-allocates every particle record a simulation will
//! ever use. Emission acquires a free record, death releases it back. The pool
//! never grows: when every record is alive, [`ParticlePool::acquire`] returns
//! `None` and the caller drops the emission.
//!
//! Records are addressed through [`ParticleHandle`]s. A handle carries the
//! slot's generation, so a stale handle (one whose particle already died)
//! can never release or mutate the slot's next occupant.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

const NOT_ACTIVE: u32 = u32::MAX;

/// Transient particle state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Normalized remaining life, 1.0 at birth and <= 0.0 at death.
    pub life: f32,
    /// Total lifetime in seconds.
    pub lifetime: f32,
    pub alive: bool,
    /// Opaque per-particle values for shaders and curves.
    pub custom: [f32; 4],
    pub mass: f32,
    /// Size as emitted, before any size curve.
    pub base_size: f32,
    /// Size after curves for the current frame.
    pub size: f32,
    /// RGBA color after curves for the current frame.
    pub color: Vec4,
    pub rotation: f32,
}

impl Particle {
    /// Every field zeroed, not alive.
    pub const ZEROED: Particle = Particle {
        position: Vec3::ZERO,
        velocity: Vec3::ZERO,
        life: 0.0,
        lifetime: 0.0,
        alive: false,
        custom: [0.0; 4],
        mass: 0.0,
        base_size: 0.0,
        size: 0.0,
        color: Vec4::ZERO,
        rotation: 0.0,
    };

    /// A freshly acquired particle: zeroed state, alive, full life, unit mass.
    fn spawned() -> Self {
        Particle {
            life: 1.0,
            alive: true,
            mass: 1.0,
            base_size: 1.0,
            size: 1.0,
            color: Vec4::ONE,
            ..Particle::ZEROED
        }
    }

    /// Elapsed fraction of the lifetime, always in `[0, 1]`.
    #[inline]
    pub fn normalized_age(&self) -> f32 {
        (1.0 - self.life).clamp(0.0, 1.0)
    }
}

impl Default for Particle {
    fn default() -> Self {
        Particle::ZEROED
    }
}

/// Renderer-facing particle layout.
///
/// 64 bytes, four rows of vec4, so a frame's particles can be uploaded as a
/// single byte slice via [`bytemuck::cast_slice`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    /// xyz = position, w = size
    pub position_size: [f32; 4],
    pub color: [f32; 4],
    pub custom: [f32; 4],
    /// x = normalized age, y = rotation, zw unused
    pub age_rotation: [f32; 4],
}

impl ParticleVertex {
    pub fn from_particle(p: &Particle) -> Self {
        Self {
            position_size: [p.position.x, p.position.y, p.position.z, p.size],
            color: p.color.to_array(),
            custom: p.custom,
            age_rotation: [p.normalized_age(), p.rotation, 0.0, 0.0],
        }
    }
}

/// Stable reference to a pooled particle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParticleHandle {
    index: u32,
    generation: u32,
}

impl ParticleHandle {
    /// Slot index inside the pool.
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Pre-allocated particle storage with acquire/release semantics.
///
/// `active_count() + available_count() == capacity()` holds at all times.
#[derive(Clone, Debug)]
pub struct ParticlePool {
    slots: Vec<Particle>,
    generations: Vec<u32>,
    /// Position of each slot inside `active`, or `NOT_ACTIVE`.
    active_pos: Vec<u32>,
    /// Indices of alive slots, in iteration order.
    active: Vec<u32>,
    /// Free slot stack. The most recently released slot is reused first.
    free: Vec<u32>,
}

impl ParticlePool {
    /// Create a pool holding exactly `capacity` particle records.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Particle::ZEROED; capacity],
            generations: vec![0; capacity],
            active_pos: vec![NOT_ACTIVE; capacity],
            active: Vec::with_capacity(capacity),
            // Reversed so the first acquire hands out slot 0.
            free: (0..capacity as u32).rev().collect(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn available_count(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Take a free record, reset to a newborn particle.
    ///
    /// Returns `None` when every record is alive. Callers treat that as a
    /// dropped emission, not an error.
    pub fn acquire(&mut self) -> Option<ParticleHandle> {
        let index = self.free.pop()?;
        let slot = index as usize;
        self.slots[slot] = Particle::spawned();
        self.active_pos[slot] = self.active.len() as u32;
        self.active.push(index);
        Some(ParticleHandle {
            index,
            generation: self.generations[slot],
        })
    }

    /// Return a particle to the pool, zeroing its state.
    ///
    /// Releasing a handle that is not currently alive in this pool (already
    /// released, stale, or out of range) is a no-op and returns `false`.
    pub fn release(&mut self, handle: ParticleHandle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        let slot = handle.index as usize;
        let pos = self.active_pos[slot] as usize;
        self.active.swap_remove(pos);
        if let Some(&moved) = self.active.get(pos) {
            self.active_pos[moved as usize] = pos as u32;
        }
        self.retire(slot);
        true
    }

    /// Release every alive particle.
    pub fn release_all(&mut self) {
        let active = std::mem::take(&mut self.active);
        for &index in active.iter().rev() {
            self.retire(index as usize);
        }
        self.active = active;
        self.active.clear();
    }

    /// Reclaim everything. The pool stays usable afterwards.
    pub fn dispose(&mut self) {
        self.release_all();
    }

    /// Whether `handle` refers to a particle that is alive right now.
    pub fn is_live(&self, handle: ParticleHandle) -> bool {
        let slot = handle.index as usize;
        slot < self.slots.len()
            && self.generations[slot] == handle.generation
            && self.active_pos[slot] != NOT_ACTIVE
    }

    pub fn get(&self, handle: ParticleHandle) -> Option<&Particle> {
        if self.is_live(handle) {
            Some(&self.slots[handle.index as usize])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, handle: ParticleHandle) -> Option<&mut Particle> {
        if self.is_live(handle) {
            Some(&mut self.slots[handle.index as usize])
        } else {
            None
        }
    }

    /// Handles of all alive particles, in iteration order.
    pub fn handles(&self) -> impl Iterator<Item = ParticleHandle> + '_ {
        self.active.iter().map(move |&index| ParticleHandle {
            index,
            generation: self.generations[index as usize],
        })
    }

    /// All alive particles, read-only.
    pub fn iter(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.active.iter().map(move |&index| &self.slots[index as usize])
    }

    /// Visit every alive particle; particles for which `f` returns `false`
    /// are released before the call returns.
    pub fn retain_mut(&mut self, mut f: impl FnMut(&mut Particle) -> bool) {
        let mut i = 0;
        while i < self.active.len() {
            let slot = self.active[i] as usize;
            if f(&mut self.slots[slot]) {
                i += 1;
            } else {
                // swap_remove moves the last alive particle into `i`,
                // which is visited next.
                self.active.swap_remove(i);
                if let Some(&moved) = self.active.get(i) {
                    self.active_pos[moved as usize] = i as u32;
                }
                self.retire(slot);
            }
        }
    }

    fn retire(&mut self, slot: usize) {
        self.slots[slot] = Particle::ZEROED;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.active_pos[slot] = NOT_ACTIVE;
        self.free.push(slot as u32);
    }
}
