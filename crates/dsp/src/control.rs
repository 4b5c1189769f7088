//! Wait-free parameter handoff between control and audio threads.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crate::ParameterSpec;

#[derive(Debug)]
struct Slot {
    id: &'static str,
    bits: AtomicU32,
}

/// Fixed table of `f32` parameter values stored as atomic bit patterns.
///
/// Each slot is an independent last-writer-wins scalar, so relaxed
/// ordering is sufficient; neither side ever blocks or allocates.
#[derive(Debug)]
pub struct ParameterSlots {
    slots: Box<[Slot]>,
}

impl ParameterSlots {
    /// Builds the table from parameter metadata, seeding every slot with
    /// its declared default.
    pub fn from_specs(specs: &[ParameterSpec]) -> Arc<Self> {
        let slots = specs
            .iter()
            .map(|spec| Slot {
                id: spec.id,
                bits: AtomicU32::new(spec.default.to_bits()),
            })
            .collect();
        Arc::new(Self { slots })
    }

    /// Creates a control-side handle sharing this table.
    pub fn port(self: &Arc<Self>) -> ParameterPort {
        ParameterPort {
            slots: Arc::clone(self),
        }
    }

    /// Stores a value. Returns `false` when the id is unknown, leaving
    /// every slot untouched.
    pub fn set(&self, id: &str, value: f32) -> bool {
        match self.slots.iter().find(|slot| slot.id == id) {
            Some(slot) => {
                slot.bits.store(value.to_bits(), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<f32> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| f32::from_bits(slot.bits.load(Ordering::Relaxed)))
    }

    /// Visits every slot in declaration order with its current value.
    pub fn for_each(&self, mut visit: impl FnMut(&'static str, f32)) {
        for slot in self.slots.iter() {
            visit(slot.id, f32::from_bits(slot.bits.load(Ordering::Relaxed)));
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Cloneable control-thread handle to a [`ParameterSlots`] table.
#[derive(Debug, Clone)]
pub struct ParameterPort {
    slots: Arc<ParameterSlots>,
}

impl ParameterPort {
    pub fn set(&self, id: &str, value: f32) -> bool {
        self.slots.set(id, value)
    }

    pub fn get(&self, id: &str) -> Option<f32> {
        self.slots.get(id)
    }
}
