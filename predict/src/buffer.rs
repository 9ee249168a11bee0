//! Fixed-capacity ring indexed by `tick % capacity`.

use wire::Tick;

use crate::error::{PredictError, PredictResult};

/// Remembers one value per tick for the last `capacity` ticks.
///
/// Each slot keeps the tick it was written for, so a lookup for a tick that
/// has since been overwritten returns `None` instead of a newer value.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionBuffer<T> {
    slots: Vec<Option<(Tick, T)>>,
}

impl<T> PredictionBuffer<T> {
    pub fn new(capacity: usize) -> PredictResult<Self> {
        if capacity == 0 {
            return Err(PredictError::ZeroCapacity);
        }
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Ok(Self { slots })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn store(&mut self, tick: Tick, value: T) {
        let index = self.index(tick);
        self.slots[index] = Some((tick, value));
    }

    #[must_use]
    pub fn get(&self, tick: Tick) -> Option<&T> {
        match &self.slots[self.index(tick)] {
            Some((stored, value)) if *stored == tick => Some(value),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    fn index(&self, tick: Tick) -> usize {
        tick.raw() as usize % self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_by_tick_modulo() {
        let mut buffer = PredictionBuffer::new(4).unwrap();
        buffer.store(Tick::new(1), 10);
        buffer.store(Tick::new(2), 20);
        assert_eq!(buffer.get(Tick::new(1)), Some(&10));
        assert_eq!(buffer.get(Tick::new(3)), None);
    }

    #[test]
    fn overwritten_tick_is_gone() {
        let mut buffer = PredictionBuffer::new(4).unwrap();
        buffer.store(Tick::new(1), 10);
        buffer.store(Tick::new(5), 50);
        assert_eq!(buffer.get(Tick::new(1)), None);
        assert_eq!(buffer.get(Tick::new(5)), Some(&50));
    }

    #[test]
    fn zero_capacity_rejected() {
        assert_eq!(
            PredictionBuffer::<u8>::new(0).unwrap_err(),
            PredictError::ZeroCapacity
        );
    }
}
