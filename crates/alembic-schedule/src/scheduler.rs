//! Priority queues of putative reaction times.
//!
//! Every implementation orders by `(time, reaction id)`: ties in time go to
//! the lowest id, so two runs with the same inputs pick the same events.
//! Schedulers only see ids and times, never environment state.

use alembic_core::{ReactionId, ScheduleError, Time};

/// A queue of scheduled reactions keyed by putative time.
pub trait Scheduler: Send {
    /// Schedule `id` at `time`.
    ///
    /// Fails with [`ScheduleError::AlreadyScheduled`] if `id` is present.
    fn add_reaction(&mut self, id: ReactionId, time: Time) -> Result<(), ScheduleError>;

    /// Unschedule `id`, returning the time it was scheduled at.
    fn remove_reaction(&mut self, id: ReactionId) -> Result<Time, ScheduleError>;

    /// Move `id` to a new time.
    fn update(&mut self, id: ReactionId, time: Time) -> Result<(), ScheduleError>;

    /// The reaction with the smallest `(time, id)`.
    ///
    /// Fails with [`ScheduleError::Empty`] when nothing is scheduled or the
    /// earliest time is [`Time::INFINITE`].
    fn next_reaction(&self) -> Result<(ReactionId, Time), ScheduleError>;

    /// The time `id` is scheduled at, if scheduled.
    fn time_of(&self, id: ReactionId) -> Option<Time>;

    /// Number of scheduled reactions, including parked ones.
    fn len(&self) -> usize;

    /// Whether nothing is scheduled.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unschedule everything.
    fn clear(&mut self);
}

/// Array-backed binary min-heap with a position index.
///
/// `positions[id]` holds the heap slot of each scheduled reaction, so
/// `update` and `remove_reaction` reposition a single entry in O(log n)
/// instead of rebuilding. This is the indexed priority queue of the
/// next-reaction method.
///
/// The index is as long as the highest scheduled id. Removing that id
/// trims the unused tail; gaps below a live id stay allocated.
#[derive(Debug, Default)]
pub struct IndexedHeap {
    heap: Vec<(Time, ReactionId)>,
    positions: Vec<Option<usize>>,
}

impl IndexedHeap {
    /// An empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty heap with room for `capacity` reactions.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
        }
    }

    fn position(&self, id: ReactionId) -> Option<usize> {
        self.positions.get(id.index()).copied().flatten()
    }

    fn set_position(&mut self, slot: usize) {
        let id = self.heap[slot].1;
        self.positions[id.index()] = Some(slot);
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.set_position(a);
        self.set_position(b);
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.heap[slot] >= self.heap[parent] {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;
            if left < len && self.heap[left] < self.heap[smallest] {
                smallest = left;
            }
            if right < len && self.heap[right] < self.heap[smallest] {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }

    fn reposition(&mut self, slot: usize) {
        if slot > 0 && self.heap[slot] < self.heap[(slot - 1) / 2] {
            self.sift_up(slot);
        } else {
            self.sift_down(slot);
        }
    }

    /// Check the heap property and the position index. Test helper.
    #[doc(hidden)]
    pub fn is_consistent(&self) -> bool {
        for slot in 1..self.heap.len() {
            if self.heap[slot] < self.heap[(slot - 1) / 2] {
                return false;
            }
        }
        let indexed = self.positions.iter().filter(|p| p.is_some()).count();
        indexed == self.heap.len()
            && self
                .heap
                .iter()
                .enumerate()
                .all(|(slot, &(_, id))| self.position(id) == Some(slot))
    }
}

impl Scheduler for IndexedHeap {
    fn add_reaction(&mut self, id: ReactionId, time: Time) -> Result<(), ScheduleError> {
        if self.position(id).is_some() {
            return Err(ScheduleError::AlreadyScheduled { reaction: id });
        }
        if self.positions.len() <= id.index() {
            self.positions.resize(id.index() + 1, None);
        }
        self.heap.push((time, id));
        let slot = self.heap.len() - 1;
        self.set_position(slot);
        self.sift_up(slot);
        Ok(())
    }

    fn remove_reaction(&mut self, id: ReactionId) -> Result<Time, ScheduleError> {
        let slot = self
            .position(id)
            .ok_or(ScheduleError::NotScheduled { reaction: id })?;
        let last = self.heap.len() - 1;
        if slot != last {
            self.swap(slot, last);
        }
        let (time, _) = self.heap.pop().ok_or(ScheduleError::NotScheduled { reaction: id })?;
        self.positions[id.index()] = None;
        trim_tail(&mut self.positions);
        if slot < self.heap.len() {
            self.reposition(slot);
        }
        Ok(time)
    }

    fn update(&mut self, id: ReactionId, time: Time) -> Result<(), ScheduleError> {
        let slot = self
            .position(id)
            .ok_or(ScheduleError::NotScheduled { reaction: id })?;
        self.heap[slot].0 = time;
        self.reposition(slot);
        Ok(())
    }

    fn next_reaction(&self) -> Result<(ReactionId, Time), ScheduleError> {
        match self.heap.first() {
            Some(&(time, id)) if !time.is_infinite() => Ok((id, time)),
            _ => Err(ScheduleError::Empty),
        }
    }

    fn time_of(&self, id: ReactionId) -> Option<Time> {
        self.position(id).map(|slot| self.heap[slot].0)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn clear(&mut self) {
        self.heap.clear();
        self.positions.clear();
    }
}

/// Unordered table scanned in full on every query.
///
/// O(1) updates, O(n) `next_reaction`. Used as a reference oracle in tests
/// and as a benchmark baseline.
#[derive(Debug, Default)]
pub struct LinearScheduler {
    times: Vec<Option<Time>>,
    len: usize,
}

impl LinearScheduler {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for LinearScheduler {
    fn add_reaction(&mut self, id: ReactionId, time: Time) -> Result<(), ScheduleError> {
        if self.times.len() <= id.index() {
            self.times.resize(id.index() + 1, None);
        }
        let slot = &mut self.times[id.index()];
        if slot.is_some() {
            return Err(ScheduleError::AlreadyScheduled { reaction: id });
        }
        *slot = Some(time);
        self.len += 1;
        Ok(())
    }

    fn remove_reaction(&mut self, id: ReactionId) -> Result<Time, ScheduleError> {
        let time = self
            .times
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(ScheduleError::NotScheduled { reaction: id })?;
        trim_tail(&mut self.times);
        self.len -= 1;
        Ok(time)
    }

    fn update(&mut self, id: ReactionId, time: Time) -> Result<(), ScheduleError> {
        match self.times.get_mut(id.index()) {
            Some(Some(slot)) => {
                *slot = time;
                Ok(())
            }
            _ => Err(ScheduleError::NotScheduled { reaction: id }),
        }
    }

    fn next_reaction(&self) -> Result<(ReactionId, Time), ScheduleError> {
        // Strict `<` keeps the lowest id on ties since ids are scanned in order.
        let mut best: Option<(ReactionId, Time)> = None;
        for (index, time) in self.times.iter().enumerate() {
            if let Some(time) = *time {
                if best.is_none_or(|(_, t)| time < t) {
                    best = Some((ReactionId(index as u32), time));
                }
            }
        }
        match best {
            Some((id, time)) if !time.is_infinite() => Ok((id, time)),
            _ => Err(ScheduleError::Empty),
        }
    }

    fn time_of(&self, id: ReactionId) -> Option<Time> {
        self.times.get(id.index()).copied().flatten()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.times.clear();
        self.len = 0;
    }
}

/// Drop trailing empty entries of an id-indexed table.
fn trim_tail<T>(table: &mut Vec<Option<T>>) {
    while matches!(table.last(), Some(None)) {
        table.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(v: f64) -> Time {
        Time::new(v).unwrap()
    }

    fn r(v: u32) -> ReactionId {
        ReactionId(v)
    }

    fn both() -> Vec<Box<dyn Scheduler>> {
        vec![Box::new(IndexedHeap::new()), Box::new(LinearScheduler::new())]
    }

    #[test]
    fn empty_schedule_reports_empty() {
        for s in both() {
            assert_eq!(s.next_reaction(), Err(ScheduleError::Empty));
            assert!(s.is_empty());
        }
    }

    #[test]
    fn all_infinite_reports_empty() {
        for mut s in both() {
            s.add_reaction(r(0), Time::INFINITE).unwrap();
            s.add_reaction(r(1), Time::INFINITE).unwrap();
            assert_eq!(s.next_reaction(), Err(ScheduleError::Empty));
            assert_eq!(s.len(), 2);
        }
    }

    #[test]
    fn returns_minimum() {
        for mut s in both() {
            s.add_reaction(r(0), t(5.0)).unwrap();
            s.add_reaction(r(1), t(2.0)).unwrap();
            s.add_reaction(r(2), t(9.0)).unwrap();
            assert_eq!(s.next_reaction(), Ok((r(1), t(2.0))));
        }
    }

    #[test]
    fn ties_break_on_lowest_id() {
        for mut s in both() {
            s.add_reaction(r(7), t(1.0)).unwrap();
            s.add_reaction(r(3), t(1.0)).unwrap();
            s.add_reaction(r(5), t(1.0)).unwrap();
            assert_eq!(s.next_reaction(), Ok((r(3), t(1.0))));
        }
    }

    #[test]
    fn update_moves_entry_both_ways() {
        for mut s in both() {
            s.add_reaction(r(0), t(1.0)).unwrap();
            s.add_reaction(r(1), t(2.0)).unwrap();
            s.add_reaction(r(2), t(3.0)).unwrap();

            s.update(r(0), t(10.0)).unwrap();
            assert_eq!(s.next_reaction(), Ok((r(1), t(2.0))));

            s.update(r(2), t(0.5)).unwrap();
            assert_eq!(s.next_reaction(), Ok((r(2), t(0.5))));
            assert_eq!(s.time_of(r(0)), Some(t(10.0)));
        }
    }

    #[test]
    fn remove_returns_time_and_unschedules() {
        for mut s in both() {
            s.add_reaction(r(0), t(1.0)).unwrap();
            s.add_reaction(r(1), t(2.0)).unwrap();
            assert_eq!(s.remove_reaction(r(0)), Ok(t(1.0)));
            assert_eq!(s.time_of(r(0)), None);
            assert_eq!(s.next_reaction(), Ok((r(1), t(2.0))));
            assert_eq!(
                s.remove_reaction(r(0)),
                Err(ScheduleError::NotScheduled { reaction: r(0) })
            );
            assert_eq!(s.len(), 1);
        }
    }

    #[test]
    fn duplicate_add_is_rejected() {
        for mut s in both() {
            s.add_reaction(r(4), t(1.0)).unwrap();
            assert_eq!(
                s.add_reaction(r(4), t(2.0)),
                Err(ScheduleError::AlreadyScheduled { reaction: r(4) })
            );
        }
    }

    #[test]
    fn update_unknown_is_rejected() {
        for mut s in both() {
            assert_eq!(
                s.update(r(9), t(1.0)),
                Err(ScheduleError::NotScheduled { reaction: r(9) })
            );
        }
    }

    #[test]
    fn clear_empties() {
        for mut s in both() {
            s.add_reaction(r(0), t(1.0)).unwrap();
            s.clear();
            assert!(s.is_empty());
            assert_eq!(s.next_reaction(), Err(ScheduleError::Empty));
            s.add_reaction(r(0), t(3.0)).unwrap();
            assert_eq!(s.next_reaction(), Ok((r(0), t(3.0))));
        }
    }

    #[test]
    fn heap_stays_consistent_through_churn() {
        let mut heap = IndexedHeap::with_capacity(16);
        for i in 0..16u32 {
            heap.add_reaction(r(i), t(f64::from((i * 7) % 16))).unwrap();
            assert!(heap.is_consistent());
        }
        for i in (0..16u32).step_by(3) {
            heap.remove_reaction(r(i)).unwrap();
            assert!(heap.is_consistent());
        }
        for i in (1..16u32).step_by(3) {
            heap.update(r(i), t(f64::from(20 - i))).unwrap();
            assert!(heap.is_consistent());
        }
    }

    #[test]
    fn index_shrinks_when_high_ids_leave() {
        let mut heap = IndexedHeap::new();
        for id in 0..100 {
            heap.add_reaction(r(id), t(f64::from(id))).unwrap();
        }
        for id in (10..100).rev() {
            heap.remove_reaction(r(id)).unwrap();
        }
        assert_eq!(heap.positions.len(), 10);
        assert!(heap.is_consistent());

        // Churn on fresh ids keeps the index bounded by the live maximum.
        for id in 100..1_000 {
            heap.add_reaction(r(id), t(1.5)).unwrap();
            heap.remove_reaction(r(id)).unwrap();
        }
        assert_eq!(heap.positions.len(), 10);
        assert_eq!(heap.len(), 10);
        assert_eq!(heap.next_reaction(), Ok((r(0), Time::ZERO)));
        assert!(heap.is_consistent());
    }
}
