use crate::event::Event;
use chrono::{DateTime, Utc};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Min-heap of events keyed by `(timestamp, order)`.
///
/// Two counters provide three ordering tiers at equal timestamps:
/// * front-inserted events (descending counter from −1), latest insertion first,
/// * then ticks, which are routed through the front counter automatically,
/// * then regular events (ascending counter from 0) in insertion order.
///
/// The front channel exists so confirmations triggered reactively by strategy code slot in
/// ahead of a tick already queued at the same instant, preserving the
/// `bet -> confirmation -> result` ordering.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<QueuedEvent>>,
    seq_back: i64,
    seq_front: i64,
}

#[derive(Debug)]
struct QueuedEvent {
    time: DateTime<Utc>,
    seq: i64,
    event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        (self.time, self.seq) == (other.time, other.seq)
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

impl EventQueue {
    /// Enqueue an event. Ticks are routed through the front channel; everything else joins
    /// the back of its timestamp tier.
    pub fn push(&mut self, event: Event) {
        let seq = match event {
            Event::Time(_) => self.next_front(),
            _ => self.next_back(),
        };
        self.push_with_seq(event, seq);
    }

    /// Enqueue an event ahead of anything already queued at the same timestamp.
    pub fn push_front(&mut self, event: Event) {
        let seq = self.next_front();
        self.push_with_seq(event, seq);
    }

    /// Pop the minimum `(timestamp, order)` event.
    pub fn pop(&mut self) -> Option<(DateTime<Utc>, Event)> {
        self.heap
            .pop()
            .map(|Reverse(queued)| (queued.time, queued.event))
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Whether any non-tick event is waiting.
    pub fn has_regular(&self) -> bool {
        self.heap
            .iter()
            .any(|Reverse(queued)| !matches!(queued.event, Event::Time(_)))
    }

    /// Earliest non-tick event strictly after `now`, if any.
    pub fn next_regular_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.heap
            .iter()
            .filter(|Reverse(queued)| {
                queued.time > now && !matches!(queued.event, Event::Time(_))
            })
            .map(|Reverse(queued)| queued.time)
            .min()
    }

    fn next_back(&mut self) -> i64 {
        let seq = self.seq_back;
        self.seq_back += 1;
        seq
    }

    fn next_front(&mut self) -> i64 {
        self.seq_front -= 1;
        self.seq_front
    }

    fn push_with_seq(&mut self, event: Event, seq: i64) {
        self.heap.push(Reverse(QueuedEvent {
            time: event.time(),
            seq,
            event,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::model::RaceId,
        event::{ResultEvent, TimeEvent},
    };
    use chrono::TimeDelta;

    fn result(race_id: &str, time: DateTime<Utc>) -> Event {
        Event::Result(ResultEvent::new(RaceId::new(race_id), time))
    }

    fn tick(time: DateTime<Utc>) -> Event {
        Event::Time(TimeEvent::new("tick", time))
    }

    #[test]
    fn test_pop_orders_by_timestamp_first() {
        let base = DateTime::<Utc>::MIN_UTC;
        let plus_s = |s: i64| base + TimeDelta::seconds(s);

        let mut queue = EventQueue::default();
        queue.push(result("late", plus_s(10)));
        queue.push(result("early", plus_s(1)));
        queue.push(tick(plus_s(5)));

        let popped: Vec<DateTime<Utc>> = std::iter::from_fn(|| queue.pop())
            .map(|(time, _)| time)
            .collect();
        assert_eq!(popped, vec![plus_s(1), plus_s(5), plus_s(10)]);
    }

    #[test]
    fn test_equal_timestamp_tiers() {
        let time = DateTime::<Utc>::MIN_UTC;
        let mut queue = EventQueue::default();

        // Regular events keep FIFO order, ticks precede them, front insertions precede
        // ticks in LIFO order.
        queue.push(result("regular-1", time));
        queue.push(tick(time));
        queue.push(result("regular-2", time));
        queue.push_front(result("front-1", time));
        queue.push_front(result("front-2", time));

        let order: Vec<String> = std::iter::from_fn(|| queue.pop())
            .map(|(_, event)| match event {
                Event::Time(event) => event.name.to_string(),
                Event::Result(event) => event.race_id.to_string(),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();

        assert_eq!(
            order,
            vec!["front-2", "front-1", "tick", "regular-1", "regular-2"]
        );
    }

    #[test]
    fn test_next_regular_after_ignores_ticks() {
        let base = DateTime::<Utc>::MIN_UTC;
        let plus_s = |s: i64| base + TimeDelta::seconds(s);

        let mut queue = EventQueue::default();
        queue.push(tick(plus_s(5)));
        queue.push(result("r1", plus_s(3)));
        queue.push(result("r2", plus_s(8)));

        assert_eq!(queue.next_regular_after(plus_s(3)), Some(plus_s(8)));
        assert_eq!(queue.next_regular_after(plus_s(8)), None);
        assert!(queue.has_regular());
    }
}
