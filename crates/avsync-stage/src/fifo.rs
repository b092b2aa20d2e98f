// crates/avsync-stage/src/fifo.rs
//
// Fifo<T>: the blocking queue abstraction workers pull from and push into.
//
// Generalizes the single-slot latest-wins `Mutex<Option<FrameRequest>> +
// Condvar` pattern in the teacher crate's worker.rs scrub-decode thread
// into a multi-item queue backed by crossbeam_channel — the channel
// supplies the blocking/backpressure substrate (bounded capacity == a real
// upstream FIFO's backpressure), while a small local lookahead buffer
// gives the two-ahead `see`/`see2` peek interface the video worker's
// subtitle alignment needs (Design Notes §9: no iterator invalidation,
// since peek never consumes).
//
// Only the owning worker thread calls pop/see/see2 — the lookahead buffer
// is not behind a lock. Producers reach the queue through a cloned
// `Sender<T>` obtained via `Fifo::sender`.

use std::collections::VecDeque;

use crossbeam_channel::{bounded, Receiver, Sender};

pub struct Fifo<T> {
    tx:     Sender<T>,
    rx:     Receiver<T>,
    peeked: VecDeque<T>,
}

impl<T> Fifo<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx, peeked: VecDeque::new() }
    }

    /// A cloned handle producers use to push into this queue from another
    /// thread. Blocks on `push` once the queue is at capacity.
    pub fn sender(&self) -> Sender<T> {
        self.tx.clone()
    }

    /// Push from the owning thread itself (used in tests and single-thread
    /// wiring). Blocks if the queue is full.
    pub fn push(&self, item: T) {
        let _ = self.tx.send(item);
    }

    /// Pop the front item, blocking until one is available.
    pub fn pop(&mut self) -> T {
        if let Some(item) = self.peeked.pop_front() {
            return item;
        }
        self.rx.recv().expect("fifo sender dropped while pop() was waiting")
    }

    /// Non-blocking pop; `None` if nothing is queued right now.
    pub fn try_pop(&mut self) -> Option<T> {
        if let Some(item) = self.peeked.pop_front() {
            return Some(item);
        }
        self.rx.try_recv().ok()
    }

    /// Peek the front item without consuming it (`hb_fifo_see`).
    pub fn see(&mut self) -> Option<&T> {
        self.fill_peeked(1);
        self.peeked.front()
    }

    /// Peek the second item without consuming it (`hb_fifo_see2`).
    pub fn see2(&mut self) -> Option<&T> {
        self.fill_peeked(2);
        self.peeked.get(1)
    }

    /// Mutable peek of the front item. `hb_fifo_see` in the original returns
    /// a live pointer into the queued buffer, so callers (subtitle overlap
    /// clipping and short-caption extension, in particular) mutate the
    /// queued item's stamps in place rather than a copy — this is the Rust
    /// equivalent of that aliasing.
    pub fn see_mut(&mut self) -> Option<&mut T> {
        self.fill_peeked(1);
        self.peeked.front_mut()
    }

    fn fill_peeked(&mut self, n: usize) {
        while self.peeked.len() < n {
            match self.rx.try_recv() {
                Ok(item) => self.peeked.push_back(item),
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_consume() {
        let mut f: Fifo<i32> = Fifo::new(8);
        f.push(1);
        f.push(2);
        assert_eq!(f.see(), Some(&1));
        assert_eq!(f.see(), Some(&1));
        assert_eq!(f.see2(), Some(&2));
        assert_eq!(f.pop(), 1);
        assert_eq!(f.pop(), 2);
    }

    #[test]
    fn pop_drains_peeked_before_channel() {
        let mut f: Fifo<i32> = Fifo::new(8);
        f.push(1);
        f.push(2);
        f.push(3);
        let _ = f.see2(); // buffers 1 and 2 into `peeked`
        f.push(4);        // 3 and 4 still sit in the channel
        assert_eq!(f.pop(), 1);
        assert_eq!(f.pop(), 2);
        assert_eq!(f.pop(), 3);
        assert_eq!(f.pop(), 4);
    }
}
