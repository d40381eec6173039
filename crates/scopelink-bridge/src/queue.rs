use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};

use scopelink_frame::Packet;

/// Thread-safe FIFO of packets awaiting transmission.
///
/// One mutex guards the queue; every push and pop is a single whole
/// critical section. A consumer blocked on an empty queue waits on a
/// condvar instead of polling, and [`PacketQueue::close`] wakes every
/// waiter so a stopping worker never stays parked here.
///
/// Packets still queued when the queue closes are retained and handed out
/// again after [`PacketQueue::reopen`]; a stop/start cycle of the owning
/// bridge does not drop pending traffic.
pub struct PacketQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
}

struct QueueInner {
    packets: VecDeque<Packet>,
    closed: bool,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                packets: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append a packet and wake one blocked consumer.
    pub fn push(&self, packet: Packet) {
        let mut inner = self.lock();
        inner.packets.push_back(packet);
        drop(inner);
        self.available.notify_one();
    }

    /// Pop the oldest packet, blocking while the queue is open and empty.
    ///
    /// Returns `None` once the queue has been closed.
    pub fn pop(&self) -> Option<Packet> {
        let mut inner = self.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(packet) = inner.packets.pop_front() {
                return Some(packet);
            }
            inner = self
                .available
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close the queue and wake all waiters. Pending packets are retained.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Reopen a closed queue so the next run can drain it.
    pub fn reopen(&self) {
        self.lock().closed = false;
    }

    /// Number of packets currently queued.
    pub fn len(&self) -> usize {
        self.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn fifo_order_preserved() {
        let queue = PacketQueue::new();
        queue.push(Packet::new(1, 1, &b"a"[..]));
        queue.push(Packet::new(2, 2, &b"b"[..]));
        queue.push(Packet::new(3, 3, &b"c"[..]));

        assert_eq!(queue.pop().unwrap().command, 1);
        assert_eq!(queue.pop().unwrap().command, 2);
        assert_eq!(queue.pop().unwrap().command, 3);
    }

    #[test]
    fn pop_blocks_until_push() {
        let queue = Arc::new(PacketQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.pop())
        };

        std::thread::sleep(Duration::from_millis(50));
        queue.push(Packet::new(9, 9, &b"late"[..]));

        let packet = consumer.join().unwrap().unwrap();
        assert_eq!(packet.command, 9);
    }

    #[test]
    fn close_wakes_blocked_consumer() {
        let queue = Arc::new(PacketQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.pop())
        };

        std::thread::sleep(Duration::from_millis(50));
        queue.close();

        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn closed_queue_retains_packets_for_reopen() {
        let queue = PacketQueue::new();
        queue.push(Packet::new(1, 1, &b"kept"[..]));
        queue.close();

        assert!(queue.pop().is_none());
        assert_eq!(queue.len(), 1);

        queue.reopen();
        assert_eq!(queue.pop().unwrap().data.as_ref(), b"kept");
    }

    #[test]
    fn push_after_close_is_kept() {
        let queue = PacketQueue::new();
        queue.close();
        queue.push(Packet::new(4, 4, &b"queued"[..]));

        queue.reopen();
        assert_eq!(queue.pop().unwrap().command, 4);
    }
}
