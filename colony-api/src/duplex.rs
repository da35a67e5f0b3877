//! Multi-view channels.
//!
//! A [`Duplex`] owns one bounded `flume` channel and hands out directional
//! views of it. The owner keeps write access while an observer receives a
//! [`flume::Receiver`], which has no way to send; producers receive a
//! [`flume::Sender`], which has no way to receive.
//!
//! Closing a duplex drops the sender it retains. Outstanding writer views
//! keep the channel open until they are dropped too, after which readers
//! drain the buffered items and then observe disconnection.

use std::sync::{Mutex, MutexGuard, PoisonError};

use flume::{Receiver, Sender};

/// Zero-sized token whose arrival on a cancel channel means "abort".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CancelWorkSignal;

/// A single channel exposed as bidirectional, read-only and write-only views.
#[derive(Debug)]
pub struct Duplex<T> {
    sender: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
    capacity: usize,
}

impl<T> Duplex<T> {
    /// Creates a duplex over a bounded channel. A capacity of zero yields a
    /// rendezvous channel.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = flume::bounded(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            capacity,
        }
    }

    /// Both ends of the channel, or `None` once closed.
    pub fn channel(&self) -> Option<(Sender<T>, Receiver<T>)> {
        self.writer().map(|tx| (tx, self.reader()))
    }

    /// Read-only view.
    pub fn reader(&self) -> Receiver<T> {
        self.receiver.clone()
    }

    /// Write-only view, or `None` once closed.
    pub fn writer(&self) -> Option<Sender<T>> {
        self.sender_slot().clone()
    }

    /// Drops the retained sender. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        self.sender_slot().take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.sender_slot().is_none()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently buffered.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    fn sender_slot(&self) -> MutexGuard<'_, Option<Sender<T>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_share_one_channel() {
        let duplex = Duplex::<u32>::new(4);
        let (tx, rx) = duplex.channel().expect("open duplex");

        tx.send(1).unwrap();
        duplex.writer().unwrap().send(2).unwrap();

        assert_eq!(duplex.len(), 2);
        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(duplex.reader().recv().unwrap(), 2);
    }

    #[test]
    fn test_close_disconnects_after_drain() {
        let duplex = Duplex::<u32>::new(2);
        let reader = duplex.reader();
        duplex.writer().unwrap().send(9).unwrap();

        assert!(duplex.close());
        assert!(!duplex.close());
        assert!(duplex.is_closed());
        assert!(duplex.writer().is_none());
        assert!(duplex.channel().is_none());

        assert_eq!(reader.recv().unwrap(), 9);
        assert!(reader.recv().is_err());
    }

    #[test]
    fn test_bounded_capacity() {
        let duplex = Duplex::<CancelWorkSignal>::new(1);
        let tx = duplex.writer().unwrap();

        assert!(tx.try_send(CancelWorkSignal).is_ok());
        assert!(matches!(tx.try_send(CancelWorkSignal), Err(flume::TrySendError::Full(_))));
        assert_eq!(duplex.capacity(), 1);
    }
}
