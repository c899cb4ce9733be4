//! Hand-off of decimated audio frames to whoever draws them. Pushing never
//! blocks; a full queue simply loses the frame.
//!
//! Frames circulate through a preallocated pool so the audio thread does not
//! allocate: the renderer takes a frame with [`VizSender::acquire`], the
//! consumer hands it back with [`VizReceiver::recycle`] once drawn.

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

pub fn viz_channel(capacity: usize, frame_len: usize) -> (VizSender, VizReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = bounded(capacity);
    // a full queue plus the frame being filled
    let (pool_tx, pool_rx) = bounded(capacity + 1);
    for _ in 0..=capacity {
        let _ = pool_tx.try_send(Vec::with_capacity(frame_len));
    }
    (
        VizSender { tx, pool_tx: pool_tx.clone(), pool_rx, frame_len },
        VizReceiver { rx, pool_tx },
    )
}

#[derive(Clone)]
pub struct VizSender {
    tx: Sender<Vec<f32>>,
    pool_tx: Sender<Vec<f32>>,
    pool_rx: Receiver<Vec<f32>>,
    frame_len: usize,
}

impl VizSender {
    /// An empty frame from the pool. Allocates only when the consumer is
    /// holding on to every pooled frame.
    pub fn acquire(&self) -> Vec<f32> {
        match self.pool_rx.try_recv() {
            Ok(mut frame) => {
                frame.clear();
                frame
            }
            Err(_) => Vec::with_capacity(self.frame_len),
        }
    }

    /// Returns false when the frame was dropped. A dropped frame goes back
    /// to the pool.
    pub fn push(&self, frame: Vec<f32>) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) | Err(TrySendError::Disconnected(frame)) => {
                let _ = self.pool_tx.try_send(frame);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Frames ready to be filled without allocating.
    pub fn pooled(&self) -> usize {
        self.pool_rx.len()
    }
}

#[derive(Clone)]
pub struct VizReceiver {
    rx: Receiver<Vec<f32>>,
    pool_tx: Sender<Vec<f32>>,
}

impl VizReceiver {
    /// Next frame, or `None` once `timeout` passes without one.
    pub fn pop(&self, timeout: Duration) -> Option<Vec<f32>> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Give a drawn frame back for reuse.
    pub fn recycle(&self, frame: Vec<f32>) {
        let _ = self.pool_tx.try_send(frame);
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn overflow_drops_without_blocking() {
        let (tx, rx) = viz_channel(3, 1);
        let start = Instant::now();
        let accepted = (0..1000)
            .filter(|i| {
                let mut frame = tx.acquire();
                frame.push(*i as f32);
                tx.push(frame)
            })
            .count();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(accepted, 3);
        assert_eq!(rx.len(), 3);
        assert_eq!(rx.capacity(), 3);

        assert_eq!(rx.pop(Duration::from_millis(10)), Some(vec![0.0]));
        assert_eq!(rx.pop(Duration::from_millis(10)), Some(vec![1.0]));
        assert_eq!(rx.pop(Duration::from_millis(10)), Some(vec![2.0]));
        assert_eq!(rx.pop(Duration::from_millis(10)), None);
    }

    #[test]
    fn push_after_consumer_is_gone() {
        let (tx, rx) = viz_channel(2, 4);
        drop(rx);
        assert!(!tx.push(vec![0.5]));
    }

    #[test]
    fn frames_circulate_through_the_pool() {
        let (tx, rx) = viz_channel(2, 16);
        assert_eq!(tx.pooled(), 3);

        let mut frame = tx.acquire();
        assert!(frame.is_empty() && frame.capacity() >= 16);
        let ptr = frame.as_ptr();
        frame.extend([0.25f32; 16]);
        assert!(tx.push(frame));
        assert_eq!(tx.pooled(), 2);

        let drawn = rx.pop(Duration::from_millis(10)).unwrap();
        assert_eq!(drawn.as_ptr(), ptr);
        rx.recycle(drawn);
        assert_eq!(tx.pooled(), 3);

        // reused frames come back empty
        for _ in 0..3 {
            let frame = tx.acquire();
            assert!(frame.is_empty() && frame.capacity() >= 16);
        }
        assert_eq!(tx.pooled(), 0);
    }

    #[test]
    fn dropped_frames_return_to_the_pool() {
        let (tx, _rx) = viz_channel(1, 8);
        assert!(tx.push(tx.acquire()));
        assert_eq!(tx.pooled(), 1);
        assert!(!tx.push(tx.acquire()));
        assert_eq!(tx.pooled(), 1);
    }
}
