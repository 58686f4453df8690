//! The outgoing frame queue and its cloneable handle.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::trace;

use crate::error::WsError;
use crate::frame::Frame;

#[derive(Debug, Default)]
struct OutboxState {
    queue: VecDeque<Frame>,
    close_queued: bool,
}

/// Frames waiting to be written, shared between a connection and its senders.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    state: Mutex<OutboxState>,
    notify: Notify,
}

impl Outbox {
    fn lock(&self) -> MutexGuard<'_, OutboxState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queues a frame. Nothing may follow a close frame.
    pub(crate) fn push(&self, frame: Frame) -> Result<(), WsError> {
        frame.validate()?;
        {
            let mut state = self.lock();
            if state.close_queued {
                return Err(WsError::CloseSent);
            }
            state.close_queued = frame.is_close();
            trace!(opcode = ?frame.opcode, len = frame.payload.len(), queued = state.queue.len() + 1, "frame queued");
            state.queue.push_back(frame);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Queues a frame unless a close frame already was, in which case it is dropped.
    pub(crate) fn push_reply(&self, frame: Frame) -> bool {
        self.push(frame).is_ok()
    }

    pub(crate) fn pop(&self) -> Option<Frame> {
        self.lock().queue.pop_front()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.lock().queue.is_empty()
    }

    pub(crate) fn close_queued(&self) -> bool {
        self.lock().close_queued
    }

    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Queues frames on a connection from anywhere, including other threads.
///
/// Frames are written by the connection's next [`process`](crate::WebSocketConnection::process)
/// call, in the order they were queued.
#[derive(Debug, Clone)]
pub struct FrameSender {
    outbox: Arc<Outbox>,
}

impl FrameSender {
    pub(crate) fn new(outbox: Arc<Outbox>) -> Self {
        Self { outbox }
    }

    /// Queues `frame`. Fails with [`WsError::CloseSent`] once a close frame was queued, and
    /// with a frame error for invalid control frames.
    pub fn send(&self, frame: Frame) -> Result<(), WsError> {
        self.outbox.push(frame)
    }

    /// True while frames are waiting to be written.
    pub fn has_pending(&self) -> bool {
        self.outbox.has_pending()
    }

    /// True once a close frame was queued.
    pub fn is_closing(&self) -> bool {
        self.outbox.close_queued()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::OpCode;

    #[test]
    fn frames_keep_their_order() {
        let outbox = Arc::new(Outbox::default());
        let sender = FrameSender::new(Arc::clone(&outbox));
        sender.send(Frame::text("a")).unwrap();
        sender.send(Frame::text("b")).unwrap();
        assert!(sender.has_pending());

        assert_eq!(outbox.pop(), Some(Frame::text("a")));
        assert_eq!(outbox.pop(), Some(Frame::text("b")));
        assert_eq!(outbox.pop(), None);
        assert!(!sender.has_pending());
    }

    #[test]
    fn nothing_after_close() {
        let outbox = Arc::new(Outbox::default());
        let sender = FrameSender::new(Arc::clone(&outbox));
        sender.send(Frame::close(1000u16, "")).unwrap();
        assert!(sender.is_closing());
        assert!(matches!(sender.send(Frame::text("late")), Err(WsError::CloseSent)));
        assert!(!outbox.push_reply(Frame::pong("")));
    }

    #[test]
    fn invalid_frames_are_refused() {
        let sender = FrameSender::new(Arc::new(Outbox::default()));
        assert!(matches!(sender.send(Frame::new(false, OpCode::Close, "")), Err(WsError::Frame { .. })));
        assert!(!sender.has_pending());
    }

    #[test]
    fn senders_work_across_threads() {
        let outbox = Arc::new(Outbox::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sender = FrameSender::new(Arc::clone(&outbox));
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        sender.send(Frame::binary(vec![i])).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut count = 0;
        while outbox.pop().is_some() {
            count += 1;
        }
        assert_eq!(count, 40);
    }

    #[tokio::test]
    async fn push_wakes_a_waiting_driver() {
        let outbox = Arc::new(Outbox::default());
        let waiter = {
            let outbox = Arc::clone(&outbox);
            tokio::spawn(async move { outbox.notified().await })
        };
        tokio::task::yield_now().await;
        outbox.push(Frame::ping("")).unwrap();
        waiter.await.unwrap();
    }
}
