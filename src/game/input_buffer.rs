//! Lock-free action queue for external controllers
//!
//! Uses crossbeam-channel so any thread can submit actions without blocking;
//! the simulation drains everything pending at the start of each tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::game::action::Action;
use crate::game::state::PlayerKey;

/// Action submitted for one player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionMessage {
    pub player: PlayerKey,
    pub action: Action,
}

/// Bounded action queue owned by the simulation
pub struct ActionQueue {
    sender: Sender<ActionMessage>,
    receiver: Receiver<ActionMessage>,
    capacity: usize,
}

impl ActionQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            capacity: capacity.max(1),
        }
    }

    /// Clonable handle for a controller thread
    pub fn sender(&self) -> ActionSender {
        ActionSender {
            sender: self.sender.clone(),
        }
    }

    #[inline]
    pub fn try_submit(&self, player: PlayerKey, action: Action) -> Result<(), ActionQueueError> {
        submit(&self.sender, player, action)
    }

    /// Drain everything pending, in submission order
    pub fn drain(&self) -> Vec<ActionMessage> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ActionQueue {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Clonable sender handle
#[derive(Clone)]
pub struct ActionSender {
    sender: Sender<ActionMessage>,
}

impl ActionSender {
    #[inline]
    pub fn try_send(&self, player: PlayerKey, action: Action) -> Result<(), ActionQueueError> {
        submit(&self.sender, player, action)
    }
}

fn submit(sender: &Sender<ActionMessage>, player: PlayerKey, action: Action) -> Result<(), ActionQueueError> {
    sender
        .try_send(ActionMessage { player, action })
        .map_err(|e| match e {
            TrySendError::Full(_) => ActionQueueError::Full,
            TrySendError::Disconnected(_) => ActionQueueError::Disconnected,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionQueueError {
    /// Queue is full (backpressure)
    #[error("action queue is full")]
    Full,
    /// Simulation dropped the queue
    #[error("action queue is disconnected")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::action::ActionType;

    fn action(x: f32) -> Action {
        Action::new(x, 0.0, ActionType::Move)
    }

    #[test]
    fn test_submit_and_drain_in_order() {
        let queue = ActionQueue::new(10);
        let key = PlayerKey::new(0, 1);
        for x in [0.1, 0.2, 0.3] {
            queue.try_submit(key, action(x)).unwrap();
        }
        assert_eq!(queue.pending_count(), 3);
        let drained = queue.drain();
        assert_eq!(
            drained.iter().map(|m| m.action.direction_x).collect::<Vec<_>>(),
            vec![0.1, 0.2, 0.3]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_backpressure() {
        let queue = ActionQueue::new(2);
        let key = PlayerKey::new(0, 1);
        queue.try_submit(key, action(0.0)).unwrap();
        queue.try_submit(key, action(0.0)).unwrap();
        assert_eq!(queue.try_submit(key, action(0.0)), Err(ActionQueueError::Full));
        queue.drain();
        assert!(queue.try_submit(key, action(0.0)).is_ok());
    }

    #[test]
    fn test_sender_from_other_thread() {
        let queue = ActionQueue::new(100);
        let sender = queue.sender();
        let handle = std::thread::spawn(move || {
            for owner in 0..10 {
                sender.try_send(PlayerKey::new(0, owner), action(1.0)).unwrap();
            }
        });
        handle.join().unwrap();
        let drained = queue.drain();
        assert_eq!(drained.len(), 10);
        assert_eq!(drained[9].player, PlayerKey::new(0, 9));
    }

    #[test]
    fn test_disconnected_after_drop() {
        let queue = ActionQueue::new(4);
        let sender = queue.sender();
        drop(queue);
        assert_eq!(
            sender.try_send(PlayerKey::new(0, 0), action(0.0)),
            Err(ActionQueueError::Disconnected)
        );
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(ActionQueue::default().capacity(), 1024);
    }
}
