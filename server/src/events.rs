//! Dashboard event fan-out.
//!
//! Completed games are published to a broadcast channel; websocket
//! subscribers each get their own receiver. Publishing never blocks and
//! a channel with no subscribers simply drops the event.

use tokio::sync::broadcast;

use crate::history::GameRecord;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GameRecord>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: GameRecord) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameRecord> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        bus.publish(GameRecord {
            game_id: "flip_1".to_string(),
            game: "coinflip".to_string(),
            wallet: "anonymous".to_string(),
            bet: 0.5,
            payout: 0.98,
            won: true,
            outcome: None,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        });
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.game_id, "flip_1");
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.publish(GameRecord {
            game_id: "dice_1".to_string(),
            game: "dice".to_string(),
            wallet: "anonymous".to_string(),
            bet: 0.1,
            payout: 0.0,
            won: false,
            outcome: None,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        });
    }
}
