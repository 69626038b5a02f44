//! Push-update fan-out
//!
//! The engine holds a [`Broadcaster`] as a capability and fires at most
//! one update per crash tick plus one terminal event per crash. Delivery
//! is best-effort: a broadcaster must never block the tick loop, and
//! dropping messages under backpressure is acceptable. Subscription
//! plumbing (WebSocket hubs etc.) lives outside the core.

use serde::Serialize;
use tokio::sync::broadcast;

/// One-way push interface consumed by the engine.
pub trait Broadcaster: Send + Sync {
    /// Live multiplier update for an active crash game.
    fn broadcast_game_update(&self, game_id: &str, multiplier: f64);

    /// Terminal crash event, fired once per crashed game.
    fn broadcast_game_crash(&self, game_id: &str, crash_point: f64);
}

/// Default broadcaster: discards everything.
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn broadcast_game_update(&self, _game_id: &str, _multiplier: f64) {}

    fn broadcast_game_crash(&self, _game_id: &str, _crash_point: f64) {}
}

/// Event payload emitted by [`ChannelBroadcaster`].
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    GameUpdate { game_id: String, multiplier: f64 },
    GameCrash { game_id: String, crash_point: f64 },
}

/// Lossy fan-out over a tokio broadcast channel. Sends never block;
/// with no subscribers (or lagged ones) events are simply dropped.
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<GameEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.sender.subscribe()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn broadcast_game_update(&self, game_id: &str, multiplier: f64) {
        let _ = self.sender.send(GameEvent::GameUpdate {
            game_id: game_id.to_string(),
            multiplier,
        });
    }

    fn broadcast_game_crash(&self, game_id: &str, crash_point: f64) {
        let _ = self.sender.send(GameEvent::GameCrash {
            game_id: game_id.to_string(),
            crash_point,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_subscribers_is_dropped() {
        let broadcaster = ChannelBroadcaster::new(16);
        // Must not panic or block.
        broadcaster.broadcast_game_update("g1", 1.25);
        broadcaster.broadcast_game_crash("g1", 2.0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let broadcaster = ChannelBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();

        broadcaster.broadcast_game_update("g1", 1.10);
        broadcaster.broadcast_game_crash("g1", 1.10);

        assert_eq!(
            rx.recv().await.unwrap(),
            GameEvent::GameUpdate {
                game_id: "g1".to_string(),
                multiplier: 1.10
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            GameEvent::GameCrash {
                game_id: "g1".to_string(),
                crash_point: 1.10
            }
        );
    }
}
