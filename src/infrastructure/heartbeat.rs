use super::TimerSlot;
use crate::client::HeartbeatOptions;
use crate::client::driver::{Input, InputSender};
use crate::types::Message;
use std::time::Duration;
use tokio::time::{self, Instant};

/// Ping/pong timestamps and the latency derived from them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatLedger {
    pub last_ping: Option<Instant>,
    pub last_pong: Option<Instant>,
    pub latency: Option<Duration>,
}

/// Runs the ping/timeout cycle for the currently open transport.
///
/// Every timer it schedules is tagged with the transport generation it was armed for, so a
/// late tick or timeout from a torn-down transport is recognisable as stale by the driver.
#[derive(Debug)]
pub struct HeartbeatManager {
    enabled: bool,
    interval: Duration,
    timeout: Duration,
    message: Option<Message>,
    ledger: HeartbeatLedger,
    awaiting_pong: bool,
    ping_seq: u64,
    ticker: TimerSlot,
    deadline: TimerSlot,
}

impl HeartbeatManager {
    pub fn from_options(options: &HeartbeatOptions) -> Self {
        Self {
            enabled: options.enabled,
            interval: options.interval,
            timeout: options.timeout,
            message: options.message.clone(),
            ledger: HeartbeatLedger::default(),
            awaiting_pong: false,
            ping_seq: 0,
            ticker: TimerSlot::new(),
            deadline: TimerSlot::new(),
        }
    }

    pub fn ledger(&self) -> HeartbeatLedger {
        self.ledger
    }

    pub fn ping_message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Spawns the interval task for transport `generation`, replacing any previous one
    pub(crate) fn start(&mut self, generation: u64, inputs: InputSender) {
        self.stop();
        if !self.enabled {
            return;
        }

        let period = self.interval;
        self.ticker.arm(async move {
            let mut interval_timer = time::interval_at(Instant::now() + period, period);
            interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                interval_timer.tick().await;

                // Driver gone, exit heartbeat task
                let Some(tx) = inputs.upgrade() else {
                    break;
                };
                if tx.send(Input::HeartbeatTick { generation }).is_err() {
                    break;
                }
            }
        });
        tracing::debug!("Heartbeat started every {:?}", self.interval);
    }

    /// Cancels the interval and any armed timeout
    pub fn stop(&mut self) {
        self.ticker.cancel();
        self.deadline.cancel();
        self.awaiting_pong = false;
    }

    /// Records a ping and arms the timeout. Returns the ping sequence number.
    pub(crate) fn record_ping(&mut self, generation: u64, inputs: InputSender) -> u64 {
        self.ping_seq += 1;
        self.awaiting_pong = true;
        self.ledger.last_ping = Some(Instant::now());

        let ping = self.ping_seq;
        let timeout = self.timeout;
        self.deadline.arm(async move {
            time::sleep(timeout).await;
            if let Some(tx) = inputs.upgrade() {
                let _ = tx.send(Input::HeartbeatTimeout { generation, ping });
            }
        });

        ping
    }

    /// Treats an inbound message as an implicit pong when a ping is outstanding.
    /// Returns `true` if a pong was recorded.
    pub fn record_inbound(&mut self) -> bool {
        if !self.enabled || !self.awaiting_pong {
            return false;
        }

        let now = Instant::now();
        self.awaiting_pong = false;
        self.deadline.cancel();
        self.ledger.last_pong = Some(now);
        self.ledger.latency = self.ledger.last_ping.map(|ping| now.duration_since(ping));
        true
    }

    /// Whether `ping` is still the latest ping and has gone unanswered
    pub fn is_unanswered(&self, ping: u64) -> bool {
        self.awaiting_pong && ping == self.ping_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn options(interval_ms: u64, timeout_ms: u64) -> HeartbeatOptions {
        HeartbeatOptions {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_carry_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut heartbeat = HeartbeatManager::from_options(&options(1000, 200));

        let started = Instant::now();
        heartbeat.start(7, tx.downgrade());

        match rx.recv().await {
            Some(Input::HeartbeatTick { generation }) => assert_eq!(generation, 7),
            _ => panic!("expected heartbeat tick"),
        }
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_without_pong() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut heartbeat = HeartbeatManager::from_options(&options(1000, 200));

        let ping = heartbeat.record_ping(3, tx.downgrade());

        match rx.recv().await {
            Some(Input::HeartbeatTimeout { generation, ping: fired }) => {
                assert_eq!(generation, 3);
                assert_eq!(fired, ping);
            }
            _ => panic!("expected heartbeat timeout"),
        }
        assert!(heartbeat.is_unanswered(ping));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_message_counts_as_pong() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut heartbeat = HeartbeatManager::from_options(&options(1000, 200));

        assert!(!heartbeat.record_inbound(), "no ping outstanding yet");

        let ping = heartbeat.record_ping(1, tx.downgrade());
        time::advance(Duration::from_millis(50)).await;
        assert!(heartbeat.record_inbound());
        assert!(!heartbeat.record_inbound(), "pong already recorded");

        let ledger = heartbeat.ledger();
        assert_eq!(ledger.latency, Some(Duration::from_millis(50)));
        assert!(ledger.last_pong > ledger.last_ping);
        assert!(!heartbeat.is_unanswered(ping));

        time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err(), "timeout cancelled by pong");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut heartbeat = HeartbeatManager::from_options(&options(100, 50));

        heartbeat.start(1, tx.downgrade());
        heartbeat.record_ping(1, tx.downgrade());
        heartbeat.stop();

        time::sleep(Duration::from_millis(1000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_heartbeat_never_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut heartbeat = HeartbeatManager::from_options(&HeartbeatOptions {
            enabled: false,
            ..options(100, 50)
        });

        heartbeat.start(1, tx.downgrade());
        time::sleep(Duration::from_millis(1000)).await;

        assert!(rx.try_recv().is_err());
        assert!(!heartbeat.record_inbound());
    }
}
