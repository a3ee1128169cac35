use super::SmartSocket;
use super::driver::Driver;
use super::state::SocketSnapshot;
use crate::messaging::EventNotifier;
use crate::transport::TransportFactory;
use crate::types::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_JITTER, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY,
    HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT, MAX_BUFFER_SIZE, Message, Result, SocketError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use url::Url;

/// Reconnection policy
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectOptions {
    /// Maximum reconnect attempts between successful opens; `None` retries forever
    pub retries: Option<u32>,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Exponential growth factor, at least 1
    pub factor: f64,
    /// Symmetric jitter fraction in `[0, 1]`
    pub jitter: f64,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            retries: None,
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            factor: DEFAULT_BACKOFF_FACTOR,
            jitter: DEFAULT_JITTER,
        }
    }
}

/// Heartbeat policy
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatOptions {
    pub interval: Duration,
    /// How long a ping may go unanswered before the transport is force-closed
    pub timeout: Duration,
    /// Payload sent with every ping; `None` only records the ping locally
    pub message: Option<Message>,
    pub enabled: bool,
}

impl Default for HeartbeatOptions {
    fn default() -> Self {
        Self {
            interval: HEARTBEAT_INTERVAL,
            timeout: HEARTBEAT_TIMEOUT,
            message: None,
            enabled: true,
        }
    }
}

/// Which message to discard when the outbound buffer is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropStrategy {
    /// Evict the head of the queue to make room
    #[default]
    Oldest,
    /// Discard the incoming message
    Newest,
}

/// Outbound buffering policy
#[derive(Debug, Clone, PartialEq)]
pub struct BufferOptions {
    pub enabled: bool,
    pub max: usize,
    pub drop_strategy: DropStrategy,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max: MAX_BUFFER_SIZE,
            drop_strategy: DropStrategy::Oldest,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmartSocketOptions {
    pub reconnect: ReconnectOptions,
    pub heartbeat: HeartbeatOptions,
    pub buffer: BufferOptions,
    /// Encode outbound and decode inbound text frames as JSON
    pub json: bool,
}

impl SmartSocketOptions {
    pub fn validate(&self) -> Result<()> {
        let reconnect = &self.reconnect;
        if reconnect.min_delay > reconnect.max_delay {
            return Err(SocketError::Config(format!(
                "reconnect min_delay {:?} exceeds max_delay {:?}",
                reconnect.min_delay, reconnect.max_delay
            )));
        }
        if !reconnect.factor.is_finite() || reconnect.factor < 1.0 {
            return Err(SocketError::Config(format!(
                "reconnect factor must be a finite number >= 1, got {}",
                reconnect.factor
            )));
        }
        if !(0.0..=1.0).contains(&reconnect.jitter) {
            return Err(SocketError::Config(format!(
                "reconnect jitter must be within [0, 1], got {}",
                reconnect.jitter
            )));
        }

        let heartbeat = &self.heartbeat;
        if heartbeat.enabled && (heartbeat.interval.is_zero() || heartbeat.timeout.is_zero()) {
            return Err(SocketError::Config(
                "heartbeat interval and timeout must be non-zero".to_string(),
            ));
        }

        if self.buffer.enabled && self.buffer.max == 0 {
            return Err(SocketError::Config(
                "buffer max must be at least 1 when buffering is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for SmartSocket that handles validation and driver startup
pub struct SmartSocketBuilder {
    url: Url,
    options: SmartSocketOptions,
    factory: Arc<dyn TransportFactory>,
}

impl SmartSocketBuilder {
    /// Create a new builder, validating the endpoint and options
    pub fn new(
        url: impl AsRef<str>,
        options: SmartSocketOptions,
        factory: impl TransportFactory + 'static,
    ) -> Result<Self> {
        let url = Url::parse(url.as_ref())?;
        options.validate()?;

        Ok(Self {
            url,
            options,
            factory: Arc::new(factory),
        })
    }

    /// Starts the first connection attempt and spawns the driver task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<SmartSocket> {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SocketSnapshot::default());
        let notifier = EventNotifier::new();

        let mut driver = Driver::new(
            self.url.clone(),
            &self.options,
            self.factory,
            notifier.clone(),
            snapshot_tx,
            input_tx.downgrade(),
        );

        // First attempt runs before the driver task exists so factory failures surface here
        driver.connect()?;
        tokio::spawn(driver.run(input_rx));

        Ok(SmartSocket {
            url: self.url,
            inputs: input_tx,
            notifier,
            snapshot: snapshot_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SmartSocketOptions::default();

        assert_eq!(options.reconnect.retries, None);
        assert_eq!(options.reconnect.min_delay, Duration::from_millis(500));
        assert_eq!(options.reconnect.max_delay, Duration::from_millis(20_000));
        assert_eq!(options.reconnect.factor, 2.0);
        assert_eq!(options.reconnect.jitter, 0.2);
        assert_eq!(options.heartbeat.interval, Duration::from_millis(25_000));
        assert_eq!(options.heartbeat.timeout, Duration::from_millis(5_000));
        assert!(options.heartbeat.enabled);
        assert!(options.heartbeat.message.is_none());
        assert!(options.buffer.enabled);
        assert_eq!(options.buffer.max, 200);
        assert_eq!(options.buffer.drop_strategy, DropStrategy::Oldest);
        assert!(!options.json);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_jitter() {
        let options = SmartSocketOptions {
            reconnect: ReconnectOptions {
                jitter: 1.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(SocketError::Config(_))));
    }

    #[test]
    fn test_rejects_inverted_delays_and_shrinking_factor() {
        let inverted = SmartSocketOptions {
            reconnect: ReconnectOptions {
                min_delay: Duration::from_secs(10),
                max_delay: Duration::from_secs(1),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let shrinking = SmartSocketOptions {
            reconnect: ReconnectOptions {
                factor: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(shrinking.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_only_rejected_when_buffering() {
        let mut options = SmartSocketOptions {
            buffer: BufferOptions {
                max: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(options.validate().is_err());

        options.buffer.enabled = false;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_heartbeat_interval_only_rejected_when_enabled() {
        let mut options = SmartSocketOptions {
            heartbeat: HeartbeatOptions {
                interval: Duration::ZERO,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(options.validate().is_err());

        options.heartbeat.enabled = false;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_drop_strategy_serde_names() {
        assert_eq!(
            serde_json::to_string(&DropStrategy::Newest).unwrap(),
            r#""newest""#
        );
        let parsed: DropStrategy = serde_json::from_str(r#""oldest""#).unwrap();
        assert_eq!(parsed, DropStrategy::Oldest);
    }
}
