use crate::client::{BufferOptions, DropStrategy};
use crate::types::Message;
use std::collections::VecDeque;

/// Result of [`OutboundBuffer::enqueue`]
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    /// Appended with room to spare
    Queued,
    /// Appended after evicting the head
    Evicted(Message),
    /// Buffer full under [`DropStrategy::Newest`]; the incoming message was discarded
    Rejected,
}

impl Enqueued {
    pub fn is_queued(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Bounded FIFO of messages waiting for the transport to open
#[derive(Debug)]
pub struct OutboundBuffer {
    queue: VecDeque<Message>,
    max: usize,
    strategy: DropStrategy,
}

impl OutboundBuffer {
    pub fn new(max: usize, strategy: DropStrategy) -> Self {
        Self {
            queue: VecDeque::new(),
            max,
            strategy,
        }
    }

    pub fn from_options(options: &BufferOptions) -> Self {
        Self::new(options.max, options.drop_strategy)
    }

    pub fn enqueue(&mut self, message: Message) -> Enqueued {
        let mut outcome = Enqueued::Queued;

        if self.queue.len() >= self.max {
            match self.strategy {
                DropStrategy::Oldest => {
                    if let Some(evicted) = self.queue.pop_front() {
                        outcome = Enqueued::Evicted(evicted);
                    }
                }
                DropStrategy::Newest => return Enqueued::Rejected,
            }
        }

        self.queue.push_back(message);
        outcome
    }

    /// Takes every queued message, leaving the buffer empty
    pub fn drain_all(&mut self) -> Vec<Message> {
        self.queue.drain(..).collect()
    }

    /// Puts undelivered messages back at the head, ahead of anything queued since.
    /// Overflow is resolved with the configured strategy.
    pub fn restore(&mut self, messages: Vec<Message>) {
        for message in messages.into_iter().rev() {
            self.queue.push_front(message);
        }
        while self.queue.len() > self.max {
            match self.strategy {
                DropStrategy::Oldest => self.queue.pop_front(),
                DropStrategy::Newest => self.queue.pop_back(),
            };
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.queue.iter()
    }
}
