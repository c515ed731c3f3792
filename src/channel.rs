//! Lock-free configuration channel.
//!
//! A single-producer, single-consumer ring buffer of [`Command`]s. The
//! [`ConfigSender`] lives with whatever delivers control messages; the
//! [`ConfigReceiver`] is drained by the acquisition task. Neither half is
//! `Clone`, so there is exactly one writer and one reader.
//!
//! # Overflow
//!
//! The capacity is fixed. When the ring is full the command being written is
//! dropped (drop-newest): [`ConfigSender::write_non_realtime`] hands it back
//! as `Err`, a warning is logged and [`ConfigSender::dropped`] goes up by one.
//! Commands already queued are never overwritten.

use rtrb::{Consumer, Producer, RingBuffer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::command::{decode, Command};

/// Create a connected sender/receiver pair holding up to `capacity` commands.
pub fn config_channel(capacity: usize) -> (ConfigSender, ConfigReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (
        ConfigSender { producer, dropped: 0 },
        ConfigReceiver { consumer },
    )
}

/// Outcome of [`ConfigSender::submit`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Submitted {
    pub queued: usize,
    pub dropped: usize,
}

/// Writing half. Used only from non-real-time threads.
pub struct ConfigSender {
    producer: Producer<Command>,
    dropped: u64,
}

impl ConfigSender {
    /// Queue a command for the acquisition task.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the command was queued
    /// - `Err(cmd)` if the channel is full and the command was dropped
    pub fn write_non_realtime(&mut self, cmd: Command) -> Result<(), Command> {
        match self.producer.push(cmd) {
            Ok(()) => Ok(()),
            Err(rtrb::PushError::Full(cmd)) => {
                self.dropped += 1;
                warn!(kind = ?cmd.kind, value = cmd.value, dropped = self.dropped, "config channel full, dropping command");
                Err(cmd)
            }
        }
    }

    /// Decode a control message and queue every command it carries.
    pub fn submit(&mut self, fields: &Map<String, Value>) -> Submitted {
        let mut submitted = Submitted::default();
        for cmd in decode(fields) {
            debug!(kind = ?cmd.kind, value = cmd.value, "queueing command");
            match self.write_non_realtime(cmd) {
                Ok(()) => submitted.queued += 1,
                Err(_) => submitted.dropped += 1,
            }
        }
        submitted
    }

    /// Free slots left in the channel
    #[inline]
    pub fn available(&self) -> usize {
        self.producer.slots()
    }

    /// Commands dropped because the channel was full
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// `true` once the receiver has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Reading half. Safe to use from real-time threads: it never blocks or
/// allocates.
pub struct ConfigReceiver {
    consumer: Consumer<Command>,
}

impl ConfigReceiver {
    /// Pop the oldest queued command, if any.
    #[inline]
    pub fn try_read_realtime(&mut self) -> Option<Command> {
        self.consumer.pop().ok()
    }

    /// Iterate over everything queued right now, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Command> + '_ {
        let consumer = &mut self.consumer;
        core::iter::from_fn(move || consumer.pop().ok())
    }

    /// Number of queued commands
    #[inline]
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_fifo_order() {
        let (mut tx, mut rx) = config_channel(8);
        let sent = [Command::prescaler(2.0), Command::baseline(), Command::num_bits(12.0)];
        for cmd in sent {
            tx.write_non_realtime(cmd).unwrap();
        }
        let received: Vec<_> = rx.drain().collect();
        assert_eq!(received, sent);
    }

    #[test]
    fn empty_channel_reads_none() {
        let (_tx, mut rx) = config_channel(4);
        assert_eq!(rx.try_read_realtime(), None);
        assert_eq!(rx.drain().count(), 0);
    }

    #[test]
    fn overflow_drops_newest() {
        let (mut tx, mut rx) = config_channel(2);
        tx.write_non_realtime(Command::prescaler(1.0)).unwrap();
        tx.write_non_realtime(Command::prescaler(2.0)).unwrap();
        let rejected = tx.write_non_realtime(Command::prescaler(3.0));

        assert_eq!(rejected, Err(Command::prescaler(3.0)));
        assert_eq!(tx.dropped(), 1);
        let values: Vec<_> = rx.drain().map(|c| c.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn submit_counts_queued_and_dropped() {
        let (mut tx, rx) = config_channel(1);
        let msg = match serde_json::json!({ "prescaler": 4, "numBits": 10 }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let submitted = tx.submit(&msg);
        assert_eq!(submitted, Submitted { queued: 1, dropped: 1 });
        assert_eq!(rx.pending(), 1);
        assert_eq!(tx.dropped(), 1);
    }

    #[test]
    fn sender_notices_dropped_receiver() {
        let (tx, rx) = config_channel(4);
        assert!(!tx.is_abandoned());
        drop(rx);
        assert!(tx.is_abandoned());
    }

    #[test]
    fn reader_on_another_thread_sees_every_command_in_order() {
        let (mut tx, mut rx) = config_channel(16);
        let reader = std::thread::spawn(move || {
            let mut seen = Vec::new();
            while seen.len() < 100 {
                match rx.try_read_realtime() {
                    Some(cmd) => seen.push(cmd.value as u32),
                    None => std::thread::yield_now(),
                }
            }
            seen
        });
        for i in 0..100 {
            let mut cmd = Command::noise_threshold(i as f32);
            while let Err(back) = tx.write_non_realtime(cmd) {
                cmd = back;
                std::thread::yield_now();
            }
        }
        let seen = reader.join().unwrap();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
