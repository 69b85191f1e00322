//! Interrupt-side entry points.
//!
//! USB host callbacks run asynchronously to the main loop. They never touch
//! the frame buffer directly: bytes go through a single-producer /
//! single-consumer queue that the engine drains at the start of every tick,
//! and presence changes go through the [`AlertChannel`].

use crate::alert::{AlertChannel, AlertKind};
use crate::error::RelayError;
use crate::hal::CdcPort;
use heapless::spsc::{Consumer, Producer, Queue};

/// Size of one CDC receive transfer.
pub const CDC_TRANSFER_SIZE: usize = 64;

/// Queue slots between interrupt context and the main loop. `heapless`
/// queues hold one element less than this.
pub const DEFAULT_INGRESS_DEPTH: usize = 256;

pub type IngressQueue<const Q: usize = DEFAULT_INGRESS_DEPTH> = Queue<u8, Q>;
pub type IngressConsumer<'a, const Q: usize = DEFAULT_INGRESS_DEPTH> = Consumer<'a, u8, Q>;

/// Split a queue into the interrupt-side handle and the main-loop consumer.
pub fn split<'a, const Q: usize>(
    queue: &'a mut IngressQueue<Q>,
    alerts: &'a AlertChannel,
) -> (RelayIsr<'a, Q>, IngressConsumer<'a, Q>) {
    let (producer, consumer) = queue.split();
    (RelayIsr::new(producer, alerts), consumer)
}

/// Handle owned by the USB callback layer.
pub struct RelayIsr<'a, const Q: usize = DEFAULT_INGRESS_DEPTH> {
    producer: Producer<'a, u8, Q>,
    alerts: &'a AlertChannel,
    dropped: u32,
}

impl<'a, const Q: usize> RelayIsr<'a, Q> {
    pub fn new(producer: Producer<'a, u8, Q>, alerts: &'a AlertChannel) -> Self {
        Self {
            producer,
            alerts,
            dropped: 0,
        }
    }

    pub fn on_byte_received(&mut self, byte: u8) -> Result<(), RelayError> {
        self.producer.enqueue(byte).map_err(|_| {
            self.dropped = self.dropped.saturating_add(1);
            RelayError::IngressFull
        })
    }

    /// A receive transfer finished. The transfer buffer is zeroed between
    /// transfers, so content stops at the first NUL. Reception is re-armed
    /// before returning. Returns the number of bytes queued.
    pub fn on_transfer_complete<P: CdcPort>(&mut self, chunk: &[u8], port: &mut P) -> usize {
        if chunk.len() > CDC_TRANSFER_SIZE {
            let excess = chunk.len() - CDC_TRANSFER_SIZE;
            self.dropped = self.dropped.saturating_add(excess as u32);
            tracing::warn!(excess, "oversized CDC transfer truncated");
        }
        let chunk = &chunk[..chunk.len().min(CDC_TRANSFER_SIZE)];
        let data = match chunk.iter().position(|&b| b == 0) {
            Some(end) => &chunk[..end],
            None => chunk,
        };

        let mut queued = 0;
        for &byte in data {
            if self.on_byte_received(byte).is_ok() {
                queued += 1;
            }
        }

        if queued < data.len() {
            tracing::warn!(dropped_total = self.dropped, "ingress queue full, scanner bytes dropped");
        }

        port.schedule_receive();
        queued
    }

    pub fn on_device_attached<P: CdcPort>(&mut self, port: &mut P) {
        self.alerts.raise(AlertKind::Connected);
        port.schedule_receive();
    }

    pub fn on_device_detached(&mut self) {
        self.alerts.raise(AlertKind::Disconnected);
    }

    pub fn dropped_bytes(&self) -> u32 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingPort {
        armed: u32,
    }

    impl CdcPort for CountingPort {
        fn schedule_receive(&mut self) {
            self.armed += 1;
        }
    }

    #[test]
    fn test_transfer_stops_at_nul_padding() {
        let mut queue: IngressQueue<16> = Queue::new();
        let alerts = AlertChannel::new();
        let (producer, mut consumer) = queue.split();
        let mut isr = RelayIsr::new(producer, &alerts);
        let mut port = CountingPort::default();

        let mut transfer = [0u8; CDC_TRANSFER_SIZE];
        transfer[..4].copy_from_slice(b"AB\rC");

        assert_eq!(isr.on_transfer_complete(&transfer, &mut port), 4);
        assert_eq!(port.armed, 1);

        let mut drained = heapless::Vec::<u8, 16>::new();
        while let Some(b) = consumer.dequeue() {
            drained.push(b).unwrap();
        }
        assert_eq!(&drained[..], b"AB\rC");
    }

    #[test]
    fn test_oversized_transfer_counts_tail_as_dropped() {
        let mut queue: IngressQueue<128> = Queue::new();
        let alerts = AlertChannel::new();
        let (producer, mut consumer) = queue.split();
        let mut isr = RelayIsr::new(producer, &alerts);
        let mut port = CountingPort::default();

        let transfer = [b'7'; CDC_TRANSFER_SIZE + 6];
        assert_eq!(isr.on_transfer_complete(&transfer, &mut port), CDC_TRANSFER_SIZE);
        assert_eq!(isr.dropped_bytes(), 6);
        assert_eq!(port.armed, 1);

        let mut drained = 0;
        while consumer.dequeue().is_some() {
            drained += 1;
        }
        assert_eq!(drained, CDC_TRANSFER_SIZE);
    }

    #[test]
    fn test_full_queue_counts_drops() {
        // Capacity is one less than the const parameter
        let mut queue: IngressQueue<4> = Queue::new();
        let alerts = AlertChannel::new();
        let (producer, _consumer) = queue.split();
        let mut isr = RelayIsr::new(producer, &alerts);

        for b in b"abc" {
            assert!(isr.on_byte_received(*b).is_ok());
        }
        assert_eq!(isr.on_byte_received(b'd'), Err(RelayError::IngressFull));
        assert_eq!(isr.dropped_bytes(), 1);
    }

    #[test]
    fn test_presence_callbacks_raise_alerts() {
        let mut queue: IngressQueue<4> = Queue::new();
        let alerts = AlertChannel::new();
        let (producer, _consumer) = queue.split();
        let mut isr = RelayIsr::new(producer, &alerts);
        let mut port = CountingPort::default();

        isr.on_device_attached(&mut port);
        assert_eq!(port.armed, 1);
        assert_eq!(alerts.take(), Some(AlertKind::Connected));
        assert!(!alerts.reset_requested());

        isr.on_device_detached();
        assert_eq!(alerts.take(), Some(AlertKind::Disconnected));
        assert!(alerts.reset_requested());
    }
}
