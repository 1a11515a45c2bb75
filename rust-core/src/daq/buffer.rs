//! Lock-free sample buffer between a capture callback and a task
//!
//! The producer lives in the audio callback thread, the consumer in the
//! acquisition worker.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

/// Ring buffer of voltage samples
pub struct SampleRingBuffer {
    producer: HeapProducer<f64>,
    consumer: HeapConsumer<f64>,
}

impl SampleRingBuffer {
    /// Create a buffer holding up to `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::<f64>::new(capacity);
        let (producer, consumer) = rb.split();

        Self { producer, consumer }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (SampleProducer, SampleConsumer) {
        (
            SampleProducer {
                producer: self.producer,
            },
            SampleConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Writing end, owned by the capture callback
pub struct SampleProducer {
    producer: HeapProducer<f64>,
}

impl SampleProducer {
    /// Push one channel of an interleaved block
    ///
    /// # Returns
    /// Number of samples written; short when the buffer is full
    pub fn write_channel(&mut self, interleaved: &[f32], channels: usize, channel: usize) -> usize {
        if channels == 0 || channel >= channels {
            return 0;
        }
        let mut written = 0;
        for frame in interleaved.chunks_exact(channels) {
            if self.producer.push(f64::from(frame[channel])).is_err() {
                break;
            }
            written += 1;
        }
        written
    }
}

/// Reading end, owned by the task
pub struct SampleConsumer {
    consumer: HeapConsumer<f64>,
}

impl SampleConsumer {
    /// Pop up to `buffer.len()` samples
    pub fn read(&mut self, buffer: &mut [f64]) -> usize {
        self.consumer.pop_slice(buffer)
    }

    /// Drop everything captured so far
    pub fn clear(&mut self) -> usize {
        self.consumer.clear()
    }

    /// Samples waiting to be read
    pub fn available(&self) -> usize {
        self.consumer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_channel_of_stereo() {
        let (mut producer, mut consumer) = SampleRingBuffer::new(16).split();

        let written = producer.write_channel(&[0.1, -1.0, 0.2, -1.0, 0.3, -1.0], 2, 0);
        assert_eq!(written, 3);
        assert_eq!(consumer.available(), 3);

        let mut output = vec![0.0; 3];
        assert_eq!(consumer.read(&mut output), 3);
        assert!((output[0] - 0.1).abs() < 1e-6);
        assert!((output[2] - 0.3).abs() < 1e-6);
        assert_eq!(consumer.available(), 0);
    }

    #[test]
    fn test_overflow_stops_at_capacity() {
        let (mut producer, mut consumer) = SampleRingBuffer::new(4).split();

        assert_eq!(producer.write_channel(&[1.0; 10], 1, 0), 4);
        assert_eq!(producer.write_channel(&[2.0], 1, 0), 0);
        assert_eq!(consumer.available(), 4);

        assert_eq!(consumer.clear(), 4);
        assert_eq!(consumer.available(), 0);
        assert_eq!(producer.write_channel(&[2.0], 1, 0), 1);
    }

    #[test]
    fn test_bad_channel_index() {
        let (mut producer, consumer) = SampleRingBuffer::new(4).split();
        assert_eq!(producer.write_channel(&[1.0, 2.0], 2, 2), 0);
        assert_eq!(producer.write_channel(&[1.0, 2.0], 0, 0), 0);
        assert_eq!(consumer.available(), 0);
    }
}
