use rtrb::{Consumer, Producer, RingBuffer};
use tracing::warn;

/// Byte ring buffer between the hardware callback and the capture loop,
/// using rtrb (real-time safe).
pub struct ByteRingBuffer {
    producer: Producer<u8>,
    consumer: Consumer<u8>,
}

impl ByteRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    /// Split into producer and consumer for separate threads.
    pub fn split(self) -> (ByteProducer, ByteConsumer) {
        (
            ByteProducer {
                producer: self.producer,
            },
            ByteConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer half, owned by the audio callback. Never blocks.
pub struct ByteProducer {
    producer: Producer<u8>,
}

impl ByteProducer {
    /// Write serialized samples; on overflow the whole write is dropped.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, ()> {
        let mut chunk = match self.producer.write_chunk(bytes.len()) {
            Ok(chunk) => chunk,
            Err(_) => {
                warn!(
                    "Ring buffer overflow: tried to write {} bytes, buffer full",
                    bytes.len()
                );
                return Err(());
            }
        };

        // Write may wrap; fill both slices.
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        if split > 0 {
            first.copy_from_slice(&bytes[..split]);
        }
        if !second.is_empty() {
            second.copy_from_slice(&bytes[split..]);
        }
        chunk.commit_all();
        Ok(bytes.len())
    }
}

/// Consumer half, owned by the capture loop. Non-blocking reads.
pub struct ByteConsumer {
    consumer: Consumer<u8>,
}

impl ByteConsumer {
    /// Read up to `buffer.len()` bytes, returning how many were read.
    pub fn read(&mut self, buffer: &mut [u8]) -> usize {
        let chunk = match self.consumer.read_chunk(buffer.len()) {
            Ok(chunk) => chunk,
            Err(rtrb::chunks::ChunkError::TooFewSlots(available)) => {
                if available == 0 {
                    return 0;
                }
                match self.consumer.read_chunk(available) {
                    Ok(chunk) => chunk,
                    Err(_) => return 0,
                }
            }
        };

        let len = chunk.len();
        let (first, second) = chunk.as_slices();
        let split = first.len();
        if split > 0 {
            buffer[..split].copy_from_slice(first);
        }
        if !second.is_empty() {
            buffer[split..split + second.len()].copy_from_slice(second);
        }
        chunk.commit_all();
        len
    }

    /// Bytes currently available to read.
    pub fn slots(&self) -> usize {
        self.consumer.slots()
    }
}
