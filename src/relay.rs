//! Demonstration relay: a periodic producer thread filling sample blocks and a
//! polling consumer thread reading the latest one.
//!
//! Each side runs on a dedicated OS thread with a plain sleep-based cadence, no
//! async runtime. Both loops stop when the cancellation token fires or when the
//! other half is dropped. The loops are generic over [`FrameSink`] /
//! [`FrameSource`], so the same code drives the lock-free triple buffer and the
//! blocking double buffer.

use std::sync::Arc;
use std::sync::atomic::Ordering::Relaxed;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

use crate::config::{Mode, RelaySettings};
use crate::error::{Error, Result};
use crate::locked::{LockedReader, LockedWriter, locked_double_buffer};
use crate::stats::{RelayStats, saturating_micros};
use crate::triple::{Consumer, Producer, triple_buffer};
use crate::types::SampleBlock;

/// Producer side of a buffer, as seen by the relay.
pub trait FrameSink<T> {
    /// Fill the producer's slot in place and publish it. Returns `true` if an
    /// unclaimed payload was discarded.
    fn publish_with(&mut self, fill: impl FnOnce(&mut T)) -> bool;

    fn is_abandoned(&self) -> bool;
}

/// Consumer side of a buffer, as seen by the relay.
pub trait FrameSource<T> {
    /// Fetch the latest payload and hand it to `observe` together with whether
    /// it is newly claimed and its version.
    fn poll<R>(&mut self, observe: impl FnOnce(bool, u64, &T) -> R) -> R;

    fn is_abandoned(&self) -> bool;
}

impl<T> FrameSink<T> for Producer<T> {
    #[inline]
    fn publish_with(&mut self, fill: impl FnOnce(&mut T)) -> bool {
        fill(self.write());
        self.commit()
    }

    fn is_abandoned(&self) -> bool {
        Producer::is_abandoned(self)
    }
}

impl<T> FrameSource<T> for Consumer<T> {
    #[inline]
    fn poll<R>(&mut self, observe: impl FnOnce(bool, u64, &T) -> R) -> R {
        let claimed = self.update();
        observe(claimed, self.version(), self.current())
    }

    fn is_abandoned(&self) -> bool {
        Consumer::is_abandoned(self)
    }
}

impl<T> FrameSink<T> for LockedWriter<T> {
    fn publish_with(&mut self, fill: impl FnOnce(&mut T)) -> bool {
        fill(&mut *self.write());
        self.commit()
    }

    fn is_abandoned(&self) -> bool {
        LockedWriter::is_abandoned(self)
    }
}

impl<T> FrameSource<T> for LockedReader<T> {
    fn poll<R>(&mut self, observe: impl FnOnce(bool, u64, &T) -> R) -> R {
        let before = self.version();
        let (version, guard) = self.read_versioned();
        observe(version != before, version, &*guard)
    }

    fn is_abandoned(&self) -> bool {
        LockedReader::is_abandoned(self)
    }
}

/// Produce one block per period until cancelled or the consumer goes away.
pub fn run_producer(
    mut sink: impl FrameSink<SampleBlock>,
    settings: RelaySettings,
    stats: &RelayStats,
    cancel: &CancellationToken,
) {
    info!(
        period_us = saturating_micros(settings.producer_period),
        block_size = settings.block_size,
        "producer started"
    );

    let len = settings.block_size;
    let mut deadline = Instant::now();
    let mut frame_id = 0u64;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        if sink.is_abandoned() {
            info!("consumer dropped, producer exiting");
            break;
        }

        let overwrote = sink.publish_with(|block| block.fill(frame_id, len));
        stats.record_commit(overwrote);
        trace!(frame_id, overwrote, "committed");
        frame_id += 1;

        // Fixed cadence: schedule from the previous deadline, not from now.
        deadline += settings.producer_period;
        if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    info!(commits = frame_id, "producer stopped");
}

/// Poll once per period until cancelled or the producer goes away.
pub fn run_consumer(
    mut source: impl FrameSource<SampleBlock>,
    settings: RelaySettings,
    stats: &RelayStats,
    cancel: &CancellationToken,
) {
    info!(
        period_us = saturating_micros(settings.consumer_period),
        "consumer started"
    );

    let mut last_version = 0u64;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        if source.is_abandoned() {
            info!("producer dropped, consumer exiting");
            break;
        }

        source.poll(|claimed, version, block| {
            let gap = version.saturating_sub(last_version);
            stats.record_read(claimed, gap);
            if claimed {
                if let Some(at) = block.produced_at {
                    stats.age.record(at.elapsed());
                }
                trace!(version, frame_id = ?block.frame_id, "claimed");
                last_version = version;
            }
            if !block.is_consistent() {
                stats.torn.fetch_add(1, Relaxed);
                error!(version, frame_id = ?block.frame_id, "torn block observed");
            }
        });

        thread::sleep(settings.consumer_period);
    }

    info!(last_version, "consumer stopped");
}

/// Join handles for the two relay threads.
#[derive(Debug)]
pub struct RelayHandles {
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl RelayHandles {
    /// Wait for both threads. Call after cancelling.
    ///
    /// # Errors
    ///
    /// [`Error::ThreadPanicked`] naming the first thread that panicked.
    pub fn join(self) -> Result<()> {
        let producer = self.producer.join();
        let consumer = self.consumer.join();
        producer.map_err(|_| Error::ThreadPanicked("producer"))?;
        consumer.map_err(|_| Error::ThreadPanicked("consumer"))?;
        Ok(())
    }
}

/// Build the buffer selected by `settings.mode` and start both threads.
///
/// Every slot starts as a silent block, which is what the consumer sees until
/// the first commit is claimed.
///
/// # Errors
///
/// [`Error::Spawn`] if either thread cannot be started. The producer is
/// stopped and joined before returning when only the consumer failed.
pub fn spawn(
    settings: RelaySettings,
    stats: &Arc<RelayStats>,
    cancel: &CancellationToken,
) -> Result<RelayHandles> {
    let initial = SampleBlock::silence(settings.block_size);
    match settings.mode {
        Mode::Triple => {
            let (producer, consumer) = triple_buffer(initial);
            spawn_pair(producer, consumer, settings, stats, cancel)
        }
        Mode::Locked => {
            let (writer, reader) = locked_double_buffer(initial);
            spawn_pair(writer, reader, settings, stats, cancel)
        }
    }
}

fn spawn_pair<P, C>(
    sink: P,
    source: C,
    settings: RelaySettings,
    stats: &Arc<RelayStats>,
    cancel: &CancellationToken,
) -> Result<RelayHandles>
where
    P: FrameSink<SampleBlock> + Send + 'static,
    C: FrameSource<SampleBlock> + Send + 'static,
{
    let producer = thread::Builder::new()
        .name("relay-producer".into())
        .spawn({
            let stats = stats.clone();
            let cancel = cancel.clone();
            move || run_producer(sink, settings, &stats, &cancel)
        })?;

    let consumer = thread::Builder::new()
        .name("relay-consumer".into())
        .spawn({
            let stats = stats.clone();
            let cancel = cancel.clone();
            move || run_consumer(source, settings, &stats, &cancel)
        });

    match consumer {
        Ok(consumer) => Ok(RelayHandles { producer, consumer }),
        Err(e) => {
            // The source was dropped with the failed closure, so the producer
            // will notice on its next cycle; cancel to make it immediate.
            cancel.cancel();
            let _ = producer.join();
            Err(Error::Spawn(e))
        }
    }
}
