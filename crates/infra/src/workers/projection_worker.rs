use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use streakproj_core::SubjectId;
use streakproj_events::{EventBus, Subscription, SubjectScoped};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Which subjects a worker is responsible for.
///
/// Partitioning gives each subject exactly one worker, so one subject is never folded
/// by two workers at once while different subjects proceed in parallel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubjectFilter {
    All,
    Only(SubjectId),
    Partition { index: usize, count: usize },
}

impl SubjectFilter {
    pub fn accepts(&self, subject_id: SubjectId) -> bool {
        match *self {
            SubjectFilter::All => true,
            SubjectFilter::Only(id) => id == subject_id,
            SubjectFilter::Partition { index, count } => partition_of(subject_id, count) == index,
        }
    }
}

/// Stable partition index of a subject among `count` partitions.
pub fn partition_of(subject_id: SubjectId, count: usize) -> usize {
    let count = count.max(1) as u128;
    (subject_id.as_uuid().as_u128() % count) as usize
}

/// Generic projection worker loop.
///
/// - Subscribes to an event bus
/// - Applies an idempotent handler for each accepted message
/// - Supports graceful shutdown
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Spawn a worker thread that processes events from the bus subscription.
    ///
    /// `handler` must be idempotent (at-least-once delivery). Its errors are logged and
    /// the message is dropped; the event log still holds it for a later catch-up.
    pub fn spawn<M, B, H, E>(
        name: impl Into<String>,
        bus: &B,
        filter: SubjectFilter,
        mut handler: H,
    ) -> io::Result<WorkerHandle>
    where
        M: SubjectScoped + Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let name = name.into();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let thread_name = name.clone();
        let join = thread::Builder::new()
            .name(thread_name)
            .spawn(move || worker_loop(&name, sub, shutdown_rx, filter, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }

    /// Spawn `partitions` workers that split subjects between them.
    ///
    /// `make_handler` is called once per partition.
    pub fn spawn_partitioned<M, B, H, E>(
        name: &str,
        bus: &B,
        partitions: usize,
        mut make_handler: impl FnMut(usize) -> H,
    ) -> io::Result<Vec<WorkerHandle>>
    where
        M: SubjectScoped + Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let count = partitions.max(1);
        (0..count)
            .map(|index| {
                Self::spawn(
                    format!("{name}-{index}"),
                    bus,
                    SubjectFilter::Partition { index, count },
                    make_handler(index),
                )
            })
            .collect()
    }
}

fn worker_loop<M, H, E>(
    name: &str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    filter: SubjectFilter,
    handler: &mut H,
) where
    M: SubjectScoped,
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);
    info!(worker = name, ?filter, "projection worker started");

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                let subject_id = msg.subject_id();
                if !filter.accepts(subject_id) {
                    continue;
                }

                if let Err(err) = handler(msg) {
                    warn!(worker = name, subject_id = %subject_id, error = ?err, "projection worker handler failed");
                } else {
                    debug!(worker = name, subject_id = %subject_id, "message projected");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(worker = name, "projection worker stopped");
}
