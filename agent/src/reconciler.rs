use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex, PoisonError,
    },
    time::Duration,
};

use iota_common::{
    apply_delta, ChangeSet, DeltaRequest, DeviceModel, DeviceState, PhysicalPort, SensorPoller,
    UpdateDocument,
};
use tokio::{
    sync::{watch, Mutex},
    task::JoinSet,
};
use tracing::{debug, info, warn};

use crate::channel::{bounded, ShadowChannel, ShadowError};

/// Routes deltas to the device and device changes to the shadow.
///
/// The device model sits behind one async mutex shared by every delta task
/// and the poll loop. The lock is never held across a shadow call.
pub struct Reconciler<P, S> {
    device: Arc<Mutex<DeviceModel<P>>>,
    channel: Arc<S>,
    timeout: Duration,
    stop_tx: watch::Sender<bool>,
    tasks: StdMutex<JoinSet<()>>,
    resync_sensors: AtomicBool,
}

impl<P, S> Reconciler<P, S>
where
    P: PhysicalPort + 'static,
    S: ShadowChannel,
{
    pub fn new(device: DeviceModel<P>, channel: Arc<S>, timeout: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            device: Arc::new(Mutex::new(device)),
            channel,
            timeout,
            stop_tx,
            tasks: StdMutex::new(JoinSet::new()),
            resync_sensors: AtomicBool::new(false),
        }
    }

    pub fn channel(&self) -> &Arc<S> {
        &self.channel
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn snapshot(&self) -> DeviceState {
        *self.device.lock().await.state()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Hands one delta notification to its own task. Returns `false` when the
    /// reconciler is stopping and the notification was ignored.
    pub fn dispatch_delta(&self, payload: Vec<u8>) -> bool {
        if self.is_stopped() {
            debug!("ignoring delta notification after stop ({} bytes)", payload.len());
            return false;
        }

        let device = Arc::clone(&self.device);
        let channel = Arc::clone(&self.channel);
        let timeout = self.timeout;
        self.spawn(async move {
            let delta = match DeltaRequest::from_notification(&payload) {
                Ok(delta) => delta,
                Err(err) => {
                    warn!("dropping malformed delta notification: {err}");
                    return;
                }
            };
            let applied = apply_and_log(&device, &delta).await;
            submit_report(channel.as_ref(), timeout, applied, "delta").await;
        });
        true
    }

    /// Fetches the remote document, applies any pending delta and reports the
    /// outlets. Sensors are re-reported on the next poll tick.
    pub async fn reconcile(&self) -> Result<(), ShadowError> {
        let snapshot = bounded(self.timeout, self.channel.get()).await?;
        debug!(
            "shadow document (version {:?}): {}",
            snapshot.version,
            serde_json::to_string_pretty(&snapshot.document).unwrap_or_default()
        );

        if let Some(delta) = snapshot.delta.as_ref().filter(|delta| !delta.is_empty()) {
            info!("applying {} pending desired value(s) from shadow", delta.len());
            apply_and_log(&self.device, delta).await;
        }

        let outlets = self.device.lock().await.state().actuators();
        self.resync_sensors.store(true, Ordering::Relaxed);
        bounded(self.timeout, self.channel.update(UpdateDocument::reported(&outlets))).await
    }

    /// Runs `reconcile` on its own task, logging any failure.
    pub fn spawn_reconcile(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        let this = Arc::clone(self);
        self.spawn(async move {
            match this.reconcile().await {
                Ok(()) => info!("shadow reconciled"),
                Err(err) => warn!("shadow reconcile failed: {err}"),
            }
        });
    }

    /// One poll tick: sample under the lock, then report on a separate task.
    /// Returns whether a report was issued.
    pub async fn poll_once(&self, poller: &mut SensorPoller) -> bool {
        if self.resync_sensors.swap(false, Ordering::Relaxed) {
            poller.reset();
        }

        let tick = {
            let mut device = self.device.lock().await;
            poller.tick(&mut device)
        };
        for err in &tick.errors {
            warn!("sensor read failed, keeping last value: {err}");
        }

        let Some(report) = tick.report else {
            return false;
        };
        let channel = Arc::clone(&self.channel);
        let timeout = self.timeout;
        self.spawn(async move {
            submit_report(channel.as_ref(), timeout, report, "sensor").await;
        });
        true
    }

    /// Polls every `period` until stopped. The stop flag is checked each tick.
    pub async fn run_poller(&self, period: Duration) {
        let mut stop_rx = self.stop_tx.subscribe();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut poller = SensorPoller::new();
        info!("sensor poller started ({period:?})");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                    self.poll_once(&mut poller).await;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("sensor poller stopped after {} report(s)", poller.reports());
    }

    /// Stops accepting notifications, then waits (bounded by the shadow
    /// timeout) for in-flight tasks to finish.
    pub async fn shutdown(&self) {
        self.stop_tx.send_replace(true);
        self.drain().await;
    }

    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.lock_tasks());
        if tasks.is_empty() {
            return;
        }

        let pending = tasks.len();
        let drained = tokio::time::timeout(self.timeout, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(err) = result {
                    warn!("notification task failed: {err}");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("gave up waiting for {} of {pending} in-flight task(s)", tasks.len());
            tasks.abort_all();
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock_tasks();
        while let Some(result) = tasks.try_join_next() {
            if let Err(err) = result {
                warn!("notification task failed: {err}");
            }
        }
        tasks.spawn(task);
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn apply_and_log<P: PhysicalPort>(device: &Mutex<DeviceModel<P>>, delta: &DeltaRequest) -> ChangeSet {
    let outcome = {
        let mut device = device.lock().await;
        apply_delta(&mut device, delta)
    };

    for rejected in &outcome.rejected {
        warn!("rejected desired {}: {}", rejected.property, rejected.error);
    }
    if !outcome.ignored.is_empty() {
        debug!("ignored unknown delta keys: {:?}", outcome.ignored);
    }
    outcome.into_change_set()
}

/// Sends `changes` as a reported update. Empty change sets are never sent and
/// failures are logged, not retried.
async fn submit_report<S: ShadowChannel>(channel: &S, timeout: Duration, changes: ChangeSet, origin: &str) {
    if changes.is_empty() {
        debug!("{origin} produced no changes, nothing to report");
        return;
    }

    let document = UpdateDocument::reported(&changes);
    match bounded(timeout, channel.update(document)).await {
        Ok(()) => debug!("reported {} {origin} value(s)", changes.len()),
        Err(err) => warn!("{origin} report failed: {err}"),
    }
}
