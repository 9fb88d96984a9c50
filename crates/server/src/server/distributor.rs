//! Barrier-synchronised tile fan-out.
//!
//! Each step spawns one send task per active consumer into a `JoinSet`. A task
//! owns its consumer for the duration of the send and hands it back through the
//! join result. The step ends only when the set is drained, and the source is
//! advanced only after that.

use protocol::frame::write_frame;
use protocol::Slot;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::consumer::Consumer;
use crate::config::FailurePolicy;
use crate::error::DistributorError;
use crate::source::StepSource;

/// Knobs for the running phase.
#[derive(Debug, Clone, Copy)]
pub struct DistributionSettings {
    /// Upper bound on one frame send to one consumer.
    pub send_timeout: Duration,
    /// Pause after each step.
    pub step_interval: Duration,
    pub failure_policy: FailurePolicy,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Steps whose frames were fanned out.
    pub steps_completed: u32,
    /// Wall time of the running phase.
    pub total: Duration,
    /// Time spent advancing the source.
    pub engine: Duration,
    /// Time spent between fan-out start and barrier release.
    pub distribution: Duration,
    /// Time spent in the inter-step pause.
    pub throttle: Duration,
    /// Frames delivered, all consumers together.
    pub frames_sent: u64,
    /// Slots dropped after a failed send.
    pub dropped: Vec<Slot>,
}

impl RunReport {
    /// Log the timing summary.
    pub fn log(&self) {
        info!("Steps completed: {}", self.steps_completed);
        info!("Time taken: {:.5} seconds", self.total.as_secs_f64());
        info!("Time taken for updates: {:.5} seconds", self.engine.as_secs_f64());
        info!(
            "Time taken for sending: {:.5} seconds",
            self.distribution.as_secs_f64()
        );
        debug!("Time spent throttling: {:.5} seconds", self.throttle.as_secs_f64());
        if !self.dropped.is_empty() {
            warn!("Consumers dropped during the run: {:?}", self.dropped);
        }
    }
}

/// Result of one send task.
type SendOutcome<C> = (Consumer<C>, Result<usize, DistributorError>);

/// The running phase of the producer.
pub struct Distributor<S, C> {
    source: S,
    consumers: Box<[Option<Consumer<C>>]>,
    settings: DistributionSettings,
    report: RunReport,
}

impl<S, C> Distributor<S, C>
where
    S: StepSource,
    C: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        source: S,
        consumers: Box<[Option<Consumer<C>>]>,
        settings: DistributionSettings,
    ) -> Self {
        Self {
            source,
            consumers,
            settings,
            report: RunReport::default(),
        }
    }

    /// Number of consumers still being served.
    pub fn active(&self) -> usize {
        self.consumers.iter().filter(|c| c.is_some()).count()
    }

    /// Run every step, then shut the connections down.
    pub async fn run(mut self) -> Result<RunReport, DistributorError> {
        let started = Instant::now();
        let steps = self.source.steps();
        info!("Distributing {} steps to {} consumer(s)", steps, self.active());

        let result = self.run_steps(steps).await;
        self.report.total = started.elapsed();
        self.shutdown().await;

        result.map(|()| self.report)
    }

    async fn run_steps(&mut self, steps: u32) -> Result<(), DistributorError> {
        for step in 0..steps {
            let fan_out = Instant::now();
            self.distribute_step(step).await?;
            self.report.distribution += fan_out.elapsed();
            self.report.steps_completed += 1;

            let update = Instant::now();
            self.source.advance();
            self.report.engine += update.elapsed();

            if !self.settings.step_interval.is_zero() {
                let pause = Instant::now();
                sleep(self.settings.step_interval).await;
                self.report.throttle += pause.elapsed();
            }
        }
        Ok(())
    }

    /// Send the current step's frame to every active consumer and wait for all
    /// of them to finish.
    pub async fn distribute_step(&mut self, step: u32) -> Result<(), DistributorError> {
        let mut tasks: JoinSet<SendOutcome<C>> = JoinSet::new();
        let limit = self.settings.send_timeout;
        let mut in_flight = HashMap::new();

        for entry in self.consumers.iter_mut() {
            let Some(mut consumer) = entry.take() else {
                continue;
            };
            let frame = self.source.frame(consumer.slot);

            let slot = consumer.slot;
            let task = tasks.spawn(async move {
                let result = match frame {
                    Ok(frame) => match timeout(limit, write_frame(&mut consumer.conn, &frame)).await {
                        Ok(Ok(())) => Ok(frame.len()),
                        Ok(Err(source)) => Err(DistributorError::SendFailure { slot, source }),
                        Err(_) => Err(DistributorError::SendTimeout { slot, after: limit }),
                    },
                    Err(source) => Err(DistributorError::Source { slot, source }),
                };
                (consumer, result)
            });
            in_flight.insert(task.id(), slot);
        }

        // Barrier: every task is joined before the step is over.
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (mut consumer, Ok(bytes)))) => {
                    consumer.record_sent(bytes);
                    self.report.frames_sent += 1;
                    debug!("{} data sent to {} client", step + 1, consumer.slot);
                    let index = consumer.index();
                    self.consumers[index] = Some(consumer);
                }
                Ok((_, (consumer, Err(e)))) => {
                    warn!("Consumer {} ({}) failed at step {}: {}", consumer.slot, consumer.peer, step + 1, e);
                    self.report.dropped.push(consumer.slot);
                    failures.push(e);
                }
                Err(e) => {
                    // The consumer went down with the task.
                    let slot = in_flight.get(&e.id()).copied();
                    error!("Send task for consumer {:?} failed at step {}: {}", slot, step + 1, e);
                    self.report.dropped.extend(slot);
                    failures.push(DistributorError::Task(e));
                }
            }
        }

        if let Some(first) = failures.into_iter().next() {
            if self.settings.failure_policy == FailurePolicy::Abort {
                return Err(first);
            }
            if self.active() == 0 {
                return Err(DistributorError::AllConsumersFailed);
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        for consumer in self.consumers.iter_mut().flatten() {
            if let Err(e) = consumer.conn.shutdown().await {
                debug!("Shutdown of consumer {} failed: {}", consumer.slot, e);
            }
            info!(
                "Consumer {} received {} frames ({} bytes) over {:.2?}",
                consumer.slot,
                consumer.frames_sent,
                consumer.bytes_sent,
                consumer.registered_at.elapsed()
            );
        }
    }
}
