//! # Graph Executor
//!
//! This module drives a fully wired [`Graph`] using a cooperative pull model on
//! a single logical thread of control.
//!
//! ## Execution Flow
//!
//! 1. **Start**: the first step validates the graph, freezes its topology and
//!    moves every component from `Initialized` to `Running`.
//! 2. **Rounds**: each round visits every sink that still has demand (an input
//!    port not yet at end of stream), in the order sinks were added. For each
//!    such port the executor pulls the connected upstream output port, which
//!    recursively pulls through filters down to a source.
//! 3. **Backpressure**: a round in which every pull returned [`Pull::Again`]
//!    makes no progress; [`Graph::run`] then waits as long as the configured
//!    [`BackoffPolicy`] says, or halts with [`RunError::Stalled`] when the policy
//!    gives up.
//! 4. **Completion**: once every sink input port reached end of stream, all
//!    components are finalized in reverse creation order.
//!
//! ## Failure Handling
//!
//! An error from any component halts the whole run with an
//! [`ExecutionError`] naming that component. Every live component is then
//! finalized in reverse creation order; finalization errors are attached to the
//! execution error.
//!
//! ## Cancellation
//!
//! The graph's cancellation token is checked before every pull step and while
//! waiting for backoff. A cancelled run finalizes all components and reports
//! [`RunStatus::Cancelled`]; a pull step in progress is never interrupted.

use crate::component::{Behavior, Component, ComponentId, Message, Pull};
use crate::error::{ComponentError, ExecutionError, RunError, TeardownError};
use crate::graph::{Graph, GraphState};
use crate::port::Connection;
use crate::class::PortDirection;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Decides how long to wait after a round without progress.
pub trait BackoffPolicy: Send + Sync + fmt::Debug {
  /// Delay before the next round, given the number of consecutive idle rounds
  /// (starting at 1). `None` gives up and stalls the run.
  fn delay(&self, idle_rounds: u32) -> Option<Duration>;
}

/// Exponential backoff between idle rounds, optionally bounded in count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExponentialBackoff {
  /// Delay after the first idle round.
  pub initial: Duration,
  /// Upper bound for a single delay.
  pub max: Duration,
  /// Maximum consecutive idle rounds before giving up. None = unbounded.
  pub max_idle_rounds: Option<u32>,
}

impl ExponentialBackoff {
  /// Creates a policy doubling from `initial` up to `max`, never giving up.
  pub fn new(initial: Duration, max: Duration) -> Self {
    Self {
      initial,
      max,
      max_idle_rounds: None,
    }
  }

  /// Sets the number of consecutive idle rounds tolerated.
  pub fn with_max_idle_rounds(mut self, n: Option<u32>) -> Self {
    self.max_idle_rounds = n;
    self
  }
}

impl Default for ExponentialBackoff {
  fn default() -> Self {
    Self {
      initial: Duration::from_millis(1),
      max: Duration::from_millis(100),
      max_idle_rounds: Some(1_000),
    }
  }
}

impl BackoffPolicy for ExponentialBackoff {
  fn delay(&self, idle_rounds: u32) -> Option<Duration> {
    if let Some(limit) = self.max_idle_rounds {
      if idle_rounds > limit {
        return None;
      }
    }
    let factor = 1u32.checked_shl(idle_rounds.saturating_sub(1)).unwrap_or(u32::MAX);
    Some(self.initial.saturating_mul(factor).min(self.max))
  }
}

/// Outcome of one executor round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
  /// At least one message or end of stream reached a sink.
  Progress,
  /// Every pull returned `Again`.
  Again,
  /// Every sink input reached end of stream; components are finalized.
  Finished,
  /// The run was cancelled; components are finalized.
  Cancelled,
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
  /// Every sink input reached end of stream.
  Finished,
  /// The run was cancelled.
  Cancelled,
}

/// Counters of the current run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
  /// Rounds executed.
  pub rounds: u64,
  /// Messages delivered to sinks.
  pub messages: u64,
  /// Consecutive rounds without progress.
  pub idle_rounds: u32,
  /// When the first round started.
  pub started_at: Option<DateTime<Utc>>,
}

/// Summary of a completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
  /// How the run ended.
  pub status: RunStatus,
  /// Rounds executed.
  pub rounds: u64,
  /// Messages delivered to sinks.
  pub messages: u64,
  /// When the first round started.
  pub started_at: DateTime<Utc>,
  /// When the run ended.
  pub finished_at: DateTime<Utc>,
}

/// Messages drained by [`Upstream::pull_batch`].
#[derive(Clone, Debug, Default)]
pub struct Batch {
  /// Messages in arrival order.
  pub messages: Vec<Message>,
  /// Whether the port reached end of stream.
  pub end_of_stream: bool,
}

/// First component error of a pull step, with the component that raised it.
struct Failure {
  component: ComponentId,
  cause: ComponentError,
}

#[derive(Debug, thiserror::Error)]
#[error("upstream component failed")]
struct UpstreamFailed;

/// Handle through which a filter pulls its input ports.
pub struct Upstream<'a> {
  component: ComponentId,
  components: &'a mut [Component],
  connections: &'a [Connection],
  failure: &'a mut Option<Failure>,
}

impl Upstream<'_> {
  /// Id of the filter owning this handle.
  pub fn component(&self) -> ComponentId {
    self.component
  }

  /// Names of the filter's input ports, in schema order.
  pub fn input_ports(&self) -> Vec<String> {
    self.components[self.component.0]
      .input_port_names()
      .map(str::to_string)
      .collect()
  }

  /// Whether input port `port` already reached end of stream.
  pub fn is_at_end(&self, port: &str) -> bool {
    let component = &self.components[self.component.0];
    component
      .port_index(port, PortDirection::Input)
      .and_then(|index| component.port(index))
      .map(|p| p.at_end)
      .unwrap_or(false)
  }

  /// Pulls one message from input port `port`.
  ///
  /// Once the port reached end of stream, further pulls return
  /// [`Pull::EndOfStream`] without reaching upstream.
  pub async fn pull(&mut self, port: &str) -> Result<Pull, ComponentError> {
    let index = self.components[self.component.0]
      .port_index(port, PortDirection::Input)
      .ok_or_else(|| format!("no input port named '{}'", port))?;
    pull_input(
      &mut *self.components,
      self.connections,
      &mut *self.failure,
      self.component,
      index,
    )
    .await
  }

  /// Pulls up to `max` messages from input port `port`, stopping early when
  /// upstream returns `Again` or reaches end of stream.
  pub async fn pull_batch(&mut self, port: &str, max: usize) -> Result<Batch, ComponentError> {
    let mut batch = Batch::default();
    while batch.messages.len() < max {
      match self.pull(port).await? {
        Pull::Message(message) => batch.messages.push(message),
        Pull::Again => break,
        Pull::EndOfStream => {
          batch.end_of_stream = true;
          break;
        }
      }
    }
    Ok(batch)
  }
}

/// Pulls input port `index` of `consumer` from the output port it is connected to.
fn pull_input<'c>(
  components: &'c mut [Component],
  connections: &'c [Connection],
  failure: &'c mut Option<Failure>,
  consumer: ComponentId,
  index: usize,
) -> BoxFuture<'c, Result<Pull, ComponentError>> {
  Box::pin(pull_input_inner(
    components,
    connections,
    failure,
    consumer,
    index,
  ))
}

async fn pull_input_inner(
  components: &mut [Component],
  connections: &[Connection],
  failure: &mut Option<Failure>,
  consumer: ComponentId,
  index: usize,
) -> Result<Pull, ComponentError> {
  let port = components[consumer.0]
    .port(index)
    .ok_or("input port index out of range")?;
  if port.at_end {
    return Ok(Pull::EndOfStream);
  }
  let upstream = port
    .connection
    .and_then(|c| connections.get(c.0))
    .map(|c| c.upstream)
    .ok_or_else(|| format!("input port '{}' is not connected", port.name))?;

  let pulled = pull_output(
    &mut *components,
    connections,
    &mut *failure,
    upstream.component,
    upstream.index,
  )
  .await?;
  if pulled.is_end_of_stream() {
    if let Some(port) = components[consumer.0].port_mut(index) {
      port.at_end = true;
    }
  }
  Ok(pulled)
}

/// Asks `producer` for the next message on its output port `index`.
fn pull_output<'c>(
  components: &'c mut [Component],
  connections: &'c [Connection],
  failure: &'c mut Option<Failure>,
  producer: ComponentId,
  index: usize,
) -> BoxFuture<'c, Result<Pull, ComponentError>> {
  Box::pin(pull_output_inner(
    components,
    connections,
    failure,
    producer,
    index,
  ))
}

async fn pull_output_inner(
  components: &mut [Component],
  connections: &[Connection],
  failure: &mut Option<Failure>,
  producer: ComponentId,
  index: usize,
) -> Result<Pull, ComponentError> {
  let component = &mut components[producer.0];
  let port = component
    .port(index)
    .map(|p| p.name.clone())
    .ok_or("output port index out of range")?;
  let mut behavior = component
    .take_behavior()
    .ok_or_else(|| format!("component '{}' is already being pulled", component.name()))?;

  let result = match &mut behavior {
    Behavior::Source(source) => source.pull(&port).await,
    Behavior::Filter(filter) => {
      let mut upstream = Upstream {
        component: producer,
        components: &mut *components,
        connections,
        failure: &mut *failure,
      };
      filter.pull(&port, &mut upstream).await
    }
    Behavior::Sink(_) => Err("sinks have no output ports".into()),
  };
  components[producer.0].restore_behavior(behavior);

  result.map_err(|cause| {
    // Keep the deepest failure; callers only see a marker.
    if failure.is_none() {
      *failure = Some(Failure {
        component: producer,
        cause,
      });
    }
    UpstreamFailed.into()
  })
}

impl Graph {
  /// Runs the graph until every sink input reaches end of stream, the run is
  /// cancelled, a component fails, or the backoff policy gives up.
  pub async fn run(&mut self) -> Result<RunSummary, RunError> {
    loop {
      match self.run_once().await? {
        StepOutcome::Progress => {}
        StepOutcome::Again => {
          let idle_rounds = self.stats.idle_rounds;
          match self.backoff.delay(idle_rounds) {
            Some(delay) => {
              trace!(graph = %self.name(), idle_rounds, ?delay, "no progress; backing off");
              let token = self.cancel.clone();
              tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
              }
            }
            None => return Err(self.stall()),
          }
        }
        StepOutcome::Finished => return Ok(self.summary(RunStatus::Finished)),
        StepOutcome::Cancelled => return Ok(self.summary(RunStatus::Cancelled)),
      }
    }
  }

  /// Performs one round: one pull step for every input port of every sink
  /// that still has demand.
  ///
  /// The first call validates and freezes the graph.
  pub async fn run_once(&mut self) -> Result<StepOutcome, RunError> {
    match self.state {
      GraphState::Configuring => self.start()?,
      GraphState::Running => {}
      other => return Err(RunError::NotRunnable(other)),
    }
    self.stats.rounds += 1;

    let mut progressed = false;
    for sink in self.sinks.clone() {
      let pending: Vec<usize> = self.components[sink.0]
        .ports()
        .enumerate()
        .filter(|(_, p)| p.is_input() && !p.at_end)
        .map(|(index, _)| index)
        .collect();
      for index in pending {
        if self.cancel.is_cancelled() {
          return self.cancel_run();
        }
        match self.sink_step(sink, index).await {
          Ok(made_progress) => progressed |= made_progress,
          Err(failure) => return Err(self.fail(failure)),
        }
      }
    }

    if self.cancel.is_cancelled() {
      return self.cancel_run();
    }
    if !self.has_demand() {
      return self.finish();
    }
    debug!(
      graph = %self.name(),
      round = self.stats.rounds,
      progressed,
      "round complete"
    );
    if progressed {
      self.stats.idle_rounds = 0;
      Ok(StepOutcome::Progress)
    } else {
      self.stats.idle_rounds += 1;
      Ok(StepOutcome::Again)
    }
  }

  /// Counters of the current or last run.
  pub fn stats(&self) -> &RunStats {
    &self.stats
  }

  fn start(&mut self) -> Result<(), RunError> {
    self.validate()?;
    self.state = GraphState::Running;
    self.stats.started_at = Some(Utc::now());
    for component in &mut self.components {
      component.start();
    }
    info!(
      graph = %self.name(),
      components = self.components.len(),
      connections = self.connections.len(),
      "graph execution started"
    );
    Ok(())
  }

  /// Pulls input port `index` of `sink` once and hands the result to the sink.
  async fn sink_step(&mut self, sink: ComponentId, index: usize) -> Result<bool, Failure> {
    let mut failure = None;
    let pulled = pull_input(
      &mut self.components,
      &self.connections,
      &mut failure,
      sink,
      index,
    )
    .await;
    if let Some(failure) = failure {
      return Err(failure);
    }
    let pull = pulled.map_err(|cause| Failure {
      component: sink,
      cause,
    })?;
    if matches!(pull, Pull::Again) {
      return Ok(false);
    }

    let component = &mut self.components[sink.0];
    let port = component
      .port(index)
      .map(|p| p.name.clone())
      .unwrap_or_default();
    let Some(mut behavior) = component.take_behavior() else {
      return Err(Failure {
        component: sink,
        cause: format!("sink '{}' is already in use", component.name()).into(),
      });
    };
    let result = match (behavior.as_sink(), pull) {
      (Some(s), Pull::Message(message)) => {
        self.stats.messages += 1;
        s.consume(&port, message).await
      }
      (Some(s), _) => s.end_of_stream(&port),
      (None, _) => Err("component is not a sink".into()),
    };
    self.components[sink.0].restore_behavior(behavior);
    result.map(|()| true).map_err(|cause| Failure {
      component: sink,
      cause,
    })
  }

  fn has_demand(&self) -> bool {
    self.sinks.iter().any(|sink| {
      self.components[sink.0]
        .ports()
        .any(|p| p.is_input() && !p.at_end)
    })
  }

  fn finish(&mut self) -> Result<StepOutcome, RunError> {
    self.state = GraphState::Finished;
    let failures = self.finalize_all();
    info!(
      graph = %self.name(),
      rounds = self.stats.rounds,
      messages = self.stats.messages,
      "graph execution finished"
    );
    if failures.is_empty() {
      Ok(StepOutcome::Finished)
    } else {
      Err(TeardownError { failures }.into())
    }
  }

  fn cancel_run(&mut self) -> Result<StepOutcome, RunError> {
    self.state = GraphState::Cancelled;
    let failures = self.finalize_all();
    info!(graph = %self.name(), rounds = self.stats.rounds, "graph execution cancelled");
    if failures.is_empty() {
      Ok(StepOutcome::Cancelled)
    } else {
      Err(TeardownError { failures }.into())
    }
  }

  fn fail(&mut self, failure: Failure) -> RunError {
    let name = self.components[failure.component.0].name().to_string();
    error!(
      graph = %self.name(),
      component = %name,
      error = %failure.cause,
      "component failed; halting graph execution"
    );
    self.state = GraphState::Faulted;
    let finalize_failures = self.finalize_all();
    ExecutionError {
      component_id: failure.component,
      component: name,
      cause: failure.cause,
      finalize_failures,
    }
    .into()
  }

  fn stall(&mut self) -> RunError {
    let idle_rounds = self.stats.idle_rounds;
    warn!(graph = %self.name(), idle_rounds, "backoff policy gave up; halting graph execution");
    self.state = GraphState::Faulted;
    RunError::Stalled {
      idle_rounds,
      finalize_failures: self.finalize_all(),
    }
  }

  fn summary(&self, status: RunStatus) -> RunSummary {
    let finished_at = Utc::now();
    RunSummary {
      status,
      rounds: self.stats.rounds,
      messages: self.stats.messages,
      started_at: self.stats.started_at.unwrap_or(finished_at),
      finished_at,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_backoff_doubles_up_to_max() {
    let policy = ExponentialBackoff::new(Duration::from_millis(2), Duration::from_millis(10));
    assert_eq!(policy.delay(1), Some(Duration::from_millis(2)));
    assert_eq!(policy.delay(2), Some(Duration::from_millis(4)));
    assert_eq!(policy.delay(3), Some(Duration::from_millis(8)));
    assert_eq!(policy.delay(4), Some(Duration::from_millis(10)));
    assert_eq!(policy.delay(200), Some(Duration::from_millis(10)));
  }

  #[test]
  fn test_backoff_gives_up_after_limit() {
    let policy = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO)
      .with_max_idle_rounds(Some(3));
    assert!(policy.delay(3).is_some());
    assert_eq!(policy.delay(4), None);
  }
}
