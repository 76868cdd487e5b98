//! # Async Driver
//!
//! Runs a `PlaybackMachine` on its own tokio task in real time. Commands and
//! timer firings are serialized on that task, so user operations always see a
//! consistent machine and pre-empt timers that have not fired yet.

use execution_graph::GraphNode;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::PlaybackError;
use crate::machine::PlaybackMachine;
use crate::state::{PlaybackEvent, PlaybackSnapshot, StepVisualState};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

/// Commands accepted by the driver task.
#[derive(Debug)]
pub enum PlaybackCommand {
    Start,
    Play,
    Pause,
    Reset,
    NextStep,
    PreviousStep,
    GoToStep(usize),
    SetSteps(Vec<GraphNode>),
    SetAutoStart(bool),
    Snapshot(oneshot::Sender<PlaybackSnapshot>),
    StepState(usize, oneshot::Sender<StepVisualState>),
    Shutdown,
}

/// Cloneable control surface for a running driver.
#[derive(Clone)]
pub struct PlaybackHandle {
    tx: mpsc::Sender<PlaybackCommand>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackHandle {
    async fn send(&self, cmd: PlaybackCommand) -> Result<(), PlaybackError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| PlaybackError::DriverClosed)
    }

    pub async fn start_execution(&self) -> Result<(), PlaybackError> {
        self.send(PlaybackCommand::Start).await
    }

    pub async fn play(&self) -> Result<(), PlaybackError> {
        self.send(PlaybackCommand::Play).await
    }

    pub async fn pause(&self) -> Result<(), PlaybackError> {
        self.send(PlaybackCommand::Pause).await
    }

    pub async fn reset(&self) -> Result<(), PlaybackError> {
        self.send(PlaybackCommand::Reset).await
    }

    pub async fn next_step(&self) -> Result<(), PlaybackError> {
        self.send(PlaybackCommand::NextStep).await
    }

    pub async fn previous_step(&self) -> Result<(), PlaybackError> {
        self.send(PlaybackCommand::PreviousStep).await
    }

    pub async fn go_to_step(&self, index: usize) -> Result<(), PlaybackError> {
        self.send(PlaybackCommand::GoToStep(index)).await
    }

    pub async fn set_steps(&self, nodes: Vec<GraphNode>) -> Result<(), PlaybackError> {
        self.send(PlaybackCommand::SetSteps(nodes)).await
    }

    pub async fn set_auto_start(&self, enabled: bool) -> Result<(), PlaybackError> {
        self.send(PlaybackCommand::SetAutoStart(enabled)).await
    }

    pub async fn snapshot(&self) -> Result<PlaybackSnapshot, PlaybackError> {
        let (tx, rx) = oneshot::channel();
        self.send(PlaybackCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| PlaybackError::DriverClosed)
    }

    pub async fn step_state(&self, index: usize) -> Result<StepVisualState, PlaybackError> {
        let (tx, rx) = oneshot::channel();
        self.send(PlaybackCommand::StepState(index, tx)).await?;
        rx.await.map_err(|_| PlaybackError::DriverClosed)
    }

    /// Subscribes to transition events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Asks the driver task to stop. The task returns the machine on exit.
    pub async fn shutdown(&self) -> Result<(), PlaybackError> {
        self.send(PlaybackCommand::Shutdown).await
    }
}

pub struct PlaybackDriver;

impl PlaybackDriver {
    /// Spawns the driver task. The machine's logical clock is anchored to the
    /// moment of spawning.
    pub fn spawn(machine: PlaybackMachine) -> (PlaybackHandle, JoinHandle<PlaybackMachine>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let origin = Instant::now()
            .checked_sub(machine.now())
            .unwrap_or_else(Instant::now);
        let task = tokio::spawn(run(machine, origin, rx, events.clone()));
        (PlaybackHandle { tx, events }, task)
    }
}

async fn run(
    mut machine: PlaybackMachine,
    origin: Instant,
    mut rx: mpsc::Receiver<PlaybackCommand>,
    events: broadcast::Sender<PlaybackEvent>,
) -> PlaybackMachine {
    tracing::debug!("Playback driver started");

    loop {
        // A deadline past the end of the clock never fires.
        let deadline = machine.next_deadline().and_then(|d| origin.checked_add(d));
        let wake = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            cmd = rx.recv() => {
                // Settle timers that came due before the command arrived.
                machine.advance_to(origin.elapsed());
                match cmd {
                    None | Some(PlaybackCommand::Shutdown) => break,
                    Some(cmd) => apply(&mut machine, cmd),
                }
            }
            _ = wake => {
                machine.advance_to(origin.elapsed());
            }
        }

        for event in machine.drain_events() {
            // No subscribers is fine.
            let _ = events.send(event);
        }
    }

    for event in machine.drain_events() {
        let _ = events.send(event);
    }
    tracing::debug!("Playback driver stopped");
    machine
}

fn apply(machine: &mut PlaybackMachine, cmd: PlaybackCommand) {
    match cmd {
        PlaybackCommand::Start => machine.start_execution(),
        PlaybackCommand::Play => machine.play(),
        PlaybackCommand::Pause => machine.pause(),
        PlaybackCommand::Reset => machine.reset(),
        PlaybackCommand::NextStep => machine.next_step(),
        PlaybackCommand::PreviousStep => machine.previous_step(),
        PlaybackCommand::GoToStep(i) => machine.go_to_step(i),
        PlaybackCommand::SetSteps(nodes) => machine.set_steps(&nodes),
        PlaybackCommand::SetAutoStart(enabled) => machine.set_auto_start(enabled),
        PlaybackCommand::Snapshot(reply) => {
            let _ = reply.send(machine.snapshot());
        }
        PlaybackCommand::StepState(i, reply) => {
            let _ = reply.send(machine.step_state(i));
        }
        PlaybackCommand::Shutdown => {}
    }
}
