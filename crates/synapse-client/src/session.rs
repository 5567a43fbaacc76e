//! A training view's subscription to the event connection.
//!
//! A `TrainingSession` owns one `TrainingReducer`. It consumes the ordered
//! training event stream and user commands on a single task, so transitions
//! are applied one at a time in arrival order, and publishes the resulting
//! `TrainingStatusView`. Detaching a
//! session stops its subscriptions; the connection and any server-side job are
//! left alone.

use std::sync::Arc;

use futures::StreamExt;
use synapse_training::{AppState, Outcome, StartTicket, TrainingEvent, TrainingReducer, TrainingStatusView};
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::connection::{EventConnection, EventStream};

#[derive(Debug)]
enum Command {
    Start,
    Reset,
    Started { ticket: StartTicket, result: std::result::Result<synapse_training::TrainResponse, String> },
}

/// Event source a session listens to.
pub struct SessionStreams {
    /// Updates, completions and errors in arrival order.
    pub events: EventStream<TrainingEvent>,
}

impl SessionStreams {
    /// Fresh subscription on a connection.
    #[must_use]
    pub fn from_connection(connection: &EventConnection) -> Self {
        Self { events: connection.training_events() }
    }
}

pub struct TrainingSession {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<TrainingStatusView>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TrainingSession {
    /// Subscribe to `connection` for the lifetime of the returned session.
    pub fn attach(connection: &EventConnection, api: ApiClient, state: Arc<RwLock<AppState>>) -> Self {
        Self::with_streams(SessionStreams::from_connection(connection), api, state)
    }

    pub fn with_streams(streams: SessionStreams, api: ApiClient, state: Arc<RwLock<AppState>>) -> Self {
        let reducer = TrainingReducer::new();
        let (view_tx, view) = watch::channel(reducer.view());
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let worker = Worker { reducer, api, state, view: view_tx, commands: commands.clone() };
        let task = tokio::spawn(worker.run(streams, commands_rx, cancel.clone()));

        Self { commands, view, cancel, task }
    }

    /// Request a training run for the current network and hyperparameters.
    /// Returns immediately; progress arrives through [`Self::watch`].
    pub fn start_training(&self) {
        self.send(Command::Start);
    }

    /// Forget the current run. The server-side job keeps running.
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    /// Latest status.
    #[must_use]
    pub fn view(&self) -> TrainingStatusView {
        self.view.borrow().clone()
    }

    /// Watch status changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<TrainingStatusView> {
        self.view.clone()
    }

    /// Stop listening. The connection stays open.
    pub async fn detach(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Training session already detached");
        }
    }
}

impl Drop for TrainingSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    reducer: TrainingReducer,
    api: ApiClient,
    state: Arc<RwLock<AppState>>,
    view: watch::Sender<TrainingStatusView>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Worker {
    async fn run(
        mut self,
        mut streams: SessionStreams,
        mut commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(command) = commands.recv() => self.handle_command(command).await,
                Some(event) = streams.events.next() => self.handle_event(event).await,
                else => break,
            }
        }
        debug!("Training session detached");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => self.start().await,
            Command::Reset => self.reducer.reset(),
            Command::Started { ticket, result } => {
                match result {
                    Ok(response) => self.reducer.start_succeeded(ticket, response.job_id),
                    Err(detail) => self.reducer.start_failed(ticket, &detail),
                };
            }
        }
        self.publish();
    }

    async fn start(&mut self) {
        let (network_id, config) = {
            let state = self.state.read().await;
            (state.network_id().cloned(), state.training_config().clone())
        };

        let Ok(ticket) = self.reducer.start(network_id.as_ref()) else {
            return;
        };
        let Some(network_id) = network_id else {
            return;
        };

        let api = self.api.clone();
        let reply = self.commands.clone();
        tokio::spawn(async move {
            let result = api.train_network(&network_id, &config).await.map_err(|e| e.to_string());
            let _ = reply.send(Command::Started { ticket, result });
        });
    }

    async fn handle_event(&mut self, event: TrainingEvent) {
        let name = event.name();
        if self.reducer.apply(event) != Outcome::Applied {
            return;
        }
        self.publish();

        let view = self.view.borrow().clone();
        if view.training_complete {
            let mut state = self.state.write().await;
            state.set_training_complete(true);
            state.set_final_accuracy(view.final_accuracy);
            info!(event = name, final_accuracy = ?view.final_accuracy, "Training result recorded");
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.reducer.view());
    }
}
