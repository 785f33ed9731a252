//! Event loop driving a [`QuoteSession`]: rotation ticks, control presses,
//! handle commands and external updates are handled one at a time.

use anyhow::{anyhow, Result};
use shared::{
    domain::{ReactionKind, ReactionRecord, ReactionTable},
    error::ReactionError,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{
    render::QuoteRenderer,
    session::{QuoteSession, SessionSnapshot},
};

const COMMAND_QUEUE_CAPACITY: usize = 64;
const CONTROL_QUEUE_CAPACITY: usize = 16;

/// Sending side of an actionable control.
#[derive(Clone)]
pub struct ControlButton(mpsc::Sender<()>);

impl ControlButton {
    /// Waits for room in the queue, so no press is lost to a burst. Returns
    /// `false` once the session has stopped.
    pub async fn press(&self) -> bool {
        self.0.send(()).await.is_ok()
    }
}

pub fn control_button() -> (ControlButton, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
    (ControlButton(tx), rx)
}

/// Controls present on the hosting view. Either may be absent.
#[derive(Default)]
pub struct ViewControls {
    pub like: Option<mpsc::Receiver<()>>,
    pub dislike: Option<mpsc::Receiver<()>>,
}

impl ViewControls {
    pub fn none() -> Self {
        Self::default()
    }

    /// Both controls present, with the buttons that drive them.
    pub fn wired() -> (Self, ControlButton, ControlButton) {
        let (like, like_rx) = control_button();
        let (dislike, dislike_rx) = control_button();
        (
            Self {
                like: Some(like_rx),
                dislike: Some(dislike_rx),
            },
            like,
            dislike,
        )
    }
}

enum Command {
    React(ReactionKind, oneshot::Sender<ReactionRecord>),
    Next(oneshot::Sender<usize>),
    Show(usize, oneshot::Sender<bool>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

struct Inbox {
    commands: mpsc::Receiver<Command>,
    updates: mpsc::UnboundedReceiver<ReactionTable>,
    shutdown: oneshot::Receiver<()>,
}

/// Public surface of a running session. Dropping the handle stops the loop
/// and its rotation.
pub struct SessionHandle<R> {
    commands: mpsc::Sender<Command>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<QuoteSession<R>>,
}

impl<R> SessionHandle<R> {
    pub async fn like(&self) -> Result<ReactionRecord> {
        self.request(|reply| Command::React(ReactionKind::Like, reply))
            .await
    }

    pub async fn dislike(&self) -> Result<ReactionRecord> {
        self.request(|reply| Command::React(ReactionKind::Dislike, reply))
            .await
    }

    pub async fn next(&self) -> Result<usize> {
        self.request(Command::Next).await
    }

    pub async fn show(&self, index: usize) -> Result<bool> {
        self.request(|reply| Command::Show(index, reply)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(Command::Snapshot).await
    }

    /// Stops the loop and hands the session back.
    pub async fn shutdown(self) -> Result<QuoteSession<R>> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|err| anyhow!("session task failed: {err}"))
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| anyhow!("session is no longer running"))?;
        response
            .await
            .map_err(|_| anyhow!("session stopped before replying"))
    }
}

impl<R: QuoteRenderer + Send + 'static> QuoteSession<R> {
    pub fn spawn(self, controls: ViewControls) -> SessionHandle<R> {
        let (commands, commands_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let forwarder = self.store.on_external_update(move |table| {
            let _ = updates_tx.send(table);
        });
        let inbox = Inbox {
            commands: commands_rx,
            updates: updates_rx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(async move {
            let session = self.run(inbox, controls).await;
            forwarder.abort();
            session
        });
        SessionHandle {
            commands,
            shutdown,
            task,
        }
    }

    async fn run(mut self, mut inbox: Inbox, mut controls: ViewControls) -> Self {
        let view_id = self.store.view_id();
        for (control, present) in [
            ("like", controls.like.is_some()),
            ("dislike", controls.dislike.is_some()),
        ] {
            if !present {
                let missing = ReactionError::ControlMissing { control };
                debug!(%view_id, "session: {missing}");
            }
        }

        let period = self.config.rotation_period();
        // A period too long to schedule means the quote never rotates.
        let mut rotation = Instant::now().checked_add(period).map(|start| {
            let mut rotation = interval_at(start, period);
            rotation.set_missed_tick_behavior(MissedTickBehavior::Delay);
            rotation
        });
        info!(
            %view_id,
            channel = self.store.has_channel(),
            rotates = rotation.is_some(),
            ?period,
            "session: running"
        );

        loop {
            tokio::select! {
                _ = &mut inbox.shutdown => break,
                command = inbox.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = next_rotation(&mut rotation) => {
                    let index = self.next();
                    debug!(%view_id, index, "session: rotated");
                }
                pressed = next_press(&mut controls.like) => match pressed {
                    Some(()) => {
                        self.like().await;
                    }
                    None => controls.like = None,
                },
                pressed = next_press(&mut controls.dislike) => match pressed {
                    Some(()) => {
                        self.dislike().await;
                    }
                    None => controls.dislike = None,
                },
                Some(table) = inbox.updates.recv() => self.apply_external(table),
            }
        }

        info!(%view_id, "session: stopped");
        self
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::React(kind, reply) => {
                let record = match kind {
                    ReactionKind::Like => self.like().await,
                    ReactionKind::Dislike => self.dislike().await,
                };
                let _ = reply.send(record);
            }
            Command::Next(reply) => {
                let _ = reply.send(self.next());
            }
            Command::Show(index, reply) => {
                let _ = reply.send(self.show(index));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }
}

async fn next_rotation(rotation: &mut Option<Interval>) {
    match rotation {
        Some(rotation) => {
            rotation.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_press(control: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match control {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
