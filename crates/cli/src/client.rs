// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process wiring: build the session, start the background tasks, run the
//! input loop, and tear everything down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, Settings, CONFIG_FILE_NAME};
use crate::display::spawn_dispatcher;
use crate::input::{prompt_identity, run_input, spawn_stdin_reader};
use crate::keepalive::spawn_keepalive;
use crate::queue::display_queue;
use crate::reader::spawn_reader;
use crate::render::Renderer;
use crate::replay::ReplayGate;
use crate::session::{Session, SessionConfig};
use crate::transport::Identity;
use crate::update::UpdateChecker;

/// Upper bound on waiting for background tasks at shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// A running chat client: session plus its background tasks.
pub struct Client {
    session: Arc<Session>,
    renderer: Arc<Renderer>,
    updates: Option<UpdateChecker>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Client {
    /// Start background tasks and join `settings.room`. A failed first join
    /// is returned as an error after the tasks are stopped.
    pub async fn start(
        settings: &Settings,
        identity: Identity,
        renderer: Arc<Renderer>,
        updates: Option<UpdateChecker>,
    ) -> anyhow::Result<Self> {
        let gate = Arc::new(ReplayGate::new());
        let session = Arc::new(Session::new(SessionConfig {
            endpoint: settings.endpoint.clone(),
            identity,
            renderer: Arc::clone(&renderer),
            gate: Arc::clone(&gate),
        })?);

        let shutdown = CancellationToken::new();
        let (queue_tx, queue_rx) = display_queue(settings.queue_capacity);
        let tasks = vec![
            spawn_dispatcher(queue_rx, Arc::clone(&renderer), gate, shutdown.clone()),
            spawn_reader(Arc::clone(&session), queue_tx, shutdown.clone()),
            spawn_keepalive(Arc::clone(&session), settings.keepalive, shutdown.clone()),
        ];

        let client = Self { session, renderer, updates, shutdown, tasks };
        let joined = client.session.join_room(&settings.room).await;
        if let Err(e) = joined {
            client.shutdown().await;
            return Err(e.into());
        }
        client.renderer.prompt();
        Ok(client)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run the input loop until `/exit` or end of input.
    pub async fn run_input(&self, lines: &mut mpsc::Receiver<String>) -> anyhow::Result<()> {
        run_input(&self.session, lines, &self.renderer, self.updates.as_ref()).await?;
        Ok(())
    }

    /// Stop background tasks and close the active connection.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.session.leave().await;
        for task in self.tasks {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(err = %e, "background task failed"),
                Err(_) => warn!("background task did not stop in time"),
            }
        }
        debug!("client stopped");
    }
}

/// Entry point used by the binary.
pub async fn run(config: Config) -> anyhow::Result<()> {
    crate::ensure_crypto_provider();

    let mut settings = config.resolve()?;
    let mut lines = spawn_stdin_reader();

    if settings.from_file {
        println!("✅ Successfully applied '{CONFIG_FILE_NAME}'.");
    }

    let identity = match (settings.nickname.clone(), settings.password.clone()) {
        (Some(nickname), password) if settings.from_file || password.is_some() => {
            Identity::new(nickname, password.unwrap_or_default())
        }
        _ => {
            let asker = Renderer::stdout(settings.style.clone());
            let Some(login) = prompt_identity(&asker, &mut lines, &settings.room).await else {
                return Ok(());
            };
            settings.room = login.room;
            Identity::new(login.nickname, login.password)
        }
    };
    settings.style.own_nickname = identity.nickname.clone();
    info!(host = %settings.endpoint.host, port = settings.endpoint.port, room = %settings.room, "starting");

    let renderer = Arc::new(Renderer::stdout(settings.style.clone()));
    let updates = match UpdateChecker::github() {
        Ok(checker) => Some(checker),
        Err(e) => {
            warn!(err = %e, "update checks disabled");
            None
        }
    };

    let client = Client::start(&settings, identity, renderer, updates).await?;
    let result = client.run_input(&mut lines).await;
    client.shutdown().await;
    result
}
