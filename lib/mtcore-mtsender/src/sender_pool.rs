// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{
    AuthorizationError, Configuration, Connector, Event, InvocationError, InvokeResponse,
    ReadError, Sender, connect, connect_with_auth,
};
use futures_util::future::{Either, select};
use log::{info, warn};
use mtcore_mtproto::{mtp, transport};
use mtcore_session::{DcOption, Session};
use std::net::SocketAddr;
use std::panic;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

pub(crate) type Transport = transport::Full;

enum Request {
    Invoke {
        dc_id: i32,
        body: Vec<u8>,
        tx: oneshot::Sender<Result<InvokeResponse, InvocationError>>,
    },
    Disconnect {
        dc_id: i32,
    },
    Quit,
}

struct Rpc {
    body: Vec<u8>,
    tx: oneshot::Sender<Result<InvokeResponse, InvocationError>>,
}

struct ConnectionInfo {
    dc_id: i32,
    rpc_tx: mpsc::UnboundedSender<Rpc>,
}

/// Cloneable access to a running [`SenderPoolRunner`].
#[derive(Clone)]
pub struct SenderPoolHandle {
    request_tx: mpsc::UnboundedSender<Request>,
    session: Arc<dyn Session>,
    event_tx: mpsc::UnboundedSender<Event>,
    max_retries: usize,
}

pub struct SenderPool<C: Connector> {
    pub runner: SenderPoolRunner<C>,
    pub handle: SenderPoolHandle,
    pub events: mpsc::UnboundedReceiver<Event>,
}

pub struct SenderPoolRunner<C: Connector> {
    pub session: Arc<dyn Session>,
    pub configuration: Configuration,
    connector: Arc<C>,
    request_rx: mpsc::UnboundedReceiver<Request>,
    event_tx: mpsc::UnboundedSender<Event>,
}

impl SenderPoolHandle {
    /// Invoke a request in the home datacenter.
    ///
    /// While no user is signed in, `*_MIGRATE_*` errors change the home
    /// datacenter and the request is sent again there.
    pub async fn invoke(&self, body: Vec<u8>) -> Result<InvokeResponse, InvocationError> {
        let mut migrations = 0;
        loop {
            let dc_id = self.session.home_dc_id();
            let error = match self.invoke_in_dc(dc_id, body.clone()).await {
                Err(InvocationError::Rpc(error)) => error,
                result => break result,
            };

            let Some(new_dc_id) = error.migrate_to() else {
                break Err(InvocationError::Rpc(error));
            };
            if self.session.signed_in() {
                warn!("not following migration to DC {new_dc_id} while signed in");
                break Err(InvocationError::Rpc(error));
            }
            if migrations >= self.max_retries {
                break Err(InvocationError::RetriesExhausted {
                    last: Box::new(InvocationError::Rpc(error)),
                });
            }

            migrations += 1;
            info!("migrating from DC {dc_id} to DC {new_dc_id}");
            self.session.set_home_dc_id(new_dc_id);
            let _ = self.event_tx.send(Event::DcMigrated {
                from: dc_id,
                to: new_dc_id,
            });
        }
    }

    /// Invoke a request in a specific datacenter, connecting to it if needed.
    pub async fn invoke_in_dc(
        &self,
        dc_id: i32,
        body: Vec<u8>,
    ) -> Result<InvokeResponse, InvocationError> {
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .send(Request::Invoke { dc_id, body, tx })
            .map_err(|_| InvocationError::Dropped)?;
        rx.await.map_err(|_| InvocationError::Dropped)?
    }

    /// Close the connection to a datacenter, failing its pending requests.
    pub fn disconnect(&self, dc_id: i32) -> bool {
        self.request_tx.send(Request::Disconnect { dc_id }).is_ok()
    }

    /// Stop the runner and every connection.
    pub fn quit(&self) -> bool {
        self.request_tx.send(Request::Quit).is_ok()
    }
}

#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
impl SenderPool<crate::Tcp> {
    pub fn new<S: Session + 'static>(session: Arc<S>, configuration: Configuration) -> Self {
        Self::with_connector(session, Arc::new(crate::Tcp), configuration)
    }
}

impl<C: Connector> SenderPool<C> {
    pub fn with_connector<S: Session + 'static>(
        session: Arc<S>,
        connector: Arc<C>,
        configuration: Configuration,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = session as Arc<dyn Session>;

        Self {
            handle: SenderPoolHandle {
                request_tx,
                session: Arc::clone(&session),
                event_tx: event_tx.clone(),
                max_retries: configuration.max_retries,
            },
            runner: SenderPoolRunner {
                session,
                configuration,
                connector,
                request_rx,
                event_tx,
            },
            events: event_rx,
        }
    }
}

impl<C: Connector> SenderPoolRunner<C> {
    /// Run the sender pool until [`crate::SenderPoolHandle::quit`] is called.
    ///
    /// Connections will be initiated on-demand whenever the first request to a DC is made.
    pub async fn run(self) {
        let Self {
            session,
            configuration,
            connector,
            mut request_rx,
            event_tx,
        } = self;

        let mut connections = Vec::<ConnectionInfo>::new();
        let mut connection_pool = JoinSet::<Result<(), ReadError>>::new();

        while let Some(request) = request_rx.recv().await {
            while let Some(completion) = connection_pool.try_join_next() {
                match completion {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!("connection closed: {err}"),
                    Err(err) => {
                        if let Ok(reason) = err.try_into_panic() {
                            panic::resume_unwind(reason);
                        }
                    }
                }
            }
            // Senders that gave up dropped their end.
            connections.retain(|connection| !connection.rpc_tx.is_closed());

            match request {
                Request::Invoke { dc_id, body, tx } => {
                    let position = connections
                        .iter()
                        .position(|connection| connection.dc_id == dc_id);
                    let index = match position {
                        Some(index) => index,
                        None => {
                            let Some(dc_option) = session.dc_option(dc_id) else {
                                let _ = tx.send(Err(InvocationError::InvalidDc));
                                continue;
                            };
                            let sender = match connect_sender(
                                session.as_ref(),
                                &connector,
                                &dc_option,
                                &configuration,
                            )
                            .await
                            {
                                Ok(sender) => sender,
                                Err(err) => {
                                    warn!("failed to connect to DC {dc_id}: {err}");
                                    let _ = tx.send(Err(err.into()));
                                    continue;
                                }
                            };

                            let (rpc_tx, rpc_rx) = mpsc::unbounded_channel();
                            connection_pool.spawn(run_sender(
                                sender,
                                dc_id,
                                Arc::clone(&session),
                                rpc_rx,
                                event_tx.clone(),
                            ));
                            connections.push(ConnectionInfo { dc_id, rpc_tx });
                            connections.len() - 1
                        }
                    };

                    if let Err(mpsc::error::SendError(rpc)) =
                        connections[index].rpc_tx.send(Rpc { body, tx })
                    {
                        let _ = rpc.tx.send(Err(InvocationError::Disconnected));
                    }
                }
                Request::Disconnect { dc_id } => {
                    // Dropping the channel stops the `run_sender` loop.
                    connections.retain(|connection| connection.dc_id != dc_id);
                }
                Request::Quit => break,
            }
        }

        connections.clear();
        connection_pool.join_all().await;
    }
}

async fn connect_sender<C: Connector>(
    session: &dyn Session,
    connector: &Arc<C>,
    dc_option: &DcOption,
    configuration: &Configuration,
) -> Result<Sender<Transport, mtp::Encrypted, C>, AuthorizationError> {
    let addr = SocketAddr::from(dc_option.ipv4);

    if let Some(auth_key) = dc_option.auth_key {
        let first_salt = if dc_option.id == session.home_dc_id() {
            session.server_salt()
        } else {
            None
        };
        let sender = connect_with_auth(
            Transport::new(),
            Arc::clone(connector),
            addr,
            auth_key,
            first_salt,
            configuration.clone(),
        )
        .await?;
        return Ok(sender);
    }

    let sender = connect(
        Transport::new(),
        Arc::clone(connector),
        addr,
        dc_option.id,
        configuration.clone(),
    )
    .await?;

    if configuration.temp_key_expires_in.is_none() {
        session.set_auth_key(dc_option.id, Some(sender.auth_key()));
    }
    if dc_option.id == session.home_dc_id() {
        session.set_server_salt(sender.salt());
    }
    Ok(sender)
}

async fn run_sender<C: Connector>(
    mut sender: Sender<Transport, mtp::Encrypted, C>,
    dc_id: i32,
    session: Arc<dyn Session>,
    mut rpc_rx: mpsc::UnboundedReceiver<Rpc>,
    events: mpsc::UnboundedSender<Event>,
) -> Result<(), ReadError> {
    let mut salt = sender.salt();

    let result = loop {
        let rpc = {
            let step = pin!(sender.step());
            let rpc = pin!(rpc_rx.recv());

            match select(step, rpc).await {
                Either::Left((step, _)) => match step {
                    Ok(new_events) => {
                        new_events.into_iter().for_each(|event| {
                            let _ = events.send(event);
                        });
                        None
                    }
                    Err(err) => break Err(err),
                },
                Either::Right((Some(rpc), _)) => Some(rpc),
                Either::Right((None, _)) => break Ok(()),
            }
        };

        if let Some(rpc) = rpc {
            sender.enqueue_body(rpc.body, rpc.tx);
        }
        if sender.salt() != salt {
            salt = sender.salt();
            if dc_id == session.home_dc_id() {
                session.set_server_salt(salt);
            }
        }
    };

    if let Err(ReadError::Transport(transport::Error::BadStatus { status: 404 })) = &result {
        warn!("server forgot the authorization key for DC {dc_id}");
        session.set_auth_key(dc_id, None);
    }

    sender.disconnect();
    rpc_rx.close();
    while let Some(rpc) = rpc_rx.recv().await {
        let _ = rpc.tx.send(Err(InvocationError::Disconnected));
    }
    result
}
