use super::{HubMetrics, HubQuery, RoomRequest, RoomSummary, Stamped};
use crate::client::{Client, ClientId};
use crate::message::Message;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info};

/// One mailbox with a single-item lookahead slot
struct Inbox<T> {
    rx: mpsc::Receiver<Stamped<T>>,
    head: Option<Stamped<T>>,
    open: bool,
}

impl<T> Inbox<T> {
    fn new(rx: mpsc::Receiver<Stamped<T>>) -> Self {
        Self {
            rx,
            head: None,
            open: true,
        }
    }

    /// Pull the next request into the slot without waiting.
    fn fill(&mut self) {
        if self.head.is_some() || !self.open {
            return;
        }
        match self.rx.try_recv() {
            Ok(request) => self.head = Some(request),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.open = false,
        }
    }

    fn head_seq(&self) -> Option<u64> {
        self.head.as_ref().map(|request| request.seq)
    }

    fn take(&mut self) -> Option<T> {
        self.head.take().map(|request| request.body)
    }

    fn accept(&mut self, received: Option<Stamped<T>>) {
        match received {
            Some(request) => self.head = Some(request),
            None => self.open = false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Mailbox {
    Register,
    Unregister,
    JoinRoom,
    LeaveRoom,
    Broadcast,
    Query,
}

/// Sole owner of the client registry and the room index.
///
/// Consumes the hub's mailboxes one request at a time. Nothing outside this
/// loop mutates `clients` or `rooms`, so neither needs a lock.
pub struct Dispatcher {
    register: Inbox<Arc<Client>>,
    unregister: Inbox<ClientId>,
    join: Inbox<RoomRequest>,
    leave: Inbox<RoomRequest>,
    broadcast: Inbox<Message>,
    query: Inbox<HubQuery>,
    clients: HashMap<ClientId, Arc<Client>>,
    rooms: HashMap<String, HashSet<ClientId>>,
    metrics: HubMetrics,
}

impl Dispatcher {
    pub(crate) fn new(
        register_rx: mpsc::Receiver<Stamped<Arc<Client>>>,
        unregister_rx: mpsc::Receiver<Stamped<ClientId>>,
        join_rx: mpsc::Receiver<Stamped<RoomRequest>>,
        leave_rx: mpsc::Receiver<Stamped<RoomRequest>>,
        broadcast_rx: mpsc::Receiver<Stamped<Message>>,
        query_rx: mpsc::Receiver<Stamped<HubQuery>>,
        metrics: HubMetrics,
    ) -> Self {
        Self {
            register: Inbox::new(register_rx),
            unregister: Inbox::new(unregister_rx),
            join: Inbox::new(join_rx),
            leave: Inbox::new(leave_rx),
            broadcast: Inbox::new(broadcast_rx),
            query: Inbox::new(query_rx),
            clients: HashMap::new(),
            rooms: HashMap::new(),
            metrics,
        }
    }

    /// Run until every hub handle (and therefore every mailbox) is gone.
    pub async fn run(mut self) {
        info!("Hub dispatcher started");

        loop {
            self.fill_all();
            match self.oldest_ready() {
                Some(mailbox) => self.dispatch(mailbox),
                None => {
                    if !self.wait_for_request().await {
                        break;
                    }
                }
            }
        }

        info!("Hub dispatcher stopped");
    }

    fn fill_all(&mut self) {
        self.register.fill();
        self.unregister.fill();
        self.join.fill();
        self.leave.fill();
        self.broadcast.fill();
        self.query.fill();
    }

    /// Mailbox whose head request was submitted first
    fn oldest_ready(&self) -> Option<Mailbox> {
        [
            (Mailbox::Register, self.register.head_seq()),
            (Mailbox::Unregister, self.unregister.head_seq()),
            (Mailbox::JoinRoom, self.join.head_seq()),
            (Mailbox::LeaveRoom, self.leave.head_seq()),
            (Mailbox::Broadcast, self.broadcast.head_seq()),
            (Mailbox::Query, self.query.head_seq()),
        ]
        .into_iter()
        .filter_map(|(mailbox, seq)| seq.map(|seq| (seq, mailbox)))
        .min_by_key(|(seq, _)| *seq)
        .map(|(_, mailbox)| mailbox)
    }

    /// Block until any mailbox yields a request. Returns false once all are closed.
    async fn wait_for_request(&mut self) -> bool {
        tokio::select! {
            received = self.register.rx.recv(), if self.register.open => {
                self.register.accept(received)
            }
            received = self.unregister.rx.recv(), if self.unregister.open => {
                self.unregister.accept(received)
            }
            received = self.join.rx.recv(), if self.join.open => {
                self.join.accept(received)
            }
            received = self.leave.rx.recv(), if self.leave.open => {
                self.leave.accept(received)
            }
            received = self.broadcast.rx.recv(), if self.broadcast.open => {
                self.broadcast.accept(received)
            }
            received = self.query.rx.recv(), if self.query.open => {
                self.query.accept(received)
            }
            else => return false,
        }
        true
    }

    fn dispatch(&mut self, mailbox: Mailbox) {
        match mailbox {
            Mailbox::Register => {
                if let Some(client) = self.register.take() {
                    self.handle_register(client);
                }
            }
            Mailbox::Unregister => {
                if let Some(client_id) = self.unregister.take() {
                    self.handle_unregister(&client_id);
                }
            }
            Mailbox::JoinRoom => {
                if let Some(request) = self.join.take() {
                    self.handle_join_room(request);
                }
            }
            Mailbox::LeaveRoom => {
                if let Some(request) = self.leave.take() {
                    self.handle_leave_room(request);
                }
            }
            Mailbox::Broadcast => {
                if let Some(msg) = self.broadcast.take() {
                    self.handle_broadcast(msg);
                }
            }
            Mailbox::Query => {
                if let Some(query) = self.query.take() {
                    self.handle_query(query);
                }
            }
        }
    }

    fn handle_register(&mut self, client: Arc<Client>) {
        if client.is_closed() {
            debug!(client_id = %client.id(), "Ignoring registration of closed client");
            return;
        }

        info!(client_id = %client.id(), user_id = client.user_id(), "Client registered");
        self.clients.insert(client.id().to_string(), client);
        self.metrics.set_connected_clients(self.clients.len());
    }

    fn handle_unregister(&mut self, client_id: &str) {
        let Some(client) = self.clients.remove(client_id) else {
            debug!(client_id = %client_id, "Unregister for unknown client");
            return;
        };

        for room in client.rooms() {
            self.remove_member(&room, client_id);
            client.remove_room(&room);
        }
        client.close();

        self.metrics.set_connected_clients(self.clients.len());
        self.metrics.set_rooms(self.rooms.len());
        info!(client_id = %client_id, "Client unregistered");
    }

    fn handle_join_room(&mut self, request: RoomRequest) {
        let RoomRequest { client, room } = request;
        // Covers both never-registered and already-unregistered clients;
        // only registered clients can be cleaned up by a later unregister.
        if !self.clients.contains_key(client.id()) {
            debug!(client_id = %client.id(), room = %room, "Ignoring join for unregistered client");
            return;
        }

        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(client.id().to_string());
        client.add_room(&room);
        self.metrics.set_rooms(self.rooms.len());

        debug!(client_id = %client.id(), room = %room, "Client joined room");
        client.send(Message::ack("subscribed", &room));
    }

    fn handle_leave_room(&mut self, request: RoomRequest) {
        let RoomRequest { client, room } = request;

        self.remove_member(&room, client.id());
        client.remove_room(&room);
        self.metrics.set_rooms(self.rooms.len());

        debug!(client_id = %client.id(), room = %room, "Client left room");
        client.send(Message::ack("unsubscribed", &room));
    }

    fn handle_broadcast(&mut self, msg: Message) {
        self.metrics.record_published();
        debug!(
            message_id = %msg.id,
            user_id = msg.user_id,
            recipients = self.clients.len(),
            "Broadcasting message"
        );

        for client in self.clients.values() {
            client.send(msg.clone());
        }
    }

    fn handle_query(&self, query: HubQuery) {
        // A dropped reply receiver just means the caller gave up waiting
        match query {
            HubQuery::ClientCount(reply) => {
                let _ = reply.send(self.clients.len());
            }
            HubQuery::RoomMembers { room, reply } => {
                let members = self.rooms.get(&room).cloned().unwrap_or_default();
                let _ = reply.send(members);
            }
            HubQuery::Rooms(reply) => {
                let mut rooms: Vec<RoomSummary> = self
                    .rooms
                    .iter()
                    .map(|(room, members)| RoomSummary {
                        room: room.clone(),
                        members: members.len(),
                    })
                    .collect();
                rooms.sort_by(|a, b| a.room.cmp(&b.room));
                let _ = reply.send(rooms);
            }
        }
    }

    /// Remove one member, deleting the room once it is empty.
    fn remove_member(&mut self, room: &str, client_id: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(client_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn try_take_broadcast(&mut self) -> Option<Message> {
        self.broadcast.fill();
        self.broadcast.take()
    }

    #[cfg(test)]
    pub(crate) fn try_take_join(&mut self) -> Option<RoomRequest> {
        self.join.fill();
        self.join.take()
    }

    #[cfg(test)]
    pub(crate) fn try_take_leave(&mut self) -> Option<RoomRequest> {
        self.leave.fill();
        self.leave.take()
    }
}
