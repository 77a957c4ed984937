//! Session Event Process
//!
//! A named, single-consumer loop that serializes session start/end events
//! from any number of producers and drives the session-state handler.
//!
//! Producers (network I/O threads, no runtime needed) enqueue under the
//! network event mutex. The loop owns the [`SessionRegistry`] and handles
//! one event to completion before yielding, so the registry needs no lock.
//!
//! The bounded queue carries session events only. Flushes and registry
//! queries travel on a separate control channel and never take event slots.

use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::error::{SessionError, SessionResult};
use super::events::{Diagnostic, DiagnosticEmitter, SessionEvent};
use super::observer::{NamedObserver, SessionObserver, SubscriberId, SubscriberList};
use super::registry::{Dispatch, SessionRegistry};
use super::state::{SessionInfo, SessionState, Transition};
use crate::config::SessionEventsConfig;
use crate::endpoint::Endpoint;
use crate::network::NetworkEventMutex;

/// Requests answered by the process loop from its registry
#[derive(Debug)]
enum Control {
    Flush(oneshot::Sender<()>),
    Sessions(oneshot::Sender<Vec<SessionInfo>>),
    Session(Endpoint, oneshot::Sender<Option<SessionInfo>>),
}

/// Senders into a running process
#[derive(Debug, Clone)]
struct Queues {
    events: mpsc::Sender<SessionEvent>,
    control: mpsc::UnboundedSender<Control>,
}

/// Session event process
pub struct SessionEventProcess {
    config: SessionEventsConfig,
    /// Lock shared with the network layer
    network_mutex: NetworkEventMutex,
    /// Observers in registration order
    subscribers: Arc<SubscriberList>,
    /// Process-wide diagnostic channel
    diagnostics: DiagnosticEmitter,
    /// Queue senders; `None` while the process is stopped
    sender: RwLock<Option<Queues>>,
    /// Loop task, resolving to the number of sessions live at teardown
    task: Mutex<Option<JoinHandle<usize>>>,
}

impl SessionEventProcess {
    /// Create a stopped process
    pub fn new(config: SessionEventsConfig) -> SessionResult<Self> {
        config.validate()?;
        Ok(Self::with_validated(config))
    }

    fn with_validated(config: SessionEventsConfig) -> Self {
        let diagnostics = DiagnosticEmitter::new(config.diagnostics_capacity);

        Self {
            config,
            network_mutex: NetworkEventMutex::new(),
            subscribers: Arc::new(SubscriberList::new()),
            diagnostics,
            sender: RwLock::new(None),
            task: Mutex::new(None),
        }
    }

    /// Share the network layer's mutex instead of a private one
    pub fn with_network_mutex(mut self, mutex: NetworkEventMutex) -> Self {
        self.network_mutex = mutex;
        self
    }

    /// Stable name of the process
    pub fn process_name(&self) -> &str {
        &self.config.process_name
    }

    pub fn config(&self) -> &SessionEventsConfig {
        &self.config
    }

    /// Mutex the network layer must hold while reporting events
    pub fn network_mutex(&self) -> &NetworkEventMutex {
        &self.network_mutex
    }

    /// Start the loop on the current tokio runtime
    pub fn spawn(&self) -> SessionResult<()> {
        let runtime = Handle::try_current()
            .map_err(|_| SessionError::NoRuntime(self.config.process_name.clone()))?;

        let mut sender = self.sender.write();
        if sender.is_some() {
            return Err(SessionError::ProcessAlreadyRunning(self.config.process_name.clone()));
        }

        let (events_tx, events_rx) = mpsc::channel(self.config.queue_capacity);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let handle = runtime.spawn(run(
            self.config.process_name.clone(),
            self.config.queue_capacity,
            events_rx,
            control_rx,
            self.subscribers.clone(),
            self.diagnostics.clone(),
        ));

        *sender = Some(Queues {
            events: events_tx,
            control: control_tx,
        });
        *self.task.lock() = Some(handle);

        info!(
            "Started session event process {} (queue capacity {})",
            self.config.process_name, self.config.queue_capacity
        );
        Ok(())
    }

    /// Check if the process accepts events
    pub fn is_running(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Report that a transport session started for `endpoint`
    ///
    /// Failures are published on the diagnostic channel, never returned.
    pub fn start(&self, endpoint: &Endpoint) {
        let _ = self.try_start(endpoint);
    }

    /// Report that a transport session ended for `endpoint`
    ///
    /// The endpoint need not have a live session.
    pub fn end(&self, endpoint: &Endpoint) {
        let _ = self.try_end(endpoint);
    }

    /// Like [`start`](Self::start), also returning the enqueue outcome
    pub fn try_start(&self, endpoint: &Endpoint) -> SessionResult<()> {
        self.submit(SessionEvent::connected(*endpoint))
    }

    /// Like [`end`](Self::end), also returning the enqueue outcome
    pub fn try_end(&self, endpoint: &Endpoint) -> SessionResult<()> {
        self.submit(SessionEvent::disconnected(*endpoint))
    }

    fn submit(&self, event: SessionEvent) -> SessionResult<()> {
        let result = self.enqueue(event);
        if let Err(e) = &result {
            self.report(e, &event);
        }
        result
    }

    fn enqueue(&self, event: SessionEvent) -> SessionResult<()> {
        event
            .endpoint
            .validate(self.config.require_connection_oriented)?;

        let _guard = self.network_mutex.lock();
        let sender = self.sender.read();
        let queues = sender
            .as_ref()
            .ok_or_else(|| SessionError::ProcessNotRunning(self.config.process_name.clone()))?;

        queues.events.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => SessionError::QueueFull {
                endpoint: event.endpoint.to_string(),
                state: event.state,
                capacity: self.config.queue_capacity,
            },
            TrySendError::Closed(_) => {
                SessionError::ProcessNotRunning(self.config.process_name.clone())
            }
        })?;

        debug!("Queued {} for {}", event.state, event.endpoint);
        Ok(())
    }

    fn report(&self, err: &SessionError, event: &SessionEvent) {
        let diagnostic = match err {
            SessionError::InvalidEndpoint { endpoint, reason } => Diagnostic::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: reason.clone(),
            },
            SessionError::QueueFull {
                endpoint,
                state,
                capacity,
            } => Diagnostic::QueueFull {
                endpoint: endpoint.clone(),
                state: *state,
                capacity: *capacity,
            },
            SessionError::ProcessNotRunning(process) => Diagnostic::ProcessNotRunning {
                process: process.clone(),
                endpoint: event.endpoint.to_string(),
                state: event.state,
            },
            other => {
                error!("Unexpected error queueing {} for {}: {}", event.state, event.endpoint, other);
                return;
            }
        };
        self.diagnostics.emit(diagnostic);
    }

    /// Register an observer for every future transition
    pub fn subscribe<O: SessionObserver + 'static>(&self, observer: O) -> SubscriberId {
        self.subscribe_arc(Arc::new(observer))
    }

    /// Register an observer under a name used in logs
    pub fn subscribe_named<O: SessionObserver + 'static>(
        &self,
        name: impl Into<String>,
        observer: O,
    ) -> SubscriberId {
        self.subscribe(NamedObserver::new(name, observer))
    }

    /// Register a shared observer
    pub fn subscribe_arc(&self, observer: Arc<dyn SessionObserver>) -> SubscriberId {
        let name = observer.name().to_string();
        let id = self.subscribers.register(observer);
        debug!("Registered session observer {} as {}", name, id);
        id
    }

    /// Remove an observer; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.unregister(id);
        if removed {
            debug!("Removed session observer {}", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Listen to the process-wide diagnostic channel
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Control) -> SessionResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let stopped = || SessionError::ProcessStopped(self.config.process_name.clone());

        {
            let sender = self.sender.read();
            let queues = sender
                .as_ref()
                .ok_or_else(|| SessionError::ProcessNotRunning(self.config.process_name.clone()))?;
            queues.control.send(make(reply_tx)).map_err(|_| stopped())?;
        }

        reply_rx.await.map_err(|_| stopped())
    }

    /// Wait until every event queued before this call has been handled
    pub async fn flush(&self) -> SessionResult<()> {
        self.request(Control::Flush).await
    }

    /// Snapshot of all tracked sessions
    pub async fn sessions(&self) -> SessionResult<Vec<SessionInfo>> {
        self.request(Control::Sessions).await
    }

    /// Session tracked for one endpoint
    pub async fn session(&self, endpoint: &Endpoint) -> SessionResult<Option<SessionInfo>> {
        let endpoint = *endpoint;
        self.request(move |reply| Control::Session(endpoint, reply)).await
    }

    /// Check whether an endpoint has a live session
    pub async fn is_connected(&self, endpoint: &Endpoint) -> SessionResult<bool> {
        Ok(self.session(endpoint).await?.is_some())
    }

    /// Stop accepting events, deliver the ones already queued, drop the registry
    ///
    /// Returns the number of sessions still connected at teardown.
    pub async fn shutdown(&self) -> SessionResult<usize> {
        let sender = self.sender.write().take();
        if sender.is_none() {
            return Err(SessionError::ProcessNotRunning(self.config.process_name.clone()));
        }
        drop(sender);

        info!("Stopping session event process {}", self.config.process_name);

        let task = self.task.lock().take();
        match task {
            Some(handle) => handle
                .await
                .map_err(|e| SessionError::ProcessStopped(format!("{}: {}", self.config.process_name, e))),
            None => Ok(0),
        }
    }
}

impl Default for SessionEventProcess {
    fn default() -> Self {
        Self::with_validated(SessionEventsConfig::default())
    }
}

/// Handle one dequeued event: update the registry, then fan out
pub fn handle_session(
    registry: &mut SessionRegistry,
    subscribers: &SubscriberList,
    diagnostics: &DiagnosticEmitter,
    endpoint: &Endpoint,
    state: SessionState,
) -> Dispatch {
    let dispatch = registry.handle(endpoint, state, &subscribers.snapshot());

    if dispatch.transition == Transition::Ignored {
        diagnostics.emit(Diagnostic::TransitionIgnored {
            endpoint: endpoint.to_string(),
            state,
        });
    }

    dispatch
}

async fn run(
    name: String,
    capacity: usize,
    mut events: mpsc::Receiver<SessionEvent>,
    mut control: mpsc::UnboundedReceiver<Control>,
    subscribers: Arc<SubscriberList>,
    diagnostics: DiagnosticEmitter,
) -> usize {
    let mut registry = SessionRegistry::new();
    let mut control_open = true;

    loop {
        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(event) = event else { break };
                handle_session(&mut registry, &subscribers, &diagnostics, &event.endpoint, event.state);
                tokio::task::yield_now().await;
            }

            request = control.recv(), if control_open => {
                let Some(request) = request else {
                    control_open = false;
                    continue;
                };
                drain(&mut registry, &mut events, capacity, &subscribers, &diagnostics);
                answer(&registry, request);
            }
        }
    }

    // event queue closed: answer whatever is still waiting
    while let Ok(request) = control.try_recv() {
        answer(&registry, request);
    }

    let live = registry.len();
    info!("Session event process {} stopped ({} live sessions)", name, live);
    live
}

/// Handle events already queued when a control request arrived.
///
/// The queue never holds more than `capacity` events, so stopping there
/// covers everything enqueued before the request.
fn drain(
    registry: &mut SessionRegistry,
    events: &mut mpsc::Receiver<SessionEvent>,
    capacity: usize,
    subscribers: &SubscriberList,
    diagnostics: &DiagnosticEmitter,
) {
    for _ in 0..capacity {
        match events.try_recv() {
            Ok(event) => {
                handle_session(registry, subscribers, diagnostics, &event.endpoint, event.state);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
}

fn answer(registry: &SessionRegistry, request: Control) {
    match request {
        Control::Flush(reply) => {
            let _ = reply.send(());
        }
        Control::Sessions(reply) => {
            let _ = reply.send(registry.snapshot());
        }
        Control::Session(endpoint, reply) => {
            let _ = reply.send(registry.get(&endpoint).map(SessionInfo::from));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::TransportFlags;
    use std::collections::HashMap;

    type Log = Arc<Mutex<Vec<(&'static str, SessionState, Endpoint)>>>;

    fn ep(last: u8) -> Endpoint {
        Endpoint::tcp(format!("192.168.1.{}:5683", last).parse().unwrap())
    }

    fn recorder(name: &'static str, log: &Log) -> impl SessionObserver + 'static {
        let log = log.clone();
        NamedObserver::new(name, move |endpoint: &Endpoint, state: SessionState| -> anyhow::Result<()> {
            log.lock().push((name, state, *endpoint));
            Ok(())
        })
    }

    fn process_with_capacity(queue_capacity: usize) -> SessionEventProcess {
        SessionEventProcess::new(SessionEventsConfig {
            queue_capacity,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_delivery_order_across_endpoints() {
        let process = SessionEventProcess::default();
        let log: Log = Arc::default();
        process.subscribe(recorder("s1", &log));
        process.subscribe(recorder("s2", &log));
        process.spawn().unwrap();

        let (e1, e2) = (ep(1), ep(2));
        process.start(&e1);
        process.start(&e2);
        process.end(&e1);
        process.end(&e2);
        process.flush().await.unwrap();

        use SessionState::{Connected, Disconnected};
        let expected = vec![
            ("s1", Connected, e1),
            ("s2", Connected, e1),
            ("s1", Connected, e2),
            ("s2", Connected, e2),
            ("s1", Disconnected, e1),
            ("s2", Disconnected, e1),
            ("s1", Disconnected, e2),
            ("s2", Disconnected, e2),
        ];
        assert_eq!(*log.lock(), expected);
        assert!(process.sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_end_without_start_is_silent() {
        let process = SessionEventProcess::default();
        let log: Log = Arc::default();
        process.subscribe(recorder("s1", &log));
        let mut diagnostics = process.diagnostics();
        process.spawn().unwrap();

        process.start(&ep(1));
        assert!(process.try_end(&ep(3)).is_ok());
        process.flush().await.unwrap();

        assert_eq!(log.lock().len(), 1);
        let sessions = process.sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].endpoint, ep(1).to_string());

        assert_eq!(
            diagnostics.try_recv().unwrap(),
            Diagnostic::TransitionIgnored {
                endpoint: ep(3).to_string(),
                state: SessionState::Disconnected,
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_start_refreshes() {
        let process = SessionEventProcess::default();
        let log: Log = Arc::default();
        process.subscribe(recorder("s1", &log));
        process.spawn().unwrap();

        process.start(&ep(1));
        process.flush().await.unwrap();
        let first = process.session(&ep(1)).await.unwrap().unwrap();

        process.start(&ep(1));
        process.flush().await.unwrap();
        let second = process.session(&ep(1)).await.unwrap().unwrap();

        assert_eq!(log.lock().len(), 1);
        assert_eq!(first.session_id, second.session_id);
        assert!(second.sequence > first.sequence);
        assert_eq!(second.refreshes, 1);
    }

    #[tokio::test]
    async fn test_subscriber_order_is_deterministic() {
        let mut runs = Vec::new();

        for _ in 0..3 {
            let process = SessionEventProcess::default();
            let log: Log = Arc::default();
            for name in ["observe", "blockwise", "transactions", "security"] {
                process.subscribe(recorder(name, &log));
            }
            process.spawn().unwrap();
            process.start(&ep(1));
            process.end(&ep(1));
            process.flush().await.unwrap();
            process.shutdown().await.unwrap();

            let names: Vec<_> = log.lock().iter().map(|(n, s, _)| (*n, *s)).collect();
            runs.push(names);
        }

        assert_eq!(runs[0].len(), 8);
        assert_eq!(runs[0][0], ("observe", SessionState::Connected));
        assert_eq!(runs[0][3], ("security", SessionState::Connected));
        assert_eq!(runs[0], runs[1]);
        assert_eq!(runs[1], runs[2]);
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_block_others() {
        let process = SessionEventProcess::default();
        let log: Log = Arc::default();
        process.subscribe_named("broken", |_: &Endpoint, _: SessionState| -> anyhow::Result<()> {
            anyhow::bail!("cannot release security context")
        });
        process.subscribe(recorder("s2", &log));
        process.spawn().unwrap();

        process.start(&ep(1));
        process.flush().await.unwrap();
        assert!(process.is_connected(&ep(1)).await.unwrap());

        process.end(&ep(1));
        process.flush().await.unwrap();
        assert!(!process.is_connected(&ep(1)).await.unwrap());
        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let process = SessionEventProcess::default();
        let log: Log = Arc::default();
        let s1 = process.subscribe(recorder("s1", &log));
        process.subscribe(recorder("s2", &log));
        process.spawn().unwrap();

        process.start(&ep(1));
        process.flush().await.unwrap();
        assert!(process.unsubscribe(s1));
        assert!(!process.unsubscribe(s1));
        assert_eq!(process.subscriber_count(), 1);

        process.end(&ep(1));
        process.flush().await.unwrap();

        let names: Vec<_> = log.lock().iter().map(|(n, s, _)| (*n, *s)).collect();
        assert_eq!(
            names,
            vec![
                ("s1", SessionState::Connected),
                ("s2", SessionState::Connected),
                ("s2", SessionState::Disconnected),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_producers_keep_per_endpoint_order() {
        const PRODUCERS: u8 = 8;
        const CYCLES: usize = 50;

        let process = Arc::new(process_with_capacity(PRODUCERS as usize * CYCLES * 2));
        let log: Log = Arc::default();
        process.subscribe(recorder("s1", &log));
        process.spawn().unwrap();

        let producers: Vec<_> = (1..=PRODUCERS)
            .map(|i| {
                let process = process.clone();
                std::thread::spawn(move || {
                    for _ in 0..CYCLES {
                        process.start(&ep(i));
                        process.end(&ep(i));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        process.flush().await.unwrap();

        let mut per_endpoint: HashMap<Endpoint, Vec<SessionState>> = HashMap::new();
        for (_, state, endpoint) in log.lock().iter() {
            per_endpoint.entry(*endpoint).or_default().push(*state);
        }

        assert_eq!(per_endpoint.len(), PRODUCERS as usize);
        for states in per_endpoint.values() {
            assert_eq!(states.len(), CYCLES * 2);
            for pair in states.chunks(2) {
                assert_eq!(pair, [SessionState::Connected, SessionState::Disconnected]);
            }
        }
        assert!(process.sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rapid_reconnects_are_all_delivered() {
        let process = SessionEventProcess::default();
        let log: Log = Arc::default();
        process.subscribe(recorder("s1", &log));
        process.spawn().unwrap();

        for _ in 0..2 {
            process.start(&ep(1));
            process.end(&ep(1));
        }
        process.flush().await.unwrap();

        let states: Vec<_> = log.lock().iter().map(|(_, s, _)| *s).collect();
        assert_eq!(
            states,
            vec![
                SessionState::Connected,
                SessionState::Disconnected,
                SessionState::Connected,
                SessionState::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_queue_full_drops_with_diagnostic() {
        let process = process_with_capacity(1);
        let log: Log = Arc::default();
        process.subscribe(recorder("s1", &log));
        let mut diagnostics = process.diagnostics();
        process.spawn().unwrap();

        // the loop cannot run before this task yields
        assert!(process.try_start(&ep(1)).is_ok());
        assert!(matches!(
            process.try_start(&ep(2)),
            Err(SessionError::QueueFull { capacity: 1, .. })
        ));
        process.flush().await.unwrap();

        assert_eq!(log.lock().len(), 1);
        assert!(matches!(
            diagnostics.try_recv().unwrap(),
            Diagnostic::QueueFull { capacity: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_pending_query_leaves_event_queue_free() {
        let process = process_with_capacity(1);
        let log: Log = Arc::default();
        process.subscribe(recorder("s1", &log));
        process.spawn().unwrap();

        let flush = process.flush();
        tokio::pin!(flush);
        assert!(futures::poll!(&mut flush).is_pending());

        let endpoint = Endpoint::tcp("10.0.0.1:5683".parse().unwrap());
        assert!(process.try_start(&endpoint).is_ok());

        let sessions = process.sessions();
        tokio::pin!(sessions);
        assert!(futures::poll!(&mut sessions).is_pending());
        assert!(matches!(
            process.try_end(&endpoint),
            Err(SessionError::QueueFull { capacity: 1, .. })
        ));

        flush.await.unwrap();
        assert_eq!(sessions.await.unwrap().len(), 1);
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_waits_for_earlier_events() {
        let process = process_with_capacity(4);
        let log: Log = Arc::default();
        process.subscribe(recorder("s1", &log));
        process.spawn().unwrap();

        for last in 1..=4 {
            process.start(&ep(last));
        }
        process.flush().await.unwrap();

        assert_eq!(log.lock().len(), 4);
        assert_eq!(process.sessions().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_panicking_subscriber_does_not_stop_loop() {
        let process = SessionEventProcess::default();
        let log: Log = Arc::default();
        process.subscribe_named("panicky", |_: &Endpoint, _: SessionState| -> anyhow::Result<()> {
            panic!("observer bug")
        });
        process.subscribe(recorder("s2", &log));
        process.spawn().unwrap();

        process.start(&ep(1));
        process.end(&ep(1));
        process.start(&ep(2));
        process.flush().await.unwrap();

        assert!(process.is_running());
        assert!(process.is_connected(&ep(2)).await.unwrap());
        assert!(!process.is_connected(&ep(1)).await.unwrap());

        let delivered: Vec<_> = log.lock().iter().map(|(n, s, e)| (*n, *s, *e)).collect();
        assert_eq!(
            delivered,
            vec![
                ("s2", SessionState::Connected, ep(1)),
                ("s2", SessionState::Disconnected, ep(1)),
                ("s2", SessionState::Connected, ep(2)),
            ]
        );
        assert_eq!(process.shutdown().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_endpoint_rejected() {
        let process = SessionEventProcess::default();
        let log: Log = Arc::default();
        process.subscribe(recorder("s1", &log));
        let mut diagnostics = process.diagnostics();
        process.spawn().unwrap();

        let udp = Endpoint::new("192.168.1.1:5683".parse().unwrap(), TransportFlags::NONE);
        process.start(&udp);
        process.end(&Endpoint::tcp("192.168.1.1:0".parse().unwrap()));
        process.flush().await.unwrap();

        assert!(log.lock().is_empty());
        assert!(matches!(diagnostics.try_recv().unwrap(), Diagnostic::InvalidEndpoint { .. }));
        assert!(matches!(diagnostics.try_recv().unwrap(), Diagnostic::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_events_while_stopped_are_dropped() {
        let process = SessionEventProcess::default();
        let mut diagnostics = process.diagnostics();

        assert!(!process.is_running());
        process.start(&ep(1));
        assert!(matches!(
            diagnostics.try_recv().unwrap(),
            Diagnostic::ProcessNotRunning { .. }
        ));
        assert!(matches!(
            process.sessions().await,
            Err(SessionError::ProcessNotRunning(_))
        ));
        assert!(matches!(
            process.shutdown().await,
            Err(SessionError::ProcessNotRunning(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_delivers_pending_events() {
        let process = SessionEventProcess::default();
        let log: Log = Arc::default();
        process.subscribe(recorder("s1", &log));
        process.spawn().unwrap();
        assert!(matches!(
            process.spawn(),
            Err(SessionError::ProcessAlreadyRunning(_))
        ));

        process.start(&ep(1));
        process.start(&ep(2));
        process.start(&ep(3));
        process.end(&ep(3));

        let live = process.shutdown().await.unwrap();
        assert_eq!(live, 2);
        assert_eq!(log.lock().len(), 4);
        assert!(!process.is_running());

        assert!(matches!(
            process.try_start(&ep(4)),
            Err(SessionError::ProcessNotRunning(_))
        ));

        // a restarted process begins with an empty registry
        process.spawn().unwrap();
        assert!(process.sessions().await.unwrap().is_empty());
        process.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_caller_may_hold_network_mutex() {
        let process = SessionEventProcess::default()
            .with_network_mutex(NetworkEventMutex::new());
        process.spawn().unwrap();

        {
            let _guard = process.network_mutex().lock();
            process.start(&ep(1));
        }
        process.flush().await.unwrap();
        assert!(process.is_connected(&ep(1)).await.unwrap());
    }

    #[test]
    fn test_spawn_requires_runtime() {
        let process = SessionEventProcess::default();
        assert!(matches!(process.spawn(), Err(SessionError::NoRuntime(_))));
        assert!(!process.is_running());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = SessionEventProcess::new(SessionEventsConfig {
            queue_capacity: 0,
            ..Default::default()
        });
        assert!(matches!(result, Err(SessionError::Config(_))));
    }
}
