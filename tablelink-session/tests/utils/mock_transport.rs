use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tablelink_core::{ApplicationMessage, DeviceId, IceCandidate, SignalKind};
use tablelink_session::{PeerTransport, SessionError, SessionResult, TransportEvent, TransportFactory};
use tokio::sync::{Mutex, mpsc};

/// Everything a link asked its transport to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    CreateDataChannel(String),
    CreateOffer,
    CreateAnswer,
    SetRemoteDescription(SignalKind, String),
    AddIceCandidate(String),
    Send(String),
    Close,
}

/// Test-side view of one mock transport. Lets a test play the network:
/// inject events and inspect what the link did.
pub struct MockPeer {
    pub remote: DeviceId,
    pub generation: usize,
    events: mpsc::UnboundedSender<TransportEvent>,
    calls: Mutex<Vec<TransportCall>>,
    fail_sends: AtomicBool,
    reject_remote: bool,
    closed: AtomicBool,
}

impl MockPeer {
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    pub fn open_channel(&self) {
        self.emit(TransportEvent::ChannelOpen);
    }

    /// Feeds an application message in as if the remote side sent it.
    pub fn deliver(&self, message: &ApplicationMessage) {
        let text = message.encode().unwrap();
        self.emit(TransportEvent::Message(Bytes::from(text)));
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    pub async fn applied_candidates(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::AddIceCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Messages the link wrote to the channel, decoded.
    pub async fn sent(&self) -> Vec<ApplicationMessage> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Send(text) => ApplicationMessage::decode(text.as_bytes()).ok(),
                _ => None,
            })
            .collect()
    }

    pub async fn sent_kinds(&self) -> Vec<&'static str> {
        self.sent().await.iter().map(|m| m.kind()).collect()
    }

    async fn record(&self, call: TransportCall) {
        self.calls.lock().await.push(call);
    }
}

struct MockTransport {
    peer: Arc<MockPeer>,
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn create_data_channel(&self, label: &str) -> SessionResult<()> {
        self.peer
            .record(TransportCall::CreateDataChannel(label.to_owned()))
            .await;
        Ok(())
    }

    async fn create_offer(&self, _gather_timeout: Duration) -> SessionResult<String> {
        self.peer.record(TransportCall::CreateOffer).await;
        Ok(format!("offer-{}-{}", self.peer.remote, self.peer.generation))
    }

    async fn create_answer(&self, _gather_timeout: Duration) -> SessionResult<String> {
        self.peer.record(TransportCall::CreateAnswer).await;
        Ok(format!("answer-{}-{}", self.peer.remote, self.peer.generation))
    }

    async fn set_remote_description(&self, kind: SignalKind, sdp: String) -> SessionResult<()> {
        self.peer
            .record(TransportCall::SetRemoteDescription(kind, sdp))
            .await;
        if self.peer.reject_remote {
            return Err(SessionError::Negotiation("malformed description".to_owned()));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> SessionResult<()> {
        self.peer
            .record(TransportCall::AddIceCandidate(candidate.candidate))
            .await;
        Ok(())
    }

    async fn send(&self, text: String) -> SessionResult<()> {
        if self.peer.fail_sends.load(Ordering::SeqCst) {
            return Err(SessionError::Channel("injected send failure".to_owned()));
        }
        self.peer.record(TransportCall::Send(text)).await;
        Ok(())
    }

    async fn close(&self) {
        self.peer.closed.store(true, Ordering::SeqCst);
        self.peer.record(TransportCall::Close).await;
    }
}

/// Factory handing out mock transports and reporting each one to the test.
#[derive(Clone)]
pub struct MockTransportFactory {
    created: mpsc::UnboundedSender<Arc<MockPeer>>,
    generation: Arc<AtomicUsize>,
    reject_remote: Arc<AtomicBool>,
}

impl MockTransportFactory {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Arc<MockPeer>>) {
        let (created, rx) = mpsc::unbounded_channel();
        let factory = Self {
            created,
            generation: Arc::new(AtomicUsize::new(0)),
            reject_remote: Arc::new(AtomicBool::new(false)),
        };
        (factory, rx)
    }

    /// Transports built from now on refuse every remote description.
    pub fn reject_remote_descriptions(&self, reject: bool) {
        self.reject_remote.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn connect(
        &self,
        remote: &DeviceId,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> SessionResult<Box<dyn PeerTransport>> {
        let peer = Arc::new(MockPeer {
            remote: remote.clone(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst),
            events,
            calls: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            reject_remote: self.reject_remote.load(Ordering::SeqCst),
            closed: AtomicBool::new(false),
        });
        let _ = self.created.send(peer.clone());
        Ok(Box::new(MockTransport { peer }))
    }
}
