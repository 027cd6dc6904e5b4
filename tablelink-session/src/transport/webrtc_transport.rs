use crate::error::{SessionError, SessionResult};
use crate::transport::{PeerTransport, TransportEvent, TransportFactory};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tablelink_core::{DeviceId, IceCandidate, IceServerConfig, SignalKind};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

type ChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;

/// Builds `WebrtcTransport`s with a fixed set of ICE servers.
#[derive(Debug, Clone, Default)]
pub struct WebrtcTransportFactory {
    ice_servers: Vec<IceServerConfig>,
}

impl WebrtcTransportFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }
}

#[async_trait]
impl TransportFactory for WebrtcTransportFactory {
    async fn connect(
        &self,
        remote: &DeviceId,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> SessionResult<Box<dyn PeerTransport>> {
        let transport = WebrtcTransport::new(remote.clone(), &self.ice_servers, events)
            .await
            .map_err(SessionError::negotiation)?;
        Ok(Box::new(transport))
    }
}

pub struct WebrtcTransport {
    remote: DeviceId,
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: ChannelSlot,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl WebrtcTransport {
    pub async fn new(
        remote: DeviceId,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> anyhow::Result<Self> {
        // Codecs are registered even though only a data channel is used.
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("creating peer connection")?,
        );
        let data_channel: ChannelSlot = Arc::new(Mutex::new(None));

        let state_tx = events.clone();
        let state_remote = remote.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let remote = state_remote.clone();

                Box::pin(async move {
                    info!(peer = %remote, state = ?s, "peer connection state changed");
                    let event = match s {
                        RTCPeerConnectionState::Connected => TransportEvent::PathConnected,
                        RTCPeerConnectionState::Disconnected => TransportEvent::PathDisconnected,
                        RTCPeerConnectionState::Failed => TransportEvent::PathFailed,
                        _ => return,
                    };
                    let _ = tx.send(event);
                })
            },
        ));

        // Trickle ICE: every local candidate goes out through the mailbox.
        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx.send(TransportEvent::LocalCandidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                }));
            })
        }));

        // The answering side receives the channel instead of creating it.
        let dc_tx = events.clone();
        let dc_slot = data_channel.clone();
        let dc_remote = remote.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let slot = dc_slot.clone();
            let remote = dc_remote.clone();

            Box::pin(async move {
                debug!(peer = %remote, label = dc.label(), "remote data channel announced");
                wire_channel(&dc, tx);
                *slot.lock().await = Some(dc);
            })
        }));

        Ok(Self {
            remote,
            peer_connection,
            data_channel,
            events,
        })
    }

    async fn apply_local(
        &self,
        description: RTCSessionDescription,
        gather_timeout: Duration,
    ) -> SessionResult<String> {
        let mut gathered = self.peer_connection.gathering_complete_promise().await;
        self.peer_connection
            .set_local_description(description)
            .await
            .map_err(SessionError::negotiation)?;

        if tokio::time::timeout(gather_timeout, gathered.recv())
            .await
            .is_err()
        {
            warn!(peer = %self.remote, "candidate gathering timed out, sending partial description");
        }

        let description = self
            .peer_connection
            .local_description()
            .await
            .ok_or_else(|| SessionError::Negotiation("no local description".to_owned()))?;
        Ok(description.sdp)
    }
}

fn wire_channel(dc: &Arc<RTCDataChannel>, events: mpsc::UnboundedSender<TransportEvent>) {
    let open_tx = events.clone();
    dc.on_open(Box::new(move || {
        let tx = open_tx.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::ChannelOpen);
        })
    }));

    let close_tx = events.clone();
    dc.on_close(Box::new(move || {
        let tx = close_tx.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::ChannelClosed);
        })
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = events.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::Message(Bytes::from(msg.data.to_vec())));
        })
    }));
}

#[async_trait]
impl PeerTransport for WebrtcTransport {
    async fn create_data_channel(&self, label: &str) -> SessionResult<()> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .map_err(SessionError::negotiation)?;
        wire_channel(&dc, self.events.clone());
        *self.data_channel.lock().await = Some(dc);
        Ok(())
    }

    async fn create_offer(&self, gather_timeout: Duration) -> SessionResult<String> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(SessionError::negotiation)?;
        self.apply_local(offer, gather_timeout).await
    }

    async fn create_answer(&self, gather_timeout: Duration) -> SessionResult<String> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(SessionError::negotiation)?;
        self.apply_local(answer, gather_timeout).await
    }

    async fn set_remote_description(&self, kind: SignalKind, sdp: String) -> SessionResult<()> {
        let description = match kind {
            SignalKind::Offer => RTCSessionDescription::offer(sdp),
            SignalKind::Answer => RTCSessionDescription::answer(sdp),
            SignalKind::Ice => {
                return Err(SessionError::Negotiation(
                    "ice envelope is not a description".to_owned(),
                ));
            }
        }
        .map_err(SessionError::negotiation)?;

        self.peer_connection
            .set_remote_description(description)
            .await
            .map_err(SessionError::negotiation)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> SessionResult<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(SessionError::negotiation)
    }

    async fn send(&self, text: String) -> SessionResult<()> {
        let dc = self
            .data_channel
            .lock()
            .await
            .clone()
            .ok_or_else(|| SessionError::Channel("data channel not open".to_owned()))?;
        dc.send_text(text).await.map_err(SessionError::channel)?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.peer_connection.close().await {
            warn!(peer = %self.remote, "closing peer connection failed: {e}");
        }
    }
}
