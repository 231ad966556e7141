use crate::error::{CallError, Result};
use crate::logger::dump_selected_pair;
use crate::peer::ice::{apply_candidates, from_rtc_candidate, rtc_config, to_rtc_candidate};
use crate::peer::state::GRACE_PERIOD;
use crate::peer::transport::{LocalBlob, TransportEvent, TransportEvents, TransportSessionFacade};
use crate::peer::types::{
    IceCandidate, MediaHandle, MediaKind, MediaTrack, Role, ServerConfig, SessionId, Signal,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

type DisconnectTask = Arc<Mutex<Option<JoinHandle<()>>>>;

fn slot<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Состояние одного RTCPeerConnection
struct PeerEntry {
    pc: Arc<RTCPeerConnection>,
    role: Role,
    local_tracks: Vec<Arc<TrackLocalStaticSample>>,
    /// Кандидаты, полученные до установки remote description
    pending_remote: Vec<IceCandidate>,
    disconnect_task: DisconnectTask,
    events: TransportEvents,
}

/// Фасад транспорта поверх `webrtc`: одна peer connection на сессию
#[derive(Default)]
pub struct WebRtcTransport {
    peers: HashMap<SessionId, PeerEntry>,
}

impl WebRtcTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Локальные дорожки сессии; в них пишет внешний конвейер захвата
    pub fn local_tracks(&self, session: SessionId) -> Vec<Arc<TrackLocalStaticSample>> {
        self.peers
            .get(&session)
            .map(|p| p.local_tracks.clone())
            .unwrap_or_default()
    }

    pub fn connection_state(&self, session: SessionId) -> Option<RTCPeerConnectionState> {
        self.peers.get(&session).map(|p| p.pc.connection_state())
    }

    /// Сколько удалённых кандидатов ждут remote description
    pub fn pending_remote_candidates(&self, session: SessionId) -> usize {
        self.peers
            .get(&session)
            .map_or(0, |p| p.pending_remote.len())
    }

    fn peer(&mut self, session: SessionId) -> Result<&mut PeerEntry> {
        self.peers
            .get_mut(&session)
            .ok_or_else(|| CallError::TransportFailure(format!("unknown {}", session)))
    }
}

#[async_trait]
impl TransportSessionFacade for WebRtcTransport {
    async fn create_session(
        &mut self,
        session: SessionId,
        role: Role,
        local_media: Option<&MediaHandle>,
        ice_servers: &[ServerConfig],
        events: TransportEvents,
    ) -> Result<()> {
        let pc = new_peer(session, ice_servers, &events).await?;

        let local_tracks = match local_media {
            Some(media) => match attach_local_media(&pc, media).await {
                Ok(tracks) => tracks,
                Err(e) => {
                    let _ = pc.close().await;
                    return Err(e);
                }
            },
            None => Vec::new(),
        };

        let disconnect_task: DisconnectTask = Arc::new(Mutex::new(None));
        watch_connection_state(session, &pc, disconnect_task.clone(), events.clone());

        self.peers.insert(
            session,
            PeerEntry {
                pc,
                role,
                local_tracks,
                pending_remote: Vec::new(),
                disconnect_task,
                events,
            },
        );
        Ok(())
    }

    async fn supply_remote_blob(&mut self, session: SessionId, signal: Signal) -> Result<()> {
        let peer = self.peer(session)?;
        let pc = peer.pc.clone();

        let (description, bundled) = match signal {
            Signal::Offer { sdp, candidates } => (RTCSessionDescription::offer(sdp)?, candidates),
            Signal::Answer { sdp, candidates } => (RTCSessionDescription::answer(sdp)?, candidates),
            Signal::Candidate { candidate } => {
                if pc.remote_description().await.is_some() {
                    if let Err(e) = pc.add_ice_candidate(to_rtc_candidate(candidate)).await {
                        warn!("{}: failed to add ICE candidate: {:?}", session, e);
                    }
                } else {
                    debug!("{}: remote description not set yet, queuing candidate", session);
                    peer.pending_remote.push(candidate);
                }
                return Ok(());
            }
        };

        pc.set_remote_description(description).await?;
        let mut candidates = bundled;
        candidates.append(&mut peer.pending_remote);
        apply_candidates(&pc, candidates).await;
        Ok(())
    }

    async fn produce_local_blob(&mut self, session: SessionId) -> Result<()> {
        let peer = self.peer(session)?;
        let pc = peer.pc.clone();

        let description = match peer.role {
            Role::Initiator => pc.create_offer(None).await?,
            Role::Responder => pc.create_answer(None).await?,
        };
        pc.set_local_description(description).await?;

        let local = pc.local_description().await.ok_or_else(|| {
            CallError::TransportFailure("local description missing after negotiation".into())
        })?;
        info!("{}: local {:?} ready, {} bytes", session, local.sdp_type, local.sdp.len());
        peer.events.emit(TransportEvent::LocalBlob {
            session,
            blob: LocalBlob::Description(local.sdp),
        });
        Ok(())
    }

    async fn destroy(&mut self, session: SessionId) {
        if let Some(peer) = self.peers.remove(&session) {
            if let Some(handle) = slot(&peer.disconnect_task).take() {
                handle.abort();
            }
            if let Err(e) = peer.pc.close().await {
                warn!("{}: close failed: {:?}", session, e);
            }
            info!("{}: peer connection closed", session);
        }
    }
}

fn codec_for(kind: MediaKind) -> RTCRtpCodecCapability {
    let mime_type = match kind {
        MediaKind::Audio => MIME_TYPE_OPUS,
        MediaKind::Video => MIME_TYPE_VP8,
    };
    RTCRtpCodecCapability {
        mime_type: mime_type.to_owned(),
        ..Default::default()
    }
}

/// Создаём peer со стандартными кодеками; кандидаты и удалённые дорожки уходят в `events`
async fn new_peer(
    session: SessionId,
    ice_servers: &[ServerConfig],
    events: &TransportEvents,
) -> Result<Arc<RTCPeerConnection>> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();
    let pc = Arc::new(api.new_peer_connection(rtc_config(ice_servers)).await?);

    let candidates = events.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        match cand.as_ref().map(from_rtc_candidate) {
            Some(Some(candidate)) => {
                debug!("{}: local candidate {}", session, candidate.candidate);
                candidates.emit(TransportEvent::LocalBlob {
                    session,
                    blob: LocalBlob::Candidate(candidate),
                });
            }
            Some(None) => {}
            // cand == None означает конец сбора
            None => {
                debug!("{}: ICE candidate gathering completed", session);
                candidates.emit(TransportEvent::GatheringComplete { session });
            }
        }
        Box::pin(async {})
    }));

    pc.on_ice_gathering_state_change(Box::new(move |state| {
        debug!("{}: ICE gathering state changed to {:?}", session, state);
        Box::pin(async {})
    }));

    let streams = events.clone();
    pc.on_track(Box::new(
        move |track: Arc<TrackRemote>,
              _receiver: Arc<RTCRtpReceiver>,
              _transceiver: Arc<RTCRtpTransceiver>| {
            let kind = match track.kind() {
                RTPCodecType::Audio => Some(MediaKind::Audio),
                RTPCodecType::Video => Some(MediaKind::Video),
                _ => None,
            };
            if let Some(kind) = kind {
                let media = MediaHandle {
                    stream_id: track.stream_id(),
                    tracks: vec![MediaTrack {
                        id: track.id(),
                        kind,
                    }],
                };
                info!("{}: remote {:?} track {}", session, kind, media.tracks[0].id);
                streams.emit(TransportEvent::StreamReady { session, media });
            } else {
                warn!("{}: ignoring remote track of unknown kind", session);
            }
            Box::pin(async {})
        },
    ));

    Ok(pc)
}

/// Одна TrackLocalStaticSample на каждую локальную дорожку
async fn attach_local_media(
    pc: &RTCPeerConnection,
    media: &MediaHandle,
) -> Result<Vec<Arc<TrackLocalStaticSample>>> {
    let mut tracks = Vec::with_capacity(media.tracks.len());
    for track in &media.tracks {
        let local = Arc::new(TrackLocalStaticSample::new(
            codec_for(track.kind),
            track.id.clone(),
            media.stream_id.clone(),
        ));
        let sender = pc
            .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // RTCP нужно вычитывать, иначе interceptors не работают
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });
        tracks.push(local);
    }
    Ok(tracks)
}

/// Disconnected/Failed запускают grace period; без восстановления сессия считается упавшей
fn watch_connection_state(
    session: SessionId,
    pc: &Arc<RTCPeerConnection>,
    task: DisconnectTask,
    events: TransportEvents,
) {
    let weak: Weak<RTCPeerConnection> = Arc::downgrade(pc);

    pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
        debug!("{}: peer connection state changed to {:?}", session, st);

        match st {
            RTCPeerConnectionState::Connected => {
                // отменяем отложенную проверку, если она была
                if let Some(handle) = slot(&task).take() {
                    info!("{}: connection recovered, aborting grace check", session);
                    handle.abort();
                }
            }
            RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Failed => {
                let mut pending = slot(&task);
                match (pending.is_none(), weak.upgrade()) {
                    (true, Some(pc)) => {
                        *pending = Some(tokio::spawn(grace_check(session, pc, events.clone())));
                    }
                    _ => debug!("{}: grace check already pending", session),
                }
            }
            _ => {}
        }
        Box::pin(async {})
    }));
}

async fn grace_check(session: SessionId, pc: Arc<RTCPeerConnection>, events: TransportEvents) {
    warn!(
        "{}: connection problem, waiting {} s for recovery",
        session,
        GRACE_PERIOD.as_secs()
    );
    sleep(GRACE_PERIOD).await;

    let state = pc.connection_state();
    if state == RTCPeerConnectionState::Connected {
        info!("{}: connection recovered during grace period", session);
        return;
    }

    dump_selected_pair(&pc, "BEFORE-FAIL").await;
    events.emit(TransportEvent::Failed {
        session,
        reason: format!("peer connection {:?} after grace period", state),
    });
}
