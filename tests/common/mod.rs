#![allow(dead_code)]

use async_trait::async_trait;
use peercall_lib::peer::{
    IceCandidate, LocalBlob, MediaHandle, Role, ServerConfig, SessionId, Signal, SignalKind,
    TransportEvent, TransportEvents, TransportSessionFacade,
};
use peercall_lib::{CallError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Что транспорт видел и что ему велено сделать
#[derive(Debug, Default)]
pub struct Recorder {
    pub created: Vec<(SessionId, Role, bool)>,
    pub supplied: Vec<(SessionId, SignalKind)>,
    pub produced: Vec<SessionId>,
    pub destroyed: Vec<SessionId>,
    pub events: HashMap<SessionId, TransportEvents>,
    pub candidates_per_blob: usize,
    pub fail_supply: bool,
    pub fail_produce: bool,
}

pub type SharedRecorder = Arc<Mutex<Recorder>>;

/// Транспорт без сети: описания и кандидаты выдаются сразу через события
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    pub recorder: SharedRecorder,
}

impl ScriptedTransport {
    pub fn new() -> (Self, SharedRecorder) {
        let transport = ScriptedTransport::default();
        let recorder = transport.recorder.clone();
        (transport, recorder)
    }
}

#[async_trait]
impl TransportSessionFacade for ScriptedTransport {
    async fn create_session(
        &mut self,
        session: SessionId,
        role: Role,
        local_media: Option<&MediaHandle>,
        _ice_servers: &[ServerConfig],
        events: TransportEvents,
    ) -> Result<()> {
        let mut recorder = self.recorder.lock().unwrap();
        recorder.created.push((session, role, local_media.is_some()));
        recorder.events.insert(session, events);
        Ok(())
    }

    async fn supply_remote_blob(&mut self, session: SessionId, signal: Signal) -> Result<()> {
        let mut recorder = self.recorder.lock().unwrap();
        if recorder.fail_supply {
            return Err(CallError::TransportFailure("remote description rejected".into()));
        }
        recorder.supplied.push((session, signal.kind()));
        Ok(())
    }

    async fn produce_local_blob(&mut self, session: SessionId) -> Result<()> {
        let mut recorder = self.recorder.lock().unwrap();
        if recorder.fail_produce {
            return Err(CallError::TransportFailure("could not create description".into()));
        }
        recorder.produced.push(session);

        let role = recorder
            .created
            .iter()
            .find(|(id, _, _)| *id == session)
            .map(|(_, role, _)| *role)
            .expect("session created before producing");
        let events = recorder.events[&session].clone();

        events.emit(TransportEvent::LocalBlob {
            session,
            blob: LocalBlob::Description(format!("v=0 {:?} {}", role, session.0)),
        });
        for n in 0..recorder.candidates_per_blob {
            events.emit(TransportEvent::LocalBlob {
                session,
                blob: LocalBlob::Candidate(host_candidate(n)),
            });
        }
        events.emit(TransportEvent::GatheringComplete { session });
        Ok(())
    }

    async fn destroy(&mut self, session: SessionId) {
        self.recorder.lock().unwrap().destroyed.push(session);
    }
}

pub fn host_candidate(n: usize) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{} 1 udp 2130706431 192.168.0.{} 5000 typ host", n, n + 2),
        sdp_mid: Some("0".into()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}

pub fn camera(name: &str) -> MediaHandle {
    MediaHandle::camera(name)
}

/// Имитирует появление удалённого потока для сессии
pub fn fire_stream_ready(recorder: &SharedRecorder, session: SessionId, stream: &str) {
    let events = recorder.lock().unwrap().events[&session].clone();
    events.emit(TransportEvent::StreamReady {
        session,
        media: camera(stream),
    });
}

pub fn fire_failure(recorder: &SharedRecorder, session: SessionId, reason: &str) {
    let events = recorder.lock().unwrap().events[&session].clone();
    events.emit(TransportEvent::Failed {
        session,
        reason: reason.into(),
    });
}
