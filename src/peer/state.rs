use crate::peer::ice::analyze_candidates;
use crate::peer::transport::LocalBlob;
use crate::peer::types::{
    CallId, CallState, Envelope, IceCandidate, MediaHandle, Role, SessionId, Signal,
};
use std::collections::VecDeque;
use std::time::Duration;

/// ========== CONSTANTS ==========

/// Период ожидания перед тем, как считать соединение потерянным
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// ========== SESSION ==========

/// Фаза активной сессии. Удалённый поток есть только в `Connected`
#[derive(Debug, Clone)]
pub enum Phase {
    Negotiating,
    Connected(MediaHandle),
}

/// Один звонок: создаётся при старте/входящем offer, уничтожается при завершении
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub role: Role,
    pub call_id: Option<CallId>,
    pub phase: Phase,
    /// Готовые к отправке сообщения в порядке создания
    outbound: VecDeque<Envelope>,
    /// Режим без trickle: описание и кандидаты ждут окончания сбора
    held_description: Option<String>,
    held_candidates: Vec<IceCandidate>,
    /// Описание уже в очереди; кандидаты trickle идут строго после него
    description_queued: bool,
    gathering_complete: bool,
    remote_description_applied: bool,
}

impl Session {
    pub fn new(id: SessionId, role: Role, call_id: Option<CallId>) -> Self {
        Session {
            id,
            role,
            call_id,
            phase: Phase::Negotiating,
            outbound: VecDeque::new(),
            held_description: None,
            held_candidates: Vec::new(),
            description_queued: false,
            gathering_complete: false,
            remote_description_applied: false,
        }
    }

    pub fn state(&self) -> CallState {
        match self.phase {
            Phase::Negotiating => CallState::Negotiating,
            Phase::Connected(_) => CallState::Connected,
        }
    }

    pub fn remote_media(&self) -> Option<&MediaHandle> {
        match &self.phase {
            Phase::Negotiating => None,
            Phase::Connected(media) => Some(media),
        }
    }

    /// Сообщение без callId или с нашим callId относится к этой сессии
    pub fn addresses(&self, call_id: Option<&CallId>) -> bool {
        match (call_id, &self.call_id) {
            (Some(theirs), Some(ours)) => theirs == ours,
            _ => true,
        }
    }

    pub fn remote_description_applied(&self) -> bool {
        self.remote_description_applied
    }

    pub fn mark_remote_description_applied(&mut self) {
        self.remote_description_applied = true;
    }

    /// Принимает локальный blob от транспорта
    pub fn queue_local(&mut self, blob: LocalBlob, trickle: bool) {
        if trickle {
            match blob {
                LocalBlob::Description(sdp) => {
                    let signal = self.describe(sdp, Vec::new());
                    self.push(signal);
                    self.description_queued = true;
                    for candidate in std::mem::take(&mut self.held_candidates) {
                        self.push(Signal::Candidate { candidate });
                    }
                }
                LocalBlob::Candidate(candidate) if self.description_queued => {
                    self.push(Signal::Candidate { candidate })
                }
                // сбор начинается раньше, чем транспорт отдаёт описание
                LocalBlob::Candidate(candidate) => self.held_candidates.push(candidate),
            }
            return;
        }

        match blob {
            LocalBlob::Description(sdp) => self.held_description = Some(sdp),
            LocalBlob::Candidate(candidate) => self.held_candidates.push(candidate),
        }
        self.flush_batch();
    }

    /// Сбор кандидатов окончен
    pub fn complete_gathering(&mut self, trickle: bool) {
        self.gathering_complete = true;
        if !trickle {
            self.flush_batch();
        }
    }

    pub fn take_outbound(&mut self) -> Vec<Envelope> {
        self.outbound.drain(..).collect()
    }

    fn flush_batch(&mut self) {
        if !self.gathering_complete {
            return;
        }
        if let Some(sdp) = self.held_description.take() {
            let candidates = std::mem::take(&mut self.held_candidates);
            analyze_candidates(&candidates);
            let signal = self.describe(sdp, candidates);
            self.push(signal);
        }
    }

    fn describe(&self, sdp: String, candidates: Vec<IceCandidate>) -> Signal {
        match self.role {
            Role::Initiator => Signal::Offer { sdp, candidates },
            Role::Responder => Signal::Answer { sdp, candidates },
        }
    }

    fn push(&mut self, signal: Signal) {
        self.outbound.push_back(Envelope {
            call_id: self.call_id.clone(),
            signal,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::types::SignalKind;

    fn candidate(n: u8) -> IceCandidate {
        IceCandidate {
            candidate: format!("candidate:{n} 1 udp 1 10.0.0.{n} 5000 typ host"),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }

    #[test]
    fn trickle_sends_every_blob_as_produced() {
        let mut s = Session::new(SessionId(1), Role::Initiator, None);
        s.queue_local(LocalBlob::Description("v=0".into()), true);
        s.queue_local(LocalBlob::Candidate(candidate(1)), true);
        s.complete_gathering(true);

        let kinds: Vec<_> = s.take_outbound().iter().map(Envelope::kind).collect();
        assert_eq!(kinds, vec![SignalKind::Offer, SignalKind::Candidate]);
    }

    #[test]
    fn trickle_holds_early_candidates_until_description() {
        let mut s = Session::new(SessionId(1), Role::Initiator, None);
        s.queue_local(LocalBlob::Candidate(candidate(1)), true);
        s.queue_local(LocalBlob::Candidate(candidate(2)), true);
        assert!(s.take_outbound().is_empty());

        s.queue_local(LocalBlob::Description("v=0".into()), true);
        s.queue_local(LocalBlob::Candidate(candidate(3)), true);

        let out = s.take_outbound();
        let kinds: Vec<_> = out.iter().map(Envelope::kind).collect();
        assert_eq!(
            kinds,
            vec![
                SignalKind::Offer,
                SignalKind::Candidate,
                SignalKind::Candidate,
                SignalKind::Candidate
            ]
        );
        match &out[1].signal {
            Signal::Candidate { candidate } => assert!(candidate.candidate.starts_with("candidate:1 ")),
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn batch_waits_for_gathering_to_finish() {
        let mut s = Session::new(SessionId(1), Role::Responder, Some(CallId("c".into())));
        s.queue_local(LocalBlob::Description("v=0".into()), false);
        s.queue_local(LocalBlob::Candidate(candidate(1)), false);
        s.queue_local(LocalBlob::Candidate(candidate(2)), false);
        assert!(s.take_outbound().is_empty());

        s.complete_gathering(false);
        let out = s.take_outbound();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].call_id, Some(CallId("c".into())));
        match &out[0].signal {
            Signal::Answer { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("expected answer, got {:?}", other),
        }
    }

    #[test]
    fn batch_tolerates_completion_before_description() {
        let mut s = Session::new(SessionId(1), Role::Initiator, None);
        s.queue_local(LocalBlob::Candidate(candidate(1)), false);
        s.complete_gathering(false);
        assert!(s.take_outbound().is_empty());

        s.queue_local(LocalBlob::Description("v=0".into()), false);
        let out = s.take_outbound();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind(), SignalKind::Offer);
    }

    #[test]
    fn addressing_accepts_untagged_messages() {
        let s = Session::new(SessionId(1), Role::Initiator, Some(CallId("mine".into())));
        assert!(s.addresses(None));
        assert!(s.addresses(Some(&CallId("mine".into()))));
        assert!(!s.addresses(Some(&CallId("other".into()))));
    }
}
