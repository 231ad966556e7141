use peercall_lib::peer::{
    IceCandidate, LocalBlob, MediaHandle, Role, SessionId, Signal, TransportEvent,
    TransportEvents, TransportSessionFacade, WebRtcTransport,
};
use peercall_lib::CallError;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(15);

/// Описание и кандидаты одной стороны до конца сбора
async fn gather(rx: &mut UnboundedReceiver<TransportEvent>) -> (String, Vec<IceCandidate>) {
    let mut sdp = None;
    let mut candidates = Vec::new();
    let mut complete = false;

    while sdp.is_none() || !complete {
        let event = timeout(WAIT, rx.recv())
            .await
            .expect("transport went quiet")
            .expect("events channel closed");
        match event {
            TransportEvent::LocalBlob {
                blob: LocalBlob::Description(description),
                ..
            } => sdp = Some(description),
            TransportEvent::LocalBlob {
                blob: LocalBlob::Candidate(candidate),
                ..
            } => candidates.push(candidate),
            TransportEvent::GatheringComplete { .. } => complete = true,
            other => panic!("unexpected event {:?}", other),
        }
    }
    (sdp.unwrap_or_default(), candidates)
}

fn loopback_candidate() -> IceCandidate {
    IceCandidate {
        candidate: "candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host".into(),
        sdp_mid: Some("0".into()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn offer_answer_and_early_candidate_between_two_transports() {
    let session = SessionId(1);
    let (alice_events, mut alice_rx) = TransportEvents::channel();
    let (bob_events, mut bob_rx) = TransportEvents::channel();
    let mut alice = WebRtcTransport::new();
    let mut bob = WebRtcTransport::new();

    alice
        .create_session(
            session,
            Role::Initiator,
            Some(&MediaHandle::camera("alice")),
            &[],
            alice_events,
        )
        .await
        .unwrap();
    assert_eq!(alice.local_tracks(session).len(), 2);

    alice.produce_local_blob(session).await.unwrap();
    let (offer_sdp, offer_candidates) = gather(&mut alice_rx).await;
    assert!(offer_sdp.contains("m=audio"));
    assert!(offer_sdp.contains("m=video"));

    // ответчик без своей камеры отвечает только на приём
    bob.create_session(session, Role::Responder, None, &[], bob_events)
        .await
        .unwrap();
    assert!(bob.local_tracks(session).is_empty());
    bob.supply_remote_blob(
        session,
        Signal::Offer {
            sdp: offer_sdp,
            candidates: offer_candidates,
        },
    )
    .await
    .unwrap();
    bob.produce_local_blob(session).await.unwrap();
    let (answer_sdp, mut answer_candidates) = gather(&mut bob_rx).await;
    assert!(answer_sdp.contains("a=recvonly"));

    // кандидат обогнал answer: транспорт придерживает его
    let early = answer_candidates.pop().unwrap_or_else(loopback_candidate);
    alice
        .supply_remote_blob(session, Signal::Candidate { candidate: early })
        .await
        .unwrap();
    assert_eq!(alice.pending_remote_candidates(session), 1);

    alice
        .supply_remote_blob(
            session,
            Signal::Answer {
                sdp: answer_sdp,
                candidates: answer_candidates,
            },
        )
        .await
        .unwrap();
    assert_eq!(alice.pending_remote_candidates(session), 0);

    // после answer кандидаты применяются сразу
    alice
        .supply_remote_blob(
            session,
            Signal::Candidate {
                candidate: loopback_candidate(),
            },
        )
        .await
        .unwrap();
    assert_eq!(alice.pending_remote_candidates(session), 0);

    alice.destroy(session).await;
    bob.destroy(session).await;
    assert!(alice.connection_state(session).is_none());
    assert!(bob.connection_state(session).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn destroyed_session_is_forgotten() {
    let session = SessionId(7);
    let (events, _rx) = TransportEvents::channel();
    let mut transport = WebRtcTransport::new();

    transport
        .create_session(session, Role::Initiator, None, &[], events)
        .await
        .unwrap();
    assert!(transport.connection_state(session).is_some());

    transport.destroy(session).await;
    assert!(transport.connection_state(session).is_none());
    assert!(transport.local_tracks(session).is_empty());

    // повторное уничтожение и чужие сессии не паникуют
    transport.destroy(session).await;
    let err = transport.produce_local_blob(session).await.unwrap_err();
    assert!(matches!(err, CallError::TransportFailure(_)));
    let err = transport
        .supply_remote_blob(
            SessionId(99),
            Signal::Candidate {
                candidate: loopback_candidate(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::TransportFailure(_)));
}
