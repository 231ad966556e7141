use crate::peer::types::{Envelope, Signal};
use std::fmt;
use tracing::{debug, info};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::stats::StatsReportType;

/// Локальное время с миллисекундами
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Включено ли логирование в этой сборке
pub fn enabled() -> bool {
    crate::config::LOGGING_ENABLED && crate::config::dev::ENABLE_LOGGING
}

/// Подключает subscriber; повторный вызов ничего не делает
pub fn init() {
    if !enabled() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTime)
        .with_target(false)
        .try_init();
}

/// Печать исходящего/входящего сообщения сигнализации
pub fn dump_signal(label: &str, envelope: &Envelope) {
    let call = envelope
        .call_id
        .as_ref()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".into());

    match &envelope.signal {
        Signal::Offer { sdp, candidates } | Signal::Answer { sdp, candidates } => debug!(
            "{label}: {:?} call={} sdp_len={} bundled_candidates={}",
            envelope.kind(),
            call,
            sdp.len(),
            candidates.len()
        ),
        Signal::Candidate { candidate } => debug!(
            "{label}: candidate call={} candidate={} sdp_mid={:?} sdp_mline_index={:?}",
            call, candidate.candidate, candidate.sdp_mid, candidate.sdp_mline_index
        ),
    }
}

/// Быстрый снимок getStats → выбранная пара
pub async fn dump_selected_pair(pc: &RTCPeerConnection, moment: &str) {
    let stats = pc.get_stats().await;
    for (_, v) in stats.reports {
        if let StatsReportType::CandidatePair(pair) = v {
            if pair.nominated {
                info!(
                    "STATS {moment}: {}:{}  type: {:?}  bytes={}/{} state={:?}",
                    pair.local_candidate_id,
                    pair.remote_candidate_id,
                    pair.stats_type,
                    pair.bytes_sent,
                    pair.bytes_received,
                    pair.state
                );
            }
        }
    }
}
