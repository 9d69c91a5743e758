//! The grep contract: every tag-prefixed line format lives here
//!
//! Shells depend on these exact shapes; change them and downstream ingestion
//! breaks. Each emitter logs through `tracing` and mirrors the line onto the
//! broadcast stream.

use tracing::info;

use crate::stream::publish;

fn emit(line: String) {
    info!(target: "webpilot", "{line}");
    publish(&line);
}

pub fn profile_detected(profile: &str, url: &str) {
    emit(format!("[PROFILE] detected={profile} url={url}"));
}

pub fn discovery(tier: u8, strategy: &str, selector: &str, stable: bool) {
    emit(format!(
        "[DISCOVERY] tier={tier} strategy={strategy} selector={selector} stable={stable}"
    ));
}

/// `kind` is one of HIT | MISS | SAVED | SKIPPED.
pub fn cache_event(kind: &str, source: &str, element: &str, selector: &str) {
    emit(format!(
        "[CACHE] {kind} source={source} element={element} selector={selector}"
    ));
}

pub fn cache_drift(key: &str, drift_pct: f64, threshold_pct: f64, decision: &str) {
    emit(format!(
        "[CACHE][DRIFT] key={key} drift={drift_pct:.1}% threshold={threshold_pct:.1}% decision={decision}"
    ));
}

pub fn readiness(stage: u8, status: &str, info: &str) {
    emit(format!("[READINESS] stage={stage} status={status} info={info}"));
}

pub fn gate(unique: bool, visible: bool, enabled: bool, stable: bool, scoped: bool) {
    emit(format!(
        "[GATE] unique={unique} visible={visible} enabled={enabled} stable={stable} scoped={scoped}"
    ));
}

pub fn heal(round: u32, phase: &str, outcome: &str) {
    emit(format!("[HEAL] round={round} phase={phase} outcome={outcome}"));
}

pub fn result(status: &str, steps: usize, heals: u32) {
    emit(format!("[RESULT] status={status} steps={steps} heals={heals}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::subscribe;

    // The stream is process-global, so other tests' lines may interleave;
    // match by content instead of strict order.
    async fn recv_matching(
        rx: &mut tokio::sync::broadcast::Receiver<String>,
        needle: &str,
    ) -> String {
        loop {
            let line = rx.recv().await.unwrap();
            if line.contains(needle) {
                return line;
            }
        }
    }

    #[tokio::test]
    async fn tag_shapes_are_stable() {
        let mut rx = subscribe();

        discovery(3, "name_attr", "[name=\"Amount\"]", true);
        assert_eq!(
            recv_matching(&mut rx, "[DISCOVERY] tier=3").await,
            "[DISCOVERY] tier=3 strategy=name_attr selector=[name=\"Amount\"] stable=true"
        );

        cache_drift("scope:/opp:amount:fill", 12.0, 35.0, "reuse");
        assert_eq!(
            recv_matching(&mut rx, "[CACHE][DRIFT] key=scope:/opp:amount:fill").await,
            "[CACHE][DRIFT] key=scope:/opp:amount:fill drift=12.0% threshold=35.0% decision=reuse"
        );

        result("PASS", 2, 0);
        assert_eq!(
            recv_matching(&mut rx, "[RESULT] status=PASS steps=2").await,
            "[RESULT] status=PASS steps=2 heals=0"
        );
    }
}
