use crate::error::DispatchFailure;
use crate::features::EvidenceKind;
use crate::scoring::ThreatAssessment;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousLink {
    pub reason: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDetails {
    pub phishing_keywords: Vec<String>,
    pub suspicious_links: Vec<SuspiciousLink>,
    pub sensitive_forms: Vec<String>,
}

impl AssessmentDetails {
    /// Entries keep discovery order, so a link flagged for both reasons
    /// lists `Mismatch` then `Bad TLD`, and a field lists `Insecure (HTTP)`
    /// then `Sensitive: <name>`.
    pub fn from_assessment(assessment: &ThreatAssessment) -> Self {
        let mut details = Self::default();
        for evidence in &assessment.findings {
            let payload = evidence.payload.clone();
            match evidence.kind {
                EvidenceKind::Keyword => details.phishing_keywords.push(payload),
                EvidenceKind::LinkMismatch => details.suspicious_links.push(SuspiciousLink {
                    reason: "Mismatch".to_string(),
                    url: payload,
                }),
                EvidenceKind::BadTld => details.suspicious_links.push(SuspiciousLink {
                    reason: "Bad TLD".to_string(),
                    url: payload,
                }),
                EvidenceKind::InsecureForm => {
                    details.sensitive_forms.push("Insecure (HTTP)".to_string())
                }
                EvidenceKind::SensitiveForm => {
                    details.sensitive_forms.push(format!("Sensitive: {payload}"))
                }
            }
        }
        details
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub detected_count: usize,
    pub score: u8,
    pub details: AssessmentDetails,
}

/// Message sent across the process boundary to the background coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data")]
pub enum OutboundMessage {
    #[serde(rename = "updateStatus")]
    UpdateStatus(StatusUpdate),
}

impl OutboundMessage {
    pub fn status(assessment: &ThreatAssessment) -> Self {
        OutboundMessage::UpdateStatus(StatusUpdate {
            detected_count: assessment.detected_count,
            score: assessment.score,
            details: AssessmentDetails::from_assessment(assessment),
        })
    }

    pub fn to_json(&self) -> Result<String, DispatchFailure> {
        serde_json::to_string(self).map_err(|e| DispatchFailure::Encode(e.to_string()))
    }
}

/// A consumer of completed assessments.
pub trait AssessmentSink: Send {
    fn name(&self) -> &str;
    fn deliver(&self, assessment: &ThreatAssessment) -> Result<(), DispatchFailure>;
    /// Display passthrough for a filed report id.
    fn report_confirmed(&self, _report_id: &str) {}
}

/// Outbound channel to the background coordinator.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl AssessmentSink for ChannelSink {
    fn name(&self) -> &str {
        "background"
    }

    fn deliver(&self, assessment: &ThreatAssessment) -> Result<(), DispatchFailure> {
        self.sender
            .send(OutboundMessage::status(assessment))
            .map_err(|_| DispatchFailure::ChannelClosed(self.name().to_string()))
    }
}

/// Summarises each assessment in the log, the way the sidebar would.
#[derive(Default)]
pub struct LogSink;

impl AssessmentSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&self, assessment: &ThreatAssessment) -> Result<(), DispatchFailure> {
        if assessment.is_clean() {
            log::info!("Cycle {}: no active threats", assessment.cycle);
            return Ok(());
        }
        log::info!(
            "Cycle {}: threat score {} ({:?}), {} findings",
            assessment.cycle,
            assessment.score,
            assessment.risk_level(),
            assessment.detected_count
        );
        for (kind, entries) in &assessment.evidence_by_kind {
            for entry in entries {
                log::info!("  {:?}: {}", kind, entry.payload);
            }
        }
        Ok(())
    }

    fn report_confirmed(&self, report_id: &str) {
        log::info!("Report {report_id} filed");
    }
}

/// Fans each completed assessment out to every registered sink. A failing
/// sink is logged and skipped; it never fails the cycle.
#[derive(Default)]
pub struct AssessmentPublisher {
    sinks: Vec<Box<dyn AssessmentSink>>,
}

impl AssessmentPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn AssessmentSink>) {
        log::debug!("Registered assessment sink {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Returns how many sinks accepted the assessment.
    pub fn publish(&self, assessment: &ThreatAssessment) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.deliver(assessment) {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("Assessment not delivered to {}: {}", sink.name(), e),
            }
        }
        delivered
    }

    pub fn report_confirmed(&self, report_id: &str) {
        for sink in &self.sinks {
            sink.report_confirmed(report_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Evidence, EvidenceSets};
    use crate::scoring::ScoringEngine;

    fn assessment() -> ThreatAssessment {
        let mut sets = EvidenceSets::default();
        sets.push(Evidence::new(EvidenceKind::Keyword, "urgent"));
        sets.push(Evidence::new(EvidenceKind::LinkMismatch, "http://b.net/"));
        sets.push(Evidence::new(EvidenceKind::BadTld, "http://a.xyz/"));
        sets.push(Evidence::new(EvidenceKind::InsecureForm, "pw"));
        sets.push(Evidence::new(EvidenceKind::SensitiveForm, "ssn"));
        ScoringEngine::score(1, sets)
    }

    #[test]
    fn test_outbound_message_shape() {
        let json = OutboundMessage::status(&assessment()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["action"], "updateStatus");
        assert_eq!(value["data"]["detectedCount"], 5);
        assert_eq!(value["data"]["score"], 50);
        let details = &value["data"]["details"];
        assert_eq!(details["phishingKeywords"][0], "urgent");
        assert_eq!(details["suspiciousLinks"][0]["reason"], "Mismatch");
        assert_eq!(details["suspiciousLinks"][1]["reason"], "Bad TLD");
        assert_eq!(details["sensitiveForms"][0], "Insecure (HTTP)");
        assert_eq!(details["sensitiveForms"][1], "Sensitive: ssn");
        assert!(details.get("hiddenElements").is_none());
    }

    #[test]
    fn test_details_follow_discovery_order() {
        let mut sets = EvidenceSets::default();
        sets.push(Evidence::new(EvidenceKind::LinkMismatch, "http://login.xyz/"));
        sets.push(Evidence::new(EvidenceKind::BadTld, "http://login.xyz/"));
        sets.push(Evidence::new(EvidenceKind::LinkMismatch, "https://evil.net/"));
        sets.push(Evidence::new(EvidenceKind::InsecureForm, "card"));
        sets.push(Evidence::new(EvidenceKind::SensitiveForm, "card"));
        sets.push(Evidence::new(EvidenceKind::InsecureForm, "pw"));
        let details = AssessmentDetails::from_assessment(&ScoringEngine::score(1, sets));

        let links: Vec<(&str, &str)> = details
            .suspicious_links
            .iter()
            .map(|l| (l.reason.as_str(), l.url.as_str()))
            .collect();
        assert_eq!(
            links,
            vec![
                ("Mismatch", "http://login.xyz/"),
                ("Bad TLD", "http://login.xyz/"),
                ("Mismatch", "https://evil.net/"),
            ]
        );
        assert_eq!(
            details.sensitive_forms,
            vec!["Insecure (HTTP)", "Sensitive: card", "Insecure (HTTP)"]
        );
    }

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, mut receiver) = ChannelSink::channel();
        let mut publisher = AssessmentPublisher::new();
        publisher.add_sink(Box::new(sink));

        assert_eq!(publisher.publish(&assessment()), 1);
        let OutboundMessage::UpdateStatus(update) = receiver.try_recv().unwrap();
        assert_eq!(update.detected_count, 5);
    }

    #[test]
    fn test_closed_channel_degrades_silently() {
        let (sink, receiver) = ChannelSink::channel();
        drop(receiver);
        let mut publisher = AssessmentPublisher::new();
        publisher.add_sink(Box::new(sink));
        publisher.add_sink(Box::new(LogSink));

        assert_eq!(publisher.publish(&assessment()), 1);
    }

    #[test]
    fn test_publish_with_no_sinks() {
        assert_eq!(AssessmentPublisher::new().publish(&assessment()), 0);
    }
}
