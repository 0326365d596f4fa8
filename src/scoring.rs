use crate::features::{Evidence, EvidenceKind, EvidenceSets};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_SCORE: u8 = 100;
const PENALTY_PER_FINDING: usize = 10;

/// Below this score the background coordinator files an automatic report.
pub const CRITICAL_THRESHOLD: u8 = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Scored result of one completed scan cycle. Never mutated after creation;
/// the next cycle supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub cycle: u64,
    pub scanned_at: DateTime<Utc>,
    pub score: u8,
    pub detected_count: usize,
    /// Every finding in discovery order: text, then links, then forms, each
    /// in document order.
    pub findings: Vec<Evidence>,
    pub evidence_by_kind: BTreeMap<EvidenceKind, Vec<Evidence>>,
}

impl ThreatAssessment {
    pub fn evidence(&self, kind: EvidenceKind) -> &[Evidence] {
        self.evidence_by_kind
            .get(&kind)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_clean(&self) -> bool {
        self.score == MAX_SCORE
    }

    pub fn risk_level(&self) -> RiskLevel {
        match self.score {
            s if s < CRITICAL_THRESHOLD => RiskLevel::Critical,
            s if s < 50 => RiskLevel::High,
            s if s < 80 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

pub struct ScoringEngine;

impl ScoringEngine {
    /// `max(0, 100 - 10 * detected)`.
    pub fn score_for(detected_count: usize) -> u8 {
        let penalty = detected_count.saturating_mul(PENALTY_PER_FINDING);
        (MAX_SCORE as usize).saturating_sub(penalty) as u8
    }

    pub fn score(cycle: u64, sets: EvidenceSets) -> ThreatAssessment {
        let findings: Vec<Evidence> = sets
            .keyword
            .into_iter()
            .chain(sets.link)
            .chain(sets.form)
            .collect();
        let detected_count = findings.len();
        let mut evidence_by_kind: BTreeMap<EvidenceKind, Vec<Evidence>> = BTreeMap::new();
        for evidence in &findings {
            evidence_by_kind
                .entry(evidence.kind)
                .or_default()
                .push(evidence.clone());
        }

        ThreatAssessment {
            cycle,
            scanned_at: Utc::now(),
            score: Self::score_for(detected_count),
            detected_count,
            findings,
            evidence_by_kind,
        }
    }
}
