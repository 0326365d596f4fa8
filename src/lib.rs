pub mod config;
pub mod document;
pub mod domain_utils;
pub mod error;
pub mod features;
pub mod html;
pub mod markers;
pub mod publisher;
pub mod rules;
pub mod runtime;
pub mod scheduler;
pub mod scoring;
pub mod session;

pub use config::EngineConfig;
pub use document::{Document, MutationRecord, NodeId};
pub use error::{DispatchFailure, LoadError};
pub use features::{Evidence, EvidenceKind, PageAnalyzer};
pub use publisher::{AssessmentPublisher, AssessmentSink, OutboundMessage};
pub use rules::RuleSet;
pub use runtime::{EngineHandle, EngineRuntime, HostEvent};
pub use scheduler::ChangeScheduler;
pub use scoring::{RiskLevel, ScoringEngine, ThreatAssessment};
pub use session::EngineSession;
