use crate::config::EngineConfig;
use crate::document::{Document, MutationRecord};
use crate::error::LoadError;
use crate::features::{AnalyzerPipeline, Exclusion, PageContext, ScanContext};
use crate::markers::ScanMarkers;
use crate::publisher::{AssessmentPublisher, AssessmentSink};
use crate::rules::RuleSet;
use crate::scheduler::ChangeScheduler;
use crate::scoring::{ScoringEngine, ThreatAssessment};
use std::sync::Arc;
use tokio::time::Instant;

/// All engine state for one page session. Nothing here outlives the page.
pub struct EngineSession {
    rules: Arc<RuleSet>,
    page: PageContext,
    exclusion: Exclusion,
    pipeline: AnalyzerPipeline,
    markers: ScanMarkers,
    scheduler: ChangeScheduler,
    publisher: AssessmentPublisher,
    latest: Option<Arc<ThreatAssessment>>,
    cycles: u64,
    report_id: Option<String>,
}

impl EngineSession {
    pub fn new(rules: RuleSet, config: &EngineConfig) -> Self {
        let exclusion = Exclusion::new(config.ui_root_id.clone());
        Self {
            rules: Arc::new(rules),
            page: config.page_context(),
            scheduler: ChangeScheduler::new(config.debounce(), exclusion.clone()),
            exclusion,
            pipeline: AnalyzerPipeline::new(),
            markers: ScanMarkers::new(),
            publisher: AssessmentPublisher::new(),
            latest: None,
            cycles: 0,
            report_id: None,
        }
    }

    /// Load the rule source and bring a session up. On error there is no
    /// session: nothing will ever be scanned or published.
    pub async fn boot(config: &EngineConfig) -> Result<Self, LoadError> {
        match RuleSet::load_async(&config.rules_path).await {
            Ok(rules) => {
                log::info!("Engine session started for {:?}", config.page_url);
                Ok(Self::new(rules, config))
            }
            Err(e) => {
                log::error!("Engine stays inert: {e}");
                Err(e)
            }
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn AssessmentSink>) {
        self.publisher.add_sink(sink);
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn markers(&self) -> &ScanMarkers {
        &self.markers
    }

    pub fn scheduler(&self) -> &ChangeScheduler {
        &self.scheduler
    }

    pub fn latest(&self) -> Option<Arc<ThreatAssessment>> {
        self.latest.clone()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn report_id(&self) -> Option<&str> {
        self.report_id.as_deref()
    }

    /// Startup cycle, run once rules are loaded.
    pub fn start(&mut self, doc: &mut Document) -> Option<Arc<ThreatAssessment>> {
        if !self.scheduler.begin_initial() {
            return None;
        }
        let assessment = self.run_cycle(doc);
        self.scheduler.finish_cycle();
        Some(assessment)
    }

    /// Hand a batch of host mutation records to the scheduler.
    pub fn observe(&mut self, doc: &Document, records: &[MutationRecord], now: Instant) -> bool {
        self.scheduler.notify(doc, records, now)
    }

    /// Run the pending cycle if its debounce window has elapsed.
    pub fn poll(&mut self, doc: &mut Document, now: Instant) -> Option<Arc<ThreatAssessment>> {
        if !self.scheduler.begin_cycle(now) {
            return None;
        }
        let assessment = self.run_cycle(doc);
        self.scheduler.finish_cycle();
        Some(assessment)
    }

    /// Text scan, link and form analysis, scoring, then publish.
    fn run_cycle(&mut self, doc: &mut Document) -> Arc<ThreatAssessment> {
        // This pass covers whatever the host changed so far.
        doc.take_mutations();

        let root = doc.body();
        let sets = {
            let mut ctx = ScanContext {
                document: doc,
                rules: &self.rules,
                markers: &mut self.markers,
                page: &self.page,
                exclusion: &self.exclusion,
                root,
            };
            self.pipeline.run(&mut ctx)
        };

        // Our own highlighting and marking writes must not schedule a rescan.
        let own_writes = doc.take_mutations();
        if !own_writes.is_empty() {
            log::debug!("Discarded {} self-inflicted mutation records", own_writes.len());
        }

        self.cycles += 1;
        let assessment = Arc::new(ScoringEngine::score(self.cycles, sets));
        log::info!(
            "Scan cycle {} complete: score {}, {} findings",
            assessment.cycle,
            assessment.score,
            assessment.detected_count
        );
        self.latest = Some(Arc::clone(&assessment));
        self.publisher.publish(&assessment);
        assessment
    }

    /// Inbound "report confirmed" notification. Display only.
    pub fn confirm_report(&mut self, report_id: impl Into<String>) {
        let report_id = report_id.into();
        log::info!("Report {report_id} confirmed");
        self.publisher.report_confirmed(&report_id);
        self.report_id = Some(report_id);
    }

    pub fn detach(&mut self) {
        log::debug!("Detaching change observer");
        self.scheduler.detach();
    }
}
