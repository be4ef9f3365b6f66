//! Run orchestration.
//!
//! One run walks `Init → Fetching → Classifying → Deduping → Batching →
//! Delivering → Done`. The orchestrator owns the fingerprint set and the
//! rate limiter, so repeated runs on one instance form a session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::delivery::{DeliverySink, deliver_with_retry};
use crate::error::{AppError, Result};
use crate::models::{
    Config, FetchMode, Posting, RejectReason, RunSummary, SearchQuery, SourceId, SourceStats,
};
use crate::pipeline::{
    BatchFormatter, Classifier, FetchExecutor, FetchOutcome, FingerprintSet, RateLimiter,
    RetryPolicy,
};
use crate::sources::{HtmlSource, SourceAdapter};
use crate::utils::http;

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Fetching,
    Classifying,
    Deduping,
    Batching,
    Delivering,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Fetching => "fetching",
            Self::Classifying => "classifying",
            Self::Deduping => "deduping",
            Self::Batching => "batching",
            Self::Delivering => "delivering",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

pub struct Orchestrator {
    sources: Vec<Arc<dyn SourceAdapter>>,
    query: SearchQuery,
    mode: FetchMode,
    max_concurrent: usize,
    limiter: Arc<RateLimiter>,
    executor: FetchExecutor,
    classifier: Classifier,
    fingerprints: Arc<FingerprintSet>,
    formatter: BatchFormatter,
    sink: Arc<dyn DeliverySink>,
    no_results_message: String,
    retry_delay: Duration,
    state: RunState,
}

impl Orchestrator {
    /// Build an orchestrator over explicit adapters and a sink.
    pub fn new(
        config: &Config,
        sources: Vec<Arc<dyn SourceAdapter>>,
        sink: Arc<dyn DeliverySink>,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(AppError::config("No sources configured"));
        }

        let query = config.query();
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(
            config.fetch.min_interval_secs,
        )));
        let executor =
            FetchExecutor::new(RetryPolicy::from_config(&config.fetch), Arc::clone(&limiter));
        let classifier =
            Classifier::from_config(&config.classifier)?.with_home_locality(query.home_locality());
        let limit = config.delivery.hard_limit.min(sink.hard_limit());
        config.delivery.check_fits(limit)?;
        let formatter = BatchFormatter::from_config(&config.delivery).with_hard_limit(limit);

        Ok(Self {
            sources,
            query,
            mode: config.fetch.mode,
            max_concurrent: config.fetch.max_concurrent.max(1),
            limiter,
            executor,
            classifier,
            fingerprints: Arc::new(FingerprintSet::new(config.dedup.case_insensitive)),
            formatter,
            sink,
            no_results_message: config.delivery.no_results_message.clone(),
            retry_delay: Duration::from_millis(config.delivery.retry_delay_ms),
            state: RunState::Init,
        })
    }

    /// Build HTML sources for every configured source definition.
    pub fn from_config(config: &Config, sink: Arc<dyn DeliverySink>) -> Result<Self> {
        let client = http::create_async_client(&config.fetch)?;
        let sources = config
            .sources
            .iter()
            .map(|s| {
                HtmlSource::new(s.clone(), client.clone())
                    .map(|h| Arc::new(h) as Arc<dyn SourceAdapter>)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(config, sources, sink)
    }

    /// Continue a session from previously delivered fingerprints.
    pub fn with_fingerprints(mut self, fingerprints: Arc<FingerprintSet>) -> Self {
        self.fingerprints = fingerprints;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.executor = FetchExecutor::new(policy, Arc::clone(&self.limiter));
        self
    }

    /// Delay before the single delivery retry.
    pub fn with_delivery_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn fingerprints(&self) -> &Arc<FingerprintSet> {
        &self.fingerprints
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn enter(&mut self, state: RunState) {
        log::debug!("Run state: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Execute one run.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<RunSummary> {
        self.enter(RunState::Init);
        let mut summary = RunSummary::new(Utc::now());
        log::info!(
            "Searching '{}' in '{}' across {} source(s)",
            self.query.term,
            self.query.locality,
            self.sources.len()
        );

        self.enter(RunState::Fetching);
        let outcomes = self.fetch_all(cancel).await;
        summary.sources_tried = outcomes.len();
        for outcome in &outcomes {
            let mut stats = SourceStats::new(outcome.source.clone());
            stats.raw = outcome.candidates.len();
            stats.attempts = outcome.attempts;
            stats.failed_attempts = outcome.failed_attempts;
            stats.exhausted = outcome.exhausted;
            stats.cancelled = outcome.cancelled;
            summary.raw_total += stats.raw;
            if outcome.exhausted {
                summary.failures.push(outcome.source.clone());
            }
            summary.sources.push(stats);
        }

        if cancel.is_cancelled() && summary.raw_total == 0 {
            log::warn!("Run cancelled before any source produced candidates");
            summary.cancelled = true;
            return Ok(self.finish(summary));
        }

        self.enter(RunState::Classifying);
        let accepted = self.classify_all(&outcomes, &mut summary);

        self.enter(RunState::Deduping);
        let mut novel = Vec::with_capacity(accepted.len());
        for posting in accepted {
            if self.fingerprints.is_novel(&posting) {
                stats_for(&mut summary, posting.source()).novel += 1;
                novel.push(posting);
            } else {
                log::debug!("Already delivered: {}", posting.title());
            }
        }
        summary.novel = novel.len();

        self.enter(RunState::Batching);
        let messages: Vec<String> = if novel.is_empty() {
            log::info!("No new postings, sending the no-results message");
            vec![self.no_results_message.clone()]
        } else {
            self.formatter
                .format(&novel)
                .iter()
                .map(|batch| batch.text())
                .collect()
        };

        self.enter(RunState::Delivering);
        for (i, text) in messages.iter().enumerate() {
            match deliver_with_retry(self.sink.as_ref(), text, self.retry_delay).await {
                Ok(_) if novel.is_empty() => summary.no_results_sent = true,
                Ok(_) => summary.batches_sent += 1,
                Err(e) => {
                    summary.delivery_failures += 1;
                    log::error!("Delivery of message {}/{} failed: {}", i + 1, messages.len(), e);
                }
            }
        }

        Ok(self.finish(summary))
    }

    async fn fetch_all(&self, cancel: &CancellationToken) -> Vec<FetchOutcome> {
        let executor = &self.executor;
        let query = &self.query;

        match self.mode {
            FetchMode::Sequential => {
                let mut outcomes = Vec::with_capacity(self.sources.len());
                for source in &self.sources {
                    outcomes.push(executor.fetch(source.as_ref(), query, cancel).await);
                }
                outcomes
            }
            FetchMode::Concurrent => {
                let mut indexed: Vec<(usize, FetchOutcome)> =
                    stream::iter(self.sources.iter().enumerate())
                        .map(move |(i, source)| async move {
                            (i, executor.fetch(source.as_ref(), query, cancel).await)
                        })
                        .buffer_unordered(self.max_concurrent)
                        .collect()
                        .await;
                indexed.sort_by_key(|(i, _)| *i);
                indexed.into_iter().map(|(_, outcome)| outcome).collect()
            }
        }
    }

    /// Classify every candidate in source order, keeping accepted postings.
    fn classify_all(&self, outcomes: &[FetchOutcome], summary: &mut RunSummary) -> Vec<Posting> {
        let min_chars = self.classifier.min_title_chars();
        let mut accepted = Vec::new();

        for candidate in outcomes.iter().flat_map(|o| &o.candidates) {
            let verdict = self.classifier.classify(candidate);
            if let Some(reason) = verdict.reason {
                log::debug!("Rejected ({}): {}", reason, candidate.title);
                *summary.rejected.entry(reason).or_insert(0) += 1;
                continue;
            }

            match Posting::from_candidate(candidate, min_chars) {
                Ok(posting) => {
                    stats_for(summary, posting.source()).accepted += 1;
                    accepted.push(posting);
                }
                Err(e) => log::debug!("Dropped '{}': {}", candidate.title, e),
            }
        }

        summary.invalid = summary.rejected_by(RejectReason::Malformed);
        summary.accepted = accepted.len();
        accepted
    }

    fn finish(&mut self, mut summary: RunSummary) -> RunSummary {
        summary.finished_at = Utc::now();
        self.enter(RunState::Done);
        log::info!(
            "Run finished: {} raw, {} accepted, {} new, {} message(s) sent, {} delivery failure(s), {} source(s) exhausted",
            summary.raw_total,
            summary.accepted,
            summary.novel,
            summary.batches_sent + usize::from(summary.no_results_sent),
            summary.delivery_failures,
            summary.failures.len()
        );
        summary
    }
}

fn stats_for<'a>(summary: &'a mut RunSummary, source: &SourceId) -> &'a mut SourceStats {
    let idx = match summary.sources.iter().position(|s| &s.source == source) {
        Some(idx) => idx,
        None => {
            summary.sources.push(SourceStats::new(source.clone()));
            summary.sources.len() - 1
        }
    };
    &mut summary.sources[idx]
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::delivery::{Ack, DeliveryError};
    use crate::models::RawCandidate;
    use crate::sources::{FetchCause, FetchError};

    struct Listing {
        id: SourceId,
        titles: Vec<&'static str>,
        delay: Duration,
        fail: bool,
    }

    impl Listing {
        fn new(id: &str, titles: Vec<&'static str>) -> Self {
            Self {
                id: SourceId::from(id),
                titles,
                delay: Duration::ZERO,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for Listing {
        fn id(&self) -> &SourceId {
            &self.id
        }

        async fn search(
            &self,
            _query: &SearchQuery,
        ) -> std::result::Result<Vec<RawCandidate>, FetchError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(FetchError::new(self.id.clone(), FetchCause::Status(503)));
            }
            Ok(self
                .titles
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    RawCandidate::new(*t, format!("https://x/{}/{}", self.id, i), self.id.clone())
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct Inbox {
        messages: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl DeliverySink for Inbox {
        fn hard_limit(&self) -> usize {
            2000
        }

        async fn deliver(&self, text: &str) -> std::result::Result<Ack, DeliveryError> {
            if self.fail {
                return Err(DeliveryError::Unreachable("offline".into()));
            }
            self.messages.lock().unwrap().push(text.to_string());
            Ok(Ack { status: None })
        }
    }

    fn orchestrator(
        config: &Config,
        sources: Vec<Listing>,
        sink: Arc<Inbox>,
    ) -> Orchestrator {
        let sources = sources
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn SourceAdapter>)
            .collect();
        Orchestrator::new(config, sources, sink)
            .unwrap()
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(1)))
            .with_delivery_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_no_sources_is_config_error() {
        let sink: Arc<dyn DeliverySink> = Arc::new(Inbox::default());
        assert!(matches!(
            Orchestrator::new(&Config::default(), Vec::new(), sink),
            Err(AppError::Config(_))
        ));
    }

    /// Accepts everything, up to a small limit.
    struct Narrow;

    #[async_trait]
    impl DeliverySink for Narrow {
        fn hard_limit(&self) -> usize {
            20
        }

        async fn deliver(&self, _text: &str) -> std::result::Result<Ack, DeliveryError> {
            Ok(Ack { status: None })
        }
    }

    #[test]
    fn test_messages_checked_against_sink_limit() {
        let sources = vec![Arc::new(Listing::new("a", vec![])) as Arc<dyn SourceAdapter>];

        let res = Orchestrator::new(&Config::default(), sources.clone(), Arc::new(Narrow));
        assert!(matches!(res, Err(AppError::Validation(_))));

        let mut config = Config::default();
        config.delivery.header = "H\n".into();
        config.delivery.continuation_header = "C{page}\n".into();
        config.delivery.truncation_marker = "~".into();
        config.delivery.no_results_message = "nada".into();
        assert!(Orchestrator::new(&config, sources, Arc::new(Narrow)).is_ok());
    }

    #[tokio::test]
    async fn test_run_delivers_accepted_postings() {
        let sink = Arc::new(Inbox::default());
        let mut orch = orchestrator(
            &Config::default(),
            vec![Listing::new(
                "a",
                vec!["Estágio em TI - Salvador", "Gerente Comercial Sênior", "Aceitar cookies"],
            )],
            Arc::clone(&sink),
        );

        let summary = orch.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(orch.state(), RunState::Done);
        assert_eq!(summary.raw_total, 3);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.novel, 1);
        assert_eq!(summary.batches_sent, 1);
        assert!(!summary.no_results_sent);
        assert_eq!(summary.rejected.values().sum::<usize>(), 2);
        assert!(summary.is_clean());

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Estágio em TI - Salvador"));
        assert!(messages[0].contains("https://x/a/0"));
    }

    #[tokio::test]
    async fn test_second_run_of_session_sends_no_results() {
        let sink = Arc::new(Inbox::default());
        let mut orch = orchestrator(
            &Config::default(),
            vec![Listing::new("a", vec!["Desenvolvedor Rust"])],
            Arc::clone(&sink),
        );

        let first = orch.run(&CancellationToken::new()).await.unwrap();
        let second = orch.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(first.novel, 1);
        assert_eq!(second.accepted, 1);
        assert_eq!(second.novel, 0);
        assert!(second.no_results_sent);
        assert_eq!(second.batches_sent, 0);
        assert_eq!(orch.fingerprints().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_source_is_degraded_not_fatal() {
        let sink = Arc::new(Inbox::default());
        let mut broken = Listing::new("broken", vec![]);
        broken.fail = true;
        let mut orch = orchestrator(
            &Config::default(),
            vec![broken, Listing::new("ok", vec!["Analista de Suporte Técnico"])],
            Arc::clone(&sink),
        );

        let summary = orch.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.failures, vec![SourceId::from("broken")]);
        let stats = summary.source("broken").unwrap();
        assert!(stats.exhausted);
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.failed_attempts, 2);
        assert_eq!(summary.source("ok").unwrap().novel, 1);
        assert_eq!(summary.batches_sent, 1);
        assert!(!summary.is_clean());
    }

    #[tokio::test]
    async fn test_concurrent_mode_keeps_configuration_order() {
        let mut config = Config::default();
        config.fetch.mode = FetchMode::Concurrent;
        config.fetch.max_concurrent = 2;

        let mut slow = Listing::new("slow", vec!["Desenvolvedor Python"]);
        slow.delay = Duration::from_millis(50);
        let fast = Listing::new("fast", vec!["Desenvolvedor Java"]);

        let sink = Arc::new(Inbox::default());
        let mut orch = orchestrator(&config, vec![slow, fast], Arc::clone(&sink));
        let summary = orch.run(&CancellationToken::new()).await.unwrap();

        let ids: Vec<&str> = summary.sources.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(ids, vec!["slow", "fast"]);

        let messages = sink.messages.lock().unwrap();
        let python = messages[0].find("Desenvolvedor Python").unwrap();
        let java = messages[0].find("Desenvolvedor Java").unwrap();
        assert!(python < java);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_gate_spans_runs() {
        let mut config = Config::default();
        config.fetch.min_interval_secs = 60;
        let sink = Arc::new(Inbox::default());
        let mut orch = orchestrator(
            &config,
            vec![Listing::new("a", vec!["Desenvolvedor Rust"])],
            Arc::clone(&sink),
        );
        assert_eq!(orch.rate_limiter().min_interval(), Duration::from_secs(60));

        let start = tokio::time::Instant::now();
        orch.run(&CancellationToken::new()).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));

        let second = tokio::time::Instant::now();
        let summary = orch.run(&CancellationToken::new()).await.unwrap();
        assert!(second.elapsed() >= Duration::from_secs(59));
        assert_eq!(summary.source("a").unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch_delivers_nothing() {
        let sink = Arc::new(Inbox::default());
        let mut orch = orchestrator(
            &Config::default(),
            vec![Listing::new("a", vec!["Desenvolvedor Rust"])],
            Arc::clone(&sink),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = orch.run(&cancel).await.unwrap();

        assert!(summary.cancelled);
        assert!(summary.source("a").unwrap().cancelled);
        assert!(sink.messages.lock().unwrap().is_empty());
        assert!(orch.fingerprints().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_fingerprints() {
        let sink = Arc::new(Inbox {
            fail: true,
            ..Inbox::default()
        });
        let mut orch = orchestrator(
            &Config::default(),
            vec![Listing::new("a", vec!["Desenvolvedor Rust"])],
            Arc::clone(&sink),
        );

        let summary = orch.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.batches_sent, 0);
        assert_eq!(summary.delivery_failures, 1);
        assert_eq!(orch.fingerprints().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_candidates_counted_as_invalid() {
        let sink = Arc::new(Inbox::default());
        let mut orch = orchestrator(
            &Config::default(),
            vec![Listing::new("a", vec!["TI", "Desenvolvedor Go"])],
            Arc::clone(&sink),
        );

        let summary = orch.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.rejected_by(RejectReason::Malformed), 1);
        assert_eq!(summary.accepted, 1);
    }
}
