//! Rule-based posting classifier.
//!
//! Stages run in a fixed order and the first rejection wins:
//!
//! 1. structural validity (title length, absolute http(s) URL)
//! 2. interface noise (cookie banners, login prompts, pagination)
//! 3. exclusion domain, unless a strong domain signal overrides it
//! 4. domain signal requirement
//! 5. seniority band
//! 6. locality over title + URL
//!
//! The exclusion override must run before the domain requirement: a title
//! such as "Analista de Marketing em Tecnologia" is judged on its domain
//! signal instead of being dropped for "marketing".

use regex::RegexSet;

use crate::error::Result;
use crate::models::{ClassifierConfig, Posting, RawCandidate, RejectReason, Verdict};
use crate::utils::normalize_whitespace;

/// Fold text for term matching: lowercase, punctuation to spaces, single
/// spaces, one padding space on each end.
pub fn fold(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    format!(" {} ", normalize_whitespace(&lowered))
}

/// A case-insensitive substring term set.
#[derive(Debug, Clone, Default)]
pub struct TermSet {
    terms: Vec<String>,
}

impl TermSet {
    /// Build a set; leading/trailing spaces in a term are kept as word anchors.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .filter_map(|t| Self::fold_term(t.as_ref()))
            .collect();
        Self { terms }
    }

    fn fold_term(term: &str) -> Option<String> {
        let core = fold(term);
        let core = core.trim();
        if core.is_empty() {
            return None;
        }
        let lead = if term.starts_with(char::is_whitespace) { " " } else { "" };
        let trail = if term.ends_with(char::is_whitespace) { " " } else { "" };
        Some(format!("{lead}{core}{trail}"))
    }

    pub fn push(&mut self, term: &str) {
        if let Some(t) = Self::fold_term(term) {
            if !self.terms.contains(&t) {
                self.terms.push(t);
            }
        }
    }

    /// First term found in an already folded haystack.
    pub fn find(&self, folded: &str) -> Option<&str> {
        self.terms
            .iter()
            .find(|t| folded.contains(t.as_str()))
            .map(String::as_str)
    }

    pub fn matches(&self, folded: &str) -> bool {
        self.find(folded).is_some()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Result of the locality stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    /// Home locality or remote marker present
    Allowed,
    /// No locality term at all
    Unknown,
    /// A disallowed locality term is present
    Denied,
}

/// Ordered rule pipeline over raw candidates.
#[derive(Debug, Clone)]
pub struct Classifier {
    min_title_chars: usize,
    noise: RegexSet,
    strong_signal: TermSet,
    domain: TermSet,
    exclusion: TermSet,
    seniority: TermSet,
    locality_allow: TermSet,
    locality_deny: TermSet,
}

impl Classifier {
    /// Build a classifier from configuration, compiling noise patterns.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        Ok(Self {
            min_title_chars: config.min_title_chars,
            noise: RegexSet::new(&config.noise_patterns)?,
            strong_signal: TermSet::new(&config.strong_signal),
            domain: TermSet::new(&config.domain),
            exclusion: TermSet::new(&config.exclusion),
            seniority: TermSet::new(&config.seniority),
            locality_allow: TermSet::new(&config.locality_allow),
            locality_deny: TermSet::new(&config.locality_deny),
        })
    }

    /// Add the search's home locality (e.g. "Salvador") to the allow set.
    pub fn with_home_locality(mut self, locality: Option<&str>) -> Self {
        if let Some(home) = locality {
            self.locality_allow.push(home);
        }
        self
    }

    pub fn min_title_chars(&self) -> usize {
        self.min_title_chars
    }

    /// Classify one candidate. Pure: the same input always yields the same verdict.
    pub fn classify(&self, candidate: &RawCandidate) -> Verdict {
        if Posting::from_candidate(candidate, self.min_title_chars).is_err() {
            return Verdict::reject(RejectReason::Malformed);
        }

        let title = normalize_whitespace(&candidate.title);
        if self.noise.is_match(&title) {
            return Verdict::reject(RejectReason::InterfaceNoise);
        }

        let folded = fold(&title);
        let strong = self.strong_signal.matches(&folded);

        if !strong && self.exclusion.matches(&folded) {
            return Verdict::reject(RejectReason::ExcludedDomain);
        }

        if !strong && !self.domain.matches(&folded) {
            return Verdict::reject(RejectReason::NoDomainSignal);
        }

        if self.seniority.matches(&folded) {
            return Verdict::reject(RejectReason::Seniority);
        }

        if self.locality(candidate) == Locality::Denied {
            return Verdict::reject(RejectReason::Locality);
        }

        Verdict::accept()
    }

    /// Locality of a candidate judged over its title and URL.
    ///
    /// Any deny term rejects, even next to an allow term.
    pub fn locality(&self, candidate: &RawCandidate) -> Locality {
        let haystack = fold(&format!("{} {}", candidate.title, candidate.url));
        if self.locality_deny.matches(&haystack) {
            Locality::Denied
        } else if self.locality_allow.matches(&haystack) {
            Locality::Allowed
        } else {
            Locality::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceId;

    fn classifier() -> Classifier {
        Classifier::from_config(&ClassifierConfig::default())
            .unwrap()
            .with_home_locality(Some("Salvador"))
    }

    fn candidate(title: &str) -> RawCandidate {
        RawCandidate::new(title, "https://x/jobs/1", SourceId::from("test"))
    }

    fn reason(title: &str) -> Option<RejectReason> {
        classifier().classify(&candidate(title)).reason
    }

    #[test]
    fn test_fold() {
        assert_eq!(fold("Estágio em TI - Salvador/BA"), " estágio em ti salvador ba ");
        assert_eq!(fold(""), "  ");
    }

    #[test]
    fn test_term_anchors() {
        let set = TermSet::new([" ti ", "desenvolv"]);
        assert!(set.matches(&fold("Analista de TI")));
        assert!(!set.matches(&fold("Marketing Digital")));
        assert!(set.matches(&fold("Desenvolvedora Front-end")));
        assert_eq!(set.find(&fold("Suporte TI")), Some(" ti "));
    }

    #[test]
    fn test_term_set_skips_blank_terms() {
        let mut set = TermSet::new(["", "  ", "-"]);
        assert!(set.is_empty());
        set.push("Salvador");
        set.push("SALVADOR");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_accepts_it_internship_in_home_locality() {
        let verdict = classifier().classify(&candidate("Estágio em TI - Salvador"));
        assert_eq!(verdict, Verdict::accept());
    }

    #[test]
    fn test_short_titles_are_malformed() {
        for title in ["", "TI", "  Dev ", "abcd"] {
            assert_eq!(reason(title), Some(RejectReason::Malformed), "{title:?}");
        }
    }

    #[test]
    fn test_missing_or_relative_url_is_malformed() {
        let c = RawCandidate::new("Desenvolvedor Java", "/jobs/1", SourceId::from("test"));
        assert_eq!(
            classifier().classify(&c).reason,
            Some(RejectReason::Malformed)
        );
        let c = RawCandidate::new("Desenvolvedor Java", "", SourceId::from("test"));
        assert_eq!(
            classifier().classify(&c).reason,
            Some(RejectReason::Malformed)
        );
    }

    #[test]
    fn test_interface_noise() {
        assert_eq!(reason("Aceitar todos os cookies"), Some(RejectReason::InterfaceNoise));
        assert_eq!(reason("Fazer login"), Some(RejectReason::InterfaceNoise));
        assert_eq!(reason("Página 2 de 10"), Some(RejectReason::InterfaceNoise));
        assert_eq!(reason("Próximo"), Some(RejectReason::InterfaceNoise));
    }

    #[test]
    fn test_exclusion_without_signal() {
        assert_eq!(
            reason("Gerente Comercial Sênior"),
            Some(RejectReason::ExcludedDomain)
        );
        assert_eq!(
            reason("Assistente de Marketing"),
            Some(RejectReason::ExcludedDomain)
        );
    }

    #[test]
    fn test_strong_signal_overrides_exclusion() {
        assert_eq!(reason("Analista de Marketing em Tecnologia"), None);
        assert_eq!(reason("Desenvolvedor para time Comercial"), None);
    }

    #[test]
    fn test_override_still_needs_to_pass_later_stages() {
        assert_eq!(
            reason("Coordenador de Marketing e Tecnologia"),
            Some(RejectReason::Seniority)
        );
    }

    #[test]
    fn test_domain_signal_required() {
        assert_eq!(reason("Auxiliar Administrativo"), Some(RejectReason::NoDomainSignal));
        // "ti" inside another word is not a signal
        assert_eq!(reason("Estoquista Tático"), Some(RejectReason::NoDomainSignal));
    }

    #[test]
    fn test_seniority_rejected_regardless_of_signal() {
        assert_eq!(reason("Desenvolvedor Sênior"), Some(RejectReason::Seniority));
        assert_eq!(reason("Tech Lead Python"), Some(RejectReason::Seniority));
        assert_eq!(reason("Analista de Sistemas Sr"), Some(RejectReason::Seniority));
    }

    #[test]
    fn test_locality_stage() {
        let c = classifier();
        assert_eq!(c.locality(&candidate("Suporte de TI - Salvador")), Locality::Allowed);
        assert_eq!(c.locality(&candidate("Suporte de TI")), Locality::Unknown);
        assert_eq!(c.locality(&candidate("Suporte de TI - São Paulo")), Locality::Denied);
        assert_eq!(
            c.locality(&candidate("Suporte de TI - Remoto (São Paulo)")),
            Locality::Denied
        );

        assert_eq!(reason("Suporte de TI - São Paulo"), Some(RejectReason::Locality));
        assert_eq!(reason("Suporte de TI"), None);
    }

    #[test]
    fn test_deny_term_rejects_even_with_allow_term() {
        assert_eq!(
            reason("Desenvolvedor Java - São Paulo (Remoto)"),
            Some(RejectReason::Locality)
        );
        assert_eq!(
            reason("Desenvolvedor Java - Salvador ou São Paulo"),
            Some(RejectReason::Locality)
        );
        assert_eq!(reason("Desenvolvedor Java - Remoto"), None);
    }

    #[test]
    fn test_locality_looks_at_url() {
        let c = RawCandidate::new(
            "Analista de Suporte TI",
            "https://vagas.example/sao-paulo/123",
            SourceId::from("test"),
        );
        assert_eq!(
            classifier().classify(&c).reason,
            Some(RejectReason::Locality)
        );
    }

    #[test]
    fn test_classification_is_idempotent() {
        let c = classifier();
        for title in [
            "Estágio em TI - Salvador",
            "Gerente Comercial Sênior",
            "Aceitar cookies",
            "TI",
        ] {
            let cand = candidate(title);
            assert_eq!(c.classify(&cand), c.classify(&cand));
        }
    }

    #[test]
    fn test_invalid_noise_pattern_is_an_error() {
        let config = ClassifierConfig {
            noise_patterns: vec!["(".to_string()],
            ..ClassifierConfig::default()
        };
        assert!(Classifier::from_config(&config).is_err());
    }
}
