//! Diagnostics recorded while proxy types are generated.
//!
//! Member selection never fails because of a member it can not intercept. Sealed,
//! inaccessible and non-virtual members are left out of the generated shape, and
//! every exclusion is recorded as a [`Diagnostic`] so callers can find out why a
//! member bypasses their interceptors.
//!
//! A [`Diagnostics`] container belongs to each [`ProxyScope`](crate::proxy::ProxyScope)
//! and is shared by all generations of that scope. Entries are appended to a
//! `boxcar::Vec`, so concurrent generations record without locking.
//!
//! ```rust,ignore
//! use proxyscope::prelude::*;
//!
//! let generator = ProxyGenerator::new(registry.clone());
//! generator.create_class_proxy_type(&service, &[], &GenerationOptions::default())?;
//!
//! for entry in generator.scope().diagnostics().at_least(DiagnosticSeverity::Warning) {
//!     println!("{}", entry);
//! }
//! ```

use std::fmt;

use strum::Display;

use crate::metadata::token::Token;

/// How much a diagnostic matters. Ordered from `Info` to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum DiagnosticSeverity {
    /// A member that could never be intercepted, such as a sealed override
    Info,
    /// A member callers likely expected to be intercepted; calls to it bypass every
    /// interceptor
    Warning,
    /// Generation could not honour part of the request
    Error,
}

/// The kind of element a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DiagnosticCategory {
    /// Method selection
    Method,
    /// Property selection
    Property,
    /// Event selection
    Event,
    /// Mixin composition
    Mixin,
    /// The proxy type cache
    Cache,
    /// Anything else
    General,
}

/// One recorded entry.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// How much the entry matters
    pub severity: DiagnosticSeverity,
    /// What kind of element it is about
    pub category: DiagnosticCategory,
    /// Description, naming the member where there is one
    pub message: String,
    /// Token of the member the entry is about
    pub member: Option<Token>,
}

impl Diagnostic {
    /// Creates an entry that is not tied to a member.
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            member: None,
        }
    }

    /// Creates the entry for a member that was left out of a proxy type.
    pub fn excluded(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        member: &str,
        token: Token,
        reason: &str,
    ) -> Self {
        Self {
            severity,
            category,
            message: format!("Excluded {}: {}", member, reason),
            member: Some(token),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;
        match self.member {
            Some(token) => write!(f, " ({})", token),
            None => Ok(()),
        }
    }
}

/// Append-only, thread-safe list of diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.count()
    }

    /// Returns true if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.count() == 0
    }

    /// All entries in recording order
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// Entries of `severity` or worse
    pub fn at_least(&self, severity: DiagnosticSeverity) -> impl Iterator<Item = &Diagnostic> {
        self.iter().filter(move |entry| entry.severity >= severity)
    }

    /// Entries of one category
    pub fn of_category(&self, category: DiagnosticCategory) -> impl Iterator<Item = &Diagnostic> {
        self.iter().filter(move |entry| entry.category == category)
    }

    /// Entries about the member with `token`. A member excluded from several proxy
    /// types has one entry per generation.
    pub fn about(&self, token: Token) -> impl Iterator<Item = &Diagnostic> {
        self.iter().filter(move |entry| entry.member == Some(token))
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let warnings = self.at_least(DiagnosticSeverity::Warning).count();
        writeln!(f, "{} diagnostic(s), {} warning(s) or worse", self.len(), warnings)?;
        for entry in self.at_least(DiagnosticSeverity::Warning) {
            writeln!(f, "  {}", entry)?;
        }
        Ok(())
    }
}
