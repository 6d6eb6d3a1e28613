use serde::{Deserialize, Serialize};
use std::fmt;

/// How the judge classified a statement against its evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    True,
    Plausible,
    Implausible,
    False,
}

impl Verdict {
    pub const ALL: [Verdict; 4] = [
        Verdict::True,
        Verdict::Plausible,
        Verdict::Implausible,
        Verdict::False,
    ];

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'a' => Some(Verdict::True),
            'b' => Some(Verdict::Plausible),
            'c' => Some(Verdict::Implausible),
            'd' => Some(Verdict::False),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::True => "True",
            Verdict::Plausible => "Plausible",
            Verdict::Implausible => "Implausible",
            Verdict::False => "False",
        };
        f.write_str(name)
    }
}

/// The result of asking the judge about one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgeOutcome {
    Verdict(Verdict),
    /// No evidence was available, so the judge was never asked.
    NoEvidence,
    /// The judge answered with something other than `a`-`d`. Holds the raw
    /// answer.
    Unrecognized(String),
}

impl JudgeOutcome {
    /// Decodes a judge answer from its first non-whitespace character.
    pub fn decode(answer: &str) -> Self {
        answer
            .trim_start()
            .chars()
            .next()
            .and_then(Verdict::from_letter)
            .map(JudgeOutcome::Verdict)
            .unwrap_or_else(|| JudgeOutcome::Unrecognized(answer.to_string()))
    }
}

/// Verdict counts for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub true_count: usize,
    pub plausible: usize,
    pub implausible: usize,
    pub false_count: usize,
    pub no_evidence: usize,
    pub unrecognized: usize,
}

impl Tally {
    pub fn record(&mut self, outcome: &JudgeOutcome) {
        match outcome {
            JudgeOutcome::Verdict(verdict) => self.add(*verdict, 1),
            JudgeOutcome::NoEvidence => self.no_evidence += 1,
            JudgeOutcome::Unrecognized(_) => self.unrecognized += 1,
        }
    }

    pub fn add(&mut self, verdict: Verdict, count: usize) {
        match verdict {
            Verdict::True => self.true_count += count,
            Verdict::Plausible => self.plausible += count,
            Verdict::Implausible => self.implausible += count,
            Verdict::False => self.false_count += count,
        }
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        match verdict {
            Verdict::True => self.true_count,
            Verdict::Plausible => self.plausible,
            Verdict::Implausible => self.implausible,
            Verdict::False => self.false_count,
        }
    }

    /// Statements that received one of the four verdicts. No-evidence and
    /// unrecognized answers are not part of it.
    pub fn total(&self) -> usize {
        Verdict::ALL.iter().map(|v| self.count(*v)).sum()
    }
}
