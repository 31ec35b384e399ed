use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::{EnumIter, IntoEnumIterator};

/// Filing form type. Amendments and legacy variants fold into their base form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(try_from = "String", into = "String")]
pub enum ReportType {
    Form10K,
    Form10Q,
    Form8K,
    Form6K,
    Form20F,
    Other(String),
}

impl TryFrom<String> for ReportType {
    type Error = String;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        code.parse()
    }
}

impl From<ReportType> for String {
    fn from(report: ReportType) -> Self {
        report.to_string()
    }
}

impl ReportType {
    /// Canonical form code, e.g. `10-K`.
    pub fn code(&self) -> &str {
        match self {
            ReportType::Form10K => "10-K",
            ReportType::Form10Q => "10-Q",
            ReportType::Form8K => "8-K",
            ReportType::Form6K => "6-K",
            ReportType::Form20F => "20-F",
            ReportType::Other(code) => code,
        }
    }

    /// Comma-separated codes of every recognised form.
    pub fn list_types() -> &'static str {
        &KNOWN_CODES
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ReportType::Other(_))
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

static KNOWN_CODES: Lazy<String> = Lazy::new(|| {
    ReportType::iter()
        .filter(ReportType::is_known)
        .map(|form| form.code().to_string())
        .collect::<Vec<_>>()
        .join(", ")
});

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_uppercase();
        let base = upper.strip_suffix("/A").unwrap_or(&upper);
        let form = match base {
            "10-K" | "10-K405" | "10-KSB" | "10-KSB40" | "10-KT" => ReportType::Form10K,
            "10-Q" | "10-QSB" | "10-QT" => ReportType::Form10Q,
            "8-K" | "8-K12B" | "8-K12G3" => ReportType::Form8K,
            "6-K" => ReportType::Form6K,
            "20-F" => ReportType::Form20F,
            _ => ReportType::Other(trimmed.to_string()),
        };
        Ok(form)
    }
}
