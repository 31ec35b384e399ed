use anyhow::{anyhow, Result};

pub const DEFAULT_MAX_DEPTH: usize = 256;
pub const DEFAULT_WRAPPER_SCAN_CHARS: usize = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseConfig {
    /// Hard cap on markup nesting followed by any tree walk.
    pub max_depth: usize,
    /// How far into the input an SGML `<TEXT>` wrapper may open.
    pub wrapper_scan_chars: usize,
    /// Form type used when neither the caller nor the submission names one.
    pub default_form: Option<String>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            wrapper_scan_chars: DEFAULT_WRAPPER_SCAN_CHARS,
            default_form: None,
        }
    }
}

fn usize_var(name: &str, default: usize) -> Result<usize> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} must be a non-negative integer, got '{}'", name, value)),
        Err(_) => Ok(default),
    }
}

impl ParseConfig {
    pub fn from_env() -> Result<Self> {
        let max_depth = usize_var("FILING_MAX_DEPTH", DEFAULT_MAX_DEPTH)?;
        if max_depth == 0 {
            return Err(anyhow!("FILING_MAX_DEPTH must be greater than zero"));
        }

        let wrapper_scan_chars = usize_var("FILING_WRAPPER_SCAN", DEFAULT_WRAPPER_SCAN_CHARS)?;

        let default_form = std::env::var("FILING_DEFAULT_FORM")
            .ok()
            .map(|form| form.trim().to_string())
            .filter(|form| !form.is_empty());

        Ok(Self {
            max_depth,
            wrapper_scan_chars,
            default_form,
        })
    }
}
