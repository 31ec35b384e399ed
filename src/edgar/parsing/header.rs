use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;

static TEXT_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<TEXT>").unwrap());
static TEXT_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</TEXT>").unwrap());
static SEC_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:SEC-HEADER|IMS-HEADER)>(.*?)</(?:SEC-HEADER|IMS-HEADER)>").unwrap());
static DOCUMENT_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*<TYPE>\s*([^\s<]+)").unwrap());
static SUBMISSION_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*CONFORMED SUBMISSION TYPE:\s*(\S+)").unwrap());

/// Body of the first `<TEXT>` wrapper when it opens within `scan_chars` of the start.
///
/// Full submission files put several `<DOCUMENT>`s back to back; only the
/// first one is the filing itself, so the body ends at the first `</TEXT>`.
pub fn unwrap_text(raw: &str, scan_chars: usize) -> &str {
    let window_end = raw
        .char_indices()
        .nth(scan_chars)
        .map(|(i, _)| i)
        .unwrap_or(raw.len());

    let open = match TEXT_OPEN.find(&raw[..window_end]) {
        Some(m) => m,
        None => return raw,
    };
    let body = &raw[open.end()..];
    match TEXT_CLOSE.find(body) {
        Some(close) => &body[..close.start()],
        None => body,
    }
}

/// Key/value fields of an SGML submission header, keyed `GROUP:KEY`.
pub fn header_fields(raw: &str) -> Vec<(String, String)> {
    let mut data = Vec::new();

    let header = match SEC_HEADER.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => return data,
    };

    let mut current_group = String::new();
    for line in header.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indented = line.starts_with('\t') || line.starts_with(' ');
        let line = line.trim();
        if line.starts_with('<') && line.ends_with('>') {
            continue;
        }
        if let Some(colon_index) = line.find(':') {
            let key = line[..colon_index].trim();
            let value = decode_html_entities(line[colon_index + 1..].trim()).into_owned();
            if value.is_empty() {
                current_group = key.to_string();
            } else if indented && !current_group.is_empty() {
                data.push((format!("{}:{}", current_group, key), value));
            } else {
                current_group.clear();
                data.push((key.to_string(), value));
            }
        }
    }

    data
}

/// Form type named by the submission itself, if any.
pub fn detect_form_type(raw: &str) -> Option<String> {
    SUBMISSION_TYPE
        .captures(raw)
        .or_else(|| DOCUMENT_TYPE.captures(raw))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMISSION: &str = "<SEC-HEADER>0000950123-01-500000.hdr.sgml : 20010315
ACCESSION NUMBER:\t\t0000950123-01-500000
CONFORMED SUBMISSION TYPE:\t8-K
FILER:

\tCOMPANY DATA:\t
\t\tCOMPANY CONFORMED NAME:\t\t\tACME &amp; SONS INC
</SEC-HEADER>
<DOCUMENT>
<TYPE>8-K
<SEQUENCE>1
<TEXT>
Item 5.  Other Events
</TEXT>
</DOCUMENT>
<DOCUMENT>
<TYPE>EX-99
<TEXT>
exhibit body
</TEXT>
</DOCUMENT>";

    #[test]
    fn test_unwrap_text_takes_first_document_only() {
        let body = unwrap_text("<DOCUMENT>\n<TYPE>8-K\n<TEXT>\nItem 5.  Other Events\n</TEXT>\n</DOCUMENT>", 500);
        assert_eq!(body.trim(), "Item 5.  Other Events");
        assert_eq!(unwrap_text("<html><body>x</body></html>", 500), "<html><body>x</body></html>");
    }

    #[test]
    fn test_unwrap_text_respects_scan_window() {
        let late = format!("{}<TEXT>body</TEXT>", " ".repeat(600));
        assert_eq!(unwrap_text(&late, 500), late.as_str());
    }

    #[test]
    fn test_header_fields_and_form_type() {
        let fields = header_fields(SUBMISSION);
        assert!(fields.contains(&("CONFORMED SUBMISSION TYPE".to_string(), "8-K".to_string())));
        assert!(fields.contains(&(
            "COMPANY DATA:COMPANY CONFORMED NAME".to_string(),
            "ACME & SONS INC".to_string()
        )));
        assert_eq!(detect_form_type(SUBMISSION), Some("8-K".to_string()));
        assert_eq!(detect_form_type("<TYPE>10-k405\n<TEXT>"), Some("10-K405".to_string()));
        assert_eq!(detect_form_type("<html></html>"), None);
    }
}
