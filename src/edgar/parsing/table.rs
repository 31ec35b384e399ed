use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\$\(]*\s*-?[\d,]+(\.\d+)?\s*%?\)?%?$").unwrap());

const COLUMN_GAP: &str = "  ";

fn is_numeric(cell: &str) -> bool {
    NUMERIC_CELL.is_match(cell)
}

/// Financial tables split `$ 100` and `(5 )%` across cells; fold the symbols
/// back into their numbers while keeping the column count stable.
fn merge_symbol_cells(row: &[String]) -> Vec<String> {
    let mut cells: Vec<String> = row
        .iter()
        .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();

    for i in 0..cells.len() {
        match cells[i].as_str() {
            "$" => {
                if let Some(next) = (i + 1..cells.len()).find(|&j| !cells[j].is_empty()) {
                    if is_numeric(&cells[next]) {
                        cells[next] = format!("${}", cells[next]);
                        cells[i].clear();
                    }
                }
            }
            ")" | "%" | ")%" => {
                if let Some(prev) = (0..i).rev().find(|&j| !cells[j].is_empty()) {
                    let suffix = std::mem::take(&mut cells[i]);
                    cells[prev].push_str(&suffix);
                }
            }
            _ => {}
        }
    }
    cells
}

/// Renders table rows as fixed-width text, one line per non-empty row.
pub fn render_table(rows: &[Vec<String>], caption: Option<&str>) -> String {
    let merged: Vec<Vec<String>> = rows
        .iter()
        .map(|r| merge_symbol_cells(r))
        .filter(|r| r.iter().any(|c| !c.is_empty()))
        .collect();

    let columns = merged.iter().map(Vec::len).max().unwrap_or(0);
    let kept: Vec<usize> = (0..columns)
        .filter(|&col| {
            merged
                .iter()
                .any(|r| r.get(col).map(|c| !c.is_empty()).unwrap_or(false))
        })
        .collect();

    let widths: Vec<usize> = kept
        .iter()
        .map(|&col| {
            merged
                .iter()
                .filter_map(|r| r.get(col))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    if let Some(caption) = caption.map(str::trim).filter(|c| !c.is_empty()) {
        out.push_str(caption);
        out.push('\n');
    }

    for row in &merged {
        let line = kept
            .iter()
            .zip(&widths)
            .map(|(&col, &width)| {
                let cell = row.get(col).map(String::as_str).unwrap_or("");
                if is_numeric(cell) {
                    format!("{:>width$}", cell, width = width)
                } else {
                    format!("{:<width$}", cell, width = width)
                }
            })
            .collect::<Vec<_>>()
            .join(COLUMN_GAP);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_render_aligns_columns_and_drops_spacers() {
        let rows = vec![
            row(&["Segment", "", "2023", "", "2022"]),
            row(&["Cloud", "", "$", "1,200", "$", "900"]),
            row(&["", "", "", "", ""]),
            row(&["Devices", "", "85", "", "(12", ")"]),
        ];
        let text = render_table(&rows, Some("Revenue by segment"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Revenue by segment");
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains("$1,200"));
        assert!(lines[3].contains("(12)"));
        assert!(lines[1].starts_with("Segment"));
    }

    #[test]
    fn test_empty_table_renders_nothing() {
        assert_eq!(render_table(&[row(&["", " "])], None), "");
    }
}
