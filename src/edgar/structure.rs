//! Static catalog of the parts and items each form type is expected to carry,
//! and the order in which section strategies are tried per form.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::parsing::classify::{
    compare_items, item_label, normalize_item, normalize_part, part_label, roman_value,
    ItemPattern,
};
use super::report::ReportType;

/// Independent ways of recovering a section's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    /// Internal table of contents with `#anchor` links.
    TocAnchors,
    /// Item-to-page tables resolved through printed page numbers.
    CrossReferenceIndex,
    /// Chunks labeled with the form's own item pattern.
    ItemPattern,
    /// Chunks labeled with the generic item pattern.
    Chunks,
    /// Line-start item headers in plain text.
    PlainText,
}

#[derive(Debug)]
pub struct ItemDescription {
    pub item: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct PartDescription {
    /// `None` for item-only forms.
    pub part: Option<&'static str>,
    pub items: &'static [ItemDescription],
}

#[derive(Debug)]
pub struct FilingStructure {
    pub form: &'static str,
    pub parts: &'static [PartDescription],
    pub strategies: &'static [Strategy],
    /// Item numbers recur across parts, so lookups must agree on the part.
    pub part_qualified: bool,
    pub item_pattern: ItemPattern,
}

const fn item(item: &'static str, title: &'static str, description: &'static str) -> ItemDescription {
    ItemDescription {
        item,
        title,
        description,
    }
}

const ANNUAL_STRATEGIES: &[Strategy] = &[
    Strategy::TocAnchors,
    Strategy::Chunks,
    Strategy::CrossReferenceIndex,
    Strategy::PlainText,
];
const QUARTERLY_STRATEGIES: &[Strategy] = &[Strategy::TocAnchors, Strategy::Chunks, Strategy::PlainText];
const CURRENT_STRATEGIES: &[Strategy] = &[Strategy::ItemPattern, Strategy::Chunks, Strategy::PlainText];
const UNKNOWN_STRATEGIES: &[Strategy] = &[Strategy::Chunks, Strategy::PlainText];

const ANNUAL_PARTS: &[PartDescription] = &[
    PartDescription {
        part: Some("I"),
        items: &[
            item("1", "Business", "Description of the business, products, segments and competition."),
            item("1A", "Risk Factors", "Material risks to the business and its securities."),
            item("1B", "Unresolved Staff Comments", "Open comments from the Commission staff."),
            item("1C", "Cybersecurity", "Cybersecurity risk management, strategy and governance."),
            item("2", "Properties", "Principal physical properties."),
            item("3", "Legal Proceedings", "Material pending legal proceedings."),
            item("4", "Mine Safety Disclosures", "Mine safety violations and other regulatory matters."),
        ],
    },
    PartDescription {
        part: Some("II"),
        items: &[
            item(
                "5",
                "Market for Registrant's Common Equity, Related Stockholder Matters and Issuer Purchases of Equity Securities",
                "Trading market, holders, dividends and repurchases.",
            ),
            item("6", "Selected Financial Data", "Historical selected financial data; reserved in recent filings."),
            item(
                "7",
                "Management's Discussion and Analysis of Financial Condition and Results of Operations",
                "Management's view of results, liquidity and capital resources.",
            ),
            item(
                "7A",
                "Quantitative and Qualitative Disclosures About Market Risk",
                "Exposure to interest rate, currency and commodity risk.",
            ),
            item("8", "Financial Statements and Supplementary Data", "Audited financial statements and notes."),
            item(
                "9",
                "Changes in and Disagreements with Accountants on Accounting and Financial Disclosure",
                "Changes of auditor and disagreements with them.",
            ),
            item("9A", "Controls and Procedures", "Disclosure controls and internal control over financial reporting."),
            item("9B", "Other Information", "Information required on Form 8-K but not reported."),
            item(
                "9C",
                "Disclosure Regarding Foreign Jurisdictions that Prevent Inspections",
                "Auditor inspection restrictions abroad.",
            ),
        ],
    },
    PartDescription {
        part: Some("III"),
        items: &[
            item(
                "10",
                "Directors, Executive Officers and Corporate Governance",
                "Board, executive officers and governance practices.",
            ),
            item("11", "Executive Compensation", "Compensation of named executive officers."),
            item(
                "12",
                "Security Ownership of Certain Beneficial Owners and Management and Related Stockholder Matters",
                "Major holders and equity compensation plans.",
            ),
            item(
                "13",
                "Certain Relationships and Related Transactions, and Director Independence",
                "Related party transactions and director independence.",
            ),
            item("14", "Principal Accountant Fees and Services", "Fees paid to the independent auditor."),
        ],
    },
    PartDescription {
        part: Some("IV"),
        items: &[
            item("15", "Exhibits and Financial Statement Schedules", "Exhibit index and schedules."),
            item("16", "Form 10-K Summary", "Optional summary of the report."),
        ],
    },
];

const QUARTERLY_PARTS: &[PartDescription] = &[
    PartDescription {
        part: Some("I"),
        items: &[
            item("1", "Financial Statements", "Unaudited interim financial statements."),
            item(
                "2",
                "Management's Discussion and Analysis of Financial Condition and Results of Operations",
                "Management's view of interim results.",
            ),
            item(
                "3",
                "Quantitative and Qualitative Disclosures About Market Risk",
                "Changes in market risk exposure.",
            ),
            item("4", "Controls and Procedures", "Disclosure controls and internal control changes."),
        ],
    },
    PartDescription {
        part: Some("II"),
        items: &[
            item("1", "Legal Proceedings", "Material pending legal proceedings."),
            item("1A", "Risk Factors", "Material changes to risk factors."),
            item(
                "2",
                "Unregistered Sales of Equity Securities and Use of Proceeds",
                "Unregistered sales and issuer repurchases.",
            ),
            item("3", "Defaults Upon Senior Securities", "Defaults on senior debt or preferred dividends."),
            item("4", "Mine Safety Disclosures", "Mine safety violations and other regulatory matters."),
            item("5", "Other Information", "Information not reported elsewhere."),
            item("6", "Exhibits", "Exhibit index."),
        ],
    },
];

const CURRENT_PARTS: &[PartDescription] = &[PartDescription {
    part: None,
    items: &[
        item("1.01", "Entry into a Material Definitive Agreement", "A material agreement outside the ordinary course."),
        item("1.02", "Termination of a Material Definitive Agreement", "Termination of a material agreement."),
        item("1.03", "Bankruptcy or Receivership", "Bankruptcy, receivership or similar proceedings."),
        item(
            "1.04",
            "Mine Safety - Reporting of Shutdowns and Patterns of Violations",
            "Mine shutdown orders and violation notices.",
        ),
        item("1.05", "Material Cybersecurity Incidents", "A cybersecurity incident determined to be material."),
        item(
            "2.01",
            "Completion of Acquisition or Disposition of Assets",
            "A significant acquisition or disposition closed.",
        ),
        item("2.02", "Results of Operations and Financial Condition", "Earnings announcements."),
        item(
            "2.03",
            "Creation of a Direct Financial Obligation or an Obligation under an Off-Balance Sheet Arrangement of a Registrant",
            "New material debt or off-balance sheet obligations.",
        ),
        item(
            "2.04",
            "Triggering Events That Accelerate or Increase a Direct Financial Obligation or an Obligation under an Off-Balance Sheet Arrangement",
            "Acceleration of material obligations.",
        ),
        item("2.05", "Costs Associated with Exit or Disposal Activities", "Restructuring commitments."),
        item("2.06", "Material Impairments", "Material impairment charges."),
        item(
            "3.01",
            "Notice of Delisting or Failure to Satisfy a Continued Listing Rule or Standard; Transfer of Listing",
            "Exchange listing notices.",
        ),
        item("3.02", "Unregistered Sales of Equity Securities", "Unregistered equity sales."),
        item("3.03", "Material Modification to Rights of Security Holders", "Changes to security holder rights."),
        item("4.01", "Changes in Registrant's Certifying Accountant", "Auditor resignation or dismissal."),
        item(
            "4.02",
            "Non-Reliance on Previously Issued Financial Statements or a Related Audit Report or Completed Interim Review",
            "Restatement notices.",
        ),
        item("5.01", "Changes in Control of Registrant", "Change of control."),
        item(
            "5.02",
            "Departure of Directors or Certain Officers; Election of Directors; Appointment of Certain Officers; Compensatory Arrangements of Certain Officers",
            "Board and officer changes.",
        ),
        item(
            "5.03",
            "Amendments to Articles of Incorporation or Bylaws; Change in Fiscal Year",
            "Charter, bylaw or fiscal year changes.",
        ),
        item(
            "5.04",
            "Temporary Suspension of Trading Under Registrant's Employee Benefit Plans",
            "Benefit plan blackout periods.",
        ),
        item(
            "5.05",
            "Amendment to Registrant's Code of Ethics, or Waiver of a Provision of the Code of Ethics",
            "Code of ethics changes and waivers.",
        ),
        item("5.06", "Change in Shell Company Status", "Exit from shell company status."),
        item("5.07", "Submission of Matters to a Vote of Security Holders", "Shareholder meeting results."),
        item("5.08", "Shareholder Director Nominations", "Nomination deadlines for shareholder candidates."),
        item("6.01", "ABS Informational and Computational Material", "Asset-backed securities material."),
        item("6.02", "Change of Servicer or Trustee", "Asset-backed servicer or trustee changes."),
        item("6.03", "Change in Credit Enhancement or Other External Support", "Asset-backed credit support changes."),
        item("6.04", "Failure to Make a Required Distribution", "Missed asset-backed distributions."),
        item("6.05", "Securities Act Updating Disclosure", "Asset-backed pool updates."),
        item("7.01", "Regulation FD Disclosure", "Information furnished under Regulation FD."),
        item("8.01", "Other Events", "Events the registrant deems important."),
        item("9.01", "Financial Statements and Exhibits", "Financial statements and exhibits filed with the report."),
    ],
}];

const FOREIGN_ANNUAL_PARTS: &[PartDescription] = &[
    PartDescription {
        part: Some("I"),
        items: &[
            item("1", "Identity of Directors, Senior Management and Advisers", "Not applicable to annual reports."),
            item("2", "Offer Statistics and Expected Timetable", "Not applicable to annual reports."),
            item("3", "Key Information", "Capitalization, risk factors and reasons for the offer."),
            item("4", "Information on the Company", "History, business overview and property."),
            item("4A", "Unresolved Staff Comments", "Open comments from the Commission staff."),
            item("5", "Operating and Financial Review and Prospects", "Results of operations and liquidity."),
            item("6", "Directors, Senior Management and Employees", "Board, management and compensation."),
            item("7", "Major Shareholders and Related Party Transactions", "Major holders and related parties."),
            item("8", "Financial Information", "Consolidated statements and legal proceedings."),
            item("9", "The Offer and Listing", "Listing details and markets."),
            item("10", "Additional Information", "Share capital, charter, taxation and documents."),
            item(
                "11",
                "Quantitative and Qualitative Disclosures About Market Risk",
                "Exposure to market risk.",
            ),
            item(
                "12",
                "Description of Securities Other than Equity Securities",
                "Debt, warrants and depositary shares.",
            ),
        ],
    },
    PartDescription {
        part: Some("II"),
        items: &[
            item("13", "Defaults, Dividend Arrearages and Delinquencies", "Payment defaults."),
            item(
                "14",
                "Material Modifications to the Rights of Security Holders and Use of Proceeds",
                "Changes to holder rights.",
            ),
            item("15", "Controls and Procedures", "Disclosure controls and internal control."),
            item("16", "[Reserved]", "Reserved."),
            item("16A", "Audit Committee Financial Expert", "Financial expert on the audit committee."),
            item("16B", "Code of Ethics", "Code of ethics for senior officers."),
            item("16C", "Principal Accountant Fees and Services", "Fees paid to the auditor."),
            item(
                "16D",
                "Exemptions from the Listing Standards for Audit Committees",
                "Audit committee listing exemptions.",
            ),
            item(
                "16E",
                "Purchases of Equity Securities by the Issuer and Affiliated Purchasers",
                "Share repurchases.",
            ),
            item("16F", "Change in Registrant's Certifying Accountant", "Auditor changes."),
            item("16G", "Corporate Governance", "Differences from home-market governance practice."),
            item("16H", "Mine Safety Disclosure", "Mine safety violations."),
            item(
                "16I",
                "Disclosure Regarding Foreign Jurisdictions that Prevent Inspections",
                "Auditor inspection restrictions abroad.",
            ),
            item("16J", "Insider Trading Policies", "Insider trading policies and procedures."),
        ],
    },
    PartDescription {
        part: Some("III"),
        items: &[
            item("17", "Financial Statements", "Financial statements under Item 17."),
            item("18", "Financial Statements", "Financial statements under Item 18."),
            item("19", "Exhibits", "Exhibit index."),
        ],
    },
];

pub static ANNUAL_REPORT: FilingStructure = FilingStructure {
    form: "10-K",
    parts: ANNUAL_PARTS,
    strategies: ANNUAL_STRATEGIES,
    part_qualified: false,
    item_pattern: ItemPattern::Generic,
};

pub static QUARTERLY_REPORT: FilingStructure = FilingStructure {
    form: "10-Q",
    parts: QUARTERLY_PARTS,
    strategies: QUARTERLY_STRATEGIES,
    part_qualified: true,
    item_pattern: ItemPattern::Generic,
};

pub static CURRENT_REPORT: FilingStructure = FilingStructure {
    form: "8-K",
    parts: CURRENT_PARTS,
    strategies: CURRENT_STRATEGIES,
    part_qualified: false,
    item_pattern: ItemPattern::Decimal,
};

pub static FOREIGN_CURRENT_REPORT: FilingStructure = FilingStructure {
    form: "6-K",
    parts: CURRENT_PARTS,
    strategies: CURRENT_STRATEGIES,
    part_qualified: false,
    item_pattern: ItemPattern::Decimal,
};

pub static FOREIGN_ANNUAL_REPORT: FilingStructure = FilingStructure {
    form: "20-F",
    parts: FOREIGN_ANNUAL_PARTS,
    strategies: ANNUAL_STRATEGIES,
    part_qualified: false,
    item_pattern: ItemPattern::Generic,
};

pub static UNKNOWN_FORM: FilingStructure = FilingStructure {
    form: "",
    parts: &[],
    strategies: UNKNOWN_STRATEGIES,
    part_qualified: false,
    item_pattern: ItemPattern::Generic,
};

/// One catalog entry in a structure report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedItem {
    pub part: Option<String>,
    pub item: String,
    pub title: String,
}

/// Which catalog items a particular filing actually contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureReport {
    pub form: String,
    pub found: Vec<ReportedItem>,
    pub missing: Vec<ReportedItem>,
    /// Detected labels the catalog does not describe, as `Item N` strings.
    pub extra: Vec<String>,
}

impl FilingStructure {
    pub fn for_report(report: &ReportType) -> &'static FilingStructure {
        match report {
            ReportType::Form10K => &ANNUAL_REPORT,
            ReportType::Form10Q => &QUARTERLY_REPORT,
            ReportType::Form8K => &CURRENT_REPORT,
            ReportType::Form6K => &FOREIGN_CURRENT_REPORT,
            ReportType::Form20F => &FOREIGN_ANNUAL_REPORT,
            ReportType::Other(_) => &UNKNOWN_FORM,
        }
    }

    pub fn for_form(form: &str) -> &'static FilingStructure {
        match form.parse::<ReportType>() {
            Ok(report) => Self::for_report(&report),
            Err(_) => &UNKNOWN_FORM,
        }
    }

    /// Every catalog entry with its part, in catalog order.
    pub fn items(&self) -> impl Iterator<Item = (Option<&'static str>, &'static ItemDescription)> + '_ {
        self.parts
            .iter()
            .flat_map(|p| p.items.iter().map(move |i| (p.part, i)))
    }

    pub fn get_item(&self, item: &str, part: Option<&str>) -> Option<&'static ItemDescription> {
        let item = normalize_item(item);
        let part = part.map(normalize_part);
        self.items()
            .find(|(p, i)| {
                i.item == item
                    && match (&part, p) {
                        (Some(wanted), Some(p)) => wanted == p,
                        (Some(_), None) => false,
                        (None, _) => true,
                    }
            })
            .map(|(_, i)| i)
    }

    pub fn is_valid_item(&self, item: &str, part: Option<&str>) -> bool {
        self.get_item(item, part).is_some()
    }

    /// First part that lists `item`.
    pub fn part_of(&self, item: &str) -> Option<&'static str> {
        let item = normalize_item(item);
        self.items()
            .find(|(_, i)| i.item == item)
            .and_then(|(p, _)| p)
    }

    /// Overlays detected `(part, item)` labels on the catalog.
    pub fn report(&self, detected: &[(Option<String>, String)]) -> StructureReport {
        let detected: Vec<(Option<String>, String)> = detected
            .iter()
            .map(|(p, i)| (p.as_deref().map(normalize_part), normalize_item(i)))
            .collect();
        let is_detected = |part: Option<&str>, item: &str| {
            detected.iter().any(|(p, i)| {
                i == item && (!self.part_qualified || p.is_none() || p.as_deref() == part)
            })
        };

        let mut found = Vec::new();
        let mut missing = Vec::new();
        for (part, description) in self.items() {
            let reported = ReportedItem {
                part: part.map(part_label),
                item: item_label(description.item),
                title: description.title.to_string(),
            };
            if is_detected(part, description.item) {
                found.push(reported);
            } else {
                missing.push(reported);
            }
        }

        let mut extra: Vec<String> = detected
            .iter()
            .filter(|(p, i)| !self.is_valid_item(i, if self.part_qualified { p.as_deref() } else { None }))
            .map(|(_, i)| item_label(i))
            .collect();
        extra.sort_by(|a, b| compare_items(a, b));
        extra.dedup();

        StructureReport {
            form: self.form.to_string(),
            found,
            missing,
            extra,
        }
    }
}

/// Document order of `(part, item)` pairs: by part numeral, then natural item order.
pub fn compare_sections(a: (Option<&str>, &str), b: (Option<&str>, &str)) -> Ordering {
    let part_rank = |p: Option<&str>| p.map(|p| roman_value(&normalize_part(p))).unwrap_or(0);
    part_rank(a.0)
        .cmp(&part_rank(b.0))
        .then_with(|| compare_items(a.1, b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let annual = FilingStructure::for_report(&ReportType::Form10K);
        assert_eq!(annual.get_item("Item 1.", None).map(|i| i.title), Some("Business"));
        assert!(annual.is_valid_item("7a", Some("Part II")));
        assert!(!annual.is_valid_item("7A", Some("I")));
        assert_eq!(annual.part_of("9B"), Some("II"));

        let quarterly = FilingStructure::for_report(&ReportType::Form10Q);
        assert_eq!(quarterly.get_item("1", Some("II")).map(|i| i.title), Some("Legal Proceedings"));
        assert_eq!(quarterly.get_item("1", None).map(|i| i.title), Some("Financial Statements"));

        let current = FilingStructure::for_report(&ReportType::Form8K);
        assert_eq!(current.get_item("2. 02", None).map(|i| i.title), Some("Results of Operations and Financial Condition"));
        assert!(!current.is_valid_item("2.02", Some("I")));
        assert_eq!(current.part_of("2.02"), None);
    }

    #[test]
    fn test_strategy_order_is_per_form() {
        assert_eq!(ANNUAL_REPORT.strategies[0], Strategy::TocAnchors);
        assert_eq!(CURRENT_REPORT.strategies[0], Strategy::ItemPattern);
        assert!(!QUARTERLY_REPORT.strategies.contains(&Strategy::CrossReferenceIndex));
        assert!(FOREIGN_ANNUAL_REPORT.strategies.contains(&Strategy::CrossReferenceIndex));
        assert_eq!(Strategy::TocAnchors.to_string(), "toc_anchors");
    }

    #[test]
    fn test_report_reconciles_casing() {
        let report = ANNUAL_REPORT.report(&[
            (Some("PART I".to_string()), "ITEM 1".to_string()),
            (None, "item 7a".to_string()),
            (None, "Item 99".to_string()),
        ]);
        assert!(report
            .found
            .iter()
            .any(|r| r.item == "Item 7A" && r.part.as_deref() == Some("PART II")));
        assert!(report.found.iter().any(|r| r.item == "Item 1"));
        assert!(report.missing.iter().any(|r| r.item == "Item 1A"));
        assert_eq!(report.extra, vec!["Item 99"]);
        assert_eq!(report.found.len() + report.missing.len(), ANNUAL_REPORT.items().count());
    }

    #[test]
    fn test_section_order() {
        let mut keys = vec![(Some("II"), "1"), (Some("I"), "2"), (Some("I"), "1A"), (None, "1")];
        keys.sort_by(|a, b| compare_sections(*a, *b));
        assert_eq!(keys, vec![(None, "1"), (Some("I"), "1A"), (Some("I"), "2"), (Some("II"), "1")]);
    }
}
