use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Calendar string encodings the host page's date parser might accept.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DateEncoding {
    /// 26/07/2024
    DayMonthYearSlash,
    /// 07/26/2024
    MonthDayYearSlash,
    /// 2024-07-26
    Iso,
    /// 26-07-2024
    DayMonthYearDash,
    /// 26-Jul-2024
    DayMonthNameYear,
}

impl DateEncoding {
    pub const DEFAULT_ORDER: [DateEncoding; 4] = [
        DateEncoding::DayMonthYearSlash,
        DateEncoding::MonthDayYearSlash,
        DateEncoding::Iso,
        DateEncoding::DayMonthNameYear,
    ];

    pub fn pattern(self) -> &'static str {
        match self {
            DateEncoding::DayMonthYearSlash => "%d/%m/%Y",
            DateEncoding::MonthDayYearSlash => "%m/%d/%Y",
            DateEncoding::Iso => "%Y-%m-%d",
            DateEncoding::DayMonthYearDash => "%d-%m-%Y",
            DateEncoding::DayMonthNameYear => "%d-%b-%Y",
        }
    }

    pub fn format(self, date: NaiveDate) -> String {
        date.format(self.pattern()).to_string()
    }
}

/// One pair of "from"/"to" strings to try.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateFormatCandidate {
    pub from_text: String,
    pub to_text: String,
    pub from_encoding: DateEncoding,
    pub to_encoding: DateEncoding,
}

/// Cartesian product of encodings for `from` and `to`, in priority order.
///
/// Pairs using the same encoding for both ends come first, in encoding
/// order, followed by the mixed pairs. Pairs whose texts coincide with an
/// earlier pair are skipped, so the result never exceeds
/// `from_variants.len() * to_variants.len()`.
pub fn build_candidates(
    from: NaiveDate,
    to: NaiveDate,
    from_variants: &[DateEncoding],
    to_variants: &[DateEncoding],
) -> Vec<DateFormatCandidate> {
    let mut matched = Vec::new();
    let mut mixed = Vec::new();

    for &from_encoding in from_variants {
        for &to_encoding in to_variants {
            let candidate = DateFormatCandidate {
                from_text: from_encoding.format(from),
                to_text: to_encoding.format(to),
                from_encoding,
                to_encoding,
            };
            if from_encoding == to_encoding {
                matched.push(candidate);
            } else {
                mixed.push(candidate);
            }
        }
    }

    let mut seen = HashSet::new();
    matched
        .into_iter()
        .chain(mixed)
        .filter(|candidate| seen.insert((candidate.from_text.clone(), candidate.to_text.clone())))
        .collect()
}
