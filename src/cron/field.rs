// src/cron/field.rs

//! Parsing of a single cron field into a bit set of allowed values.

use std::sync::LazyLock;

use regex::Regex;

/// One element of a comma-separated list: `*`, `?`, `N`, `N-M`, each with an
/// optional `/step`. Values may be names (`JAN`, `MON`) for month and
/// day-of-week.
static ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<any>[*?])|(?P<lo>[0-9A-Za-z]+)(?:-(?P<hi>[0-9A-Za-z]+))?)(?:/(?P<step>[0-9]+))?$")
        .expect("cron element regex compiles")
});

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Static description of one of the six positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldKind {
    pub name: &'static str,
    pub min: u32,
    pub max: u32,
    /// Names accepted in place of numbers; index 0 maps to `min`.
    names: &'static [&'static str],
    /// Whether `?` is accepted (day fields only).
    allows_question: bool,
}

pub(crate) const SECONDS: FieldKind = FieldKind {
    name: "seconds",
    min: 0,
    max: 59,
    names: &[],
    allows_question: false,
};
pub(crate) const MINUTES: FieldKind = FieldKind {
    name: "minutes",
    min: 0,
    max: 59,
    names: &[],
    allows_question: false,
};
pub(crate) const HOURS: FieldKind = FieldKind {
    name: "hours",
    min: 0,
    max: 23,
    names: &[],
    allows_question: false,
};
pub(crate) const DAYS_OF_MONTH: FieldKind = FieldKind {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    allows_question: true,
};
pub(crate) const MONTHS: FieldKind = FieldKind {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
    allows_question: false,
};
/// 0 and 7 both mean Sunday.
pub(crate) const DAYS_OF_WEEK: FieldKind = FieldKind {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: DAY_NAMES,
    allows_question: true,
};

impl FieldKind {
    fn value(&self, token: &str) -> Result<u32, String> {
        let v = if let Ok(n) = token.parse::<u32>() {
            n
        } else {
            let upper = token.to_ascii_uppercase();
            let idx = self
                .names
                .iter()
                .position(|n| *n == upper)
                .ok_or_else(|| format!("{} field: '{}' is not a number", self.name, token))?;
            self.min + idx as u32
        };

        if v < self.min || v > self.max {
            return Err(format!(
                "{} field: {} is out of range {}-{}",
                self.name, v, self.min, self.max
            ));
        }
        Ok(v)
    }

    /// Parse the whole field text into a bit set (bit `n` set means value `n`
    /// matches).
    pub fn parse(&self, text: &str) -> Result<u64, String> {
        let mut bits = 0u64;

        for element in text.split(',') {
            let caps = ELEMENT
                .captures(element)
                .ok_or_else(|| format!("{} field: cannot parse '{}'", self.name, element))?;

            let step = match caps.name("step") {
                Some(m) => {
                    let s: u32 = m
                        .as_str()
                        .parse()
                        .map_err(|_| format!("{} field: bad step '{}'", self.name, m.as_str()))?;
                    if s == 0 {
                        return Err(format!("{} field: step must be at least 1", self.name));
                    }
                    Some(s)
                }
                None => None,
            };

            let (lo, hi) = if let Some(any) = caps.name("any") {
                if any.as_str() == "?" && !self.allows_question {
                    return Err(format!("{} field: '?' is only valid for day fields", self.name));
                }
                (self.min, self.max)
            } else {
                let lo = caps
                    .name("lo")
                    .map(|m| self.value(m.as_str()))
                    .transpose()?
                    .unwrap_or(self.min);
                match caps.name("hi") {
                    Some(m) => {
                        let hi = self.value(m.as_str())?;
                        if hi < lo {
                            return Err(format!(
                                "{} field: range {}-{} is reversed",
                                self.name, lo, hi
                            ));
                        }
                        (lo, hi)
                    }
                    // `N/step` runs from N to the top of the field.
                    None if step.is_some() => (lo, self.max),
                    None => (lo, lo),
                }
            };

            let step = step.unwrap_or(1) as usize;
            for v in (lo..=hi).step_by(step) {
                bits |= 1 << v;
            }
        }

        if *self == DAYS_OF_WEEK && contains(bits, 7) {
            bits = (bits & !(1 << 7)) | 1;
        }

        Ok(bits)
    }
}

#[inline]
pub(crate) fn contains(bits: u64, value: u32) -> bool {
    bits & (1u64 << value) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(bits: u64) -> Vec<u32> {
        (0..64).filter(|v| contains(bits, *v)).collect()
    }

    #[test]
    fn star_covers_whole_range() {
        assert_eq!(values(HOURS.parse("*").unwrap()), (0..=23).collect::<Vec<_>>());
    }

    #[test]
    fn lists_ranges_and_steps() {
        assert_eq!(values(MINUTES.parse("1,5-7,*/20").unwrap()), vec![0, 1, 5, 6, 7, 20, 40]);
        assert_eq!(values(SECONDS.parse("10/15").unwrap()), vec![10, 25, 40, 55]);
        assert_eq!(values(HOURS.parse("8-17/3").unwrap()), vec![8, 11, 14, 17]);
    }

    #[test]
    fn names_for_months_and_days() {
        assert_eq!(values(MONTHS.parse("jan,MAR-may").unwrap()), vec![1, 3, 4, 5]);
        assert_eq!(values(DAYS_OF_WEEK.parse("MON-FRI").unwrap()), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn seven_is_sunday() {
        assert_eq!(values(DAYS_OF_WEEK.parse("7").unwrap()), vec![0]);
        assert_eq!(values(DAYS_OF_WEEK.parse("5-7").unwrap()), vec![0, 5, 6]);
    }

    #[test]
    fn question_mark_only_on_day_fields() {
        assert!(DAYS_OF_MONTH.parse("?").is_ok());
        assert!(DAYS_OF_WEEK.parse("?").is_ok());
        assert!(HOURS.parse("?").is_err());
    }

    #[test]
    fn rejects_malformed_elements() {
        for bad in ["", "60", "5-2", "*/0", "1,,2", "L", "15W", "MON#2", "abc", "1-"] {
            let field = if bad.contains("MON") { DAYS_OF_WEEK } else { MINUTES };
            assert!(field.parse(bad).is_err(), "'{bad}' should be rejected");
        }
        assert!(DAYS_OF_MONTH.parse("0").is_err());
        assert!(MONTHS.parse("13").is_err());
    }
}
