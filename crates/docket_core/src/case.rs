use std::fmt;

use chrono::NaiveDate;

/// `flagMisc` value recorded for a case with no retrievable document.
pub const REJECTED_FLAG: i64 = 9;

/// One bankruptcy filing tracked by court and docket identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub court: String,
    pub pacer_id: String,
    /// Filesystem-safe unique key; names both artifacts of the case.
    pub simple_name: String,
    pub date_filed: Option<NaiveDate>,
    pub flag_email: bool,
    pub flag_misc: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSimpleName(pub String);

impl fmt::Display for InvalidSimpleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "simple name {:?} is not a safe file stem", self.0)
    }
}

impl std::error::Error for InvalidSimpleName {}

impl Case {
    pub fn new(
        court: impl Into<String>,
        pacer_id: impl Into<String>,
        simple_name: impl Into<String>,
    ) -> Result<Self, InvalidSimpleName> {
        let simple_name = simple_name.into();
        if !is_safe_stem(&simple_name) {
            return Err(InvalidSimpleName(simple_name));
        }
        Ok(Self {
            court: court.into(),
            pacer_id: pacer_id.into(),
            simple_name,
            date_filed: None,
            flag_email: true,
            flag_misc: 0,
        })
    }

    pub fn with_date_filed(mut self, date: NaiveDate) -> Self {
        self.date_filed = Some(date);
        self
    }

    /// `{court}_{pacer_id}`, the identifier the portal uses in its routes.
    pub fn docket_key(&self) -> String {
        format!("{}_{}", self.court, self.pacer_id)
    }

    pub fn is_rejected(&self) -> bool {
        self.flag_misc == REJECTED_FLAG
    }
}

/// A stem may not be empty, contain path separators, or walk upwards.
pub(crate) fn is_safe_stem(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docket_key_joins_court_and_pacer_id() {
        let case = Case::new("nysb", "312345", "nysb-24-10001").unwrap();
        assert_eq!(case.docket_key(), "nysb_312345");
        assert!(!case.is_rejected());
    }

    #[test]
    fn rejects_unsafe_simple_names() {
        for bad in ["", ".", "../etc", "a/b", "a\\b"] {
            assert!(Case::new("c", "1", bad).is_err(), "{bad:?} accepted");
        }
        assert!(Case::new("c", "1", "deb-23-5.v2").is_ok());
    }
}
