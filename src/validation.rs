// ✅ Request Guard - parameter checks run before anything is fetched

use crate::area;
use crate::config::{Settings, YearRange};
use crate::error::InvalidRequest;

pub const REGION_CODE_LEN: usize = 5;
pub const MAX_CODES_PER_REQUEST: usize = 50;

/// RequestGuard - year bounds and code-shape rules
#[derive(Debug, Clone)]
pub struct RequestGuard {
    population_years: YearRange,
    realestate_years: YearRange,
    max_codes: usize,
}

impl RequestGuard {
    pub fn new(population_years: YearRange, realestate_years: YearRange) -> Self {
        RequestGuard {
            population_years,
            realestate_years,
            max_codes: MAX_CODES_PER_REQUEST,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        RequestGuard::new(settings.population_years, settings.realestate_years)
    }

    /// In range and one of the currently available years
    pub fn population_year(&self, year: i32, available: &[i32]) -> Result<(), InvalidRequest> {
        check_range(year, self.population_years)?;
        if !available.contains(&year) {
            return Err(InvalidRequest::YearUnavailable {
                year,
                available: available.to_vec(),
            });
        }
        Ok(())
    }

    pub fn realestate_year(&self, year: i32) -> Result<(), InvalidRequest> {
        check_range(year, self.realestate_years)
    }

    /// Inclusive real-estate year range, start ≤ end, both in bounds
    pub fn realestate_years(&self, start: i32, end: i32) -> Result<(), InvalidRequest> {
        self.realestate_year(start)?;
        self.realestate_year(end)?;
        if start > end {
            return Err(InvalidRequest::EmptyYearRange { start, end });
        }
        Ok(())
    }

    /// Exactly five ASCII digits
    pub fn region_code(&self, code: &str) -> Result<(), InvalidRequest> {
        if code.len() != REGION_CODE_LEN || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(InvalidRequest::InvalidCodeLength {
                code: code.to_string(),
                expected: REGION_CODE_LEN,
            });
        }
        Ok(())
    }

    /// "01".."47"
    pub fn prefecture_code(&self, code: &str) -> Result<(), InvalidRequest> {
        if code.len() != 2 || !area::is_known_prefecture(code) {
            return Err(InvalidRequest::InvalidPrefectureCode {
                code: code.to_string(),
            });
        }
        Ok(())
    }

    /// Between 1 and 50 codes, each well-formed
    pub fn region_codes<S: AsRef<str>>(&self, codes: &[S]) -> Result<(), InvalidRequest> {
        if codes.is_empty() {
            return Err(InvalidRequest::NoCodes);
        }
        if codes.len() > self.max_codes {
            return Err(InvalidRequest::TooManyCodes {
                count: codes.len(),
                max: self.max_codes,
            });
        }
        codes.iter().try_for_each(|code| self.region_code(code.as_ref()))
    }
}

impl Default for RequestGuard {
    fn default() -> Self {
        RequestGuard::from_settings(&Settings::default())
    }
}

fn check_range(year: i32, range: YearRange) -> Result<(), InvalidRequest> {
    if range.contains(year) {
        Ok(())
    } else {
        Err(InvalidRequest::YearOutOfRange {
            year,
            min: range.min,
            max: range.max,
        })
    }
}

/// Split "13101,13102, 13103" into trimmed, non-empty codes
pub fn split_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_year() {
        let guard = RequestGuard::default();
        let available = [2020, 2015, 2010];
        assert!(guard.population_year(2015, &available).is_ok());
        assert_eq!(
            guard.population_year(2018, &available),
            Err(InvalidRequest::YearUnavailable {
                year: 2018,
                available: vec![2020, 2015, 2010],
            })
        );
        assert!(matches!(
            guard.population_year(1999, &available),
            Err(InvalidRequest::YearOutOfRange { min: 2000, max: 2025, .. })
        ));
    }

    #[test]
    fn test_realestate_years() {
        let guard = RequestGuard::default();
        assert!(guard.realestate_year(2005).is_ok());
        assert!(guard.realestate_year(2004).is_err());
        assert!(guard.realestate_years(2015, 2023).is_ok());
        assert_eq!(
            guard.realestate_years(2020, 2015),
            Err(InvalidRequest::EmptyYearRange { start: 2020, end: 2015 })
        );
    }

    #[test]
    fn test_region_code_shape() {
        let guard = RequestGuard::default();
        assert!(guard.region_code("13101").is_ok());
        assert!(guard.region_code("1310").is_err());
        assert!(guard.region_code("131011").is_err());
        assert!(guard.region_code("1310a").is_err());
    }

    #[test]
    fn test_prefecture_code() {
        let guard = RequestGuard::default();
        assert!(guard.prefecture_code("01").is_ok());
        assert!(guard.prefecture_code("47").is_ok());
        assert!(guard.prefecture_code("48").is_err());
        assert!(guard.prefecture_code("1").is_err());
    }

    #[test]
    fn test_code_count_ceiling() {
        let guard = RequestGuard::default();
        let codes: Vec<String> = (0..51).map(|i| format!("13{:03}", 101 + i)).collect();
        assert_eq!(
            guard.region_codes(&codes),
            Err(InvalidRequest::TooManyCodes { count: 51, max: 50 })
        );
        assert!(guard.region_codes(&codes[..50]).is_ok());
        assert_eq!(guard.region_codes::<&str>(&[]), Err(InvalidRequest::NoCodes));
    }

    #[test]
    fn test_split_codes() {
        assert_eq!(split_codes("13101, 13102,,13103 "), vec!["13101", "13102", "13103"]);
    }
}
