//! Common types used across the platform

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Round a money or weight figure to two decimal places, half away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Pagination query parameters as sent by clients
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Page number, at least 1
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`
    pub fn per_page(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.per_page())
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: &Pagination, total_items: i64) -> Self {
        let per_page = pagination.per_page();
        let total_items = total_items.max(0) as u64;
        let total_pages = total_items.div_ceil(u64::from(per_page)) as u32;

        Self {
            data,
            pagination: PaginationMeta {
                page: pagination.page(),
                per_page,
                total_items,
                total_pages,
            },
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

/// Optional, inclusive date range used by list filters and the dashboard
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DateRange {
    /// Start of the first day, in UTC
    pub fn start_bound(&self) -> Option<DateTime<Utc>> {
        self.start_date
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    /// Start of the day after the last day, in UTC (exclusive bound)
    pub fn end_bound(&self) -> Option<DateTime<Utc>> {
        self.end_date
            .map(|d| (d + Duration::days(1)).and_time(NaiveTime::MIN).and_utc())
    }

    pub fn is_valid(&self) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_pagination_defaults_and_clamping() {
        let p = Pagination::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.per_page(), 10);
        assert_eq!(p.offset(), 0);

        let p = Pagination::new(0, 500);
        assert_eq!(p.page(), 1);
        assert_eq!(p.per_page(), 100);

        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn test_paginated_response_total_pages() {
        let p = Pagination::new(1, 10);
        let r = PaginatedResponse::new(vec![1, 2, 3], &p, 21);
        assert_eq!(r.pagination.total_pages, 3);
        assert_eq!(r.pagination.total_items, 21);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], &p, 0);
        assert_eq!(empty.pagination.total_pages, 0);
    }

    #[test]
    fn test_round2_half_away_from_zero() {
        assert_eq!(round2(Decimal::from_str("2.345").unwrap()), Decimal::from_str("2.35").unwrap());
        assert_eq!(round2(Decimal::from_str("-2.345").unwrap()), Decimal::from_str("-2.35").unwrap());
        assert_eq!(round2(Decimal::from_str("2.344").unwrap()), Decimal::from_str("2.34").unwrap());
    }

    #[test]
    fn test_date_range_bounds_cover_whole_days() {
        let range = DateRange {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31),
        };
        assert_eq!(range.start_bound().unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(range.end_bound().unwrap().to_rfc3339(), "2024-04-01T00:00:00+00:00");
        assert!(range.is_valid());

        let inverted = DateRange {
            start_date: NaiveDate::from_ymd_opt(2024, 4, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        };
        assert!(!inverted.is_valid());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every item lands on exactly one page
        #[test]
        fn prop_pages_cover_all_items(
            total in 0i64..10_000,
            limit in proptest::option::of(0u32..500),
        ) {
            let pagination = Pagination { page: Some(1), limit };
            let meta = PaginatedResponse::<()>::new(vec![], &pagination, total).pagination;
            let per_page = u64::from(meta.per_page);
            prop_assert!((1..=u64::from(MAX_PAGE_SIZE)).contains(&per_page));
            prop_assert!(u64::from(meta.total_pages) * per_page >= meta.total_items);
            if meta.total_pages > 0 {
                prop_assert!(u64::from(meta.total_pages - 1) * per_page < meta.total_items);
            }
        }
    }
}
