//! Pagination and sorting options shared by list endpoints.

use serde::Serialize;

use crate::validator::{permitted_value, Validator};

#[derive(Debug, Clone)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    /// Column to order by. Only called after `validate` accepted `sort`.
    pub fn sort_column(&self) -> &str {
        debug_assert!(
            permitted_value(&self.sort.as_str(), self.sort_safelist),
            "unsafe sort parameter: {}",
            self.sort
        );
        self.sort.trim_start_matches('-')
    }

    pub fn sort_direction(&self) -> &'static str {
        if self.sort.starts_with('-') {
            "DESC"
        } else {
            "ASC"
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn validate(&self, v: &mut Validator) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= 10_000_000, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(self.page_size <= 100, "page_size", "must be a maximum of 100");
        v.check(
            permitted_value(&self.sort.as_str(), self.sort_safelist),
            "sort",
            "invalid sort value",
        );
    }
}

/// Pagination metadata returned with list responses. Empty when nothing matched.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFELIST: &[&str] = &["id", "title", "-id", "-title"];

    fn filters(page: i64, page_size: i64, sort: &str) -> Filters {
        Filters {
            page,
            page_size,
            sort: sort.to_string(),
            sort_safelist: SAFELIST,
        }
    }

    #[test]
    fn descending_sort_strips_prefix() {
        let f = filters(1, 20, "-title");
        assert_eq!(f.sort_column(), "title");
        assert_eq!(f.sort_direction(), "DESC");
        assert_eq!(filters(1, 20, "id").sort_direction(), "ASC");
    }

    #[test]
    fn offset_from_page() {
        let f = filters(3, 20, "id");
        assert_eq!(f.limit(), 20);
        assert_eq!(f.offset(), 40);
    }

    #[test]
    fn rejects_out_of_range_and_unsafe_sort() {
        let mut v = Validator::new();
        filters(0, 101, "year; DROP TABLE movies").validate(&mut v);
        assert_eq!(v.errors["page"], "must be greater than zero");
        assert_eq!(v.errors["page_size"], "must be a maximum of 100");
        assert_eq!(v.errors["sort"], "invalid sort value");
    }

    #[test]
    fn metadata_rounds_last_page_up() {
        let m = Metadata::calculate(41, 2, 20);
        assert_eq!(m.last_page, 3);
        assert_eq!(m.first_page, 1);
        assert_eq!(Metadata::calculate(0, 1, 20), Metadata::default());
    }
}
