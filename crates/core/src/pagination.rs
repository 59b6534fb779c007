//! Offset-based pagination and listing filters.

use serde::{Deserialize, Serialize};

use crate::user::User;

/// Page number used when the caller does not supply one.
pub const DEFAULT_PAGE: u32 = 1;

/// Page size used when the caller does not supply one.
pub const DEFAULT_LIMIT: u32 = 10;

/// Upper bound on page size unless configured otherwise.
pub const DEFAULT_MAX_LIMIT: u32 = 100;

/// Requested page (1-based) and page size, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Apply defaults and clamp: `page >= 1`, `1 <= limit <= max_limit`.
    pub fn new(page: Option<u32>, limit: Option<u32>, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, max_limit),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// skip = (page - 1) * limit, take = limit.
    pub fn window(&self) -> PageWindow {
        PageWindow {
            offset: u64::from(self.page - 1) * u64::from(self.limit),
            limit: u64::from(self.limit),
        }
    }
}

/// Skip/take counts handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
}

/// One page of results plus the totals needed to navigate the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub limit: u32,
    pub total: u64,
    #[serde(rename = "totalPage")]
    pub total_page: u64,
    pub page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            data,
            limit: request.limit,
            total,
            total_page: total_pages(total, request.limit),
            page: request.page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            limit: self.limit,
            total: self.total,
            total_page: self.total_page,
            page: self.page,
        }
    }
}

/// ceil(total / limit); a zero limit yields zero pages.
pub fn total_pages(total: u64, limit: u32) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(u64::from(limit))
}

/// Substring filters for listing users. Empty strings count as "no filter".
///
/// Stored emails are lower-case, so [`UserFilter::new`] lower-cases the email
/// needle too. Name matching is case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilter {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserFilter {
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        Self {
            name: name.filter(|s| !s.is_empty()),
            email: email.filter(|s| !s.is_empty()).map(|s| s.to_lowercase()),
        }
    }

    /// Substring containment on both fields.
    pub fn matches(&self, user: &User) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .is_none_or(|needle| user.name.contains(needle));
        let email_ok = self
            .email
            .as_deref()
            .is_none_or(|needle| user.email.as_str().contains(needle));
        name_ok && email_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_apply_when_absent() {
        let req = PageRequest::new(None, None, DEFAULT_MAX_LIMIT);
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), 10);
        assert_eq!(req.window(), PageWindow { offset: 0, limit: 10 });
    }

    #[test]
    fn fifteen_records_make_two_pages_of_ten() {
        let first = PageRequest::new(Some(1), Some(10), DEFAULT_MAX_LIMIT);
        let second = PageRequest::new(Some(2), Some(10), DEFAULT_MAX_LIMIT);

        assert_eq!(total_pages(15, first.limit()), 2);
        assert_eq!(second.window(), PageWindow { offset: 10, limit: 10 });

        let page: Page<u8> = Page::new(vec![0; 5], second, 15);
        assert_eq!(page.total_page, 2);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn zero_and_oversized_values_are_clamped() {
        let req = PageRequest::new(Some(0), Some(0), 100);
        assert_eq!((req.page(), req.limit()), (1, 1));

        let req = PageRequest::new(Some(3), Some(10_000), 100);
        assert_eq!(req.limit(), 100);
    }

    #[test]
    fn page_serializes_total_page_in_camel_case() {
        let page: Page<u8> = Page::new(vec![], PageRequest::default(), 0);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalPage"], 0);
        assert!(json.get("total_page").is_none());
    }

    #[test]
    fn empty_filter_strings_are_ignored() {
        let filter = UserFilter::new(Some(String::new()), Some("example".to_string()));
        assert_eq!(filter.name, None);
        assert_eq!(filter.email.as_deref(), Some("example"));
    }

    #[test]
    fn email_filter_matches_normalised_addresses() {
        let now = chrono::Utc::now();
        let user = User {
            id: crate::UserId::new(),
            name: "John Doe".to_string(),
            email: crate::Email::parse("John@Test.com").unwrap(),
            password_hash: "hash".to_string(),
            created_at: now,
            updated_at: now,
        };

        let filter = UserFilter::new(None, Some("John".to_string()));
        assert_eq!(filter.email.as_deref(), Some("john"));
        assert!(filter.matches(&user));

        assert!(UserFilter::new(Some("John".to_string()), None).matches(&user));
        assert!(!UserFilter::new(Some("john".to_string()), None).matches(&user));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the pages implied by `total_pages` cover every record
        /// exactly once, and the last page is never empty.
        #[test]
        fn pages_cover_all_records(total in 0u64..10_000, limit in 1u32..500) {
            let pages = total_pages(total, limit);
            let limit = u64::from(limit);

            prop_assert!(pages * limit >= total);
            if total > 0 {
                prop_assert!((pages - 1) * limit < total);
            } else {
                prop_assert_eq!(pages, 0);
            }
        }

        #[test]
        fn window_offset_matches_page_arithmetic(page in 1u32..10_000, limit in 1u32..100) {
            let req = PageRequest::new(Some(page), Some(limit), 100);
            let window = req.window();
            prop_assert_eq!(window.offset, u64::from(page - 1) * u64::from(limit));
            prop_assert_eq!(window.limit, u64::from(limit));
        }
    }
}
