use serde::{Serialize, Serializer};

use crate::store::PageWindow;

pub const DEFAULT_PER_PAGE: u64 = 25;
pub const MAX_PER_PAGE: u64 = 100;

/// Pages shown in full before the range collapses around the current page.
const COMPACT_RANGE_LIMIT: u64 = 7;

/// Requested page before it is clamped against the page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelector {
    Number(u64),
    /// Numeric but too large to represent; resolves to the last page.
    Last,
}

/// Page size: 25 when absent, unparsable or below 1; never above 100.
pub fn parse_per_page(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.map(str::trim) else {
        return DEFAULT_PER_PAGE;
    };
    match raw.parse::<i64>() {
        Ok(n) if n >= 1 => (n as u64).min(MAX_PER_PAGE),
        Ok(_) => DEFAULT_PER_PAGE,
        Err(_) if is_oversized_number(raw) => MAX_PER_PAGE,
        Err(_) => DEFAULT_PER_PAGE,
    }
}

/// Positive integer text that failed to parse only because it overflows.
fn is_oversized_number(raw: &str) -> bool {
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

pub fn parse_page(raw: Option<&str>) -> PageSelector {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return PageSelector::Number(1);
    };
    match raw.parse::<i64>() {
        Ok(n) if n >= 1 => PageSelector::Number(n as u64),
        Ok(_) => PageSelector::Number(1),
        Err(_) if is_oversized_number(raw) => PageSelector::Last,
        Err(_) => PageSelector::Number(1),
    }
}

/// One entry in the navigation control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    Page(u64),
    Ellipsis,
}

impl Serialize for PageLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Page(n) => serializer.serialize_u64(*n),
            Self::Ellipsis => serializer.serialize_str("…"),
        }
    }
}

/// Bounded-width page range: `1 2 3 4 5 … 20`, `1 … 9 10 11 … 20`, etc.
pub fn page_range(current: u64, total: u64) -> Vec<PageLink> {
    use PageLink::{Ellipsis, Page};

    if total <= COMPACT_RANGE_LIMIT {
        return (1..=total.max(1)).map(Page).collect();
    }
    let mut links = Vec::with_capacity(7);
    if current <= 4 {
        links.extend((1..=5).map(Page));
        links.extend([Ellipsis, Page(total)]);
    } else if current >= total - 3 {
        links.extend([Page(1), Ellipsis]);
        links.extend((total - 4..=total).map(Page));
    } else {
        links.extend([Page(1), Ellipsis]);
        links.extend((current - 1..=current + 1).map(Page));
        links.extend([Ellipsis, Page(total)]);
    }
    links
}

/// Splits `count` items into pages of `per_page`.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    pub count: u64,
    pub per_page: u64,
}

impl Paginator {
    pub fn new(count: u64, per_page: u64) -> Self {
        Self {
            count,
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Always at least one page.
    pub fn num_pages(&self) -> u64 {
        self.count.div_ceil(self.per_page).max(1)
    }

    /// Resolve a selector to a concrete page, clamping into `[1, num_pages]`.
    pub fn page(&self, selector: PageSelector) -> PageInfo {
        let num_pages = self.num_pages();
        let number = match selector {
            PageSelector::Number(n) => n.clamp(1, num_pages),
            PageSelector::Last => num_pages,
        };
        let start_index = if self.count == 0 {
            0
        } else {
            (number - 1) * self.per_page + 1
        };
        let end_index = (number * self.per_page).min(self.count);
        let has_previous = number > 1;
        let has_next = number < num_pages;

        let summary = if num_pages == 1 {
            match self.count {
                0 => "No items".to_string(),
                1 => "1 item".to_string(),
                n => format!("{} items", n),
            }
        } else {
            format!(
                "Showing {} to {} of {} items",
                start_index, end_index, self.count
            )
        };

        PageInfo {
            number,
            num_pages,
            per_page: self.per_page,
            count: self.count,
            has_previous,
            has_next,
            previous_page_number: has_previous.then(|| number - 1),
            next_page_number: has_next.then(|| number + 1),
            start_index,
            end_index,
            summary,
        }
    }
}

/// Resolved position within a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub number: u64,
    pub num_pages: u64,
    pub per_page: u64,
    pub count: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<u64>,
    pub next_page_number: Option<u64>,
    pub start_index: u64,
    pub end_index: u64,
    pub summary: String,
}

impl PageInfo {
    pub fn window(&self) -> PageWindow {
        PageWindow {
            offset: (self.number - 1) * self.per_page,
            limit: self.per_page,
        }
    }
}
