//! Page-number pagination shared by every listing view.
//!
//! Resolution rules: an absent or non-integer `page` selects the first page,
//! an integer outside `1..=num_pages` selects the last page, and an empty
//! collection still has exactly one (empty) page.

use std::num::NonZeroU32;

/// Raw `page` query parameter as supplied by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageParam {
    #[default]
    First,
    Number(i64),
}

impl PageParam {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).map(str::parse::<i64>) {
            Some(Ok(number)) => PageParam::Number(number),
            _ => PageParam::First,
        }
    }
}

/// Limit/offset pair handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: u64,
}

impl PageMeta {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn next_number(&self) -> Option<u64> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_number(&self) -> Option<u64> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn window(&self) -> PageWindow {
        let offset = (self.number - 1).saturating_mul(self.per_page);
        PageWindow {
            limit: i64::try_from(self.per_page).unwrap_or(i64::MAX),
            offset: i64::try_from(offset).unwrap_or(i64::MAX),
        }
    }
}

/// A resolved page of items.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: NonZeroU32,
}

impl Paginator {
    pub fn new(per_page: NonZeroU32) -> Self {
        Self { per_page }
    }

    pub fn per_page(&self) -> u64 {
        u64::from(self.per_page.get())
    }

    pub fn num_pages(&self, count: u64) -> u64 {
        count.div_ceil(self.per_page()).max(1)
    }

    pub fn resolve(&self, count: u64, requested: PageParam) -> PageMeta {
        let num_pages = self.num_pages(count);
        let number = match requested {
            PageParam::First => 1,
            PageParam::Number(n) if n >= 1 && (n as u64) <= num_pages => n as u64,
            PageParam::Number(_) => num_pages,
        };

        PageMeta {
            number,
            num_pages,
            count,
            per_page: self.per_page(),
        }
    }

    /// Slice an in-memory collection the same way repositories are queried.
    pub fn paginate<T: Clone>(&self, items: &[T], requested: PageParam) -> Page<T> {
        let meta = self.resolve(items.len() as u64, requested);
        let window = meta.window();
        let start = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let items = items
            .iter()
            .skip(start)
            .take(self.per_page() as usize)
            .cloned()
            .collect();
        Page { items, meta }
    }
}
