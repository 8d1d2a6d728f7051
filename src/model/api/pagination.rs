use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: usize = 50;

/// Requested page, taken from the `page_num` and `page_size` query parameters.
/// Pages are numbered from 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Pagination {
    /// Returns `None` if either value is zero, or if the page starts beyond
    /// the largest offset the database accepts.
    pub fn new(page_num: usize, page_size: usize) -> Option<Self> {
        if page_num == 0 || page_size == 0 {
            return None;
        }
        let skip = (page_num - 1).checked_mul(page_size)?;
        i64::try_from(skip).ok()?;
        Some(Self {
            page_num,
            page_size,
        })
    }

    /// How many items precede this page.
    pub fn skip(&self) -> u64 {
        // Bounded by `new`.
        ((self.page_num - 1) * self.page_size) as u64
    }

    pub fn limit(&self) -> u64 {
        self.page_size as u64
    }

    /// Wrap a page of items with the pagination metadata.
    pub fn paginate<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
            items,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = if let Ok(page_num) = req.query_value::<usize>("page_num").unwrap_or(Ok(1)) {
            page_num
        } else {
            return request::Outcome::Failure((Status::BadRequest, ()));
        };
        let page_size = if let Ok(page_size) = req
            .query_value::<usize>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE))
        {
            page_size
        } else {
            return request::Outcome::Failure((Status::BadRequest, ()));
        };
        match Self::new(page_num, page_size) {
            Some(pagination) => request::Outcome::Success(pagination),
            None => request::Outcome::Failure((Status::BadRequest, ())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: usize,
    pub page_size: usize,
    pub total: u64,
}

/// One page of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub pagination: PaginationResult,
    pub items: Vec<T>,
}
