use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 500;

/// Page selection, read from the `page_num` and `page_size` query values.
/// Pages are numbered from 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pagination {
    page_num: u64,
    page_size: u64,
}

impl Pagination {
    pub fn new(page_num: u64, page_size: u64) -> Option<Self> {
        if page_num == 0 || page_size == 0 || page_size > MAX_PAGE_SIZE {
            return None;
        }
        Some(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_num(&self) -> u64 {
        self.page_num
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn skip(&self) -> u64 {
        (self.page_num - 1) * self.page_size
    }

    /// Wrap one page of items together with the total item count.
    pub fn paginate<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            page_num: self.page_num,
            page_size: self.page_size,
            total,
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
        let page_num = match req.query_value::<u64>("page_num").unwrap_or(Ok(1)) {
            Ok(page_num) => page_num,
            Err(_) => return request::Outcome::Error((Status::BadRequest, ())),
        };
        let page_size = match req
            .query_value::<u64>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE))
        {
            Ok(page_size) => page_size,
            Err(_) => return request::Outcome::Error((Status::BadRequest, ())),
        };
        match Self::new(page_num, page_size) {
            Some(pagination) => request::Outcome::Success(pagination),
            None => request::Outcome::Error((Status::BadRequest, ())),
        }
    }
}

/// One page of a larger listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page_num: u64,
    pub page_size: u64,
    pub total: u64,
}

impl<T> Paginated<T> {
    /// Convert every item on the page.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            page_num: self.page_num,
            page_size: self.page_size,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_pages() {
        assert!(Pagination::new(0, 10).is_none());
        assert!(Pagination::new(1, 0).is_none());
        assert!(Pagination::new(1, MAX_PAGE_SIZE + 1).is_none());

        let page = Pagination::new(3, 20).unwrap();
        assert_eq!(page.skip(), 40);
        let paginated = page.paginate(45, vec![1, 2, 3, 4, 5]);
        assert_eq!(paginated.total, 45);
        assert_eq!(paginated.page_num, 3);
    }
}
