use serde::Serialize;

/// Page-number pagination shared by every listing route. Pages start at 1;
/// each route supplies its own default page size.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Pagination {
    pub(crate) page: u64,
    pub(crate) limit: i64,
}

impl Pagination {
    pub(crate) fn new(page: Option<u64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).max(1),
        }
    }

    pub(crate) fn skip(&self) -> u64 {
        (self.page - 1) * self.limit as u64
    }

    pub(crate) fn info(&self, total: u64) -> PageInfo {
        PageInfo {
            current: self.page,
            pages: (total + self.limit as u64 - 1) / self.limit as u64,
            total,
        }
    }
}

#[derive(Serialize, Debug, Eq, PartialEq)]
pub(crate) struct PageInfo {
    pub(crate) current: u64,
    pub(crate) pages: u64,
    pub(crate) total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_params_are_omitted() {
        let p = Pagination::new(None, None, 20);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 20);
        assert_eq!(p.skip(), 0);
    }

    #[test]
    fn page_two_of_fifteen_records_with_limit_ten() {
        let p = Pagination::new(Some(2), Some(10), 20);
        assert_eq!(p.skip(), 10);
        assert_eq!(
            p.info(15),
            PageInfo {
                current: 2,
                pages: 2,
                total: 15
            }
        );
    }

    #[test]
    fn exact_multiple_does_not_add_a_phantom_page() {
        let p = Pagination::new(Some(1), Some(10), 20);
        assert_eq!(p.info(20).pages, 2);
        assert_eq!(p.info(0).pages, 0);
    }

    #[test]
    fn degenerate_params_are_clamped() {
        let p = Pagination::new(Some(0), Some(0), 20);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 1);
    }
}
