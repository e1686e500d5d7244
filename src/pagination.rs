use crate::results::{PageResult, PageStatus};

/// Next step after checking the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The page is still filling up; poll it again
    Hold { page: u32 },
    /// Move on to the next page
    Advance { from: u32, to: u32 },
    /// The page does not exist yet; wait and poll it again
    WaitNotCreated { page: u32 },
}

/// Decides whether to hold the current page or move past it
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    full_page_threshold: usize,
}

impl Pagination {
    pub fn new(full_page_threshold: usize) -> Self {
        Self {
            full_page_threshold,
        }
    }

    pub fn next(&self, page: u32, result: &PageResult) -> Transition {
        match result.status {
            PageStatus::NotYetCreated => Transition::WaitNotCreated { page },
            PageStatus::Abandoned(cause) => {
                ::log::error!(
                    "Skipping page {} ({:?}); comments on it may be missed",
                    page,
                    cause
                );
                Transition::Advance {
                    from: page,
                    to: page + 1,
                }
            }
            PageStatus::Ok if result.total_on_page >= self.full_page_threshold => {
                ::log::info!(
                    "Page {} is full ({} comments), advancing",
                    page,
                    result.total_on_page
                );
                Transition::Advance {
                    from: page,
                    to: page + 1,
                }
            }
            PageStatus::Ok => {
                ::log::info!(
                    "Page {} has {} of {} comments, holding",
                    page,
                    result.total_on_page,
                    self.full_page_threshold
                );
                Transition::Hold { page }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::AbandonCause;

    fn ok(total: usize) -> PageResult {
        PageResult::ok(Vec::new(), total)
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let pagination = Pagination::new(30);
        assert_eq!(pagination.next(241, &ok(29)), Transition::Hold { page: 241 });
        assert_eq!(
            pagination.next(241, &ok(30)),
            Transition::Advance { from: 241, to: 242 }
        );
        assert_eq!(
            pagination.next(241, &ok(31)),
            Transition::Advance { from: 241, to: 242 }
        );
    }

    #[test]
    fn test_not_created_waits_on_same_page() {
        let pagination = Pagination::new(30);
        let transition = pagination.next(5, &PageResult::not_yet_created());
        assert_eq!(transition, Transition::WaitNotCreated { page: 5 });
    }

    #[test]
    fn test_abandoned_page_is_skipped() {
        let pagination = Pagination::new(30);
        for cause in [AbandonCause::Challenge, AbandonCause::Exhausted] {
            let transition = pagination.next(5, &PageResult::abandoned(cause));
            assert_eq!(transition, Transition::Advance { from: 5, to: 6 });
        }
    }

    #[test]
    fn test_configurable_threshold() {
        let pagination = Pagination::new(50);
        assert_eq!(pagination.next(1, &ok(30)), Transition::Hold { page: 1 });
        assert_eq!(
            pagination.next(1, &ok(50)),
            Transition::Advance { from: 1, to: 2 }
        );
    }
}
