//! Pagination of ordered sequences.

use serde::Serialize;

/// One page of a paginated sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// 1-based page number.
    pub number: usize,
    pub items: Vec<T>,
    pub total_pages: usize,
    pub previous: Option<usize>,
    pub next: Option<usize>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.number == 1
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.number == self.total_pages
    }
}

/// Splits ordered sequences into fixed-size pages.
///
/// A page size of zero, or an empty sequence, yields exactly one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
}

impl Paginator {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages `len` items occupy.
    #[must_use]
    pub fn page_count(&self, len: usize) -> usize {
        if self.page_size == 0 || len == 0 {
            1
        } else {
            len.div_ceil(self.page_size)
        }
    }

    /// Split `items` into pages, preserving order.
    pub fn paginate<T: Clone>(&self, items: &[T]) -> Vec<Page<T>> {
        let total_pages = self.page_count(items.len());
        if total_pages == 1 {
            return vec![Page {
                number: 1,
                items: items.to_vec(),
                total_pages,
                previous: None,
                next: None,
            }];
        }

        items
            .chunks(self.page_size)
            .enumerate()
            .map(|(index, chunk)| {
                let number = index + 1;
                Page {
                    number,
                    items: chunk.to_vec(),
                    total_pages,
                    previous: (number > 1).then(|| number - 1),
                    next: (number < total_pages).then(|| number + 1),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_link_to_neighbours() {
        let pages = Paginator::new(2).paginate(&[1, 2, 3, 4, 5]);
        assert_eq!(pages.len(), 3);

        assert_eq!(pages[0].items, vec![1, 2]);
        assert_eq!((pages[0].previous, pages[0].next), (None, Some(2)));
        assert_eq!((pages[1].previous, pages[1].next), (Some(1), Some(3)));
        assert_eq!(pages[2].items, vec![5]);
        assert_eq!((pages[2].previous, pages[2].next), (Some(2), None));
        assert!(pages.iter().all(|p| p.total_pages == 3));
        assert!(pages[0].is_first() && pages[2].is_last());
    }

    #[test]
    fn test_empty_input_yields_one_page() {
        let pages = Paginator::new(10).paginate::<u8>(&[]);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].items.is_empty());
        assert_eq!(pages[0].total_pages, 1);
        assert_eq!((pages[0].previous, pages[0].next), (None, None));
    }

    #[test]
    fn test_zero_page_size_disables_pagination() {
        let pages = Paginator::new(0).paginate(&["a", "b", "c"]);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].items, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_exact_multiple() {
        let paginator = Paginator::new(3);
        assert_eq!(paginator.page_count(6), 2);
        let pages = paginator.paginate(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(pages[1].items, vec![4, 5, 6]);
        assert_eq!(pages[1].next, None);
    }
}
