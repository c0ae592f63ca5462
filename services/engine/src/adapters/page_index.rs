//! services/engine/src/adapters/page_index.rs
//!
//! The page-metadata oracle, backed by a static lookup table: the first
//! verse id of each of the 604 pages and of each of the 30 juz. The
//! table is validated once at construction; lookups are pure.

use serde::Deserialize;

use tawakkul_core::domain::{PageSpan, JUZ_COUNT, TOTAL_PAGES};
use tawakkul_core::ports::{PageMetaOracle, PortError, PortResult};

/// The on-disk shape of `page-index.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct PageIndexFile {
    /// First verse id of each page, ascending, starting at 1.
    pub page_first_ayah: Vec<u32>,
    /// First verse id of each juz, ascending, starting at 1.
    pub juz_first_ayah: Vec<u32>,
    /// Total verse count; closes the last page's span.
    pub total_ayahs: u32,
}

pub struct PageIndex {
    pages: Vec<u32>,
    juz: Vec<u32>,
    total_ayahs: u32,
}

impl PageIndex {
    pub fn new(file: PageIndexFile) -> PortResult<Self> {
        if file.page_first_ayah.is_empty() || file.juz_first_ayah.is_empty() {
            return Err(PortError::Load("page index tables are empty".to_string()));
        }
        if file.page_first_ayah.len() > usize::from(TOTAL_PAGES)
            || file.juz_first_ayah.len() > usize::from(JUZ_COUNT)
        {
            return Err(PortError::Load(format!(
                "page index tables are larger than the book ({} pages, {} juz)",
                file.page_first_ayah.len(),
                file.juz_first_ayah.len()
            )));
        }
        if file.page_first_ayah[0] != 1 || file.juz_first_ayah[0] != 1 {
            return Err(PortError::Load(
                "page index tables must start at verse 1".to_string(),
            ));
        }
        for table in [&file.page_first_ayah, &file.juz_first_ayah] {
            for pair in table.windows(2) {
                if pair[1] <= pair[0] {
                    return Err(PortError::Load(format!(
                        "page index table is not strictly increasing at id {}",
                        pair[1]
                    )));
                }
            }
        }
        if *file.page_first_ayah.last().unwrap() > file.total_ayahs {
            return Err(PortError::Load(
                "page index table runs past the corpus".to_string(),
            ));
        }
        Ok(Self {
            pages: file.page_first_ayah,
            juz: file.juz_first_ayah,
            total_ayahs: file.total_ayahs,
        })
    }

    pub fn page_count(&self) -> u16 {
        self.pages.len() as u16
    }
}

impl PageMetaOracle for PageIndex {
    fn resolve_page(&self, page: u16) -> PortResult<PageSpan> {
        let index = page.checked_sub(1).ok_or(PortError::OutOfRange(page))? as usize;
        let first_ayah_id = *self
            .pages
            .get(index)
            .ok_or(PortError::OutOfRange(page))?;
        let last_ayah_id = match self.pages.get(index + 1) {
            Some(next_first) => next_first - 1,
            None => self.total_ayahs,
        };
        Ok(PageSpan {
            first_ayah_id,
            last_ayah_id,
        })
    }

    fn juz_of(&self, ayah_id: u32) -> PortResult<u8> {
        if ayah_id == 0 || ayah_id > self.total_ayahs {
            return Err(PortError::NotFound(format!(
                "verse id {} is outside the corpus",
                ayah_id
            )));
        }
        Ok(self.juz.partition_point(|&first| first <= ayah_id) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> PageIndex {
        PageIndex::new(PageIndexFile {
            page_first_ayah: vec![1, 8, 15, 21],
            juz_first_ayah: vec![1, 11, 21],
            total_ayahs: 30,
        })
        .unwrap()
    }

    #[test]
    fn spans_partition_the_id_space() {
        let oracle = index();
        let mut previous_last = 0;
        for page in 1..=oracle.page_count() {
            let span = oracle.resolve_page(page).unwrap();
            assert_eq!(span.first_ayah_id, previous_last + 1);
            previous_last = span.last_ayah_id;
        }
        assert_eq!(previous_last, 30);
    }

    #[test]
    fn out_of_table_pages_are_rejected() {
        let oracle = index();
        assert!(matches!(
            oracle.resolve_page(0).unwrap_err(),
            PortError::OutOfRange(0)
        ));
        assert!(matches!(
            oracle.resolve_page(5).unwrap_err(),
            PortError::OutOfRange(5)
        ));
    }

    #[test]
    fn juz_lookup_follows_the_boundaries() {
        let oracle = index();
        assert_eq!(oracle.juz_of(1).unwrap(), 1);
        assert_eq!(oracle.juz_of(10).unwrap(), 1);
        assert_eq!(oracle.juz_of(11).unwrap(), 2);
        assert_eq!(oracle.juz_of(30).unwrap(), 3);
        assert!(oracle.juz_of(0).is_err());
        assert!(oracle.juz_of(31).is_err());
    }

    #[test]
    fn malformed_tables_are_rejected_at_construction() {
        assert!(PageIndex::new(PageIndexFile {
            page_first_ayah: vec![2, 8],
            juz_first_ayah: vec![1],
            total_ayahs: 10,
        })
        .is_err());
        assert!(PageIndex::new(PageIndexFile {
            page_first_ayah: vec![1, 8, 8],
            juz_first_ayah: vec![1],
            total_ayahs: 10,
        })
        .is_err());
        assert!(PageIndex::new(PageIndexFile {
            page_first_ayah: vec![1, 12],
            juz_first_ayah: vec![1],
            total_ayahs: 10,
        })
        .is_err());
    }

    #[test]
    fn tables_larger_than_the_book_are_rejected() {
        assert!(PageIndex::new(PageIndexFile {
            page_first_ayah: vec![1],
            juz_first_ayah: (1..=u32::from(JUZ_COUNT) + 1).collect(),
            total_ayahs: 40,
        })
        .is_err());
        assert!(PageIndex::new(PageIndexFile {
            page_first_ayah: (1..=u32::from(TOTAL_PAGES) + 1).collect(),
            juz_first_ayah: vec![1],
            total_ayahs: 700,
        })
        .is_err());
    }
}
