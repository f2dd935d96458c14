//! Drawing package scanner
//!
//! Walks a folder (or takes a file list), reads each drawing through a
//! [`PageSource`], analyzes every page and files the results into a
//! [`DrawingPackageIndex`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::index::DrawingPackageIndex;
use super::page::{DrawingPageInfo, PageAnalyzer};
use super::source::{PageSource, TextExportSource, VisionSource};
use crate::core::error::ScanError;

/// Scans drawing packages into an index
#[derive(Clone)]
pub struct DrawingPackageScanner {
    analyzer: PageAnalyzer,
    source: Arc<dyn PageSource>,
    vision: Option<Arc<dyn VisionSource>>,
    jobs: usize,
}

impl Default for DrawingPackageScanner {
    fn default() -> Self {
        Self::new(PageAnalyzer::default())
    }
}

impl std::fmt::Debug for DrawingPackageScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawingPackageScanner")
            .field("source", &self.source.backend_name())
            .field("vision", &self.vision.as_ref().map(|v| v.backend_name()))
            .field("jobs", &self.jobs)
            .finish()
    }
}

impl DrawingPackageScanner {
    pub fn new(analyzer: PageAnalyzer) -> Self {
        Self {
            analyzer,
            source: Arc::new(TextExportSource),
            vision: None,
            jobs: 1,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn PageSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionSource>) -> Self {
        self.vision = Some(vision);
        self
    }

    /// Number of worker threads used by [`scan_folder`](Self::scan_folder)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Analyze every page of one drawing file
    pub fn scan_file(&self, path: &Path) -> Result<Vec<DrawingPageInfo>, ScanError> {
        let pages = self.source.read_pages(path)?;
        let drawing = self.source.drawing_path(path);

        let infos = pages
            .iter()
            .map(|page| {
                let mut info = self.analyzer.analyze_page(&drawing, page);
                if let Some(vision) = &self.vision {
                    self.apply_vision(vision.as_ref(), &mut info, page);
                }
                info
            })
            .collect();
        Ok(infos)
    }

    fn apply_vision(
        &self,
        vision: &dyn VisionSource,
        info: &mut DrawingPageInfo,
        page: &crate::core::page::PageText,
    ) {
        match vision.read_title_block(&info.pdf_path, page) {
            Some(reading) => {
                info.title_block.cross_validate(&reading);
                info.refresh_signals();
                tracing::debug!(
                    page = info.page_number,
                    backend = vision.backend_name(),
                    confidence = info.title_block.overall_confidence,
                    "cross-validated title block"
                );
            }
            None => {
                tracing::debug!(
                    page = info.page_number,
                    backend = vision.backend_name(),
                    "no vision reading, keeping text extraction"
                );
            }
        }
    }

    /// Drawing files under `dir` the page source accepts, in path order
    pub fn collect_files(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !dir.is_dir() {
            return Err(ScanError::NotADirectory(dir.to_path_buf()));
        }

        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.source.accepts(p))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Scan every accepted file under `dir`
    pub fn scan_folder(&self, dir: &Path) -> Result<DrawingPackageIndex, ScanError> {
        let files = self.collect_files(dir)?;
        tracing::info!(
            dir = %dir.display(),
            files = files.len(),
            backend = self.source.backend_name(),
            "scanning drawing package"
        );

        let index = if self.jobs > 1 {
            self.scan_files_parallel(&files, self.jobs)
        } else {
            self.scan_files(&files)
        };
        tracing::info!("{}", index.summary());
        Ok(index)
    }

    /// Scan a list of files on the calling thread. Unreadable files are
    /// logged and skipped.
    pub fn scan_files(&self, files: &[PathBuf]) -> DrawingPackageIndex {
        let mut index = DrawingPackageIndex::new();
        for path in files {
            match self.scan_file(path) {
                Ok(pages) => {
                    index.add_file(self.source.drawing_path(path));
                    for page in pages {
                        index.add_page(page);
                    }
                }
                Err(e) => tracing::warn!("skipping {}: {}", path.display(), e),
            }
        }
        index
    }

    /// Scan files on `workers` scoped threads. Each worker builds its own
    /// shard; shards are merged on the calling thread in file order.
    pub fn scan_files_parallel(&self, files: &[PathBuf], workers: usize) -> DrawingPackageIndex {
        let workers = workers.clamp(1, files.len().max(1));
        if workers == 1 {
            return self.scan_files(files);
        }
        let chunk_size = files.len().div_ceil(workers);

        let shards: Vec<Option<DrawingPackageIndex>> = std::thread::scope(|s| {
            let handles: Vec<_> = files
                .chunks(chunk_size)
                .map(|chunk| s.spawn(move || self.scan_files(chunk)))
                .collect();
            handles.into_iter().map(|h| h.join().ok()).collect()
        });

        let mut index = DrawingPackageIndex::new();
        for shard in shards {
            match shard {
                Some(shard) => index.merge(shard),
                None => tracing::warn!("scan worker panicked; its files were skipped"),
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::page::PageText;
    use crate::extract::{TitleBlockField, TitleBlockInfo};
    use tempfile::TempDir;

    fn write_package(dir: &Path) {
        std::fs::write(
            dir.join("12345-01.txt"),
            "PART NO: 12345-01\nNOTES:\n1. DEBURR ALL EDGES\n\u{000C}PART NO: 12345-01\nSHEET 2 OF 2\n1. DEBURR ALL EDGES\n",
        )
        .unwrap();
        std::fs::write(dir.join("67890.txt"), "PART NO: 67890\nREV: A\n").unwrap();
        std::fs::create_dir(dir.join("sub")).unwrap();
        std::fs::write(dir.join("sub").join("loose.txt"), "NOTES:\n1. PAINT RED\n").unwrap();
        std::fs::write(dir.join("readme.md"), "not a drawing").unwrap();
    }

    #[test]
    fn test_scan_folder_groups_sheets() {
        let tmp = TempDir::new().unwrap();
        write_package(tmp.path());

        let index = DrawingPackageScanner::default()
            .scan_folder(tmp.path())
            .unwrap();
        assert_eq!(index.scanned_files.len(), 3);
        assert_eq!(index.total_pages, 4);
        assert_eq!(index.unique_part_numbers(), 2);
        assert_eq!(index.unmatched_pages.len(), 1);

        let data = index.build_drawing_data("12345-01").unwrap();
        assert_eq!(data.page_count, 2);
        assert_eq!(data.notes.len(), 1);
    }

    #[test]
    fn test_scan_folder_rejects_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("x.txt");
        std::fs::write(&file, "").unwrap();
        let err = DrawingPackageScanner::default().scan_folder(&file).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory(_)));
    }

    #[test]
    fn test_parallel_scan_matches_serial() {
        let tmp = TempDir::new().unwrap();
        write_package(tmp.path());
        let scanner = DrawingPackageScanner::default();
        let files = scanner.collect_files(tmp.path()).unwrap();

        let serial = scanner.scan_files(&files);
        let parallel = scanner.scan_files_parallel(&files, 3);
        assert_eq!(parallel.total_pages, serial.total_pages);
        assert_eq!(parallel.scanned_files, serial.scanned_files);
        assert_eq!(
            parallel.pages_by_part_number.keys().collect::<Vec<_>>(),
            serial.pages_by_part_number.keys().collect::<Vec<_>>()
        );
        assert_eq!(parallel.unmatched_pages.len(), serial.unmatched_pages.len());
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let scanner = DrawingPackageScanner::default();
        let index = scanner.scan_files(&[PathBuf::from("/nonexistent/drawing.txt")]);
        assert_eq!(index.total_pages, 0);
        assert!(index.scanned_files.is_empty());
    }

    struct FixedVision(Option<TitleBlockInfo>);

    impl VisionSource for FixedVision {
        fn backend_name(&self) -> &str {
            "fixed"
        }

        fn read_title_block(&self, _drawing: &Path, _page: &PageText) -> Option<TitleBlockInfo> {
            self.0.clone()
        }
    }

    #[test]
    fn test_vision_fills_missing_part_number() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("scan.txt");
        std::fs::write(&file, "NOTES:\n1. DEBURR ALL EDGES\n").unwrap();

        let reading = TitleBlockInfo {
            part_number: Some(TitleBlockField {
                value: "VIS-001".to_string(),
                confidence: 0.9,
            }),
            ..Default::default()
        };
        let scanner = DrawingPackageScanner::default()
            .with_vision(Arc::new(FixedVision(Some(reading))));
        let pages = scanner.scan_file(&file).unwrap();
        assert_eq!(pages[0].part_number(), Some("VIS-001"));
    }

    #[test]
    fn test_absent_vision_reading_keeps_text() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("scan.txt");
        std::fs::write(&file, "PART NO: 12345-01\n").unwrap();

        let scanner = DrawingPackageScanner::default().with_vision(Arc::new(FixedVision(None)));
        let pages = scanner.scan_file(&file).unwrap();
        assert_eq!(pages[0].part_number(), Some("12345-01"));
    }

    #[test]
    fn test_vision_reading_refreshes_page_signals() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("mount.txt");
        std::fs::write(&file, "NOTES:\n1. DEBURR ALL EDGES\n").unwrap();

        let text_only = DrawingPackageScanner::default().scan_file(&file).unwrap();
        assert!(!text_only[0].is_assembly_level);
        assert!((text_only[0].confidence - 0.9).abs() < 1e-9);

        let reading = TitleBlockInfo {
            description: Some(TitleBlockField {
                value: "MOTOR MOUNT ASSY".to_string(),
                confidence: 0.8,
            }),
            ..Default::default()
        };
        let scanner = DrawingPackageScanner::default()
            .with_vision(Arc::new(FixedVision(Some(reading))));
        let page = &scanner.scan_file(&file).unwrap()[0];
        assert!(page.is_assembly_level);
        // vision-only description lands at 0.8 * 0.85, averaged with the note
        assert!((page.confidence - (0.68 + 0.9) / 2.0).abs() < 1e-9);
        assert!(!page.coverage.suspicious);
    }
}
