//! Parallel page pipeline: filter, assemble, restore.

use anyhow::{bail, Context, Result};
use image::DynamicImage;
use rayon::prelude::*;
use slide_core::{Settings, TextBlock, Token};
use slide_pptx::SlidePage;
use slide_restore::{BackgroundRestorer, RestoreOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::manifest::{load_tokens, PageEntry};

/// Shared cancellation signal, checked before each page starts.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancel from a background timer after `timeout`.
    pub fn cancel_after(&self, timeout: Duration) {
        let flag = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(timeout);
            log::warn!("Timeout of {:?} reached, cancelling remaining pages", timeout);
            flag.cancel();
        });
    }
}

/// Install the global rayon pool. Does nothing when `max_threads` is `None`.
pub fn install_thread_pool(max_threads: Option<usize>) -> Result<bool> {
    match max_threads {
        Some(num_threads) => {
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .context("Failed to configure thread pool")?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// How a page's background ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    /// Text was erased and the background synthesized.
    Restored,
    /// Cleaning was disabled.
    Original,
    /// Restoration failed; the uncleaned raster is used.
    Fallback,
}

/// One processed page.
#[derive(Debug, Clone)]
pub struct ProcessedPage {
    pub page: SlidePage,
    pub background: Background,
}

/// Totals for a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub pages: usize,
    pub blocks: usize,
    pub restored: usize,
    pub fallbacks: usize,
}

impl BatchReport {
    fn from_pages(pages: &[ProcessedPage]) -> Self {
        let mut report = Self {
            pages: pages.len(),
            ..Self::default()
        };
        for processed in pages {
            report.blocks += processed.page.blocks.len();
            match processed.background {
                Background::Restored => report.restored += 1,
                Background::Fallback => report.fallbacks += 1,
                Background::Original => {}
            }
        }
        report
    }
}

/// Runs pages through token filtering, block assembly and background restoration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: Settings,
    restorer: BackgroundRestorer,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        let restorer = BackgroundRestorer::new(RestoreOptions::from_settings(&settings));
        Self { settings, restorer }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Filtered, assembled blocks for one page's tokens.
    pub fn blocks(&self, tokens: Vec<Token>) -> Vec<TextBlock> {
        let filtered = self.settings.token_filter().apply(tokens);
        self.settings.assembler().assemble(&filtered)
    }

    /// Process a decoded page. Restoration failure falls back to the original raster.
    pub fn process_page(&self, raster: DynamicImage, tokens: Vec<Token>) -> ProcessedPage {
        let blocks = self.blocks(tokens);

        if !self.settings.clean_background {
            return ProcessedPage {
                page: SlidePage::new(raster.to_rgb8(), blocks),
                background: Background::Original,
            };
        }

        match self.restorer.restore(&raster, &blocks, self.settings.watermark) {
            Ok(cleaned) => ProcessedPage {
                page: SlidePage::new(cleaned, blocks),
                background: Background::Restored,
            },
            Err(e) => {
                log::warn!("Background restoration failed, keeping original: {}", e);
                ProcessedPage {
                    page: SlidePage::new(raster.to_rgb8(), blocks),
                    background: Background::Fallback,
                }
            }
        }
    }

    fn load_and_process(&self, index: usize, entry: &PageEntry) -> Result<ProcessedPage> {
        log::debug!("Page {}: {}", index + 1, entry.image.display());

        let raster = image::open(&entry.image)
            .with_context(|| format!("Failed to decode {}", entry.image.display()))?;
        let tokens = load_tokens(&entry.tokens)?;

        let processed = self.process_page(raster, tokens);
        log::debug!(
            "Page {}: {} blocks, background {:?}",
            index + 1,
            processed.page.blocks.len(),
            processed.background
        );
        Ok(processed)
    }

    /// Process every page in parallel, keeping input order.
    ///
    /// Pages not yet started when `cancel` is raised are skipped and the batch
    /// fails; pages already running finish first.
    pub fn run(
        &self,
        entries: &[PageEntry],
        cancel: &CancelFlag,
    ) -> Result<(Vec<SlidePage>, BatchReport)> {
        let results: Vec<Option<ProcessedPage>> = entries
            .par_iter()
            .enumerate()
            .map(|(index, entry)| {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                self.load_and_process(index, entry).map(Some)
            })
            .collect::<Result<_>>()?;

        let skipped = results.iter().filter(|r| r.is_none()).count();
        if skipped > 0 {
            bail!(
                "Cancelled with {} of {} pages not processed",
                skipped,
                entries.len()
            );
        }

        let processed: Vec<ProcessedPage> = results.into_iter().flatten().collect();
        let report = BatchReport::from_pages(&processed);
        let pages = processed.into_iter().map(|p| p.page).collect();
        Ok((pages, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use std::path::PathBuf;

    fn token(text: &str, confidence: i64, x: i64, y: i64, w: i64, h: i64) -> Token {
        Token::new(text, confidence, x, y, w, h).unwrap()
    }

    fn page_raster() -> DynamicImage {
        let mut img = RgbImage::from_pixel(200, 100, Rgb([230, 230, 230]));
        for x in 40..80 {
            img.put_pixel(x, 30, Rgb([0, 0, 0]));
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());

        flag.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_blocks_apply_settings_threshold() {
        let tokens = vec![
            token("Hello", 95, 100, 100, 50, 20),
            token("noise", 40, 160, 100, 50, 20),
        ];

        let strict = Pipeline::new(Settings::default());
        assert_eq!(strict.blocks(tokens.clone())[0].text, "Hello");

        let mut loose_settings = Settings::default();
        loose_settings.confidence_threshold = 10;
        let loose = Pipeline::new(loose_settings);
        assert_eq!(loose.blocks(tokens)[0].text, "Hello noise");
    }

    #[test]
    fn test_process_page_restores_background() {
        let pipeline = Pipeline::new(Settings::default());
        let processed = pipeline.process_page(page_raster(), vec![token("Hi", 95, 40, 28, 40, 5)]);

        assert_eq!(processed.background, Background::Restored);
        assert_eq!(processed.page.blocks.len(), 1);
        assert_eq!(*processed.page.background.get_pixel(60, 30), Rgb([230, 230, 230]));
    }

    #[test]
    fn test_process_page_without_cleaning_keeps_raster() {
        let pipeline = Pipeline::new(Settings::default().with_clean_background(false));
        let processed = pipeline.process_page(page_raster(), vec![token("Hi", 95, 40, 28, 40, 5)]);

        assert_eq!(processed.background, Background::Original);
        assert_eq!(*processed.page.background.get_pixel(60, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_process_page_falls_back_on_failure() {
        // A block covering the whole page leaves nothing to inpaint from.
        let pipeline = Pipeline::new(Settings::default());
        let processed =
            pipeline.process_page(page_raster(), vec![token("Full", 95, 0, 0, 200, 100)]);

        assert_eq!(processed.background, Background::Fallback);
        assert_eq!(processed.page.background, page_raster().to_rgb8());
        assert_eq!(processed.page.blocks.len(), 1);
    }

    #[test]
    fn test_run_keeps_input_order() {
        let dir = std::env::temp_dir().join(format!("slide-rebuild-run-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut entries = Vec::new();
        for (i, word) in ["first", "second", "third"].iter().enumerate() {
            let image = dir.join(format!("p{}.png", i));
            let tokens = dir.join(format!("p{}.json", i));
            page_raster().save(&image).unwrap();
            fs::write(
                &tokens,
                format!(
                    r#"[{{"text":"{}","confidence":90,"x":10,"y":10,"w":40,"h":12}}]"#,
                    word
                ),
            )
            .unwrap();
            entries.push(PageEntry { image, tokens });
        }

        let pipeline = Pipeline::new(Settings::default());
        let (pages, report) = pipeline.run(&entries, &CancelFlag::new()).unwrap();

        let texts: Vec<&str> = pages.iter().map(|p| p.blocks[0].text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(
            report,
            BatchReport {
                pages: 3,
                blocks: 3,
                restored: 3,
                fallbacks: 0,
            }
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_run_cancelled_before_start() {
        let entries = vec![PageEntry {
            image: PathBuf::from("/nonexistent/p1.png"),
            tokens: PathBuf::from("/nonexistent/p1.tsv"),
        }];
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = Pipeline::new(Settings::default())
            .run(&entries, &cancel)
            .unwrap_err();
        assert!(err.to_string().contains("Cancelled"));
    }

    #[test]
    fn test_run_missing_image_fails() {
        let entries = vec![PageEntry {
            image: PathBuf::from("/nonexistent/p1.png"),
            tokens: PathBuf::from("/nonexistent/p1.tsv"),
        }];

        assert!(Pipeline::new(Settings::default())
            .run(&entries, &CancelFlag::new())
            .is_err());
    }
}
