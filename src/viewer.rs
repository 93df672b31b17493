//! Page viewer: navigation, zoom and a bounded cache of rendered pages
//!
//! Page sizes are in PDF points and container sizes in pixels; at scale 1.0
//! one point maps to one pixel.

use crate::engine::{PageSize, PdfDocumentHandle, RenderedPage};
use crate::error::{Error, Result};
use crate::event_bus::{EventBus, Scale, ViewerEvent, ViewerId};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;

pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 10.0;
pub const MAX_AUTO_SCALE: f32 = 1.25;
pub const DEFAULT_SCALE_DELTA: f32 = 1.1;

fn is_same_scale(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-6
}

/// A host element the viewer is bound to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostElement {
    pub id: String,
    /// Client width in pixels
    pub width: f32,
    /// Client height in pixels
    pub height: f32,
}

impl HostElement {
    pub fn new(id: impl Into<String>, width: f32, height: f32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
        }
    }
}

/// Caller-controlled viewer options.
///
/// The container and the event bus are always supplied by the helper and
/// are not part of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerOptions {
    /// Preset applied whenever a document is set
    pub default_scale_value: Option<Scale>,
    /// Draw form widgets and their edited values
    pub enable_forms: bool,
    /// Renders larger than this many pixels are scaled down
    pub max_canvas_pixels: u64,
    /// Rendered pages kept in memory
    pub render_cache_pages: usize,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            default_scale_value: None,
            enable_forms: true,
            max_canvas_pixels: 1 << 25,
            render_cache_pages: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PageEntry {
    size: PageSize,
    label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RenderKey {
    page: u32,
    scale_bits: u32,
}

/// Viewer bound to a container element, a viewer element and an event bus
pub struct PdfViewer<D> {
    id: ViewerId,
    container: HostElement,
    viewer: HostElement,
    event_bus: EventBus,
    options: ViewerOptions,
    document: Option<Arc<D>>,
    pages: Vec<PageEntry>,
    current_page: u32,
    current_scale: f32,
    current_preset: Option<Scale>,
    render_cache: LruCache<RenderKey, RenderedPage>,
}

impl<D: PdfDocumentHandle> PdfViewer<D> {
    pub fn new(
        options: ViewerOptions,
        container: HostElement,
        viewer: HostElement,
        event_bus: EventBus,
    ) -> Self {
        let capacity = NonZeroUsize::new(options.render_cache_pages).unwrap_or(NonZeroUsize::MIN);
        Self {
            id: ViewerId::new(),
            container,
            viewer,
            event_bus,
            current_preset: options.default_scale_value,
            options,
            document: None,
            pages: Vec::new(),
            current_page: 1,
            current_scale: 1.0,
            render_cache: LruCache::new(capacity),
        }
    }

    pub fn id(&self) -> ViewerId {
        self.id
    }

    pub fn container(&self) -> &HostElement {
        &self.container
    }

    pub fn viewer_element(&self) -> &HostElement {
        &self.viewer
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn document(&self) -> Option<&Arc<D>> {
        self.document.as_ref()
    }

    /// Bind a document: reads every page, emits `pagesloaded` and applies
    /// the pending or default scale preset.
    pub async fn set_document(&mut self, document: Arc<D>) -> Result<()> {
        let count = document.num_pages();
        let mut pages = Vec::with_capacity(count as usize);
        for page_number in 1..=count {
            let page = document.page(page_number).await?;
            pages.push(PageEntry {
                size: page.size,
                label: page.label,
            });
        }

        self.document = Some(document);
        self.pages = pages;
        self.current_page = 1;
        self.render_cache.clear();

        tracing::debug!(viewer = %self.id, pages = count, "document set");
        self.event_bus.dispatch(ViewerEvent::PagesLoaded {
            source: self.id,
            pages_count: count,
        });

        if let Some(preset) = self.current_preset.or(self.options.default_scale_value) {
            self.current_preset = None;
            self.set_current_scale_value(preset)?;
        }
        Ok(())
    }

    pub fn pages_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn current_page_number(&self) -> u32 {
        self.current_page
    }

    pub fn current_page_label(&self) -> Option<&str> {
        self.page_entry(self.current_page)
            .and_then(|p| p.label.as_deref())
    }

    pub fn page_size(&self, page_number: u32) -> Option<PageSize> {
        self.page_entry(page_number).map(|p| p.size)
    }

    fn page_entry(&self, page_number: u32) -> Option<&PageEntry> {
        page_number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
    }

    /// Move to `page_number` (1-indexed). Emits `pagechanging` when the page changes.
    pub fn set_current_page_number(&mut self, page_number: u32) -> Result<()> {
        let total = self.pages_count();
        if page_number < 1 || page_number > total {
            return Err(Error::PageOutOfBounds {
                page: page_number,
                total,
            });
        }
        if page_number == self.current_page {
            return Ok(());
        }

        let previous = self.current_page;
        self.current_page = page_number;
        self.event_bus.dispatch(ViewerEvent::PageChanging {
            source: self.id,
            page_number,
            page_label: self.current_page_label().map(str::to_string),
            previous,
        });
        Ok(())
    }

    /// Move to the first page carrying `label`; returns false when no page has it
    pub fn set_current_page_label(&mut self, label: &str) -> Result<bool> {
        let position = self
            .pages
            .iter()
            .position(|p| p.label.as_deref() == Some(label));
        match position {
            Some(index) => {
                self.set_current_page_number(index as u32 + 1)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn next_page(&mut self) -> bool {
        if self.current_page >= self.pages_count() {
            return false;
        }
        self.set_current_page_number(self.current_page + 1).is_ok()
    }

    pub fn previous_page(&mut self) -> bool {
        if self.current_page <= 1 {
            return false;
        }
        self.set_current_page_number(self.current_page - 1).is_ok()
    }

    pub fn current_scale(&self) -> f32 {
        self.current_scale
    }

    /// Preset the current scale was derived from, if any
    pub fn current_scale_value(&self) -> Option<Scale> {
        self.current_preset
    }

    /// Set a numeric scale. Emits `scalechanging` without a preset.
    pub fn set_current_scale(&mut self, scale: f32) -> Result<()> {
        if !scale.is_finite() || !(MIN_SCALE..=MAX_SCALE).contains(&scale) {
            return Err(Error::InvalidScale {
                scale,
                min: MIN_SCALE,
                max: MAX_SCALE,
            });
        }
        self.apply_scale(scale, None);
        Ok(())
    }

    /// Set a preset scale, resolved against the container and the current page.
    ///
    /// Without a document the preset is kept and applied by [`Self::set_document`].
    pub fn set_current_scale_value(&mut self, preset: Scale) -> Result<()> {
        let Some(page) = self.page_size(self.current_page) else {
            self.current_preset = Some(preset);
            return Ok(());
        };
        let scale = resolve_preset(preset, page, &self.container);
        self.apply_scale(scale, Some(preset));
        Ok(())
    }

    pub fn increase_scale(&mut self, steps: u32) {
        let mut scale = self.current_scale;
        for _ in 0..steps {
            scale = ((scale * DEFAULT_SCALE_DELTA) * 100.0).round() / 100.0;
        }
        self.apply_scale(scale.min(MAX_SCALE), None);
    }

    pub fn decrease_scale(&mut self, steps: u32) {
        let mut scale = self.current_scale;
        for _ in 0..steps {
            scale = ((scale / DEFAULT_SCALE_DELTA) * 100.0).round() / 100.0;
        }
        self.apply_scale(scale.max(MIN_SCALE), None);
    }

    /// The container was resized; a preset scale is resolved again.
    pub fn resize_container(&mut self, width: f32, height: f32) -> Result<()> {
        self.container.width = width;
        self.container.height = height;
        match self.current_preset {
            Some(preset) if self.document.is_some() => self.set_current_scale_value(preset),
            _ => Ok(()),
        }
    }

    fn apply_scale(&mut self, scale: f32, preset: Option<Scale>) {
        if is_same_scale(scale, self.current_scale) && preset == self.current_preset {
            return;
        }
        self.current_scale = scale;
        self.current_preset = preset;
        self.event_bus.dispatch(ViewerEvent::ScaleChanging {
            source: self.id,
            scale,
            preset_value: preset,
        });
    }

    /// Render a page at the current scale, capped to `max_canvas_pixels`
    pub async fn render_page(&mut self, page_number: u32) -> Result<RenderedPage> {
        let document = self.document.clone().ok_or(Error::PageOutOfBounds {
            page: page_number,
            total: 0,
        })?;
        let page = self.page_size(page_number).ok_or(Error::PageOutOfBounds {
            page: page_number,
            total: self.pages_count(),
        })?;

        let scale = capped_scale(self.current_scale, page, self.options.max_canvas_pixels);
        let key = RenderKey {
            page: page_number,
            scale_bits: scale.to_bits(),
        };
        if let Some(cached) = self.render_cache.get(&key) {
            return Ok(cached.clone());
        }

        let rendered = document
            .render_page(page_number, scale, self.options.enable_forms)
            .await?;
        self.render_cache.put(key, rendered.clone());
        Ok(rendered)
    }

    pub fn cached_pages(&self) -> usize {
        self.render_cache.len()
    }
}

/// Resolve a preset against a page and the container it is shown in
pub fn resolve_preset(preset: Scale, page: PageSize, container: &HostElement) -> f32 {
    let width_scale = container.width / page.width;
    let height_scale = container.height / page.height;

    let scale = match preset {
        Scale::PageActual => 1.0,
        Scale::PageWidth => width_scale,
        Scale::PageFit => width_scale.min(height_scale),
        Scale::Auto => {
            let horizontal = if page.is_portrait() {
                width_scale
            } else {
                width_scale.min(height_scale)
            };
            horizontal.min(MAX_AUTO_SCALE)
        }
    };

    if scale.is_finite() {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    } else {
        1.0
    }
}

fn capped_scale(scale: f32, page: PageSize, max_pixels: u64) -> f32 {
    let pixels = (page.width * scale) as f64 * (page.height * scale) as f64;
    if max_pixels == 0 || pixels <= max_pixels as f64 {
        return scale;
    }
    scale * (max_pixels as f64 / pixels).sqrt() as f32
}
