//! Integration tests for viewers created by the helper

use pdf_viewer_helper::engine::{DocumentOptions, MemoryDocument, MemoryEngine, PageSize};
use pdf_viewer_helper::{
    Error, HelperConfig, HostElement, PdfJsHelper, PdfViewer, PlatformCapabilities, Scale,
    ViewerEvent, ViewerOptions,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

const DOC_URL: &str = "https://example.com/book.pdf";

fn container() -> HostElement {
    HostElement::new("viewerContainer", 1224.0, 792.0)
}

fn viewer_element() -> HostElement {
    HostElement::new("viewer", 1224.0, 792.0)
}

fn book() -> MemoryDocument {
    MemoryDocument::new(3)
        .with_page_label(1, "i")
        .with_page_label(2, "1")
        .with_page_label(3, "2")
}

async fn open(
    options: ViewerOptions,
) -> (
    PdfJsHelper<MemoryEngine>,
    PdfViewer<MemoryDocument>,
    Arc<MemoryDocument>,
) {
    let helper = PdfJsHelper::new(
        MemoryEngine::new(),
        HelperConfig::default(),
        PlatformCapabilities::default(),
    );
    helper.engine().register_url(DOC_URL, book());
    let document = helper
        .load_document(DOC_URL, DocumentOptions::default())
        .await
        .unwrap();
    let viewer = helper
        .create_pdf_viewer(options, container(), viewer_element())
        .await
        .unwrap();
    (helper, viewer, Arc::new(document))
}

fn drain(rx: &mut Receiver<ViewerEvent>) -> Vec<ViewerEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

// ============================================================================
// create_pdf_viewer
// ============================================================================

#[tokio::test]
async fn test_viewer_bound_to_elements() {
    let (_, viewer, _) = open(ViewerOptions::default()).await;
    assert_eq!(viewer.container().id, "viewerContainer");
    assert_eq!(viewer.viewer_element().id, "viewer");
    assert!(viewer.document().is_none());
}

#[tokio::test]
async fn test_each_viewer_gets_its_own_bus() {
    let (helper, first, _) = open(ViewerOptions::default()).await;
    let second = helper
        .create_pdf_viewer(ViewerOptions::default(), container(), viewer_element())
        .await
        .unwrap();

    assert!(!first.event_bus().same_channel(second.event_bus()));
    assert_ne!(first.id(), second.id());
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_set_document_emits_pagesloaded_then_default_scale() {
    let options = ViewerOptions {
        default_scale_value: Some(Scale::PageWidth),
        ..ViewerOptions::default()
    };
    let (_, mut viewer, document) = open(options).await;
    let mut rx = viewer.event_bus().subscribe();

    viewer.set_document(document).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            ViewerEvent::PagesLoaded {
                source: viewer.id(),
                pages_count: 3,
            },
            ViewerEvent::ScaleChanging {
                source: viewer.id(),
                scale: 2.0,
                preset_value: Some(Scale::PageWidth),
            },
        ]
    );
    assert_eq!(viewer.current_scale_value(), Some(Scale::PageWidth));
}

#[tokio::test]
async fn test_page_navigation_emits_pagechanging() {
    let (_, mut viewer, document) = open(ViewerOptions::default()).await;
    viewer.set_document(document).await.unwrap();
    let mut rx = viewer.event_bus().subscribe();

    viewer.set_current_page_number(3).unwrap();
    // Same page: no event
    viewer.set_current_page_number(3).unwrap();
    assert!(viewer.set_current_page_label("1").unwrap());

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            ViewerEvent::PageChanging {
                source: viewer.id(),
                page_number: 3,
                page_label: Some("2".to_string()),
                previous: 1,
            },
            ViewerEvent::PageChanging {
                source: viewer.id(),
                page_number: 2,
                page_label: Some("1".to_string()),
                previous: 3,
            },
        ]
    );
    assert_eq!(viewer.current_page_label(), Some("1"));
}

#[tokio::test]
async fn test_page_navigation_bounds() {
    let (_, mut viewer, document) = open(ViewerOptions::default()).await;
    viewer.set_document(document).await.unwrap();

    assert!(matches!(
        viewer.set_current_page_number(4),
        Err(Error::PageOutOfBounds { page: 4, total: 3 })
    ));
    assert!(viewer.set_current_page_number(0).is_err());
    assert!(!viewer.previous_page());
    assert!(viewer.next_page());
    assert!(viewer.next_page());
    assert!(!viewer.next_page());
    assert_eq!(viewer.current_page_number(), 3);
    assert!(!viewer.set_current_page_label("xiv").unwrap());
}

#[tokio::test]
async fn test_numeric_scale_clears_preset() {
    let (_, mut viewer, document) = open(ViewerOptions::default()).await;
    viewer.set_document(document).await.unwrap();
    viewer.set_current_scale_value(Scale::PageFit).unwrap();
    let mut rx = viewer.event_bus().subscribe();

    viewer.set_current_scale(1.5).unwrap();
    assert!(viewer.set_current_scale(42.0).is_err());

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![ViewerEvent::ScaleChanging {
            source: viewer.id(),
            scale: 1.5,
            preset_value: None,
        }]
    );
    assert_eq!(viewer.current_scale_value(), None);
}

#[tokio::test]
async fn test_preset_before_document_is_applied_on_load() {
    let (_, mut viewer, document) = open(ViewerOptions::default()).await;
    viewer.set_current_scale_value(Scale::PageActual).unwrap();
    viewer.set_current_scale(2.0).unwrap();
    viewer.set_current_scale_value(Scale::PageFit).unwrap();

    viewer.set_document(document).await.unwrap();
    assert_eq!(viewer.current_scale_value(), Some(Scale::PageFit));
    assert_eq!(viewer.current_scale(), 1.0);
}

#[tokio::test]
async fn test_resize_reapplies_preset() {
    let (_, mut viewer, document) = open(ViewerOptions::default()).await;
    viewer.set_document(document).await.unwrap();
    viewer.set_current_scale_value(Scale::PageWidth).unwrap();

    viewer.resize_container(612.0, 792.0).unwrap();
    assert_eq!(viewer.current_scale(), 1.0);
    assert_eq!(viewer.current_scale_value(), Some(Scale::PageWidth));
}

// ============================================================================
// Rendering
// ============================================================================

#[tokio::test]
async fn test_render_cache_is_bounded() {
    let options = ViewerOptions {
        render_cache_pages: 2,
        ..ViewerOptions::default()
    };
    let (_, mut viewer, document) = open(options).await;
    viewer.set_document(document).await.unwrap();

    let first = viewer.render_page(1).await.unwrap();
    assert_eq!((first.width, first.height), (612, 792));
    viewer.render_page(1).await.unwrap();
    assert_eq!(viewer.cached_pages(), 1);

    viewer.render_page(2).await.unwrap();
    viewer.render_page(3).await.unwrap();
    assert_eq!(viewer.cached_pages(), 2);

    assert!(viewer.render_page(4).await.is_err());
}

#[tokio::test]
async fn test_render_passes_form_option_to_engine() {
    for enable_forms in [true, false] {
        let options = ViewerOptions {
            enable_forms,
            ..ViewerOptions::default()
        };
        let (_, mut viewer, document) = open(options).await;
        viewer.set_document(document.clone()).await.unwrap();

        viewer.render_page(2).await.unwrap();
        assert_eq!(document.renders(), vec![(2, enable_forms)]);
    }
}

#[tokio::test]
async fn test_render_respects_canvas_limit() {
    let options = ViewerOptions {
        max_canvas_pixels: 100 * 100,
        ..ViewerOptions::default()
    };
    let helper = PdfJsHelper::new(
        MemoryEngine::new(),
        HelperConfig::default(),
        PlatformCapabilities::default(),
    );
    helper.engine().register_url(
        DOC_URL,
        MemoryDocument::new(1).with_page_size(
            1,
            PageSize {
                width: 200.0,
                height: 200.0,
            },
        ),
    );
    let document = helper
        .load_document(DOC_URL, DocumentOptions::default())
        .await
        .unwrap();
    let mut viewer = helper
        .create_pdf_viewer(options, container(), viewer_element())
        .await
        .unwrap();
    viewer.set_document(Arc::new(document)).await.unwrap();

    let rendered = viewer.render_page(1).await.unwrap();
    assert_eq!((rendered.width, rendered.height), (100, 100));
}
