//! The viewer helper
//!
//! [`PdfJsHelper`] initializes the engine worker exactly once and gates every
//! public operation behind that initialization. It loads documents with the
//! configured asset URLs, constructs viewers and answers form questions about
//! loaded documents. [`HelperFactory`] decides whether helpers are shared.

use crate::capabilities::{BuildVariant, PlatformCapabilities};
use crate::config::HelperConfig;
use crate::engine::{
    Annotation, AnnotationSubtype, DocumentInitParameters, DocumentOptions, PdfDocumentHandle,
    PdfEngine,
};
use crate::error::{Error, Result};
use crate::event_bus::EventBus;
use crate::forms::{self, FieldType, RequiredField};
use crate::viewer::{HostElement, PdfViewer, ViewerOptions};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Where a document comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSource<'a> {
    /// PDF bytes; the helper hands a copy to the engine
    Data(&'a [u8]),
    /// URL (or path) the engine fetches itself
    Url(&'a str),
}

impl<'a> From<&'a [u8]> for DocumentSource<'a> {
    fn from(data: &'a [u8]) -> Self {
        DocumentSource::Data(data)
    }
}

impl<'a> From<&'a Vec<u8>> for DocumentSource<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        DocumentSource::Data(data)
    }
}

impl<'a> From<&'a str> for DocumentSource<'a> {
    fn from(url: &'a str) -> Self {
        DocumentSource::Url(url)
    }
}

/// Helper around a PDF engine
pub struct PdfJsHelper<E: PdfEngine> {
    engine: E,
    config: HelperConfig,
    variant: BuildVariant,
    initialized: OnceCell<std::result::Result<(), Arc<Error>>>,
}

impl<E: PdfEngine> PdfJsHelper<E> {
    /// Create a helper. The worker is installed on first use (or by [`Self::ready`]).
    pub fn new(engine: E, config: HelperConfig, capabilities: PlatformCapabilities) -> Self {
        let variant = if config.worker.force_legacy {
            BuildVariant::Legacy
        } else {
            capabilities.build_variant()
        };

        Self {
            engine,
            config,
            variant,
            initialized: OnceCell::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    pub fn build_variant(&self) -> BuildVariant {
        self.variant
    }

    /// Whether initialization has settled (successfully or not)
    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Install the worker of the selected build. Runs at most once; the
    /// outcome, failure included, is shared by every later caller.
    async fn init(&self) -> Result<()> {
        let outcome = self
            .initialized
            .get_or_init(|| async {
                let worker = self.config.worker.resolve(self.variant).map_err(Arc::new)?;
                self.engine
                    .install_worker(&worker)
                    .await
                    .map_err(Arc::new)?;
                tracing::info!(variant = %self.variant, location = %worker.location, "worker installed");
                Ok(())
            })
            .await;

        outcome.clone().map_err(Error::Initialization)
    }

    /// Wait until the worker is installed
    pub async fn ready(&self) -> Result<()> {
        self.init().await
    }

    /// Load a document from bytes or a URL
    pub async fn load_document<'a>(
        &self,
        source: impl Into<DocumentSource<'a>>,
        options: DocumentOptions,
    ) -> Result<E::Document> {
        self.init().await?;

        let assets = &self.config.assets;
        let mut params = DocumentInitParameters {
            cmap_url: assets.cmap_url.clone(),
            icc_url: assets.icc_url.clone(),
            wasm_url: assets.wasm_url.clone(),
            cmap_packed: self.config.cmap_packed,
            url: None,
            data: None,
            options,
        };

        match source.into() {
            // The engine takes ownership of the bytes; the caller's buffer stays untouched
            DocumentSource::Data(data) => params.data = Some(data.to_vec()),
            DocumentSource::Url(url) => params.url = Some(url.to_string()),
        }

        tracing::debug!(
            cmap_url = %params.cmap_url,
            icc_url = %params.icc_url,
            wasm_url = %params.wasm_url,
            url = ?params.url,
            "loading document"
        );
        self.engine.get_document(params).await
    }

    /// Serialize the document including edited form values
    pub async fn get_pdf_data(&self, document: &E::Document) -> Result<Vec<u8>> {
        self.init().await?;
        document.save_document().await
    }

    /// Whether the document carries a fillable form: the AcroForm flag is set
    /// and at least one field is something other than a signature.
    pub async fn has_form(&self, document: &E::Document) -> Result<bool> {
        self.init().await?;

        let fields = document.field_objects().await?;
        let metadata = document.metadata().await?;

        let Some(info) = metadata.and_then(|m| m.info) else {
            return Ok(false);
        };
        if !info.is_acro_form_present.unwrap_or(false) {
            return Ok(false);
        }

        Ok(fields
            .iter()
            .flat_map(|groups| groups.values())
            .flatten()
            .any(|field| matches!(field.field_type, Some(t) if t != FieldType::Signature)))
    }

    /// Whether the user edited any form value since the document was loaded
    pub async fn form_values_have_changed(&self, document: &E::Document) -> Result<bool> {
        if !self.has_form(document).await? {
            return Ok(false);
        }
        Ok(document.annotation_storage().size() > 0)
    }

    /// Annotations a host should watch: required widgets and push buttons,
    /// in page order.
    pub async fn get_form_fields_to_listen(
        &self,
        document: &E::Document,
    ) -> Result<Vec<Annotation>> {
        if !self.has_form(document).await? {
            return Ok(Vec::new());
        }

        let mut listened = Vec::new();
        for page_number in 1..=document.num_pages() {
            let page = document.page(page_number).await?;
            listened.extend(page.annotations.into_iter().filter(|annotation| {
                (annotation.required && annotation.subtype == AnnotationSubtype::Widget)
                    || annotation.push_button
            }));
        }
        Ok(listened)
    }

    /// Required-field descriptors for the listened fields, using edited values where present
    pub async fn get_required_fields(&self, document: &E::Document) -> Result<Vec<RequiredField>> {
        let storage = document.annotation_storage();
        Ok(self
            .get_form_fields_to_listen(document)
            .await?
            .iter()
            .filter(|annotation| annotation.required)
            .filter_map(|annotation| {
                annotation.to_required_field(storage.get_value(&annotation.id).as_ref())
            })
            .collect())
    }

    /// True when every distinct field name has at least one filled member
    pub fn all_required_fields_filled(required_fields: &[RequiredField]) -> bool {
        forms::all_required_fields_filled(required_fields)
    }

    /// Create a viewer bound to `container` and `viewer` with a fresh event bus
    pub async fn create_pdf_viewer(
        &self,
        options: ViewerOptions,
        container: HostElement,
        viewer: HostElement,
    ) -> Result<PdfViewer<E::Document>> {
        self.init().await?;

        let event_bus = EventBus::new();
        let pdf_viewer = PdfViewer::new(options, container, viewer, event_bus);
        tracing::debug!(viewer = %pdf_viewer.id(), container = %pdf_viewer.container().id, "viewer created");
        Ok(pdf_viewer)
    }
}

/// Whether helpers created by a [`HelperFactory`] are shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecyclePolicy {
    /// Every request builds an independent helper
    #[default]
    Independent,
    /// One helper is created lazily and handed out to every request
    Shared,
    /// At most one helper may ever be created; a second creation fails
    Exclusive,
}

type EngineBuilder<E> = Box<dyn Fn() -> E + Send + Sync>;

/// Creates helpers that agree on configuration and platform capabilities
pub struct HelperFactory<E: PdfEngine> {
    policy: LifecyclePolicy,
    config: HelperConfig,
    capabilities: PlatformCapabilities,
    engine_builder: EngineBuilder<E>,
    instance: Mutex<Option<Arc<PdfJsHelper<E>>>>,
}

impl<E: PdfEngine> HelperFactory<E> {
    pub fn new(
        policy: LifecyclePolicy,
        config: HelperConfig,
        capabilities: PlatformCapabilities,
        engine_builder: impl Fn() -> E + Send + Sync + 'static,
    ) -> Self {
        Self {
            policy,
            config,
            capabilities,
            engine_builder: Box::new(engine_builder),
            instance: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    pub fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    fn build(&self) -> Arc<PdfJsHelper<E>> {
        Arc::new(PdfJsHelper::new(
            (self.engine_builder)(),
            self.config.clone(),
            self.capabilities,
        ))
    }

    /// Create a helper according to the policy.
    ///
    /// Under [`LifecyclePolicy::Exclusive`] only the first call succeeds.
    pub fn create(&self) -> Result<Arc<PdfJsHelper<E>>> {
        match self.policy {
            LifecyclePolicy::Independent => Ok(self.build()),
            LifecyclePolicy::Shared => Ok(self.get_or_create()),
            LifecyclePolicy::Exclusive => {
                let mut slot = self.instance.lock();
                if slot.is_some() {
                    return Err(Error::SingletonViolation);
                }
                let helper = self.build();
                *slot = Some(helper.clone());
                Ok(helper)
            }
        }
    }

    /// The shared helper, created on first request. Independent policies get a new helper.
    pub fn get_or_create(&self) -> Arc<PdfJsHelper<E>> {
        if self.policy == LifecyclePolicy::Independent {
            return self.build();
        }
        self.instance
            .lock()
            .get_or_insert_with(|| self.build())
            .clone()
    }

    /// The shared helper, if one was created
    pub fn instance(&self) -> Option<Arc<PdfJsHelper<E>>> {
        self.instance.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::StaticProbe;
    use crate::engine::MemoryEngine;

    fn factory(policy: LifecyclePolicy) -> HelperFactory<MemoryEngine> {
        HelperFactory::new(
            policy,
            HelperConfig::default(),
            PlatformCapabilities::default(),
            MemoryEngine::new,
        )
    }

    #[test]
    fn test_legacy_capabilities_select_legacy_build() {
        let caps = PlatformCapabilities::detect(&StaticProbe {
            deferred_completion: false,
            url_parse: true,
        });
        let helper = PdfJsHelper::new(MemoryEngine::new(), HelperConfig::default(), caps);
        assert_eq!(helper.build_variant(), BuildVariant::Legacy);
    }

    #[test]
    fn test_force_legacy_overrides_capabilities() {
        let mut config = HelperConfig::default();
        config.worker.force_legacy = true;
        let helper = PdfJsHelper::new(MemoryEngine::new(), config, PlatformCapabilities::default());
        assert_eq!(helper.build_variant(), BuildVariant::Legacy);
    }

    #[test]
    fn test_independent_policy_creates_new_helpers() {
        let factory = factory(LifecyclePolicy::Independent);
        let a = factory.create().unwrap();
        let b = factory.create().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(factory.instance().is_none());
    }

    #[test]
    fn test_shared_policy_memoizes() {
        let factory = factory(LifecyclePolicy::Shared);
        let a = factory.create().unwrap();
        let b = factory.get_or_create();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &factory.instance().unwrap()));
    }

    #[test]
    fn test_exclusive_policy_rejects_second_helper() {
        let factory = factory(LifecyclePolicy::Exclusive);
        let first = factory.create().unwrap();
        assert!(matches!(factory.create(), Err(Error::SingletonViolation)));
        assert!(Arc::ptr_eq(&first, &factory.get_or_create()));
    }

    #[test]
    fn test_document_source_conversions() {
        let bytes = vec![1u8, 2, 3];
        assert_eq!(DocumentSource::from(&bytes), DocumentSource::Data(&[1, 2, 3]));
        assert_eq!(
            DocumentSource::from("https://example.com/a.pdf"),
            DocumentSource::Url("https://example.com/a.pdf")
        );
    }
}
