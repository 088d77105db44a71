use std::sync::{
    atomic::{AtomicU64, Ordering},
    mpsc::{self, channel},
    Arc,
};
use std::thread::JoinHandle;

use anyhow::Context;
use image::RgbaImage;

use crate::assets::AssetSource;
use crate::catalog::CatalogEntry;
use crate::error::LoadError;
use crate::scene_graph::Model;

/// Uniform scale applied to every loaded model.
pub const MODEL_SCALE: f32 = 8.0;
/// After centring, models are dropped by their height divided by this.
pub const MODEL_DROP_DIVISOR: f32 = 15.0;

/// Sequence number of a load request. Later requests compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub(crate) u64);

pub enum LoadEvent {
    CatalogListed(Vec<String>),
    CatalogResolved {
        request: RequestId,
        entry: CatalogEntry,
        image: Option<RgbaImage>,
    },
    ModelReady {
        request: RequestId,
        model: Model,
    },
    Failed {
        request: RequestId,
        error: LoadError,
    },
}

impl std::fmt::Debug for LoadEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadEvent::CatalogListed(names) => f.debug_tuple("CatalogListed").field(names).finish(),
            LoadEvent::CatalogResolved { request, entry, .. } => f
                .debug_struct("CatalogResolved")
                .field("request", request)
                .field("entry", &entry.name)
                .finish_non_exhaustive(),
            LoadEvent::ModelReady { request, model } => f
                .debug_struct("ModelReady")
                .field("request", request)
                .field("model", model)
                .finish(),
            LoadEvent::Failed { request, error } => f
                .debug_struct("Failed")
                .field("request", request)
                .field("error", &error.to_string())
                .finish(),
        }
    }
}

enum Job {
    ListCatalog,
    Load { request: RequestId, name: String },
}

// Resolves catalog entries and loads models on a worker thread.
pub struct ModelLoader {
    jobs: mpsc::Sender<Job>,
    events: mpsc::Receiver<LoadEvent>,
    next_request: AtomicU64,
    _worker: JoinHandle<()>,
}

impl ModelLoader {
    pub fn new(source: Arc<dyn AssetSource>) -> anyhow::Result<Self> {
        let (send_jobs, recv_jobs) = channel();
        let (send_events, recv_events) = channel();
        let worker = std::thread::Builder::new()
            .name("model-loader".into())
            .spawn(move || run_worker(source.as_ref(), recv_jobs, send_events))
            .context("Failed to spawn model loader thread")?;

        Ok(Self {
            jobs: send_jobs,
            events: recv_events,
            next_request: AtomicU64::new(0),
            _worker: worker,
        })
    }

    /// Queues a load of the catalog entry called `name`. Once it resolves to
    /// an entry it supersedes every earlier request; a failed lookup
    /// supersedes nothing.
    pub fn request(&self, name: &str) -> RequestId {
        let request = RequestId(self.next_request.fetch_add(1, Ordering::SeqCst) + 1);
        log::info!("Requesting model {name} ({request:?})");

        let job = Job::Load {
            request,
            name: name.to_string(),
        };
        if self.jobs.send(job).is_err() {
            log::error!("Model loader thread has stopped; dropping request for {name}");
        }

        request
    }

    pub fn list_catalog(&self) {
        if self.jobs.send(Job::ListCatalog).is_err() {
            log::error!("Model loader thread has stopped; cannot list catalog");
        }
    }

    pub fn poll(&self) -> Vec<LoadEvent> {
        self.events.try_iter().collect()
    }

    #[cfg(test)]
    pub(crate) fn recv_timeout(&self, timeout: std::time::Duration) -> Option<LoadEvent> {
        self.events.recv_timeout(timeout).ok()
    }
}

/// True when a newer request has already resolved to a catalog entry.
fn is_superseded(request: RequestId, resolved: &AtomicU64) -> bool {
    request.0 < resolved.load(Ordering::SeqCst)
}

fn run_worker(
    source: &dyn AssetSource,
    jobs: mpsc::Receiver<Job>,
    events: mpsc::Sender<LoadEvent>,
) {
    // Highest request that has resolved to a catalog entry.
    let resolved = AtomicU64::new(0);

    for job in jobs {
        let result = match job {
            Job::ListCatalog => list_catalog(source, &events),
            Job::Load { request, name } => load(source, request, &name, &events, &resolved),
        };

        if result.is_err() {
            log::debug!("Model loader receiver dropped, stopping worker");
            break;
        }
    }
}

type SendResult = Result<(), mpsc::SendError<LoadEvent>>;

fn list_catalog(source: &dyn AssetSource, events: &mpsc::Sender<LoadEvent>) -> SendResult {
    let names = match source.fetch_catalog() {
        Ok(catalog) => catalog.names().map(String::from).collect(),
        Err(error) => {
            log::error!("{}", LoadError::CatalogFetch(error));
            Vec::new()
        }
    };

    events.send(LoadEvent::CatalogListed(names))
}

fn load(
    source: &dyn AssetSource,
    request: RequestId,
    name: &str,
    events: &mpsc::Sender<LoadEvent>,
    resolved: &AtomicU64,
) -> SendResult {
    if is_superseded(request, resolved) {
        log::debug!("Skipping superseded request for {name} ({request:?})");
        return Ok(());
    }

    let catalog = match source.fetch_catalog() {
        Ok(catalog) => catalog,
        Err(error) => {
            return events.send(LoadEvent::Failed {
                request,
                error: LoadError::CatalogFetch(error),
            });
        }
    };

    let Some(entry) = catalog.find(name).cloned() else {
        return events.send(LoadEvent::Failed {
            request,
            error: LoadError::NotFound(name.to_string()),
        });
    };

    let image = match source.load_image(&entry.image_path) {
        Ok(image) => Some(image),
        Err(error) => {
            log::warn!("Fallback image for {} unavailable: {error:#}", entry.name);
            None
        }
    };

    let model_path = entry.model_path.clone();
    resolved.fetch_max(request.0, Ordering::SeqCst);
    events.send(LoadEvent::CatalogResolved {
        request,
        entry,
        image,
    })?;

    if is_superseded(request, resolved) {
        log::debug!("Skipping superseded model {model_path} ({request:?})");
        return Ok(());
    }

    match source.load_model(&model_path) {
        Ok(mut model) => {
            model.fit_to_origin(MODEL_SCALE, MODEL_DROP_DIVISOR);
            log::info!(
                "Loaded model {} from {model_path} ({} nodes)",
                model.name,
                model.node_count()
            );
            events.send(LoadEvent::ModelReady { request, model })
        }
        Err(error) => events.send(LoadEvent::Failed {
            request,
            error: LoadError::AssetLoad {
                path: model_path,
                error,
            },
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::catalog::Catalog;
    use crate::scene_graph::model::tests::test_model;

    /// Serves a fixed catalog; model paths ending in `.glb` load, others fail.
    pub(crate) struct MemorySource {
        pub catalog: Option<Catalog>,
    }

    impl MemorySource {
        pub(crate) fn drinks() -> Self {
            let entry = |name: &str, model_path: &str| CatalogEntry {
                name: name.into(),
                description: format!("A can of {name}"),
                image_path: format!("{}.png", name.to_lowercase()),
                model_path: model_path.into(),
            };

            Self {
                catalog: Some(Catalog {
                    models: vec![
                        entry("Cola", "cola.glb"),
                        entry("Lemonade", "lemonade.glb"),
                        entry("Broken", "broken.obj"),
                    ],
                }),
            }
        }

        pub(crate) fn offline() -> Self {
            Self { catalog: None }
        }
    }

    impl AssetSource for MemorySource {
        fn fetch_catalog(&self) -> anyhow::Result<Catalog> {
            self.catalog.clone().context("network unreachable")
        }

        fn load_model(&self, path: &str) -> anyhow::Result<Model> {
            match path.strip_suffix(".glb") {
                Some(stem) => Ok(test_model(stem)),
                None => anyhow::bail!("unsupported asset {path}"),
            }
        }

        fn load_image(&self, path: &str) -> anyhow::Result<RgbaImage> {
            if path.starts_with("broken") {
                anyhow::bail!("no such image");
            }
            Ok(RgbaImage::new(2, 2))
        }
    }

    fn next_event(loader: &ModelLoader) -> LoadEvent {
        loader
            .recv_timeout(Duration::from_secs(5))
            .expect("loader produced no event")
    }

    #[test]
    fn request_ids_increase() {
        let loader = ModelLoader::new(Arc::new(MemorySource::offline())).unwrap();
        let first = loader.request("Cola");
        let second = loader.request("Cola");

        assert!(second > first);
    }

    #[test]
    fn only_newer_resolved_requests_supersede() {
        let resolved = AtomicU64::new(2);

        assert!(is_superseded(RequestId(1), &resolved));
        assert!(!is_superseded(RequestId(2), &resolved));
        assert!(!is_superseded(RequestId(3), &resolved));
    }

    #[test]
    fn failed_lookup_does_not_cancel_an_earlier_load() {
        let loader = ModelLoader::new(Arc::new(MemorySource::drinks())).unwrap();
        let cola = loader.request("Cola");
        let water = loader.request("Water");

        assert!(matches!(
            next_event(&loader),
            LoadEvent::CatalogResolved { request, .. } if request == cola
        ));
        assert!(matches!(
            next_event(&loader),
            LoadEvent::ModelReady { request, .. } if request == cola
        ));
        assert!(matches!(
            next_event(&loader),
            LoadEvent::Failed { request, error: LoadError::NotFound(_) } if request == water
        ));
    }

    #[test]
    fn found_entry_resolves_then_loads_a_recentred_model() {
        let loader = ModelLoader::new(Arc::new(MemorySource::drinks())).unwrap();
        let request = loader.request("Cola");

        match next_event(&loader) {
            LoadEvent::CatalogResolved {
                request: resolved,
                entry,
                image,
            } => {
                assert_eq!(resolved, request);
                assert_eq!(entry.image_path, "cola.png");
                assert!(image.is_some());
            }
            other => panic!("unexpected event {other:?}"),
        }

        match next_event(&loader) {
            LoadEvent::ModelReady { request: ready, model } => {
                assert_eq!(ready, request);
                assert_eq!(model.name, "cola");
                assert_eq!(model.transform.scale(), glam::Vec3::splat(MODEL_SCALE));
                let centre = model.world_bounds().center();
                assert!(centre.x.abs() < 1e-4 && centre.z.abs() < 1e-4);
                assert!(centre.y < 0.0);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unknown_name_fails_with_not_found() {
        let loader = ModelLoader::new(Arc::new(MemorySource::drinks())).unwrap();
        loader.request("Water");

        match next_event(&loader) {
            LoadEvent::Failed {
                error: LoadError::NotFound(name),
                ..
            } => assert_eq!(name, "Water"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unreachable_catalog_fails_with_fetch_error() {
        let loader = ModelLoader::new(Arc::new(MemorySource::offline())).unwrap();
        loader.request("Cola");

        assert!(matches!(
            next_event(&loader),
            LoadEvent::Failed {
                error: LoadError::CatalogFetch(_),
                ..
            }
        ));
    }

    #[test]
    fn bad_asset_resolves_catalog_then_fails_to_load() {
        let loader = ModelLoader::new(Arc::new(MemorySource::drinks())).unwrap();
        loader.request("Broken");

        match next_event(&loader) {
            LoadEvent::CatalogResolved { image, .. } => assert!(image.is_none()),
            other => panic!("unexpected event {other:?}"),
        }
        match next_event(&loader) {
            LoadEvent::Failed {
                error: LoadError::AssetLoad { path, .. },
                ..
            } => assert_eq!(path, "broken.obj"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn listing_reports_names_in_catalog_order() {
        let loader = ModelLoader::new(Arc::new(MemorySource::drinks())).unwrap();
        loader.list_catalog();

        match next_event(&loader) {
            LoadEvent::CatalogListed(names) => {
                assert_eq!(names, vec!["Cola", "Lemonade", "Broken"])
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn listing_an_unreachable_catalog_yields_an_empty_menu() {
        let loader = ModelLoader::new(Arc::new(MemorySource::offline())).unwrap();
        loader.list_catalog();

        assert!(matches!(
            next_event(&loader),
            LoadEvent::CatalogListed(names) if names.is_empty()
        ));
    }
}
