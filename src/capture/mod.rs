//! Raster capture of rendered poster trees.
//!
//! A capture strategy turns a [`VisualTree`] into a [`RasterImage`]. Every
//! strategy follows the same protocol: mount the tree onto an off-screen
//! surface, settle (fonts and images ready), paint, then unmount. The surface
//! is always released, whether painting succeeded or not.

mod direct;
pub mod fallback;
pub mod fonts;
mod paint;
mod visible;

pub use direct::DirectCapture;
pub use fallback::{HtmlPrintFallback, PrintFallback};
pub use fonts::FontBook;
pub use visible::VisibleCapture;

use crate::render::VisualTree;
use cartel_traits::ResourceProvider;
use cartel_types::RasterImage;
use paint::ImageCache;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    #[error("Empty capture container: {strategy} mounted a tree with no visible components")]
    EmptyContainer { strategy: &'static str },

    #[error("Capture surface error: {0}")]
    Surface(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("All capture strategies failed: {}", .attempts.join("; "))]
    Exhausted { attempts: Vec<String> },
}

/// Largest surface a strategy allocates, in device pixels.
pub const MAX_SURFACE_PIXELS: u64 = 64 * 1024 * 1024;

/// Device-pixel size of a canvas at `scale`, with `margin` added on every side.
pub(crate) fn surface_size(width: f32, height: f32, scale: f32, margin: u32) -> Result<(u32, u32), CaptureError> {
    let side = |len: f32| -> Option<u32> {
        let px = (f64::from(len) * f64::from(scale)).round();
        if !px.is_finite() || px < 1.0 || px > f64::from(u32::MAX) {
            return None;
        }
        (px as u32).checked_add(margin.checked_mul(2)?)
    };
    let (w, h) = side(width).zip(side(height)).ok_or_else(|| {
        CaptureError::Surface(format!("cannot size a {}x{} canvas at {}x", width, height, scale))
    })?;
    if u64::from(w) * u64::from(h) > MAX_SURFACE_PIXELS {
        return Err(CaptureError::Surface(format!(
            "{}x{} surface exceeds the {} pixel limit",
            w, h, MAX_SURFACE_PIXELS
        )));
    }
    Ok((w, h))
}

/// Converts a rendered tree into pixels.
pub trait CaptureStrategy: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn capture(&self, tree: &VisualTree, assets: &CaptureAssets) -> Result<RasterImage, CaptureError>;
}

/// Everything a strategy needs besides the tree itself.
#[derive(Debug, Clone)]
pub struct CaptureAssets {
    pub fonts: Arc<FontBook>,
    pub resources: Arc<dyn ResourceProvider>,
    pub surfaces: SurfaceRegistry,
}

/// Counts mounted capture surfaces for one pipeline.
#[derive(Debug, Clone, Default)]
pub struct SurfaceRegistry {
    inner: Arc<SurfaceCounts>,
}

#[derive(Debug, Default)]
struct SurfaceCounts {
    mounted: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surfaces currently mounted.
    pub fn mounted(&self) -> usize {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously mounted surfaces seen so far.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    /// Surfaces mounted over the registry's lifetime.
    pub fn total(&self) -> usize {
        self.inner.total.load(Ordering::SeqCst)
    }
}

/// A mounted off-screen surface holding one tree and its settled images.
///
/// Dropping the surface unmounts it.
pub(crate) struct CaptureSurface<'t> {
    pub tree: &'t VisualTree,
    pub images: ImageCache,
    registry: SurfaceRegistry,
}

impl<'t> CaptureSurface<'t> {
    /// Mounts `tree` and waits for its assets. Fails when nothing would be painted.
    pub fn mount(
        strategy: &'static str,
        tree: &'t VisualTree,
        assets: &CaptureAssets,
    ) -> Result<Self, CaptureError> {
        let registry = assets.surfaces.clone();
        let mounted = registry.inner.mounted.fetch_add(1, Ordering::SeqCst) + 1;
        registry.inner.peak.fetch_max(mounted, Ordering::SeqCst);
        registry.inner.total.fetch_add(1, Ordering::SeqCst);
        let mut surface = Self {
            tree,
            images: ImageCache::new(),
            registry,
        };

        if tree.is_empty() {
            return Err(CaptureError::EmptyContainer { strategy });
        }
        if !tree.width.is_finite() || !tree.height.is_finite() || tree.width < 1.0 || tree.height < 1.0 {
            return Err(CaptureError::Surface(format!(
                "cannot mount a {}x{} surface",
                tree.width, tree.height
            )));
        }
        surface.images = paint::decode_images(tree, assets.resources.as_ref())?;
        Ok(surface)
    }
}

impl Drop for CaptureSurface<'_> {
    fn drop(&mut self) {
        let previous = self
            .registry
            .inner
            .mounted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous.is_err() {
            log::warn!("Capture surface unmounted twice; registry already empty");
        }
    }
}

/// Outcome of one batch attempt under a strategy.
#[derive(Debug)]
pub enum Attempt<E> {
    /// The strategy failed; the next one may succeed.
    Capture(CaptureError),
    /// Not a capture problem. Stops the chain.
    Fatal(E),
}

impl<E> From<CaptureError> for Attempt<E> {
    fn from(err: CaptureError) -> Self {
        Attempt::Capture(err)
    }
}

/// Ordered capture strategies, tried in turn for a whole batch.
#[derive(Debug, Clone)]
pub struct CaptureChain {
    strategies: Vec<Arc<dyn CaptureStrategy>>,
}

impl CaptureChain {
    pub fn new(strategies: Vec<Arc<dyn CaptureStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> impl Iterator<Item = &dyn CaptureStrategy> {
        self.strategies.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Runs `batch` with each strategy until one completes the entire batch.
    ///
    /// Returns the result with the name of the strategy that produced it. A
    /// `Fatal` error stops immediately; when every strategy reports a capture
    /// error the individual messages are kept in [`CaptureError::Exhausted`].
    pub fn run<T, E, F>(&self, mut batch: F) -> Result<(T, &'static str), Attempt<E>>
    where
        F: FnMut(&dyn CaptureStrategy) -> Result<T, Attempt<E>>,
    {
        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match batch(strategy.as_ref()) {
                Ok(value) => {
                    if !attempts.is_empty() {
                        log::info!("Batch captured by fallback strategy '{}'", strategy.name());
                    }
                    return Ok((value, strategy.name()));
                }
                Err(Attempt::Capture(err)) => {
                    log::warn!("Capture strategy '{}' failed: {}", strategy.name(), err);
                    attempts.push(format!("{}: {}", strategy.name(), err));
                }
                Err(fatal @ Attempt::Fatal(_)) => return Err(fatal),
            }
        }
        Err(Attempt::Capture(CaptureError::Exhausted { attempts }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{ImageBlock, ImageFit, ShapeBlock, VisualKind, VisualNode};
    use cartel_traits::InMemoryResourceProvider;
    use cartel_types::{Color, Frame};
    use std::sync::Mutex;

    fn assets() -> CaptureAssets {
        CaptureAssets {
            fonts: Arc::new(FontBook::empty()),
            resources: Arc::new(InMemoryResourceProvider::new()),
            surfaces: SurfaceRegistry::new(),
        }
    }

    fn tree(nodes: usize) -> VisualTree {
        VisualTree {
            width: 40.0,
            height: 20.0,
            background: Color::WHITE,
            nodes: (0..nodes)
                .map(|i| VisualNode {
                    component_id: format!("box-{}", i),
                    frame: Frame { x: 0.0, y: 0.0, width: 10.0, height: 10.0, rotation: 0.0 },
                    z: i as i32,
                    opacity: 1.0,
                    kind: VisualKind::Shape(ShapeBlock {
                        fill: Some(Color::BLACK),
                        stroke: None,
                        corner_radius: 0.0,
                        ellipse: false,
                    }),
                })
                .collect(),
        }
    }

    fn image_node(source: &str) -> VisualNode {
        VisualNode {
            component_id: "photo".into(),
            frame: Frame { x: 0.0, y: 0.0, width: 10.0, height: 10.0, rotation: 0.0 },
            z: 9,
            opacity: 1.0,
            kind: VisualKind::Image(ImageBlock { source: source.into(), fit: ImageFit::Contain }),
        }
    }

    #[derive(Debug)]
    struct Scripted {
        name: &'static str,
        fail: bool,
        calls: Mutex<usize>,
    }

    impl CaptureStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn capture(&self, _tree: &VisualTree, _assets: &CaptureAssets) -> Result<RasterImage, CaptureError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                Err(CaptureError::Surface("scripted failure".into()))
            } else {
                Ok(RasterImage::new(1, 1, vec![0, 0, 0, 255]).unwrap())
            }
        }
    }

    #[test]
    fn empty_tree_fails_and_still_unmounts() {
        let assets = assets();
        let empty = tree(0);
        let err = CaptureSurface::mount("direct", &empty, &assets).err().unwrap();
        assert!(matches!(err, CaptureError::EmptyContainer { strategy: "direct" }));
        assert_eq!(assets.surfaces.mounted(), 0);
        assert_eq!(assets.surfaces.total(), 1);
    }

    #[test]
    fn surface_size_rejects_overflow() {
        assert_eq!(surface_size(50.0, 30.0, 2.0, 0).unwrap(), (100, 60));
        assert_eq!(surface_size(50.0, 30.0, 2.0, 48).unwrap(), (196, 156));
        assert!(matches!(surface_size(3.0e9, 10.0, 2.0, 48), Err(CaptureError::Surface(_))));
        assert!(matches!(surface_size(10.0, 10.0, 1.0, u32::MAX), Err(CaptureError::Surface(_))));
        assert!(matches!(surface_size(10_000.0, 10_000.0, 2.0, 0), Err(CaptureError::Surface(_))));
        assert!(matches!(surface_size(f32::NAN, 10.0, 1.0, 0), Err(CaptureError::Surface(_))));
    }

    #[test]
    fn undecodable_image_fails_the_mount() {
        let resources = InMemoryResourceProvider::new();
        resources.add("img/bad.png", b"not an image at all".to_vec()).unwrap();
        let assets = CaptureAssets {
            fonts: Arc::new(FontBook::empty()),
            resources: Arc::new(resources),
            surfaces: SurfaceRegistry::new(),
        };
        let mut t = tree(1);
        t.nodes.push(image_node("img/bad.png"));

        let err = CaptureSurface::mount("direct", &t, &assets).err().unwrap();
        assert!(matches!(&err, CaptureError::Image(msg) if msg.contains("img/bad.png")), "{}", err);
        assert_eq!(assets.surfaces.mounted(), 0);
    }

    #[test]
    fn missing_image_mounts_with_a_placeholder() {
        let assets = assets();
        let mut t = tree(1);
        t.nodes.push(image_node("img/gone.png"));

        let surface = CaptureSurface::mount("direct", &t, &assets).unwrap();
        assert_eq!(surface.images.get("img/gone.png").map(Option::is_none), Some(true));
    }

    #[test]
    fn surfaces_are_released_on_drop() {
        let assets = assets();
        let t = tree(2);
        {
            let _surface = CaptureSurface::mount("direct", &t, &assets).unwrap();
            assert_eq!(assets.surfaces.mounted(), 1);
        }
        assert_eq!(assets.surfaces.mounted(), 0);
        assert_eq!(assets.surfaces.peak(), 1);
    }

    #[test]
    fn chain_falls_back_for_the_whole_batch() {
        let first = Arc::new(Scripted { name: "first", fail: true, calls: Mutex::new(0) });
        let second = Arc::new(Scripted { name: "second", fail: false, calls: Mutex::new(0) });
        let chain = CaptureChain::new(vec![first.clone(), second.clone()]);
        let assets = assets();
        let trees: Vec<_> = (0..3).map(|_| tree(1)).collect();

        let (rasters, used) = chain
            .run(|strategy| {
                trees
                    .iter()
                    .map(|t| strategy.capture(t, &assets).map_err(Attempt::<()>::Capture))
                    .collect::<Result<Vec<_>, _>>()
            })
            .unwrap();

        assert_eq!(used, "second");
        assert_eq!(rasters.len(), 3);
        assert_eq!(*first.calls.lock().unwrap(), 1);
        assert_eq!(*second.calls.lock().unwrap(), 3);
    }

    #[test]
    fn exhausted_chain_keeps_every_message() {
        let chain = CaptureChain::new(vec![
            Arc::new(Scripted { name: "a", fail: true, calls: Mutex::new(0) }),
            Arc::new(Scripted { name: "b", fail: true, calls: Mutex::new(0) }),
        ]);
        let assets = assets();
        let t = tree(1);
        let err = chain
            .run(|s| s.capture(&t, &assets).map_err(Attempt::<()>::Capture))
            .unwrap_err();
        match err {
            Attempt::Capture(CaptureError::Exhausted { attempts }) => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].starts_with("a: "));
                assert!(attempts[1].contains("scripted failure"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fatal_errors_stop_the_chain() {
        let second = Arc::new(Scripted { name: "second", fail: false, calls: Mutex::new(0) });
        let chain = CaptureChain::new(vec![
            Arc::new(Scripted { name: "first", fail: false, calls: Mutex::new(0) }),
            second.clone(),
        ]);
        let err = chain.run(|_| Err::<(), _>(Attempt::Fatal("disk full"))).unwrap_err();
        assert!(matches!(err, Attempt::Fatal("disk full")));
        assert_eq!(*second.calls.lock().unwrap(), 0);
    }
}
