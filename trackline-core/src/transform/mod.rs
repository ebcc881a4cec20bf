//! # View transforms
//!
//! Mapping between source-image data coordinates and widget screen
//! coordinates. The transform is a pure function of a [`ViewState`], so the
//! cache only recomputes when a *quantized* view actually differs - sub-pixel
//! zoom/pan jitter that couldn't move any pixel never invalidates it.

/// Margin around a fitted image, in screen pixels.
pub const MARGIN: f64 = 8.0;

/// Rendering intent of a view.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Quality {
    /// Mid-drag: speed over precision.
    Interactive,
    /// Settled view: bit-for-bit reproducible output.
    Final,
}
impl Default for Quality {
    fn default() -> Self {
        Self::Final
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewError {
    #[error("non-finite view parameter")]
    NonFinite,
    #[error("zoom must be positive")]
    NonPositiveZoom,
    #[error("widget too small to hold the margins")]
    ViewportTooSmall,
    #[error("source image size must be positive")]
    EmptyImage,
}

/// Immutable description of how the user is looking at the image. Cheap,
/// per-paint value - build a fresh one instead of mutating a shared one.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ViewState {
    zoom: f64,
    /// User pan, in screen pixels.
    pan: [f64; 2],
    widget_size: [f64; 2],
    image_size: [f64; 2],
    quality: Quality,
}

impl ViewState {
    pub fn new(
        zoom: f64,
        pan: [f64; 2],
        widget_size: [f64; 2],
        image_size: [f64; 2],
        quality: Quality,
    ) -> Result<Self, ViewError> {
        let finite = zoom.is_finite()
            && pan.iter().all(|v| v.is_finite())
            && widget_size.iter().all(|v| v.is_finite())
            && image_size.iter().all(|v| v.is_finite());
        if !finite {
            return Err(ViewError::NonFinite);
        }
        if zoom <= 0.0 {
            return Err(ViewError::NonPositiveZoom);
        }
        if widget_size.iter().any(|&side| side <= 2.0 * MARGIN) {
            return Err(ViewError::ViewportTooSmall);
        }
        if image_size.iter().any(|&side| side <= 0.0) {
            return Err(ViewError::EmptyImage);
        }
        Ok(Self {
            zoom,
            pan,
            widget_size,
            image_size,
            quality,
        })
    }
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }
    #[must_use]
    pub fn pan(&self) -> [f64; 2] {
        self.pan
    }
    #[must_use]
    pub fn widget_size(&self) -> [f64; 2] {
        self.widget_size
    }
    #[must_use]
    pub fn image_size(&self) -> [f64; 2] {
        self.image_size
    }
    #[must_use]
    pub fn quality(&self) -> Quality {
        self.quality
    }
    /// A copy with different zoom. Validation still applies.
    pub fn with_zoom(&self, zoom: f64) -> Result<Self, ViewError> {
        Self::new(zoom, self.pan, self.widget_size, self.image_size, self.quality)
    }
    pub fn with_pan(&self, pan: [f64; 2]) -> Result<Self, ViewError> {
        Self::new(self.zoom, pan, self.widget_size, self.image_size, self.quality)
    }
    #[must_use]
    pub fn with_quality(&self, quality: Quality) -> Self {
        Self { quality, ..*self }
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    /// The transform cannot be inverted anymore; scale collapsed to nothing.
    #[error("uninvertable")]
    Uninvertable,
}

/// Uniform scale followed by translation, derived from a [`ViewState`].
/// Data space is source-image pixels, top-left origin; screen space is widget
/// pixels, same orientation.
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Transform {
    pub scale: f64,
    pub offset: [f64; 2],
}

impl Transform {
    /// Fit the image into the widget (with margins), apply the user zoom,
    /// center, then pan.
    #[must_use]
    pub fn from_view(view: &ViewState) -> Self {
        let [widget_w, widget_h] = view.widget_size();
        let [image_w, image_h] = view.image_size();
        let fit_w = (widget_w - 2.0 * MARGIN) / image_w;
        let fit_h = (widget_h - 2.0 * MARGIN) / image_h;
        let scale = fit_w.min(fit_h) * view.zoom();
        let offset = [
            (widget_w - image_w * scale) / 2.0 + view.pan()[0],
            (widget_h - image_h * scale) / 2.0 + view.pan()[1],
        ];
        Self { scale, offset }
    }
    /// Convert a point in data space to screen space.
    #[must_use]
    pub fn project(&self, data: [f64; 2]) -> [f64; 2] {
        [
            data[0] * self.scale + self.offset[0],
            data[1] * self.scale + self.offset[1],
        ]
    }
    /// Convert a point in screen space back to data space.
    pub fn unproject(&self, screen: [f64; 2]) -> Result<[f64; 2], TransformError> {
        if self.scale.abs() < f64::MIN_POSITIVE {
            return Err(TransformError::Uninvertable);
        }
        Ok([
            (screen[0] - self.offset[0]) / self.scale,
            (screen[1] - self.offset[1]) / self.scale,
        ])
    }
    /// Project many points in one call. The scale and offset are bound once
    /// outside the loop - per point this is a multiply-add, not a cache probe.
    /// Output matches scalar [`Self::project`] exactly.
    pub fn project_batch(&self, data: &[[f64; 2]], out: &mut Vec<[f64; 2]>) {
        out.clear();
        out.reserve(data.len());
        let Self { scale, offset } = *self;
        out.extend(data.iter().map(|point| {
            [
                point[0] * scale + offset[0],
                point[1] * scale + offset[1],
            ]
        }));
    }
    /// Draft-precision batch projection for interactive scrubbing: the inner
    /// loop runs in f32. Cheaper on wide data, within a small fraction of a
    /// pixel of the exact result at interactive zoom levels.
    pub fn project_batch_draft(&self, data: &[[f64; 2]], out: &mut Vec<[f64; 2]>) {
        out.clear();
        out.reserve(data.len());
        let scale = self.scale as f32;
        let offset = [self.offset[0] as f32, self.offset[1] as f32];
        out.extend(data.iter().map(|point| {
            [
                f64::from(point[0] as f32 * scale + offset[0]),
                f64::from(point[1] as f32 * scale + offset[1]),
            ]
        }));
    }
}

/// Quantization steps deciding when two views count as the same transform.
///
/// Defaults collapse deltas well below one device pixel on 4K-scale
/// viewports; embedders rendering at other resolutions swap in their own
/// steps rather than editing constants here.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Quantizer {
    pub zoom_step: f64,
    /// Screen pixels per pan step.
    pub pan_step: f64,
}
impl Default for Quantizer {
    fn default() -> Self {
        Self {
            zoom_step: 1e-3,
            pan_step: 0.125,
        }
    }
}
impl Quantizer {
    fn key(&self, view: &ViewState) -> ViewKey {
        #[allow(clippy::cast_possible_truncation)]
        let quantize = |value: f64, step: f64| (value / step).round() as i64;
        ViewKey {
            zoom: quantize(view.zoom(), self.zoom_step),
            pan: view.pan().map(|value| quantize(value, self.pan_step)),
            // Any size change moves pixels; compare sizes exactly.
            widget_size: view.widget_size().map(f64::to_bits),
            image_size: view.image_size().map(f64::to_bits),
            quality: view.quality(),
        }
    }
}

/// A quantized view - the cache key.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
struct ViewKey {
    zoom: i64,
    pan: [i64; 2],
    widget_size: [u64; 2],
    image_size: [u64; 2],
    quality: Quality,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Caches the transform of the most recent view. Interactive frames mostly
/// differ by sub-quantum jitter, so the common case is a key compare and a
/// copy.
#[derive(Debug, Default)]
pub struct TransformCache {
    quantizer: Quantizer,
    cached: Option<(ViewKey, Transform)>,
    stats: CacheStats,
}

impl TransformCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with_quantizer(quantizer: Quantizer) -> Self {
        Self {
            quantizer,
            ..Self::default()
        }
    }
    /// The transform for `view`, reusing the cached one when the quantized
    /// view is unchanged.
    pub fn transform(&mut self, view: &ViewState) -> Transform {
        let key = self.quantizer.key(view);
        if let Some((cached_key, transform)) = &self.cached {
            if *cached_key == key {
                self.stats.hits += 1;
                return *transform;
            }
        }
        self.stats.misses += 1;
        let transform = Transform::from_view(view);
        self.cached = Some((key, transform));
        transform
    }
    /// Batch-project through the cached transform, honoring the view's
    /// quality: final views take the exact f64 path, interactive ones the
    /// draft path.
    pub fn project_batch(&mut self, view: &ViewState, data: &[[f64; 2]], out: &mut Vec<[f64; 2]>) {
        let transform = self.transform(view);
        match view.quality() {
            Quality::Final => transform.project_batch(data, out),
            Quality::Interactive => transform.project_batch_draft(data, out),
        }
    }
    /// Drop the cached transform; the next call recomputes. Cheap enough to
    /// call on any doubt.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
