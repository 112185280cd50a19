use std::borrow::Cow;
use std::fmt;

use tracing::{debug, info};

use crate::eigen::symmetric_eigen;
use crate::gallery::{Embedding, Gallery};
use crate::ProjectionError;

/// Default upper bound on the reduced dimension.
pub const DEFAULT_MAX_COMPONENTS: usize = 64;

/// Minimum number of same-length embeddings needed to fit a projection.
pub const MIN_TRAINING_SAMPLES: usize = 3;

/// Relative variance below which a principal component is considered empty.
const DEGENERATE_RATIO: f64 = 1e-10;

/// A fitted principal-component projection.
///
/// Maps an input vector `x` of length [`Projection::input_dim`] to
/// `(x - mean) . components`, one output value per component.
pub struct Projection {
    mean: Vec<f64>,
    components: Vec<Vec<f32>>,
    variances: Vec<f64>,
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection")
            .field("input_dim", &self.input_dim())
            .field("output_dim", &self.output_dim())
            .finish()
    }
}

impl Projection {
    /// Fits `n_components` principal axes to `samples`.
    ///
    /// All samples must share one length `d`, and
    /// `2 <= n_components <= min(d, samples.len() - 1)`.
    ///
    /// The axes come from the eigendecomposition of whichever is smaller:
    /// the `n x n` Gram matrix of the centred samples or their `d x d`
    /// scatter matrix. Each axis is oriented so its largest-magnitude
    /// coordinate is positive, which makes fits reproducible.
    pub fn fit(samples: &[&[f32]], n_components: usize) -> Result<Self, ProjectionError> {
        if n_components < 2 {
            return Err(ProjectionError::TooFewComponents(n_components));
        }
        let n = samples.len();
        if n < n_components + 1 {
            return Err(ProjectionError::TooFewSamples {
                need: n_components + 1,
                got: n,
            });
        }
        let d = samples[0].len();
        if let Some(bad) = samples.iter().find(|s| s.len() != d) {
            return Err(ProjectionError::DimensionMismatch {
                expected: d,
                got: bad.len(),
            });
        }
        if n_components > d {
            return Err(ProjectionError::TooFewComponents(d));
        }
        if samples.iter().flat_map(|s| s.iter()).any(|x| !x.is_finite()) {
            return Err(ProjectionError::NonFinite);
        }

        let mut mean = vec![0.0f64; d];
        for s in samples {
            for (m, &x) in mean.iter_mut().zip(s.iter()) {
                *m += x as f64;
            }
        }
        for m in mean.iter_mut() {
            *m /= n as f64;
        }
        let centred: Vec<Vec<f64>> = samples
            .iter()
            .map(|s| s.iter().zip(&mean).map(|(&x, m)| x as f64 - m).collect())
            .collect();

        let (values, axes) = if n <= d {
            gram_axes(&centred, d)?
        } else {
            scatter_axes(&centred, d)?
        };

        let top = values.first().copied().unwrap_or(0.0);
        let mut components = Vec::with_capacity(n_components);
        let mut variances = Vec::with_capacity(n_components);
        for k in 0..n_components {
            let lambda = values[k];
            if !(lambda > 0.0) || lambda <= top * DEGENERATE_RATIO {
                return Err(ProjectionError::Degenerate(k));
            }
            let mut axis = axes[k].clone();
            orient(&mut axis);
            if axis.iter().any(|x| !x.is_finite()) {
                return Err(ProjectionError::NonFinite);
            }
            components.push(axis.iter().map(|&x| x as f32).collect());
            variances.push(lambda / (n - 1) as f64);
        }

        Ok(Self {
            mean,
            components,
            variances,
        })
    }

    /// Returns the length of vectors this projection accepts.
    pub fn input_dim(&self) -> usize {
        self.mean.len()
    }

    /// Returns the length of projected vectors.
    pub fn output_dim(&self) -> usize {
        self.components.len()
    }

    /// Variance captured by each component, in component order.
    pub fn explained_variance(&self) -> &[f64] {
        &self.variances
    }

    /// Projects `x` onto the fitted components.
    pub fn transform(&self, x: &[f32]) -> Result<Vec<f32>, ProjectionError> {
        if x.len() != self.input_dim() {
            return Err(ProjectionError::DimensionMismatch {
                expected: self.input_dim(),
                got: x.len(),
            });
        }
        let centred: Vec<f64> = x.iter().zip(&self.mean).map(|(&v, m)| v as f64 - m).collect();
        let out: Vec<f32> = self
            .components
            .iter()
            .map(|c| {
                c.iter()
                    .zip(&centred)
                    .map(|(&w, &v)| w as f64 * v)
                    .sum::<f64>() as f32
            })
            .collect();
        if out.iter().any(|v| !v.is_finite()) {
            return Err(ProjectionError::NonFinite);
        }
        Ok(out)
    }
}

/// Principal axes via the Gram matrix `X X^T`; used when samples are fewer
/// than dimensions. Axis k is `X^T u_k / sqrt(lambda_k)`.
fn gram_axes(centred: &[Vec<f64>], d: usize) -> Result<(Vec<f64>, Vec<Vec<f64>>), ProjectionError> {
    let n = centred.len();
    let mut gram = vec![0.0f64; n * n];
    for i in 0..n {
        for j in i..n {
            let dot: f64 = centred[i].iter().zip(&centred[j]).map(|(a, b)| a * b).sum();
            gram[i * n + j] = dot;
            gram[j * n + i] = dot;
        }
    }
    let eig = symmetric_eigen(gram, n)?;

    let axes = eig
        .values
        .iter()
        .zip(&eig.vectors)
        .map(|(&lambda, u)| {
            let mut axis = vec![0.0f64; d];
            for (row, &w) in centred.iter().zip(u) {
                for (a, &x) in axis.iter_mut().zip(row) {
                    *a += w * x;
                }
            }
            if lambda > 0.0 {
                let scale = 1.0 / lambda.sqrt();
                for a in axis.iter_mut() {
                    *a *= scale;
                }
            }
            axis
        })
        .collect();
    Ok((eig.values, axes))
}

/// Principal axes via the scatter matrix `X^T X`.
fn scatter_axes(centred: &[Vec<f64>], d: usize) -> Result<(Vec<f64>, Vec<Vec<f64>>), ProjectionError> {
    let mut scatter = vec![0.0f64; d * d];
    for row in centred {
        for a in 0..d {
            let ra = row[a];
            if ra == 0.0 {
                continue;
            }
            for b in a..d {
                scatter[a * d + b] += ra * row[b];
            }
        }
    }
    for a in 0..d {
        for b in (a + 1)..d {
            scatter[b * d + a] = scatter[a * d + b];
        }
    }
    let eig = symmetric_eigen(scatter, d)?;
    Ok((eig.values, eig.vectors))
}

fn orient(axis: &mut [f64]) {
    let pivot = axis
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        for x in axis.iter_mut() {
            *x = -*x;
        }
    }
}

/// Holds the current projection model, if any, and rebuilds it from the
/// gallery on request.
pub struct Projector {
    model: Option<Projection>,
    max_components: usize,
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMPONENTS)
    }
}

impl Projector {
    pub fn new(max_components: usize) -> Self {
        Self {
            model: None,
            max_components,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&Projection> {
        self.model.as_ref()
    }

    /// Drops the current model.
    pub fn reset(&mut self) {
        self.model = None;
    }

    /// Refits the projection from every embedding in the gallery.
    ///
    /// Only embeddings of the most common length are used (ties go to the
    /// length seen first). The reduced dimension is
    /// `min(max_components, length, samples - 1)`. On any failure the
    /// previous model is kept. Returns true when a new model was installed.
    pub fn retrain(&mut self, gallery: &Gallery) -> bool {
        match self.fit_from(gallery) {
            Ok(model) => {
                info!(
                    "gallery: projection retrained {} -> {} from {} embeddings",
                    model.input_dim(),
                    model.output_dim(),
                    gallery.total_embeddings()
                );
                self.model = Some(model);
                true
            }
            Err(e) => {
                debug!("gallery: retrain skipped, keeping previous projection: {e}");
                false
            }
        }
    }

    fn fit_from(&self, gallery: &Gallery) -> Result<Projection, ProjectionError> {
        let total = gallery.total_embeddings();
        if total < MIN_TRAINING_SAMPLES {
            return Err(ProjectionError::TooFewSamples {
                need: MIN_TRAINING_SAMPLES,
                got: total,
            });
        }

        let dim = dominant_dim(gallery).unwrap_or(0);
        let samples: Vec<&[f32]> = gallery
            .embeddings()
            .filter(|e| e.dim() == dim)
            .map(|e| e.as_slice())
            .collect();
        if samples.len() < MIN_TRAINING_SAMPLES {
            return Err(ProjectionError::TooFewSamples {
                need: MIN_TRAINING_SAMPLES,
                got: samples.len(),
            });
        }

        let n_components = self.max_components.min(dim).min(samples.len() - 1);
        if n_components < 2 {
            return Err(ProjectionError::TooFewComponents(n_components));
        }
        Projection::fit(&samples, n_components)
    }

    /// Projects every stored embedding with the current model, giving the
    /// view that projected queries are matched against. `None` when no
    /// model is trained.
    pub fn project_gallery(&self, gallery: &Gallery) -> Option<Gallery> {
        self.model.as_ref()?;
        let mut view = Gallery::new();
        for (name, embs) in gallery.iter() {
            for e in embs {
                view.push(name, Embedding::new(self.apply(e.as_slice()).into_owned()));
            }
        }
        Some(view)
    }

    /// Projects `emb` with the current model.
    ///
    /// Returns the input unchanged when no model is trained, when its
    /// length differs from what the model expects, or when the transform
    /// fails.
    pub fn apply<'a>(&self, emb: &'a [f32]) -> Cow<'a, [f32]> {
        let Some(model) = &self.model else {
            return Cow::Borrowed(emb);
        };
        if emb.len() != model.input_dim() {
            return Cow::Borrowed(emb);
        }
        match model.transform(emb) {
            Ok(out) => Cow::Owned(out),
            Err(e) => {
                debug!("gallery: projection failed, passing embedding through: {e}");
                Cow::Borrowed(emb)
            }
        }
    }
}

/// Returns the most common embedding length, first-seen on ties.
fn dominant_dim(gallery: &Gallery) -> Option<usize> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for e in gallery.embeddings() {
        match counts.iter_mut().find(|(d, _)| *d == e.dim()) {
            Some((_, c)) => *c += 1,
            None => counts.push((e.dim(), 1)),
        }
    }
    let mut best: Option<(usize, usize)> = None;
    for (dim, count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((dim, count));
        }
    }
    best.map(|(dim, _)| dim)
}
