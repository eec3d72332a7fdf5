//! Aggregated transforms: per-axis-block compounds and concatenations.

use std::sync::Arc;

use super::{concatenate, LinearTransform, MathTransform};
use crate::error::{GridError, Result};

/// A transform made of independent square blocks operating on consecutive
/// dimension ranges, e.g. an affine 2-D horizontal block plus an
/// interpolated 1-D vertical block.
#[derive(Debug, Clone)]
pub struct CompoundTransform {
    blocks: Vec<Arc<dyn MathTransform>>,
    dimension: usize,
}

impl CompoundTransform {
    /// Create a compound from square blocks. Dimensions are assigned to
    /// blocks in order.
    pub fn new(blocks: Vec<Arc<dyn MathTransform>>) -> Result<Self> {
        if blocks.is_empty() {
            return Err(GridError::invalid("compound transform needs at least one block"));
        }
        let mut dimension = 0;
        for block in &blocks {
            if block.source_dimensions() != block.target_dimensions() {
                return Err(GridError::invalid(
                    "compound transform blocks must be square",
                ));
            }
            dimension += block.source_dimensions();
        }
        Ok(Self { blocks, dimension })
    }

    /// The blocks and the source dimension at which each starts.
    fn block_ranges(&self) -> impl Iterator<Item = (usize, &Arc<dyn MathTransform>)> {
        let mut start = 0;
        self.blocks.iter().map(move |block| {
            let s = start;
            start += block.source_dimensions();
            (s, block)
        })
    }
}

impl MathTransform for CompoundTransform {
    fn source_dimensions(&self) -> usize {
        self.dimension
    }

    fn target_dimensions(&self) -> usize {
        self.dimension
    }

    fn transform(&self, coordinates: &[f64]) -> Result<Vec<f64>> {
        if coordinates.len() != self.dimension {
            return Err(GridError::MismatchedDimension {
                expected: self.dimension,
                actual: coordinates.len(),
            });
        }
        let mut out = Vec::with_capacity(self.dimension);
        for (start, block) in self.block_ranges() {
            let end = start + block.source_dimensions();
            out.extend(block.transform(&coordinates[start..end])?);
        }
        Ok(out)
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>> {
        let blocks = self
            .blocks
            .iter()
            .map(|block| block.inverse())
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(CompoundTransform {
            blocks,
            dimension: self.dimension,
        }))
    }

    fn separate(&self, keep: &[usize]) -> Result<Arc<dyn MathTransform>> {
        let mut kept_blocks: Vec<Arc<dyn MathTransform>> = Vec::new();
        for (start, block) in self.block_ranges() {
            let end = start + block.source_dimensions();
            let local: Vec<usize> = keep
                .iter()
                .filter(|&&d| d >= start && d < end)
                .map(|&d| d - start)
                .collect();
            if local.is_empty() {
                continue;
            }
            if local.len() == block.source_dimensions() {
                kept_blocks.push(Arc::clone(block));
            } else {
                kept_blocks.push(block.separate(&local)?);
            }
        }
        if let [single] = kept_blocks.as_slice() {
            Ok(Arc::clone(single))
        } else {
            Ok(Arc::new(CompoundTransform::new(kept_blocks)?))
        }
    }

    fn to_linear(&self) -> Option<LinearTransform> {
        let linear_blocks: Option<Vec<LinearTransform>> =
            self.blocks.iter().map(|block| block.to_linear()).collect();
        let linear_blocks = linear_blocks?;
        // assemble a block-diagonal homogeneous matrix
        let n = self.dimension;
        let mut elements = vec![0.0; (n + 1) * (n + 1)];
        let mut start = 0;
        for block in &linear_blocks {
            let b = block.source_dimensions();
            for r in 0..b {
                for c in 0..b {
                    elements[(start + r) * (n + 1) + (start + c)] = block.element(r, c);
                }
                elements[(start + r) * (n + 1) + n] = block.element(r, b);
            }
            start += b;
        }
        elements[n * (n + 1) + n] = 1.0;
        LinearTransform::from_matrix(n, n, &elements).ok()
    }

    fn is_identity(&self) -> bool {
        self.blocks.iter().all(|block| block.is_identity())
    }
}

/// Two transforms applied in sequence: `second(first(x))`.
///
/// Built through [`concatenate`], which collapses linear pairs before
/// falling back to this representation.
#[derive(Debug, Clone)]
pub struct ConcatenatedTransform {
    first: Arc<dyn MathTransform>,
    second: Arc<dyn MathTransform>,
}

impl ConcatenatedTransform {
    pub(crate) fn new(first: Arc<dyn MathTransform>, second: Arc<dyn MathTransform>) -> Self {
        Self { first, second }
    }
}

impl MathTransform for ConcatenatedTransform {
    fn source_dimensions(&self) -> usize {
        self.first.source_dimensions()
    }

    fn target_dimensions(&self) -> usize {
        self.second.target_dimensions()
    }

    fn transform(&self, coordinates: &[f64]) -> Result<Vec<f64>> {
        self.second.transform(&self.first.transform(coordinates)?)
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>> {
        concatenate(self.second.inverse()?, self.first.inverse()?)
    }

    fn separate(&self, keep: &[usize]) -> Result<Arc<dyn MathTransform>> {
        if let Some(linear) = self.to_linear() {
            return Ok(Arc::new(linear.select_dimensions(keep)?));
        }
        // both sides must keep the same dimensions for the chain to split
        let first = self.first.separate(keep)?;
        let second = self.second.separate(keep)?;
        concatenate(first, second)
    }

    fn to_linear(&self) -> Option<LinearTransform> {
        let a = self.first.to_linear()?;
        let b = self.second.to_linear()?;
        b.concat(&a).ok()
    }
}
