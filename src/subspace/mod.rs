//! # Linear subspaces
//!
//! A [`Subspace`] is the persisted result of a training run: a basis of
//! `subspace_dim` axes in the original `original_dim`-dimensional space, the
//! center that is subtracted before projecting, and one relevance score
//! (criterion value) per axis.
//!
//! ## Available generators
//! - **PCA** ([`PcaSubspaceGenerator`]): variance-maximizing basis, with the
//!   Gram-matrix shortcut when samples are fewer than dimensions
//! - **LDA** ([`LdaSubspaceGenerator`]): class-separating basis, optionally
//!   preceded by a PCA reduction
//!
//! Binary layout: `[i64 kind][i64 subspace_dim][i64 original_dim]
//! [original_dim f64 center][subspace_dim*original_dim f64 axes]
//! [subspace_dim f64 criterion]`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::dense::DenseMatrix;
use crate::error::{Result, SubspaceError};
use crate::sample::GrayImage;
use crate::utils::{
    checked_len, descending_order, read_f64_vec, read_i64, read_len, write_f64_iter, write_i64,
    write_len,
};

mod generator;
mod projector;

pub use generator::{
    LdaSubspaceGenerator, LdaSubspaceGeneratorBuilder, PcaSubspaceGenerator,
    PcaSubspaceGeneratorBuilder, SubspaceGenerator,
};
pub use projector::SubspaceProjector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubspaceKind {
    Pca,
    Lda,
}

impl SubspaceKind {
    pub fn code(self) -> i64 {
        match self {
            SubspaceKind::Pca => 0,
            SubspaceKind::Lda => 1,
        }
    }

    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(SubspaceKind::Pca),
            1 => Ok(SubspaceKind::Lda),
            other => Err(SubspaceError::Format(format!(
                "unknown subspace type {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subspace {
    kind: SubspaceKind,
    center: Array1<f64>,
    axes: Array2<f64>,
    criterion: Array1<f64>,
}

impl Subspace {
    /// `axes` is `subspace_dim × original_dim`, one axis per row.
    pub fn new(
        kind: SubspaceKind,
        center: Array1<f64>,
        axes: Array2<f64>,
        criterion: Array1<f64>,
    ) -> Result<Self> {
        let (subspace_dim, original_dim) = axes.dim();
        if center.len() != original_dim {
            return Err(SubspaceError::ShapeMismatch {
                op: "Subspace center",
                left: (subspace_dim, original_dim),
                right: (center.len(), 1),
            });
        }
        if criterion.len() != subspace_dim {
            return Err(SubspaceError::ShapeMismatch {
                op: "Subspace criterion",
                left: (subspace_dim, original_dim),
                right: (criterion.len(), 1),
            });
        }
        Ok(Subspace {
            kind,
            center,
            axes: axes.as_standard_layout().into_owned(),
            criterion,
        })
    }

    pub fn kind(&self) -> SubspaceKind {
        self.kind
    }

    pub fn subspace_dim(&self) -> usize {
        self.axes.nrows()
    }

    pub fn original_dim(&self) -> usize {
        self.axes.ncols()
    }

    pub fn center(&self) -> ArrayView1<'_, f64> {
        self.center.view()
    }

    pub fn axes(&self) -> ArrayView2<'_, f64> {
        self.axes.view()
    }

    pub fn axis(&self, i: usize) -> ArrayView1<'_, f64> {
        self.axes.row(i)
    }

    pub fn criterion(&self) -> ArrayView1<'_, f64> {
        self.criterion.view()
    }

    /// Scales every axis to unit length. All-zero axes are left untouched.
    pub fn normalize(&mut self) {
        for mut axis in self.axes.rows_mut() {
            let norm = axis.dot(&axis).sqrt();
            if norm == 0.0 {
                continue;
            }
            axis /= norm;
        }
    }

    /// Orders axes by falling criterion value.
    pub fn reorder_descending(&mut self) {
        let order = descending_order(&self.criterion.to_vec(), |v| v);
        self.permute(&order);
    }

    /// Orders axes by falling absolute criterion value. Ties keep their
    /// current relative order.
    pub fn reorder_abs_descending(&mut self) {
        let order = descending_order(&self.criterion.to_vec(), f64::abs);
        self.permute(&order);
    }

    fn permute(&mut self, order: &[usize]) {
        self.axes = self.axes.select(Axis(0), order);
        self.criterion = self.criterion.select(Axis(0), order);
    }

    /// Copy of the axes, one per row.
    pub fn to_matrix(&self) -> DenseMatrix {
        DenseMatrix::from_array(self.axes.clone())
    }

    /// Renders axis `i` as an 8-bit image spanning the axis' value range,
    /// e.g. to look at eigenfaces.
    ///
    /// A zero `width` or `height` assumes a square image of side
    /// `sqrt(original_dim)`.
    pub fn axis_image(&self, i: usize, width: usize, height: usize) -> Result<GrayImage> {
        if i >= self.subspace_dim() {
            return Err(SubspaceError::InvalidArgument(format!(
                "axis {} requested from a {}-dimensional subspace",
                i,
                self.subspace_dim()
            )));
        }
        let (width, height) = if width == 0 || height == 0 {
            let side = (self.original_dim() as f64).sqrt() as usize;
            (side, self.original_dim() / side.max(1))
        } else {
            (width, height)
        };
        if width * height > self.original_dim() {
            return Err(SubspaceError::ShapeMismatch {
                op: "Axis image",
                left: (width, height),
                right: (self.original_dim(), 1),
            });
        }

        let axis = self.axes.row(i);
        let min = axis.iter().copied().fold(f64::INFINITY, f64::min);
        let max = axis.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = if max > min { max - min } else { 1.0 };
        let pixels = axis
            .iter()
            .take(width * height)
            .map(|&v| ((v - min) / range * 256.0).clamp(0.0, 255.0) as u8)
            .collect();

        Ok(GrayImage {
            width,
            height,
            pixels,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_i64(writer, self.kind.code())?;
        write_len(writer, self.subspace_dim())?;
        write_len(writer, self.original_dim())?;
        write_f64_iter(writer, self.center.iter())?;
        write_f64_iter(writer, self.axes.iter())?;
        write_f64_iter(writer, self.criterion.iter())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Subspace> {
        let kind = SubspaceKind::from_code(read_i64(reader)?)?;
        let subspace_dim = read_len(reader, "subspace dimension")?;
        let original_dim = read_len(reader, "original dimension")?;
        let center = read_f64_vec(reader, original_dim)?;
        let axes = read_f64_vec(reader, checked_len(subspace_dim, original_dim, "axis data")?)?;
        let criterion = read_f64_vec(reader, subspace_dim)?;

        let axes = Array2::from_shape_vec((subspace_dim, original_dim), axes)
            .map_err(|e| SubspaceError::Format(e.to_string()))?;
        Subspace::new(kind, Array1::from(center), axes, Array1::from(criterion))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| SubspaceError::file(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Subspace> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SubspaceError::file(path, e))?;
        Subspace::read_from(&mut BufReader::new(file))
    }
}
