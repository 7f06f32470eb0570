//! Curve plots
//!
//! Figures are rendered with `plotters`, as SVG if the output file name ends
//! with `.svg` and as a bitmap otherwise.

use std::{ops::Range, path::Path};

use itertools::{Itertools, MinMaxResult};
use plotters::{coord::Shift, prelude::*};

use crate::{
    curve::Curve,
    mtf::{self, MtfMeasurement},
    nps::NpsMeasurement,
};

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("failed to draw {0}")]
    Drawing(String),
    #[error("nothing to plot")]
    Empty,
}
type Result<T> = std::result::Result<T, PlotError>;

fn drawing<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::Drawing(e.to_string())
}

/// Line style of a plotted curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineKind {
    /// Solid line, colored from the Tableau 10 palette
    #[default]
    Measured,
    /// Dashed line, colored from the Tableau 10 palette
    Published,
    /// Dashed black line
    Theoretical,
    /// Scattered dots, colored from the Tableau 10 palette
    Points,
}

#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub kind: LineKind,
}
impl Series {
    pub fn new<S: Into<String>>(label: S, points: Vec<(f64, f64)>, kind: LineKind) -> Self {
        Self {
            label: label.into(),
            points,
            kind,
        }
    }
    /// Series of a curve with the given label
    pub fn from_curve<S: Into<String>>(curve: &Curve, label: S, kind: LineKind) -> Self {
        Self::new(label, curve.points().collect(), kind)
    }
    /// Samples `f` over `range`
    pub fn from_fn<S, F>(label: S, range: Range<f64>, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(f64) -> f64,
    {
        let n = 200;
        let step = (range.end - range.start) / n as f64;
        let points = (0..=n)
            .map(|i| range.start + i as f64 * step)
            .map(|w| (w, f(w)))
            .collect();
        Self::new(label, points, LineKind::Theoretical)
    }
}

/// A 2D line plot, the x axis defaults to the spatial frequency in fraction of Nyquist
#[derive(Debug, Clone)]
pub struct Figure {
    title: String,
    x_desc: String,
    y_desc: String,
    x_range: Option<Range<f64>>,
    y_range: Option<Range<f64>>,
    series: Vec<Series>,
}
impl Figure {
    pub fn new<S: Into<String>>(title: S) -> Self {
        let title = title.into();
        Self {
            x_desc: "Spatial frequency (fraction of Nyquist)".to_string(),
            y_desc: title.clone(),
            title,
            x_range: None,
            y_range: None,
            series: vec![],
        }
    }
    pub fn x_desc<S: Into<String>>(self, x_desc: S) -> Self {
        Self {
            x_desc: x_desc.into(),
            ..self
        }
    }
    pub fn y_desc<S: Into<String>>(self, y_desc: S) -> Self {
        Self {
            y_desc: y_desc.into(),
            ..self
        }
    }
    pub fn x_range(self, x_range: Range<f64>) -> Self {
        Self {
            x_range: Some(x_range),
            ..self
        }
    }
    pub fn y_range(self, y_range: Range<f64>) -> Self {
        Self {
            y_range: Some(y_range),
            ..self
        }
    }
    pub fn series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }

    fn data_range(&self, coordinate: fn(&(f64, f64)) -> f64) -> Option<Range<f64>> {
        let (min, max) = match self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(coordinate))
            .filter(|v| v.is_finite())
            .minmax_by(|a, b| a.total_cmp(b))
        {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        let pad = if max > min { (max - min) * 0.05 } else { 0.5 };
        Some(min - pad..max + pad)
    }

    /// Draws the figure into `path`
    pub fn draw<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if self.is_empty() {
            return Err(PlotError::Empty);
        }
        let path = path.as_ref();
        let size = (768, 512);
        let is_svg = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("svg"));
        if is_svg {
            self.render(SVGBackend::new(path, size).into_drawing_area())?;
        } else {
            self.render(BitMapBackend::new(path, size).into_drawing_area())?;
        }
        log::info!("{} plot written to {:?}", self.title, path);
        Ok(())
    }

    fn render<DB: DrawingBackend>(&self, plot: DrawingArea<DB, Shift>) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        plot.fill(&WHITE).map_err(drawing)?;
        let x_range = self
            .x_range
            .clone()
            .or_else(|| self.data_range(|p| p.0))
            .ok_or(PlotError::Empty)?;
        let y_range = self
            .y_range
            .clone()
            .or_else(|| self.data_range(|p| p.1))
            .ok_or(PlotError::Empty)?;

        let mut chart = ChartBuilder::on(&plot)
            .caption(&self.title, ("sans-serif", 24))
            .set_label_area_size(LabelAreaPosition::Left, 50)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .margin(10)
            .build_cartesian_2d(x_range, y_range)
            .map_err(drawing)?;
        chart
            .configure_mesh()
            .x_desc(&self.x_desc)
            .y_desc(&self.y_desc)
            .draw()
            .map_err(drawing)?;

        let mut colors = colorous::TABLEAU10.iter().cycle();
        for series in &self.series {
            let rgb = match series.kind {
                LineKind::Theoretical => BLACK,
                _ => colors
                    .next()
                    .map(|color| RGBColor(color.r, color.g, color.b))
                    .unwrap_or(BLACK),
            };
            let points = series.points.iter().cloned();
            match series.kind {
                LineKind::Measured => chart
                    .draw_series(LineSeries::new(points, rgb.stroke_width(2)))
                    .map_err(drawing)?
                    .label(&series.label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], rgb)),
                LineKind::Points => chart
                    .draw_series(points.map(|p| Circle::new(p, 2, rgb.filled())))
                    .map_err(drawing)?
                    .label(&series.label)
                    .legend(move |(x, y)| Circle::new((x + 10, y), 3, rgb.filled())),
                _ => chart
                    .draw_series(DashedLineSeries::new(points, 6, 4, rgb.stroke_width(2)))
                    .map_err(drawing)?
                    .label(&series.label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], rgb)),
            };
        }
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .position(SeriesLabelPosition::UpperRight)
            .draw()
            .map_err(drawing)?;
        plot.present().map_err(drawing)?;
        Ok(())
    }
}

/// Edge spread function of an edge measurement with its fitted model
///
/// At most 2000 evenly spaced samples of the profile are drawn.
pub fn esf_fit(measurement: &MtfMeasurement) -> Figure {
    let profile = &measurement.profile;
    let n = profile.distances.len();
    let stride = (n / 2000).max(1);
    let samples = profile
        .distances
        .iter()
        .zip(&profile.esf)
        .step_by(stride)
        .map(|(&d, &v)| (d, v))
        .collect();
    let (lambda, x0) = (measurement.lambda, measurement.x0);
    let fitted = match (profile.distances.first(), profile.distances.last()) {
        (Some(&first), Some(&last)) => Series::from_fn(
            format!("ESF fit (λ={:.3}, x0={:.3})", lambda, x0),
            first..last,
            |d| mtf::esf(d, lambda, x0),
        ),
        _ => Series::new("ESF fit", vec![], LineKind::Theoretical),
    };
    Figure::new("Edge spread function")
        .x_desc("Distance to the edge (pixels)")
        .y_desc("Normalized counts")
        .series(Series::new(
            format!("ESF (R²={:.4})", profile.r_squared),
            samples,
            LineKind::Points,
        ))
        .series(Series {
            kind: LineKind::Measured,
            ..fitted
        })
}

/// NPS(0) estimates against the binning factor with the guessed and fitted NPS(0)
pub fn nps0_fit(measurement: &NpsMeasurement) -> Figure {
    let estimates: Vec<(f64, f64)> = measurement
        .nps0_estimates
        .iter()
        .map(|&(factor, nps0)| (factor as f64, nps0))
        .collect();
    let max_factor = estimates.iter().map(|p| p.0).fold(1f64, f64::max);
    let [a, b] = measurement.nps0_fit;
    Figure::new("NPS(0)")
        .x_desc("Binning factor")
        .y_desc("NPS(0)")
        .series(Series::new("estimates", estimates, LineKind::Points))
        .series(Series::from_fn(
            format!("a·x/(x+b) (a={:.2}, b={:.3})", a, b),
            1f64..max_factor,
            |x| a * x / (x + b),
        ))
        .series(Series::new(
            format!("fitted NPS(0) = {:.2}", a),
            vec![(1f64, a), (max_factor, a)],
            LineKind::Measured,
        ))
        .series(Series::new(
            format!("guessed NPS(0) = {:.2}", measurement.nps0_guess),
            vec![(1f64, measurement.nps0_guess), (max_factor, measurement.nps0_guess)],
            LineKind::Published,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Metric;

    #[test]
    fn svg_figure() {
        let dir = tempfile::tempdir().unwrap();
        let curve = Curve::new(Metric::Mtf, vec![0., 0.5, 1.], vec![1., 0.7, 0.4]).unwrap();
        let path = dir.path().join("mtf.svg");
        Figure::new("MTF")
            .x_range(0f64..1f64)
            .y_range(0f64..1.1f64)
            .series(Series::from_curve(&curve, "measured", LineKind::Measured))
            .series(Series::from_fn("theoretical", 0f64..1f64, crate::mtf::theoretical_mtf))
            .draw(&path)
            .unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn diagnostic_figures() {
        let dir = tempfile::tempdir().unwrap();
        let tan = 5f64.to_radians().tan();
        let image = ndarray::Array2::from_shape_fn((128, 128), |(row, col)| {
            let d = col as f64 + 0.5 - 64. - (row as f64 + 0.5 - 64.) * tan;
            10. + 50. * mtf::esf(d, 1.2, 0.)
        });
        let edge = mtf::measure(image.view(), mtf::CropRegion::centred((128, 128)), 1).unwrap();
        let figure = esf_fit(&edge);
        assert_eq!(figure.series.len(), 2);
        assert!(figure.series[0].points.len() <= 2 * 2000);
        assert_eq!(figure.series[0].kind, LineKind::Points);
        let path = dir.path().join("esf.svg");
        figure.draw(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<circle"));

        let frames = ndarray::Array3::from_shape_fn((4, 32, 32), |(k, row, col)| {
            100. + ((k * 7919 + row * 131 + col * 17) % 23) as f64
        });
        let flat = crate::nps::measure(frames.view(), &Default::default()).unwrap();
        let figure = nps0_fit(&flat);
        assert_eq!(figure.series[0].points.len(), flat.nps0_estimates.len());
        figure.draw(dir.path().join("nps0.png")).unwrap();
    }

    #[test]
    fn empty_figure() {
        assert!(matches!(
            Figure::new("NPS").draw("nps.svg"),
            Err(PlotError::Empty)
        ));
    }
}
