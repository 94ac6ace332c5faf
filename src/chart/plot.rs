//! `plotters` line chart of a region's monthly punctuality

use plotters::prelude::*;
use std::path::Path;
use std::sync::Arc;

use super::series::{date_span, month_label, plot_points};
use super::{ChartError, ChartRenderer, RenderSummary};
use crate::config::ChartConfig;
use crate::logger;
use crate::store::RegionStore;

const LINE_COLOR: RGBColor = RGBColor(0, 0, 255);
const GRID_COLOR: RGBColor = RGBColor(0x88, 0x88, 0x88);

pub struct PlottersRenderer {
    store: Arc<dyn RegionStore>,
    width: u32,
    height: u32,
    y_range: std::ops::Range<f64>,
}

impl PlottersRenderer {
    pub fn new(store: Arc<dyn RegionStore>, config: &ChartConfig) -> Self {
        Self {
            store,
            width: config.width,
            height: config.height,
            y_range: config.y_min..config.y_max,
        }
    }
}

impl ChartRenderer for PlottersRenderer {
    fn render(&self, region: &str, output: &Path) -> Result<RenderSummary, ChartError> {
        let records = self.store.list_punctuality(region)?;
        let points = plot_points(&records);
        let Some((start, end)) = date_span(&points) else {
            return Err(ChartError::NoData(region.to_string()));
        };

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        logger::log_chart_render(region, points.len(), output);

        // root and chart are dropped on return, which releases the bitmap
        let root = BitMapBackend::new(output, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(drawing_error)?;

        let title = format!("Régularité des TER (en %) pour la Région {region}");
        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 28))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d((start..end).yearly(), self.y_range.clone())
            .map_err(drawing_error)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("% de régularité")
            .x_label_formatter(&month_label)
            .x_max_light_lines(12)
            .bold_line_style(ShapeStyle::from(&GRID_COLOR).stroke_width(1))
            .light_line_style(ShapeStyle::from(&GRID_COLOR.mix(0.3)).stroke_width(1))
            .label_style(("sans-serif", 14))
            .draw()
            .map_err(drawing_error)?;

        chart
            .draw_series(LineSeries::new(
                points.iter().copied(),
                ShapeStyle::from(&LINE_COLOR).stroke_width(1),
            ))
            .map_err(drawing_error)?
            .label(region)
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &LINE_COLOR));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(drawing_error)?;

        root.present().map_err(drawing_error)?;

        Ok(RenderSummary {
            points: points.len(),
        })
    }
}

fn drawing_error(e: impl std::fmt::Display) -> ChartError {
    ChartError::Drawing(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixture_store;

    fn test_config() -> ChartConfig {
        ChartConfig {
            dir: "courbes".to_string(),
            url_prefix: "/courbes".to_string(),
            width: 600,
            height: 200,
            y_min: 75.0,
            y_max: 100.0,
        }
    }

    #[test]
    fn test_region_without_measurement_writes_nothing() {
        let renderer = PlottersRenderer::new(Arc::new(fixture_store()), &test_config());
        let dir = std::env::temp_dir().join(format!("charts-{}", uuid::Uuid::new_v4()));
        let output = dir.join("ponctualite_Corse.png");

        let err = renderer.render("Corse", &output).unwrap_err();
        assert!(matches!(err, ChartError::NoData(ref r) if r == "Corse"));
        assert!(!output.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_unknown_region_has_no_data() {
        let renderer = PlottersRenderer::new(Arc::new(fixture_store()), &test_config());
        let output = std::env::temp_dir().join("ponctualite_Nowhere.png");
        assert!(matches!(
            renderer.render("Nowhere", &output),
            Err(ChartError::NoData(_))
        ));
    }

    #[test]
    fn test_renders_measured_months_to_png() {
        let renderer = PlottersRenderer::new(Arc::new(fixture_store()), &test_config());
        let dir = std::env::temp_dir().join(format!("charts-{}", uuid::Uuid::new_v4()));
        let output = dir.join("ponctualite_Bretagne.png");

        let summary = renderer.render("Bretagne", &output).unwrap();
        // 2021-01 and 2021-03; blank, NULL and unparseable rows are skipped
        assert_eq!(summary.points, 2);

        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    }
}
