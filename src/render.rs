//! Server-side HTML for the dashboard page.
//!
//! The markup lives in `templates/dashboard.html`, embedded at compile time
//! and rendered with MiniJinja. The template name ends in `.html`, so every
//! value is HTML-escaped on output.

use minijinja::{Environment, Error};
use serde::Serialize;

use crate::{
    dashboard::{HistogramBin, PriceStats, SortOrder, ViewOptions},
    product::{format_brl, Condition, DisplayRecord},
    search::SearchOutcome,
};

const DASHBOARD_TEMPLATE: &str = "dashboard.html";
const DASHBOARD_SOURCE: &str = include_str!("../templates/dashboard.html");

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 300.0;
const CHART_MARGIN: f64 = 40.0;

/// The parsed page templates.
pub(crate) struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub(crate) fn new() -> Result<Self, Error> {
        let mut env = Environment::new();
        env.add_template(DASHBOARD_TEMPLATE, DASHBOARD_SOURCE)?;
        Ok(Self { env })
    }

    /// Renders the whole page: the search form, then the outcome when a
    /// search was made.
    pub(crate) fn dashboard(
        &self,
        query: &str,
        options: &ViewOptions,
        outcome: Option<&SearchOutcome>,
    ) -> Result<String, Error> {
        let view = PageView::new(query, options, outcome);
        self.env.get_template(DASHBOARD_TEMPLATE)?.render(view)
    }
}

#[derive(Serialize)]
struct PageView<'a> {
    query: &'a str,
    orders: Vec<OrderOption>,
    free_shipping_only: bool,
    conditions: Vec<ConditionBox>,
    results: Option<ResultsView<'a>>,
}

#[derive(Serialize)]
struct OrderOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Serialize)]
struct ConditionBox {
    name: &'static str,
    label: &'static str,
    checked: bool,
}

#[derive(Serialize)]
struct ResultsView<'a> {
    errors: &'a [String],
    found: Option<FoundView<'a>>,
}

/// Everything shown once at least one record survived the filters.
#[derive(Serialize)]
struct FoundView<'a> {
    count: usize,
    metrics: [Metric; 3],
    rows: Vec<Row<'a>>,
    chart: Chart,
}

#[derive(Serialize)]
struct Metric {
    label: &'static str,
    value: String,
}

#[derive(Serialize)]
struct Row<'a> {
    name: &'a str,
    price: &'a str,
    condition: &'static str,
    free_shipping: &'static str,
    sold_count: i64,
    link: &'a str,
}

/// SVG geometry, formatted ahead of time so the template only places it.
#[derive(Serialize)]
struct Chart {
    width: String,
    height: String,
    left: String,
    right: String,
    baseline: String,
    label_y: String,
    axis_y: String,
    center_x: String,
    center_y: String,
    first_label: Option<String>,
    last_label: Option<String>,
    bars: Vec<Bar>,
}

#[derive(Serialize)]
struct Bar {
    x: String,
    y: String,
    width: String,
    height: String,
    count: usize,
    range: String,
}

impl<'a> PageView<'a> {
    fn new(query: &'a str, options: &ViewOptions, outcome: Option<&'a SearchOutcome>) -> Self {
        let orders = [("asc", SortOrder::Ascending), ("desc", SortOrder::Descending)]
            .into_iter()
            .map(|(value, order)| OrderOption {
                value,
                label: order.label(),
                selected: options.order == order,
            })
            .collect();
        let conditions = [("novo", Condition::New), ("usado", Condition::Used)]
            .into_iter()
            .map(|(name, condition)| ConditionBox {
                name,
                label: condition.label(),
                checked: options.conditions.contains(&condition),
            })
            .collect();
        Self {
            query,
            orders,
            free_shipping_only: options.free_shipping_only,
            conditions,
            results: outcome.map(ResultsView::new),
        }
    }
}

impl<'a> ResultsView<'a> {
    fn new(outcome: &'a SearchOutcome) -> Self {
        let found = outcome.stats.as_ref().map(|stats| FoundView {
            count: outcome.records.len(),
            metrics: metrics(stats),
            rows: outcome.records.iter().map(Row::from).collect(),
            chart: Chart::new(&outcome.histogram),
        });
        Self {
            errors: &outcome.errors,
            found,
        }
    }
}

fn metrics(stats: &PriceStats) -> [Metric; 3] {
    [
        Metric {
            label: "Preço Médio",
            value: stats.formatted_mean(),
        },
        Metric {
            label: "Preço Mínimo",
            value: stats.formatted_min(),
        },
        Metric {
            label: "Preço Máximo",
            value: stats.formatted_max(),
        },
    ]
}

impl<'a> From<&'a DisplayRecord> for Row<'a> {
    fn from(record: &'a DisplayRecord) -> Self {
        Self {
            name: &record.name,
            price: &record.formatted_price,
            condition: record.condition.label(),
            free_shipping: record.free_shipping_label_str(),
            sold_count: record.sold_count,
            link: &record.link,
        }
    }
}

impl Chart {
    /// Lays the histogram out as bars of a fixed-height chart; the tallest
    /// bar fills the plot.
    #[allow(clippy::cast_precision_loss)]
    fn new(bins: &[HistogramBin]) -> Self {
        let tallest = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64;
        let plot_width = CHART_WIDTH - 2.0 * CHART_MARGIN;
        let plot_height = CHART_HEIGHT - 2.0 * CHART_MARGIN;
        let bar_width = plot_width / bins.len().max(1) as f64;
        let baseline = CHART_MARGIN + plot_height;

        let bars = bins
            .iter()
            .enumerate()
            .map(|(i, bin)| {
                let height = plot_height * bin.count as f64 / tallest;
                Bar {
                    x: format!("{:.1}", CHART_MARGIN + bar_width * i as f64),
                    y: format!("{:.1}", baseline - height),
                    width: format!("{:.1}", (bar_width - 1.0).max(1.0)),
                    height: format!("{height:.1}"),
                    count: bin.count,
                    range: bin.range_label(),
                }
            })
            .collect();

        Self {
            width: CHART_WIDTH.to_string(),
            height: CHART_HEIGHT.to_string(),
            left: CHART_MARGIN.to_string(),
            right: (CHART_MARGIN + plot_width).to_string(),
            baseline: baseline.to_string(),
            label_y: (baseline + 16.0).to_string(),
            axis_y: (CHART_HEIGHT - 4.0).to_string(),
            center_x: (CHART_WIDTH / 2.0).to_string(),
            center_y: (CHART_HEIGHT / 2.0).to_string(),
            first_label: bins.first().map(|b| format_brl(b.start)),
            last_label: bins.last().map(|b| format_brl(b.end)),
            bars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_RESULTS: &str = "Nenhum produto encontrado.";

    fn page(query: &str, options: &ViewOptions, outcome: Option<&SearchOutcome>) -> String {
        Pages::new()
            .unwrap()
            .dashboard(query, options, outcome)
            .unwrap()
    }

    fn record(name: &str, price: f64) -> DisplayRecord {
        DisplayRecord {
            name: name.to_string(),
            price,
            link: "https://produto.mercadolivre.com.br/MLB-1?a=1&b=2".to_string(),
            condition: Condition::New,
            free_shipping: true,
            sold_count: 4,
            formatted_price: format_brl(price),
        }
    }

    #[test]
    fn user_text_is_escaped() {
        let outcome = SearchOutcome {
            errors: vec!["<script>alert(1)</script>".to_string()],
            ..SearchOutcome::default()
        };
        let html = page(r#""><b>x</b>"#, &ViewOptions::default(), Some(&outcome));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>x</b>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("value=\"&quot;&gt;&lt;b&gt;x&lt;"));
    }

    #[test]
    fn form_only_without_search() {
        let html = page("", &ViewOptions::default(), None);
        assert!(html.contains("<form"));
        assert!(html.contains("name=\"novo\" checked"));
        assert!(html.contains("name=\"usado\" checked"));
        assert!(html.contains("<option value=\"asc\" selected>"));
        assert!(!html.contains("<table>"));
        assert!(!html.contains(NO_RESULTS));
    }

    #[test]
    fn form_keeps_user_input() {
        let options = ViewOptions {
            order: SortOrder::Descending,
            free_shipping_only: true,
            conditions: vec![Condition::Used],
        };
        let html = page(r#"tv "lg""#, &options, None);
        assert!(html.contains("value=\"tv &quot;lg&quot;\""));
        assert!(html.contains("<option value=\"desc\" selected>"));
        assert!(html.contains("<option value=\"asc\">"));
        assert!(html.contains("name=\"frete\" checked"));
        assert!(html.contains("name=\"novo\">"));
        assert!(html.contains("name=\"usado\" checked"));
    }

    #[test]
    fn no_results_notice() {
        let outcome = SearchOutcome {
            query: "xyz".to_string(),
            errors: vec!["Erro ao buscar produtos: unexpected status 503".to_string()],
            ..SearchOutcome::default()
        };
        let html = page("xyz", &ViewOptions::default(), Some(&outcome));
        assert!(html.contains(NO_RESULTS));
        assert!(html.contains(
            "<div class=\"error\">Erro ao buscar produtos: unexpected status 503</div>"
        ));
        assert!(!html.contains("<table>"));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn table_metrics_and_chart() {
        let records = vec![record("Fone <BT>", 50.0), record("Fone USB", 150.0)];
        let outcome = SearchOutcome {
            query: "fone".to_string(),
            fetched_count: 2,
            matched_count: 2,
            stats: PriceStats::compute(&records),
            histogram: crate::dashboard::histogram(&[50.0, 150.0], crate::dashboard::MAX_BINS),
            records,
            ..SearchOutcome::default()
        };
        let html = page("fone", &ViewOptions::default(), Some(&outcome));
        assert!(html.contains("Encontrados 2 produtos"));
        assert!(html.contains("<span>Preço Médio</span><strong>R$ 100,00</strong>"));
        assert!(html.contains("<strong>R$ 50,00</strong>"));
        assert!(html.contains("<strong>R$ 150,00</strong>"));
        assert!(html.contains("<td>Fone &lt;BT&gt;</td>"));
        assert!(html.contains("MLB-1?a=1&amp;b=2\" target=\"_blank\""));
        assert!(!html.contains("a=1&b=2"));
        assert!(html.contains("<td>Novo</td><td>Sim</td>"));
        assert_eq!(
            html.matches("<rect class=\"bar\"").count(),
            outcome.histogram.len()
        );
        assert!(html.contains("<title>1 produtos, R$ 50,00 a "));
        assert!(html.contains("Faixa de Preço (R$)"));
        assert!(!html.contains(NO_RESULTS));
    }
}
