//! Portable chart-spec builder.
//!
//! Emits a plotly-schema figure (traces + layout) as JSON. The disk artifact
//! is a self-contained HTML snapshot embedding the spec.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::constants::ChartType;
use crate::error::Result;

const CANVAS_HEIGHT: u32 = 600;
const CANVAS_WIDTH: u32 = 1100;

/// A renderable figure: plotly-schema traces plus a fixed-size layout.
#[derive(Debug, Clone)]
pub struct Figure {
    data: Vec<Value>,
    layout: Value,
}

impl Figure {
    pub fn to_json(&self) -> Result<String> {
        let spec = json!({"data": self.data, "layout": self.layout});
        Ok(serde_json::to_string(&spec)?)
    }

    /// Write a standalone HTML snapshot of the figure.
    pub fn write_html(&self, path: &Path) -> Result<()> {
        let spec = self.to_json()?;
        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n\
             <script src=\"https://cdn.plot.ly/plotly-2.32.0.min.js\"></script>\n\
             </head>\n<body>\n<div id=\"chart\"></div>\n<script>\n\
             var spec = {spec};\n\
             Plotly.newPlot(\"chart\", spec.data, spec.layout);\n\
             </script>\n</body>\n</html>\n"
        );
        std::fs::write(path, html)?;
        Ok(())
    }
}

/// Build a figure for the given chart type and result rows.
///
/// Rendering policy:
/// - line: first column on X, every remaining column (or the first again)
///   as a Y series with markers
/// - scatter: first two columns on X/Y, third column (if present) as a
///   category dimension; falls back to bar below two columns
/// - bar: first column on X, second (or first) on Y
pub fn build_figure(chart_type: ChartType, columns: &[String], rows: &[Map<String, Value>]) -> Figure {
    let data = match chart_type {
        ChartType::Line => line_traces(columns, rows),
        ChartType::Scatter if columns.len() >= 2 => scatter_traces(columns, rows),
        _ => bar_traces(columns, rows),
    };

    Figure {
        data,
        layout: json!({"height": CANVAS_HEIGHT, "width": CANVAS_WIDTH}),
    }
}

fn column_values(column: &str, rows: &[Map<String, Value>]) -> Vec<Value> {
    rows.iter()
        .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
        .collect()
}

fn line_traces(columns: &[String], rows: &[Map<String, Value>]) -> Vec<Value> {
    let x_col = &columns[0];
    let x = column_values(x_col, rows);

    let y_cols: Vec<&String> = if columns.len() > 1 {
        columns[1..].iter().collect()
    } else {
        vec![x_col]
    };

    y_cols
        .into_iter()
        .map(|col| {
            json!({
                "type": "scatter",
                "mode": "lines+markers",
                "name": col,
                "x": x,
                "y": column_values(col, rows),
            })
        })
        .collect()
}

fn scatter_traces(columns: &[String], rows: &[Map<String, Value>]) -> Vec<Value> {
    let x_col = &columns[0];
    let y_col = &columns[1];

    let Some(color_col) = columns.get(2) else {
        return vec![json!({
            "type": "scatter",
            "mode": "markers",
            "x": column_values(x_col, rows),
            "y": column_values(y_col, rows),
        })];
    };

    // One trace per category value of the color column.
    let mut groups: BTreeMap<String, Vec<&Map<String, Value>>> = BTreeMap::new();
    for row in rows {
        let key = match row.get(color_col) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::from("null"),
        };
        groups.entry(key).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(name, group)| {
            let x: Vec<Value> = group
                .iter()
                .map(|row| row.get(x_col.as_str()).cloned().unwrap_or(Value::Null))
                .collect();
            let y: Vec<Value> = group
                .iter()
                .map(|row| row.get(y_col.as_str()).cloned().unwrap_or(Value::Null))
                .collect();
            json!({
                "type": "scatter",
                "mode": "markers",
                "name": name,
                "x": x,
                "y": y,
            })
        })
        .collect()
}

fn bar_traces(columns: &[String], rows: &[Map<String, Value>]) -> Vec<Value> {
    let x_col = &columns[0];
    let y_col = columns.get(1).unwrap_or(x_col);

    vec![json!({
        "type": "bar",
        "name": y_col,
        "x": column_values(x_col, rows),
        "y": column_values(y_col, rows),
    })]
}
