// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Prometheus text exposition (format 0.0.4).

use std::fmt::Write;

use super::catalogue::MetricKind;
use super::registry::{MetricRegistry, SeriesValue};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

impl MetricRegistry {
    /// Render every non-empty family in catalogue order, series sorted by
    /// label values.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(4096);
        for family in self.families() {
            let mut series: Vec<(Vec<String>, SeriesValue)> = family
                .series
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect();
            if series.is_empty() {
                continue;
            }
            series.sort_by(|a, b| a.0.cmp(&b.0));

            let desc = &family.desc;
            let _ = writeln!(out, "# HELP {} {}", desc.name, escape_help(desc.help));
            let _ = writeln!(out, "# TYPE {} {}", desc.name, desc.kind.as_str());

            for (values, value) in &series {
                let labels = label_pairs(desc.label_names, values);
                match (desc.kind, value) {
                    (MetricKind::Histogram, SeriesValue::Histogram(h)) => {
                        let snap = h.snapshot();
                        for (bound, count) in &snap.buckets {
                            let _ = writeln!(
                                out,
                                "{}_bucket{} {}",
                                desc.name,
                                with_le(&labels, &format_value(*bound)),
                                count
                            );
                        }
                        let _ = writeln!(out, "{}_bucket{} {}", desc.name, with_le(&labels, "+Inf"), snap.count);
                        let _ = writeln!(out, "{}_sum{} {}", desc.name, braces(&labels), format_value(snap.sum));
                        let _ = writeln!(out, "{}_count{} {}", desc.name, braces(&labels), snap.count);
                    }
                    (_, SeriesValue::Scalar(v)) => {
                        let _ = writeln!(out, "{}{} {}", desc.name, braces(&labels), format_value(*v));
                    }
                    _ => {}
                }
            }
        }
        out
    }
}

fn label_pairs(names: &[&str], values: &[String]) -> String {
    names
        .iter()
        .zip(values)
        .map(|(n, v)| format!("{}=\"{}\"", n, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn braces(labels: &str) -> String {
    if labels.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", labels)
    }
}

fn with_le(labels: &str, le: &str) -> String {
    if labels.is_empty() {
        format!("{{le=\"{}\"}}", le)
    } else {
        format!("{{{},le=\"{}\"}}", labels, le)
    }
}

pub(crate) fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{}", v)
    }
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}
