/// Info-panel text for a cached value: `"RSI 53.2"`, or `"RSI -"` when there
/// is nothing displayable.
pub fn label_text(name: &str, value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{name} {v:.precision$}"),
        _ => format!("{name} -"),
    }
}
