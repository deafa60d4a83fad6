//! Cell display: value formatting, display modes and data links

use chrono::{DateTime, SecondsFormat};

use super::frame::{Field, FieldType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Formatted form of a raw value
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayValue {
    pub text: String,
    /// NaN when the value has no numeric interpretation
    pub numeric: f64,
    pub color: Option<Rgb>,
}

/// A color step: values at or above `value` take `color`
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub value: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Justify {
    #[default]
    Auto,
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMode {
    Basic,
    Gradient,
    Lcd,
}

/// How a column's cells are drawn
#[derive(Debug, Clone, PartialEq)]
pub enum CellDisplayMode {
    Auto,
    ColorText,
    ColorBackground { gradient: bool },
    Gauge { mode: GaugeMode, min: Option<f64>, max: Option<f64> },
    Image,
    Json,
    Custom { component: String },
}

/// Resolves the display form of a raw cell; supplied by the host
pub trait DisplayProcessor {
    fn display(&self, field: &Field, value: &Value) -> DisplayValue;
}

/// Formatter used when the host does not bring its own
#[derive(Debug, Clone, Default)]
pub struct DefaultDisplay {
    /// Decimals for fields that do not configure their own
    pub decimals: Option<usize>,
}

impl DefaultDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn format_number(&self, n: f64, decimals: Option<usize>) -> String {
        if n.is_nan() {
            return "NaN".to_string();
        }
        if n.is_infinite() {
            return if n > 0.0 { "Inf".to_string() } else { "-Inf".to_string() };
        }
        match decimals.or(self.decimals) {
            Some(d) => format!("{:.*}", d, n),
            None if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
            None => {
                let s = format!("{:.3}", n);
                s.trim_end_matches('0').trim_end_matches('.').to_string()
            }
        }
    }

    fn format_time(millis: i64) -> String {
        DateTime::from_timestamp_millis(millis)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| millis.to_string())
    }
}

impl DisplayProcessor for DefaultDisplay {
    fn display(&self, field: &Field, value: &Value) -> DisplayValue {
        let numeric = value.as_f64().unwrap_or(f64::NAN);
        let text = match value {
            Value::Null => String::new(),
            Value::Number(n) => {
                let mut s = self.format_number(*n, field.config.decimals);
                if let Some(unit) = &field.config.unit {
                    if !n.is_nan() {
                        if unit != "%" {
                            s.push(' ');
                        }
                        s.push_str(unit);
                    }
                }
                s
            }
            Value::Time(t) => Self::format_time(*t),
            other => other.to_string(),
        };
        let color = if field.field_type == FieldType::Number || matches!(value, Value::Number(_)) {
            threshold_color(&field.config.thresholds, numeric)
        } else {
            None
        };
        DisplayValue { text, numeric, color }
    }
}

/// Color of the highest threshold at or below `value`
pub fn threshold_color(thresholds: &[Threshold], value: f64) -> Option<Rgb> {
    if value.is_nan() {
        return None;
    }
    thresholds.iter()
        .filter(|t| value >= t.value)
        .max_by(|a, b| a.value.total_cmp(&b.value))
        .map(|t| t.color)
}

/// Render-ready cell, one variant per display mode
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Text { text: String, color: Option<Rgb> },
    Background { text: String, color: Option<Rgb>, gradient: bool },
    Gauge { text: String, fraction: f64, color: Option<Rgb>, mode: GaugeMode },
    Image { url: String },
    Json { text: String },
    Custom { component: String, text: String },
    RowNumber(usize),
    Expander { expanded: bool, available: bool },
}

impl CellContent {
    /// Plain text used for measurement and fallbacks
    pub fn text(&self) -> String {
        match self {
            CellContent::Text { text, .. }
            | CellContent::Background { text, .. }
            | CellContent::Gauge { text, .. }
            | CellContent::Json { text }
            | CellContent::Custom { text, .. } => text.clone(),
            CellContent::Image { url } => url.clone(),
            CellContent::RowNumber(n) => n.to_string(),
            CellContent::Expander { .. } => String::new(),
        }
    }
}

/// Build the cell content for a field's display mode
pub fn cell_content(field: &Field, value: &Value, display: DisplayValue) -> CellContent {
    match &field.config.display_mode {
        CellDisplayMode::Auto => CellContent::Text { text: display.text, color: None },
        CellDisplayMode::ColorText => CellContent::Text { text: display.text, color: display.color },
        CellDisplayMode::ColorBackground { gradient } => CellContent::Background {
            text: display.text,
            color: display.color,
            gradient: *gradient,
        },
        CellDisplayMode::Gauge { mode, min, max } => {
            let range = field.numeric_range();
            let lo = min.or(range.map(|r| r.0)).unwrap_or(0.0);
            let hi = max.or(range.map(|r| r.1)).unwrap_or(lo);
            let fraction = if hi > lo && !display.numeric.is_nan() {
                ((display.numeric - lo) / (hi - lo)).clamp(0.0, 1.0)
            } else {
                0.0
            };
            CellContent::Gauge { text: display.text, fraction, color: display.color, mode: *mode }
        }
        CellDisplayMode::Image => CellContent::Image { url: value.to_string() },
        CellDisplayMode::Json => CellContent::Json { text: display.text },
        CellDisplayMode::Custom { component } => CellContent::Custom {
            component: component.clone(),
            text: display.text,
        },
    }
}

/// Interpolates template variables in link targets; supplied by the host
pub trait VariableResolver {
    fn replace(&self, template: &str) -> String;
}

/// Resolver that leaves templates untouched
pub struct NoVariables;

impl VariableResolver for NoVariables {
    fn replace(&self, template: &str) -> String {
        template.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLink {
    pub title: String,
    pub href: String,
}

/// Expand a field's links for one cell. `${__value.raw}` and `${__value.text}`
/// are filled from the cell, everything else goes to the resolver.
pub fn resolve_links(
    field: &Field,
    value: &Value,
    display: &DisplayValue,
    resolver: &dyn VariableResolver,
) -> Vec<ResolvedLink> {
    field.config.links.iter()
        .map(|link| {
            let href = link.url
                .replace("${__value.raw}", &value.to_string())
                .replace("${__value.text}", &display.text);
            ResolvedLink {
                title: resolver.replace(&link.title),
                href: resolver.replace(&href),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::frame::FieldConfig;

    #[test]
    fn test_default_number_format() {
        let display = DefaultDisplay::new();
        let field = Field::numbers("n", &[]);
        assert_eq!(display.display(&field, &Value::Number(3.0)).text, "3");
        assert_eq!(display.display(&field, &Value::Number(2.5)).text, "2.5");
        assert_eq!(display.display(&field, &Value::Number(1.0 / 3.0)).text, "0.333");
        assert_eq!(display.display(&field, &Value::Null).text, "");
    }

    #[test]
    fn test_unit_and_decimals() {
        let display = DefaultDisplay::new();
        let field = Field::numbers("n", &[]).with_config(FieldConfig {
            decimals: Some(1),
            unit: Some("%".to_string()),
            ..FieldConfig::default()
        });
        assert_eq!(display.display(&field, &Value::Number(12.34)).text, "12.3%");
    }

    #[test]
    fn test_time_format() {
        let display = DefaultDisplay::new();
        let field = Field::times("t", &[]);
        assert_eq!(display.display(&field, &Value::Time(0)).text, "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_threshold_color() {
        let red = Rgb(255, 0, 0);
        let green = Rgb(0, 255, 0);
        let thresholds = vec![
            Threshold { value: f64::NEG_INFINITY, color: green },
            Threshold { value: 80.0, color: red },
        ];
        assert_eq!(threshold_color(&thresholds, 10.0), Some(green));
        assert_eq!(threshold_color(&thresholds, 80.0), Some(red));
        assert_eq!(threshold_color(&thresholds, f64::NAN), None);
    }

    #[test]
    fn test_gauge_fraction_uses_field_range() {
        let field = Field::numbers("n", &[0.0, 50.0, 100.0]).with_config(FieldConfig {
            display_mode: CellDisplayMode::Gauge { mode: GaugeMode::Basic, min: None, max: None },
            ..FieldConfig::default()
        });
        let value = Value::Number(50.0);
        let content = cell_content(&field, &value, DefaultDisplay::new().display(&field, &value));
        match content {
            CellContent::Gauge { fraction, .. } => assert!((fraction - 0.5).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resolve_links() {
        struct Vars;
        impl VariableResolver for Vars {
            fn replace(&self, template: &str) -> String {
                template.replace("$host", "example.org")
            }
        }
        let field = Field::strings("s", &["a"]).with_config(FieldConfig {
            links: vec![DataLink { title: "open".to_string(), url: "https://$host/?q=${__value.raw}".to_string() }],
            ..FieldConfig::default()
        });
        let value = Value::from("abc");
        let display = DefaultDisplay::new().display(&field, &value);
        let links = resolve_links(&field, &value, &display, &Vars);
        assert_eq!(links[0].href, "https://example.org/?q=abc");
    }
}
