use chrono::{DateTime, Utc};

use crate::summary::SummaryRow;

/// Fixed artifact header; column order is part of the contract.
pub const CSV_HEADER: &str = "product,revenue,profit,sold,returned";

/// Render summary rows as a CSV document, header first.
///
/// Quoting is minimal: a field is quoted only when it contains a comma,
/// a quote, or a line break, with embedded quotes doubled. Only product
/// names can need it; the numeric columns never do.
pub fn render_csv(rows: &[SummaryRow]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + rows.len() * 32);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&csv_field(&row.product));
        out.push(',');
        out.push_str(&row.revenue.to_string());
        out.push(',');
        out.push_str(&row.profit.to_string());
        out.push(',');
        out.push_str(&row.sold.to_string());
        out.push(',');
        out.push_str(&row.returned.to_string());
        out.push('\n');
    }
    out
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Name used when a report request does not carry one.
///
/// Timestamped to the microsecond so two anonymous requests in the same
/// second do not collide on the unique-name constraint.
pub fn default_report_name(now: DateTime<Utc>) -> String {
    format!(
        "summary_report_requested_{}",
        now.format("%Y-%m-%dT%H-%M-%S%.6f")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn row(product: &str, revenue: &str, profit: &str, sold: i64, returned: i64) -> SummaryRow {
        SummaryRow {
            product: product.to_string(),
            revenue: revenue.parse().unwrap(),
            profit: profit.parse().unwrap(),
            sold,
            returned,
        }
    }

    #[test]
    fn renders_header_and_rows_in_order() {
        let rows = vec![
            row("Widget", "30.00", "18.00", 3, 2),
            row("Gadget", "0", "0", 0, 0),
        ];
        assert_eq!(
            render_csv(&rows),
            "product,revenue,profit,sold,returned\nWidget,30.00,18.00,3,2\nGadget,0,0,0,0\n"
        );
    }

    #[test]
    fn renders_header_only_for_empty_catalog() {
        assert_eq!(render_csv(&[]), "product,revenue,profit,sold,returned\n");
    }

    #[test]
    fn quotes_fields_containing_delimiters() {
        let rows = vec![
            row("Bolt, M4", "1.00", "0.50", 1, 0),
            row("6\" Pipe", "2.00", "1.00", 2, 0),
            row("Two\nLines", "0", "0", 0, 0),
        ];
        let csv = render_csv(&rows);
        assert!(csv.contains("\"Bolt, M4\",1.00,0.50,1,0\n"));
        assert!(csv.contains("\"6\"\" Pipe\",2.00,1.00,2,0\n"));
        assert!(csv.contains("\"Two\nLines\",0,0,0,0\n"));
    }

    #[test]
    fn plain_names_stay_unquoted() {
        let csv = render_csv(&[row("Widget Deluxe", "5.00", "2.00", 1, 0)]);
        assert!(csv.contains("Widget Deluxe,5.00,2.00,1,0\n"));
    }

    #[test]
    fn decimal_scale_flows_through_unchanged() {
        let csv = render_csv(&[SummaryRow {
            product: "Widget".to_string(),
            revenue: dec!(12.5),
            profit: dec!(7.125),
            sold: 5,
            returned: 0,
        }]);
        assert!(csv.contains("Widget,12.5,7.125,5,0\n"));
    }

    #[test]
    fn default_name_is_prefixed_and_timestamped() {
        let at = Utc.with_ymd_and_hms(2026, 8, 25, 9, 30, 15).unwrap();
        assert_eq!(
            default_report_name(at),
            "summary_report_requested_2026-08-25T09-30-15.000000"
        );
    }
}
