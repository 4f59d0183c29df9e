use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Heuristic: look for well-known result fields in order of priority,
/// then fall back to the first field in the result object. Row tables
/// print the final row's headline figure.
pub fn print_minimal(value: &Value) {
    // Try to extract the "result" envelope
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Tables: report on the last row
    let result_obj = match result_obj {
        Value::Array(rows) => rows.last().unwrap_or(result_obj),
        _ => result_obj,
    };

    // Priority list of key output fields
    let priority_keys = [
        "final_cagr_pct",
        "cagr",
        "initial_monthly_payment",
        "total_monthly_payment",
        "monthly_payment",
        "total_paid",
        "balance",
        "annual_tax",
        "monthly_tax",
        "succeeded",
    ];

    if let Value::Object(map) = result_obj {
        // Try priority keys first (skip null values)
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        // Fall back to first field
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    // Not an object, just print directly
    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
