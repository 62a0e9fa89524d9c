use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Heuristic: look for well-known result fields in order of priority,
/// then fall back to the first field in the result object.
pub fn print_minimal(value: &Value) {
    // Try to extract the "result" envelope
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Priority list of key output fields
    let priority_keys = [
        "irr",
        "monthly_payment",
        "irr_spread",
        "noi",
        "equity_multiple",
        "results",
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
        // Tagged IRR outcome: the rate, or why there is none
        Value::Object(map) if map.contains_key("status") => match map.get("rate") {
            Some(rate) => format_minimal(rate),
            None => map
                .get("reason")
                .map(|r| format!("n/a ({})", format_minimal(r)))
                .unwrap_or_else(|| "n/a".to_string()),
        },
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
