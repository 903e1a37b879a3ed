//! Text and JSON rendering of views

use serde_json::{Value, json};
use vimview_invoke::WireValue;
use vimview_inventory::ManagedObject;

/// One-line text form of a wire value
pub fn describe(value: &WireValue) -> String {
    match value {
        WireValue::Null => "-".to_string(),
        WireValue::Bool(b) => b.to_string(),
        WireValue::Int(n) => n.to_string(),
        WireValue::Float(x) => x.to_string(),
        WireValue::Text(s) => s.clone(),
        WireValue::Reference(id) => id.to_string(),
        WireValue::Data(data) => format!("{} {{{} fields}}", data.type_name, data.fields.len()),
        WireValue::Collection(items) => {
            let items: Vec<String> = items.iter().map(describe).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

/// Identity and name, tab separated
pub fn summary_line(object: &ManagedObject) -> String {
    format!("{}\t{}", object.identity(), object.name().unwrap_or("-"))
}

/// Identity followed by every populated attribute
pub fn detail_text(object: &ManagedObject) -> String {
    let mut out = summary_line(object);
    for (name, value) in object.attributes().populated() {
        out.push_str(&format!("\n  {name} = {}", describe(value)));
    }
    out
}

pub fn object_json(object: &ManagedObject) -> Value {
    let attributes: serde_json::Map<String, Value> = object
        .attributes()
        .populated()
        .map(|(name, value)| (name.to_string(), serde_json::to_value(value).unwrap_or(Value::Null)))
        .collect();
    json!({
        "identity": object.identity().to_string(),
        "type": object.entity_type().type_name(),
        "attributes": attributes,
    })
}
