//! Input schemas of the ledger tools, as handed to the language model.

use serde_json::{Value, json};

pub const FIND_ITEMS: &str = "find_items";
pub const SUMMARIZE_LEDGER: &str = "summarize_ledger";
pub const LOOKUP_ROW: &str = "lookup_row";
pub const TOP_ITEMS: &str = "top_items";
pub const LIST_FAILED_DOCUMENTS: &str = "list_failed_documents";
pub const APPLY_CORRECTION: &str = "apply_correction";

/// Every tool name, in the order the definitions are listed.
pub const TOOL_NAMES: [&str; 6] = [
    FIND_ITEMS,
    SUMMARIZE_LEDGER,
    LOOKUP_ROW,
    TOP_ITEMS,
    LIST_FAILED_DOCUMENTS,
    APPLY_CORRECTION,
];

pub const FIND_ITEMS_MAX_LIMIT: usize = 500;
pub const FIND_ITEMS_DEFAULT_LIMIT: usize = 50;
pub const TOP_ITEMS_MAX_LIMIT: usize = 50;
pub const TOP_ITEMS_DEFAULT_LIMIT: usize = 3;

/// Tool definitions for the ledger query layer.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": FIND_ITEMS,
            "description": "Find audited line items matching all given filters. Use for questions like 'which rows have errors' or 'what did we buy from Acme'.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "severity": {
                        "type": "string",
                        "enum": ["OK", "WARN", "ERROR"],
                        "description": "Only items with this audit severity"
                    },
                    "supplier": {
                        "type": "string",
                        "description": "Case-insensitive supplier name"
                    },
                    "document_id": {
                        "type": "string",
                        "description": "Only items from this source document"
                    },
                    "name_contains": {
                        "type": "string",
                        "description": "Case-insensitive substring of the item name"
                    },
                    "min_amount": {
                        "type": "number",
                        "description": "Minimum line amount (inclusive)"
                    },
                    "max_amount": {
                        "type": "number",
                        "description": "Maximum line amount (inclusive)"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": FIND_ITEMS_MAX_LIMIT,
                        "default": FIND_ITEMS_DEFAULT_LIMIT,
                        "description": "Maximum items to return"
                    }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": SUMMARIZE_LEDGER,
            "description": "Aggregate statistics: documents processed and failed, counts by severity, total amounts and per-supplier groups.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "group_by_supplier": {
                        "type": "boolean",
                        "default": true,
                        "description": "Include per-supplier groups"
                    }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": LOOKUP_ROW,
            "description": "Look up one line item by source document and row index.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "document_id": {
                        "type": "string",
                        "description": "Source document identifier"
                    },
                    "row_index": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Row position within the document"
                    }
                },
                "required": ["document_id", "row_index"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": TOP_ITEMS,
            "description": "List the line items with the highest unit price, amount or quantity.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "by": {
                        "type": "string",
                        "enum": ["unit_price", "amount", "quantity"],
                        "description": "Field to rank by"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": TOP_ITEMS_MAX_LIMIT,
                        "default": TOP_ITEMS_DEFAULT_LIMIT,
                        "description": "Number of items to return"
                    }
                },
                "required": ["by"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": LIST_FAILED_DOCUMENTS,
            "description": "List documents whose extraction failed, with the error classification.",
            "input_schema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": APPLY_CORRECTION,
            "description": "Correct fields of one line item. The item is re-audited and its new finding returned. Only use when the user asks for a correction.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "document_id": {
                        "type": "string",
                        "description": "Source document identifier"
                    },
                    "row_index": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Row position within the document"
                    },
                    "changes": {
                        "type": "object",
                        "properties": {
                            "item_name": { "type": "string" },
                            "spec": { "type": "string" },
                            "unit_price": { "type": "number" },
                            "quantity": { "type": "number" },
                            "amount": { "type": "number" },
                            "unit": { "type": "string" },
                            "supplier": { "type": "string" }
                        },
                        "additionalProperties": false,
                        "minProperties": 1,
                        "description": "Fields to overwrite"
                    }
                },
                "required": ["document_id", "row_index", "changes"],
                "additionalProperties": false
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_match_names() {
        let definitions = tool_definitions();
        let names: Vec<&str> = definitions
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, TOOL_NAMES);

        for definition in &definitions {
            assert_eq!(definition["input_schema"]["type"], "object");
            assert_eq!(definition["input_schema"]["additionalProperties"], false);
        }
    }
}
