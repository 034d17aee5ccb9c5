//! The static tool catalog.
//!
//! One descriptor per callable operation, built once and enumerated in full
//! on every `tools/list` request.

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static CATALOG: Lazy<Vec<ToolDescriptor>> = Lazy::new(|| {
    vec![
        ToolDescriptor {
            name: "firestore_add_document",
            description: "Add a document to a Firestore collection. The backend assigns the id.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection": {
                        "type": "string",
                        "description": "Collection name"
                    },
                    "data": {
                        "type": "object",
                        "description": "Document fields to store"
                    }
                },
                "required": ["collection", "data"]
            }),
        },
        ToolDescriptor {
            name: "firestore_list_collections",
            description: "List root collections, or the subcollections under a document path.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "documentPath": {
                        "type": "string",
                        "description": "Document path to list subcollections of (omit for root collections)"
                    },
                    "limit": {
                        "type": "number",
                        "description": "Maximum collections to return (default: 20)",
                        "default": 20
                    },
                    "pageToken": {
                        "type": "string",
                        "description": "Collection name to resume after"
                    }
                }
            }),
        },
        ToolDescriptor {
            name: "firestore_list_documents",
            description: "List documents in a collection with optional filters and cursor pagination. \
                          String filter values that look like calendar dates are compared as timestamps.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection": {
                        "type": "string",
                        "description": "Collection name"
                    },
                    "filters": {
                        "type": "array",
                        "description": "Conditions the documents must satisfy (combined with AND)",
                        "items": {
                            "type": "object",
                            "properties": {
                                "field": {
                                    "type": "string",
                                    "description": "Field name to filter on"
                                },
                                "operator": {
                                    "type": "string",
                                    "description": "One of ==, !=, <, <=, >, >=, array-contains, array-contains-any, in, not-in"
                                },
                                "value": {
                                    "description": "Value to compare against"
                                }
                            },
                            "required": ["field", "operator", "value"]
                        }
                    },
                    "limit": {
                        "type": "number",
                        "description": "Maximum documents to return (default: 20)",
                        "default": 20
                    },
                    "pageToken": {
                        "type": "string",
                        "description": "Document id to resume after"
                    }
                },
                "required": ["collection"]
            }),
        },
        ToolDescriptor {
            name: "firestore_get_document",
            description: "Get a document from a Firestore collection by id.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection": {
                        "type": "string",
                        "description": "Collection name"
                    },
                    "id": {
                        "type": "string",
                        "description": "Document id"
                    }
                },
                "required": ["collection", "id"]
            }),
        },
        ToolDescriptor {
            name: "firestore_update_document",
            description: "Update supplied fields of an existing document (merge, not replace).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection": {
                        "type": "string",
                        "description": "Collection name"
                    },
                    "id": {
                        "type": "string",
                        "description": "Document id"
                    },
                    "data": {
                        "type": "object",
                        "description": "Fields to update"
                    }
                },
                "required": ["collection", "id", "data"]
            }),
        },
        ToolDescriptor {
            name: "firestore_delete_document",
            description: "Delete a document from a Firestore collection. Deleting a missing id succeeds.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection": {
                        "type": "string",
                        "description": "Collection name"
                    },
                    "id": {
                        "type": "string",
                        "description": "Document id"
                    }
                },
                "required": ["collection", "id"]
            }),
        },
        ToolDescriptor {
            name: "auth_get_user",
            description: "Look up a Firebase Auth user by uid, or by email when the identifier contains '@'.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "identifier": {
                        "type": "string",
                        "description": "User id or email address"
                    }
                },
                "required": ["identifier"]
            }),
        },
        ToolDescriptor {
            name: "storage_list_files",
            description: "List files and directories under a storage path. File entries carry a \
                          1-hour signed download URL when signing succeeds.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "directoryPath": {
                        "type": "string",
                        "description": "Directory to list (omit for the bucket root)"
                    },
                    "pageSize": {
                        "type": "number",
                        "description": "Maximum entries to return (default: 10)",
                        "default": 10
                    },
                    "pageToken": {
                        "type": "string",
                        "description": "Continuation token from a previous listing"
                    }
                }
            }),
        },
        ToolDescriptor {
            name: "storage_get_file_info",
            description: "Get metadata and a signed download URL for a storage file.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filePath": {
                        "type": "string",
                        "description": "Path of the file in the bucket"
                    }
                },
                "required": ["filePath"]
            }),
        },
    ]
});

pub fn tool_catalog() -> &'static [ToolDescriptor] {
    &CATALOG
}

pub fn catalog_json() -> Value {
    serde_json::to_value(tool_catalog()).unwrap_or_else(|_| json!([]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_nine_unique_tools() {
        let names: HashSet<&str> = tool_catalog().iter().map(|t| t.name).collect();
        assert_eq!(tool_catalog().len(), 9);
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn every_descriptor_declares_an_object_schema() {
        for tool in tool_catalog() {
            assert_eq!(
                tool.input_schema["type"], "object",
                "{} schema is not an object",
                tool.name
            );
        }
    }

    #[test]
    fn required_parameters_match_the_interface() {
        let required = |name: &str| -> Vec<String> {
            tool_catalog()
                .iter()
                .find(|t| t.name == name)
                .and_then(|t| t.input_schema.get("required"))
                .and_then(|r| r.as_array())
                .map(|r| {
                    r.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };
        assert_eq!(required("firestore_add_document"), ["collection", "data"]);
        assert_eq!(required("firestore_list_collections"), Vec::<String>::new());
        assert_eq!(required("auth_get_user"), ["identifier"]);
        assert_eq!(required("storage_get_file_info"), ["filePath"]);
    }
}
