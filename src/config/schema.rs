use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "scheduler": {
                "type": "object",
                "properties": {
                    "default_max_concurrency": { "type": "integer", "minimum": 1 },
                    "default_timeout_secs": { "type": "integer", "minimum": 1 },
                    "tick_ms": { "type": "integer", "minimum": 1 },
                    "eta_window": { "type": "integer", "minimum": 1 }
                },
                "additionalProperties": false
            },
            "retry": {
                "type": "object",
                "properties": {
                    "max_retries": { "type": "integer", "minimum": 0 },
                    "max_retries_ceiling": { "type": "integer", "minimum": 0 },
                    "backoff_base_secs": { "type": "number", "minimum": 0 },
                    "backoff_cap_secs": { "type": "number", "minimum": 0 },
                    "jitter": { "type": "boolean" }
                },
                "additionalProperties": false
            },
            "roles": {
                "type": "object",
                "propertyNames": {
                    "enum": [
                        "recon-agent", "auth-agent", "fuzz-agent",
                        "session-agent", "validator-agent", "exploit-agent"
                    ]
                },
                "additionalProperties": { "$ref": "#/$defs/role" }
            },
            "consensus": {
                "type": "object",
                "properties": {
                    "accept_threshold": { "type": "number", "exclusiveMinimum": 0 },
                    "quorum": { "type": "integer", "minimum": 1 },
                    "review_on_create": { "type": "boolean" }
                },
                "additionalProperties": false
            },
            "planner": {
                "type": "object",
                "properties": {
                    "target_boost_threshold": { "type": "integer", "minimum": 1 },
                    "minutes_per_job": { "type": "integer", "minimum": 0 }
                },
                "additionalProperties": false
            },
            "events": {
                "type": "object",
                "properties": {
                    "buffer_size": { "type": "integer", "minimum": 1 },
                    "broadcast_capacity": { "type": "integer", "minimum": 1 }
                },
                "additionalProperties": false
            },
            "audit": {
                "type": "object",
                "properties": {
                    "directory": { "type": "string" }
                }
            },
            "catalog": {
                "type": "object",
                "properties": {
                    "extensions_dir": { "type": "string" }
                }
            },
            "server": {
                "type": "object",
                "properties": {
                    "host": { "type": "string" },
                    "port": { "type": "integer", "minimum": 1, "maximum": 65535 }
                }
            }
        },
        "additionalProperties": false,
        "$defs": {
            "role": {
                "type": "object",
                "properties": {
                    "slots": { "type": "integer", "minimum": 1 },
                    "timeout_secs": { "type": "integer", "minimum": 1 },
                    "expected_duration_secs": { "type": "integer", "minimum": 1 }
                },
                "additionalProperties": false
            }
        }
    })
});
