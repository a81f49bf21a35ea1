//! Boilerplate body for new migrations.
//!
//! Provides simple `{{var}}` replacement for the scaffold template.

use std::collections::HashMap;

/// Body written by `create`.
pub const MIGRATION_TEMPLATE: &str = "-- Migration: {{name}}
-- Created at: {{created_at}}
--
-- Statements run in order. With transactional migrations enabled the whole
-- file and its ledger entry commit together.

SELECT 1 + 1;
";

/// Render a template by replacing `{{key}}` placeholders with values.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
