//! Structured tool descriptions.
//!
//! `ToolSpec` replaces free-form description strings with structured
//! metadata — purpose, when to use, when not to use, examples — rendered
//! into one description string for the model. Separating these fields
//! keeps tool registration honest: a tool without usage guidance fails at
//! registration, not at selection time.

use crate::ToolDef;

/// A structured tool specification with usage guidance.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    /// One-sentence imperative purpose: "Search file contents by regex pattern".
    pub purpose: String,
    pub when_to_use: String,
    /// Prevents the model from confusing semantically similar tools.
    pub when_not_to_use: String,
    pub parameters: serde_json::Value,
    /// Usage examples as (input, expected behavior) pairs.
    pub examples: Vec<(String, String)>,
    pub output_format: String,
}

impl ToolSpec {
    pub fn builder(name: impl Into<String>) -> ToolSpecBuilder {
        ToolSpecBuilder {
            name: name.into(),
            purpose: None,
            when_to_use: None,
            when_not_to_use: None,
            parameters: None,
            examples: Vec::new(),
            output_format: None,
        }
    }

    /// Render the structured fields into one description string.
    pub fn to_description(&self) -> String {
        let mut desc = format!("{}.", self.purpose);
        desc.push_str(&format!("\nWhen to use: {}", self.when_to_use));
        desc.push_str(&format!("\nWhen NOT to use: {}", self.when_not_to_use));
        if !self.examples.is_empty() {
            desc.push_str("\nExamples:");
            for (input, output) in &self.examples {
                desc.push_str(&format!("\n  - {input} → {output}"));
            }
        }
        if !self.output_format.is_empty() {
            desc.push_str(&format!("\nOutput format: {}", self.output_format));
        }
        desc
    }

    /// Convert to the standard [`ToolDef`] used by the API.
    pub fn to_tool_def(&self) -> ToolDef {
        ToolDef::new(
            self.name.clone(),
            self.to_description(),
            self.parameters.clone(),
        )
    }
}

/// Builder for [`ToolSpec`]. Panics on `build()` if required fields are
/// missing — this ensures completeness at registration time.
pub struct ToolSpecBuilder {
    name: String,
    purpose: Option<String>,
    when_to_use: Option<String>,
    when_not_to_use: Option<String>,
    parameters: Option<serde_json::Value>,
    examples: Vec<(String, String)>,
    output_format: Option<String>,
}

impl ToolSpecBuilder {
    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn when_to_use(mut self, when: impl Into<String>) -> Self {
        self.when_to_use = Some(when.into());
        self
    }

    pub fn when_not_to_use(mut self, when_not: impl Into<String>) -> Self {
        self.when_not_to_use = Some(when_not.into());
        self
    }

    /// Derive JSON Schema parameters from a `schemars::JsonSchema` type.
    ///
    /// The schema is generated from the Rust type, so the schema and the
    /// deserialization logic can never diverge.
    pub fn parameters_for<T: schemars::JsonSchema>(mut self) -> Self {
        self.parameters = Some(crate::json_schema_for::<T>());
        self
    }

    pub fn example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.examples.push((input.into(), output.into()));
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    /// Build the spec and immediately convert to [`ToolDef`].
    pub fn to_tool_def(self) -> ToolDef {
        self.build().to_tool_def()
    }

    /// Build the [`ToolSpec`]. Panics if required fields are missing.
    pub fn build(self) -> ToolSpec {
        ToolSpec {
            name: self.name,
            purpose: self.purpose.expect("ToolSpec requires 'purpose'"),
            when_to_use: self.when_to_use.expect("ToolSpec requires 'when_to_use'"),
            when_not_to_use: self
                .when_not_to_use
                .expect("ToolSpec requires 'when_not_to_use'"),
            parameters: self.parameters.expect("ToolSpec requires 'parameters'"),
            examples: self.examples,
            output_format: self.output_format.unwrap_or_else(|| "Plain text".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_includes_guidance() {
        let spec = ToolSpec::builder("grep_search")
            .purpose("Search file contents by regex pattern")
            .when_to_use("When hunting for a pattern across files")
            .when_not_to_use("When you already know the file path — read it directly")
            .parameters_for::<serde_json::Map<String, serde_json::Value>>()
            .example("grep_search(pattern='TODO')", "Matching lines with file:line prefix")
            .build();
        let desc = spec.to_description();
        assert!(desc.contains("When NOT to use:"));
        assert!(desc.contains("TODO"));
    }

    #[test]
    #[should_panic(expected = "ToolSpec requires 'purpose'")]
    fn build_panics_on_missing_purpose() {
        ToolSpec::builder("incomplete")
            .when_to_use("test")
            .when_not_to_use("test")
            .build();
    }
}
