//! Settings schema model: pages, sections and settings.
//!
//! The schema is authored elsewhere; this module only deserializes it and
//! answers the lookups the store needs (definitions by key, defaults and
//! section-aware visibility).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SetteraResult;
use crate::visibility::{self, VisibilityRules};

/// Kind of control a setting is edited with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Boolean,
    Text,
    Number,
    Select,
    Multiselect,
    Date,
    Compound,
    Repeatable,
    Action,
    Custom,
}

/// Confirmation dialog shown before a change or action goes through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmConfig {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_label: Option<String>,
    /// Text the user must type exactly before confirming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_text: Option<String>,
}

/// A single configurable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingDefinition {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<VisibilityRules>,
    #[serde(default)]
    pub dangerous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<ConfirmConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDefinition {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<VisibilityRules>,
    #[serde(default)]
    pub settings: Vec<SettingDefinition>,
    #[serde(default)]
    pub subsections: Vec<SectionDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDefinition {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<SectionDefinition>,
    /// Nested sub-pages.
    #[serde(default)]
    pub pages: Vec<PageDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetteraSchema {
    #[serde(default)]
    pub pages: Vec<PageDefinition>,
}

/// Schema lookup installed into the store: key -> definition.
pub type SchemaLookup = Arc<dyn Fn(&str) -> Option<Arc<SettingDefinition>> + Send + Sync>;

impl SetteraSchema {
    pub fn from_json(input: &str) -> SetteraResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// All settings in document order, depth first.
    pub fn settings(&self) -> Vec<&SettingDefinition> {
        let mut out = Vec::new();
        self.walk(&mut |setting, _| out.push(setting));
        out
    }

    pub fn find_setting(&self, key: &str) -> Option<&SettingDefinition> {
        self.settings().into_iter().find(|setting| setting.key == key)
    }

    /// Map of every setting that declares a default.
    pub fn default_values(&self) -> Map<String, Value> {
        self.settings()
            .into_iter()
            .filter_map(|setting| Some((setting.key.clone(), setting.default.clone()?)))
            .collect()
    }

    /// Fill in defaults for keys the caller has not set.
    pub fn merge_defaults(&self, values: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = self.default_values();
        for (key, value) in values {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Keys of the settings shown for `values`.
    ///
    /// A setting is shown only when every enclosing section rule and its own
    /// rule hold.
    pub fn visible_keys(&self, values: &Map<String, Value>) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |setting, sections| {
            let sections_visible = sections
                .iter()
                .all(|section| visibility::evaluate(section.visible_when.as_ref(), values));
            if sections_visible && visibility::evaluate(setting.visible_when.as_ref(), values) {
                out.push(setting.key.as_str());
            }
        });
        out
    }

    fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a SettingDefinition, &[&'a SectionDefinition])) {
        fn walk_page<'a>(
            page: &'a PageDefinition,
            visit: &mut dyn FnMut(&'a SettingDefinition, &[&'a SectionDefinition]),
        ) {
            for section in &page.sections {
                let mut stack = vec![section];
                walk_section(section, &mut stack, visit);
            }
            for child in &page.pages {
                walk_page(child, visit);
            }
        }

        fn walk_section<'a>(
            section: &'a SectionDefinition,
            stack: &mut Vec<&'a SectionDefinition>,
            visit: &mut dyn FnMut(&'a SettingDefinition, &[&'a SectionDefinition]),
        ) {
            for setting in &section.settings {
                visit(setting, stack);
            }
            for sub in &section.subsections {
                stack.push(sub);
                walk_section(sub, stack, visit);
                stack.pop();
            }
        }

        for page in &self.pages {
            walk_page(page, visit);
        }
    }
}

/// Key -> definition index built once per schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    settings: HashMap<String, Arc<SettingDefinition>>,
}

impl SchemaIndex {
    pub fn new(schema: &SetteraSchema) -> Self {
        let settings = schema
            .settings()
            .into_iter()
            .map(|setting| (setting.key.clone(), Arc::new(setting.clone())))
            .collect();
        Self { settings }
    }

    pub fn get(&self, key: &str) -> Option<Arc<SettingDefinition>> {
        self.settings.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Convert into the lookup function the store dispatches through.
    pub fn into_lookup(self) -> SchemaLookup {
        Arc::new(move |key| self.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SetteraSchema {
        serde_json::from_value(json!({
            "pages": [{
                "key": "general",
                "title": "General",
                "sections": [{
                    "key": "sync",
                    "title": "Sync",
                    "settings": [
                        {"key": "sync.enabled", "type": "boolean", "default": false},
                        {"key": "sync.interval", "type": "number", "default": 30,
                         "visibleWhen": {"settingKey": "sync.enabled", "equals": true}}
                    ],
                    "subsections": [{
                        "key": "sync.advanced",
                        "visibleWhen": {"settingKey": "sync.enabled"},
                        "settings": [
                            {"key": "sync.endpoint", "type": "text"}
                        ]
                    }]
                }],
                "pages": [{
                    "key": "danger",
                    "sections": [{
                        "key": "danger-zone",
                        "settings": [{
                            "key": "reset",
                            "type": "action",
                            "dangerous": true,
                            "confirm": {"title": "Reset everything?", "requireText": "RESET"}
                        }]
                    }]
                }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_settings_walks_nested_pages_and_sections() {
        let keys: Vec<_> = sample().settings().iter().map(|s| s.key.clone()).collect();
        assert_eq!(keys, ["sync.enabled", "sync.interval", "sync.endpoint", "reset"]);
    }

    #[test]
    fn test_find_setting_reads_confirm_config() {
        let schema = sample();
        let reset = schema.find_setting("reset").unwrap();
        assert_eq!(reset.setting_type, SettingType::Action);
        assert!(reset.dangerous);
        let confirm = reset.confirm.as_ref().unwrap();
        assert_eq!(confirm.require_text.as_deref(), Some("RESET"));
        assert!(schema.find_setting("missing").is_none());
    }

    #[test]
    fn test_merge_defaults_keeps_caller_values() {
        let schema = sample();
        let values = json!({"sync.interval": 60}).as_object().cloned().unwrap();
        let merged = schema.merge_defaults(&values);
        assert_eq!(merged.get("sync.enabled"), Some(&json!(false)));
        assert_eq!(merged.get("sync.interval"), Some(&json!(60)));
        assert!(!merged.contains_key("sync.endpoint"));
    }

    #[test]
    fn test_visible_keys_respects_section_rules() {
        let schema = sample();
        let off = schema.default_values();
        assert_eq!(schema.visible_keys(&off), ["sync.enabled", "reset"]);

        let on = json!({"sync.enabled": true}).as_object().cloned().unwrap();
        assert_eq!(
            schema.visible_keys(&on),
            ["sync.enabled", "sync.interval", "sync.endpoint", "reset"]
        );
    }

    #[test]
    fn test_index_lookup() {
        let lookup = SchemaIndex::new(&sample()).into_lookup();
        assert_eq!(lookup("sync.interval").unwrap().default, Some(json!(30)));
        assert!(lookup("nope").is_none());
    }
}
