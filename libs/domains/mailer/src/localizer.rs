//! Translation catalogs and per-recipient translators.
//!
//! Catalogs are nested JSON objects flattened to dotted keys
//! (`emails.registerMail.subject`). Values use `{{placeholder}}` interpolation.
//! `de` and `en` are compiled in; a directory of `<lang>.json` files can add
//! languages or override single keys at startup.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{CatalogError, RenderError};

const BUNDLED: &[(&str, &str)] = &[
    ("de", include_str!("../lang/de.json")),
    ("en", include_str!("../lang/en.json")),
];

pub const DEFAULT_FALLBACK_LANGUAGE: &str = "de";

/// Language tag -> (dotted key -> template string).
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    languages: HashMap<String, HashMap<String, String>>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The catalogs compiled into the binary.
    pub fn bundled() -> Result<Self, CatalogError> {
        let mut catalog = Self::empty();
        for (language, json) in BUNDLED {
            catalog.merge_json(language, json)?;
        }
        Ok(catalog)
    }

    /// Merge every `<lang>.json` file in `dir`. Keys in the files win over
    /// keys already present.
    pub fn merge_dir(&mut self, dir: &Path) -> Result<(), CatalogError> {
        let entries = std::fs::read_dir(dir).map_err(|source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let path = entry
                .map_err(|source| CatalogError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();

            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(language) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let json = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            self.merge_json(language, &json)?;
            info!(language, path = %path.display(), "Loaded translation catalog");
        }

        Ok(())
    }

    /// Merge one language from a JSON document. A single top-level
    /// `translation` namespace is unwrapped.
    pub fn merge_json(&mut self, language: &str, json: &str) -> Result<(), CatalogError> {
        let root: Value = serde_json::from_str(json).map_err(|source| CatalogError::Json {
            language: language.to_string(),
            source,
        })?;

        let root = match root {
            Value::Object(mut map) if map.len() == 1 && map.contains_key("translation") => {
                map.remove("translation").unwrap_or(Value::Null)
            }
            other => other,
        };
        let Value::Object(map) = root else {
            return Err(CatalogError::NotAnObject {
                language: language.to_string(),
            });
        };

        let entries = self.languages.entry(language.to_string()).or_default();
        flatten("", &map, entries);
        Ok(())
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.languages.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }

    fn get(&self, language: &str, key: &str) -> Option<&str> {
        self.languages.get(language)?.get(key).map(String::as_str)
    }

    /// Exact tag, then case-insensitive, then primary subtag (`en-US` -> `en`).
    fn match_language(&self, tag: &str) -> Option<&str> {
        let tag = tag.trim();
        if let Some((known, _)) = self.languages.get_key_value(tag) {
            return Some(known.as_str());
        }
        if let Some(known) = self.languages.keys().find(|k| k.eq_ignore_ascii_case(tag)) {
            return Some(known.as_str());
        }
        let primary = tag.split(['-', '_']).next()?;
        self.languages
            .keys()
            .find(|k| k.eq_ignore_ascii_case(primary))
            .map(String::as_str)
    }
}

fn flatten(prefix: &str, map: &Map<String, Value>, out: &mut HashMap<String, String>) {
    for (key, value) in map {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten(&full, nested, out),
            Value::String(s) => {
                out.insert(full, s.clone());
            }
            Value::Null => {}
            other => {
                out.insert(full, other.to_string());
            }
        }
    }
}

/// Resolves recipients' language tags against a loaded catalog.
#[derive(Debug, Clone)]
pub struct Localizer {
    catalog: Arc<Catalog>,
    fallback: String,
}

impl Localizer {
    /// Fails if `fallback` has no catalog.
    pub fn new(catalog: Catalog, fallback: impl Into<String>) -> Result<Self, CatalogError> {
        let fallback = fallback.into();
        let resolved = catalog
            .match_language(&fallback)
            .map(str::to_string)
            .ok_or_else(|| CatalogError::MissingFallback(fallback.clone()))?;

        info!(
            languages = ?catalog.languages(),
            fallback = %resolved,
            "Localizer ready"
        );

        Ok(Self {
            catalog: Arc::new(catalog),
            fallback: resolved,
        })
    }

    /// Translator for `tag`; absent or unknown tags get the fallback language.
    pub fn resolve(&self, tag: Option<&str>) -> Translator<'_> {
        let language = tag
            .and_then(|t| self.catalog.match_language(t))
            .unwrap_or(self.fallback.as_str());

        if let Some(requested) = tag {
            if requested != language {
                debug!(requested, resolved = language, "Resolved language tag");
            }
        }

        Translator {
            catalog: &self.catalog,
            language,
            fallback: &self.fallback,
        }
    }
}

/// Translation function fixed to one language.
#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    catalog: &'a Catalog,
    language: &'a str,
    fallback: &'a str,
}

impl Translator<'_> {
    pub fn language(&self) -> &str {
        self.language
    }

    /// Look up `key` and interpolate `{{name}}` placeholders from `params`.
    ///
    /// A key missing in the active language is taken from the fallback
    /// language. Placeholders without a matching param are an error.
    pub fn t(&self, key: &str, params: &Value) -> Result<String, RenderError> {
        let template = self
            .catalog
            .get(self.language, key)
            .or_else(|| self.catalog.get(self.fallback, key))
            .ok_or_else(|| RenderError::MissingTranslationKey {
                language: self.language.to_string(),
                key: key.to_string(),
            })?;

        interpolate(key, template, params)
    }
}

fn interpolate(key: &str, template: &str, params: &Value) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);

        // `{{- name}}` is the unescaped form; output is plain text either way.
        let name = rest[start + 2..start + 2 + len]
            .trim()
            .trim_start_matches('-')
            .trim();

        match params.get(name) {
            Some(Value::String(s)) => out.push_str(s),
            Some(Value::Number(n)) => out.push_str(&n.to_string()),
            Some(Value::Bool(b)) => out.push_str(&b.to_string()),
            _ => {
                return Err(RenderError::InvalidTemplateParams(format!(
                    "'{key}' needs a string value for '{name}'"
                )));
            }
        }

        rest = &rest[start + 2 + len + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn localizer() -> Localizer {
        Localizer::new(Catalog::bundled().unwrap(), DEFAULT_FALLBACK_LANGUAGE).unwrap()
    }

    #[test]
    fn test_bundled_catalogs() {
        let catalog = Catalog::bundled().unwrap();
        assert_eq!(catalog.languages(), vec!["de", "en"]);
        assert!(catalog.get("en", "emails.registerMail.subject").is_some());
        assert!(catalog.get("de", "emails.passwordReset.subject").is_some());
    }

    #[test]
    fn test_english_subject() {
        let localizer = localizer();
        let t = localizer.resolve(Some("en"));
        assert_eq!(t.language(), "en");
        assert_eq!(
            t.t("emails.registerMail.subject", &json!({ "companyName": "Acme" }))
                .unwrap(),
            "Acme - Confirm your registration"
        );
    }

    #[test]
    fn test_unset_and_unknown_languages_use_fallback() {
        let localizer = localizer();
        let params = json!({ "companyName": "Acme" });
        let expected = "Acme - Bestätigen Sie Ihre Registrierung";

        for tag in [None, Some("fr"), Some(""), Some("xx-YY")] {
            let t = localizer.resolve(tag);
            assert_eq!(t.language(), "de", "tag {:?}", tag);
            assert_eq!(t.t("emails.registerMail.subject", &params).unwrap(), expected);
        }
    }

    #[test]
    fn test_region_subtag_matches_primary_language() {
        let localizer = localizer();
        assert_eq!(localizer.resolve(Some("en-US")).language(), "en");
        assert_eq!(localizer.resolve(Some("EN_gb")).language(), "en");
        assert_eq!(localizer.resolve(Some("de-AT")).language(), "de");
    }

    #[test]
    fn test_missing_key_falls_back_then_errors() {
        let mut catalog = Catalog::bundled().unwrap();
        catalog
            .merge_json("fr", r#"{"emails":{"closing":"Cordialement,"}}"#)
            .unwrap();
        let localizer = Localizer::new(catalog, "en").unwrap();

        let t = localizer.resolve(Some("fr"));
        assert_eq!(t.t("emails.closing", &json!({})).unwrap(), "Cordialement,");
        assert_eq!(
            t.t("emails.signature", &json!({ "companyName": "Acme" }))
                .unwrap(),
            "Your Acme team"
        );

        let err = t.t("emails.nope", &json!({})).unwrap_err();
        assert!(matches!(
            err,
            RenderError::MissingTranslationKey { ref language, ref key }
                if language == "fr" && key == "emails.nope"
        ));
    }

    #[test]
    fn test_missing_param_is_an_error() {
        let localizer = localizer();
        let err = localizer
            .resolve(Some("en"))
            .t("emails.registerMail.greeting", &json!({}))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidTemplateParams(_)));
    }

    #[test]
    fn test_interpolation_forms() {
        let params = json!({ "name": "Bob", "n": 3 });
        assert_eq!(
            interpolate("k", "Hi {{name}}, {{ n }} new, {{- name}}!", &params).unwrap(),
            "Hi Bob, 3 new, Bob!"
        );
        assert_eq!(interpolate("k", "no params", &params).unwrap(), "no params");
        assert_eq!(interpolate("k", "open {{name", &params).unwrap(), "open {{name");
    }

    #[test]
    fn test_translation_namespace_is_unwrapped() {
        let mut catalog = Catalog::empty();
        catalog
            .merge_json("en", r#"{"translation":{"a":{"b":"c"}}}"#)
            .unwrap();
        assert_eq!(catalog.get("en", "a.b"), Some("c"));
    }

    #[test]
    fn test_fallback_must_exist() {
        let err = Localizer::new(Catalog::bundled().unwrap(), "fr").unwrap_err();
        assert!(matches!(err, CatalogError::MissingFallback(ref l) if l == "fr"));
    }

    #[test]
    fn test_merge_dir_overrides_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("en.json"),
            r#"{"emails":{"closing":"Cheers,"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let mut catalog = Catalog::bundled().unwrap();
        catalog.merge_dir(dir.path()).unwrap();

        assert_eq!(catalog.get("en", "emails.closing"), Some("Cheers,"));
        assert!(catalog.get("en", "emails.registerMail.subject").is_some());
    }

    #[test]
    fn test_invalid_catalog_json() {
        let mut catalog = Catalog::empty();
        assert!(matches!(
            catalog.merge_json("en", "{oops"),
            Err(CatalogError::Json { .. })
        ));
        assert!(matches!(
            catalog.merge_json("en", "[1, 2]"),
            Err(CatalogError::NotAnObject { .. })
        ));
    }
}
