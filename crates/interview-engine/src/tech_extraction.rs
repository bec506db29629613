//! Detection of technology slugs in a free-text stack description.

use std::sync::OnceLock;

use interview_llm::TextGenerator;
use regex::Regex;

use crate::json_extract::{extract_json_array, string_items};

/// Documentation slugs the engine can interview on.
pub const KNOWN_SLUGS: &[&str] = &[
    // Languages
    "python", "go", "javascript", "typescript", "rust", "cpp", "c", "java",
    "kotlin", "php", "ruby", "swift", "dart", "elixir", "clojure", "lua",
    "perl", "scala", "haskell", "ocaml", "julia", "groovy", "crystal",
    // Frontend
    "react", "vue", "svelte", "angular", "angularjs", "nextjs", "lit",
    "htmx", "jquery_core", "jquery_ui", "backbone", "ember", "marionette",
    // Backend frameworks
    "django", "flask", "fastapi", "rails", "laravel", "symfony", "express",
    "koa", "nestjs", "spring_boot", "django_rest_framework",
    // Data stores
    "postgresql", "mysql", "mariadb", "sqlite", "redis", "influxdata",
    // Ops and tooling
    "docker", "kubernetes", "kubectl", "terraform", "ansible", "vagrant",
    "nginx", "haproxy", "git", "bash", "zsh", "fish", "nushell",
    "npm", "yarn", "bun", "deno", "node", "webpack", "vite", "esbuild",
    "eslint", "prettier", "jest", "playwright", "cypress", "puppeteer",
    // Data science
    "numpy", "pandas", "matplotlib", "scikit_learn", "tensorflow", "pytorch",
    // Web platform
    "css", "html", "sass", "less", "tailwindcss", "bootstrap",
    "http", "svg", "dom", "web_extensions", "markdown", "latex",
];

const SYNONYMS: &[(&str, &str)] = &[
    ("golang", "go"),
    ("go", "go"),
    ("го", "go"),
    ("py", "python"),
    ("python", "python"),
    ("питон", "python"),
];

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-zA-Zа-яА-Я0-9_+#.\-]+").expect("valid token regex"))
}

/// Map a synonym or a known slug to its canonical slug.
pub fn canonical_slug(token: &str) -> Option<&'static str> {
    let token = token.trim().to_lowercase();
    if let Some((_, slug)) = SYNONYMS.iter().find(|(alias, _)| *alias == token) {
        return Some(*slug);
    }
    KNOWN_SLUGS.iter().copied().find(|s| *s == token)
}

/// Slugs found by exact token or synonym match, in order of appearance.
pub fn lexical_tech_slugs(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut found: Vec<String> = Vec::new();
    for m in token_re().find_iter(&lowered) {
        let token = m.as_str().trim_end_matches('.');
        if let Some(slug) = canonical_slug(token) {
            if !found.iter().any(|f| f == slug) {
                found.push(slug.to_string());
            }
        }
    }
    found
}

/// Generator-proposed slugs first (only known ones), then lexical matches,
/// deduplicated and capped at `max`. A generator failure leaves the lexical
/// matches alone.
pub async fn extract_tech_slugs(generator: &dyn TextGenerator, text: &str, max: usize) -> Vec<String> {
    let prompt = format!(
        r#"
Return ONLY a JSON array of strings (no other text), where each string is a DevDocs slug from the allowed list below.
If nothing is found, return an empty array [] (and no other text).
Example format: ["python", "go"]

Allowed slugs:
[{slugs}]

User text:
{text}
"#,
        slugs = KNOWN_SLUGS.join(", ")
    );

    let mut merged: Vec<String> = match generator.generate(&prompt).await {
        Ok(raw) => string_items(&extract_json_array(&raw), usize::MAX)
            .iter()
            .filter_map(|s| canonical_slug(s))
            .map(String::from)
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Technology extraction request failed, using lexical match only");
            Vec::new()
        }
    };

    for slug in lexical_tech_slugs(text) {
        merged.push(slug);
    }

    let mut unique: Vec<String> = Vec::new();
    for slug in merged {
        if !unique.contains(&slug) {
            unique.push(slug);
        }
    }
    unique.truncate(max);
    tracing::info!(techs = ?unique, "Technologies detected");
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_llm::ScriptedGenerator;

    #[test]
    fn synonyms_and_slugs() {
        assert_eq!(
            lexical_tech_slugs("Golang, немного питон и Docker."),
            vec!["go", "python", "docker"]
        );
        assert_eq!(lexical_tech_slugs("go go golang"), vec!["go"]);
    }

    #[test]
    fn trailing_dot_is_ignored() {
        assert_eq!(lexical_tech_slugs("I mostly write rust."), vec!["rust"]);
    }

    #[test]
    fn no_technology_in_role_description() {
        assert!(lexical_tech_slugs("I manage people and write roadmaps").is_empty());
    }

    #[tokio::test]
    async fn generator_slugs_come_first() {
        let gen = ScriptedGenerator::new().then(r#"["PostgreSQL", "nonsense", "golang"]"#);
        let slugs = extract_tech_slugs(&gen, "python and postgres", 6).await;
        assert_eq!(slugs, vec!["postgresql", "go", "python"]);
    }

    #[tokio::test]
    async fn failed_generator_keeps_lexical_matches() {
        let gen = ScriptedGenerator::new();
        let slugs = extract_tech_slugs(&gen, "react, vue", 6).await;
        assert_eq!(slugs, vec!["react", "vue"]);
    }

    #[tokio::test]
    async fn result_is_capped() {
        let gen = ScriptedGenerator::new().then("[]");
        let text = "python go rust java kotlin php ruby swift";
        let slugs = extract_tech_slugs(&gen, text, 6).await;
        assert_eq!(slugs.len(), 6);
        assert_eq!(slugs[0], "python");
    }
}
