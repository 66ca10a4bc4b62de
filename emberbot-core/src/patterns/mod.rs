//! Pattern compiler: turns a trigger's raw regex/template strings into
//! runtime matchers.
//!
//! Two entry points over the same parsing logic, used at two different
//! times: [`validate`] runs before an admin write is accepted and collects
//! every broken field into one report; [`compile`] runs when a stored
//! trigger is activated ("hydration") and is expected to succeed, since the
//! strings were validated on the way in.

use std::collections::HashMap;

use minijinja::{context, Environment};
use regex::Regex;

use emberbot_common::error::{Error, ValidationReport};
use emberbot_common::models::session::TOKEN_SEPARATOR;
use emberbot_common::models::Trigger;

const TMPL_TEXT: &str = "text";
const TMPL_URL: &str = "url";
const TMPL_BODY: &str = "body";

/// Compiled artifacts for one trigger: the regex matcher plus an environment
/// holding the three templates. Render context exposes `value`, `matched`
/// and `secrets`.
#[derive(Debug)]
pub struct CompiledTrigger {
    regex: Regex,
    env: Environment<'static>,
}

impl CompiledTrigger {
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Whole match followed by submatches, in capture order. Groups that did
    /// not participate come back as empty strings. `None` when the text does
    /// not match at all.
    pub fn captures(&self, text: &str) -> Option<Vec<String>> {
        self.regex.captures(text).map(|caps| {
            caps.iter()
                .map(|m| m.map(|g| g.as_str().to_string()).unwrap_or_default())
                .collect()
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Renders the announcement text for a match. Only the captures are in
    /// scope here; text templates never see secrets.
    pub fn render_text(&self, matched: &[String]) -> Result<String, Error> {
        self.render(TMPL_TEXT, "", matched, &HashMap::new())
    }

    pub fn render_url(
        &self,
        value: &str,
        matched: &[String],
        secrets: &HashMap<String, String>,
    ) -> Result<String, Error> {
        self.render(TMPL_URL, value, matched, secrets)
    }

    pub fn render_body(
        &self,
        value: &str,
        matched: &[String],
        secrets: &HashMap<String, String>,
    ) -> Result<String, Error> {
        self.render(TMPL_BODY, value, matched, secrets)
    }

    fn render(
        &self,
        name: &str,
        value: &str,
        matched: &[String],
        secrets: &HashMap<String, String>,
    ) -> Result<String, Error> {
        let tmpl = self
            .env
            .get_template(name)
            .map_err(|e| Error::TemplateRender(e.to_string()))?;
        tmpl.render(context! {
            value => value,
            matched => matched,
            secrets => secrets,
        })
        .map_err(|e| Error::TemplateRender(format!("{} template failed: {}", name, e)))
    }
}

/// Admin-time validation: checks every field independently and returns all
/// failures in one pass.
pub fn validate(trigger: &Trigger) -> Result<(), Error> {
    let mut report = ValidationReport::default();

    // The id becomes the first half of a callback token.
    if trigger.trigger_id.contains(TOKEN_SEPARATOR) {
        report.push(
            "trigger_id",
            format!("must not contain '{}'", TOKEN_SEPARATOR),
        );
    }

    if trigger.channels.is_empty() {
        report.push("channels", "at least one channel is required");
    } else {
        if trigger.channels.iter().any(|c| c.is_empty()) {
            report.push("channels", "channel names must not be empty");
        }
        if has_duplicates(&trigger.channels) {
            report.push("channels", "channel names must be unique");
        }
    }

    if trigger.pattern.is_empty() {
        report.push("pattern", "a pattern is required");
    } else if let Err(e) = Regex::new(&trigger.pattern) {
        report.push("pattern", e.to_string());
    }

    if trigger.url_template.is_empty() {
        report.push("url_template", "a url template is required");
    } else if let Err(e) = parse_template(&trigger.url_template) {
        report.push("url_template", e);
    }

    if let Err(e) = parse_template(&trigger.body_template) {
        report.push("body_template", e);
    }
    if let Err(e) = parse_template(&trigger.text_template) {
        report.push("text_template", e);
    }

    if has_duplicates(&trigger.actions) {
        report.push("actions", "actions must be unique");
    }

    if report.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(report))
    }
}

/// Hydration: compiles a trigger that already passed [`validate`]. A failure
/// here means the input never went through validation (a caller bug) or the
/// stored blob is corrupt; the repository maps it to a persistence error.
pub fn compile(trigger: &Trigger) -> Result<CompiledTrigger, Error> {
    let regex = Regex::new(&trigger.pattern).map_err(|e| {
        Error::Validation(single_field("pattern", e.to_string()))
    })?;

    let mut env = Environment::new();
    add_template(&mut env, TMPL_TEXT, "text_template", &trigger.text_template)?;
    add_template(&mut env, TMPL_URL, "url_template", &trigger.url_template)?;
    add_template(&mut env, TMPL_BODY, "body_template", &trigger.body_template)?;

    Ok(CompiledTrigger { regex, env })
}

fn add_template(
    env: &mut Environment<'static>,
    name: &'static str,
    field: &'static str,
    source: &str,
) -> Result<(), Error> {
    env.add_template_owned(name.to_string(), source.to_string())
        .map_err(|e| Error::Validation(single_field(field, e.to_string())))
}

fn parse_template(source: &str) -> Result<(), String> {
    let mut env = Environment::new();
    env.add_template("probe", source).map_err(|e| e.to_string())?;
    Ok(())
}

fn single_field(field: &'static str, message: String) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.push(field, message);
    report
}

fn has_duplicates(items: &[String]) -> bool {
    let mut seen = std::collections::HashSet::new();
    items.iter().any(|item| !seen.insert(item))
}
