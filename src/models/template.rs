use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Tag;
use crate::error::TemplateError;

/// Placeholders are written `${name}`; the name is whatever sits between the
/// braces, up to the first closing brace on the same line.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(.*?)\}").expect("placeholder pattern is valid")
});

/// Where a template sits relative to its row in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateState {
    New,
    Modified,
    Deleted,
    Existing,
}

/// One placeholder of a template together with the value the user typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    value: Option<String>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    fn is_filled(&self) -> bool {
        self.value.as_ref().is_some_and(|value| !value.is_empty())
    }
}

/// Case of a placeholder name, which decides how values typed for it are
/// coerced. `${NAME}` shouts, `${Name}` is capitalized, `${name}` is quiet and
/// anything else is left exactly as typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStyle {
    Lower,
    Upper,
    Title,
    AsTyped,
}

impl CaseStyle {
    pub fn of(name: &str) -> Self {
        if is_all_lower(name) {
            CaseStyle::Lower
        } else if is_all_upper(name) {
            CaseStyle::Upper
        } else if is_title(name) {
            CaseStyle::Title
        } else {
            CaseStyle::AsTyped
        }
    }

    pub fn apply(self, value: &str) -> String {
        match self {
            CaseStyle::Lower => value.to_lowercase(),
            CaseStyle::Upper => value.to_uppercase(),
            CaseStyle::Title => to_title(value),
            CaseStyle::AsTyped => value.to_string(),
        }
    }
}

fn is_cased(ch: char) -> bool {
    ch.is_lowercase() || ch.is_uppercase()
}

/// At least one cased character and none of them uppercase.
fn is_all_lower(text: &str) -> bool {
    let mut cased = false;
    for ch in text.chars() {
        if ch.is_uppercase() {
            return false;
        }
        cased |= ch.is_lowercase();
    }
    cased
}

fn is_all_upper(text: &str) -> bool {
    let mut cased = false;
    for ch in text.chars() {
        if ch.is_lowercase() {
            return false;
        }
        cased |= ch.is_uppercase();
    }
    cased
}

/// Uppercase characters only start a word and lowercase ones only continue
/// one, a word being a run of cased characters.
fn is_title(text: &str) -> bool {
    let mut cased = false;
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_uppercase() {
            if in_word {
                return false;
            }
            in_word = true;
            cased = true;
        } else if ch.is_lowercase() {
            if !in_word {
                return false;
            }
            cased = true;
        } else {
            in_word = false;
        }
    }
    cased
}

fn to_title(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if in_word {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        in_word = is_cased(ch);
    }
    out
}

/// Distinct placeholder names of `body`, in order of first appearance.
fn scan_fields(body: &str) -> Vec<Field> {
    let mut fields: Vec<Field> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(body) {
        let name = &caps[1];
        if fields.iter().all(|field| field.name != name) {
            fields.push(Field {
                name: name.to_string(),
                value: None,
            });
        }
    }
    fields
}

/// Email template loaded from the store or built by the importer. The body
/// is fixed once the template exists; `update_content` is the only way to
/// change it and it rebuilds the placeholder list at the same time.
#[derive(Debug, Clone)]
pub struct Template {
    /// `templates.uid`, absent until the template is persisted.
    id: Option<i64>,
    /// Name shown in the template list.
    title: String,
    /// Raw text with `${name}` placeholders.
    body: String,
    /// One entry per distinct placeholder, in order of first appearance.
    fields: Vec<Field>,
    /// Tags attached through `templateTags`, sorted and de-duplicated.
    tags: Vec<Tag>,
    /// Where the template stands relative to its stored row.
    state: TemplateState,
}

impl Template {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            id: None,
            title: title.into(),
            fields: scan_fields(&body),
            body,
            tags: Vec::new(),
            state: TemplateState::New,
        }
    }

    /// Hydrate a template from a `templates` row.
    pub(crate) fn from_row(id: i64, title: String, body: String) -> Self {
        let mut template = Self::new(title, body);
        template.id = Some(id);
        template.state = TemplateState::Existing;
        template
    }

    /// Attach tags from a comma separated list, normalized by
    /// [`Tag::parse_list`].
    pub fn with_tags(mut self, raw: &str) -> Self {
        self.set_tags(Tag::parse_list(raw));
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn state(&self) -> TemplateState {
        self.state
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .and_then(Field::value)
    }

    pub fn number_of_fields(&self) -> usize {
        self.fields.len()
    }

    /// True once every placeholder holds a non-empty value. A template without
    /// placeholders is always ready to copy.
    pub fn fields_set(&self) -> bool {
        self.fields.iter().all(Field::is_filled)
    }

    /// Replace the tag list, dropping repeated tags.
    pub fn set_tags(&mut self, tags: impl IntoIterator<Item = Tag>) {
        let mut unique: Vec<Tag> = Vec::new();
        for tag in tags {
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        self.tags = unique;
        self.touch();
    }

    /// Fill in every placeholder at once. The supplied names must match the
    /// placeholders exactly; values are case-coerced per [`CaseStyle`].
    ///
    /// An empty value leaves its field unset and fails the call with
    /// `ValueRequired`, but the other values supplied alongside it are kept so
    /// nothing the user typed is lost.
    pub fn set_fields<I, K, V>(&mut self, values: I) -> Result<(), TemplateError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut incoming: HashMap<String, String> = values
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        let ours: BTreeSet<&str> = self.fields.iter().map(|field| field.name.as_str()).collect();
        let theirs: BTreeSet<&str> = incoming.keys().map(String::as_str).collect();
        let keys: Vec<String> = ours
            .symmetric_difference(&theirs)
            .map(|key| key.to_string())
            .collect();
        if !keys.is_empty() {
            return Err(TemplateError::KeyMismatch { keys });
        }

        let mut missing: Option<String> = None;
        for field in &mut self.fields {
            let value = incoming.remove(&field.name).unwrap_or_default();
            if value.is_empty() {
                field.value = None;
                missing.get_or_insert_with(|| field.name.clone());
            } else {
                field.value = Some(CaseStyle::of(&field.name).apply(&value));
            }
        }

        match missing {
            Some(key) => Err(TemplateError::ValueRequired { key }),
            None => Ok(()),
        }
    }

    pub fn clear_fields(&mut self) {
        for field in &mut self.fields {
            field.value = None;
        }
    }

    /// Body with every `${name}` replaced by its value. Substitution happens
    /// in a single pass, so a value containing `${...}` is inserted verbatim.
    pub fn rendered_text(&self) -> Result<String, TemplateError> {
        if let Some(field) = self.fields.iter().find(|field| !field.is_filled()) {
            return Err(TemplateError::UnfilledField {
                name: field.name.clone(),
            });
        }

        let rendered = PLACEHOLDER.replace_all(&self.body, |caps: &Captures| {
            self.field(&caps[1]).unwrap_or(&caps[0]).to_string()
        });
        Ok(rendered.into_owned())
    }

    /// The rendered text when the template is filled in, the raw body
    /// otherwise. Used wherever a preview is shown.
    pub fn preview(&self) -> String {
        self.rendered_text()
            .unwrap_or_else(|_| self.body.clone())
    }

    /// Change title and body together. The placeholder list is rebuilt from
    /// the new body and values for names that survive are carried over.
    pub fn update_content(&mut self, title: impl Into<String>, body: impl Into<String>) {
        let body = body.into();
        let mut fields = scan_fields(&body);
        for field in &mut fields {
            field.value = self.field(&field.name).map(str::to_string);
        }
        self.title = title.into();
        self.body = body;
        self.fields = fields;
        self.touch();
    }

    pub(crate) fn tags_mut(&mut self) -> &mut Vec<Tag> {
        &mut self.tags
    }

    pub(crate) fn mark_persisted(&mut self, id: i64) {
        self.id = Some(id);
        self.state = TemplateState::Existing;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.state = TemplateState::Deleted;
    }

    fn touch(&mut self) {
        if self.state == TemplateState::Existing {
            self.state = TemplateState::Modified;
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(template: &Template) -> Vec<&str> {
        template.fields().iter().map(Field::name).collect()
    }

    #[test]
    fn test_fields_follow_first_occurrence() {
        let template = Template::new(
            "Greeting",
            "Hi ${Name}, about ${topic}. Thanks ${Name}! ${SIGNATURE}",
        );
        assert_eq!(names(&template), vec!["Name", "topic", "SIGNATURE"]);
        assert!(template.fields().iter().all(|field| field.value().is_none()));
        assert_eq!(template.state(), TemplateState::New);
        assert_eq!(template.id(), None);
    }

    #[test]
    fn test_body_without_placeholders() {
        let template = Template::new("Plain", "Nothing to fill in here. $ {x} ${");
        assert_eq!(template.number_of_fields(), 0);
        assert!(template.fields_set());
        assert_eq!(template.rendered_text().unwrap(), template.body());
    }

    #[test]
    fn test_case_style_detection() {
        assert_eq!(CaseStyle::of("name"), CaseStyle::Lower);
        assert_eq!(CaseStyle::of("first_name"), CaseStyle::Lower);
        assert_eq!(CaseStyle::of("NAME"), CaseStyle::Upper);
        assert_eq!(CaseStyle::of("Name"), CaseStyle::Title);
        assert_eq!(CaseStyle::of("First Name"), CaseStyle::Title);
        assert_eq!(CaseStyle::of("nAme"), CaseStyle::AsTyped);
        assert_eq!(CaseStyle::of("123"), CaseStyle::AsTyped);
    }

    #[test]
    fn test_set_fields_matches_case() {
        let mut template = Template::new("Cases", "${NAME} ${Name} ${name} ${nAme}");
        template
            .set_fields([
                ("NAME", "abc"),
                ("Name", "abc"),
                ("name", "ABC"),
                ("nAme", "abc"),
            ])
            .unwrap();
        assert_eq!(template.field("NAME"), Some("ABC"));
        assert_eq!(template.field("Name"), Some("Abc"));
        assert_eq!(template.field("name"), Some("abc"));
        assert_eq!(template.field("nAme"), Some("abc"));
        assert_eq!(template.rendered_text().unwrap(), "ABC Abc abc abc");
    }

    #[test]
    fn test_title_case_handles_every_word() {
        assert_eq!(CaseStyle::Title.apply("mary o'neil-SMITH"), "Mary O'Neil-Smith");
    }

    #[test]
    fn test_set_fields_key_mismatch_both_directions() {
        let mut template = Template::new("T", "${a} ${b}");

        let missing = template.set_fields([("a", "1")]).unwrap_err();
        assert_eq!(
            missing,
            TemplateError::KeyMismatch {
                keys: vec!["b".to_string()]
            }
        );

        let extra = template
            .set_fields([("a", "1"), ("b", "2"), ("c", "3")])
            .unwrap_err();
        assert_eq!(
            extra,
            TemplateError::KeyMismatch {
                keys: vec!["c".to_string()]
            }
        );

        assert!(template.fields().iter().all(|field| field.value().is_none()));
    }

    #[test]
    fn test_empty_value_is_required_but_others_are_kept() {
        let mut template = Template::new("T", "${first} ${second} ${third}");
        let err = template
            .set_fields([("first", "one"), ("second", ""), ("third", "three")])
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::ValueRequired {
                key: "second".to_string()
            }
        );
        assert_eq!(template.field("first"), Some("one"));
        assert_eq!(template.field("second"), None);
        assert_eq!(template.field("third"), Some("three"));
        assert!(!template.fields_set());
    }

    #[test]
    fn test_refill_cannot_clear_a_field() {
        let mut template = Template::new("T", "${x}");
        template.set_fields([("x", "filled")]).unwrap();
        assert!(template.set_fields([("x", "")]).is_err());
        assert!(!template.fields_set());
    }

    #[test]
    fn test_rendered_text_leaves_no_tokens() {
        let bodies = [
            "Dear ${who},\n${what} is ready. Bye ${who}.",
            "${a}${b}${a}",
            "${ spaced name }!",
            "${}",
        ];
        for body in bodies {
            let mut template = Template::new("T", body);
            let values: Vec<(String, String)> = template
                .fields()
                .iter()
                .map(|field| (field.name().to_string(), "v".to_string()))
                .collect();
            template.set_fields(values).unwrap();
            let rendered = template.rendered_text().unwrap();
            assert!(!rendered.contains("${"), "{body:?} rendered as {rendered:?}");
        }
    }

    #[test]
    fn test_values_are_not_expanded_twice() {
        let mut template = Template::new("T", "Dear ${who}, ${what}");
        template
            .set_fields([("who", "Sam"), ("what", "${who}")])
            .unwrap();
        assert_eq!(template.rendered_text().unwrap(), "Dear sam, ${who}");
    }

    #[test]
    fn test_rendered_text_requires_all_values() {
        let template = Template::new("T", "${a} and ${b}");
        assert_eq!(
            template.rendered_text().unwrap_err(),
            TemplateError::UnfilledField {
                name: "a".to_string()
            }
        );
        assert_eq!(template.preview(), "${a} and ${b}");
    }

    #[test]
    fn test_placeholder_with_regex_metacharacters() {
        let mut template = Template::new("T", "Total: ${amount.(usd)*} [${a+b}]");
        assert_eq!(names(&template), vec!["amount.(usd)*", "a+b"]);
        template
            .set_fields([("amount.(usd)*", "12"), ("a+b", "c")])
            .unwrap();
        assert_eq!(template.rendered_text().unwrap(), "Total: 12 [c]");
    }

    #[test]
    fn test_clear_fields_unsets_everything() {
        let mut template = Template::new("T", "${a} ${b}");
        template.set_fields([("a", "x"), ("b", "y")]).unwrap();
        assert!(template.fields_set());
        template.clear_fields();
        assert!(!template.fields_set());
        assert_eq!(template.field("a"), None);
    }

    #[test]
    fn test_update_content_resynchronizes_fields() {
        let mut template = Template::from_row(4, "Old".into(), "${keep} ${drop}".into());
        template.set_fields([("keep", "k"), ("drop", "d")]).unwrap();

        template.update_content("New", "${keep} ${added}");
        assert_eq!(template.title(), "New");
        assert_eq!(names(&template), vec!["keep", "added"]);
        assert_eq!(template.field("keep"), Some("k"));
        assert_eq!(template.field("added"), None);
        assert_eq!(template.state(), TemplateState::Modified);
        assert_eq!(template.id(), Some(4));
    }

    #[test]
    fn test_new_template_stays_new_after_edits() {
        let mut template = Template::new("Draft", "${a}").with_tags("Work, work");
        template.update_content("Draft 2", "${b}");
        assert_eq!(template.state(), TemplateState::New);
        assert_eq!(template.tags().len(), 1);
        assert_eq!(template.to_string(), "Draft 2");
    }
}
