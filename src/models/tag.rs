use std::cmp::Ordering;
use std::fmt;

/// Label attached to any number of templates. The text is lowercased on
/// construction so lookups and de-duplication never have to think about case.
#[derive(Debug, Clone)]
pub struct Tag {
    text: String,
    /// Primary key from the `tags` table, absent until the tag is persisted.
    id: Option<i64>,
    /// Template uid of the `templateTags` row this tag was fetched through.
    assoc_id: Option<i64>,
}

impl Tag {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self {
            text: text.as_ref().to_lowercase(),
            id: None,
            assoc_id: None,
        }
    }

    /// Split a comma separated tag list the way spreadsheets store it. Every
    /// entry is trimmed and lowercased, blanks are dropped, and repeated tags
    /// collapse onto their first occurrence.
    pub fn parse_list(raw: &str) -> Vec<Tag> {
        let mut tags: Vec<Tag> = Vec::new();
        for piece in raw.split(',') {
            let tag = Tag::new(piece.trim());
            if tag.text.is_empty() || tags.contains(&tag) {
                continue;
            }
            tags.push(tag);
        }
        tags
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn assoc_id(&self) -> Option<i64> {
        self.assoc_id
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub(crate) fn set_assoc_id(&mut self, assoc_id: i64) {
        self.assoc_id = Some(assoc_id);
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Tag {}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_lowercases_text() {
        assert_eq!(Tag::new("URGENT").text(), "urgent");
        assert_eq!(Tag::new("Follow-Up").text(), "follow-up");
        assert_eq!(Tag::new("urgent").id(), None);
    }

    #[test]
    fn test_parse_list_trims_and_deduplicates() {
        let tags = Tag::parse_list("Work,  work , URGENT,,  ");
        let texts: Vec<&str> = tags.iter().map(Tag::text).collect();
        assert_eq!(texts, vec!["work", "urgent"]);
    }

    #[test]
    fn test_ordering_is_by_text_only() {
        let mut a = Tag::new("beta");
        a.set_id(1);
        let mut b = Tag::new("alpha");
        b.set_id(2);
        let mut tags = vec![a, b];
        tags.sort();
        assert_eq!(tags[0].text(), "alpha");

        let mut persisted = Tag::new("all");
        persisted.set_id(9);
        persisted.set_assoc_id(3);
        assert_eq!(persisted, Tag::new("ALL"));
    }
}
