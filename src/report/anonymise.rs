use ahash::AHashMap;

const GONE: &str = "[deleted]";

/// Stable pseudonyms for one page: the case author becomes `author_<case_id>`,
/// everyone else `commenter_<k>` in first-seen order.
pub struct Anonymiser {
    enabled: bool,
    names: AHashMap<String, String>,
    next: usize,
}

impl Anonymiser {
    pub fn new(case_id: &str, op: Option<&str>, enabled: bool) -> Self {
        let mut names = AHashMap::new();
        if let Some(op) = op {
            names.insert(op.to_lowercase(), format!("author_{case_id}"));
        }
        Self { enabled, names, next: 1 }
    }

    /// Display name for `author`; gone accounts stay `[deleted]`.
    pub fn name(&mut self, author: Option<&str>) -> String {
        let Some(author) = author else { return GONE.to_string() };
        if !self.enabled {
            return author.to_string();
        }
        if let Some(n) = self.names.get(&author.to_lowercase()) {
            return n.clone();
        }
        let alias = format!("commenter_{}", self.next);
        self.next += 1;
        self.names.insert(author.to_lowercase(), alias.clone());
        alias
    }
}
