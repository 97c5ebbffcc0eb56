//! Per-handle table mapping caller-supplied sequence names to canonical ones.

use std::collections::HashMap;

/// Number of names shown when a lookup fails.
const PREVIEW_LEN: usize = 5;

/// Strips a leading `chr` in any letter case: `chr12`, `Chr12` and `CHR12` all become `12`.
pub fn strip_chr_prefix(name: &str) -> &str {
    match name.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("chr") => &name[3..],
        _ => name,
    }
}

/// Canonical names of one resource, reachable by their exact and `chr`-stripped forms.
#[derive(Debug, Default, Clone)]
pub struct NameAliases {
    canonical: Vec<String>,
    aliases: HashMap<String, usize>,
}

impl NameAliases {
    /// Builds the table from a resource's name directory, in directory order.
    ///
    /// Exact names always win over stripped aliases, so a resource holding
    /// both `chr1` and `1` resolves each to itself.
    pub fn build(canonical: Vec<String>) -> Self {
        let mut aliases = HashMap::with_capacity(canonical.len() * 2);
        for (i, name) in canonical.iter().enumerate() {
            aliases.entry(name.clone()).or_insert(i);
        }
        for (i, name) in canonical.iter().enumerate() {
            aliases.entry(strip_chr_prefix(name).to_string()).or_insert(i);
        }
        Self { canonical, aliases }
    }

    /// Looks `requested` up verbatim, then with its `chr` prefix stripped.
    pub fn resolve(&self, requested: &str) -> Option<&str> {
        self.aliases
            .get(requested)
            .or_else(|| self.aliases.get(strip_chr_prefix(requested)))
            .map(|&i| self.canonical[i].as_str())
    }

    pub fn names(&self) -> &[String] {
        &self.canonical
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    /// First few canonical names, comma separated, with `...` when there are more.
    pub fn preview(&self) -> String {
        let mut preview = self
            .canonical
            .iter()
            .take(PREVIEW_LEN)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if self.canonical.len() > PREVIEW_LEN {
            preview.push_str(", ...");
        }
        preview
    }
}
