use super::document::{Arena, NodeId};

/// A parsed selector: compounds joined by descendant combinators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Selector {
    /// Leftmost ancestor first; the last compound must match the element.
    compounds: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    /// Parse `tag`, `#id`, `.class`, `*` and their compounds, separated by
    /// whitespace. Anything else yields `None`.
    pub(crate) fn parse(input: &str) -> Option<Self> {
        let compounds = input
            .split_whitespace()
            .map(Compound::parse)
            .collect::<Option<Vec<_>>>()?;
        if compounds.is_empty() {
            return None;
        }
        Some(Self { compounds })
    }

    pub(crate) fn matches(&self, arena: &Arena, id: NodeId) -> bool {
        let Some((last, ancestors)) = self.compounds.split_last() else {
            return false;
        };
        if !last.matches(arena, id) {
            return false;
        }
        // Greedy right-to-left walk up the ancestor chain.
        let mut current = arena.get(id).and_then(|n| n.parent);
        for compound in ancestors.iter().rev() {
            loop {
                let Some(candidate) = current else {
                    return false;
                };
                current = arena.get(candidate).and_then(|n| n.parent);
                if compound.matches(arena, candidate) {
                    break;
                }
            }
        }
        true
    }
}

impl Compound {
    fn parse(input: &str) -> Option<Self> {
        let mut compound = Compound::default();
        let mut rest = input;

        let tag_len = rest.find(['#', '.']).unwrap_or(rest.len());
        let tag = &rest[..tag_len];
        if !tag.is_empty() && tag != "*" {
            if !is_ident(tag) {
                return None;
            }
            compound.tag = Some(tag.to_ascii_lowercase());
        }
        rest = &rest[tag_len..];

        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let len = body.find(['#', '.']).unwrap_or(body.len());
            let name = &body[..len];
            if !is_ident(name) {
                return None;
            }
            match marker {
                '#' => compound.id = Some(name.to_string()),
                _ => compound.classes.push(name.to_string()),
            }
            rest = &body[len..];
        }

        Some(compound)
    }

    fn matches(&self, arena: &Arena, id: NodeId) -> bool {
        let Some(el) = arena.element(id) else {
            return false;
        };
        let attr = |name: &str| {
            el.attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        if let Some(ref tag) = self.tag {
            if !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(ref want) = self.id {
            if attr("id") != Some(want.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let have = attr("class").unwrap_or_default();
            if !self
                .classes
                .iter()
                .all(|c| have.split_whitespace().any(|h| h == c))
            {
                return false;
            }
        }
        true
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
