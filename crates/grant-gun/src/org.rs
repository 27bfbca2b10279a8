/// The HCB organization a budget fund URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgIdentity {
    pub event_id: String,
    pub slug: String,
    pub name: String,
}

impl OrgIdentity {
    /// Derive the organization from a budget fund URL such as
    /// `https://hcb.hackclub.com/ysws-budget-dhamari`.
    ///
    /// The final path segment is both the event id and the slug. The display name drops
    /// `slug_prefix` and turns `-`/`_` separators into spaces. Returns `None` when the URL has
    /// no usable final segment.
    pub fn from_budget_url(budget_url: &str, slug_prefix: &str) -> Option<Self> {
        let path = budget_url
            .trim()
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        let slug = path.rsplit('/').next().unwrap_or_default();
        if slug.is_empty() || slug.contains(':') {
            return None;
        }

        let name = slug
            .strip_prefix(slug_prefix)
            .unwrap_or(slug)
            .replace(['-', '_'], " ");

        Some(OrgIdentity {
            event_id: slug.to_owned(),
            slug: slug.to_owned(),
            name,
        })
    }

    /// The slug without the budget prefix, used when talking about the recipient.
    pub fn short_name<'a>(&'a self, slug_prefix: &str) -> &'a str {
        self.slug.strip_prefix(slug_prefix).unwrap_or(&self.slug)
    }
}
