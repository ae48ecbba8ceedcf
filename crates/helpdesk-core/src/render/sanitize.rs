use crate::constants::render::{ALLOWED_ATTRIBUTES, ALLOWED_TAGS};
use std::collections::{HashMap, HashSet};

fn sanitizer() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect::<HashSet<_>>())
        .tag_attributes(HashMap::new())
        .generic_attributes(ALLOWED_ATTRIBUTES.iter().copied().collect::<HashSet<_>>())
        // rel is an allowed attribute and set on external links during
        // enhancement, so ammonia must not manage it.
        .link_rel(None)
        .url_relative(ammonia::UrlRelative::PassThrough)
        .strip_comments(true);
    builder
}

/// Strip every element and attribute outside the allow-lists.
///
/// Disallowed elements are removed while their text content is kept, except
/// for `script` and `style` whose content is dropped as well. Running this on
/// its own output is a no-op.
pub fn sanitize(html: &str) -> String {
    sanitizer().clean(html).to_string()
}
