/// Order comic pages by path.
///
/// Plain string comparison: `page10.jpg` sorts before `page9.jpg`. With
/// `case_sensitive` unset both sides are lowercased first; pages that compare
/// equal keep their input order.
pub fn order_pages(mut pages: Vec<String>, case_sensitive: bool) -> Vec<String> {
    if case_sensitive {
        pages.sort();
    } else {
        pages.sort_by_cached_key(|page| page.to_lowercase());
    }
    pages
}
