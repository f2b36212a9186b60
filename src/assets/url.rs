/// The opaque scheme world state uses to point into the configured asset root.
const OPAQUE_SCHEME: &str = "asset://";

/// Maps a logical asset locator to a fetchable URL.
///
/// `asset://` locators are joined onto the configured root with exactly one
/// separating slash, absolute http(s) addresses pass through unchanged,
/// everything else (including an unset root) resolves to `None`.
pub fn resolve_asset_url(locator: &str, assets_root: Option<&str>) -> Option<String> {
    if let Some(rest) = locator.strip_prefix(OPAQUE_SCHEME) {
        let root = assets_root?.trim_end_matches('/');
        if root.is_empty() {
            return None;
        }
        return Some(format!("{}/{}", root, rest));
    }

    if locator.starts_with("http://") || locator.starts_with("https://") {
        return Some(locator.to_owned());
    }

    None
}
