use super::bundle::IMAGES_DIR;

/// Resolves a recipe's image reference to a path relative to the bundle root.
///
/// Returns `None` when the recipe has no usable image and a placeholder
/// should be shown instead.
pub fn resolve_image_reference(reference: &str) -> Option<String> {
    let reference = reference.trim();

    if reference.is_empty() {
        return None;
    }

    if let Some(file_name) = reference.strip_prefix("../images/") {
        return Some(format!("{IMAGES_DIR}/{file_name}"));
    }

    if reference.starts_with("images/") {
        return Some(reference.to_string());
    }

    // Any other relative form points outside the bundle.
    if reference.contains("../") {
        return None;
    }

    Some(format!("{IMAGES_DIR}/{reference}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_reference_has_no_image() {
        assert_eq!(resolve_image_reference(""), None);
        assert_eq!(resolve_image_reference("   "), None);
    }

    #[test]
    fn parent_images_prefix_is_stripped() {
        assert_eq!(
            resolve_image_reference("../images/pork.jpg"),
            Some("images/pork.jpg".to_string())
        );
    }

    #[test]
    fn images_prefix_resolves_against_bundle_root() {
        assert_eq!(
            resolve_image_reference("images/steam/fish.png"),
            Some("images/steam/fish.png".to_string())
        );
    }

    #[test]
    fn bare_file_name_lands_in_images() {
        assert_eq!(
            resolve_image_reference("pork.jpg"),
            Some("images/pork.jpg".to_string())
        );
    }

    #[test]
    fn other_relative_forms_are_unsupported() {
        assert_eq!(resolve_image_reference("../other/pork.jpg"), None);
        assert_eq!(resolve_image_reference("photos/../pork.jpg"), None);
    }
}
